//! Namespace to tenant resolution.
//!
//! `TenantIndex` keeps every known Tenant plus a secondary index from owned
//! namespace to tenant name, fed by a watch on Tenant objects. Lookups never
//! touch the API server.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use kube::ResourceExt;
use kube::runtime::watcher;
use thiserror::Error;
use tracing::{debug, warn};

use crate::crd::Tenant;

/// Errors from tenant lookups
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The initial tenant list has not been received yet
    #[error("tenant index has not completed its initial sync")]
    NotSynced,
}

/// Finds the Tenant owning a namespace.
pub trait TenantResolver: Send + Sync {
    /// Returns `Ok(None)` when no tenant owns `namespace`.
    fn find_owning_tenant(&self, namespace: &str) -> Result<Option<Arc<Tenant>>, ResolveError>;
}

#[derive(Default)]
struct IndexState {
    synced: bool,
    tenants: HashMap<String, Arc<Tenant>>,
    namespaces: HashMap<String, String>,
    // Tenants received between Init and InitDone of a relist
    pending: Option<HashMap<String, Arc<Tenant>>>,
}

impl IndexState {
    fn insert(&mut self, tenant: Arc<Tenant>) {
        let name = tenant.name_any();
        self.remove(&name);

        for namespace in tenant.namespaces() {
            if let Some(previous) = self.namespaces.insert(namespace.clone(), name.clone()) {
                warn!(
                    namespace = %namespace,
                    tenant = %name,
                    previous_tenant = %previous,
                    "Namespace claimed by more than one tenant"
                );
            }
        }
        self.tenants.insert(name, tenant);
    }

    fn remove(&mut self, name: &str) {
        if let Some(old) = self.tenants.remove(name) {
            for namespace in old.namespaces() {
                if self.namespaces.get(namespace).is_some_and(|owner| owner == name) {
                    self.namespaces.remove(namespace);
                }
            }
        }
    }

    // Inserted in name order: a namespace claimed twice goes to the tenant
    // whose name sorts last.
    fn replace_all(&mut self, tenants: HashMap<String, Arc<Tenant>>) {
        self.tenants.clear();
        self.namespaces.clear();

        let mut tenants: Vec<_> = tenants.into_iter().collect();
        tenants.sort_by(|(a, _), (b, _)| a.cmp(b));
        for (_, tenant) in tenants {
            self.insert(tenant);
        }
    }
}

/// In-memory Tenant index keyed by owned namespace
#[derive(Default)]
pub struct TenantIndex {
    state: RwLock<IndexState>,
}

impl TenantIndex {
    /// Create an empty, unsynced index
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an index that is already synced with the given tenants.
    pub fn with_tenants(tenants: impl IntoIterator<Item = Tenant>) -> Self {
        let index = Self::new();
        {
            let mut state = index.write();
            for tenant in tenants {
                state.insert(Arc::new(tenant));
            }
            state.synced = true;
        }
        index
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the initial tenant list has been received
    pub fn is_synced(&self) -> bool {
        self.read().synced
    }

    /// Number of indexed tenants
    pub fn len(&self) -> usize {
        self.read().tenants.len()
    }

    /// Whether no tenant is indexed
    pub fn is_empty(&self) -> bool {
        self.read().tenants.is_empty()
    }

    /// Insert or replace a tenant
    pub fn apply(&self, tenant: Tenant) {
        self.write().insert(Arc::new(tenant));
    }

    /// Remove a tenant and the namespaces it owned
    pub fn delete(&self, tenant: &Tenant) {
        self.write().remove(&tenant.name_any());
    }

    /// Apply a watcher event.
    ///
    /// A relist (`Init` .. `InitDone`) is buffered and swapped in atomically
    /// so lookups keep seeing the previous snapshot until it completes.
    pub fn handle_event(&self, event: watcher::Event<Tenant>) {
        let mut state = self.write();
        match event {
            watcher::Event::Apply(tenant) => {
                debug!(tenant = %tenant.name_any(), "Tenant applied");
                state.insert(Arc::new(tenant));
            }
            watcher::Event::Delete(tenant) => {
                debug!(tenant = %tenant.name_any(), "Tenant deleted");
                state.remove(&tenant.name_any());
            }
            watcher::Event::Init => {
                state.pending = Some(HashMap::new());
            }
            watcher::Event::InitApply(tenant) => {
                let pending = state.pending.get_or_insert_with(HashMap::new);
                pending.insert(tenant.name_any(), Arc::new(tenant));
            }
            watcher::Event::InitDone => {
                let tenants = state.pending.take().unwrap_or_default();
                state.replace_all(tenants);
                state.synced = true;
                debug!(tenants = state.tenants.len(), "Tenant index synced");
            }
        }
    }
}

impl TenantResolver for TenantIndex {
    fn find_owning_tenant(&self, namespace: &str) -> Result<Option<Arc<Tenant>>, ResolveError> {
        let state = self.read();
        if !state.synced {
            return Err(ResolveError::NotSynced);
        }

        Ok(state
            .namespaces
            .get(namespace)
            .and_then(|name| state.tenants.get(name))
            .cloned())
    }
}
