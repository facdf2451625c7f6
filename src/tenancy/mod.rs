//! Collaborators of the admission decision: tenant lookup and notifications.

pub mod notifier;
pub mod resolver;

pub use notifier::{EventNotifier, Notification, Notifier, Severity};
pub use resolver::{ResolveError, TenantIndex, TenantResolver};
