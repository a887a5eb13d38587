//! Reactive binding re-activation after a DOM swap.

/// Activates the host framework's reactive bindings inside one subtree.
///
/// Called once per swapped slot with the slot's element id as the subtree
/// root. Implementations must scan only that subtree, never the whole page.
pub trait BindingActivator: Send + Sync {
    /// Scans and activates bindings under the element with id `root_id`.
    fn activate_subtree(&self, root_id: &str);
}

/// Activator for pages without a binding framework.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopActivator;

impl BindingActivator for NoopActivator {
    fn activate_subtree(&self, root_id: &str) {
        tracing::trace!(root_id, "No binding framework attached, skipping activation");
    }
}
