use rollcall_domain::{Actor, OverrideTarget};
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 64;

/// Event broadcast after overrides of a target changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionsChanged {
    /// Target whose overrides were written.
    pub target: OverrideTarget,
}

impl PermissionsChanged {
    /// Returns whether views resolved for `actor` are now stale.
    #[must_use]
    pub fn affects(&self, actor: &Actor) -> bool {
        match &self.target {
            OverrideTarget::Role(role) => *role == actor.role(),
            OverrideTarget::User(user) => actor.user() == Some(user),
        }
    }
}

/// Explicit refresh signal for every live view of resolved permissions.
///
/// Views subscribe and re-resolve when an event affecting their actor arrives.
#[derive(Debug, Clone)]
pub struct PermissionInvalidation {
    sender: broadcast::Sender<PermissionsChanged>,
}

impl PermissionInvalidation {
    /// Creates a channel with the default buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a channel buffering up to `capacity` unread events per subscriber.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Registers a new listener.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PermissionsChanged> {
        self.sender.subscribe()
    }

    /// Notifies listeners that `target` changed. Returns the number reached.
    pub fn notify(&self, target: OverrideTarget) -> usize {
        match self.sender.send(PermissionsChanged { target }) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::debug!("permission change published without listeners");
                0
            }
        }
    }
}

impl Default for PermissionInvalidation {
    fn default() -> Self {
        Self::new()
    }
}
