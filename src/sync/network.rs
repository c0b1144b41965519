//! Network reachability signal.

use std::sync::Arc;
use tokio::sync::watch;

/// Shared online/offline flag toggled by the host environment.
/// Starts online.
#[derive(Clone)]
pub struct NetworkStatus {
    online: Arc<watch::Sender<bool>>,
}

impl Default for NetworkStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkStatus {
    pub fn new() -> Self {
        let (online, _) = watch::channel(true);
        Self {
            online: Arc::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.send_if_modified(|current| {
            let changed = *current != online;
            *current = online;
            changed
        });
    }

    pub fn is_offline(&self) -> bool {
        !*self.online.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.online.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_online() {
        assert!(!NetworkStatus::new().is_offline());
    }

    #[test]
    fn test_toggle_notifies_only_on_change() {
        let status = NetworkStatus::new();
        let mut rx = status.subscribe();

        status.set_online(true);
        assert!(!rx.has_changed().unwrap());

        status.set_online(false);
        assert!(status.is_offline());
        assert!(rx.has_changed().unwrap());
        assert!(!*rx.borrow_and_update());
    }
}
