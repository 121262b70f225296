//! Shared online/offline flag.
//!
//! Every API call checks it before touching the network, and the sync
//! loop consults it to decide whether a failed batch means "stop for now".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

/// Cheap to clone; all clones observe the same flag.
#[derive(Debug, Clone)]
pub struct Connectivity {
    online: Arc<AtomicBool>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(online)),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn is_offline(&self) -> bool {
        !self.is_online()
    }

    /// Update the flag. Returns true when this call changed it.
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous != online {
            info!(online, "Connectivity changed");
        }
        previous != online
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}
