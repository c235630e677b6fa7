//! Identity state and change notification.
//!
//! The rest of the crate never polls an auth provider. A shell
//! (desktop app, web session layer) feeds identity changes into the
//! [`IdentityHub`] and interested parties subscribe.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::types::UserId;

/// Current authentication state of the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Identity {
    Anonymous,
    Authenticated(UserId),
}

impl Identity {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::Authenticated(_))
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Identity::Authenticated(id) => Some(*id),
            Identity::Anonymous => None,
        }
    }
}

/// Publishes the current identity and notifies subscribers on change.
/// Setting the same identity twice is a no-op for subscribers.
pub struct IdentityHub {
    tx: watch::Sender<Identity>,
}

impl IdentityHub {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Identity::Anonymous);
        Self { tx }
    }

    pub fn set(&self, identity: Identity) {
        let authenticated = identity.is_authenticated();
        let changed = self.tx.send_if_modified(|current| {
            if *current != identity {
                *current = identity.clone();
                true
            } else {
                false
            }
        });
        if changed {
            tracing::info!(authenticated, "identity changed");
        }
    }

    pub fn current(&self) -> Identity {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Identity> {
        self.tx.subscribe()
    }
}

impl Default for IdentityHub {
    fn default() -> Self {
        Self::new()
    }
}
