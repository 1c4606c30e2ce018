use log::debug;
use tokio::sync::watch;

use crate::session::session_traits::SessionProviderTrait;

/// Watch-channel-backed session provider for embeddings that manage their
/// own sign-in flow, and for tests. One explicit object, no ambient
/// global session state.
pub struct LocalSessionProvider {
    identity: watch::Sender<Option<String>>,
}

impl LocalSessionProvider {
    pub fn new() -> Self {
        LocalSessionProvider {
            identity: watch::channel(None).0,
        }
    }

    pub fn signed_in(user_id: impl Into<String>) -> Self {
        LocalSessionProvider {
            identity: watch::channel(Some(user_id.into())).0,
        }
    }

    pub fn sign_in(&self, user_id: impl Into<String>) {
        let user_id = user_id.into();
        debug!("session started for {}", user_id);
        self.identity.send_replace(Some(user_id));
    }

    pub fn sign_out(&self) {
        debug!("session ended");
        self.identity.send_replace(None);
    }
}

impl Default for LocalSessionProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionProviderTrait for LocalSessionProvider {
    fn current_identity(&self) -> Option<String> {
        self.identity.borrow().clone()
    }

    fn watch_identity(&self) -> watch::Receiver<Option<String>> {
        self.identity.subscribe()
    }
}
