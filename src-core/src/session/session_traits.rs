use tokio::sync::watch;

/// Identity service supplying the acting user's opaque id. Authentication
/// itself is an external concern; this trait only exposes who, if anyone,
/// is currently signed in, and a way to observe changes.
pub trait SessionProviderTrait: Send + Sync {
    fn current_identity(&self) -> Option<String>;

    /// Receiver that changes whenever the identity appears, disappears or
    /// switches to a different user.
    fn watch_identity(&self) -> watch::Receiver<Option<String>>;
}
