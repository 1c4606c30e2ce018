pub mod session_provider;
pub mod session_traits;

pub use session_provider::LocalSessionProvider;
pub use session_traits::SessionProviderTrait;
