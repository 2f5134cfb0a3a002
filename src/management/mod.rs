mod lifecycle;
mod resolver;
mod store;

pub use lifecycle::TokenLifecycleManager;
pub use resolver::CredentialResolver;
pub use resolver::CredentialSource;
pub use resolver::resolve;
pub use store::CredentialStore;
