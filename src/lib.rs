pub mod agent;
pub mod backend;
pub mod config;
pub mod ctx;
pub mod errors;
pub mod secret;
pub mod store;

pub use backend::{BackendRegistry, BackendUrl, Crypto, Rcs, Revision, Storage};
pub use config::Config;
pub use ctx::Context;
pub use errors::{Result, StoreError};
pub use secret::Secret;
pub use store::{Recipients, RootStore, SubStore, Tree};
