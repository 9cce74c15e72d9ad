//! Gamepad configuration storage: the normalizer that turns a flat storage
//! snapshot into [`models::AllConfigs`], the legacy schema upgrade, and typed
//! read/write operations over the tiered store.

pub mod normalize;
pub mod store;
pub mod upgrade;

pub use normalize::{normalize, to_snapshot};
pub use store::ConfigStore;
