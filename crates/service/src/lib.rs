//! Background service of the gamepad remapper.
//! - Tiered persisted storage with a local fallback tier.
//! - Normalization of stored settings into the structured config view.
//! - Trial/payment entitlement and usage analytics.
//! - Message routing for page scripts, keyboard commands and popup actions.

pub mod actions;
pub mod analytics;
pub mod bridge;
pub mod config;
pub mod errors;
pub mod observability;
pub mod payment;
pub mod router;
pub mod runtime;
pub mod storage;
pub mod test_support;
pub mod trial;

pub use errors::ServiceError;
pub use runtime::Background;
