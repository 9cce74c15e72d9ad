//! Domain types shared by the background service and its transports.
//! - Gamepad configurations and the built-in default mapping.
//! - Global preferences, payment records and derived trial state.
//! - The runtime message protocol spoken with page scripts and the popup.

pub mod errors;
pub mod gamepad;
pub mod prefs;
pub mod payment;
pub mod session;
pub mod all_configs;
pub mod messages;

pub use all_configs::AllConfigs;
pub use gamepad::{GamepadConfig, DEFAULT_CONFIG_NAME};
pub use payment::{PaymentRecord, TrialState};
pub use prefs::GlobalPrefs;
