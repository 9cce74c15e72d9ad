pub mod bridge;
pub mod errors;
pub mod routes;
pub mod startup;

pub use startup::{app, run};
