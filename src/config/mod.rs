//! Configuration data model
//!
//! - **profile**: hardware behavior profiles and their canonical defaults
//! - **settings**: global settings and the state-to-profile map
//! - **paths**: file locations and the per-user front-end config

pub mod paths;
pub mod profile;
pub mod settings;

// Re-export commonly used types
pub use paths::{FrontendConfig, Paths};
pub use profile::{FanCurvePoint, Profile};
pub use settings::Settings;
