//! Pod recycler service layer
//!
//! Reads process settings, installs logging and runs one recycle operation
//! per invocation against freshly resolved cluster access.

pub mod operation;
pub mod settings;
pub mod telemetry;

pub use operation::{RecycleError, RecycleService};
pub use settings::{RecyclerSettings, SettingsError};
pub use telemetry::LogFormat;
