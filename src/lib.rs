//! Statuswatch polls a set of status pages, classifies each into a discrete
//! operational state and notifies the configured channels whenever a page's
//! state changes between two consecutive successful checks.

pub mod config;
pub mod error;
pub mod fetch;
pub mod notify;
pub mod state;
pub mod status;
pub mod worker;

pub use config::{CheckMode, Config, Target};
pub use error::Error;
pub use state::{LastStatus, StateStore, StatusChange};
pub use status::Status;
