//! Backend API endpoints.

pub mod runs;

pub use runs::{RunHandle, RunsApi, CREATE_RUN_PATH};
