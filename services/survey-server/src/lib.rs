//! HTTP front of the survey: dataset loading at startup, per-client identity
//! and the `/api` routes.

pub mod app;
pub mod config;
pub mod error;
pub mod identity;
pub mod loader;
pub mod routes_dataset;
pub mod routes_ratings;
pub mod routes_samples;
pub mod state;
pub mod store_exec;

pub use app::build_router;
pub use config::{AppConfig, IdentitySource};
pub use state::{AppState, SharedState};
