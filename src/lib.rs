#![doc = "The `taskdeck` library crate."]
#![doc = ""]
#![doc = "Domain models, authentication, persistence and routing for the taskdeck task API."]
#![doc = "The binary (`main.rs`) wires these into an `HttpServer`; the integration tests"]
#![doc = "build the same app around an in-memory store."]

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;
pub mod validation;

pub use crate::error::AppError;
pub use crate::state::AppState;
