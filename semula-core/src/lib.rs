//! Semula Core - budget revision backend
//!
//! Compares original ("semula") and revised ("menjadi") budget lines,
//! decides what each caller may edit, approve, import or export under the
//! current classification filter, and keeps a client-side identity state
//! machine in sync with the hosted auth service.

pub mod api;
pub mod backend;
pub mod config;
pub mod domain;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod openapi;
pub mod policy;
pub mod repository;
pub mod server;
pub mod service;
pub mod session;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, Result};
