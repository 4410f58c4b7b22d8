//! Hosted backend client (managed auth at `/auth/v1`, REST gateway at `/rest/v1`)

mod client;
mod types;

pub use client::{BackendClient, RestQuery};
pub use types::parse_content_range_total;
