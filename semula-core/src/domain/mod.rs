//! Domain models for Semula Core

pub mod budget;
pub mod filter;
pub mod profile;
pub mod role;
pub mod session;

pub use budget::*;
pub use filter::*;
pub use profile::*;
pub use role::*;
pub use session::*;
