//! BeeConta Library
//!
//! Re-exports modules for integration testing and the binaries.

pub mod api;
pub mod backend;
pub mod config;
pub mod db;
pub mod domain;
pub mod services;
pub mod session;

mod error;

pub use config::Config;
pub use domain::DomainError;
pub use error::{AppError, AppResult};
