//! Stowage API Library
//!
//! This crate provides the HTTP thumbnail service: handlers, error mapping and
//! application setup.

mod api_doc;
mod handlers;
mod telemetry;

pub mod error;
pub mod setup;
pub mod state;

pub use error::ErrorResponse;
