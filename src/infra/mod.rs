//! Infrastructure adapters and runtime bootstrap.

pub mod catalog_file;
pub mod error;
pub mod http;
pub mod runtime;
pub mod telemetry;
pub mod translations;
