//! The `utils` module provides shared definitions used across `boarlink`:
//! the error taxonomy and the tracing setup.

pub mod error;
pub mod logging;
