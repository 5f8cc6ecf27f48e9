//! Core Components
//!
//! HTTP infrastructure shared by authorization-server clients.

pub mod transport;

pub use transport::*;
