//! OAuth2 Types
//!
//! Configuration, wire and storage types shared across the crate.

pub mod config;
pub mod owner;
pub mod token;

pub use config::*;
pub use owner::*;
pub use token::*;
