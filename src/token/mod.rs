//! Token Management
//!
//! Token decoding, signature verification, and lifecycle management.
//!
//! This module provides:
//!
//! - **Token**: decoded compact token with claim queries
//! - **Signing algorithms**: HS256/384/512 and RS256/384/512 verification
//! - **Token Manager**: resolution and refresh against an authorization server

pub mod algorithm;
pub mod jwt;
pub mod manager;

pub use algorithm::{ClaimExpectations, KeyFamily, SigningAlgorithm, VerificationKey};
pub use jwt::Token;
pub use manager::TokenManager;
