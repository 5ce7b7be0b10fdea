//! `tenantguard-core`: shared identity primitives.
//!
//! This crate contains **pure** building blocks (no infrastructure concerns).

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{RecordId, RoleId, TenantId, UserId};
