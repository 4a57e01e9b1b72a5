//! Business logic services layer

pub mod permission_service;

pub use permission_service::{PermissionAuthority, PermissionResolver};
