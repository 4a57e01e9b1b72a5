//! Database repository layer

pub mod auth_repo;
pub mod permission_repo;
pub mod user_repo;

pub use auth_repo::AuthRepository;
pub use permission_repo::PermissionRepository;
pub use user_repo::UserRepository;
