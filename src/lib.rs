//! 车队调度控制台的会话与权限层
//! 会话持久化、生命周期、登出协调、权限解析与路由守卫

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod services;
pub mod session;
pub mod telemetry;
