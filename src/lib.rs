//! 账户认证服务库
//! 注册、登录、会话与刷新令牌生命周期

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod services;
pub mod storage;
pub mod telemetry;
pub mod validation;
