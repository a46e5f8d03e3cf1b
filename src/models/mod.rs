//! Domain models

pub mod account;
pub mod auth;

pub use account::{Account, AccountResponse, NewAccount, Role};
pub use auth::{
    ApiResponse, AuthOutcome, AuthStatusResponse, LoginRequest, ProfileImage, RegisterForm,
    Registration,
};
