//! Auth Handlers and Module

pub mod auth;
pub mod auth_me;

pub use auth::{login, logout, register, resend_verification, verify_email, MessageResponse};
pub use auth_me::{list_admins, me, my_profile};
