pub mod auth;
pub mod session;
pub mod spotify;
