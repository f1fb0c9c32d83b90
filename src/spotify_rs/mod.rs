//! Minimal Spotify accounts and Web API client built on reqwest.
//!
//! Docs:
//! https://developer.spotify.com/documentation/web-api

pub mod auth;
pub mod client;
pub mod types;
