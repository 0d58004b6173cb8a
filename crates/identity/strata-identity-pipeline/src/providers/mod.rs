//! Providers shipped with the server.

pub mod anonymous;
pub mod oauth2;
