//! `mesa-api` — HTTP boundary for the authorization core.
//!
//! Thin by design: token middleware, permission guards, error→status
//! mapping, and handlers that delegate to `mesa-store`'s `AccountService`.

pub mod app;
pub mod authz;
pub mod config;
pub mod errors;
pub mod middleware;
