//! # Flock API Server Library
//!
//! HTTP surface of Flock: an axum router over the models, workflows and
//! reports in `flock_shared`.
//!
//! ## Modules
//!
//! - `app`: Application state, router builder and JWT authentication layer
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Response security headers
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
