//! # Flock Shared Library
//!
//! Shared types, data access and business rules used by the Flock API server
//! and the SQL migration runner.
//!
//! ## Module Organization
//!
//! - `auth`: Authentication, access resolution and permission checks
//! - `db`: Connection pooling and schema migrations
//! - `models`: Database models and their queries
//! - `workflows`: Multi-row mutations (bulk transfers, attendance confirmation)
//! - `reporting`: Dashboard aggregates, calendar feed and ad-hoc member reports

pub mod auth;
pub mod db;
pub mod models;
pub mod reporting;
pub mod workflows;

/// Current version of the Flock shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
