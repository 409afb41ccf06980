/// API route handlers
///
/// Organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Login, token refresh and the caller's own access context
/// - `regions`: Fields and districts
/// - `churches`, `members`, `visitors`, `events`, `attendance`, `transfers`,
///   `missionary_reports`, `users`: record management
/// - `dashboard`: Dashboard counters and the calendar feed
/// - `reports`: Ad-hoc member reports
///
/// Every protected handler takes the caller's `AccessContext` from request
/// extensions and passes its scope down to the query it runs.

pub mod attendance;
pub mod auth;
pub mod churches;
pub mod dashboard;
pub mod events;
pub mod health;
pub mod members;
pub mod missionary_reports;
pub mod regions;
pub mod reports;
pub mod transfers;
pub mod users;
pub mod visitors;

use serde::Deserialize;

/// Body of a bulk endpoint
#[derive(Debug, Deserialize)]
pub struct BulkBody<T> {
    pub rows: Vec<T>,
}
