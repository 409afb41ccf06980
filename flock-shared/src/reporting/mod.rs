/// Read-only aggregate views
///
/// - [`dashboard`]: scope-filtered counters and weekly attendance
/// - [`calendar`]: events in a date range
/// - [`member_report`]: ad-hoc member listings with caller-chosen columns

pub mod calendar;
pub mod dashboard;
pub mod member_report;
