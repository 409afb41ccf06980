/// Calendar feed
///
/// Returns the events overlapping a date range that the caller may see.
/// National events are always included; field, district and church events
/// only when they touch a church in scope.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::auth::scope::ChurchScope;
use crate::models::event::{Event, EventScope};

/// Longest range a single calendar request may span, in days
pub const MAX_RANGE_DAYS: i64 = 366;

fn validate_range(query: &CalendarQuery) -> Result<(), ValidationError> {
    if query.end < query.start {
        return Err(ValidationError::new("date_order")
            .with_message("end must not be before start".into()));
    }
    if (query.end - query.start).num_days() > MAX_RANGE_DAYS {
        return Err(ValidationError::new("range_too_long")
            .with_message(format!("Range must not exceed {MAX_RANGE_DAYS} days").into()));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Deserialize, Validate)]
#[validate(schema(function = "validate_range"))]
pub struct CalendarQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarItem {
    pub id: Uuid,
    pub title: String,
    pub scope: EventScope,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub location: Option<String>,
    pub field_id: Option<Uuid>,
    pub district_id: Option<Uuid>,
    pub church_id: Option<Uuid>,
}

impl From<Event> for CalendarItem {
    fn from(event: Event) -> Self {
        Self {
            id: event.id,
            title: event.title,
            scope: event.scope,
            start_date: event.start_date,
            end_date: event.end_date,
            location: event.location,
            field_id: event.field_id,
            district_id: event.district_id,
            church_id: event.church_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Calendar {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub items: Vec<CalendarItem>,
}

pub async fn load_calendar(
    pool: &PgPool,
    scope: &ChurchScope,
    query: CalendarQuery,
) -> Result<Calendar, sqlx::Error> {
    let items = Event::list_overlapping(pool, scope, query.start, query.end)
        .await?
        .into_iter()
        .map(CalendarItem::from)
        .collect();

    Ok(Calendar {
        start: query.start,
        end: query.end,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(start: &str, end: &str) -> CalendarQuery {
        CalendarQuery {
            start: start.parse().unwrap(),
            end: end.parse().unwrap(),
        }
    }

    #[test]
    fn test_range_validation() {
        assert!(query("2025-01-01", "2025-01-01").validate().is_ok());
        assert!(query("2025-01-01", "2026-01-02").validate().is_ok());
        assert!(query("2025-01-01", "2026-01-03").validate().is_err());
        assert!(query("2025-02-01", "2025-01-31").validate().is_err());
    }

    #[test]
    fn test_query_parses_iso_dates() {
        let parsed: CalendarQuery =
            serde_json::from_str(r#"{"start":"2025-03-01","end":"2025-03-31"}"#).unwrap();
        assert_eq!(parsed.start, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert!(serde_json::from_str::<CalendarQuery>(r#"{"start":"03/01/2025","end":"2025-03-31"}"#).is_err());
    }
}
