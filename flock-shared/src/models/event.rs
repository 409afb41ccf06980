/// Event model and database operations
///
/// Events target one level of the hierarchy. A national event has no target
/// id; a field, district or church event carries exactly the matching id. The
/// table enforces this with `events_scope_target`, and [`CreateEvent`]
/// rejects mismatches before they reach the database.
///
/// Visibility: national events are visible to every caller; the others are
/// visible when their target contains at least one church of the caller's
/// scope.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::nullable;
use super::pagination::{Page, PageParams};
use super::text_enum;
use crate::auth::scope::ChurchScope;

text_enum! {
    /// Hierarchy level an event targets
    pub enum EventScope {
        National => "national",
        Field => "field",
        District => "district",
        Church => "church",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[sqlx(try_from = "String")]
    pub scope: EventScope,
    pub field_id: Option<Uuid>,
    pub district_id: Option<Uuid>,
    pub church_id: Option<Uuid>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub location: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Whether the target ids set on an event match its scope
pub fn target_matches_scope(
    scope: EventScope,
    field_id: Option<Uuid>,
    district_id: Option<Uuid>,
    church_id: Option<Uuid>,
) -> bool {
    match scope {
        EventScope::National => field_id.is_none() && district_id.is_none() && church_id.is_none(),
        EventScope::Field => field_id.is_some() && district_id.is_none() && church_id.is_none(),
        EventScope::District => field_id.is_none() && district_id.is_some() && church_id.is_none(),
        EventScope::Church => field_id.is_none() && district_id.is_none() && church_id.is_some(),
    }
}

fn validate_create_event(event: &CreateEvent) -> Result<(), ValidationError> {
    if event.end_date < event.start_date {
        return Err(ValidationError::new("date_order")
            .with_message("End date cannot be before start date".into()));
    }
    if !target_matches_scope(event.scope, event.field_id, event.district_id, event.church_id) {
        return Err(ValidationError::new("scope_target")
            .with_message("Target id must match the event scope".into()));
    }
    Ok(())
}

fn validate_update_event(event: &UpdateEvent) -> Result<(), ValidationError> {
    if let (Some(start), Some(end)) = (event.start_date, event.end_date) {
        if end < start {
            return Err(ValidationError::new("date_order")
                .with_message("End date cannot be before start date".into()));
        }
    }
    if too_long(&event.description, 2000) {
        return Err(ValidationError::new("length")
            .with_message("Description must be at most 2000 characters".into()));
    }
    if too_long(&event.location, 300) {
        return Err(ValidationError::new("length")
            .with_message("Location must be at most 300 characters".into()));
    }
    Ok(())
}

fn too_long(patch: &Option<Option<String>>, max: usize) -> bool {
    matches!(patch, Some(Some(text)) if text.chars().count() > max)
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_create_event"))]
pub struct CreateEvent {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    pub scope: EventScope,

    pub field_id: Option<Uuid>,

    pub district_id: Option<Uuid>,

    pub church_id: Option<Uuid>,

    pub start_date: NaiveDate,

    pub end_date: NaiveDate,

    #[validate(length(max = 300, message = "Location must be at most 300 characters"))]
    pub location: Option<String>,
}

/// Event edit form
///
/// Scope and target are fixed once an event exists; recreate the event to
/// move it to another level. An explicit `null` clears the description or
/// location.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[validate(schema(function = "validate_update_event"))]
pub struct UpdateEvent {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,

    pub start_date: Option<NaiveDate>,

    pub end_date: Option<NaiveDate>,

    #[serde(default, deserialize_with = "nullable")]
    pub location: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilter {
    pub scope: Option<EventScope>,

    /// Events ending on or after this date
    pub from: Option<NaiveDate>,

    /// Events starting on or before this date
    pub to: Option<NaiveDate>,
}

/// Appends the visibility rule for `scope` to an open WHERE clause over `events e`
pub(crate) fn push_visibility(builder: &mut QueryBuilder<'_, Postgres>, scope: &ChurchScope) {
    let Some(ids) = scope.church_ids() else {
        return;
    };

    if ids.is_empty() {
        builder.push(" AND e.scope = 'national'");
        return;
    }

    builder.push(" AND (e.scope = 'national' OR e.church_id = ANY(");
    builder.push_bind(ids.clone());
    builder.push(") OR e.district_id IN (SELECT district_id FROM churches WHERE id = ANY(");
    builder.push_bind(ids.clone());
    builder.push(")) OR e.field_id IN (SELECT field_id FROM churches WHERE id = ANY(");
    builder.push_bind(ids);
    builder.push(")))");
}

impl EventFilter {
    fn push(&self, builder: &mut QueryBuilder<'_, Postgres>, scope: &ChurchScope) {
        push_visibility(builder, scope);

        if let Some(event_scope) = self.scope {
            builder.push(" AND e.scope = ");
            builder.push_bind(event_scope.as_str());
        }
        if let Some(from) = self.from {
            builder.push(" AND e.end_date >= ");
            builder.push_bind(from);
        }
        if let Some(to) = self.to {
            builder.push(" AND e.start_date <= ");
            builder.push_bind(to);
        }
    }
}

const EVENT_COLUMNS: &str = "e.id, e.title, e.description, e.scope, e.field_id, e.district_id, \
                             e.church_id, e.start_date, e.end_date, e.location, e.created_by, \
                             e.created_at, e.updated_at";

impl Event {
    pub async fn create(
        pool: &PgPool,
        data: CreateEvent,
        created_by: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Event>(
            "INSERT INTO events (title, description, scope, field_id, district_id, church_id,
                                 start_date, end_date, location, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING id, title, description, scope, field_id, district_id, church_id,
                       start_date, end_date, location, created_by, created_at, updated_at",
        )
        .bind(data.title)
        .bind(data.description)
        .bind(data.scope.as_str())
        .bind(data.field_id)
        .bind(data.district_id)
        .bind(data.church_id)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(data.location)
        .bind(created_by)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Event>(&format!("SELECT {EVENT_COLUMNS} FROM events e WHERE e.id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds an event only if it is visible to `scope`
    pub async fn find_visible(
        pool: &PgPool,
        id: Uuid,
        scope: &ChurchScope,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {EVENT_COLUMNS} FROM events e WHERE e.id = "
        ));
        query.push_bind(id);
        push_visibility(&mut query, scope);

        query.build_query_as::<Event>().fetch_optional(pool).await
    }

    pub async fn list(
        pool: &PgPool,
        scope: &ChurchScope,
        filter: &EventFilter,
        page: PageParams,
    ) -> Result<Page<Self>, sqlx::Error> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {EVENT_COLUMNS} FROM events e WHERE TRUE"
        ));
        filter.push(&mut query, scope);
        query.push(" ORDER BY e.start_date, e.title LIMIT ");
        query.push_bind(page.limit);
        query.push(" OFFSET ");
        query.push_bind(page.offset);

        let events = query.build_query_as::<Event>().fetch_all(pool).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM events e WHERE TRUE");
        filter.push(&mut count, scope);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        Ok(Page::new(events, total, page))
    }

    /// Every visible event overlapping `[start, end]`, unpaged
    pub async fn list_overlapping(
        pool: &PgPool,
        scope: &ChurchScope,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let filter = EventFilter {
            scope: None,
            from: Some(start),
            to: Some(end),
        };

        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {EVENT_COLUMNS} FROM events e WHERE TRUE"
        ));
        filter.push(&mut query, scope);
        query.push(" ORDER BY e.start_date, e.title");

        query.build_query_as::<Event>().fetch_all(pool).await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateEvent,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Event>(
            "UPDATE events SET
                 title = COALESCE($2, title),
                 description = CASE WHEN $7 THEN $3 ELSE description END,
                 start_date = COALESCE($4, start_date),
                 end_date = COALESCE($5, end_date),
                 location = CASE WHEN $8 THEN $6 ELSE location END,
                 updated_at = NOW()
             WHERE id = $1
             RETURNING id, title, description, scope, field_id, district_id, church_id,
                       start_date, end_date, location, created_by, created_at, updated_at",
        )
        .bind(id)
        .bind(data.title)
        .bind(data.description.clone().flatten())
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(data.location.clone().flatten())
        .bind(data.description.is_some())
        .bind(data.location.is_some())
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn church_event() -> CreateEvent {
        CreateEvent {
            title: "Harvest thanksgiving".to_string(),
            description: None,
            scope: EventScope::Church,
            field_id: None,
            district_id: None,
            church_id: Some(Uuid::new_v4()),
            start_date: date(2025, 10, 4),
            end_date: date(2025, 10, 4),
            location: None,
        }
    }

    #[test]
    fn test_target_matches_scope() {
        let id = Some(Uuid::new_v4());
        assert!(target_matches_scope(EventScope::National, None, None, None));
        assert!(!target_matches_scope(EventScope::National, id, None, None));
        assert!(target_matches_scope(EventScope::Field, id, None, None));
        assert!(!target_matches_scope(EventScope::Field, None, id, None));
        assert!(target_matches_scope(EventScope::District, None, id, None));
        assert!(target_matches_scope(EventScope::Church, None, None, id));
        assert!(!target_matches_scope(EventScope::Church, id, None, id));
    }

    #[test]
    fn test_create_event_validation() {
        assert!(church_event().validate().is_ok());

        let mut reversed = church_event();
        reversed.end_date = date(2025, 10, 3);
        assert!(reversed.validate().is_err());

        let mut untargeted = church_event();
        untargeted.church_id = None;
        assert!(untargeted.validate().is_err());
    }

    #[test]
    fn test_update_event_date_order() {
        let update = UpdateEvent {
            start_date: Some(date(2025, 1, 10)),
            end_date: Some(date(2025, 1, 9)),
            ..Default::default()
        };
        assert!(update.validate().is_err());

        let only_end = UpdateEvent {
            end_date: Some(date(2025, 1, 9)),
            ..Default::default()
        };
        assert!(only_end.validate().is_ok());
    }

    #[test]
    fn test_update_event_clears_or_keeps_optional_text() {
        let clear: UpdateEvent = serde_json::from_str(r#"{"location":null}"#).unwrap();
        assert_eq!(clear.location, Some(None));
        assert_eq!(clear.description, None);

        let long: UpdateEvent =
            serde_json::from_str(&format!(r#"{{"location":"{}"}}"#, "x".repeat(301))).unwrap();
        assert!(long.validate().is_err());
    }

    #[test]
    fn test_visibility_for_unrestricted_scope() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM events e WHERE TRUE");
        push_visibility(&mut builder, &ChurchScope::All);
        assert_eq!(builder.sql(), "SELECT 1 FROM events e WHERE TRUE");
    }

    #[test]
    fn test_empty_scope_sees_only_national_events() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM events e WHERE TRUE");
        push_visibility(&mut builder, &ChurchScope::none());
        assert_eq!(
            builder.sql(),
            "SELECT 1 FROM events e WHERE TRUE AND e.scope = 'national'"
        );
    }

    #[test]
    fn test_scoped_visibility_checks_every_level() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM events e WHERE TRUE");
        push_visibility(&mut builder, &ChurchScope::from_ids([Uuid::new_v4()]));
        let sql = builder.sql();
        assert!(sql.contains("e.scope = 'national'"));
        assert!(sql.contains("e.church_id = ANY($1)"));
        assert!(sql.contains("e.district_id IN (SELECT district_id FROM churches WHERE id = ANY($2))"));
        assert!(sql.contains("e.field_id IN (SELECT field_id FROM churches WHERE id = ANY($3))"));
    }

    #[test]
    fn test_filter_date_overlap() {
        let filter = EventFilter {
            scope: Some(EventScope::District),
            from: Some(date(2025, 3, 1)),
            to: Some(date(2025, 3, 31)),
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM events e WHERE TRUE");
        filter.push(&mut builder, &ChurchScope::All);
        assert_eq!(
            builder.sql(),
            "SELECT 1 FROM events e WHERE TRUE AND e.scope = $1 AND e.end_date >= $2 AND e.start_date <= $3"
        );
    }
}
