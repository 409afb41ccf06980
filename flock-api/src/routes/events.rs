/// Event endpoints
///
/// - `GET /v1/events` - Visible events (scope filter, date range)
/// - `POST /v1/events` - Create
/// - `GET /v1/events/:id` - Get a visible event
/// - `PUT /v1/events/:id` - Update title, description, dates, location
/// - `DELETE /v1/events/:id` - Delete
///
/// Writes require the caller's role to manage the event's level and the
/// target to lie inside the caller's area.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use flock_shared::{
    auth::{
        access::AccessContext,
        authorization::{found, require_event_target},
    },
    models::{
        event::{CreateEvent, Event, EventFilter, UpdateEvent},
        pagination::{Page, PageParams},
    },
};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

/// Finds a visible event and checks the caller may manage it
async fn manageable_event(pool: &PgPool, ctx: &AccessContext, id: Uuid) -> ApiResult<Event> {
    let event = found(Event::find_visible(pool, id, &ctx.scope).await?, "Event")?;
    require_event_target(
        pool,
        ctx,
        event.scope,
        event.field_id,
        event.district_id,
        event.church_id,
    )
    .await?;
    Ok(event)
}

/// Dates an update would leave on the event
fn merged_dates(event: &Event, data: &UpdateEvent) -> (NaiveDate, NaiveDate) {
    (
        data.start_date.unwrap_or(event.start_date),
        data.end_date.unwrap_or(event.end_date),
    )
}

pub async fn list_events(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Query(page): Query<PageParams>,
    Query(filter): Query<EventFilter>,
) -> ApiResult<Json<Page<Event>>> {
    page.validate()?;
    Ok(Json(Event::list(&state.db, &ctx.scope, &filter, page).await?))
}

pub async fn get_event(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Event>> {
    let event = found(Event::find_visible(&state.db, id, &ctx.scope).await?, "Event")?;
    Ok(Json(event))
}

pub async fn create_event(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Json(data): Json<CreateEvent>,
) -> ApiResult<(StatusCode, Json<Event>)> {
    data.validate()?;
    require_event_target(
        &state.db,
        &ctx,
        data.scope,
        data.field_id,
        data.district_id,
        data.church_id,
    )
    .await?;

    let event = Event::create(&state.db, data, ctx.user_id).await?;
    tracing::info!(event_id = %event.id, scope = %event.scope, created_by = %ctx.user_id, "Event created");
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn update_event(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path(id): Path<Uuid>,
    Json(data): Json<UpdateEvent>,
) -> ApiResult<Json<Event>> {
    data.validate()?;
    let event = manageable_event(&state.db, &ctx, id).await?;

    let (start, end) = merged_dates(&event, &data);
    if end < start {
        return Err(ApiError::invalid_field("end_date", "End date cannot be before start date"));
    }

    let event = found(Event::update(&state.db, id, data).await?, "Event")?;
    Ok(Json(event))
}

pub async fn delete_event(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    manageable_event(&state.db, &ctx, id).await?;

    if !Event::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("Event not found".to_string()));
    }

    tracing::info!(event_id = %id, deleted_by = %ctx.user_id, "Event deleted");
    Ok(StatusCode::NO_CONTENT)
}
