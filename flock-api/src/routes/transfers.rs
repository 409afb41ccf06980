/// Transfer endpoints
///
/// - `GET /v1/transfers` - List transfers touching the caller's scope
/// - `POST /v1/transfers` - Request a transfer for one member
/// - `POST /v1/transfers/bulk` - Request transfers for many members
/// - `GET /v1/transfers/:id` - Get
/// - `POST /v1/transfers/:id/approve` - Approve and move the member
/// - `POST /v1/transfers/:id/reject` - Reject
///
/// Approve and reject take an optional `{ "notes": "..." }` body; an empty
/// body means no notes and a malformed one is rejected with `422`. Reviewing
/// a request that is no longer pending returns `409 Conflict`.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::BulkBody,
};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use flock_shared::{
    auth::{access::AccessContext, authorization::found},
    models::{
        pagination::{Page, PageParams},
        transfer::{CreateTransfer, ReviewTransfer, TransferFilter, TransferRequest},
    },
    workflows::{
        self,
        transfers::ReviewDecision,
        BulkReport,
    },
};
use uuid::Uuid;
use validator::Validate;

pub async fn list_transfers(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Query(page): Query<PageParams>,
    Query(filter): Query<TransferFilter>,
) -> ApiResult<Json<Page<TransferRequest>>> {
    page.validate()?;
    Ok(Json(TransferRequest::list(&state.db, &ctx.scope, &filter, page).await?))
}

pub async fn get_transfer(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TransferRequest>> {
    let transfer = found(
        TransferRequest::find_in_scope(&state.db, id, &ctx.scope).await?,
        "Transfer",
    )?;
    Ok(Json(transfer))
}

pub async fn request_transfer(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Json(data): Json<CreateTransfer>,
) -> ApiResult<(StatusCode, Json<TransferRequest>)> {
    let transfer = workflows::transfers::request_transfer(&state.db, &ctx, data).await?;
    Ok((StatusCode::CREATED, Json(transfer)))
}

pub async fn bulk_request_transfers(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Json(body): Json<BulkBody<CreateTransfer>>,
) -> ApiResult<Json<BulkReport>> {
    let report = workflows::transfers::bulk_request_transfers(&state.db, &ctx, body.rows).await?;
    Ok(Json(report))
}

/// Parses an optional review body
fn review_body(body: &Bytes) -> ApiResult<ReviewTransfer> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ReviewTransfer::default());
    }

    let review: ReviewTransfer = serde_json::from_slice(body)
        .map_err(|e| ApiError::invalid_field("body", format!("Invalid review body: {}", e)))?;
    review.validate()?;
    Ok(review)
}

async fn review(
    state: AppState,
    ctx: AccessContext,
    id: Uuid,
    decision: ReviewDecision,
    body: Bytes,
) -> ApiResult<Json<TransferRequest>> {
    let review = review_body(&body)?;

    let transfer =
        workflows::transfers::review_transfer(&state.db, &ctx, id, decision, review.notes).await?;
    Ok(Json(transfer))
}

pub async fn approve_transfer(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> ApiResult<Json<TransferRequest>> {
    review(state, ctx, id, ReviewDecision::Approve, body).await
}

pub async fn reject_transfer(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> ApiResult<Json<TransferRequest>> {
    review(state, ctx, id, ReviewDecision::Reject, body).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_review_body_means_no_notes() {
        assert!(review_body(&Bytes::new()).unwrap().notes.is_none());
        assert!(review_body(&Bytes::from_static(b" \n")).unwrap().notes.is_none());
    }

    #[test]
    fn test_review_body_with_notes() {
        let review = review_body(&Bytes::from_static(br#"{"notes":"Welcome"}"#)).unwrap();
        assert_eq!(review.notes.as_deref(), Some("Welcome"));
    }

    #[test]
    fn test_malformed_review_body_rejected() {
        assert!(matches!(
            review_body(&Bytes::from_static(b"{\"notes\": 42")),
            Err(ApiError::ValidationError(_))
        ));
        let long = format!(r#"{{"notes":"{}"}}"#, "x".repeat(2001));
        assert!(matches!(
            review_body(&Bytes::from(long)),
            Err(ApiError::ValidationError(_))
        ));
    }
}
