/// Transfer requests and their review
///
/// Requests are made from the member's side: the member must be in the
/// caller's scope, and its current church becomes the source. Review is done
/// from the receiving side: the reviewer must have the destination church in
/// scope.
///
/// Any church may be a destination, in scope or not. An unknown destination
/// and the member's own church are both refused with the same message.

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use super::{check_batch_size, conflict_on, outcome, BulkReport, WorkflowError};
use crate::auth::access::AccessContext;
use crate::auth::authorization::{found, require, AuthzError};
use crate::models::church::Church;
use crate::models::member::Member;
use crate::models::transfer::{CreateTransfer, ReviewOutcome, TransferRequest};

const PENDING_INDEX: &str = "idx_transfer_one_pending";
const INVALID_DESTINATION: &str = "Invalid destination church";

/// Approve or reject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

/// Checks a request against current data and returns the source church
fn check_request(member: &Member, to_church_id: Uuid) -> Result<Uuid, WorkflowError> {
    if member.church_id == to_church_id {
        return Err(WorkflowError::Invalid(INVALID_DESTINATION.to_string()));
    }
    Ok(member.church_id)
}

/// Requests a transfer for one member
pub async fn request_transfer(
    pool: &PgPool,
    ctx: &AccessContext,
    data: CreateTransfer,
) -> Result<TransferRequest, WorkflowError> {
    require(ctx.role.can_request_transfers(), "request transfers")?;
    create_checked(pool, ctx, data).await
}

async fn create_checked(
    pool: &PgPool,
    ctx: &AccessContext,
    data: CreateTransfer,
) -> Result<TransferRequest, WorkflowError> {
    data.validate()?;

    let member = found(
        Member::find_in_scope(pool, data.member_id, &ctx.scope).await?,
        "Member",
    )?;
    let from_church_id = check_request(&member, data.to_church_id)?;

    if Church::find_by_id(pool, data.to_church_id).await?.is_none() {
        return Err(WorkflowError::Invalid(INVALID_DESTINATION.to_string()));
    }

    let transfer = TransferRequest::create(pool, member.id, from_church_id, data, ctx.user_id)
        .await
        .map_err(|e| conflict_on(e, PENDING_INDEX, "Member already has a pending transfer"))?;

    tracing::info!(
        transfer_id = %transfer.id,
        member_id = %transfer.member_id,
        from = %transfer.from_church_id,
        to = %transfer.to_church_id,
        requested_by = %ctx.user_id,
        "Transfer requested"
    );

    Ok(transfer)
}

/// Requests transfers for many members
///
/// The role check applies to the whole batch; everything else is checked per
/// row.
pub async fn bulk_request_transfers(
    pool: &PgPool,
    ctx: &AccessContext,
    rows: Vec<CreateTransfer>,
) -> Result<BulkReport, WorkflowError> {
    require(ctx.role.can_request_transfers(), "request transfers")?;
    check_batch_size(rows.len())?;

    let mut outcomes = Vec::with_capacity(rows.len());
    for (index, row) in rows.into_iter().enumerate() {
        let result = create_checked(pool, ctx, row).await;
        outcomes.push(outcome(index, result, |transfer| transfer.id));
    }

    let report = BulkReport::from_rows(outcomes);
    tracing::info!(
        succeeded = report.succeeded,
        failed = report.failed,
        requested_by = %ctx.user_id,
        "Bulk transfer request processed"
    );
    Ok(report)
}

/// Approves or rejects a pending request
///
/// Approval moves the member to the destination church in the same
/// transaction. A request that is no longer pending is a conflict.
pub async fn review_transfer(
    pool: &PgPool,
    ctx: &AccessContext,
    id: Uuid,
    decision: ReviewDecision,
    notes: Option<String>,
) -> Result<TransferRequest, WorkflowError> {
    require(ctx.role.can_review_transfers(), "review transfers")?;

    let transfer = found(
        TransferRequest::find_in_scope(pool, id, &ctx.scope).await?,
        "Transfer",
    )?;
    require(
        ctx.can_access_church(transfer.to_church_id),
        "review transfers into churches outside your scope",
    )?;

    let result = match decision {
        ReviewDecision::Approve => TransferRequest::approve(pool, id, ctx.user_id, notes).await?,
        ReviewDecision::Reject => TransferRequest::reject(pool, id, ctx.user_id, notes).await?,
    };

    match result {
        ReviewOutcome::Reviewed(reviewed) => {
            tracing::info!(
                transfer_id = %reviewed.id,
                member_id = %reviewed.member_id,
                status = %reviewed.status,
                reviewed_by = %ctx.user_id,
                "Transfer reviewed"
            );
            Ok(reviewed)
        }
        ReviewOutcome::AlreadyReviewed(status) => Err(WorkflowError::Conflict(format!(
            "Transfer was already {}",
            status
        ))),
        ReviewOutcome::NotFound => Err(AuthzError::NotFound("Transfer").into()),
    }
}
