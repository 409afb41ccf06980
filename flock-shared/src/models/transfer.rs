/// Transfer requests
///
/// A request moves one member from its current church to another church. It
/// starts `pending` and is reviewed exactly once. Approval moves the member
/// inside the same transaction that records the review.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use super::pagination::{Page, PageParams};
use super::text_enum;
use crate::auth::scope::ChurchScope;

text_enum! {
    pub enum TransferStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TransferRequest {
    pub id: Uuid,
    pub member_id: Uuid,
    pub from_church_id: Uuid,
    pub to_church_id: Uuid,
    #[sqlx(try_from = "String")]
    pub status: TransferStatus,
    pub reason: Option<String>,
    pub requested_by: Option<Uuid>,
    pub reviewed_by: Option<Uuid>,
    pub review_notes: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Transfer request form
///
/// The source church is the member's current church and is looked up at
/// request time, not taken from the caller.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTransfer {
    pub member_id: Uuid,

    pub to_church_id: Uuid,

    #[validate(length(max = 2000, message = "Reason must be at most 2000 characters"))]
    pub reason: Option<String>,
}

/// Approve/reject form
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ReviewTransfer {
    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

/// Outcome of a review attempt
#[derive(Debug, Clone)]
pub enum ReviewOutcome {
    Reviewed(TransferRequest),

    /// The request exists but was already approved or rejected
    AlreadyReviewed(TransferStatus),

    NotFound,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransferFilter {
    pub status: Option<TransferStatus>,
    pub member_id: Option<Uuid>,
}

impl TransferFilter {
    /// A transfer is in scope when either end of it is
    fn push(&self, builder: &mut QueryBuilder<'_, Postgres>, scope: &ChurchScope) {
        if let Some(ids) = scope.church_ids() {
            builder.push(" AND (t.from_church_id = ANY(");
            builder.push_bind(ids.clone());
            builder.push(") OR t.to_church_id = ANY(");
            builder.push_bind(ids);
            builder.push("))");
        }
        if let Some(status) = self.status {
            builder.push(" AND t.status = ");
            builder.push_bind(status.as_str());
        }
        if let Some(member_id) = self.member_id {
            builder.push(" AND t.member_id = ");
            builder.push_bind(member_id);
        }
    }
}

const TRANSFER_COLUMNS: &str = "id, member_id, from_church_id, to_church_id, status, reason, \
                                requested_by, reviewed_by, review_notes, reviewed_at, \
                                created_at, updated_at";

impl TransferRequest {
    /// Whether either end of the transfer lies inside `scope`
    pub fn visible_in(&self, scope: &ChurchScope) -> bool {
        scope.contains(self.from_church_id) || scope.contains(self.to_church_id)
    }

    pub async fn create(
        pool: &PgPool,
        member_id: Uuid,
        from_church_id: Uuid,
        data: CreateTransfer,
        requested_by: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, TransferRequest>(&format!(
            "INSERT INTO transfer_requests (member_id, from_church_id, to_church_id, reason, requested_by)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {TRANSFER_COLUMNS}"
        ))
        .bind(member_id)
        .bind(from_church_id)
        .bind(data.to_church_id)
        .bind(data.reason)
        .bind(requested_by)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TransferRequest>(&format!(
            "SELECT {TRANSFER_COLUMNS} FROM transfer_requests WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_in_scope(
        pool: &PgPool,
        id: Uuid,
        scope: &ChurchScope,
    ) -> Result<Option<Self>, sqlx::Error> {
        Ok(Self::find_by_id(pool, id)
            .await?
            .filter(|transfer| transfer.visible_in(scope)))
    }

    pub async fn list(
        pool: &PgPool,
        scope: &ChurchScope,
        filter: &TransferFilter,
        page: PageParams,
    ) -> Result<Page<Self>, sqlx::Error> {
        if scope.is_empty() {
            return Ok(Page::empty(page));
        }

        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {TRANSFER_COLUMNS} FROM transfer_requests t WHERE TRUE"
        ));
        filter.push(&mut query, scope);
        query.push(" ORDER BY t.created_at DESC LIMIT ");
        query.push_bind(page.limit);
        query.push(" OFFSET ");
        query.push_bind(page.offset);

        let transfers = query.build_query_as::<TransferRequest>().fetch_all(pool).await?;

        let mut count =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM transfer_requests t WHERE TRUE");
        filter.push(&mut count, scope);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        Ok(Page::new(transfers, total, page))
    }

    /// Approves a pending request and moves the member, atomically
    pub async fn approve(
        pool: &PgPool,
        id: Uuid,
        reviewer: Uuid,
        notes: Option<String>,
    ) -> Result<ReviewOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let reviewed = sqlx::query_as::<_, TransferRequest>(&format!(
            "UPDATE transfer_requests SET
                 status = 'approved',
                 reviewed_by = $2,
                 review_notes = $3,
                 reviewed_at = NOW(),
                 updated_at = NOW()
             WHERE id = $1 AND status = 'pending'
             RETURNING {TRANSFER_COLUMNS}"
        ))
        .bind(id)
        .bind(reviewer)
        .bind(notes)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(transfer) = reviewed else {
            tx.rollback().await?;
            return Self::classify_unreviewable(pool, id).await;
        };

        sqlx::query("UPDATE members SET church_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(transfer.member_id)
            .bind(transfer.to_church_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(ReviewOutcome::Reviewed(transfer))
    }

    pub async fn reject(
        pool: &PgPool,
        id: Uuid,
        reviewer: Uuid,
        notes: Option<String>,
    ) -> Result<ReviewOutcome, sqlx::Error> {
        let reviewed = sqlx::query_as::<_, TransferRequest>(&format!(
            "UPDATE transfer_requests SET
                 status = 'rejected',
                 reviewed_by = $2,
                 review_notes = $3,
                 reviewed_at = NOW(),
                 updated_at = NOW()
             WHERE id = $1 AND status = 'pending'
             RETURNING {TRANSFER_COLUMNS}"
        ))
        .bind(id)
        .bind(reviewer)
        .bind(notes)
        .fetch_optional(pool)
        .await?;

        match reviewed {
            Some(transfer) => Ok(ReviewOutcome::Reviewed(transfer)),
            None => Self::classify_unreviewable(pool, id).await,
        }
    }

    async fn classify_unreviewable(pool: &PgPool, id: Uuid) -> Result<ReviewOutcome, sqlx::Error> {
        Ok(match Self::find_by_id(pool, id).await? {
            Some(existing) => ReviewOutcome::AlreadyReviewed(existing.status),
            None => ReviewOutcome::NotFound,
        })
    }

    pub async fn count_pending(pool: &PgPool, scope: &ChurchScope) -> Result<i64, sqlx::Error> {
        let filter = TransferFilter {
            status: Some(TransferStatus::Pending),
            member_id: None,
        };
        let mut count =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM transfer_requests t WHERE TRUE");
        filter.push(&mut count, scope);
        count.build_query_scalar().fetch_one(pool).await
    }
}
