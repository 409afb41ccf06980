/// Multi-step operations that combine permission checks, validation and writes
///
/// - [`transfers`]: transfer requests (single and bulk) and their review
/// - [`attendance`]: attendance recording and bulk confirmation
///
/// Bulk operations process each row on its own. A failing row does not roll
/// back rows that already succeeded; the caller receives one [`RowOutcome`]
/// per submitted row, in submission order.

pub mod attendance;
pub mod transfers;

use serde::Serialize;
use uuid::Uuid;
use validator::ValidationErrors;

use crate::auth::authorization::AuthzError;

/// Largest batch accepted by a bulk operation
pub const MAX_BULK_ROWS: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Authz(#[from] AuthzError),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// Well-formed input that the current data does not allow
    #[error("{0}")]
    Invalid(String),

    /// The row changed state underneath the caller
    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl WorkflowError {
    /// Message safe to return for one row of a bulk operation
    pub fn row_reason(&self) -> String {
        match self {
            WorkflowError::Database(_) | WorkflowError::Authz(AuthzError::DatabaseError(_)) => {
                "Internal error while processing row".to_string()
            }
            WorkflowError::Validation(errors) => {
                let mut reasons: Vec<String> = errors
                    .field_errors()
                    .iter()
                    .map(|(field, errs)| {
                        let message = errs
                            .first()
                            .and_then(|e| e.message.as_ref())
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| "invalid".to_string());
                        if *field == "__all__" {
                            message
                        } else {
                            format!("{field}: {message}")
                        }
                    })
                    .collect();
                reasons.sort();
                reasons.join("; ")
            }
            other => other.to_string(),
        }
    }
}

/// Maps a unique violation on `constraint` to a conflict with `message`
pub(crate) fn conflict_on(err: sqlx::Error, constraint: &str, message: &str) -> WorkflowError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.constraint() == Some(constraint) {
            return WorkflowError::Conflict(message.to_string());
        }
    }
    WorkflowError::Database(err)
}

/// Result of one row of a bulk operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowResult {
    Ok { id: Uuid },
    Error { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowOutcome {
    /// Position of the row in the submitted batch
    pub index: usize,

    #[serde(flatten)]
    pub result: RowResult,
}

/// Per-row outcomes plus totals
#[derive(Debug, Clone, Serialize)]
pub struct BulkReport {
    pub succeeded: usize,
    pub failed: usize,
    pub rows: Vec<RowOutcome>,
}

impl BulkReport {
    pub fn from_rows(rows: Vec<RowOutcome>) -> Self {
        let succeeded = rows
            .iter()
            .filter(|row| matches!(row.result, RowResult::Ok { .. }))
            .count();

        Self {
            succeeded,
            failed: rows.len() - succeeded,
            rows,
        }
    }
}

/// Turns one row's result into its outcome, logging unexpected failures
pub(crate) fn outcome<T>(
    index: usize,
    result: Result<T, WorkflowError>,
    id_of: impl FnOnce(&T) -> Uuid,
) -> RowOutcome {
    let result = match result {
        Ok(value) => RowResult::Ok { id: id_of(&value) },
        Err(err) => {
            if matches!(err, WorkflowError::Database(_)) {
                tracing::error!(index, error = %err, "Bulk row failed");
            } else {
                tracing::debug!(index, error = %err, "Bulk row rejected");
            }
            RowResult::Error {
                reason: err.row_reason(),
            }
        }
    };

    RowOutcome { index, result }
}

/// Rejects empty or oversized batches
pub(crate) fn check_batch_size(len: usize) -> Result<(), WorkflowError> {
    if len == 0 {
        return Err(WorkflowError::Invalid("Batch must contain at least one row".to_string()));
    }
    if len > MAX_BULK_ROWS {
        return Err(WorkflowError::Invalid(format!(
            "Batch must contain at most {MAX_BULK_ROWS} rows"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(range(min = 0, max = 150, message = "Age must be between 0 and 150"))]
        age: i32,
    }

    #[test]
    fn test_bulk_report_totals() {
        let report = BulkReport::from_rows(vec![
            outcome(0, Ok(Uuid::nil()), |id| *id),
            outcome::<Uuid>(1, Err(WorkflowError::Invalid("nope".into())), |id| *id),
            outcome(2, Ok(Uuid::nil()), |id| *id),
        ]);

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.rows[1].result, RowResult::Error { reason: "nope".into() });
    }

    #[test]
    fn test_row_outcome_json() {
        let ok = RowOutcome {
            index: 0,
            result: RowResult::Ok { id: Uuid::nil() },
        };
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["index"], 0);
        assert_eq!(json["id"], Uuid::nil().to_string());

        let err = RowOutcome {
            index: 3,
            result: RowResult::Error { reason: "Member not found".into() },
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["reason"], "Member not found");
    }

    #[test]
    fn test_validation_row_reason_names_field() {
        let errors = Sample { age: 200 }.validate().unwrap_err();
        let reason = WorkflowError::from(errors).row_reason();
        assert_eq!(reason, "age: Age must be between 0 and 150");
    }

    #[test]
    fn test_database_errors_are_not_leaked() {
        let reason = WorkflowError::Database(sqlx::Error::PoolTimedOut).row_reason();
        assert_eq!(reason, "Internal error while processing row");
    }

    #[test]
    fn test_batch_size() {
        assert!(check_batch_size(0).is_err());
        assert!(check_batch_size(1).is_ok());
        assert!(check_batch_size(MAX_BULK_ROWS).is_ok());
        assert!(check_batch_size(MAX_BULK_ROWS + 1).is_err());
    }
}
