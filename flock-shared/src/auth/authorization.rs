/// Permission checks applied before reads and writes
///
/// Two kinds of denial exist. A record outside the caller's scope is reported
/// as not found, so its existence is not revealed. A role that lacks a
/// capability is reported as forbidden.
///
/// # Example
///
/// ```no_run
/// use flock_shared::auth::access::AccessContext;
/// use flock_shared::auth::authorization::{require, require_church};
/// use uuid::Uuid;
///
/// fn check(ctx: &AccessContext, church_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
///     require(ctx.role.can_edit_members(), "edit members")?;
///     require_church(ctx, church_id)?;
///     Ok(())
/// }
/// ```

use sqlx::PgPool;
use uuid::Uuid;

use super::access::AccessContext;
use crate::models::event::EventScope;
use crate::models::region::District;

#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// The record does not exist or lies outside the caller's scope
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The caller's role may not perform the action
    #[error("Not permitted to {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Fails with `Forbidden` unless `allowed`
pub fn require(allowed: bool, action: &str) -> Result<(), AuthzError> {
    if allowed {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(action.to_string()))
    }
}

/// Fails with `NotFound("Church")` unless the church is in scope
pub fn require_church(ctx: &AccessContext, church_id: Uuid) -> Result<(), AuthzError> {
    if ctx.can_access_church(church_id) {
        Ok(())
    } else {
        Err(AuthzError::NotFound("Church"))
    }
}

/// Converts a scoped lookup result into a record or `NotFound`
pub fn found<T>(record: Option<T>, what: &'static str) -> Result<T, AuthzError> {
    record.ok_or(AuthzError::NotFound(what))
}

/// Checks that the caller may create or edit an event at this target
///
/// Superadmins and admins may target anything. Otherwise the role must be
/// allowed the event's level, and the target must be the caller's own field
/// or district, or a church in scope.
pub async fn require_event_target(
    pool: &PgPool,
    ctx: &AccessContext,
    scope: EventScope,
    field_id: Option<Uuid>,
    district_id: Option<Uuid>,
    church_id: Option<Uuid>,
) -> Result<(), AuthzError> {
    require(
        ctx.role.can_manage_event_scope(scope),
        &format!("manage {} events", scope),
    )?;

    if ctx.role.is_global() {
        return Ok(());
    }

    let allowed = match scope {
        EventScope::National => false,
        EventScope::Field => field_id.is_some() && field_id == ctx.field_id,
        EventScope::District => match district_id {
            Some(id) if Some(id) == ctx.district_id => true,
            Some(id) if ctx.field_id.is_some() => District::find_by_id(pool, id)
                .await?
                .is_some_and(|district| Some(district.field_id) == ctx.field_id),
            _ => false,
        },
        EventScope::Church => church_id.is_some_and(|id| ctx.can_access_church(id)),
    };

    require(allowed, "manage events outside your area")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::scope::ChurchScope;
    use crate::models::user::Role;

    fn ctx(role: Role, scope: ChurchScope) -> AccessContext {
        AccessContext {
            user_id: Uuid::new_v4(),
            email: "staff@example.org".to_string(),
            role,
            church_id: None,
            district_id: None,
            field_id: None,
            scope,
        }
    }

    #[test]
    fn test_require() {
        assert!(require(true, "anything").is_ok());
        let err = require(false, "delete members").unwrap_err();
        assert!(matches!(err, AuthzError::Forbidden(_)));
        assert_eq!(err.to_string(), "Not permitted to delete members");
    }

    #[test]
    fn test_bibleworker_cannot_delete_members() {
        let bibleworker = ctx(Role::Bibleworker, ChurchScope::from_ids([Uuid::new_v4()]));
        assert!(matches!(
            require(bibleworker.role.can_delete_members(), "delete members"),
            Err(AuthzError::Forbidden(_))
        ));
    }

    #[test]
    fn test_out_of_scope_church_is_not_found() {
        let own = Uuid::new_v4();
        let secretary = ctx(Role::ChurchSecretary, ChurchScope::from_ids([own]));

        assert!(require_church(&secretary, own).is_ok());
        assert!(matches!(
            require_church(&secretary, Uuid::new_v4()),
            Err(AuthzError::NotFound("Church"))
        ));
    }

    #[test]
    fn test_found() {
        assert_eq!(found(Some(3), "Member").unwrap(), 3);
        assert_eq!(found::<i32>(None, "Member").unwrap_err().to_string(), "Member not found");
    }

    #[tokio::test]
    async fn test_event_targets_without_database() {
        let pool = sqlx::PgPool::connect_lazy("postgres://localhost/flock_unused").unwrap();
        let own_church = Uuid::new_v4();
        let own_field = Uuid::new_v4();

        let mut secretary = ctx(Role::ChurchSecretary, ChurchScope::from_ids([own_church]));
        secretary.church_id = Some(own_church);
        assert!(require_event_target(&pool, &secretary, EventScope::Church, None, None, Some(own_church))
            .await
            .is_ok());
        assert!(require_event_target(&pool, &secretary, EventScope::Church, None, None, Some(Uuid::new_v4()))
            .await
            .is_err());
        assert!(require_event_target(&pool, &secretary, EventScope::National, None, None, None)
            .await
            .is_err());

        let mut coordinator = ctx(Role::Coordinator, ChurchScope::none());
        coordinator.field_id = Some(own_field);
        assert!(require_event_target(&pool, &coordinator, EventScope::Field, Some(own_field), None, None)
            .await
            .is_ok());
        assert!(require_event_target(&pool, &coordinator, EventScope::Field, Some(Uuid::new_v4()), None, None)
            .await
            .is_err());

        let admin = ctx(Role::Admin, ChurchScope::All);
        assert!(require_event_target(&pool, &admin, EventScope::National, None, None, None)
            .await
            .is_ok());
    }
}
