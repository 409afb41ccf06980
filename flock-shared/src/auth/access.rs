/// Access resolution: from an authenticated user id to a role and church scope
///
/// Scope by role:
///
/// | Role | Churches |
/// |---|---|
/// | superadmin, admin | all |
/// | church_secretary, member | own church |
/// | bibleworker | own church and assignment list |
/// | pastor | own church, assignment list, churches of own district |
/// | coordinator | own church, assignment list, churches of own field |
/// | unknown | none |
///
/// A scoped user with no church, district, field or assignment ends up with
/// the empty scope and sees no church-bound rows.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::scope::ChurchScope;
use crate::models::church::Church;
use crate::models::user::{Role, User};

/// Church lookups needed to expand district and field assignments
#[async_trait]
pub trait ChurchDirectory: Send + Sync {
    async fn churches_in_district(&self, district_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error>;

    async fn churches_in_field(&self, field_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error>;
}

#[async_trait]
impl ChurchDirectory for PgPool {
    async fn churches_in_district(&self, district_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        Church::ids_in_district(self, district_id).await
    }

    async fn churches_in_field(&self, field_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        Church::ids_in_field(self, field_id).await
    }
}

/// Where a user sits in the hierarchy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placement {
    pub church_id: Option<Uuid>,
    pub district_id: Option<Uuid>,
    pub field_id: Option<Uuid>,
    pub assigned_church_ids: Vec<Uuid>,
}

/// Per-request access decision, stored in request extensions
#[derive(Debug, Clone, Serialize)]
pub struct AccessContext {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub church_id: Option<Uuid>,
    pub district_id: Option<Uuid>,
    pub field_id: Option<Uuid>,
    #[serde(skip)]
    pub scope: ChurchScope,
}

impl AccessContext {
    /// Church ids in scope, or None when unrestricted
    pub fn church_ids(&self) -> Option<Vec<Uuid>> {
        self.scope.church_ids()
    }

    pub fn can_access_church(&self, church_id: Uuid) -> bool {
        self.scope.contains(church_id)
    }
}

/// Computes the church scope for a role and placement
pub async fn derive_scope<D>(
    directory: &D,
    role: Role,
    placement: &Placement,
) -> Result<ChurchScope, sqlx::Error>
where
    D: ChurchDirectory + ?Sized,
{
    if role.is_global() {
        return Ok(ChurchScope::All);
    }

    let mut ids: Vec<Uuid> = Vec::new();

    match role {
        Role::ChurchSecretary | Role::Member => {
            ids.extend(placement.church_id);
        }
        Role::Bibleworker => {
            ids.extend(placement.church_id);
            ids.extend(placement.assigned_church_ids.iter().copied());
        }
        Role::Pastor => {
            ids.extend(placement.church_id);
            ids.extend(placement.assigned_church_ids.iter().copied());
            if let Some(district_id) = placement.district_id {
                ids.extend(directory.churches_in_district(district_id).await?);
            }
        }
        Role::Coordinator => {
            ids.extend(placement.church_id);
            ids.extend(placement.assigned_church_ids.iter().copied());
            if let Some(field_id) = placement.field_id {
                ids.extend(directory.churches_in_field(field_id).await?);
            }
        }
        Role::Unknown | Role::Superadmin | Role::Admin => {}
    }

    Ok(ChurchScope::from_ids(ids))
}

/// Loads the user and builds its access context
///
/// Returns None when the user no longer exists.
pub async fn resolve_access(pool: &PgPool, user_id: Uuid) -> Result<Option<AccessContext>, sqlx::Error> {
    let Some(user) = User::find_by_id(pool, user_id).await? else {
        return Ok(None);
    };

    let assigned_church_ids = if user.role.is_global() {
        Vec::new()
    } else {
        User::assigned_church_ids(pool, user.id).await?
    };

    let placement = Placement {
        church_id: user.church_id,
        district_id: user.district_id,
        field_id: user.field_id,
        assigned_church_ids,
    };
    let scope = derive_scope(pool, user.role, &placement).await?;

    tracing::debug!(
        user_id = %user.id,
        role = %user.role,
        unrestricted = scope.is_all(),
        churches = scope.church_ids().map(|ids| ids.len()).unwrap_or_default(),
        "Resolved access"
    );

    Ok(Some(AccessContext {
        user_id: user.id,
        email: user.email,
        role: user.role,
        church_id: user.church_id,
        district_id: user.district_id,
        field_id: user.field_id,
        scope,
    }))
}
