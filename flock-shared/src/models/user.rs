/// User model, roles and church assignments
///
/// Users are staff accounts. A user's role decides what it may do and, with
/// its church/district/field assignment and its assignment list, which
/// churches it may do it in.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email VARCHAR(255) NOT NULL UNIQUE,
///     password_hash VARCHAR(255) NOT NULL,
///     name VARCHAR(200),
///     role VARCHAR(32) NOT NULL DEFAULT 'member',
///     church_id UUID REFERENCES churches(id),
///     district_id UUID REFERENCES districts(id),
///     field_id UUID REFERENCES fields(id),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
///
/// CREATE TABLE user_church_assignments (
///     user_id UUID NOT NULL REFERENCES users(id),
///     church_id UUID NOT NULL REFERENCES churches(id),
///     PRIMARY KEY (user_id, church_id)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use super::event::EventScope;
use super::nullable;
use super::pagination::{Page, PageParams};

/// Staff roles
///
/// Stored as text. Values this build does not know decode to
/// [`Role::Unknown`], which is granted nothing beyond reading an empty scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Superadmin,
    Admin,
    ChurchSecretary,
    Pastor,
    Bibleworker,
    Coordinator,
    Member,
    #[serde(other)]
    Unknown,
}

impl Role {
    /// Roles that can be assigned to a user
    pub const ASSIGNABLE: &'static [Role] = &[
        Role::Superadmin,
        Role::Admin,
        Role::ChurchSecretary,
        Role::Pastor,
        Role::Bibleworker,
        Role::Coordinator,
        Role::Member,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Superadmin => "superadmin",
            Role::Admin => "admin",
            Role::ChurchSecretary => "church_secretary",
            Role::Pastor => "pastor",
            Role::Bibleworker => "bibleworker",
            Role::Coordinator => "coordinator",
            Role::Member => "member",
            Role::Unknown => "unknown",
        }
    }

    /// Superadmin and admin see every church
    pub fn is_global(&self) -> bool {
        matches!(self, Role::Superadmin | Role::Admin)
    }

    pub fn can_manage_churches(&self) -> bool {
        self.is_global()
    }

    pub fn can_manage_users(&self) -> bool {
        self.is_global()
    }

    /// Whether this role may grant `target` to another user
    ///
    /// Only a superadmin can create or promote superadmins.
    pub fn can_assign_role(&self, target: Role) -> bool {
        match self {
            Role::Superadmin => target != Role::Unknown,
            Role::Admin => target != Role::Unknown && target != Role::Superadmin,
            _ => false,
        }
    }

    /// Church secretaries and members are sent to their own church instead
    pub fn can_list_churches(&self) -> bool {
        !matches!(
            self,
            Role::ChurchSecretary | Role::Member | Role::Unknown
        )
    }

    pub fn can_edit_members(&self) -> bool {
        matches!(
            self,
            Role::Superadmin
                | Role::Admin
                | Role::ChurchSecretary
                | Role::Pastor
                | Role::Bibleworker
        )
    }

    pub fn can_delete_members(&self) -> bool {
        self.is_global()
    }

    pub fn can_request_transfers(&self) -> bool {
        matches!(
            self,
            Role::Superadmin | Role::Admin | Role::ChurchSecretary | Role::Pastor
        )
    }

    pub fn can_review_transfers(&self) -> bool {
        matches!(
            self,
            Role::Superadmin | Role::Admin | Role::Pastor | Role::Coordinator
        )
    }

    /// Visitors and attendance are open to every working role
    pub fn can_manage_visitors(&self) -> bool {
        !matches!(self, Role::Member | Role::Unknown)
    }

    pub fn can_record_attendance(&self) -> bool {
        self.can_manage_visitors()
    }

    pub fn can_submit_missionary_reports(&self) -> bool {
        matches!(
            self,
            Role::Superadmin
                | Role::Admin
                | Role::ChurchSecretary
                | Role::Pastor
                | Role::Bibleworker
        )
    }

    /// Highest event scope this role may create or edit
    pub fn can_manage_event_scope(&self, scope: EventScope) -> bool {
        match self {
            Role::Superadmin | Role::Admin => true,
            Role::Coordinator => !matches!(scope, EventScope::National),
            Role::Pastor => matches!(scope, EventScope::District | EventScope::Church),
            Role::ChurchSecretary => matches!(scope, EventScope::Church),
            _ => false,
        }
    }

    /// Whether the role performs any write at all
    pub fn is_read_only(&self) -> bool {
        matches!(self, Role::Member | Role::Unknown)
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        match value {
            "superadmin" => Role::Superadmin,
            "admin" => Role::Admin,
            "church_secretary" => Role::ChurchSecretary,
            "pastor" => Role::Pastor,
            "bibleworker" => Role::Bibleworker,
            "coordinator" => Role::Coordinator,
            "member" => Role::Member,
            _ => Role::Unknown,
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Role::from(value.as_str())
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Staff account
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    pub email: String,

    /// Argon2id hash, never serialized
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub name: Option<String>,

    #[sqlx(try_from = "String")]
    pub role: Role,

    /// Own church (secretaries, members, bibleworkers, pastors)
    pub church_id: Option<Uuid>,

    /// District a pastor oversees
    pub district_id: Option<Uuid>,

    /// Field a coordinator oversees
    pub field_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating a user
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub role: Role,
    pub church_id: Option<Uuid>,
    pub district_id: Option<Uuid>,
    pub field_id: Option<Uuid>,
    pub assigned_church_ids: Vec<Uuid>,
}

/// Changes to a user's role and placement
///
/// An absent key leaves a column unchanged. For the placement columns an
/// explicit `null` clears the column.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateUser {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,

    pub role: Option<Role>,

    #[serde(default, deserialize_with = "nullable")]
    pub church_id: Option<Option<Uuid>>,

    #[serde(default, deserialize_with = "nullable")]
    pub district_id: Option<Option<Uuid>>,

    #[serde(default, deserialize_with = "nullable")]
    pub field_id: Option<Option<Uuid>>,

    /// Replaces the whole assignment list when present
    pub assigned_church_ids: Option<Vec<Uuid>>,
}

const USER_COLUMNS: &str = "id, email, password_hash, name, role, church_id, district_id, field_id, \
                            created_at, updated_at, last_login_at";

impl User {
    /// Inserts the user and its assignment list in one transaction
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, password_hash, name, role, church_id, district_id, field_id)
             VALUES (LOWER($1), $2, $3, $4, $5, $6, $7)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(data.email)
        .bind(data.password_hash)
        .bind(data.name)
        .bind(data.role.as_str())
        .bind(data.church_id)
        .bind(data.district_id)
        .bind(data.field_id)
        .fetch_one(&mut *tx)
        .await?;

        replace_assignments(&mut tx, user.id, &data.assigned_church_ids).await?;

        tx.commit().await?;
        Ok(user)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Email lookup is case-insensitive
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(pool: &PgPool, page: PageParams) -> Result<Page<Self>, sqlx::Error> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY email LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(pool)
        .await?;

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;

        Ok(Page::new(users, total, page))
    }

    /// Applies an update; the assignment list is replaced in the same transaction
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateUser,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET
                 name = COALESCE($2, name),
                 role = COALESCE($3, role),
                 church_id = CASE WHEN $7 THEN $4 ELSE church_id END,
                 district_id = CASE WHEN $8 THEN $5 ELSE district_id END,
                 field_id = CASE WHEN $9 THEN $6 ELSE field_id END,
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(data.name)
        .bind(data.role.map(|r| r.as_str()))
        .bind(data.church_id.flatten())
        .bind(data.district_id.flatten())
        .bind(data.field_id.flatten())
        .bind(data.church_id.is_some())
        .bind(data.district_id.is_some())
        .bind(data.field_id.is_some())
        .fetch_optional(&mut *tx)
        .await?;

        if user.is_none() {
            return Ok(None);
        }

        if let Some(church_ids) = data.assigned_church_ids {
            replace_assignments(&mut tx, id, &church_ids).await?;
        }

        tx.commit().await?;
        Ok(user)
    }

    pub async fn update_password(
        pool: &PgPool,
        id: Uuid,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Churches explicitly assigned to the user
    pub async fn assigned_church_ids(pool: &PgPool, id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT church_id FROM user_church_assignments WHERE user_id = $1 ORDER BY church_id",
        )
        .bind(id)
        .fetch_all(pool)
        .await
    }
}

/// Replaces a user's assignment list inside an open transaction
async fn replace_assignments(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    church_ids: &[Uuid],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM user_church_assignments WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

    if church_ids.is_empty() {
        return Ok(());
    }

    sqlx::query(
        "INSERT INTO user_church_assignments (user_id, church_id)
         SELECT $1, UNNEST($2::uuid[])
         ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(church_ids)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_user_null_clears_placement() {
        let update: UpdateUser =
            serde_json::from_str(r#"{"church_id":null,"role":"coordinator"}"#).unwrap();
        assert_eq!(update.church_id, Some(None));
        assert_eq!(update.district_id, None);
        assert_eq!(update.role, Some(Role::Coordinator));

        let id = Uuid::new_v4();
        let update: UpdateUser =
            serde_json::from_str(&format!(r#"{{"field_id":"{id}"}}"#)).unwrap();
        assert_eq!(update.field_id, Some(Some(id)));
    }

    #[test]
    fn test_role_round_trip() {
        for role in Role::ASSIGNABLE {
            assert_eq!(Role::from(role.as_str()), *role);
        }
    }

    #[test]
    fn test_unknown_role_string() {
        assert_eq!(Role::from("deacon"), Role::Unknown);
        assert_eq!(Role::from(String::new()), Role::Unknown);
        let parsed: Role = serde_json::from_str("\"elder\"").unwrap();
        assert_eq!(parsed, Role::Unknown);
    }

    #[test]
    fn test_unknown_role_is_least_privilege() {
        let role = Role::Unknown;
        assert!(role.is_read_only());
        assert!(!role.can_list_churches());
        assert!(!role.can_edit_members());
        assert!(!role.can_delete_members());
        assert!(!role.can_request_transfers());
        assert!(!role.can_review_transfers());
        assert!(!role.can_manage_visitors());
        assert!(!role.can_record_attendance());
        assert!(!role.can_submit_missionary_reports());
        assert!(!role.can_manage_users());
        for scope in EventScope::ALL {
            assert!(!role.can_manage_event_scope(*scope));
        }
    }

    #[test]
    fn test_only_global_roles_delete_members() {
        assert!(Role::Superadmin.can_delete_members());
        assert!(Role::Admin.can_delete_members());
        assert!(!Role::Bibleworker.can_delete_members());
        assert!(!Role::Pastor.can_delete_members());
        assert!(!Role::ChurchSecretary.can_delete_members());
        assert!(!Role::Coordinator.can_delete_members());
        assert!(!Role::Member.can_delete_members());
    }

    #[test]
    fn test_bibleworker_edits_but_does_not_transfer() {
        assert!(Role::Bibleworker.can_edit_members());
        assert!(!Role::Bibleworker.can_request_transfers());
        assert!(!Role::Bibleworker.can_review_transfers());
        assert!(Role::Bibleworker.can_record_attendance());
    }

    #[test]
    fn test_church_listing() {
        assert!(!Role::ChurchSecretary.can_list_churches());
        assert!(!Role::Member.can_list_churches());
        assert!(Role::Pastor.can_list_churches());
        assert!(Role::Admin.can_list_churches());
    }

    #[test]
    fn test_event_scope_ladder() {
        assert!(Role::Admin.can_manage_event_scope(EventScope::National));
        assert!(!Role::Coordinator.can_manage_event_scope(EventScope::National));
        assert!(Role::Coordinator.can_manage_event_scope(EventScope::Field));
        assert!(!Role::Pastor.can_manage_event_scope(EventScope::Field));
        assert!(Role::Pastor.can_manage_event_scope(EventScope::District));
        assert!(!Role::ChurchSecretary.can_manage_event_scope(EventScope::District));
        assert!(Role::ChurchSecretary.can_manage_event_scope(EventScope::Church));
        assert!(!Role::Bibleworker.can_manage_event_scope(EventScope::Church));
    }

    #[test]
    fn test_role_assignment() {
        assert!(Role::Superadmin.can_assign_role(Role::Superadmin));
        assert!(!Role::Admin.can_assign_role(Role::Superadmin));
        assert!(Role::Admin.can_assign_role(Role::Pastor));
        assert!(!Role::Pastor.can_assign_role(Role::Member));
        assert!(!Role::Superadmin.can_assign_role(Role::Unknown));
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            email: "clerk@example.org".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            name: None,
            role: Role::ChurchSecretary,
            church_id: Some(Uuid::new_v4()),
            district_id: None,
            field_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_login_at: None,
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "church_secretary");
    }
}
