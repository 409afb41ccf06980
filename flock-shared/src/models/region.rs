/// Fields and districts
///
/// A field groups districts; a district groups churches. Pastors are scoped
/// to a district and coordinators to a field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Field {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct District {
    pub id: Uuid,
    pub field_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Field {
    pub async fn create(pool: &PgPool, name: &str) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Field>(
            "INSERT INTO fields (name) VALUES ($1) RETURNING id, name, created_at",
        )
        .bind(name)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Field>("SELECT id, name, created_at FROM fields WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Field>("SELECT id, name, created_at FROM fields ORDER BY name")
            .fetch_all(pool)
            .await
    }
}

impl District {
    pub async fn create(pool: &PgPool, field_id: Uuid, name: &str) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, District>(
            "INSERT INTO districts (field_id, name) VALUES ($1, $2)
             RETURNING id, field_id, name, created_at",
        )
        .bind(field_id)
        .bind(name)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, District>(
            "SELECT id, field_id, name, created_at FROM districts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_by_field(pool: &PgPool, field_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, District>(
            "SELECT id, field_id, name, created_at FROM districts WHERE field_id = $1 ORDER BY name",
        )
        .bind(field_id)
        .fetch_all(pool)
        .await
    }
}
