/// Church model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TABLE churches (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(200) NOT NULL,
///     field_id UUID NOT NULL REFERENCES fields(id),
///     district_id UUID NOT NULL REFERENCES districts(id),
///     location VARCHAR(300),
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// `field_id` is always copied from the district, so a church can never sit
/// in a district of another field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use super::like_pattern;
use super::pagination::{Page, PageParams};
use crate::auth::scope::ChurchScope;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Church {
    pub id: Uuid,
    pub name: String,
    pub field_id: Uuid,
    pub district_id: Uuid,
    pub location: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateChurch {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    pub district_id: Uuid,

    #[validate(length(max = 300, message = "Location must be at most 300 characters"))]
    pub location: Option<String>,

    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateChurch {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,

    pub district_id: Option<Uuid>,

    #[validate(length(max = 300, message = "Location must be at most 300 characters"))]
    pub location: Option<String>,

    pub is_active: Option<bool>,
}

/// List filters; all optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChurchFilter {
    /// Case-insensitive substring of the name
    pub search: Option<String>,
    pub district_id: Option<Uuid>,
    pub field_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

impl ChurchFilter {
    fn push(&self, builder: &mut QueryBuilder<'_, Postgres>, scope: &ChurchScope) {
        scope.push_filter(builder, "c.id");

        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            builder.push(" AND c.name ILIKE ");
            builder.push_bind(like_pattern(search));
        }
        if let Some(district_id) = self.district_id {
            builder.push(" AND c.district_id = ");
            builder.push_bind(district_id);
        }
        if let Some(field_id) = self.field_id {
            builder.push(" AND c.field_id = ");
            builder.push_bind(field_id);
        }
        if let Some(is_active) = self.is_active {
            builder.push(" AND c.is_active = ");
            builder.push_bind(is_active);
        }
    }
}

const CHURCH_COLUMNS: &str =
    "c.id, c.name, c.field_id, c.district_id, c.location, c.is_active, c.created_at, c.updated_at";

impl Church {
    /// Inserts a church; returns None when the district does not exist
    pub async fn create(pool: &PgPool, data: CreateChurch) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Church>(
            "INSERT INTO churches (name, field_id, district_id, location, is_active)
             SELECT $1, d.field_id, d.id, $3, $4 FROM districts d WHERE d.id = $2
             RETURNING id, name, field_id, district_id, location, is_active, created_at, updated_at",
        )
        .bind(data.name)
        .bind(data.district_id)
        .bind(data.location)
        .bind(data.is_active)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Church>(&format!(
            "SELECT {CHURCH_COLUMNS} FROM churches c WHERE c.id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Finds a church only if it lies inside `scope`
    pub async fn find_in_scope(
        pool: &PgPool,
        id: Uuid,
        scope: &ChurchScope,
    ) -> Result<Option<Self>, sqlx::Error> {
        if !scope.contains(id) {
            return Ok(None);
        }
        Self::find_by_id(pool, id).await
    }

    pub async fn list(
        pool: &PgPool,
        scope: &ChurchScope,
        filter: &ChurchFilter,
        page: PageParams,
    ) -> Result<Page<Self>, sqlx::Error> {
        if scope.is_empty() {
            return Ok(Page::empty(page));
        }

        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {CHURCH_COLUMNS} FROM churches c WHERE TRUE"
        ));
        filter.push(&mut query, scope);
        query.push(" ORDER BY c.name LIMIT ");
        query.push_bind(page.limit);
        query.push(" OFFSET ");
        query.push_bind(page.offset);

        let churches = query.build_query_as::<Church>().fetch_all(pool).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM churches c WHERE TRUE");
        filter.push(&mut count, scope);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        Ok(Page::new(churches, total, page))
    }

    /// Applies an update; a new district also moves the church to that district's field
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateChurch,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Church>(
            "UPDATE churches SET
                 name = COALESCE($2, name),
                 district_id = COALESCE($3, district_id),
                 field_id = COALESCE((SELECT d.field_id FROM districts d WHERE d.id = $3), field_id),
                 location = COALESCE($4, location),
                 is_active = COALESCE($5, is_active),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING id, name, field_id, district_id, location, is_active, created_at, updated_at",
        )
        .bind(id)
        .bind(data.name)
        .bind(data.district_id)
        .bind(data.location)
        .bind(data.is_active)
        .fetch_optional(pool)
        .await
    }

    /// Hard delete; fails with a foreign key violation while members still reference it
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM churches WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// The subset of `ids` with no church row
    pub async fn missing_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Uuid>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_scalar(
            "SELECT t.id FROM UNNEST($1::uuid[]) AS t(id)
             WHERE NOT EXISTS (SELECT 1 FROM churches c WHERE c.id = t.id)",
        )
        .bind(ids)
        .fetch_all(pool)
        .await
    }

    /// Ids of every church in a district
    pub async fn ids_in_district(pool: &PgPool, district_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar("SELECT id FROM churches WHERE district_id = $1")
            .bind(district_id)
            .fetch_all(pool)
            .await
    }

    /// Ids of every church in a field
    pub async fn ids_in_field(pool: &PgPool, field_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar("SELECT id FROM churches WHERE field_id = $1")
            .bind(field_id)
            .fetch_all(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_church_validation() {
        let ok = CreateChurch {
            name: "Central".to_string(),
            district_id: Uuid::new_v4(),
            location: None,
            is_active: true,
        };
        assert!(ok.validate().is_ok());

        let blank = CreateChurch {
            name: String::new(),
            ..ok.clone()
        };
        let errors = blank.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
    }

    #[test]
    fn test_create_church_defaults_active() {
        let body = format!(r#"{{"name":"Hillside","district_id":"{}"}}"#, Uuid::new_v4());
        let church: CreateChurch = serde_json::from_str(&body).unwrap();
        assert!(church.is_active);
    }

    #[test]
    fn test_filter_sql() {
        let filter = ChurchFilter {
            search: Some("hill".to_string()),
            is_active: Some(true),
            ..Default::default()
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM churches c WHERE TRUE");
        filter.push(&mut builder, &ChurchScope::All);
        assert_eq!(
            builder.sql(),
            "SELECT COUNT(*) FROM churches c WHERE TRUE AND c.name ILIKE $1 AND c.is_active = $2"
        );
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let filter = ChurchFilter {
            search: Some("   ".to_string()),
            ..Default::default()
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM churches c WHERE TRUE");
        filter.push(&mut builder, &ChurchScope::All);
        assert_eq!(builder.sql(), "SELECT 1 FROM churches c WHERE TRUE");
    }
}
