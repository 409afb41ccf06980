//! Common test utilities for integration tests
//!
//! Each test builds its own hierarchy (one field, two districts, three
//! churches) with unique names, so tests can share a database. Tests are
//! skipped when `DATABASE_URL` is not set.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use flock_api::app::{build_router, AppState};
use flock_api::config::Config;
use flock_shared::auth::jwt::{create_token, Claims, TokenType};
use flock_shared::auth::password::hash_password;
use flock_shared::db::migrations::MIGRATOR;
use flock_shared::models::church::{Church, CreateChurch};
use flock_shared::models::member::{CreateMember, Member, MemberStatus, PhysicalStatus, SpiritualStatus};
use flock_shared::models::region::{District, Field};
use flock_shared::models::user::{CreateUser, Role, UpdateUser, User};
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

pub const SECRET: &str = "integration-test-secret-with-32-chars";
pub const PASSWORD: &str = "Str0ng!Passw0rd";

pub struct TestContext {
    pub db: PgPool,
    pub app: axum::Router,
    pub field: Field,
    /// District holding `church_a` and `church_b`
    pub district: District,
    /// District holding `church_c`
    pub other_district: District,
    pub church_a: Church,
    pub church_b: Church,
    pub church_c: Church,
    users: Vec<Uuid>,
}

pub struct TestUser {
    pub user: User,
    pub token: String,
}

impl TestContext {
    /// Connects, migrates and seeds; None when no database is configured
    pub async fn new() -> Option<Self> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let config = Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some(url.clone()),
            "JWT_SECRET" => Some(SECRET.to_string()),
            _ => None,
        })
        .expect("test config");

        let db = PgPool::connect(&config.database.url).await.expect("connect");
        MIGRATOR.run(&db).await.expect("migrate");

        let tag = Uuid::new_v4().simple().to_string();
        let field = Field::create(&db, &format!("Field {tag}")).await.expect("field");
        let district = District::create(&db, field.id, &format!("District {tag}"))
            .await
            .expect("district");
        let other_district = District::create(&db, field.id, &format!("Other {tag}"))
            .await
            .expect("district");

        let church = |name: &str, district_id: Uuid| CreateChurch {
            name: format!("{name} {tag}"),
            district_id,
            location: None,
            is_active: true,
        };
        let church_a = Church::create(&db, church("Bethel", district.id)).await.unwrap().unwrap();
        let church_b = Church::create(&db, church("Shiloh", district.id)).await.unwrap().unwrap();
        let church_c = Church::create(&db, church("Hebron", other_district.id))
            .await
            .unwrap()
            .unwrap();

        let app = build_router(AppState::new(db.clone(), config));

        Some(TestContext {
            db,
            app,
            field,
            district,
            other_district,
            church_a,
            church_b,
            church_c,
            users: Vec::new(),
        })
    }

    /// Creates a user with `PASSWORD` and issues an access token for it
    pub async fn user(
        &mut self,
        role: Role,
        church_id: Option<Uuid>,
        district_id: Option<Uuid>,
        field_id: Option<Uuid>,
    ) -> TestUser {
        let user = User::create(
            &self.db,
            CreateUser {
                email: format!("{}-{}@example.org", role.as_str(), Uuid::new_v4().simple()),
                password_hash: hash_password(PASSWORD).unwrap(),
                name: Some(format!("Test {}", role.as_str())),
                role,
                church_id,
                district_id,
                field_id,
                assigned_church_ids: Vec::new(),
            },
        )
        .await
        .expect("user");
        self.users.push(user.id);

        let token = create_token(&Claims::new(user.id, TokenType::Access), SECRET).unwrap();
        TestUser { user, token }
    }

    pub async fn assign(&self, user_id: Uuid, church_ids: Vec<Uuid>) {
        User::update(
            &self.db,
            user_id,
            UpdateUser {
                assigned_church_ids: Some(church_ids),
                ..Default::default()
            },
        )
        .await
        .expect("assign");
    }

    pub async fn member(&self, church_id: Uuid, first_name: &str) -> Member {
        Member::create(
            &self.db,
            CreateMember {
                church_id,
                first_name: first_name.to_string(),
                last_name: "Tester".to_string(),
                gender: None,
                date_of_birth: None,
                age: Some(30),
                phone: None,
                email: None,
                address: None,
                marital_status: None,
                baptism_date: None,
                spiritual_status: SpiritualStatus::Baptized,
                physical_status: PhysicalStatus::Healthy,
                status: MemberStatus::Active,
            },
        )
        .await
        .expect("member")
    }

    /// Sends a request through the router
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, HeaderMap, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, json)
    }

    /// Registers a user created through the API for cleanup
    pub fn track_user(&mut self, user_id: Uuid) {
        self.users.push(user_id);
    }

    pub fn church_ids(&self) -> [Uuid; 3] {
        [self.church_a.id, self.church_b.id, self.church_c.id]
    }

    /// Removes everything this context created
    pub async fn cleanup(&self) {
        let churches = self.church_ids().to_vec();
        sqlx::query("DELETE FROM members WHERE church_id = ANY($1)")
            .bind(&churches)
            .execute(&self.db)
            .await
            .unwrap();
        // National events hang off no church, so go by author
        sqlx::query("DELETE FROM events WHERE created_by = ANY($1)")
            .bind(&self.users)
            .execute(&self.db)
            .await
            .unwrap();
        sqlx::query("DELETE FROM users WHERE id = ANY($1)")
            .bind(&self.users)
            .execute(&self.db)
            .await
            .unwrap();
        sqlx::query("DELETE FROM churches WHERE id = ANY($1)")
            .bind(&churches)
            .execute(&self.db)
            .await
            .unwrap();
        sqlx::query("DELETE FROM districts WHERE field_id = $1")
            .bind(self.field.id)
            .execute(&self.db)
            .await
            .unwrap();
        sqlx::query("DELETE FROM fields WHERE id = $1")
            .bind(self.field.id)
            .execute(&self.db)
            .await
            .unwrap();
    }
}

/// Skips the current test when no database is configured
macro_rules! test_context {
    () => {
        match common::TestContext::new().await {
            Some(ctx) => ctx,
            None => {
                eprintln!("DATABASE_URL not set; skipping");
                return;
            }
        }
    };
}
