/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id hashing and temporary passwords
/// - [`jwt`]: Access and refresh tokens
/// - [`scope`]: The set of churches a caller may touch
/// - [`access`]: Role and scope resolution for an authenticated user
/// - [`authorization`]: Capability and scope checks
/// - [`middleware`]: Bearer token extraction and request authentication
///
/// # Example
///
/// ```no_run
/// use flock_shared::auth::access::resolve_access;
/// use flock_shared::auth::jwt::validate_access_token;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, token: &str, secret: &str) -> Result<(), Box<dyn std::error::Error>> {
/// let claims = validate_access_token(token, secret)?;
/// if let Some(access) = resolve_access(&pool, claims.sub).await? {
///     println!("{} may see all churches: {}", access.role, access.scope.is_all());
/// }
/// # Ok(())
/// # }
/// ```

pub mod access;
pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod scope;
