/// Authentication primitives
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and the password policy
/// - [`jwt`]: Access/refresh token issuance and validation
/// - [`service_key`]: Constant-time check of the service-to-service key
/// - [`middleware`]: `AuthContext`, bearer parsing and client metadata
/// - [`verify`]: Request/response types of the token verification endpoint
///
/// # Example
///
/// ```no_run
/// use chrono::Duration;
/// use taskdesk_shared::auth::jwt::TokenService;
/// use taskdesk_shared::auth::password::{hash_password, verify_password};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Str0ng!Password")?;
/// assert!(verify_password("Str0ng!Password", &hash)?);
///
/// let tokens = TokenService::new(
///     "a-secret-that-is-at-least-32-bytes!!",
///     "taskdesk",
///     Duration::minutes(15),
///     Duration::days(7),
/// );
/// let pair = tokens.issue_pair(Uuid::new_v4(), Uuid::new_v4())?;
/// let claims = tokens.verify_access(&pair.access_token)?;
/// # Ok(())
/// # }
/// ```

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod service_key;
pub mod verify;
