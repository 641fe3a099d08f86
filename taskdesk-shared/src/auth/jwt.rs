/// JWT token generation and validation module
///
/// Access and refresh tokens are HS256-signed JWTs. Both are bound to a
/// server-side session (`sid`) and carry a unique token id (`jti`) so that
/// individual access tokens can be deny-listed on logout and refresh tokens
/// can be looked up, rotated and revoked.
///
/// # Security
///
/// - **Algorithm**: HS256 (HMAC with SHA-256)
/// - **Expiration**: 15 minutes for access, 7 days for refresh (configurable)
/// - **Validation**: Signature, `exp`, `nbf`, issuer and token type
/// - **Storage**: Refresh tokens are persisted as SHA-256 digests only
///
/// # Example
///
/// ```
/// use taskdesk_shared::auth::jwt::TokenService;
/// use chrono::Duration;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let tokens = TokenService::new(
///     "a-very-long-secret-key-for-signing-tokens",
///     "taskdesk",
///     Duration::minutes(15),
///     Duration::days(7),
/// );
///
/// let user_id = Uuid::new_v4();
/// let pair = tokens.issue_pair(user_id, Uuid::new_v4())?;
///
/// let claims = tokens.verify_access(&pair.access_token)?;
/// assert_eq!(claims.sub, user_id);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Default issuer claim
pub const DEFAULT_ISSUER: &str = "taskdesk";

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Failed to validate token
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Token type claim does not match the expected one
    #[error("Expected {expected} token, got {actual} token")]
    WrongType {
        expected: &'static str,
        actual: &'static str,
    },

    /// Invalid issuer
    #[error("Invalid issuer: expected {expected}")]
    InvalidIssuer { expected: String },
}

/// Token type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Access token (short-lived)
    Access,

    /// Refresh token (long-lived, single use)
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// JWT claims structure
///
/// # Standard Claims
///
/// - `sub`: User ID
/// - `jti`: Unique token ID
/// - `iss`: Issuer
/// - `iat` / `nbf` / `exp`: Unix timestamps
///
/// # Custom Claims
///
/// - `sid`: Session the token belongs to
/// - `token_type`: Access or refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - User ID
    pub sub: Uuid,

    /// Session ID
    pub sid: Uuid,

    /// Token ID
    pub jti: Uuid,

    /// Issuer
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Token type
    pub token_type: TokenType,
}

impl Claims {
    /// Creates claims that expire `expires_in` from now
    pub fn new(
        user_id: Uuid,
        session_id: Uuid,
        token_type: TokenType,
        issuer: &str,
        expires_in: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            sid: session_id,
            jti: Uuid::new_v4(),
            iss: issuer.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            token_type,
        }
    }

    /// Checks if token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Expiration as a timestamp
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    /// Remaining lifetime in whole seconds (0 once expired)
    pub fn remaining_seconds(&self) -> u64 {
        (self.exp - Utc::now().timestamp()).max(0) as u64
    }
}

/// Creates a JWT token from claims
///
/// Signs the token using HS256 with the provided secret.
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Validates a JWT token and extracts claims
///
/// Verifies the signature, expiration, not-before and issuer.
pub fn validate_token(token: &str, secret: &str, issuer: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[issuer]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = 0;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer {
            expected: issuer.to_string(),
        },
        _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
    })?;

    // jsonwebtoken still accepts a token during its `exp` second
    if token_data.claims.is_expired() {
        return Err(JwtError::Expired);
    }

    Ok(token_data.claims)
}

fn expect_type(claims: Claims, expected: TokenType) -> Result<Claims, JwtError> {
    if claims.token_type != expected {
        return Err(JwtError::WrongType {
            expected: expected.as_str(),
            actual: claims.token_type.as_str(),
        });
    }
    Ok(claims)
}

/// Validates token and checks it's an access token
pub fn validate_access_token(token: &str, secret: &str, issuer: &str) -> Result<Claims, JwtError> {
    expect_type(validate_token(token, secret, issuer)?, TokenType::Access)
}

/// Validates token and checks it's a refresh token
pub fn validate_refresh_token(
    token: &str,
    secret: &str,
    issuer: &str,
) -> Result<Claims, JwtError> {
    expect_type(validate_token(token, secret, issuer)?, TokenType::Refresh)
}

/// SHA-256 hex digest of a token, used as its storage key
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// A freshly issued access/refresh pair
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub access_claims: Claims,
    pub refresh_token: String,
    pub refresh_claims: Claims,
}

impl TokenPair {
    /// Seconds until the access token expires
    pub fn expires_in(&self) -> i64 {
        self.access_claims.exp - self.access_claims.iat
    }
}

/// Token issuance and verification bound to one signing configuration
#[derive(Clone)]
pub struct TokenService {
    secret: String,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(
        secret: impl Into<String>,
        issuer: impl Into<String>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            secret: secret.into(),
            issuer: issuer.into(),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Issues an access/refresh pair for a session
    pub fn issue_pair(&self, user_id: Uuid, session_id: Uuid) -> Result<TokenPair, JwtError> {
        let access_claims = Claims::new(
            user_id,
            session_id,
            TokenType::Access,
            &self.issuer,
            self.access_ttl,
        );
        let refresh_claims = Claims::new(
            user_id,
            session_id,
            TokenType::Refresh,
            &self.issuer,
            self.refresh_ttl,
        );

        Ok(TokenPair {
            access_token: create_token(&access_claims, &self.secret)?,
            access_claims,
            refresh_token: create_token(&refresh_claims, &self.secret)?,
            refresh_claims,
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, JwtError> {
        validate_access_token(token, &self.secret, &self.issuer)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, JwtError> {
        validate_refresh_token(token, &self.secret, &self.issuer)
    }
}
