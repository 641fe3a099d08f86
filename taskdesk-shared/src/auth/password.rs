/// Password hashing and policy
///
/// Passwords are hashed with Argon2id and stored as PHC strings, so the
/// parameters travel with each hash and can be raised later without
/// invalidating existing accounts.
///
/// # Parameters
///
/// - **Memory**: 64 MiB
/// - **Iterations**: 3
/// - **Parallelism**: 4 lanes
/// - **Salt**: 16 random bytes from the OS RNG
///
/// # Example
///
/// ```
/// use taskdesk_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Correct-Horse-9")?;
/// assert!(verify_password("Correct-Horse-9", &hash)?);
/// assert!(!verify_password("wrong", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

/// Shortest password accepted at registration or password change
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Longest password accepted (bounds hashing cost per request)
pub const MAX_PASSWORD_LENGTH: usize = 128;

const MEMORY_KIB: u32 = 64 * 1024;
const ITERATIONS: u32 = 3;
const LANES: u32 = 4;

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashError(String),

    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(MEMORY_KIB, ITERATIONS, LANES, Some(32))
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes a password, returning a PHC string (`$argon2id$v=19$m=65536,t=3,p=4$...`)
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

    Ok(hash.to_string())
}

/// Verifies a password against a stored PHC hash
///
/// `Ok(false)` means the password is wrong; `Err` means the stored hash
/// is not a PHC string at all. A PHC string with missing or garbled fields
/// never verifies and comes back as `Ok(false)`.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

    // Parameters are read from the hash itself
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(format!("Verification failed: {}", e))),
    }
}

/// Checks a candidate password against the password policy
///
/// Requires 8-128 characters with at least one uppercase letter, one
/// lowercase letter, one digit and one symbol. Returns the first rule that
/// fails as a user-facing message.
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    let length = password.chars().count();

    let rules: [(bool, &str); 6] = [
        (
            length >= MIN_PASSWORD_LENGTH,
            "Password must be at least 8 characters long",
        ),
        (
            length <= MAX_PASSWORD_LENGTH,
            "Password must be at most 128 characters long",
        ),
        (
            password.chars().any(char::is_uppercase),
            "Password must contain at least one uppercase letter",
        ),
        (
            password.chars().any(char::is_lowercase),
            "Password must contain at least one lowercase letter",
        ),
        (
            password.chars().any(|c| c.is_ascii_digit()),
            "Password must contain at least one digit",
        ),
        (
            password.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace()),
            "Password must contain at least one special character",
        ),
    ];

    match rules.iter().find(|(ok, _)| !ok) {
        Some((_, message)) => Err(message.to_string()),
        None => Ok(()),
    }
}
