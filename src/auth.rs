//! Email + password accounts.
//!
//! Credentials are checked for shape before anything touches the store, and
//! every failure carries the message the sign-in form shows to the user.

use crate::db::models::User;
use crate::db::{is_constraint_violation, Database};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::LazyLock;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

const MAX_EMAIL_LEN: usize = 255;
const MIN_PASSWORD_LEN: usize = 6;
const MAX_PASSWORD_LEN: usize = 100;
const PBKDF2_ROUNDS: u32 = if cfg!(test) { 1_000 } else { 210_000 };

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Invalid(&'static str),
    #[error("This email is already registered. Please login instead.")]
    AlreadyRegistered,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Not signed in")]
    NotSignedIn,
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    /// Normalises the email and checks both fields.
    pub fn validate(self) -> Result<Self, AuthError> {
        let email = self.email.trim().to_lowercase();
        if !EMAIL.is_match(&email) {
            return Err(AuthError::Invalid("Invalid email address"));
        }
        if email.chars().count() > MAX_EMAIL_LEN {
            return Err(AuthError::Invalid("Email must be less than 255 characters"));
        }
        let len = self.password.chars().count();
        if len < MIN_PASSWORD_LEN {
            return Err(AuthError::Invalid("Password must be at least 6 characters"));
        }
        if len > MAX_PASSWORD_LEN {
            return Err(AuthError::Invalid(
                "Password must be less than 100 characters",
            ));
        }
        Ok(Self {
            email,
            password: self.password,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
}

/// PBKDF2-HMAC-SHA256, hex encoded.
fn hash_password(salt: &str, password: &str) -> String {
    let mut out = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), PBKDF2_ROUNDS, &mut out);
    out.iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn sign_up(db: &Database, credentials: Credentials) -> Result<User, AuthError> {
    let credentials = credentials.validate()?;
    let salt = uuid::Uuid::new_v4().simple().to_string();
    let hash = hash_password(&salt, &credentials.password);
    match db.create_user(&credentials.email, &hash, &salt) {
        Ok(user) => {
            tracing::info!(user_id = %user.id, "account created");
            Ok(user)
        }
        Err(e) if is_constraint_violation(&e) => Err(AuthError::AlreadyRegistered),
        Err(e) => Err(e.into()),
    }
}

pub fn sign_in(db: &Database, credentials: Credentials) -> Result<AuthSession, AuthError> {
    let credentials = credentials.validate()?;
    let user = db
        .find_user(&credentials.email)?
        .ok_or(AuthError::InvalidCredentials)?;
    if hash_password(&user.salt, &credentials.password) != user.password_hash {
        return Err(AuthError::InvalidCredentials);
    }
    let token = db.create_auth_session(&user.id)?;
    Ok(AuthSession { token, user })
}

pub fn sign_out(db: &Database, token: &str) -> Result<(), AuthError> {
    if db.delete_auth_session(token)? {
        Ok(())
    } else {
        Err(AuthError::NotSignedIn)
    }
}

pub fn current_user(db: &Database, token: &str) -> Result<User, AuthError> {
    db.session_user(token)?.ok_or(AuthError::NotSignedIn)
}
