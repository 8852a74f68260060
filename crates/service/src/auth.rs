//! Operator authentication: login, opaque tokens, role guard, bootstrap.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use triage_core::{AccountStatus, Role};
use triage_storage::{
    AuthEventStore, AuthTokenStore, NewAuthEvent, NewUser, UserRecord, UserStore,
};

use crate::error::ServiceError;

const TOKEN_TTL_HOURS: i64 = 8;
const TOKEN_BYTES: usize = 32;

/// Successful login: the plaintext token leaves the process exactly once.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

/// Authenticated caller resolved from a bearer token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

/// Login / token validation failures surfaced to HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    InvalidCredentials,
    TokenInvalid,
    TokenExpired,
    AccountNotActive,
    Forbidden,
}

/// Hash an opaque token for storage and lookup.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

fn generate_token() -> Result<String, ServiceError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| ServiceError::InvalidPayload(format!("token generation failed: {e}")))?;
    Ok(bytes.iter().map(|byte| format!("{byte:02x}")).collect())
}

/// Operator authentication and account bootstrap.
pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: Arc<dyn AuthTokenStore>,
    auth_events: Arc<dyn AuthEventStore>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn AuthTokenStore>,
        auth_events: Arc<dyn AuthEventStore>,
    ) -> Self {
        Self { users, tokens, auth_events }
    }

    /// Verify credentials and issue an opaque 8-hour token.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<Result<IssuedToken, AuthFailure>, ServiceError> {
        let user = self.users.get_user_by_email(email).await?;
        let Some(user) = user else {
            self.record_login_failure(None, email, ip_address, user_agent).await?;
            return Ok(Err(AuthFailure::InvalidCredentials));
        };

        if user.account_status != AccountStatus::Active {
            self.record_login_failure(Some(user.user_id), email, ip_address, user_agent).await?;
            return Ok(Err(AuthFailure::AccountNotActive));
        }

        let password_ok = bcrypt::verify(password, &user.password_hash).unwrap_or(false);
        if !password_ok {
            self.record_login_failure(Some(user.user_id), email, ip_address, user_agent).await?;
            return Ok(Err(AuthFailure::InvalidCredentials));
        }

        let token = generate_token()?;
        let expires_at = Utc::now() + Duration::hours(TOKEN_TTL_HOURS);
        self.tokens.insert_token(user.user_id, &hash_token(&token), expires_at).await?;

        self.auth_events
            .append_auth_event(NewAuthEvent {
                event_type: "LOGIN_SUCCEEDED".to_owned(),
                user_id: Some(user.user_id),
                ip_address: ip_address.map(str::to_owned),
                user_agent: user_agent.map(str::to_owned),
                payload: json!({}),
            })
            .await?;

        Ok(Ok(IssuedToken { token, role: user.role, expires_at }))
    }

    /// Resolve a bearer token into an authenticated active user.
    pub async fn authenticate_token(
        &self,
        token: &str,
    ) -> Result<Result<AuthenticatedUser, AuthFailure>, ServiceError> {
        let Some(record) = self.tokens.find_token(&hash_token(token)).await? else {
            return Ok(Err(AuthFailure::TokenInvalid));
        };
        if record.revoked_at.is_some() {
            return Ok(Err(AuthFailure::TokenInvalid));
        }
        if record.expires_at <= Utc::now() {
            return Ok(Err(AuthFailure::TokenExpired));
        }

        let Some(user) = self.users.get_user_by_id(record.user_id).await? else {
            return Ok(Err(AuthFailure::TokenInvalid));
        };
        if user.account_status != AccountStatus::Active {
            return Ok(Err(AuthFailure::AccountNotActive));
        }

        self.tokens.touch_last_used(record.id).await?;
        Ok(Ok(AuthenticatedUser { user_id: user.user_id, email: user.email, role: user.role }))
    }

    /// Admin-only guard.
    pub fn require_admin(user: &AuthenticatedUser) -> Result<(), AuthFailure> {
        if user.role == Role::Admin {
            Ok(())
        } else {
            Err(AuthFailure::Forbidden)
        }
    }

    /// Audit-read guard (admin or reader).
    pub fn require_audit_read(user: &AuthenticatedUser) -> Result<(), AuthFailure> {
        match user.role {
            Role::Admin | Role::Reader => Ok(()),
        }
    }

    /// Create an operator account with a bcrypt-hashed password.
    pub async fn create_user(
        &self,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<UserRecord, ServiceError> {
        let password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
            .map_err(|e| ServiceError::InvalidPayload(format!("password hash failed: {e}")))?;
        Ok(self
            .users
            .create_user(NewUser {
                user_id: Uuid::new_v4(),
                email: email.to_owned(),
                password_hash,
                role,
                account_status: AccountStatus::Active,
            })
            .await?)
    }

    /// Seed the first admin account when none exists.
    pub async fn bootstrap_admin(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<UserRecord>, ServiceError> {
        if self.users.any_active_admin().await? {
            tracing::info!("active admin already present, bootstrap skipped");
            return Ok(None);
        }
        let user = self.create_user(email, password, Role::Admin).await?;
        self.auth_events
            .append_auth_event(NewAuthEvent {
                event_type: "ADMIN_BOOTSTRAPPED".to_owned(),
                user_id: Some(user.user_id),
                ip_address: None,
                user_agent: None,
                payload: json!({"email": user.email}),
            })
            .await?;
        tracing::info!(email = %user.email, "bootstrap admin created");
        Ok(Some(user))
    }

    async fn record_login_failure(
        &self,
        user_id: Option<Uuid>,
        email: &str,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<(), ServiceError> {
        self.auth_events
            .append_auth_event(NewAuthEvent {
                event_type: "LOGIN_FAILED".to_owned(),
                user_id,
                ip_address: ip_address.map(str::to_owned),
                user_agent: user_agent.map(str::to_owned),
                payload: json!({"email": email}),
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_hash_is_deterministic_hex() {
        let first = hash_token("abc");
        let second = hash_token("abc");

        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, hash_token("abd"));
    }
}
