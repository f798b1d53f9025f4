/// Account manager implementation using runtime queries
use crate::{
    account::{Role, UserUpdate},
    config::ServerConfig,
    db::{
        self,
        account::{Session, User},
    },
    error::{MarketError, MarketResult},
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::sync::Arc;

const SESSION_TOKEN_LENGTH: usize = 48;

const REFERRAL_CODE_ATTEMPTS: usize = 4;

const USER_COLUMNS: &str = "user_id, email, password_hash, name, phone, picture, role, is_blocked,
     referral_code, referral_count, created_at";

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
    config: Arc<ServerConfig>,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>) -> Self {
        Self { db, config }
    }

    /// Register a new password account
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
        phone: Option<String>,
    ) -> MarketResult<User> {
        let email = normalize_email(email);

        if self.email_exists(&email).await? {
            return Err(MarketError::Validation("Email already registered".to_string()));
        }

        let password_hash = hash_password(password)?;
        let role = if self.config.authentication.admin_emails.contains(&email) {
            Role::Admin
        } else {
            Role::User
        };

        let user_id = db::generate_id("user", 12);
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO users (user_id, email, password_hash, name, phone, picture, role, is_blocked, referral_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, 0, 0, ?7)",
        )
        .bind(&user_id)
        .bind(&email)
        .bind(&password_hash)
        .bind(name)
        .bind(&phone)
        .bind(role.as_str())
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(|e| match e {
            // Lost a race with a concurrent registration for the same email
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                MarketError::Validation("Email already registered".to_string())
            }
            other => MarketError::Database(other),
        })?;

        tracing::info!("Registered user {} ({})", user_id, role.as_str());

        Ok(User {
            user_id,
            email,
            password_hash: Some(password_hash),
            name: name.to_string(),
            phone,
            picture: None,
            role,
            is_blocked: false,
            referral_code: None,
            referral_count: 0,
            created_at: now,
        })
    }

    /// Authenticate with email and password and create a session
    pub async fn login(&self, email: &str, password: &str) -> MarketResult<(User, Session)> {
        let invalid = || MarketError::Authentication("Invalid credentials".to_string());

        let user = self
            .find_user_by_email(&normalize_email(email))
            .await?
            .ok_or_else(invalid)?;

        let stored_hash = user.password_hash.as_deref().ok_or_else(invalid)?;
        if !verify_password(password, stored_hash) {
            return Err(invalid());
        }

        if user.is_blocked {
            return Err(MarketError::Authorization("Account is blocked".to_string()));
        }

        let session = self.create_session(&user.user_id).await?;

        Ok((user, session))
    }

    /// Create a session for a user
    pub async fn create_session(&self, user_id: &str) -> MarketResult<Session> {
        let session_token = generate_session_token();
        let now = Utc::now();
        let expires_at = now + Duration::days(self.config.authentication.session_lifetime_days);

        sqlx::query(
            "INSERT INTO sessions (session_token, user_id, expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&session_token)
        .bind(user_id)
        .bind(expires_at)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(Session {
            session_token,
            user_id: user_id.to_string(),
            expires_at,
            created_at: now,
        })
    }

    /// Resolve a session token to its user
    ///
    /// Unknown or expired tokens are authentication failures; blocked users
    /// are rejected with an authorization failure.
    pub async fn validate_session(&self, token: &str) -> MarketResult<User> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT session_token, user_id, expires_at, created_at FROM sessions WHERE session_token = ?1",
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| MarketError::Authentication("Not authenticated".to_string()))?;

        if Utc::now() > session.expires_at {
            return Err(MarketError::Authentication("Session expired".to_string()));
        }

        let user = self
            .find_user(&session.user_id)
            .await?
            .ok_or_else(|| MarketError::Authentication("Not authenticated".to_string()))?;

        if user.is_blocked {
            return Err(MarketError::Authorization("Account is blocked".to_string()));
        }

        Ok(user)
    }

    /// Delete a session (logout)
    pub async fn delete_session(&self, token: &str) -> MarketResult<()> {
        sqlx::query("DELETE FROM sessions WHERE session_token = ?1")
            .bind(token)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Get a user by id
    pub async fn get_user(&self, user_id: &str) -> MarketResult<User> {
        self.find_user(user_id)
            .await?
            .ok_or_else(|| MarketError::NotFound("User not found".to_string()))
    }

    /// Find a user by id
    pub async fn find_user(&self, user_id: &str) -> MarketResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE user_id = ?1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> MarketResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS))
            .bind(email)
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn email_exists(&self, email: &str) -> MarketResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?1")
            .bind(email)
            .fetch_one(&self.db)
            .await?;

        Ok(count > 0)
    }

    /// List users, newest first
    pub async fn list_users(&self, offset: i64, limit: i64) -> MarketResult<(Vec<User>, i64)> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
            USER_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        let users = rows.iter().map(user_from_row).collect::<MarketResult<Vec<_>>>()?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await?;

        Ok((users, total))
    }

    /// Apply an admin update to role, name and blocked flag
    pub async fn update_user(&self, user_id: &str, update: UserUpdate) -> MarketResult<User> {
        let mut user = self.get_user(user_id).await?;

        if let Some(role) = update.role.as_deref() {
            user.role = Role::from_str(role)?;
        }
        if let Some(name) = update.name {
            user.name = name;
        }
        if let Some(is_blocked) = update.is_blocked {
            user.is_blocked = is_blocked;
        }

        sqlx::query("UPDATE users SET role = ?1, name = ?2, is_blocked = ?3 WHERE user_id = ?4")
            .bind(user.role.as_str())
            .bind(&user.name)
            .bind(user.is_blocked)
            .bind(user_id)
            .execute(&self.db)
            .await?;

        tracing::info!(
            "Updated user {}: role={}, blocked={}",
            user_id,
            user.role.as_str(),
            user.is_blocked
        );

        Ok(user)
    }

    /// Delete a user together with their ads and sessions
    ///
    /// Favorites and messages that reference the user are left in place.
    pub async fn delete_user_cascade(&self, user_id: &str) -> MarketResult<(u64, u64)> {
        let mut tx = self.db.begin().await?;

        let ads = sqlx::query("DELETE FROM ads WHERE user_id = ?1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let sessions = sqlx::query("DELETE FROM sessions WHERE user_id = ?1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let users = sqlx::query("DELETE FROM users WHERE user_id = ?1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if users == 0 {
            tx.rollback().await?;
            return Err(MarketError::NotFound("User not found".to_string()));
        }

        tx.commit().await?;

        tracing::info!(
            "Deleted user {} with {} ads and {} sessions",
            user_id,
            ads,
            sessions
        );

        Ok((ads, sessions))
    }

    /// Get the user's referral code, creating it on first use
    ///
    /// The code derives from the user id; if another account already holds
    /// it, a random code is assigned instead.
    pub async fn referral_code(&self, user: &User) -> MarketResult<(String, i64)> {
        if let Some(code) = &user.referral_code {
            return Ok((code.clone(), user.referral_count));
        }

        let suffix_start = user.user_id.len().saturating_sub(8);
        let mut candidate = format!("ref_{}", &user.user_id[suffix_start..]);
        for _ in 0..REFERRAL_CODE_ATTEMPTS {
            if self.claim_referral_code(&user.user_id, &candidate).await? {
                break;
            }
            tracing::debug!("Referral code {} is taken", candidate);
            candidate = db::generate_id("ref", 12);
        }

        // Re-read: a concurrent request may have assigned a code first
        let stored: Option<String> =
            sqlx::query_scalar("SELECT referral_code FROM users WHERE user_id = ?1")
                .bind(&user.user_id)
                .fetch_optional(&self.db)
                .await?
                .ok_or_else(|| MarketError::NotFound("User not found".to_string()))?;

        let code = stored
            .ok_or_else(|| MarketError::Internal("Could not assign a referral code".to_string()))?;
        Ok((code, user.referral_count))
    }

    /// Set the code unless the user already has one; false when another user holds it
    async fn claim_referral_code(&self, user_id: &str, code: &str) -> MarketResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET referral_code = ?1 WHERE user_id = ?2 AND referral_code IS NULL",
        )
        .bind(code)
        .bind(user_id)
        .execute(&self.db)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(sqlx::Error::Database(ref db_err)) if db_err.is_unique_violation() => Ok(false),
            Err(e) => Err(MarketError::Database(e)),
        }
    }

    /// Credit a referral to the owner of `ref_code`, returning the referrer id
    pub async fn track_referral(&self, ref_code: &str) -> MarketResult<Option<String>> {
        let referrer: Option<String> = sqlx::query_scalar(
            "UPDATE users SET referral_count = referral_count + 1 WHERE referral_code = ?1 RETURNING user_id",
        )
        .bind(ref_code)
        .fetch_optional(&self.db)
        .await?;

        if let Some(ref user_id) = referrer {
            tracing::info!("Referral tracked for {}", user_id);
        }

        Ok(referrer)
    }

    /// Cleanup expired sessions
    pub async fn cleanup_expired_sessions(&self) -> MarketResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?1")
            .bind(Utc::now())
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }

    /// Count all users
    pub async fn count_users(&self) -> MarketResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn generate_session_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Hash a password with Argon2id and a random salt
fn hash_password(password: &str) -> MarketResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| MarketError::Internal(format!("Password hashing failed: {}", e)))
}

fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(p) => p,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

pub(crate) fn user_from_row(row: &SqliteRow) -> MarketResult<User> {
    let role: String = row.try_get("role")?;

    Ok(User {
        user_id: row.try_get("user_id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        picture: row.try_get("picture")?,
        role: Role::from_str(&role)?,
        is_blocked: row.try_get("is_blocked")?,
        referral_code: row.try_get("referral_code")?,
        referral_count: row.try_get("referral_count")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    async fn create_test_manager() -> AccountManager {
        let db = db::create_memory_pool().await.unwrap();
        let mut config = ServerConfig::for_tests(PathBuf::from("./data"));
        config.authentication.admin_emails = vec!["boss@x67.ro".to_string()];
        AccountManager::new(db, Arc::new(config))
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let manager = create_test_manager().await;

        let user = manager
            .register("Ana@Example.com", "hunter22", "Ana", None)
            .await
            .unwrap();
        assert!(user.user_id.starts_with("user_"));
        assert_eq!(user.email, "ana@example.com");
        assert_eq!(user.role, Role::User);

        let (logged_in, session) = manager.login("ana@example.com", "hunter22").await.unwrap();
        assert_eq!(logged_in.user_id, user.user_id);
        assert_eq!(session.session_token.len(), SESSION_TOKEN_LENGTH);

        let resolved = manager.validate_session(&session.session_token).await.unwrap();
        assert_eq!(resolved.user_id, user.user_id);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let manager = create_test_manager().await;
        manager.register("dup@x67.ro", "pw", "One", None).await.unwrap();

        let result = manager.register("DUP@x67.ro", "pw", "Two", None).await;
        match result.unwrap_err() {
            MarketError::Validation(msg) => assert_eq!(msg, "Email already registered"),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let manager = create_test_manager().await;
        manager.register("a@x67.ro", "right", "A", None).await.unwrap();

        match manager.login("a@x67.ro", "wrong").await.unwrap_err() {
            MarketError::Authentication(msg) => assert_eq!(msg, "Invalid credentials"),
            other => panic!("Expected authentication error, got {:?}", other),
        }
        assert!(manager.login("nobody@x67.ro", "right").await.is_err());
    }

    #[tokio::test]
    async fn test_configured_admin_email_gets_admin_role() {
        let manager = create_test_manager().await;
        let user = manager.register("boss@x67.ro", "pw", "Boss", None).await.unwrap();
        assert!(user.is_admin());
    }

    #[tokio::test]
    async fn test_blocked_user_cannot_authenticate() {
        let manager = create_test_manager().await;
        let user = manager.register("b@x67.ro", "pw", "B", None).await.unwrap();
        let (_, session) = manager.login("b@x67.ro", "pw").await.unwrap();

        manager
            .update_user(
                &user.user_id,
                UserUpdate {
                    is_blocked: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            manager.validate_session(&session.session_token).await,
            Err(MarketError::Authorization(_))
        ));
        assert!(matches!(
            manager.login("b@x67.ro", "pw").await,
            Err(MarketError::Authorization(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_session_rejected_and_cleaned_up() {
        let manager = create_test_manager().await;
        let user = manager.register("e@x67.ro", "pw", "E", None).await.unwrap();

        let past = Utc::now() - Duration::hours(1);
        sqlx::query(
            "INSERT INTO sessions (session_token, user_id, expires_at, created_at) VALUES ('old', ?1, ?2, ?2)",
        )
        .bind(&user.user_id)
        .bind(past)
        .execute(&manager.db)
        .await
        .unwrap();

        match manager.validate_session("old").await.unwrap_err() {
            MarketError::Authentication(msg) => assert_eq!(msg, "Session expired"),
            other => panic!("Expected authentication error, got {:?}", other),
        }

        let live = manager.create_session(&user.user_id).await.unwrap();
        assert_eq!(manager.cleanup_expired_sessions().await.unwrap(), 1);
        assert!(manager.validate_session(&live.session_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_logout_invalidates_token() {
        let manager = create_test_manager().await;
        manager.register("l@x67.ro", "pw", "L", None).await.unwrap();
        let (_, session) = manager.login("l@x67.ro", "pw").await.unwrap();

        manager.delete_session(&session.session_token).await.unwrap();
        assert!(manager.validate_session(&session.session_token).await.is_err());
    }

    #[tokio::test]
    async fn test_referral_code_and_tracking() {
        let manager = create_test_manager().await;
        let user = manager.register("r@x67.ro", "pw", "R", None).await.unwrap();

        let (code, count) = manager.referral_code(&user).await.unwrap();
        assert_eq!(code, format!("ref_{}", &user.user_id[user.user_id.len() - 8..]));
        assert_eq!(count, 0);

        let referrer = manager.track_referral(&code).await.unwrap();
        assert_eq!(referrer.as_deref(), Some(user.user_id.as_str()));
        assert_eq!(manager.track_referral("ref_unknown").await.unwrap(), None);

        let reloaded = manager.get_user(&user.user_id).await.unwrap();
        assert_eq!(reloaded.referral_count, 1);
        assert_eq!(manager.referral_code(&reloaded).await.unwrap(), (code, 1));
    }

    #[tokio::test]
    async fn test_referral_code_falls_back_when_taken() {
        let manager = create_test_manager().await;
        let first = manager.register("a@x67.ro", "pw", "A", None).await.unwrap();
        let second = manager.register("b@x67.ro", "pw", "B", None).await.unwrap();

        // Hand the second user's derived code to the first user
        let derived = format!("ref_{}", &second.user_id[second.user_id.len() - 8..]);
        sqlx::query("UPDATE users SET referral_code = ?1 WHERE user_id = ?2")
            .bind(&derived)
            .bind(&first.user_id)
            .execute(&manager.db)
            .await
            .unwrap();

        let (code, _) = manager.referral_code(&second).await.unwrap();
        assert_ne!(code, derived);
        assert!(code.starts_with("ref_"));

        let reloaded = manager.get_user(&second.user_id).await.unwrap();
        assert_eq!(reloaded.referral_code.as_deref(), Some(code.as_str()));

        // A stale user value still returns the stored code
        assert_eq!(manager.referral_code(&second).await.unwrap().0, code);
    }

    #[tokio::test]
    async fn test_update_user_invalid_role() {
        let manager = create_test_manager().await;
        let user = manager.register("u@x67.ro", "pw", "U", None).await.unwrap();

        let result = manager
            .update_user(
                &user.user_id,
                UserUpdate {
                    role: Some("overlord".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(MarketError::Validation(_))));
    }
}
