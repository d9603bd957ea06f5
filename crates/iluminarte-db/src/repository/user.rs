//! # User Repository
//!
//! The account directory: staff accounts, passwords and permissions.
//!
//! ## Authentication
//! ```text
//! authenticate("  caja1 ", "s3cret-pass")
//!      │
//!      ▼
//! username trimmed → row lookup → is_active? → argon2 verify
//!      │                              │             │
//!      ▼                              ▼             ▼
//!  None (unknown)               None (inactive)  Some(UserIdentity) / None
//! ```
//!
//! Passwords are stored as argon2 PHC strings and never leave this module
//! in clear text.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use iluminarte_core::validation::{validate_password, validate_username};
use iluminarte_core::{CoreError, Entity, NewUser, Permission, User, UserIdentity, UserUpdate};

const USER_COLUMNS: &str = "id, username, first_name, last_name, email, \
    is_staff, is_active, is_superuser, password_hash, created_at";

/// Repository for account database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Creates a regular account.
    ///
    /// ## Returns
    /// * `Err(Domain(Validation))` - Bad username or weak password
    /// * `Err(Domain(DuplicateUsername))` - Username taken
    pub async fn create(&self, new: &NewUser) -> DbResult<User> {
        self.insert(new, false).await
    }

    /// Creates an account holding every permission.
    pub async fn create_superuser(&self, new: &NewUser) -> DbResult<User> {
        self.insert(new, true).await
    }

    async fn insert(&self, new: &NewUser, superuser: bool) -> DbResult<User> {
        let username = new.username.trim();
        validate_username(username)?;
        validate_password(&new.password)?;

        debug!(username = %username, superuser, "Creating user");

        if self.get_by_username(username).await?.is_some() {
            return Err(CoreError::DuplicateUsername {
                username: username.to_string(),
            }
            .into());
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            first_name: new.first_name.trim().to_string(),
            last_name: new.last_name.trim().to_string(),
            email: new.email.trim().to_string(),
            is_staff: new.is_staff || superuser,
            is_active: new.is_active,
            is_superuser: superuser,
            password_hash: hash_password(&new.password)?,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, first_name, last_name, email,
                is_staff, is_active, is_superuser, password_hash, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(user.is_staff)
        .bind(user.is_active)
        .bind(user.is_superuser)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } if field.contains("users.username") => {
                DbError::Domain(CoreError::DuplicateUsername {
                    username: user.username.clone(),
                })
            }
            other => other,
        })?;

        info!(user_id = %user.id, username = %user.username, "User created");
        Ok(user)
    }

    /// Replaces profile fields and flags.
    pub async fn update(&self, id: &str, update: &UserUpdate) -> DbResult<User> {
        debug!(id = %id, "Updating user");

        let result = sqlx::query(
            r#"
            UPDATE users SET
                first_name = ?2,
                last_name = ?3,
                email = ?4,
                is_staff = ?5,
                is_active = ?6
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(update.first_name.trim())
        .bind(update.last_name.trim())
        .bind(update.email.trim())
        .bind(update.is_staff)
        .bind(update.is_active)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(Entity::User, id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found(Entity::User, id))
    }

    /// Replaces the password of an account.
    pub async fn set_password(&self, id: &str, password: &str) -> DbResult<()> {
        validate_password(password)?;

        debug!(id = %id, "Setting password");

        let result = sqlx::query("UPDATE users SET password_hash = ?2 WHERE id = ?1")
            .bind(id)
            .bind(hash_password(password)?)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(Entity::User, id));
        }

        Ok(())
    }

    /// Checks credentials.
    ///
    /// ## Returns
    /// * `Ok(Some(identity))` - Active account, matching password
    /// * `Ok(None)` - Unknown username, inactive account or wrong password
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> DbResult<Option<UserIdentity>> {
        let Some(user) = self.get_by_username(username.trim()).await? else {
            debug!("Authentication failed: unknown username");
            return Ok(None);
        };

        if !user.is_active || !verify_password(password, &user.password_hash) {
            debug!(user_id = %user.id, "Authentication failed");
            return Ok(None);
        }

        Ok(Some(user.identity()))
    }

    // =========================================================================
    // Permissions
    // =========================================================================

    /// Grants a permission. Granting twice is a no-op.
    pub async fn grant(&self, id: &str, permission: Permission) -> DbResult<()> {
        self.require(id).await?;

        sqlx::query(
            "INSERT INTO user_permissions (user_id, permission) VALUES (?1, ?2) \
             ON CONFLICT (user_id, permission) DO NOTHING",
        )
        .bind(id)
        .bind(permission)
        .execute(&self.pool)
        .await?;

        info!(user_id = %id, permission = permission.as_str(), "Permission granted");
        Ok(())
    }

    /// Revokes a permission. Revoking a missing one is a no-op.
    pub async fn revoke(&self, id: &str, permission: Permission) -> DbResult<()> {
        self.require(id).await?;

        sqlx::query("DELETE FROM user_permissions WHERE user_id = ?1 AND permission = ?2")
            .bind(id)
            .bind(permission)
            .execute(&self.pool)
            .await?;

        info!(user_id = %id, permission = permission.as_str(), "Permission revoked");
        Ok(())
    }

    /// Whether an account holds a permission.
    ///
    /// Superusers hold every permission; inactive accounts hold none.
    pub async fn has_permission(&self, id: &str, permission: Permission) -> DbResult<bool> {
        let allowed: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT u.is_active AND (
                u.is_superuser OR EXISTS (
                    SELECT 1 FROM user_permissions p
                    WHERE p.user_id = u.id AND p.permission = ?2
                )
            )
            FROM users u
            WHERE u.id = ?1
            "#,
        )
        .bind(id)
        .bind(permission)
        .fetch_optional(&self.pool)
        .await?;

        match allowed {
            Some(flag) => Ok(flag != 0),
            None => Err(DbError::not_found(Entity::User, id)),
        }
    }

    /// Explicitly granted permissions (superuser status not included).
    pub async fn permissions(&self, id: &str) -> DbResult<Vec<Permission>> {
        let permissions = sqlx::query_scalar::<_, Permission>(
            "SELECT permission FROM user_permissions WHERE user_id = ?1 ORDER BY permission",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(permissions)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Lists every account ordered by username.
    pub async fn list(&self) -> DbResult<Vec<User>> {
        let sql = format!("SELECT {} FROM users ORDER BY username", USER_COLUMNS);
        let users = sqlx::query_as::<_, User>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }

    /// Gets an account by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Gets an account by its username.
    pub async fn get_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// The identity a sale is recorded under.
    pub async fn identity(&self, id: &str) -> DbResult<UserIdentity> {
        Ok(self.require(id).await?.identity())
    }

    async fn require(&self, id: &str) -> DbResult<User> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found(Entity::User, id))
    }
}

// =============================================================================
// Password Hashing
// =============================================================================

/// Hashes a password into an argon2 PHC string.
fn hash_password(password: &str) -> DbResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verifies a password against a stored PHC string. Unparseable hashes fail.
fn verify_password(password: &str, hash: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use iluminarte_core::ValidationError;

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn ana() -> NewUser {
        NewUser {
            first_name: "Ana".to_string(),
            last_name: "Rojas".to_string(),
            email: "ana@iluminarte.cl".to_string(),
            ..NewUser::new("  ana ", "s3cret-pass")
        }
    }

    #[tokio::test]
    async fn test_create_and_authenticate() {
        let db = setup().await;
        let users = db.users();

        let user = users.create(&ana()).await.unwrap();
        assert_eq!(user.username, "ana");
        assert_ne!(user.password_hash, "s3cret-pass");
        assert!(user.password_hash.starts_with("$argon2"));

        let identity = users.authenticate(" ana ", "s3cret-pass").await.unwrap().unwrap();
        assert_eq!(identity.id, user.id);
        assert_eq!(identity.display_name, "Ana Rojas");

        assert!(users.authenticate("ana", "wrong-pass").await.unwrap().is_none());
        assert!(users.authenticate("nobody", "s3cret-pass").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_and_validation() {
        let db = setup().await;
        let users = db.users();
        users.create(&ana()).await.unwrap();

        assert!(matches!(
            users.create(&NewUser::new("ana", "other-pass")).await,
            Err(DbError::Domain(CoreError::DuplicateUsername { .. }))
        ));
        assert!(matches!(
            users.create(&NewUser::new("bob", "12345678")).await,
            Err(DbError::Domain(CoreError::Validation(ValidationError::InvalidFormat { .. })))
        ));
        assert!(matches!(
            users.create(&NewUser::new("b o b", "s3cret-pass")).await,
            Err(DbError::Domain(CoreError::Validation(_)))
        ));
    }

    #[tokio::test]
    async fn test_inactive_users_never_authenticate() {
        let db = setup().await;
        let users = db.users();
        let user = users.create(&ana()).await.unwrap();

        let updated = users
            .update(
                &user.id,
                &UserUpdate {
                    first_name: "Ana".to_string(),
                    last_name: "Rojas".to_string(),
                    email: String::new(),
                    is_staff: true,
                    is_active: false,
                },
            )
            .await
            .unwrap();
        assert!(updated.is_staff);
        assert!(!updated.is_active);

        assert!(users.authenticate("ana", "s3cret-pass").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_password() {
        let db = setup().await;
        let users = db.users();
        let user = users.create(&ana()).await.unwrap();

        users.set_password(&user.id, "n3w-password").await.unwrap();
        assert!(users.authenticate("ana", "s3cret-pass").await.unwrap().is_none());
        assert!(users.authenticate("ana", "n3w-password").await.unwrap().is_some());

        assert!(users.set_password(&user.id, "short").await.is_err());
        assert!(matches!(
            users.set_password("missing", "n3w-password").await,
            Err(DbError::Domain(CoreError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_permissions() {
        let db = setup().await;
        let users = db.users();
        let user = users.create(&ana()).await.unwrap();
        let admin = users
            .create_superuser(&NewUser::new("admin", "adm1n-pass"))
            .await
            .unwrap();

        assert!(!users.has_permission(&user.id, Permission::AddUser).await.unwrap());

        users.grant(&user.id, Permission::AddUser).await.unwrap();
        users.grant(&user.id, Permission::AddUser).await.unwrap();
        assert!(users.has_permission(&user.id, Permission::AddUser).await.unwrap());
        assert!(!users.has_permission(&user.id, Permission::ChangeUser).await.unwrap());
        assert_eq!(users.permissions(&user.id).await.unwrap(), vec![Permission::AddUser]);

        users.revoke(&user.id, Permission::AddUser).await.unwrap();
        assert!(!users.has_permission(&user.id, Permission::AddUser).await.unwrap());

        for permission in Permission::ALL {
            assert!(users.has_permission(&admin.id, permission).await.unwrap());
        }
        assert!(admin.is_staff);

        assert!(users.has_permission("missing", Permission::ViewUser).await.is_err());
        assert!(users.grant("missing", Permission::ViewUser).await.is_err());
    }

    #[tokio::test]
    async fn test_list_ordered_by_username() {
        let db = setup().await;
        let users = db.users();
        users.create(&NewUser::new("zoe", "s3cret-pass")).await.unwrap();
        users.create(&ana()).await.unwrap();

        let names: Vec<String> = users.list().await.unwrap().into_iter().map(|u| u.username).collect();
        assert_eq!(names, vec!["ana", "zoe"]);

        let zoe = users.get_by_username("zoe").await.unwrap().unwrap();
        assert_eq!(users.identity(&zoe.id).await.unwrap().display_name, "zoe");
    }
}
