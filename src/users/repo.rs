use crate::users::repo_types::{NewUser, User};
use async_trait::async_trait;
use sqlx::PgPool;

/// Insert failures the allocator has to tell apart. The unique index on
/// `username` is the source of truth for uniqueness; everything else is
/// opaque infrastructure trouble.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("username already taken")]
    UniqueViolation,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    /// All stored usernames starting with `prefix`, used by the allocator's
    /// pre-check. Callers filter for exact-or-numeric-suffix matches.
    async fn usernames_with_prefix(&self, prefix: &str) -> anyhow::Result<Vec<String>>;
    async fn list(&self) -> anyhow::Result<Vec<User>>;
}

pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (first_name, last_name, username, email, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, first_name, last_name, username, email, password_hash,
                      created_at, updated_at
            "#,
        )
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::UniqueViolation
            }
            _ => StoreError::Other(e.into()),
        })?;
        Ok(created)
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, first_name, last_name, username, email, password_hash,
                   created_at, updated_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn usernames_with_prefix(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        // Normalized usernames only contain [a-z0-9.], so the prefix is safe
        // to splice into a LIKE pattern.
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT username FROM users WHERE username LIKE $1 || '%'
            "#,
        )
        .bind(prefix)
        .fetch_all(&self.db)
        .await?;
        Ok(names)
    }

    async fn list(&self) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, first_name, last_name, username, email, password_hash,
                   created_at, updated_at
            FROM users
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }
}

/// Store backed by a mutex-guarded vector, with the same uniqueness contract
/// as the Postgres table. Used by `AppState::fake()` and the service tests.
#[derive(Default)]
pub struct InMemoryUserRepo {
    records: std::sync::Mutex<Vec<User>>,
}

impl InMemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepo for InMemoryUserRepo {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let mut records = self.records.lock().expect("repo lock poisoned");
        if records.iter().any(|u| u.username == user.username) {
            return Err(StoreError::UniqueViolation);
        }
        let now = time::OffsetDateTime::now_utc();
        let created = User {
            id: uuid::Uuid::new_v4(),
            first_name: user.first_name,
            last_name: user.last_name,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        records.push(created.clone());
        Ok(created)
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let records = self.records.lock().expect("repo lock poisoned");
        Ok(records.iter().find(|u| u.username == username).cloned())
    }

    async fn usernames_with_prefix(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        let records = self.records.lock().expect("repo lock poisoned");
        Ok(records
            .iter()
            .filter(|u| u.username.starts_with(prefix))
            .map(|u| u.username.clone())
            .collect())
    }

    async fn list(&self) -> anyhow::Result<Vec<User>> {
        let records = self.records.lock().expect("repo lock poisoned");
        Ok(records.clone())
    }
}
