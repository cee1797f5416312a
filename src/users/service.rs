use std::sync::Arc;

use axum::extract::FromRef;
use tracing::{info, warn};

use crate::auth::jwt::JwtKeys;
use crate::auth::password::PasswordHasher;
use crate::state::AppState;
use crate::users::repo::{StoreError, UserRepo};
use crate::users::repo_types::{NewUser, User};
use crate::users::username;

/// Insert attempts before allocation gives up under pathological
/// concurrent load on the same base name.
pub const MAX_ALLOC_ATTEMPTS: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("{0}")]
    Validation(String),
    #[error("could not allocate a unique username")]
    UsernameConflict,
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub email: Option<String>,
}

pub struct UserService {
    repo: Arc<dyn UserRepo>,
    hasher: PasswordHasher,
    keys: JwtKeys,
}

impl FromRef<AppState> for UserService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            state.users.clone(),
            state.hasher.clone(),
            JwtKeys::from_config(&state.config.jwt),
        )
    }
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepo>, hasher: PasswordHasher, keys: JwtKeys) -> Self {
        Self { repo, hasher, keys }
    }

    /// Allocates a unique username, hashes the password and persists the
    /// record.
    ///
    /// The pre-check against existing usernames is only an optimization; the
    /// store's unique index decides. When a concurrent insert grabs the
    /// candidate first, the store reports a unique violation and allocation
    /// re-reads and moves on to the next free suffix, bounded by
    /// [`MAX_ALLOC_ATTEMPTS`].
    pub async fn create_user(&self, input: CreateUser) -> Result<User, UserError> {
        let base = username::base_candidate(&input.first_name, &input.last_name).ok_or_else(
            || {
                UserError::Validation(
                    "first and last name contain no usable characters".to_string(),
                )
            },
        )?;

        let password_hash = self.hasher.hash_password(&input.password)?;

        for attempt in 1..=MAX_ALLOC_ATTEMPTS {
            let existing = self.repo.usernames_with_prefix(&base).await?;
            let candidate = username::pick_available(&base, &existing);

            match self
                .repo
                .insert(NewUser {
                    first_name: input.first_name.clone(),
                    last_name: input.last_name.clone(),
                    username: candidate.clone(),
                    email: input.email.clone(),
                    password_hash: password_hash.clone(),
                })
                .await
            {
                Ok(user) => {
                    info!(user_id = %user.id, username = %user.username, "user created");
                    return Ok(user);
                }
                Err(StoreError::UniqueViolation) => {
                    warn!(candidate = %candidate, attempt, "username taken concurrently, retrying");
                    continue;
                }
                Err(StoreError::Other(e)) => return Err(UserError::Internal(e)),
            }
        }

        warn!(base = %base, "username allocation exhausted retries");
        Err(UserError::UsernameConflict)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, UserError> {
        Ok(self.repo.list().await?)
    }

    /// Verifies credentials and issues an access token.
    ///
    /// Unknown username and wrong password are indistinguishable to the
    /// caller.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(User, String), UserError> {
        let user = self
            .repo
            .find_by_username(username)
            .await?
            .ok_or(UserError::InvalidCredentials)?;

        if !self.hasher.verify_password(password, &user.password_hash)? {
            warn!(username = %username, "login with invalid password");
            return Err(UserError::InvalidCredentials);
        }

        let token = self.keys.sign(&user.username)?;
        info!(user_id = %user.id, username = %user.username, "user logged in");
        Ok((user, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use crate::users::repo::InMemoryUserRepo;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn make_keys() -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: "test".into(),
            issuer: "test".into(),
            audience: "test".into(),
            ttl_minutes: 30,
        })
    }

    fn make_service(repo: Arc<dyn UserRepo>) -> UserService {
        UserService::new(repo, PasswordHasher::new(1).unwrap(), make_keys())
    }

    fn create_input(first: &str, last: &str) -> CreateUser {
        CreateUser {
            first_name: first.into(),
            last_name: last.into(),
            password: "hunter2!".into(),
            email: None,
        }
    }

    #[tokio::test]
    async fn allocates_base_then_numeric_suffixes() {
        let service = make_service(Arc::new(InMemoryUserRepo::new()));
        let first = service
            .create_user(create_input("María", "García"))
            .await
            .expect("first create");
        assert_eq!(first.username, "maria.garcia");

        let second = service
            .create_user(create_input("Maria", "Garcia"))
            .await
            .expect("second create");
        assert_eq!(second.username, "maria.garcia1");

        let third = service
            .create_user(create_input("MARÍA", "GARCÍA"))
            .await
            .expect("third create");
        assert_eq!(third.username, "maria.garcia2");
    }

    #[tokio::test]
    async fn rejects_names_with_no_usable_characters() {
        let service = make_service(Arc::new(InMemoryUserRepo::new()));
        let err = service
            .create_user(create_input("  ", "!!!"))
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::Validation(_)));
    }

    #[tokio::test]
    async fn single_empty_name_side_still_allocates() {
        let service = make_service(Arc::new(InMemoryUserRepo::new()));
        let user = service
            .create_user(create_input("María", "!!!"))
            .await
            .expect("create");
        assert_eq!(user.username, "maria");
    }

    #[tokio::test]
    async fn concurrent_creates_get_distinct_contiguous_usernames() {
        let repo: Arc<dyn UserRepo> = Arc::new(InMemoryUserRepo::new());
        let service = Arc::new(make_service(repo.clone()));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.create_user(create_input("María", "García")).await
            }));
        }

        let mut usernames = Vec::new();
        for handle in handles {
            let user = handle.await.expect("task").expect("create");
            usernames.push(user.username);
        }
        usernames.sort();
        assert_eq!(
            usernames,
            vec![
                "maria.garcia",
                "maria.garcia1",
                "maria.garcia2",
                "maria.garcia3",
                "maria.garcia4"
            ]
        );
    }

    /// Prefix reads return a stale snapshot on the first call, so the first
    /// insert hits the unique index and the retry succeeds with the next
    /// suffix.
    struct StaleOnceRepo {
        inner: InMemoryUserRepo,
        refreshed: AtomicBool,
    }

    #[async_trait]
    impl UserRepo for StaleOnceRepo {
        async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
            self.inner.insert(user).await
        }
        async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
            self.inner.find_by_username(username).await
        }
        async fn usernames_with_prefix(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
            if !self.refreshed.swap(true, Ordering::SeqCst) {
                return Ok(Vec::new());
            }
            self.inner.usernames_with_prefix(prefix).await
        }
        async fn list(&self) -> anyhow::Result<Vec<User>> {
            self.inner.list().await
        }
    }

    #[tokio::test]
    async fn retries_with_next_suffix_after_losing_the_race() {
        let inner = InMemoryUserRepo::new();
        inner
            .insert(NewUser {
                first_name: "María".into(),
                last_name: "García".into(),
                username: "maria.garcia".into(),
                email: None,
                password_hash: "$argon2id$fake".into(),
            })
            .await
            .expect("seed insert");

        let repo = Arc::new(StaleOnceRepo {
            inner,
            refreshed: AtomicBool::new(false),
        });
        let service = make_service(repo);

        let user = service
            .create_user(create_input("María", "García"))
            .await
            .expect("create after retry");
        assert_eq!(user.username, "maria.garcia1");
    }

    /// Prefix reads never see anything, so every attempt proposes the bare
    /// base and collides with the seeded record.
    struct BlindRepo(InMemoryUserRepo);

    #[async_trait]
    impl UserRepo for BlindRepo {
        async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
            self.0.insert(user).await
        }
        async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
            self.0.find_by_username(username).await
        }
        async fn usernames_with_prefix(&self, _prefix: &str) -> anyhow::Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn list(&self) -> anyhow::Result<Vec<User>> {
            self.0.list().await
        }
    }

    #[tokio::test]
    async fn allocation_gives_up_after_bounded_retries() {
        let inner = InMemoryUserRepo::new();
        inner
            .insert(NewUser {
                first_name: "María".into(),
                last_name: "García".into(),
                username: "maria.garcia".into(),
                email: None,
                password_hash: "$argon2id$fake".into(),
            })
            .await
            .expect("seed insert");

        let service = make_service(Arc::new(BlindRepo(inner)));
        let err = service
            .create_user(create_input("María", "García"))
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::UsernameConflict));
    }

    #[tokio::test]
    async fn authenticate_issues_verifiable_token() {
        let service = make_service(Arc::new(InMemoryUserRepo::new()));
        service
            .create_user(create_input("María", "García"))
            .await
            .expect("create");

        let (user, token) = service
            .authenticate("maria.garcia", "hunter2!")
            .await
            .expect("authenticate");
        assert_eq!(user.username, "maria.garcia");

        let claims = make_keys().verify(&token).expect("verify token");
        assert_eq!(claims.sub, "maria.garcia");
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password_fail_identically() {
        let service = make_service(Arc::new(InMemoryUserRepo::new()));
        service
            .create_user(create_input("María", "García"))
            .await
            .expect("create");

        let unknown = service
            .authenticate("nonexistent.user", "anything")
            .await
            .unwrap_err();
        let wrong = service
            .authenticate("maria.garcia", "wrong-password")
            .await
            .unwrap_err();
        assert!(matches!(unknown, UserError::InvalidCredentials));
        assert!(matches!(wrong, UserError::InvalidCredentials));
    }
}
