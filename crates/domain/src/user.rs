//! User registration.

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHasher as _, SaltString, rand_core::OsRng},
};
use common::{NewUser, User, UserId};
use store::UserStore;

use crate::error::DomainError;

/// Minimum age accepted at registration.
pub const MIN_AGE: i32 = 18;

/// Minimum password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

/// One-way credential hashing.
pub trait PasswordHasher: Send + Sync {
    /// Hashes `password` into a self-describing string.
    fn hash(&self, password: &str) -> Result<String, DomainError>;
}

/// Argon2id with the crate's default parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Hasher;

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, DomainError> {
        let salt = SaltString::generate(&mut OsRng);

        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| DomainError::PasswordHash(e.to_string()))
    }
}

/// Command to register a new user.
#[derive(Debug, Clone, Default)]
pub struct RegisterUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub age: i32,
    pub is_married: bool,
}

impl RegisterUser {
    fn validate(&self) -> Result<(), DomainError> {
        if self.age < MIN_AGE {
            return Err(DomainError::invalid("user must be at least 18"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(DomainError::invalid(
                "password must be at least 8 characters",
            ));
        }
        if self.email.trim().is_empty() {
            return Err(DomainError::invalid("email is required"));
        }
        Ok(())
    }
}

/// Service for registering and reading users.
pub struct UserService<S: UserStore> {
    store: S,
    hasher: Arc<dyn PasswordHasher>,
}

impl<S: UserStore> UserService<S> {
    /// Creates a user service that hashes passwords with Argon2.
    pub fn new(store: S) -> Self {
        Self::with_hasher(store, Arc::new(Argon2Hasher))
    }

    /// Creates a user service with a custom password hasher.
    pub fn with_hasher(store: S, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { store, hasher }
    }

    /// Registers a new user.
    ///
    /// Emails are compared case-insensitively; registering an address that is
    /// already taken fails with a conflict.
    #[tracing::instrument(skip(self, cmd), fields(email = %cmd.email))]
    pub async fn register(&self, cmd: RegisterUser) -> Result<User, DomainError> {
        cmd.validate()?;
        let email = cmd.email.trim().to_string();

        if self.store.get_user_by_email(&email).await?.is_some() {
            return Err(DomainError::Conflict("user already exists".to_string()));
        }

        let password_hash = self.hasher.hash(&cmd.password)?;
        let user = self
            .store
            .create_user(NewUser {
                email,
                first_name: cmd.first_name.trim().to_string(),
                last_name: cmd.last_name.trim().to_string(),
                age: cmd.age,
                is_married: cmd.is_married,
                password_hash,
                ..Default::default()
            })
            .await?;

        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Loads a user by id.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: &UserId) -> Result<User, DomainError> {
        if id.is_blank() {
            return Err(DomainError::invalid("id is required"));
        }
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| DomainError::not_found("user", id))
    }
}
