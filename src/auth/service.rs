/// Credential verification and account registration
///
/// `authenticate` never reveals which half of a credential pair was wrong:
/// an unknown email and a bad password both end in `InvalidCredentials`, and
/// both spend one argon2 verification.

use crate::{
    auth::{
        password::{hash_password, verify_password},
        users::{InsertOutcome, User, UserStorage},
        Identity, Role,
    },
    error::{AppError, AppResult, FieldError},
};

/// Minimum accepted password length at registration
const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct AuthService {
    users: UserStorage,
    /// Verified against when the email is unknown, to equalize effort
    dummy_hash: String,
}

impl AuthService {
    pub fn new(users: UserStorage) -> AppResult<Self> {
        let dummy_hash = hash_password("projectflow-timing-equalizer")?;
        Ok(Self { users, dummy_hash })
    }

    /// Verify an email/password pair and return the caller's identity
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<Identity> {
        let user = self.users.find_by_email(email).await?;

        let stored_hash = user
            .as_ref()
            .map(|u| u.password_hash.clone())
            .unwrap_or_else(|| self.dummy_hash.clone());
        let candidate = password.to_string();
        let matches =
            tokio::task::spawn_blocking(move || verify_password(&candidate, &stored_hash)).await?;

        match user {
            Some(user) if matches => Ok(Identity::from(&user)),
            Some(_) => {
                tracing::warn!("Login rejected: wrong password for {}", email);
                Err(AppError::InvalidCredentials)
            }
            None => {
                tracing::warn!("Login rejected: unknown email {}", email);
                Err(AppError::InvalidCredentials)
            }
        }
    }

    /// Create a USER account; a taken email yields `DuplicateUser`
    pub async fn register(
        &self,
        name: Option<&str>,
        email: &str,
        password: &str,
    ) -> AppResult<User> {
        validate_registration(email, password)?;

        let plaintext = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&plaintext)).await??;

        let name = name.map(str::trim).filter(|n| !n.is_empty());
        match self.users.insert(name, email, &password_hash, Role::User).await? {
            InsertOutcome::Created(user) => {
                tracing::info!("👤 Registered user {} ({})", user.email, user.id);
                Ok(user)
            }
            InsertOutcome::DuplicateEmail => {
                tracing::warn!("Registration rejected: {} already exists", email);
                Err(AppError::DuplicateUser)
            }
        }
    }
}

fn validate_registration(email: &str, password: &str) -> AppResult<()> {
    let mut errors = Vec::new();

    if email.is_empty() {
        errors.push(FieldError::new("email", "Email is required"));
    } else if !email.contains('@') {
        errors.push(FieldError::new("email", "Email must be a valid address"));
    }

    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError::new(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}
