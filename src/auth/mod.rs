/// Authentication layer
///
/// This module owns everything about who the caller is:
/// - Roles and the role hierarchy
/// - Argon2 password hashing
/// - SQLite user storage
/// - Signed access tokens carried in the `auth-token` cookie
/// - Credential verification and registration

pub mod password;
pub mod role;
pub mod service;
pub mod token;
pub mod users;

pub use role::Role;
pub use service::AuthService;
pub use token::{Claims, TokenError, TokenIssuer, AUTH_COOKIE};
pub use users::{User, UserStorage};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// The authenticated caller, as carried by an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
}

impl Identity {
    /// Fail with `Forbidden` unless the caller's role covers `required`
    pub fn require(&self, required: Role) -> AppResult<()> {
        if self.role.satisfies(required) {
            Ok(())
        } else {
            tracing::warn!(
                "Forbidden: {} ({}) needs {}",
                self.email,
                self.role,
                required
            );
            Err(AppError::Forbidden)
        }
    }
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
        }
    }
}
