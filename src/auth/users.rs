/// SQLite persistence for user accounts
///
/// Users are created at registration and read at login. Emails are matched
/// exactly as stored, without case folding or trimming.

use crate::{auth::Role, database::now_timestamp, error::AppResult};
use serde::Serialize;
use sqlx::{sqlite::SqlitePool, Row};

/// A stored user account
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: String,
    pub updated_at: String,
}

/// Outcome of an insert that may collide on the unique email
#[derive(Debug)]
pub enum InsertOutcome {
    Created(User),
    DuplicateEmail,
}

#[derive(Debug, Clone)]
pub struct UserStorage {
    pool: SqlitePool,
}

impl UserStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Look up a user by exact email
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, name, email, password_hash, role, created_at, updated_at \
             FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| user_from_row(&row)).transpose()
    }

    /// Insert a new user, reporting a duplicate email instead of failing
    pub async fn insert(
        &self,
        name: Option<&str>,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> AppResult<InsertOutcome> {
        let now = now_timestamp();
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.map(str::to_string),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role,
            created_at: now.clone(),
            updated_at: now,
        };

        let result = sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.created_at)
        .bind(&user.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Created(user)),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Ok(InsertOutcome::DuplicateEmail)
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn user_from_row(row: &sqlx::sqlite::SqliteRow) -> AppResult<User> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role: role
            .parse()
            .map_err(crate::error::AppError::Internal)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::connect_in_memory;

    #[tokio::test]
    async fn insert_then_find() {
        let storage = UserStorage::new(connect_in_memory().await.unwrap());
        let outcome = storage
            .insert(Some("Ann"), "ann@example.com", "hash", Role::User)
            .await
            .unwrap();
        let created = match outcome {
            InsertOutcome::Created(user) => user,
            InsertOutcome::DuplicateEmail => panic!("unexpected duplicate"),
        };

        let found = storage.find_by_email("ann@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.role, Role::User);
        assert!(storage.find_by_email("ANN@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_reported() {
        let storage = UserStorage::new(connect_in_memory().await.unwrap());
        storage.insert(None, "dup@example.com", "h1", Role::User).await.unwrap();
        let second = storage.insert(None, "dup@example.com", "h2", Role::Admin).await.unwrap();
        assert!(matches!(second, InsertOutcome::DuplicateEmail));

        let kept = storage.find_by_email("dup@example.com").await.unwrap().unwrap();
        assert_eq!(kept.password_hash, "h1");
    }

    #[test]
    fn password_hash_is_never_serialized() {
        let user = User {
            id: "1".into(),
            name: None,
            email: "a@b.c".into(),
            password_hash: "secret-hash".into(),
            role: Role::User,
            created_at: "t".into(),
            updated_at: "t".into(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["email"], "a@b.c");
    }
}
