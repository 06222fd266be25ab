use sqlx::PgPool;

use crate::auth::repo_types::{User, UserRole};

const USER_COLUMNS: &str =
    "id, username, email, hashed_password, avatar, confirmed, role, created_at";

impl User {
    pub async fn find_by_id(db: &PgPool, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_username(db: &PgPool, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new user with an already-hashed password. Confirmation
    /// always starts out false; the role defaults to `user`.
    pub async fn create(
        db: &PgPool,
        username: &str,
        email: &str,
        hashed_password: &str,
        role: UserRole,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, hashed_password, role)
             VALUES ($1, $2, $3, $4)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(username)
        .bind(email)
        .bind(hashed_password)
        .bind(role)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn confirm_email(db: &PgPool, email: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET confirmed = TRUE WHERE email = $1")
            .bind(email)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn update_avatar(db: &PgPool, email: &str, url: &str) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET avatar = $2 WHERE email = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .bind(url)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn update_password(
        db: &PgPool,
        email: &str,
        hashed_password: &str,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET hashed_password = $2 WHERE email = $1")
            .bind(email)
            .bind(hashed_password)
            .execute(db)
            .await?;
        Ok(())
    }
}
