use time::OffsetDateTime;

use crate::auth::repo_types::{User, UserRole};

pub fn sample_user(username: &str, email: &str) -> User {
    User {
        id: 1,
        username: username.to_string(),
        email: email.to_string(),
        hashed_password: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$AAAA".to_string(),
        avatar: None,
        confirmed: true,
        role: UserRole::User,
        created_at: OffsetDateTime::now_utc(),
    }
}

pub fn sample_admin(username: &str, email: &str) -> User {
    User {
        role: UserRole::Admin,
        ..sample_user(username, email)
    }
}
