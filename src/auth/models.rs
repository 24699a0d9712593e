use serde::{Deserialize, Serialize};

use crate::db::models::User;

/// The user behind a valid session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub username: String,
    pub email: String,
}

impl From<&User> for AuthenticatedUser {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

/// Who triggered an import run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportTrigger {
    /// A logged-in user.
    User(String),
    /// A caller presenting the shared service token.
    Service,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_from_user_drops_secrets() {
        let user = User {
            id: "u1".into(),
            email: "alice@example.com".into(),
            username: "alice".into(),
            password_hash: "$argon2id$secret".into(),
            display_name: None,
            bio: None,
            avatar_url: None,
            followers: vec![],
            following: vec![],
            created_at: Utc::now(),
        };

        let auth = AuthenticatedUser::from(&user);
        assert_eq!(auth.user_id, "u1");
        assert_eq!(auth.username, "alice");

        let json = serde_json::to_string(&auth).unwrap();
        assert!(!json.contains("argon2"));
    }
}
