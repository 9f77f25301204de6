//! User model, JWT claims and the authenticated principal

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::AppError;

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: Option<String>,
    /// Hashed password (argon2)
    #[serde(skip_serializing)]
    pub password: String,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Registration request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterUser {
    #[validate(length(min = 3, max = 150, message = "Username must be 3-150 characters"))]
    pub username: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Who is calling: the only facts the loan rules need about the requester
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i32,
    pub is_admin: bool,
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: i32,
    pub is_admin: bool,
    /// Token id, used for revocation
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    pub fn new(user: &User, expiration_hours: u64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user.username.clone(),
            user_id: user.id,
            is_admin: user.is_admin,
            jti: uuid::Uuid::new_v4().to_string(),
            exp: now + (expiration_hours as i64 * 3600),
            iat: now,
        }
    }

    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Seconds until the token expires (zero if already expired)
    pub fn remaining_seconds(&self) -> u64 {
        (self.exp - Utc::now().timestamp()).max(0) as u64
    }

    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.user_id,
            is_admin: self.is_admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    /// Require admin privileges
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization("Administrator privileges required".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(is_admin: bool) -> User {
        User {
            id: 5,
            username: "lucia".into(),
            email: None,
            password: String::new(),
            is_admin,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_token_round_trip() {
        let claims = UserClaims::new(&user(true), 1);
        let token = claims.create_token("secret").unwrap();
        let parsed = UserClaims::from_token(&token, "secret").unwrap();
        assert_eq!(parsed.user_id, 5);
        assert_eq!(parsed.sub, "lucia");
        assert_eq!(parsed.jti, claims.jti);
        assert!(parsed.is_admin());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = UserClaims::new(&user(false), 1).create_token("secret").unwrap();
        assert!(UserClaims::from_token(&token, "other").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let mut claims = UserClaims::new(&user(false), 1);
        claims.iat -= 7200;
        claims.exp = Utc::now().timestamp() - 3600;
        let token = claims.create_token("secret").unwrap();
        assert!(UserClaims::from_token(&token, "secret").is_err());
        assert_eq!(claims.remaining_seconds(), 0);
    }

    #[test]
    fn test_each_token_has_unique_id() {
        let a = UserClaims::new(&user(false), 1);
        let b = UserClaims::new(&user(false), 1);
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn test_require_admin() {
        assert!(UserClaims::new(&user(true), 1).require_admin().is_ok());
        let err = UserClaims::new(&user(false), 1).require_admin().unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
    }

    #[test]
    fn test_password_never_serialized() {
        let mut u = user(false);
        u.password = "$argon2id$hash".into();
        let json = serde_json::to_value(&u).unwrap();
        assert!(json.get("password").is_none());
    }

    #[test]
    fn test_registration_validation() {
        let ok = RegisterUser {
            username: "pablo".into(),
            email: Some("pablo@example.org".into()),
            password: "long-enough".into(),
        };
        assert!(ok.validate().is_ok());

        let short = RegisterUser {
            username: "pablo".into(),
            email: None,
            password: "short".into(),
        };
        assert!(short.validate().is_err());

        let bad_email = RegisterUser {
            username: "pablo".into(),
            email: Some("not-an-email".into()),
            password: "long-enough".into(),
        };
        assert!(bad_email.validate().is_err());
    }
}
