//! Inputs and responses of the credential flows.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use keyward_entity::session::Session;
use keyward_entity::user::{Profile, User};

use crate::rbac::UserAccess;
use crate::session::TokenPair;

/// Login credentials.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Self-registration input.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub password: String,
    #[validate(length(min = 2, max = 100, message = "Name must be at least 2 characters"))]
    pub name: Option<String>,
}

/// Tokens handed to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

impl From<TokenPair> for AuthTokens {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: pair.expires_in,
        }
    }
}

/// Public part of a profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
}

impl From<Profile> for ProfileSummary {
    fn from(p: Profile) -> Self {
        Self {
            first_name: p.first_name,
            last_name: p.last_name,
            display_name: p.display_name,
            avatar: p.avatar,
        }
    }
}

/// The authenticated-user view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub email_verified: bool,
    pub is_active: bool,
    pub is_blocked: bool,
    /// Role slugs, highest level first.
    pub roles: Vec<String>,
    /// Permission slugs, sorted.
    pub permissions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileSummary>,
}

impl AuthUser {
    pub(crate) fn compose(user: &User, access: UserAccess, profile: Option<Profile>) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            email_verified: user.email_verified,
            is_active: user.is_active,
            is_blocked: user.is_blocked,
            roles: access.roles,
            permissions: access.permissions.into_iter().collect(),
            profile: profile.map(ProfileSummary::from),
        }
    }
}

/// Session created by a login.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: Uuid,
    pub device_name: Option<String>,
    pub ip_address: Option<String>,
}

impl From<&Session> for SessionSummary {
    fn from(s: &Session) -> Self {
        Self {
            id: s.id,
            device_name: s.device_name.clone(),
            ip_address: s.ip_address.clone(),
        }
    }
}

/// Result of a successful login or registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: AuthUser,
    pub tokens: AuthTokens,
    pub session: SessionSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_input_validation() {
        let ok = RegisterInput {
            email: "ada@example.com".into(),
            password: "Secret1!".into(),
            name: Some("Ada".into()),
        };
        assert!(ok.validate().is_ok());

        let bad_email = RegisterInput {
            email: "not-an-email".into(),
            ..ok.clone()
        };
        assert!(bad_email.validate().is_err());

        let short_name = RegisterInput {
            name: Some("A".into()),
            ..ok
        };
        assert!(short_name.validate().is_err());
    }

    #[test]
    fn test_tokens_serialize_camel_case() {
        let tokens = AuthTokens {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_in: 900,
        };
        let json = serde_json::to_value(&tokens).unwrap();
        assert_eq!(json["accessToken"], "a");
        assert_eq!(json["expiresIn"], 900);
    }
}
