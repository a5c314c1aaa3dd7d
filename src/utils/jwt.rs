use crate::error::{AppError, AppResult};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const ACCESS: &str = "access";
const REFRESH: &str = "refresh";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    #[serde(default)]
    pub roles: Vec<String>,
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
    pub token_type: String, // "access" or "refresh"
}

impl Claims {
    pub fn user_id(&self) -> AppResult<i64> {
        self.sub
            .parse()
            .map_err(|_| AppError::AuthError("Invalid token subject".to_string()))
    }
}

/// A freshly signed token together with the identifiers needed to persist it.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expires_in: i64,
    refresh_token_expires_in: i64,
}

impl JwtService {
    pub fn new(secret: &str, access_expires_in: i64, refresh_expires_in: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_expires_in: access_expires_in,
            refresh_token_expires_in: refresh_expires_in,
        }
    }

    pub fn generate_access_token(&self, user_id: i64, roles: &[String]) -> AppResult<IssuedToken> {
        self.issue(user_id, roles, ACCESS, self.access_token_expires_in)
    }

    pub fn generate_refresh_token(&self, user_id: i64, roles: &[String]) -> AppResult<IssuedToken> {
        self.issue(user_id, roles, REFRESH, self.refresh_token_expires_in)
    }

    fn issue(
        &self,
        user_id: i64,
        roles: &[String],
        token_type: &str,
        expires_in: i64,
    ) -> AppResult<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + Duration::seconds(expires_in);
        let jti = Uuid::new_v4().simple().to_string();

        let claims = Claims {
            sub: user_id.to_string(),
            roles: roles.to_vec(),
            jti: jti.clone(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            token_type: token_type.to_string(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)?;
        Ok(IssuedToken {
            token,
            jti,
            expires_at,
        })
    }

    pub fn verify_token(&self, token: &str) -> AppResult<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(AppError::JwtError)
    }

    pub fn verify_access_token(&self, token: &str) -> AppResult<Claims> {
        let claims = self.verify_token(token)?;

        if claims.token_type != ACCESS {
            return Err(AppError::AuthError("Invalid access token type".to_string()));
        }

        Ok(claims)
    }

    pub fn verify_refresh_token(&self, token: &str) -> AppResult<Claims> {
        let claims = self.verify_token(token)?;

        if claims.token_type != REFRESH {
            return Err(AppError::AuthError("Invalid refresh token type".to_string()));
        }

        Ok(claims)
    }

    pub fn get_access_token_expires_in(&self) -> i64 {
        self.access_token_expires_in
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new("test-secret", 600, 3600)
    }

    #[test]
    fn test_access_token_round_trip() {
        let jwt = service();
        let roles = vec!["admin".to_string()];
        let issued = jwt.generate_access_token(42, &roles).unwrap();

        let claims = jwt.verify_access_token(&issued.token).unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.roles, roles);
        assert_eq!(claims.jti, issued.jti);
    }

    #[test]
    fn test_token_types_are_not_interchangeable() {
        let jwt = service();
        let access = jwt.generate_access_token(1, &[]).unwrap();
        let refresh = jwt.generate_refresh_token(1, &[]).unwrap();

        assert!(jwt.verify_refresh_token(&access.token).is_err());
        assert!(jwt.verify_access_token(&refresh.token).is_err());
        assert!(jwt.verify_refresh_token(&refresh.token).is_ok());
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let issued = JwtService::new("other", 600, 3600)
            .generate_access_token(1, &[])
            .unwrap();
        assert!(service().verify_access_token(&issued.token).is_err());
    }

    #[test]
    fn test_each_token_gets_unique_jti() {
        let jwt = service();
        let a = jwt.generate_refresh_token(7, &[]).unwrap();
        let b = jwt.generate_refresh_token(7, &[]).unwrap();
        assert_ne!(a.jti, b.jti);
    }
}
