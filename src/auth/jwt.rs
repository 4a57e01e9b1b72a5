//! JWT token generation and validation
//! Implements access token + refresh token pattern

use crate::{config::SecurityConfig, error::AppError};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// Token type (access or refresh)
    pub token_type: String,

    /// Role name at issue time (access tokens only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Issued at
    pub iat: i64,

    /// Expiration
    pub exp: i64,

    /// JWT ID (unique token identifier)
    pub jti: String,
}

impl Claims {
    pub fn subject(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::Unauthorized)
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.iat, 0).single().unwrap_or_else(Utc::now)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Freshly issued token pair
#[derive(Debug)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub issued_at: DateTime<Utc>,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// JWT service
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_exp_secs: u64,
    refresh_token_exp_secs: u64,
}

impl JwtService {
    /// Create JWT service from config
    pub fn from_config(config: &SecurityConfig) -> Result<Self, AppError> {
        let secret = config.jwt_secret.expose_secret();

        // Ensure secret is at least 32 bytes for HS256
        if secret.len() < 32 {
            return Err(AppError::Config("JWT secret too short (min 32 chars)".to_string()));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_exp_secs: config.access_token_exp_secs,
            refresh_token_exp_secs: config.refresh_token_exp_secs,
        })
    }

    fn encode_claims(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::default(), claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode {} token: {:?}", claims.token_type, e);
            AppError::Internal(format!("Failed to encode {} token: {}", claims.token_type, e))
        })
    }

    /// Generate token pair
    pub fn generate_token_pair(&self, user_id: &Uuid, role: &str) -> Result<TokenPair, AppError> {
        let now = Utc::now();
        let access_expires_at = now + Duration::seconds(self.access_token_exp_secs as i64);
        let refresh_expires_at = now + Duration::seconds(self.refresh_token_exp_secs as i64);

        let access_token = self.encode_claims(&Claims {
            sub: user_id.to_string(),
            token_type: "access".to_string(),
            role: Some(role.to_string()),
            iat: now.timestamp(),
            exp: access_expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        })?;

        let refresh_token = self.encode_claims(&Claims {
            sub: user_id.to_string(),
            token_type: "refresh".to_string(),
            role: None,
            iat: now.timestamp(),
            exp: refresh_expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        })?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            // Truncate to whole seconds so issued records match decoded claims
            issued_at: Utc.timestamp_opt(now.timestamp(), 0).single().unwrap_or(now),
            access_expires_at: Utc
                .timestamp_opt(access_expires_at.timestamp(), 0)
                .single()
                .unwrap_or(access_expires_at),
            refresh_expires_at,
        })
    }

    /// Validate and decode token
    pub fn validate_token(&self, token: &str) -> Result<Claims, AppError> {
        Ok(decode::<Claims>(token, &self.decoding_key, &Validation::new(Algorithm::HS256))
            .map_err(|e| {
                tracing::debug!("Token validation failed: {:?}", e);
                AppError::Unauthorized
            })?
            .claims)
    }

    /// Validate access token specifically
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, AppError> {
        let claims = self.validate_token(token)?;

        if claims.token_type != "access" {
            tracing::debug!("Token type mismatch: expected 'access', got '{}'", claims.token_type);
            return Err(AppError::Unauthorized);
        }

        Ok(claims)
    }

    /// Validate refresh token specifically
    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, AppError> {
        let claims = self.validate_token(token)?;

        if claims.token_type != "refresh" {
            tracing::debug!("Token type mismatch: expected 'refresh', got '{}'", claims.token_type);
            return Err(AppError::Unauthorized);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    fn test_config() -> SecurityConfig {
        SecurityConfig {
            jwt_secret: Secret::new("test_secret_key_32_characters_long!".to_string()),
            access_token_exp_secs: 900,
            refresh_token_exp_secs: 604800,
        }
    }

    #[test]
    fn test_generate_and_validate_token_pair() {
        let service = JwtService::from_config(&test_config()).unwrap();
        let user_id = Uuid::new_v4();

        let pair = service.generate_token_pair(&user_id, "dispatcher").unwrap();

        let access = service.validate_access_token(&pair.access_token).unwrap();
        assert_eq!(access.subject().unwrap(), user_id);
        assert_eq!(access.role.as_deref(), Some("dispatcher"));
        assert_eq!(access.expires_at(), pair.access_expires_at);

        let refresh = service.validate_refresh_token(&pair.refresh_token).unwrap();
        assert_eq!(refresh.subject().unwrap(), user_id);
        assert!(refresh.role.is_none());
    }

    #[test]
    fn test_token_type_validation() {
        let service = JwtService::from_config(&test_config()).unwrap();
        let pair = service.generate_token_pair(&Uuid::new_v4(), "admin").unwrap();

        // Should fail: tokens used for the wrong purpose
        assert!(service.validate_refresh_token(&pair.access_token).is_err());
        assert!(service.validate_access_token(&pair.refresh_token).is_err());
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut config = test_config();
        config.jwt_secret = Secret::new("short".to_string());
        assert!(JwtService::from_config(&config).is_err());
    }

    #[test]
    fn test_invalid_token_fails() {
        let service = JwtService::from_config(&test_config()).unwrap();
        assert!(service.validate_access_token("invalid_token").is_err());
        assert!(service.validate_refresh_token("invalid_token").is_err());
    }
}
