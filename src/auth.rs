use actix_web::{HttpRequest, http::header, web};
use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::errors::ApiError;
use crate::models::user::User;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_DRIVER: &str = "driver";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub user_id: i64,
    pub email: String,
    pub role: String,
    pub is_staff: bool,
    pub exp: usize,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.is_staff
    }
}

pub fn generate_jwt(
    user: &User,
    secret: &str,
    ttl_days: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let role = if user.is_staff || user.is_superuser {
        ROLE_ADMIN
    } else {
        ROLE_DRIVER
    };
    let claims = Claims {
        sub: user.username.clone(),
        user_id: user.id,
        email: user.email.clone(),
        role: role.to_string(),
        is_staff: user.is_staff,
        exp: (now + chrono::Duration::days(ttl_days)).timestamp() as usize,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
}

/// Token dari cookie `access_token` (admin panel) atau header
/// `Authorization: Bearer <jwt>` / `Authorization: Token <jwt>` (aplikasi mobile).
fn extract_token(req: &HttpRequest) -> Option<String> {
    if let Some(cookie) = req.cookie("access_token") {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") || scheme.eq_ignore_ascii_case("token") {
        let token = token.trim();
        (!token.is_empty()).then(|| token.to_string())
    } else {
        None
    }
}

pub fn verify_jwt(req: &HttpRequest) -> Result<Claims, ApiError> {
    let config = req
        .app_data::<web::Data<AppConfig>>()
        .ok_or_else(|| ApiError::internal("Konfigurasi aplikasi tidak tersedia"))?;

    let token = extract_token(req).ok_or_else(|| {
        log::warn!("No token found in request to {}", req.path());
        ApiError::Unauthorized("Token tidak ditemukan".into())
    })?;

    decode_jwt(&token, &config.jwt_secret).map_err(|e| {
        log::warn!("JWT verification failed for {}: {:?}", req.path(), e);
        ApiError::Unauthorized(format!("Invalid or expired token: {}", e))
    })
}

pub fn require_admin(req: &HttpRequest) -> Result<Claims, ApiError> {
    let claims = verify_jwt(req)?;
    if !claims.is_admin() {
        return Err(ApiError::forbidden("Hanya admin yang dapat mengakses"));
    }
    Ok(claims)
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    hash(password, DEFAULT_COST).map_err(|e| {
        log::error!("bcrypt hash: {:?}", e);
        ApiError::internal("Gagal memproses password")
    })
}

pub fn verify_password(password: &str, hashed: &str) -> bool {
    verify(password, hashed).unwrap_or_else(|e| {
        log::error!("bcrypt verify: {:?}", e);
        false
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use chrono::NaiveDate;

    fn user(is_staff: bool) -> User {
        User {
            id: 7,
            username: "budi@example.com".into(),
            email: "budi@example.com".into(),
            password: String::new(),
            first_name: "Budi".into(),
            last_name: String::new(),
            is_staff,
            is_superuser: false,
            is_active: true,
            date_joined: NaiveDate::from_ymd_opt(2025, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn jwt_roundtrip_keeps_role() {
        let token = generate_jwt(&user(false), "rahasia", 2).unwrap();
        let claims = decode_jwt(&token, "rahasia").unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.role, ROLE_DRIVER);
        assert!(!claims.is_admin());

        let token = generate_jwt(&user(true), "rahasia", 2).unwrap();
        assert_eq!(decode_jwt(&token, "rahasia").unwrap().role, ROLE_ADMIN);
    }

    #[test]
    fn jwt_with_wrong_secret_fails() {
        let token = generate_jwt(&user(false), "rahasia", 2).unwrap();
        assert!(decode_jwt(&token, "bukan-rahasia").is_err());
    }

    #[test]
    fn expired_jwt_fails() {
        let token = generate_jwt(&user(false), "rahasia", -1).unwrap();
        assert!(decode_jwt(&token, "rahasia").is_err());
    }

    #[test]
    fn token_is_read_from_header_schemes() {
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Token abc123"))
            .to_http_request();
        assert_eq!(extract_token(&req).as_deref(), Some("abc123"));

        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Bearer xyz"))
            .to_http_request();
        assert_eq!(extract_token(&req).as_deref(), Some("xyz"));

        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Basic dXNlcjpwYXNz"))
            .to_http_request();
        assert!(extract_token(&req).is_none());
    }

    #[test]
    fn password_hash_verifies() {
        let hashed = hash_password("driver123").unwrap();
        assert!(verify_password("driver123", &hashed));
        assert!(!verify_password("salah", &hashed));
        assert!(!verify_password("driver123", "bukan-hash-bcrypt"));
    }
}
