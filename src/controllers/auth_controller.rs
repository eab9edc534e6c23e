//auth_controller.rs
use actix_web::{
    HttpRequest, HttpResponse,
    cookie::{Cookie, SameSite, time::Duration},
    get, post, web,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;

use crate::auth::{self, ROLE_ADMIN, ROLE_DRIVER};
use crate::config::AppConfig;
use crate::db;
use crate::errors::{ApiError, ApiResult};
use crate::models::driver::{CreateDriverAccountRequest, DEFAULT_TTL, DriverStatus};
use crate::models::user::User;
use crate::services::driver_service::send_driver_event;
use crate::utils;

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl LoginPayload {
    fn credentials(&self) -> Option<(&str, &str)> {
        let username = self.username.as_deref().map(str::trim).filter(|u| !u.is_empty())?;
        let password = self.password.as_deref().filter(|p| !p.is_empty())?;
        Some((username, password))
    }
}

pub(crate) fn access_cookie(token: &str, ttl_days: i64) -> Cookie<'static> {
    Cookie::build("access_token", token.to_string())
        .path("/")
        .http_only(true)
        .secure(false)
        .same_site(SameSite::Lax)
        .max_age(Duration::days(ttl_days))
        .finish()
}

fn issue_token(user: &User, config: &AppConfig) -> ApiResult<String> {
    auth::generate_jwt(user, &config.jwt_secret, config.jwt_ttl_days).map_err(|e| {
        log::error!("Gagal menghasilkan JWT: {:?}", e);
        ApiError::internal("Gagal menghasilkan token")
    })
}

#[post("/api/auth/admin-login")]
pub async fn admin_login(
    pool: web::Data<MySqlPool>,
    config: web::Data<AppConfig>,
    payload: web::Json<LoginPayload>,
) -> ApiResult<HttpResponse> {
    let (username, password) = payload
        .credentials()
        .ok_or_else(|| ApiError::bad_request("Username dan password harus diisi"))?;

    let invalid = || ApiError::bad_request("Username atau password salah");

    let user = db::find_user_by_username(pool.get_ref(), username)
        .await?
        .ok_or_else(invalid)?;

    if !auth::verify_password(password, &user.password)
        || !user.is_active
        || !(user.is_staff || user.is_superuser)
    {
        log::warn!("Login admin ditolak untuk {}", username);
        return Err(invalid());
    }

    let token = issue_token(&user, &config)?;
    log::info!("Admin {} login", user.username);

    Ok(HttpResponse::Ok()
        .cookie(access_cookie(&token, config.jwt_ttl_days))
        .json(json!({
            "token": token,
            "user_id": user.id,
            "username": user.username,
            "email": user.email,
            "role": ROLE_ADMIN,
        })))
}

/// Login aplikasi mobile. Field `username` berisi email driver.
#[post("/api/auth/login")]
pub async fn login(
    pool: web::Data<MySqlPool>,
    config: web::Data<AppConfig>,
    payload: web::Json<LoginPayload>,
) -> ApiResult<HttpResponse> {
    let email = payload
        .username
        .as_deref()
        .map(str::trim)
        .filter(|e| e.contains('@'))
        .ok_or_else(|| ApiError::bad_request("Email harus diisi dengan format yang benar"))?;
    let password = payload.password.as_deref().unwrap_or("");

    let invalid = || ApiError::bad_request("Email atau password salah");

    let user = db::find_user_by_email(pool.get_ref(), email)
        .await?
        .ok_or_else(invalid)?;

    if !user.is_active || !auth::verify_password(password, &user.password) {
        return Err(invalid());
    }

    if user.is_staff || user.is_superuser {
        return Err(ApiError::forbidden(
            "Akun admin tidak dapat login melalui aplikasi mobile",
        ));
    }

    let driver = db::find_driver_by_email(pool.get_ref(), &user.email)
        .await?
        .ok_or_else(|| ApiError::not_found("Data driver tidak ditemukan"))?;

    if driver.status() != Some(DriverStatus::Active) {
        return Err(ApiError::forbidden("Akun driver belum diaktivasi oleh admin"));
    }

    let token = issue_token(&user, &config)?;

    Ok(HttpResponse::Ok().json(json!({
        "token": token,
        "user_id": user.id,
        "username": user.username,
        "email": user.email,
        "role": ROLE_DRIVER,
        "driver": {
            "id": driver.id_driver,
            "name": driver.nama,
            "status": driver.status,
        }
    })))
}

#[get("/api/auth/user")]
pub async fn get_user(pool: web::Data<MySqlPool>, req: HttpRequest) -> ApiResult<HttpResponse> {
    let claims = auth::verify_jwt(&req)?;

    let user = db::find_user_by_id(pool.get_ref(), claims.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Akun tidak ditemukan".into()))?;

    let body = match db::find_driver_by_email(pool.get_ref(), &user.email).await? {
        Some(driver) => json!({
            "id": driver.id_driver,
            "user_id": user.id,
            "username": user.username,
            "email": user.email,
            "nama": driver.nama,
            "no_hp": driver.no_hp,
            "status": driver.status,
            "alasan_penolakan": driver.alasan_penolakan,
        }),
        None => json!({
            "id": user.id,
            "username": user.username,
            "email": user.email,
            "nama": user.full_name(),
            "no_hp": "",
            "status": if user.is_staff { "admin" } else { "unknown" },
            "alasan_penolakan": null,
        }),
    };

    Ok(HttpResponse::Ok().json(body))
}

#[post("/api/auth/logout")]
pub async fn logout() -> HttpResponse {
    let cleared = Cookie::build("access_token", "")
        .path("/")
        .http_only(true)
        .secure(false)
        .same_site(SameSite::Lax)
        .max_age(Duration::seconds(0))
        .finish();

    HttpResponse::Ok()
        .cookie(cleared)
        .json(json!({ "message": "Berhasil logout" }))
}

/// Admin membuat akun driver kosong; data lengkap diisi saat registrasi.
#[post("/api/auth/create-driver")]
pub async fn create_driver_account(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    payload: web::Json<CreateDriverAccountRequest>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    utils::validate_payload(&payload.0)?;

    let email = payload.email.as_deref().map(str::trim).unwrap_or("");
    let password = payload.password.as_deref().unwrap_or("");
    if email.is_empty() || password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let status = match payload.status.as_deref() {
        Some(s) => s.parse::<DriverStatus>().map_err(ApiError::BadRequest)?,
        None => DriverStatus::Training,
    };

    if db::find_user_by_username(pool.get_ref(), email).await?.is_some() {
        return Err(ApiError::bad_request(
            "User account with this email already exists",
        ));
    }
    if db::find_driver_by_email(pool.get_ref(), email).await?.is_some() {
        return Err(ApiError::bad_request("Driver with this email already exists"));
    }

    let hashed = auth::hash_password(password)?;
    let ttl = utils::parse_date(DEFAULT_TTL)?;

    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO users (username, email, password) VALUES (?, ?, ?)")
        .bind(email)
        .bind(email)
        .bind(&hashed)
        .execute(&mut *tx)
        .await?;

    let driver_id = sqlx::query(
        r#"
        INSERT INTO drivers
        (nama, email, no_hp, alamat, ttl, nik, no_sim, jenis_sim, no_bpjs,
         nama_kontak_darurat, nomor_kontak_darurat, hubungan_kontak_darurat, status)
        VALUES ('', ?, '', '', ?, '', '', '', '', '', '', '', ?)
        "#,
    )
    .bind(email)
    .bind(ttl)
    .bind(status.as_str())
    .execute(&mut *tx)
    .await?
    .last_insert_id() as i64;

    tx.commit().await?;

    send_driver_event("driver_created", driver_id);

    Ok(HttpResponse::Created().json(json!({
        "id": driver_id,
        "email": email,
        "status": status,
        "message": "Driver account created successfully",
    })))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(admin_login)
        .service(login)
        .service(get_user)
        .service(logout)
        .service(create_driver_account);
}
