// src/controllers/driver_controller.rs
use actix_web::{HttpRequest, HttpResponse, delete, get, patch, post, put, web};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::{MySql, MySqlPool, QueryBuilder};

use crate::auth::{self, Claims};
use crate::config::AppConfig;
use crate::db::{self, PartialUpdate};
use crate::errors::{ApiError, ApiResult};
use crate::models::driver::{
    self, BulkDriverRequest, COMPLETED_TRIP_STATUSES, DEFAULT_DRIVER_PASSWORD, DEFAULT_NIK,
    DEFAULT_TTL, DRIVER_COLUMNS, DocumentUpdate, Driver, DriverListFilter, DriverStatus,
    DriverUpdate, RecentRating, RegisterDriverRequest, StatusUpdateRequest, TripRow,
};
use crate::models::training::training_passed;
use crate::services::driver_service::send_driver_event;
use crate::utils;

fn driver_not_found() -> ApiError {
    ApiError::not_found("Driver not found")
}

/// Driver milik akun yang sedang login (dicocokkan lewat email).
pub(crate) async fn current_driver(pool: &MySqlPool, claims: &Claims) -> ApiResult<Driver> {
    db::find_driver_by_email(pool, &claims.email)
        .await?
        .ok_or_else(driver_not_found)
}

fn can_access(claims: &Claims, driver: &Driver) -> bool {
    claims.is_admin() || driver.email == claims.email
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn validate_documents(payload: &RegisterDriverRequest) -> ApiResult<()> {
    utils::ensure_valid_documents(&[
        ("KTP", payload.foto_ktp.as_ref()),
        ("SIM", payload.foto_sim.as_ref()),
        ("Foto Profil", payload.foto_profil.as_ref()),
        ("Sertifikat", payload.foto_sertifikat.as_ref()),
        ("BPJS", payload.foto_bpjs.as_ref()),
    ])
}

/// Insert baris driver baru dari payload registrasi; mengembalikan id_driver.
async fn insert_driver(
    conn: &mut sqlx::MySqlConnection,
    payload: &RegisterDriverRequest,
    status: DriverStatus,
) -> ApiResult<i64> {
    let ttl = utils::parse_date(non_empty(&payload.ttl).unwrap_or(DEFAULT_TTL))?;
    let sim_exp = utils::parse_optional_date(payload.tanggal_kedaluarsa_sim.as_deref())?;
    let bpjs_exp = utils::parse_optional_date(payload.tanggal_kedaluarsa_bpjs.as_deref())?;
    let sertifikat_exp =
        utils::parse_optional_date(payload.tanggal_kedaluarsa_sertifikat.as_deref())?;

    let result = sqlx::query(
        r#"
        INSERT INTO drivers
        (nama, email, no_hp, kota, alamat, ttl, nik, no_sim, jenis_sim, tanggal_kedaluarsa_sim,
         no_bpjs, tanggal_kedaluarsa_bpjs, no_sertifikat, tanggal_kedaluarsa_sertifikat,
         nama_kontak_darurat, nomor_kontak_darurat, hubungan_kontak_darurat, status,
         foto_ktp, foto_sim, foto_profil, foto_sertifikat, foto_bpjs, nama_bank, nomor_rekening)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.nama.trim())
    .bind(payload.email.trim())
    .bind(&payload.no_hp)
    .bind(&payload.kota)
    .bind(&payload.alamat)
    .bind(ttl)
    .bind(non_empty(&payload.nik).unwrap_or(DEFAULT_NIK))
    .bind(payload.no_sim.as_deref().unwrap_or(""))
    .bind(payload.jenis_sim.as_deref().unwrap_or(""))
    .bind(sim_exp)
    .bind(payload.no_bpjs.as_deref().unwrap_or(""))
    .bind(bpjs_exp)
    .bind(payload.no_sertifikat.as_deref().unwrap_or(""))
    .bind(sertifikat_exp)
    .bind(payload.nama_kontak_darurat.as_deref().unwrap_or(""))
    .bind(payload.nomor_kontak_darurat.as_deref().unwrap_or(""))
    .bind(payload.hubungan_kontak_darurat.as_deref().unwrap_or(""))
    .bind(status.as_str())
    .bind(&payload.foto_ktp)
    .bind(&payload.foto_sim)
    .bind(&payload.foto_profil)
    .bind(&payload.foto_sertifikat)
    .bind(&payload.foto_bpjs)
    .bind(&payload.nama_bank)
    .bind(&payload.nomor_rekening)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_id() as i64)
}

// ================= REGISTRASI & LOGIN =================

#[post("/api/drivers/register")]
pub async fn register_driver(
    pool: web::Data<MySqlPool>,
    payload: web::Json<RegisterDriverRequest>,
) -> ApiResult<HttpResponse> {
    utils::validate_payload(&payload.0)?;
    validate_documents(&payload)?;
    let email = payload.email.trim();

    if let Some(existing) = db::find_driver_by_email(pool.get_ref(), email).await? {
        return match existing.status() {
            Some(DriverStatus::Rejected) | Some(DriverStatus::Training) => {
                reregister_driver(pool.get_ref(), &existing, &payload).await
            }
            _ => Err(ApiError::bad_request("Driver already exists with this email")),
        };
    }

    let password = payload
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_DRIVER_PASSWORD);
    let hashed = auth::hash_password(password)?;

    let mut tx = pool.begin().await?;
    let driver_id = insert_driver(&mut tx, &payload, DriverStatus::Training).await?;
    sqlx::query("INSERT INTO users (username, email, password) VALUES (?, ?, ?)")
        .bind(email)
        .bind(email)
        .bind(&hashed)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    send_driver_event("driver_registered", driver_id);

    Ok(HttpResponse::Created().json(json!({
        "id": driver_id,
        "message": "Driver registered successfully",
        "status": DriverStatus::Training,
    })))
}

/// Driver yang ditolak atau masih training boleh mendaftar ulang; datanya ditimpa.
async fn reregister_driver(
    pool: &MySqlPool,
    existing: &Driver,
    payload: &RegisterDriverRequest,
) -> ApiResult<HttpResponse> {
    let ttl = utils::parse_date(non_empty(&payload.ttl).unwrap_or(DEFAULT_TTL))?;

    let mut update = PartialUpdate::new("drivers");
    update
        .set("nama", payload.nama.trim().to_string())
        .set("no_hp", payload.no_hp.clone())
        .set("kota", payload.kota.clone())
        .set("alamat", payload.alamat.clone())
        .set("ttl", ttl)
        .set("nik", non_empty(&payload.nik).unwrap_or(DEFAULT_NIK).to_string())
        .set("no_sim", payload.no_sim.clone().unwrap_or_default())
        .set("jenis_sim", payload.jenis_sim.clone().unwrap_or_default())
        .set("no_bpjs", payload.no_bpjs.clone().unwrap_or_default())
        .set(
            "nama_kontak_darurat",
            payload.nama_kontak_darurat.clone().unwrap_or_default(),
        )
        .set(
            "nomor_kontak_darurat",
            payload.nomor_kontak_darurat.clone().unwrap_or_default(),
        )
        .set(
            "hubungan_kontak_darurat",
            payload.hubungan_kontak_darurat.clone().unwrap_or_default(),
        )
        .set("foto_ktp", payload.foto_ktp.clone())
        .set("foto_sim", payload.foto_sim.clone())
        .set("foto_profil", payload.foto_profil.clone())
        .set("foto_sertifikat", payload.foto_sertifikat.clone())
        .set("foto_bpjs", payload.foto_bpjs.clone())
        .set("nama_bank", payload.nama_bank.clone())
        .set("nomor_rekening", payload.nomor_rekening.clone())
        .set("status", DriverStatus::Training.as_str())
        .set("alasan_penolakan", None::<String>);

    let mut qb = update.where_id("id_driver", existing.id_driver);
    qb.build().execute(pool).await?;

    send_driver_event("driver_updated", existing.id_driver);

    Ok(HttpResponse::Ok().json(json!({
        "id": existing.id_driver,
        "message": "Driver data updated successfully",
        "status": DriverStatus::Training,
    })))
}

#[derive(Debug, Deserialize)]
pub struct DriverLoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[post("/api/drivers/login")]
pub async fn login_driver(
    pool: web::Data<MySqlPool>,
    config: web::Data<AppConfig>,
    payload: web::Json<DriverLoginRequest>,
) -> ApiResult<HttpResponse> {
    let (Some(email), Some(password)) = (
        non_empty(&payload.email),
        payload.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::bad_request("Email and password are required"));
    };

    let user = db::find_user_by_username(pool.get_ref(), email)
        .await?
        .filter(|u| u.is_active && auth::verify_password(password, &u.password))
        .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".into()))?;

    let driver = db::find_driver_by_email(pool.get_ref(), email)
        .await?
        .ok_or_else(driver_not_found)?;

    let assignments: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM driver_armada WHERE id_driver = ?")
            .bind(driver.id_driver)
            .fetch_one(pool.get_ref())
            .await?;
    let has_vehicle = assignments > 0;

    let token = auth::generate_jwt(&user, &config.jwt_secret, config.jwt_ttl_days).map_err(|e| {
        log::error!("Gagal menghasilkan JWT: {:?}", e);
        ApiError::internal("Gagal menghasilkan token")
    })?;

    Ok(HttpResponse::Ok().json(json!({
        "token": token,
        "driver_id": driver.id_driver,
        "status": driver.status,
        "has_vehicle": has_vehicle,
        "message": "Login successful",
    })))
}

// ================= STATUS & DOKUMEN =================

async fn training_counts(pool: &MySqlPool, driver_id: i64) -> ApiResult<(i64, i64)> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM training_modules WHERE is_active = TRUE")
        .fetch_one(pool)
        .await?;
    let completed: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM driver_training_progress WHERE driver_id = ? AND is_completed = TRUE",
    )
    .bind(driver_id)
    .fetch_one(pool)
    .await?;
    Ok((completed, total))
}

#[get("/api/drivers/status")]
pub async fn check_driver_status(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = auth::verify_jwt(&req)?;
    let mut driver = current_driver(pool.get_ref(), &claims).await?;

    let mut training_completed = false;
    if driver.status() == Some(DriverStatus::Training) {
        let (completed, total) = training_counts(pool.get_ref(), driver.id_driver).await?;
        training_completed = training_passed(completed, total);

        if training_completed {
            sqlx::query("UPDATE drivers SET status = ? WHERE id_driver = ? AND status = ?")
                .bind(DriverStatus::Pending.as_str())
                .bind(driver.id_driver)
                .bind(DriverStatus::Training.as_str())
                .execute(pool.get_ref())
                .await?;
            driver.status = DriverStatus::Pending.as_str().to_string();
            log::info!("Driver {} selesai training, status pending", driver.id_driver);
        }
    }

    let rejected_documents = match (driver.status(), driver.alasan_penolakan.as_deref()) {
        (Some(DriverStatus::Rejected), Some(reason)) => driver::parse_rejected_documents(reason),
        _ => Vec::new(),
    };

    Ok(HttpResponse::Ok().json(json!({
        "status": driver.status,
        "driver_id": driver.id_driver,
        "training_completed": training_completed,
        "alasan_penolakan": driver.alasan_penolakan,
        "rejected_documents": rejected_documents,
    })))
}

#[post("/api/drivers/update-documents")]
pub async fn update_rejected_documents(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    payload: web::Json<DocumentUpdate>,
) -> ApiResult<HttpResponse> {
    let claims = auth::verify_jwt(&req)?;
    let driver = current_driver(pool.get_ref(), &claims).await?;

    if driver.status() != Some(DriverStatus::Rejected) {
        return Err(ApiError::bad_request("Driver is not in rejected status"));
    }

    let data = payload.into_inner();
    utils::ensure_valid_documents(&[
        ("KTP", data.foto_ktp.as_ref()),
        ("SIM", data.foto_sim.as_ref()),
        ("BPJS", data.foto_bpjs.as_ref()),
        ("Sertifikat", data.foto_sertifikat.as_ref()),
        ("Foto Profil", data.foto_profil.as_ref()),
    ])?;
    let updated_labels = data.updated_labels();

    let ttl = utils::parse_optional_date(data.ttl.as_deref())?;
    let sim_exp = utils::parse_optional_date(data.tanggal_kedaluarsa_sim.as_deref())?;
    let bpjs_exp = utils::parse_optional_date(data.tanggal_kedaluarsa_bpjs.as_deref())?;
    let sertifikat_exp =
        utils::parse_optional_date(data.tanggal_kedaluarsa_sertifikat.as_deref())?;

    let mut update = PartialUpdate::new("drivers");
    update
        .set_some("foto_ktp", data.foto_ktp)
        .set_some("foto_sim", data.foto_sim)
        .set_some("foto_bpjs", data.foto_bpjs)
        .set_some("foto_sertifikat", data.foto_sertifikat)
        .set_some("foto_profil", data.foto_profil)
        .set_some("nik", data.nik)
        .set_some("nama", data.nama)
        .set_some("ttl", ttl)
        .set_some("no_sim", data.no_sim)
        .set_some("jenis_sim", data.jenis_sim)
        .set_some("tanggal_kedaluarsa_sim", sim_exp)
        .set_some("no_bpjs", data.no_bpjs)
        .set_some("tanggal_kedaluarsa_bpjs", bpjs_exp)
        .set_some("no_sertifikat", data.no_sertifikat)
        .set_some("tanggal_kedaluarsa_sertifikat", sertifikat_exp);

    if !update.is_empty() {
        let mut qb = update.where_id("id_driver", driver.id_driver);
        qb.build().execute(pool.get_ref()).await?;
    }

    send_driver_event("driver_document_updated", driver.id_driver);

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Document updated successfully: {}", updated_labels.join(", ")),
        "status": DriverStatus::Rejected,
    })))
}

#[post("/api/drivers/complete-documents")]
pub async fn complete_rejected_documents(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = auth::verify_jwt(&req)?;
    let driver = current_driver(pool.get_ref(), &claims).await?;

    if driver.status() != Some(DriverStatus::Rejected) {
        return Err(ApiError::bad_request("Driver is not in rejected status"));
    }

    sqlx::query("UPDATE drivers SET status = ?, alasan_penolakan = NULL WHERE id_driver = ?")
        .bind(DriverStatus::Pending.as_str())
        .bind(driver.id_driver)
        .execute(pool.get_ref())
        .await?;

    send_driver_event("driver_documents_completed", driver.id_driver);

    Ok(HttpResponse::Ok().json(json!({
        "message": "All documents completed successfully",
        "status": DriverStatus::Pending,
    })))
}

// ================= STATISTIK & PERJALANAN =================

pub(crate) fn completed_status_placeholders() -> String {
    vec!["?"; COMPLETED_TRIP_STATUSES.len()].join(", ")
}

#[get("/api/drivers/statistics")]
pub async fn get_driver_statistics(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = auth::verify_jwt(&req)?;
    let driver = current_driver(pool.get_ref(), &claims).await?;

    let ratings: Vec<i32> = sqlx::query_scalar("SELECT rating FROM rating_driver WHERE id_driver = ?")
        .bind(driver.id_driver)
        .fetch_all(pool.get_ref())
        .await?;

    let trips_sql = format!(
        "SELECT COUNT(*) FROM delivery_orders WHERE id_driver = ? AND status IN ({})",
        completed_status_placeholders()
    );
    let mut trips_q = sqlx::query_scalar::<_, i64>(&trips_sql).bind(driver.id_driver);
    for status in COMPLETED_TRIP_STATUSES {
        trips_q = trips_q.bind(status);
    }
    let total_trips = trips_q.fetch_one(pool.get_ref()).await?;

    let recent_ratings = sqlx::query_as::<_, RecentRating>(
        r#"
        SELECT r.rating, r.ulasan, r.timestamp, p.nama AS pelanggan
        FROM rating_driver r
        JOIN pelanggan p ON p.id_pelanggan = r.id_pelanggan
        WHERE r.id_driver = ?
        ORDER BY r.timestamp DESC
        LIMIT 5
        "#,
    )
    .bind(driver.id_driver)
    .fetch_all(pool.get_ref())
    .await?;

    let today = Utc::now().date_naive();

    Ok(HttpResponse::Ok().json(json!({
        "id_driver": driver.id_driver,
        "nama": driver.nama,
        "kota": driver.kota,
        "foto_profil": driver.foto_profil,
        "average_rating": driver::average_rating(&ratings),
        "total_trips": total_trips,
        "experience_years": driver::experience_years(driver.wkt_daftar.date(), today),
        "recent_ratings": recent_ratings,
        "wkt_daftar": driver.wkt_daftar,
    })))
}

#[get("/api/drivers/trips")]
pub async fn get_driver_trips(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = auth::verify_jwt(&req)?;
    let driver = current_driver(pool.get_ref(), &claims).await?;

    let sql = format!(
        r#"
        SELECT d.id_delivery_order, d.tanggal_kirim, d.status,
               s.alamat_pengiriman, s.total_harga_order,
               a.nomor_polisi, a.jenis_armada,
               p.nama AS pelanggan
        FROM delivery_orders d
        LEFT JOIN sales_orders s ON s.id_sales_order = d.id_sales_order
        LEFT JOIN armada a ON a.id_armada = d.id_armada
        LEFT JOIN pelanggan p ON p.id_pelanggan = s.id_pelanggan
        WHERE d.id_driver = ? AND d.status IN ({})
        ORDER BY d.tanggal_kirim DESC
        "#,
        completed_status_placeholders()
    );
    let mut q = sqlx::query_as::<_, TripRow>(&sql).bind(driver.id_driver);
    for status in COMPLETED_TRIP_STATUSES {
        q = q.bind(status);
    }
    let rows = q.fetch_all(pool.get_ref()).await?;

    let trips: Vec<_> = rows
        .into_iter()
        .map(|trip| {
            let armada = trip.nomor_polisi.as_ref().map(|plat| {
                json!({ "nomor_polisi": plat, "jenis_armada": trip.jenis_armada })
            });
            json!({
                "id_delivery_order": trip.id_delivery_order,
                "tanggal_kirim": trip.tanggal_kirim,
                "status": trip.status,
                "alamat_pengiriman": trip
                    .alamat_pengiriman
                    .unwrap_or_else(|| "Alamat tidak tersedia".into()),
                "total_harga": trip.total_harga_order.unwrap_or_default(),
                "armada": armada,
                "pelanggan": trip
                    .pelanggan
                    .unwrap_or_else(|| "Pelanggan tidak diketahui".into()),
            })
        })
        .collect();

    Ok(HttpResponse::Ok().json(trips))
}

// ================= CRUD =================

#[get("/api/drivers")]
pub async fn list_drivers(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    query: web::Query<DriverListFilter>,
) -> ApiResult<HttpResponse> {
    let claims = auth::verify_jwt(&req)?;

    let mut qb: QueryBuilder<MySql> =
        QueryBuilder::new(format!("SELECT {} FROM drivers WHERE 1=1", DRIVER_COLUMNS));

    if claims.is_admin() {
        if let Some(status) = non_empty(&query.status) {
            qb.push(" AND status = ").push_bind(status.to_string());
        }
        if let Some(search) = non_empty(&query.search) {
            let like = format!("%{}%", search);
            qb.push(" AND (nama LIKE ")
                .push_bind(like.clone())
                .push(" OR email LIKE ")
                .push_bind(like.clone())
                .push(" OR no_hp LIKE ")
                .push_bind(like)
                .push(")");
        }
    } else {
        qb.push(" AND email = ").push_bind(claims.email.clone());
    }
    qb.push(" ORDER BY wkt_daftar DESC");

    let drivers = qb.build_query_as::<Driver>().fetch_all(pool.get_ref()).await?;

    Ok(HttpResponse::Ok().json(drivers))
}

#[post("/api/drivers")]
pub async fn create_driver(
    pool: web::Data<MySqlPool>,
    payload: web::Json<RegisterDriverRequest>,
) -> ApiResult<HttpResponse> {
    utils::validate_payload(&payload.0)?;
    validate_documents(&payload)?;
    let email = payload.email.trim();

    let mut tx = pool.begin().await?;
    let driver_id = insert_driver(&mut tx, &payload, DriverStatus::Pending).await?;

    let existing_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?")
        .bind(email)
        .fetch_one(&mut *tx)
        .await?;
    if existing_users == 0 {
        let password = payload
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_DRIVER_PASSWORD);
        sqlx::query("INSERT INTO users (username, email, password) VALUES (?, ?, ?)")
            .bind(email)
            .bind(email)
            .bind(auth::hash_password(password)?)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    send_driver_event("driver_created", driver_id);

    let driver = db::find_driver_by_id(pool.get_ref(), driver_id)
        .await?
        .ok_or_else(driver_not_found)?;
    Ok(HttpResponse::Created().json(driver))
}

#[get("/api/drivers/{id:\\d+}")]
pub async fn get_driver(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let claims = auth::verify_jwt(&req)?;
    let driver = db::find_driver_by_id(pool.get_ref(), *id)
        .await?
        .ok_or_else(driver_not_found)?;

    // Driver lain diperlakukan seolah tidak ada.
    if !can_access(&claims, &driver) {
        return Err(driver_not_found());
    }

    Ok(HttpResponse::Ok().json(driver))
}

async fn apply_driver_update(
    pool: &MySqlPool,
    claims: &Claims,
    id: i64,
    data: DriverUpdate,
) -> ApiResult<HttpResponse> {
    let driver = db::find_driver_by_id(pool, id)
        .await?
        .ok_or_else(driver_not_found)?;

    if !can_access(claims, &driver) {
        return Err(ApiError::forbidden("Permission denied"));
    }
    if data.touches_status() && !claims.is_admin() {
        return Err(ApiError::forbidden(
            "Hanya admin yang dapat mengubah status driver",
        ));
    }
    utils::validate_payload(&data)?;

    let status = match data.status.as_deref() {
        Some(s) => Some(s.parse::<DriverStatus>().map_err(ApiError::BadRequest)?),
        None => None,
    };
    let ttl = utils::parse_optional_date(data.ttl.as_deref())?;
    let sim_exp = utils::parse_optional_date(data.tanggal_kedaluarsa_sim.as_deref())?;
    let bpjs_exp = utils::parse_optional_date(data.tanggal_kedaluarsa_bpjs.as_deref())?;
    let sertifikat_exp =
        utils::parse_optional_date(data.tanggal_kedaluarsa_sertifikat.as_deref())?;
    utils::ensure_valid_documents(&[
        ("KTP", data.foto_ktp.as_ref()),
        ("SIM", data.foto_sim.as_ref()),
        ("Foto Profil", data.foto_profil.as_ref()),
        ("Sertifikat", data.foto_sertifikat.as_ref()),
        ("BPJS", data.foto_bpjs.as_ref()),
    ])?;

    let mut update = PartialUpdate::new("drivers");
    update
        .set_some("nama", data.nama)
        .set_some("email", data.email)
        .set_some("no_hp", data.no_hp)
        .set_some("kota", data.kota)
        .set_some("alamat", data.alamat)
        .set_some("ttl", ttl)
        .set_some("nik", data.nik)
        .set_some("no_sim", data.no_sim)
        .set_some("jenis_sim", data.jenis_sim)
        .set_some("tanggal_kedaluarsa_sim", sim_exp)
        .set_some("no_bpjs", data.no_bpjs)
        .set_some("tanggal_kedaluarsa_bpjs", bpjs_exp)
        .set_some("no_sertifikat", data.no_sertifikat)
        .set_some("tanggal_kedaluarsa_sertifikat", sertifikat_exp)
        .set_some("nama_kontak_darurat", data.nama_kontak_darurat)
        .set_some("nomor_kontak_darurat", data.nomor_kontak_darurat)
        .set_some("hubungan_kontak_darurat", data.hubungan_kontak_darurat)
        .set_some("foto_ktp", data.foto_ktp)
        .set_some("foto_sim", data.foto_sim)
        .set_some("foto_profil", data.foto_profil)
        .set_some("foto_sertifikat", data.foto_sertifikat)
        .set_some("foto_bpjs", data.foto_bpjs)
        .set_some("nama_bank", data.nama_bank)
        .set_some("nomor_rekening", data.nomor_rekening)
        .set_some("status", status.map(|s| s.as_str()))
        .set_some("alasan_penolakan", data.alasan_penolakan);

    if !update.is_empty() {
        let mut qb = update.where_id("id_driver", id);
        qb.build().execute(pool).await?;
        send_driver_event("driver_updated", id);
    }

    let updated = db::find_driver_by_id(pool, id)
        .await?
        .ok_or_else(driver_not_found)?;
    Ok(HttpResponse::Ok().json(updated))
}

#[put("/api/drivers/{id:\\d+}")]
pub async fn update_driver(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
    payload: web::Json<DriverUpdate>,
) -> ApiResult<HttpResponse> {
    let claims = auth::verify_jwt(&req)?;
    apply_driver_update(pool.get_ref(), &claims, *id, payload.into_inner()).await
}

#[patch("/api/drivers/{id:\\d+}")]
pub async fn patch_driver(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
    payload: web::Json<DriverUpdate>,
) -> ApiResult<HttpResponse> {
    let claims = auth::verify_jwt(&req)?;
    apply_driver_update(pool.get_ref(), &claims, *id, payload.into_inner()).await
}

/// Hapus driver beserta akun login dan penugasan armadanya.
#[delete("/api/drivers/{id:\\d+}")]
pub async fn delete_driver(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let claims = auth::require_admin(&req)?;
    let driver = db::find_driver_by_id(pool.get_ref(), *id)
        .await?
        .ok_or_else(driver_not_found)?;

    log::info!(
        "Admin {} menghapus driver {} (ID: {}, Email: {})",
        claims.sub,
        driver.nama,
        driver.id_driver,
        driver.email
    );

    let mut tx = pool.begin().await?;

    let users = sqlx::query("DELETE FROM users WHERE email = ? AND is_staff = FALSE")
        .bind(&driver.email)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    let assignments = sqlx::query("DELETE FROM driver_armada WHERE id_driver = ?")
        .bind(driver.id_driver)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    sqlx::query("DELETE FROM drivers WHERE id_driver = ?")
        .bind(driver.id_driver)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    log::info!(
        "Driver {} dihapus: {} akun, {} penugasan armada",
        driver.id_driver,
        users,
        assignments
    );
    send_driver_event("driver_deleted", driver.id_driver);

    Ok(HttpResponse::NoContent().finish())
}

// ================= AKSI ADMIN =================

async fn set_driver_status(
    pool: &MySqlPool,
    id: i64,
    status: DriverStatus,
    reason: Option<String>,
) -> ApiResult<()> {
    let result = sqlx::query("UPDATE drivers SET status = ?, alasan_penolakan = ? WHERE id_driver = ?")
        .bind(status.as_str())
        .bind(reason)
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 && db::find_driver_by_id(pool, id).await?.is_none() {
        return Err(driver_not_found());
    }
    Ok(())
}

#[post("/api/drivers/{id:\\d+}/activate")]
pub async fn activate_driver(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    let driver = db::find_driver_by_id(pool.get_ref(), *id)
        .await?
        .ok_or_else(driver_not_found)?;

    sqlx::query("UPDATE drivers SET status = ? WHERE id_driver = ?")
        .bind(DriverStatus::Active.as_str())
        .bind(driver.id_driver)
        .execute(pool.get_ref())
        .await?;
    send_driver_event("driver_activated", driver.id_driver);

    Ok(HttpResponse::Ok().json(json!({ "status": "activated" })))
}

#[post("/api/drivers/{id:\\d+}/suspend")]
pub async fn suspend_driver(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    let driver = db::find_driver_by_id(pool.get_ref(), *id)
        .await?
        .ok_or_else(driver_not_found)?;

    sqlx::query("UPDATE drivers SET status = ? WHERE id_driver = ?")
        .bind(DriverStatus::Suspended.as_str())
        .bind(driver.id_driver)
        .execute(pool.get_ref())
        .await?;
    send_driver_event("driver_suspended", driver.id_driver);

    Ok(HttpResponse::Ok().json(json!({ "status": "suspended" })))
}

#[post("/api/drivers/{id:\\d+}/accept")]
pub async fn accept_driver(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    let driver = db::find_driver_by_id(pool.get_ref(), *id)
        .await?
        .ok_or_else(driver_not_found)?;

    if driver.status() != Some(DriverStatus::Pending) {
        return Err(ApiError::bad_request("Driver is not in pending status"));
    }

    sqlx::query("UPDATE drivers SET status = ? WHERE id_driver = ?")
        .bind(DriverStatus::Active.as_str())
        .bind(driver.id_driver)
        .execute(pool.get_ref())
        .await?;
    send_driver_event("driver_accepted", driver.id_driver);

    Ok(HttpResponse::Ok().json(json!({ "status": "accepted and activated" })))
}

#[post("/api/drivers/{id:\\d+}/update_status")]
pub async fn update_driver_status(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
    payload: web::Json<StatusUpdateRequest>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;

    let status = payload
        .status
        .parse::<DriverStatus>()
        .ok()
        .filter(DriverStatus::settable_by_admin)
        .ok_or_else(|| ApiError::bad_request("Invalid status"))?;

    let driver = db::find_driver_by_id(pool.get_ref(), *id)
        .await?
        .ok_or_else(driver_not_found)?;

    // Alasan lama dipertahankan bila status rejected dikirim tanpa alasan baru.
    let reason = match status {
        DriverStatus::Rejected => non_empty(&payload.rejection_reason)
            .map(str::to_string)
            .or(driver.alasan_penolakan),
        _ => None,
    };

    set_driver_status(pool.get_ref(), driver.id_driver, status, reason.clone()).await?;
    send_driver_event(status.event_name(), driver.id_driver);

    Ok(HttpResponse::Ok().json(json!({
        "status": status,
        "message": format!("Driver status updated to {}", status),
        "rejection_reason": reason,
    })))
}

// ================= AKSI MASSAL =================

async fn bulk_set_status(
    pool: &MySqlPool,
    ids: &[i64],
    status: DriverStatus,
    only_from: Option<DriverStatus>,
) -> ApiResult<u64> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut qb: QueryBuilder<MySql> = QueryBuilder::new("UPDATE drivers SET status = ");
    qb.push_bind(status.as_str()).push(" WHERE ");
    db::push_id_list(&mut qb, "id_driver", ids);
    if let Some(from) = only_from {
        qb.push(" AND status = ").push_bind(from.as_str());
    }

    Ok(qb.build().execute(pool).await?.rows_affected())
}

#[post("/api/drivers/bulk_activate")]
pub async fn bulk_activate(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    payload: web::Json<BulkDriverRequest>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    let updated = bulk_set_status(pool.get_ref(), &payload.driver_ids, DriverStatus::Active, None).await?;
    for id in &payload.driver_ids {
        send_driver_event("driver_activated", *id);
    }
    Ok(HttpResponse::Ok().json(json!({ "message": format!("{} drivers activated", updated) })))
}

#[post("/api/drivers/bulk_suspend")]
pub async fn bulk_suspend(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    payload: web::Json<BulkDriverRequest>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    let updated =
        bulk_set_status(pool.get_ref(), &payload.driver_ids, DriverStatus::Suspended, None).await?;
    for id in &payload.driver_ids {
        send_driver_event("driver_suspended", *id);
    }
    Ok(HttpResponse::Ok().json(json!({ "message": format!("{} drivers suspended", updated) })))
}

#[post("/api/drivers/bulk_accept")]
pub async fn bulk_accept(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    payload: web::Json<BulkDriverRequest>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    let updated = bulk_set_status(
        pool.get_ref(),
        &payload.driver_ids,
        DriverStatus::Active,
        Some(DriverStatus::Pending),
    )
    .await?;
    for id in &payload.driver_ids {
        send_driver_event("driver_accepted", *id);
    }
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("{} pending drivers accepted and activated", updated)
    })))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(register_driver)
        .service(login_driver)
        .service(check_driver_status)
        .service(update_rejected_documents)
        .service(complete_rejected_documents)
        .service(get_driver_statistics)
        .service(get_driver_trips)
        .service(bulk_activate)
        .service(bulk_suspend)
        .service(bulk_accept)
        .service(list_drivers)
        .service(create_driver)
        .service(get_driver)
        .service(update_driver)
        .service(patch_driver)
        .service(delete_driver)
        .service(activate_driver)
        .service(suspend_driver)
        .service(accept_driver)
        .service(update_driver_status);
}
