// src/controllers/armada_controller.rs
use actix_web::{HttpRequest, HttpResponse, delete, get, patch, post, put, web};
use sqlx::{MySql, MySqlPool, QueryBuilder};

use crate::auth;
use crate::controllers::driver_controller::current_driver;
use crate::db::PartialUpdate;
use crate::errors::{ApiError, ApiResult};
use crate::models::armada::{
    ARMADA_COLUMNS, Armada, ArmadaFilter, ArmadaForm, DRIVER_ARMADA_COLUMNS, DriverArmada,
    DriverArmadaRequest, DriverArmadaUpdate,
};
use crate::utils;

fn armada_not_found() -> ApiError {
    ApiError::not_found("Armada tidak ditemukan")
}

async fn find_armada(pool: &MySqlPool, id: i64) -> ApiResult<Armada> {
    sqlx::query_as::<_, Armada>(&format!(
        "SELECT {} FROM armada WHERE id_armada = ?",
        ARMADA_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(armada_not_found)
}

fn validate_vehicle_documents(form: &ArmadaForm) -> ApiResult<()> {
    utils::ensure_valid_documents(&[
        ("STNK", form.foto_stnk.as_ref()),
        ("BPKB", form.foto_bpkb.as_ref()),
    ])
}

// ================= ARMADA =================

#[get("/api/armada")]
pub async fn list_armada(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    query: web::Query<ArmadaFilter>,
) -> ApiResult<HttpResponse> {
    auth::verify_jwt(&req)?;

    let mut qb: QueryBuilder<MySql> =
        QueryBuilder::new(format!("SELECT {} FROM armada WHERE 1=1", ARMADA_COLUMNS));

    if let Some(status) = query.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(jenis) = query.jenis_armada.as_deref().filter(|j| !j.trim().is_empty()) {
        qb.push(" AND jenis_armada = ").push_bind(jenis.trim().to_string());
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let like = format!("%{}%", search.trim());
        qb.push(" AND (nomor_polisi LIKE ")
            .push_bind(like.clone())
            .push(" OR id_stnk LIKE ")
            .push_bind(like)
            .push(")");
    }
    qb.push(" ORDER BY id_armada DESC");

    let armada = qb.build_query_as::<Armada>().fetch_all(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(armada))
}

#[get("/api/armada/{id:\\d+}")]
pub async fn get_armada(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    auth::verify_jwt(&req)?;
    let armada = find_armada(pool.get_ref(), *id).await?;
    Ok(HttpResponse::Ok().json(armada))
}

/// Driver juga boleh mendaftarkan kendaraannya sendiri.
#[post("/api/armada")]
pub async fn create_armada(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    payload: web::Json<ArmadaForm>,
) -> ApiResult<HttpResponse> {
    auth::verify_jwt(&req)?;
    utils::validate_payload(&payload.0)?;
    validate_vehicle_documents(&payload)?;

    if let Some(field) = payload.first_missing() {
        return Err(ApiError::bad_request(format!("Field {} harus diisi", field)));
    }

    let form = payload.into_inner();
    let result = sqlx::query(
        r#"
        INSERT INTO armada
        (nomor_polisi, jenis_armada, kapasitas_muatan, status, warna_armada,
         id_stnk, tahun_pembuatan, id_bpkb, foto_stnk, foto_bpkb)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(form.nomor_polisi)
    .bind(form.jenis_armada)
    .bind(form.kapasitas_muatan)
    .bind(form.status.unwrap_or(true))
    .bind(form.warna_armada)
    .bind(form.id_stnk)
    .bind(form.tahun_pembuatan)
    .bind(form.id_bpkb)
    .bind(form.foto_stnk)
    .bind(form.foto_bpkb)
    .execute(pool.get_ref())
    .await?;

    let armada = find_armada(pool.get_ref(), result.last_insert_id() as i64).await?;
    log::info!("Armada {} ditambahkan", armada.nomor_polisi);
    Ok(HttpResponse::Created().json(armada))
}

async fn apply_armada_update(pool: &MySqlPool, id: i64, form: ArmadaForm) -> ApiResult<Armada> {
    utils::validate_payload(&form)?;
    validate_vehicle_documents(&form)?;
    find_armada(pool, id).await?;

    let mut update = PartialUpdate::new("armada");
    update
        .set_some("nomor_polisi", form.nomor_polisi)
        .set_some("jenis_armada", form.jenis_armada)
        .set_some("kapasitas_muatan", form.kapasitas_muatan)
        .set_some("status", form.status)
        .set_some("warna_armada", form.warna_armada)
        .set_some("id_stnk", form.id_stnk)
        .set_some("tahun_pembuatan", form.tahun_pembuatan)
        .set_some("id_bpkb", form.id_bpkb)
        .set_some("foto_stnk", form.foto_stnk)
        .set_some("foto_bpkb", form.foto_bpkb);

    if !update.is_empty() {
        let mut qb = update.where_id("id_armada", id);
        qb.build().execute(pool).await?;
    }

    find_armada(pool, id).await
}

#[put("/api/armada/{id:\\d+}")]
pub async fn update_armada(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
    payload: web::Json<ArmadaForm>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    let armada = apply_armada_update(pool.get_ref(), *id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(armada))
}

#[patch("/api/armada/{id:\\d+}")]
pub async fn patch_armada(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
    payload: web::Json<ArmadaForm>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    let armada = apply_armada_update(pool.get_ref(), *id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(armada))
}

#[delete("/api/armada/{id:\\d+}")]
pub async fn delete_armada(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    let result = sqlx::query("DELETE FROM armada WHERE id_armada = ?")
        .bind(*id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(armada_not_found());
    }
    Ok(HttpResponse::NoContent().finish())
}

// ================= DRIVER ARMADA =================

fn assignment_not_found() -> ApiError {
    ApiError::not_found("Penugasan armada tidak ditemukan")
}

async fn find_assignment(pool: &MySqlPool, id: i64) -> ApiResult<DriverArmada> {
    sqlx::query_as::<_, DriverArmada>(&format!(
        "SELECT {} FROM driver_armada WHERE id = ?",
        DRIVER_ARMADA_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(assignment_not_found)
}

/// Id driver milik pemanggil bila bukan admin; `None` untuk admin.
async fn scoped_driver_id(pool: &MySqlPool, req: &HttpRequest) -> ApiResult<Option<i64>> {
    let claims = auth::verify_jwt(req)?;
    if claims.is_admin() {
        return Ok(None);
    }
    let driver = current_driver(pool, &claims).await?;
    Ok(Some(driver.id_driver))
}

#[get("/api/driver-armada")]
pub async fn list_driver_armada(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = auth::verify_jwt(&req)?;

    let rows = if claims.is_admin() {
        sqlx::query_as::<_, DriverArmada>(&format!(
            "SELECT {} FROM driver_armada ORDER BY id DESC",
            DRIVER_ARMADA_COLUMNS
        ))
        .fetch_all(pool.get_ref())
        .await?
    } else {
        match crate::db::find_driver_by_email(pool.get_ref(), &claims.email).await? {
            Some(driver) => {
                sqlx::query_as::<_, DriverArmada>(&format!(
                    "SELECT {} FROM driver_armada WHERE id_driver = ? ORDER BY id DESC",
                    DRIVER_ARMADA_COLUMNS
                ))
                .bind(driver.id_driver)
                .fetch_all(pool.get_ref())
                .await?
            }
            None => Vec::new(),
        }
    };

    Ok(HttpResponse::Ok().json(rows))
}

#[get("/api/driver-armada/{id:\\d+}")]
pub async fn get_driver_armada(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let scope = scoped_driver_id(pool.get_ref(), &req).await?;
    let assignment = find_assignment(pool.get_ref(), *id).await?;

    if scope.is_some_and(|driver_id| driver_id != assignment.id_driver) {
        return Err(assignment_not_found());
    }
    Ok(HttpResponse::Ok().json(assignment))
}

/// Driver diambil dari token. Penugasan yang sudah ada untuk armada yang sama
/// dikembalikan apa adanya (200), bukan dibuat ulang.
#[post("/api/driver-armada")]
pub async fn create_driver_armada(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    payload: web::Json<DriverArmadaRequest>,
) -> ApiResult<HttpResponse> {
    let claims = auth::verify_jwt(&req)?;
    let driver = crate::db::find_driver_by_email(pool.get_ref(), &claims.email)
        .await?
        .ok_or_else(|| ApiError::bad_request("Driver not found"))?;

    let existing = sqlx::query_as::<_, DriverArmada>(&format!(
        "SELECT {} FROM driver_armada WHERE id_driver = ? AND id_armada = ? LIMIT 1",
        DRIVER_ARMADA_COLUMNS
    ))
    .bind(driver.id_driver)
    .bind(payload.id_armada)
    .fetch_optional(pool.get_ref())
    .await?;

    if let Some(existing) = existing {
        return Ok(HttpResponse::Ok().json(existing));
    }

    find_armada(pool.get_ref(), payload.id_armada)
        .await
        .map_err(|_| ApiError::bad_request("Armada tidak ditemukan"))?;

    let result = sqlx::query(
        "INSERT INTO driver_armada (id_driver, id_armada, tanggal_mulai, tanggal_selesai) VALUES (?, ?, ?, ?)",
    )
    .bind(driver.id_driver)
    .bind(payload.id_armada)
    .bind(payload.tanggal_mulai)
    .bind(payload.tanggal_selesai)
    .execute(pool.get_ref())
    .await?;

    let assignment = find_assignment(pool.get_ref(), result.last_insert_id() as i64).await?;
    log::info!(
        "Driver {} ditugaskan ke armada {}",
        driver.id_driver,
        payload.id_armada
    );
    Ok(HttpResponse::Created().json(assignment))
}

#[put("/api/driver-armada/{id:\\d+}")]
pub async fn update_driver_armada(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
    payload: web::Json<DriverArmadaUpdate>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    find_assignment(pool.get_ref(), *id).await?;

    let data = payload.into_inner();
    let mut update = PartialUpdate::new("driver_armada");
    update
        .set_some("id_driver", data.id_driver)
        .set_some("id_armada", data.id_armada)
        .set_some("tanggal_mulai", data.tanggal_mulai)
        .set_some("tanggal_selesai", data.tanggal_selesai);

    if !update.is_empty() {
        let mut qb = update.where_id("id", *id);
        qb.build().execute(pool.get_ref()).await?;
    }

    let assignment = find_assignment(pool.get_ref(), *id).await?;
    Ok(HttpResponse::Ok().json(assignment))
}

#[delete("/api/driver-armada/{id:\\d+}")]
pub async fn delete_driver_armada(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let scope = scoped_driver_id(pool.get_ref(), &req).await?;
    let assignment = find_assignment(pool.get_ref(), *id).await?;

    if scope.is_some_and(|driver_id| driver_id != assignment.id_driver) {
        return Err(assignment_not_found());
    }

    sqlx::query("DELETE FROM driver_armada WHERE id = ?")
        .bind(assignment.id)
        .execute(pool.get_ref())
        .await?;

    Ok(HttpResponse::NoContent().finish())
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_armada)
        .service(get_armada)
        .service(create_armada)
        .service(update_armada)
        .service(patch_armada)
        .service(delete_armada)
        .service(list_driver_armada)
        .service(get_driver_armada)
        .service(create_driver_armada)
        .service(update_driver_armada)
        .service(delete_driver_armada);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn vehicle_documents_must_be_base64() {
        let form: ArmadaForm =
            serde_json::from_value(json!({ "foto_stnk": "%%% bukan base64" })).unwrap();
        assert!(validate_vehicle_documents(&form).is_err());

        let form: ArmadaForm =
            serde_json::from_value(json!({ "foto_bpkb": "data:image/png;base64,QUJD" })).unwrap();
        assert!(validate_vehicle_documents(&form).is_ok());
    }
}
