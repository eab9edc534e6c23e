// src/controllers/admin_controller.rs
use actix_web::{HttpRequest, HttpResponse, get, post, web};
use serde::Serialize;
use serde_json::json;
use sqlx::{FromRow, MySqlPool};

use crate::auth;
use crate::controllers::training_controller::{find_module, module_contents, module_quizzes};
use crate::db::{self, PartialUpdate};
use crate::errors::{ApiError, ApiResult};
use crate::models::dispatch::OrderStatus;
use crate::models::driver::{AdminStatusRequest, DriverStatus, DriverSummary};
use crate::models::training::{MODULE_COLUMNS, TrainingModule, level_order};
use crate::services::driver_service::send_driver_event;
use crate::utils;

/// Hitungan per status; status yang belum punya baris tetap muncul dengan 0.
fn counts_by_status(rows: &[(String, i64)], statuses: &[&str]) -> serde_json::Map<String, serde_json::Value> {
    statuses
        .iter()
        .map(|status| {
            let count = rows
                .iter()
                .find(|(s, _)| s == status)
                .map(|(_, c)| *c)
                .unwrap_or(0);
            (status.to_string(), json!(count))
        })
        .collect()
}

#[get("/api/admin/dashboard")]
pub async fn dashboard(pool: web::Data<MySqlPool>, req: HttpRequest) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;

    let driver_rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM drivers GROUP BY status")
            .fetch_all(pool.get_ref())
            .await?;
    let driver_statuses: Vec<&str> = DriverStatus::ALL.iter().map(|s| s.as_str()).collect();
    let total_drivers: i64 = driver_rows.iter().map(|(_, c)| c).sum();

    let (total_armada, active_armada): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), CAST(COALESCE(SUM(status), 0) AS SIGNED) FROM armada",
    )
    .fetch_one(pool.get_ref())
    .await?;
    let assigned_armada: i64 =
        sqlx::query_scalar("SELECT COUNT(DISTINCT id_armada) FROM driver_armada")
            .fetch_one(pool.get_ref())
            .await?;

    let order_rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM orders GROUP BY status")
            .fetch_all(pool.get_ref())
            .await?;
    let order_statuses: Vec<&str> = OrderStatus::ALL.iter().map(|s| s.as_str()).collect();

    let recent_drivers = sqlx::query_as::<_, DriverSummary>(
        r#"
        SELECT id_driver, nama, email, kota, status, wkt_daftar
        FROM drivers
        ORDER BY wkt_daftar DESC
        LIMIT 10
        "#,
    )
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "drivers": {
            "total": total_drivers,
            "by_status": counts_by_status(&driver_rows, &driver_statuses),
        },
        "armada": {
            "total": total_armada,
            "active": active_armada,
            "inactive": total_armada - active_armada,
            "assigned": assigned_armada,
        },
        "orders": counts_by_status(&order_rows, &order_statuses),
        "recent_drivers": recent_drivers,
    })))
}

#[get("/api/admin/drivers/{id:\\d+}")]
pub async fn driver_detail(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    let driver = db::find_driver_by_id(pool.get_ref(), *id)
        .await?
        .ok_or_else(|| ApiError::not_found("Driver tidak ditemukan"))?;

    let preview = |photo: Option<&String>| {
        photo
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(utils::photo_data_uri)
    };
    let previews = json!({
        "ktp": preview(driver.foto_ktp.as_ref()),
        "sim": preview(driver.foto_sim.as_ref()),
        "profil": preview(driver.foto_profil.as_ref()),
        "sertifikat": preview(driver.foto_sertifikat.as_ref()),
        "bpjs": preview(driver.foto_bpjs.as_ref()),
    });

    Ok(HttpResponse::Ok().json(json!({
        "has_photos": driver.has_photos(),
        "photo_previews": previews,
        "driver": driver,
    })))
}

#[post("/api/admin/drivers/{id:\\d+}/status")]
pub async fn update_driver_status(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
    payload: web::Json<AdminStatusRequest>,
) -> ApiResult<HttpResponse> {
    let claims = auth::require_admin(&req)?;
    let change = payload.resolve().map_err(ApiError::BadRequest)?;

    let driver = db::find_driver_by_id(pool.get_ref(), *id)
        .await?
        .ok_or_else(|| ApiError::not_found("Driver tidak ditemukan"))?;

    let mut update = PartialUpdate::new("drivers");
    update.set("status", change.status.as_str());
    if let Some(alasan) = change.alasan_penolakan.clone() {
        update.set("alasan_penolakan", alasan);
    }
    let mut qb = update.where_id("id_driver", driver.id_driver);
    qb.build().execute(pool.get_ref()).await?;

    log::info!(
        "Status driver {} ({}) diubah {} -> {} oleh {}",
        driver.id_driver,
        driver.nama,
        driver.status,
        change.status,
        claims.sub
    );
    send_driver_event(change.status.event_name(), driver.id_driver);

    let alasan = match change.alasan_penolakan {
        Some(alasan) => alasan,
        None => driver.alasan_penolakan,
    };

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Status driver {} berhasil diubah", driver.nama),
        "id_driver": driver.id_driver,
        "status": change.status,
        "alasan_penolakan": alasan,
    })))
}

#[derive(Debug, Serialize, FromRow)]
pub struct ModuleOverview {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub module: TrainingModule,
    pub content_count: i64,
    pub quiz_count: i64,
    pub total_points: i64,
}

#[get("/api/admin/training")]
pub async fn training_overview(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;

    let columns = MODULE_COLUMNS
        .split(", ")
        .map(|c| format!("m.{}", c))
        .collect::<Vec<_>>()
        .join(", ");
    let mut modules = sqlx::query_as::<_, ModuleOverview>(&format!(
        r#"
        SELECT {},
               (SELECT COUNT(*) FROM training_contents c WHERE c.module_id = m.id) AS content_count,
               (SELECT COUNT(*) FROM training_quizzes q WHERE q.module_id = m.id) AS quiz_count,
               CAST(
                   COALESCE((SELECT SUM(c.points) FROM training_contents c WHERE c.module_id = m.id), 0) +
                   COALESCE((SELECT SUM(q.points) FROM training_quizzes q WHERE q.module_id = m.id), 0)
               AS SIGNED) AS total_points
        FROM training_modules m
        "#,
        columns
    ))
    .fetch_all(pool.get_ref())
    .await?;

    modules.sort_by(|a, b| {
        level_order(&a.module.level)
            .cmp(&level_order(&b.module.level))
            .then(a.module.created_at.cmp(&b.module.created_at))
    });

    Ok(HttpResponse::Ok().json(modules))
}

#[get("/api/admin/training/{id:\\d+}")]
pub async fn training_module_detail(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    let module = find_module(pool.get_ref(), *id).await?;
    let contents = module_contents(pool.get_ref(), module.id).await?;
    let quizzes = module_quizzes(pool.get_ref(), module.id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "module": module,
        "contents": contents,
        "quizzes": quizzes,
    })))
}

#[post("/api/admin/cleanup-users")]
pub async fn cleanup_users(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    let deleted = db::delete_orphaned_users(pool.get_ref()).await?;

    let message = if deleted.is_empty() {
        "No orphaned users found".to_string()
    } else {
        format!(
            "Cleaned up {} orphaned user accounts: {}",
            deleted.len(),
            deleted.join(", ")
        )
    };

    Ok(HttpResponse::Ok().json(json!({
        "message": message,
        "deleted_count": deleted.len(),
        "deleted_emails": deleted,
    })))
}

#[get("/api/admin/check-sync")]
pub async fn check_sync(pool: web::Data<MySqlPool>, req: HttpRequest) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;

    let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_staff = FALSE")
        .fetch_one(pool.get_ref())
        .await?;
    let total_drivers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM drivers")
        .fetch_one(pool.get_ref())
        .await?;
    let orphaned = db::orphaned_users(pool.get_ref()).await?;
    let without_users = db::drivers_without_users(pool.get_ref()).await?;

    Ok(HttpResponse::Ok().json(json!({
        "total_users": total_users,
        "total_drivers": total_drivers,
        "orphaned_users_count": orphaned.len(),
        "drivers_without_users_count": without_users.len(),
        "is_synchronized": orphaned.is_empty() && without_users.is_empty(),
        "orphaned_users": orphaned,
        "drivers_without_users": without_users,
    })))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(dashboard)
        .service(driver_detail)
        .service(update_driver_status)
        .service(training_overview)
        .service(training_module_detail)
        .service(cleanup_users)
        .service(check_sync);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_counts_include_empty_statuses() {
        let rows = vec![("active".to_string(), 4), ("pending".to_string(), 2)];
        let counts = counts_by_status(&rows, &["training", "pending", "active"]);
        assert_eq!(counts["training"], 0);
        assert_eq!(counts["pending"], 2);
        assert_eq!(counts["active"], 4);
        assert_eq!(counts.len(), 3);
    }
}
