// src/controllers/dispatch_controller.rs
//! Alur dispatch order: aplikasi driver <-> backend <-> driver-service.
use actix_web::{HttpResponse, get, post, web};
use chrono::Utc;
use serde_json::json;
use sqlx::MySqlPool;

use crate::db;
use crate::errors::{ApiError, ApiResult};
use crate::models::dispatch::{
    CancelOrderRequest, CreateOrderRequest, DEFAULT_PICKUP, DriverOfflineRequest,
    DriverOnlineRequest, DriverStatusMessage, FinishOrderRequest, ORDER_COLUMNS, Order,
    OrderAction, OrderConfirmedRequest, OrderListQuery, OrderRequestMessage,
    OrderResponseMessage, OrderResponseRequest, OrderStatus, OrderWithDriver,
    order_destination, order_id_candidate,
};
use crate::services::driver_service::{DriverServiceClient, ForwardOutcome};

const MAX_ID_ATTEMPTS: u32 = 10;

async fn find_order(pool: &MySqlPool, order_id: &str) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>(&format!(
        "SELECT {} FROM orders WHERE order_id = ?",
        ORDER_COLUMNS
    ))
    .bind(order_id)
    .fetch_optional(pool)
    .await
}

fn transition_error(order: &Order, next: OrderStatus) -> ApiError {
    ApiError::bad_request(format!(
        "Order {} berstatus {} dan tidak dapat diubah ke {}",
        order.order_id, order.status, next
    ))
}

fn ensure_transition(order: &Order, next: OrderStatus) -> ApiResult<()> {
    let allowed = order
        .status()
        .map(|current| current.can_transition_to(next))
        .unwrap_or(false);
    if !allowed {
        return Err(transition_error(order, next));
    }
    Ok(())
}

/// UPDATE dijaga `AND status = <status saat dibaca>`; 0 baris berarti order
/// sudah diubah permintaan lain di antara SELECT dan UPDATE.
fn ensure_applied(rows_affected: u64, order: &Order, next: OrderStatus) -> ApiResult<()> {
    if rows_affected == 0 {
        log::warn!(
            "Order {} berubah dari {} sebelum diubah ke {}",
            order.order_id,
            order.status,
            next
        );
        return Err(ApiError::bad_request(format!(
            "Order {} sudah diubah oleh permintaan lain dan tidak dapat diubah ke {}",
            order.order_id, next
        )));
    }
    Ok(())
}

async fn set_order_status(pool: &MySqlPool, order: &Order, next: OrderStatus) -> ApiResult<()> {
    ensure_transition(order, next)?;
    let result = sqlx::query("UPDATE orders SET status = ? WHERE order_id = ? AND status = ?")
        .bind(next.as_str())
        .bind(&order.order_id)
        .bind(&order.status)
        .execute(pool)
        .await?;
    ensure_applied(result.rows_affected(), order, next)
}

#[post("/api/driver/online")]
pub async fn driver_online(
    client: web::Data<DriverServiceClient>,
    payload: web::Json<DriverOnlineRequest>,
) -> ApiResult<HttpResponse> {
    let (driver_id, kota) = match (payload.driver_id, payload.kota()) {
        (Some(id), Some(kota)) => (id, kota),
        _ => return Err(ApiError::bad_request("driver_id and kota required")),
    };

    let message = DriverStatusMessage {
        driver_id,
        kota: Some(kota),
        status: "online",
    };
    if !client.publish_driver_status(&message).await {
        return Err(ApiError::internal("Failed to update status"));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Driver is now online" })))
}

#[post("/api/driver/offline")]
pub async fn driver_offline(
    client: web::Data<DriverServiceClient>,
    payload: web::Json<DriverOfflineRequest>,
) -> ApiResult<HttpResponse> {
    let driver_id = payload
        .driver_id
        .ok_or_else(|| ApiError::bad_request("driver_id required"))?;

    let message = DriverStatusMessage {
        driver_id,
        kota: None,
        status: "offline",
    };
    if !client.publish_driver_status(&message).await {
        return Err(ApiError::internal("Failed to update status"));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Driver is now offline" })))
}

#[post("/api/order/create")]
pub async fn create_order(
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateOrderRequest>,
) -> ApiResult<HttpResponse> {
    let (barang, kota) = payload
        .fields()
        .ok_or_else(|| ApiError::bad_request("barang and kota required"))?;

    let now = Utc::now().timestamp();
    let tujuan = order_destination(barang, kota);

    for attempt in 0..MAX_ID_ATTEMPTS {
        let order_id = order_id_candidate(now, attempt);
        let inserted = sqlx::query(
            r#"
            INSERT INTO orders (order_id, barang, pickup, tujuan, kota, status)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&order_id)
        .bind(barang)
        .bind(DEFAULT_PICKUP)
        .bind(&tujuan)
        .bind(kota)
        .bind(OrderStatus::MenungguKonfirmasi.as_str())
        .execute(pool.get_ref())
        .await;

        match inserted {
            Ok(_) => {
                log::info!("Order {} dibuat ({})", order_id, tujuan);
                return Ok(HttpResponse::Ok().json(json!({
                    "order_id": order_id,
                    "message": "Order created successfully",
                    "status": OrderStatus::MenungguKonfirmasi,
                })));
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                log::debug!("order_id {} sudah dipakai, mencoba sufiks berikutnya", order_id);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(ApiError::internal("Gagal membuat order_id unik"))
}

/// Penjual mengonfirmasi order; order dibuat bila belum ada lalu dikirim ke driver.
#[post("/api/order/confirmed")]
pub async fn order_confirmed(
    pool: web::Data<MySqlPool>,
    client: web::Data<DriverServiceClient>,
    payload: web::Json<OrderConfirmedRequest>,
) -> ApiResult<HttpResponse> {
    let (order_id, pickup, tujuan, kota) = payload
        .fields()
        .ok_or_else(|| ApiError::bad_request("order_id, tujuan, and kota required"))?;

    match find_order(pool.get_ref(), order_id).await? {
        Some(order) => {
            ensure_transition(&order, OrderStatus::MenungguDriver)?;
            let result = sqlx::query(
                r#"
                UPDATE orders SET status = ?, pickup = ?, tujuan = ?
                WHERE order_id = ? AND status = ?
                "#,
            )
            .bind(OrderStatus::MenungguDriver.as_str())
            .bind(pickup)
            .bind(tujuan)
            .bind(order_id)
            .bind(&order.status)
            .execute(pool.get_ref())
            .await?;
            ensure_applied(result.rows_affected(), &order, OrderStatus::MenungguDriver)?;
        }
        None => {
            sqlx::query(
                r#"
                INSERT INTO orders (order_id, barang, pickup, tujuan, kota, status)
                VALUES (?, 'Barang', ?, ?, ?, ?)
                "#,
            )
            .bind(order_id)
            .bind(pickup)
            .bind(tujuan)
            .bind(kota)
            .bind(OrderStatus::MenungguDriver.as_str())
            .execute(pool.get_ref())
            .await?;
        }
    }

    let order = find_order(pool.get_ref(), order_id)
        .await?
        .ok_or_else(|| ApiError::internal("Order hilang setelah disimpan"))?;

    let message = OrderRequestMessage {
        order_id,
        pickup,
        tujuan,
        ongkos: order.ongkos,
        kota,
    };
    if !client.publish_order_request(&message).await {
        return Err(ApiError::internal("Failed to send order"));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Order sent to drivers" })))
}

#[post("/api/order/response")]
pub async fn order_response(
    pool: web::Data<MySqlPool>,
    client: web::Data<DriverServiceClient>,
    payload: web::Json<OrderResponseRequest>,
) -> ApiResult<HttpResponse> {
    let (driver_id, order_id, action) = payload
        .fields()
        .ok_or_else(|| ApiError::bad_request("driver_id, order_id, and action required"))?;

    if OrderAction::parse(action) == Some(OrderAction::Terima) {
        let order = find_order(pool.get_ref(), order_id).await?;
        let driver = db::find_driver_by_id(pool.get_ref(), driver_id).await?;
        match (order, driver) {
            (Some(order), Some(driver)) => {
                ensure_transition(&order, OrderStatus::SedangDikirim)?;
                let result = sqlx::query(
                    r#"
                    UPDATE orders SET driver_id = ?, status = ?
                    WHERE order_id = ? AND status = ?
                    "#,
                )
                .bind(driver.id_driver)
                .bind(OrderStatus::SedangDikirim.as_str())
                .bind(order_id)
                .bind(&order.status)
                .execute(pool.get_ref())
                .await?;
                ensure_applied(result.rows_affected(), &order, OrderStatus::SedangDikirim)?;
                log::info!("Order {} diambil driver {}", order_id, driver.nama);
            }
            (order, driver) => log::warn!(
                "Order {} (ada: {}) atau driver {} (ada: {}) tidak ditemukan",
                order_id,
                order.is_some(),
                driver_id,
                driver.is_some()
            ),
        }
    }

    let message = OrderResponseMessage {
        driver_id,
        order_id,
        action,
    };
    match client.forward_order_response(&message).await {
        ForwardOutcome::Delivered => Ok(HttpResponse::Ok()
            .json(json!({ "message": format!("Order {} successfully", action) }))),
        ForwardOutcome::Rejected(_) => Err(ApiError::internal("Failed to process response")),
        ForwardOutcome::Unreachable(e) => Err(ApiError::ServiceUnavailable(format!(
            "Service unavailable: {}",
            e
        ))),
    }
}

#[post("/api/order/finish")]
pub async fn finish_order(
    pool: web::Data<MySqlPool>,
    payload: web::Json<FinishOrderRequest>,
) -> ApiResult<HttpResponse> {
    let (order_id, driver_id) = match (payload.order_id.as_deref(), payload.driver_id) {
        (Some(order_id), Some(driver_id)) if !order_id.trim().is_empty() => {
            (order_id.trim(), driver_id)
        }
        _ => return Err(ApiError::bad_request("order_id and driver_id required")),
    };

    let order = find_order(pool.get_ref(), order_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found"))?;

    if order.driver_id != Some(driver_id) {
        return Err(ApiError::forbidden("Order tidak ditugaskan ke driver ini"));
    }
    set_order_status(pool.get_ref(), &order, OrderStatus::Selesai).await?;
    log::info!("Order {} selesai oleh driver {}", order_id, driver_id);

    Ok(HttpResponse::Ok().json(json!({
        "order_id": order_id,
        "status": OrderStatus::Selesai,
        "message": "Order completed",
    })))
}

#[post("/api/order/cancel")]
pub async fn cancel_order(
    pool: web::Data<MySqlPool>,
    payload: web::Json<CancelOrderRequest>,
) -> ApiResult<HttpResponse> {
    let order_id = payload
        .order_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("order_id required"))?;

    let order = find_order(pool.get_ref(), order_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found"))?;
    set_order_status(pool.get_ref(), &order, OrderStatus::Dibatalkan).await?;
    log::info!("Order {} dibatalkan dari status {}", order_id, order.status);

    Ok(HttpResponse::Ok().json(json!({
        "order_id": order_id,
        "status": OrderStatus::Dibatalkan,
        "message": "Order cancelled",
    })))
}

#[get("/api/orders")]
pub async fn list_orders(
    pool: web::Data<MySqlPool>,
    query: web::Query<OrderListQuery>,
) -> ApiResult<HttpResponse> {
    let status = match query.status.as_deref() {
        None => OrderStatus::MenungguKonfirmasi,
        Some(s) => match s.parse::<OrderStatus>() {
            Ok(status) => status,
            // status tak dikenal tidak cocok dengan order mana pun
            Err(_) => return Ok(HttpResponse::Ok().json(json!({ "orders": [] }))),
        },
    };

    let orders = sqlx::query_as::<_, OrderWithDriver>(
        r#"
        SELECT o.order_id, o.barang, o.pickup, o.tujuan, o.kota, o.ongkos, o.status,
               d.nama AS driver_name, o.created_at, o.updated_at
        FROM orders o
        LEFT JOIN drivers d ON d.id_driver = o.driver_id
        WHERE o.status = ?
        ORDER BY o.created_at DESC
        "#,
    )
    .bind(status.as_str())
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(json!({ "orders": orders })))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(driver_online)
        .service(driver_offline)
        .service(create_order)
        .service(order_confirmed)
        .service(order_response)
        .service(finish_order)
        .service(cancel_order)
        .service(list_orders);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn order(status: OrderStatus) -> Order {
        let at = NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        Order {
            order_id: "order_1740816000".into(),
            barang: "Semen".into(),
            pickup: DEFAULT_PICKUP.into(),
            tujuan: "Semen ke Bandung".into(),
            kota: "Bandung".into(),
            ongkos: 20000,
            status: status.as_str().into(),
            driver_id: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn illegal_transition_is_bad_request() {
        let err = ensure_transition(&order(OrderStatus::Selesai), OrderStatus::Dibatalkan)
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert!(
            ensure_transition(&order(OrderStatus::MenungguDriver), OrderStatus::SedangDikirim)
                .is_ok()
        );
    }

    #[test]
    fn update_that_lost_the_race_is_rejected() {
        let waiting = order(OrderStatus::MenungguDriver);

        let err = ensure_applied(0, &waiting, OrderStatus::SedangDikirim).unwrap_err();
        match err {
            ApiError::BadRequest(msg) => {
                assert!(msg.contains("order_1740816000"));
                assert!(msg.contains("sedang_dikirim"));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        assert!(ensure_applied(1, &waiting, OrderStatus::SedangDikirim).is_ok());
    }
}
