// src/controllers/order_controller.rs
use actix_web::{HttpRequest, HttpResponse, delete, get, patch, post, put, web};
use sqlx::MySqlPool;
use sqlx::types::Json;

use crate::auth::{self, Claims};
use crate::controllers::driver_controller::current_driver;
use crate::db::PartialUpdate;
use crate::errors::{ApiError, ApiResult};
use crate::models::order::{
    ARMADA_DELIVERY_COLUMNS, ArmadaDeliveryorder, ArmadaDeliveryorderForm,
    DELIVERY_ORDER_COLUMNS, DeliveryOrder, DeliveryOrderForm, PEMBAYARAN_COLUMNS, Pelanggan,
    PelangganForm, PembayaranFee, PembayaranFeeForm, RIWAYAT_COLUMNS, RiwayatPerjalanan,
    RiwayatPerjalananForm, SALES_ORDER_COLUMNS, SalesOrder, SalesOrderForm,
};
use crate::utils;

fn missing_field(name: &str) -> ApiError {
    ApiError::bad_request(format!("Field {} harus diisi", name))
}

// ================= PELANGGAN =================

async fn find_pelanggan(pool: &MySqlPool, id: i64) -> ApiResult<Pelanggan> {
    sqlx::query_as::<_, Pelanggan>(
        "SELECT id_pelanggan, nama, no_hp, email, alamat FROM pelanggan WHERE id_pelanggan = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Pelanggan tidak ditemukan"))
}

#[get("/api/pelanggan")]
pub async fn list_pelanggan(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    let rows = sqlx::query_as::<_, Pelanggan>(
        "SELECT id_pelanggan, nama, no_hp, email, alamat FROM pelanggan ORDER BY nama",
    )
    .fetch_all(pool.get_ref())
    .await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[get("/api/pelanggan/{id:\\d+}")]
pub async fn get_pelanggan(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    Ok(HttpResponse::Ok().json(find_pelanggan(pool.get_ref(), *id).await?))
}

#[post("/api/pelanggan")]
pub async fn create_pelanggan(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    payload: web::Json<PelangganForm>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    utils::validate_payload(&payload.0)?;
    let form = payload.into_inner();

    let nama = form.nama.ok_or_else(|| missing_field("nama"))?;
    let no_hp = form.no_hp.ok_or_else(|| missing_field("no_hp"))?;
    let email = form.email.ok_or_else(|| missing_field("email"))?;

    let result = sqlx::query("INSERT INTO pelanggan (nama, no_hp, email, alamat) VALUES (?, ?, ?, ?)")
        .bind(nama)
        .bind(no_hp)
        .bind(email)
        .bind(form.alamat.unwrap_or_default())
        .execute(pool.get_ref())
        .await?;

    let pelanggan = find_pelanggan(pool.get_ref(), result.last_insert_id() as i64).await?;
    Ok(HttpResponse::Created().json(pelanggan))
}

#[put("/api/pelanggan/{id:\\d+}")]
pub async fn update_pelanggan(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
    payload: web::Json<PelangganForm>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    utils::validate_payload(&payload.0)?;
    find_pelanggan(pool.get_ref(), *id).await?;

    let form = payload.into_inner();
    let mut update = PartialUpdate::new("pelanggan");
    update
        .set_some("nama", form.nama)
        .set_some("no_hp", form.no_hp)
        .set_some("email", form.email)
        .set_some("alamat", form.alamat);

    if !update.is_empty() {
        let mut qb = update.where_id("id_pelanggan", *id);
        qb.build().execute(pool.get_ref()).await?;
    }

    Ok(HttpResponse::Ok().json(find_pelanggan(pool.get_ref(), *id).await?))
}

#[delete("/api/pelanggan/{id:\\d+}")]
pub async fn delete_pelanggan(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    delete_by_id(pool.get_ref(), "pelanggan", "id_pelanggan", *id, "Pelanggan").await
}

/// DELETE generik; nama tabel dan kolom selalu konstanta dari handler.
async fn delete_by_id(
    pool: &MySqlPool,
    table: &str,
    key_column: &str,
    id: i64,
    label: &str,
) -> ApiResult<HttpResponse> {
    let result = sqlx::query(&format!("DELETE FROM {} WHERE {} = ?", table, key_column))
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found(format!("{} tidak ditemukan", label)));
    }
    Ok(HttpResponse::NoContent().finish())
}

// ================= SALES ORDER =================

async fn find_sales_order(pool: &MySqlPool, id: i64) -> ApiResult<SalesOrder> {
    sqlx::query_as::<_, SalesOrder>(&format!(
        "SELECT {} FROM sales_orders WHERE id_sales_order = ?",
        SALES_ORDER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Sales order tidak ditemukan"))
}

#[get("/api/sales-orders")]
pub async fn list_sales_orders(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    let rows = sqlx::query_as::<_, SalesOrder>(&format!(
        "SELECT {} FROM sales_orders ORDER BY tanggal_order DESC",
        SALES_ORDER_COLUMNS
    ))
    .fetch_all(pool.get_ref())
    .await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[get("/api/sales-orders/{id:\\d+}")]
pub async fn get_sales_order(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    Ok(HttpResponse::Ok().json(find_sales_order(pool.get_ref(), *id).await?))
}

#[post("/api/sales-orders")]
pub async fn create_sales_order(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    payload: web::Json<SalesOrderForm>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    utils::validate_payload(&payload.0)?;
    let form = payload.into_inner();

    let id_pelanggan = form.id_pelanggan.ok_or_else(|| missing_field("id_pelanggan"))?;
    find_pelanggan(pool.get_ref(), id_pelanggan)
        .await
        .map_err(|_| ApiError::bad_request("Pelanggan tidak ditemukan"))?;

    let result = sqlx::query(
        r#"
        INSERT INTO sales_orders
        (id_pelanggan, tanggal_order, total_harga_order, alamat_pengiriman, status)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(id_pelanggan)
    .bind(form.tanggal_order.ok_or_else(|| missing_field("tanggal_order"))?)
    .bind(form.total_harga_order.ok_or_else(|| missing_field("total_harga_order"))?)
    .bind(form.alamat_pengiriman.ok_or_else(|| missing_field("alamat_pengiriman"))?)
    .bind(form.status.ok_or_else(|| missing_field("status"))?)
    .execute(pool.get_ref())
    .await?;

    let order = find_sales_order(pool.get_ref(), result.last_insert_id() as i64).await?;
    Ok(HttpResponse::Created().json(order))
}

async fn apply_sales_order_update(
    pool: &MySqlPool,
    id: i64,
    form: SalesOrderForm,
) -> ApiResult<SalesOrder> {
    utils::validate_payload(&form)?;
    find_sales_order(pool, id).await?;

    let mut update = PartialUpdate::new("sales_orders");
    update
        .set_some("id_pelanggan", form.id_pelanggan)
        .set_some("tanggal_order", form.tanggal_order)
        .set_some("total_harga_order", form.total_harga_order)
        .set_some("alamat_pengiriman", form.alamat_pengiriman)
        .set_some("status", form.status);

    if !update.is_empty() {
        let mut qb = update.where_id("id_sales_order", id);
        qb.build().execute(pool).await?;
    }
    find_sales_order(pool, id).await
}

#[put("/api/sales-orders/{id:\\d+}")]
pub async fn update_sales_order(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
    payload: web::Json<SalesOrderForm>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    let order = apply_sales_order_update(pool.get_ref(), *id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(order))
}

#[patch("/api/sales-orders/{id:\\d+}")]
pub async fn patch_sales_order(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
    payload: web::Json<SalesOrderForm>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    let order = apply_sales_order_update(pool.get_ref(), *id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(order))
}

#[delete("/api/sales-orders/{id:\\d+}")]
pub async fn delete_sales_order(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    delete_by_id(pool.get_ref(), "sales_orders", "id_sales_order", *id, "Sales order").await
}

// ================= DELIVERY ORDER =================

fn delivery_not_found() -> ApiError {
    ApiError::not_found("Delivery order tidak ditemukan")
}

async fn find_delivery_order(pool: &MySqlPool, id: i64) -> ApiResult<DeliveryOrder> {
    sqlx::query_as::<_, DeliveryOrder>(&format!(
        "SELECT {} FROM delivery_orders WHERE id_delivery_order = ?",
        DELIVERY_ORDER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(delivery_not_found)
}

/// Delivery order yang boleh dilihat pemanggil: admin semua, driver hanya miliknya.
async fn visible_delivery_order(
    pool: &MySqlPool,
    claims: &Claims,
    id: i64,
) -> ApiResult<DeliveryOrder> {
    let order = find_delivery_order(pool, id).await?;
    if !claims.is_admin() {
        let driver = current_driver(pool, claims).await?;
        if order.id_driver != driver.id_driver {
            return Err(delivery_not_found());
        }
    }
    Ok(order)
}

#[get("/api/delivery-orders")]
pub async fn list_delivery_orders(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = auth::verify_jwt(&req)?;

    let rows = if claims.is_admin() {
        sqlx::query_as::<_, DeliveryOrder>(&format!(
            "SELECT {} FROM delivery_orders ORDER BY tanggal_kirim DESC",
            DELIVERY_ORDER_COLUMNS
        ))
        .fetch_all(pool.get_ref())
        .await?
    } else {
        sqlx::query_as::<_, DeliveryOrder>(&format!(
            r#"
            SELECT {} FROM delivery_orders
            WHERE id_driver IN (SELECT id_driver FROM drivers WHERE email = ?)
            ORDER BY tanggal_kirim DESC
            "#,
            DELIVERY_ORDER_COLUMNS
        ))
        .bind(&claims.email)
        .fetch_all(pool.get_ref())
        .await?
    };

    Ok(HttpResponse::Ok().json(rows))
}

#[get("/api/delivery-orders/{id:\\d+}")]
pub async fn get_delivery_order(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let claims = auth::verify_jwt(&req)?;
    let order = visible_delivery_order(pool.get_ref(), &claims, *id).await?;
    Ok(HttpResponse::Ok().json(order))
}

#[post("/api/delivery-orders")]
pub async fn create_delivery_order(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    payload: web::Json<DeliveryOrderForm>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    utils::validate_payload(&payload.0)?;
    let form = payload.into_inner();

    let result = sqlx::query(
        r#"
        INSERT INTO delivery_orders
        (id_sales_order, id_armada, id_driver, tanggal_kirim, gps_log, status)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(form.id_sales_order.ok_or_else(|| missing_field("id_sales_order"))?)
    .bind(form.id_armada.ok_or_else(|| missing_field("id_armada"))?)
    .bind(form.id_driver.ok_or_else(|| missing_field("id_driver"))?)
    .bind(form.tanggal_kirim.ok_or_else(|| missing_field("tanggal_kirim"))?)
    .bind(Json(form.gps_log.unwrap_or_else(|| serde_json::json!([]))))
    .bind(form.status.ok_or_else(|| missing_field("status"))?)
    .execute(pool.get_ref())
    .await?;

    let order = find_delivery_order(pool.get_ref(), result.last_insert_id() as i64).await?;
    log::info!(
        "Delivery order {} dibuat untuk driver {}",
        order.id_delivery_order,
        order.id_driver
    );
    Ok(HttpResponse::Created().json(order))
}

async fn apply_delivery_update(
    pool: &MySqlPool,
    id: i64,
    form: DeliveryOrderForm,
) -> ApiResult<DeliveryOrder> {
    let mut update = PartialUpdate::new("delivery_orders");
    update
        .set_some("id_sales_order", form.id_sales_order)
        .set_some("id_armada", form.id_armada)
        .set_some("id_driver", form.id_driver)
        .set_some("tanggal_kirim", form.tanggal_kirim)
        .set_some("gps_log", form.gps_log.map(Json))
        .set_some("status", form.status);

    if !update.is_empty() {
        let mut qb = update.where_id("id_delivery_order", id);
        qb.build().execute(pool).await?;
    }
    find_delivery_order(pool, id).await
}

#[put("/api/delivery-orders/{id:\\d+}")]
pub async fn update_delivery_order(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
    payload: web::Json<DeliveryOrderForm>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    utils::validate_payload(&payload.0)?;
    find_delivery_order(pool.get_ref(), *id).await?;
    let order = apply_delivery_update(pool.get_ref(), *id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(order))
}

/// Admin boleh mengubah field apa pun; driver pemilik hanya `status`.
#[patch("/api/delivery-orders/{id:\\d+}")]
pub async fn patch_delivery_order(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
    payload: web::Json<DeliveryOrderForm>,
) -> ApiResult<HttpResponse> {
    let claims = auth::verify_jwt(&req)?;
    utils::validate_payload(&payload.0)?;
    let order = visible_delivery_order(pool.get_ref(), &claims, *id).await?;

    if !claims.is_admin() && !payload.only_status() {
        return Err(ApiError::forbidden(
            "Driver hanya dapat mengubah status delivery order",
        ));
    }

    let updated =
        apply_delivery_update(pool.get_ref(), order.id_delivery_order, payload.into_inner())
            .await?;
    if updated.status != order.status {
        log::info!(
            "Delivery order {}: {} -> {} oleh {}",
            updated.id_delivery_order,
            order.status,
            updated.status,
            claims.sub
        );
    }
    Ok(HttpResponse::Ok().json(updated))
}

#[delete("/api/delivery-orders/{id:\\d+}")]
pub async fn delete_delivery_order(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    delete_by_id(
        pool.get_ref(),
        "delivery_orders",
        "id_delivery_order",
        *id,
        "Delivery order",
    )
    .await
}

// ================= RIWAYAT PERJALANAN =================

#[get("/api/riwayat-perjalanan")]
pub async fn list_riwayat(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = auth::verify_jwt(&req)?;

    let rows = if claims.is_admin() {
        sqlx::query_as::<_, RiwayatPerjalanan>(&format!(
            "SELECT {} FROM riwayat_perjalanan ORDER BY tanggal DESC",
            RIWAYAT_COLUMNS
        ))
        .fetch_all(pool.get_ref())
        .await?
    } else {
        sqlx::query_as::<_, RiwayatPerjalanan>(&format!(
            r#"
            SELECT {} FROM riwayat_perjalanan
            WHERE id_delivery_order IN (
                SELECT d.id_delivery_order FROM delivery_orders d
                JOIN drivers dr ON dr.id_driver = d.id_driver
                WHERE dr.email = ?
            )
            ORDER BY tanggal DESC
            "#,
            RIWAYAT_COLUMNS
        ))
        .bind(&claims.email)
        .fetch_all(pool.get_ref())
        .await?
    };

    Ok(HttpResponse::Ok().json(rows))
}

#[get("/api/riwayat-perjalanan/{id:\\d+}")]
pub async fn get_riwayat(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let claims = auth::verify_jwt(&req)?;
    let riwayat = sqlx::query_as::<_, RiwayatPerjalanan>(&format!(
        "SELECT {} FROM riwayat_perjalanan WHERE id_perjalanan = ?",
        RIWAYAT_COLUMNS
    ))
    .bind(*id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| ApiError::not_found("Riwayat perjalanan tidak ditemukan"))?;

    visible_delivery_order(pool.get_ref(), &claims, riwayat.id_delivery_order)
        .await
        .map_err(|_| ApiError::not_found("Riwayat perjalanan tidak ditemukan"))?;

    Ok(HttpResponse::Ok().json(riwayat))
}

#[post("/api/riwayat-perjalanan")]
pub async fn create_riwayat(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    payload: web::Json<RiwayatPerjalananForm>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    utils::validate_payload(&payload.0)?;
    find_delivery_order(pool.get_ref(), payload.id_delivery_order).await?;

    let form = payload.into_inner();
    let result = sqlx::query(
        r#"
        INSERT INTO riwayat_perjalanan
        (id_delivery_order, rute, tanggal, jarak_tempuh_km, durasi_perjalanan)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(form.id_delivery_order)
    .bind(form.rute)
    .bind(form.tanggal)
    .bind(form.jarak_tempuh_km)
    .bind(form.durasi_perjalanan)
    .execute(pool.get_ref())
    .await?;

    let riwayat = sqlx::query_as::<_, RiwayatPerjalanan>(&format!(
        "SELECT {} FROM riwayat_perjalanan WHERE id_perjalanan = ?",
        RIWAYAT_COLUMNS
    ))
    .bind(result.last_insert_id() as i64)
    .fetch_one(pool.get_ref())
    .await?;
    Ok(HttpResponse::Created().json(riwayat))
}

#[delete("/api/riwayat-perjalanan/{id:\\d+}")]
pub async fn delete_riwayat(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    delete_by_id(
        pool.get_ref(),
        "riwayat_perjalanan",
        "id_perjalanan",
        *id,
        "Riwayat perjalanan",
    )
    .await
}

// ================= PEMBAYARAN FEE =================

#[get("/api/pembayaran-fee")]
pub async fn list_pembayaran(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    let rows = sqlx::query_as::<_, PembayaranFee>(&format!(
        "SELECT {} FROM pembayaran_fee ORDER BY tanggal DESC",
        PEMBAYARAN_COLUMNS
    ))
    .fetch_all(pool.get_ref())
    .await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[get("/api/pembayaran-fee/{id:\\d+}")]
pub async fn get_pembayaran(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    let row = sqlx::query_as::<_, PembayaranFee>(&format!(
        "SELECT {} FROM pembayaran_fee WHERE id_pembayaran = ?",
        PEMBAYARAN_COLUMNS
    ))
    .bind(*id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| ApiError::not_found("Pembayaran tidak ditemukan"))?;
    Ok(HttpResponse::Ok().json(row))
}

#[post("/api/pembayaran-fee")]
pub async fn create_pembayaran(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    payload: web::Json<PembayaranFeeForm>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    let form = payload.into_inner();
    if form.jumlah.is_sign_negative() {
        return Err(ApiError::bad_request("Jumlah pembayaran tidak boleh negatif"));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO pembayaran_fee
        (id_delivery_order, id_rekening, metode_pembayaran, jumlah, tanggal)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(form.id_delivery_order)
    .bind(form.id_rekening)
    .bind(form.metode_pembayaran.as_str())
    .bind(form.jumlah)
    .bind(form.tanggal)
    .execute(pool.get_ref())
    .await?;

    let row = sqlx::query_as::<_, PembayaranFee>(&format!(
        "SELECT {} FROM pembayaran_fee WHERE id_pembayaran = ?",
        PEMBAYARAN_COLUMNS
    ))
    .bind(result.last_insert_id() as i64)
    .fetch_one(pool.get_ref())
    .await?;
    Ok(HttpResponse::Created().json(row))
}

#[delete("/api/pembayaran-fee/{id:\\d+}")]
pub async fn delete_pembayaran(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    delete_by_id(pool.get_ref(), "pembayaran_fee", "id_pembayaran", *id, "Pembayaran").await
}

// ================= ARMADA DELIVERY ORDER =================

#[get("/api/armada-delivery-orders")]
pub async fn list_armada_delivery(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    let rows = sqlx::query_as::<_, ArmadaDeliveryorder>(&format!(
        "SELECT {} FROM armada_delivery_orders ORDER BY tanggal_pakai DESC",
        ARMADA_DELIVERY_COLUMNS
    ))
    .fetch_all(pool.get_ref())
    .await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[get("/api/armada-delivery-orders/{id:\\d+}")]
pub async fn get_armada_delivery(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    let row = sqlx::query_as::<_, ArmadaDeliveryorder>(&format!(
        "SELECT {} FROM armada_delivery_orders WHERE id = ?",
        ARMADA_DELIVERY_COLUMNS
    ))
    .bind(*id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| ApiError::not_found("Pemakaian armada tidak ditemukan"))?;
    Ok(HttpResponse::Ok().json(row))
}

#[post("/api/armada-delivery-orders")]
pub async fn create_armada_delivery(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    payload: web::Json<ArmadaDeliveryorderForm>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    let form = payload.into_inner();

    let result = sqlx::query(
        r#"
        INSERT INTO armada_delivery_orders
        (id_delivery_order, id_armada, tanggal_pakai, kapasitas_digunakan)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(form.id_delivery_order)
    .bind(form.id_armada)
    .bind(form.tanggal_pakai)
    .bind(form.kapasitas_digunakan)
    .execute(pool.get_ref())
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => ApiError::bad_request(
            "Armada sudah tercatat untuk delivery order ini",
        ),
        _ => ApiError::Database(e),
    })?;

    let row = sqlx::query_as::<_, ArmadaDeliveryorder>(&format!(
        "SELECT {} FROM armada_delivery_orders WHERE id = ?",
        ARMADA_DELIVERY_COLUMNS
    ))
    .bind(result.last_insert_id() as i64)
    .fetch_one(pool.get_ref())
    .await?;
    Ok(HttpResponse::Created().json(row))
}

#[delete("/api/armada-delivery-orders/{id:\\d+}")]
pub async fn delete_armada_delivery(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    delete_by_id(
        pool.get_ref(),
        "armada_delivery_orders",
        "id",
        *id,
        "Pemakaian armada",
    )
    .await
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_pelanggan)
        .service(get_pelanggan)
        .service(create_pelanggan)
        .service(update_pelanggan)
        .service(delete_pelanggan)
        .service(list_sales_orders)
        .service(get_sales_order)
        .service(create_sales_order)
        .service(update_sales_order)
        .service(patch_sales_order)
        .service(delete_sales_order)
        .service(list_delivery_orders)
        .service(get_delivery_order)
        .service(create_delivery_order)
        .service(update_delivery_order)
        .service(patch_delivery_order)
        .service(delete_delivery_order)
        .service(list_riwayat)
        .service(get_riwayat)
        .service(create_riwayat)
        .service(delete_riwayat)
        .service(list_pembayaran)
        .service(get_pembayaran)
        .service(create_pembayaran)
        .service(delete_pembayaran)
        .service(list_armada_delivery)
        .service(get_armada_delivery)
        .service(create_armada_delivery)
        .service(delete_armada_delivery);
}
