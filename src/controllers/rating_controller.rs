use actix_web::{HttpRequest, HttpResponse, delete, get, post, web};
use chrono::Utc;
use serde_json::json;
use sqlx::{MySql, MySqlPool, QueryBuilder};

use crate::auth;
use crate::controllers::driver_controller::completed_status_placeholders;
use crate::db;
use crate::errors::{ApiError, ApiResult};
use crate::models::driver::COMPLETED_TRIP_STATUSES;
use crate::models::rating::{
    RatingDriver, RatingFilter, RatingListItem, RatingRequest, RatingStats, RatingWithName,
    rating_day_bounds, rating_distribution, rating_eligibility, total_pages,
};
use crate::utils;

// Submit rating untuk driver
#[post("/api/ratings")]
pub async fn submit_rating(
    pool: web::Data<MySqlPool>,
    data: web::Json<RatingRequest>,
) -> ApiResult<HttpResponse> {
    utils::validate_payload(&data.0)?;
    if data.ulasan.trim().is_empty() {
        return Err(ApiError::bad_request("Ulasan tidak boleh kosong"));
    }

    if db::find_driver_by_id(pool.get_ref(), data.id_driver).await?.is_none() {
        return Err(ApiError::not_found("Driver not found"));
    }

    let sql = format!(
        r#"
        SELECT COUNT(*) FROM delivery_orders d
        JOIN sales_orders s ON s.id_sales_order = d.id_sales_order
        WHERE d.id_driver = ? AND s.id_pelanggan = ? AND d.status IN ({})
        "#,
        completed_status_placeholders()
    );
    let mut q = sqlx::query_scalar::<_, i64>(&sql)
        .bind(data.id_driver)
        .bind(data.id_pelanggan);
    for status in COMPLETED_TRIP_STATUSES {
        q = q.bind(status);
    }
    let completed_deliveries = q.fetch_one(pool.get_ref()).await?;

    // Cegah spam: satu rating per pasangan driver/pelanggan per hari
    let (day_start, day_end) = rating_day_bounds(Utc::now().naive_utc());
    let ratings_today = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM rating_driver
        WHERE id_driver = ? AND id_pelanggan = ? AND timestamp >= ? AND timestamp < ?
        "#,
    )
    .bind(data.id_driver)
    .bind(data.id_pelanggan)
    .bind(day_start)
    .bind(day_end)
    .fetch_one(pool.get_ref())
    .await?;

    rating_eligibility(completed_deliveries, ratings_today).map_err(ApiError::bad_request)?;

    let result = sqlx::query(
        r#"
        INSERT INTO rating_driver (id_driver, id_pelanggan, rating, ulasan, timestamp)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(data.id_driver)
    .bind(data.id_pelanggan)
    .bind(data.rating)
    .bind(data.ulasan.trim())
    .bind(Utc::now().naive_utc())
    .execute(pool.get_ref())
    .await?;

    let rating = sqlx::query_as::<_, RatingDriver>(
        r#"
        SELECT id_rating, id_driver, id_pelanggan, rating, ulasan, timestamp
        FROM rating_driver WHERE id_rating = ?
        "#,
    )
    .bind(result.last_insert_id() as i64)
    .fetch_one(pool.get_ref())
    .await?;

    log::info!(
        "Rating {} bintang untuk driver {} dari pelanggan {}",
        rating.rating,
        rating.id_driver,
        rating.id_pelanggan
    );

    Ok(HttpResponse::Created().json(json!({
        "message": "Rating submitted successfully",
        "rating": rating,
    })))
}

#[get("/api/drivers/{id:\\d+}/ratings/stats")]
pub async fn get_rating_stats(
    pool: web::Data<MySqlPool>,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let id_driver = id.into_inner();
    if db::find_driver_by_id(pool.get_ref(), id_driver).await?.is_none() {
        return Err(ApiError::not_found("Driver not found"));
    }

    let (average, total): (Option<f64>, i64) = sqlx::query_as(
        r#"
        SELECT CAST(AVG(rating) AS DOUBLE), COUNT(*)
        FROM rating_driver WHERE id_driver = ?
        "#,
    )
    .bind(id_driver)
    .fetch_one(pool.get_ref())
    .await?;

    let rows: Vec<(i32, i64)> = sqlx::query_as(
        r#"
        SELECT rating, COUNT(*) FROM rating_driver
        WHERE id_driver = ?
        GROUP BY rating
        "#,
    )
    .bind(id_driver)
    .fetch_all(pool.get_ref())
    .await?;

    let recent_ratings = sqlx::query_as::<_, RatingWithName>(
        r#"
        SELECT r.id_rating, p.nama AS pelanggan, r.rating, r.ulasan, r.timestamp
        FROM rating_driver r
        JOIN pelanggan p ON p.id_pelanggan = r.id_pelanggan
        WHERE r.id_driver = ?
        ORDER BY r.timestamp DESC
        LIMIT 10
        "#,
    )
    .bind(id_driver)
    .fetch_all(pool.get_ref())
    .await?;

    let stats = RatingStats {
        id_driver,
        average_rating: (average.unwrap_or(0.0) * 10.0).round() / 10.0,
        total_ratings: total,
        rating_distribution: rating_distribution(&rows, total),
        recent_ratings,
    };

    Ok(HttpResponse::Ok().json(stats))
}

fn push_rating_filters<'a>(qb: &mut QueryBuilder<'a, MySql>, filter: &'a RatingFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(id_driver) = filter.id_driver {
        qb.push(" AND r.id_driver = ").push_bind(id_driver);
    }
    if let Some(min_rating) = filter.min_rating {
        qb.push(" AND r.rating >= ").push_bind(min_rating);
    }
}

#[get("/api/ratings")]
pub async fn get_ratings(
    pool: web::Data<MySqlPool>,
    query: web::Query<RatingFilter>,
    req: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = auth::require_admin(&req)?;
    let filter = query.into_inner();
    let (page, limit, offset) = filter.pagination();

    let mut qb: QueryBuilder<MySql> = QueryBuilder::new(
        r#"
        SELECT r.id_rating, r.id_driver, d.nama AS driver, r.id_pelanggan,
               p.nama AS pelanggan, r.rating, r.ulasan, r.timestamp
        FROM rating_driver r
        JOIN drivers d ON d.id_driver = r.id_driver
        JOIN pelanggan p ON p.id_pelanggan = r.id_pelanggan
        "#,
    );
    push_rating_filters(&mut qb, &filter);
    qb.push(" ORDER BY r.timestamp DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let ratings = qb
        .build_query_as::<RatingListItem>()
        .fetch_all(pool.get_ref())
        .await?;

    let mut count_qb: QueryBuilder<MySql> =
        QueryBuilder::new("SELECT COUNT(*) FROM rating_driver r");
    push_rating_filters(&mut count_qb, &filter);
    let total: i64 = count_qb
        .build_query_scalar()
        .fetch_one(pool.get_ref())
        .await?;

    let total_pages = total_pages(total, limit);

    Ok(HttpResponse::Ok().json(json!({
        "ratings": ratings,
        "pagination": {
            "page": page,
            "limit": limit,
            "total": total,
            "total_pages": total_pages,
            "has_next": page < total_pages,
            "has_prev": page > 1
        },
        "user_info": {
            "user_id": claims.user_id,
            "username": claims.sub,
            "role": claims.role
        }
    })))
}

#[delete("/api/ratings/{id:\\d+}")]
pub async fn delete_rating(
    pool: web::Data<MySqlPool>,
    path: web::Path<i64>,
    req: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = auth::require_admin(&req)?;
    let id = path.into_inner();

    let result = sqlx::query("DELETE FROM rating_driver WHERE id_rating = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Rating not found"));
    }

    log::info!("Rating {} dihapus oleh {}", id, claims.sub);
    Ok(HttpResponse::Ok().json(json!({ "message": "Rating deleted successfully" })))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(submit_rating)
        .service(get_rating_stats)
        .service(get_ratings)
        .service(delete_rating);
}
