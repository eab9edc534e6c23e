// src/models/rating.rs
use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct RatingDriver {
    pub id_rating: i64,
    pub id_driver: i64,
    pub id_pelanggan: i64,
    pub rating: i32,
    pub ulasan: String,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RatingRequest {
    pub id_driver: i64,
    pub id_pelanggan: i64,
    #[validate(range(min = 1, max = 5, message = "Rating harus antara 1 sampai 5"))]
    pub rating: i32,
    #[validate(length(min = 1, message = "Ulasan tidak boleh kosong"))]
    pub ulasan: String,
}

#[derive(Debug, Serialize)]
pub struct RatingStats {
    pub id_driver: i64,
    pub average_rating: f64,
    pub total_ratings: i64,
    pub rating_distribution: Vec<RatingCount>,
    pub recent_ratings: Vec<RatingWithName>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct RatingCount {
    pub stars: i32,
    pub count: i64,
    pub percentage: f64,
}

#[derive(Debug, Serialize, FromRow)]
pub struct RatingWithName {
    pub id_rating: i64,
    pub pelanggan: String,
    pub rating: i32,
    pub ulasan: String,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Serialize, FromRow)]
pub struct RatingListItem {
    pub id_rating: i64,
    pub id_driver: i64,
    pub driver: String,
    pub id_pelanggan: i64,
    pub pelanggan: String,
    pub rating: i32,
    pub ulasan: String,
    pub timestamp: NaiveDateTime,
}

pub const MAX_PAGE: i64 = 1_000_000;

/// Pelanggan boleh menilai bila punya pengiriman selesai dengan driver dan
/// belum menilai driver itu pada hari yang sama.
pub fn rating_eligibility(
    completed_deliveries: i64,
    ratings_today: i64,
) -> Result<(), &'static str> {
    if completed_deliveries <= 0 {
        return Err("Pelanggan belum memiliki pengiriman selesai dengan driver ini");
    }
    if ratings_today > 0 {
        return Err("Rating untuk driver ini sudah dikirim hari ini");
    }
    Ok(())
}

/// Rentang `[00:00 hari ini, 00:00 besok)` untuk batas satu rating per hari.
pub fn rating_day_bounds(now: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
    let start = now.date().and_time(NaiveTime::MIN);
    (start, start + Duration::days(1))
}

#[derive(Debug, Deserialize)]
pub struct RatingFilter {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub id_driver: Option<i64>,
    pub min_rating: Option<i32>,
}

impl RatingFilter {
    /// `(page, limit, offset)` dengan page 1..=MAX_PAGE dan limit 1..=100.
    pub fn pagination(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).clamp(1, MAX_PAGE);
        let limit = self.limit.unwrap_or(20).clamp(1, 100);
        (page, limit, (page - 1).saturating_mul(limit))
    }
}

/// Distribusi bintang 1..5 dari pasangan `(stars, count)` hasil GROUP BY.
pub fn rating_distribution(rows: &[(i32, i64)], total: i64) -> Vec<RatingCount> {
    (1..=5)
        .map(|stars| {
            let count = rows
                .iter()
                .find(|(s, _)| *s == stars)
                .map(|(_, c)| *c)
                .unwrap_or(0);
            let percentage = if total > 0 {
                (count as f64 / total as f64) * 100.0
            } else {
                0.0
            };
            RatingCount {
                stars,
                count,
                percentage,
            }
        })
        .collect()
}

pub fn total_pages(total: i64, limit: i64) -> i64 {
    if limit <= 0 {
        return 0;
    }
    (total + limit - 1) / limit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distribution_fills_missing_stars() {
        let dist = rating_distribution(&[(5, 3), (4, 1)], 4);
        assert_eq!(dist.len(), 5);
        assert_eq!(dist[0].count, 0);
        assert_eq!(dist[4].count, 3);
        assert_eq!(dist[4].percentage, 75.0);
        assert_eq!(dist[3].percentage, 25.0);
    }

    #[test]
    fn distribution_without_ratings_is_zero() {
        let dist = rating_distribution(&[], 0);
        assert!(dist.iter().all(|r| r.count == 0 && r.percentage == 0.0));
    }

    #[test]
    fn pagination_is_clamped() {
        let filter = RatingFilter {
            page: Some(0),
            limit: Some(500),
            id_driver: None,
            min_rating: None,
        };
        assert_eq!(filter.pagination(), (1, 100, 0));

        let filter = RatingFilter {
            page: Some(3),
            limit: None,
            id_driver: None,
            min_rating: None,
        };
        assert_eq!(filter.pagination(), (3, 20, 40));
    }

    #[test]
    fn rating_needs_completed_delivery_and_one_per_day() {
        assert!(rating_eligibility(0, 0).unwrap_err().contains("pengiriman selesai"));
        assert!(rating_eligibility(2, 1).unwrap_err().contains("hari ini"));
        assert_eq!(rating_eligibility(1, 0), Ok(()));
    }

    #[test]
    fn rating_day_covers_whole_calendar_day() {
        let day = chrono::NaiveDate::from_ymd_opt(2025, 5, 31).unwrap();
        let (start, end) = rating_day_bounds(day.and_hms_opt(23, 59, 59).unwrap());
        assert_eq!(start, day.and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(
            end,
            chrono::NaiveDate::from_ymd_opt(2025, 6, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn huge_page_number_does_not_overflow() {
        let filter = RatingFilter {
            page: Some(i64::MAX),
            limit: Some(100),
            id_driver: None,
            min_rating: None,
        };
        let (page, limit, offset) = filter.pagination();
        assert_eq!(page, MAX_PAGE);
        assert_eq!(limit, 100);
        assert_eq!(offset, (MAX_PAGE - 1) * 100);
        assert!(offset >= 0);
    }

    #[test]
    fn pages_round_up() {
        assert_eq!(total_pages(0, 20), 0);
        assert_eq!(total_pages(41, 20), 3);
        assert_eq!(total_pages(40, 20), 2);
    }

    #[test]
    fn rating_out_of_range_is_rejected() {
        let req = RatingRequest {
            id_driver: 1,
            id_pelanggan: 2,
            rating: 6,
            ulasan: "Mantap".into(),
        };
        assert!(req.validate().is_err());

        let req = RatingRequest {
            rating: 5,
            ..req
        };
        assert!(req.validate().is_ok());
    }
}
