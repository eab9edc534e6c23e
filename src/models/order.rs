// src/models/order.rs
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use validator::Validate;

// ================= PELANGGAN =================
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Pelanggan {
    pub id_pelanggan: i64,
    pub nama: String,
    pub no_hp: String,
    pub email: String,
    pub alamat: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PelangganForm {
    #[validate(length(min = 1, max = 100, message = "Nama pelanggan harus diisi"))]
    pub nama: Option<String>,
    #[validate(length(min = 1, max = 15, message = "Nomor HP tidak valid"))]
    pub no_hp: Option<String>,
    #[validate(email(message = "Email tidak valid"))]
    pub email: Option<String>,
    #[validate(length(max = 255))]
    pub alamat: Option<String>,
}

// ================= SALES ORDER =================
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct SalesOrder {
    pub id_sales_order: i64,
    pub id_pelanggan: i64,
    pub tanggal_order: NaiveDateTime,
    pub total_harga_order: Decimal,
    pub alamat_pengiriman: String,
    pub status: String,
}

pub const SALES_ORDER_COLUMNS: &str =
    "id_sales_order, id_pelanggan, tanggal_order, total_harga_order, alamat_pengiriman, status";

#[derive(Debug, Deserialize, Validate)]
pub struct SalesOrderForm {
    pub id_pelanggan: Option<i64>,
    pub tanggal_order: Option<NaiveDateTime>,
    pub total_harga_order: Option<Decimal>,
    pub alamat_pengiriman: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub status: Option<String>,
}

// ================= DELIVERY ORDER =================
#[derive(Debug, Serialize, FromRow)]
pub struct DeliveryOrder {
    pub id_delivery_order: i64,
    pub id_sales_order: i64,
    pub id_armada: i64,
    pub id_driver: i64,
    pub tanggal_kirim: NaiveDateTime,
    pub gps_log: Json<serde_json::Value>,
    pub status: String,
}

pub const DELIVERY_ORDER_COLUMNS: &str =
    "id_delivery_order, id_sales_order, id_armada, id_driver, tanggal_kirim, gps_log, status";

#[derive(Debug, Deserialize, Validate)]
pub struct DeliveryOrderForm {
    pub id_sales_order: Option<i64>,
    pub id_armada: Option<i64>,
    pub id_driver: Option<i64>,
    pub tanggal_kirim: Option<NaiveDateTime>,
    pub gps_log: Option<serde_json::Value>,
    #[validate(length(min = 1, max = 20))]
    pub status: Option<String>,
}

impl DeliveryOrderForm {
    /// Driver pemilik order hanya boleh mengirim `status`.
    pub fn only_status(&self) -> bool {
        self.id_sales_order.is_none()
            && self.id_armada.is_none()
            && self.id_driver.is_none()
            && self.tanggal_kirim.is_none()
            && self.gps_log.is_none()
    }
}

// ================= RIWAYAT PERJALANAN =================
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct RiwayatPerjalanan {
    pub id_perjalanan: i64,
    pub id_delivery_order: i64,
    pub rute: String,
    pub tanggal: NaiveDateTime,
    pub jarak_tempuh_km: Decimal,
    pub durasi_perjalanan: i32,
}

pub const RIWAYAT_COLUMNS: &str =
    "id_perjalanan, id_delivery_order, rute, tanggal, jarak_tempuh_km, durasi_perjalanan";

#[derive(Debug, Deserialize, Validate)]
pub struct RiwayatPerjalananForm {
    pub id_delivery_order: i64,
    #[validate(length(min = 1, message = "Rute harus diisi"))]
    pub rute: String,
    pub tanggal: NaiveDateTime,
    pub jarak_tempuh_km: Decimal,
    #[validate(range(min = 0, message = "Durasi tidak boleh negatif"))]
    pub durasi_perjalanan: i32,
}

// ================= PEMBAYARAN FEE =================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetodePembayaran {
    Cash,
    Transfer,
    Ewallet,
}

impl MetodePembayaran {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetodePembayaran::Cash => "cash",
            MetodePembayaran::Transfer => "transfer",
            MetodePembayaran::Ewallet => "ewallet",
        }
    }
}

impl fmt::Display for MetodePembayaran {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetodePembayaran {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "cash" => Ok(MetodePembayaran::Cash),
            "transfer" => Ok(MetodePembayaran::Transfer),
            "ewallet" => Ok(MetodePembayaran::Ewallet),
            other => Err(format!("Metode pembayaran tidak dikenal: {}", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct PembayaranFee {
    pub id_pembayaran: i64,
    pub id_delivery_order: i64,
    pub id_rekening: i64,
    pub metode_pembayaran: String,
    pub jumlah: Decimal,
    pub tanggal: NaiveDateTime,
}

pub const PEMBAYARAN_COLUMNS: &str =
    "id_pembayaran, id_delivery_order, id_rekening, metode_pembayaran, jumlah, tanggal";

#[derive(Debug, Deserialize)]
pub struct PembayaranFeeForm {
    pub id_delivery_order: i64,
    pub id_rekening: i64,
    pub metode_pembayaran: MetodePembayaran,
    pub jumlah: Decimal,
    pub tanggal: NaiveDateTime,
}

// ================= ARMADA DELIVERY ORDER =================
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct ArmadaDeliveryorder {
    pub id: i64,
    pub id_delivery_order: i64,
    pub id_armada: i64,
    pub tanggal_pakai: NaiveDateTime,
    pub kapasitas_digunakan: Decimal,
}

pub const ARMADA_DELIVERY_COLUMNS: &str =
    "id, id_delivery_order, id_armada, tanggal_pakai, kapasitas_digunakan";

#[derive(Debug, Deserialize)]
pub struct ArmadaDeliveryorderForm {
    pub id_delivery_order: i64,
    pub id_armada: i64,
    pub tanggal_pakai: NaiveDateTime,
    pub kapasitas_digunakan: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_method_accepts_known_values() {
        assert_eq!("ewallet".parse::<MetodePembayaran>(), Ok(MetodePembayaran::Ewallet));
        assert!("kredit".parse::<MetodePembayaran>().is_err());

        let form: Result<PembayaranFeeForm, _> = serde_json::from_value(serde_json::json!({
            "id_delivery_order": 1,
            "id_rekening": 1,
            "metode_pembayaran": "bitcoin",
            "jumlah": "15000.00",
            "tanggal": "2025-01-01T10:00:00"
        }));
        assert!(form.is_err());
    }

    #[test]
    fn driver_patch_is_status_only() {
        let form: DeliveryOrderForm =
            serde_json::from_value(serde_json::json!({ "status": "delivered" })).unwrap();
        assert!(form.only_status());

        let form: DeliveryOrderForm = serde_json::from_value(serde_json::json!({
            "status": "delivered",
            "id_driver": 9
        }))
        .unwrap();
        assert!(!form.only_status());
    }

    #[test]
    fn customer_email_is_validated() {
        let form: PelangganForm = serde_json::from_value(serde_json::json!({
            "nama": "Toko Maju",
            "no_hp": "08123",
            "email": "bukan-email",
            "alamat": "Jl. Sudirman"
        }))
        .unwrap();
        assert!(form.validate().is_err());
    }
}
