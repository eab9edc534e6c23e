// src/models/dispatch.rs
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const DEFAULT_PICKUP: &str = "Alamat Pickup Dummy";
pub const CONFIRMED_PICKUP: &str = "Alamat Pickup";
pub const DEFAULT_ONGKOS: i32 = 20000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    MenungguKonfirmasi,
    MenungguDriver,
    SedangDikirim,
    Selesai,
    Dibatalkan,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::MenungguKonfirmasi,
        OrderStatus::MenungguDriver,
        OrderStatus::SedangDikirim,
        OrderStatus::Selesai,
        OrderStatus::Dibatalkan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::MenungguKonfirmasi => "menunggu_konfirmasi",
            OrderStatus::MenungguDriver => "menunggu_driver",
            OrderStatus::SedangDikirim => "sedang_dikirim",
            OrderStatus::Selesai => "selesai",
            OrderStatus::Dibatalkan => "dibatalkan",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::MenungguKonfirmasi => "Menunggu Konfirmasi Penjual",
            OrderStatus::MenungguDriver => "Menunggu Driver",
            OrderStatus::SedangDikirim => "Sedang Dikirim",
            OrderStatus::Selesai => "Selesai",
            OrderStatus::Dibatalkan => "Dibatalkan",
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, OrderStatus::Selesai | OrderStatus::Dibatalkan)
    }

    /// Transisi yang diizinkan alur dispatch:
    /// menunggu_konfirmasi -> menunggu_driver -> sedang_dikirim -> selesai,
    /// konfirmasi ulang dari menunggu_driver, dan pembatalan dari status yang belum final.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (MenungguKonfirmasi, MenungguDriver) => true,
            (MenungguDriver, MenungguDriver) => true,
            (MenungguDriver, SedangDikirim) => true,
            (SedangDikirim, Selesai) => true,
            (from, Dibatalkan) => !from.is_final(),
            _ => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| format!("Status order tidak dikenal: {}", s))
    }
}

#[derive(Debug, Serialize, FromRow)]
pub struct Order {
    pub order_id: String,
    pub barang: String,
    pub pickup: String,
    pub tujuan: String,
    pub kota: String,
    pub ongkos: i32,
    pub status: String,
    pub driver_id: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

pub const ORDER_COLUMNS: &str =
    "order_id, barang, pickup, tujuan, kota, ongkos, status, driver_id, created_at, updated_at";

impl Order {
    pub fn status(&self) -> Option<OrderStatus> {
        self.status.parse().ok()
    }
}

#[derive(Debug, Serialize, FromRow)]
pub struct OrderWithDriver {
    pub order_id: String,
    pub barang: String,
    pub pickup: String,
    pub tujuan: String,
    pub kota: String,
    pub ongkos: i32,
    pub status: String,
    pub driver_name: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// `order_<detik unix>`, ditambah sufiks bila id tersebut sudah dipakai.
pub fn order_id_candidate(unix_seconds: i64, attempt: u32) -> String {
    if attempt == 0 {
        format!("order_{}", unix_seconds)
    } else {
        format!("order_{}_{}", unix_seconds, attempt)
    }
}

pub fn order_destination(barang: &str, kota: &str) -> String {
    format!("{} ke {}", barang, kota)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Deserialize)]
pub struct DriverOnlineRequest {
    pub driver_id: Option<i64>,
    pub kota: Option<String>,
}

impl DriverOnlineRequest {
    pub fn kota(&self) -> Option<&str> {
        non_empty(&self.kota)
    }
}

#[derive(Debug, Deserialize)]
pub struct DriverOfflineRequest {
    pub driver_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub barang: Option<String>,
    pub kota: Option<String>,
}

impl CreateOrderRequest {
    pub fn fields(&self) -> Option<(&str, &str)> {
        Some((non_empty(&self.barang)?, non_empty(&self.kota)?))
    }
}

#[derive(Debug, Deserialize)]
pub struct OrderConfirmedRequest {
    pub order_id: Option<String>,
    pub pickup: Option<String>,
    pub tujuan: Option<String>,
    pub kota: Option<String>,
}

impl OrderConfirmedRequest {
    /// `(order_id, pickup, tujuan, kota)`; pickup diisi default bila kosong.
    pub fn fields(&self) -> Option<(&str, &str, &str, &str)> {
        let pickup = non_empty(&self.pickup).unwrap_or(CONFIRMED_PICKUP);
        Some((
            non_empty(&self.order_id)?,
            pickup,
            non_empty(&self.tujuan)?,
            non_empty(&self.kota)?,
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
    Terima,
    Tolak,
}

impl OrderAction {
    pub fn parse(action: &str) -> Option<Self> {
        match action.trim() {
            "terima" => Some(OrderAction::Terima),
            "tolak" => Some(OrderAction::Tolak),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OrderResponseRequest {
    pub driver_id: Option<i64>,
    pub order_id: Option<String>,
    pub action: Option<String>,
}

impl OrderResponseRequest {
    pub fn fields(&self) -> Option<(i64, &str, &str)> {
        Some((
            self.driver_id?,
            non_empty(&self.order_id)?,
            non_empty(&self.action)?,
        ))
    }
}

#[derive(Debug, Deserialize)]
pub struct FinishOrderRequest {
    pub order_id: Option<String>,
    pub driver_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CancelOrderRequest {
    pub order_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
}

/// Payload ke driver-service `/order/request`.
#[derive(Debug, Serialize)]
pub struct OrderRequestMessage<'a> {
    pub order_id: &'a str,
    pub pickup: &'a str,
    pub tujuan: &'a str,
    pub ongkos: i32,
    pub kota: &'a str,
}

/// Payload ke driver-service `/driver/status`.
#[derive(Debug, Serialize)]
pub struct DriverStatusMessage<'a> {
    pub driver_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kota: Option<&'a str>,
    pub status: &'a str,
}

/// Payload ke driver-service `/order/response`.
#[derive(Debug, Serialize)]
pub struct OrderResponseMessage<'a> {
    pub driver_id: i64,
    pub order_id: &'a str,
    pub action: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        use OrderStatus::*;
        assert!(MenungguKonfirmasi.can_transition_to(MenungguDriver));
        assert!(MenungguDriver.can_transition_to(SedangDikirim));
        assert!(SedangDikirim.can_transition_to(Selesai));
    }

    #[test]
    fn final_states_are_closed() {
        use OrderStatus::*;
        for next in OrderStatus::ALL {
            assert!(!Selesai.can_transition_to(next));
            assert!(!Dibatalkan.can_transition_to(next));
        }
    }

    #[test]
    fn skipping_steps_is_rejected() {
        use OrderStatus::*;
        assert!(!MenungguKonfirmasi.can_transition_to(SedangDikirim));
        assert!(!MenungguKonfirmasi.can_transition_to(Selesai));
        assert!(!SedangDikirim.can_transition_to(MenungguDriver));
        assert!(SedangDikirim.can_transition_to(Dibatalkan));
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("dikirim".parse::<OrderStatus>().is_err());
        assert_eq!(
            serde_json::to_value(OrderStatus::SedangDikirim).unwrap(),
            "sedang_dikirim"
        );
    }

    #[test]
    fn order_ids_get_suffix_on_retry() {
        assert_eq!(order_id_candidate(1700000000, 0), "order_1700000000");
        assert_eq!(order_id_candidate(1700000000, 2), "order_1700000000_2");
        assert_eq!(order_destination("Semen", "Bandung"), "Semen ke Bandung");
    }

    #[test]
    fn confirmed_request_defaults_pickup() {
        let req: OrderConfirmedRequest = serde_json::from_value(serde_json::json!({
            "order_id": "order_1",
            "tujuan": "Jl. Merdeka",
            "kota": "Bandung"
        }))
        .unwrap();
        assert_eq!(
            req.fields(),
            Some(("order_1", CONFIRMED_PICKUP, "Jl. Merdeka", "Bandung"))
        );

        let req: OrderConfirmedRequest =
            serde_json::from_value(serde_json::json!({ "order_id": "order_1", "kota": "" }))
                .unwrap();
        assert!(req.fields().is_none());
    }

    #[test]
    fn order_actions() {
        assert_eq!(OrderAction::parse("terima"), Some(OrderAction::Terima));
        assert_eq!(OrderAction::parse("tolak"), Some(OrderAction::Tolak));
        assert_eq!(OrderAction::parse("abaikan"), None);
    }

    #[test]
    fn offline_message_omits_city() {
        let msg = DriverStatusMessage {
            driver_id: 3,
            kota: None,
            status: "offline",
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            serde_json::json!({ "driver_id": 3, "status": "offline" })
        );
    }
}
