// src/services/driver_service.rs
use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::json;

use crate::models::dispatch::{DriverStatusMessage, OrderRequestMessage, OrderResponseMessage};

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Hasil meneruskan respons driver ke driver-service.
#[derive(Debug, PartialEq, Eq)]
pub enum ForwardOutcome {
    Delivered,
    Rejected(u16),
    Unreachable(String),
}

/// Klien HTTP ke driver-service (Go), yang meneruskan event ke Kafka.
#[derive(Clone)]
pub struct DriverServiceClient {
    client: Client,
    base_url: String,
}

impl DriverServiceClient {
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<StatusCode, reqwest::Error> {
        let resp = self.client.post(self.url(path)).json(body).send().await?;
        Ok(resp.status())
    }

    /// `true` hanya bila driver-service menjawab 200.
    async fn publish<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> bool {
        match self.post(path, body).await {
            Ok(status) if status == StatusCode::OK => true,
            Ok(status) => {
                log::warn!("driver-service {} menjawab {}", path, status);
                false
            }
            Err(e) => {
                log::error!("Gagal mengirim ke driver-service {}: {}", path, e);
                false
            }
        }
    }

    pub async fn publish_order_request(&self, order: &OrderRequestMessage<'_>) -> bool {
        log::info!("Mengirim order {} ke driver-service", order.order_id);
        self.publish("/order/request", order).await
    }

    pub async fn publish_driver_status(&self, status: &DriverStatusMessage<'_>) -> bool {
        log::info!(
            "Status driver {} -> {} dikirim ke driver-service",
            status.driver_id,
            status.status
        );
        self.publish("/driver/status", status).await
    }

    pub async fn forward_order_response(&self, response: &OrderResponseMessage<'_>) -> ForwardOutcome {
        match self.post("/order/response", response).await {
            Ok(status) if status == StatusCode::OK => ForwardOutcome::Delivered,
            Ok(status) => {
                log::warn!(
                    "driver-service menolak respons order {}: {}",
                    response.order_id,
                    status
                );
                ForwardOutcome::Rejected(status.as_u16())
            }
            Err(e) => {
                log::error!("driver-service tidak dapat dihubungi: {}", e);
                ForwardOutcome::Unreachable(e.to_string())
            }
        }
    }
}

/// Event siklus hidup driver (`driver_created`, `driver_activated`, ...).
/// Dicatat ke log terstruktur; driver-service tidak punya endpoint untuk event ini.
pub fn send_driver_event(event_type: &str, driver_id: i64) {
    let message = json!({
        "event_type": event_type,
        "driver_id": driver_id,
        "timestamp": Utc::now().to_rfc3339(),
    });
    log::info!(target: "driver_events", "{}", message);
}

#[cfg(test)]
mod tests {
    use super::*;

    // Port 9 (discard) di loopback hampir pasti tertutup.
    const CLOSED: &str = "http://127.0.0.1:9/";

    #[test]
    fn base_url_is_normalised() {
        let client = DriverServiceClient::new(CLOSED).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:9");
        assert_eq!(client.url("/order/request"), "http://127.0.0.1:9/order/request");
    }

    #[actix_web::test]
    async fn unreachable_service_reports_failure() {
        let client = DriverServiceClient::new(CLOSED).unwrap();
        let status = DriverStatusMessage {
            driver_id: 1,
            kota: Some("Bandung"),
            status: "online",
        };
        assert!(!client.publish_driver_status(&status).await);

        let response = OrderResponseMessage {
            driver_id: 1,
            order_id: "order_1",
            action: "terima",
        };
        assert!(matches!(
            client.forward_order_response(&response).await,
            ForwardOutcome::Unreachable(_)
        ));
    }
}
