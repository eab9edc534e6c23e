// src/models/driver.rs
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverStatus {
    Training,
    Pending,
    Active,
    Inactive,
    Suspended,
    Rejected,
}

impl DriverStatus {
    pub const ALL: [DriverStatus; 6] = [
        DriverStatus::Training,
        DriverStatus::Pending,
        DriverStatus::Active,
        DriverStatus::Inactive,
        DriverStatus::Suspended,
        DriverStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DriverStatus::Training => "training",
            DriverStatus::Pending => "pending",
            DriverStatus::Active => "active",
            DriverStatus::Inactive => "inactive",
            DriverStatus::Suspended => "suspended",
            DriverStatus::Rejected => "rejected",
        }
    }

    /// Status yang boleh diset lewat `update_status`. `inactive` hanya ada di data lama.
    pub fn settable_by_admin(&self) -> bool {
        !matches!(self, DriverStatus::Inactive)
    }

    /// Nama event yang dikirim saat admin mengubah status ke nilai ini.
    pub fn event_name(&self) -> &'static str {
        match self {
            DriverStatus::Active => "driver_activated",
            DriverStatus::Suspended => "driver_suspended",
            DriverStatus::Rejected => "driver_rejected",
            DriverStatus::Pending => "driver_pending",
            DriverStatus::Training => "driver_training",
            DriverStatus::Inactive => "driver_updated",
        }
    }
}

impl fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DriverStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DriverStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| format!("Status driver tidak dikenal: {}", s))
    }
}

pub const DRIVER_COLUMNS: &str = "id_driver, no_hp, nama, email, wkt_daftar, kota, alamat, ttl, nik, no_sim, jenis_sim, \
    tanggal_kedaluarsa_sim, no_bpjs, tanggal_kedaluarsa_bpjs, no_sertifikat, tanggal_kedaluarsa_sertifikat, \
    nama_kontak_darurat, nomor_kontak_darurat, hubungan_kontak_darurat, status, foto_ktp, foto_sim, foto_profil, \
    foto_sertifikat, foto_bpjs, nama_bank, nomor_rekening, alasan_penolakan";

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Driver {
    pub id_driver: i64,
    pub no_hp: String,
    pub nama: String,
    pub email: String,
    pub wkt_daftar: NaiveDateTime,
    pub kota: Option<String>,
    pub alamat: String,
    pub ttl: NaiveDate,
    pub nik: String,
    pub no_sim: String,
    pub jenis_sim: String,
    pub tanggal_kedaluarsa_sim: Option<NaiveDate>,
    pub no_bpjs: String,
    pub tanggal_kedaluarsa_bpjs: Option<NaiveDate>,
    pub no_sertifikat: Option<String>,
    pub tanggal_kedaluarsa_sertifikat: Option<NaiveDate>,
    pub nama_kontak_darurat: String,
    pub nomor_kontak_darurat: String,
    pub hubungan_kontak_darurat: String,
    pub status: String,
    pub foto_ktp: Option<String>,
    pub foto_sim: Option<String>,
    pub foto_profil: Option<String>,
    pub foto_sertifikat: Option<String>,
    pub foto_bpjs: Option<String>,
    pub nama_bank: Option<String>,
    pub nomor_rekening: Option<String>,
    pub alasan_penolakan: Option<String>,
}

impl Driver {
    pub fn status(&self) -> Option<DriverStatus> {
        self.status.parse().ok()
    }

    pub fn photos(&self) -> [Option<&str>; 5] {
        [
            self.foto_ktp.as_deref(),
            self.foto_sim.as_deref(),
            self.foto_profil.as_deref(),
            self.foto_sertifikat.as_deref(),
            self.foto_bpjs.as_deref(),
        ]
    }

    /// Jumlah dokumen foto yang terisi, misalnya `"3/5 photos"`.
    pub fn has_photos(&self) -> String {
        let count = self
            .photos()
            .iter()
            .filter(|p| p.map(|s| !s.trim().is_empty()).unwrap_or(false))
            .count();
        format!("{}/5 photos", count)
    }
}

/// Marker di `alasan_penolakan` yang diikuti daftar dokumen yang ditolak.
pub const REJECTED_DOCUMENTS_MARKER: &str = "Dokumen tidak jelas/tidak sesuai:";

/// Ambil kunci dokumen yang ditolak dari teks alasan penolakan.
pub fn parse_rejected_documents(reason: &str) -> Vec<&'static str> {
    let Some((_, doc_part)) = reason.split_once(REJECTED_DOCUMENTS_MARKER) else {
        return Vec::new();
    };

    doc_part
        .trim()
        .split(',')
        .filter_map(|name| match name.trim() {
            "KTP" => Some("ktp"),
            "SIM" => Some("sim"),
            "BPJS" => Some("bpjs"),
            "Sertifikat" => Some("sertifikat"),
            "Foto Profil" => Some("profil"),
            _ => None,
        })
        .collect()
}

/// Lama bergabung dalam tahun (1 desimal), dihitung dari tanggal daftar.
pub fn experience_years(registered: NaiveDate, today: NaiveDate) -> f64 {
    let days = (today - registered).num_days() as f64;
    let years = (days / 365.25 * 10.0).round() / 10.0;
    years.max(0.0)
}

/// Rata-rata rating dibulatkan 1 desimal, 0.0 bila belum ada rating.
pub fn average_rating(ratings: &[i32]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    let total: i64 = ratings.iter().map(|r| *r as i64).sum();
    let avg = total as f64 / ratings.len() as f64;
    (avg * 10.0).round() / 10.0
}

/// Status delivery order yang dihitung sebagai perjalanan selesai.
pub const COMPLETED_TRIP_STATUSES: [&str; 3] = ["completed", "delivered", "selesai"];

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterDriverRequest {
    #[validate(length(min = 1, message = "Nama harus diisi"))]
    pub nama: String,
    #[validate(email(message = "Email tidak valid"))]
    pub email: String,
    pub password: Option<String>,
    #[validate(length(min = 1, max = 15, message = "Nomor HP tidak valid"))]
    pub no_hp: String,
    pub kota: Option<String>,
    #[serde(default)]
    pub alamat: String,
    pub ttl: Option<String>,
    #[validate(length(max = 16, message = "NIK maksimal 16 digit"))]
    pub nik: Option<String>,
    pub no_sim: Option<String>,
    pub jenis_sim: Option<String>,
    pub tanggal_kedaluarsa_sim: Option<String>,
    pub no_bpjs: Option<String>,
    pub tanggal_kedaluarsa_bpjs: Option<String>,
    pub no_sertifikat: Option<String>,
    pub tanggal_kedaluarsa_sertifikat: Option<String>,
    pub nama_kontak_darurat: Option<String>,
    pub nomor_kontak_darurat: Option<String>,
    pub hubungan_kontak_darurat: Option<String>,
    pub foto_ktp: Option<String>,
    pub foto_sim: Option<String>,
    pub foto_profil: Option<String>,
    pub foto_sertifikat: Option<String>,
    pub foto_bpjs: Option<String>,
    pub nama_bank: Option<String>,
    pub nomor_rekening: Option<String>,
}

pub const DEFAULT_DRIVER_PASSWORD: &str = "driver123";
pub const DEFAULT_TTL: &str = "1990-01-01";
pub const DEFAULT_NIK: &str = "0000000000000000";

/// Update parsial; hanya field yang dikirim yang diubah.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct DriverUpdate {
    pub nama: Option<String>,
    #[validate(email(message = "Email tidak valid"))]
    pub email: Option<String>,
    pub no_hp: Option<String>,
    pub kota: Option<String>,
    pub alamat: Option<String>,
    pub ttl: Option<String>,
    pub nik: Option<String>,
    pub no_sim: Option<String>,
    pub jenis_sim: Option<String>,
    pub tanggal_kedaluarsa_sim: Option<String>,
    pub no_bpjs: Option<String>,
    pub tanggal_kedaluarsa_bpjs: Option<String>,
    pub no_sertifikat: Option<String>,
    pub tanggal_kedaluarsa_sertifikat: Option<String>,
    pub nama_kontak_darurat: Option<String>,
    pub nomor_kontak_darurat: Option<String>,
    pub hubungan_kontak_darurat: Option<String>,
    pub foto_ktp: Option<String>,
    pub foto_sim: Option<String>,
    pub foto_profil: Option<String>,
    pub foto_sertifikat: Option<String>,
    pub foto_bpjs: Option<String>,
    pub nama_bank: Option<String>,
    pub nomor_rekening: Option<String>,
    pub status: Option<String>,
    pub alasan_penolakan: Option<String>,
}

impl DriverUpdate {
    pub fn touches_status(&self) -> bool {
        self.status.is_some() || self.alasan_penolakan.is_some()
    }
}

/// Perbaikan dokumen oleh driver yang ditolak.
#[derive(Debug, Default, Deserialize)]
pub struct DocumentUpdate {
    pub foto_ktp: Option<String>,
    pub foto_sim: Option<String>,
    pub foto_bpjs: Option<String>,
    pub foto_sertifikat: Option<String>,
    pub foto_profil: Option<String>,
    pub nik: Option<String>,
    pub nama: Option<String>,
    pub ttl: Option<String>,
    pub no_sim: Option<String>,
    pub jenis_sim: Option<String>,
    pub tanggal_kedaluarsa_sim: Option<String>,
    pub no_bpjs: Option<String>,
    pub tanggal_kedaluarsa_bpjs: Option<String>,
    pub no_sertifikat: Option<String>,
    pub tanggal_kedaluarsa_sertifikat: Option<String>,
}

impl DocumentUpdate {
    /// Label dokumen yang ikut dikirim, urutannya tetap.
    pub fn updated_labels(&self) -> Vec<&'static str> {
        [
            (self.foto_ktp.is_some(), "KTP"),
            (self.foto_sim.is_some(), "SIM"),
            (self.foto_bpjs.is_some(), "BPJS"),
            (self.foto_sertifikat.is_some(), "Sertifikat"),
            (self.foto_profil.is_some(), "Foto Profil"),
        ]
        .into_iter()
        .filter_map(|(present, label)| present.then_some(label))
        .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkDriverRequest {
    #[serde(default)]
    pub driver_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DriverListFilter {
    pub status: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateDriverAccountRequest {
    #[validate(email(message = "Email tidak valid"))]
    pub email: Option<String>,
    pub password: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct RecentRating {
    pub rating: i32,
    pub ulasan: String,
    pub timestamp: NaiveDateTime,
    pub pelanggan: String,
}

#[derive(Debug, Serialize, FromRow)]
pub struct TripRow {
    pub id_delivery_order: i64,
    pub tanggal_kirim: NaiveDateTime,
    pub status: String,
    pub alamat_pengiriman: Option<String>,
    pub total_harga_order: Option<rust_decimal::Decimal>,
    pub nomor_polisi: Option<String>,
    pub jenis_armada: Option<String>,
    pub pelanggan: Option<String>,
}

/// Ringkasan driver untuk dashboard admin.
#[derive(Debug, Serialize, FromRow)]
pub struct DriverSummary {
    pub id_driver: i64,
    pub nama: String,
    pub email: String,
    pub kota: Option<String>,
    pub status: String,
    pub wkt_daftar: NaiveDateTime,
}

#[derive(Debug, Serialize, FromRow)]
pub struct DriverBrief {
    pub id: i64,
    pub email: String,
    pub nama: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    Activate,
    Accept,
    Suspend,
    Reject,
}

impl FromStr for AdminAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "activate" => Ok(AdminAction::Activate),
            "accept" => Ok(AdminAction::Accept),
            "suspend" => Ok(AdminAction::Suspend),
            "reject" => Ok(AdminAction::Reject),
            other => Err(format!("Aksi tidak dikenal: {}", other)),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AdminStatusRequest {
    pub action: String,
    #[serde(default)]
    pub alasan_penolakan: Option<String>,
    #[serde(default)]
    pub rejection_reasons: Vec<String>,
}

/// Perubahan yang dihasilkan satu aksi admin terhadap driver.
#[derive(Debug, PartialEq, Eq)]
pub struct StatusChange {
    pub status: DriverStatus,
    /// `Some(..)` berarti kolom alasan ikut ditulis (termasuk dikosongkan).
    pub alasan_penolakan: Option<Option<String>>,
}

impl AdminStatusRequest {
    pub fn resolve(&self) -> Result<StatusChange, String> {
        let change = match self.action.parse::<AdminAction>()? {
            AdminAction::Activate | AdminAction::Accept => StatusChange {
                status: DriverStatus::Active,
                alasan_penolakan: Some(None),
            },
            AdminAction::Suspend => StatusChange {
                status: DriverStatus::Suspended,
                alasan_penolakan: None,
            },
            AdminAction::Reject => {
                let extra = self
                    .alasan_penolakan
                    .as_deref()
                    .map(str::trim)
                    .filter(|a| !a.is_empty());
                let reasons: Vec<&str> = self
                    .rejection_reasons
                    .iter()
                    .map(|r| r.trim())
                    .filter(|r| !r.is_empty())
                    .chain(extra)
                    .collect();
                StatusChange {
                    status: DriverStatus::Rejected,
                    alasan_penolakan: Some((!reasons.is_empty()).then(|| reasons.join("; "))),
                }
            }
        };
        Ok(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_reject_joins_reasons() {
        let req = AdminStatusRequest {
            action: "reject".into(),
            alasan_penolakan: Some("Foto buram".into()),
            rejection_reasons: vec![
                "Dokumen tidak jelas/tidak sesuai: KTP, SIM".into(),
                " ".into(),
            ],
        };
        assert_eq!(
            req.resolve().unwrap(),
            StatusChange {
                status: DriverStatus::Rejected,
                alasan_penolakan: Some(Some(
                    "Dokumen tidak jelas/tidak sesuai: KTP, SIM; Foto buram".into()
                )),
            }
        );

        let req = AdminStatusRequest {
            action: "reject".into(),
            alasan_penolakan: None,
            rejection_reasons: vec![],
        };
        assert_eq!(req.resolve().unwrap().alasan_penolakan, Some(None));
    }

    #[test]
    fn admin_accept_clears_reason_and_suspend_keeps_it() {
        let req = AdminStatusRequest {
            action: "accept".into(),
            alasan_penolakan: Some("lama".into()),
            rejection_reasons: vec![],
        };
        let change = req.resolve().unwrap();
        assert_eq!(change.status, DriverStatus::Active);
        assert_eq!(change.alasan_penolakan, Some(None));

        let req = AdminStatusRequest {
            action: "suspend".into(),
            alasan_penolakan: None,
            rejection_reasons: vec![],
        };
        assert_eq!(req.resolve().unwrap().alasan_penolakan, None);

        let req = AdminStatusRequest {
            action: "hapus".into(),
            alasan_penolakan: None,
            rejection_reasons: vec![],
        };
        assert!(req.resolve().is_err());
    }

    #[test]
    fn status_parses_all_values() {
        for status in DriverStatus::ALL {
            assert_eq!(status.as_str().parse::<DriverStatus>().unwrap(), status);
        }
        assert!("deleted".parse::<DriverStatus>().is_err());
        assert!(!DriverStatus::Inactive.settable_by_admin());
        assert!(DriverStatus::Rejected.settable_by_admin());
    }

    #[test]
    fn status_event_names() {
        assert_eq!(DriverStatus::Active.event_name(), "driver_activated");
        assert_eq!(DriverStatus::Rejected.event_name(), "driver_rejected");
        assert_eq!(DriverStatus::Inactive.event_name(), "driver_updated");
    }

    #[test]
    fn rejected_documents_are_mapped() {
        let reason = "Dokumen tidak jelas/tidak sesuai: KTP, Foto Profil, SIM";
        assert_eq!(parse_rejected_documents(reason), vec!["ktp", "profil", "sim"]);
    }

    #[test]
    fn rejected_documents_ignore_unknown_names_and_missing_marker() {
        let reason = "Dokumen tidak jelas/tidak sesuai: BPJS, Paspor";
        assert_eq!(parse_rejected_documents(reason), vec!["bpjs"]);
        assert!(parse_rejected_documents("Data tidak lengkap").is_empty());
    }

    #[test]
    fn experience_is_rounded_and_never_negative() {
        let joined = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(experience_years(joined, today), 2.0);
        assert_eq!(experience_years(today, joined), 0.0);
    }

    #[test]
    fn average_rating_rounds_to_one_decimal() {
        assert_eq!(average_rating(&[]), 0.0);
        assert_eq!(average_rating(&[5, 4, 4]), 4.3);
        assert_eq!(average_rating(&[5]), 5.0);
    }

    #[test]
    fn document_labels_follow_payload() {
        let update = DocumentUpdate {
            foto_sim: Some("abc".into()),
            foto_profil: Some("def".into()),
            ..Default::default()
        };
        assert_eq!(update.updated_labels(), vec!["SIM", "Foto Profil"]);
    }
}
