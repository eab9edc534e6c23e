// src/models/armada.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

pub const ARMADA_COLUMNS: &str = "id_armada, nomor_polisi, jenis_armada, kapasitas_muatan, status, \
    warna_armada, id_stnk, tahun_pembuatan, id_bpkb, foto_stnk, foto_bpkb";

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Armada {
    pub id_armada: i64,
    pub nomor_polisi: String,
    pub jenis_armada: String,
    pub kapasitas_muatan: i32,
    pub status: bool,
    pub warna_armada: String,
    pub id_stnk: String,
    pub tahun_pembuatan: NaiveDateTime,
    pub id_bpkb: String,
    pub foto_stnk: Option<String>,
    pub foto_bpkb: Option<String>,
}

/// Dipakai untuk create (semua field wajib kecuali foto) maupun update parsial.
#[derive(Debug, Deserialize, Validate)]
pub struct ArmadaForm {
    #[validate(length(min = 1, max = 15, message = "Nomor polisi maksimal 15 karakter"))]
    pub nomor_polisi: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub jenis_armada: Option<String>,
    #[validate(range(min = 0, message = "Kapasitas muatan tidak boleh negatif"))]
    pub kapasitas_muatan: Option<i32>,
    pub status: Option<bool>,
    #[validate(length(max = 20))]
    pub warna_armada: Option<String>,
    #[validate(length(max = 30))]
    pub id_stnk: Option<String>,
    pub tahun_pembuatan: Option<NaiveDateTime>,
    #[validate(length(max = 30))]
    pub id_bpkb: Option<String>,
    pub foto_stnk: Option<String>,
    pub foto_bpkb: Option<String>,
}

impl ArmadaForm {
    /// Nama field wajib pertama yang kosong, untuk pesan error create.
    pub fn first_missing(&self) -> Option<&'static str> {
        [
            (self.nomor_polisi.is_none(), "nomor_polisi"),
            (self.jenis_armada.is_none(), "jenis_armada"),
            (self.kapasitas_muatan.is_none(), "kapasitas_muatan"),
            (self.warna_armada.is_none(), "warna_armada"),
            (self.id_stnk.is_none(), "id_stnk"),
            (self.tahun_pembuatan.is_none(), "tahun_pembuatan"),
            (self.id_bpkb.is_none(), "id_bpkb"),
        ]
        .into_iter()
        .find_map(|(missing, name)| missing.then_some(name))
    }
}

#[derive(Debug, Deserialize)]
pub struct ArmadaFilter {
    pub status: Option<bool>,
    pub jenis_armada: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct DriverArmada {
    pub id: i64,
    pub id_driver: i64,
    pub id_armada: i64,
    pub tanggal_mulai: NaiveDateTime,
    pub tanggal_selesai: NaiveDateTime,
}

pub const DRIVER_ARMADA_COLUMNS: &str = "id, id_driver, id_armada, tanggal_mulai, tanggal_selesai";

#[derive(Debug, Deserialize)]
pub struct DriverArmadaRequest {
    pub id_armada: i64,
    pub tanggal_mulai: NaiveDateTime,
    pub tanggal_selesai: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
pub struct DriverArmadaUpdate {
    pub id_driver: Option<i64>,
    pub id_armada: Option<i64>,
    pub tanggal_mulai: Option<NaiveDateTime>,
    pub tanggal_selesai: Option<NaiveDateTime>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_are_reported_in_order() {
        let form: ArmadaForm = serde_json::from_value(serde_json::json!({
            "nomor_polisi": "B 1234 XY",
            "jenis_armada": "Truk"
        }))
        .unwrap();
        assert_eq!(form.first_missing(), Some("kapasitas_muatan"));
    }

    #[test]
    fn complete_form_passes() {
        let form: ArmadaForm = serde_json::from_value(serde_json::json!({
            "nomor_polisi": "B 1234 XY",
            "jenis_armada": "Truk",
            "kapasitas_muatan": 8000,
            "warna_armada": "Putih",
            "id_stnk": "STNK-1",
            "tahun_pembuatan": "2020-01-01T00:00:00",
            "id_bpkb": "BPKB-1"
        }))
        .unwrap();
        assert_eq!(form.first_missing(), None);
        assert!(form.validate().is_ok());
    }

    #[test]
    fn long_plate_is_rejected() {
        let form: ArmadaForm = serde_json::from_value(serde_json::json!({
            "nomor_polisi": "B 1234 XYZ 99999999"
        }))
        .unwrap();
        assert!(form.validate().is_err());
    }
}
