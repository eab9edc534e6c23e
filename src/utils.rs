//utils.rs
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::NaiveDate;
use rand::Rng;
use rand::distributions::Alphanumeric;
use validator::ValidationErrors;

use crate::errors::ApiError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_date(value: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        ApiError::bad_request(format!(
            "time data '{}' does not match format 'YYYY-MM-DD'",
            value
        ))
    })
}

/// String kosong dianggap tidak diisi.
pub fn parse_optional_date(value: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => parse_date(v).map(Some),
        _ => Ok(None),
    }
}

/// Pesan validasi pertama yang ditemukan, untuk dikirim balik ke client.
pub fn validation_message(errors: &ValidationErrors) -> String {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} tidak valid", field))
            })
        })
        .next()
        .unwrap_or_else(|| "Data tidak valid".to_string())
}

pub fn validate_payload<T: validator::Validate>(payload: &T) -> Result<(), ApiError> {
    payload
        .validate()
        .map_err(|e| ApiError::BadRequest(validation_message(&e)))
}

// ================= YOUTUBE =================
const YOUTUBE_PREFIXES: [&str; 4] = [
    "youtube.com/watch?v=",
    "youtu.be/",
    "youtube.com/embed/",
    "youtube.com/v/",
];

fn take_video_id(rest: &str) -> Option<&str> {
    let id = rest
        .split(|c| matches!(c, '&' | '?' | '#' | '\n'))
        .next()
        .unwrap_or("");
    (!id.is_empty()).then_some(id)
}

pub fn extract_youtube_video_id(url: &str) -> Option<&str> {
    if url.is_empty() {
        return None;
    }

    for prefix in YOUTUBE_PREFIXES {
        if let Some(pos) = url.find(prefix) {
            if let Some(id) = take_video_id(&url[pos + prefix.len()..]) {
                return Some(id);
            }
        }
    }

    // youtube.com/watch?feature=share&v=ID
    let pos = url.find("youtube.com/watch?")?;
    let query = &url[pos + "youtube.com/watch?".len()..];
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("v="))
        .and_then(take_video_id)
}

pub fn youtube_embed_url(url: &str) -> Option<String> {
    extract_youtube_video_id(url).map(|id| format!("https://www.youtube.com/embed/{}", id))
}

pub fn youtube_thumbnail_url(url: &str) -> Option<String> {
    extract_youtube_video_id(url)
        .map(|id| format!("https://img.youtube.com/vi/{}/maxresdefault.jpg", id))
}

pub fn is_youtube_url(url: &str) -> bool {
    let without_scheme = url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    matches!(
        host.as_str(),
        "youtube.com" | "youtu.be" | "www.youtube.com" | "m.youtube.com"
    )
}

// ================= DOKUMEN FOTO =================
/// Foto disimpan sebagai base64 mentah atau data URI; untuk preview selalu data URI.
pub fn photo_data_uri(photo: &str) -> String {
    if photo.starts_with("data:image") {
        photo.to_string()
    } else {
        format!("data:image/jpeg;base64,{}", photo)
    }
}

/// Cek isi dokumen: kosong, atau base64 (boleh berawalan data URI).
pub fn is_valid_document(photo: &str) -> bool {
    let trimmed = photo.trim();
    if trimmed.is_empty() {
        return true;
    }
    let payload = match trimmed.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        Some(_) => return false,
        None => trimmed,
    };
    STANDARD.decode(payload.as_bytes()).is_ok()
}

pub fn ensure_valid_documents(
    docs: &[(&'static str, Option<&String>)],
) -> Result<(), ApiError> {
    for (label, doc) in docs {
        if let Some(doc) = doc {
            if !is_valid_document(doc) {
                return Err(ApiError::bad_request(format!(
                    "Dokumen {} bukan gambar base64 yang valid",
                    label
                )));
            }
        }
    }
    Ok(())
}

pub fn generate_random_password(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso_dates() {
        assert_eq!(
            parse_date("2025-02-03").unwrap(),
            NaiveDate::from_ymd_opt(2025, 2, 3).unwrap()
        );
        assert!(parse_date("03/02/2025").is_err());
        assert_eq!(parse_optional_date(Some("  ")).unwrap(), None);
        assert_eq!(parse_optional_date(None).unwrap(), None);
    }

    #[test]
    fn youtube_ids_from_common_formats() {
        assert_eq!(
            extract_youtube_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=10"),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            extract_youtube_video_id("https://youtu.be/dQw4w9WgXcQ?si=abc"),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            extract_youtube_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            extract_youtube_video_id("https://www.youtube.com/watch?feature=share&v=abc123"),
            Some("abc123")
        );
        assert_eq!(extract_youtube_video_id("https://vimeo.com/123"), None);
    }

    #[test]
    fn youtube_derived_urls() {
        let url = "https://www.youtube.com/watch?v=abc123";
        assert_eq!(
            youtube_embed_url(url).as_deref(),
            Some("https://www.youtube.com/embed/abc123")
        );
        assert_eq!(
            youtube_thumbnail_url(url).as_deref(),
            Some("https://img.youtube.com/vi/abc123/maxresdefault.jpg")
        );
        assert!(is_youtube_url(url));
        assert!(is_youtube_url("https://youtu.be/abc123"));
        assert!(!is_youtube_url("https://example.com/youtube.com"));
    }

    #[test]
    fn photos_become_data_uris() {
        assert_eq!(photo_data_uri("QUJD"), "data:image/jpeg;base64,QUJD");
        assert_eq!(
            photo_data_uri("data:image/png;base64,QUJD"),
            "data:image/png;base64,QUJD"
        );
    }

    #[test]
    fn document_validation() {
        assert!(is_valid_document(""));
        assert!(is_valid_document("QUJD"));
        assert!(is_valid_document("data:image/png;base64,QUJD"));
        assert!(!is_valid_document("bukan base64!!"));
        assert!(!is_valid_document("image/png;base64,QUJD"));
    }

    #[test]
    fn random_password_has_requested_length() {
        let pwd = generate_random_password(12);
        assert_eq!(pwd.len(), 12);
        assert!(pwd.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
