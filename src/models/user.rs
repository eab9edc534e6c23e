use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Akun login. Driver terhubung ke akun lewat email, bukan foreign key.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
    pub date_joined: NaiveDateTime,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

pub const USER_COLUMNS: &str = "id, username, email, password, first_name, last_name, is_staff, is_superuser, is_active, date_joined";

#[derive(Debug, Serialize, FromRow)]
pub struct UserBrief {
    pub id: i64,
    pub username: String,
    pub email: String,
}
