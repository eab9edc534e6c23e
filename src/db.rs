use sqlx::mysql::MySqlPoolOptions;
use sqlx::{Encode, MySql, MySqlPool, Pool, QueryBuilder, Type};

use crate::config::AppConfig;
use crate::models::driver::{DRIVER_COLUMNS, Driver, DriverBrief};
use crate::models::user::{USER_COLUMNS, User, UserBrief};

pub async fn establish_connection(config: &AppConfig) -> Result<Pool<MySql>, sqlx::Error> {
    let pool = MySqlPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .map_err(|e| {
            log::error!("Gagal membuat pool database: {:?}", e);
            e
        })?;

    if config.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            log::error!("Migrasi database gagal: {:?}", e);
            sqlx::Error::from(e)
        })?;
        log::info!("Migrasi database selesai");
    }

    Ok(pool)
}

pub async fn find_user_by_email(pool: &MySqlPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE email = ? ORDER BY id LIMIT 1",
        USER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await
}

pub async fn find_user_by_username(
    pool: &MySqlPool,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE username = ? LIMIT 1",
        USER_COLUMNS
    ))
    .bind(username)
    .fetch_optional(pool)
    .await
}

pub async fn find_user_by_id(pool: &MySqlPool, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_driver_by_email(
    pool: &MySqlPool,
    email: &str,
) -> Result<Option<Driver>, sqlx::Error> {
    sqlx::query_as::<_, Driver>(&format!(
        "SELECT {} FROM drivers WHERE email = ? ORDER BY id_driver LIMIT 1",
        DRIVER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await
}

pub async fn find_driver_by_id(pool: &MySqlPool, id: i64) -> Result<Option<Driver>, sqlx::Error> {
    sqlx::query_as::<_, Driver>(&format!(
        "SELECT {} FROM drivers WHERE id_driver = ?",
        DRIVER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Akun non-staff yang tidak punya baris driver dengan email yang sama.
pub async fn orphaned_users(pool: &MySqlPool) -> Result<Vec<UserBrief>, sqlx::Error> {
    sqlx::query_as::<_, UserBrief>(
        r#"
        SELECT u.id, u.username, u.email FROM users u
        WHERE u.is_staff = FALSE
          AND NOT EXISTS (SELECT 1 FROM drivers d WHERE d.email = u.email)
        ORDER BY u.id
        "#,
    )
    .fetch_all(pool)
    .await
}

pub async fn drivers_without_users(pool: &MySqlPool) -> Result<Vec<DriverBrief>, sqlx::Error> {
    sqlx::query_as::<_, DriverBrief>(
        r#"
        SELECT d.id_driver AS id, d.email, d.nama FROM drivers d
        WHERE NOT EXISTS (SELECT 1 FROM users u WHERE u.email = d.email)
        ORDER BY d.id_driver
        "#,
    )
    .fetch_all(pool)
    .await
}

/// Hapus akun yatim; mengembalikan email yang terhapus.
pub async fn delete_orphaned_users(pool: &MySqlPool) -> Result<Vec<String>, sqlx::Error> {
    let orphans = orphaned_users(pool).await?;
    if orphans.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = orphans.iter().map(|u| u.id).collect();
    let mut qb: QueryBuilder<MySql> = QueryBuilder::new("DELETE FROM users WHERE ");
    push_id_list(&mut qb, "id", &ids);
    qb.build().execute(pool).await?;

    let emails: Vec<String> = orphans.into_iter().map(|u| u.email).collect();
    log::info!("Cleaned up {} orphaned users: {:?}", emails.len(), emails);
    Ok(emails)
}

/// UPDATE parsial: hanya kolom yang di-`set` yang ikut diubah.
pub struct PartialUpdate<'a> {
    qb: QueryBuilder<'a, MySql>,
    fields: usize,
}

impl<'a> PartialUpdate<'a> {
    pub fn new(table: &str) -> Self {
        Self {
            qb: QueryBuilder::new(format!("UPDATE {} SET ", table)),
            fields: 0,
        }
    }

    pub fn set<T>(&mut self, column: &str, value: T) -> &mut Self
    where
        T: 'a + Encode<'a, MySql> + Type<MySql> + Send,
    {
        if self.fields > 0 {
            self.qb.push(", ");
        }
        self.qb.push(column).push(" = ").push_bind(value);
        self.fields += 1;
        self
    }

    pub fn set_some<T>(&mut self, column: &str, value: Option<T>) -> &mut Self
    where
        T: 'a + Encode<'a, MySql> + Type<MySql> + Send,
    {
        if let Some(v) = value {
            self.set(column, v);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields == 0
    }

    pub fn where_id(mut self, key_column: &str, id: i64) -> QueryBuilder<'a, MySql> {
        self.qb.push(" WHERE ").push(key_column).push(" = ").push_bind(id);
        self.qb
    }
}

/// `WHERE <column> IN (...)` untuk daftar id; pemanggil memastikan daftar tidak kosong.
pub fn push_id_list(qb: &mut QueryBuilder<'_, MySql>, column: &str, ids: &[i64]) {
    qb.push(column).push(" IN (");
    let mut sep = qb.separated(", ");
    for id in ids {
        sep.push_bind(*id);
    }
    sep.push_unseparated(")");
}
