//! Perintah perawatan database: akun admin, approval driver, reset password,
//! sinkronisasi akun dan data contoh training.
use clap::{Parser, Subcommand};
use sqlx::MySqlPool;
use thiserror::Error;

use driver_management_backend::auth;
use driver_management_backend::config::{AppConfig, ConfigError};
use driver_management_backend::db;
use driver_management_backend::errors::ApiError;
use driver_management_backend::models::driver::DriverStatus;
use driver_management_backend::services::driver_service::send_driver_event;
use driver_management_backend::utils;

#[derive(Parser)]
#[command(name = "manage")]
#[command(about = "Perintah perawatan backend manajemen driver")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Buat akun admin (staff + superuser)
    CreateAdmin {
        #[arg(long, default_value = "admin")]
        username: String,
        #[arg(long, default_value = "admin@example.com")]
        email: String,
        /// Password acak bila tidak diisi
        #[arg(long)]
        password: Option<String>,
    },
    /// Aktifkan driver berstatus pending beserta akunnya
    ApproveDriver { email: String },
    /// Reset password akun berdasarkan email
    ResetPassword {
        email: String,
        /// Password acak bila tidak diisi
        #[arg(long)]
        password: Option<String>,
    },
    /// Tampilkan (atau hapus dengan --yes) akun tanpa data driver
    CleanupOrphans {
        #[arg(long)]
        yes: bool,
    },
    /// Laporan sinkronisasi akun dan driver
    CheckSync,
    /// Isi modul, konten dan kuis contoh bila belum ada modul
    SeedTraining,
}

#[derive(Debug, Error)]
enum ManageError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("{0}")]
    Invalid(String),
}

type ManageResult = Result<(), ManageError>;

const RANDOM_PASSWORD_LEN: usize = 12;

fn password_or_random(password: Option<String>) -> (String, bool) {
    match password.filter(|p| !p.is_empty()) {
        Some(p) => (p, false),
        None => (utils::generate_random_password(RANDOM_PASSWORD_LEN), true),
    }
}

async fn create_admin(
    pool: &MySqlPool,
    username: &str,
    email: &str,
    password: Option<String>,
) -> ManageResult {
    if db::find_user_by_username(pool, username).await?.is_some() {
        return Err(ManageError::Invalid(format!("User {} sudah ada", username)));
    }

    let (password, generated) = password_or_random(password);
    let hashed = auth::hash_password(&password)?;

    sqlx::query(
        r#"
        INSERT INTO users (username, email, password, is_staff, is_superuser, is_active)
        VALUES (?, ?, ?, TRUE, TRUE, TRUE)
        "#,
    )
    .bind(username)
    .bind(email)
    .bind(&hashed)
    .execute(pool)
    .await?;

    println!("Admin {} dibuat", username);
    if generated {
        println!("Password: {}", password);
    }
    Ok(())
}

async fn approve_driver(pool: &MySqlPool, email: &str) -> ManageResult {
    let driver = db::find_driver_by_email(pool, email)
        .await?
        .ok_or_else(|| ManageError::Invalid(format!("Driver {} tidak ditemukan", email)))?;

    if driver.status() != Some(DriverStatus::Pending) {
        return Err(ManageError::Invalid(format!(
            "Driver {} berstatus {}, hanya pending yang bisa di-approve",
            email, driver.status
        )));
    }

    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE drivers SET status = ?, alasan_penolakan = NULL WHERE id_driver = ?")
        .bind(DriverStatus::Active.as_str())
        .bind(driver.id_driver)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE users SET is_active = TRUE WHERE email = ?")
        .bind(email)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    send_driver_event(DriverStatus::Active.event_name(), driver.id_driver);
    println!("Driver {} ({}) sekarang aktif", driver.nama, email);
    Ok(())
}

async fn reset_password(pool: &MySqlPool, email: &str, password: Option<String>) -> ManageResult {
    let user = db::find_user_by_email(pool, email)
        .await?
        .ok_or_else(|| ManageError::Invalid("User not found".into()))?;

    let (password, _) = password_or_random(password);
    let hashed = auth::hash_password(&password)?;

    sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(&hashed)
        .bind(user.id)
        .execute(pool)
        .await?;

    println!("Password reset for {} - New password: {}", user.email, password);
    Ok(())
}

async fn cleanup_orphans(pool: &MySqlPool, yes: bool) -> ManageResult {
    let orphans = db::orphaned_users(pool).await?;
    if orphans.is_empty() {
        println!("No orphaned users found");
        return Ok(());
    }

    for user in &orphans {
        println!("  {} ({}) id={}", user.username, user.email, user.id);
    }

    if !yes {
        println!(
            "{} akun tanpa data driver. Jalankan ulang dengan --yes untuk menghapus.",
            orphans.len()
        );
        return Ok(());
    }

    let deleted = db::delete_orphaned_users(pool).await?;
    println!("Cleaned up {} orphaned user accounts", deleted.len());
    Ok(())
}

async fn check_sync(pool: &MySqlPool) -> ManageResult {
    let orphaned = db::orphaned_users(pool).await?;
    let without_users = db::drivers_without_users(pool).await?;

    println!("Akun tanpa driver: {}", orphaned.len());
    for user in &orphaned {
        println!("  {} ({})", user.username, user.email);
    }
    println!("Driver tanpa akun: {}", without_users.len());
    for driver in &without_users {
        println!("  {} ({}) id={}", driver.nama, driver.email, driver.id);
    }

    let synced = orphaned.is_empty() && without_users.is_empty();
    println!("Tersinkron: {}", if synced { "ya" } else { "tidak" });
    Ok(())
}

struct SeedModule {
    title: &'static str,
    description: &'static str,
    level: &'static str,
    contents: &'static [(&'static str, &'static str, i32)],
    quizzes: &'static [SeedQuiz],
}

struct SeedQuiz {
    question: &'static str,
    options: [&'static str; 4],
    answer: &'static str,
}

const SEED_MODULES: &[SeedModule] = &[
    SeedModule {
        title: "Keselamatan Berkendara",
        description: "Dasar keselamatan berkendara untuk driver pengiriman.",
        level: "pemula",
        contents: &[
            ("Pemeriksaan kendaraan", "Periksa rem, lampu, ban dan oli sebelum berangkat.", 10),
            ("Jarak aman", "Jaga jarak minimal tiga detik dengan kendaraan di depan.", 10),
        ],
        quizzes: &[SeedQuiz {
            question: "Kapan kendaraan harus diperiksa?",
            options: ["Setiap sebelum berangkat", "Sebulan sekali", "Saat rusak", "Tidak perlu"],
            answer: "A",
        }],
    },
    SeedModule {
        title: "Pelayanan Pelanggan",
        description: "Etika komunikasi dan serah terima barang.",
        level: "lanjutan",
        contents: &[(
            "Serah terima barang",
            "Pastikan penerima dan kondisi barang sesuai sebelum konfirmasi selesai.",
            15,
        )],
        quizzes: &[SeedQuiz {
            question: "Apa yang dilakukan bila penerima tidak ada di lokasi?",
            options: [
                "Tinggalkan barang",
                "Hubungi pelanggan dan admin",
                "Bawa pulang tanpa kabar",
                "Batalkan order",
            ],
            answer: "B",
        }],
    },
];

async fn seed_training(pool: &MySqlPool) -> ManageResult {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM training_modules")
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        println!("{} modul sudah ada, seed dilewati", existing);
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    for (position, module) in SEED_MODULES.iter().enumerate() {
        let module_id = sqlx::query(
            r#"
            INSERT INTO training_modules (title, description, level, instructor, `order`)
            VALUES (?, ?, ?, 'Tim Operasional', ?)
            "#,
        )
        .bind(module.title)
        .bind(module.description)
        .bind(module.level)
        .bind(position as i32 + 1)
        .execute(&mut *tx)
        .await?
        .last_insert_id() as i64;

        for (title, text, points) in module.contents {
            sqlx::query(
                r#"
                INSERT INTO training_contents (module_id, title, content_type, text_content, points)
                VALUES (?, ?, 'narration', ?, ?)
                "#,
            )
            .bind(module_id)
            .bind(*title)
            .bind(*text)
            .bind(*points)
            .execute(&mut *tx)
            .await?;
        }

        for quiz in module.quizzes {
            sqlx::query(
                r#"
                INSERT INTO training_quizzes
                (module_id, question, option_a, option_b, option_c, option_d, correct_answer)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(module_id)
            .bind(quiz.question)
            .bind(quiz.options[0])
            .bind(quiz.options[1])
            .bind(quiz.options[2])
            .bind(quiz.options[3])
            .bind(quiz.answer)
            .execute(&mut *tx)
            .await?;
        }
    }
    tx.commit().await?;

    println!("{} modul training contoh dibuat", SEED_MODULES.len());
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> ManageResult {
    let config = AppConfig::from_env()?;
    let pool = db::establish_connection(&config).await?;

    match cli.command {
        Command::CreateAdmin {
            username,
            email,
            password,
        } => create_admin(&pool, &username, &email, password).await,
        Command::ApproveDriver { email } => approve_driver(&pool, &email).await,
        Command::ResetPassword { email, password } => reset_password(&pool, &email, password).await,
        Command::CleanupOrphans { yes } => cleanup_orphans(&pool, yes).await,
        Command::CheckSync => check_sync(&pool).await,
        Command::SeedTraining => seed_training(&pool).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cleanup_requires_explicit_confirmation_flag() {
        let cli = Cli::parse_from(["manage", "cleanup-orphans"]);
        assert!(matches!(cli.command, Command::CleanupOrphans { yes: false }));

        let cli = Cli::parse_from(["manage", "reset-password", "a@b.com", "--password", "x1"]);
        assert!(matches!(
            cli.command,
            Command::ResetPassword { ref email, password: Some(ref p) } if email == "a@b.com" && p == "x1"
        ));
    }

    #[test]
    fn seed_answers_are_valid_options() {
        for module in SEED_MODULES {
            assert!(driver_management_backend::models::training::LEVELS.contains(&module.level));
            for quiz in module.quizzes {
                assert!(
                    driver_management_backend::models::training::QUIZ_OPTIONS
                        .contains(&quiz.answer)
                );
            }
        }
    }

    #[test]
    fn random_password_when_missing() {
        let (p, generated) = password_or_random(None);
        assert!(generated);
        assert_eq!(p.len(), RANDOM_PASSWORD_LEN);
        assert_eq!(password_or_random(Some("abc".into())), ("abc".into(), false));
    }
}
