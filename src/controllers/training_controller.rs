// src/controllers/training_controller.rs
use std::collections::HashMap;

use actix_web::{HttpRequest, HttpResponse, delete, get, patch, post, put, web};
use chrono::Utc;
use serde_json::json;
use sqlx::types::Json;
use sqlx::{Executor, MySql, MySqlPool, QueryBuilder};

use crate::auth;
use crate::controllers::driver_controller::current_driver;
use crate::db::{self, PartialUpdate};
use crate::errors::{ApiError, ApiResult};
use crate::models::driver::DriverStatus;
use crate::models::training::{
    CONTENT_COLUMNS, CONTENT_TYPES, CompleteContentRequest, CompleteTrainingRequest,
    DriverTrainingProgress, LEVELS, MODULE_COLUMNS, ModuleFilter, PROGRESS_COLUMNS,
    ProgressWithModule, QUIZ_COLUMNS, QUIZ_OPTIONS, StartModuleRequest, SubmitQuizRequest,
    TrainingContent, TrainingContentForm, TrainingContentView, TrainingModule,
    TrainingModuleForm, TrainingQuiz, TrainingQuizForm, grade_quiz, mark_completed,
    progress_percentage, progress_percentage_exact, progress_points, reaches_completion,
    training_passed,
};
use crate::services::driver_service::send_driver_event;
use crate::utils;

fn check_choice(field: &str, value: Option<&str>, allowed: &[&str]) -> ApiResult<()> {
    match value {
        Some(v) if !allowed.contains(&v) => Err(ApiError::bad_request(format!(
            "{} harus salah satu dari: {}",
            field,
            allowed.join(", ")
        ))),
        _ => Ok(()),
    }
}

pub(crate) async fn find_module(pool: &MySqlPool, id: i64) -> ApiResult<TrainingModule> {
    sqlx::query_as::<_, TrainingModule>(&format!(
        "SELECT {} FROM training_modules WHERE id = ?",
        MODULE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Modul training tidak ditemukan"))
}

pub(crate) async fn module_contents(
    pool: &MySqlPool,
    module_id: i64,
) -> Result<Vec<TrainingContent>, sqlx::Error> {
    sqlx::query_as::<_, TrainingContent>(&format!(
        "SELECT {} FROM training_contents WHERE module_id = ? ORDER BY created_at, id",
        CONTENT_COLUMNS
    ))
    .bind(module_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn module_quizzes(
    pool: &MySqlPool,
    module_id: i64,
) -> Result<Vec<TrainingQuiz>, sqlx::Error> {
    sqlx::query_as::<_, TrainingQuiz>(&format!(
        "SELECT {} FROM training_quizzes WHERE module_id = ? ORDER BY created_at, id",
        QUIZ_COLUMNS
    ))
    .bind(module_id)
    .fetch_all(pool)
    .await
}

/// Total poin modul, dihitung dari konten dan kuis yang ada saat ini.
pub(crate) async fn module_points<'e, E>(executor: E, module_id: i64) -> Result<i32, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT CAST(
            COALESCE((SELECT SUM(points) FROM training_contents WHERE module_id = ?), 0) +
            COALESCE((SELECT SUM(points) FROM training_quizzes WHERE module_id = ?), 0)
        AS SIGNED)
        "#,
    )
    .bind(module_id)
    .bind(module_id)
    .fetch_one(executor)
    .await
    .map(|points| points as i32)
}

// ================= MODULES =================

#[get("/api/training-modules")]
pub async fn list_modules(pool: web::Data<MySqlPool>) -> ApiResult<HttpResponse> {
    let modules = sqlx::query_as::<_, TrainingModule>(&format!(
        "SELECT {} FROM training_modules ORDER BY created_at",
        MODULE_COLUMNS
    ))
    .fetch_all(pool.get_ref())
    .await?;
    Ok(HttpResponse::Ok().json(modules))
}

#[get("/api/training-modules/{id:\\d+}")]
pub async fn get_module(
    pool: web::Data<MySqlPool>,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(find_module(pool.get_ref(), *id).await?))
}

#[post("/api/training-modules")]
pub async fn create_module(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    payload: web::Json<TrainingModuleForm>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    utils::validate_payload(&payload.0)?;
    check_choice("level", payload.level.as_deref(), &LEVELS)?;
    let form = payload.into_inner();

    let title = form
        .title
        .ok_or_else(|| ApiError::bad_request("Judul modul harus diisi"))?;

    let result = sqlx::query(
        r#"
        INSERT INTO training_modules
        (title, description, level, instructor, thumbnail, is_active, `order`)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(title)
    .bind(form.description.unwrap_or_default())
    .bind(form.level.unwrap_or_else(|| LEVELS[0].to_string()))
    .bind(form.instructor.unwrap_or_default())
    .bind(form.thumbnail)
    .bind(form.is_active.unwrap_or(true))
    .bind(form.order.unwrap_or(1))
    .execute(pool.get_ref())
    .await?;

    let module = find_module(pool.get_ref(), result.last_insert_id() as i64).await?;
    log::info!("Modul training '{}' dibuat", module.title);
    Ok(HttpResponse::Created().json(module))
}

async fn apply_module_update(
    pool: &MySqlPool,
    id: i64,
    form: TrainingModuleForm,
) -> ApiResult<TrainingModule> {
    utils::validate_payload(&form)?;
    check_choice("level", form.level.as_deref(), &LEVELS)?;
    find_module(pool, id).await?;

    let mut update = PartialUpdate::new("training_modules");
    update
        .set_some("title", form.title)
        .set_some("description", form.description)
        .set_some("level", form.level)
        .set_some("instructor", form.instructor)
        .set_some("thumbnail", form.thumbnail)
        .set_some("is_active", form.is_active)
        .set_some("`order`", form.order);

    if !update.is_empty() {
        let mut qb = update.where_id("id", id);
        qb.build().execute(pool).await?;
    }
    find_module(pool, id).await
}

#[put("/api/training-modules/{id:\\d+}")]
pub async fn update_module(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
    payload: web::Json<TrainingModuleForm>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    let module = apply_module_update(pool.get_ref(), *id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(module))
}

#[patch("/api/training-modules/{id:\\d+}")]
pub async fn patch_module(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
    payload: web::Json<TrainingModuleForm>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    let module = apply_module_update(pool.get_ref(), *id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(module))
}

#[delete("/api/training-modules/{id:\\d+}")]
pub async fn delete_module(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    let result = sqlx::query("DELETE FROM training_modules WHERE id = ?")
        .bind(*id)
        .execute(pool.get_ref())
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Modul training tidak ditemukan"));
    }
    Ok(HttpResponse::NoContent().finish())
}

// ================= CONTENTS =================

async fn find_content(pool: &MySqlPool, id: i64) -> ApiResult<TrainingContent> {
    sqlx::query_as::<_, TrainingContent>(&format!(
        "SELECT {} FROM training_contents WHERE id = ?",
        CONTENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Konten training tidak ditemukan"))
}

#[get("/api/training-contents")]
pub async fn list_contents(
    pool: web::Data<MySqlPool>,
    filter: web::Query<ModuleFilter>,
) -> ApiResult<HttpResponse> {
    let mut qb: QueryBuilder<MySql> = QueryBuilder::new(format!(
        "SELECT {} FROM training_contents",
        CONTENT_COLUMNS
    ));
    if let Some(module_id) = filter.module_id {
        qb.push(" WHERE module_id = ").push_bind(module_id);
    }
    qb.push(" ORDER BY created_at, id");

    let contents: Vec<TrainingContentView> = qb
        .build_query_as::<TrainingContent>()
        .fetch_all(pool.get_ref())
        .await?
        .into_iter()
        .map(TrainingContentView::from)
        .collect();

    Ok(HttpResponse::Ok().json(contents))
}

#[get("/api/training-contents/{id:\\d+}")]
pub async fn get_content(
    pool: web::Data<MySqlPool>,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let content = find_content(pool.get_ref(), *id).await?;
    Ok(HttpResponse::Ok().json(TrainingContentView::from(content)))
}

#[post("/api/training-contents")]
pub async fn create_content(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    payload: web::Json<TrainingContentForm>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    utils::validate_payload(&payload.0)?;
    check_choice("content_type", payload.content_type.as_deref(), &CONTENT_TYPES)?;
    let form = payload.into_inner();

    let module_id = form
        .module
        .ok_or_else(|| ApiError::bad_request("Modul harus dipilih"))?;
    find_module(pool.get_ref(), module_id)
        .await
        .map_err(|_| ApiError::bad_request("Modul training tidak ditemukan"))?;
    let title = form
        .title
        .ok_or_else(|| ApiError::bad_request("Judul konten harus diisi"))?;

    let result = sqlx::query(
        r#"
        INSERT INTO training_contents
        (module_id, title, content_type, text_content, media_content, youtube_url, points)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(module_id)
    .bind(title)
    .bind(form.content_type.unwrap_or_else(|| CONTENT_TYPES[0].to_string()))
    .bind(form.text_content)
    .bind(form.media_content)
    .bind(form.youtube_url)
    .bind(form.points.unwrap_or(10))
    .execute(pool.get_ref())
    .await?;

    let content = find_content(pool.get_ref(), result.last_insert_id() as i64).await?;
    Ok(HttpResponse::Created().json(TrainingContentView::from(content)))
}

async fn apply_content_update(
    pool: &MySqlPool,
    id: i64,
    form: TrainingContentForm,
) -> ApiResult<TrainingContent> {
    utils::validate_payload(&form)?;
    check_choice("content_type", form.content_type.as_deref(), &CONTENT_TYPES)?;
    find_content(pool, id).await?;
    if let Some(module_id) = form.module {
        find_module(pool, module_id)
            .await
            .map_err(|_| ApiError::bad_request("Modul training tidak ditemukan"))?;
    }

    let mut update = PartialUpdate::new("training_contents");
    update
        .set_some("module_id", form.module)
        .set_some("title", form.title)
        .set_some("content_type", form.content_type)
        .set_some("text_content", form.text_content)
        .set_some("media_content", form.media_content)
        .set_some("youtube_url", form.youtube_url)
        .set_some("points", form.points);

    if !update.is_empty() {
        let mut qb = update.where_id("id", id);
        qb.build().execute(pool).await?;
    }
    find_content(pool, id).await
}

#[put("/api/training-contents/{id:\\d+}")]
pub async fn update_content(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
    payload: web::Json<TrainingContentForm>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    let content = apply_content_update(pool.get_ref(), *id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(TrainingContentView::from(content)))
}

#[patch("/api/training-contents/{id:\\d+}")]
pub async fn patch_content(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
    payload: web::Json<TrainingContentForm>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    let content = apply_content_update(pool.get_ref(), *id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(TrainingContentView::from(content)))
}

#[delete("/api/training-contents/{id:\\d+}")]
pub async fn delete_content(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    let result = sqlx::query("DELETE FROM training_contents WHERE id = ?")
        .bind(*id)
        .execute(pool.get_ref())
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Konten training tidak ditemukan"));
    }
    Ok(HttpResponse::NoContent().finish())
}

// ================= QUIZZES =================

async fn find_quiz(pool: &MySqlPool, id: i64) -> ApiResult<TrainingQuiz> {
    sqlx::query_as::<_, TrainingQuiz>(&format!(
        "SELECT {} FROM training_quizzes WHERE id = ?",
        QUIZ_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Kuis tidak ditemukan"))
}

#[get("/api/training-quizzes")]
pub async fn list_quizzes(
    pool: web::Data<MySqlPool>,
    filter: web::Query<ModuleFilter>,
) -> ApiResult<HttpResponse> {
    let mut qb: QueryBuilder<MySql> =
        QueryBuilder::new(format!("SELECT {} FROM training_quizzes", QUIZ_COLUMNS));
    if let Some(module_id) = filter.module_id {
        qb.push(" WHERE module_id = ").push_bind(module_id);
    }
    qb.push(" ORDER BY created_at, id");

    let quizzes = qb
        .build_query_as::<TrainingQuiz>()
        .fetch_all(pool.get_ref())
        .await?;
    Ok(HttpResponse::Ok().json(quizzes))
}

#[get("/api/training-quizzes/{id:\\d+}")]
pub async fn get_quiz(pool: web::Data<MySqlPool>, id: web::Path<i64>) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(find_quiz(pool.get_ref(), *id).await?))
}

#[post("/api/training-quizzes")]
pub async fn create_quiz(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    payload: web::Json<TrainingQuizForm>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    utils::validate_payload(&payload.0)?;
    check_choice("correct_answer", payload.correct_answer.as_deref(), &QUIZ_OPTIONS)?;
    let form = payload.into_inner();

    let module_id = form
        .module
        .ok_or_else(|| ApiError::bad_request("Modul harus dipilih"))?;
    find_module(pool.get_ref(), module_id)
        .await
        .map_err(|_| ApiError::bad_request("Modul training tidak ditemukan"))?;

    let required = |value: Option<String>, field: &str| {
        value.ok_or_else(|| ApiError::bad_request(format!("Field {} harus diisi", field)))
    };

    let result = sqlx::query(
        r#"
        INSERT INTO training_quizzes
        (module_id, question, option_a, option_b, option_c, option_d,
         correct_answer, explanation, points)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(module_id)
    .bind(required(form.question, "question")?)
    .bind(required(form.option_a, "option_a")?)
    .bind(required(form.option_b, "option_b")?)
    .bind(required(form.option_c, "option_c")?)
    .bind(required(form.option_d, "option_d")?)
    .bind(required(form.correct_answer, "correct_answer")?)
    .bind(form.explanation)
    .bind(form.points.unwrap_or(20))
    .execute(pool.get_ref())
    .await?;

    let quiz = find_quiz(pool.get_ref(), result.last_insert_id() as i64).await?;
    Ok(HttpResponse::Created().json(quiz))
}

async fn apply_quiz_update(
    pool: &MySqlPool,
    id: i64,
    form: TrainingQuizForm,
) -> ApiResult<TrainingQuiz> {
    utils::validate_payload(&form)?;
    check_choice("correct_answer", form.correct_answer.as_deref(), &QUIZ_OPTIONS)?;
    find_quiz(pool, id).await?;
    if let Some(module_id) = form.module {
        find_module(pool, module_id)
            .await
            .map_err(|_| ApiError::bad_request("Modul training tidak ditemukan"))?;
    }

    let mut update = PartialUpdate::new("training_quizzes");
    update
        .set_some("module_id", form.module)
        .set_some("question", form.question)
        .set_some("option_a", form.option_a)
        .set_some("option_b", form.option_b)
        .set_some("option_c", form.option_c)
        .set_some("option_d", form.option_d)
        .set_some("correct_answer", form.correct_answer)
        .set_some("explanation", form.explanation)
        .set_some("points", form.points);

    if !update.is_empty() {
        let mut qb = update.where_id("id", id);
        qb.build().execute(pool).await?;
    }
    find_quiz(pool, id).await
}

#[put("/api/training-quizzes/{id:\\d+}")]
pub async fn update_quiz(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
    payload: web::Json<TrainingQuizForm>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    let quiz = apply_quiz_update(pool.get_ref(), *id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(quiz))
}

#[patch("/api/training-quizzes/{id:\\d+}")]
pub async fn patch_quiz(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
    payload: web::Json<TrainingQuizForm>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    let quiz = apply_quiz_update(pool.get_ref(), *id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(quiz))
}

#[delete("/api/training-quizzes/{id:\\d+}")]
pub async fn delete_quiz(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    auth::require_admin(&req)?;
    let result = sqlx::query("DELETE FROM training_quizzes WHERE id = ?")
        .bind(*id)
        .execute(pool.get_ref())
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Kuis tidak ditemukan"));
    }
    Ok(HttpResponse::NoContent().finish())
}

// ================= PROGRESS =================

async fn find_progress(
    pool: &MySqlPool,
    driver_id: i64,
    module_id: i64,
) -> Result<Option<DriverTrainingProgress>, sqlx::Error> {
    sqlx::query_as::<_, DriverTrainingProgress>(&format!(
        "SELECT {} FROM driver_training_progress WHERE driver_id = ? AND module_id = ?",
        PROGRESS_COLUMNS
    ))
    .bind(driver_id)
    .bind(module_id)
    .fetch_optional(pool)
    .await
}

async fn require_progress(
    pool: &MySqlPool,
    driver_id: i64,
    module_id: i64,
) -> ApiResult<DriverTrainingProgress> {
    find_progress(pool, driver_id, module_id)
        .await?
        .ok_or_else(|| ApiError::bad_request("Modul belum dimulai"))
}

/// Poin saat ini = poin konten yang selesai + poin jawaban kuis terakhir, maksimal total.
/// Progres dianggap selesai begitu persentase mencapai 100.
async fn recompute_progress(
    pool: &MySqlPool,
    progress: &mut DriverTrainingProgress,
) -> Result<(), sqlx::Error> {
    let contents = module_contents(pool, progress.module_id).await?;
    let quizzes = module_quizzes(pool, progress.module_id).await?;

    let (current, total) = progress_points(
        &contents,
        &quizzes,
        &progress.completed_contents,
        &progress.quiz_answers,
    );
    progress.current_points = current;
    progress.total_points = total;

    if !progress.is_completed && reaches_completion(current, total) {
        progress.is_completed = true;
        progress.completed_at = Some(Utc::now().naive_utc());
    }

    sqlx::query(
        r#"
        UPDATE driver_training_progress
        SET completed_contents = ?, quiz_answers = ?, current_points = ?,
            total_points = ?, is_completed = ?, completed_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&progress.completed_contents)
    .bind(&progress.quiz_answers)
    .bind(progress.current_points)
    .bind(progress.total_points)
    .bind(progress.is_completed)
    .bind(progress.completed_at)
    .bind(progress.id)
    .execute(pool)
    .await?;
    Ok(())
}

#[get("/api/training-progress")]
pub async fn list_progress(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = auth::verify_jwt(&req)?;

    let mut qb: QueryBuilder<MySql> = QueryBuilder::new(
        r#"
        SELECT p.id, p.driver_id, p.module_id, p.completed_contents, p.quiz_answers,
               p.current_points, p.total_points, p.is_completed, p.completed_at,
               p.started_at, m.title AS module_title
        FROM driver_training_progress p
        JOIN training_modules m ON m.id = p.module_id
        "#,
    );
    if !claims.is_admin() {
        qb.push(" JOIN drivers d ON d.id_driver = p.driver_id WHERE d.email = ")
            .push_bind(&claims.email);
    }
    qb.push(" ORDER BY p.started_at DESC");

    let rows = qb
        .build_query_as::<ProgressWithModule>()
        .fetch_all(pool.get_ref())
        .await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[post("/api/training-progress/start_module")]
pub async fn start_module(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    payload: web::Json<StartModuleRequest>,
) -> ApiResult<HttpResponse> {
    let claims = auth::verify_jwt(&req)?;
    let driver = current_driver(pool.get_ref(), &claims)
        .await
        .map_err(|_| ApiError::bad_request("Driver not found"))?;
    let module = find_module(pool.get_ref(), payload.module_id)
        .await
        .map_err(|_| ApiError::bad_request("Modul training tidak ditemukan"))?;

    let existing = find_progress(pool.get_ref(), driver.id_driver, module.id).await?;
    let created = existing.is_none();

    let progress = match existing {
        Some(mut progress) => {
            if progress.total_points == 0 {
                progress.total_points = module_points(pool.get_ref(), module.id).await?;
                sqlx::query("UPDATE driver_training_progress SET total_points = ? WHERE id = ?")
                    .bind(progress.total_points)
                    .bind(progress.id)
                    .execute(pool.get_ref())
                    .await?;
            }
            progress
        }
        None => {
            let total = module_points(pool.get_ref(), module.id).await?;
            sqlx::query(
                r#"
                INSERT INTO driver_training_progress
                (driver_id, module_id, completed_contents, quiz_answers, current_points, total_points)
                VALUES (?, ?, JSON_ARRAY(), JSON_OBJECT(), 0, ?)
                "#,
            )
            .bind(driver.id_driver)
            .bind(module.id)
            .bind(total)
            .execute(pool.get_ref())
            .await?;
            require_progress(pool.get_ref(), driver.id_driver, module.id).await?
        }
    };

    if created {
        log::info!("Driver {} mulai modul {}", driver.id_driver, module.id);
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": if created { "Module started" } else { "Module already started" },
        "progress_id": progress.id,
        "current_points": progress.current_points,
        "total_points": progress.total_points,
        "progress_percentage": progress_percentage(progress.current_points, progress.total_points),
    })))
}

#[post("/api/training-progress/start_module_guest")]
pub async fn start_module_guest(
    pool: web::Data<MySqlPool>,
    payload: web::Json<StartModuleRequest>,
) -> ApiResult<HttpResponse> {
    let module = find_module(pool.get_ref(), payload.module_id)
        .await
        .map_err(|_| ApiError::bad_request("Modul training tidak ditemukan"))?;
    let total = module_points(pool.get_ref(), module.id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Module data loaded",
        "module_id": module.id,
        "current_points": 0,
        "total_points": total,
        "progress_percentage": 0,
    })))
}

#[post("/api/training-progress/complete_content")]
pub async fn complete_content(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    payload: web::Json<CompleteContentRequest>,
) -> ApiResult<HttpResponse> {
    let claims = auth::verify_jwt(&req)?;
    let driver = current_driver(pool.get_ref(), &claims)
        .await
        .map_err(|_| ApiError::bad_request("Driver not found"))?;
    let mut progress = require_progress(pool.get_ref(), driver.id_driver, payload.module_id).await?;

    let content = find_content(pool.get_ref(), payload.content_id)
        .await
        .map_err(|_| ApiError::bad_request("Konten training tidak ditemukan"))?;
    if content.module_id != progress.module_id {
        return Err(ApiError::bad_request("Konten bukan bagian dari modul ini"));
    }

    if mark_completed(&mut progress.completed_contents, content.id) {
        recompute_progress(pool.get_ref(), &mut progress).await?;
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Content marked as completed",
        "current_points": progress.current_points,
        "total_points": progress.total_points,
        "progress_percentage": progress_percentage(progress.current_points, progress.total_points),
        "completed": progress.is_completed,
    })))
}

/// Versi tanpa login (saat registrasi): daftar konten selesai dikirim balik ke klien.
#[post("/api/training-progress/complete_content_guest")]
pub async fn complete_content_guest(
    pool: web::Data<MySqlPool>,
    payload: web::Json<CompleteContentRequest>,
) -> ApiResult<HttpResponse> {
    let payload = payload.into_inner();
    let content = find_content(pool.get_ref(), payload.content_id)
        .await
        .map_err(|_| ApiError::bad_request("Konten training tidak ditemukan"))?;

    let mut completed = payload.completed_contents;
    mark_completed(&mut completed, content.id);

    let contents = module_contents(pool.get_ref(), payload.module_id).await?;
    let quizzes = module_quizzes(pool.get_ref(), payload.module_id).await?;
    let (current, total) = progress_points(&contents, &quizzes, &completed, &HashMap::new());

    Ok(HttpResponse::Ok().json(json!({
        "message": "Content marked as completed",
        "completed_contents": completed,
        "current_points": current,
        "total_points": total,
        "progress_percentage": progress_percentage_exact(current, total),
    })))
}

#[post("/api/training-progress/submit_quiz")]
pub async fn submit_quiz(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    payload: web::Json<SubmitQuizRequest>,
) -> ApiResult<HttpResponse> {
    let claims = auth::verify_jwt(&req)?;
    let driver = current_driver(pool.get_ref(), &claims)
        .await
        .map_err(|_| ApiError::bad_request("Driver not found"))?;
    let payload = payload.into_inner();
    let mut progress = require_progress(pool.get_ref(), driver.id_driver, payload.module_id).await?;

    let quizzes = module_quizzes(pool.get_ref(), payload.module_id).await?;
    let grade = grade_quiz(&quizzes, &payload.answers);

    progress.quiz_answers = Json(payload.answers);
    recompute_progress(pool.get_ref(), &mut progress).await?;

    let percentage = progress_percentage(progress.current_points, progress.total_points);
    if progress.is_completed {
        log::info!("Driver {} menyelesaikan modul {}", driver.id_driver, progress.module_id);
    }

    Ok(HttpResponse::Ok().json(json!({
        "quiz_points": grade.quiz_points,
        "correct_answers": grade.correct_answers,
        "total_questions": grade.total_questions,
        "current_points": progress.current_points,
        "total_points": progress.total_points,
        "progress_percentage": percentage,
        "completed": progress.is_completed,
        "can_continue": percentage >= 100,
    })))
}

#[post("/api/training-progress/submit_quiz_guest")]
pub async fn submit_quiz_guest(
    pool: web::Data<MySqlPool>,
    payload: web::Json<SubmitQuizRequest>,
) -> ApiResult<HttpResponse> {
    let contents = module_contents(pool.get_ref(), payload.module_id).await?;
    let quizzes = module_quizzes(pool.get_ref(), payload.module_id).await?;

    let grade = grade_quiz(&quizzes, &payload.answers);
    let (current, total) =
        progress_points(&contents, &quizzes, &payload.completed_contents, &payload.answers);
    let percentage = progress_percentage_exact(current, total);

    Ok(HttpResponse::Ok().json(json!({
        "quiz_points": grade.quiz_points,
        "correct_answers": grade.correct_answers,
        "total_questions": grade.total_questions,
        "current_points": current,
        "total_points": total,
        "progress_percentage": percentage,
        "completed": percentage >= 100.0,
        "can_continue": percentage >= 100.0,
    })))
}

/// Menutup training driver: setiap modul aktif ditandai selesai lalu status driver
/// naik ke `pending` untuk direview admin.
#[post("/api/training/complete")]
pub async fn complete_training(
    pool: web::Data<MySqlPool>,
    payload: web::Json<CompleteTrainingRequest>,
) -> ApiResult<HttpResponse> {
    let email = payload
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::bad_request("Email harus diisi"))?;

    let driver = db::find_driver_by_email(pool.get_ref(), email)
        .await?
        .ok_or_else(|| ApiError::not_found("Driver not found"))?;

    let mut tx = pool.begin().await?;

    let modules = sqlx::query_as::<_, TrainingModule>(&format!(
        "SELECT {} FROM training_modules WHERE is_active = TRUE",
        MODULE_COLUMNS
    ))
    .fetch_all(&mut *tx)
    .await?;

    if driver.status() == Some(DriverStatus::Training) {
        let now = Utc::now().naive_utc();
        for module in &modules {
            let total = module_points(&mut *tx, module.id).await?;
            sqlx::query(
                r#"
                INSERT INTO driver_training_progress
                (driver_id, module_id, completed_contents, quiz_answers,
                 current_points, total_points, is_completed, completed_at)
                VALUES (?, ?, JSON_ARRAY(), JSON_OBJECT(), ?, ?, TRUE, ?)
                ON DUPLICATE KEY UPDATE
                    current_points = IF(is_completed, current_points, VALUES(total_points)),
                    total_points = IF(is_completed, total_points, VALUES(total_points)),
                    completed_at = IF(is_completed, completed_at, VALUES(completed_at)),
                    is_completed = TRUE
                "#,
            )
            .bind(driver.id_driver)
            .bind(module.id)
            .bind(total)
            .bind(total)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
    }

    let completed = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM driver_training_progress
        WHERE driver_id = ? AND is_completed = TRUE
        "#,
    )
    .bind(driver.id_driver)
    .fetch_one(&mut *tx)
    .await?;
    let total_modules = modules.len() as i64;

    if !training_passed(completed, total_modules) {
        tx.rollback().await?;
        return Ok(HttpResponse::BadRequest().json(json!({
            "error": "Not all training modules completed",
            "completed": completed,
            "total": total_modules,
        })));
    }

    sqlx::query("UPDATE drivers SET status = ? WHERE id_driver = ?")
        .bind(DriverStatus::Pending.as_str())
        .bind(driver.id_driver)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    send_driver_event("training_completed", driver.id_driver);

    Ok(HttpResponse::Ok().json(json!({
        "message": "Training completed successfully",
        "status": DriverStatus::Pending,
    })))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_modules)
        .service(get_module)
        .service(create_module)
        .service(update_module)
        .service(patch_module)
        .service(delete_module)
        .service(list_contents)
        .service(get_content)
        .service(create_content)
        .service(update_content)
        .service(patch_content)
        .service(delete_content)
        .service(list_quizzes)
        .service(get_quiz)
        .service(create_quiz)
        .service(update_quiz)
        .service(patch_quiz)
        .service(delete_quiz)
        .service(list_progress)
        .service(start_module)
        .service(start_module_guest)
        .service(complete_content)
        .service(complete_content_guest)
        .service(submit_quiz)
        .service(submit_quiz_guest)
        .service(complete_training);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choices_are_checked_only_when_present() {
        assert!(check_choice("level", None, &LEVELS).is_ok());
        assert!(check_choice("level", Some("lanjutan"), &LEVELS).is_ok());

        let err = check_choice("correct_answer", Some("E"), &QUIZ_OPTIONS).unwrap_err();
        assert_eq!(err.to_string(), "correct_answer harus salah satu dari: A, B, C, D");
    }
}
