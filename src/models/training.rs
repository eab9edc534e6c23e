// src/models/training.rs
use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use validator::Validate;

pub const LEVELS: [&str; 3] = ["pemula", "lanjutan", "expert"];
pub const CONTENT_TYPES: [&str; 4] = ["narration", "image", "video", "infographic"];
pub const QUIZ_OPTIONS: [&str; 4] = ["A", "B", "C", "D"];

/// Urutan level untuk tampilan admin; level lain di paling akhir.
pub fn level_order(level: &str) -> u8 {
    match level {
        "pemula" => 1,
        "lanjutan" => 2,
        "expert" => 3,
        _ => 4,
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct TrainingModule {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub level: String,
    pub instructor: String,
    pub thumbnail: Option<String>,
    pub is_active: bool,
    pub order: i32,
    pub created_at: NaiveDateTime,
}

pub const MODULE_COLUMNS: &str =
    "id, title, description, level, instructor, thumbnail, is_active, `order`, created_at";

#[derive(Debug, Deserialize, Validate)]
pub struct TrainingModuleForm {
    #[validate(length(min = 1, max = 200, message = "Judul modul harus diisi"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub level: Option<String>,
    #[validate(length(max = 100))]
    pub instructor: Option<String>,
    pub thumbnail: Option<String>,
    pub is_active: Option<bool>,
    pub order: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct TrainingContent {
    pub id: i64,
    pub module_id: i64,
    pub title: String,
    pub content_type: String,
    pub text_content: Option<String>,
    pub media_content: Option<String>,
    pub youtube_url: Option<String>,
    pub points: i32,
    pub created_at: NaiveDateTime,
}

pub const CONTENT_COLUMNS: &str =
    "id, module_id, title, content_type, text_content, media_content, youtube_url, points, created_at";

/// Konten beserta URL media yang sudah diturunkan untuk client.
#[derive(Debug, Serialize)]
pub struct TrainingContentView {
    #[serde(flatten)]
    pub content: TrainingContent,
    pub media_url: Option<String>,
    pub youtube_embed_url: Option<String>,
    pub youtube_thumbnail: Option<String>,
}

impl From<TrainingContent> for TrainingContentView {
    fn from(content: TrainingContent) -> Self {
        let youtube = content.youtube_url.as_deref().filter(|u| !u.is_empty());
        let media_url = youtube
            .map(str::to_string)
            .or_else(|| content.media_content.clone().filter(|m| !m.is_empty()));
        let youtube_embed_url = youtube.and_then(crate::utils::youtube_embed_url);
        let youtube_thumbnail = youtube.and_then(crate::utils::youtube_thumbnail_url);

        Self {
            content,
            media_url,
            youtube_embed_url,
            youtube_thumbnail,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct TrainingContentForm {
    pub module: Option<i64>,
    #[validate(length(min = 1, max = 200, message = "Judul konten harus diisi"))]
    pub title: Option<String>,
    pub content_type: Option<String>,
    pub text_content: Option<String>,
    pub media_content: Option<String>,
    #[validate(url(message = "URL YouTube tidak valid"))]
    pub youtube_url: Option<String>,
    #[validate(range(min = 0, message = "Poin tidak boleh negatif"))]
    pub points: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct TrainingQuiz {
    pub id: i64,
    pub module_id: i64,
    pub question: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub correct_answer: String,
    pub explanation: Option<String>,
    pub points: i32,
    pub created_at: NaiveDateTime,
}

pub const QUIZ_COLUMNS: &str = "id, module_id, question, option_a, option_b, option_c, option_d, correct_answer, explanation, points, created_at";

#[derive(Debug, Deserialize, Validate)]
pub struct TrainingQuizForm {
    pub module: Option<i64>,
    #[validate(length(min = 1, message = "Pertanyaan harus diisi"))]
    pub question: Option<String>,
    #[validate(length(max = 500))]
    pub option_a: Option<String>,
    #[validate(length(max = 500))]
    pub option_b: Option<String>,
    #[validate(length(max = 500))]
    pub option_c: Option<String>,
    #[validate(length(max = 500))]
    pub option_d: Option<String>,
    pub correct_answer: Option<String>,
    pub explanation: Option<String>,
    #[validate(range(min = 0, message = "Poin tidak boleh negatif"))]
    pub points: Option<i32>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct DriverTrainingProgress {
    pub id: i64,
    pub driver_id: i64,
    pub module_id: i64,
    pub completed_contents: Json<Vec<i64>>,
    pub quiz_answers: Json<HashMap<String, String>>,
    pub current_points: i32,
    pub total_points: i32,
    pub is_completed: bool,
    pub completed_at: Option<NaiveDateTime>,
    pub started_at: NaiveDateTime,
}

pub const PROGRESS_COLUMNS: &str = "id, driver_id, module_id, completed_contents, quiz_answers, current_points, total_points, is_completed, completed_at, started_at";

#[derive(Debug, Serialize, FromRow)]
pub struct ProgressWithModule {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub progress: DriverTrainingProgress,
    pub module_title: String,
}

#[derive(Debug, Deserialize)]
pub struct ModuleFilter {
    pub module_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StartModuleRequest {
    pub module_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CompleteContentRequest {
    pub module_id: i64,
    pub content_id: i64,
    /// Hanya dipakai alur tamu (tanpa progress tersimpan).
    #[serde(default)]
    pub completed_contents: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitQuizRequest {
    pub module_id: i64,
    #[serde(default)]
    pub answers: HashMap<String, String>,
    #[serde(default)]
    pub completed_contents: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteTrainingRequest {
    pub email: Option<String>,
}

// ================= PERHITUNGAN POIN =================

/// Total poin modul: semua konten ditambah semua kuis.
pub fn module_total_points(content_points: &[i32], quiz_points: &[i32]) -> i32 {
    content_points.iter().sum::<i32>() + quiz_points.iter().sum::<i32>()
}

/// Persentase progress dibulatkan ke bawah. Total 0 berarti 0%.
pub fn progress_percentage(current: i32, total: i32) -> i32 {
    if total <= 0 {
        return 0;
    }
    ((current as i64 * 100) / total as i64) as i32
}

/// Versi pecahan untuk alur tamu.
pub fn progress_percentage_exact(current: i32, total: i32) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    current as f64 / total as f64 * 100.0
}

#[derive(Debug, PartialEq, Eq)]
pub struct QuizGrade {
    pub quiz_points: i32,
    pub correct_answers: usize,
    pub total_questions: usize,
}

/// Nilai jawaban kuis. Kunci `answers` adalah id kuis dalam bentuk string.
pub fn grade_quiz(quizzes: &[TrainingQuiz], answers: &HashMap<String, String>) -> QuizGrade {
    let mut grade = QuizGrade {
        quiz_points: 0,
        correct_answers: 0,
        total_questions: quizzes.len(),
    };

    for quiz in quizzes {
        let answered = answers.get(&quiz.id.to_string());
        if answered.map(|a| a.trim()) == Some(quiz.correct_answer.as_str()) {
            grade.correct_answers += 1;
            grade.quiz_points += quiz.points;
        }
    }

    grade
}

/// Poin konten yang sudah diselesaikan, tiap id dihitung sekali.
pub fn completed_content_points(contents: &[TrainingContent], completed: &[i64]) -> i32 {
    contents
        .iter()
        .filter(|c| completed.contains(&c.id))
        .map(|c| c.points)
        .sum()
}

/// `(current, total)` progres modul: poin konten selesai + poin jawaban kuis
/// terakhir, dibatasi total modul.
pub fn progress_points(
    contents: &[TrainingContent],
    quizzes: &[TrainingQuiz],
    completed: &[i64],
    answers: &HashMap<String, String>,
) -> (i32, i32) {
    let content_points: Vec<i32> = contents.iter().map(|c| c.points).collect();
    let quiz_points: Vec<i32> = quizzes.iter().map(|q| q.points).collect();
    let total = module_total_points(&content_points, &quiz_points);
    let earned =
        completed_content_points(contents, completed) + grade_quiz(quizzes, answers).quiz_points;
    (earned.clamp(0, total.max(0)), total)
}

/// Modul selesai begitu persentase mencapai 100; modul tanpa poin tidak pernah selesai.
pub fn reaches_completion(current: i32, total: i32) -> bool {
    progress_percentage(current, total) >= 100
}

/// Training lulus bila jumlah progres selesai menutupi semua modul aktif.
pub fn training_passed(completed_modules: i64, active_modules: i64) -> bool {
    completed_modules >= active_modules
}

/// Tambah id konten ke daftar bila belum ada. `true` bila daftar berubah.
pub fn mark_completed(completed: &mut Vec<i64>, content_id: i64) -> bool {
    if completed.contains(&content_id) {
        false
    } else {
        completed.push(content_id);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn quiz(id: i64, answer: &str, points: i32) -> TrainingQuiz {
        TrainingQuiz {
            id,
            module_id: 1,
            question: format!("Pertanyaan {}", id),
            option_a: "a".into(),
            option_b: "b".into(),
            option_c: "c".into(),
            option_d: "d".into(),
            correct_answer: answer.into(),
            explanation: None,
            points,
            created_at: ts(),
        }
    }

    fn content(id: i64, points: i32) -> TrainingContent {
        TrainingContent {
            id,
            module_id: 1,
            title: format!("Konten {}", id),
            content_type: "narration".into(),
            text_content: Some("teks".into()),
            media_content: None,
            youtube_url: None,
            points,
            created_at: ts(),
        }
    }

    #[test]
    fn progress_points_replace_quiz_score_and_cap_at_total() {
        let contents = vec![content(1, 10), content(2, 10)];
        let quizzes = vec![quiz(7, "A", 20), quiz(8, "B", 20)];

        let mut answers = HashMap::new();
        answers.insert("7".to_string(), "A".to_string());
        assert_eq!(progress_points(&contents, &quizzes, &[1], &answers), (30, 60));

        // jawaban ulang menggantikan skor kuis sebelumnya
        answers.insert("7".to_string(), "C".to_string());
        answers.insert("8".to_string(), "B".to_string());
        assert_eq!(progress_points(&contents, &quizzes, &[1], &answers), (30, 60));

        // id ganda atau id konten modul lain tidak menambah poin
        answers.insert("7".to_string(), "A".to_string());
        let (current, total) = progress_points(&contents, &quizzes, &[1, 2, 2, 99], &answers);
        assert_eq!((current, total), (60, 60));
        assert!(reaches_completion(current, total));
    }

    #[test]
    fn progress_points_never_exceed_total() {
        let contents = vec![content(1, 10), content(2, -5)];
        let (current, total) = progress_points(&contents, &[], &[1], &HashMap::new());
        assert_eq!(total, 5);
        assert_eq!(current, 5);
    }

    #[test]
    fn completion_needs_full_points() {
        assert!(!reaches_completion(59, 60));
        assert!(reaches_completion(60, 60));
        assert!(!reaches_completion(0, 0));
    }

    #[test]
    fn training_gate_counts_active_modules() {
        assert!(!training_passed(2, 3));
        assert!(training_passed(3, 3));
        assert!(training_passed(4, 3));
        assert!(training_passed(0, 0));
    }

    #[test]
    fn total_points_sums_contents_and_quizzes() {
        assert_eq!(module_total_points(&[10, 10, 15], &[20, 20]), 75);
        assert_eq!(module_total_points(&[], &[]), 0);
    }

    #[test]
    fn percentage_truncates_and_handles_zero_total() {
        assert_eq!(progress_percentage(0, 0), 0);
        assert_eq!(progress_percentage(2, 3), 66);
        assert_eq!(progress_percentage(60, 60), 100);
        assert!((progress_percentage_exact(1, 3) - 33.333).abs() < 0.01);
        assert_eq!(progress_percentage_exact(5, 0), 0.0);
    }

    #[test]
    fn quiz_grading_counts_only_correct_answers() {
        let quizzes = vec![quiz(1, "A", 20), quiz(2, "C", 20), quiz(3, "B", 30)];
        let answers: HashMap<String, String> = [("1", "A"), ("2", "D"), ("3", "B")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let grade = grade_quiz(&quizzes, &answers);
        assert_eq!(
            grade,
            QuizGrade {
                quiz_points: 50,
                correct_answers: 2,
                total_questions: 3
            }
        );
    }

    #[test]
    fn unanswered_quiz_scores_nothing() {
        let quizzes = vec![quiz(9, "D", 20)];
        let grade = grade_quiz(&quizzes, &HashMap::new());
        assert_eq!(grade.quiz_points, 0);
        assert_eq!(grade.total_questions, 1);
    }

    #[test]
    fn content_points_count_each_content_once() {
        let contents = vec![content(1, 10), content(2, 15), content(3, 5)];
        assert_eq!(completed_content_points(&contents, &[1, 3]), 15);
        assert_eq!(completed_content_points(&contents, &[1, 1, 99]), 10);
    }

    #[test]
    fn marking_completed_is_idempotent() {
        let mut done = vec![1];
        assert!(mark_completed(&mut done, 2));
        assert!(!mark_completed(&mut done, 2));
        assert_eq!(done, vec![1, 2]);
    }

    #[test]
    fn content_view_prefers_youtube() {
        let mut c = content(1, 10);
        c.youtube_url = Some("https://www.youtube.com/watch?v=abc123".into());
        c.media_content = Some("https://cdn.example.com/a.png".into());
        let view = TrainingContentView::from(c);
        assert_eq!(
            view.media_url.as_deref(),
            Some("https://www.youtube.com/watch?v=abc123")
        );
        assert_eq!(
            view.youtube_embed_url.as_deref(),
            Some("https://www.youtube.com/embed/abc123")
        );

        let mut c = content(2, 10);
        c.media_content = Some("https://cdn.example.com/a.png".into());
        let view = TrainingContentView::from(c);
        assert_eq!(view.media_url.as_deref(), Some("https://cdn.example.com/a.png"));
        assert!(view.youtube_thumbnail.is_none());
    }

    #[test]
    fn levels_sort_in_curriculum_order() {
        let mut levels = vec!["expert", "lain", "pemula", "lanjutan"];
        levels.sort_by_key(|l| level_order(l));
        assert_eq!(levels, vec!["pemula", "lanjutan", "expert", "lain"]);
    }
}
