use sqlx::{Pool, Postgres, types::Json};
use uuid::Uuid;

use crate::{
    quiz::models::Quiz,
    saved::models::{SavedQuizRecord, SavedQuizRow},
};

pub static NOTIFY_CHANNEL: &str = "saved_quiz";

pub async fn insert_saved_quiz(
    pool: &Pool<Postgres>,
    user_id: &Uuid,
    topic: &str,
    quiz: &Quiz,
) -> Result<SavedQuizRecord, sqlx::Error> {
    let row = sqlx::query_as::<_, SavedQuizRow>(
        r#"
        INSERT INTO "saved_quiz" (user_id, topic, num_questions, quiz)
        VALUES ($1, $2, $3, $4)
        RETURNING id, topic, num_questions, date, quiz
        "#,
    )
    .bind(user_id)
    .bind(topic)
    .bind(quiz.len() as i32)
    .bind(Json(quiz))
    .fetch_one(pool)
    .await?;

    Ok(row.into())
}

pub async fn list_saved_quizzes(
    pool: &Pool<Postgres>,
    user_id: &Uuid,
) -> Result<Vec<SavedQuizRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, SavedQuizRow>(
        r#"
        SELECT id, topic, num_questions, date, quiz
        FROM "saved_quiz"
        WHERE user_id = $1
        ORDER BY date DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(SavedQuizRecord::from).collect())
}

pub async fn health_check(pool: &Pool<Postgres>) -> Result<(), sqlx::Error> {
    let _ = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await?;
    Ok(())
}
