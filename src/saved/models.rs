use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

use crate::quiz::models::Quiz;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SavedQuizRecord {
    pub id: Uuid,
    pub topic: String,
    pub num_questions: i32,
    pub date: DateTime<Utc>,
    pub quiz: Quiz,
}

#[derive(Debug, sqlx::FromRow)]
pub struct SavedQuizRow {
    pub id: Uuid,
    pub topic: String,
    pub num_questions: i32,
    pub date: DateTime<Utc>,
    pub quiz: Json<Quiz>,
}

impl From<SavedQuizRow> for SavedQuizRecord {
    fn from(row: SavedQuizRow) -> Self {
        Self {
            id: row.id,
            topic: row.topic,
            num_questions: row.num_questions,
            date: row.date,
            quiz: row.quiz.0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveQuizRequest {
    pub topic: String,
    pub quiz: Quiz,
}
