use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::common::server_error::{REQUIRED_FIELDS_MSG, ServerError};

pub const MIN_QUESTIONS: u8 = 1;
pub const MAX_QUESTIONS: u8 = 10;

/// Wire shape shared by the generate endpoint, persistence and the terminal client.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
}

pub type Quiz = Vec<QuizQuestion>;

/// Validated input for a generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizRequest {
    pub topic: String,
    pub question_count: u8,
}

/// Raw request body. Fields stay optional so a missing field maps to
/// the 400 message rather than an extractor rejection.
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuizRequest {
    pub topic: Option<String>,
    pub num_questions: Option<NumQuestions>,
}

/// Number inputs in browsers submit strings, so both forms are accepted.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum NumQuestions {
    Number(i64),
    Text(String),
}

impl NumQuestions {
    fn as_count(&self) -> Option<i64> {
        match self {
            NumQuestions::Number(n) => Some(*n),
            NumQuestions::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl QuizRequest {
    pub fn new(topic: impl Into<String>, question_count: u8) -> Result<Self, ServerError> {
        let topic = topic.into();
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ServerError::Validation(REQUIRED_FIELDS_MSG.into()));
        }

        if !(MIN_QUESTIONS..=MAX_QUESTIONS).contains(&question_count) {
            return Err(ServerError::Validation(format!(
                "numQuestions must be between {} and {}",
                MIN_QUESTIONS, MAX_QUESTIONS
            )));
        }

        Ok(Self {
            topic: topic.to_string(),
            question_count,
        })
    }
}

impl TryFrom<GenerateQuizRequest> for QuizRequest {
    type Error = ServerError;

    fn try_from(body: GenerateQuizRequest) -> Result<Self, Self::Error> {
        let topic = body.topic.filter(|t| !t.trim().is_empty());
        let count = body
            .num_questions
            .as_ref()
            .and_then(NumQuestions::as_count)
            .filter(|n| *n != 0);

        let (Some(topic), Some(count)) = (topic, count) else {
            return Err(ServerError::Validation(REQUIRED_FIELDS_MSG.into()));
        };

        let count = u8::try_from(count).unwrap_or(u8::MAX);
        QuizRequest::new(topic, count)
    }
}

impl QuizQuestion {
    /// Checks the invariants a renderable question needs and repairs an answer
    /// that only differs from one option by whitespace or case.
    pub fn validated(mut self, index: usize) -> Result<Self, String> {
        if self.question.trim().is_empty() {
            return Err(format!("question {} has no text", index));
        }

        if self.options.len() < 2 {
            return Err(format!(
                "question {} has {} options, need at least 2",
                index,
                self.options.len()
            ));
        }

        let mut seen = HashSet::new();
        for option in &self.options {
            if option.trim().is_empty() {
                return Err(format!("question {} has a blank option", index));
            }
            if !seen.insert(option.as_str()) {
                return Err(format!("question {} repeats option '{}'", index, option));
            }
        }

        if self.options.contains(&self.answer) {
            return Ok(self);
        }

        let wanted = self.answer.trim().to_lowercase();
        let mut candidates = self
            .options
            .iter()
            .filter(|o| o.trim().to_lowercase() == wanted);

        match (candidates.next(), candidates.next()) {
            (Some(option), None) => {
                self.answer = option.clone();
                Ok(self)
            }
            _ => Err(format!(
                "question {} answer '{}' is not one of its options",
                index, self.answer
            )),
        }
    }

    pub fn is_correct(&self, option: &str) -> bool {
        self.answer == option
    }
}
