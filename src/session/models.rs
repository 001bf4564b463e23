use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::quiz::models::{MAX_QUESTIONS, MIN_QUESTIONS, Quiz, QuizQuestion};

pub static INVALID_INPUT_MSG: &str = "Please enter a valid topic and question count (1-10).";
pub static GENERATION_FAILED_MSG: &str = "Could not generate quiz. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionStyle {
    Neutral,
    Correct,
    Incorrect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Recorded { correct: bool },
    Ignored,
}

/// One quiz being played: the questions plus the first answer given to each.
#[derive(Debug, Clone)]
pub struct QuizSession {
    quiz: Quiz,
    answers: BTreeMap<usize, String>,
}

impl QuizSession {
    pub fn new(quiz: Quiz) -> Self {
        Self {
            quiz,
            answers: BTreeMap::new(),
        }
    }

    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    pub fn question(&self, index: usize) -> Option<&QuizQuestion> {
        self.quiz.get(index)
    }

    /// The first selection for a question is final; later ones are ignored.
    pub fn select(&mut self, index: usize, option: &str) -> Selection {
        let Some(question) = self.quiz.get(index) else {
            return Selection::Ignored;
        };

        if self.answers.contains_key(&index) || !question.options.iter().any(|o| o == option) {
            debug!("Ignoring selection '{}' for question {}", option, index);
            return Selection::Ignored;
        }

        let correct = question.is_correct(option);
        self.answers.insert(index, option.to_string());
        Selection::Recorded { correct }
    }

    pub fn answer(&self, index: usize) -> Option<&str> {
        self.answers.get(&index).map(String::as_str)
    }

    pub fn score(&self) -> usize {
        self.answers
            .iter()
            .filter(|(index, selected)| {
                self.quiz
                    .get(**index)
                    .is_some_and(|q| q.is_correct(selected))
            })
            .count()
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    pub fn remaining(&self) -> usize {
        self.quiz.len() - self.answers.len()
    }

    pub fn is_complete(&self) -> bool {
        !self.quiz.is_empty() && self.answers.len() == self.quiz.len()
    }

    pub fn option_style(&self, index: usize, option: &str) -> OptionStyle {
        let (Some(question), Some(selected)) = (self.quiz.get(index), self.answers.get(&index))
        else {
            return OptionStyle::Neutral;
        };

        if question.is_correct(option) {
            OptionStyle::Correct
        } else if selected == option {
            OptionStyle::Incorrect
        } else {
            OptionStyle::Neutral
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket(u64);

#[derive(Debug, Clone)]
pub enum Phase {
    Idle,
    Loading,
    Loaded(QuizSession),
    Failed(String),
}

/// Client-side generation state. Only the most recently started request may
/// resolve it; results of superseded requests are dropped.
#[derive(Debug)]
pub struct QuizBoard {
    phase: Phase,
    latest: u64,
}

impl QuizBoard {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            latest: 0,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn session_mut(&mut self) -> Option<&mut QuizSession> {
        match &mut self.phase {
            Phase::Loaded(session) => Some(session),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, Phase::Loading)
    }

    /// Starts a generation. Invalid input fails immediately and returns no ticket.
    pub fn begin(&mut self, topic: &str, count: i64) -> Option<RequestTicket> {
        let in_range = (MIN_QUESTIONS as i64..=MAX_QUESTIONS as i64).contains(&count);
        if topic.trim().is_empty() || !in_range {
            self.phase = Phase::Failed(INVALID_INPUT_MSG.into());
            return None;
        }

        self.latest += 1;
        self.phase = Phase::Loading;
        Some(RequestTicket(self.latest))
    }

    /// Applies a finished request. Returns false when the ticket was superseded.
    pub fn resolve<E>(&mut self, ticket: RequestTicket, result: Result<Quiz, E>) -> bool {
        if ticket.0 != self.latest {
            warn!(
                "Dropping result of request {} superseded by {}",
                ticket.0, self.latest
            );
            return false;
        }

        self.phase = match result {
            Ok(quiz) if !quiz.is_empty() => Phase::Loaded(QuizSession::new(quiz)),
            _ => Phase::Failed(GENERATION_FAILED_MSG.into()),
        };
        true
    }
}
