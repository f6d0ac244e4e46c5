//! Quiz mini-game state. Holds at most one open question; the dispatcher
//! decides whether opening one is legal, this module only enforces the
//! open/answer lifecycle.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    pub difficulty: u8,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub points: u16,
}

#[derive(thiserror::Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuizError {
    #[error("no question is open")]
    NoActiveQuestion,
    #[error("an answer is already being submitted")]
    AnswerInFlight,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuizState {
    pub question: Option<Question>,
    pub selected: usize,
    /// Set between submit and resolve so a second submit is refused
    /// instead of raced.
    pub submitting: bool,
    /// True while the fetch task is out.
    pub loading: bool,
}

impl QuizState {
    /// Opening a new question discards any prior unanswered one.
    pub fn open(&mut self, question: Question) {
        self.question = Some(question);
        self.selected = 0;
        self.submitting = false;
        self.loading = false;
    }

    pub fn is_open(&self) -> bool {
        self.question.is_some()
    }

    pub fn select(&mut self, index: usize) {
        if let Some(question) = &self.question {
            if index < question.options.len() {
                self.selected = index;
            }
        }
    }

    /// Mark the current question as being submitted and return the pair
    /// the request needs. Fails if nothing is open or a submit is out.
    pub fn begin_submit(&mut self) -> Result<(String, usize), QuizError> {
        let question = self.question.as_ref().ok_or(QuizError::NoActiveQuestion)?;
        if self.submitting {
            return Err(QuizError::AnswerInFlight);
        }
        self.submitting = true;
        Ok((question.id.clone(), self.selected))
    }

    /// Close the question, win or lose. Returns it for narration.
    pub fn close(&mut self) -> Option<Question> {
        self.submitting = false;
        self.loading = false;
        self.question.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str) -> Question {
        Question {
            id: id.to_string(),
            text: "What is 2 + 2?".into(),
            options: vec!["3".into(), "4".into(), "5".into()],
            correct_answer: 1,
            difficulty: 1,
            category: "math".into(),
            points: 10,
        }
    }

    #[test]
    fn answer_without_question_is_rejected() {
        let mut quiz = QuizState::default();
        assert_eq!(quiz.begin_submit(), Err(QuizError::NoActiveQuestion));
    }

    #[test]
    fn second_submit_is_rejected_until_close() {
        let mut quiz = QuizState::default();
        quiz.open(question("q1"));
        quiz.select(1);
        assert_eq!(quiz.begin_submit(), Ok(("q1".to_string(), 1)));
        assert_eq!(quiz.begin_submit(), Err(QuizError::AnswerInFlight));

        quiz.close();
        assert_eq!(quiz.begin_submit(), Err(QuizError::NoActiveQuestion));
    }

    #[test]
    fn opening_replaces_prior_question() {
        let mut quiz = QuizState::default();
        quiz.open(question("q1"));
        quiz.select(2);
        quiz.open(question("q2"));
        assert_eq!(quiz.question.as_ref().unwrap().id, "q2");
        assert_eq!(quiz.selected, 0);
        assert!(!quiz.submitting);
    }

    #[test]
    fn select_ignores_out_of_range() {
        let mut quiz = QuizState::default();
        quiz.open(question("q1"));
        quiz.select(7);
        assert_eq!(quiz.selected, 0);
    }
}
