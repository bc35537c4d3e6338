//! Question bank loading and validation
//!
//! The bank is a JSON array of `{question, choices, answer}` objects read once
//! at startup. `answer` is either the index of the correct choice or the text
//! of that choice; both are resolved to an index here so the rest of the
//! server only ever compares indices.

use crate::error::QuestionBankError;
use log::info;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use shared::QuestionView;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub text: String,
    pub choices: Vec<String>,
    pub correct_index: usize,
}

impl Question {
    pub fn is_correct(&self, choice: usize) -> bool {
        choice == self.correct_index
    }

    /// Participant-facing form of the question
    pub fn view(&self, number: usize, total: usize, time_limit_ms: Option<u64>) -> QuestionView {
        QuestionView {
            number,
            total,
            prompt: self.text.clone(),
            choices: self.choices.clone(),
            time_limit_ms,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    question: String,
    choices: Vec<String>,
    answer: AnswerKey,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AnswerKey {
    Index(usize),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    /// Reads and validates a bank from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, QuestionBankError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| QuestionBankError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let bank = Self::from_json(&contents)?;
        info!("Loaded {} questions from {}", bank.len(), path.display());
        Ok(bank)
    }

    pub fn from_json(json: &str) -> Result<Self, QuestionBankError> {
        let raw: Vec<RawQuestion> = serde_json::from_str(json)?;
        let questions = raw
            .into_iter()
            .enumerate()
            .map(|(index, raw)| resolve(index, raw))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(questions)
    }

    pub fn new(questions: Vec<Question>) -> Result<Self, QuestionBankError> {
        if questions.is_empty() {
            return Err(QuestionBankError::Empty);
        }
        for (index, q) in questions.iter().enumerate() {
            if q.choices.len() < 2 {
                return Err(QuestionBankError::TooFewChoices {
                    index,
                    count: q.choices.len(),
                });
            }
            if q.correct_index >= q.choices.len() {
                return Err(QuestionBankError::AnswerOutOfRange {
                    index,
                    answer: q.correct_index,
                    count: q.choices.len(),
                });
            }
        }
        Ok(Self { questions })
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// The question list for one session, in file order or freshly shuffled
    pub fn session_order<R: Rng + ?Sized>(&self, shuffle: bool, rng: &mut R) -> Vec<Question> {
        let mut questions = self.questions.clone();
        if shuffle {
            questions.shuffle(rng);
        }
        questions
    }
}

fn resolve(index: usize, raw: RawQuestion) -> Result<Question, QuestionBankError> {
    let correct_index = match raw.answer {
        AnswerKey::Index(i) => i,
        AnswerKey::Text(text) => raw
            .choices
            .iter()
            .position(|choice| choice.trim() == text.trim())
            .ok_or(QuestionBankError::UnknownAnswer {
                index,
                answer: text,
            })?,
    };

    Ok(Question {
        text: raw.question,
        choices: raw.choices,
        correct_index,
    })
}
