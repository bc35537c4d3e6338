//! Typed failures: request rejections, ignored answers and bad question banks

use std::path::PathBuf;
use thiserror::Error;

/// A request refused by validation. Reported to the sender only, never fatal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("game already started")]
    GameInProgress,
    #[error("room code does not match")]
    WrongRoomCode,
    #[error("room code required")]
    RoomCodeRequired,
    #[error("nickname must not be empty")]
    EmptyNickname,
    #[error("nickname longer than {max} characters")]
    NicknameTooLong { max: usize },
    #[error("no players have joined")]
    NoPlayers,
    #[error("manual advance is disabled")]
    ManualAdvanceDisabled,
    #[error("no question is in progress")]
    NoActiveQuestion,
}

/// Why an answer submission was dropped without any state change
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Ignored {
    #[error("connection has not joined")]
    UnknownPlayer,
    #[error("player is eliminated")]
    Eliminated,
    #[error("player already answered this round")]
    AlreadyAnswered,
    #[error("no round is collecting answers")]
    NotCollecting,
}

/// The question bank could not be turned into a playable session
#[derive(Debug, Error)]
pub enum QuestionBankError {
    #[error("failed to read question bank {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed question bank: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("question bank is empty")]
    Empty,
    #[error("question {index} has {count} choices, at least 2 are required")]
    TooFewChoices { index: usize, count: usize },
    #[error("question {index}: answer index {answer} is out of range for {count} choices")]
    AnswerOutOfRange {
        index: usize,
        answer: usize,
        count: usize,
    },
    #[error("question {index}: answer {answer:?} matches none of the choices")]
    UnknownAnswer { index: usize, answer: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_reasons_are_readable() {
        assert_eq!(Rejection::GameInProgress.to_string(), "game already started");
        assert_eq!(
            Rejection::NicknameTooLong { max: 24 }.to_string(),
            "nickname longer than 24 characters"
        );
    }

    #[test]
    fn test_bank_error_mentions_question() {
        let err = QuestionBankError::AnswerOutOfRange {
            index: 3,
            answer: 5,
            count: 4,
        };
        assert!(err.to_string().contains("question 3"));
    }
}
