//! Session registry: owns the one live game session
//!
//! A session is never patched back to defaults. Reset builds a brand new
//! `Session` with a new room code and a higher epoch, so nothing from the
//! previous game (players, answers, pending timers) can leak into the next.

use crate::ledger::PlayerLedger;
use crate::questions::{Question, QuestionBank};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{normalize_room_code, ClientId, ROOM_CODE_LEN};

const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Lobby,
    Countdown,
    AwaitingAnswers,
    Grading,
    Finished,
}

#[derive(Debug)]
pub struct Session {
    pub room_code: String,
    pub phase: Phase,
    pub current_question_index: usize,
    pub questions: Vec<Question>,
    pub players: PlayerLedger,
    /// Generation counter; bumped on every reset and captured by every timer
    pub epoch: u64,
}

impl Session {
    fn new(room_code: String, questions: Vec<Question>, epoch: u64) -> Self {
        Self {
            room_code,
            phase: Phase::Lobby,
            current_question_index: 0,
            questions,
            players: PlayerLedger::new(),
            epoch,
        }
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_question_index)
    }

    pub fn is_last_question(&self) -> bool {
        self.current_question_index + 1 >= self.questions.len()
    }

    pub fn verify_code(&self, candidate: &str) -> bool {
        normalize_room_code(candidate) == self.room_code
    }

    /// Connections whose answer has been graded in the current round
    pub fn answered_set(&self) -> Vec<ClientId> {
        self.players.answered_ids()
    }
}

/// Uniformly random code over `A-Z0-9`, already in canonical (uppercase) form
pub fn generate_room_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

pub struct SessionRegistry {
    bank: QuestionBank,
    shuffle: bool,
    rng: StdRng,
    session: Session,
}

impl SessionRegistry {
    pub fn new(bank: QuestionBank, shuffle: bool) -> Self {
        Self::with_rng(bank, shuffle, StdRng::from_entropy())
    }

    /// Deterministic registry for tests
    pub fn with_seed(bank: QuestionBank, shuffle: bool, seed: u64) -> Self {
        Self::with_rng(bank, shuffle, StdRng::seed_from_u64(seed))
    }

    fn with_rng(bank: QuestionBank, shuffle: bool, mut rng: StdRng) -> Self {
        let session = Self::create_session(&bank, shuffle, &mut rng, 0);
        Self {
            bank,
            shuffle,
            rng,
            session,
        }
    }

    fn create_session(bank: &QuestionBank, shuffle: bool, rng: &mut StdRng, epoch: u64) -> Session {
        let room_code = generate_room_code(rng);
        let questions = bank.session_order(shuffle, rng);
        info!(
            "Created session {} with room code {} ({} questions)",
            epoch,
            room_code,
            questions.len()
        );
        Session::new(room_code, questions, epoch)
    }

    /// Replaces the live session with a fresh lobby and returns the discarded one
    pub fn reset_session(&mut self) -> Session {
        let epoch = self.session.epoch + 1;
        let fresh = Self::create_session(&self.bank, self.shuffle, &mut self.rng, epoch);
        std::mem::replace(&mut self.session, fresh)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}
