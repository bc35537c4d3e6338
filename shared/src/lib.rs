use serde::{Deserialize, Serialize};

pub mod framing;

/// Version a client must announce in `Packet::Connect`.
pub const PROTOCOL_VERSION: u32 = 1;
pub const ROOM_CODE_LEN: usize = 4;
pub const MAX_NICKNAME_LEN: usize = 24;

/// Server-assigned identity of one participant connection.
pub type ClientId = u32;

/// Handed out on connect; presenting it again lets a dropped client resume
/// the same identity (and ledger entry) within the grace period.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResumeToken {
    pub client_id: ClientId,
    pub secret: u64,
}

/// A question as participants see it. The correct answer never leaves the server.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct QuestionView {
    /// 1-based position in the session
    pub number: usize,
    pub total: usize,
    pub prompt: String,
    pub choices: Vec<String>,
    /// Answer window in milliseconds, present only for timed rounds
    pub time_limit_ms: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlayerScore {
    pub nickname: String,
    pub score: u32,
    pub eliminated: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RankedEntry {
    pub rank: u32,
    pub nickname: String,
    pub score: u32,
}

/// Outcome of an elimination game.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Winners {
    Single(String),
    /// Several players survived; listed in join order
    Multiple(Vec<String>),
    /// Nobody was eliminated during the whole session
    AllSurvived,
    NoWinner,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Packet {
    // Client -> server
    Connect {
        client_version: u32,
        resume: Option<ResumeToken>,
    },
    Heartbeat,
    Disconnect,
    GetCode,
    VerifyCode {
        code: String,
    },
    Join {
        nickname: String,
        room_code: Option<String>,
    },
    GetPlayerList,
    Start,
    Answer {
        choice: usize,
        score_delta: Option<u32>,
    },
    Next,
    ResetGame,

    // Server -> client
    Connected {
        client_id: ClientId,
        resume_token: ResumeToken,
    },
    Disconnected {
        reason: String,
    },
    Code {
        room_code: String,
    },
    CodeVerified {
        valid: bool,
    },
    PlayerList {
        nicknames: Vec<String>,
    },
    Reject {
        reason: String,
    },
    StartGame {
        countdown_ms: u64,
    },
    Question(QuestionView),
    AnswerResult {
        correct: bool,
    },
    Eliminated,
    PlayerUpdate {
        players: Vec<PlayerScore>,
    },
    Winner(Winners),
    FinalResult {
        standings: Vec<RankedEntry>,
    },
    GameReset,
    Rejoined {
        nickname: String,
        score: u32,
        eliminated: bool,
    },
}

impl Packet {
    /// True for packets only a client is expected to send
    pub fn is_from_client(&self) -> bool {
        matches!(
            self,
            Packet::Connect { .. }
                | Packet::Heartbeat
                | Packet::Disconnect
                | Packet::GetCode
                | Packet::VerifyCode { .. }
                | Packet::Join { .. }
                | Packet::GetPlayerList
                | Packet::Start
                | Packet::Answer { .. }
                | Packet::Next
                | Packet::ResetGame
        )
    }
}

/// Canonical form used for both generated and submitted room codes.
pub fn normalize_room_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}
