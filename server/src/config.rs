//! Deployment profile for a quiz session and the network layer around it

use clap::ValueEnum;
use std::time::Duration;

/// How answers affect players
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GameMode {
    /// One wrong answer removes a player from later rounds
    Elimination,
    /// Correct answers earn points; nobody is removed
    Scoring,
}

/// What moves a round from answer collection to grading.
///
/// Exactly one policy is active per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AdvancePolicy {
    /// Grade as soon as every connected, alive player has answered
    AllAnswered,
    /// Grade when the per-question timer expires
    Timed,
    /// Grade when someone sends `next`
    Moderator,
}

/// How equal scores are ranked in the final leaderboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RankingStyle {
    /// 1, 1, 3
    Competition,
    /// 1, 1, 2
    Dense,
}

#[derive(Debug, Clone)]
pub struct GameConfig {
    pub mode: GameMode,
    pub advance: AdvancePolicy,
    pub ranking: RankingStyle,
    pub countdown: Duration,
    pub question_time: Duration,
    pub grading_pause: Duration,
    pub session_timeout: Duration,
    /// Zero removes disconnected players immediately
    pub grace_period: Duration,
    pub require_room_code: bool,
    pub shuffle_questions: bool,
    /// Elimination mode only: alive players who stay silent are eliminated at grading
    pub eliminate_unanswered: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            mode: GameMode::Elimination,
            advance: AdvancePolicy::Timed,
            ranking: RankingStyle::Competition,
            countdown: Duration::from_secs(4),
            question_time: Duration::from_secs(10),
            grading_pause: Duration::from_secs(2),
            session_timeout: Duration::from_secs(100),
            grace_period: Duration::from_secs(10),
            require_room_code: false,
            shuffle_questions: false,
            eliminate_unanswered: false,
        }
    }
}

impl GameConfig {
    /// Answer window advertised with each question, if rounds are timed
    pub fn time_limit(&self) -> Option<Duration> {
        match self.advance {
            AdvancePolicy::Timed => Some(self.question_time),
            AdvancePolicy::AllAnswered | AdvancePolicy::Moderator => None,
        }
    }
}

/// Transport settings that the game core never sees
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub address: String,
    pub max_clients: usize,
    /// Connections silent for longer than this are dropped
    pub idle_timeout: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
            max_clients: 64,
            idle_timeout: Duration::from_secs(15),
        }
    }
}
