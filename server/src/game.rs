//! Round coordinator: the session state machine
//!
//! ```text
//! Lobby -> Countdown -> AwaitingAnswers -> Grading -> AwaitingAnswers | Finished
//! ```
//!
//! The coordinator is synchronous and transport-agnostic. Each inbound
//! `Command` or fired timer runs to completion and yields a list of
//! `Effect`s (messages to deliver, timers to start or cancel) that the
//! network layer carries out. Handlers are total: every command ends in a
//! state change with emissions, a silent ignore, or a `Reject` to the sender.

use crate::config::{AdvancePolicy, GameConfig, GameMode};
use crate::error::{Ignored, Rejection};
use crate::ledger::{JoinAck, JoinPolicy};
use crate::questions::QuestionBank;
use crate::results::{elimination_winners, ranked_standings};
use crate::session::{Phase, Session, SessionRegistry};
use crate::timers::{TimerKey, TimerKind};
use log::{debug, info, warn};
use shared::{ClientId, Packet};
use std::time::Duration;

/// Inbound control events, one variant per client request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    GetCode,
    VerifyCode { code: String },
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
    Reset,
    /// The connection went away
    Disconnect,
    /// A dropped connection came back with its resume token
    Reconnect,
}

impl Command {
    /// Maps a client packet to a command. Transport-level packets map to `None`.
    pub fn from_packet(packet: Packet) -> Option<Self> {
        match packet {
            Packet::GetCode => Some(Command::GetCode),
            Packet::VerifyCode { code } => Some(Command::VerifyCode { code }),
            Packet::Join {
                nickname,
                room_code,
            } => Some(Command::Join {
                nickname,
                room_code,
            }),
            Packet::GetPlayerList => Some(Command::GetPlayerList),
            Packet::Start => Some(Command::Start),
            Packet::Answer {
                choice,
                score_delta,
            } => Some(Command::Answer {
                choice,
                score_delta,
            }),
            Packet::Next => Some(Command::Next),
            Packet::ResetGame => Some(Command::Reset),
            _ => None,
        }
    }
}

/// Work for the network layer produced by one coordinator step
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Send { to: ClientId, packet: Packet },
    Broadcast(Packet),
    Schedule { key: TimerKey, after: Duration },
    Cancel(TimerKey),
    CancelAll,
    /// The connection no longer owns a ledger entry; its resume token can go
    Release(ClientId),
}

pub struct RoundCoordinator {
    config: GameConfig,
    registry: SessionRegistry,
    effects: Vec<Effect>,
}

impl RoundCoordinator {
    pub fn new(config: GameConfig, bank: QuestionBank) -> Self {
        let registry = SessionRegistry::new(bank, config.shuffle_questions);
        Self::with_registry(config, registry)
    }

    pub fn with_registry(config: GameConfig, registry: SessionRegistry) -> Self {
        Self {
            config,
            registry,
            effects: Vec::new(),
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        self.registry.session()
    }

    /// Processes one inbound command from `from`
    pub fn handle(&mut self, from: ClientId, command: Command) -> Vec<Effect> {
        match command {
            Command::GetCode => {
                let room_code = self.session().room_code.clone();
                self.send(from, Packet::Code { room_code });
            }
            Command::VerifyCode { code } => {
                let valid = self.session().verify_code(&code);
                self.send(from, Packet::CodeVerified { valid });
            }
            Command::Join {
                nickname,
                room_code,
            } => self.join(from, &nickname, room_code.as_deref()),
            Command::GetPlayerList => {
                let nicknames = self.session().players.roster();
                self.send(from, Packet::PlayerList { nicknames });
            }
            Command::Start => self.start(from),
            Command::Answer {
                choice,
                score_delta,
            } => self.answer(from, choice, score_delta),
            Command::Next => self.next(from),
            Command::Reset => self.reset(),
            Command::Disconnect => self.disconnect(from),
            Command::Reconnect => self.reconnect(from),
        }
        std::mem::take(&mut self.effects)
    }

    /// Processes a fired timer. Timers whose phase, round or epoch has moved on are dropped.
    pub fn on_timer(&mut self, key: TimerKey) -> Vec<Effect> {
        if key.epoch != self.session().epoch {
            debug!("Dropping {:?} from a previous session", key);
            return Vec::new();
        }

        let phase = self.session().phase;
        let index = self.session().current_question_index;
        match key.kind {
            TimerKind::Countdown if phase == Phase::Countdown => {
                self.schedule(TimerKind::SessionTimeout, self.config.session_timeout);
                self.begin_question(0);
            }
            TimerKind::QuestionTimeout { round }
                if phase == Phase::AwaitingAnswers && round == index =>
            {
                info!("Time is up for question {}", round + 1);
                self.grade();
            }
            TimerKind::GradingPause { round } if phase == Phase::Grading && round == index => {
                self.begin_question(round + 1);
            }
            TimerKind::SessionTimeout
                if matches!(phase, Phase::AwaitingAnswers | Phase::Grading) =>
            {
                warn!("Session timeout reached, ending the game");
                if phase == Phase::AwaitingAnswers {
                    self.settle_round();
                }
                self.finish();
            }
            TimerKind::Grace {
                connection_id,
                serial,
            } if self.session().players.is_pending_removal(connection_id, serial) => {
                self.drop_player(connection_id);
            }
            _ => debug!("Ignoring stale {:?} in phase {:?}", key, phase),
        }
        std::mem::take(&mut self.effects)
    }

    fn join(&mut self, from: ClientId, nickname: &str, room_code: Option<&str>) {
        // A join from a disconnected entry resumes it, so its grace timer goes
        self.cancel_grace(from);

        let code_required = self.config.require_room_code;
        let session = self.registry.session_mut();
        let policy = JoinPolicy {
            lobby_open: session.phase == Phase::Lobby,
            room_code: &session.room_code,
            code_required,
        };

        match session.players.join(from, nickname, room_code, policy) {
            Ok(JoinAck::Joined) => self.broadcast_roster(),
            Ok(JoinAck::Rejoined) => {
                self.catch_up(from);
                self.broadcast_roster();
            }
            Err(rejection) => {
                info!("Rejected join from {}: {}", from, rejection);
                self.reject(from, rejection);
            }
        }
    }

    fn start(&mut self, from: ClientId) {
        let session = self.registry.session_mut();
        if session.phase != Phase::Lobby {
            debug!("Start from {} ignored, game already started", from);
            return;
        }
        if session.players.is_empty() {
            self.reject(from, Rejection::NoPlayers);
            return;
        }

        session.phase = Phase::Countdown;
        info!(
            "Game starting with {} players, first question in {:?}",
            session.players.len(),
            self.config.countdown
        );
        self.broadcast(Packet::StartGame {
            countdown_ms: self.config.countdown.as_millis() as u64,
        });
        self.schedule(TimerKind::Countdown, self.config.countdown);
    }

    fn answer(&mut self, from: ClientId, choice: usize, score_delta: Option<u32>) {
        let mode = self.config.mode;
        let session = self.registry.session_mut();

        let result = match session.phase {
            Phase::AwaitingAnswers => match session.questions.get(session.current_question_index) {
                Some(question) => {
                    session
                        .players
                        .record_answer(from, choice, score_delta, question, mode)
                }
                None => Err(Ignored::NotCollecting),
            },
            _ => Err(Ignored::NotCollecting),
        };

        match result {
            Ok(verdict) => {
                self.send(
                    from,
                    Packet::AnswerResult {
                        correct: verdict.correct,
                    },
                );
                if verdict.eliminated {
                    self.send(from, Packet::Eliminated);
                }
                self.advance_if_everyone_answered();
            }
            Err(reason) => debug!("Answer from {} ignored: {}", from, reason),
        }
    }

    fn next(&mut self, from: ClientId) {
        if self.config.advance != AdvancePolicy::Moderator {
            self.reject(from, Rejection::ManualAdvanceDisabled);
            return;
        }
        if self.session().phase != Phase::AwaitingAnswers {
            self.reject(from, Rejection::NoActiveQuestion);
            return;
        }
        info!("Moderator {} advanced the round", from);
        self.grade();
    }

    fn reset(&mut self) {
        let previous = self.registry.reset_session();
        self.effects.push(Effect::CancelAll);
        for player in previous.players.iter().filter(|p| !p.is_connected()) {
            self.effects.push(Effect::Release(player.connection_id));
        }

        let room_code = self.session().room_code.clone();
        info!("Game reset, new room code {}", room_code);
        self.broadcast(Packet::GameReset);
        self.broadcast(Packet::Code { room_code });
    }

    fn disconnect(&mut self, from: ClientId) {
        if !self.session().players.contains(from) {
            self.effects.push(Effect::Release(from));
            return;
        }

        if self.config.grace_period.is_zero() {
            self.drop_player(from);
        } else if let Some(serial) = self.registry.session_mut().players.mark_disconnected(from) {
            info!(
                "Player {} disconnected, holding their place for {:?}",
                from, self.config.grace_period
            );
            self.schedule(
                TimerKind::Grace {
                    connection_id: from,
                    serial,
                },
                self.config.grace_period,
            );
        }

        self.advance_if_everyone_answered();
    }

    fn reconnect(&mut self, from: ClientId) {
        if !self.session().players.contains(from) {
            debug!("Connection {} resumed without a ledger entry", from);
            return;
        }
        self.cancel_grace(from);
        self.registry.session_mut().players.reconnect(from);
        info!("Player {} reconnected", from);
        self.catch_up(from);
    }

    /// Removes a player for good and tells everyone
    fn drop_player(&mut self, id: ClientId) {
        if self.registry.session_mut().players.remove(id).is_some() {
            self.effects.push(Effect::Release(id));
            self.broadcast_roster();
            self.advance_if_everyone_answered();
        }
    }

    fn cancel_grace(&mut self, id: ClientId) {
        let session = self.session();
        if let Some(serial) = session.players.get(id).and_then(|p| p.disconnect_serial) {
            let key = TimerKey::new(
                session.epoch,
                TimerKind::Grace {
                    connection_id: id,
                    serial,
                },
            );
            self.effects.push(Effect::Cancel(key));
        }
    }

    /// Brings a returning player back up to date
    fn catch_up(&mut self, id: ClientId) {
        let session = self.session();
        let Some(player) = session.players.get(id) else {
            return;
        };

        let rejoined = Packet::Rejoined {
            nickname: player.nickname.clone(),
            score: player.score,
            eliminated: player.eliminated,
        };
        let question = (session.phase == Phase::AwaitingAnswers
            && player.is_alive()
            && !player.has_answered_current_round)
            .then(|| self.question_packet())
            .flatten();

        self.send(id, rejoined);
        if let Some(packet) = question {
            self.send(id, packet);
        }
    }

    fn begin_question(&mut self, index: usize) {
        let session = self.registry.session_mut();
        session.phase = Phase::AwaitingAnswers;
        session.current_question_index = index;
        session.players.clear_round();

        info!("Question {} of {}", index + 1, session.questions.len());
        if let Some(packet) = self.question_packet() {
            self.broadcast(packet);
        }
        if self.config.advance == AdvancePolicy::Timed {
            self.schedule(
                TimerKind::QuestionTimeout { round: index },
                self.config.question_time,
            );
        }

        // Nobody left to wait for
        self.advance_if_everyone_answered();
    }

    fn advance_if_everyone_answered(&mut self) {
        if self.config.advance == AdvancePolicy::AllAnswered
            && self.session().phase == Phase::AwaitingAnswers
            && self.session().players.all_answered()
        {
            info!("Every player has answered");
            self.grade();
        }
    }

    /// AwaitingAnswers -> Grading, then either the next question or the end
    fn grade(&mut self) {
        let index = self.session().current_question_index;
        if self.config.advance == AdvancePolicy::Timed {
            self.cancel(TimerKind::QuestionTimeout { round: index });
        }
        self.settle_round();

        let session = self.session();
        let out_of_players =
            self.config.mode == GameMode::Elimination && session.players.alive_count() <= 1;
        if out_of_players || session.is_last_question() {
            self.finish();
        } else {
            self.schedule(
                TimerKind::GradingPause { round: index },
                self.config.grading_pause,
            );
        }
    }

    /// Closes answer collection for the current round and publishes scores
    fn settle_round(&mut self) {
        let eliminate_silent =
            self.config.mode == GameMode::Elimination && self.config.eliminate_unanswered;
        let session = self.registry.session_mut();
        session.phase = Phase::Grading;

        if eliminate_silent {
            for id in session.players.eliminate_unanswered() {
                self.send(id, Packet::Eliminated);
            }
        }

        let players = self.session().players.scores();
        self.broadcast(Packet::PlayerUpdate { players });
    }

    fn finish(&mut self) {
        self.registry.session_mut().phase = Phase::Finished;
        self.cancel(TimerKind::SessionTimeout);

        let session = self.session();
        let packet = match self.config.mode {
            GameMode::Elimination => {
                let winners = elimination_winners(&session.players);
                info!("Game over: {:?}", winners);
                Packet::Winner(winners)
            }
            GameMode::Scoring => {
                let standings = ranked_standings(&session.players, self.config.ranking);
                info!("Game over, {} players ranked", standings.len());
                Packet::FinalResult { standings }
            }
        };
        self.broadcast(packet);
    }

    fn question_packet(&self) -> Option<Packet> {
        let session = self.session();
        let time_limit_ms = self.config.time_limit().map(|d| d.as_millis() as u64);
        session.current_question().map(|q| {
            Packet::Question(q.view(
                session.current_question_index + 1,
                session.questions.len(),
                time_limit_ms,
            ))
        })
    }

    fn broadcast_roster(&mut self) {
        let nicknames = self.session().players.roster();
        self.broadcast(Packet::PlayerList { nicknames });
    }

    fn send(&mut self, to: ClientId, packet: Packet) {
        self.effects.push(Effect::Send { to, packet });
    }

    fn broadcast(&mut self, packet: Packet) {
        self.effects.push(Effect::Broadcast(packet));
    }

    fn reject(&mut self, to: ClientId, rejection: Rejection) {
        self.send(
            to,
            Packet::Reject {
                reason: rejection.to_string(),
            },
        );
    }

    fn schedule(&mut self, kind: TimerKind, after: Duration) {
        let key = TimerKey::new(self.session().epoch, kind);
        self.effects.push(Effect::Schedule { key, after });
    }

    fn cancel(&mut self, kind: TimerKind) {
        let key = TimerKey::new(self.session().epoch, kind);
        self.effects.push(Effect::Cancel(key));
    }
}
