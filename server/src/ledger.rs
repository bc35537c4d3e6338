//! Player ledger: connection identity to per-player game state
//!
//! The ledger remembers join order, which is the tie-breaker for every
//! result computation, and tracks which players are temporarily
//! disconnected so that a returning connection resumes its old entry
//! instead of creating a second one.

use crate::config::GameMode;
use crate::error::{Ignored, Rejection};
use crate::questions::Question;
use log::{debug, info};
use shared::{normalize_room_code, ClientId, PlayerScore, MAX_NICKNAME_LEN};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub connection_id: ClientId,
    pub nickname: String,
    pub score: u32,
    pub eliminated: bool,
    pub has_answered_current_round: bool,
    /// Set while the player's connection is gone and the grace timer runs
    pub disconnect_serial: Option<u64>,
}

impl Player {
    pub fn new(connection_id: ClientId, nickname: String) -> Self {
        Self {
            connection_id,
            nickname,
            score: 0,
            eliminated: false,
            has_answered_current_round: false,
            disconnect_serial: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.disconnect_serial.is_none()
    }

    pub fn is_alive(&self) -> bool {
        !self.eliminated
    }
}

/// Conditions under which a new player may enter the ledger
#[derive(Debug, Clone, Copy)]
pub struct JoinPolicy<'a> {
    pub lobby_open: bool,
    pub room_code: &'a str,
    pub code_required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinAck {
    Joined,
    /// The connection already had an entry; its state was kept
    Rejoined,
}

/// Outcome of a graded answer, echoed only to the submitter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub correct: bool,
    pub eliminated: bool,
    pub score: u32,
}

#[derive(Debug, Default)]
pub struct PlayerLedger {
    players: HashMap<ClientId, Player>,
    /// Join order
    order: Vec<ClientId>,
    next_disconnect_serial: u64,
    /// Eliminations this session, including players removed since
    eliminations: usize,
}

impl PlayerLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a player, or resumes the existing entry for this connection
    pub fn join(
        &mut self,
        connection_id: ClientId,
        nickname: &str,
        room_code: Option<&str>,
        policy: JoinPolicy<'_>,
    ) -> Result<JoinAck, Rejection> {
        if let Some(player) = self.players.get_mut(&connection_id) {
            player.disconnect_serial = None;
            debug!("Connection {} rejoined as {}", connection_id, player.nickname);
            return Ok(JoinAck::Rejoined);
        }

        if !policy.lobby_open {
            return Err(Rejection::GameInProgress);
        }

        match room_code {
            Some(code) if normalize_room_code(code) != policy.room_code => {
                return Err(Rejection::WrongRoomCode);
            }
            None if policy.code_required => return Err(Rejection::RoomCodeRequired),
            _ => {}
        }

        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Err(Rejection::EmptyNickname);
        }
        if nickname.chars().count() > MAX_NICKNAME_LEN {
            return Err(Rejection::NicknameTooLong {
                max: MAX_NICKNAME_LEN,
            });
        }

        info!("Player {} joined as {}", connection_id, nickname);
        self.players
            .insert(connection_id, Player::new(connection_id, nickname.to_string()));
        self.order.push(connection_id);
        Ok(JoinAck::Joined)
    }

    /// Grades one submission against the active question.
    ///
    /// A player gets exactly one graded answer per round; later submissions
    /// are ignored without touching any state.
    pub fn record_answer(
        &mut self,
        connection_id: ClientId,
        choice: usize,
        score_delta: Option<u32>,
        question: &Question,
        mode: GameMode,
    ) -> Result<Verdict, Ignored> {
        let player = self
            .players
            .get_mut(&connection_id)
            .ok_or(Ignored::UnknownPlayer)?;
        if player.eliminated {
            return Err(Ignored::Eliminated);
        }
        if player.has_answered_current_round {
            return Err(Ignored::AlreadyAnswered);
        }

        let correct = question.is_correct(choice);
        match (mode, correct) {
            (GameMode::Scoring, true) => {
                player.score = player.score.saturating_add(score_delta.unwrap_or(1));
            }
            (GameMode::Elimination, false) => {
                player.eliminated = true;
                self.eliminations += 1;
            }
            (GameMode::Scoring, false) | (GameMode::Elimination, true) => {}
        }
        player.has_answered_current_round = true;

        debug!(
            "Player {} answered {} ({})",
            connection_id,
            choice,
            if correct { "correct" } else { "wrong" }
        );

        Ok(Verdict {
            correct,
            eliminated: player.eliminated,
            score: player.score,
        })
    }

    /// Deletes a player. Returns the removed entry, if any.
    pub fn remove(&mut self, connection_id: ClientId) -> Option<Player> {
        let player = self.players.remove(&connection_id)?;
        self.order.retain(|id| *id != connection_id);
        info!("Removed player {} ({})", connection_id, player.nickname);
        Some(player)
    }

    /// Marks a player as disconnected and returns the serial that keys its grace timer
    pub fn mark_disconnected(&mut self, connection_id: ClientId) -> Option<u64> {
        let player = self.players.get_mut(&connection_id)?;
        self.next_disconnect_serial += 1;
        let serial = self.next_disconnect_serial;
        player.disconnect_serial = Some(serial);
        Some(serial)
    }

    /// Clears the disconnect mark; returns the resumed player
    pub fn reconnect(&mut self, connection_id: ClientId) -> Option<&Player> {
        let player = self.players.get_mut(&connection_id)?;
        player.disconnect_serial = None;
        Some(player)
    }

    /// True when the player is still waiting out the grace period started by `serial`
    pub fn is_pending_removal(&self, connection_id: ClientId, serial: u64) -> bool {
        self.players
            .get(&connection_id)
            .map_or(false, |p| p.disconnect_serial == Some(serial))
    }

    pub fn get(&self, connection_id: ClientId) -> Option<&Player> {
        self.players.get(&connection_id)
    }

    pub fn contains(&self, connection_id: ClientId) -> bool {
        self.players.contains_key(&connection_id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Players in join order
    pub fn iter(&self) -> impl Iterator<Item = &Player> + '_ {
        self.order.iter().filter_map(move |id| self.players.get(id))
    }

    /// Nicknames in join order
    pub fn roster(&self) -> Vec<String> {
        self.iter().map(|p| p.nickname.clone()).collect()
    }

    pub fn scores(&self) -> Vec<PlayerScore> {
        self.iter()
            .map(|p| PlayerScore {
                nickname: p.nickname.clone(),
                score: p.score,
                eliminated: p.eliminated,
            })
            .collect()
    }

    pub fn alive_count(&self) -> usize {
        self.players.values().filter(|p| p.is_alive()).count()
    }

    /// True once every connected, alive player has answered this round.
    /// Disconnected players are not waited for.
    pub fn all_answered(&self) -> bool {
        self.players
            .values()
            .filter(|p| p.is_alive() && p.is_connected())
            .all(|p| p.has_answered_current_round)
    }

    pub fn answered_ids(&self) -> Vec<ClientId> {
        self.iter()
            .filter(|p| p.has_answered_current_round)
            .map(|p| p.connection_id)
            .collect()
    }

    /// Eliminates alive players who did not answer this round; returns their ids
    pub fn eliminate_unanswered(&mut self) -> Vec<ClientId> {
        let mut eliminated = Vec::new();
        for id in &self.order {
            if let Some(player) = self.players.get_mut(id) {
                if player.is_alive() && !player.has_answered_current_round {
                    player.eliminated = true;
                    eliminated.push(*id);
                }
            }
        }
        self.eliminations += eliminated.len();
        eliminated
    }

    /// True once anyone has been eliminated, even if they later left
    pub fn any_eliminated(&self) -> bool {
        self.eliminations > 0
    }

    pub fn clear_round(&mut self) {
        for player in self.players.values_mut() {
            player.has_answered_current_round = false;
        }
    }
}
