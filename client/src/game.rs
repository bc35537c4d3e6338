//! Client-side mirror of the session

use shared::{normalize_room_code, ClientId, Packet, QuestionView, ResumeToken};

/// What this client knows about its own place in the game
#[derive(Debug, Default, Clone)]
pub struct ClientState {
    pub client_id: Option<ClientId>,
    /// Presented on reconnect to get the same player back
    pub resume_token: Option<ResumeToken>,
    pub nickname: Option<String>,
    /// Nickname sent in a join the server has not confirmed yet
    pending_nickname: Option<String>,
    pub room_code: Option<String>,
    pub question: Option<QuestionView>,
    pub answered: bool,
    pub eliminated: bool,
    pub finished: bool,
}

impl ClientState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a request on its way to the server
    pub fn sent(&mut self, packet: &Packet) {
        if let Packet::Join {
            nickname,
            room_code,
        } = packet
        {
            self.pending_nickname = Some(nickname.trim().to_string());
            if let Some(code) = room_code {
                self.room_code = Some(normalize_room_code(code));
            }
        }
    }

    /// Updates the mirror from one server packet
    pub fn apply(&mut self, packet: &Packet) {
        match packet {
            Packet::Connected {
                client_id,
                resume_token,
            } => {
                self.client_id = Some(*client_id);
                self.resume_token = Some(*resume_token);
            }
            Packet::Disconnected { .. } => {
                self.client_id = None;
                self.resume_token = None;
            }
            Packet::Code { room_code } => self.room_code = Some(room_code.clone()),
            Packet::PlayerList { nicknames } => {
                if let Some(pending) = self.pending_nickname.take() {
                    if nicknames.contains(&pending) {
                        self.nickname = Some(pending);
                    } else {
                        self.pending_nickname = Some(pending);
                    }
                }
            }
            Packet::Reject { .. } => self.pending_nickname = None,
            Packet::StartGame { .. } => {
                self.finished = false;
                self.question = None;
            }
            Packet::Question(view) => {
                self.question = Some(view.clone());
                self.answered = false;
            }
            Packet::AnswerResult { .. } => self.answered = true,
            Packet::Eliminated => self.eliminated = true,
            Packet::Winner(_) | Packet::FinalResult { .. } => {
                self.finished = true;
                self.question = None;
            }
            Packet::GameReset => {
                self.nickname = None;
                self.pending_nickname = None;
                self.question = None;
                self.answered = false;
                self.eliminated = false;
                self.finished = false;
            }
            Packet::Rejoined {
                nickname,
                eliminated,
                ..
            } => {
                self.nickname = Some(nickname.clone());
                self.eliminated = *eliminated;
            }
            _ => {}
        }
    }

    /// Whether an answer sent now would be graded
    pub fn can_answer(&self) -> bool {
        self.question.is_some() && !self.answered && !self.eliminated && !self.finished
    }

    /// One-line summary for the `status` command
    pub fn summary(&self) -> String {
        let client = match self.client_id {
            Some(id) => format!("client {}", id),
            None => "not connected".to_string(),
        };
        let player = match (&self.nickname, self.eliminated) {
            (Some(name), true) => format!("playing as {} (eliminated)", name),
            (Some(name), false) => format!("playing as {}", name),
            (None, _) => "not joined".to_string(),
        };
        let room = self.room_code.as_deref().unwrap_or("????");
        let stage = if self.finished {
            "game over"
        } else if self.question.is_some() {
            "round in progress"
        } else {
            "waiting"
        };
        format!("{}, {}, room {}, {}", client, player, room, stage)
    }
}
