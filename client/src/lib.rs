//! # Quiz Client Library
//!
//! This library provides a terminal client for the quiz server. A participant
//! types commands on stdin (join, answer, start, ...) and sees every server
//! event printed as a line of text. The same client doubles as the moderator
//! console: `start`, `next` and `reset` are ordinary commands.
//!
//! ## Architecture Overview
//!
//! ### Server Authority
//! The client keeps no game logic of its own. It mirrors just enough of the
//! session (current question, elimination, resume token) to give useful hints
//! and to come back after a dropped connection; every decision is made by the
//! server and arrives as a `Packet`.
//!
//! ### Connection Recovery
//! After the handshake the server hands out a resume token. When the TCP
//! connection drops, the client reconnects and presents the token, and the
//! server restores the same player, score and elimination state.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Local mirror of the session as seen by this client.
//!
//! ### Input Module (`input`)
//! Parses typed commands into packets.
//!
//! ### Console Module (`console`)
//! Formats server packets as human-readable text.
//!
//! ### Network Module (`network`)
//! TCP connection, handshake, heartbeat and reconnect loop.
//!
//! ## Usage Example
//!
//! ```rust
//! use client::input::{parse_line, InputCommand};
//! use shared::Packet;
//!
//! let command = parse_line("answer 2").unwrap();
//! assert_eq!(
//!     command,
//!     InputCommand::Send(Packet::Answer { choice: 1, score_delta: None })
//! );
//! ```

pub mod console;
pub mod game;
pub mod input;
pub mod network;
