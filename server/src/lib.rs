//! # Quiz Server Library
//!
//! This library provides the authoritative server for a real-time quiz
//! elimination game. It owns the single live session, validates every client
//! request, grades answers and decides who is eliminated or how players rank.
//! Clients only ever see what the server broadcasts.
//!
//! ## Core Responsibilities
//!
//! ### Session Lifecycle
//! A session moves through a fixed set of phases:
//!
//! ```text
//! Lobby -> Countdown -> AwaitingAnswers -> Grading -> AwaitingAnswers | Finished
//! ```
//!
//! Players join in the lobby, a countdown precedes the first question, and
//! each round collects answers until the configured advance policy closes it.
//! A reset throws the whole session away and opens a new lobby with a fresh
//! room code.
//!
//! ### Client Management
//! Handles the lifecycle of TCP connections:
//! - Version handshake and identity assignment
//! - Resume tokens so a dropped client reclaims its player on a new socket
//! - Idle timeout detection and cleanup
//!
//! ### Result Compilation
//! Elimination games report their survivors; scoring games produce a ranked
//! leaderboard with shared ranks for equal scores.
//!
//! ## Architecture Design
//!
//! ### Single Event Loop
//! Every input (packets, connection changes, fired timers) is funnelled into
//! one channel and handled sequentially by the server loop. The game core is
//! plain synchronous code that turns one event into a list of effects, so
//! there are no locks around game state and every transition is testable
//! without a network.
//!
//! ### Timers as Events
//! Countdown, question timeouts, grading pauses, the session timeout and
//! disconnect grace periods are tokio tasks that post a key back into the
//! loop. Keys carry the session epoch and round, and the coordinator checks
//! them against live state, so a timer that outlived its purpose does nothing.
//!
//! ### Framed TCP
//! Messages are bincode-encoded `Packet`s behind a 4-byte length prefix (see
//! `shared::framing`). Each connection has a reader task and a writer task
//! fed by an unbounded queue.
//!
//! ## Module Organization
//!
//! - `config`: game profile and transport settings
//! - `error`: rejection, ignore and question bank error types
//! - `questions`: question bank loading and validation
//! - `ledger`: per-player state keyed by connection identity
//! - `session`: the live session and its registry
//! - `results`: winners and leaderboards
//! - `timers`: cancellable deferred events
//! - `game`: the round coordinator state machine
//! - `client_manager`: connections, identities and resume tokens
//! - `network`: listener, connection tasks and the event loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::{GameConfig, ServerOptions};
//! use server::network::Server;
//! use server::questions::QuestionBank;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let bank = QuestionBank::load("questions.json")?;
//!     let options = ServerOptions::default();
//!
//!     let mut server = Server::bind(&options, GameConfig::default(), bank).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod error;
pub mod game;
pub mod ledger;
pub mod network;
pub mod questions;
pub mod results;
pub mod session;
pub mod timers;
