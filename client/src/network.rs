//! Client network layer: TCP connection, heartbeat and automatic resume

use crate::console::describe;
use crate::game::ClientState;
use crate::input::{parse_line, InputCommand, InputError, HELP};
use log::{debug, error, info, warn};
use shared::framing::{read_packet, write_packet};
use shared::{Packet, ResumeToken, PROTOCOL_VERSION};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep};

/// Keeps the connection from hitting the server's idle timeout
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(2);
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

pub type ClientError = Box<dyn std::error::Error + Send + Sync>;

/// Opens a connection and performs the handshake.
///
/// Returns the stream together with the server's `Connected` reply.
pub async fn connect(
    server_addr: &str,
    resume: Option<ResumeToken>,
) -> Result<(TcpStream, Packet), ClientError> {
    let mut stream = TcpStream::connect(server_addr).await?;
    stream.set_nodelay(true)?;

    let hello = Packet::Connect {
        client_version: PROTOCOL_VERSION,
        resume,
    };
    write_packet(&mut stream, &hello).await?;

    match read_packet(&mut stream).await? {
        Some(packet @ Packet::Connected { .. }) => Ok((stream, packet)),
        Some(Packet::Disconnected { reason }) => {
            Err(format!("server refused the connection: {}", reason).into())
        }
        Some(other) => Err(format!("unexpected handshake reply: {:?}", other).into()),
        None => Err("server closed the connection during the handshake".into()),
    }
}

/// Why a connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Quit,
    Lost,
}

pub struct Client {
    server_addr: String,
    state: ClientState,
    /// Join sent right after the first successful handshake
    auto_join: Option<Packet>,
    reconnect_attempts: u32,
}

impl Client {
    pub fn new(server_addr: &str, reconnect_attempts: u32) -> Self {
        Self {
            server_addr: server_addr.to_string(),
            state: ClientState::new(),
            auto_join: None,
            reconnect_attempts,
        }
    }

    pub fn with_auto_join(mut self, nickname: String, room_code: Option<String>) -> Self {
        self.auto_join = Some(Packet::Join {
            nickname,
            room_code,
        });
        self
    }

    fn spawn_stdin_reader(input_tx: mpsc::UnboundedSender<InputCommand>) {
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => match parse_line(&line) {
                        Ok(command) => {
                            if input_tx.send(command).is_err() {
                                break;
                            }
                        }
                        Err(InputError::Empty) => {}
                        Err(e) => println!("{}", e),
                    },
                    Ok(None) => {
                        let _ = input_tx.send(InputCommand::Quit);
                        break;
                    }
                    Err(e) => {
                        error!("Failed to read stdin: {}", e);
                        break;
                    }
                }
            }
        });
    }

    /// Prints a server packet and folds it into the local state
    fn show(&mut self, packet: &Packet) {
        self.state.apply(packet);
        if let Some(text) = describe(packet) {
            println!("{}", text);
        }
    }

    pub async fn run(&mut self) -> Result<(), ClientError> {
        let (input_tx, mut input_rx) = mpsc::unbounded_channel();
        Self::spawn_stdin_reader(input_tx);
        println!("Type `help` for the list of commands.");

        let mut failures = 0;
        loop {
            let resume = self.state.resume_token;
            let (stream, connected) = match connect(&self.server_addr, resume).await {
                Ok(connection) => {
                    failures = 0;
                    connection
                }
                Err(e) => {
                    failures += 1;
                    if failures > self.reconnect_attempts {
                        return Err(e);
                    }
                    warn!("Connection attempt {} failed: {}", failures, e);
                    sleep(RECONNECT_DELAY).await;
                    continue;
                }
            };

            if let (Some(token), Packet::Connected { client_id, .. }) = (resume, &connected) {
                if token.client_id == *client_id {
                    info!("Resumed as client {}", client_id);
                } else {
                    info!("Could not resume, now client {}", client_id);
                }
            }
            self.show(&connected);

            match self.play(stream, &mut input_rx).await {
                SessionEnd::Quit => return Ok(()),
                SessionEnd::Lost if self.reconnect_attempts == 0 => {
                    return Err("lost connection to the server".into());
                }
                SessionEnd::Lost => warn!("Lost connection to the server, reconnecting"),
            }
        }
    }

    /// Pumps one connection until it drops or the user quits
    async fn play(
        &mut self,
        stream: TcpStream,
        input_rx: &mut mpsc::UnboundedReceiver<InputCommand>,
    ) -> SessionEnd {
        let (mut reader, mut writer) = stream.into_split();
        let (packet_tx, mut packet_rx) = mpsc::unbounded_channel();

        // Ends (and drops packet_tx) when the server goes away
        let reader_task = tokio::spawn(async move {
            loop {
                match read_packet(&mut reader).await {
                    Ok(Some(packet)) if packet.is_from_client() => {
                        warn!("Ignoring client-only packet from server: {:?}", packet);
                    }
                    Ok(Some(packet)) => {
                        if packet_tx.send(packet).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Bad frame from server: {}", e);
                        break;
                    }
                }
            }
        });

        if let Some(join) = self.auto_join.take() {
            self.state.sent(&join);
            if send(&mut writer, &join).await.is_err() {
                reader_task.abort();
                return SessionEnd::Lost;
            }
        }

        let mut heartbeat = interval(HEARTBEAT_INTERVAL);

        let end = loop {
            tokio::select! {
                packet = packet_rx.recv() => match packet {
                    Some(packet) => self.show(&packet),
                    None => break SessionEnd::Lost,
                },
                command = input_rx.recv() => match command {
                    Some(InputCommand::Send(packet)) => {
                        if matches!(packet, Packet::Answer { .. }) && !self.state.can_answer() {
                            println!("(no open question for you, the server may ignore this)");
                        }
                        self.state.sent(&packet);
                        if send(&mut writer, &packet).await.is_err() {
                            break SessionEnd::Lost;
                        }
                    }
                    Some(InputCommand::Help) => println!("{}", HELP),
                    Some(InputCommand::Status) => println!("{}", self.state.summary()),
                    Some(InputCommand::Quit) | None => {
                        if send(&mut writer, &Packet::Disconnect).await.is_err() {
                            debug!("Connection already closed while leaving");
                        }
                        break SessionEnd::Quit;
                    }
                },
                _ = heartbeat.tick() => {
                    if send(&mut writer, &Packet::Heartbeat).await.is_err() {
                        break SessionEnd::Lost;
                    }
                }
            }
        };

        reader_task.abort();
        end
    }
}

async fn send(writer: &mut OwnedWriteHalf, packet: &Packet) -> std::io::Result<()> {
    let result = write_packet(writer, packet).await;
    if let Err(e) = &result {
        debug!("Failed to send {:?}: {}", packet, e);
    }
    result
}
