//! Server network layer handling TCP connections and the coordinator event loop

use crate::client_manager::{ClientManager, Registration};
use crate::config::{GameConfig, ServerOptions};
use crate::game::{Command, Effect, RoundCoordinator};
use crate::questions::QuestionBank;
use crate::timers::{TimerKey, TimerSet};
use log::{debug, error, info, warn};
use shared::framing::{read_packet, write_packet};
use shared::{ClientId, Packet, ResumeToken, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;

/// How long a new connection may take to send its `Connect`
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

pub type ServerError = Box<dyn std::error::Error + Send + Sync>;

/// Events funnelled into the server loop
#[derive(Debug)]
pub enum ServerMessage {
    /// A connection passed the version check and needs an identity
    ConnectionOpened {
        addr: SocketAddr,
        resume: Option<ResumeToken>,
        sender: mpsc::UnboundedSender<Packet>,
        reply: oneshot::Sender<Option<Registration>>,
    },
    PacketReceived {
        client_id: ClientId,
        serial: u64,
        packet: Packet,
    },
    ConnectionClosed {
        client_id: ClientId,
        serial: u64,
    },
    ClientTimeout {
        client_id: ClientId,
    },
    TimerFired(TimerKey),
    Shutdown,
}

/// Stops a running server from another task
#[derive(Debug, Clone)]
pub struct ServerHandle {
    server_tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ServerHandle {
    pub fn shutdown(&self) {
        if self.server_tx.send(ServerMessage::Shutdown).is_err() {
            debug!("Server already stopped");
        }
    }
}

pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    clients: Arc<RwLock<ClientManager>>,
    coordinator: RoundCoordinator,
    timers: TimerSet,
    idle_timeout: Duration,

    // Every task reports back through this channel
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn bind(
        options: &ServerOptions,
        config: GameConfig,
        bank: QuestionBank,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&options.address).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            clients: Arc::new(RwLock::new(ClientManager::new(options.max_clients))),
            coordinator: RoundCoordinator::new(config, bank),
            timers: TimerSet::new(),
            idle_timeout: options.idle_timeout,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            server_tx: self.server_tx.clone(),
        }
    }

    fn spawn_listener(&mut self) -> Option<JoinHandle<()>> {
        let listener = self.listener.take()?;
        let server_tx = self.server_tx.clone();

        Some(tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        debug!("Accepted connection from {}", addr);
                        let server_tx = server_tx.clone();
                        tokio::spawn(async move {
                            if let Err(e) = Self::handle_connection(stream, addr, server_tx).await {
                                warn!("Connection from {} failed: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        }))
    }

    fn spawn_timeout_checker(&self) -> JoinHandle<()> {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();
        let idle_timeout = self.idle_timeout;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts(idle_timeout)
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        })
    }

    /// Runs one connection: handshake, then a writer task and this reader loop
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        server_tx: mpsc::UnboundedSender<ServerMessage>,
    ) -> std::io::Result<()> {
        stream.set_nodelay(true)?;
        let (mut reader, mut writer) = stream.into_split();

        let resume = match tokio::time::timeout(HANDSHAKE_TIMEOUT, read_packet(&mut reader)).await
        {
            Ok(Ok(Some(Packet::Connect {
                client_version,
                resume,
            }))) => {
                if client_version != PROTOCOL_VERSION {
                    warn!(
                        "Client at {} uses protocol {}, expected {}",
                        addr, client_version, PROTOCOL_VERSION
                    );
                    let reason = format!("Unsupported protocol version {}", client_version);
                    write_packet(&mut writer, &Packet::Disconnected { reason }).await?;
                    return Ok(());
                }
                resume
            }
            Ok(Ok(Some(other))) => {
                warn!("Expected Connect from {}, got {:?}", addr, other);
                return Ok(());
            }
            Ok(Ok(None)) => return Ok(()),
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                warn!("Handshake from {} timed out", addr);
                return Ok(());
            }
        };

        let (sender, outbound) = mpsc::unbounded_channel();
        let (reply, registered) = oneshot::channel();
        let opened = ServerMessage::ConnectionOpened {
            addr,
            resume,
            sender,
            reply,
        };
        if server_tx.send(opened).is_err() {
            return Ok(());
        }

        let Some(registration) = registered.await.ok().flatten() else {
            let reason = "Server full".to_string();
            write_packet(&mut writer, &Packet::Disconnected { reason }).await?;
            return Ok(());
        };

        let writer_task = tokio::spawn(Self::write_loop(writer, outbound, addr));
        Self::read_loop(reader, registration, writer_task, server_tx).await;
        Ok(())
    }

    async fn write_loop(
        mut writer: OwnedWriteHalf,
        mut outbound: mpsc::UnboundedReceiver<Packet>,
        addr: SocketAddr,
    ) {
        while let Some(packet) = outbound.recv().await {
            if let Err(e) = write_packet(&mut writer, &packet).await {
                debug!("Failed to write to {}: {}", addr, e);
                break;
            }
        }
    }

    /// Forwards packets until the peer goes away or the server drops this connection
    async fn read_loop(
        mut reader: OwnedReadHalf,
        registration: Registration,
        mut writer_task: JoinHandle<()>,
        server_tx: mpsc::UnboundedSender<ServerMessage>,
    ) {
        let Registration {
            client_id, serial, ..
        } = registration;

        loop {
            tokio::select! {
                result = read_packet(&mut reader) => match result {
                    Ok(Some(packet)) => {
                        let message = ServerMessage::PacketReceived { client_id, serial, packet };
                        if server_tx.send(message).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("Client {} closed its connection", client_id);
                        break;
                    }
                    Err(e) => {
                        warn!("Dropping client {} after a bad frame: {}", client_id, e);
                        break;
                    }
                },
                // The writer only stops once the server let go of this connection
                _ = &mut writer_task => {
                    debug!("Connection of client {} superseded or closed", client_id);
                    break;
                }
            }
        }

        writer_task.abort();
        if server_tx
            .send(ServerMessage::ConnectionClosed { client_id, serial })
            .is_err()
        {
            debug!("Server loop gone before client {} closed", client_id);
        }
    }

    async fn open_connection(
        &mut self,
        addr: SocketAddr,
        resume: Option<ResumeToken>,
        sender: mpsc::UnboundedSender<Packet>,
        reply: oneshot::Sender<Option<Registration>>,
    ) {
        let registration = {
            let mut clients = self.clients.write().await;
            let registration = clients.register(addr, sender, resume);
            if let Some(r) = registration {
                clients.send(
                    r.client_id,
                    Packet::Connected {
                        client_id: r.client_id,
                        resume_token: r.token,
                    },
                );
            }
            registration
        };

        let Some(registration) = registration else {
            warn!("Refusing {}: server full", addr);
            let _ = reply.send(None);
            return;
        };

        if reply.send(Some(registration)).is_err() {
            // The connection task is gone and will never report its close
            self.close_connection(registration.client_id, registration.serial)
                .await;
            return;
        }

        if registration.resumed {
            self.dispatch(registration.client_id, Command::Reconnect)
                .await;
        }
    }

    async fn close_connection(&mut self, client_id: ClientId, serial: u64) {
        let removed = {
            let mut clients = self.clients.write().await;
            clients.remove_client(client_id, serial)
        };
        if removed {
            self.dispatch(client_id, Command::Disconnect).await;
        }
    }

    async fn handle_packet(&mut self, client_id: ClientId, serial: u64, packet: Packet) {
        let current = {
            let mut clients = self.clients.write().await;
            clients.touch(client_id, serial)
        };
        if !current {
            debug!("Ignoring packet from a superseded connection of {}", client_id);
            return;
        }
        if !packet.is_from_client() {
            warn!("Client {} sent a server-only packet: {:?}", client_id, packet);
            return;
        }

        match packet {
            Packet::Heartbeat => {}
            Packet::Disconnect => {
                info!("Client {} is leaving", client_id);
                self.close_connection(client_id, serial).await;
            }
            Packet::Connect { .. } => {
                warn!("Client {} repeated its handshake", client_id);
            }
            other => match Command::from_packet(other) {
                Some(command) => self.dispatch(client_id, command).await,
                None => warn!("Unexpected packet type from client {}", client_id),
            },
        }
    }

    /// Starts the player's grace period unless a resume already claimed the identity
    async fn client_timed_out(&mut self, client_id: ClientId) {
        let resumed = self.clients.read().await.is_connected(client_id);
        if resumed {
            debug!("Client {} resumed before its timeout was handled", client_id);
            return;
        }
        self.dispatch(client_id, Command::Disconnect).await;
    }

    async fn dispatch(&mut self, client_id: ClientId, command: Command) {
        let effects = self.coordinator.handle(client_id, command);
        self.apply(effects).await;
    }

    /// Carries out the coordinator's effects in order
    async fn apply(&mut self, effects: Vec<Effect>) {
        let mut clients = self.clients.write().await;

        for effect in effects {
            match effect {
                Effect::Send { to, packet } => {
                    if !clients.send(to, packet) {
                        debug!("Client {} is not connected, message dropped", to);
                    }
                }
                Effect::Broadcast(packet) => clients.broadcast(&packet),
                Effect::Schedule { key, after } => {
                    self.timers
                        .schedule(key, after, self.server_tx.clone(), ServerMessage::TimerFired);
                }
                Effect::Cancel(key) => {
                    self.timers.cancel(&key);
                }
                Effect::CancelAll => self.timers.cancel_all(),
                Effect::Release(client_id) => clients.release(client_id),
            }
        }
    }

    pub async fn run(&mut self) -> Result<(), ServerError> {
        // Initialize concurrent tasks
        let listener_task = self
            .spawn_listener()
            .ok_or("server can only be run once")?;
        let timeout_task = self.spawn_timeout_checker();

        info!("Server started successfully");

        while let Some(message) = self.server_rx.recv().await {
            match message {
                ServerMessage::ConnectionOpened {
                    addr,
                    resume,
                    sender,
                    reply,
                } => {
                    self.open_connection(addr, resume, sender, reply).await;
                }
                ServerMessage::PacketReceived {
                    client_id,
                    serial,
                    packet,
                } => {
                    self.handle_packet(client_id, serial, packet).await;
                }
                ServerMessage::ConnectionClosed { client_id, serial } => {
                    self.close_connection(client_id, serial).await;
                }
                ServerMessage::ClientTimeout { client_id } => {
                    self.client_timed_out(client_id).await;
                }
                ServerMessage::TimerFired(key) => {
                    self.timers.complete(&key);
                    let effects = self.coordinator.on_timer(key);
                    self.apply(effects).await;
                }
                ServerMessage::Shutdown => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        listener_task.abort();
        timeout_task.abort();
        self.timers.cancel_all();
        self.clients.write().await.disconnect_all();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    fn bank() -> QuestionBank {
        QuestionBank::from_json(r#"[{"question": "2 + 2?", "choices": ["3", "4"], "answer": "4"}]"#)
            .unwrap()
    }

    async fn start(max_clients: usize) -> (SocketAddr, ServerHandle) {
        let options = ServerOptions {
            address: "127.0.0.1:0".to_string(),
            max_clients,
            idle_timeout: Duration::from_secs(30),
        };
        let mut server = Server::bind(&options, GameConfig::default(), bank())
            .await
            .unwrap();
        let addr = server.local_addr();
        let handle = server.handle();
        tokio::spawn(async move { server.run().await });
        (addr, handle)
    }

    async fn connect(addr: SocketAddr, client_version: u32) -> (TcpStream, Packet) {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let hello = Packet::Connect {
            client_version,
            resume: None,
        };
        write_packet(&mut stream, &hello).await.unwrap();
        let reply = timeout(Duration::from_secs(2), read_packet(&mut stream))
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        (stream, reply)
    }

    /// Bound but not running; the test drives it directly
    async fn idle_server() -> Server {
        let options = ServerOptions {
            address: "127.0.0.1:0".to_string(),
            max_clients: 8,
            idle_timeout: Duration::from_secs(30),
        };
        Server::bind(&options, GameConfig::default(), bank())
            .await
            .unwrap()
    }

    async fn joined_player(
        server: &mut Server,
        nickname: &str,
    ) -> (ClientId, u64, mpsc::UnboundedReceiver<Packet>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let registration = server.clients.write().await.register(addr, tx, None).unwrap();
        let id = registration.client_id;
        server
            .dispatch(
                id,
                Command::Join {
                    nickname: nickname.to_string(),
                    room_code: None,
                },
            )
            .await;
        (id, registration.serial, rx)
    }

    #[tokio::test]
    async fn test_client_timeout_starts_grace_period() {
        let mut server = idle_server().await;
        let (id, serial, _rx) = joined_player(&mut server, "Ana").await;

        assert!(server.clients.write().await.remove_client(id, serial));
        server.client_timed_out(id).await;

        let player = server.coordinator.session().players.get(id).unwrap();
        assert!(!player.is_connected());
        assert_eq!(server.timers.len(), 1);
        server.timers.cancel_all();
    }

    #[tokio::test]
    async fn test_client_timeout_after_resume_is_ignored() {
        let mut server = idle_server().await;
        let (id, _serial, _rx) = joined_player(&mut server, "Ana").await;

        // Still registered: the identity was resumed before the timeout arrived
        server.client_timed_out(id).await;

        let player = server.coordinator.session().players.get(id).unwrap();
        assert!(player.is_connected());
        assert!(server.timers.is_empty());
    }

    #[tokio::test]
    async fn test_server_only_packets_are_dropped() {
        let (addr, handle) = start(8).await;

        let (mut stream, _) = connect(addr, PROTOCOL_VERSION).await;
        let forged = Packet::Code {
            room_code: "ZZZZ".to_string(),
        };
        write_packet(&mut stream, &forged).await.unwrap();
        write_packet(&mut stream, &Packet::GetCode).await.unwrap();

        let reply = timeout(Duration::from_secs(2), read_packet(&mut stream))
            .await
            .unwrap()
            .unwrap();
        match reply {
            Some(Packet::Code { room_code }) => assert_ne!(room_code, "ZZZZ"),
            other => panic!("expected a room code, got {:?}", other),
        }
        handle.shutdown();
    }

    #[tokio::test]
    async fn test_handshake_assigns_identity() {
        let (addr, handle) = start(8).await;

        let (_a, first) = connect(addr, PROTOCOL_VERSION).await;
        let (_b, second) = connect(addr, PROTOCOL_VERSION).await;

        match (first, second) {
            (
                Packet::Connected {
                    client_id: a,
                    resume_token: token_a,
                },
                Packet::Connected { client_id: b, .. },
            ) => {
                assert_ne!(a, b);
                assert_eq!(token_a.client_id, a);
            }
            other => panic!("unexpected handshake replies {:?}", other),
        }
        handle.shutdown();
    }

    #[tokio::test]
    async fn test_version_mismatch_is_refused() {
        let (addr, handle) = start(8).await;

        let (_stream, reply) = connect(addr, PROTOCOL_VERSION + 1).await;
        assert!(matches!(reply, Packet::Disconnected { .. }));
        handle.shutdown();
    }

    #[tokio::test]
    async fn test_full_server_refuses_connection() {
        let (addr, handle) = start(1).await;

        let (_kept, first) = connect(addr, PROTOCOL_VERSION).await;
        assert!(matches!(first, Packet::Connected { .. }));

        let (_stream, reply) = connect(addr, PROTOCOL_VERSION).await;
        assert_eq!(
            reply,
            Packet::Disconnected {
                reason: "Server full".to_string()
            }
        );
        handle.shutdown();
    }

    #[tokio::test]
    async fn test_requests_are_answered_after_handshake() {
        let (addr, handle) = start(8).await;

        let (mut stream, _) = connect(addr, PROTOCOL_VERSION).await;
        write_packet(&mut stream, &Packet::GetCode).await.unwrap();
        let reply = timeout(Duration::from_secs(2), read_packet(&mut stream))
            .await
            .unwrap()
            .unwrap();
        match reply {
            Some(Packet::Code { room_code }) => assert_eq!(room_code.len(), 4),
            other => panic!("expected a room code, got {:?}", other),
        }
        handle.shutdown();
    }
}
