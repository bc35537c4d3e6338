//! Connection bookkeeping for the quiz server
//!
//! This module tracks every live TCP connection: its outbound queue, the time
//! it was last heard from, and the resume secret that lets a dropped client
//! claim its old identity on a fresh connection. Identities outlive
//! connections; the round coordinator decides when an identity is finished
//! with and releases it here.

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{ClientId, Packet, ResumeToken};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// A live connection bound to a client identity
#[derive(Debug)]
pub struct Client {
    /// Identity assigned at handshake, kept across resumes
    pub id: ClientId,
    /// Peer address, for logging
    pub addr: SocketAddr,
    /// Last time we received any packet on this connection
    pub last_seen: Instant,
    /// Outbound queue drained by the connection's writer task
    pub sender: mpsc::UnboundedSender<Packet>,
    /// Distinguishes successive connections holding the same identity
    pub serial: u64,
}

impl Client {
    pub fn new(
        id: ClientId,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<Packet>,
        serial: u64,
    ) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            sender,
            serial,
        }
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Result of a successful handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub client_id: ClientId,
    pub serial: u64,
    pub token: ResumeToken,
    /// The connection took over an identity from an earlier connection
    pub resumed: bool,
}

/// Manages connected clients and the identities they may resume
pub struct ClientManager {
    clients: HashMap<ClientId, Client>,
    /// Resume secrets of identities that are still known to the game
    secrets: HashMap<ClientId, u64>,
    next_client_id: ClientId,
    next_serial: u64,
    max_clients: usize,
    rng: StdRng,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self::with_rng(max_clients, StdRng::from_entropy())
    }

    fn with_rng(max_clients: usize, rng: StdRng) -> Self {
        Self {
            clients: HashMap::new(),
            secrets: HashMap::new(),
            next_client_id: 1,
            next_serial: 0,
            max_clients,
            rng,
        }
    }

    /// Binds a new connection to an identity.
    ///
    /// A valid resume token reclaims its identity, replacing any connection
    /// that still holds it (a half-open socket the server has not noticed
    /// yet). Anything else gets a fresh identity. Returns `None` when the
    /// server is at capacity.
    pub fn register(
        &mut self,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<Packet>,
        resume: Option<ResumeToken>,
    ) -> Option<Registration> {
        let reclaimed =
            resume.filter(|token| self.secrets.get(&token.client_id) == Some(&token.secret));
        let takes_over =
            reclaimed.map_or(false, |token| self.clients.contains_key(&token.client_id));
        if !takes_over && self.clients.len() >= self.max_clients {
            return None;
        }

        self.next_serial += 1;
        let serial = self.next_serial;

        let token = match reclaimed {
            Some(token) => {
                info!("Client {} resumed from {}", token.client_id, addr);
                token
            }
            None => {
                if resume.is_some() {
                    debug!("Unknown resume token from {}, assigning a new identity", addr);
                }
                let client_id = self.next_client_id;
                self.next_client_id += 1;
                let secret = self.rng.gen();
                self.secrets.insert(client_id, secret);
                info!("Client {} connected from {}", client_id, addr);
                ResumeToken { client_id, secret }
            }
        };

        // Replacing drops the old sender, which ends the old writer task
        self.clients
            .insert(token.client_id, Client::new(token.client_id, addr, sender, serial));

        Some(Registration {
            client_id: token.client_id,
            serial,
            token,
            resumed: reclaimed.is_some(),
        })
    }

    /// Records activity on a connection. Returns false for a connection
    /// that no longer holds the identity.
    pub fn touch(&mut self, client_id: ClientId, serial: u64) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) if client.serial == serial => {
                client.last_seen = Instant::now();
                true
            }
            _ => false,
        }
    }

    /// Removes the connection only if it is still the one identified by `serial`
    pub fn remove_client(&mut self, client_id: ClientId, serial: u64) -> bool {
        match self.clients.get(&client_id) {
            Some(client) if client.serial == serial => {
                self.clients.remove(&client_id);
                info!("Client {} disconnected", client_id);
                true
            }
            _ => false,
        }
    }

    /// Forgets an identity for good; its resume token stops working
    pub fn release(&mut self, client_id: ClientId) {
        if self.secrets.remove(&client_id).is_some() {
            debug!("Released identity {}", client_id);
        }
    }

    pub fn is_connected(&self, client_id: ClientId) -> bool {
        self.clients.contains_key(&client_id)
    }

    /// Removes connections that stayed silent for longer than `timeout`
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<ClientId> {
        let timed_out: Vec<ClientId> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(timeout))
            .map(|client| client.id)
            .collect();

        for client_id in &timed_out {
            self.clients.remove(client_id);
            info!("Client {} timed out", client_id);
        }

        timed_out
    }

    /// Queues a packet for one client. Returns false if it is not connected.
    pub fn send(&self, client_id: ClientId, packet: Packet) -> bool {
        match self.clients.get(&client_id) {
            Some(client) => client.sender.send(packet).is_ok(),
            None => false,
        }
    }

    /// Queues a packet for every connected client
    pub fn broadcast(&self, packet: &Packet) {
        for client in self.clients.values() {
            if client.sender.send(packet.clone()).is_err() {
                debug!("Writer for client {} already gone", client.id);
            }
        }
    }

    /// Drops every connection; their writer tasks finish and close the sockets
    pub fn disconnect_all(&mut self) {
        self.clients.clear();
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
