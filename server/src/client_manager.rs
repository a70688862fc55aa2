//! Connection registry and role bookkeeping for the relay
//!
//! Tracks every live connection, hands out roles in arrival order and keeps the
//! rematch ballot. Nothing here touches a socket: each connection is reached
//! through the outbox sender its writer task drains.

use log::{info, warn};
use shared::Role;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Outgoing lines for one connection, already `\n`-terminated.
pub type Outbox = mpsc::Sender<Arc<str>>;

#[derive(Debug)]
pub struct Client {
    /// Unique connection identifier assigned by the server
    pub id: u32,
    pub addr: SocketAddr,
    pub role: Role,
    pub outbox: Outbox,
}

/// Result of counting one rematch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// First vote from this player; waiting for the other one.
    Recorded,
    /// This player had already voted.
    Duplicate,
    /// Both players have now voted. The ballot is cleared.
    Approved,
    /// Sender is a spectator, unknown, or claimed a role it doesn't hold.
    Rejected,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct RematchVotes {
    left: bool,
    right: bool,
}

pub struct ClientManager {
    clients: HashMap<u32, Client>,
    next_client_id: u32,

    // Roles are handed out once per server lifetime
    left_assigned: bool,
    right_assigned: bool,

    votes: RematchVotes,
}

impl ClientManager {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            left_assigned: false,
            right_assigned: false,
            votes: RematchVotes::default(),
        }
    }

    /// Registers a connection and assigns its role.
    ///
    /// The first connection ever becomes `left`, the second `right`, and every
    /// later one a spectator. A player slot freed by a disconnect is not handed
    /// to anyone else.
    pub fn add_client(&mut self, addr: SocketAddr, outbox: Outbox) -> (u32, Role) {
        let role = if !self.left_assigned {
            self.left_assigned = true;
            Role::Left
        } else if !self.right_assigned {
            self.right_assigned = true;
            Role::Right
        } else {
            Role::Spectator
        };

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {} as {}", client_id, addr, role);
        self.clients.insert(
            client_id,
            Client {
                id: client_id,
                addr,
                role,
                outbox,
            },
        );

        (client_id, role)
    }

    /// Returns the removed client, if it was still registered.
    pub fn remove_client(&mut self, client_id: u32) -> Option<Client> {
        let client = self.clients.remove(&client_id)?;
        info!(
            "Client {} ({}) disconnected from {}",
            client.id, client.role, client.addr
        );
        if client.role.is_player() {
            warn!(
                "Player {} left; their slot will not be reassigned",
                client.role
            );
        }
        Some(client)
    }

    pub fn get(&self, client_id: u32) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    /// Both player roles have been handed out.
    pub fn players_present(&self) -> bool {
        self.left_assigned && self.right_assigned
    }

    /// Counts a rematch request from `client_id`, which claims to hold `claimed`.
    pub fn record_vote(&mut self, client_id: u32, claimed: Role) -> VoteOutcome {
        let Some(client) = self.clients.get(&client_id) else {
            return VoteOutcome::Rejected;
        };
        if client.role != claimed {
            return VoteOutcome::Rejected;
        }

        let slot = match client.role {
            Role::Left => &mut self.votes.left,
            Role::Right => &mut self.votes.right,
            Role::Spectator => return VoteOutcome::Rejected,
        };
        if *slot {
            return VoteOutcome::Duplicate;
        }
        *slot = true;

        if self.votes.left && self.votes.right {
            self.votes = RematchVotes::default();
            VoteOutcome::Approved
        } else {
            VoteOutcome::Recorded
        }
    }

    /// Outboxes of every connection except `exclude`.
    pub fn recipients(&self, exclude: Option<u32>) -> Vec<(u32, Outbox)> {
        self.clients
            .values()
            .filter(|client| Some(client.id) != exclude)
            .map(|client| (client.id, client.outbox.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl Default for ClientManager {
    fn default() -> Self {
        Self::new()
    }
}
