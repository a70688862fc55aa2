//! Shared relay state: the registry, the start gate and rematch voting
//!
//! One `RelaySession` is shared by every connection worker. All registry
//! mutations go through its `RwLock`, so role assignment and the vote
//! check-and-clear each happen under a single write guard.

use crate::client_manager::{ClientManager, Outbox, VoteOutcome};
use clap::ValueEnum;
use log::{debug, info, warn};
use shared::{MatchConfig, Message, Role, SCREEN_HEIGHT, SCREEN_WIDTH};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, RwLock};

/// When a connection learns its role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HandshakeMode {
    /// Send `MatchConfig` right after accept.
    Immediate,
    /// Hold `MatchConfig` back until both players have connected.
    Rendezvous,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub width: u32,
    pub height: u32,
    pub handshake: HandshakeMode,
    /// Pause between `StartSignal` and the first forwarded message.
    pub settle_delay: Duration,
    /// Lines queued per connection before gameplay traffic is dropped.
    pub outbox_capacity: usize,
    /// Longest a control message may wait for room in one outbox.
    pub control_send_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            width: SCREEN_WIDTH,
            height: SCREEN_HEIGHT,
            handshake: HandshakeMode::Rendezvous,
            settle_delay: Duration::from_secs(1),
            outbox_capacity: 256,
            control_send_timeout: Duration::from_secs(1),
        }
    }
}

/// A freshly registered connection.
pub struct Registration {
    pub client_id: u32,
    pub role: Role,
    /// Drained by the connection's writer task.
    pub outbox: mpsc::Receiver<Arc<str>>,
}

pub struct RelaySession {
    config: RelayConfig,
    clients: RwLock<ClientManager>,
    players_ready: watch::Sender<bool>,
}

impl RelaySession {
    pub fn new(config: RelayConfig) -> Self {
        let (players_ready, _) = watch::channel(false);
        Self {
            config,
            clients: RwLock::new(ClientManager::new()),
            players_ready,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Adds a connection to the live set and assigns its role.
    pub async fn register(&self, addr: SocketAddr) -> Registration {
        let (tx, rx) = mpsc::channel(self.config.outbox_capacity.max(1));

        let mut clients = self.clients.write().await;
        let (client_id, role) = clients.add_client(addr, tx);
        if role == Role::Right {
            info!("Both players connected, releasing the start gate");
        }
        if clients.players_present() {
            self.players_ready.send_replace(true);
        }

        Registration {
            client_id,
            role,
            outbox: rx,
        }
    }

    pub async fn unregister(&self, client_id: u32) -> Option<Role> {
        let mut clients = self.clients.write().await;
        clients.remove_client(client_id).map(|client| client.role)
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    pub fn players_present(&self) -> bool {
        *self.players_ready.borrow()
    }

    /// Resolves once both player roles have connected.
    pub async fn wait_for_players(&self) {
        let mut ready = self.players_ready.subscribe();
        loop {
            if *ready.borrow_and_update() {
                return;
            }
            // The sender lives as long as `self`
            if ready.changed().await.is_err() {
                return;
            }
        }
    }

    pub fn match_config(&self, role: Role) -> Message {
        Message::MatchConfig(MatchConfig {
            width: self.config.width,
            height: self.config.height,
            role,
        })
    }

    /// Dispatches one framed line received from `client_id`.
    ///
    /// Rematch requests are counted; every other well-formed message is
    /// relayed verbatim to the other connections. Malformed lines are dropped.
    pub async fn handle_line(&self, client_id: u32, line: &str) {
        match Message::from_line(line) {
            Ok(Message::RematchRequest { role }) => {
                self.record_rematch_vote(client_id, role).await;
            }
            Ok(message) => {
                debug!("Relaying {} from client {}", message.kind(), client_id);
                let mut raw = String::with_capacity(line.len() + 1);
                raw.push_str(line);
                raw.push('\n');
                self.forward(client_id, Arc::from(raw)).await;
            }
            Err(e) => {
                debug!("Skipping malformed line from client {}: {}", client_id, e);
            }
        }
    }

    /// Queues `line` for every connection except the sender.
    ///
    /// Never waits: a peer whose queue is full misses this line.
    pub async fn forward(&self, sender_id: u32, line: Arc<str>) {
        let recipients = {
            let clients = self.clients.read().await;
            clients.recipients(Some(sender_id))
        };

        for (client_id, outbox) in recipients {
            match outbox.try_send(Arc::clone(&line)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!("Client {} is not keeping up, dropping a message", client_id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Client {} is closing, not forwarding", client_id);
                }
            }
        }
    }

    /// Sends a control message to a single connection.
    pub async fn send_to(&self, client_id: u32, message: &Message) -> bool {
        let Some(line) = encode(message) else {
            return false;
        };
        let outbox = {
            let clients = self.clients.read().await;
            clients.get(client_id).map(|client| client.outbox.clone())
        };
        match outbox {
            Some(outbox) => self.send_control(client_id, &outbox, line).await,
            None => false,
        }
    }

    /// Sends a control message to every connection.
    pub async fn broadcast_control(&self, message: &Message) {
        let Some(line) = encode(message) else {
            return;
        };
        let recipients = {
            let clients = self.clients.read().await;
            clients.recipients(None)
        };
        for (client_id, outbox) in recipients {
            self.send_control(client_id, &outbox, Arc::clone(&line))
                .await;
        }
    }

    /// Counts a rematch vote and broadcasts the approval when it completes a pair.
    pub async fn record_rematch_vote(&self, client_id: u32, claimed: Role) -> VoteOutcome {
        let outcome = {
            let mut clients = self.clients.write().await;
            clients.record_vote(client_id, claimed)
        };

        match outcome {
            VoteOutcome::Recorded => {
                info!("Client {} ({}) wants a rematch", client_id, claimed);
            }
            VoteOutcome::Duplicate => {
                debug!("Client {} voted for a rematch again", client_id);
            }
            VoteOutcome::Approved => {
                info!("Rematch approved");
                self.broadcast_control(&Message::RematchApproval).await;
            }
            VoteOutcome::Rejected => {
                warn!(
                    "Ignoring rematch vote from client {} claiming role {}",
                    client_id, claimed
                );
            }
        }
        outcome
    }

    async fn send_control(&self, client_id: u32, outbox: &Outbox, line: Arc<str>) -> bool {
        match tokio::time::timeout(self.config.control_send_timeout, outbox.send(line)).await {
            Ok(Ok(())) => true,
            Ok(Err(_)) => {
                debug!("Client {} is closing, control message not sent", client_id);
                false
            }
            Err(_) => {
                warn!("Timed out queueing a control message for client {}", client_id);
                false
            }
        }
    }
}

fn encode(message: &Message) -> Option<Arc<str>> {
    match message.to_line() {
        Ok(line) => Some(Arc::from(line)),
        Err(e) => {
            warn!("Failed to encode {}: {}", message.kind(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn small_config(outbox_capacity: usize) -> RelayConfig {
        RelayConfig {
            outbox_capacity,
            control_send_timeout: Duration::from_millis(50),
            ..RelayConfig::default()
        }
    }

    fn drain(outbox: &mut mpsc::Receiver<Arc<str>>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = outbox.try_recv() {
            lines.push(line.to_string());
        }
        lines
    }

    #[tokio::test]
    async fn test_register_assigns_roles_and_opens_gate() {
        let session = RelaySession::new(RelayConfig::default());
        let left = session.register(test_addr(1)).await;
        assert_eq!(left.role, Role::Left);
        assert!(!session.players_present());

        let right = session.register(test_addr(2)).await;
        assert_eq!(right.role, Role::Right);
        assert!(session.players_present());
        assert_eq!(session.client_count().await, 2);
    }

    #[tokio::test]
    async fn test_wait_for_players_resolves_on_second_player() {
        let session = Arc::new(RelaySession::new(RelayConfig::default()));
        session.register(test_addr(1)).await;

        let waiter = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.wait_for_players().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        session.register(test_addr(2)).await;
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("gate never opened")
            .unwrap();
    }

    #[tokio::test]
    async fn test_gate_stays_open_after_player_leaves() {
        let session = RelaySession::new(RelayConfig::default());
        let left = session.register(test_addr(1)).await;
        session.register(test_addr(2)).await;
        assert_eq!(session.unregister(left.client_id).await, Some(Role::Left));

        tokio_test::assert_ready!(tokio_test::task::spawn(session.wait_for_players()).poll());
    }

    #[tokio::test]
    async fn test_handle_line_forwards_verbatim_to_others() {
        let session = RelaySession::new(RelayConfig::default());
        let mut left = session.register(test_addr(1)).await;
        let mut right = session.register(test_addr(2)).await;
        let mut spectator = session.register(test_addr(3)).await;

        let line = r#"{"ballX":1.5,"ballY":2,"paddleX":10,"paddleY":20,"lScore":0,"rScore":0,"role":"left","sync":7}"#;
        session.handle_line(left.client_id, line).await;

        assert!(drain(&mut left.outbox).is_empty());
        assert_eq!(drain(&mut right.outbox), vec![format!("{}\n", line)]);
        assert_eq!(drain(&mut spectator.outbox), vec![format!("{}\n", line)]);
    }

    #[tokio::test]
    async fn test_handle_line_keeps_surrounding_whitespace() {
        let session = RelaySession::new(RelayConfig::default());
        let left = session.register(test_addr(1)).await;
        let mut right = session.register(test_addr(2)).await;

        let mut framer = shared::LineFramer::new();
        let received = b"  {\"start_game\": true} \r\n";
        for line in framer.feed(received) {
            session.handle_line(left.client_id, &line).await;
        }

        let expected = String::from_utf8(received.to_vec()).unwrap();
        assert_eq!(drain(&mut right.outbox), vec![expected]);
    }

    #[tokio::test]
    async fn test_handle_line_skips_malformed() {
        let session = RelaySession::new(RelayConfig::default());
        let left = session.register(test_addr(1)).await;
        let mut right = session.register(test_addr(2)).await;

        session.handle_line(left.client_id, "{\"ballX\": 1").await;
        session.handle_line(left.client_id, "[1, 2, 3]").await;
        session.handle_line(left.client_id, "{\"hello\": 1}").await;

        assert!(drain(&mut right.outbox).is_empty());
    }

    #[tokio::test]
    async fn test_rematch_pair_broadcasts_single_approval() {
        let session = RelaySession::new(RelayConfig::default());
        let mut left = session.register(test_addr(1)).await;
        let mut right = session.register(test_addr(2)).await;
        let mut spectator = session.register(test_addr(3)).await;

        session
            .handle_line(left.client_id, r#"{"rematch":true,"role":"left"}"#)
            .await;
        session
            .handle_line(left.client_id, r#"{"rematch":true,"role":"left"}"#)
            .await;
        assert!(drain(&mut right.outbox).is_empty());

        session
            .handle_line(right.client_id, r#"{"rematch":true,"role":"right"}"#)
            .await;

        let approval = "{\"rematch\":true}\n".to_string();
        assert_eq!(drain(&mut left.outbox), vec![approval.clone()]);
        assert_eq!(drain(&mut right.outbox), vec![approval.clone()]);
        assert_eq!(drain(&mut spectator.outbox), vec![approval]);
    }

    #[tokio::test]
    async fn test_mismatched_vote_rejected() {
        let session = RelaySession::new(RelayConfig::default());
        let left = session.register(test_addr(1)).await;
        session.register(test_addr(2)).await;

        let outcome = session.record_rematch_vote(left.client_id, Role::Right).await;
        assert_eq!(outcome, VoteOutcome::Rejected);
    }

    #[tokio::test]
    async fn test_full_outbox_drops_only_for_that_peer() {
        let session = RelaySession::new(small_config(1));
        let left = session.register(test_addr(1)).await;
        let mut right = session.register(test_addr(2)).await;
        let mut spectator = session.register(test_addr(3)).await;

        session.forward(left.client_id, Arc::from("a\n")).await;
        // Right drains, spectator does not
        assert_eq!(drain(&mut right.outbox), vec!["a\n".to_string()]);
        session.forward(left.client_id, Arc::from("b\n")).await;

        assert_eq!(drain(&mut right.outbox), vec!["b\n".to_string()]);
        assert_eq!(drain(&mut spectator.outbox), vec!["a\n".to_string()]);
    }

    #[tokio::test]
    async fn test_control_send_times_out_on_full_outbox() {
        let session = RelaySession::new(small_config(1));
        let left = session.register(test_addr(1)).await;
        let _right = session.register(test_addr(2)).await;

        assert!(session.send_to(left.client_id, &Message::StartSignal).await);
        // Nobody drains the queue
        assert!(!session.send_to(left.client_id, &Message::StartSignal).await);
        assert!(!session.send_to(999, &Message::StartSignal).await);
    }

    #[test]
    fn test_match_config_uses_configured_size() {
        let session = RelaySession::new(RelayConfig {
            width: 800,
            height: 600,
            ..RelayConfig::default()
        });
        assert_eq!(
            session.match_config(Role::Spectator),
            Message::MatchConfig(MatchConfig {
                width: 800,
                height: 600,
                role: Role::Spectator,
            })
        );
    }
}
