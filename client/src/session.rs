//! Client match lifecycle: INITIAL → PLAYING → WIN → REMATCH → PLAYING …
//!
//! [`Session`] is the explicit context threaded through every tick. It owns the
//! predicted [`World`] and the logical clock, decides which inbound messages
//! matter in the current phase, and returns the messages to transmit. It does
//! no I/O, so the whole state machine runs the same under test as in the game.

use log::{debug, info};
use shared::{
    Direction, Message, PhysicsEvents, Role, Side, World, SCREEN_HEIGHT, SCREEN_WIDTH,
    START_COUNTDOWN_TICKS, WIN_DISPLAY_TICKS,
};

use crate::reconcile::{reconcile, snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initial,
    Playing,
    Win,
    Rematch,
}

/// Player intent sampled for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickInput {
    pub direction: Direction,
    /// Rematch confirmation key was pressed.
    pub confirm: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TickOutput {
    pub outgoing: Vec<Message>,
    pub events: PhysicsEvents,
    /// `remote.sync - local.sync` for each update merged this tick.
    pub sync_leads: Vec<i64>,
}

pub struct Session {
    phase: Phase,
    role: Option<Role>,
    world: World,
    sync: u64,
    start_received: bool,
    countdown: u32,
    win_ticks: u32,
    winner: Option<Side>,
    rematch_requested: bool,
}

impl Session {
    pub fn new() -> Self {
        Self {
            phase: Phase::Initial,
            role: None,
            world: World::new(SCREEN_WIDTH as f32, SCREEN_HEIGHT as f32),
            sync: 0,
            start_received: false,
            countdown: START_COUNTDOWN_TICKS,
            win_ticks: 0,
            winner: None,
            rematch_requested: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn sync(&self) -> u64 {
        self.sync
    }

    pub fn winner(&self) -> Option<Side> {
        self.winner
    }

    /// Ticks left before play starts, once the start signal has arrived.
    pub fn countdown(&self) -> Option<u32> {
        self.start_received.then_some(self.countdown)
    }

    pub fn rematch_requested(&self) -> bool {
        self.rematch_requested
    }

    /// Processes `inbound` messages, then advances one tick.
    pub fn tick<I>(&mut self, input: TickInput, inbound: I) -> TickOutput
    where
        I: IntoIterator<Item = Message>,
    {
        let mut output = TickOutput::default();

        for message in inbound {
            self.receive(message, &mut output);
        }

        match self.phase {
            Phase::Initial => self.tick_initial(),
            Phase::Playing => self.tick_playing(input, &mut output),
            Phase::Win => self.tick_win(),
            Phase::Rematch => self.tick_rematch(input, &mut output),
        }

        output
    }

    fn receive(&mut self, message: Message, output: &mut TickOutput) {
        match message {
            Message::MatchConfig(config) => {
                if self.phase != Phase::Initial || self.role.is_some() {
                    debug!("Ignoring repeated match config");
                    return;
                }
                info!(
                    "Assigned role {} on a {}x{} field",
                    config.role, config.width, config.height
                );
                self.role = Some(config.role);
                self.world = World::new(config.width as f32, config.height as f32);
            }
            Message::StartSignal => {
                if self.phase == Phase::Initial && !self.start_received {
                    info!("Both players present, starting countdown");
                    self.start_received = true;
                    self.countdown = START_COUNTDOWN_TICKS;
                }
            }
            Message::StateUpdate(update) => {
                let (Phase::Playing, Some(role)) = (self.phase, self.role) else {
                    debug!("Discarding state update outside of play");
                    return;
                };
                output
                    .sync_leads
                    .push(sync_lead(update.sync, self.sync));
                reconcile(&mut self.world, &mut self.sync, role, &update);
            }
            Message::RematchApproval => {
                if matches!(self.phase, Phase::Win | Phase::Rematch) {
                    info!("Rematch approved");
                    self.reset_match();
                }
            }
            Message::RematchRequest { role } => {
                debug!("Ignoring rematch request relayed from {}", role);
            }
        }
    }

    fn tick_initial(&mut self) {
        if self.role.is_none() || !self.start_received {
            return;
        }
        self.countdown = self.countdown.saturating_sub(1);
        if self.countdown == 0 {
            self.phase = Phase::Playing;
        }
    }

    fn tick_playing(&mut self, input: TickInput, output: &mut TickOutput) {
        let Some(role) = self.role else {
            return;
        };

        if let Some(side) = role.side() {
            self.world.paddle_mut(side).moving = input.direction;
        }
        self.world.step_paddles();

        if let Some(winner) = self.world.winner() {
            info!("Match over, {:?} wins", winner);
            self.winner = Some(winner);
            self.win_ticks = WIN_DISPLAY_TICKS;
            self.phase = Phase::Win;
        } else {
            output.events = self.world.step_ball();
        }

        // Spectators only observe; they neither tick the clock nor transmit.
        if role.is_player() {
            self.sync = self.sync.saturating_add(1);
            if let Some(update) = snapshot(&self.world, role, self.sync) {
                output.outgoing.push(Message::StateUpdate(update));
            }
        }
    }

    fn tick_win(&mut self) {
        self.win_ticks = self.win_ticks.saturating_sub(1);
        if self.win_ticks == 0 {
            self.phase = Phase::Rematch;
        }
    }

    fn tick_rematch(&mut self, input: TickInput, output: &mut TickOutput) {
        let Some(role) = self.role.filter(|role| role.is_player()) else {
            return;
        };
        if input.confirm && !self.rematch_requested {
            info!("Requesting rematch as {}", role);
            self.rematch_requested = true;
            output.outgoing.push(Message::RematchRequest { role });
        }
    }

    fn reset_match(&mut self) {
        self.world.reset();
        self.sync = 0;
        self.winner = None;
        self.win_ticks = 0;
        self.rematch_requested = false;
        self.phase = Phase::Playing;
    }
}

/// `remote - local`, clamped to the range of `i64`.
fn sync_lead(remote: u64, local: u64) -> i64 {
    let remote = i64::try_from(remote).unwrap_or(i64::MAX);
    let local = i64::try_from(local).unwrap_or(i64::MAX);
    remote.saturating_sub(local)
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
