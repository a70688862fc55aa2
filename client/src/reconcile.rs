//! Merging a peer's state updates into the locally predicted world.
//!
//! Paddle positions are always taken from the latest report. Ball position and
//! scores are taken only from an update whose `sync` is strictly ahead of ours,
//! and our clock then jumps to that value. A client that is behind snaps to the
//! ahead side's ball; a client that is ahead ignores the stale report.

use shared::{Role, StateUpdate, World};

/// What a single merge changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Reconciled {
    pub paddle_applied: bool,
    /// Ball, scores and clock were replaced by the remote values.
    pub adopted: bool,
}

/// Applies `remote` to `world` as seen by a client holding `own_role`.
///
/// Afterwards `*local_sync == max(previous, remote.sync)`.
pub fn reconcile(
    world: &mut World,
    local_sync: &mut u64,
    own_role: Role,
    remote: &StateUpdate,
) -> Reconciled {
    let mut result = Reconciled::default();

    // Our own paddle is driven locally; every other reported paddle is trusted.
    if let Some(side) = remote.role.side() {
        if Some(side) != own_role.side() {
            world
                .paddle_mut(side)
                .set_position(remote.paddle_x, remote.paddle_y);
            result.paddle_applied = true;
        }
    }

    if remote.sync > *local_sync {
        world.ball.rect.x = remote.ball_x;
        world.ball.rect.y = remote.ball_y;
        world.l_score = remote.l_score;
        world.r_score = remote.r_score;
        *local_sync = remote.sync;
        result.adopted = true;
    }

    result
}

/// The update a player sends after a tick.
///
/// Returns `None` for spectators, which never transmit state.
pub fn snapshot(world: &World, role: Role, sync: u64) -> Option<StateUpdate> {
    let side = role.side()?;
    let paddle = world.paddle(side);
    Some(StateUpdate {
        ball_x: world.ball.rect.x,
        ball_y: world.ball.rect.y,
        paddle_x: paddle.rect.x,
        paddle_y: paddle.rect.y,
        l_score: world.l_score,
        r_score: world.r_score,
        role,
        sync,
    })
}
