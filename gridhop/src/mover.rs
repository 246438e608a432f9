//! Per-mover movement state machine.
//!
//! A mover walks its path one hop at a time: turn to face the next cell, hop
//! to it along a sine arch, pause briefly, repeat. The machine is advanced by
//! [`Mover::tick`] with the elapsed frame time; leftover time after a phase
//! finishes flows into the next phase within the same tick.
//!
//! Occupancy is handed over atomically when a hop lands, so between ticks the
//! only occupied cell belonging to a mover is its current cell.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::grid::{CellTag, Grid, GridCoord};
use crate::layout::WorldLayout;
use crate::math::{self, Quat, Transform, Vec3};
use crate::pathfinding::{AStarPathfinder, Path};

/// Unique identifier for a mover on a board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MoverId(pub(crate) u32);

impl MoverId {
    /// Get the underlying integer ID (useful for debugging or serialization).
    pub fn to_u32(self) -> u32 {
        self.0
    }
}

/// Where a mover's destinations come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoverKind {
    /// Destinations are picked externally.
    Controlled,
    /// Chases another mover, re-targeting whenever it completes a step.
    Follower { target: MoverId },
}

impl MoverKind {
    pub fn arrival(&self) -> Arrival {
        match self {
            MoverKind::Controlled => Arrival::Enter,
            MoverKind::Follower { .. } => Arrival::StopAdjacent,
        }
    }
}

/// What a mover does with the destination cell itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arrival {
    /// Walk onto the destination.
    Enter,
    /// Stop on the last cell before the destination.
    StopAdjacent,
}

/// Movement tuning.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoverConfig {
    /// Hops per second.
    pub move_speed: f32,
    /// Peak height of the hop arch.
    pub jump_height: f32,
    /// Turning speed in degrees per second. Zero turns instantly.
    pub rotation_speed: f32,
    /// Pause after each hop, in seconds.
    pub settle_delay: f32,
    /// How far above its cell's world position the mover stands.
    pub stand_height: f32,
}

impl Default for MoverConfig {
    fn default() -> Self {
        Self {
            move_speed: 5.0,
            jump_height: 0.5,
            rotation_speed: 720.0,
            settle_delay: 0.1,
            stand_height: 0.5,
        }
    }
}

impl MoverConfig {
    #[must_use]
    pub fn with_move_speed(mut self, move_speed: f32) -> Self {
        self.move_speed = move_speed;
        self
    }

    #[must_use]
    pub fn with_jump_height(mut self, jump_height: f32) -> Self {
        self.jump_height = jump_height;
        self
    }

    #[must_use]
    pub fn with_rotation_speed(mut self, rotation_speed: f32) -> Self {
        self.rotation_speed = rotation_speed;
        self
    }

    #[must_use]
    pub fn with_settle_delay(mut self, settle_delay: f32) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(name: &'static str, reason: String) -> Result<(), ConfigError> {
            Err(ConfigError::InvalidSetting { name, reason })
        }

        if !self.move_speed.is_finite() || self.move_speed <= 0.0 {
            return invalid("move_speed", format!("must be positive, got {}", self.move_speed));
        }
        if !self.rotation_speed.is_finite() || self.rotation_speed < 0.0 {
            return invalid(
                "rotation_speed",
                format!("must not be negative, got {}", self.rotation_speed),
            );
        }
        if !self.settle_delay.is_finite() || self.settle_delay < 0.0 {
            return invalid(
                "settle_delay",
                format!("must not be negative, got {}", self.settle_delay),
            );
        }
        if !self.jump_height.is_finite() || !self.stand_height.is_finite() {
            return invalid("jump_height", "heights must be finite".to_string());
        }
        Ok(())
    }

    fn hop_duration(&self) -> f32 {
        1.0 / self.move_speed
    }
}

/// Observable movement phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    Rotating,
    Advancing,
    SettlePause,
}

/// Something a mover did during a request, notification or tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoverEvent {
    /// A hop landed on `cell`; `next` is the following step, if any.
    StepCompleted {
        mover: MoverId,
        cell: GridCoord,
        next: Option<GridCoord>,
    },
    /// The whole path was walked.
    Finished { mover: MoverId, cell: GridCoord },
    /// The remaining path was replaced after an obstacle change.
    Replanned { mover: MoverId, steps: usize },
    /// Movement stopped before the destination.
    Parked { mover: MoverId, cell: GridCoord },
}

impl MoverEvent {
    pub fn mover(&self) -> MoverId {
        match self {
            MoverEvent::StepCompleted { mover, .. }
            | MoverEvent::Finished { mover, .. }
            | MoverEvent::Replanned { mover, .. }
            | MoverEvent::Parked { mover, .. } => *mover,
        }
    }
}

/// Borrowed board state a mover needs to act.
pub(crate) struct MoveContext<'a> {
    pub grid: &'a mut Grid,
    pub layout: &'a dyn WorldLayout,
    pub pathfinder: &'a AStarPathfinder,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Motion {
    Idle,
    Rotating {
        from: Quat,
        to: Quat,
        elapsed: f32,
        duration: f32,
    },
    Advancing {
        target: GridCoord,
        start: Vec3,
        end: Vec3,
        elapsed: f32,
        duration: f32,
    },
    SettlePause {
        elapsed: f32,
    },
}

/// Result of planning from the current cell.
enum Plan {
    Walk(Path),
    /// Nothing left to walk: on the destination, or beside it for followers.
    Arrived,
    Unreachable,
}

/// Work deferred to the next hop boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pending {
    Request(GridCoord),
    Replan,
}

#[derive(Clone, Debug)]
pub struct Mover {
    id: MoverId,
    kind: MoverKind,
    config: MoverConfig,
    current: GridCoord,
    destination: Option<GridCoord>,
    path: Path,
    next_step: usize,
    motion: Motion,
    pending: Option<Pending>,
    transform: Transform,
}

impl Mover {
    /// Place a new mover on `spawn` and mark the cell occupied.
    pub(crate) fn spawn(
        id: MoverId,
        kind: MoverKind,
        config: MoverConfig,
        spawn: GridCoord,
        ctx: &mut MoveContext<'_>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let cell = ctx
            .grid
            .get_mut(spawn)
            .ok_or(ConfigError::SpawnOutOfBounds(spawn))?;
        if !cell.walkable {
            return Err(ConfigError::SpawnNotWalkable(spawn));
        }
        if cell.occupied {
            return Err(ConfigError::SpawnOccupied(spawn));
        }
        cell.occupied = true;

        let position = ctx.layout.world_position(spawn) + Vec3::new(0.0, config.stand_height, 0.0);
        Ok(Self {
            id,
            kind,
            config,
            current: spawn,
            destination: None,
            path: Path::default(),
            next_step: 0,
            motion: Motion::Idle,
            pending: None,
            transform: Transform::new(position),
        })
    }

    pub fn id(&self) -> MoverId {
        self.id
    }

    pub fn kind(&self) -> MoverKind {
        self.kind
    }

    pub fn config(&self) -> &MoverConfig {
        &self.config
    }

    pub fn current_cell(&self) -> GridCoord {
        self.current
    }

    /// Destination of the path being walked.
    pub fn destination(&self) -> Option<GridCoord> {
        self.destination
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Steps not yet completed. During a hop this includes the hop target.
    pub fn remaining_steps(&self) -> &[GridCoord] {
        self.path.steps().get(self.next_step..).unwrap_or(&[])
    }

    /// The cell the mover is heading to next.
    pub fn next_cell(&self) -> Option<GridCoord> {
        self.path.get(self.next_step)
    }

    pub fn phase(&self) -> Phase {
        match self.motion {
            Motion::Idle => Phase::Idle,
            Motion::Rotating { .. } => Phase::Rotating,
            Motion::Advancing { .. } => Phase::Advancing,
            Motion::SettlePause { .. } => Phase::SettlePause,
        }
    }

    pub fn is_moving(&self) -> bool {
        self.motion != Motion::Idle
    }

    fn stand_position(&self, layout: &dyn WorldLayout, coord: GridCoord) -> Vec3 {
        layout.world_position(coord) + Vec3::new(0.0, self.config.stand_height, 0.0)
    }

    /// Ask the mover to go to `destination`.
    ///
    /// Unwalkable destinations and the current cell are ignored. A request
    /// made mid-hop takes effect when the hop lands.
    pub(crate) fn request_move(&mut self, ctx: &mut MoveContext<'_>, destination: GridCoord) {
        if !ctx.grid.is_walkable(destination) {
            log::debug!("{:?}: ignoring request to unwalkable {}", self.id, destination);
            return;
        }
        if matches!(self.motion, Motion::Advancing { .. }) {
            self.pending = Some(Pending::Request(destination));
            return;
        }
        if destination == self.current {
            log::debug!("{:?}: already at {}", self.id, destination);
            return;
        }
        self.head_for(ctx, destination);
    }

    /// React to an obstacle change by re-planning the rest of the path.
    pub(crate) fn obstacles_changed(&mut self, ctx: &mut MoveContext<'_>, events: &mut Vec<MoverEvent>) {
        if !self.is_moving() || self.remaining_steps().is_empty() {
            return;
        }

        if let Motion::Advancing { target, .. } = self.motion {
            if ctx.grid.is_walkable(target) {
                if self.pending.is_none() {
                    self.pending = Some(Pending::Replan);
                }
                return;
            }
            // The hop target vanished under us: land back where the hop started.
            log::debug!("{:?}: hop target {} blocked, snapping back to {}", self.id, target, self.current);
            ctx.grid.set_reserved(target, false);
            self.transform.position = self.stand_position(ctx.layout, self.current);
            self.pending = None;
        }

        self.replan(ctx, events);
    }

    /// Replace the current path with one toward `destination`.
    ///
    /// An unreachable destination leaves the mover as it was. Arriving ends
    /// any path in progress at the current cell.
    fn head_for(&mut self, ctx: &mut MoveContext<'_>, destination: GridCoord) {
        match self.plan(ctx, destination) {
            Plan::Walk(path) => {
                self.clear_remaining_highlight(ctx.grid);
                self.adopt_path(ctx, path, destination);
            }
            Plan::Arrived if self.is_moving() => {
                log::debug!("{:?}: {} reached early, stopping at {}", self.id, destination, self.current);
                self.end_path(ctx);
            }
            Plan::Arrived => {}
            Plan::Unreachable => {
                log::debug!("{:?}: no path from {} to {}", self.id, self.current, destination);
            }
        }
    }

    fn plan(&self, ctx: &mut MoveContext<'_>, destination: GridCoord) -> Plan {
        if destination == self.current {
            return Plan::Arrived;
        }
        let Some(path) = ctx.pathfinder.find_path(ctx.grid, self.current, destination) else {
            return Plan::Unreachable;
        };
        let path = match self.kind.arrival() {
            Arrival::Enter => path,
            Arrival::StopAdjacent => path.without_goal(),
        };
        if path.is_empty() {
            Plan::Arrived
        } else {
            Plan::Walk(path)
        }
    }

    /// Drop the rest of the path; the settle pause then finishes here.
    fn end_path(&mut self, ctx: &mut MoveContext<'_>) {
        self.clear_remaining_highlight(ctx.grid);
        self.path = Path::default();
        self.next_step = 0;
        self.destination = None;
        self.pending = None;
        if !matches!(self.motion, Motion::SettlePause { .. }) {
            self.transform.position = self.stand_position(ctx.layout, self.current);
            self.motion = Motion::SettlePause { elapsed: 0.0 };
        }
    }

    fn adopt_path(&mut self, ctx: &mut MoveContext<'_>, path: Path, destination: GridCoord) {
        for step in path.iter() {
            ctx.grid.set_tag(*step, CellTag::Path);
        }
        self.path = path;
        self.next_step = 0;
        self.destination = Some(destination);
        self.pending = None;
        self.start_rotation(ctx);
    }

    fn replan(&mut self, ctx: &mut MoveContext<'_>, events: &mut Vec<MoverEvent>) {
        self.clear_remaining_highlight(ctx.grid);
        let Some(destination) = self.destination else {
            self.park(ctx, events);
            return;
        };

        match self.plan(ctx, destination) {
            Plan::Walk(path) => {
                let steps = path.len();
                self.adopt_path(ctx, path, destination);
                events.push(MoverEvent::Replanned { mover: self.id, steps });
            }
            Plan::Arrived => self.end_path(ctx),
            Plan::Unreachable => self.park(ctx, events),
        }
    }

    /// Stop at the current cell without finishing.
    fn park(&mut self, ctx: &mut MoveContext<'_>, events: &mut Vec<MoverEvent>) {
        log::debug!("{:?}: parked at {}", self.id, self.current);
        self.clear_remaining_highlight(ctx.grid);
        ctx.grid.set_tag(self.current, CellTag::None);
        self.transform.position = self.stand_position(ctx.layout, self.current);
        self.path = Path::default();
        self.next_step = 0;
        self.destination = None;
        self.pending = None;
        self.motion = Motion::Idle;
        events.push(MoverEvent::Parked {
            mover: self.id,
            cell: self.current,
        });
    }

    fn clear_remaining_highlight(&self, grid: &mut Grid) {
        for step in self.remaining_steps() {
            grid.set_tag(*step, CellTag::None);
        }
    }

    fn start_rotation(&mut self, ctx: &mut MoveContext<'_>) {
        let Some(next) = self.next_cell() else {
            self.motion = Motion::SettlePause { elapsed: 0.0 };
            return;
        };
        let from = self.transform.rotation;
        let direction = self.stand_position(ctx.layout, next) - self.transform.position;
        let to = math::look_rotation(direction).unwrap_or(from);
        let duration = math::rotation_duration(from, to, self.config.rotation_speed);
        self.motion = Motion::Rotating {
            from,
            to,
            elapsed: 0.0,
            duration,
        };
    }

    fn begin_hop(&mut self, ctx: &mut MoveContext<'_>, events: &mut Vec<MoverEvent>) {
        let Some(target) = self.next_cell() else {
            self.park(ctx, events);
            return;
        };
        if ctx.grid.is_claimed(target) {
            log::debug!("{:?}: next cell {} is occupied", self.id, target);
            self.park(ctx, events);
            return;
        }
        if !ctx.grid.is_walkable(target) {
            self.replan(ctx, events);
            return;
        }

        ctx.grid.set_reserved(target, true);
        self.motion = Motion::Advancing {
            target,
            start: self.transform.position,
            end: self.stand_position(ctx.layout, target),
            elapsed: 0.0,
            duration: self.config.hop_duration(),
        };
    }

    fn land_hop(&mut self, ctx: &mut MoveContext<'_>, target: GridCoord, end: Vec3, events: &mut Vec<MoverEvent>) {
        self.transform.position = end;
        let previous = self.current;
        ctx.grid.hand_over_occupancy(previous, target);
        self.current = target;
        ctx.grid.set_tag(previous, CellTag::None);
        self.next_step += 1;

        // Deferred work runs first so the step event reports the real next cell.
        let step_event_at = events.len();
        self.motion = Motion::SettlePause { elapsed: 0.0 };
        match self.pending.take() {
            Some(Pending::Request(destination)) => self.head_for(ctx, destination),
            Some(Pending::Replan) if !self.remaining_steps().is_empty() => {
                self.replan(ctx, events);
            }
            _ => {}
        }
        events.insert(
            step_event_at,
            MoverEvent::StepCompleted {
                mover: self.id,
                cell: target,
                next: self.next_cell(),
            },
        );
    }

    fn finish_settle(&mut self, ctx: &mut MoveContext<'_>, events: &mut Vec<MoverEvent>) {
        if self.remaining_steps().is_empty() {
            ctx.grid.set_tag(self.current, CellTag::None);
            self.motion = Motion::Idle;
            self.path = Path::default();
            self.next_step = 0;
            self.destination = None;
            events.push(MoverEvent::Finished {
                mover: self.id,
                cell: self.current,
            });
        } else {
            self.start_rotation(ctx);
        }
    }

    /// Advance the state machine by `dt` seconds.
    pub(crate) fn tick(&mut self, dt: f32, ctx: &mut MoveContext<'_>, events: &mut Vec<MoverEvent>) {
        let mut remaining = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };

        loop {
            match self.motion {
                Motion::Idle => break,
                Motion::Rotating {
                    from,
                    to,
                    elapsed,
                    duration,
                } => {
                    let needed = (duration - elapsed).max(0.0);
                    if remaining < needed {
                        let elapsed = elapsed + remaining;
                        self.transform.rotation = from.slerp(to, math::progress(elapsed, duration));
                        self.motion = Motion::Rotating {
                            from,
                            to,
                            elapsed,
                            duration,
                        };
                        break;
                    }
                    remaining -= needed;
                    self.transform.rotation = to;
                    self.begin_hop(ctx, events);
                }
                Motion::Advancing {
                    target,
                    start,
                    end,
                    elapsed,
                    duration,
                } => {
                    let needed = (duration - elapsed).max(0.0);
                    if remaining < needed {
                        let elapsed = elapsed + remaining;
                        let t = math::progress(elapsed, duration);
                        self.transform.position = math::hop_position(start, end, t, self.config.jump_height);
                        self.motion = Motion::Advancing {
                            target,
                            start,
                            end,
                            elapsed,
                            duration,
                        };
                        break;
                    }
                    remaining -= needed;
                    self.land_hop(ctx, target, end, events);
                }
                Motion::SettlePause { elapsed } => {
                    let needed = (self.config.settle_delay - elapsed).max(0.0);
                    if remaining < needed {
                        self.motion = Motion::SettlePause {
                            elapsed: elapsed + remaining,
                        };
                        break;
                    }
                    remaining -= needed;
                    self.finish_settle(ctx, events);
                }
            }
        }
    }

    /// Release the mover's cell and highlight before it is removed.
    pub(crate) fn release(&self, grid: &mut Grid) {
        self.clear_remaining_highlight(grid);
        if let Motion::Advancing { target, .. } = self.motion {
            grid.set_reserved(target, false);
        }
        if let Some(cell) = grid.get_mut(self.current) {
            cell.occupied = false;
        }
    }
}
