//! The board: single owner of a grid and everything moving on it.
//!
//! All mutation goes through `&mut Board`, which serializes cell writes and
//! path searches (the search scratch lives on the cells). Movers hold
//! coordinates, never references into the grid.
//!
//! Observers are tied to mover lifetimes: every mover watches obstacle
//! changes from spawn to despawn, and a follower watches its target's steps.

use std::collections::{BTreeMap, HashMap};

use crate::config::{BoardConfig, SpawnKind};
use crate::error::ConfigError;
use crate::grid::{Grid, GridCoord};
use crate::layout::{TileLayout, WorldLayout};
use crate::math::{Transform, Vec3};
use crate::mover::{MoveContext, Mover, MoverConfig, MoverEvent, MoverId, MoverKind, Phase};
use crate::obstacles::{self, MarkerSet, ObstacleMap, ObstacleSource, ObstacleVisuals, SyncReport};
use crate::pathfinding::AStarPathfinder;

/// Handle returned by [`Board::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u32);

type Listener = Box<dyn FnMut(&MoverEvent)>;

#[derive(Default)]
struct Subscriptions {
    /// Movers re-planned on every obstacle change, in spawn order.
    obstacle_watchers: Vec<MoverId>,
    /// Target mover -> followers chasing it.
    chasers: HashMap<MoverId, Vec<MoverId>>,
}

impl Subscriptions {
    fn register(&mut self, mover: &Mover) {
        self.obstacle_watchers.push(mover.id());
        if let MoverKind::Follower { target } = mover.kind() {
            self.chasers.entry(target).or_default().push(mover.id());
        }
    }

    fn deregister(&mut self, id: MoverId) {
        self.obstacle_watchers.retain(|watcher| *watcher != id);
        self.chasers.remove(&id);
        for followers in self.chasers.values_mut() {
            followers.retain(|follower| *follower != id);
        }
    }

    fn chasers_of(&self, target: MoverId) -> Vec<MoverId> {
        self.chasers.get(&target).cloned().unwrap_or_default()
    }
}

pub struct Board {
    grid: Grid,
    layout: Box<dyn WorldLayout>,
    pathfinder: AStarPathfinder,
    obstacles: Box<dyn ObstacleSource>,
    visuals: Box<dyn ObstacleVisuals>,
    movers: BTreeMap<MoverId, Mover>,
    next_id: u32,
    subscriptions: Subscriptions,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u32,
}

impl Board {
    /// Build a board and run the first walkability sync.
    ///
    /// Fails if the grid is empty or the obstacle map's shape differs from it.
    pub fn new(
        width: usize,
        height: usize,
        layout: Box<dyn WorldLayout>,
        obstacles: Box<dyn ObstacleSource>,
        visuals: Box<dyn ObstacleVisuals>,
    ) -> Result<Self, ConfigError> {
        let grid = Grid::new(width, height)?;
        obstacles::check_dimensions(&grid, obstacles.as_ref())?;

        let mut board = Self {
            grid,
            layout,
            pathfinder: AStarPathfinder::new(),
            obstacles,
            visuals,
            movers: BTreeMap::new(),
            next_id: 1,
            subscriptions: Subscriptions::default(),
            listeners: Vec::new(),
            next_listener: 1,
        };
        board.recompute_walkability()?;
        log::info!("Board created: {}x{} cells", width, height);
        Ok(board)
    }

    /// Open board with a [`TileLayout`] and in-memory markers.
    pub fn open(width: usize, height: usize, tile_radius: f32) -> Result<Self, ConfigError> {
        let layout = TileLayout::for_grid(Vec3::ZERO, width, height, tile_radius)?;
        Self::new(
            width,
            height,
            Box::new(layout),
            Box::new(ObstacleMap::new(width, height)),
            Box::new(MarkerSet::new()),
        )
    }

    /// Build a board from configuration, placing every configured mover.
    pub fn from_config(config: &BoardConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let layout = TileLayout::for_grid(Vec3::from(config.origin), config.width, config.height, config.tile_radius)?;
        let obstacles = match &config.obstacles {
            Some(flags) => ObstacleMap::from_flags(config.width, config.height, flags.clone())?,
            None => ObstacleMap::new(config.width, config.height),
        };

        let mut board = Self::new(
            config.width,
            config.height,
            Box::new(layout),
            Box::new(obstacles),
            Box::new(MarkerSet::new()),
        )?;
        if let Some(max_expansions) = config.max_expansions {
            board.pathfinder = board.pathfinder.with_max_expansions(max_expansions);
        }

        let mut ids = Vec::with_capacity(config.spawns.len());
        for spawn in &config.spawns {
            let kind = match spawn.kind {
                SpawnKind::Controlled => MoverKind::Controlled,
                SpawnKind::Follower { target } => {
                    let target = ids.get(target).copied().ok_or_else(|| ConfigError::InvalidSetting {
                        name: "spawns",
                        reason: format!("follower targets unknown spawn #{target}"),
                    })?;
                    MoverKind::Follower { target }
                }
            };
            let mover_config = spawn.mover.unwrap_or(config.mover);
            ids.push(board.spawn_mover(kind, spawn.coord, mover_config)?);
        }
        Ok(board)
    }

    #[must_use]
    pub fn with_pathfinder(mut self, pathfinder: AStarPathfinder) -> Self {
        self.pathfinder = pathfinder;
        self
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn obstacles(&self) -> &dyn ObstacleSource {
        self.obstacles.as_ref()
    }

    pub fn visuals(&self) -> &dyn ObstacleVisuals {
        self.visuals.as_ref()
    }

    pub fn world_position(&self, coord: GridCoord) -> Vec3 {
        self.layout.world_position(coord)
    }

    fn split(&mut self) -> (MoveContext<'_>, &mut BTreeMap<MoverId, Mover>) {
        (
            MoveContext {
                grid: &mut self.grid,
                layout: self.layout.as_ref(),
                pathfinder: &self.pathfinder,
            },
            &mut self.movers,
        )
    }

    /// Place a mover on `spawn`. Followers immediately start chasing.
    pub fn spawn_mover(
        &mut self,
        kind: MoverKind,
        spawn: GridCoord,
        config: MoverConfig,
    ) -> Result<MoverId, ConfigError> {
        if let MoverKind::Follower { target } = kind {
            if !self.movers.contains_key(&target) {
                return Err(ConfigError::UnknownMover(target));
            }
        }

        let id = MoverId(self.next_id);
        let following = self.next_id.checked_add(1).ok_or(ConfigError::MoverIdsExhausted)?;
        let (mut ctx, movers) = self.split();
        let mover = Mover::spawn(id, kind, config, spawn, &mut ctx)?;
        movers.insert(id, mover);
        self.next_id = following;

        if let Some(mover) = self.movers.get(&id) {
            self.subscriptions.register(mover);
        }
        log::debug!("Spawned {:?} ({:?}) at {}", id, kind, spawn);

        if let MoverKind::Follower { target } = kind {
            if let Some(cell) = self.current_cell(target) {
                self.request_move(id, cell);
            }
        }
        Ok(id)
    }

    /// Remove a mover, freeing its cell. Returns `false` for unknown ids.
    pub fn despawn_mover(&mut self, id: MoverId) -> bool {
        let Some(mover) = self.movers.remove(&id) else {
            return false;
        };
        mover.release(&mut self.grid);
        self.subscriptions.deregister(id);
        log::debug!("Despawned {:?}", id);
        true
    }

    pub fn mover(&self, id: MoverId) -> Option<&Mover> {
        self.movers.get(&id)
    }

    /// All movers in spawn order.
    pub fn movers(&self) -> impl Iterator<Item = &Mover> {
        self.movers.values()
    }

    pub fn mover_ids(&self) -> Vec<MoverId> {
        self.movers.keys().copied().collect()
    }

    pub fn current_cell(&self, id: MoverId) -> Option<GridCoord> {
        self.movers.get(&id).map(Mover::current_cell)
    }

    pub fn is_moving(&self, id: MoverId) -> bool {
        self.movers.get(&id).map(Mover::is_moving).unwrap_or(false)
    }

    pub fn phase(&self, id: MoverId) -> Option<Phase> {
        self.movers.get(&id).map(Mover::phase)
    }

    pub fn transform(&self, id: MoverId) -> Option<Transform> {
        self.movers.get(&id).map(|mover| *mover.transform())
    }

    /// Send `id` toward `destination`. Invalid requests are ignored.
    pub fn request_move(&mut self, id: MoverId, destination: GridCoord) {
        let (mut ctx, movers) = self.split();
        match movers.get_mut(&id) {
            Some(mover) => mover.request_move(&mut ctx, destination),
            None => log::debug!("Move request for unknown {:?}", id),
        }
    }

    /// Advance every mover by `dt` seconds and return what happened.
    ///
    /// Followers are re-targeted after all movers have ticked.
    pub fn tick(&mut self, dt: f32) -> Vec<MoverEvent> {
        let mut events = Vec::new();
        {
            let (mut ctx, movers) = self.split();
            for mover in movers.values_mut() {
                mover.tick(dt, &mut ctx, &mut events);
            }
        }

        self.retarget_chasers(&events);
        self.dispatch(&events);
        events
    }

    /// Point followers at where their targets are now heading.
    ///
    /// A finished target was already announced by its last step.
    fn retarget_chasers(&mut self, events: &[MoverEvent]) {
        for event in events {
            let (mover, chase_cell) = match *event {
                MoverEvent::StepCompleted { mover, cell, next } => (mover, next.unwrap_or(cell)),
                MoverEvent::Parked { mover, cell } => (mover, cell),
                MoverEvent::Finished { .. } | MoverEvent::Replanned { .. } => continue,
            };
            for follower in self.subscriptions.chasers_of(mover) {
                self.request_move(follower, chase_cell);
            }
        }
    }

    /// Notify every watching mover that obstacles changed.
    pub fn obstacles_changed(&mut self) -> Vec<MoverEvent> {
        let mut events = Vec::new();
        let watchers = self.subscriptions.obstacle_watchers.clone();
        {
            let (mut ctx, movers) = self.split();
            for id in watchers {
                if let Some(mover) = movers.get_mut(&id) {
                    mover.obstacles_changed(&mut ctx, &mut events);
                }
            }
        }
        self.retarget_chasers(&events);
        self.dispatch(&events);
        events
    }

    /// Copy the obstacle map onto the grid and rebuild obstacle markers.
    pub fn recompute_walkability(&mut self) -> Result<SyncReport, ConfigError> {
        let report = obstacles::synchronize(
            &mut self.grid,
            self.obstacles.as_ref(),
            self.layout.as_ref(),
            self.visuals.as_mut(),
        )?;
        log::info!(
            "Walkability synced: {} blocked, {} walkable, {} changed",
            report.blocked,
            report.walkable,
            report.changed
        );
        Ok(report)
    }

    /// Edit one obstacle flag without syncing.
    ///
    /// Blocking an occupied cell is refused; returns whether the edit applied.
    pub fn set_blocked(&mut self, coord: GridCoord, blocked: bool) -> bool {
        if !self.grid.is_valid(&coord) {
            log::debug!("Obstacle edit {} is out of bounds", coord);
            return false;
        }
        if blocked && self.grid.is_occupied(coord) {
            log::warn!("Refusing to block occupied cell {}", coord);
            return false;
        }
        self.obstacles.set_blocked(coord.x, coord.y, blocked);
        true
    }

    /// Apply a batch of edits, sync once and notify movers once.
    pub fn apply_obstacle_edits(&mut self, edits: &[(GridCoord, bool)]) -> Result<Vec<MoverEvent>, ConfigError> {
        let applied = edits
            .iter()
            .filter(|(coord, blocked)| self.set_blocked(*coord, *blocked))
            .count();
        log::debug!("Applied {} of {} obstacle edits", applied, edits.len());
        self.recompute_walkability()?;
        Ok(self.obstacles_changed())
    }

    /// Unblock every cell, sync and notify.
    pub fn clear_obstacles(&mut self) -> Result<Vec<MoverEvent>, ConfigError> {
        let edits: Vec<_> = self.grid.iter_coords().map(|coord| (coord, false)).collect();
        self.apply_obstacle_edits(&edits)
    }

    /// Register a callback for every mover event.
    pub fn subscribe(&mut self, listener: impl FnMut(&MoverEvent) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Call `listener` with the final cell each time `mover` finishes a path.
    pub fn on_movement_finished(
        &mut self,
        mover: MoverId,
        mut listener: impl FnMut(GridCoord) + 'static,
    ) -> ListenerId {
        self.subscribe(move |event| {
            if let MoverEvent::Finished { mover: finished, cell } = *event {
                if finished == mover {
                    listener(cell);
                }
            }
        })
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener, _)| *listener != id);
        self.listeners.len() != before
    }

    fn dispatch(&mut self, events: &[MoverEvent]) {
        for event in events {
            for (_, listener) in self.listeners.iter_mut() {
                listener(event);
            }
        }
    }
}
