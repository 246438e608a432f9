use anyhow::{anyhow, Result};
use gridhop::{Board, BoardConfig, GridCoord, MoverEvent, MoverId, MoverKind, SpawnConfig};

const FRAME_DT: f32 = 1.0 / 60.0;
const FRAMES: u32 = 60 * 30;
/// Frames between random obstacle toggles.
const EDIT_INTERVAL: u32 = 45;
const SEED: u64 = 0x6772_6964;

struct ChaseDemo {
    board: Board,
    player: MoverId,
    rng: fastrand::Rng,
    finished_trips: u32,
}

impl ChaseDemo {
    fn new(config: &BoardConfig) -> Result<Self> {
        let board = Board::from_config(config)?;
        let player = board
            .movers()
            .find(|mover| mover.kind() == MoverKind::Controlled)
            .map(|mover| mover.id())
            .ok_or_else(|| anyhow!("Scene has no controlled mover"))?;

        Ok(Self {
            board,
            player,
            rng: fastrand::Rng::with_seed(SEED),
            finished_trips: 0,
        })
    }

    fn random_cell(&mut self) -> GridCoord {
        let grid = self.board.grid();
        GridCoord::new(
            self.rng.i32(0..grid.width() as i32),
            self.rng.i32(0..grid.height() as i32),
        )
    }

    fn send_player_somewhere(&mut self) {
        for _ in 0..16 {
            let target = self.random_cell();
            if self.board.grid().is_walkable(target) && !self.board.grid().is_occupied(target) {
                log::info!("Player heading to {}", target);
                self.board.request_move(self.player, target);
                return;
            }
        }
    }

    fn toggle_random_obstacle(&mut self) -> Result<()> {
        let cell = self.random_cell();
        let blocked = !self.board.obstacles().is_blocked(cell.x, cell.y);
        let events = self.board.apply_obstacle_edits(&[(cell, blocked)])?;
        log::debug!("Toggled {} to blocked={}", cell, blocked);
        self.report(&events);
        Ok(())
    }

    fn report(&mut self, events: &[MoverEvent]) {
        for event in events {
            match *event {
                MoverEvent::StepCompleted { mover, cell, .. } => {
                    log::trace!("{:?} landed on {}", mover, cell);
                }
                MoverEvent::Finished { mover, cell } => {
                    log::info!("{:?} finished at {}", mover, cell);
                    if mover == self.player {
                        self.finished_trips += 1;
                    }
                }
                MoverEvent::Replanned { mover, steps } => {
                    log::info!("{:?} re-planned, {} steps left", mover, steps);
                }
                MoverEvent::Parked { mover, cell } => {
                    log::warn!("{:?} parked at {}", mover, cell);
                }
            }
        }
    }

    fn run(&mut self) -> Result<()> {
        self.send_player_somewhere();
        for frame in 1..=FRAMES {
            if frame % EDIT_INTERVAL == 0 {
                self.toggle_random_obstacle()?;
            }

            let events = self.board.tick(FRAME_DT);
            self.report(&events);

            if !self.board.is_moving(self.player) {
                self.send_player_somewhere();
            }
        }

        log::info!(
            "Done after {:.1}s: player finished {} trips, {} cells blocked",
            FRAMES as f32 * FRAME_DT,
            self.finished_trips,
            self.board.visuals().count()
        );
        for mover in self.board.movers() {
            log::info!("{:?} rests at {}", mover.id(), mover.current_cell());
        }
        Ok(())
    }
}

fn default_scene() -> BoardConfig {
    BoardConfig::default()
        .with_size(12, 12)
        .with_spawn(SpawnConfig::controlled(0, 0))
        .with_spawn(SpawnConfig::follower(11, 11, 0))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading scene from {}", path);
            BoardConfig::load_from_file(std::path::Path::new(&path))?
        }
        None => default_scene(),
    };

    let mut demo = ChaseDemo::new(&config)?;
    demo.run()
}
