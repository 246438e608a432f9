use std::cell::RefCell;
use std::rc::Rc;

use gridhop::{Board, BoardConfig, GridCoord, MoverConfig, MoverEvent, MoverId, Phase, SpawnConfig, Vec3};

const DT: f32 = 1.0 / 60.0;

fn chase_board() -> (Board, MoverId, MoverId) {
    let config = BoardConfig::default()
        .with_size(10, 10)
        .with_spawn(SpawnConfig::controlled(0, 0))
        .with_spawn(SpawnConfig::follower(9, 9, 0).with_mover(MoverConfig::default().with_move_speed(1.0)));
    let board = Board::from_config(&config).expect("valid scene");
    let ids = board.mover_ids();
    (board, ids[0], ids[1])
}

fn assert_occupancy(board: &Board) {
    let occupied = board.grid().occupied_cells();
    let mut current: Vec<GridCoord> = board.movers().map(|mover| mover.current_cell()).collect();
    current.sort();
    let mut occupied_sorted = occupied.clone();
    occupied_sorted.sort();
    assert_eq!(occupied_sorted, current, "occupied cells must be exactly the movers' cells");
    for cell in current {
        assert!(board.grid().is_walkable(cell), "mover resting on blocked cell {cell}");
    }
}

fn run_until_idle(board: &mut Board, max_ticks: usize) -> Vec<MoverEvent> {
    let mut all = Vec::new();
    for _ in 0..max_ticks {
        all.extend(board.tick(DT));
        assert_occupancy(board);
        if board.movers().all(|mover| !mover.is_moving()) {
            break;
        }
    }
    all
}

#[test]
fn player_and_follower_session() {
    let (mut board, player, enemy) = chase_board();
    let finished = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&finished);
    board.on_movement_finished(player, move |cell| sink.borrow_mut().push(cell));

    board.request_move(player, GridCoord::new(9, 0));
    let events = run_until_idle(&mut board, 60 * 30);

    assert_eq!(board.current_cell(player), Some(GridCoord::new(9, 0)));
    assert_eq!(*finished.borrow(), vec![GridCoord::new(9, 0)]);

    let enemy_cell = board.current_cell(enemy).expect("follower exists");
    assert_eq!(enemy_cell.manhattan_distance(&GridCoord::new(9, 0)), 1);
    assert!(events
        .iter()
        .any(|event| matches!(event, MoverEvent::StepCompleted { mover, .. } if *mover == enemy)));

    let rest = board.world_position(GridCoord::new(9, 0)) + Vec3::new(0.0, 0.5, 0.0);
    let transform = board.transform(player).expect("player exists");
    assert!((transform.position - rest).length() < 1e-5, "player should stand on its tile");
    assert_eq!(board.phase(player), Some(Phase::Idle));
}

#[test]
fn obstacle_dropped_ahead_is_walked_around() {
    let mut board = Board::open(7, 3, 0.5).expect("board");
    let id = board
        .spawn_mover(gridhop::MoverKind::Controlled, GridCoord::new(0, 1), Default::default())
        .expect("spawn");
    board.request_move(id, GridCoord::new(6, 1));
    board.tick(0.3);

    let wall = GridCoord::new(3, 1);
    // Mid-hop: the re-plan waits for the landing.
    board.apply_obstacle_edits(&[(wall, true)]).expect("edit");
    assert_eq!(board.phase(id), Some(Phase::Advancing));

    let events = run_until_idle(&mut board, 60 * 20);
    for event in &events {
        if let MoverEvent::StepCompleted { cell, .. } = event {
            assert_ne!(*cell, wall, "mover stepped onto a blocked cell");
        }
    }
    assert_eq!(board.current_cell(id), Some(GridCoord::new(6, 1)));
    assert!(events
        .iter()
        .any(|event| matches!(event, MoverEvent::Finished { .. })));
}

#[test]
fn sealed_off_destination_parks_the_mover() {
    let mut board = Board::open(5, 3, 0.5).expect("board");
    let id = board
        .spawn_mover(gridhop::MoverKind::Controlled, GridCoord::new(0, 0), Default::default())
        .expect("spawn");
    board.request_move(id, GridCoord::new(4, 0));
    board.tick(0.05);

    let events = board
        .apply_obstacle_edits(&[
            (GridCoord::new(2, 0), true),
            (GridCoord::new(2, 1), true),
            (GridCoord::new(2, 2), true),
        ])
        .expect("edit");
    assert_eq!(
        events,
        vec![MoverEvent::Parked {
            mover: id,
            cell: GridCoord::new(0, 0)
        }]
    );
    assert!(!board.is_moving(id));
    assert!(board.mover(id).expect("mover").destination().is_none());
    assert!(board.grid().iter().all(|cell| cell.tag == gridhop::CellTag::None));
}

#[test]
fn identical_scripts_replay_identically() {
    fn replay() -> Vec<MoverEvent> {
        let (mut board, player, _) = chase_board();
        let mut log = Vec::new();
        board.request_move(player, GridCoord::new(5, 7));
        for frame in 0..600 {
            if frame == 40 {
                log.extend(board.apply_obstacle_edits(&[(GridCoord::new(2, 3), true)]).expect("edit"));
            }
            if frame == 200 {
                board.request_move(player, GridCoord::new(0, 9));
            }
            log.extend(board.tick(DT));
        }
        log
    }

    let first = replay();
    assert!(!first.is_empty());
    assert_eq!(first, replay(), "replay diverged between runs");
}

#[test]
fn follower_ends_beside_target_after_every_trip() {
    let config = BoardConfig::default()
        .with_size(8, 8)
        .with_spawn(SpawnConfig::controlled(0, 0))
        .with_spawn(SpawnConfig::follower(7, 7, 0));
    let mut board = Board::from_config(&config).expect("valid scene");
    let ids = board.mover_ids();
    let (player, enemy) = (ids[0], ids[1]);

    let trips = [(7, 0), (7, 7), (0, 7), (3, 3), (4, 3), (0, 0)];
    for (x, y) in trips {
        board.request_move(player, GridCoord::new(x, y));
        run_until_idle(&mut board, 60 * 30);

        let player_cell = board.current_cell(player).expect("player exists");
        let enemy_cell = board.current_cell(enemy).expect("follower exists");
        assert_eq!(
            enemy_cell.manhattan_distance(&player_cell),
            1,
            "follower at {enemy_cell} is not beside player at {player_cell} after trip to ({x}, {y})"
        );
        let follower = board.mover(enemy).expect("follower exists");
        assert!(follower.path().is_empty(), "follower kept a stale path");
        assert!(board.grid().iter().all(|cell| cell.tag == gridhop::CellTag::None));
    }
}
