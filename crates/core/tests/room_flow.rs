use anyhow::Result;
use chrono::Utc;
use rand::{rngs::StdRng, SeedableRng};
use tempfile::tempdir;
use uttt_core::{
    config::AppConfig,
    rules::{Board, SubBoard},
    Envelope, FileStore, GameResult, GridIndex, IllegalMoveReason, Intent, Mark, MemoryStore,
    Move, Room, RoomError, RoomEvent, RoomId, RoomService, RoomState, RoomStore, SeatId,
    StoreError, SubResult,
};

fn service_in(root: &std::path::Path) -> RoomService<FileStore> {
    let config = AppConfig {
        data_root: root.to_path_buf(),
        ..AppConfig::default()
    };
    RoomService::new(FileStore::new(&config.data_root), &config)
}

fn seat<S: RoomStore>(service: &RoomService<S>, room: &RoomId) -> Result<()> {
    for name in ["ada", "bob"] {
        service.handle(Envelope::new(
            room.clone(),
            None,
            Intent::JoinSeat {
                requester: SeatId::parse(name)?,
            },
        ))?;
    }
    Ok(())
}

fn play<S: RoomStore>(
    service: &RoomService<S>,
    room: &RoomId,
    actor: Mark,
    board: u8,
    cell: u8,
) -> Result<Room, StoreError> {
    service
        .handle(Envelope::new(
            room.clone(),
            Some(actor),
            Intent::SubmitMove(Move::new(board, cell)?),
        ))
        .map(RoomEvent::into_room)
}

#[test]
fn first_move_sends_opponent_to_matching_board() -> Result<()> {
    let dir = tempdir()?;
    let service = service_in(dir.path());
    let room = service.create_room(&mut StdRng::seed_from_u64(1))?;
    seat(&service, &room.id)?;

    let room = play(&service, &room.id, Mark::X, 0, 4)?;
    assert_eq!(room.forced_board, Some(GridIndex::new(4)?));
    assert_eq!(room.current_player, Mark::O);

    // A fresh store over the same directory sees the same record.
    let reopened = FileStore::new(dir.path());
    assert_eq!(reopened.load(&room.id)?, room);
    Ok(())
}

#[test]
fn won_sub_board_rejects_further_play() -> Result<()> {
    let dir = tempdir()?;
    let service = service_in(dir.path());
    let id = service.create_room(&mut StdRng::seed_from_u64(2))?.id;
    seat(&service, &id)?;

    let mut actor = Mark::X;
    let mut room = None;
    for (board, cell) in [(0, 0), (0, 3), (3, 6), (6, 0), (0, 1), (1, 0), (0, 2)] {
        room = Some(play(&service, &id, actor, board, cell)?);
        actor = actor.opponent();
    }
    let room = room.expect("moves were played");
    assert_eq!(room.sub_results[0], SubResult::Won(Mark::X));
    assert_eq!(room.result, GameResult::Ongoing);

    let err = play(&service, &id, Mark::O, 0, 8).expect_err("sub-board 0 is decided");
    assert!(matches!(
        err,
        StoreError::Rejected(RoomError::IllegalMove {
            reason: IllegalMoveReason::SubBoardDecided(_),
            ..
        })
    ));
    assert_eq!(service.store().load(&id)?, room);
    Ok(())
}

#[test]
fn all_sub_boards_drawn_draws_the_game() -> Result<()> {
    use Mark::{O, X};

    // X O X / X O O / O X X holds no line.
    let drawn = SubBoard::from_cells([
        Some(X),
        Some(O),
        Some(X),
        Some(X),
        Some(O),
        Some(O),
        Some(O),
        Some(X),
        Some(X),
    ]);
    let mut last = *drawn.cells();
    last[8] = None;

    let mut sub_boards = [drawn; 9];
    sub_boards[8] = SubBoard::from_cells(last);

    let mut room = Room::new(RoomId::parse("DRAWN")?, Utc::now());
    room.board = Board::from_sub_boards(sub_boards);
    room.sub_results = [SubResult::Draw; 9];
    room.sub_results[8] = SubResult::Undecided;
    room.forced_board = Some(GridIndex::new(8)?);

    let service = RoomService::new(MemoryStore::new(), &AppConfig::default());
    service.store().insert(room)?;

    let room = play(&service, &RoomId::parse("drawn")?, X, 8, 8)?;
    assert_eq!(room.sub_results, [SubResult::Draw; 9]);
    assert_eq!(room.result, GameResult::Draw);
    assert_eq!(room.state(), RoomState::Terminated);
    Ok(())
}

#[test]
fn forfeit_locks_the_board() -> Result<()> {
    let service = RoomService::new(MemoryStore::new(), &AppConfig::default());
    let id = service.create_room(&mut StdRng::seed_from_u64(4))?.id;
    seat(&service, &id)?;
    play(&service, &id, Mark::X, 4, 4)?;

    let room = service
        .handle(Envelope::new(id.clone(), Some(Mark::O), Intent::Forfeit))?
        .into_room();
    assert_eq!(room.result, GameResult::Won(Mark::X));
    assert_eq!(room.result.to_string(), "X wins");
    assert_eq!(room.forfeit_by, Some(Mark::O));

    let err = play(&service, &id, Mark::O, 4, 0).expect_err("game over");
    assert!(matches!(
        err,
        StoreError::Rejected(RoomError::GameAlreadyTerminal)
    ));
    Ok(())
}

#[test]
fn accepted_draw_ends_the_game() -> Result<()> {
    let service = RoomService::new(MemoryStore::new(), &AppConfig::default());
    let id = service.create_room(&mut StdRng::seed_from_u64(5))?.id;
    seat(&service, &id)?;

    service.handle(Envelope::new(id.clone(), Some(Mark::X), Intent::ProposeDraw))?;
    let err = service
        .handle(Envelope::new(
            id.clone(),
            Some(Mark::X),
            Intent::RespondDraw { accept: true },
        ))
        .expect_err("proposer cannot answer");
    assert!(matches!(
        err,
        StoreError::Rejected(RoomError::SelfResponseForbidden(Mark::X))
    ));

    let room = service
        .handle(Envelope::new(
            id.clone(),
            Some(Mark::O),
            Intent::RespondDraw { accept: true },
        ))?
        .into_room();
    assert_eq!(room.result, GameResult::Draw);
    assert_eq!(room.draw_proposed_by, None);

    let err = service
        .handle(Envelope::new(
            id,
            Some(Mark::X),
            Intent::RespondDraw { accept: true },
        ))
        .expect_err("already over");
    assert!(matches!(
        err,
        StoreError::Rejected(RoomError::GameAlreadyTerminal)
    ));
    Ok(())
}

#[test]
fn stale_writer_loses_the_race() -> Result<()> {
    let store = MemoryStore::new();
    let base = store.insert(Room::new(RoomId::parse("RACE1")?, Utc::now()))?;

    let x_move = uttt_core::apply_move(&base, Move::new(0, 0)?, Mark::X)?;
    let x_other = uttt_core::apply_move(&base, Move::new(8, 8)?, Mark::X)?;

    let stored = store.replace(x_move, base.revision)?;
    let err = store
        .replace(x_other, base.revision)
        .expect_err("based on a stale room");
    assert!(matches!(err, StoreError::Conflict { .. }));
    assert_eq!(store.load(&base.id)?, stored);
    assert_eq!(stored.board.marks_placed(), 1);
    Ok(())
}

#[test]
fn writer_holding_a_reset_game_stays_stale() -> Result<()> {
    let service = RoomService::new(MemoryStore::new(), &AppConfig::default());
    let id = service.create_room(&mut StdRng::seed_from_u64(6))?.id;
    seat(&service, &id)?;

    let stale = service.store().load(&id)?;
    let stale_next = uttt_core::apply_move(&stale, Move::new(0, 0)?, Mark::X)?;

    service.handle(Envelope::new(id.clone(), None, Intent::Reset { new_id: None }))?;
    for name in ["cat", "dan"] {
        service.handle(Envelope::new(
            id.clone(),
            None,
            Intent::JoinSeat {
                requester: SeatId::parse(name)?,
            },
        ))?;
    }
    let fresh = service.store().load(&id)?;
    assert!(fresh.revision > stale.revision);

    let err = service
        .store()
        .replace(stale_next, stale.revision)
        .expect_err("the old game is gone");
    assert!(matches!(err, StoreError::Conflict { .. }));

    let stored = service.store().load(&id)?;
    assert_eq!(stored, fresh);
    assert_eq!(stored.player_x.as_ref().map(SeatId::as_str), Some("cat"));
    assert_eq!(stored.player_o.as_ref().map(SeatId::as_str), Some("dan"));
    assert_eq!(stored.board.marks_placed(), 0);
    Ok(())
}
