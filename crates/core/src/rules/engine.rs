//! Move legality and nested win detection.
//!
//! Every function here is pure: no clock, no I/O, no hidden state. The same
//! line rule is applied twice, once over the cells of a sub-board and once
//! over the nine sub-board results.

use crate::{
    error::{IllegalMoveReason, RoomError},
    room::Room,
};

use super::board::{
    Board, ForcedBoard, GameResult, GridIndex, Mark, Move, SubBoard, SubResult, GRID_SIZE,
};

/// The eight winning lines of a 3×3 grid: rows, columns, diagonals.
pub const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

fn line_winner<T: Copy>(
    slots: &[T; GRID_SIZE],
    mark_of: impl Fn(T) -> Option<Mark>,
) -> Option<Mark> {
    LINES.iter().find_map(|&[a, b, c]| {
        let mark = mark_of(slots[a])?;
        (mark_of(slots[b]) == Some(mark) && mark_of(slots[c]) == Some(mark)).then_some(mark)
    })
}

/// Evaluate a sub-board: a line wins, a full board without one is a draw.
pub fn sub_board_result(sub_board: &SubBoard) -> SubResult {
    if let Some(mark) = line_winner(sub_board.cells(), |cell| cell) {
        return SubResult::Won(mark);
    }
    if sub_board.is_full() {
        SubResult::Draw
    } else {
        SubResult::Undecided
    }
}

/// Evaluate the super-grid from the nine sub-board results.
///
/// Only won sub-boards count towards a line; drawn sub-boards count as
/// decided for the overall draw.
pub fn main_result(sub_results: &[SubResult; GRID_SIZE]) -> GameResult {
    if let Some(mark) = line_winner(sub_results, SubResult::winner) {
        return GameResult::Won(mark);
    }
    if sub_results.iter().all(|result| result.is_decided()) {
        GameResult::Draw
    } else {
        GameResult::Ongoing
    }
}

/// Check a move against the board, returning why it is illegal.
pub fn check_move(
    board: &Board,
    sub_results: &[SubResult; GRID_SIZE],
    forced_board: ForcedBoard,
    mv: Move,
) -> Result<(), IllegalMoveReason> {
    if sub_results[mv.board_index.get()].is_decided() {
        return Err(IllegalMoveReason::SubBoardDecided(mv.board_index));
    }
    if board.cell(mv).is_some() {
        return Err(IllegalMoveReason::CellOccupied);
    }
    match forced_board {
        Some(forced) if forced != mv.board_index => Err(IllegalMoveReason::WrongBoard(forced)),
        _ => Ok(()),
    }
}

/// Whether a move is legal. A forced board of `None` imposes no restriction.
pub fn is_legal_move(
    board: &Board,
    sub_results: &[SubResult; GRID_SIZE],
    forced_board: ForcedBoard,
    mv: Move,
) -> bool {
    check_move(board, sub_results, forced_board, mv).is_ok()
}

/// Sub-board the opponent is sent to after a mark lands on `played_cell`.
///
/// The cell position maps 1:1 onto the super-grid; a decided or full target
/// frees the opponent to play anywhere.
pub fn next_forced_board(
    played_cell: GridIndex,
    sub_results: &[SubResult; GRID_SIZE],
    board: &Board,
) -> ForcedBoard {
    if sub_results[played_cell.get()].is_decided() || board[played_cell].is_full() {
        None
    } else {
        Some(played_cell)
    }
}

/// Apply a move for `actor`, returning the resulting room.
///
/// Rejections leave `room` untouched. Derived fields (sub-board results, game
/// result, forced board) are only ever recomputed here.
pub fn apply_move(room: &Room, mv: Move, actor: Mark) -> Result<Room, RoomError> {
    if room.result.is_terminal() {
        return Err(RoomError::GameAlreadyTerminal);
    }
    if actor != room.current_player {
        return Err(RoomError::NotYourTurn {
            expected: room.current_player,
            actual: actor,
        });
    }
    check_move(&room.board, &room.sub_results, room.forced_board, mv)
        .map_err(|reason| RoomError::IllegalMove { mv, reason })?;

    let mut next = room.clone();
    next.board.place(mv, actor);
    next.sub_results[mv.board_index.get()] = sub_board_result(&next.board[mv.board_index]);
    next.result = main_result(&next.sub_results);
    next.forced_board = next_forced_board(mv.cell_index, &next.sub_results, &next.board);
    next.current_player = actor.opponent();
    next.draw_proposed_by = None;
    Ok(next)
}

/// Every move the player to act may make. Empty once the game is over.
pub fn legal_moves(room: &Room) -> Vec<Move> {
    if room.result.is_terminal() {
        return Vec::new();
    }
    let boards: Vec<GridIndex> = match room.forced_board {
        Some(forced) => vec![forced],
        None => GridIndex::all().collect(),
    };
    boards
        .into_iter()
        .flat_map(|board_index| {
            GridIndex::all().map(move |cell_index| Move {
                board_index,
                cell_index,
            })
        })
        .filter(|mv| is_legal_move(&room.board, &room.sub_results, room.forced_board, *mv))
        .collect()
}
