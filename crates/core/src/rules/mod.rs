//! Rules engine for ultimate tic-tac-toe.
//!
//! `board` holds the data model; `engine` decides legality and computes the
//! consequences of a move at both levels of the grid.

pub mod board;
pub mod engine;

pub use board::{
    Board, Cell, ForcedBoard, GameResult, GridIndex, Mark, Move, SubBoard, SubResult, GRID_SIZE,
};
pub use engine::{
    apply_move, check_move, is_legal_move, legal_moves, main_result, next_forced_board,
    sub_board_result, LINES,
};
