//! Board data model: marks, cells, the nested 3×3 grids and their outcomes.

use std::{fmt, ops::Index};

use serde::{Deserialize, Serialize};

use crate::error::RoomError;

/// Number of cells in a sub-board and of sub-boards in the super-grid.
pub const GRID_SIZE: usize = 9;

/// A player's mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mark {
    /// First player; always opens the game.
    X,
    /// Second player.
    O,
}

impl Mark {
    /// The other mark.
    pub fn opponent(self) -> Self {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mark::X => f.write_str("X"),
            Mark::O => f.write_str("O"),
        }
    }
}

/// A single square: empty, or holding the mark placed there.
pub type Cell = Option<Mark>;

/// Position within a 3×3 grid, row-major, guaranteed to be in `0..=8`.
///
/// Used both for a cell inside a sub-board and for a sub-board inside the
/// super-grid. Deserialization goes through [`TryFrom<u8>`] so indices coming
/// off the wire are never trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct GridIndex(u8);

impl GridIndex {
    /// Validate a raw index.
    pub fn new(raw: u8) -> Result<Self, RoomError> {
        if usize::from(raw) < GRID_SIZE {
            Ok(Self(raw))
        } else {
            Err(RoomError::InvalidIndex(raw))
        }
    }

    /// Index as a `usize` for slice access.
    pub const fn get(self) -> usize {
        self.0 as usize
    }

    /// All nine indices in order.
    pub fn all() -> impl Iterator<Item = GridIndex> {
        (0..GRID_SIZE as u8).map(GridIndex)
    }
}

impl TryFrom<u8> for GridIndex {
    type Error = RoomError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<GridIndex> for u8 {
    fn from(index: GridIndex) -> Self {
        index.0
    }
}

impl fmt::Display for GridIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One of the nine inner 3×3 grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubBoard([Cell; GRID_SIZE]);

impl SubBoard {
    /// Build a sub-board from raw cells.
    pub fn from_cells(cells: [Cell; GRID_SIZE]) -> Self {
        Self(cells)
    }

    /// Borrow the cells in row-major order.
    pub fn cells(&self) -> &[Cell; GRID_SIZE] {
        &self.0
    }

    /// Whether every cell holds a mark.
    pub fn is_full(&self) -> bool {
        self.0.iter().all(Option::is_some)
    }

    /// Number of empty cells.
    pub fn empty_cells(&self) -> usize {
        self.0.iter().filter(|cell| cell.is_none()).count()
    }

    pub(crate) fn place(&mut self, index: GridIndex, mark: Mark) {
        debug_assert!(self.0[index.get()].is_none(), "cell overwritten");
        self.0[index.get()] = Some(mark);
    }
}

impl Index<GridIndex> for SubBoard {
    type Output = Cell;

    fn index(&self, index: GridIndex) -> &Self::Output {
        &self.0[index.get()]
    }
}

/// The super-grid of nine sub-boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board([SubBoard; GRID_SIZE]);

impl Board {
    /// Build a board from its sub-boards.
    pub fn from_sub_boards(sub_boards: [SubBoard; GRID_SIZE]) -> Self {
        Self(sub_boards)
    }

    /// Iterate over sub-boards paired with their index.
    pub fn sub_boards(&self) -> impl Iterator<Item = (GridIndex, &SubBoard)> {
        GridIndex::all().zip(self.0.iter())
    }

    /// Content of the cell a move targets.
    pub fn cell(&self, mv: Move) -> Cell {
        self.0[mv.board_index.get()][mv.cell_index]
    }

    /// Total number of marks on the board.
    pub fn marks_placed(&self) -> usize {
        self.0
            .iter()
            .map(|sub| GRID_SIZE - sub.empty_cells())
            .sum()
    }

    pub(crate) fn place(&mut self, mv: Move, mark: Mark) {
        self.0[mv.board_index.get()].place(mv.cell_index, mark);
    }
}

impl Index<GridIndex> for Board {
    type Output = SubBoard;

    fn index(&self, index: GridIndex) -> &Self::Output {
        &self.0[index.get()]
    }
}

/// Wire shape shared by [`SubResult`] and [`GameResult`]: `"X"`, `"O"`,
/// `"draw"` or `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Outcome {
    X,
    O,
    #[serde(rename = "draw")]
    Draw,
}

impl From<Mark> for Outcome {
    fn from(mark: Mark) -> Self {
        match mark {
            Mark::X => Outcome::X,
            Mark::O => Outcome::O,
        }
    }
}

/// Outcome of a single sub-board. Derived from its cells, frozen once decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<Outcome>", into = "Option<Outcome>")]
pub enum SubResult {
    /// Three in a row for this mark.
    Won(Mark),
    /// Full with no line.
    Draw,
    /// Still open.
    #[default]
    Undecided,
}

impl SubResult {
    /// Whether the sub-board is closed to further play.
    pub fn is_decided(self) -> bool {
        !matches!(self, SubResult::Undecided)
    }

    /// Winning mark, if any.
    pub fn winner(self) -> Option<Mark> {
        match self {
            SubResult::Won(mark) => Some(mark),
            _ => None,
        }
    }
}

impl From<Option<Outcome>> for SubResult {
    fn from(raw: Option<Outcome>) -> Self {
        match raw {
            Some(Outcome::X) => SubResult::Won(Mark::X),
            Some(Outcome::O) => SubResult::Won(Mark::O),
            Some(Outcome::Draw) => SubResult::Draw,
            None => SubResult::Undecided,
        }
    }
}

impl From<SubResult> for Option<Outcome> {
    fn from(result: SubResult) -> Self {
        match result {
            SubResult::Won(mark) => Some(mark.into()),
            SubResult::Draw => Some(Outcome::Draw),
            SubResult::Undecided => None,
        }
    }
}

/// Outcome of the whole game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<Outcome>", into = "Option<Outcome>")]
pub enum GameResult {
    /// Decisive result, by line, forfeit or otherwise.
    Won(Mark),
    /// Drawn on the board or by agreement.
    Draw,
    /// Play continues.
    #[default]
    Ongoing,
}

impl GameResult {
    /// Whether the game is over.
    pub fn is_terminal(self) -> bool {
        !matches!(self, GameResult::Ongoing)
    }

    /// Winning mark, if any.
    pub fn winner(self) -> Option<Mark> {
        match self {
            GameResult::Won(mark) => Some(mark),
            _ => None,
        }
    }
}

impl From<Option<Outcome>> for GameResult {
    fn from(raw: Option<Outcome>) -> Self {
        match raw {
            Some(Outcome::X) => GameResult::Won(Mark::X),
            Some(Outcome::O) => GameResult::Won(Mark::O),
            Some(Outcome::Draw) => GameResult::Draw,
            None => GameResult::Ongoing,
        }
    }
}

impl From<GameResult> for Option<Outcome> {
    fn from(result: GameResult) -> Self {
        match result {
            GameResult::Won(mark) => Some(mark.into()),
            GameResult::Draw => Some(Outcome::Draw),
            GameResult::Ongoing => None,
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameResult::Won(mark) => write!(f, "{mark} wins"),
            GameResult::Draw => f.write_str("draw"),
            GameResult::Ongoing => f.write_str("ongoing"),
        }
    }
}

/// Sub-board the next player must play in; `None` means any open sub-board.
pub type ForcedBoard = Option<GridIndex>;

/// A proposed placement: which sub-board, and which cell inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Move {
    /// Target sub-board in the super-grid.
    pub board_index: GridIndex,
    /// Target cell inside that sub-board.
    pub cell_index: GridIndex,
}

impl Move {
    /// Build a move from raw indices, validating both.
    pub fn new(board_index: u8, cell_index: u8) -> Result<Self, RoomError> {
        Ok(Self {
            board_index: GridIndex::new(board_index)?,
            cell_index: GridIndex::new(cell_index)?,
        })
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.board_index, self.cell_index)
    }
}
