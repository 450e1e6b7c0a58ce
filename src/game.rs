//! Game engine: grid occupancy, shape catalog, collision, tick state machine,
//! drag overlay.

use crate::theme::BlockStyle;
use rand::Rng;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Grid dimensions, fixed for the game lifetime.
pub const ROWS: usize = 20;
pub const COLS: usize = 10;

/// Spawn origin: fixed column, one row above the visible top.
pub const SPAWN_COL: i32 = 4;
pub const SPAWN_ROW: i32 = -1;

/// One-shot delay between `start()` and the first spawn (intro window).
pub const INTRO_DELAY: Duration = Duration::from_millis(2000);

/// Initial tick interval.
pub const START_INTERVAL: Duration = Duration::from_millis(1000);
/// Speed adjustment step.
pub const SPEED_STEP: Duration = Duration::from_millis(200);
/// Fastest allowed tick interval.
pub const MIN_INTERVAL: Duration = Duration::from_millis(200);

/// Single grid cell: empty, or a permanently landed dead block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Dead,
}

/// Occupancy matrix. Row 0 is the top; `rows[row][col]`.
#[derive(Debug, Clone)]
pub struct Grid {
    rows: VecDeque<Vec<Cell>>,
}

impl Grid {
    pub fn new() -> Self {
        Self {
            rows: (0..ROWS).map(|_| vec![Cell::Empty; COLS]).collect(),
        }
    }

    /// Coordinates must be in range; collision checks bounds before asking.
    #[inline]
    pub fn is_occupied(&self, row: usize, col: usize) -> bool {
        self.rows[row][col] == Cell::Dead
    }

    /// Mark a cell filled. Idempotent. `row` must be in `[0, ROWS)`.
    pub fn occupy(&mut self, row: usize, col: usize) {
        self.rows[row][col] = Cell::Dead;
    }

    pub fn reset(&mut self) {
        for row in &mut self.rows {
            row.fill(Cell::Empty);
        }
    }

    /// True iff any occupied cell of the shape placed at (col, row) leaves
    /// the column range, reaches the bottom, or lands on an occupied cell.
    /// Rows above the visible top never collide with grid content, only with
    /// the side boundaries.
    pub fn collides(&self, shape: &Shape, col: i32, row: i32) -> bool {
        for (dr, dc) in shape.cells() {
            let r = row + dr as i32;
            let c = col + dc as i32;
            if c < 0 || c >= COLS as i32 || r >= ROWS as i32 {
                return true;
            }
            if r >= 0 && self.is_occupied(r as usize, c as usize) {
                return true;
            }
        }
        false
    }

    /// Occupy every piece cell with absolute row >= 0. Cells above the
    /// visible top were never tracked and are dropped.
    pub fn merge(&mut self, piece: &Piece) {
        for (r, c) in piece.cells() {
            if r >= 0 {
                self.occupy(r as usize, c as usize);
            }
        }
    }

    /// Remove every fully-occupied row in one pass, inserting one empty row
    /// at the top per removal and keeping the relative order of surviving
    /// rows. Full rows are collected from a snapshot scan first, so one
    /// clear can never cause another full row to be skipped. Returns the
    /// pre-compaction indices of the cleared rows.
    pub fn clear_full_rows(&mut self) -> Vec<usize> {
        let full: Vec<usize> = (0..ROWS)
            .filter(|&r| self.rows[r].iter().all(|&c| c == Cell::Dead))
            .collect();
        for &r in full.iter().rev() {
            self.rows.remove(r);
        }
        for _ in &full {
            self.rows.push_front(vec![Cell::Empty; COLS]);
        }
        full
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::new()
    }
}

/// Shape catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    O,
    I,
    T,
    S,
    Z,
}

impl ShapeKind {
    pub const ALL: [Self; 5] = [Self::O, Self::I, Self::T, Self::S, Self::Z];

    /// Occupancy matrix, row-major.
    fn matrix(self) -> &'static [&'static [u8]] {
        match self {
            Self::O => &[&[1, 1], &[1, 1]],
            Self::I => &[&[1, 1, 1, 1]],
            Self::T => &[&[1, 1, 1], &[0, 1, 0]],
            Self::S => &[&[1, 1, 0], &[0, 1, 1]],
            Self::Z => &[&[0, 1, 1], &[1, 1, 0]],
        }
    }
}

/// Immutable occupancy matrix. Rotation returns a new shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    cells: Vec<Vec<bool>>,
}

impl Shape {
    pub fn of(kind: ShapeKind) -> Self {
        Self {
            cells: kind
                .matrix()
                .iter()
                .map(|row| row.iter().map(|&c| c == 1).collect())
                .collect(),
        }
    }

    pub fn width(&self) -> usize {
        self.cells[0].len()
    }

    pub fn height(&self) -> usize {
        self.cells.len()
    }

    /// (row, col) offsets of the occupied cells.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.cells.iter().enumerate().flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .filter(|&(_, &b)| b)
                .map(move |(c, _)| (r, c))
        })
    }

    /// Clockwise 90° rotation: transpose, then reverse each new row.
    pub fn rotated(&self) -> Self {
        let (h, w) = (self.height(), self.width());
        let cells = (0..w)
            .map(|c| (0..h).rev().map(|r| self.cells[r][c]).collect())
            .collect();
        Self { cells }
    }
}

/// The falling, player-controlled piece. `row` may be negative while the
/// piece is still partially above the visible grid.
#[derive(Debug, Clone)]
pub struct Piece {
    pub shape: Shape,
    pub col: i32,
    pub row: i32,
    /// Opaque paint token; the engine never inspects it.
    pub style: BlockStyle,
}

impl Piece {
    pub fn spawn(kind: ShapeKind, style: BlockStyle) -> Self {
        Self {
            shape: Shape::of(kind),
            col: SPAWN_COL,
            row: SPAWN_ROW,
            style,
        }
    }

    /// Absolute (row, col) of each occupied cell.
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.shape
            .cells()
            .map(|(r, c)| (self.row + r as i32, self.col + c as i32))
    }

    /// True if the grid cell (row, col) falls inside the bounding box.
    pub fn bbox_contains(&self, row: i32, col: i32) -> bool {
        col >= self.col
            && col < self.col + self.shape.width() as i32
            && row >= self.row
            && row < self.row + self.shape.height() as i32
    }
}

/// Tick controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    Paused,
    GameOver,
}

/// One game session: grid, active piece, drag overlay and the tick
/// scheduler. Single-threaded; the event loop calls [`Engine::poll`] every
/// frame with the current time. The two `Option<Instant>` deadlines are the
/// only timers — `pause` and `reset` cancel by clearing them, so at most one
/// live deadline exists at any moment and a stale tick can never fire.
#[derive(Debug)]
pub struct Engine {
    pub grid: Grid,
    pub piece: Option<Piece>,
    /// Drag overlay: candidate position held during a pointer gesture.
    pub provisional: Option<Piece>,
    phase: Phase,
    interval: Duration,
    next_tick: Option<Instant>,
    pending_spawn: Option<Instant>,
    /// Rows cleared by the most recent landing, drained by the renderer.
    cleared_rows: Vec<usize>,
}

impl Engine {
    pub fn new(interval: Duration) -> Self {
        Self {
            grid: Grid::new(),
            piece: None,
            provisional: None,
            phase: Phase::Idle,
            interval: interval.max(MIN_INTERVAL),
            next_tick: None,
            pending_spawn: None,
            cleared_rows: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// End of the intro window, while a start is pending.
    pub fn pending_spawn_at(&self) -> Option<Instant> {
        self.pending_spawn
    }

    /// Arm the one-shot intro delay; the first piece spawns when it elapses
    /// (see [`Engine::poll`]). No-op unless Idle.
    pub fn start(&mut self, now: Instant, delay: Duration) {
        if self.phase != Phase::Idle || self.pending_spawn.is_some() {
            return;
        }
        self.pending_spawn = Some(now + delay);
    }

    /// Running ⇄ Paused. Pausing cancels the tick deadline; resuming re-arms
    /// it. Piece and grid are untouched.
    pub fn toggle_pause(&mut self, now: Instant) {
        match self.phase {
            Phase::Running => {
                self.phase = Phase::Paused;
                self.next_tick = None;
            }
            Phase::Paused => {
                self.phase = Phase::Running;
                self.next_tick = Some(now + self.interval);
            }
            Phase::Idle | Phase::GameOver => {}
        }
    }

    /// Back to Idle: grid cleared, piece and overlay dropped, deadlines
    /// cancelled. The tick interval is kept.
    pub fn reset(&mut self) {
        self.grid.reset();
        self.piece = None;
        self.provisional = None;
        self.phase = Phase::Idle;
        self.next_tick = None;
        self.pending_spawn = None;
        self.cleared_rows.clear();
    }

    pub fn speed_up(&mut self, now: Instant) {
        if self.interval > MIN_INTERVAL {
            self.interval = self.interval.saturating_sub(SPEED_STEP).max(MIN_INTERVAL);
            self.reschedule(now);
        }
    }

    pub fn speed_down(&mut self, now: Instant) {
        self.interval += SPEED_STEP;
        self.reschedule(now);
    }

    /// Restart the periodic tick at the current interval; piece and grid
    /// keep their state.
    fn reschedule(&mut self, now: Instant) {
        if self.phase == Phase::Running {
            self.next_tick = Some(now + self.interval);
        }
    }

    /// Advance deadlines: spawn the first piece once the intro delay has
    /// elapsed, then fire a due tick. Called once per frame by the event
    /// loop; the frame period is far below the minimum tick interval.
    pub fn poll(&mut self, now: Instant) {
        if let Some(at) = self.pending_spawn {
            if now >= at {
                self.pending_spawn = None;
                self.phase = Phase::Running;
                self.next_tick = Some(now + self.interval);
                self.spawn();
            }
        }
        if self.phase == Phase::Running && self.next_tick.is_some_and(|at| now >= at) {
            self.next_tick = Some(now + self.interval);
            self.tick();
        }
    }

    /// Player command: one forced tick, independent of the timer.
    pub fn manual_drop(&mut self) {
        self.tick();
    }

    pub fn move_left(&mut self) {
        self.shift(-1);
    }

    pub fn move_right(&mut self) {
        self.shift(1);
    }

    fn shift(&mut self, dx: i32) {
        if self.phase != Phase::Running {
            return;
        }
        if let Some(piece) = self.piece.as_mut() {
            if !self.grid.collides(&piece.shape, piece.col + dx, piece.row) {
                piece.col += dx;
            }
        }
    }

    /// Rotate clockwise; the candidate shape is tested and dropped on
    /// collision, leaving the piece unchanged.
    pub fn rotate(&mut self) {
        if self.phase != Phase::Running {
            return;
        }
        if let Some(piece) = self.piece.as_mut() {
            let rotated = piece.shape.rotated();
            if !self.grid.collides(&rotated, piece.col, piece.row) {
                piece.shape = rotated;
            }
        }
    }

    /// One tick: advance the active piece down a row; if that collides, the
    /// piece has landed — merge it, clear full rows, spawn the next piece.
    fn tick(&mut self) {
        if self.phase != Phase::Running {
            return;
        }
        let Some(piece) = self.piece.as_mut() else {
            return;
        };
        piece.row += 1;
        if self.grid.collides(&piece.shape, piece.col, piece.row) {
            piece.row -= 1;
            self.land();
        }
    }

    fn land(&mut self) {
        let Some(piece) = self.piece.take() else {
            return;
        };
        self.provisional = None;
        self.grid.merge(&piece);
        self.cleared_rows = self.grid.clear_full_rows();
        self.spawn();
    }

    fn spawn(&mut self) {
        let mut rng = rand::thread_rng();
        let kind = ShapeKind::ALL[rng.gen_range(0..ShapeKind::ALL.len())];
        let style = BlockStyle::random(&mut rng);
        self.spawn_kind(kind, style);
    }

    fn spawn_kind(&mut self, kind: ShapeKind, style: BlockStyle) {
        let piece = Piece::spawn(kind, style);
        let blocked = self.grid.collides(&piece.shape, piece.col, piece.row);
        self.piece = Some(piece);
        if blocked {
            self.game_over();
        }
    }

    /// Terminal: a freshly spawned piece collided immediately. The scheduler
    /// stops; the colliding piece stays visible.
    fn game_over(&mut self) {
        self.phase = Phase::GameOver;
        self.next_tick = None;
        self.pending_spawn = None;
        self.provisional = None;
    }

    /// Gesture start: capture a provisional copy iff the pointer cell falls
    /// within the active piece's bounding box.
    pub fn drag_start(&mut self, row: i32, col: i32) {
        if self.phase != Phase::Running {
            return;
        }
        if let Some(piece) = &self.piece {
            if piece.bbox_contains(row, col) {
                self.provisional = Some(piece.clone());
            }
        }
    }

    /// Gesture move: the pointed cell becomes the candidate origin. The
    /// overlay only moves to legal positions and otherwise keeps its last
    /// valid one; the grid is never touched. Rows above the visible top are
    /// legal, so a piece can be dragged partially off the top.
    pub fn drag_move(&mut self, row: i32, col: i32) {
        if self.phase != Phase::Running {
            return;
        }
        if let Some(p) = self.provisional.as_mut() {
            if !self.grid.collides(&p.shape, col, row) {
                p.col = col;
                p.row = row;
            }
        }
    }

    /// Gesture end: commit the overlay as the active piece (it has only
    /// moved, not landed) and clear it.
    pub fn drag_end(&mut self) {
        if let Some(p) = self.provisional.take() {
            if self.phase == Phase::Running {
                self.piece = Some(p);
            }
        }
    }

    /// Rows cleared by the most recent landing (pre-compaction indices).
    pub fn take_cleared_rows(&mut self) -> Vec<usize> {
        std::mem::take(&mut self.cleared_rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style() -> BlockStyle {
        BlockStyle {
            from: (10, 20, 30),
            to: (200, 210, 220),
        }
    }

    fn piece_at(kind: ShapeKind, row: i32, col: i32) -> Piece {
        Piece {
            shape: Shape::of(kind),
            col,
            row,
            style: style(),
        }
    }

    fn occupied_count(grid: &Grid) -> usize {
        (0..ROWS)
            .map(|r| (0..COLS).filter(|&c| grid.is_occupied(r, c)).count())
            .sum()
    }

    /// Engine in Running phase with a freshly spawned piece.
    fn running_engine() -> Engine {
        let mut e = Engine::new(START_INTERVAL);
        let now = Instant::now();
        e.start(now, Duration::ZERO);
        e.poll(now);
        assert_eq!(e.phase(), Phase::Running);
        e
    }

    #[test]
    fn four_rotations_return_original_shape() {
        for kind in ShapeKind::ALL {
            let shape = Shape::of(kind);
            let back = shape.rotated().rotated().rotated().rotated();
            assert_eq!(back, shape, "{kind:?}");
        }
    }

    #[test]
    fn rotation_does_not_mutate_input() {
        let shape = Shape::of(ShapeKind::T);
        let copy = shape.clone();
        let _ = shape.rotated();
        assert_eq!(shape, copy);
    }

    #[test]
    fn rotation_swaps_dimensions_and_keeps_cell_count() {
        let i = Shape::of(ShapeKind::I);
        let r = i.rotated();
        assert_eq!((r.width(), r.height()), (i.height(), i.width()));
        assert_eq!(r.cells().count(), i.cells().count());
    }

    #[test]
    fn clearing_rows_3_and_7_inserts_two_empty_rows_on_top() {
        let mut grid = Grid::new();
        for c in 0..COLS {
            grid.occupy(3, c);
            grid.occupy(7, c);
        }
        // Partial markers above, between and below the full rows.
        grid.occupy(1, 0);
        grid.occupy(5, 2);
        grid.occupy(10, 4);

        let cleared = grid.clear_full_rows();
        assert_eq!(cleared, vec![3, 7]);

        // Two fresh empty rows on top.
        for c in 0..COLS {
            assert!(!grid.is_occupied(0, c));
        }
        // Rows above a clear shift down; rows below both clears stay put.
        assert!(grid.is_occupied(3, 0));
        assert!(grid.is_occupied(6, 2));
        assert!(grid.is_occupied(10, 4));
        assert_eq!(occupied_count(&grid), 3);
    }

    #[test]
    fn adjacent_full_rows_clear_together() {
        let mut grid = Grid::new();
        for c in 0..COLS {
            grid.occupy(ROWS - 2, c);
            grid.occupy(ROWS - 1, c);
        }
        let cleared = grid.clear_full_rows();
        assert_eq!(cleared, vec![ROWS - 2, ROWS - 1]);
        assert_eq!(occupied_count(&grid), 0);
    }

    #[test]
    fn occupy_is_idempotent() {
        let mut grid = Grid::new();
        grid.occupy(4, 4);
        grid.occupy(4, 4);
        assert_eq!(occupied_count(&grid), 1);
    }

    #[test]
    fn collides_at_boundaries() {
        let grid = Grid::new();
        let o = Shape::of(ShapeKind::O); // 2x2
        assert!(grid.collides(&o, -1, 5));
        assert!(!grid.collides(&o, 0, 5));
        assert!(!grid.collides(&o, COLS as i32 - 2, 5));
        assert!(grid.collides(&o, COLS as i32 - 1, 5));
        assert!(!grid.collides(&o, 4, ROWS as i32 - 2));
        assert!(grid.collides(&o, 4, ROWS as i32 - 1));
    }

    #[test]
    fn negative_rows_collide_with_sides_only() {
        let mut grid = Grid::new();
        grid.occupy(0, 4);
        grid.occupy(0, 5);
        let o = Shape::of(ShapeKind::O);
        // Fully above the visible grid: the occupied top row does not matter.
        assert!(!grid.collides(&o, 4, -2));
        // Straddling row 0 hits the dead cells.
        assert!(grid.collides(&o, 4, -1));
        // Side bounds still apply above the grid.
        assert!(grid.collides(&o, -1, -2));
    }

    #[test]
    fn merge_drops_cells_above_visible_top() {
        let mut grid = Grid::new();
        let piece = piece_at(ShapeKind::O, -1, 4);
        grid.merge(&piece);
        // Only the bottom row of the O landed in-grid.
        assert_eq!(occupied_count(&grid), 2);
        assert!(grid.is_occupied(0, 4));
        assert!(grid.is_occupied(0, 5));
    }

    #[test]
    fn merge_never_shrinks_occupancy() {
        let mut grid = Grid::new();
        grid.occupy(10, 0);
        let before = occupied_count(&grid);
        grid.merge(&piece_at(ShapeKind::I, 10, 3));
        assert!(occupied_count(&grid) >= before);
    }

    #[test]
    fn move_left_at_wall_is_a_noop() {
        let mut e = running_engine();
        e.piece = Some(piece_at(ShapeKind::O, 5, 0));
        e.move_left();
        assert_eq!(e.piece.as_ref().map(|p| p.col), Some(0));
    }

    #[test]
    fn move_right_at_wall_is_a_noop() {
        let mut e = running_engine();
        e.piece = Some(piece_at(ShapeKind::O, 5, COLS as i32 - 3));
        e.move_right();
        assert_eq!(e.piece.as_ref().map(|p| p.col), Some(COLS as i32 - 2));
        e.move_right();
        assert_eq!(e.piece.as_ref().map(|p| p.col), Some(COLS as i32 - 2));
    }

    #[test]
    fn blocked_rotation_reverts() {
        let mut e = running_engine();
        // Horizontal I pinned by a dead block where its rotation would land.
        e.piece = Some(piece_at(ShapeKind::I, 5, 6));
        e.grid.occupy(6, 6);
        let before = e.piece.clone().map(|p| p.shape);
        e.rotate();
        assert_eq!(e.piece.as_ref().map(|p| p.shape.clone()), before);
    }

    #[test]
    fn spawn_on_empty_grid_never_collides() {
        for kind in ShapeKind::ALL {
            let grid = Grid::new();
            let p = Piece::spawn(kind, style());
            assert!(!grid.collides(&p.shape, p.col, p.row), "{kind:?}");
        }
    }

    #[test]
    fn spawn_into_filled_top_row_is_game_over() {
        let mut e = running_engine();
        for c in 0..COLS {
            e.grid.occupy(0, c);
        }
        // O spawns at row -1 with its bottom row on the filled row 0.
        e.spawn_kind(ShapeKind::O, style());
        assert_eq!(e.phase(), Phase::GameOver);
        assert!(e.next_tick.is_none());
        // The colliding piece stays visible.
        assert!(e.piece.is_some());
    }

    #[test]
    fn single_row_shape_spawns_above_a_filled_top_row() {
        let mut e = running_engine();
        for c in 0..COLS {
            e.grid.occupy(0, c);
        }
        // The I is one row tall and sits entirely at row -1, touching no
        // grid content.
        e.spawn_kind(ShapeKind::I, style());
        assert_eq!(e.phase(), Phase::Running);
    }

    #[test]
    fn landing_merges_and_respawns() {
        let mut e = running_engine();
        e.piece = Some(piece_at(ShapeKind::O, ROWS as i32 - 2, 4));
        e.manual_drop();
        assert_eq!(occupied_count(&e.grid), 4);
        assert!(e.grid.is_occupied(ROWS - 1, 4));
        // Next piece spawned at the origin.
        assert_eq!(e.piece.as_ref().map(|p| p.row), Some(SPAWN_ROW));
        assert_eq!(e.piece.as_ref().map(|p| p.col), Some(SPAWN_COL));
        assert_eq!(e.phase(), Phase::Running);
    }

    #[test]
    fn landing_on_full_row_reports_cleared_rows() {
        let mut e = running_engine();
        for c in 0..COLS {
            if c != 4 && c != 5 {
                e.grid.occupy(ROWS - 1, c);
            }
        }
        // O lands with its bottom row completing the last grid row.
        e.piece = Some(piece_at(ShapeKind::O, ROWS as i32 - 2, 4));
        e.manual_drop();
        assert_eq!(e.take_cleared_rows(), vec![ROWS - 1]);
        // The top half of the O survived the clear, one row lower.
        assert_eq!(occupied_count(&e.grid), 2);
        assert!(e.grid.is_occupied(ROWS - 1, 4));
        // Drained.
        assert!(e.take_cleared_rows().is_empty());
    }

    #[test]
    fn manual_drop_advances_one_row() {
        let mut e = running_engine();
        e.piece = Some(piece_at(ShapeKind::T, 5, 4));
        e.manual_drop();
        assert_eq!(e.piece.as_ref().map(|p| p.row), Some(6));
    }

    #[test]
    fn commands_are_noops_outside_running() {
        let mut e = Engine::new(START_INTERVAL);
        e.move_left();
        e.rotate();
        e.manual_drop();
        e.drag_start(0, 4);
        assert_eq!(e.phase(), Phase::Idle);
        assert!(e.piece.is_none());

        let mut e = running_engine();
        let now = Instant::now();
        e.piece = Some(piece_at(ShapeKind::T, 5, 4));
        e.toggle_pause(now);
        e.move_left();
        e.manual_drop();
        assert_eq!(e.piece.as_ref().map(|p| (p.row, p.col)), Some((5, 4)));
    }

    #[test]
    fn start_is_a_noop_unless_idle() {
        let mut e = running_engine();
        e.start(Instant::now(), Duration::ZERO);
        assert!(e.pending_spawn_at().is_none());
    }

    #[test]
    fn intro_delay_defers_first_spawn() {
        let mut e = Engine::new(START_INTERVAL);
        let now = Instant::now();
        e.start(now, Duration::from_millis(100));
        e.poll(now);
        assert_eq!(e.phase(), Phase::Idle);
        assert!(e.piece.is_none());
        e.poll(now + Duration::from_millis(150));
        assert_eq!(e.phase(), Phase::Running);
        assert!(e.piece.is_some());
    }

    #[test]
    fn pause_cancels_deadline_and_resume_rearms_it() {
        let mut e = running_engine();
        let now = Instant::now();
        assert!(e.next_tick.is_some());
        e.toggle_pause(now);
        assert_eq!(e.phase(), Phase::Paused);
        assert!(e.next_tick.is_none());
        e.toggle_pause(now);
        assert_eq!(e.phase(), Phase::Running);
        assert_eq!(e.next_tick, Some(now + e.interval()));
    }

    #[test]
    fn due_tick_fires_and_reschedules() {
        let mut e = running_engine();
        e.piece = Some(piece_at(ShapeKind::T, 5, 4));
        let due = e.next_tick.expect("running engine has a deadline");
        e.poll(due);
        assert_eq!(e.piece.as_ref().map(|p| p.row), Some(6));
        assert_eq!(e.next_tick, Some(due + e.interval()));
    }

    #[test]
    fn speed_is_clamped_at_the_minimum() {
        let mut e = Engine::new(START_INTERVAL);
        let now = Instant::now();
        for _ in 0..20 {
            e.speed_up(now);
        }
        assert_eq!(e.interval(), MIN_INTERVAL);
        e.speed_down(now);
        assert_eq!(e.interval(), MIN_INTERVAL + SPEED_STEP);
    }

    #[test]
    fn speed_change_while_running_keeps_piece_and_grid() {
        let mut e = running_engine();
        let now = Instant::now();
        e.piece = Some(piece_at(ShapeKind::S, 7, 3));
        e.grid.occupy(12, 2);
        e.speed_up(now);
        assert_eq!(e.piece.as_ref().map(|p| (p.row, p.col)), Some((7, 3)));
        assert!(e.grid.is_occupied(12, 2));
        // Scheduler restarted at the new cadence.
        assert_eq!(e.next_tick, Some(now + e.interval()));
    }

    #[test]
    fn reset_returns_to_idle_and_keeps_speed() {
        let mut e = running_engine();
        let now = Instant::now();
        e.speed_down(now);
        let interval = e.interval();
        e.grid.occupy(10, 3);
        e.reset();
        assert_eq!(e.phase(), Phase::Idle);
        assert!(e.piece.is_none());
        assert!(e.next_tick.is_none());
        assert!(e.pending_spawn_at().is_none());
        assert_eq!(occupied_count(&e.grid), 0);
        assert_eq!(e.interval(), interval);
    }

    #[test]
    fn drag_start_requires_pointer_inside_bounding_box() {
        let mut e = running_engine();
        e.piece = Some(piece_at(ShapeKind::T, 5, 4)); // 2 rows, 3 cols
        e.drag_start(0, 0);
        assert!(e.provisional.is_none());
        e.drag_start(6, 6);
        assert!(e.provisional.is_some());
    }

    #[test]
    fn drag_onto_dead_cells_keeps_last_valid_position() {
        let mut e = running_engine();
        e.piece = Some(piece_at(ShapeKind::O, 5, 4));
        e.grid.occupy(10, 7);
        let before = occupied_count(&e.grid);
        e.drag_start(5, 4);
        e.drag_move(8, 2); // legal
        assert_eq!(e.provisional.as_ref().map(|p| (p.row, p.col)), Some((8, 2)));
        e.drag_move(10, 7); // overlaps the dead cell
        assert_eq!(e.provisional.as_ref().map(|p| (p.row, p.col)), Some((8, 2)));
        e.drag_move(30, 2); // past the bottom
        assert_eq!(e.provisional.as_ref().map(|p| (p.row, p.col)), Some((8, 2)));
        // Render-only: the grid was never written.
        assert_eq!(occupied_count(&e.grid), before);
    }

    #[test]
    fn drag_may_move_piece_above_the_visible_top() {
        let mut e = running_engine();
        e.piece = Some(piece_at(ShapeKind::O, 3, 4));
        e.drag_start(3, 4);
        e.drag_move(-1, 4);
        assert_eq!(e.provisional.as_ref().map(|p| p.row), Some(-1));
    }

    #[test]
    fn drag_end_commits_overlay_without_touching_grid() {
        let mut e = running_engine();
        e.piece = Some(piece_at(ShapeKind::O, 5, 4));
        let before = occupied_count(&e.grid);
        e.drag_start(5, 4);
        e.drag_move(9, 6);
        e.drag_end();
        assert!(e.provisional.is_none());
        assert_eq!(e.piece.as_ref().map(|p| (p.row, p.col)), Some((9, 6)));
        assert_eq!(occupied_count(&e.grid), before);
    }

    #[test]
    fn drag_end_without_gesture_is_a_noop() {
        let mut e = running_engine();
        let pos = e.piece.as_ref().map(|p| (p.row, p.col));
        e.drag_end();
        assert_eq!(e.piece.as_ref().map(|p| (p.row, p.col)), pos);
    }

    #[test]
    fn landing_cancels_an_active_drag() {
        let mut e = running_engine();
        e.piece = Some(piece_at(ShapeKind::O, ROWS as i32 - 2, 4));
        e.drag_start(ROWS as i32 - 2, 4);
        assert!(e.provisional.is_some());
        e.manual_drop();
        assert!(e.provisional.is_none());
    }
}
