//! Falling-block puzzle
//!
//! Pieces move cell by cell on a 10x20 board. Contact is pure grid logic, so
//! the policy table is empty; settled cells and the falling piece are mirrored
//! into the world as obstacles so the shared renderer draws them. Full rows
//! clear and score, ten rows make a level, and a piece that cannot spawn ends
//! the session.

use glam::Vec2;
use rand::Rng;

use crate::Rgba;
use crate::platform::input::{InputFrame, Intent};
use crate::renderer::Frame;
use crate::sim::collision::PolicyTable;
use crate::sim::entity::{Boundary, Entity, EntityKind};
use crate::sim::geometry::Shape;
use crate::sim::particles::Burst;
use crate::sim::ruleset::{RuleContext, Ruleset};
use crate::sim::state::Session;
use crate::sim::world::World;

const COLS: usize = 10;
const ROWS: usize = 20;
const CELL: f32 = 22.0;
/// Board top-left, centred in the default playfield
const ORIGIN: Vec2 = Vec2::new(290.0, 30.0);

/// Ticks per row at level 1
const BASE_GRAVITY: u32 = 40;
const MIN_GRAVITY: u32 = 6;
const SOFT_DROP: u32 = 2;
/// Auto-repeat for held sideways moves
const REPEAT_DELAY: u32 = 12;
const REPEAT_RATE: u32 = 4;

const LINES_PER_LEVEL: u32 = 10;
const WIN_LEVEL: u32 = 5;
/// Points for clearing 0..=4 rows at once, times the level
const LINE_POINTS: [u64; 5] = [0, 40, 100, 300, 1200];
/// Points per row of a hard drop
const DROP_POINTS: u64 = 2;

/// Tag bit marking cells of the falling piece
const ACTIVE: u16 = 0x100;

const I: u8 = 0;
const O: u8 = 1;

/// Cell offsets of the seven pieces in spawn orientation
const SHAPES: [[(i8, i8); 4]; 7] = [
    [(-1, 0), (0, 0), (1, 0), (2, 0)],
    [(0, 0), (1, 0), (0, 1), (1, 1)],
    [(-1, 0), (0, 0), (1, 0), (0, 1)],
    [(0, 0), (1, 0), (-1, 1), (0, 1)],
    [(-1, 0), (0, 0), (0, 1), (1, 1)],
    [(-1, 0), (0, 0), (1, 0), (-1, 1)],
    [(-1, 0), (0, 0), (1, 0), (1, 1)],
];

const COLORS: [Rgba; 7] = [
    [0.3, 0.9, 0.95, 1.0],
    [0.95, 0.85, 0.3, 1.0],
    [0.7, 0.4, 0.9, 1.0],
    [0.4, 0.9, 0.45, 1.0],
    [0.95, 0.35, 0.35, 1.0],
    [0.95, 0.6, 0.25, 1.0],
    [0.35, 0.5, 0.95, 1.0],
];

/// Sideways shifts tried when a rotation is blocked
const KICKS: [i8; 5] = [0, -1, 1, -2, 2];

type Board = [[Option<u8>; COLS]; ROWS];

#[derive(Debug, Clone, Copy, PartialEq)]
struct Piece {
    kind: u8,
    cells: [(i8, i8); 4],
    col: i8,
    row: i8,
}

impl Piece {
    fn spawn(kind: u8) -> Self {
        Self {
            kind,
            cells: SHAPES[kind as usize % SHAPES.len()],
            col: COLS as i8 / 2 - 1,
            row: 0,
        }
    }

    fn shifted(&self, dcol: i8, drow: i8) -> Self {
        Self {
            col: self.col + dcol,
            row: self.row + drow,
            ..*self
        }
    }

    /// Quarter turn; +y points down so (x, y) -> (-y, x) is clockwise on screen
    fn rotated(&self, clockwise: bool) -> Self {
        if self.kind == O {
            return *self;
        }
        let cells = self
            .cells
            .map(|(x, y)| if clockwise { (-y, x) } else { (y, -x) });
        Self { cells, ..*self }
    }

    fn positions(&self) -> [(i8, i8); 4] {
        self.cells.map(|(x, y)| (self.col + x, self.row + y))
    }
}

#[derive(Debug, Clone)]
pub struct Stacker {
    board: Board,
    piece: Option<Piece>,
    next: u8,
    fall_timer: u32,
    /// Ticks a sideways move has been held
    repeat: u32,
    lines: u32,
}

impl Default for Stacker {
    fn default() -> Self {
        Self {
            board: [[None; COLS]; ROWS],
            piece: None,
            next: 0,
            fall_timer: 0,
            repeat: 0,
            lines: 0,
        }
    }
}

impl Stacker {
    pub fn new() -> Self {
        Self::default()
    }

    fn gravity_interval(level: u32) -> u32 {
        BASE_GRAVITY.saturating_sub(4 * (level - 1)).max(MIN_GRAVITY)
    }

    fn cell_pos(col: i8, row: i8) -> Vec2 {
        ORIGIN + Vec2::new(f32::from(col), f32::from(row)) * CELL
    }

    /// Cells above the board are open; everything else must be on the board and empty
    fn fits(&self, piece: &Piece) -> bool {
        piece.positions().iter().all(|&(c, r)| {
            if c < 0 || c >= COLS as i8 || r >= ROWS as i8 {
                return false;
            }
            r < 0 || self.board[r as usize][c as usize].is_none()
        })
    }

    fn top_out(ctx: &mut RuleContext) {
        let lives = ctx.session.lives();
        ctx.session.lose_lives(lives);
        log::debug!("stacker topped out at level {}", ctx.session.level());
    }

    fn spawn_piece(&mut self, ctx: &mut RuleContext) {
        let piece = Piece::spawn(self.next);
        self.next = ctx.rng.random_range(0..SHAPES.len() as u8);
        self.fall_timer = 0;
        if self.fits(&piece) {
            self.piece = Some(piece);
        } else {
            self.piece = None;
            Self::top_out(ctx);
        }
    }

    fn try_rotate(&self, piece: &Piece, clockwise: bool) -> Option<Piece> {
        let turned = piece.rotated(clockwise);
        KICKS
            .iter()
            .map(|&dx| turned.shifted(dx, 0))
            .find(|p| self.fits(p))
    }

    /// Write the piece into the board, clear rows and bring in the next piece
    fn lock(&mut self, ctx: &mut RuleContext, piece: Piece) {
        self.piece = None;
        for (c, r) in piece.positions() {
            if r < 0 {
                Self::top_out(ctx);
                return;
            }
            self.board[r as usize][c as usize] = Some(piece.kind);
        }
        self.clear_rows(ctx);
        self.spawn_piece(ctx);
    }

    fn clear_rows(&mut self, ctx: &mut RuleContext) -> usize {
        let full: Vec<usize> = (0..ROWS)
            .filter(|&r| self.board[r].iter().all(Option::is_some))
            .collect();
        if full.is_empty() {
            return 0;
        }

        for &r in &full {
            let center = Self::cell_pos(COLS as i8 / 2, r as i8) + Vec2::splat(CELL / 2.0);
            ctx.burst(Burst::explosion(center, [1.0, 1.0, 1.0, 1.0]));
        }

        let kept: Vec<[Option<u8>; COLS]> = self
            .board
            .iter()
            .copied()
            .filter(|row| row.iter().any(Option::is_none))
            .collect();
        let cleared = ROWS - kept.len();
        let mut board = [[None; COLS]; ROWS];
        for (i, row) in kept.into_iter().enumerate() {
            board[i + cleared] = row;
        }
        self.board = board;

        let level = ctx.session.level();
        ctx.session.add_score(LINE_POINTS[cleared.min(4)] * u64::from(level));
        self.lines += cleared as u32;
        let target_level = (1 + self.lines / LINES_PER_LEVEL).min(WIN_LEVEL);
        while ctx.session.level() < target_level && !ctx.session.is_terminal() {
            ctx.session.advance_level();
        }
        cleared
    }

    /// Rebuild the world's cell entities from the board and piece
    fn mirror(&self, world: &mut World) {
        world.clear();
        let cell = |col: i8, row: i8, tag: u16| {
            Entity::new(EntityKind::Obstacle, Self::cell_pos(col, row), Shape::rect(CELL - 1.0, CELL - 1.0))
                .with_tag(tag)
                .with_boundary(Boundary::Free)
        };
        for (r, row) in self.board.iter().enumerate() {
            for (c, kind) in row.iter().enumerate() {
                if let Some(kind) = kind {
                    world.spawn(cell(c as i8, r as i8, u16::from(*kind)));
                }
            }
        }
        if let Some(piece) = self.piece {
            for (c, r) in piece.positions() {
                if r >= 0 {
                    world.spawn(cell(c, r, u16::from(piece.kind) | ACTIVE));
                }
            }
        }
    }
}

impl Ruleset for Stacker {
    fn name(&self) -> &'static str {
        "stacker"
    }

    fn initial_lives(&self) -> f32 {
        1.0
    }

    fn policies(&self) -> PolicyTable {
        PolicyTable::new()
    }

    fn setup(&mut self, ctx: &mut RuleContext) {
        *self = Self::new();
        self.next = ctx.rng.random_range(0..SHAPES.len() as u8);
        self.spawn_piece(ctx);
        self.mirror(ctx.world);
    }

    fn update(&mut self, ctx: &mut RuleContext, input: &InputFrame) {
        let Some(mut piece) = self.piece else {
            return;
        };
        let before = (self.board, self.piece);
        let active = |i: Intent| input.held(i) || input.just_pressed(i);

        let dx: i8 = match (active(Intent::MoveLeft), active(Intent::MoveRight)) {
            (true, false) => -1,
            (false, true) => 1,
            _ => 0,
        };
        if dx == 0 {
            self.repeat = 0;
        } else {
            let due = self.repeat == 0
                || (self.repeat >= REPEAT_DELAY && (self.repeat - REPEAT_DELAY) % REPEAT_RATE == 0);
            self.repeat += 1;
            let moved = piece.shifted(dx, 0);
            if due && self.fits(&moved) {
                piece = moved;
            }
        }

        let turn = if input.just_pressed(Intent::MoveUp) || input.just_pressed(Intent::AimRight) {
            Some(true)
        } else if input.just_pressed(Intent::AimLeft) {
            Some(false)
        } else {
            None
        };
        if let Some(turned) = turn.and_then(|clockwise| self.try_rotate(&piece, clockwise)) {
            piece = turned;
        }

        if input.just_pressed(Intent::Fire) {
            let mut rows = 0u64;
            while self.fits(&piece.shifted(0, 1)) {
                piece = piece.shifted(0, 1);
                rows += 1;
            }
            ctx.session.add_score(rows * DROP_POINTS);
            self.lock(ctx, piece);
        } else {
            let soft = input.held(Intent::MoveDown);
            let interval = if soft {
                SOFT_DROP
            } else {
                Self::gravity_interval(ctx.session.level())
            };
            self.fall_timer += 1;
            self.piece = Some(piece);
            if self.fall_timer >= interval {
                self.fall_timer = 0;
                let down = piece.shifted(0, 1);
                if self.fits(&down) {
                    self.piece = Some(down);
                    if soft {
                        ctx.session.add_score(1);
                    }
                } else {
                    self.lock(ctx, piece);
                }
            }
        }

        if (self.board, self.piece) != before {
            self.mirror(ctx.world);
        }
    }

    fn is_won(&self, _world: &World, session: &Session) -> bool {
        session.level() >= WIN_LEVEL
    }

    fn background(&self) -> Rgba {
        [0.06, 0.06, 0.1, 1.0]
    }

    fn color(&self, entity: &Entity) -> Rgba {
        let [r, g, b, a] = COLORS[usize::from(entity.tag & 0xff) % COLORS.len()];
        if entity.tag & ACTIVE != 0 {
            [r, g, b, a]
        } else {
            [r * 0.75, g * 0.75, b * 0.75, a]
        }
    }

    fn decorate(&self, _world: &World, frame: &mut Frame) {
        let board = Vec2::new(COLS as f32, ROWS as f32) * CELL;
        frame.rect(ORIGIN.x - 4.0, ORIGIN.y - 4.0, board.x + 8.0, board.y + 8.0, [0.3, 0.3, 0.4, 1.0]);
        frame.rect(ORIGIN.x, ORIGIN.y, board.x, board.y, [0.1, 0.1, 0.16, 1.0]);

        // Next piece preview
        let preview = ORIGIN + Vec2::new(board.x + 40.0, 20.0);
        let color = COLORS[usize::from(self.next) % COLORS.len()];
        for (x, y) in SHAPES[usize::from(self.next) % SHAPES.len()] {
            let p = preview + Vec2::new(f32::from(x) + 1.0, f32::from(y)) * (CELL * 0.7);
            frame.rect(p.x, p.y, CELL * 0.7 - 1.0, CELL * 0.7 - 1.0, color);
        }
    }
}
