//! Layout and drawing: board, pieces, drag overlay, sidebar, intro fly-in,
//! pause and game-over popups, line-clear flash.

use crate::game::{COLS, Engine, INTRO_DELAY, Phase, Piece, ROWS};
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use std::collections::HashSet;
use std::time::Instant;
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

/// One grid cell on screen: 2 terminal columns × 1 row, roughly square in
/// most fonts.
pub const CELL_W: u16 = 2;
pub const CELL_H: u16 = 1;

const BOARD_W: u16 = COLS as u16 * CELL_W + 2;
const BOARD_H: u16 = ROWS as u16 * CELL_H + 2;
const SIDEBAR_WIDTH: u16 = 22;

/// Duration of the line-clear flash.
const CLEAR_FLASH_MS: u32 = 300;

/// Board (with border) and sidebar rects, centered in the area.
fn layout_rects(area: Rect) -> (Rect, Rect) {
    let total_w = BOARD_W + SIDEBAR_WIDTH;
    let x = area.x + area.width.saturating_sub(total_w) / 2;
    let y = area.y + area.height.saturating_sub(BOARD_H) / 2;
    let board = Rect::new(x, y, BOARD_W, BOARD_H).intersection(area);
    let sidebar =
        Rect::new(x.saturating_add(BOARD_W), y, SIDEBAR_WIDTH, BOARD_H).intersection(area);
    (board, sidebar)
}

/// Board interior (grid cells only, no border). Also used by the app to map
/// pointer positions to grid cells.
pub fn board_inner_rect(area: Rect) -> Rect {
    let (board, _) = layout_rects(area);
    Rect {
        x: board.x + 1,
        y: board.y + 1,
        width: board.width.saturating_sub(2),
        height: board.height.saturating_sub(2),
    }
}

/// Draw the whole frame. `pending_clear` holds row indices from the latest
/// landing; when non-empty a flash effect is created from them and they are
/// drained.
pub fn draw(
    frame: &mut Frame,
    engine: &Engine,
    theme: &Theme,
    now: Instant,
    pending_clear: &mut Vec<usize>,
    clear_effect: &mut Option<Effect>,
    clear_effect_time: &mut Option<Instant>,
) {
    let area = frame.area();
    let (board, sidebar) = layout_rects(area);
    let inner = board_inner_rect(area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(" blockfall ", Style::default().fg(theme.title)));
    block.render(board, frame.buffer_mut());

    let buf = frame.buffer_mut();
    for r in 0..ROWS {
        for c in 0..COLS {
            let bg = if engine.grid.is_occupied(r, c) {
                theme.dead
            } else {
                theme.bg
            };
            paint_cell(buf, inner, r as i32, c as i32, Style::default().bg(bg), [" ", " "]);
        }
    }
    if let Some(piece) = &engine.piece {
        draw_piece(buf, inner, piece, false);
    }
    if let Some(piece) = &engine.provisional {
        draw_piece(buf, inner, piece, true);
    }

    draw_sidebar(frame, engine, theme, sidebar);

    if !pending_clear.is_empty() {
        *clear_effect = Some(clear_flash_effect(pending_clear, inner));
        *clear_effect_time = None;
        pending_clear.clear();
    }
    apply_clear_effect(frame, inner, clear_effect, clear_effect_time, now);

    match engine.phase() {
        Phase::Idle => {
            if let Some(at) = engine.pending_spawn_at() {
                draw_intro(frame, theme, area, at, now);
            } else {
                draw_idle_popup(frame, theme, area);
            }
        }
        Phase::Paused => draw_pause_popup(frame, theme, area),
        Phase::GameOver => draw_game_over_popup(frame, theme, area),
        Phase::Running => {}
    }
}

/// Paint one grid cell; out-of-grid or off-screen coordinates are skipped so
/// pieces straddling the top edge draw only their visible rows.
fn paint_cell(
    buf: &mut Buffer,
    inner: Rect,
    row: i32,
    col: i32,
    style: Style,
    symbols: [&str; 2],
) {
    if row < 0 || col < 0 || row >= ROWS as i32 || col >= COLS as i32 {
        return;
    }
    let y = inner.y + row as u16 * CELL_H;
    if y >= inner.y + inner.height {
        return;
    }
    let x0 = inner.x + col as u16 * CELL_W;
    for (dx, sym) in symbols.iter().enumerate() {
        let x = x0 + dx as u16;
        if x < inner.x + inner.width {
            buf[(x, y)].set_symbol(sym).set_style(style);
        }
    }
}

/// Draw a piece with its gradient sampled across the shape's bounding box.
/// The provisional overlay gets red bracket markers (the drag highlight).
fn draw_piece(buf: &mut Buffer, inner: Rect, piece: &Piece, provisional: bool) {
    let denom = (piece.shape.height() + piece.shape.width()).saturating_sub(2).max(1) as f32;
    for (dr, dc) in piece.shape.cells() {
        let color = piece.style.sample((dr + dc) as f32 / denom);
        let (style, symbols) = if provisional {
            (Style::default().fg(Color::Red).bg(color), ["[", "]"])
        } else {
            (Style::default().bg(color), [" ", " "])
        };
        paint_cell(
            buf,
            inner,
            piece.row + dr as i32,
            piece.col + dc as i32,
            style,
            symbols,
        );
    }
}

fn draw_sidebar(frame: &mut Frame, engine: &Engine, theme: &Theme, area: Rect) {
    let phase = match engine.phase() {
        Phase::Idle => "idle",
        Phase::Running => "running",
        Phase::Paused => "paused",
        Phase::GameOver => "game over",
    };
    let fg = Style::default().fg(theme.main_fg);
    let key = Style::default().fg(theme.title);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " blockfall ",
            Style::default().fg(theme.title).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(format!(" State  {phase}"), fg)),
        Line::from(Span::styled(
            format!(" Tick   {} ms", engine.interval().as_millis()),
            fg,
        )),
        Line::from(""),
        Line::from(vec![Span::styled(" ←/→ ", key), Span::styled("move", fg)]),
        Line::from(vec![Span::styled(" ↑ ", key), Span::styled("rotate", fg)]),
        Line::from(vec![Span::styled(" ↓ ", key), Span::styled("drop", fg)]),
        Line::from(vec![Span::styled(" drag ", key), Span::styled("place", fg)]),
        Line::from(""),
        Line::from(vec![Span::styled(" S ", key), Span::styled("start", fg)]),
        Line::from(vec![Span::styled(" P ", key), Span::styled("pause", fg)]),
        Line::from(vec![Span::styled(" R ", key), Span::styled("reset", fg)]),
        Line::from(vec![Span::styled(" +/- ", key), Span::styled("speed", fg)]),
        Line::from(vec![Span::styled(" Q ", key), Span::styled("quit", fg)]),
    ];
    let p = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
    );
    p.render(area, frame.buffer_mut());
}

/// Intro fly-in: the title slides across the board while the one-shot start
/// delay runs down.
fn draw_intro(frame: &mut Frame, theme: &Theme, area: Rect, spawn_at: Instant, now: Instant) {
    let remaining = spawn_at.saturating_duration_since(now).as_secs_f32();
    let t = 1.0 - (remaining / INTRO_DELAY.as_secs_f32()).clamp(0.0, 1.0);
    let text = " B L O C K F A L L ";
    let w = text.len() as u16;
    let span = f32::from(area.width.saturating_sub(w));
    let x = area.x + (t * span) as u16;
    let y = area.y + area.height / 2;
    let rect = Rect::new(x, y, w, 1).intersection(area);
    Paragraph::new(Line::from(Span::styled(
        text,
        Style::default().fg(theme.title).add_modifier(Modifier::BOLD),
    )))
    .render(rect, frame.buffer_mut());
}

fn centered_popup(area: Rect, width: u16, height: u16) -> Rect {
    Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(height) / 2,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}

fn popup(frame: &mut Frame, theme: &Theme, area: Rect, lines: Vec<Line>) {
    let rect = centered_popup(area, 30, lines.len() as u16 + 2);
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
    );
    p.render(rect, frame.buffer_mut());
}

fn draw_idle_popup(frame: &mut Frame, theme: &Theme, area: Rect) {
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " blockfall ",
            Style::default().fg(Color::Black).bg(theme.title),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " S — Start    Q — Quit ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    popup(frame, theme, area, lines);
}

fn draw_pause_popup(frame: &mut Frame, theme: &Theme, area: Rect) {
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " P — Resume    Q — Quit ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    popup(frame, theme, area, lines);
}

fn draw_game_over_popup(frame: &mut Frame, theme: &Theme, area: Rect) {
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Game Over ",
            Style::default().fg(Color::White).bg(Color::Red),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " R — Reset    Q — Quit ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    popup(frame, theme, area, lines);
}

/// White flash fading out over the rows that were just cleared. The grid
/// compaction itself already happened; this is render-only.
fn clear_flash_effect(rows: &[usize], inner: Rect) -> Effect {
    let set: HashSet<(u16, u16)> = rows
        .iter()
        .flat_map(|&r| {
            let y = inner.y + r as u16 * CELL_H;
            (0..COLS as u16 * CELL_W).map(move |dx| (inner.x + dx, y))
        })
        .collect();
    let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
        set.contains(&(pos.x, pos.y))
    }));
    fx::fade_from(
        Color::White,
        Color::White,
        (CLEAR_FLASH_MS, Interpolation::Linear),
    )
    .with_filter(filter)
    .with_area(inner)
}

fn apply_clear_effect(
    frame: &mut Frame,
    inner: Rect,
    clear_effect: &mut Option<Effect>,
    clear_effect_time: &mut Option<Instant>,
    now: Instant,
) {
    let Some(effect) = clear_effect.as_mut() else {
        return;
    };
    let delta = clear_effect_time
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let delta_ms = delta.as_millis().min(u128::from(u32::MAX)) as u32;
    *clear_effect_time = Some(now);
    frame.render_effect(effect, inner, TfxDuration::from_millis(delta_ms));
    if effect.done() {
        *clear_effect = None;
        *clear_effect_time = None;
    }
}
