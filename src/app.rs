//! Terminal setup and the frame loop: poll the engine, draw, drain input.

use crate::Args;
use crate::game::{Engine, INTRO_DELAY};
use crate::input::{Action, key_to_action};
use crate::theme::Theme;
use anyhow::Result;
use crossterm::event::{
    self, Event, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::DefaultTerminal;
use ratatui::layout::Rect;
use std::time::{Duration, Instant};
use tachyonfx::Effect;

pub struct App {
    args: Args,
    theme: Theme,
    engine: Engine,
    /// Rows cleared by the latest landing, awaiting their flash effect.
    pending_clear: Vec<usize>,
    clear_effect: Option<Effect>,
    clear_effect_process_time: Option<Instant>,
}

impl App {
    pub fn new(args: Args, theme: Theme) -> Self {
        let engine = Engine::new(Duration::from_millis(args.tick_ms));
        Self {
            args,
            theme,
            engine,
            pending_clear: Vec::new(),
            clear_effect: None,
            clear_effect_process_time: None,
        }
    }

    fn intro_delay(&self) -> Duration {
        if self.args.no_intro {
            Duration::ZERO
        } else {
            INTRO_DELAY
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{DisableMouseCapture, EnableMouseCapture},
            execute,
            terminal::{
                EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
            },
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        if self.args.autostart {
            self.engine.start(Instant::now(), self.intro_delay());
        }

        let result = self.run_loop(&mut terminal);

        // Restore
        execute!(std::io::stdout(), DisableMouseCapture, LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            let now = Instant::now();
            self.engine.poll(now);
            let cleared = self.engine.take_cleared_rows();
            if !cleared.is_empty() {
                self.pending_clear = cleared;
            }

            terminal.draw(|f| {
                crate::ui::draw(
                    f,
                    &self.engine,
                    &self.theme,
                    now,
                    &mut self.pending_clear,
                    &mut self.clear_effect,
                    &mut self.clear_effect_process_time,
                )
            })?;

            let timeout = Duration::from_millis(16);
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    match event::read()? {
                        Event::Key(key) => {
                            if key.kind != KeyEventKind::Press {
                                continue;
                            }
                            if self.handle_key(key) {
                                return Ok(());
                            }
                        }
                        Event::Mouse(me) => self.handle_mouse(me),
                        _ => {}
                    }
                }
            }
        }
    }

    /// Returns true when the app should quit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        let now = Instant::now();
        match key_to_action(key) {
            Action::Quit => return true,
            Action::Start => self.engine.start(now, self.intro_delay()),
            Action::Pause => self.engine.toggle_pause(now),
            Action::Reset => self.engine.reset(),
            Action::SpeedUp => self.engine.speed_up(now),
            Action::SpeedDown => self.engine.speed_down(now),
            Action::MoveLeft => self.engine.move_left(),
            Action::MoveRight => self.engine.move_right(),
            Action::Rotate => self.engine.rotate(),
            Action::ManualDrop => self.engine.manual_drop(),
            Action::None => {}
        }
        false
    }

    /// Map a pointer event to grid coordinates and feed the drag engine.
    /// Positions outside the board land on out-of-range cells, which the
    /// engine rejects on its own.
    fn handle_mouse(&mut self, me: MouseEvent) {
        let (cols, rows) = crossterm::terminal::size().unwrap_or((80, 24));
        let board = crate::ui::board_inner_rect(Rect::new(0, 0, cols, rows));
        let col = (i32::from(me.column) - i32::from(board.x)).div_euclid(i32::from(crate::ui::CELL_W));
        let row = (i32::from(me.row) - i32::from(board.y)).div_euclid(i32::from(crate::ui::CELL_H));
        match me.kind {
            MouseEventKind::Down(MouseButton::Left) => self.engine.drag_start(row, col),
            MouseEventKind::Drag(MouseButton::Left) => self.engine.drag_move(row, col),
            MouseEventKind::Up(MouseButton::Left) => self.engine.drag_end(),
            _ => {}
        }
    }
}
