//! Blockfall — a classic falling-block puzzle game in the terminal.

mod app;
mod game;
mod input;
mod theme;
mod ui;

use anyhow::Result;
use app::App;
use clap::Parser;

fn main() -> Result<()> {
    let args = Args::parse();
    let theme = theme::Theme::load(args.theme.as_deref()).unwrap_or_default();
    let mut app = App::new(args, theme);
    app.run()?;
    Ok(())
}

/// Falling-block puzzle game in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "blockfall",
    version,
    about = "Classic falling-block puzzle in the terminal. Stack pieces; clear full rows.",
    long_about = "Blockfall is a terminal falling-block puzzle game.\n\n\
        Pieces fall into a 20x10 well. Fill a row edge-to-edge to clear it; the game ends \
        when a new piece has no room to spawn.\n\n\
        CONTROLS:\n  Left/Right or h/l  Move    Up or k/i  Rotate    Down/j/Space  Drop one row\n  \
        S/Enter  Start    P  Pause    R  Reset    +/-  Speed    Q/Esc  Quit\n\n\
        Drag a piece with the mouse to reposition it while the game runs. \
        Use --theme to load a btop-style theme (e.g. onedark.theme)."
)]
pub struct Args {
    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<std::path::PathBuf>,

    /// Initial gravity interval in ms (clamped to the 200 ms floor).
    #[arg(long, default_value = "1000", value_name = "MS")]
    pub tick_ms: u64,

    /// Start the game immediately instead of waiting on the title screen.
    #[arg(long)]
    pub autostart: bool,

    /// Skip the title fly-in; the first piece spawns without delay.
    #[arg(long)]
    pub no_intro: bool,
}
