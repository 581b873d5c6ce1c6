//! Virtual 2315 CLI - run the cartridge facility against simulated hardware.
//!
//! Usage:
//!   v2315 [--image-dir DIR] [--image FILE] [--config FILE] [--trace]
//!
//! Keys:
//!   r  toggle the RUN/LOAD switch
//!   w  press write-protect (held for one tick)
//!   p  toggle host power
//!   v  toggle a supply sag
//!   l  enable drive event logging
//!   s  disable drive event logging
//!   q  quit
//!
//! Examples:
//!   v2315 --image-dir ./media                 # Serve ./media/2315.dsk
//!   v2315 --image-dir ./media --image os.dsk  # Serve a different image
//!   v2315 --ticks 300 --trace                 # Run 30 s with debug logging

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

use cartridge_core::{
    Display, Emulator, EmulatorConfig, FileImageStore, RegisterController, SimulatedBus,
    SimulatedPanel,
};

/// Supply reading while a sag is simulated, below the default low threshold.
const SAGGED_SUPPLY: u16 = 2800;

/// Virtual 2315 cartridge facility
#[derive(Parser, Debug)]
#[command(name = "v2315")]
#[command(about = "Emulate a 2315 cartridge drive against simulated hardware")]
struct Args {
    /// Directory standing in for the removable media
    #[arg(long, default_value = ".")]
    image_dir: PathBuf,

    /// Image file name (overrides the configured one)
    #[arg(long)]
    image: Option<String>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log state transitions and storage activity
    #[arg(short, long)]
    trace: bool,

    /// Run the simulated controller in real-drive mode
    #[arg(long)]
    real_mode: bool,

    /// Stop after this many ticks
    #[arg(long)]
    ticks: Option<u64>,
}

type SimEmulator =
    Emulator<RegisterController<SimulatedBus>, SimulatedPanel, FileImageStore, TerminalDisplay>;

/// Operator input decoded from the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    ToggleRunLoad,
    WriteProtect,
    TogglePower,
    ToggleSag,
    Console(char),
    Quit,
}

/// Translate crossterm key events to operator input.
fn translate_key(code: KeyCode, modifiers: KeyModifiers) -> Option<Key> {
    if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('c') {
        return Some(Key::Quit);
    }

    match code {
        KeyCode::Char(c) => match c.to_ascii_lowercase() {
            'r' => Some(Key::ToggleRunLoad),
            'w' => Some(Key::WriteProtect),
            'p' => Some(Key::TogglePower),
            'v' => Some(Key::ToggleSag),
            'l' | 's' => Some(Key::Console(c)),
            'q' => Some(Key::Quit),
            _ => None,
        },
        KeyCode::Esc => Some(Key::Quit),
        _ => None,
    }
}

/// Display that prints to stdout, skipping screens identical to the last one.
#[derive(Default)]
struct TerminalDisplay {
    last: Option<(String, String)>,
}

impl TerminalDisplay {
    fn render(&mut self, line1: String, line2: String) {
        let screen = (line1, line2);
        if self.last.as_ref() == Some(&screen) {
            return;
        }

        let stdout = io::stdout();
        let mut handle = stdout.lock();
        // Raw mode: no implicit carriage return.
        let _ = write!(handle, "| {:<16} |\r\n| {:<16} |\r\n\r\n", screen.0, screen.1);
        let _ = handle.flush();
        self.last = Some(screen);
    }
}

impl Display for TerminalDisplay {
    fn show_status(&mut self, line1: &str, line2: &str) {
        self.render(line1.to_string(), line2.to_string());
    }

    fn show_error(&mut self, line1: &str, line2: &str) {
        self.render(format!("! {line1}"), format!("! {line2}"));
    }

    fn show_drive_address(&mut self, address: u8, fixed_mode: bool, image_name: &str) {
        let mode = if fixed_mode { "fixed" } else { "removable" };
        self.render(format!("Drive {address} {mode}"), image_name.to_string());
    }
}

/// Converts LF to CRLF so log lines stay aligned while the terminal is in
/// raw mode.
struct CrlfWriter<W> {
    inner: W,
    pending_lf: bool,
}

impl<W: Write> CrlfWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            pending_lf: false,
        }
    }

    fn flush_lf(&mut self) -> io::Result<()> {
        if self.pending_lf {
            if self.inner.write(b"\n")? == 0 {
                return Err(io::ErrorKind::WriteZero.into());
            }
            self.pending_lf = false;
        }
        Ok(())
    }
}

impl<W: Write> Write for CrlfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.flush_lf()?;
        if buf.first() == Some(&b'\n') {
            return match self.inner.write(b"\r\n")? {
                0 => Ok(0),
                1 => {
                    self.pending_lf = true;
                    Ok(1)
                }
                _ => Ok(1),
            };
        }

        let end = buf.iter().position(|b| *b == b'\n').unwrap_or(buf.len());
        self.inner.write(&buf[..end])
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_lf()?;
        self.inner.flush()
    }
}

/// Install the stderr tracing subscriber. `V2315_LOG` takes precedence over
/// `--trace`.
fn init_tracing(trace: bool) -> Result<(), Box<dyn std::error::Error>> {
    let filter = match std::env::var("V2315_LOG") {
        Ok(directives) => EnvFilter::try_new(directives)?,
        Err(_) => EnvFilter::new(if trace { "debug" } else { "info" }),
    };

    let is_terminal = io::stderr().is_terminal();
    let writer = if is_terminal {
        BoxMakeWriter::new(|| CrlfWriter::new(io::stderr()))
    } else {
        BoxMakeWriter::new(io::stderr)
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(is_terminal)
        .try_init()
        .map_err(|e| e as Box<dyn std::error::Error>)?;
    Ok(())
}

fn build_emulator(args: &Args) -> Result<SimEmulator, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => EmulatorConfig::load(path)?,
        None => EmulatorConfig::default(),
    };
    if let Some(image) = &args.image {
        config.image_file = image.clone();
    }

    let mut bus = SimulatedBus::default();
    bus.auto_ready = true;
    bus.real_mode = args.real_mode;

    let store = FileImageStore::new(args.image_dir.clone(), config.image_file.clone());
    info!(path = %store.path().display(), "serving cartridge image");

    let emu = Emulator::new(
        config,
        RegisterController::new(bus),
        SimulatedPanel::new(),
        store,
        TerminalDisplay::default(),
    )?;
    Ok(emu)
}

/// Apply one key. Returns false when the operator asked to quit.
fn apply_key(emu: &mut SimEmulator, key: Key, nominal_supply: u16) -> bool {
    match key {
        Key::ToggleRunLoad => {
            let panel = emu.panel_mut();
            panel.run_load = !panel.run_load;
            info!(run = panel.run_load, "RUN/LOAD switch");
        }
        Key::WriteProtect => emu.panel_mut().write_protect = true,
        Key::TogglePower => {
            let panel = emu.panel_mut();
            panel.power_failed = !panel.power_failed;
        }
        Key::ToggleSag => {
            let panel = emu.panel_mut();
            panel.supply = if panel.supply == nominal_supply {
                SAGGED_SUPPLY
            } else {
                nominal_supply
            };
        }
        Key::Console(ch) => emu.mailbox().post(ch),
        Key::Quit => return false,
    }
    true
}

async fn run(
    emu: &mut SimEmulator,
    key_rx: &mut mpsc::UnboundedReceiver<Key>,
    limit: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let nominal_supply = emu.panel().supply;
    let mut interval = tokio::time::interval(emu.config().tick_period());

    loop {
        interval.tick().await;

        while let Ok(key) = key_rx.try_recv() {
            if !apply_key(emu, key, nominal_supply) {
                return Ok(());
            }
        }

        emu.tick()?;
        // Polls the interrupt line; a no-op unless an event is pending.
        emu.service_interrupt()?;

        // The write-protect key is a momentary press.
        emu.panel_mut().write_protect = false;

        if limit.is_some_and(|limit| emu.ticks() >= limit) {
            info!(ticks = emu.ticks(), state = %emu.state(), "tick limit reached");
            return Ok(());
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(args.trace)?;

    let mut emu = build_emulator(&args)?;

    // Create channel for operator keys
    let (key_tx, mut key_rx) = mpsc::unbounded_channel::<Key>();

    // Create shutdown signal
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

    // Enable raw mode (gracefully handle non-TTY)
    let raw_mode_enabled = enable_raw_mode().is_ok();

    // Spawn terminal input reader
    let input_handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = tokio::time::sleep(Duration::from_millis(10)) => {
                    if !event::poll(Duration::from_millis(0)).unwrap_or(false) {
                        continue;
                    }
                    if let Ok(Event::Key(key_event)) = event::read() {
                        if key_event.kind != KeyEventKind::Press {
                            continue;
                        }
                        if let Some(key) = translate_key(key_event.code, key_event.modifiers) {
                            if key_tx.send(key).is_err() {
                                break; // Channel closed
                            }
                        }
                    }
                }
            }
        }
    });

    let result = run(&mut emu, &mut key_rx, args.ticks).await;

    // Signal input handler to stop
    let _ = shutdown_tx.send(()).await;
    let _ = input_handle.await;

    if raw_mode_enabled {
        let _ = disable_raw_mode();
    }

    if let Err(e) = &result {
        error!(error = %e, state = %emu.state(), "emulator stopped");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_key() {
        assert_eq!(
            translate_key(KeyCode::Char('R'), KeyModifiers::SHIFT),
            Some(Key::ToggleRunLoad)
        );
        assert_eq!(
            translate_key(KeyCode::Char('L'), KeyModifiers::SHIFT),
            Some(Key::Console('L'))
        );
        assert_eq!(
            translate_key(KeyCode::Char('c'), KeyModifiers::CONTROL),
            Some(Key::Quit)
        );
        assert_eq!(translate_key(KeyCode::Char('x'), KeyModifiers::NONE), None);
    }

    #[test]
    fn test_crlf_writer() {
        let mut out = Vec::new();
        {
            let mut writer = CrlfWriter::new(&mut out);
            writer.write_all(b"one\ntwo\n").unwrap();
            writer.flush().unwrap();
        }
        assert_eq!(out, b"one\r\ntwo\r\n");
    }

    #[test]
    fn test_terminal_display_skips_repeats() {
        let mut display = TerminalDisplay::default();
        display.show_status("Loading", "2315.dsk");
        let first = display.last.clone();
        display.show_status("Loading", "2315.dsk");
        assert_eq!(display.last, first);
        display.show_error("Load error", "Bad header");
        assert_eq!(
            display.last,
            Some(("! Load error".to_string(), "! Bad header".to_string()))
        );
    }
}
