//! Command-line front end: load a story file, wire up a terminal or headless
//! host, and run the dispatcher until it quits.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use zmachina::cpu::Cpu;
use zmachina::error::{ZError, ZResult};
use zmachina::io::ZMachineIo;
use zmachina::io_headless::HeadlessIo;
use zmachina::io_terminal::TerminalIo;
use zmachina::memory::Game;
use zmachina::vm::VM;
use zmachina::zrand::ZRand;

#[derive(Parser)]
#[command(name = "zmachina", about = "A Z-machine interpreter")]
struct Cli {
    /// Path to a story file (.z1-.z8 / .zblorb)
    story: PathBuf,

    /// Seed the random generator for reproducible playback
    #[arg(long)]
    seed: Option<u64>,

    /// Tee all host output to this file in addition to the screen
    #[arg(long)]
    transcript: Option<PathBuf>,

    /// Log filter passed to env_logger (e.g. "trace", "zmachina::cpu=debug")
    #[arg(long, default_value = "warn")]
    trace: String,

    /// Run against the headless IO host instead of the terminal one
    #[arg(long)]
    headless: bool,
}

/// Tees every host call to an inner [`ZMachineIo`] and mirrors printed text
/// into a transcript file.
struct TranscriptIo {
    inner: Box<dyn ZMachineIo>,
    file: fs::File,
}

impl TranscriptIo {
    fn new(inner: Box<dyn ZMachineIo>, path: &std::path::Path) -> ZResult<Self> {
        let file = fs::File::create(path).map_err(|e| ZError::io(e.to_string()))?;
        Ok(TranscriptIo { inner, file })
    }

    fn tee(&mut self, text: &str) -> ZResult<()> {
        self.file
            .write_all(text.as_bytes())
            .map_err(|e| ZError::io(e.to_string()))
    }
}

impl ZMachineIo for TranscriptIo {
    fn clear_screen(&mut self) -> ZResult<()> {
        self.inner.clear_screen()
    }

    fn split_window(&mut self, lines: u16) -> ZResult<()> {
        self.inner.split_window(lines)
    }

    fn set_window(&mut self, window: u8) -> ZResult<()> {
        self.inner.set_window(window)
    }

    fn set_cursor(&mut self, line: u16, column: u16) -> ZResult<()> {
        self.inner.set_cursor(line, column)
    }

    fn get_cursor(&mut self) -> ZResult<(u16, u16)> {
        self.inner.get_cursor()
    }

    fn erase_window(&mut self, window: i16) -> ZResult<()> {
        self.inner.erase_window(window)
    }

    fn erase_line(&mut self) -> ZResult<()> {
        self.inner.erase_line()
    }

    fn print(&mut self, text: &str) -> ZResult<()> {
        self.tee(text)?;
        self.inner.print(text)
    }

    fn print_char(&mut self, ch: char) -> ZResult<()> {
        let mut buf = [0u8; 4];
        self.tee(ch.encode_utf8(&mut buf))?;
        self.inner.print_char(ch)
    }

    fn set_text_style(&mut self, style: u16) -> ZResult<()> {
        self.inner.set_text_style(style)
    }

    fn set_buffer_mode(&mut self, buffered: bool) -> ZResult<()> {
        self.inner.set_buffer_mode(buffered)
    }

    fn set_colour(&mut self, foreground: u16, background: u16) -> ZResult<()> {
        self.inner.set_colour(foreground, background)
    }

    fn set_font(&mut self, font: u16) -> ZResult<bool> {
        self.inner.set_font(font)
    }

    fn show_status(&mut self, location: &str, score: i16, moves: u16) -> ZResult<()> {
        self.inner.show_status(location, score, moves)
    }

    fn read_line(&mut self, max_len: usize) -> ZResult<String> {
        let line = self.inner.read_line(max_len)?;
        self.tee(&line)?;
        self.tee("\n")?;
        Ok(line)
    }

    fn read_char(&mut self) -> ZResult<u16> {
        self.inner.read_char()
    }

    fn output_stream(&mut self, stream: i16, table_addr: Option<u16>) -> ZResult<()> {
        self.inner.output_stream(stream, table_addr)
    }

    fn input_stream(&mut self, stream: u16) -> ZResult<()> {
        self.inner.input_stream(stream)
    }

    fn sound_effect(&mut self, number: u16, effect: u16, volume: u16) -> ZResult<()> {
        self.inner.sound_effect(number, effect, volume)
    }

    fn save(&mut self, bytes: &[u8]) -> ZResult<bool> {
        self.inner.save(bytes)
    }

    fn restore(&mut self) -> ZResult<Option<Vec<u8>>> {
        self.inner.restore()
    }

    fn get_terminal_size(&self) -> (u16, u16) {
        self.inner.get_terminal_size()
    }

    fn force_refresh(&mut self) -> ZResult<()> {
        self.inner.force_refresh()
    }
}

fn run(cli: Cli) -> ZResult<()> {
    let bytes = fs::read(&cli.story).map_err(|e| ZError::io(e.to_string()))?;
    let game = Game::load(bytes)?;
    let vm = VM::new(game);

    let rng = match cli.seed {
        Some(seed) => ZRand::new_predictable(seed),
        None => ZRand::new_uniform(),
    };

    let use_headless = cli.headless || !atty::is(atty::Stream::Stdout);
    let io: Box<dyn ZMachineIo> = if use_headless {
        Box::new(HeadlessIo::new())
    } else {
        Box::new(TerminalIo::new()?)
    };
    let io: Box<dyn ZMachineIo> = match &cli.transcript {
        Some(path) => Box::new(TranscriptIo::new(io, path)?),
        None => io,
    };

    let mut cpu = Cpu::new(vm, io, rng);
    cpu.run()
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.trace.as_str())).init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("zmachina: {e}");
            ExitCode::FAILURE
        }
    }
}
