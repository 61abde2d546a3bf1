//! Interactive [`ZMachineIo`] backed by a real terminal via `crossterm`. The
//! upper window (status line / v4+ split window) is drawn with direct cursor
//! addressing; the lower window just streams text.

use std::io::{self, Write};
use std::path::PathBuf;

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode};
use crossterm::style::{Attribute, SetAttribute};
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::{execute, queue};

use crate::error::{ZError, ZResult};
use crate::io::ZMachineIo;

fn io_err(e: impl std::fmt::Display) -> ZError {
    ZError::io(e.to_string())
}

pub struct TerminalIo {
    current_window: u8,
    upper_window_lines: u16,
    raw_mode: bool,
    save_path: PathBuf,
}

impl TerminalIo {
    pub fn new() -> ZResult<Self> {
        Ok(TerminalIo {
            current_window: 0,
            upper_window_lines: 0,
            raw_mode: false,
            save_path: PathBuf::from("zmachina.qzl"),
        })
    }

    pub fn with_save_path(path: PathBuf) -> ZResult<Self> {
        Ok(TerminalIo {
            save_path: path,
            ..Self::new()?
        })
    }

    fn ensure_raw_mode(&mut self) -> ZResult<()> {
        if !self.raw_mode {
            terminal::enable_raw_mode().map_err(io_err)?;
            self.raw_mode = true;
        }
        Ok(())
    }
}

impl Drop for TerminalIo {
    fn drop(&mut self) {
        if self.raw_mode {
            let _ = terminal::disable_raw_mode();
        }
    }
}

impl Default for TerminalIo {
    fn default() -> Self {
        Self::new().expect("failed to initialize terminal")
    }
}

impl ZMachineIo for TerminalIo {
    fn clear_screen(&mut self) -> ZResult<()> {
        execute!(io::stdout(), Clear(ClearType::All)).map_err(io_err)
    }

    fn split_window(&mut self, lines: u16) -> ZResult<()> {
        self.upper_window_lines = lines;
        Ok(())
    }

    fn set_window(&mut self, window: u8) -> ZResult<()> {
        self.current_window = window;
        Ok(())
    }

    fn set_cursor(&mut self, line: u16, column: u16) -> ZResult<()> {
        execute!(io::stdout(), MoveTo(column.saturating_sub(1), line.saturating_sub(1)))
            .map_err(io_err)
    }

    fn get_cursor(&mut self) -> ZResult<(u16, u16)> {
        let (col, row) = crossterm::cursor::position().map_err(io_err)?;
        Ok((row + 1, col + 1))
    }

    fn erase_window(&mut self, window: i16) -> ZResult<()> {
        match window {
            -1 | -2 => execute!(io::stdout(), Clear(ClearType::All)).map_err(io_err),
            _ => execute!(io::stdout(), Clear(ClearType::CurrentLine)).map_err(io_err),
        }
    }

    fn erase_line(&mut self) -> ZResult<()> {
        execute!(io::stdout(), Clear(ClearType::UntilNewLine)).map_err(io_err)
    }

    fn print(&mut self, text: &str) -> ZResult<()> {
        print!("{text}");
        io::stdout().flush().map_err(io_err)
    }

    fn print_char(&mut self, ch: char) -> ZResult<()> {
        print!("{ch}");
        io::stdout().flush().map_err(io_err)
    }

    fn set_text_style(&mut self, style: u16) -> ZResult<()> {
        let mut stdout = io::stdout();
        if style == 0 {
            queue!(stdout, SetAttribute(Attribute::Reset)).map_err(io_err)?;
        } else {
            if style & 1 != 0 {
                queue!(stdout, SetAttribute(Attribute::Reverse)).map_err(io_err)?;
            }
            if style & 2 != 0 {
                queue!(stdout, SetAttribute(Attribute::Bold)).map_err(io_err)?;
            }
            if style & 4 != 0 {
                queue!(stdout, SetAttribute(Attribute::Italic)).map_err(io_err)?;
            }
        }
        stdout.flush().map_err(io_err)
    }

    fn set_buffer_mode(&mut self, _buffered: bool) -> ZResult<()> {
        Ok(())
    }

    fn set_colour(&mut self, _foreground: u16, _background: u16) -> ZResult<()> {
        Ok(())
    }

    fn set_font(&mut self, _font: u16) -> ZResult<bool> {
        Ok(false)
    }

    fn show_status(&mut self, location: &str, score: i16, moves: u16) -> ZResult<()> {
        let (cols, _) = self.get_terminal_size();
        let right = format!("{score}/{moves}");
        let mut stdout = io::stdout();
        queue!(stdout, MoveTo(0, 0), Clear(ClearType::CurrentLine)).map_err(io_err)?;
        let pad = (cols as usize).saturating_sub(location.len() + right.len() + 2);
        write!(stdout, " {location}{}{right} ", " ".repeat(pad)).map_err(io_err)?;
        stdout.flush().map_err(io_err)
    }

    fn read_line(&mut self, max_len: usize) -> ZResult<String> {
        let mut line = String::new();
        io::stdin().read_line(&mut line).map_err(io_err)?;
        let line = line.trim_end_matches(['\n', '\r']).to_string();
        Ok(line.chars().take(max_len).collect())
    }

    fn read_char(&mut self) -> ZResult<u16> {
        self.ensure_raw_mode()?;
        loop {
            if let Event::Key(key) = event::read().map_err(io_err)? {
                return Ok(match key.code {
                    KeyCode::Enter => 13,
                    KeyCode::Backspace => 8,
                    KeyCode::Esc => 27,
                    KeyCode::Up => 129,
                    KeyCode::Down => 130,
                    KeyCode::Left => 131,
                    KeyCode::Right => 132,
                    KeyCode::Char(c) => c as u16,
                    _ => continue,
                });
            }
        }
    }

    fn output_stream(&mut self, _stream: i16, _table_addr: Option<u16>) -> ZResult<()> {
        Ok(())
    }

    fn input_stream(&mut self, _stream: u16) -> ZResult<()> {
        Ok(())
    }

    fn sound_effect(&mut self, _number: u16, _effect: u16, _volume: u16) -> ZResult<()> {
        print!("\x07");
        io::stdout().flush().map_err(io_err)
    }

    fn save(&mut self, bytes: &[u8]) -> ZResult<bool> {
        match std::fs::write(&self.save_path, bytes) {
            Ok(()) => Ok(true),
            Err(e) => {
                self.print(&format!("Failed to save to {}: {e}\n", self.save_path.display()))?;
                Ok(false)
            }
        }
    }

    fn restore(&mut self) -> ZResult<Option<Vec<u8>>> {
        match std::fs::read(&self.save_path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(_) => Ok(None),
        }
    }

    fn get_terminal_size(&self) -> (u16, u16) {
        terminal::size().unwrap_or((80, 24))
    }

    fn force_refresh(&mut self) -> ZResult<()> {
        io::stdout().flush().map_err(io_err)
    }
}

#[allow(dead_code)]
fn hide_cursor() -> ZResult<()> {
    execute!(io::stdout(), Hide).map_err(io_err)
}

#[allow(dead_code)]
fn show_cursor() -> ZResult<()> {
    execute!(io::stdout(), Show).map_err(io_err)
}
