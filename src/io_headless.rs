//! A non-interactive [`ZMachineIo`] used by tests, scripted playback, and any
//! invocation where standard input/output are not a terminal: all window
//! output is appended to one buffer, and input is drawn from a pre-loaded
//! queue instead of a live keyboard.

use crate::error::{ZError, ZResult};
use crate::io::ZMachineIo;

pub struct HeadlessIo {
    pub transcript: String,
    pub status_line: Option<(String, i16, u16)>,
    input_queue: std::collections::VecDeque<String>,
    char_queue: std::collections::VecDeque<u16>,
    saved_game: Option<Vec<u8>>,
}

impl HeadlessIo {
    pub fn new() -> Self {
        HeadlessIo {
            transcript: String::new(),
            status_line: None,
            input_queue: std::collections::VecDeque::new(),
            char_queue: std::collections::VecDeque::new(),
            saved_game: None,
        }
    }

    pub fn queue_line(&mut self, line: impl Into<String>) {
        self.input_queue.push_back(line.into());
    }

    pub fn queue_char(&mut self, zscii: u16) {
        self.char_queue.push_back(zscii);
    }
}

impl Default for HeadlessIo {
    fn default() -> Self {
        Self::new()
    }
}

impl ZMachineIo for HeadlessIo {
    fn clear_screen(&mut self) -> ZResult<()> {
        Ok(())
    }

    fn split_window(&mut self, _lines: u16) -> ZResult<()> {
        Ok(())
    }

    fn set_window(&mut self, _window: u8) -> ZResult<()> {
        Ok(())
    }

    fn set_cursor(&mut self, _line: u16, _column: u16) -> ZResult<()> {
        Ok(())
    }

    fn get_cursor(&mut self) -> ZResult<(u16, u16)> {
        Ok((1, 1))
    }

    fn erase_window(&mut self, _window: i16) -> ZResult<()> {
        Ok(())
    }

    fn erase_line(&mut self) -> ZResult<()> {
        Ok(())
    }

    fn print(&mut self, text: &str) -> ZResult<()> {
        self.transcript.push_str(text);
        Ok(())
    }

    fn print_char(&mut self, ch: char) -> ZResult<()> {
        self.transcript.push(ch);
        Ok(())
    }

    fn set_text_style(&mut self, _style: u16) -> ZResult<()> {
        Ok(())
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
        self.status_line = Some((location.to_string(), score, moves));
        Ok(())
    }

    fn read_line(&mut self, max_len: usize) -> ZResult<String> {
        let mut line = self
            .input_queue
            .pop_front()
            .ok_or_else(|| ZError::io("no scripted input remaining"))?;
        line.truncate(max_len);
        Ok(line)
    }

    fn read_char(&mut self) -> ZResult<u16> {
        self.char_queue
            .pop_front()
            .ok_or_else(|| ZError::io("no scripted keystroke remaining"))
    }

    fn output_stream(&mut self, _stream: i16, _table_addr: Option<u16>) -> ZResult<()> {
        Ok(())
    }

    fn input_stream(&mut self, _stream: u16) -> ZResult<()> {
        Ok(())
    }

    fn sound_effect(&mut self, _number: u16, _effect: u16, _volume: u16) -> ZResult<()> {
        Ok(())
    }

    fn save(&mut self, bytes: &[u8]) -> ZResult<bool> {
        self.saved_game = Some(bytes.to_vec());
        Ok(true)
    }

    fn restore(&mut self) -> ZResult<Option<Vec<u8>>> {
        Ok(self.saved_game.clone())
    }

    fn get_terminal_size(&self) -> (u16, u16) {
        (80, 24)
    }

    fn force_refresh(&mut self) -> ZResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_appends_to_transcript() {
        let mut io = HeadlessIo::new();
        io.print("hello ").unwrap();
        io.print_char('!').unwrap();
        assert_eq!(io.transcript, "hello !");
    }

    #[test]
    fn read_line_drains_the_queue() {
        let mut io = HeadlessIo::new();
        io.queue_line("take lamp");
        assert_eq!(io.read_line(80).unwrap(), "take lamp");
        assert!(io.read_line(80).is_err());
    }

    #[test]
    fn save_round_trips_through_restore() {
        let mut io = HeadlessIo::new();
        assert!(io.restore().unwrap().is_none());
        io.save(&[1, 2, 3]).unwrap();
        assert_eq!(io.restore().unwrap(), Some(vec![1, 2, 3]));
    }
}
