//! The host I/O boundary: everything a running story needs from its terminal
//! (screen windows, cursor, style, sound) and its player (line and character
//! input), factored out of the dispatcher so the same core runs headless in
//! tests and interactively on a real terminal.

use crate::error::ZResult;

/// What a story can ask its host to do. One implementation talks to a real
/// terminal; another just records calls for tests.
pub trait ZMachineIo {
    fn clear_screen(&mut self) -> ZResult<()>;
    fn split_window(&mut self, lines: u16) -> ZResult<()>;
    fn set_window(&mut self, window: u8) -> ZResult<()>;
    fn set_cursor(&mut self, line: u16, column: u16) -> ZResult<()>;
    fn get_cursor(&mut self) -> ZResult<(u16, u16)>;
    fn erase_window(&mut self, window: i16) -> ZResult<()>;
    fn erase_line(&mut self) -> ZResult<()>;

    fn print(&mut self, text: &str) -> ZResult<()>;
    fn print_char(&mut self, ch: char) -> ZResult<()>;
    fn set_text_style(&mut self, style: u16) -> ZResult<()>;
    fn set_buffer_mode(&mut self, buffered: bool) -> ZResult<()>;
    fn set_colour(&mut self, foreground: u16, background: u16) -> ZResult<()>;
    fn set_font(&mut self, font: u16) -> ZResult<bool>;

    fn show_status(&mut self, location: &str, score: i16, moves: u16) -> ZResult<()>;

    /// Read a full line of input, echoing as the player types. Returns the
    /// raw line (not yet lowercased or tokenized).
    fn read_line(&mut self, max_len: usize) -> ZResult<String>;
    /// Read a single keystroke, returning its ZSCII code.
    fn read_char(&mut self) -> ZResult<u16>;

    /// Story-selected output stream 3 (memory) is handled by the dispatcher;
    /// this only toggles stream 1 (screen) and stream 2 (transcript).
    fn output_stream(&mut self, stream: i16, table_addr: Option<u16>) -> ZResult<()>;
    fn input_stream(&mut self, stream: u16) -> ZResult<()>;

    fn sound_effect(&mut self, number: u16, effect: u16, volume: u16) -> ZResult<()>;

    /// Persist a Quetzal save image however the host sees fit (a file, a
    /// slot, etc). Returns whether the save succeeded.
    fn save(&mut self, bytes: &[u8]) -> ZResult<bool>;
    /// Retrieve a previously saved Quetzal image, or `None` if the player
    /// declined or none is available.
    fn restore(&mut self) -> ZResult<Option<Vec<u8>>>;

    fn get_terminal_size(&self) -> (u16, u16);
    fn force_refresh(&mut self) -> ZResult<()>;
}
