//! Dictionary parsing: separators, sorted entry table, and the tokenizer that
//! drives `sread`/`aread`/`tokenise`.

use log::debug;

use crate::error::ZResult;
use crate::text;
use crate::vm::VM;

impl VM {
    /// ZSCII codes of the story's word separators (always includes the space
    /// implicitly via whitespace splitting, but each separator byte here is
    /// itself also emitted as a one-character word).
    pub fn dictionary_separators(&self) -> ZResult<Vec<u8>> {
        let dict_addr = self.game.header.dictionary as u32;
        let count = self.read_byte(dict_addr)?;
        let mut seps = Vec::with_capacity(count as usize);
        for i in 0..count as u32 {
            seps.push(self.read_byte(dict_addr + 1 + i)?);
        }
        Ok(seps)
    }

    fn dictionary_layout(&self) -> ZResult<(u32, u8, u16, u32)> {
        let dict_addr = self.game.header.dictionary as u32;
        let sep_count = self.read_byte(dict_addr)? as u32;
        let entry_start = dict_addr + 1 + sep_count;
        let entry_length = self.read_byte(entry_start)?;
        let entry_count = self.read_word(entry_start + 1)?;
        let entries_addr = entry_start + 3;
        Ok((entries_addr, entry_length, entry_count, dict_addr))
    }

    fn encode_word(&self, word: &str) -> Vec<u16> {
        let zchars = self.game.header.dictionary_key_zchars();
        text::encode_zstring(word, zchars)
    }

    /// Binary search the dictionary for `word`, returning its entry address
    /// or 0 if absent. The dictionary is sorted ascending by encoded key.
    pub fn lookup_word(&self, word: &str) -> ZResult<u16> {
        let (entries_addr, entry_length, entry_count, _) = self.dictionary_layout()?;
        let key = self.encode_word(word);
        let key_words = key.len();

        let mut low: i64 = 0;
        let mut high: i64 = entry_count as i64 - 1;

        while low <= high {
            let mid = (low + high) / 2;
            let addr = entries_addr + mid as u32 * entry_length as u32;
            let mut entry_key = Vec::with_capacity(key_words);
            for w in 0..key_words {
                entry_key.push(self.read_word(addr + (w as u32) * 2)?);
            }
            match key.cmp(&entry_key) {
                std::cmp::Ordering::Less => high = mid - 1,
                std::cmp::Ordering::Greater => low = mid + 1,
                std::cmp::Ordering::Equal => {
                    debug!("dictionary lookup '{word}' -> {addr:#06x}");
                    return Ok(addr as u16);
                }
            }
        }
        debug!("dictionary lookup '{word}' -> not found");
        Ok(0)
    }

    /// Split raw input into (word, byte-offset-in-input) pairs at whitespace
    /// and at each dictionary separator, with each separator itself becoming
    /// its own one-character word.
    pub fn tokenize(&self, input: &str) -> ZResult<Vec<(String, usize)>> {
        let separators = self.dictionary_separators()?;
        let sep_chars: Vec<char> = separators
            .iter()
            .filter_map(|&b| crate::zscii::to_char(b as u16, None))
            .collect();

        let mut words = Vec::new();
        let mut current = String::new();
        let mut current_start = 0usize;
        let chars: Vec<char> = input.chars().collect();

        let flush = |current: &mut String, start: usize, words: &mut Vec<(String, usize)>| {
            if !current.is_empty() {
                words.push((std::mem::take(current), start));
            }
        };

        for (i, &ch) in chars.iter().enumerate() {
            if ch.is_whitespace() {
                flush(&mut current, current_start, &mut words);
            } else if sep_chars.contains(&ch) {
                flush(&mut current, current_start, &mut words);
                words.push((ch.to_string(), i));
            } else {
                if current.is_empty() {
                    current_start = i;
                }
                current.push(ch);
            }
        }
        flush(&mut current, current_start, &mut words);
        Ok(words)
    }

    /// Implements `sread`/`aread`'s post-processing: tokenize the text buffer
    /// and write dictionary addresses, lengths, and offsets into the parse
    /// buffer.
    pub fn parse_text(&mut self, text_buffer: u32, parse_buffer: u32) -> ZResult<()> {
        let text_len = self.read_byte(text_buffer + 1)? as usize;
        let mut text = String::with_capacity(text_len);
        for i in 0..text_len {
            let ch = self.read_byte(text_buffer + 2 + i as u32)?;
            text.push(ch as char);
        }

        let max_words = self.read_byte(parse_buffer)?;
        let words = self.tokenize(&text)?;
        let word_count = words.len().min(max_words as usize);

        self.write_byte(parse_buffer + 1, word_count as u8)?;

        for (i, (word, offset)) in words.iter().take(word_count).enumerate() {
            let dict_addr = self.lookup_word(&word.to_lowercase())?;
            let entry_offset = parse_buffer + 2 + (i * 4) as u32;
            self.write_word(entry_offset, dict_addr)?;
            self.write_byte(entry_offset + 2, word.chars().count() as u8)?;
            self.write_byte(entry_offset + 3, (offset + 2) as u8)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Game;

    fn dict_vm(words: &[&str]) -> VM {
        let mut bytes = vec![0u8; 0x400];
        bytes[0] = 3;
        bytes[0x0E] = 0x02;
        bytes[0x0F] = 0x00; // static base 0x200

        let dict_addr: u32 = 0x100;
        bytes[0x08] = (dict_addr >> 8) as u8;
        bytes[0x09] = dict_addr as u8;

        // no separators
        bytes[dict_addr as usize] = 0;
        let entry_start = dict_addr + 1;
        bytes[entry_start as usize] = 4; // entry length (v3: 4 key bytes + 0 data)
        bytes[entry_start as usize + 1] = 0;
        bytes[entry_start as usize + 2] = words.len() as u8;

        let entries_addr = entry_start + 3;
        let mut encoded: Vec<Vec<u16>> = words
            .iter()
            .map(|w| text::encode_zstring(w, 4))
            .collect();
        encoded.sort();
        for (i, enc) in encoded.iter().enumerate() {
            let addr = entries_addr + i as u32 * 4;
            bytes[addr as usize] = (enc[0] >> 8) as u8;
            bytes[addr as usize + 1] = enc[0] as u8;
            bytes[addr as usize + 2] = (enc[1] >> 8) as u8;
            bytes[addr as usize + 3] = enc[1] as u8;
        }

        VM::new(Game::load(bytes).unwrap())
    }

    #[test_log::test]
    fn finds_known_word() {
        let vm = dict_vm(&["take", "drop", "look"]);
        let addr = vm.lookup_word("look").unwrap();
        assert_ne!(addr, 0);
    }

    #[test_log::test]
    fn missing_word_returns_zero() {
        let vm = dict_vm(&["take", "drop"]);
        assert_eq!(vm.lookup_word("xyzzy").unwrap(), 0);
    }

    #[test]
    fn tokenize_splits_on_whitespace() {
        let vm = dict_vm(&["take"]);
        let words = vm.tokenize("take lamp").unwrap();
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].0, "take");
        assert_eq!(words[1].0, "lamp");
    }
}
