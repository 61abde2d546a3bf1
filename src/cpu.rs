//! The dispatcher: decode-execute loop, operand resolution, branch/store
//! application, and the opcodes that are pure control flow or host IO. The
//! arithmetic, object-tree, and memory-array opcodes are delegated to their
//! own modules; this file owns everything else.

use log::{debug, trace};

use crate::error::{ZError, ZResult};
use crate::instruction::{Instruction, OperandType};
use crate::io::ZMachineIo;
use crate::quetzal;
use crate::text;
use crate::vm::VM;
use crate::zrand::ZRand;

/// What happened after dispatching one instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    Continue,
    Branched,
    Called,
    Returned(u16),
    Quit,
}

/// Ties the machine state (`VM`) to a random source and a host. Generic only
/// in the sense that callers choose the IO implementation; the struct itself
/// is concrete, matching how a single run only ever has one host.
pub struct Cpu {
    pub vm: VM,
    pub io: Box<dyn ZMachineIo>,
    pub rng: ZRand,
    /// Stack of table addresses receiving output while stream 3 is active;
    /// printing goes to the innermost one instead of the screen.
    mem_streams: Vec<(u32, Vec<u8>)>,
    quit_requested: bool,
}

impl Cpu {
    pub fn new(vm: VM, io: Box<dyn ZMachineIo>, rng: ZRand) -> Self {
        Cpu {
            vm,
            io,
            rng,
            mem_streams: Vec::new(),
            quit_requested: false,
        }
    }

    pub fn run(&mut self) -> ZResult<()> {
        loop {
            match self.step() {
                Ok(ExecutionResult::Quit) => return Ok(()),
                Ok(_) => {}
                Err(e) => {
                    log::error!("fatal error at pc {:#06x}: {e}", self.vm.pc);
                    return Err(e);
                }
            }
        }
    }

    /// Decode and execute one instruction.
    pub fn step(&mut self) -> ZResult<ExecutionResult> {
        let pc = self.vm.pc;
        let version = self.vm.game.header.version;
        let inst = Instruction::decode(&self.vm.game.memory, pc as usize, version)?;
        trace!("{:#06x}: {}", pc, inst.format_with_version(version));
        self.vm.pc += inst.size as u32;

        let operands = self.resolve_operands(&inst)?;
        let result = self.execute(&inst, &operands)?;
        if self.quit_requested {
            return Ok(ExecutionResult::Quit);
        }
        Ok(result)
    }

    fn resolve_operands(&mut self, inst: &Instruction) -> ZResult<Vec<u16>> {
        inst.operands
            .iter()
            .zip(inst.operand_types.iter())
            .map(|(&raw, ty)| match ty {
                OperandType::Variable => self.vm.read_variable(raw as u8),
                _ => Ok(raw),
            })
            .collect()
    }

    fn execute(&mut self, inst: &Instruction, operands: &[u16]) -> ZResult<ExecutionResult> {
        use crate::instruction::{InstructionForm, OperandCount};

        if inst.form == InstructionForm::Extended {
            return self.execute_ext(inst, operands);
        }
        match inst.operand_count {
            OperandCount::OP0 => self.execute_0op(inst, operands),
            OperandCount::OP1 => self.execute_1op(inst, operands),
            OperandCount::OP2 => self.execute_2op(inst, operands),
            OperandCount::VAR => self.execute_var(inst, operands),
        }
    }

    pub(crate) fn store(&mut self, inst: &Instruction, value: u16) -> ZResult<()> {
        match inst.store_var {
            Some(var) => self.vm.write_variable(var, value),
            None => Ok(()),
        }
    }

    /// Apply a conditional opcode's outcome: branch, fall through, or
    /// implicitly return if the branch offset is the 0/1 special case.
    pub(crate) fn branch(&mut self, inst: &Instruction, condition: bool) -> ZResult<ExecutionResult> {
        let Some(branch) = &inst.branch else {
            return Ok(ExecutionResult::Continue);
        };
        if condition != branch.on_true {
            return Ok(ExecutionResult::Continue);
        }
        match branch.offset {
            0 => {
                self.vm.return_from_routine(0)?;
                Ok(ExecutionResult::Returned(0))
            }
            1 => {
                self.vm.return_from_routine(1)?;
                Ok(ExecutionResult::Returned(1))
            }
            n => {
                self.vm.pc = (self.vm.pc as i32 + n as i32 - 2) as u32;
                Ok(ExecutionResult::Branched)
            }
        }
    }

    fn abbrev_addr(&self) -> usize {
        self.vm.game.header.abbrev_table as usize
    }

    /// Write decoded story text to wherever output currently goes: the
    /// innermost active memory stream, or the screen.
    pub(crate) fn output(&mut self, text: &str) -> ZResult<()> {
        if let Some((_, buf)) = self.mem_streams.last_mut() {
            buf.extend(text.bytes());
            Ok(())
        } else {
            self.io.print(text)
        }
    }

    fn print_string_at(&mut self, addr: u32) -> ZResult<()> {
        let version = self.vm.game.header.version;
        let abbrev_addr = self.abbrev_addr();
        let (s, _) = text::decode_string(&self.vm.game.memory, addr as usize, abbrev_addr, version)?;
        self.output(&s)
    }

    // ---- 0OP ----

    fn execute_0op(&mut self, inst: &Instruction, _operands: &[u16]) -> ZResult<ExecutionResult> {
        match inst.opcode {
            0x00 => {
                // rtrue
                self.vm.return_from_routine(1)?;
                Ok(ExecutionResult::Returned(1))
            }
            0x01 => {
                // rfalse
                self.vm.return_from_routine(0)?;
                Ok(ExecutionResult::Returned(0))
            }
            0x02 => {
                // print
                if let Some(text) = &inst.text {
                    self.output(text)?;
                }
                Ok(ExecutionResult::Continue)
            }
            0x03 => {
                // print_ret
                if let Some(text) = &inst.text {
                    self.output(text)?;
                }
                self.output("\n")?;
                self.vm.return_from_routine(1)?;
                Ok(ExecutionResult::Returned(1))
            }
            0x04 => Ok(ExecutionResult::Continue), // nop
            0x05 => self.op_save(inst),
            0x06 => self.op_restore(inst),
            0x07 => {
                // restart
                self.vm.restart();
                Ok(ExecutionResult::Continue)
            }
            0x08 => {
                // ret_popped
                let value = self.vm.pop()?;
                self.vm.return_from_routine(value)?;
                Ok(ExecutionResult::Returned(value))
            }
            0x09 => {
                if self.vm.game.header.version <= 4 {
                    // pop: discard the stack top
                    self.vm.pop()?;
                } else {
                    // catch: push the current frame depth
                    self.store(inst, self.vm.call_depth() as u16)?;
                }
                Ok(ExecutionResult::Continue)
            }
            0x0A => {
                // quit
                self.quit_requested = true;
                Ok(ExecutionResult::Quit)
            }
            0x0B => {
                // new_line
                self.output("\n")?;
                Ok(ExecutionResult::Continue)
            }
            0x0C => {
                // show_status (v3 only)
                self.op_show_status()?;
                Ok(ExecutionResult::Continue)
            }
            0x0D => {
                // verify: does the story's checksum match the header's?
                let matches = self.vm.game.checksum() == self.vm.game.header.checksum_file;
                self.branch(inst, matches)
            }
            0x0F => {
                // piracy: a forgiving interpreter always answers "genuine"
                self.branch(inst, true)
            }
            _ => Err(ZError::IllegalInstruction {
                opcode: inst.opcode,
                version: self.vm.game.header.version,
            }),
        }
    }

    fn op_show_status(&mut self) -> ZResult<()> {
        let location_obj = self.vm.read_global(0)?;
        let location = if location_obj != 0 {
            self.vm.short_name(location_obj).unwrap_or_default()
        } else {
            String::new()
        };
        let score = self.vm.read_global(1)? as i16;
        let moves = self.vm.read_global(2)?;
        self.io.show_status(&location, score, moves)
    }

    fn op_save(&mut self, inst: &Instruction) -> ZResult<ExecutionResult> {
        let image = quetzal::save_game(&self.vm)?;
        let ok = self.io.save(&image)?;
        debug!("save {}", if ok { "succeeded" } else { "failed" });
        if self.vm.game.header.version <= 3 {
            self.branch(inst, ok)
        } else {
            self.store(inst, ok as u16)?;
            Ok(ExecutionResult::Continue)
        }
    }

    fn op_restore(&mut self, inst: &Instruction) -> ZResult<ExecutionResult> {
        let restored = match self.io.restore()? {
            Some(bytes) => quetzal::restore_game(&mut self.vm, &bytes).is_ok(),
            None => false,
        };
        debug!("restore {}", if restored { "succeeded" } else { "failed" });
        if self.vm.game.header.version <= 3 {
            self.branch(inst, restored)
        } else {
            self.store(inst, restored as u16)?;
            Ok(ExecutionResult::Continue)
        }
    }

    // ---- 1OP ----

    fn execute_1op(&mut self, inst: &Instruction, operands: &[u16]) -> ZResult<ExecutionResult> {
        let a = operands[0];
        match inst.opcode {
            0x00 => self.branch(inst, a == 0), // jz
            0x01 => {
                // get_sibling
                let sibling = self.vm.get_sibling(a)?;
                self.store(inst, sibling)?;
                self.branch(inst, sibling != 0)
            }
            0x02 => {
                // get_child
                let child = self.vm.get_child(a)?;
                self.store(inst, child)?;
                self.branch(inst, child != 0)
            }
            0x03 => {
                // get_parent
                let parent = self.vm.get_parent(a)?;
                self.store(inst, parent)?;
                Ok(ExecutionResult::Continue)
            }
            0x04 => {
                // get_prop_len
                let len = self.vm.prop_len_at(a)?;
                self.store(inst, len)?;
                Ok(ExecutionResult::Continue)
            }
            0x05 => {
                // inc
                let value = self.vm.peek_variable(a as u8)?.wrapping_add(1);
                self.vm.write_variable(a as u8, value)?;
                Ok(ExecutionResult::Continue)
            }
            0x06 => {
                // dec
                let value = self.vm.peek_variable(a as u8)?.wrapping_sub(1);
                self.vm.write_variable(a as u8, value)?;
                Ok(ExecutionResult::Continue)
            }
            0x07 => {
                // print_addr
                self.print_string_at(a as u32)?;
                Ok(ExecutionResult::Continue)
            }
            0x08 => {
                // call_1s
                self.vm.call_routine(a, &[], inst.store_var)?;
                Ok(ExecutionResult::Called)
            }
            0x09 => {
                // remove_obj
                self.vm.remove_object(a)?;
                Ok(ExecutionResult::Continue)
            }
            0x0A => {
                // print_obj
                let name = self.vm.short_name(a)?;
                self.output(&name)?;
                Ok(ExecutionResult::Continue)
            }
            0x0B => {
                // ret
                self.vm.return_from_routine(a)?;
                Ok(ExecutionResult::Returned(a))
            }
            0x0C => {
                // jump: signed offset relative to the instruction after this one
                self.vm.pc = (self.vm.pc as i32 + (a as i16) as i32 - 2) as u32;
                Ok(ExecutionResult::Branched)
            }
            0x0D => {
                // print_paddr
                let addr = self.vm.unpack_string_address(a);
                self.print_string_at(addr)?;
                Ok(ExecutionResult::Continue)
            }
            0x0E => {
                // load: value of the named variable, without the var-0 pop side effect
                let value = self.vm.peek_variable(a as u8)?;
                self.store(inst, value)?;
                Ok(ExecutionResult::Continue)
            }
            0x0F => {
                if self.vm.game.header.version <= 4 {
                    self.store(inst, !a)?;
                    Ok(ExecutionResult::Continue)
                } else {
                    // call_1n: like call_1s but discards the result
                    self.vm.call_routine(a, &[], None)?;
                    Ok(ExecutionResult::Called)
                }
            }
            _ => Err(ZError::IllegalInstruction {
                opcode: inst.opcode,
                version: self.vm.game.header.version,
            }),
        }
    }

    // ---- 2OP ----

    fn execute_2op(&mut self, inst: &Instruction, operands: &[u16]) -> ZResult<ExecutionResult> {
        if Self::is_math_opcode(inst.opcode) {
            return self.execute_math_op(inst, operands);
        }
        if Self::is_object_opcode(inst.opcode) {
            return self.execute_object_op(inst, operands);
        }
        if Self::is_memory_opcode(inst.opcode) {
            return self.execute_memory_op(inst, operands);
        }

        let a = operands[0];
        let b = *operands.get(1).unwrap_or(&0);
        match inst.opcode {
            0x01 => self.branch(inst, a == b), // je (2-operand form; VAR form handles >2)
            0x02 => self.branch(inst, (a as i16) < (b as i16)), // jl
            0x03 => self.branch(inst, (a as i16) > (b as i16)), // jg
            0x04 => {
                // dec_chk
                let value = self.vm.peek_variable(a as u8)?.wrapping_sub(1) as i16;
                self.vm.write_variable(a as u8, value as u16)?;
                self.branch(inst, value < b as i16)
            }
            0x05 => {
                // inc_chk
                let value = self.vm.peek_variable(a as u8)?.wrapping_add(1) as i16;
                self.vm.write_variable(a as u8, value as u16)?;
                self.branch(inst, value > b as i16)
            }
            0x19 => {
                // call_2s
                self.vm.call_routine(a, &[b], inst.store_var)?;
                Ok(ExecutionResult::Called)
            }
            0x1A => {
                // call_2n
                self.vm.call_routine(a, &[b], None)?;
                Ok(ExecutionResult::Called)
            }
            0x07 => {
                // test: branch if every bit set in b is also set in a
                self.branch(inst, a & b == b)
            }
            0x0D => {
                // store
                self.vm.write_variable(a as u8, b)?;
                Ok(ExecutionResult::Continue)
            }
            0x1B => {
                // set_colour
                self.io.set_colour(a, b)?;
                Ok(ExecutionResult::Continue)
            }
            0x1C => {
                if self.vm.game.header.version <= 3 {
                    // not (v1-3 only; b is unused)
                    self.store(inst, !a)?;
                    Ok(ExecutionResult::Continue)
                } else {
                    // throw: unwind to the frame depth `catch` reported and
                    // return `a` from it, as if it had just returned normally.
                    let target_depth = b as usize;
                    if target_depth > self.vm.call_stack.len() {
                        return Err(ZError::format("throw targets a frame deeper than the call stack"));
                    }
                    self.vm.call_stack.truncate(target_depth);
                    self.vm.return_from_routine(a)?;
                    Ok(ExecutionResult::Returned(a))
                }
            }
            0x1F => Ok(ExecutionResult::Continue), // undocumented no-op
            _ => Err(ZError::IllegalInstruction {
                opcode: inst.opcode,
                version: self.vm.game.header.version,
            }),
        }
    }

    fn is_math_opcode(opcode: u8) -> bool {
        matches!(opcode, 0x08 | 0x09 | 0x14..=0x18)
    }

    fn is_object_opcode(opcode: u8) -> bool {
        matches!(opcode, 0x06 | 0x0A | 0x0B | 0x0C | 0x0E | 0x11 | 0x12 | 0x13)
    }

    fn is_memory_opcode(opcode: u8) -> bool {
        matches!(opcode, 0x0F | 0x10)
    }

    // ---- EXT (v5+) ----

    fn execute_ext(&mut self, inst: &Instruction, operands: &[u16]) -> ZResult<ExecutionResult> {
        match inst.ext_opcode {
            Some(0x00) => self.op_save(inst), // save (v5+ extended form always stores a result)
            Some(0x01) => self.op_restore(inst),
            Some(0x02) => {
                // log_shift: positive = left, negative = right, unsigned
                let value = operands[0];
                let places = operands[1] as i16;
                let result = if places >= 0 {
                    value.wrapping_shl(places as u32)
                } else {
                    value.wrapping_shr((-places) as u32)
                };
                self.store(inst, result)?;
                Ok(ExecutionResult::Continue)
            }
            Some(0x03) => {
                // art_shift: arithmetic (sign-preserving)
                let value = operands[0] as i16;
                let places = operands[1] as i16;
                let result = if places >= 0 {
                    value.wrapping_shl(places as u32)
                } else {
                    value.wrapping_shr((-places) as u32)
                };
                self.store(inst, result as u16)?;
                Ok(ExecutionResult::Continue)
            }
            Some(0x04) => {
                // set_font
                let previous = self.io.set_font(operands[0])?;
                self.store(inst, previous as u16)?;
                Ok(ExecutionResult::Continue)
            }
            Some(0x09) => {
                // save_undo: this interpreter keeps no undo history
                self.store(inst, 0xFFFF)?; // -1: feature unsupported
                Ok(ExecutionResult::Continue)
            }
            Some(0x0A) => {
                // restore_undo
                self.store(inst, 0)?;
                Ok(ExecutionResult::Continue)
            }
            _ => Err(ZError::IllegalInstruction {
                opcode: inst.ext_opcode.unwrap_or(inst.opcode),
                version: self.vm.game.header.version,
            }),
        }
    }

    // ---- VAR ----

    fn execute_var(&mut self, inst: &Instruction, operands: &[u16]) -> ZResult<ExecutionResult> {
        if Self::is_memory_opcode_var(inst.opcode) {
            return self.execute_memory_op(inst, operands);
        }
        if Self::is_object_opcode_var(inst.opcode) {
            return self.execute_object_op(inst, operands);
        }

        match inst.opcode {
            0x00 => {
                // call / call_vs
                let routine = operands[0];
                self.vm.call_routine(routine, &operands[1..], inst.store_var)?;
                Ok(ExecutionResult::Called)
            }
            0x04 => self.op_read(inst, operands),
            0x05 => {
                // print_char
                if let Some(ch) = crate::zscii::to_char(operands[0], None) {
                    self.output(&ch.to_string())?;
                }
                Ok(ExecutionResult::Continue)
            }
            0x06 => {
                // print_num
                self.output(&(operands[0] as i16).to_string())?;
                Ok(ExecutionResult::Continue)
            }
            0x07 => {
                // random
                let value = self.rng.random(operands[0] as i16);
                self.store(inst, value)?;
                Ok(ExecutionResult::Continue)
            }
            0x08 => {
                // push
                self.vm.push(operands[0])?;
                Ok(ExecutionResult::Continue)
            }
            0x09 => {
                // pull
                if self.vm.game.header.version == 6 {
                    return Err(ZError::format("v6 variable-operand pull is not supported"));
                }
                let value = self.vm.pop()?;
                self.vm.write_variable(operands[0] as u8, value)?;
                Ok(ExecutionResult::Continue)
            }
            0x0A => {
                // split_window
                self.io.split_window(operands[0])?;
                Ok(ExecutionResult::Continue)
            }
            0x0B => {
                // set_window
                self.io.set_window(operands[0] as u8)?;
                Ok(ExecutionResult::Continue)
            }
            0x0C => {
                // call_vs2
                let routine = operands[0];
                self.vm.call_routine(routine, &operands[1..], inst.store_var)?;
                Ok(ExecutionResult::Called)
            }
            0x0D => {
                // erase_window
                self.io.erase_window(operands[0] as i16)?;
                Ok(ExecutionResult::Continue)
            }
            0x0E => {
                // erase_line
                self.io.erase_line()?;
                Ok(ExecutionResult::Continue)
            }
            0x0F => {
                // set_cursor
                self.io.set_cursor(operands[0], operands[1])?;
                Ok(ExecutionResult::Continue)
            }
            0x10 => {
                // get_cursor
                let (line, column) = self.io.get_cursor()?;
                let table = operands[0] as u32;
                self.vm.write_word(table, line)?;
                self.vm.write_word(table + 2, column)?;
                Ok(ExecutionResult::Continue)
            }
            0x11 => {
                // set_text_style
                self.io.set_text_style(operands[0])?;
                Ok(ExecutionResult::Continue)
            }
            0x12 => {
                // buffer_mode
                self.io.set_buffer_mode(operands[0] != 0)?;
                Ok(ExecutionResult::Continue)
            }
            0x13 => self.op_output_stream(operands),
            0x14 => {
                // input_stream
                self.io.input_stream(operands[0])?;
                Ok(ExecutionResult::Continue)
            }
            0x15 => {
                // sound_effect
                let effect = *operands.get(1).unwrap_or(&0);
                let volume = *operands.get(2).unwrap_or(&0);
                self.io.sound_effect(operands[0], effect, volume)?;
                Ok(ExecutionResult::Continue)
            }
            0x16 => {
                // read_char
                let zscii = self.io.read_char()?;
                self.store(inst, zscii)?;
                Ok(ExecutionResult::Continue)
            }
            0x18 => {
                // not (v5+)
                self.store(inst, !operands[0])?;
                Ok(ExecutionResult::Continue)
            }
            0x19 => {
                // call_vn
                self.vm.call_routine(operands[0], &operands[1..], None)?;
                Ok(ExecutionResult::Called)
            }
            0x1A => {
                // call_vn2
                self.vm.call_routine(operands[0], &operands[1..], None)?;
                Ok(ExecutionResult::Called)
            }
            0x1B => self.op_tokenise(operands),
            0x1F => {
                // check_arg_count
                let actual = self.vm.current_arg_count()?;
                self.branch(inst, actual as u16 >= operands[0])
            }
            _ => Err(ZError::IllegalInstruction {
                opcode: inst.opcode,
                version: self.vm.game.header.version,
            }),
        }
    }

    fn is_memory_opcode_var(opcode: u8) -> bool {
        matches!(opcode, 0x01 | 0x02)
    }

    fn is_object_opcode_var(opcode: u8) -> bool {
        opcode == 0x03
    }

    fn op_read(&mut self, inst: &Instruction, operands: &[u16]) -> ZResult<ExecutionResult> {
        let text_buffer = operands[0] as u32;
        let max_len = self.vm.read_byte(text_buffer)? as usize;
        let line = self.io.read_line(max_len)?.to_lowercase();

        let len = line.chars().count().min(max_len);
        self.vm.write_byte(text_buffer + 1, len as u8)?;
        for (i, ch) in line.chars().take(len).enumerate() {
            self.vm.write_byte(text_buffer + 2 + i as u32, ch as u8)?;
        }

        if let Some(&parse_buffer) = operands.get(1) {
            self.vm.parse_text(text_buffer, parse_buffer as u32)?;
        }
        if self.vm.game.header.version >= 5 {
            self.store(inst, 13)?; // terminated by newline
        }
        Ok(ExecutionResult::Continue)
    }

    fn op_tokenise(&mut self, operands: &[u16]) -> ZResult<ExecutionResult> {
        let text_buffer = operands[0] as u32;
        let parse_buffer = operands[1] as u32;
        self.vm.parse_text(text_buffer, parse_buffer)?;
        Ok(ExecutionResult::Continue)
    }

    fn op_output_stream(&mut self, operands: &[u16]) -> ZResult<ExecutionResult> {
        let stream = operands[0] as i16;
        match stream {
            3 => {
                let table_addr = *operands.get(1).unwrap_or(&0) as u32;
                self.mem_streams.push((table_addr, Vec::new()));
            }
            -3 => {
                if let Some((table_addr, buf)) = self.mem_streams.pop() {
                    self.vm.write_word(table_addr, buf.len() as u16)?;
                    for (i, byte) in buf.iter().enumerate() {
                        self.vm.write_byte(table_addr + 2 + i as u32, *byte)?;
                    }
                }
            }
            n => self.io.output_stream(n, operands.get(1).map(|&t| t))?,
        }
        Ok(ExecutionResult::Continue)
    }
}
