//! Arithmetic and bitwise opcodes: `or`/`and`/`not`, signed `add`/`sub`/`mul`,
//! and `div`/`mod` (which trap division by zero). Delegated to from `Cpu`'s
//! 2OP dispatch for the opcodes `Cpu::is_math_opcode` claims.

use log::trace;

use crate::cpu::{Cpu, ExecutionResult};
use crate::error::{ZError, ZResult};
use crate::instruction::Instruction;

impl Cpu {
    pub fn execute_math_op(&mut self, inst: &Instruction, operands: &[u16]) -> ZResult<ExecutionResult> {
        let a = operands[0];
        let b = *operands.get(1).unwrap_or(&0);
        let result = match inst.opcode {
            0x08 => {
                trace!("or {a} {b}");
                a | b
            }
            0x09 => {
                trace!("and {a} {b}");
                a & b
            }
            0x14 => (a as i16).wrapping_add(b as i16) as u16,
            0x15 => (a as i16).wrapping_sub(b as i16) as u16,
            0x16 => (a as i16).wrapping_mul(b as i16) as u16,
            0x17 => {
                if b == 0 {
                    return Err(ZError::DivisionByZero);
                }
                ((a as i16) / (b as i16)) as u16
            }
            0x18 => {
                if b == 0 {
                    return Err(ZError::DivisionByZero);
                }
                ((a as i16) % (b as i16)) as u16
            }
            _ => {
                return Err(ZError::IllegalInstruction {
                    opcode: inst.opcode,
                    version: self.vm.game.header.version,
                })
            }
        };
        if let Some(store_var) = inst.store_var {
            self.vm.write_variable(store_var, result)?;
        }
        Ok(ExecutionResult::Continue)
    }
}

#[cfg(test)]
mod tests {
    use crate::cpu::Cpu;
    use crate::instruction::{Instruction, InstructionForm, OperandCount, OperandType};
    use crate::io_headless::HeadlessIo;
    use crate::memory::Game;
    use crate::vm::VM;
    use crate::zrand::ZRand;

    fn test_cpu() -> Cpu {
        let mut bytes = vec![0u8; 0x200];
        bytes[0] = 3;
        bytes[0x0E] = 0x01;
        let vm = VM::new(Game::load(bytes).unwrap());
        Cpu::new(vm, Box::new(HeadlessIo::new()), ZRand::new_predictable(1))
    }

    fn inst(opcode: u8, store_var: Option<u8>) -> Instruction {
        Instruction {
            opcode,
            ext_opcode: None,
            form: InstructionForm::Long,
            operand_count: OperandCount::OP2,
            operand_types: vec![OperandType::SmallConstant, OperandType::SmallConstant],
            operands: vec![0, 0],
            store_var,
            branch: None,
            text: None,
            size: 3,
        }
    }

    #[test]
    fn add_is_signed() {
        let mut cpu = test_cpu();
        cpu.execute_math_op(&inst(0x14, Some(0x10)), &[5, 3]).unwrap();
        assert_eq!(cpu.vm.read_global(0).unwrap(), 8);

        // -1 (0xFFFF) + 1 wraps to 0
        cpu.execute_math_op(&inst(0x14, Some(0x10)), &[0xFFFF, 1]).unwrap();
        assert_eq!(cpu.vm.read_global(0).unwrap(), 0);
    }

    #[test]
    fn div_by_zero_errors() {
        let mut cpu = test_cpu();
        assert!(cpu.execute_math_op(&inst(0x17, Some(0x10)), &[10, 0]).is_err());
    }

    #[test]
    fn bitwise_and_or() {
        let mut cpu = test_cpu();
        cpu.execute_math_op(&inst(0x08, Some(0x10)), &[0x0F0, 0x00F]).unwrap();
        assert_eq!(cpu.vm.read_global(0).unwrap(), 0x0FF);
        cpu.execute_math_op(&inst(0x09, Some(0x10)), &[0x0FF, 0x0F0]).unwrap();
        assert_eq!(cpu.vm.read_global(0).unwrap(), 0x0F0);
    }
}
