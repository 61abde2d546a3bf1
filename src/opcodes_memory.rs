//! Flat memory-array access: `loadw`/`loadb` (2OP) and `storew`/`storeb` (VAR).
//! `load`/`store` for the variable namespace are handled directly in `Cpu`
//! since they don't touch the byte array.

use crate::cpu::{Cpu, ExecutionResult};
use crate::error::{ZError, ZResult};
use crate::instruction::Instruction;

impl Cpu {
    pub fn execute_memory_op(&mut self, inst: &Instruction, operands: &[u16]) -> ZResult<ExecutionResult> {
        use crate::instruction::OperandCount;

        if inst.operand_count == OperandCount::VAR {
            return self.execute_store_op(inst, operands);
        }

        let base = operands[0] as u32;
        let index = operands[1] as u32;
        let value = match inst.opcode {
            0x0F => self.vm.read_word(base + index * 2)?,
            0x10 => self.vm.read_byte(base + index)? as u16,
            _ => {
                return Err(ZError::IllegalInstruction {
                    opcode: inst.opcode,
                    version: self.vm.game.header.version,
                })
            }
        };
        if let Some(store_var) = inst.store_var {
            self.vm.write_variable(store_var, value)?;
        }
        Ok(ExecutionResult::Continue)
    }

    fn execute_store_op(&mut self, inst: &Instruction, operands: &[u16]) -> ZResult<ExecutionResult> {
        if operands.len() < 3 {
            return Err(ZError::format(format!(
                "{} requires 3 operands, got {}",
                if inst.opcode == 0x01 { "storew" } else { "storeb" },
                operands.len()
            )));
        }
        let base = operands[0] as u32;
        let index = operands[1] as u32;
        match inst.opcode {
            0x01 => self.vm.write_word(base + index * 2, operands[2])?,
            0x02 => self.vm.write_byte(base + index, operands[2] as u8)?,
            _ => {
                return Err(ZError::IllegalInstruction {
                    opcode: inst.opcode,
                    version: self.vm.game.header.version,
                })
            }
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

    fn op2_inst(opcode: u8, store_var: Option<u8>) -> Instruction {
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

    fn var_inst(opcode: u8) -> Instruction {
        Instruction {
            opcode,
            ext_opcode: None,
            form: InstructionForm::Variable,
            operand_count: OperandCount::VAR,
            operand_types: vec![OperandType::SmallConstant; 3],
            operands: vec![0, 0, 0],
            store_var: None,
            branch: None,
            text: None,
            size: 4,
        }
    }

    #[test]
    fn storew_then_loadw_round_trips() {
        let mut cpu = test_cpu();
        cpu.execute_memory_op(&var_inst(0x01), &[0x10, 2, 0xBEEF]).unwrap();
        let result = cpu.execute_memory_op(&op2_inst(0x0F, Some(0x10)), &[0x10, 2]).unwrap();
        assert_eq!(result, crate::cpu::ExecutionResult::Continue);
        assert_eq!(cpu.vm.read_global(0).unwrap(), 0xBEEF);
    }

    #[test]
    fn storeb_rejects_too_few_operands() {
        let mut cpu = test_cpu();
        assert!(cpu.execute_memory_op(&var_inst(0x02), &[0x10, 0]).is_err());
    }
}
