//! The 2OP and VAR object-tree opcodes: attribute tests (`jin`/`test_attr`),
//! attribute writes (`set_attr`/`clear_attr`), tree surgery (`insert_obj`),
//! and property access beyond the 1OP forms `Cpu` handles inline
//! (`get_prop`/`get_prop_addr`/`get_next_prop`/`put_prop`).

use crate::cpu::{Cpu, ExecutionResult};
use crate::error::{ZError, ZResult};
use crate::instruction::Instruction;

impl Cpu {
    pub fn execute_object_op(&mut self, inst: &Instruction, operands: &[u16]) -> ZResult<ExecutionResult> {
        use crate::instruction::OperandCount;

        if inst.operand_count == OperandCount::VAR {
            return self.execute_put_prop(inst, operands);
        }

        let obj = operands[0];
        let b = *operands.get(1).unwrap_or(&0);
        match inst.opcode {
            0x06 => {
                // jin: is obj inside b?
                let parent = self.vm.get_parent(obj)?;
                self.branch(inst, parent == b)
            }
            0x0A => {
                // test_attr
                let set = self.vm.get_attribute(obj, b)?;
                self.branch(inst, set)
            }
            0x0B => {
                self.vm.set_attribute(obj, b)?;
                Ok(ExecutionResult::Continue)
            }
            0x0C => {
                self.vm.clear_attribute(obj, b)?;
                Ok(ExecutionResult::Continue)
            }
            0x0E => {
                self.vm.insert_object(obj, b)?;
                Ok(ExecutionResult::Continue)
            }
            0x11 => {
                // get_prop
                let value = self.vm.get_prop(obj, b)?;
                if let Some(store_var) = inst.store_var {
                    self.vm.write_variable(store_var, value)?;
                }
                Ok(ExecutionResult::Continue)
            }
            0x12 => {
                // get_prop_addr
                let addr = self.vm.get_prop_addr(obj, b)?;
                if let Some(store_var) = inst.store_var {
                    self.vm.write_variable(store_var, addr)?;
                }
                Ok(ExecutionResult::Continue)
            }
            0x13 => {
                // get_next_prop
                let next = self.vm.get_next_prop(obj, b)?;
                if let Some(store_var) = inst.store_var {
                    self.vm.write_variable(store_var, next)?;
                }
                Ok(ExecutionResult::Continue)
            }
            _ => Err(ZError::IllegalInstruction {
                opcode: inst.opcode,
                version: self.vm.game.header.version,
            }),
        }
    }

    fn execute_put_prop(&mut self, inst: &Instruction, operands: &[u16]) -> ZResult<ExecutionResult> {
        if operands.len() < 3 {
            return Err(ZError::format("put_prop requires 3 operands"));
        }
        self.vm.put_prop(operands[0], operands[1], operands[2])?;
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
        let mut bytes = vec![0u8; 0x400];
        bytes[0] = 3;
        let obj_table_addr: u16 = 0x40;
        bytes[0x0A] = (obj_table_addr >> 8) as u8;
        bytes[0x0B] = obj_table_addr as u8;
        bytes[0x0E] = 0x03;

        let defaults_count = 31u32;
        let objects_base = obj_table_addr as u32 + 2 * defaults_count;
        let entry_size = 9u32;
        let prop_table = objects_base + 2 * entry_size;
        for i in 0..2u32 {
            let addr = objects_base + i * entry_size;
            bytes[(addr + 7) as usize] = (prop_table >> 8) as u8;
            bytes[(addr + 8) as usize] = prop_table as u8;
        }
        bytes[prop_table as usize] = 0;
        bytes[prop_table as usize + 1] = 0;

        let vm = VM::new(Game::load(bytes).unwrap());
        Cpu::new(vm, Box::new(HeadlessIo::new()), ZRand::new_predictable(1))
    }

    fn op2_inst(opcode: u8, store_var: Option<u8>, branch: bool) -> Instruction {
        Instruction {
            opcode,
            ext_opcode: None,
            form: InstructionForm::Long,
            operand_count: OperandCount::OP2,
            operand_types: vec![OperandType::SmallConstant, OperandType::SmallConstant],
            operands: vec![0, 0],
            store_var,
            branch: if branch {
                Some(crate::instruction::BranchInfo { on_true: true, offset: 4 })
            } else {
                None
            },
            text: None,
            size: 3,
        }
    }

    #[test]
    fn set_and_test_attribute() {
        let mut cpu = test_cpu();
        cpu.execute_object_op(&op2_inst(0x0B, None, false), &[1, 5]).unwrap();
        assert!(cpu.vm.get_attribute(1, 5).unwrap());
        let result = cpu.execute_object_op(&op2_inst(0x0A, None, true), &[1, 5]).unwrap();
        assert_eq!(result, crate::cpu::ExecutionResult::Branched);
    }

    #[test]
    fn insert_and_jin() {
        let mut cpu = test_cpu();
        cpu.execute_object_op(&op2_inst(0x0E, None, false), &[1, 2]).unwrap();
        let result = cpu.execute_object_op(&op2_inst(0x06, None, true), &[1, 2]).unwrap();
        assert_eq!(result, crate::cpu::ExecutionResult::Branched);
    }
}
