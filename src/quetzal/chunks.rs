//! Chunk bodies carried inside a Quetzal `FORM/IFZS` save image: `IFhd`
//! (identifies the story the save belongs to), `CMem`/`UMem` (dynamic memory),
//! and `Stks` (the frame and evaluation stacks).

use crate::error::{ZError, ZResult};
use crate::vm::{CallFrame, VM};

pub struct IFhdChunk {
    pub release: u16,
    pub serial: [u8; 6],
    pub checksum: u16,
    pub initial_pc: u32,
}

impl IFhdChunk {
    pub fn from_vm(vm: &VM) -> Self {
        let header = &vm.game.header;
        let mut serial = [0u8; 6];
        serial.copy_from_slice(&vm.game.memory[0x12..0x18]);
        IFhdChunk {
            release: header.release,
            serial,
            checksum: header.checksum_file,
            initial_pc: header.initial_pc as u32,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(13);
        bytes.extend_from_slice(&self.release.to_be_bytes());
        bytes.extend_from_slice(&self.serial);
        bytes.extend_from_slice(&self.checksum.to_be_bytes());
        let pc = self.initial_pc.to_be_bytes();
        bytes.extend_from_slice(&pc[1..4]);
        bytes
    }

    pub fn from_bytes(data: &[u8]) -> ZResult<Self> {
        if data.len() < 13 {
            return Err(ZError::format("IFhd chunk too small"));
        }
        let release = u16::from_be_bytes([data[0], data[1]]);
        let mut serial = [0u8; 6];
        serial.copy_from_slice(&data[2..8]);
        let checksum = u16::from_be_bytes([data[8], data[9]]);
        let initial_pc = ((data[10] as u32) << 16) | ((data[11] as u32) << 8) | data[12] as u32;
        Ok(IFhdChunk {
            release,
            serial,
            checksum,
            initial_pc,
        })
    }
}

/// Uncompressed dynamic memory, used when the story is small enough that
/// XOR-RLE compression isn't worth the complexity, or as a restore fallback.
pub struct UMemChunk {
    pub memory: Vec<u8>,
}

impl UMemChunk {
    pub fn from_vm(vm: &VM) -> Self {
        let dynamic_size = vm.game.header.base_static_mem as usize;
        UMemChunk {
            memory: vm.game.memory[..dynamic_size].to_vec(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.memory.clone()
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        UMemChunk { memory: data }
    }
}

/// One variable-length record per call frame (oldest first): return PC (3
/// bytes), a flags byte (locals count, store-variable presence, arg count),
/// the store variable if present, the evaluation-stack depth pushed during
/// that frame, the frame's locals, then its slice of the evaluation stack.
pub struct StksChunk {
    pub data: Vec<u8>,
}

impl StksChunk {
    pub fn from_vm(vm: &VM) -> Self {
        let mut data = Vec::new();
        for (frame_idx, frame) in vm.call_stack.iter().enumerate() {
            let pc_bytes = frame.return_pc.to_be_bytes();
            data.extend_from_slice(&pc_bytes[1..4]);

            let mut flags = frame.num_locals & 0x0F;
            if frame.return_store.is_some() {
                flags |= 0x10;
            }
            flags |= (frame.num_args.min(7) & 0x07) << 5;
            data.push(flags);

            if let Some(var) = frame.return_store {
                data.push(var);
            }

            let stack_end = vm
                .call_stack
                .get(frame_idx + 1)
                .map(|f| f.stack_base)
                .unwrap_or(vm.stack.len());
            let stack_size = stack_end.saturating_sub(frame.stack_base);
            data.extend_from_slice(&(stack_size as u16).to_be_bytes());

            for &local in frame.locals.iter().take(frame.num_locals as usize) {
                data.extend_from_slice(&local.to_be_bytes());
            }
            for &value in &vm.stack[frame.stack_base..stack_end] {
                data.extend_from_slice(&value.to_be_bytes());
            }
        }
        StksChunk { data }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.data.clone()
    }

    pub fn restore_to_vm(&self, vm: &mut VM) -> ZResult<()> {
        vm.call_stack.clear();
        vm.stack.clear();

        let data = &self.data;
        let mut offset = 0;
        let truncated = || ZError::format("truncated Stks chunk");

        while offset < data.len() {
            if offset + 4 > data.len() {
                return Err(truncated());
            }
            let return_pc = ((data[offset] as u32) << 16)
                | ((data[offset + 1] as u32) << 8)
                | data[offset + 2] as u32;
            let flags = data[offset + 3];
            offset += 4;

            let local_count = (flags & 0x0F) as usize;
            let num_args = (flags >> 5) & 0x07;
            let return_store = if flags & 0x10 != 0 {
                let var = *data.get(offset).ok_or_else(truncated)?;
                offset += 1;
                Some(var)
            } else {
                None
            };

            let stack_count = u16::from_be_bytes(
                data.get(offset..offset + 2)
                    .ok_or_else(truncated)?
                    .try_into()
                    .unwrap(),
            ) as usize;
            offset += 2;

            let mut locals = [0u16; 16];
            for local in locals.iter_mut().take(local_count) {
                *local = u16::from_be_bytes(
                    data.get(offset..offset + 2)
                        .ok_or_else(truncated)?
                        .try_into()
                        .unwrap(),
                );
                offset += 2;
            }

            let stack_base = vm.stack.len();
            for _ in 0..stack_count {
                let value = u16::from_be_bytes(
                    data.get(offset..offset + 2)
                        .ok_or_else(truncated)?
                        .try_into()
                        .unwrap(),
                );
                vm.stack.push(value);
                offset += 2;
            }

            vm.call_stack.push(CallFrame {
                return_pc,
                return_store,
                num_locals: local_count as u8,
                locals,
                stack_base,
                num_args,
            });
        }
        Ok(())
    }
}

/// Optional interpreter-specific data chunk; emitted but never required on
/// restore.
pub struct IntDChunk {
    pub interpreter_id: [u8; 4],
    pub data: Vec<u8>,
}

impl Default for IntDChunk {
    fn default() -> Self {
        IntDChunk {
            interpreter_id: *b"ZMAC",
            data: Vec::new(),
        }
    }
}

impl IntDChunk {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(4 + self.data.len());
        bytes.extend_from_slice(&self.interpreter_id);
        bytes.extend_from_slice(&self.data);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Game;

    fn test_vm() -> VM {
        let mut bytes = vec![0u8; 0x200];
        bytes[0] = 3;
        bytes[0x0E] = 0x01; // static base 0x0100
        VM::new(Game::load(bytes).unwrap())
    }

    #[test]
    fn ifhd_round_trips() {
        let vm = test_vm();
        let chunk = IFhdChunk::from_vm(&vm);
        let bytes = chunk.to_bytes();
        let restored = IFhdChunk::from_bytes(&bytes).unwrap();
        assert_eq!(restored.release, chunk.release);
        assert_eq!(restored.checksum, chunk.checksum);
    }

    #[test]
    fn stks_round_trips_frames() {
        let mut vm = test_vm();
        vm.call_routine(0x10, &[1, 2], Some(0x20)).unwrap();
        vm.push(99).unwrap();

        let chunk = StksChunk::from_vm(&vm);
        let mut restored = test_vm();
        chunk.restore_to_vm(&mut restored).unwrap();

        assert_eq!(restored.call_stack.len(), vm.call_stack.len());
        assert_eq!(restored.stack, vm.stack);
        assert_eq!(restored.call_stack[0].locals, vm.call_stack[0].locals);
    }
}
