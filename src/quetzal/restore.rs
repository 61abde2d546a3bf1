//! Loading a Quetzal `FORM/IFZS` save image back into a VM.

use log::{debug, warn};

use crate::error::{ZError, ZResult};
use crate::quetzal::chunks::{IFhdChunk, StksChunk, UMemChunk};
use crate::quetzal::compressed_memory;
use crate::quetzal::iff::IffFile;
use crate::vm::VM;

/// Restore `vm` from a Quetzal image, checking that it was produced from the
/// same story release/serial/checksum before touching any state.
pub fn restore_game(vm: &mut VM, bytes: &[u8]) -> ZResult<()> {
    let iff = IffFile::decode(bytes)?;
    if iff.form_type != *b"IFZS" {
        return Err(ZError::format("not a Quetzal save file"));
    }

    let ifhd_data = &iff
        .find_chunk(b"IFhd")
        .ok_or_else(|| ZError::format("save file is missing the IFhd chunk"))?
        .data;
    let ifhd = IFhdChunk::from_bytes(ifhd_data)?;

    if ifhd.release != vm.game.header.release || ifhd.serial != vm.game.memory[0x12..0x18] {
        return Err(ZError::format(
            "save file was made with a different story (release/serial mismatch)",
        ));
    }
    if ifhd.checksum != vm.game.header.checksum_file {
        warn!("save file checksum does not match the loaded story; restoring anyway");
    }

    let dynamic_len = vm.game.header.base_static_mem as usize;
    let restored_dynamic = if let Some(cmem) = iff.find_chunk(b"CMem") {
        compressed_memory::decompress(&cmem.data, vm.game.original_dynamic_memory())?
    } else if let Some(umem) = iff.find_chunk(b"UMem") {
        let chunk = UMemChunk::from_bytes(umem.data.clone());
        if chunk.memory.len() != dynamic_len {
            return Err(ZError::format(
                "UMem chunk size does not match this story's dynamic memory size",
            ));
        }
        chunk.memory
    } else {
        return Err(ZError::format(
            "save file is missing a memory chunk (CMem or UMem)",
        ));
    };
    vm.game.set_dynamic_memory(&restored_dynamic)?;

    let stks_data = &iff
        .find_chunk(b"Stks")
        .ok_or_else(|| ZError::format("save file is missing the Stks chunk"))?
        .data;
    StksChunk {
        data: stks_data.clone(),
    }
    .restore_to_vm(vm)?;

    vm.pc = ifhd.initial_pc;
    debug!("restored Quetzal save image, {} call frames", vm.call_stack.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Game;
    use crate::quetzal::save::save_game;

    fn test_vm() -> VM {
        let mut bytes = vec![0u8; 0x200];
        bytes[0] = 3;
        bytes[0x0E] = 0x01;
        bytes[0x06] = 0x01;
        bytes[0x07] = 0x00;
        VM::new(Game::load(bytes).unwrap())
    }

    #[test]
    fn restores_memory_and_stacks() {
        let mut vm = test_vm();
        vm.write_global(0, 42).unwrap();
        vm.push(7).unwrap();
        let image = save_game(&vm).unwrap();

        let mut fresh = test_vm();
        restore_game(&mut fresh, &image).unwrap();
        assert_eq!(fresh.read_global(0).unwrap(), 42);
        assert_eq!(fresh.stack, vec![7]);
    }

    #[test]
    fn rejects_save_from_a_different_story() {
        let vm = test_vm();
        let image = save_game(&vm).unwrap();

        let mut other = test_vm();
        other.game.header.release = 99;
        assert!(restore_game(&mut other, &image).is_err());
    }
}
