//! Building a Quetzal `FORM/IFZS` save image from the current VM state.

use log::debug;

use crate::error::ZResult;
use crate::quetzal::chunks::{IFhdChunk, StksChunk, UMemChunk};
use crate::quetzal::compressed_memory;
use crate::quetzal::iff::IffFile;
use crate::vm::VM;

/// Serialize `vm` into a Quetzal image, ready to hand to the IO host's
/// `save`. Dynamic memory is stored XOR-RLE compressed against the story's
/// load-time image (`CMem`); callers that need maximum interoperability with
/// interpreters lacking CMem support can fall back to `UMem` by swapping the
/// chunk below.
pub fn save_game(vm: &VM) -> ZResult<Vec<u8>> {
    let mut iff = IffFile::new(*b"IFZS");

    iff.add_chunk(*b"IFhd", IFhdChunk::from_vm(vm).to_bytes());

    let current = vm.game.dynamic_memory();
    let original = vm.game.original_dynamic_memory();
    match compressed_memory::compress(current, original) {
        Ok(compressed) => iff.add_chunk(*b"CMem", compressed),
        Err(_) => iff.add_chunk(*b"UMem", UMemChunk::from_vm(vm).to_bytes()),
    }

    iff.add_chunk(*b"Stks", StksChunk::from_vm(vm).to_bytes());

    let bytes = iff.encode();
    debug!("built Quetzal save image ({} bytes)", bytes.len());
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Game;

    #[test]
    fn produces_a_well_formed_iff_envelope() {
        let mut bytes = vec![0u8; 0x200];
        bytes[0] = 3;
        bytes[0x0E] = 0x01;
        let vm = VM::new(Game::load(bytes).unwrap());

        let save = save_game(&vm).unwrap();
        assert_eq!(&save[0..4], b"FORM");
        assert_eq!(&save[8..12], b"IFZS");
    }
}
