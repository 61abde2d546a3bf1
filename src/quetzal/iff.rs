//! IFF (Interchange File Format) chunk container that Quetzal save images are
//! built from. Encoding/decoding works on an in-memory byte buffer; the host
//! IO adapter is responsible for getting those bytes to and from disk.

use crate::error::{ZError, ZResult};

pub struct IffFile {
    pub form_type: [u8; 4],
    pub chunks: Vec<IffChunk>,
}

pub struct IffChunk {
    pub chunk_type: [u8; 4],
    pub data: Vec<u8>,
}

impl IffFile {
    pub fn new(form_type: [u8; 4]) -> Self {
        IffFile {
            form_type,
            chunks: Vec::new(),
        }
    }

    pub fn add_chunk(&mut self, chunk_type: [u8; 4], data: Vec<u8>) {
        self.chunks.push(IffChunk { chunk_type, data });
    }

    pub fn find_chunk(&self, chunk_type: &[u8; 4]) -> Option<&IffChunk> {
        self.chunks.iter().find(|c| &c.chunk_type == chunk_type)
    }

    pub fn encode(&self) -> Vec<u8> {
        let body_size: usize = 4
            + self
                .chunks
                .iter()
                .map(|c| 8 + c.data.len() + (c.data.len() % 2))
                .sum::<usize>();

        let mut out = Vec::with_capacity(8 + body_size);
        out.extend_from_slice(b"FORM");
        out.extend_from_slice(&(body_size as u32).to_be_bytes());
        out.extend_from_slice(&self.form_type);
        for chunk in &self.chunks {
            out.extend_from_slice(&chunk.chunk_type);
            out.extend_from_slice(&(chunk.data.len() as u32).to_be_bytes());
            out.extend_from_slice(&chunk.data);
            if chunk.data.len() % 2 == 1 {
                out.push(0);
            }
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> ZResult<Self> {
        fn take<'a>(bytes: &'a [u8], at: &mut usize, len: usize) -> ZResult<&'a [u8]> {
            if *at + len > bytes.len() {
                return Err(ZError::format("truncated Quetzal save image"));
            }
            let slice = &bytes[*at..*at + len];
            *at += len;
            Ok(slice)
        }

        let mut at = 0;
        if take(bytes, &mut at, 4)? != b"FORM" {
            return Err(ZError::format("not an IFF file: missing FORM header"));
        }
        let _body_size = u32::from_be_bytes(take(bytes, &mut at, 4)?.try_into().unwrap());
        let mut form_type = [0u8; 4];
        form_type.copy_from_slice(take(bytes, &mut at, 4)?);

        let mut chunks = Vec::new();
        while at + 8 <= bytes.len() {
            let mut chunk_type = [0u8; 4];
            chunk_type.copy_from_slice(take(bytes, &mut at, 4)?);
            let size = u32::from_be_bytes(take(bytes, &mut at, 4)?.try_into().unwrap()) as usize;
            let data = take(bytes, &mut at, size)?.to_vec();
            if size % 2 == 1 {
                at += 1;
            }
            chunks.push(IffChunk { chunk_type, data });
        }
        Ok(IffFile { form_type, chunks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_chunks() {
        let mut iff = IffFile::new(*b"IFZS");
        iff.add_chunk(*b"IFhd", vec![1, 2, 3]);
        iff.add_chunk(*b"CMem", vec![4, 5, 6, 7]);

        let bytes = iff.encode();
        let decoded = IffFile::decode(&bytes).unwrap();
        assert_eq!(decoded.form_type, *b"IFZS");
        assert_eq!(decoded.find_chunk(b"IFhd").unwrap().data, vec![1, 2, 3]);
        assert_eq!(decoded.find_chunk(b"CMem").unwrap().data, vec![4, 5, 6, 7]);
    }

    #[test]
    fn pads_odd_length_chunks() {
        let mut iff = IffFile::new(*b"IFZS");
        iff.add_chunk(*b"Toad", vec![1, 2, 3]);
        let bytes = iff.encode();
        assert_eq!(bytes.len() % 2, 0);
        let decoded = IffFile::decode(&bytes).unwrap();
        assert_eq!(decoded.find_chunk(b"Toad").unwrap().data, vec![1, 2, 3]);
    }

    #[test]
    fn rejects_non_iff_bytes() {
        assert!(IffFile::decode(b"not an iff file at all").is_err());
    }
}
