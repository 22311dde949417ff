//! In-memory image of a MIFARE Classic 1K card.

use crate::picc::{self, MifareKey, ACCESS_BITS_SIZE, BLOCK_COUNT, BLOCK_SIZE, CARD_SIZE, KEY_SIZE};
use crate::{Error, Result};
use std::fs;
use std::path::Path;

pub type Block = [u8; BLOCK_SIZE];

/// Sector trailer fields, in card byte order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailerBlock {
    pub key_a: MifareKey,
    pub access_bits: [u8; ACCESS_BITS_SIZE],
    pub key_b: MifareKey,
}

impl TrailerBlock {
    pub fn from_block(block: &Block) -> Self {
        let mut trailer = TrailerBlock {
            key_a: [0; KEY_SIZE],
            access_bits: [0; ACCESS_BITS_SIZE],
            key_b: [0; KEY_SIZE],
        };
        trailer.key_a.copy_from_slice(&block[..KEY_SIZE]);
        trailer
            .access_bits
            .copy_from_slice(&block[KEY_SIZE..KEY_SIZE + ACCESS_BITS_SIZE]);
        trailer
            .key_b
            .copy_from_slice(&block[KEY_SIZE + ACCESS_BITS_SIZE..]);
        trailer
    }

    /// Key A ++ access bits ++ key B.
    pub fn to_bytes(&self) -> Block {
        let mut block = [0u8; BLOCK_SIZE];
        block[..KEY_SIZE].copy_from_slice(&self.key_a);
        block[KEY_SIZE..KEY_SIZE + ACCESS_BITS_SIZE].copy_from_slice(&self.access_bits);
        block[KEY_SIZE + ACCESS_BITS_SIZE..].copy_from_slice(&self.key_b);
        block
    }
}

/// Transport configuration shipped on new cards: FF..FF keys, access bits
/// `FF 07 80` and general purpose byte `69`.
pub const FACTORY_TRAILER: TrailerBlock = TrailerBlock {
    key_a: [0xff; KEY_SIZE],
    access_bits: [0xff, 0x07, 0x80, 0x69],
    key_b: [0xff; KEY_SIZE],
};

/// A full card image: 64 blocks, read-only once loaded.
#[derive(Clone, PartialEq)]
pub struct Dump {
    blocks: Box<[Block; BLOCK_COUNT]>,
}

impl Dump {
    /// Interprets `bytes` as blocks 0..63 in order. Anything but exactly
    /// 1024 bytes is rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != CARD_SIZE {
            return Err(Error::DumpSize {
                expected: CARD_SIZE,
                actual: bytes.len(),
            });
        }
        let mut blocks = Box::new([[0u8; BLOCK_SIZE]; BLOCK_COUNT]);
        for (block, chunk) in blocks.iter_mut().zip(bytes.chunks_exact(BLOCK_SIZE)) {
            block.copy_from_slice(chunk);
        }
        Ok(Self { blocks })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path.as_ref())?;
        log::debug!(
            "read {} bytes from {}",
            bytes.len(),
            path.as_ref().display()
        );
        Self::from_bytes(&bytes)
    }

    /// Zeroed data blocks and factory trailers. Block 0 is left zero too, so
    /// writing this image also clears the UID.
    pub fn factory_blank() -> Self {
        let mut blocks = Box::new([[0u8; BLOCK_SIZE]; BLOCK_COUNT]);
        for (index, block) in blocks.iter_mut().enumerate() {
            if picc::is_trailer_block(index as u8) {
                *block = FACTORY_TRAILER.to_bytes();
            }
        }
        Self { blocks }
    }

    pub fn block(&self, index: u8) -> &Block {
        &self.blocks[index as usize]
    }

    /// The trailer fields of `index`, or `None` for a data block.
    pub fn trailer(&self, index: u8) -> Option<TrailerBlock> {
        if picc::is_trailer_block(index) {
            Some(TrailerBlock::from_block(self.block(index)))
        } else {
            None
        }
    }

    /// UID bytes of a 4-byte-UID card, from the manufacturer block.
    pub fn uid(&self) -> [u8; 4] {
        let mut uid = [0u8; 4];
        uid.copy_from_slice(&self.blocks[0][..4]);
        uid
    }
}

impl std::fmt::Debug for Dump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dump").field("uid", &self.uid()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn numbered() -> Vec<u8> {
        (0..CARD_SIZE).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn blocks_follow_file_order() {
        let bytes = numbered();
        let dump = Dump::from_bytes(&bytes).unwrap();
        assert_eq!(&dump.block(0)[..], &bytes[..16]);
        assert_eq!(&dump.block(63)[..], &bytes[1008..]);
    }

    #[test]
    fn wrong_size_is_rejected() {
        for len in [0, 1023, 1025, 4096] {
            match Dump::from_bytes(&vec![0; len]) {
                Err(Error::DumpSize { expected, actual }) => {
                    assert_eq!(expected, 1024);
                    assert_eq!(actual, len);
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn trailer_fields_split_in_order() {
        let mut bytes = vec![0u8; CARD_SIZE];
        let trailer: Vec<u8> = (0x10..0x20).collect();
        bytes[7 * 16..8 * 16].copy_from_slice(&trailer);
        let dump = Dump::from_bytes(&bytes).unwrap();
        let fields = dump.trailer(7).unwrap();
        assert_eq!(fields.key_a, [0x10, 0x11, 0x12, 0x13, 0x14, 0x15]);
        assert_eq!(fields.access_bits, [0x16, 0x17, 0x18, 0x19]);
        assert_eq!(fields.key_b, [0x1a, 0x1b, 0x1c, 0x1d, 0x1e, 0x1f]);
        assert_eq!(&fields.to_bytes()[..], &trailer[..]);
        assert!(dump.trailer(6).is_none());
    }

    #[test]
    fn factory_blank_layout() {
        let dump = Dump::factory_blank();
        assert_eq!(dump.block(3), &[
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x07,
            0x80, 0x69, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        ]);
        assert_eq!(dump.block(4), &[0u8; 16]);
        assert_eq!(dump.trailer(63), Some(FACTORY_TRAILER));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&numbered()).unwrap();
        let dump = Dump::load(file.path()).unwrap();
        assert_eq!(dump.uid(), [0, 1, 2, 3]);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Dump::load(dir.path().join("missing.mfd"));
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
