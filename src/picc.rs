//! PICC-side protocol table for the backdoored 1K clones.
//!
//! Standard ISO14443-A / MIFARE Classic commands plus the vendor unlock
//! commands that UID-rewritable ("gen1a") clones answer without any sector
//! authentication.

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    REQA = 0x26, // REQuest command, Type A. 7 bit frame.
    WUPA = 0x52, // Wake-UP command, Type A. 7 bit frame.
    HLTA = 0x50, // HaLT command, Type A. Instructs an ACTIVE PICC to go to state HALT.
    // Writes one 16 byte block. On an unlocked clone no authentication is needed.
    MfWrite = 0xA0,
    // Vendor unlock, first stage. Sent as a 7 bit short frame in place of REQA/WUPA.
    UnlockWakeup = 0x40,
    // Vendor unlock, second stage. Only backdoored clones ACK it.
    UnlockBackdoor = 0x43,
}

/// 4-bit ACK answered by a MIFARE PICC to WRITE and to both unlock stages.
pub const MIFARE_ACK: u8 = 0x0A;

/// Length of the short frame carrying [`Command::UnlockWakeup`].
pub const UNLOCK_WAKEUP_BITS: usize = 7;

/// HLTA payload before its CRC_A: command byte and a zero parameter.
pub const HALT_PAYLOAD: [u8; 2] = [Command::HLTA as u8, 0x00];

pub const UNLOCK_WAKEUP_FRAME: [u8; 1] = [Command::UnlockWakeup as u8];

pub const UNLOCK_BACKDOOR_FRAME: [u8; 1] = [Command::UnlockBackdoor as u8];

/// Frame sizes on the wire, checksum included.
pub const HALT_FRAME_LEN: usize = 4;
pub const WRITE_FRAME_LEN: usize = 4;
pub const PAYLOAD_FRAME_LEN: usize = BLOCK_SIZE + 2;

// MIFARE Classic 1K layout
pub const BLOCK_SIZE: usize = 16;
pub const BLOCK_COUNT: usize = 64;
pub const BLOCKS_PER_SECTOR: usize = 4;
pub const CARD_SIZE: usize = BLOCK_SIZE * BLOCK_COUNT;

pub const KEY_SIZE: usize = 6;
pub const ACCESS_BITS_SIZE: usize = 4;

/// Answer To reQuest type A, as recorded from the unlock wake-up.
pub type Atqa = [u8; 2];

pub type MifareKey = [u8; KEY_SIZE];

/// The last block of every 4-block group holds keys and access bits.
/// The 1K layout never has the 16-block sectors of bigger cards.
pub fn is_trailer_block(block: u8) -> bool {
    (block as usize + 1) % BLOCKS_PER_SECTOR == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailers_close_every_sector() {
        let trailers: Vec<u8> = (0..BLOCK_COUNT as u8)
            .filter(|&b| is_trailer_block(b))
            .collect();
        let expected: Vec<u8> = (0..16).map(|s| s * 4 + 3).collect();
        assert_eq!(trailers, expected);
    }

    #[test]
    fn data_blocks_are_not_trailers() {
        for block in [0u8, 1, 2, 4, 5, 6, 60, 61, 62] {
            assert!(!is_trailer_block(block), "block {}", block);
        }
    }

    #[test]
    fn frame_lengths() {
        assert_eq!(PAYLOAD_FRAME_LEN, 18);
        assert_eq!(CARD_SIZE, 1024);
        assert_eq!(KEY_SIZE * 2 + ACCESS_BITS_SIZE, BLOCK_SIZE);
    }
}
