pub mod com;
pub mod com_i2c;
pub mod com_spi;
pub mod crc;
pub mod dump;
pub mod mfrc522;
pub mod picc;
pub mod sequencer;
pub mod transport;
pub mod util;
pub mod writer;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// 通信接口出错
    #[error("register bus transfer failed")]
    ComErr,
    #[error("error in communication with the PICC")]
    Communication,
    #[error("collision detected")]
    Collision,
    #[error("timeout in communication")]
    Timeout,
    #[error("response does not fit the receive buffer")]
    NoRoom,
    #[error("invalid argument")]
    Invalid,
    #[error("PICC responded with NAK {0:#03x}")]
    MifareNack(u8),
    #[error("dump must be exactly {expected} bytes, got {actual}")]
    DumpSize { expected: usize, actual: usize },
    #[error("no MFRC522 answered on the bus (version register reads {0:#04x})")]
    NoReader(u8),
}

pub type Result<T> = std::result::Result<T, Error>;
