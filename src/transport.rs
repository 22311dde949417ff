//! Raw frame exchange with the PICC.

use crate::util::{hex_bits, hex_bytes};
use crate::{Error, Result};

/// Largest frame the protocol exchanges, in bytes.
pub const MAX_FRAME_LEN: usize = 264;

/// A reader that can put raw ISO14443-A frames on the air.
///
/// Implementations must not add or strip CRC_A and must not wrap frames in
/// any higher protocol layer; see [`Transceiver::configure_raw`].
pub trait Transceiver {
    /// Sends the first `tx_bits` bits of `tx`, least significant bit first.
    /// Returns the number of bits received into `rx`.
    fn transceive_bits(&mut self, tx: &[u8], tx_bits: usize, rx: &mut [u8]) -> Result<usize>;

    /// Sends all of `tx`. Returns the number of bytes received into `rx`.
    fn transceive_bytes(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<usize>;

    /// Turns off CRC generation and checking, easy framing and automatic
    /// ISO14443-4 switching, whichever of those the reader has.
    fn configure_raw(&mut self) -> Result<()>;
}

impl<T: Transceiver + ?Sized> Transceiver for &mut T {
    fn transceive_bits(&mut self, tx: &[u8], tx_bits: usize, rx: &mut [u8]) -> Result<usize> {
        (**self).transceive_bits(tx, tx_bits, rx)
    }

    fn transceive_bytes(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<usize> {
        (**self).transceive_bytes(tx, rx)
    }

    fn configure_raw(&mut self) -> Result<()> {
        (**self).configure_raw()
    }
}

/// Answer to one frame, borrowed from the transport's receive buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Response<'a> {
    data: &'a [u8],
    bits: usize,
}

impl<'a> Response<'a> {
    /// Received bytes; a trailing partial byte is included.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn bit_len(&self) -> usize {
        self.bits
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }
}

pub struct FrameTransport<T> {
    transceiver: T,
    rx: [u8; MAX_FRAME_LEN],
    echo: bool,
}

impl<T: Transceiver> FrameTransport<T> {
    pub fn new(transceiver: T) -> Self {
        Self {
            transceiver,
            rx: [0; MAX_FRAME_LEN],
            echo: true,
        }
    }

    /// Log every frame in hex at info level (on by default).
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn transceiver(&self) -> &T {
        &self.transceiver
    }

    pub fn into_inner(self) -> T {
        self.transceiver
    }

    /// Short frame without CRC. Used only for the 7 bit unlock wake-up.
    /// An error means nothing usable came back.
    pub fn send_bits(&mut self, frame: &[u8], bit_count: usize) -> Result<Response<'_>> {
        if bit_count == 0 || bit_count > frame.len() * 8 {
            return Err(Error::Invalid);
        }
        if self.echo {
            log::info!("Sent bits:     {}", hex_bits(frame, bit_count));
        }
        let rx_bits = self
            .transceiver
            .transceive_bits(frame, bit_count, &mut self.rx)?;
        if rx_bits > MAX_FRAME_LEN * 8 {
            return Err(Error::NoRoom);
        }
        let rx_len = (rx_bits + 7) / 8;
        if self.echo {
            log::info!("Received bits: {}", hex_bits(&self.rx[..rx_len], rx_bits));
        }
        Ok(Response {
            data: &self.rx[..rx_len],
            bits: rx_bits,
        })
    }

    /// Whole-byte frame, sent exactly as given. Callers append the CRC_A.
    pub fn send_bytes(&mut self, frame: &[u8]) -> Result<Response<'_>> {
        if frame.is_empty() || frame.len() > MAX_FRAME_LEN {
            return Err(Error::Invalid);
        }
        if self.echo {
            log::info!("Sent bits:     {}", hex_bytes(frame));
        }
        let rx_len = self.transceiver.transceive_bytes(frame, &mut self.rx)?;
        if rx_len > MAX_FRAME_LEN {
            return Err(Error::NoRoom);
        }
        if self.echo {
            log::info!("Received bits: {}", hex_bytes(&self.rx[..rx_len]));
        }
        Ok(Response {
            data: &self.rx[..rx_len],
            bits: rx_len * 8,
        })
    }
}
