use crate::com::Com;
use crate::Result;
use spidev::{SpiModeFlags, Spidev, SpidevOptions, SpidevTransfer};
use std::io::prelude::*;
use std::path::Path;

/// MFRC522 on a Linux SPI device node.
pub struct ComSpi {
    spi: Spidev,
}

impl ComSpi {
    pub fn open<P: AsRef<Path>>(path: P, max_speed_hz: u32) -> Result<Self> {
        let mut spi = Spidev::open(path)?;
        let options = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(max_speed_hz)
            .mode(SpiModeFlags::SPI_MODE_0)
            .build();
        spi.configure(&options)?;
        Ok(Self { spi })
    }
}

// Address byte: MSB set for reads, register number in bits 6..1, LSB zero.
fn register_to_readvalue(reg: u8) -> u8 {
    ((reg << 1) | 0b1000_0000) & 0b1111_1110
}

fn register_to_writevalue(reg: u8) -> u8 {
    (reg << 1) & 0b0111_1110
}

impl Com for ComSpi {
    fn read(&mut self, reg: u8, value: &mut [u8]) -> Result<()> {
        if value.is_empty() {
            return Ok(());
        }
        // Every clocked byte repeats the address; the trailing 0 ends the burst.
        // The reply is shifted by one byte.
        let address = register_to_readvalue(reg);
        let mut tx_buf = vec![address; value.len()];
        tx_buf.push(0);
        let mut rx_buf = vec![0u8; tx_buf.len()];
        {
            let mut transfer = SpidevTransfer::read_write(&tx_buf, &mut rx_buf);
            self.spi.transfer(&mut transfer)?;
        }
        value.copy_from_slice(&rx_buf[1..]);
        Ok(())
    }

    fn write(&mut self, reg: u8, value: &[u8]) -> Result<()> {
        let address = register_to_writevalue(reg);
        self.spi.write_all(&[&[address], value].concat())?;
        Ok(())
    }
}
