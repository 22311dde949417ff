use crate::com::Com;
use crate::{Error, Result};
use embedded_hal::blocking::i2c;

/// Default 7-bit I2C address of an MFRC522 with all address pins low.
pub const MFRC522_ADDR: u8 = 0x28;

pub struct ComI2c<I2C> {
    com: I2C,
    addr: u8,
}

impl<I2C> ComI2c<I2C> {
    pub fn new(i2c: I2C, addr: u8) -> Self {
        Self { com: i2c, addr }
    }

    pub fn release(self) -> I2C {
        self.com
    }
}

impl<I2C> Com for ComI2c<I2C>
where
    I2C: i2c::Read + i2c::Write,
{
    fn read(&mut self, reg: u8, value: &mut [u8]) -> Result<()> {
        if value.is_empty() {
            return Ok(());
        }
        i2c::Write::write(&mut self.com, self.addr, &[reg]).map_err(|_| Error::ComErr)?;
        i2c::Read::read(&mut self.com, self.addr, value).map_err(|_| Error::ComErr)
    }

    fn write(&mut self, reg: u8, value: &[u8]) -> Result<()> {
        let tx_buf = [&[reg], value].concat();
        i2c::Write::write(&mut self.com, self.addr, &tx_buf).map_err(|_| Error::ComErr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeBus {
        writes: Vec<(u8, Vec<u8>)>,
        reads: Vec<u8>,
        fail: bool,
    }

    impl i2c::Write for FakeBus {
        type Error = ();

        fn write(&mut self, address: u8, bytes: &[u8]) -> std::result::Result<(), ()> {
            if self.fail {
                return Err(());
            }
            self.writes.push((address, bytes.to_vec()));
            Ok(())
        }
    }

    impl i2c::Read for FakeBus {
        type Error = ();

        fn read(&mut self, _address: u8, buffer: &mut [u8]) -> std::result::Result<(), ()> {
            for b in buffer.iter_mut() {
                *b = self.reads.remove(0);
            }
            Ok(())
        }
    }

    #[test]
    fn write_prefixes_register_address() {
        let mut com = ComI2c::new(FakeBus::default(), MFRC522_ADDR);
        com.write(0x09, &[0xa0, 0x04]).unwrap();
        let bus = com.release();
        assert_eq!(bus.writes, vec![(0x28, vec![0x09, 0xa0, 0x04])]);
    }

    #[test]
    fn read_selects_register_then_reads() {
        let bus = FakeBus {
            reads: vec![0x92],
            ..FakeBus::default()
        };
        let mut com = ComI2c::new(bus, MFRC522_ADDR);
        let mut value = [0u8; 1];
        com.read(0x37, &mut value).unwrap();
        assert_eq!(value, [0x92]);
        assert_eq!(com.release().writes, vec![(0x28, vec![0x37])]);
    }

    #[test]
    fn bus_failure_maps_to_com_err() {
        let bus = FakeBus {
            fail: true,
            ..FakeBus::default()
        };
        let mut com = ComI2c::new(bus, MFRC522_ADDR);
        assert!(matches!(com.write(0x01, &[0x0f]), Err(Error::ComErr)));
    }
}
