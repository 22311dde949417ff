use crate::com::Com;
use crate::picc::MIFARE_ACK;
use crate::transport::Transceiver;
use crate::{Error, Result};
use std::thread;
use std::time;

#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
pub enum Register {
    // Reserved         = 0x00,
    CommandReg = 0x01,
    ComlEnReg = 0x02,
    DivlEnReg = 0x03,
    ComIrqReg = 0x04,
    DivIrqReg = 0x05,
    ErrorReg = 0x06,
    Status1Reg = 0x07,
    Status2Reg = 0x08,
    FIFODataReg = 0x09,
    FIFOLevelReg = 0x0A,
    WaterLevelReg = 0x0B,
    ControlReg = 0x0C,
    BitFramingReg = 0x0D,
    CollReg = 0x0E,
    // Reserved         = 0x0F,
    // Reserved         = 0x10,
    ModeReg = 0x11,
    TxModeReg = 0x12,
    RxModeReg = 0x13,
    TxControlReg = 0x14,
    TxASKReg = 0x15,
    TxSelReg = 0x16,
    RxSelReg = 0x17,
    RxThresholdReg = 0x18,
    DemodReg = 0x19,
    // Reserved         = 0x1A,
    // Reserved         = 0x1B,
    MfTxReg = 0x1C,
    MfRxReg = 0x1D,
    // Reserved         = 0x1E,
    SerialSpeedReg = 0x1F,
    // Reserved         = 0x20,
    CRCResultRegLow = 0x21,
    CRCResultRegHigh = 0x22,
    // Reserved         = 0x23,
    ModWidthReg = 0x24,
    // Reserved         = 0x25,
    RFCfgReg = 0x26,
    GsNReg = 0x27,
    CWGsPReg = 0x28,
    ModGsPReg = 0x29,
    TModeReg = 0x2A,
    TPrescalerReg = 0x2B,
    TReloadRegLow = 0x2C,
    TReloadRegHigh = 0x2D,
    TCounterValRegLow = 0x2E,
    TCounterValRegHigh = 0x2F,
    // Reserved         = 0x30,
    TestSel1Reg = 0x31,
    TestSel2Reg = 0x32,
    TestPinEnReg = 0x33,
    TestPinValueReg = 0x34,
    TestBusReg = 0x35,
    AutoTestReg = 0x36,
    VersionReg = 0x37,
    AnalogTestReg = 0x38,
    TestDAC1Reg = 0x39,
    TestDAC2Reg = 0x3A,
    TestADCReg = 0x3B,
    // Reserved         = 0x3C-0x3F,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Idle = 0b0000,
    Mem = 0b0001,
    GenerateRandomId = 0b0010,
    CalcCRC = 0b0011,
    Transmit = 0b0100,
    NoCmdChange = 0b0111,
    Receive = 0b1000,
    Transceive = 0b1100,
    MFAuthent = 0b1110,
    SoftReset = 0b1111,
}

/// Size of the MFRC522 FIFO, the longest frame it can receive at once.
pub const FIFO_SIZE: usize = 64;

// ComIrqReg: RxIRq | IdleIRq
const WAIT_IRQ: u8 = 0x30;
const TIMER_IRQ: u8 = 0x01;
// Each poll of ComIrqReg is a bus round trip; the 25ms chip timer fires long
// before this runs out unless the bus itself is dead.
const IRQ_POLLS: u16 = 2000;

#[derive(Debug)]
pub struct PiccResponse {
    pub data: Vec<u8>,
    pub valid_bits: u8, // Valid bits in the last byte, 0 for all 8.
}

impl PiccResponse {
    pub fn bit_len(&self) -> usize {
        match (self.data.len(), self.valid_bits) {
            (0, _) => 0,
            (len, 0) => len * 8,
            (len, bits) => (len - 1) * 8 + bits as usize,
        }
    }
}

pub struct MFRC522<C> {
    com: C,
}

impl<C: Com> MFRC522<C> {
    pub fn new(com: C) -> Self {
        Self { com }
    }

    pub fn release(self) -> C {
        self.com
    }

    pub fn read_register(&mut self, reg: Register) -> Result<u8> {
        let mut value = [0u8; 1];
        self.com.read(reg as u8, &mut value)?;
        Ok(value[0])
    }

    pub fn read_multiple(&mut self, reg: Register, count: usize) -> Result<Vec<u8>> {
        let mut value = vec![0u8; count];
        self.com.read(reg as u8, &mut value)?;
        Ok(value)
    }

    pub fn write_register(&mut self, reg: Register, value: u8) -> Result<()> {
        self.com.write(reg as u8, &[value])
    }

    pub fn write_multiple(&mut self, reg: Register, value: &[u8]) -> Result<()> {
        self.com.write(reg as u8, value)
    }

    pub fn set_register_bitmask(&mut self, reg: Register, mask: u8) -> Result<()> {
        let tmp = self.read_register(reg)?;
        self.write_register(reg, tmp | mask)
    }

    pub fn clear_register_bitmask(&mut self, reg: Register, mask: u8) -> Result<()> {
        let tmp = self.read_register(reg)?;
        self.write_register(reg, tmp & !mask)
    }

    /// Chip version: 0x91/0x92 for MFRC522 v1/v2, 0x88 for FM17522 clones.
    pub fn version(&mut self) -> Result<u8> {
        self.read_register(Register::VersionReg)
    }

    pub fn init(&mut self) -> Result<()> {
        self.reset()?;

        let version = self.version()?;
        if version == 0x00 || version == 0xFF {
            return Err(Error::NoReader(version));
        }
        log::debug!("MFRC522 version {:#04x}", version);

        self.write_register(Register::TxModeReg, 0x00)?;
        self.write_register(Register::RxModeReg, 0x00)?;
        // Reset ModWidthReg
        self.write_register(Register::ModWidthReg, 0x26)?;
        // f_timer = 13.56 MHz / (2*TPreScaler+1) where TPreScaler = [TPrescaler_Hi:TPrescaler_Lo].
        self.write_register(Register::TModeReg, 0x80)?; // TAuto=1; timer starts at the end of every transmission
        self.write_register(Register::TPrescalerReg, 0xA9)?; // 0x0A9 = 169 => f_timer=40kHz, ie a timer period of 25μs.
        self.write_register(Register::TReloadRegHigh, 0x03)?; // Reload timer with 0x3E8 = 1000, ie 25ms before timeout.
        self.write_register(Register::TReloadRegLow, 0xE8)?;
        self.write_register(Register::TxASKReg, 0x40)?; // Force a 100 % ASK modulation
        self.write_register(Register::ModeReg, 0x3D)?; // CRC coprocessor preset 0x6363
        self.enable_antenna()
    }

    pub fn reset(&mut self) -> Result<()> {
        self.write_register(Register::CommandReg, Command::SoftReset as u8)?;
        let mut count = 0;
        loop {
            thread::sleep(time::Duration::from_millis(50));
            let cmd_val = self.read_register(Register::CommandReg)?;
            // PowerDown bit clears once the oscillator is back.
            if cmd_val & (1 << 4) == 0 || count >= 3 {
                break;
            }
            count += 1;
        }
        Ok(())
    }

    pub fn enable_antenna(&mut self) -> Result<()> {
        let control_reg = self.read_register(Register::TxControlReg)?;
        if (control_reg & 0x03) != 0x03 {
            self.write_register(Register::TxControlReg, control_reg | 0x03)?;
        }
        Ok(())
    }

    fn communicate_with_picc(
        &mut self,
        command: Command,
        wait_irq: u8,
        send_data: &[u8],
        tx_last_bits: u8, // Valid bits in the last byte sent, 0 for all 8.
    ) -> Result<PiccResponse> {
        self.write_register(Register::CommandReg, Command::Idle as u8)?; // Stop any active command.
        self.write_register(Register::ComIrqReg, 0x7F)?; // Clear all seven interrupt request bits.
        self.write_register(Register::FIFOLevelReg, 0x80)?; // FlushBuffer = 1, FIFO initialization
        self.write_multiple(Register::FIFODataReg, send_data)?;
        self.write_register(Register::BitFramingReg, tx_last_bits & 0x07)?; // RxAlign 0, TxLastBits
        self.write_register(Register::CommandReg, command as u8)?;

        if command == Command::Transceive {
            self.set_register_bitmask(Register::BitFramingReg, 0x80)?; // StartSend
        }

        let mut done = false;
        for _ in 0..IRQ_POLLS {
            let n = self.read_register(Register::ComIrqReg)?;
            if n & wait_irq != 0 {
                done = true;
                break;
            }
            if n & TIMER_IRQ != 0 {
                // Nothing received in 25ms
                return Err(Error::Timeout);
            }
        }
        if !done {
            return Err(Error::Timeout);
        }

        // ErrorReg[7..0] bits are: WrErr TempErr reserved BufferOvfl CollErr CRCErr ParityErr ProtocolErr
        let error_reg_value = self.read_register(Register::ErrorReg)?;
        if error_reg_value & 0x13 != 0 {
            return Err(Error::Communication);
        }

        let n = self.read_register(Register::FIFOLevelReg)? as usize & 0x7F;
        if n > FIFO_SIZE {
            return Err(Error::NoRoom);
        }
        let data = self.read_multiple(Register::FIFODataReg, n)?;
        // RxLastBits[2:0]
        let valid_bits = self.read_register(Register::ControlReg)? & 0x07;

        if error_reg_value & 0x08 != 0 {
            return Err(Error::Collision);
        }

        // A lone 4-bit answer is an ACK or a NAK.
        if data.len() == 1 && valid_bits == 4 && data[0] & 0x0F != MIFARE_ACK {
            return Err(Error::MifareNack(data[0] & 0x0F));
        }

        Ok(PiccResponse { data, valid_bits })
    }

    pub fn transceive_data(&mut self, send_data: &[u8], tx_last_bits: u8) -> Result<PiccResponse> {
        self.communicate_with_picc(Command::Transceive, WAIT_IRQ, send_data, tx_last_bits)
    }

    fn copy_response(response: &PiccResponse, rx: &mut [u8]) -> Result<()> {
        if response.data.len() > rx.len() {
            return Err(Error::NoRoom);
        }
        rx[..response.data.len()].copy_from_slice(&response.data);
        Ok(())
    }
}

impl<C: Com> Transceiver for MFRC522<C> {
    fn transceive_bits(&mut self, tx: &[u8], tx_bits: usize, rx: &mut [u8]) -> Result<usize> {
        let len = (tx_bits + 7) / 8;
        if len == 0 || len > tx.len() || len > FIFO_SIZE {
            return Err(Error::Invalid);
        }
        let response = self.transceive_data(&tx[..len], (tx_bits % 8) as u8)?;
        Self::copy_response(&response, rx)?;
        Ok(response.bit_len())
    }

    fn transceive_bytes(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<usize> {
        if tx.is_empty() || tx.len() > FIFO_SIZE {
            return Err(Error::Invalid);
        }
        let response = self.transceive_data(tx, 0)?;
        Self::copy_response(&response, rx)?;
        Ok(response.data.len())
    }

    fn configure_raw(&mut self) -> Result<()> {
        // TxCRCEn / RxCRCEn off, 106 kBd. There is no easy framing or
        // ISO14443-4 layer on this chip to turn off.
        self.write_register(Register::TxModeReg, 0x00)?;
        self.write_register(Register::RxModeReg, 0x00)?;
        self.write_register(Register::ModWidthReg, 0x26)?;
        // ValuesAfterColl=1 => Bits received after collision are cleared.
        self.clear_register_bitmask(Register::CollReg, 0x80)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};

    /// Register file answering scripted reads, 0 once a script runs dry.
    #[derive(Default)]
    struct FakeCom {
        reads: HashMap<u8, VecDeque<u8>>,
        writes: Vec<(u8, Vec<u8>)>,
    }

    impl FakeCom {
        fn script(mut self, reg: Register, values: &[u8]) -> Self {
            self.reads
                .entry(reg as u8)
                .or_default()
                .extend(values.iter().copied());
            self
        }

        fn wrote(&self, reg: Register, value: &[u8]) -> bool {
            self.writes
                .iter()
                .any(|(r, v)| *r == reg as u8 && v.as_slice() == value)
        }
    }

    impl Com for FakeCom {
        fn read(&mut self, reg: u8, value: &mut [u8]) -> Result<()> {
            let queue = self.reads.entry(reg).or_default();
            for b in value.iter_mut() {
                *b = queue.pop_front().unwrap_or(0);
            }
            Ok(())
        }

        fn write(&mut self, reg: u8, value: &[u8]) -> Result<()> {
            self.writes.push((reg, value.to_vec()));
            Ok(())
        }
    }

    fn answering(data: &[u8], valid_bits: u8) -> FakeCom {
        FakeCom::default()
            .script(Register::ComIrqReg, &[0x00, WAIT_IRQ])
            .script(Register::FIFOLevelReg, &[data.len() as u8])
            .script(Register::FIFODataReg, data)
            .script(Register::ControlReg, &[valid_bits])
    }

    #[test]
    fn short_frame_sets_tx_last_bits() {
        let mut mfrc = MFRC522::new(answering(&[0x0a], 4));
        let mut rx = [0u8; 8];
        let bits = mfrc.transceive_bits(&[0x40], 7, &mut rx).unwrap();
        assert_eq!(bits, 4);
        assert_eq!(rx[0], 0x0a);
        let com = mfrc.release();
        assert!(com.wrote(Register::FIFODataReg, &[0x40]));
        assert!(com.wrote(Register::BitFramingReg, &[0x07]));
        assert!(com.wrote(Register::CommandReg, &[Command::Transceive as u8]));
    }

    #[test]
    fn byte_frame_returns_fifo_contents() {
        let mut mfrc = MFRC522::new(answering(&[0x04, 0x00], 0));
        let mut rx = [0u8; 8];
        let len = mfrc.transceive_bytes(&[0xa0, 0x04, 0x1e, 0xa7], &mut rx).unwrap();
        assert_eq!(&rx[..len], &[0x04, 0x00]);
        let com = mfrc.release();
        assert!(com.wrote(Register::FIFODataReg, &[0xa0, 0x04, 0x1e, 0xa7]));
        assert!(com.wrote(Register::BitFramingReg, &[0x00]));
    }

    #[test]
    fn nak_is_an_error() {
        let mut mfrc = MFRC522::new(answering(&[0x04], 4));
        let mut rx = [0u8; 8];
        assert!(matches!(
            mfrc.transceive_bytes(&[0x43], &mut rx),
            Err(Error::MifareNack(0x04))
        ));
    }

    #[test]
    fn timer_irq_is_a_timeout() {
        let com = FakeCom::default().script(Register::ComIrqReg, &[TIMER_IRQ]);
        let mut mfrc = MFRC522::new(com);
        let mut rx = [0u8; 8];
        assert!(matches!(
            mfrc.transceive_bits(&[0x40], 7, &mut rx),
            Err(Error::Timeout)
        ));
    }

    #[test]
    fn protocol_error_is_communication_error() {
        let com = answering(&[0x0a], 4).script(Register::ErrorReg, &[0x01]);
        let mut mfrc = MFRC522::new(com);
        let mut rx = [0u8; 8];
        assert!(matches!(
            mfrc.transceive_bytes(&[0x43], &mut rx),
            Err(Error::Communication)
        ));
    }

    #[test]
    fn response_larger_than_rx_is_rejected() {
        let mut mfrc = MFRC522::new(answering(&[1, 2, 3, 4], 0));
        let mut rx = [0u8; 2];
        assert!(matches!(
            mfrc.transceive_bytes(&[0x30, 0x00], &mut rx),
            Err(Error::NoRoom)
        ));
    }

    #[test]
    fn init_without_reader_fails() {
        let mut mfrc = MFRC522::new(FakeCom::default().script(Register::VersionReg, &[0x00]));
        assert!(matches!(mfrc.init(), Err(Error::NoReader(0x00))));
    }

    #[test]
    fn init_programs_timer_and_antenna() {
        let com = FakeCom::default().script(Register::VersionReg, &[0x92]);
        let mut mfrc = MFRC522::new(com);
        mfrc.init().unwrap();
        let com = mfrc.release();
        assert!(com.wrote(Register::CommandReg, &[Command::SoftReset as u8]));
        assert!(com.wrote(Register::TReloadRegLow, &[0xE8]));
        assert!(com.wrote(Register::TxControlReg, &[0x03]));
    }

    #[test]
    fn configure_raw_disables_crc() {
        let com = FakeCom::default().script(Register::CollReg, &[0x80]);
        let mut mfrc = MFRC522::new(com);
        mfrc.configure_raw().unwrap();
        let com = mfrc.release();
        assert!(com.wrote(Register::TxModeReg, &[0x00]));
        assert!(com.wrote(Register::RxModeReg, &[0x00]));
        assert!(com.wrote(Register::CollReg, &[0x00]));
    }

    #[test]
    fn bit_len_accounts_for_partial_byte() {
        let response = PiccResponse {
            data: vec![0x04, 0x00],
            valid_bits: 0,
        };
        assert_eq!(response.bit_len(), 16);
        let ack = PiccResponse {
            data: vec![0x0a],
            valid_bits: 4,
        };
        assert_eq!(ack.bit_len(), 4);
    }
}
