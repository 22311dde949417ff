use crate::Result;

/// Register-level access to a reader IC. Addresses are the plain register
/// numbers; each bus adapter applies its own address encoding.
pub trait Com {
    fn read(&mut self, reg: u8, value: &mut [u8]) -> Result<()>;
    fn write(&mut self, reg: u8, value: &[u8]) -> Result<()>;
}
