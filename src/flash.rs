//! Access to flash by absolute memory address.

use embedded_storage_async::nor_flash::NorFlash;

use crate::{Error, Unit, log};

/// Flash device mapped at `base` in the memory map of the processor.
///
/// Callers only deal with absolute addresses and unit indices,
/// translation to device offsets happens here and nowhere else.
pub struct FlashAdapter<F> {
    flash: F,
    base: u32,
}

impl<F: NorFlash> FlashAdapter<F> {
    pub const fn new(flash: F, base: u32) -> Self {
        Self { flash, base }
    }

    pub fn release(self) -> F {
        self.flash
    }

    fn offset(&self, address: u32, len: usize) -> Result<u32, Error> {
        let offset = address.checked_sub(self.base).ok_or(Error::Address(address))?;
        let end = offset as u64 + len as u64;
        if end > self.flash.capacity() as u64 {
            return Err(Error::Address(address));
        }
        Ok(offset)
    }

    /// Fill `buf` with the bytes found at `address`.
    pub async fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), Error> {
        let offset = self.offset(address, buf.len())?;
        self.flash.read(offset, buf).await.map_err(Error::flash)
    }

    /// Erase a single physical unit.
    pub async fn erase_unit(&mut self, unit: Unit) -> Result<(), Error> {
        let size = F::ERASE_SIZE as u32;
        let from = unit.0.checked_mul(size).ok_or(Error::Address(self.base))?;
        let to = from.checked_add(size).ok_or(Error::Address(self.base))?;
        if to as usize > self.flash.capacity() {
            return Err(Error::Address(self.base.wrapping_add(from)));
        }

        log::debug!("Erasing unit {}", unit.0);
        self.flash.erase(from, to).await.map_err(Error::flash)
    }
}
