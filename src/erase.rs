//! Erasure of whole slots.

use embedded_storage_async::nor_flash::NorFlash;

use crate::{Error, ImageHasher, Slot, SlotManager, Unit, log};

impl<F: NorFlash, H: ImageHasher> SlotManager<F, H> {
    /// Erase every unit of `slot`, in ascending order.
    ///
    /// Not atomic: when interrupted the slot is left partially erased and its contents can not be trusted.
    /// No verification is done before or after erasing.
    pub async fn erase(&mut self, slot: Slot) -> Result<(), Error> {
        let first = self.layout.first_unit(slot)?;
        let last = self.layout.last_unit(slot)?;
        let range = self.layout.slot_range(slot)?;

        log::info!(
            "Erasing slot {} [{=u32:#x}, {=u32:#x}]",
            slot.0,
            range.start,
            range.end.wrapping_sub(1)
        );

        for unit in first.0..=last.0 {
            self.flash.erase_unit(Unit(unit)).await?;
        }

        log::info!("Erased slot {}", slot.0);
        Ok(())
    }
}
