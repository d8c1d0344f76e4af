//! Slot selection by version and age.
//!
//! Every search walks the slots in ascending order and reads the metadata of each,
//! so the lowest slot wins when several slots qualify equally.

use embedded_storage_async::nor_flash::NorFlash;

use crate::{Error, ImageHasher, Metadata, Slot, SlotManager, SlotState, log};

impl<F: NorFlash, H: ImageHasher> SlotManager<F, H> {
    /// Read the metadata of a slot under consideration, leaving a trail of what was seen.
    async fn scan(&mut self, slot: Slot) -> Result<Metadata, Error> {
        let metadata = self.read_metadata(slot).await?;
        match metadata.state() {
            SlotState::Erased => log::debug!("Slot {}: erased", slot.0),
            SlotState::Populated => log::debug!(
                "Slot {}: version {}, size {}, uuid {=u32:#x}",
                slot.0,
                metadata.version,
                metadata.size,
                metadata.uuid
            ),
        }
        Ok(metadata)
    }

    /// First populated slot carrying `version`.
    pub async fn find_by_version(&mut self, version: u16) -> Result<Option<Slot>, Error> {
        for slot in self.layout.slots() {
            let metadata = self.scan(slot).await?;
            if metadata.is_erased() {
                continue;
            }

            if metadata.version == version {
                log::info!("Slot {} matches version {}", slot.0, version);
                return Ok(Some(slot));
            }
        }

        log::info!("No slot matches version {}", version);
        Ok(None)
    }

    /// First erased slot, or else the slot with the oldest image.
    ///
    /// Every slot is either erased or populated, so there always is a slot to return.
    pub async fn find_empty_or_oldest(&mut self) -> Result<Slot, Error> {
        for slot in self.layout.slots() {
            if self.scan(slot).await?.is_erased() {
                log::info!("Slot {} is empty", slot.0);
                return Ok(slot);
            }
        }

        log::info!("No empty slot, searching for oldest image");
        // All slots are populated here, and a validated layout has at least one.
        self.find_oldest().await?.ok_or(Error::InvalidLayout)
    }

    /// Populated slot with the lowest version.
    pub async fn find_oldest(&mut self) -> Result<Option<Slot>, Error> {
        let oldest = self.find_extreme(|candidate, best| candidate < best).await?;
        match oldest {
            Some((slot, version)) => log::info!("Oldest slot {} with version {}", slot.0, version),
            None => log::info!("No populated slots"),
        }
        Ok(oldest.map(|(slot, _)| slot))
    }

    /// Populated slot with the highest version.
    pub async fn find_newest(&mut self) -> Result<Option<Slot>, Error> {
        let newest = self.find_extreme(|candidate, best| candidate > best).await?;
        match newest {
            Some((slot, version)) => log::info!("Newest slot {} with version {}", slot.0, version),
            None => log::info!("No populated slots"),
        }
        Ok(newest.map(|(slot, _)| slot))
    }

    /// Populated slot whose version beats all others according to `better`.
    async fn find_extreme(&mut self, better: impl Fn(u16, u16) -> bool) -> Result<Option<(Slot, u16)>, Error> {
        let mut best: Option<(Slot, u16)> = None;

        for slot in self.layout.slots() {
            let metadata = self.scan(slot).await?;
            if metadata.is_erased() {
                continue;
            }

            if best.is_none_or(|(_, version)| better(metadata.version, version)) {
                best = Some((slot, metadata.version));
            }
        }

        Ok(best)
    }
}
