//! Image integrity verification against the hash stored in the metadata.

use embedded_storage_async::nor_flash::NorFlash;
use sha2::{Digest, Sha256};

use crate::{Error, Slot, SlotManager, log, metadata::DIGEST_LEN};

/// Bytes of image hashed at a time.
pub const CHUNK_SIZE: usize = 1024;

/// Streaming hash over an image, started by [`Default::default`].
pub trait ImageHasher: Default {
    fn update(&mut self, data: &[u8]);

    fn finalize(self) -> [u8; DIGEST_LEN];
}

impl ImageHasher for Sha256 {
    fn update(&mut self, data: &[u8]) {
        Digest::update(self, data);
    }

    fn finalize(self) -> [u8; DIGEST_LEN] {
        Digest::finalize(self).into()
    }
}

/// Outcome of comparing an image with its metadata hash.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[must_use]
pub enum Integrity {
    Intact,
    /// The image does not hash to the value in its metadata.
    Mismatch,
}

impl<F: NorFlash, H: ImageHasher> SlotManager<F, H> {
    /// Hash the image in `slot` and compare it with its metadata.
    ///
    /// Uses a fixed buffer of [`CHUNK_SIZE`] bytes regardless of image size.
    pub async fn verify(&mut self, slot: Slot) -> Result<Integrity, Error> {
        let metadata = self.read_metadata(slot).await?;
        if metadata.is_erased() {
            log::warn!("Slot {} is empty, nothing to verify", slot.0);
            return Err(Error::SlotEmpty);
        }

        let capacity = self.layout.image_capacity()?;
        if metadata.size > capacity {
            log::warn!("Slot {} claims {} bytes of image, only {} fit", slot.0, metadata.size, capacity);
            return Err(Error::ImageTooLarge {
                size: metadata.size,
                capacity,
            });
        }

        let image = self.layout.image_address(slot)?;
        log::info!("Verifying slot {} at {=u32:#x}", slot.0, image);

        let mut buf = [0u8; CHUNK_SIZE];
        let mut hasher = H::default();

        let parts = metadata.size as usize / CHUNK_SIZE;
        let rest = metadata.size as usize % CHUNK_SIZE;

        let chunk_address = |part: usize| {
            u32::try_from(part * CHUNK_SIZE)
                .ok()
                .and_then(|offset| image.checked_add(offset))
                .ok_or(Error::Address(image))
        };

        for part in 0..parts {
            self.flash.read(chunk_address(part)?, &mut buf).await?;
            hasher.update(&buf);
        }

        if rest > 0 {
            self.flash.read(chunk_address(parts)?, &mut buf[..rest]).await?;
            hasher.update(&buf[..rest]);
        }

        if hasher.finalize() == metadata.hash {
            log::info!("Slot {} verified", slot.0);
            Ok(Integrity::Intact)
        } else {
            log::warn!("Slot {} hash verification failed", slot.0);
            Ok(Integrity::Mismatch)
        }
    }
}
