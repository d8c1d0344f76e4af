use std::vec::Vec;

use embedded_storage_async::nor_flash::{ErrorType, NorFlash, NorFlashErrorKind, ReadNorFlash};
use sha2::{Digest, Sha256};
use zerocopy::IntoBytes;

use crate::{Layout, Metadata, Slot, SlotManager, Unit};

/// RAM backed NOR flash, tracking reads and erasures.
#[derive(Debug)]
pub struct MockFlash {
    pub data: Vec<u8>,
    pub reads: usize,
    pub erased: Vec<Unit>,
}

impl MockFlash {
    pub const UNIT_SIZE: u32 = 1024;

    /// Fully erased flash of `units` erase units.
    pub fn new(units: u32) -> Self {
        Self {
            data: std::vec![0xff; (units * Self::UNIT_SIZE) as usize],
            reads: 0,
            erased: Vec::new(),
        }
    }

    fn check(&self, offset: u32, len: usize) -> Result<(), NorFlashErrorKind> {
        if offset as usize + len > self.data.len() {
            return Err(NorFlashErrorKind::OutOfBounds);
        }
        Ok(())
    }
}

impl ErrorType for MockFlash {
    type Error = NorFlashErrorKind;
}

impl ReadNorFlash for MockFlash {
    const READ_SIZE: usize = 1;

    async fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.check(offset, bytes.len())?;
        self.reads += 1;
        bytes.copy_from_slice(&self.data[offset as usize..offset as usize + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}

impl NorFlash for MockFlash {
    const WRITE_SIZE: usize = 1;
    const ERASE_SIZE: usize = Self::UNIT_SIZE as usize;

    async fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        if from % Self::UNIT_SIZE != 0 || to % Self::UNIT_SIZE != 0 {
            return Err(NorFlashErrorKind::NotAligned);
        }
        self.check(from, (to - from) as usize)?;

        for unit in (from / Self::UNIT_SIZE)..(to / Self::UNIT_SIZE) {
            self.erased.push(Unit(unit));
        }
        self.data[from as usize..to as usize].fill(0xff);
        Ok(())
    }

    async fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        self.check(offset, bytes.len())?;
        // NOR flash can only clear bits.
        for (cell, b) in self.data[offset as usize..].iter_mut().zip(bytes) {
            *cell &= *b;
        }
        Ok(())
    }
}

/// Four slots of three units each, after two units of bootloader.
pub const LAYOUT: Layout = Layout {
    flash_base: 0x0800_0000,
    unit_size: MockFlash::UNIT_SIZE,
    first_slot_unit: 2,
    units_per_slot: 3,
    slot_count: 4,
    metadata_space: 0x100,
};

/// Flash fitting [`LAYOUT`] with an extra unit at the end.
pub fn flash() -> MockFlash {
    MockFlash::new(2 + 3 * 4 + 1)
}

/// Deterministic image contents.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + i / 251) as u8).collect()
}

/// Place metadata and image in a slot as the update process would.
pub fn store(flash: &mut MockFlash, slot: Slot, metadata: &Metadata, image: &[u8]) {
    store_in(flash, &LAYOUT, slot, metadata, image);
}

/// Like [`store`], for a layout other than [`LAYOUT`].
pub fn store_in(flash: &mut MockFlash, layout: &Layout, slot: Slot, metadata: &Metadata, image: &[u8]) {
    let start = (layout.slot_address(slot).unwrap() - layout.flash_base) as usize;
    let image_start = start + layout.metadata_space as usize;

    flash.data[start..start + size_of::<Metadata>()].copy_from_slice(metadata.as_bytes());
    flash.data[image_start..image_start + image.len()].copy_from_slice(image);
}

/// Store a valid image of `len` bytes with its real hash.
pub fn store_image(flash: &mut MockFlash, slot: Slot, version: u16, len: usize) -> Vec<u8> {
    let image = payload(len);
    let metadata = Metadata::new(len as u32, version, 0x1000 + version as u32, Sha256::digest(&image).into());
    store(flash, slot, &metadata, &image);
    image
}

/// Lay out slots with the given versions, `None` leaving a slot erased.
pub fn manager(versions: &[Option<u16>]) -> SlotManager<MockFlash> {
    let mut flash = flash();
    for (i, version) in versions.iter().enumerate() {
        if let Some(version) = version {
            store_image(&mut flash, Slot(i as u8 + 1), *version, 64);
        }
    }
    SlotManager::new(flash, LAYOUT).unwrap()
}
