//! Firmware slot management for in-place updates on internal flash.
//!
//! Flash is split into equally sized slots, each starting with a [`Metadata`] header followed by the image.
//! This crate finds slots by version or age, verifies images against their stored hash,
//! erases slots and finally jumps into an image.
//!
//! Writing images into slots, overwriting metadata and golden image backups are not supported by this crate.
#![no_std]

use core::fmt;
use core::marker::PhantomData;

use embedded_storage_async::nor_flash::{NorFlash, NorFlashError, NorFlashErrorKind};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

pub mod boot;
pub mod erase;
pub mod flash;
pub mod layout;
pub mod metadata;
pub mod select;
pub mod verify;

pub use boot::JumpTarget;
pub use flash::FlashAdapter;
pub use layout::Layout;
pub use metadata::{Metadata, SlotState};
pub use verify::{ImageHasher, Integrity};

#[cfg(test)]
extern crate std;

#[cfg(test)]
mod mock;

#[cfg(feature = "defmt")]
pub(crate) use defmt as log;

#[cfg(not(feature = "defmt"))]
pub(crate) mod log {
    macro_rules! info {
        ( $( $x:expr ),* ) => {{ $( let _ = &$x; )* }};
    }
    pub(crate) use info;
    macro_rules! debug {
        ( $( $x:expr ),* ) => {{ $( let _ = &$x; )* }};
    }
    pub(crate) use debug;
    macro_rules! warner {
        ( $( $x:expr ),* ) => {{ $( let _ = &$x; )* }};
    }
    pub(crate) use warner as warn;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Slot number is 0 or beyond the configured slot count.
    InvalidSlot(u8),
    /// The slot metadata is erased, there is no image to work on.
    SlotEmpty,
    /// The image size in the metadata does not fit in the slot.
    ImageTooLarge { size: u32, capacity: u32 },
    /// The layout is inconsistent, either by itself or with the flash device.
    InvalidLayout,
    /// Address lies outside of the flash device.
    Address(u32),
    /// The flash driver reported an error.
    Flash(NorFlashErrorKind),
}

impl Error {
    pub(crate) fn flash(e: impl NorFlashError) -> Self {
        Error::Flash(e.kind())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidSlot(slot) => write!(f, "invalid firmware slot {slot}"),
            Error::SlotEmpty => f.write_str("firmware slot is empty"),
            Error::ImageTooLarge { size, capacity } => {
                write!(f, "image of {size} bytes exceeds slot capacity of {capacity} bytes")
            }
            Error::InvalidLayout => f.write_str("invalid slot layout"),
            Error::Address(address) => write!(f, "address {address:#x} outside of flash"),
            Error::Flash(kind) => write!(f, "flash error: {kind:?}"),
        }
    }
}

impl core::error::Error for Error {}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::InvalidSlot(slot) => defmt::write!(f, "InvalidSlot({})", slot),
            Error::SlotEmpty => defmt::write!(f, "SlotEmpty"),
            Error::ImageTooLarge { size, capacity } => {
                defmt::write!(f, "ImageTooLarge {{ size: {}, capacity: {} }}", size, capacity)
            }
            Error::InvalidLayout => defmt::write!(f, "InvalidLayout"),
            Error::Address(address) => defmt::write!(f, "Address({=u32:#x})", address),
            Error::Flash(kind) => defmt::write!(f, "Flash({})", defmt::Debug2Format(kind)),
        }
    }
}

/// Firmware slot number.
///
/// Slots are numbered starting at 1, slot 0 never exists.
/// Whether a slot exists is decided by the [`Layout`], which checks the number on every operation.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct Slot(pub(crate) u8);

impl Slot {
    pub const fn new(number: u8) -> Self {
        Slot(number)
    }

    pub const fn number(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Index of a physical erase unit (page or sector) counted from the start of the flash device.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct Unit(pub u32);

/// Firmware slots on a flash device.
///
/// Nothing read from flash is kept around, every call reads the current state of the slots.
pub struct SlotManager<F, H = Sha256> {
    flash: FlashAdapter<F>,
    layout: Layout,
    _hasher: PhantomData<H>,
}

impl<F: NorFlash, H: ImageHasher> SlotManager<F, H> {
    /// Take `flash` mapped at `layout.flash_base`.
    ///
    /// Fails if the layout does not match the erase size or capacity of the device.
    pub fn new(flash: F, layout: Layout) -> Result<Self, Error> {
        layout.validate()?;

        if layout.unit_size as usize != F::ERASE_SIZE
            || layout.required_capacity() > flash.capacity() as u64
        {
            return Err(Error::InvalidLayout);
        }

        Ok(Self {
            flash: FlashAdapter::new(flash, layout.flash_base),
            layout,
            _hasher: PhantomData,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Give back the flash device.
    pub fn release(self) -> F {
        self.flash.release()
    }

    /// Absolute address of the start of the slot, where its metadata lives.
    pub fn slot_address(&self, slot: Slot) -> Result<u32, Error> {
        self.layout.slot_address(slot)
    }

    /// First erase unit covered by the slot.
    pub fn slot_unit(&self, slot: Slot) -> Result<Unit, Error> {
        self.layout.first_unit(slot)
    }

    /// Slot containing `address`, typically the address of the running image.
    pub fn running_slot(&self, address: u32) -> Option<Slot> {
        self.layout.slot_containing(address)
    }

    pub async fn read_metadata(&mut self, slot: Slot) -> Result<Metadata, Error> {
        let unit = self.layout.first_unit(slot)?;
        log::debug!("Reading metadata of slot {}", slot.0);
        self.read_metadata_at_unit(unit).await
    }

    /// Read a metadata header from the start of an arbitrary erase unit.
    pub async fn read_metadata_at_unit(&mut self, unit: Unit) -> Result<Metadata, Error> {
        let address = self.layout.unit_address(unit)?;
        log::debug!("Reading metadata on unit {} at {=u32:#x}", unit.0, address);
        Metadata::read(&mut self.flash, address).await
    }

    /// Write the human readable dump of the slot metadata to `out`.
    pub async fn print_metadata(
        &mut self,
        slot: Slot,
        out: &mut impl fmt::Write,
    ) -> Result<(), Error> {
        let metadata = self.read_metadata(slot).await?;
        // Diagnostics only, a failing writer is not a slot error.
        let _ = write!(out, "{metadata}");
        Ok(())
    }

    pub async fn slot_state(&mut self, slot: Slot) -> Result<SlotState, Error> {
        Ok(self.read_metadata(slot).await?.state())
    }

    /// Destination for [`boot::jump`] into the image of `slot`.
    pub fn jump_target(&self, slot: Slot) -> Result<JumpTarget, Error> {
        self.layout.jump_target(slot)
    }
}
