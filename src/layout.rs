//! Mapping of slot numbers to physical flash.
//!
//! All slot address arithmetic lives in [`Layout`].

use core::ops::Range;

use serde::{Deserialize, Serialize};

use crate::{Error, Slot, Unit, boot::JumpTarget, metadata::Metadata};

/// Placement of the firmware slots in flash, as defined by the board memory map.
///
/// Slots are laid out back to back, starting at `first_slot_unit`:
///
/// ```text
/// | bootloader | slot 1 [metadata | image] | slot 2 [metadata | image] | ...
/// ```
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Layout {
    /// Absolute address at which the flash device is mapped.
    pub flash_base: u32,
    /// Size of a physical erase unit (page or sector) in bytes.
    pub unit_size: u32,
    /// Erase unit at which slot 1 starts.
    pub first_slot_unit: u32,
    /// Erase units covered by a single slot.
    pub units_per_slot: u32,
    /// Number of slots, slots are numbered `1..=slot_count`.
    pub slot_count: u8,
    /// Bytes reserved for the metadata at the start of every slot, the image follows directly after.
    pub metadata_space: u32,
}

impl Layout {
    /// Bytes of a slot, metadata included.
    pub const fn slot_size(&self) -> Result<u32, Error> {
        match self.unit_size.checked_mul(self.units_per_slot) {
            Some(size) => Ok(size),
            None => Err(Error::InvalidLayout),
        }
    }

    /// Bytes available for the image in every slot.
    pub fn image_capacity(&self) -> Result<u32, Error> {
        self.slot_size()?
            .checked_sub(self.metadata_space)
            .ok_or(Error::InvalidLayout)
    }

    /// Bytes of the flash device, counted from `flash_base`, spanned by the layout.
    pub const fn required_capacity(&self) -> u64 {
        (self.units_per_slot as u64 * self.slot_count as u64 + self.first_slot_unit as u64)
            .saturating_mul(self.unit_size as u64)
    }

    /// Check the layout for consistency.
    ///
    /// After a successful validation no address within the layout lies beyond the 32 bit address space.
    pub fn validate(&self) -> Result<(), Error> {
        let consistent = self.unit_size > 0
            && self.units_per_slot > 0
            && self.slot_count > 0
            && (self.metadata_space as usize) >= size_of::<Metadata>()
            && (self.unit_size as u64 * self.units_per_slot as u64) > self.metadata_space as u64
            && self.flash_base as u64 + self.required_capacity() <= u32::MAX as u64 + 1;

        if consistent {
            Ok(())
        } else {
            Err(Error::InvalidLayout)
        }
    }

    pub fn check(&self, slot: Slot) -> Result<(), Error> {
        if slot.0 == 0 || slot.0 > self.slot_count {
            return Err(Error::InvalidSlot(slot.0));
        }
        Ok(())
    }

    /// All slots in ascending order.
    pub fn slots(&self) -> impl Iterator<Item = Slot> + use<> {
        (1..=self.slot_count).map(Slot)
    }

    pub fn first_unit(&self, slot: Slot) -> Result<Unit, Error> {
        self.check(slot)?;
        (slot.0 as u32 - 1)
            .checked_mul(self.units_per_slot)
            .and_then(|units| units.checked_add(self.first_slot_unit))
            .map(Unit)
            .ok_or(Error::InvalidLayout)
    }

    /// Last erase unit covered by the slot, inclusive.
    pub fn last_unit(&self, slot: Slot) -> Result<Unit, Error> {
        let first = self.first_unit(slot)?;
        self.units_per_slot
            .checked_sub(1)
            .and_then(|units| first.0.checked_add(units))
            .map(Unit)
            .ok_or(Error::InvalidLayout)
    }

    pub fn unit_address(&self, unit: Unit) -> Result<u32, Error> {
        unit.0
            .checked_mul(self.unit_size)
            .and_then(|offset| offset.checked_add(self.flash_base))
            .ok_or(Error::Address(self.flash_base))
    }

    /// Absolute address of the start of the slot.
    pub fn slot_address(&self, slot: Slot) -> Result<u32, Error> {
        let unit = self.first_unit(slot)?;
        self.unit_address(unit)
    }

    /// Absolute address range of the whole slot, metadata included.
    ///
    /// A slot ending exactly at the top of the address space has an `end` of 0.
    pub fn slot_range(&self, slot: Slot) -> Result<Range<u32>, Error> {
        let start = self.slot_address(slot)?;
        Ok(start..start.wrapping_add(self.slot_size()?))
    }

    /// Absolute address of the first byte of the image in the slot.
    pub fn image_address(&self, slot: Slot) -> Result<u32, Error> {
        let start = self.slot_address(slot)?;
        start
            .checked_add(self.metadata_space)
            .ok_or(Error::Address(start))
    }

    /// Slot in which `address` resides, if any.
    pub fn slot_containing(&self, address: u32) -> Option<Slot> {
        let first = self.unit_address(Unit(self.first_slot_unit)).ok()?;
        let offset = address.checked_sub(first)?;
        let index = offset.checked_div(self.slot_size().ok()?)?;
        if index >= self.slot_count as u32 {
            return None;
        }
        Some(Slot(index as u8 + 1))
    }

    pub fn jump_target(&self, slot: Slot) -> Result<JumpTarget, Error> {
        let address = self.slot_address(slot)?;
        Ok(JumpTarget::new(address, self.metadata_space))
    }
}
