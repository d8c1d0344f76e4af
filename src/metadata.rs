//! Firmware metadata header stored at the start of every slot.

use core::fmt;

use embedded_storage_async::nor_flash::NorFlash;
use serde::{Deserialize, Serialize};
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

use crate::{Error, flash::FlashAdapter};

/// Length of the image digests in the header.
pub const DIGEST_LEN: usize = 32;

/// Value of a byte of erased flash.
pub const ERASED: u8 = 0xff;

/// Metadata describing the image in a slot.
///
/// Stored in the native byte order of the processor, without any format version.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct Metadata {
    /// Image size in bytes.
    pub size: u32,
    pub version: u16,
    pub reserved: [u8; 2],
    /// Opaque image identifier.
    pub uuid: u32,
    /// SHA-256 of the image.
    pub hash: [u8; DIGEST_LEN],
    /// Signed hash of the image, not verified.
    pub shash: [u8; DIGEST_LEN],
}

/// Whether a slot contains anything, derived from its metadata.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum SlotState {
    /// Every metadata byte reads as erased flash.
    Erased,
    /// The metadata holds something. Says nothing about the image being intact.
    Populated,
}

impl SlotState {
    /// Classify a raw metadata block.
    pub fn of(bytes: &[u8]) -> SlotState {
        if bytes.iter().all(|b| *b == ERASED) {
            SlotState::Erased
        } else {
            SlotState::Populated
        }
    }
}

impl Metadata {
    pub fn new(size: u32, version: u16, uuid: u32, hash: [u8; DIGEST_LEN]) -> Self {
        Self {
            size,
            version,
            reserved: [0; 2],
            uuid,
            hash,
            shash: [0; DIGEST_LEN],
        }
    }

    /// Header as found in an erased slot.
    pub fn erased() -> Self {
        let mut metadata = Self::new_zeroed();
        metadata.as_mut_bytes().fill(ERASED);
        metadata
    }

    pub(crate) async fn read<F: NorFlash>(flash: &mut FlashAdapter<F>, address: u32) -> Result<Self, Error> {
        let mut metadata = Self::new_zeroed();
        flash.read(address, metadata.as_mut_bytes()).await?;
        Ok(metadata)
    }

    pub fn state(&self) -> SlotState {
        SlotState::of(self.as_bytes())
    }

    pub fn is_erased(&self) -> bool {
        self.state() == SlotState::Erased
    }
}

fn write_digest(f: &mut fmt::Formatter<'_>, digest: &[u8]) -> fmt::Result {
    for b in digest {
        write!(f, "{b:02x} ")?;
    }
    writeln!(f)
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Firmware Size: {}", self.size)?;
        writeln!(f, "Firmware Version: {:#x}", self.version)?;
        writeln!(f, "Firmware UUID: {:#x}", self.uuid)?;
        f.write_str("Firmware HASH: ")?;
        write_digest(f, &self.hash)?;
        f.write_str("Firmware signed HASH: ")?;
        write_digest(f, &self.shash)
    }
}
