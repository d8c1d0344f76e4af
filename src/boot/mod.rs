//! Transfer of control into a firmware image.

#[cfg(feature = "cortex_m")]
pub mod cortex_m;

use crate::log;

/// Offset of the reset handler in the vector table at the start of an image.
pub const RESET_VECTOR_OFFSET: u32 = 4;

/// Bootload mechanism that jumps to the reset handler of an image.
pub trait Boot {
    /// Branch to the reset handler whose address is stored at `reset_vector`.
    ///
    /// # Safety
    /// `reset_vector` must point into the vector table of an image that is fit to run.
    unsafe fn boot(reset_vector: *const u32) -> !;
}

/// Validated destination of a jump.
///
/// Only obtainable for an existing slot through [`crate::Layout::jump_target`], or as [`JumpTarget::reboot`].
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct JumpTarget {
    reset_vector: u32,
}

impl JumpTarget {
    /// Image in the slot starting at `slot_address`, located after the metadata.
    pub(crate) const fn new(slot_address: u32, metadata_space: u32) -> Self {
        Self {
            reset_vector: slot_address
                .wrapping_add(metadata_space)
                .wrapping_add(RESET_VECTOR_OFFSET),
        }
    }

    /// Restart through the vector table at address 0.
    pub const fn reboot() -> Self {
        Self {
            reset_vector: RESET_VECTOR_OFFSET,
        }
    }

    /// Address of the vector table entry holding the reset handler.
    pub const fn reset_vector(&self) -> u32 {
        self.reset_vector
    }
}

/// Jump to `target`, never to return.
///
/// # Safety
/// The image at `target` must have been verified, there is no way back once started.
pub unsafe fn jump<B: Boot>(target: JumpTarget) -> ! {
    log::info!("Jumping to reset vector at {=u32:#x}", target.reset_vector);
    unsafe { B::boot(target.reset_vector as *const u32) }
}
