use crate::boot::Boot;

unsafe extern "C" {
    /// Top of the stack, provided by the linker script.
    static _stack_start: u32;
}

/// Bootload mechanism for Cortex-M without support for TrustZone.
///
/// Disables interrupts, moves the process stack pointer to the top of the stack
/// and branches to the reset handler in Thumb state.
pub struct SimpleCortexM;

impl Boot for SimpleCortexM {
    unsafe fn boot(reset_vector: *const u32) -> ! {
        cortex_m::interrupt::disable();

        unsafe {
            cortex_m::register::psp::write(core::ptr::addr_of!(_stack_start) as u32);

            let entry = reset_vector.read_volatile() | 1;
            core::arch::asm!("bx {entry}", entry = in(reg) entry, options(noreturn));
        }
    }
}
