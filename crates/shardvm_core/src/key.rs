//! Runtime key derivation for the rejection diagnostics.
//!
//! The derived value depends on the process id and a stack address, so it
//! changes from run to run. It is printed, masked, when the VM rejects an
//! input and is never fed into code generation or execution.

/// Mask applied before the key is shown to the user.
pub const DISPLAY_MASK: u32 = 0xFFFF_FFFF;

/// Derives the runtime key from process identity and a stack address.
///
/// `stack_addr` is expected to be the address of a local at the call site.
pub const fn derive_runtime_key(pid: u32, stack_addr: usize) -> u32 {
    let mut key = (pid & 0xFF) << 8;
    key ^= ((stack_addr & 0xFF00) >> 4) as u32;
    key ^= 0xDEAD;
    key ^= 0xBEEF;
    key
}

/// The form of the key printed in the rejection diagnostics.
pub const fn displayed(key: u32) -> u32 {
    key ^ DISPLAY_MASK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_factors_cancel_to_fixed_base() {
        assert_eq!(derive_runtime_key(0, 0), 0xDEAD ^ 0xBEEF);
    }

    #[test]
    fn only_low_pid_byte_and_second_stack_byte_contribute() {
        let base = derive_runtime_key(0x34, 0xAB00);
        assert_eq!(derive_runtime_key(0xFFFF_FF34, 0xAB00), base);
        assert_eq!(derive_runtime_key(0x34, 0x7FFF_AB42), base);
        assert_eq!(base, (0x34 << 8) ^ (0xAB00 >> 4) ^ 0xDEAD ^ 0xBEEF);
    }

    #[test]
    fn displayed_key_is_bitwise_complement() {
        let key = derive_runtime_key(1234, 0x7ffd_1230);
        assert_eq!(displayed(key), !key);
    }
}
