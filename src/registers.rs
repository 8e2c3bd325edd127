// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-powermeter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register decoding for IEEE-754 single precision values
//!
//! The power meter exposes each measurement as a 32-bit float spread over two
//! consecutive 16-bit registers. The layout is word-swapped big-endian: the
//! register at the lower address carries the least significant word.
//!
//! | Register | Content |
//! |----------|---------|
//! | `a`      | low word (bits 0-15), big-endian bytes |
//! | `a + 1`  | high word (bits 16-31), big-endian bytes |
//!
//! The four bytes `hi(r1) lo(r1) hi(r0) lo(r0)` are then read as a big-endian
//! float. A register block of `N` registers therefore carries `N / 2` channels,
//! channel 1 being stored in registers `[0, 1]`.

use crate::error::DecodeError;

/// Number of registers holding one float32 channel.
pub const REGISTERS_PER_CHANNEL: usize = 2;

/// Decode one float32 from exactly two registers `[r0, r1]`.
///
/// ### Errors
///
/// Returns [`DecodeError::InvalidRegisterCount`] when `registers` does not
/// hold exactly two values.
///
/// ### Example
///
/// ```
/// use rust_powermeter::registers::decode_f32;
///
/// // 230.0 is 0x4366_0000: high word 0x4366 sits in the second register
/// assert_eq!(decode_f32(&[0x0000, 0x4366]).unwrap(), 230.0);
/// ```
pub fn decode_f32(registers: &[u16]) -> Result<f32, DecodeError> {
    match registers {
        [low, high] => {
            let [b0, b1] = high.to_be_bytes();
            let [b2, b3] = low.to_be_bytes();
            Ok(f32::from_be_bytes([b0, b1, b2, b3]))
        }
        _ => Err(DecodeError::InvalidRegisterCount {
            count: registers.len(),
        }),
    }
}

/// Encode a float32 into the two registers `[low, high]` read back by [`decode_f32`].
pub fn encode_f32(value: f32) -> [u16; 2] {
    let [b0, b1, b2, b3] = value.to_be_bytes();
    [
        u16::from_be_bytes([b2, b3]),
        u16::from_be_bytes([b0, b1]),
    ]
}

/// Check that a register block can be split into whole channels.
pub fn validate_block_len(len: usize) -> Result<(), DecodeError> {
    if len == 0 || len % REGISTERS_PER_CHANNEL != 0 {
        return Err(DecodeError::InvalidBlockLength { len });
    }
    Ok(())
}

/// Whether `count` registers from `address` stay within registers 0..=65535.
pub fn block_fits(address: u16, count: u16) -> bool {
    u32::from(address) + u32::from(count) <= u32::from(u16::MAX) + 1
}

/// Split a register block into its channel readings.
///
/// The returned vector is in address order, index 0 being channel 1.
///
/// ### Errors
///
/// Returns [`DecodeError::InvalidBlockLength`] for empty or odd-length blocks.
pub fn decompose_block(registers: &[u16]) -> Result<Vec<f32>, DecodeError> {
    validate_block_len(registers.len())?;
    registers
        .chunks_exact(REGISTERS_PER_CHANNEL)
        .map(decode_f32)
        .collect()
}

/// Encode channel values into a contiguous register block, channel 1 first.
pub fn encode_block(values: &[f32]) -> Vec<u16> {
    values.iter().flat_map(|v| encode_f32(*v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_word_swapped_230_volts() {
        assert_eq!(decode_f32(&[0x0000, 0x4366]), Ok(230.0));
        assert_eq!(decode_f32(&[0, 17254]), Ok(230.0));
    }

    #[test]
    fn decodes_known_meter_registers() {
        // 0x436E_C22D, a raw voltage reading captured from the meter
        let value = decode_f32(&[49709, 17262]).unwrap();
        assert_eq!(value.to_bits(), 0x436E_C22D);
        assert!((value - 238.7585).abs() < 1e-3);
    }

    #[test]
    fn word_order_matters() {
        let swapped = decode_f32(&[17262, 49709]).unwrap();
        assert_ne!(swapped, decode_f32(&[49709, 17262]).unwrap());
        assert_eq!(swapped.to_bits(), 0xC22D_436E);
    }

    #[test]
    fn decode_rejects_wrong_lengths() {
        for registers in [&[][..], &[1][..], &[1, 2, 3][..]] {
            assert_eq!(
                decode_f32(registers),
                Err(DecodeError::InvalidRegisterCount {
                    count: registers.len()
                })
            );
        }
    }

    #[test]
    fn encode_is_inverse_of_decode() {
        for value in [0.0f32, -1.5, 50.0, 230.0, 238.7585, f32::MAX, f32::MIN_POSITIVE] {
            assert_eq!(decode_f32(&encode_f32(value)).unwrap().to_bits(), value.to_bits());
        }
        assert_eq!(encode_f32(230.0), [0x0000, 0x4366]);
    }

    #[test]
    fn decompose_yields_one_reading_per_register_pair() {
        let block = encode_block(&[230.0, 231.5, 229.25, 50.0, 49.9, 50.1]);
        assert_eq!(block.len(), 12);

        let readings = decompose_block(&block).unwrap();
        assert_eq!(readings, vec![230.0, 231.5, 229.25, 50.0, 49.9, 50.1]);
    }

    #[test]
    fn decompose_keeps_address_order() {
        let readings = decompose_block(&[0, 17254, 0, 16968]).unwrap();
        assert_eq!(readings, vec![230.0, 50.0]);
    }

    #[test]
    fn block_must_end_at_the_last_register() {
        assert!(block_fits(0, u16::MAX));
        assert!(block_fits(65534, 2));
        assert!(!block_fits(65534, 4));
        assert!(!block_fits(u16::MAX, 2));
    }

    #[test]
    fn decompose_rejects_odd_and_empty_blocks() {
        assert_eq!(
            decompose_block(&[]),
            Err(DecodeError::InvalidBlockLength { len: 0 })
        );
        assert_eq!(
            decompose_block(&[1, 2, 3]),
            Err(DecodeError::InvalidBlockLength { len: 3 })
        );
    }
}
