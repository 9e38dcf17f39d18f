//! 80-bit IEEE 754 extended precision numbers, as used by the COMM
//! chunk's sample rate field.
//!
//! Layout (big-endian): 1 sign bit, 15 exponent bits, 64 mantissa bits
//! with an explicit integer bit.

use crate::prelude::*;

const EXPONENT_BIAS: i32 = 16383;
const MANTISSA_BITS: i32 = 63;
const SENTINEL_EXPONENT: u16 = 0x7FFF;

/// Returned for any value whose exponent is all ones. Sign and mantissa
/// are ignored, so infinities and NaNs all decode to this.
pub const EXTENDED_MAX: f64 = 1.79769313486231e+308;

pub fn parse_ieee_extended(bytes: &[u8; 10]) -> f64 {
    let sign = bytes[0] & 0x80 != 0;
    let exponent = u16::from_be_bytes([bytes[0], bytes[1]]) & 0x7FFF;
    let mut mantissa = [0u8; 8];
    mantissa.copy_from_slice(&bytes[2..10]);
    let mantissa = u64::from_be_bytes(mantissa);

    if exponent == 0 && mantissa == 0 {
        return 0.0;
    }
    if exponent == SENTINEL_EXPONENT {
        return EXTENDED_MAX;
    }

    let value = mantissa as f64 * 2.0_f64.powi(exponent as i32 - EXPONENT_BIAS - MANTISSA_BITS);
    if sign { -value } else { value }
}

pub fn build_ieee_extended(value: f64) -> [u8; 10] {
    let sign = value.is_sign_negative() && value != 0.0;
    let (fraction, exponent) = frexp(value.abs());

    let (exponent, mantissa) = if exponent > 16384 || !(fraction < 1.0) {
        (SENTINEL_EXPONENT, 0u64)
    } else {
        // fraction is in [0.5, 1) so the product fills all 64 bits
        (
            (exponent + 16382) as u16,
            (fraction * 18_446_744_073_709_551_616.0) as u64,
        )
    };

    let mut buffer = [0u8; 10];
    let head = if sign { exponent | 0x8000 } else { exponent };
    buffer[0..2].copy_from_slice(&head.to_be_bytes());
    buffer[2..10].copy_from_slice(&mantissa.to_be_bytes());
    buffer
}

pub fn read_ieee_extended<T: Read>(reader: &mut T) -> std::io::Result<f64> {
    let mut extended = [0u8; 10];
    reader.read_exact(&mut extended)?;
    Ok(parse_ieee_extended(&extended))
}

pub fn write_ieee_extended<W: Write>(writer: &mut W, value: f64) -> std::io::Result<()> {
    writer.write_all(&build_ieee_extended(value))
}

/// Splits `value` into a fraction in [0.5, 1) and a power of two.
/// Zero yields (0.0, 0); infinities and NaN come back unchanged with
/// exponent 0.
fn frexp(value: f64) -> (f64, i32) {
    if value == 0.0 || !value.is_finite() {
        return (value, 0);
    }

    let bits = value.to_bits();
    let raw_exponent = ((bits >> 52) & 0x7FF) as i32;
    if raw_exponent == 0 {
        // subnormal, scale into the normal range first
        let (fraction, exponent) = frexp(value * 2.0_f64.powi(54));
        return (fraction, exponent - 54);
    }

    let fraction = f64::from_bits((bits & !(0x7FF << 52)) | (1022 << 52));
    (fraction, raw_exponent - 1022)
}
