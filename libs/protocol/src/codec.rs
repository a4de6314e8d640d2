//! Fixed-width big-endian codec
//!
//! Every integer in the protocol is unsigned, big-endian and zero-padded to
//! its declared width. Numeric observations are fixed-point: a decimal value
//! `x` with precision `d` is carried as the integer `round(x * 10^d)`.

use num_bigint::BigUint;
use sha3::{Digest, Keccak256};
use thiserror::Error;

/// Codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Value does not fit in the declared byte width
    #[error("Overflow: value needs {needed} bytes but the field is {byte_width} bytes wide")]
    Overflow {
        /// Significant bytes of the value
        needed: usize,
        /// Declared field width
        byte_width: usize,
    },

    /// Input is not a non-negative decimal number
    #[error("Invalid number: {0:?}")]
    InvalidNumber(String),

    /// Value carries more precision than the field allows
    #[error("Value {value} is not exactly representable with {decimals} decimals")]
    InexactValue {
        /// The rejected value
        value: String,
        /// Requested decimal precision
        decimals: u8,
    },
}

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;

/// How to treat digits beyond the requested decimal precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rounding {
    /// Round half-up to the nearest representable value
    #[default]
    Nearest,
    /// Reject values that would lose precision
    Exact,
}

/// Keccak-256 digest
#[must_use]
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Encode an arbitrary-size unsigned integer into exactly `byte_width` bytes
pub fn encode_uint(value: &BigUint, byte_width: usize) -> Result<Vec<u8>> {
    let significant = if value.bits() == 0 {
        Vec::new()
    } else {
        value.to_bytes_be()
    };

    if significant.len() > byte_width {
        return Err(CodecError::Overflow {
            needed: significant.len(),
            byte_width,
        });
    }

    let mut out = vec![0u8; byte_width];
    out[byte_width - significant.len()..].copy_from_slice(&significant);
    Ok(out)
}

/// Decode a big-endian unsigned integer of any width
#[must_use]
pub fn decode_uint(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_be(bytes)
}

/// Encode a `u64` into exactly `byte_width` bytes
pub fn encode_u64(value: u64, byte_width: usize) -> Result<Vec<u8>> {
    let needed = 8 - (value.leading_zeros() as usize / 8);
    if needed > byte_width {
        return Err(CodecError::Overflow { needed, byte_width });
    }

    let full = value.to_be_bytes();
    let mut out = vec![0u8; byte_width];
    if byte_width >= full.len() {
        out[byte_width - full.len()..].copy_from_slice(&full);
    } else {
        out.copy_from_slice(&full[full.len() - byte_width..]);
    }
    Ok(out)
}

/// Append the low `byte_width` bytes of `value`, big-endian
///
/// Callers validate the range first; bytes above `byte_width` are dropped.
pub(crate) fn put_u64(buf: &mut Vec<u8>, value: u64, byte_width: usize) {
    debug_assert!(byte_width <= 8 && (byte_width == 8 || value >> (8 * byte_width) == 0));
    buf.extend_from_slice(&value.to_be_bytes()[8 - byte_width..]);
}

/// Decode a big-endian field into a `u64`
///
/// Leading zero bytes are ignored, so any width is accepted as long as the
/// value itself fits in 8 bytes.
pub fn decode_u64(bytes: &[u8]) -> Result<u64> {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    let significant = &bytes[start..];
    if significant.len() > 8 {
        return Err(CodecError::Overflow {
            needed: significant.len(),
            byte_width: 8,
        });
    }
    Ok(significant
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

/// Scale a decimal string by `10^decimals`
///
/// Accepts `123`, `123.45` and `.5`. Signs, exponents and separators are
/// rejected.
pub fn scale_decimal(value: &str, decimals: u8, rounding: Rounding) -> Result<BigUint> {
    let trimmed = value.trim();
    let (int_part, frac_part) = trimmed.split_once('.').unwrap_or((trimmed, ""));

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty()) || !all_digits(int_part) || !all_digits(frac_part)
    {
        return Err(CodecError::InvalidNumber(value.to_string()));
    }

    let precision = usize::from(decimals);
    let (kept, dropped) = if frac_part.len() > precision {
        frac_part.split_at(precision)
    } else {
        (frac_part, "")
    };

    let round_up = match rounding {
        Rounding::Nearest => dropped.as_bytes().first().is_some_and(|d| *d >= b'5'),
        Rounding::Exact => {
            if dropped.bytes().any(|d| d != b'0') {
                return Err(CodecError::InexactValue {
                    value: value.to_string(),
                    decimals,
                });
            }
            false
        }
    };

    let mut digits = String::with_capacity(int_part.len() + precision);
    digits.push_str(int_part);
    digits.push_str(kept);
    digits.extend(std::iter::repeat_n('0', precision - kept.len()));

    let mut scaled = if digits.is_empty() {
        BigUint::default()
    } else {
        BigUint::parse_bytes(digits.as_bytes(), 10)
            .ok_or_else(|| CodecError::InvalidNumber(value.to_string()))?
    };
    if round_up {
        scaled += 1u32;
    }
    Ok(scaled)
}

/// Render a finite, non-negative `f64` as a plain decimal string
///
/// Uses the shortest representation that round-trips, so `0.1` stays `0.1`
/// instead of its binary expansion.
pub fn f64_to_decimal(value: f64) -> Result<String> {
    if !value.is_finite() || value < 0.0 {
        return Err(CodecError::InvalidNumber(value.to_string()));
    }
    Ok(format!("{}", value.abs()))
}

/// Encode a decimal number as a fixed-point integer of `byte_width` bytes
pub fn encode_number(
    value: &str,
    decimals: u8,
    byte_width: usize,
    rounding: Rounding,
) -> Result<Vec<u8>> {
    let scaled = scale_decimal(value, decimals, rounding)?;
    encode_uint(&scaled, byte_width)
}

/// Decode a fixed-point integer back into a decimal string
///
/// Trailing fractional zeros are dropped: `200000000000` with 8 decimals
/// decodes to `2000`.
#[must_use]
pub fn decode_number(bytes: &[u8], decimals: u8) -> String {
    let raw = decode_uint(bytes);
    if decimals == 0 {
        return raw.to_string();
    }

    let scale = BigUint::from(10u32).pow(u32::from(decimals));
    let int = &raw / &scale;
    let frac = &raw % &scale;

    let frac_digits = format!("{:0>width$}", frac.to_string(), width = usize::from(decimals));
    let frac_digits = frac_digits.trim_end_matches('0');
    if frac_digits.is_empty() {
        int.to_string()
    } else {
        format!("{int}.{frac_digits}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_empty() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_encode_uint_pads_left() {
        let encoded = encode_uint(&BigUint::from(0x0102u32), 4).unwrap();
        assert_eq!(encoded, vec![0x00, 0x00, 0x01, 0x02]);
    }

    #[test]
    fn test_encode_uint_zero() {
        assert_eq!(encode_uint(&BigUint::default(), 3).unwrap(), vec![0, 0, 0]);
        assert_eq!(encode_uint(&BigUint::default(), 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_encode_uint_overflow() {
        let result = encode_uint(&BigUint::from(0x0001_0000u32), 2);
        assert_eq!(
            result,
            Err(CodecError::Overflow {
                needed: 3,
                byte_width: 2
            })
        );
    }

    #[test]
    fn test_decode_uint_ignores_width() {
        assert_eq!(decode_uint(&[0, 0, 0, 0x2a]), BigUint::from(42u32));
        assert_eq!(decode_uint(&[]), BigUint::default());
    }

    #[test]
    fn test_encode_u64_fits() {
        assert_eq!(
            encode_u64(1_654_353_400_000, 6).unwrap(),
            hex::decode("01812f2590c0").unwrap()
        );
        assert_eq!(encode_u64(32, 4).unwrap(), vec![0, 0, 0, 0x20]);
        assert_eq!(encode_u64(7, 10).unwrap(), vec![0, 0, 0, 0, 0, 0, 0, 0, 0, 7]);
    }

    #[test]
    fn test_encode_u64_overflow() {
        assert_eq!(
            encode_u64(0x1_0000, 2),
            Err(CodecError::Overflow {
                needed: 3,
                byte_width: 2
            })
        );
    }

    #[test]
    fn test_decode_u64() {
        assert_eq!(decode_u64(&[0x01, 0x81, 0x2f, 0x25, 0x90, 0xc0]).unwrap(), 1_654_353_400_000);
        assert_eq!(decode_u64(&[0u8; 32]).unwrap(), 0);

        let mut wide = [0u8; 16];
        wide[7] = 1;
        assert!(matches!(decode_u64(&wide), Err(CodecError::Overflow { .. })));
    }

    #[test]
    fn test_scale_decimal_integer() {
        let scaled = scale_decimal("2000", 8, Rounding::Nearest).unwrap();
        assert_eq!(scaled, BigUint::from(200_000_000_000u64));
    }

    #[test]
    fn test_scale_decimal_rounds_half_up() {
        assert_eq!(
            scale_decimal("1.234565", 5, Rounding::Nearest).unwrap(),
            BigUint::from(123_457u32)
        );
        assert_eq!(
            scale_decimal("1.234564", 5, Rounding::Nearest).unwrap(),
            BigUint::from(123_456u32)
        );
        assert_eq!(
            scale_decimal("0.5", 0, Rounding::Nearest).unwrap(),
            BigUint::from(1u32)
        );
    }

    #[test]
    fn test_scale_decimal_exact() {
        assert_eq!(
            scale_decimal("1.2300", 2, Rounding::Exact).unwrap(),
            BigUint::from(123u32)
        );
        assert!(matches!(
            scale_decimal("1.234", 2, Rounding::Exact),
            Err(CodecError::InexactValue { decimals: 2, .. })
        ));
    }

    #[test]
    fn test_scale_decimal_rejects_garbage() {
        for input in ["", ".", "-1", "1e5", "1,000", "abc", "1.2.3", "+4"] {
            assert!(
                matches!(
                    scale_decimal(input, 8, Rounding::Nearest),
                    Err(CodecError::InvalidNumber(_))
                ),
                "expected {input:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_f64_to_decimal() {
        assert_eq!(f64_to_decimal(2000.0).unwrap(), "2000");
        assert_eq!(f64_to_decimal(0.1).unwrap(), "0.1");
        assert_eq!(f64_to_decimal(-0.0).unwrap(), "0");
        assert!(f64_to_decimal(-1.0).is_err());
        assert!(f64_to_decimal(f64::NAN).is_err());
        assert!(f64_to_decimal(f64::INFINITY).is_err());
    }

    #[test]
    fn test_number_fixed_point_round_trip() {
        let encoded = encode_number("2000", 8, 32, Rounding::Nearest).unwrap();
        assert_eq!(encoded.len(), 32);
        assert_eq!(hex::encode(&encoded[27..]), "2e90edd000");
        assert_eq!(decode_number(&encoded, 8), "2000");
    }

    #[test]
    fn test_decode_number_fractional() {
        let encoded = encode_number("42.000123", 8, 32, Rounding::Nearest).unwrap();
        assert_eq!(decode_number(&encoded, 8), "42.000123");
        assert_eq!(decode_number(&[0x07], 0), "7");
        assert_eq!(decode_number(&[0x05], 2), "0.05");
    }

    #[test]
    fn test_encode_number_overflow() {
        let result = encode_number("1000", 8, 4, Rounding::Nearest);
        assert!(matches!(result, Err(CodecError::Overflow { byte_width: 4, .. })));
    }
}
