//! Backward parser for RedStone payloads
//!
//! A payload is located by its trailing marker and read from the end of the
//! buffer towards the start. Every variable-length section is preceded, in
//! reading order, by its own length, so nothing depends on where the payload
//! starts inside the larger blob. Reading proceeds in strict order:
//!
//! 1. marker
//! 2. unsigned metadata size, then the metadata itself
//! 3. data package count
//! 4. per package: signature, point count, default point size, timestamp,
//!    then the points (value, then feed id)
//! 5. whatever is left is the caller's prefix, returned untouched
//!
//! Any failure aborts the whole parse.

use crate::codec::{self, CodecError};
use crate::constants::{
    DATA_FEED_ID_BS, DATA_PACKAGES_COUNT_BS, DATA_POINT_VALUE_BYTE_SIZE_BS, DATA_POINTS_COUNT_BS,
    DYNAMIC_VALUE_LENGTH_BS, REDSTONE_MARKER, REDSTONE_MARKER_BS, REDSTONE_MARKER_HEX,
    SIGNATURE_BS, TIMESTAMP_BS, UNSIGNED_METADATA_BYTE_SIZE_BS,
};
use crate::data_package::{DataPackage, DataPackageError};
use crate::data_point::{DataFeedId, DataPoint, DataPointKind};
use crate::payload::RedstonePayload;
use crate::signed_data_package::SignedDataPackage;
use crate::signer::Signature;
use log::debug;
use thiserror::Error;

/// Smallest possible data point: feed id plus the dynamic length suffix
const MIN_DATA_POINT_BS: usize = DATA_FEED_ID_BS + DYNAMIC_VALUE_LENGTH_BS;

/// Smallest possible signed package: one minimal point plus the trailer
const MIN_SIGNED_PACKAGE_BS: usize = MIN_DATA_POINT_BS
    + TIMESTAMP_BS
    + DATA_POINT_VALUE_BYTE_SIZE_BS
    + DATA_POINTS_COUNT_BS
    + SIGNATURE_BS;

/// Payload parsing errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Buffer does not end with the RedStone marker
    #[error("Invalid RedStone marker: expected 0x{REDSTONE_MARKER_HEX}, found 0x{found}")]
    InvalidMarker {
        /// Hex of the bytes found where the marker should be
        found: String,
    },

    /// A backward read would run past the start of the buffer
    #[error("Truncated buffer reading {field}: need {needed} bytes, {available} available")]
    TruncatedBuffer {
        /// Field being read
        field: &'static str,
        /// Bytes required
        needed: usize,
        /// Bytes left before the cursor
        available: usize,
    },

    /// A declared length or count cannot be represented on this platform
    #[error("{field} of {value} cannot be represented")]
    LengthOverflow {
        /// Field being read
        field: &'static str,
        /// Declared value
        value: u64,
    },

    /// An integer field has more significant bytes than a `u64` holds
    #[error("{field} needs {needed} significant bytes, at most 8 fit")]
    IntegerTooWide {
        /// Field being read
        field: &'static str,
        /// Significant bytes found on the wire
        needed: usize,
    },

    /// Reconstructed package is invalid (empty, inconsistent widths)
    #[error("Invalid data package: {0}")]
    DataPackage(#[from] DataPackageError),

    /// Bytes found before a standalone signed package
    #[error("Unexpected {0} bytes before the signed data package")]
    UnexpectedRemainder(usize),

    /// Hex decoding error
    #[error("Invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// Result type for parsing operations
pub type Result<T> = std::result::Result<T, ParseError>;

pub(crate) fn decode_hex(s: &str) -> Result<Vec<u8>> {
    let s = s.trim();
    let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    Ok(hex::decode(s)?)
}

/// Bounds-checked window that shrinks from the end of a buffer
#[derive(Debug, Clone)]
pub struct ReverseCursor<'a> {
    buf: &'a [u8],
    end: usize,
}

impl<'a> ReverseCursor<'a> {
    /// Start at the end of `buf`
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            end: buf.len(),
        }
    }

    /// Bytes not yet consumed
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.end
    }

    /// Bytes consumed so far, counted from the end of the buffer
    #[must_use]
    pub fn negative_offset(&self) -> usize {
        self.buf.len() - self.end
    }

    /// Unconsumed prefix of the buffer
    #[must_use]
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[..self.end]
    }

    /// Consume the `len` bytes immediately before the cursor
    pub fn take(&mut self, len: usize, field: &'static str) -> Result<&'a [u8]> {
        if len > self.end {
            return Err(ParseError::TruncatedBuffer {
                field,
                needed: len,
                available: self.end,
            });
        }
        let start = self.end - len;
        let slice = &self.buf[start..self.end];
        self.end = start;
        Ok(slice)
    }

    /// Consume exactly `N` bytes into an array
    pub fn take_array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, field)?);
        Ok(out)
    }

    /// Consume a big-endian integer of `width` bytes
    ///
    /// Wider fields are accepted when their leading bytes are zero.
    pub fn take_u64(&mut self, width: usize, field: &'static str) -> Result<u64> {
        let bytes = self.take(width, field)?;
        codec::decode_u64(bytes).map_err(|e| {
            let needed = match e {
                CodecError::Overflow { needed, .. } => needed,
                _ => width,
            };
            ParseError::IntegerTooWide { field, needed }
        })
    }

    /// Consume a big-endian length or count of `width` bytes
    pub fn take_usize(&mut self, width: usize, field: &'static str) -> Result<usize> {
        let value = self.take_u64(width, field)?;
        usize::try_from(value).map_err(|_| ParseError::LengthOverflow { field, value })
    }
}

/// Step 1: check the trailing marker
pub fn extract_marker(cursor: &mut ReverseCursor<'_>) -> Result<()> {
    let marker = cursor.take(REDSTONE_MARKER_BS, "marker")?;
    if marker != REDSTONE_MARKER {
        return Err(ParseError::InvalidMarker {
            found: hex::encode(marker),
        });
    }
    debug!("RedStone marker found");
    Ok(())
}

/// Step 2: read the metadata size, then the metadata before it
pub fn extract_unsigned_metadata<'a>(cursor: &mut ReverseCursor<'a>) -> Result<&'a [u8]> {
    let size = cursor.take_usize(UNSIGNED_METADATA_BYTE_SIZE_BS, "unsigned metadata size")?;
    let metadata = cursor.take(size, "unsigned metadata")?;
    debug!("Unsigned metadata: {size} bytes");
    Ok(metadata)
}

/// Step 3: read the number of signed data packages
pub fn extract_package_count(cursor: &mut ReverseCursor<'_>) -> Result<usize> {
    let count = cursor.take_usize(DATA_PACKAGES_COUNT_BS, "data packages count")?;
    debug!("Data packages count: {count}");
    Ok(count)
}

/// Step 4a: read one data point ending at the cursor
///
/// `default_byte_size` is the package's declared value width; 0 means every
/// point carries its own length.
pub fn extract_data_point(
    cursor: &mut ReverseCursor<'_>,
    default_byte_size: usize,
) -> Result<DataPoint> {
    let (value, kind) = if default_byte_size == 0 {
        let len = cursor.take_usize(DYNAMIC_VALUE_LENGTH_BS, "dynamic value length")?;
        (cursor.take(len, "dynamic value")?, DataPointKind::Dynamic)
    } else {
        (
            cursor.take(default_byte_size, "data point value")?,
            DataPointKind::Fixed,
        )
    };
    let feed_id = cursor.take_array::<DATA_FEED_ID_BS>("data feed id")?;
    Ok(DataPoint::from_wire(
        DataFeedId::from_bytes(feed_id),
        value.to_vec(),
        kind,
    ))
}

/// Step 4: read one signed data package ending at the cursor
pub fn extract_signed_data_package(cursor: &mut ReverseCursor<'_>) -> Result<SignedDataPackage> {
    let signature = Signature::from(cursor.take_array::<SIGNATURE_BS>("signature")?);
    let count = cursor.take_usize(DATA_POINTS_COUNT_BS, "data points count")?;
    let default_byte_size =
        cursor.take_usize(DATA_POINT_VALUE_BYTE_SIZE_BS, "default data point byte size")?;
    let timestamp = cursor.take_u64(TIMESTAMP_BS, "timestamp")?;

    // Reject impossible counts before allocating for them
    let min_point_size = if default_byte_size == 0 {
        MIN_DATA_POINT_BS
    } else {
        DATA_FEED_ID_BS.saturating_add(default_byte_size)
    };
    let needed = count.saturating_mul(min_point_size);
    if needed > cursor.remaining() {
        return Err(ParseError::TruncatedBuffer {
            field: "data points",
            needed,
            available: cursor.remaining(),
        });
    }

    let mut data_points = Vec::with_capacity(count);
    for _ in 0..count {
        data_points.push(extract_data_point(cursor, default_byte_size)?);
    }
    data_points.reverse();

    debug!("Extracted data package @{timestamp} with {count} data points");
    let package = DataPackage::new(data_points, timestamp)?;
    Ok(SignedDataPackage::new(package, signature))
}

/// Result of parsing a payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPayload {
    /// Signed packages in their original order
    pub signed_data_packages: Vec<SignedDataPackage>,
    /// Opaque metadata carried after the packages
    pub unsigned_metadata: Vec<u8>,
    /// Bytes before the payload, not interpreted
    pub remainder: Vec<u8>,
}

impl ParsedPayload {
    /// Drop the prefix and keep the payload itself
    #[must_use]
    pub fn into_payload(self) -> RedstonePayload {
        RedstonePayload::from_parts(self.signed_data_packages, self.unsigned_metadata)
    }
}

/// Parser over a buffer whose tail is a RedStone payload
#[derive(Debug, Clone, Copy)]
pub struct RedstonePayloadParser<'a> {
    bytes: &'a [u8],
}

impl<'a> RedstonePayloadParser<'a> {
    /// Wrap a buffer; nothing is read until [`Self::parse`]
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Walk the buffer backward and rebuild the payload
    ///
    /// A buffer shorter than the 9-byte marker fails with
    /// [`ParseError::TruncatedBuffer`] on field `"marker"`. A buffer long
    /// enough whose tail is not the marker fails with
    /// [`ParseError::InvalidMarker`], meaning it carries no payload at all.
    /// Every later failure means a payload was found but is malformed.
    pub fn parse(&self) -> Result<ParsedPayload> {
        let mut cursor = ReverseCursor::new(self.bytes);

        extract_marker(&mut cursor)?;
        let unsigned_metadata = extract_unsigned_metadata(&mut cursor)?.to_vec();
        let count = extract_package_count(&mut cursor)?;

        let mut signed_data_packages =
            Vec::with_capacity(count.min(cursor.remaining() / MIN_SIGNED_PACKAGE_BS));
        for index in 0..count {
            debug!(
                "Extracting data package {} of {count} at offset -{}",
                count - index,
                cursor.negative_offset()
            );
            signed_data_packages.push(extract_signed_data_package(&mut cursor)?);
        }
        signed_data_packages.reverse();

        Ok(ParsedPayload {
            signed_data_packages,
            unsigned_metadata,
            remainder: cursor.rest().to_vec(),
        })
    }
}

/// Parse a hex-encoded buffer, with or without `0x`
pub fn parse_hex(s: &str) -> Result<ParsedPayload> {
    let bytes = decode_hex(s)?;
    RedstonePayloadParser::new(&bytes).parse()
}

/// Whether `bytes` ends with the RedStone marker
#[must_use]
pub fn has_redstone_marker(bytes: &[u8]) -> bool {
    bytes.ends_with(&REDSTONE_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::REDSTONE_MARKER;
    use crate::test_utils::{FIXTURE_PACKAGE_HEX, eth_btc_data_points, sample_payload};

    #[test]
    fn test_cursor_reads_backward() {
        let buf = [1u8, 2, 3, 4, 5];
        let mut cursor = ReverseCursor::new(&buf);
        assert_eq!(cursor.take(2, "tail").unwrap(), &[4, 5]);
        assert_eq!(cursor.negative_offset(), 2);
        assert_eq!(cursor.take_u64(1, "byte").unwrap(), 3);
        assert_eq!(cursor.remaining(), 2);
        assert_eq!(cursor.rest(), &[1, 2]);
    }

    #[test]
    fn test_cursor_underflow_is_typed() {
        let buf = [1u8, 2];
        let mut cursor = ReverseCursor::new(&buf);
        assert_eq!(
            cursor.take(3, "field"),
            Err(ParseError::TruncatedBuffer {
                field: "field",
                needed: 3,
                available: 2
            })
        );
        assert_eq!(cursor.remaining(), 2);
    }

    #[test]
    fn test_wide_integer_reports_significant_bytes() {
        let wide = [0x01, 0, 0, 0, 0, 0, 0, 0, 0, 0x02];
        assert_eq!(
            ReverseCursor::new(&wide).take_u64(10, "wide field"),
            Err(ParseError::IntegerTooWide {
                field: "wide field",
                needed: 10
            })
        );

        let padded = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0x05];
        assert_eq!(
            ReverseCursor::new(&padded).take_u64(10, "padded field"),
            Ok(5)
        );
    }

    #[test]
    fn test_short_and_wrong_marker_are_distinct() {
        let short = [0u8; REDSTONE_MARKER_BS - 1];
        assert_eq!(
            RedstonePayloadParser::new(&short).parse(),
            Err(ParseError::TruncatedBuffer {
                field: "marker",
                needed: REDSTONE_MARKER_BS,
                available: REDSTONE_MARKER_BS - 1
            })
        );

        let unmarked = [0u8; REDSTONE_MARKER_BS];
        assert!(matches!(
            RedstonePayloadParser::new(&unmarked).parse(),
            Err(ParseError::InvalidMarker { .. })
        ));
    }

    #[test]
    fn test_extract_marker() {
        let mut ok = vec![0xaa];
        ok.extend_from_slice(&REDSTONE_MARKER);
        assert!(extract_marker(&mut ReverseCursor::new(&ok)).is_ok());

        let bad = [0u8; 9];
        assert!(matches!(
            extract_marker(&mut ReverseCursor::new(&bad)),
            Err(ParseError::InvalidMarker { .. })
        ));
        assert!(matches!(
            extract_marker(&mut ReverseCursor::new(&REDSTONE_MARKER[1..])),
            Err(ParseError::TruncatedBuffer { field: "marker", .. })
        ));
    }

    #[test]
    fn test_extract_unsigned_metadata() {
        let buf = [0xee, b'h', b'i', 0x00, 0x00, 0x02];
        let mut cursor = ReverseCursor::new(&buf);
        assert_eq!(extract_unsigned_metadata(&mut cursor).unwrap(), b"hi");
        assert_eq!(cursor.rest(), &[0xee]);
    }

    #[test]
    fn test_extract_unsigned_metadata_oversized() {
        let buf = [b'h', b'i', 0x00, 0x00, 0x05];
        assert!(matches!(
            extract_unsigned_metadata(&mut ReverseCursor::new(&buf)),
            Err(ParseError::TruncatedBuffer {
                field: "unsigned metadata",
                needed: 5,
                available: 2
            })
        ));
    }

    #[test]
    fn test_extract_package_count() {
        let buf = [0x01, 0x02];
        assert_eq!(
            extract_package_count(&mut ReverseCursor::new(&buf)).unwrap(),
            0x0102
        );
    }

    #[test]
    fn test_extract_fixed_data_point() {
        let point = DataPoint::numeric("ETH", 2000.0).unwrap();
        let bytes = point.serialize();
        let mut cursor = ReverseCursor::new(&bytes);
        assert_eq!(extract_data_point(&mut cursor, 32).unwrap(), point);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn test_extract_dynamic_data_point() {
        let point = DataPoint::string("NAME", "redstone");
        let bytes = point.serialize();
        let mut cursor = ReverseCursor::new(&bytes);
        assert_eq!(extract_data_point(&mut cursor, 0).unwrap(), point);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn test_extract_unsigned_fixture_package() {
        let mut bytes = hex::decode(FIXTURE_PACKAGE_HEX).unwrap();
        bytes.extend_from_slice(&[0x11; 65]);
        let mut cursor = ReverseCursor::new(&bytes);
        let signed = extract_signed_data_package(&mut cursor).unwrap();
        assert_eq!(signed.data_package().data_points(), eth_btc_data_points());
        assert_eq!(signed.data_package().timestamp_milliseconds(), 1_654_353_400_000);
        assert_eq!(signed.signature().to_bytes(), [0x11; 65]);
    }

    #[test]
    fn test_huge_point_count_fails_without_allocating() {
        let mut bytes = vec![0u8; 6];
        bytes.extend_from_slice(&[0, 0, 0, 32]);
        bytes.extend_from_slice(&[0xff, 0xff, 0xff]);
        bytes.extend_from_slice(&[0u8; 65]);
        assert!(matches!(
            extract_signed_data_package(&mut ReverseCursor::new(&bytes)),
            Err(ParseError::TruncatedBuffer {
                field: "data points",
                ..
            })
        ));
    }

    #[test]
    fn test_zero_point_count_is_empty_package() {
        let mut bytes = vec![0u8; 6];
        bytes.extend_from_slice(&[0, 0, 0, 32]);
        bytes.extend_from_slice(&[0, 0, 0]);
        bytes.extend_from_slice(&[0u8; 65]);
        assert_eq!(
            extract_signed_data_package(&mut ReverseCursor::new(&bytes)),
            Err(ParseError::DataPackage(DataPackageError::EmptyPackage))
        );
    }

    #[test]
    fn test_huge_dynamic_length_is_truncation() {
        let mut bytes = vec![0u8; 32];
        bytes.extend_from_slice(&u64::MAX.to_be_bytes());
        assert!(matches!(
            extract_data_point(&mut ReverseCursor::new(&bytes), 0),
            Err(ParseError::TruncatedBuffer { .. } | ParseError::LengthOverflow { .. })
        ));
    }

    #[test]
    fn test_parse_sample_payload() {
        let payload = sample_payload();
        let parsed = RedstonePayloadParser::new(&payload.to_bytes()).parse().unwrap();
        assert_eq!(parsed.signed_data_packages, payload.signed_data_packages());
        assert_eq!(parsed.unsigned_metadata, payload.unsigned_metadata());
        assert!(parsed.remainder.is_empty());
    }

    #[test]
    fn test_parse_hex_with_prefix() {
        let payload = sample_payload();
        let parsed = parse_hex(&format!("0x{}", payload.to_hex())).unwrap();
        assert_eq!(parsed.into_payload(), payload);
    }

    #[test]
    fn test_parse_empty_buffer() {
        assert!(matches!(
            RedstonePayloadParser::new(&[]).parse(),
            Err(ParseError::TruncatedBuffer { field: "marker", .. })
        ));
    }

    #[test]
    fn test_has_redstone_marker() {
        let payload = sample_payload().to_bytes();
        assert!(has_redstone_marker(&payload));
        assert!(!has_redstone_marker(&payload[..payload.len() - 1]));
    }
}
