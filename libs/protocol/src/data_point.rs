//! Labeled observations
//!
//! A data point is a 32-byte feed identifier followed by its value. Fixed-size
//! points share one width per package, so the reader learns it from the
//! package trailer. Dynamic points carry their own 8-byte length after the
//! value so a backward reader can skip them without knowing their type.

use crate::codec::{self, CodecError, Rounding};
use crate::constants::{
    DATA_FEED_ID_BS, DEFAULT_NUM_VALUE_BS, DEFAULT_NUM_VALUE_DECIMALS, DYNAMIC_VALUE_LENGTH_BS,
};
use std::fmt;
use thiserror::Error;

/// Data point construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataPointError {
    /// Numeric encoding failed (overflow, malformed or inexact number)
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Declared width does not match the encoded value
    #[error("Invalid byte width: declared {declared}, value is {actual} bytes")]
    InvalidByteWidth {
        /// Width requested by the caller
        declared: usize,
        /// Actual length of the value
        actual: usize,
    },

    /// Fixed-size points need a non-zero width; zero marks dynamic packages
    #[error("Fixed-size data points cannot have a zero byte width")]
    ZeroByteWidth,
}

/// Result type for data point operations
pub type Result<T> = std::result::Result<T, DataPointError>;

/// On-wire identifier of a data feed
///
/// Labels shorter than 32 bytes are right-padded with zeros; anything longer
/// is replaced by its keccak-256 hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataFeedId([u8; DATA_FEED_ID_BS]);

impl DataFeedId {
    /// Size of the identifier in bytes
    pub const SIZE: usize = DATA_FEED_ID_BS;

    /// Build an identifier from a human-readable label
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let bytes = label.as_bytes();
        if bytes.len() < Self::SIZE {
            let mut padded = [0u8; Self::SIZE];
            padded[..bytes.len()].copy_from_slice(bytes);
            Self(padded)
        } else {
            Self(codec::keccak256(bytes))
        }
    }

    /// Build an identifier from an opaque byte identifier (always hashed)
    #[must_use]
    pub fn from_identifier_bytes(identifier: &[u8]) -> Self {
        Self(codec::keccak256(identifier))
    }

    /// Wrap 32 raw identifier bytes as read from the wire
    #[must_use]
    pub const fn from_bytes(bytes: [u8; DATA_FEED_ID_BS]) -> Self {
        Self(bytes)
    }

    /// Raw identifier bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; DATA_FEED_ID_BS] {
        &self.0
    }

    /// Recover the padded label, if this identifier is one
    ///
    /// Returns `None` for hashed identifiers and anything that is not
    /// printable UTF-8 followed by zero padding.
    #[must_use]
    pub fn to_label(&self) -> Option<String> {
        let end = self.0.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        let label = std::str::from_utf8(&self.0[..end]).ok()?;
        if label.is_empty() || label.chars().any(char::is_control) {
            return None;
        }
        Some(label.to_string())
    }
}

impl From<&str> for DataFeedId {
    fn from(label: &str) -> Self {
        Self::from_label(label)
    }
}

impl From<[u8; DATA_FEED_ID_BS]> for DataFeedId {
    fn from(bytes: [u8; DATA_FEED_ID_BS]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for DataFeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_label() {
            Some(label) => f.write_str(&label),
            None => write!(f, "0x{}", hex::encode(self.0)),
        }
    }
}

impl fmt::Debug for DataFeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataFeedId({self})")
    }
}

/// Wire variant of a data point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataPointKind {
    /// Value width is declared once per package
    Fixed,
    /// Value is followed by its own 8-byte length
    Dynamic,
}

/// One labeled observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPoint {
    data_feed_id: DataFeedId,
    value: Vec<u8>,
    kind: DataPointKind,
}

impl DataPoint {
    /// Numeric point with the default precision (8 decimals) and width (32 bytes)
    pub fn numeric(data_feed_id: impl Into<DataFeedId>, value: f64) -> Result<Self> {
        let decimal = codec::f64_to_decimal(value)?;
        Self::numeric_with_precision(
            data_feed_id,
            &decimal,
            DEFAULT_NUM_VALUE_DECIMALS,
            DEFAULT_NUM_VALUE_BS,
            Rounding::Nearest,
        )
    }

    /// Numeric point from a decimal string with explicit precision and width
    pub fn numeric_with_precision(
        data_feed_id: impl Into<DataFeedId>,
        value: &str,
        decimals: u8,
        byte_width: usize,
        rounding: Rounding,
    ) -> Result<Self> {
        if byte_width == 0 {
            return Err(DataPointError::ZeroByteWidth);
        }
        let encoded = codec::encode_number(value, decimals, byte_width, rounding)?;
        Ok(Self {
            data_feed_id: data_feed_id.into(),
            value: encoded,
            kind: DataPointKind::Fixed,
        })
    }

    /// Fixed-size point from raw value bytes of a declared width
    pub fn fixed(
        data_feed_id: impl Into<DataFeedId>,
        value: Vec<u8>,
        byte_width: usize,
    ) -> Result<Self> {
        if byte_width == 0 {
            return Err(DataPointError::ZeroByteWidth);
        }
        if value.len() != byte_width {
            return Err(DataPointError::InvalidByteWidth {
                declared: byte_width,
                actual: value.len(),
            });
        }
        Ok(Self {
            data_feed_id: data_feed_id.into(),
            value,
            kind: DataPointKind::Fixed,
        })
    }

    /// Dynamic point carrying the UTF-8 bytes of a string
    #[must_use]
    pub fn string(data_feed_id: impl Into<DataFeedId>, value: &str) -> Self {
        Self::dynamic(data_feed_id, value.as_bytes().to_vec())
    }

    /// Dynamic point carrying arbitrary bytes
    #[must_use]
    pub fn dynamic(data_feed_id: impl Into<DataFeedId>, value: Vec<u8>) -> Self {
        Self {
            data_feed_id: data_feed_id.into(),
            value,
            kind: DataPointKind::Dynamic,
        }
    }

    /// Rebuild a point exactly as it was read from the wire
    pub(crate) fn from_wire(data_feed_id: DataFeedId, value: Vec<u8>, kind: DataPointKind) -> Self {
        Self {
            data_feed_id,
            value,
            kind,
        }
    }

    /// Feed identifier
    #[must_use]
    pub fn data_feed_id(&self) -> &DataFeedId {
        &self.data_feed_id
    }

    /// Raw value bytes
    #[must_use]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Wire variant
    #[must_use]
    pub fn kind(&self) -> DataPointKind {
        self.kind
    }

    /// Length of the value in bytes
    #[must_use]
    pub fn value_byte_size(&self) -> usize {
        self.value.len()
    }

    /// Length of the serialized point in bytes
    #[must_use]
    pub fn serialized_len(&self) -> usize {
        let suffix = match self.kind {
            DataPointKind::Fixed => 0,
            DataPointKind::Dynamic => DYNAMIC_VALUE_LENGTH_BS,
        };
        DATA_FEED_ID_BS + self.value.len() + suffix
    }

    /// Serialize to `feed_id ‖ value` (plus the length suffix for dynamic points)
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.serialized_len());
        self.write_to(&mut buf);
        buf
    }

    /// Append the serialized point to `buf`
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.data_feed_id.as_bytes());
        buf.extend_from_slice(&self.value);
        if self.kind == DataPointKind::Dynamic {
            codec::put_u64(buf, self.value.len() as u64, DYNAMIC_VALUE_LENGTH_BS);
        }
    }

    /// Interpret the value as a fixed-point number with `decimals` precision
    #[must_use]
    pub fn numeric_value(&self, decimals: u8) -> String {
        codec::decode_number(&self.value, decimals)
    }

    /// Interpret the value as UTF-8
    #[must_use]
    pub fn string_value(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_label_is_zero_padded() {
        let id = DataFeedId::from_label("ETH");
        assert_eq!(&id.as_bytes()[..3], b"ETH");
        assert!(id.as_bytes()[3..].iter().all(|b| *b == 0));
        assert_eq!(id.to_label().as_deref(), Some("ETH"));
        assert_eq!(id.to_string(), "ETH");
    }

    #[test]
    fn test_label_of_31_bytes_is_padded() {
        let label = "A".repeat(31);
        let id = DataFeedId::from_label(&label);
        assert_eq!(&id.as_bytes()[..31], label.as_bytes());
        assert_eq!(id.as_bytes()[31], 0);
    }

    #[test]
    fn test_long_label_is_hashed() {
        let label = "X".repeat(32);
        let id = DataFeedId::from_label(&label);
        assert_eq!(id.as_bytes(), &codec::keccak256(label.as_bytes()));
        assert_ne!(&id.as_bytes()[..], label.as_bytes());
    }

    #[test]
    fn test_identifier_bytes_are_hashed() {
        let id = DataFeedId::from_identifier_bytes(b"ETH");
        assert_eq!(id.as_bytes(), &codec::keccak256(b"ETH"));
        assert_ne!(id, DataFeedId::from_label("ETH"));
    }

    #[test]
    fn test_non_label_displays_as_hex() {
        let id = DataFeedId::from_bytes([0xff; 32]);
        assert_eq!(id.to_label(), None);
        assert_eq!(id.to_string(), format!("0x{}", "ff".repeat(32)));
        assert_eq!(DataFeedId::from_bytes([0; 32]).to_label(), None);
    }

    #[test]
    fn test_numeric_data_point_serialization() {
        let point = DataPoint::numeric("ETH", 2000.0).unwrap();
        assert_eq!(point.kind(), DataPointKind::Fixed);
        assert_eq!(point.value_byte_size(), 32);

        let bytes = point.serialize();
        assert_eq!(bytes.len(), 64);
        assert_eq!(point.serialized_len(), 64);
        assert_eq!(
            hex::encode(&bytes),
            format!(
                "455448{}{}2e90edd000",
                "00".repeat(29),
                "00".repeat(27)
            )
        );
        assert_eq!(point.numeric_value(8), "2000");
    }

    #[test]
    fn test_numeric_with_precision_custom_width() {
        let point =
            DataPoint::numeric_with_precision("BTC", "42000", 8, 8, Rounding::Exact).unwrap();
        assert_eq!(point.value(), &4_200_000_000_000u64.to_be_bytes());
    }

    #[test]
    fn test_numeric_overflow() {
        let result = DataPoint::numeric_with_precision("BTC", "42000", 8, 4, Rounding::Nearest);
        assert!(matches!(
            result,
            Err(DataPointError::Codec(CodecError::Overflow { .. }))
        ));
    }

    #[test]
    fn test_numeric_rejects_negative() {
        assert!(matches!(
            DataPoint::numeric("ETH", -1.0),
            Err(DataPointError::Codec(CodecError::InvalidNumber(_)))
        ));
    }

    #[test]
    fn test_fixed_width_mismatch() {
        let result = DataPoint::fixed("RAW", vec![1, 2, 3], 4);
        assert_eq!(
            result,
            Err(DataPointError::InvalidByteWidth {
                declared: 4,
                actual: 3
            })
        );
        assert_eq!(
            DataPoint::fixed("RAW", vec![], 0),
            Err(DataPointError::ZeroByteWidth)
        );
    }

    #[test]
    fn test_string_data_point_appends_length() {
        let point = DataPoint::string("NAME", "hello");
        assert_eq!(point.kind(), DataPointKind::Dynamic);
        assert_eq!(point.value_byte_size(), 5);

        let bytes = point.serialize();
        assert_eq!(bytes.len(), 32 + 5 + 8);
        assert_eq!(&bytes[32..37], b"hello");
        assert_eq!(&bytes[37..], &5u64.to_be_bytes());
        assert_eq!(point.string_value(), Some("hello"));
    }

    #[test]
    fn test_empty_dynamic_value() {
        let point = DataPoint::dynamic("EMPTY", Vec::new());
        let bytes = point.serialize();
        assert_eq!(bytes.len(), 40);
        assert_eq!(&bytes[32..], &[0u8; 8]);
    }
}
