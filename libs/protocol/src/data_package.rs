//! Timestamped data packages
//!
//! A package is the unit a node signs. Its canonical byte form is
//!
//! ```text
//! data_point* ‖ timestamp(6) ‖ default_data_point_byte_size(4) ‖ data_points_count(3)
//! ```
//!
//! and the keccak-256 of exactly those bytes is the signed digest.

use crate::codec::{self, keccak256};
use crate::constants::{
    DATA_POINT_VALUE_BYTE_SIZE_BS, DATA_POINTS_COUNT_BS, MAX_DATA_POINTS_COUNT,
    MAX_TIMESTAMP_MILLISECONDS, TIMESTAMP_BS,
};
use crate::data_point::{DataPoint, DataPointKind};
use crate::signed_data_package::SignedDataPackage;
use crate::signer::{self, UniversalSigner};
use thiserror::Error;

/// Data package construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataPackageError {
    /// No data points were given
    #[error("Data package must contain at least one data point")]
    EmptyPackage,

    /// Data points do not share one byte width (dynamic points count as width 0)
    #[error(
        "Inconsistent byte width: data point {index} has width {actual}, package width is {expected}"
    )]
    InconsistentByteWidth {
        /// Position of the offending data point
        index: usize,
        /// Width established by the first data point
        expected: usize,
        /// Width of the offending data point
        actual: usize,
    },

    /// Timestamp does not fit in the 6-byte field
    #[error("Timestamp {0} ms does not fit in {TIMESTAMP_BS} bytes")]
    TimestampOutOfRange(u64),

    /// Data point count does not fit in the 3-byte field
    #[error("Too many data points: {count} exceeds {MAX_DATA_POINTS_COUNT}")]
    TooManyDataPoints {
        /// Number of data points given
        count: usize,
    },

    /// Fixed width does not fit in the 4-byte field
    #[error("Data point byte width {0} does not fit in {DATA_POINT_VALUE_BYTE_SIZE_BS} bytes")]
    ByteWidthTooLarge(usize),
}

/// Result type for data package operations
pub type Result<T> = std::result::Result<T, DataPackageError>;

/// Width a data point contributes to its package's default byte size
fn package_width(point: &DataPoint) -> usize {
    match point.kind() {
        DataPointKind::Fixed => point.value_byte_size(),
        DataPointKind::Dynamic => 0,
    }
}

/// Ordered, non-empty set of data points observed at one timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPackage {
    data_points: Vec<DataPoint>,
    timestamp_milliseconds: u64,
}

impl DataPackage {
    /// Validate and build a package
    ///
    /// Points keep their construction order; it is part of the signed bytes.
    pub fn new(data_points: Vec<DataPoint>, timestamp_milliseconds: u64) -> Result<Self> {
        let Some(first) = data_points.first() else {
            return Err(DataPackageError::EmptyPackage);
        };

        if data_points.len() > MAX_DATA_POINTS_COUNT {
            return Err(DataPackageError::TooManyDataPoints {
                count: data_points.len(),
            });
        }

        if timestamp_milliseconds > MAX_TIMESTAMP_MILLISECONDS {
            return Err(DataPackageError::TimestampOutOfRange(timestamp_milliseconds));
        }

        let expected_kind = first.kind();
        let expected = package_width(first);
        if u32::try_from(expected).is_err() {
            return Err(DataPackageError::ByteWidthTooLarge(expected));
        }

        for (index, point) in data_points.iter().enumerate().skip(1) {
            if point.kind() != expected_kind || package_width(point) != expected {
                return Err(DataPackageError::InconsistentByteWidth {
                    index,
                    expected,
                    actual: package_width(point),
                });
            }
        }

        Ok(Self {
            data_points,
            timestamp_milliseconds,
        })
    }

    /// Data points in construction order
    #[must_use]
    pub fn data_points(&self) -> &[DataPoint] {
        &self.data_points
    }

    /// Timestamp in milliseconds
    #[must_use]
    pub fn timestamp_milliseconds(&self) -> u64 {
        self.timestamp_milliseconds
    }

    /// Shared value width of fixed-size points, 0 for dynamic packages
    #[must_use]
    pub fn default_data_point_byte_size(&self) -> usize {
        self.data_points.first().map_or(0, package_width)
    }

    /// Length of the serialized package in bytes
    #[must_use]
    pub fn serialized_len(&self) -> usize {
        self.data_points
            .iter()
            .map(DataPoint::serialized_len)
            .sum::<usize>()
            + TIMESTAMP_BS
            + DATA_POINT_VALUE_BYTE_SIZE_BS
            + DATA_POINTS_COUNT_BS
    }

    /// Canonical byte form
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.serialized_len());
        self.write_to(&mut buf);
        buf
    }

    /// Append the canonical byte form to `buf`
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        for point in &self.data_points {
            point.write_to(buf);
        }
        codec::put_u64(buf, self.timestamp_milliseconds, TIMESTAMP_BS);
        codec::put_u64(
            buf,
            self.default_data_point_byte_size() as u64,
            DATA_POINT_VALUE_BYTE_SIZE_BS,
        );
        codec::put_u64(buf, self.data_points.len() as u64, DATA_POINTS_COUNT_BS);
    }

    /// Keccak-256 of the canonical byte form
    #[must_use]
    pub fn signable_hash(&self) -> [u8; 32] {
        keccak256(&self.serialize())
    }

    /// Sign this package, producing an immutable signed package
    pub fn sign(self, signer: &UniversalSigner) -> signer::Result<SignedDataPackage> {
        let signature = signer.sign_hash(&self.signable_hash())?;
        Ok(SignedDataPackage::new(self, signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Rounding;
    use crate::test_utils::{FIXTURE_PACKAGE_HEX, FIXTURE_TIMESTAMP, eth_btc_data_points};

    #[test]
    fn test_fixture_layout() {
        let package = DataPackage::new(eth_btc_data_points(), FIXTURE_TIMESTAMP).unwrap();
        let bytes = package.serialize();
        assert_eq!(bytes.len(), 141);
        assert_eq!(package.serialized_len(), 141);
        assert_eq!(hex::encode(&bytes), FIXTURE_PACKAGE_HEX);
    }

    #[test]
    fn test_fixture_trailer_fields() {
        let package = DataPackage::new(eth_btc_data_points(), FIXTURE_TIMESTAMP).unwrap();
        let bytes = package.serialize();
        let trailer = &bytes[bytes.len() - 13..];
        assert_eq!(hex::encode(trailer), "01812f2590c000000020000002");
        assert_eq!(package.default_data_point_byte_size(), 32);
    }

    #[test]
    fn test_signable_hash_is_keccak_of_bytes() {
        let package = DataPackage::new(eth_btc_data_points(), FIXTURE_TIMESTAMP).unwrap();
        assert_eq!(package.signable_hash(), keccak256(&package.serialize()));
    }

    #[test]
    fn test_order_is_part_of_hash() {
        let mut points = eth_btc_data_points();
        let forward = DataPackage::new(points.clone(), FIXTURE_TIMESTAMP).unwrap();
        points.reverse();
        let reversed = DataPackage::new(points, FIXTURE_TIMESTAMP).unwrap();
        assert_ne!(forward.signable_hash(), reversed.signable_hash());
    }

    #[test]
    fn test_empty_package_rejected() {
        assert_eq!(
            DataPackage::new(Vec::new(), FIXTURE_TIMESTAMP),
            Err(DataPackageError::EmptyPackage)
        );
    }

    #[test]
    fn test_inconsistent_byte_width_rejected() {
        let points = vec![
            DataPoint::numeric("ETH", 2000.0).unwrap(),
            DataPoint::numeric_with_precision("BTC", "42000", 8, 16, Rounding::Nearest).unwrap(),
        ];
        assert_eq!(
            DataPackage::new(points, FIXTURE_TIMESTAMP),
            Err(DataPackageError::InconsistentByteWidth {
                index: 1,
                expected: 32,
                actual: 16
            })
        );
    }

    #[test]
    fn test_mixed_kinds_rejected() {
        let points = vec![
            DataPoint::numeric("ETH", 2000.0).unwrap(),
            DataPoint::string("NAME", "eth"),
        ];
        assert!(matches!(
            DataPackage::new(points, FIXTURE_TIMESTAMP),
            Err(DataPackageError::InconsistentByteWidth { index: 1, .. })
        ));

        // A dynamic point whose value happens to match the width is still rejected
        let points = vec![
            DataPoint::fixed("A", vec![1, 2], 2).unwrap(),
            DataPoint::dynamic("B", vec![3, 4]),
        ];
        assert!(matches!(
            DataPackage::new(points, FIXTURE_TIMESTAMP),
            Err(DataPackageError::InconsistentByteWidth { index: 1, .. })
        ));
    }

    #[test]
    fn test_dynamic_package_has_zero_default_size() {
        let points = vec![
            DataPoint::string("NAME", "redstone"),
            DataPoint::dynamic("BLOB", vec![0xde, 0xad, 0xbe, 0xef]),
        ];
        let package = DataPackage::new(points, FIXTURE_TIMESTAMP).unwrap();
        assert_eq!(package.default_data_point_byte_size(), 0);

        let bytes = package.serialize();
        assert_eq!(bytes.len(), (32 + 8 + 8) + (32 + 4 + 8) + 13);
        assert_eq!(&bytes[bytes.len() - 7..bytes.len() - 3], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_timestamp_range() {
        let points = eth_btc_data_points();
        assert!(DataPackage::new(points.clone(), MAX_TIMESTAMP_MILLISECONDS).is_ok());
        assert_eq!(
            DataPackage::new(points, MAX_TIMESTAMP_MILLISECONDS + 1),
            Err(DataPackageError::TimestampOutOfRange(
                MAX_TIMESTAMP_MILLISECONDS + 1
            ))
        );
    }
}
