//! Byte widths and fixed values of the RedStone wire format
//!
//! All integer fields are big-endian and zero-padded to the widths below.
//!
//! ```text
//! data point        = feed_id(32) ‖ value(default_bs)            fixed-size
//!                   = feed_id(32) ‖ value(n) ‖ n(8)               dynamic
//! data package      = data_point* ‖ timestamp(6) ‖ default_bs(4) ‖ count(3)
//! signed package    = data package ‖ r(32) ‖ s(32) ‖ v(1)
//! payload           = signed package* ‖ package_count(2)
//!                     ‖ metadata ‖ metadata_size(3) ‖ marker(9)
//! ```

/// Width of a data feed identifier (label)
pub const DATA_FEED_ID_BS: usize = 32;

/// Width of the package timestamp in milliseconds
pub const TIMESTAMP_BS: usize = 6;

/// Width of the per-package default data point value size
pub const DATA_POINT_VALUE_BYTE_SIZE_BS: usize = 4;

/// Width of the per-package data point count
pub const DATA_POINTS_COUNT_BS: usize = 3;

/// Width of the length suffix carried by dynamic data points
pub const DYNAMIC_VALUE_LENGTH_BS: usize = 8;

/// Width of an `r‖s‖v` signature
pub const SIGNATURE_BS: usize = 65;

/// Width of the payload data package count
pub const DATA_PACKAGES_COUNT_BS: usize = 2;

/// Width of the unsigned metadata size field
pub const UNSIGNED_METADATA_BYTE_SIZE_BS: usize = 3;

/// Width of the trailing marker
pub const REDSTONE_MARKER_BS: usize = 9;

/// Trailing marker terminating every payload
pub const REDSTONE_MARKER: [u8; REDSTONE_MARKER_BS] =
    [0x00, 0x00, 0x02, 0xed, 0x57, 0x01, 0x1e, 0x00, 0x00];

/// Trailing marker as lowercase hex, without `0x`
pub const REDSTONE_MARKER_HEX: &str = "000002ed57011e0000";

/// Decimal precision applied to numeric values unless stated otherwise
pub const DEFAULT_NUM_VALUE_DECIMALS: u8 = 8;

/// Byte width of numeric values unless stated otherwise
pub const DEFAULT_NUM_VALUE_BS: usize = 32;

/// Largest timestamp representable in `TIMESTAMP_BS` bytes
pub const MAX_TIMESTAMP_MILLISECONDS: u64 = (1 << (8 * TIMESTAMP_BS)) - 1;

/// Largest data point count representable in `DATA_POINTS_COUNT_BS` bytes
pub const MAX_DATA_POINTS_COUNT: usize = (1 << (8 * DATA_POINTS_COUNT_BS)) - 1;

/// Largest package count representable in `DATA_PACKAGES_COUNT_BS` bytes
pub const MAX_DATA_PACKAGES_COUNT: usize = (1 << (8 * DATA_PACKAGES_COUNT_BS)) - 1;

/// Largest metadata size representable in `UNSIGNED_METADATA_BYTE_SIZE_BS` bytes
pub const MAX_UNSIGNED_METADATA_BYTE_SIZE: usize = (1 << (8 * UNSIGNED_METADATA_BYTE_SIZE_BS)) - 1;
