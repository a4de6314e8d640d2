//! Appendable payload assembly
//!
//! ```text
//! signed_data_package* ‖ packages_count(2) ‖ unsigned_metadata ‖ metadata_size(3) ‖ marker(9)
//! ```
//!
//! Every variable-length section is followed by its own length, so the
//! payload can be read from the marker backward no matter what precedes it.

use crate::codec;
use crate::constants::{
    DATA_PACKAGES_COUNT_BS, MAX_DATA_PACKAGES_COUNT, MAX_UNSIGNED_METADATA_BYTE_SIZE,
    REDSTONE_MARKER, REDSTONE_MARKER_BS, UNSIGNED_METADATA_BYTE_SIZE_BS,
};
use crate::signed_data_package::SignedDataPackage;
use log::debug;
use thiserror::Error;

/// Payload assembly errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// Package count does not fit in the 2-byte field
    #[error("Too many data packages: {count} exceeds {MAX_DATA_PACKAGES_COUNT}")]
    TooManyPackages {
        /// Number of packages given
        count: usize,
    },

    /// Metadata size does not fit in the 3-byte field
    #[error("Unsigned metadata too large: {size} bytes exceeds {MAX_UNSIGNED_METADATA_BYTE_SIZE}")]
    MetadataTooLarge {
        /// Metadata size in bytes
        size: usize,
    },
}

/// Result type for payload operations
pub type Result<T> = std::result::Result<T, PayloadError>;

/// Helpers for the conventional metadata contents
pub struct UnsignedMetadata;

impl UnsignedMetadata {
    /// `"<version>#<client>"` as UTF-8 bytes
    #[must_use]
    pub fn versioned(version: &str, client: &str) -> Vec<u8> {
        format!("{version}#{client}").into_bytes()
    }
}

/// Signed packages from any number of nodes plus opaque unsigned metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedstonePayload {
    signed_data_packages: Vec<SignedDataPackage>,
    unsigned_metadata: Vec<u8>,
}

impl RedstonePayload {
    /// Validate the count and metadata size and build a payload
    pub fn new(
        signed_data_packages: Vec<SignedDataPackage>,
        unsigned_metadata: Vec<u8>,
    ) -> Result<Self> {
        check_limits(signed_data_packages.len(), unsigned_metadata.len())?;
        Ok(Self::from_parts(signed_data_packages, unsigned_metadata))
    }

    /// Parts read back from the wire are within limits by construction
    pub(crate) fn from_parts(
        signed_data_packages: Vec<SignedDataPackage>,
        unsigned_metadata: Vec<u8>,
    ) -> Self {
        Self {
            signed_data_packages,
            unsigned_metadata,
        }
    }

    /// Serialize packages and metadata in one step
    pub fn prepare(
        signed_data_packages: &[SignedDataPackage],
        unsigned_metadata: &[u8],
    ) -> Result<Vec<u8>> {
        check_limits(signed_data_packages.len(), unsigned_metadata.len())?;
        Ok(write_payload(signed_data_packages, unsigned_metadata))
    }

    /// Like [`Self::prepare`], as lowercase hex without `0x`
    pub fn prepare_hex(
        signed_data_packages: &[SignedDataPackage],
        unsigned_metadata: &[u8],
    ) -> Result<String> {
        Ok(hex::encode(Self::prepare(
            signed_data_packages,
            unsigned_metadata,
        )?))
    }

    /// Packages in assembly order
    #[must_use]
    pub fn signed_data_packages(&self) -> &[SignedDataPackage] {
        &self.signed_data_packages
    }

    /// Opaque metadata bytes
    #[must_use]
    pub fn unsigned_metadata(&self) -> &[u8] {
        &self.unsigned_metadata
    }

    /// Length of the serialized payload in bytes
    #[must_use]
    pub fn serialized_len(&self) -> usize {
        payload_len(&self.signed_data_packages, &self.unsigned_metadata)
    }

    /// Wire form
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        write_payload(&self.signed_data_packages, &self.unsigned_metadata)
    }

    /// Wire form as lowercase hex without `0x`
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

fn check_limits(package_count: usize, metadata_size: usize) -> Result<()> {
    if package_count > MAX_DATA_PACKAGES_COUNT {
        return Err(PayloadError::TooManyPackages {
            count: package_count,
        });
    }
    if metadata_size > MAX_UNSIGNED_METADATA_BYTE_SIZE {
        return Err(PayloadError::MetadataTooLarge {
            size: metadata_size,
        });
    }
    Ok(())
}

fn payload_len(signed_data_packages: &[SignedDataPackage], unsigned_metadata: &[u8]) -> usize {
    signed_data_packages
        .iter()
        .map(SignedDataPackage::serialized_len)
        .sum::<usize>()
        + DATA_PACKAGES_COUNT_BS
        + unsigned_metadata.len()
        + UNSIGNED_METADATA_BYTE_SIZE_BS
        + REDSTONE_MARKER_BS
}

/// Caller has already checked the count and metadata size
fn write_payload(signed_data_packages: &[SignedDataPackage], unsigned_metadata: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(payload_len(signed_data_packages, unsigned_metadata));
    for package in signed_data_packages {
        package.write_to(&mut buf);
    }
    codec::put_u64(
        &mut buf,
        signed_data_packages.len() as u64,
        DATA_PACKAGES_COUNT_BS,
    );
    buf.extend_from_slice(unsigned_metadata);
    codec::put_u64(
        &mut buf,
        unsigned_metadata.len() as u64,
        UNSIGNED_METADATA_BYTE_SIZE_BS,
    );
    buf.extend_from_slice(&REDSTONE_MARKER);
    debug!(
        "Prepared payload: {} packages, {} metadata bytes, {} bytes total",
        signed_data_packages.len(),
        unsigned_metadata.len(),
        buf.len()
    );
    buf
}
