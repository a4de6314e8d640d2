//! Data packages paired with their signature

use crate::constants::SIGNATURE_BS;
use crate::data_package::DataPackage;
use crate::parser::{self, ParseError, ReverseCursor};
use crate::signer::{self, Address, Signature};
use log::debug;

/// Immutable pairing of a data package and its `(r, s, v)` signature
///
/// Wire form is `data_package ‖ signature(65)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedDataPackage {
    data_package: DataPackage,
    signature: Signature,
}

impl SignedDataPackage {
    /// Pair a package with a signature over its signable hash
    #[must_use]
    pub fn new(data_package: DataPackage, signature: Signature) -> Self {
        Self {
            data_package,
            signature,
        }
    }

    /// Parse one standalone serialized signed package
    ///
    /// The bytes are read backward exactly as the payload parser does, and
    /// must not contain anything before the package.
    pub fn from_bytes(bytes: &[u8]) -> parser::Result<Self> {
        let mut cursor = ReverseCursor::new(bytes);
        let package = parser::extract_signed_data_package(&mut cursor)?;
        if cursor.remaining() != 0 {
            return Err(ParseError::UnexpectedRemainder(cursor.remaining()));
        }
        Ok(package)
    }

    /// Parse hex, with or without `0x`
    pub fn from_hex(s: &str) -> parser::Result<Self> {
        Self::from_bytes(&parser::decode_hex(s)?)
    }

    /// The signed package
    #[must_use]
    pub fn data_package(&self) -> &DataPackage {
        &self.data_package
    }

    /// The signature
    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Length of the serialized signed package in bytes
    #[must_use]
    pub fn serialized_len(&self) -> usize {
        self.data_package.serialized_len() + SIGNATURE_BS
    }

    /// Wire form
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.serialized_len());
        self.write_to(&mut buf);
        buf
    }

    /// Append the wire form to `buf`
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        self.data_package.write_to(buf);
        buf.extend_from_slice(&self.signature.to_bytes());
    }

    /// Check the signature and recover the signer's address
    ///
    /// Malleable or malformed signatures are errors, never an anonymous
    /// package.
    pub fn verify_and_recover(&self) -> signer::Result<Address> {
        let hash = self.data_package.signable_hash();
        let address = signer::recover_signer(&hash, &self.signature)?;
        debug!(
            "Data package @{} signed by {address}",
            self.data_package.timestamp_milliseconds()
        );
        Ok(address)
    }

    /// Whether the package was signed by `expected`
    pub fn is_signed_by(&self, expected: &Address) -> signer::Result<bool> {
        Ok(self.verify_and_recover()? == *expected)
    }
}
