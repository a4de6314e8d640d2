//! RedStone oracle payload protocol
//!
//! Oracle nodes turn observations into [`DataPoint`]s, group them into a
//! timestamped [`DataPackage`] and sign its keccak-256 hash with secp256k1.
//! An aggregator concatenates signed packages from many nodes into a
//! [`RedstonePayload`], which can be appended to arbitrary host data such as
//! transaction call data. Consumers locate the payload by its trailing marker
//! and read it back with [`RedstonePayloadParser`], then recover each
//! package's signer.
//!
//! # Example
//!
//! ```rust
//! use redstone_protocol::{
//!     DataPackage, DataPoint, RedstonePayload, RedstonePayloadParser, UniversalSigner,
//! };
//!
//! let signer = UniversalSigner::from_hex(
//!     "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
//! )?;
//! let package = DataPackage::new(
//!     vec![DataPoint::numeric("ETH", 2000.0)?],
//!     1_654_353_400_000,
//! )?
//! .sign(&signer)?;
//!
//! // Host data the parser knows nothing about
//! let mut calldata = vec![0xab, 0xcd];
//! calldata.extend(RedstonePayload::prepare(&[package], b"1#docs")?);
//!
//! let parsed = RedstonePayloadParser::new(&calldata).parse()?;
//! assert_eq!(parsed.remainder, vec![0xab, 0xcd]);
//! let node = parsed.signed_data_packages[0].verify_and_recover()?;
//! assert_eq!(node, *signer.address());
//! # Ok::<(), redstone_protocol::Error>(())
//! ```

#![warn(missing_docs)]

pub mod codec;
pub mod constants;
pub mod data_package;
pub mod data_point;
pub mod parser;
pub mod payload;
pub mod signed_data_package;
pub mod signer;
/// Deterministic keys and fixtures shared by tests and benchmarks
pub mod test_utils;

use thiserror::Error;

// Re-export commonly used types
pub use codec::{CodecError, Rounding};
pub use data_package::{DataPackage, DataPackageError};
pub use data_point::{DataFeedId, DataPoint, DataPointError, DataPointKind};
pub use parser::{ParseError, ParsedPayload, RedstonePayloadParser, ReverseCursor};
pub use payload::{PayloadError, RedstonePayload, UnsignedMetadata};
pub use signed_data_package::SignedDataPackage;
pub use signer::{
    Address, PrivateKey, Signature, SignatureComponent, SignatureError, UniversalSigner,
};

/// Any error produced by this crate
#[derive(Error, Debug)]
pub enum Error {
    /// Numeric or fixed-width encoding error
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Data point construction error
    #[error(transparent)]
    DataPoint(#[from] DataPointError),

    /// Data package construction error
    #[error(transparent)]
    DataPackage(#[from] DataPackageError),

    /// Signing, recovery or key error
    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// Payload assembly error
    #[error(transparent)]
    Payload(#[from] PayloadError),

    /// Payload parsing error
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Result type using the crate-level [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_convert_to_crate_error() {
        let err: Error = DataPackageError::EmptyPackage.into();
        assert!(matches!(err, Error::DataPackage(DataPackageError::EmptyPackage)));
        assert_eq!(
            err.to_string(),
            "Data package must contain at least one data point"
        );

        let err: Error = ParseError::UnexpectedRemainder(3).into();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
