//! Deterministic keys and fixtures for tests and benchmarks
//!
//! The keys are the well-known first two development accounts of the
//! Hardhat/Anvil test mnemonic. Never use them for anything of value.

use crate::data_package::DataPackage;
use crate::data_point::DataPoint;
use crate::payload::{RedstonePayload, UnsignedMetadata};
use crate::signed_data_package::SignedDataPackage;
use crate::signer::UniversalSigner;

/// First test private key
pub const TEST_PRIVATE_KEY_1: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Address of [`TEST_PRIVATE_KEY_1`], checksummed
pub const TEST_ADDRESS_1: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

/// Second test private key
pub const TEST_PRIVATE_KEY_2: &str =
    "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

/// Address of [`TEST_PRIVATE_KEY_2`], checksummed
pub const TEST_ADDRESS_2: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

/// Timestamp of the ETH/BTC fixture package (2022-06-04T14:36:40Z)
pub const FIXTURE_TIMESTAMP: u64 = 1_654_353_400_000;

/// Serialized ETH=2000, BTC=42000 package at [`FIXTURE_TIMESTAMP`]
///
/// Two 64-byte data points, then timestamp, default width 32 and count 2.
pub const FIXTURE_PACKAGE_HEX: &str = concat!(
    "4554480000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000002e90edd000",
    "4254430000000000000000000000000000000000000000000000000000000000",
    "000000000000000000000000000000000000000000000000000003d1e3821000",
    "01812f2590c0",
    "00000020",
    "000002",
);

/// ETH=2000 and BTC=42000 at the default precision and width
#[must_use]
pub fn eth_btc_data_points() -> Vec<DataPoint> {
    vec![
        DataPoint::numeric("ETH", 2000.0).expect("ETH fixture value encodes"),
        DataPoint::numeric("BTC", 42000.0).expect("BTC fixture value encodes"),
    ]
}

/// The fixture package signed with `private_key_hex`
#[must_use]
pub fn signed_fixture_package(private_key_hex: &str) -> SignedDataPackage {
    sign_data_points(private_key_hex, eth_btc_data_points(), FIXTURE_TIMESTAMP)
}

/// Sign arbitrary points at `timestamp` with `private_key_hex`
#[must_use]
pub fn sign_data_points(
    private_key_hex: &str,
    data_points: Vec<DataPoint>,
    timestamp: u64,
) -> SignedDataPackage {
    let signer = UniversalSigner::from_hex(private_key_hex).expect("valid test private key");
    DataPackage::new(data_points, timestamp)
        .expect("valid test data package")
        .sign(&signer)
        .expect("signing succeeds")
}

/// Two nodes, one numeric and one dynamic package, with versioned metadata
#[must_use]
pub fn sample_payload() -> RedstonePayload {
    let numeric = signed_fixture_package(TEST_PRIVATE_KEY_1);
    let dynamic = sign_data_points(
        TEST_PRIVATE_KEY_2,
        vec![
            DataPoint::string("NAME", "redstone"),
            DataPoint::dynamic("BLOB", vec![0xde, 0xad, 0xbe, 0xef]),
        ],
        FIXTURE_TIMESTAMP + 1_000,
    );
    RedstonePayload::new(
        vec![numeric, dynamic],
        UnsignedMetadata::versioned("1", "redstone-protocol"),
    )
    .expect("sample payload within limits")
}
