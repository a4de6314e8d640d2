//! secp256k1 ECDSA signing and signer recovery
//!
//! Signatures are carried as `r(32) ‖ s(32) ‖ v(1)`. Verification is
//! recovery-based: the signer's address is derived from the public key
//! recovered from the signature and the digest, and compared by the caller.
//!
//! Every recovery first runs the malleability guard: `s` must be in the lower
//! half of the curve order and `v` must be 27/28 (or the raw recovery id 0/1).
//! Without it `(r, n - s, v ^ 1)` would verify for the same content.

use crate::codec::keccak256;
use crate::constants::SIGNATURE_BS;
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use log::{debug, warn};
use num_bigint::BigUint;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// secp256k1 curve order `n`
pub const SECP256K1_ORDER: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe,
    0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];

/// `n / 2`, the largest accepted `s`
pub const SECP256K1_HALF_ORDER: [u8; 32] = [
    0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b, 0x20, 0xa0,
];

const ETHEREUM_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Signature component named in a rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureComponent {
    /// `r` is zero or not below the curve order
    R,
    /// `s` is zero or in the upper half of the curve order
    S,
    /// `v` is not 27, 28, 0 or 1
    V,
}

impl fmt::Display for SignatureComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::R => "r",
            Self::S => "s",
            Self::V => "v",
        })
    }
}

/// Signing and recovery errors
#[derive(Error, Debug)]
pub enum SignatureError {
    /// Signature rejected by the malleability guard or malformed
    #[error("Invalid signature: bad {0} component")]
    InvalidSignature(SignatureComponent),

    /// Signature bytes of the wrong length
    #[error("Invalid signature length: expected {SIGNATURE_BS}, got {0}")]
    InvalidLength(usize),

    /// Private key bytes are not a valid secp256k1 scalar
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// Address is not 20 hex-encoded bytes
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// The curve library refused to sign
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// No public key could be recovered
    #[error("Public key recovery failed: {0}")]
    RecoveryFailed(String),

    /// Structured data could not be canonicalized
    #[error("Cannot canonicalize data for signing: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Hex decoding error
    #[error("Invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// Result type for signing operations
pub type Result<T> = std::result::Result<T, SignatureError>;

fn strip_hex_prefix(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Immutable `(r, s, v)` signature
///
/// Construction only checks the length; component validity is enforced by
/// [`recover_signer`] so that a parsed payload can still be inspected.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature {
    r: [u8; 32],
    s: [u8; 32],
    v: u8,
}

impl Signature {
    /// Size of the serialized signature in bytes
    pub const SIZE: usize = SIGNATURE_BS;

    /// Build from components
    #[must_use]
    pub const fn new(r: [u8; 32], s: [u8; 32], v: u8) -> Self {
        Self { r, s, v }
    }

    /// Parse `r ‖ s ‖ v`
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let array: [u8; SIGNATURE_BS] = bytes
            .try_into()
            .map_err(|_| SignatureError::InvalidLength(bytes.len()))?;
        Ok(Self::from(array))
    }

    /// Parse hex-encoded `r ‖ s ‖ v`, with or without `0x`
    pub fn from_hex(s: &str) -> Result<Self> {
        Self::from_bytes(&hex::decode(strip_hex_prefix(s))?)
    }

    /// Serialize to `r ‖ s ‖ v`
    #[must_use]
    pub fn to_bytes(&self) -> [u8; SIGNATURE_BS] {
        let mut out = [0u8; SIGNATURE_BS];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.v;
        out
    }

    /// `0x`-prefixed hex of `r ‖ s ‖ v`
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    /// `r` component
    #[must_use]
    pub const fn r(&self) -> &[u8; 32] {
        &self.r
    }

    /// `s` component
    #[must_use]
    pub const fn s(&self) -> &[u8; 32] {
        &self.s
    }

    /// `v` component
    #[must_use]
    pub const fn v(&self) -> u8 {
        self.v
    }

    /// Run the malleability guard and return the recovery id
    pub fn check_components(&self) -> Result<RecoveryId> {
        if self.s > SECP256K1_HALF_ORDER {
            warn!("Rejecting signature with high s: {}", self.to_hex());
            return Err(SignatureError::InvalidSignature(SignatureComponent::S));
        }

        let recovery_byte = match self.v {
            27 | 28 => self.v - 27,
            0 | 1 => self.v,
            other => {
                warn!("Rejecting signature with v = {other}");
                return Err(SignatureError::InvalidSignature(SignatureComponent::V));
            }
        };

        RecoveryId::from_byte(recovery_byte)
            .ok_or(SignatureError::InvalidSignature(SignatureComponent::V))
    }

    fn to_ecdsa(self) -> Result<EcdsaSignature> {
        let mut rs = [0u8; 64];
        rs[..32].copy_from_slice(&self.r);
        rs[32..].copy_from_slice(&self.s);
        EcdsaSignature::from_slice(&rs).map_err(|_| {
            let component = if self.s.iter().all(|b| *b == 0) {
                SignatureComponent::S
            } else {
                SignatureComponent::R
            };
            SignatureError::InvalidSignature(component)
        })
    }
}

impl From<[u8; SIGNATURE_BS]> for Signature {
    fn from(bytes: [u8; SIGNATURE_BS]) -> Self {
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Self { r, s, v: bytes[64] }
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// 20-byte account address (last 20 bytes of keccak-256 of the public key)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    /// Size of an address in bytes
    pub const SIZE: usize = 20;

    /// Wrap raw address bytes
    #[must_use]
    pub const fn new(bytes: [u8; Self::SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw address bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; Self::SIZE] {
        &self.0
    }

    /// Derive the address of a public key
    #[must_use]
    pub fn from_public_key(public_key: &VerifyingKey) -> Self {
        let point = public_key.as_affine().to_encoded_point(false);
        let hash = keccak256(&point.as_bytes()[1..]);
        let mut address = [0u8; Self::SIZE];
        address.copy_from_slice(&hash[32 - Self::SIZE..]);
        Self(address)
    }

    /// Parse a hex address in any letter case, with or without `0x`
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(strip_hex_prefix(s))?;
        let address: [u8; Self::SIZE] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| SignatureError::InvalidAddress(format!("{} bytes", b.len())))?;
        Ok(Self(address))
    }

    /// EIP-55 mixed-case checksum encoding
    #[must_use]
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());

        let mut out = String::with_capacity(2 + lower.len());
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = if i % 2 == 0 {
                hash[i / 2] >> 4
            } else {
                hash[i / 2] & 0x0f
            };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl FromStr for Address {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

/// secp256k1 private key
#[derive(Clone)]
pub struct PrivateKey(SigningKey);

impl PrivateKey {
    /// Size of a private key in bytes
    pub const SIZE: usize = 32;

    /// Import from 32 big-endian bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::SIZE {
            return Err(SignatureError::InvalidPrivateKey(format!(
                "expected {} bytes, got {}",
                Self::SIZE,
                bytes.len()
            )));
        }
        SigningKey::from_slice(bytes)
            .map(Self)
            .map_err(|_| SignatureError::InvalidPrivateKey("scalar out of range".to_string()))
    }

    /// Import from hex, with or without `0x`
    pub fn from_hex(s: &str) -> Result<Self> {
        Self::from_bytes(&hex::decode(strip_hex_prefix(s))?)
    }

    /// Uncompressed SEC1 public key (65 bytes, `0x04` prefix)
    #[must_use]
    pub fn public_key(&self) -> Vec<u8> {
        self.0
            .verifying_key()
            .as_affine()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }

    /// Address of this key
    #[must_use]
    pub fn address(&self) -> Address {
        Address::from_public_key(self.0.verifying_key())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey(<redacted> {})", self.address())
    }
}

/// Flip `s` into the lower half of the curve order, adjusting the recovery id
fn normalize_low_s(signature: Signature, recovery_id: RecoveryId) -> (Signature, RecoveryId) {
    if signature.s <= SECP256K1_HALF_ORDER {
        return (signature, recovery_id);
    }

    let order = BigUint::from_bytes_be(&SECP256K1_ORDER);
    let flipped = order - BigUint::from_bytes_be(&signature.s);
    let flipped_bytes = flipped.to_bytes_be();
    let mut s = [0u8; 32];
    s[32 - flipped_bytes.len()..].copy_from_slice(&flipped_bytes);

    let recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
    (Signature::new(signature.r, s, signature.v), recovery_id)
}

/// Signs digests, data packages and structured data with one private key
#[derive(Debug, Clone)]
pub struct UniversalSigner {
    private_key: PrivateKey,
    address: Address,
}

impl UniversalSigner {
    /// Create a signer from a private key
    #[must_use]
    pub fn new(private_key: PrivateKey) -> Self {
        let address = private_key.address();
        Self {
            private_key,
            address,
        }
    }

    /// Create a signer from a hex-encoded private key
    pub fn from_hex(private_key_hex: &str) -> Result<Self> {
        Ok(Self::new(PrivateKey::from_hex(private_key_hex)?))
    }

    /// Address of the signing key
    #[must_use]
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Underlying private key
    #[must_use]
    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    /// Deterministic (RFC 6979) signature over a 32-byte digest, always low-S
    pub fn sign_hash(&self, hash: &[u8; 32]) -> Result<Signature> {
        let (signature, recovery_id) = self
            .private_key
            .0
            .sign_prehash_recoverable(hash)
            .map_err(|e| SignatureError::SigningFailed(e.to_string()))?;

        let bytes = signature.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);

        let (signature, recovery_id) = normalize_low_s(Signature::new(r, s, 0), recovery_id);
        let signature = Signature::new(signature.r, signature.s, 27 + recovery_id.to_byte());

        debug!(
            "Signed digest 0x{} as {}",
            hex::encode(hash),
            self.address
        );
        Ok(signature)
    }

    /// Sign the canonical JSON form of `data`
    pub fn sign_stringifiable_data<T: Serialize + ?Sized>(&self, data: &T) -> Result<Signature> {
        self.sign_hash(&stringifiable_data_digest(data)?)
    }

    /// Sign `message` under the Ethereum personal-message prefix (EIP-191)
    pub fn sign_with_ethereum_hash_message(&self, message: &[u8]) -> Result<Signature> {
        self.sign_hash(&ethereum_hash_message(message))
    }
}

/// Recover the public key that produced `signature` over `hash`
///
/// Returns the uncompressed SEC1 encoding (65 bytes).
pub fn recover_public_key(hash: &[u8; 32], signature: &Signature) -> Result<Vec<u8>> {
    let key = recover_verifying_key(hash, signature)?;
    Ok(key.as_affine().to_encoded_point(false).as_bytes().to_vec())
}

/// Recover the address that produced `signature` over `hash`
pub fn recover_signer(hash: &[u8; 32], signature: &Signature) -> Result<Address> {
    let key = recover_verifying_key(hash, signature)?;
    let address = Address::from_public_key(&key);
    debug!("Recovered signer {address} for digest 0x{}", hex::encode(hash));
    Ok(address)
}

fn recover_verifying_key(hash: &[u8; 32], signature: &Signature) -> Result<VerifyingKey> {
    let recovery_id = signature.check_components()?;
    let ecdsa = signature.to_ecdsa()?;
    VerifyingKey::recover_from_prehash(hash, &ecdsa, recovery_id)
        .map_err(|e| SignatureError::RecoveryFailed(e.to_string()))
}

/// Keccak-256 of the canonical JSON form of `data`
///
/// Canonical form is compact JSON with object keys sorted, so two values
/// that differ only in field order hash identically.
pub fn stringifiable_data_digest<T: Serialize + ?Sized>(data: &T) -> Result<[u8; 32]> {
    let value = canonical_json(serde_json::to_value(data)?);
    let canonical = serde_json::to_string(&value)?;
    Ok(keccak256(canonical.as_bytes()))
}

/// Rebuild every object with its keys in sorted order
///
/// `serde_json::Map` keeps insertion order when any crate in the build enables
/// `preserve_order`, so the order is fixed here rather than left to the map.
fn canonical_json(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(key, value)| (key, canonical_json(value)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonical_json).collect()),
        other => other,
    }
}

/// Recover the signer of structured data signed with
/// [`UniversalSigner::sign_stringifiable_data`]
pub fn recover_signer_from_stringifiable_data<T: Serialize + ?Sized>(
    data: &T,
    signature: &Signature,
) -> Result<Address> {
    recover_signer(&stringifiable_data_digest(data)?, signature)
}

/// EIP-191 personal-message digest of `message`
#[must_use]
pub fn ethereum_hash_message(message: &[u8]) -> [u8; 32] {
    let mut prefixed = Vec::with_capacity(ETHEREUM_MESSAGE_PREFIX.len() + 20 + message.len());
    prefixed.extend_from_slice(ETHEREUM_MESSAGE_PREFIX.as_bytes());
    prefixed.extend_from_slice(message.len().to_string().as_bytes());
    prefixed.extend_from_slice(message);
    keccak256(&prefixed)
}

/// Recover the signer of a message signed with
/// [`UniversalSigner::sign_with_ethereum_hash_message`]
pub fn recover_signer_from_ethereum_hash_message(
    message: &[u8],
    signature: &Signature,
) -> Result<Address> {
    recover_signer(&ethereum_hash_message(message), signature)
}
