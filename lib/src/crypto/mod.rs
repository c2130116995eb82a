//! ECDSA (secp256k1) keypairs and signatures used to authorise spending a
//! UTXO.
//!
//! Addresses are the SEC1 compressed encoding of a public key. Signing always
//! covers the hash of the output being spent, never the transaction as a
//! whole, mirroring the teacher wallet's `Signature::sign_output`.

use crate::error::{ChainError, Result};
use crate::sha256::Hash;
use ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature as K256Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::rand_core::OsRng;
use serde::{Deserialize, Serialize};
use spki::{DecodePublicKey, EncodePublicKey};
use std::fmt;
use std::fs;
use std::io::{Error as IoError, ErrorKind as IoErrorKind, Result as IoResult};
use std::path::Path;

#[derive(Clone)]
pub struct PrivateKey(pub SigningKey);

impl PrivateKey {
    pub fn new_key() -> Self {
        PrivateKey(SigningKey::random(&mut OsRng))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(*self.0.verifying_key())
    }

    pub fn to_pem(&self) -> Result<String> {
        use ecdsa::elliptic_curve::pkcs8::EncodePrivateKey;
        self.0
            .to_pkcs8_pem(Default::default())
            .map(|p| p.to_string())
            .map_err(|e| ChainError::InvalidPrivateKey {
                reason: e.to_string(),
            })
    }

    pub fn from_pem(pem: &str) -> Result<Self> {
        use ecdsa::elliptic_curve::pkcs8::DecodePrivateKey;
        SigningKey::from_pkcs8_pem(pem)
            .map(PrivateKey)
            .map_err(|e| ChainError::InvalidPrivateKey {
                reason: e.to_string(),
            })
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> IoResult<()> {
        let pem = self
            .to_pem()
            .map_err(|e| IoError::new(IoErrorKind::InvalidData, e.to_string()))?;
        fs::write(path, pem)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> IoResult<Self> {
        let pem = fs::read_to_string(path)?;
        PrivateKey::from_pem(&pem).map_err(|e| IoError::new(IoErrorKind::InvalidData, e.to_string()))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "verifying_key_serde")] pub VerifyingKey);

impl std::hash::Hash for PublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_address_bytes().hash(state);
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.to_address_bytes()))
    }
}

impl PublicKey {
    /// The SEC1 compressed encoding of the point: this is what `Address`
    /// wraps.
    pub fn to_address_bytes(&self) -> [u8; 33] {
        let encoded = self.0.to_encoded_point(true);
        let mut out = [0u8; 33];
        out.copy_from_slice(encoded.as_bytes());
        out
    }

    pub fn from_address_bytes(bytes: &[u8]) -> Result<Self> {
        VerifyingKey::from_sec1_bytes(bytes)
            .map(PublicKey)
            .map_err(|e| ChainError::InvalidPublicKey {
                reason: e.to_string(),
            })
    }

    pub fn to_pem(&self) -> Result<String> {
        self.0
            .to_public_key_pem(Default::default())
            .map_err(|e| ChainError::InvalidPublicKey {
                reason: e.to_string(),
            })
    }

    pub fn from_pem(pem: &str) -> Result<Self> {
        VerifyingKey::from_public_key_pem(pem)
            .map(PublicKey)
            .map_err(|e| ChainError::InvalidPublicKey {
                reason: e.to_string(),
            })
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> IoResult<()> {
        let pem = self
            .to_pem()
            .map_err(|e| IoError::new(IoErrorKind::InvalidData, e.to_string()))?;
        fs::write(path, pem)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> IoResult<Self> {
        let pem = fs::read_to_string(path)?;
        PublicKey::from_pem(&pem).map_err(|e| IoError::new(IoErrorKind::InvalidData, e.to_string()))
    }
}

mod verifying_key_serde {
    use k256::ecdsa::VerifyingKey;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(key: &VerifyingKey, s: S) -> Result<S::Ok, S::Error> {
        key.to_encoded_point(true).as_bytes().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<VerifyingKey, D::Error> {
        let bytes = Vec::<u8>::deserialize(d)?;
        VerifyingKey::from_sec1_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "signature_serde")] K256Signature);

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(self.0.to_bytes()))
    }
}

impl Signature {
    /// Signs the hash of a UTXO being spent. Signing the output's own hash
    /// (rather than the whole transaction) keeps each input independently
    /// verifiable, which is what lets inputs from different keys cosign a
    /// single transaction.
    pub fn sign_output(output_hash: &Hash, private_key: &PrivateKey) -> Self {
        let sig: K256Signature = private_key.0.sign(output_hash.as_bytes());
        Signature(sig)
    }

    pub fn verify(&self, output_hash: &Hash, public_key: &PublicKey) -> bool {
        public_key.0.verify(output_hash.as_bytes(), &self.0).is_ok()
    }
}

mod signature_serde {
    use k256::ecdsa::Signature as K256Signature;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(sig: &K256Signature, s: S) -> Result<S::Ok, S::Error> {
        sig.to_bytes().as_slice().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<K256Signature, D::Error> {
        let bytes = Vec::<u8>::deserialize(d)?;
        K256Signature::from_slice(&bytes).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests;
