//! secp256k1 ECDSA signing and verification of license messages.
//!
//! Everything here is a pure function over explicit key material. The private
//! key stays with the issuing backend; verifying environments only need the
//! public key, which is exported as hex-encoded compressed SEC1.
//!
//! Signatures are ECDSA over SHA-256 of the message (RFC 6979 nonces), carried
//! as hex-encoded DER.

use k256::ecdsa::{
    Signature, SigningKey, VerifyingKey,
    signature::{Signer, Verifier},
};

use crate::error::{AppError, Result};

/// Issuer key pair. The verifying half is derived, never configured separately.
#[derive(Clone)]
pub struct LicenseKeys {
    signing: SigningKey,
    verifying: VerifyingKey,
}

impl LicenseKeys {
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::random(&mut rand::rngs::OsRng))
    }

    pub fn from_signing_key(signing: SigningKey) -> Self {
        let verifying = signing.verifying_key().clone();
        Self { signing, verifying }
    }

    /// Load from a hex-encoded 32-byte private scalar.
    pub fn from_private_hex(hex_key: &str) -> Result<Self> {
        let bytes = hex::decode(hex_key.trim())
            .map_err(|_| AppError::Internal("License private key is not valid hex".into()))?;
        let signing = SigningKey::from_slice(&bytes)
            .map_err(|_| AppError::Internal("License private key is not a valid secp256k1 scalar".into()))?;
        Ok(Self::from_signing_key(signing))
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying
    }

    pub fn private_key_hex(&self) -> String {
        hex::encode(self.signing.to_bytes())
    }

    pub fn public_key_hex(&self) -> String {
        public_key_to_hex(&self.verifying)
    }
}

impl std::fmt::Debug for LicenseKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseKeys")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

pub fn public_key_to_hex(key: &VerifyingKey) -> String {
    hex::encode(key.to_encoded_point(true).as_bytes())
}

/// Parse a hex SEC1 public key (compressed or uncompressed).
pub fn public_key_from_hex(hex_key: &str) -> Result<VerifyingKey> {
    let bytes = hex::decode(hex_key.trim())
        .map_err(|_| AppError::BadRequest("Public key is not valid hex".into()))?;
    VerifyingKey::from_sec1_bytes(&bytes)
        .map_err(|_| AppError::BadRequest("Public key is not a valid secp256k1 point".into()))
}

/// Sign `message`, returning the hex-encoded DER signature.
pub fn sign(message: &[u8], key: &SigningKey) -> String {
    let signature: Signature = key.sign(message);
    hex::encode(signature.to_der().as_bytes())
}

/// Check a hex DER signature over `message`.
///
/// Malformed hex, malformed DER and a wrong signature all come back as `false`.
pub fn verify(message: &[u8], signature_hex: &str, key: &VerifyingKey) -> bool {
    let Ok(der) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(signature) = Signature::from_der(&der) else {
        return false;
    };
    key.verify(message, &signature).is_ok()
}
