//! Identity principals
//!
//! An identity binds a unique name to a transport location and an ed25519
//! keypair. Identities compare equal by name alone; key material is only
//! consulted for signing and verification.

use std::fmt;
use std::hash::{Hash, Hasher};

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::{IdentityError, IdentityResult};

/// A protocol principal.
///
/// The signing key is present only for identities this process controls;
/// peer identities learned from a cache file or the network carry the
/// verifying half alone.
#[derive(Clone)]
pub struct Identity {
    name: String,
    location: String,
    verifying: VerifyingKey,
    signing: Option<SigningKey>,
}

impl Identity {
    /// Generate a fresh identity with its own keypair.
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        let signing = SigningKey::generate(&mut OsRng);
        Self::with_keys(name, location, signing)
    }

    /// Build an identity around an existing signing key.
    pub fn with_keys(
        name: impl Into<String>,
        location: impl Into<String>,
        signing: SigningKey,
    ) -> Self {
        Identity {
            name: name.into(),
            location: location.into(),
            verifying: signing.verifying_key(),
            signing: Some(signing),
        }
    }

    /// Build a verify-only identity for a remote peer.
    pub fn public_only(
        name: impl Into<String>,
        location: impl Into<String>,
        verifying: VerifyingKey,
    ) -> Self {
        Identity {
            name: name.into(),
            location: location.into(),
            verifying,
            signing: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying
    }

    /// Whether this identity can produce signatures.
    pub fn can_sign(&self) -> bool {
        self.signing.is_some()
    }

    /// Sign a message, returning the 64-byte ed25519 signature.
    pub fn sign(&self, message: &[u8]) -> IdentityResult<Vec<u8>> {
        let key = self
            .signing
            .as_ref()
            .ok_or_else(|| IdentityError::NoSigningKey(self.name.clone()))?;
        Ok(key.sign(message).to_bytes().to_vec())
    }

    /// Verify a raw signature over a message under this identity's key.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        match Signature::try_from(signature) {
            Ok(sig) => self.verifying.verify(message, &sig).is_ok(),
            Err(_) => false,
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("name", &self.name)
            .field("location", &self.location)
            .field("can_sign", &self.can_sign())
            .finish()
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Identity {}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// On-disk / on-wire shape of an identity.
#[derive(Serialize, Deserialize)]
struct SerialIdentity {
    name: String,
    location: String,
    public: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    secret: Option<String>,
}

impl From<&Identity> for SerialIdentity {
    fn from(ident: &Identity) -> Self {
        SerialIdentity {
            name: ident.name.clone(),
            location: ident.location.clone(),
            public: hex::encode(ident.verifying.to_bytes()),
            secret: ident.signing.as_ref().map(|k| hex::encode(k.to_bytes())),
        }
    }
}

impl TryFrom<SerialIdentity> for Identity {
    type Error = IdentityError;

    fn try_from(serial: SerialIdentity) -> IdentityResult<Self> {
        if let Some(secret) = serial.secret {
            let bytes = Zeroizing::new(
                hex::decode(&secret)
                    .map_err(|e| IdentityError::BadKeyMaterial(e.to_string()))?,
            );
            let arr: [u8; 32] = bytes
                .as_slice()
                .try_into()
                .map_err(|_| IdentityError::BadKeyMaterial("secret key length".into()))?;
            Ok(Identity::with_keys(
                serial.name,
                serial.location,
                SigningKey::from_bytes(&arr),
            ))
        } else {
            let bytes = hex::decode(&serial.public)
                .map_err(|e| IdentityError::BadKeyMaterial(e.to_string()))?;
            let arr: [u8; 32] = bytes
                .as_slice()
                .try_into()
                .map_err(|_| IdentityError::BadKeyMaterial("public key length".into()))?;
            let verifying = VerifyingKey::from_bytes(&arr)
                .map_err(|e| IdentityError::BadKeyMaterial(e.to_string()))?;
            Ok(Identity::public_only(serial.name, serial.location, verifying))
        }
    }
}

impl Serialize for Identity {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SerialIdentity::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let serial = SerialIdentity::deserialize(deserializer)?;
        Identity::try_from(serial).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let ident = Identity::new("mitzi@lackadaisy.com", "local:mitzi");
        let sig = ident.sign(b"hello").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(ident.verify(b"hello", &sig));
        assert!(!ident.verify(b"goodbye", &sig));
        assert!(!ident.verify(b"hello", &[0u8; 64]));
    }

    #[test]
    fn test_public_only_cannot_sign() {
        let full = Identity::new("atlas@lackadaisy.com", "local:atlas");
        let public = Identity::public_only(
            full.name(),
            full.location(),
            *full.verifying_key(),
        );
        assert!(!public.can_sign());
        assert!(matches!(
            public.sign(b"x"),
            Err(IdentityError::NoSigningKey(_))
        ));
    }

    #[test]
    fn test_equality_by_name() {
        let a = Identity::new("victor@lackadaisy.com", "local:victor");
        let b = Identity::new("victor@lackadaisy.com", "somewhere:else");
        assert_eq!(a, b);
    }

    #[test]
    fn test_serde_roundtrip_preserves_signing() {
        let ident = Identity::new("mitzi@lackadaisy.com", "local:mitzi");
        let json = serde_json::to_string(&ident).unwrap();
        let back: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ident);
        assert!(back.can_sign());

        let sig = back.sign(b"payload").unwrap();
        assert!(ident.verify(b"payload", &sig));
    }
}
