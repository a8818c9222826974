//! Ed25519 signing and verification.

use datt_types::{PrivateKey, PublicKey, Signature};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};

/// Sign `message` with a private key.
pub fn sign_message(message: &[u8], private_key: &PrivateKey) -> Signature {
    let signing_key = SigningKey::from_bytes(&private_key.0);
    Signature(signing_key.sign(message).to_bytes())
}

/// Check a signature against a message and public key.
///
/// An unparseable public key is reported as an invalid signature.
pub fn verify_signature(message: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key.0) else {
        return false;
    };
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key.verify(message, &sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{generate_keypair, keypair_from_seed};

    #[test]
    fn sign_and_verify() {
        let kp = generate_keypair();
        let sig = sign_message(b"anchored content", &kp.private);
        assert!(verify_signature(b"anchored content", &sig, &kp.public));
    }

    #[test]
    fn altered_message_fails() {
        let kp = generate_keypair();
        let sig = sign_message(b"original", &kp.private);
        assert!(!verify_signature(b"altered", &sig, &kp.public));
    }

    #[test]
    fn other_key_fails() {
        let signer = generate_keypair();
        let other = generate_keypair();
        let sig = sign_message(b"m", &signer.private);
        assert!(!verify_signature(b"m", &sig, &other.public));
    }

    #[test]
    fn signatures_are_deterministic() {
        let kp = keypair_from_seed(&[9u8; 32]);
        assert_eq!(sign_message(b"x", &kp.private), sign_message(b"x", &kp.private));
    }

    #[test]
    fn garbage_public_key_is_invalid_not_panic() {
        let kp = generate_keypair();
        let sig = sign_message(b"x", &kp.private);
        assert!(!verify_signature(b"x", &sig, &PublicKey([0xFF; 32])));
    }
}
