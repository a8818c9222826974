//! Signer addresses.
//!
//! `datt_` + base32(public key, 52 chars) + base32(checksum, 8 chars), where the
//! checksum is the first 5 bytes of Blake2b-256 over the public key. The whole
//! public key is recoverable from the address, which is what lets a content
//! auth be verified from its `address` field alone.

use datt_types::{Address, PublicKey};

const ALPHABET: &[u8; 32] = b"13456789abcdefghijkmnopqrstuwxyz";

const DECODE: [u8; 128] = {
    let mut table = [0xFFu8; 128];
    let mut i = 0;
    while i < 32 {
        table[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
};

const KEY_CHARS: usize = 52;
const CHECKSUM_CHARS: usize = 8;
const CHECKSUM_LEN: usize = 5;

fn encode_base32(bytes: &[u8], out: &mut String) {
    let mut acc: u64 = 0;
    let mut bits = 0;
    for &byte in bytes {
        acc = (acc << 8) | u64::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((acc >> bits) & 0x1F) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(ALPHABET[((acc << (5 - bits)) & 0x1F) as usize] as char);
    }
}

fn decode_base32<const N: usize>(s: &str) -> Option<[u8; N]> {
    let mut acc: u64 = 0;
    let mut bits = 0;
    let mut out = [0u8; N];
    let mut written = 0;
    for c in s.bytes() {
        let val = *DECODE.get(c as usize)?;
        if val == 0xFF {
            return None;
        }
        acc = (acc << 5) | u64::from(val);
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            if written < N {
                out[written] = (acc >> bits) as u8;
                written += 1;
            }
        }
    }
    (written == N).then_some(out)
}

fn checksum(key: &[u8; 32]) -> [u8; CHECKSUM_LEN] {
    let digest = crate::blake2b_256(key);
    let mut sum = [0u8; CHECKSUM_LEN];
    sum.copy_from_slice(&digest[..CHECKSUM_LEN]);
    sum
}

/// Derive the address that identifies `public_key` as a signer.
pub fn derive_address(public_key: &PublicKey) -> Address {
    let mut s = String::with_capacity(Address::PREFIX.len() + KEY_CHARS + CHECKSUM_CHARS);
    s.push_str(Address::PREFIX);
    encode_base32(public_key.as_bytes(), &mut s);
    encode_base32(&checksum(public_key.as_bytes()), &mut s);
    Address::new_unchecked(s)
}

/// Recover the public key bytes embedded in an address string.
///
/// Returns `None` on a wrong prefix, wrong length, bad character, or checksum mismatch.
pub fn decode_address(address: &str) -> Option<[u8; 32]> {
    let encoded = address.strip_prefix(Address::PREFIX)?;
    if encoded.len() != KEY_CHARS + CHECKSUM_CHARS || !encoded.is_ascii() {
        return None;
    }
    let (key_part, sum_part) = encoded.split_at(KEY_CHARS);
    let key: [u8; 32] = decode_base32(key_part)?;
    let sum: [u8; CHECKSUM_LEN] = decode_base32(sum_part)?;
    (sum == checksum(&key)).then_some(key)
}

/// The public key behind a typed [`Address`], if it decodes.
pub fn public_key_of(address: &Address) -> Option<PublicKey> {
    decode_address(address.as_str()).map(PublicKey)
}

pub fn validate_address(address: &str) -> bool {
    decode_address(address).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{generate_keypair, keypair_from_seed};

    #[test]
    fn derived_address_has_expected_shape() {
        let addr = derive_address(&generate_keypair().public);
        assert!(addr.as_str().starts_with("datt_"));
        assert_eq!(addr.as_str().len(), 5 + 52 + 8);
        assert!(validate_address(addr.as_str()));
    }

    #[test]
    fn public_key_is_recoverable() {
        let kp = keypair_from_seed(&[7u8; 32]);
        let addr = derive_address(&kp.public);
        assert_eq!(public_key_of(&addr), Some(kp.public));
    }

    #[test]
    fn foreign_prefix_rejected() {
        let addr = derive_address(&generate_keypair().public);
        let foreign = addr.as_str().replacen("datt_", "brst_", 1);
        assert!(!validate_address(&foreign));
    }

    #[test]
    fn flipped_checksum_rejected() {
        let addr = derive_address(&generate_keypair().public);
        let mut bad = addr.as_str().to_string();
        let last = bad.pop().unwrap();
        bad.push(if last == '1' { '3' } else { '1' });
        assert!(!validate_address(&bad));
    }

    #[test]
    fn short_and_non_ascii_rejected() {
        assert!(!validate_address("datt_tooshort"));
        assert!(!validate_address("datt_"));
        let addr = derive_address(&generate_keypair().public);
        let mut s = addr.as_str()[..addr.as_str().len() - 2].to_string();
        s.push('é');
        assert!(!validate_address(&s));
    }

    #[test]
    fn distinct_keys_give_distinct_addresses() {
        assert_ne!(
            derive_address(&generate_keypair().public),
            derive_address(&generate_keypair().public)
        );
    }
}
