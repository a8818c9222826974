//! Canonical signing preimage.
//!
//! ```text
//! "datt/contentauth/v1"
//! u32be len | title
//! u32be len | body
//! blockhash (32 bytes, internal order)
//! u64be height
//! u32be len | address
//! ```
//!
//! Every variable-length field carries its length, so no two distinct field
//! tuples share a preimage. A field whose length does not fit the u32 prefix
//! has no preimage at all. The signature covers the Blake2b-256 digest of it.

use datt_types::{Address, BlockHash};

use crate::{Content, ContentAuthError};

pub const DOMAIN_TAG: &[u8] = b"datt/contentauth/v1";

/// Serialize the signed fields in canonical order.
pub fn preimage(
    content: &Content,
    blockhash: &BlockHash,
    height: u64,
    address: &Address,
) -> Result<Vec<u8>, ContentAuthError> {
    let mut out = Vec::with_capacity(
        DOMAIN_TAG.len()
            + 4 * 3
            + content.title.len()
            + content.body.len()
            + BlockHash::LEN
            + 8
            + address.as_str().len(),
    );
    out.extend_from_slice(DOMAIN_TAG);
    put_prefixed(&mut out, "title", content.title.as_bytes())?;
    put_prefixed(&mut out, "body", content.body.as_bytes())?;
    out.extend_from_slice(blockhash.as_bytes());
    out.extend_from_slice(&height.to_be_bytes());
    put_prefixed(&mut out, "address", address.as_str().as_bytes())?;
    Ok(out)
}

/// Blake2b-256 of [`preimage`]: the message that is signed and the content-auth id.
pub fn signing_digest(
    content: &Content,
    blockhash: &BlockHash,
    height: u64,
    address: &Address,
) -> Result<[u8; 32], ContentAuthError> {
    Ok(datt_crypto::blake2b_256(&preimage(content, blockhash, height, address)?))
}

fn length_prefix(field: &'static str, len: usize) -> Result<u32, ContentAuthError> {
    u32::try_from(len).map_err(|_| ContentAuthError::FieldTooLong { field, len })
}

fn put_prefixed(out: &mut Vec<u8>, field: &'static str, bytes: &[u8]) -> Result<(), ContentAuthError> {
    let len = length_prefix(field, bytes.len())?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> Address {
        Address::parse("datt_signer").unwrap()
    }

    #[test]
    fn layout_is_exact() {
        let content = Content::new("t", "bo");
        let hash = BlockHash::from_bytes([0x11; 32]);
        let bytes = preimage(&content, &hash, 376_949, &addr()).unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(b"datt/contentauth/v1");
        expected.extend_from_slice(&[0, 0, 0, 1, b't']);
        expected.extend_from_slice(&[0, 0, 0, 2, b'b', b'o']);
        expected.extend_from_slice(&[0x11; 32]);
        expected.extend_from_slice(&376_949u64.to_be_bytes());
        expected.extend_from_slice(&[0, 0, 0, 11]);
        expected.extend_from_slice(b"datt_signer");
        assert_eq!(bytes, expected);
    }

    #[test]
    fn field_boundaries_are_unambiguous() {
        let hash = BlockHash::ZERO;
        let a = preimage(&Content::new("ab", "c"), &hash, 0, &addr()).unwrap();
        let b = preimage(&Content::new("a", "bc"), &hash, 0, &addr()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn digest_tracks_every_field() {
        let content = Content::new("title", "body");
        let hash = BlockHash::from_bytes([1; 32]);
        let digest = |c: &Content, h: &BlockHash, n: u64, a: &Address| {
            signing_digest(c, h, n, a).unwrap()
        };
        let base = digest(&content, &hash, 10, &addr());
        assert_ne!(base, digest(&Content::new("title!", "body"), &hash, 10, &addr()));
        assert_ne!(base, digest(&content, &BlockHash::from_bytes([2; 32]), 10, &addr()));
        assert_ne!(base, digest(&content, &hash, 11, &addr()));
        assert_ne!(base, digest(&content, &hash, 10, &Address::parse("datt_other").unwrap()));
    }

    #[test]
    fn length_prefix_rejects_fields_past_u32() {
        assert_eq!(length_prefix("body", u32::MAX as usize), Ok(u32::MAX));
        #[cfg(target_pointer_width = "64")]
        assert_eq!(
            length_prefix("body", u32::MAX as usize + 1),
            Err(ContentAuthError::FieldTooLong {
                field: "body",
                len: u32::MAX as usize + 1
            })
        );
    }
}
