//! Builder, unsigned and signed content-auth values.

use datt_types::{Address, BlockHash, KeyPair, Signature};
use serde::{Deserialize, Serialize};

use crate::preimage::signing_digest;
use crate::{Content, ContentAuthError};

/// Incremental construction of an [`UnsignedContentAuth`].
///
/// Useful when the fields arrive from different places (a form, a chain
/// tip query, a wallet). [`build`](Self::build) names the first missing field.
#[derive(Clone, Debug, Default)]
pub struct ContentAuthBuilder {
    content: Option<Content>,
    anchor: Option<(BlockHash, u64)>,
    address: Option<Address>,
}

impl ContentAuthBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_content(mut self, content: Content) -> Self {
        self.content = Some(content);
        self
    }

    /// Attach the anchor block: its hash (internal byte order) and height.
    pub fn set_anchor(mut self, blockhash: BlockHash, height: u64) -> Self {
        self.anchor = Some((blockhash, height));
        self
    }

    pub fn set_address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    pub fn build(self) -> Result<UnsignedContentAuth, ContentAuthError> {
        let content = self
            .content
            .ok_or(ContentAuthError::Incomplete { missing: "content" })?;
        let (blockhash, blockheight) = self
            .anchor
            .ok_or(ContentAuthError::Incomplete { missing: "anchor block" })?;
        let address = self
            .address
            .ok_or(ContentAuthError::Incomplete { missing: "address" })?;
        Ok(UnsignedContentAuth::new(content, blockhash, blockheight, address))
    }
}

/// A complete but not yet signed content auth. Cannot be serialized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnsignedContentAuth {
    content: Content,
    blockhash: BlockHash,
    blockheight: u64,
    address: Address,
}

impl UnsignedContentAuth {
    pub fn new(content: Content, blockhash: BlockHash, blockheight: u64, address: Address) -> Self {
        Self {
            content,
            blockhash,
            blockheight,
            address,
        }
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Sign with `keypair`, whose derived address must equal the declared one.
    pub fn sign(self, keypair: &KeyPair) -> Result<ContentAuth, ContentAuthError> {
        let signer = datt_crypto::derive_address(&keypair.public);
        if signer != self.address {
            return Err(ContentAuthError::AddressMismatch {
                expected: self.address,
                actual: signer,
            });
        }
        let digest =
            signing_digest(&self.content, &self.blockhash, self.blockheight, &self.address)?;
        let signature = datt_crypto::sign_message(&digest, &keypair.private);
        Ok(ContentAuth {
            content: self.content,
            blockhash: self.blockhash,
            blockheight: self.blockheight,
            address: self.address,
            signature,
        })
    }
}

/// Content bound to an anchor block and signed by `address`.
///
/// Holding a `ContentAuth` only means a signature is present. Call
/// [`verify`](Self::verify) before trusting a value received from a peer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentAuth {
    content: Content,
    #[serde(rename = "blockhashbuf")]
    blockhash: BlockHash,
    #[serde(rename = "blockheightnum")]
    blockheight: u64,
    address: Address,
    signature: Signature,
}

impl ContentAuth {
    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn title(&self) -> &str {
        &self.content.title
    }

    pub fn body(&self) -> &str {
        &self.content.body
    }

    /// Anchor block hash in internal byte order.
    pub fn blockhash(&self) -> &BlockHash {
        &self.blockhash
    }

    pub fn blockheight(&self) -> u64 {
        self.blockheight
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Stable identifier: the digest that was signed.
    ///
    /// Fails only for a field too long to have a preimage, which no signed
    /// or network-received value can carry.
    pub fn id(&self) -> Result<[u8; 32], ContentAuthError> {
        signing_digest(&self.content, &self.blockhash, self.blockheight, &self.address)
    }

    /// Check the signature against the public key embedded in `address`.
    ///
    /// `Ok(false)` for a signature that does not match. `Err` only when the
    /// address cannot be decoded to a key at all, or a field is too long to
    /// have a preimage.
    pub fn verify(&self) -> Result<bool, ContentAuthError> {
        verify_content_auth(
            &self.content,
            &self.blockhash,
            self.blockheight,
            &self.address,
            &self.signature,
        )
    }

    /// Drop the signature, e.g. to re-sign under a replacement key.
    pub fn into_unsigned(self) -> UnsignedContentAuth {
        UnsignedContentAuth::new(self.content, self.blockhash, self.blockheight, self.address)
    }
}

/// Verify a content-auth signature from its raw fields. No side effects.
pub fn verify_content_auth(
    content: &Content,
    blockhash: &BlockHash,
    blockheight: u64,
    address: &Address,
    signature: &Signature,
) -> Result<bool, ContentAuthError> {
    let public = datt_crypto::public_key_of(address)
        .ok_or_else(|| ContentAuthError::MalformedAddress(address.to_string()))?;
    let digest = signing_digest(content, blockhash, blockheight, address)?;
    Ok(datt_crypto::verify_signature(&digest, signature, &public))
}
