//! Authenticated content for datt.
//!
//! A [`Content`] record (title and body) is bound to an anchor block (hash and
//! height) and a signer [`Address`](datt_types::Address), then signed with
//! Ed25519 over a canonical preimage.
//!
//! Construction is staged so that an unsigned value can never be mistaken for
//! an authentic one:
//!
//! 1. [`ContentAuthBuilder`] collects the fields incrementally, or
//!    [`UnsignedContentAuth::new`] takes them all at once.
//! 2. [`UnsignedContentAuth::sign`] produces a [`ContentAuth`].
//! 3. Receivers call [`ContentAuth::verify`] before trusting anything.

pub mod auth;
pub mod content;
pub mod error;
pub mod preimage;

pub use auth::{verify_content_auth, ContentAuth, ContentAuthBuilder, UnsignedContentAuth};
pub use content::Content;
pub use error::ContentAuthError;
pub use preimage::{preimage, signing_digest, DOMAIN_TAG};
