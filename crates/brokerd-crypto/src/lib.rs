//! Credential envelope encryption for the brokerd agent gateway.
//!
//! The credential store itself (spec §1: "the encrypted credential
//! store") is an external collaborator; this crate supplies the narrow
//! primitive it's built on: sealing and opening a secret under a
//! scrypt-derived key, per spec §6 ("AES-256-GCM with scrypt-derived
//! keys; the encrypted blob lives in a separate file").

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod envelope;

pub use envelope::{CryptoError, CryptoResult, Envelope, MasterKey};
