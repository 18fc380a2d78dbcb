//! Crypto Module
//!
//! Authenticated encryption for everything the store writes to disk.
//!
//! ## Responsibilities
//! - Seal/open opaque byte payloads (WAL records, snapshot images)
//! - Hold the data key and wipe it on drop
//! - Ask the host for the key through [`KeyProvider`]
//!
//! ## Sealed Payload Format
//! ```text
//! ┌────────────┬──────────────────────────────┬──────────┐
//! │ Nonce (12) │        Ciphertext            │ Tag (16) │
//! └────────────┴──────────────────────────────┴──────────┘
//! ```

mod cipher;
mod key;

pub use cipher::{AesGcmCipher, Cipher, NONCE_SIZE, TAG_SIZE};
pub use key::{DataKey, KeyFileProvider, KeyProvider, StaticKeyProvider, KEY_SIZE};
