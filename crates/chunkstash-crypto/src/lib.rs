//! Cryptographic primitives for chunkstash.
//!
//! Provides domain-separated BLAKE3 content digests and the constant-time
//! equality used to compare artifact contents.
//!
//! All crypto operations wrap established libraries; no custom cryptography.

pub mod hasher;

pub use chunkstash_types::timing_safe_eq;
pub use hasher::{ContentHasher, DigestWriter};
