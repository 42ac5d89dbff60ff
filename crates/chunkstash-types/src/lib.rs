//! Foundation types for chunkstash.
//!
//! Every other chunkstash crate depends on `chunkstash-types`. The types here
//! describe what a transactional key-value backend stores and how entries are
//! addressed; they carry no I/O.
//!
//! # Key Types
//!
//! - [`Key`] / [`KeyPart`]: ordered, typed key sequences with a total order
//! - [`KvValue`]: a typed stored value (bytes, string, integer, timestamp)
//! - [`Versionstamp`]: monotonic commit token used for optimistic checks
//! - [`ContentDigest`]: 32-byte content hash used by the dedup index
//! - [`timing_safe_eq`]: constant-time equality over byte buffers

pub mod digest;
pub mod eq;
pub mod error;
pub mod key;
pub mod value;
pub mod versionstamp;

pub use digest::ContentDigest;
pub use eq::timing_safe_eq;
pub use error::TypeError;
pub use key::{Key, KeyPart};
pub use value::KvValue;
pub use versionstamp::Versionstamp;
