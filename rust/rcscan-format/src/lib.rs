//! Static definitions of the RCFile storage format: version tags, sync markers,
//! compression codec identities, and the primitive wire encodings.
//!
//! Everything here is passive. The stream-driven parsing lives in `rcscan-scan`.

pub mod codec;
pub mod version;
pub mod vint;
