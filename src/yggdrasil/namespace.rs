//! Provenance tagging for identifiers issued by the global provider.
//!
//! Two providers share one UUID space. Bit 15 of the most significant
//! half is reserved as the provenance flag. It is the top bit of the
//! version nibble, which is clear for every standard UUID version (1..=7),
//! and it never touches the variant bits. A set flag means the identifier
//! came from the global provider.

use uuid::Uuid;

/// Name suffix that routes a lookup to the global provider.
pub const MOJANG_SUFFIX: &str = "@mojang";

const PROVENANCE_BIT: u64 = 1 << 15;

pub fn is_masked(id: Uuid) -> bool {
    let (high, _) = id.as_u64_pair();
    high & PROVENANCE_BIT != 0
}

/// Set the provenance flag. Masking an already masked id is logged and
/// the id is returned unchanged.
pub fn mask(id: Uuid) -> Uuid {
    if is_masked(id) {
        tracing::warn!(uuid = %id.simple(), "uuid already carries the provenance bit");
    }
    let (high, low) = id.as_u64_pair();
    Uuid::from_u64_pair(high | PROVENANCE_BIT, low)
}

pub fn unmask(id: Uuid) -> Uuid {
    let (high, low) = id.as_u64_pair();
    Uuid::from_u64_pair(high & !PROVENANCE_BIT, low)
}

/// Strip [`MOJANG_SUFFIX`], returning the bare name if it was present.
pub fn strip_suffix(name: &str) -> Option<&str> {
    name.strip_suffix(MOJANG_SUFFIX)
}

pub fn with_suffix(name: &str) -> String {
    format!("{name}{MOJANG_SUFFIX}")
}
