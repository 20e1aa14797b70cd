//! Cache key derivation.

/// Derives a cache key from a prefix, a target and request parameters.
///
/// The key has the form `"{prefix}:{digest}"` where the digest is a BLAKE3
/// hash of the target and the parameters sorted by name, so parameter order
/// does not affect the key. Every field is length-prefixed before hashing,
/// so no choice of separators inside names or values can collide.
pub fn make_key(prefix: &str, target: &str, params: &[(&str, &str)]) -> String {
    let mut sorted: Vec<_> = params.to_vec();
    sorted.sort_unstable();

    let mut hasher = blake3::Hasher::new();
    update_field(&mut hasher, target);
    for (name, value) in sorted {
        update_field(&mut hasher, name);
        update_field(&mut hasher, value);
    }

    format!("{prefix}:{}", hasher.finalize().to_hex())
}

fn update_field(hasher: &mut blake3::Hasher, field: &str) {
    hasher.update(&(field.len() as u64).to_le_bytes());
    hasher.update(field.as_bytes());
}
