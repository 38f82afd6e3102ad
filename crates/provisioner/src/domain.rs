//! Random cluster domain generation.

use rand::RngCore;

/// Number of random bytes in a generated domain prefix.
pub const DOMAIN_PREFIX_BYTES: usize = 16;

/// Returns a fresh cluster domain: 32 lowercase hex characters followed
/// directly by `base`.
///
/// No separator is inserted, so a `base` meant to form a subdomain should
/// start with `.`.
pub fn generate_cluster_domain(base: &str) -> String {
    generate_cluster_domain_with(&mut rand::thread_rng(), base)
}

/// [`generate_cluster_domain`] drawing from `rng`.
pub fn generate_cluster_domain_with<R: RngCore + ?Sized>(rng: &mut R, base: &str) -> String {
    let mut prefix = [0u8; DOMAIN_PREFIX_BYTES];
    rng.fill_bytes(&mut prefix);
    format!("{}{base}", hex::encode(prefix))
}
