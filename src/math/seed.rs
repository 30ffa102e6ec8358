//! Seed derivation for independent random streams.
//!
//! Every stream (one per stratum, tree or synthetic scene) gets its own
//! `StdRng` seeded from the run seed, a tag and a few integer parts. Mixing uses
//! the SplitMix64 finaliser, so a derived seed depends only on its inputs and
//! never on the toolchain or platform.

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// One SplitMix64 step from state `z`.
pub fn splitmix64(z: u64) -> u64 {
    let mut z = z.wrapping_add(GOLDEN_GAMMA);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Seed of the stream named by `tag` and `parts` under `seed`.
pub fn derive_seed(seed: u64, tag: &str, parts: &[u64]) -> u64 {
    let mut h = splitmix64(seed);
    for b in tag.bytes() {
        h = splitmix64(h ^ u64::from(b));
    }
    for &p in parts {
        h = splitmix64(h ^ p);
    }
    h
}
