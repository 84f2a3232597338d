use crate::constants::RNG_DERIVATION_PRIME;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;

/// Create a deterministic RNG from a seed.
pub fn create_rng(seed: u64) -> ChaCha12Rng {
    ChaCha12Rng::seed_from_u64(seed)
}

/// Derive an independent stream for one agent on one tick.
///
/// The perception/decision phase draws from these instead of the colony RNG,
/// so its result does not depend on iteration order or thread scheduling.
pub fn derive_agent_rng(base_seed: u64, tick: u64, agent_id: u32) -> ChaCha12Rng {
    let mut rng =
        ChaCha12Rng::seed_from_u64(base_seed ^ tick.wrapping_mul(RNG_DERIVATION_PRIME));
    rng.set_stream(agent_id as u64);
    rng
}
