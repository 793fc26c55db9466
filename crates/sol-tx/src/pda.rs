//! Program derived addresses.
//!
//! A PDA is `SHA-256(seed_0 || ... || seed_n || program_id || "ProgramDerivedAddress")`
//! where the digest must *not* be a valid Ed25519 point, so that no private
//! key exists for it. `find_program_address` appends a one-byte bump seed,
//! searching from 255 downward until the digest falls off the curve.

use sha2::{Digest, Sha256};

use crate::error::TxError;
use crate::pubkey::{is_on_curve, Pubkey};

/// Maximum number of seeds, bump included.
pub const MAX_SEEDS: usize = 16;
/// Maximum length of a single seed.
pub const MAX_SEED_LEN: usize = 32;

/// The string appended to PDA derivation: "ProgramDerivedAddress".
const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Derive the address for `seeds` exactly as given (no bump search).
///
/// Fails with `InvalidSeeds` if the seeds hash onto the curve or break the
/// count/length limits.
pub fn create_program_address(seeds: &[&[u8]], program_id: &Pubkey) -> Result<Pubkey, TxError> {
    check_seeds(seeds, MAX_SEEDS)?;

    let hash = hash_seeds(seeds, &[], program_id);
    if is_on_curve(&hash) {
        return Err(TxError::InvalidSeeds(
            "derived address lies on the ed25519 curve".into(),
        ));
    }
    Ok(Pubkey::new_from_array(hash))
}

/// Find a valid PDA for `seeds` under `program_id`.
///
/// Iterates bump seeds from 255 down to 0 and returns the first address that
/// is off the curve, together with its bump. `NoValidBumpFound` if none of
/// the 256 candidates qualifies.
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &Pubkey,
) -> Result<(Pubkey, u8), TxError> {
    // One slot is reserved for the bump.
    check_seeds(seeds, MAX_SEEDS - 1)?;

    for bump in (0u8..=255).rev() {
        let hash = hash_seeds(seeds, &[bump], program_id);
        if !is_on_curve(&hash) {
            return Ok((Pubkey::new_from_array(hash), bump));
        }
    }

    Err(TxError::NoValidBumpFound)
}

fn check_seeds(seeds: &[&[u8]], max_seeds: usize) -> Result<(), TxError> {
    if seeds.len() > max_seeds {
        return Err(TxError::InvalidSeeds(format!(
            "{} seeds, max {max_seeds}",
            seeds.len()
        )));
    }
    if let Some(seed) = seeds.iter().find(|s| s.len() > MAX_SEED_LEN) {
        return Err(TxError::InvalidSeeds(format!(
            "seed of {} bytes, max {MAX_SEED_LEN}",
            seed.len()
        )));
    }
    Ok(())
}

/// `extra` is hashed right after `seeds`; the bump search passes `[bump]`.
fn hash_seeds(seeds: &[&[u8]], extra: &[u8], program_id: &Pubkey) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update(extra);
    hasher.update(program_id.as_bytes());
    hasher.update(PDA_MARKER);
    hasher.finalize().into()
}
