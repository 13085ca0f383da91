//! RNG entropy check
//!
//! Draws samples from the process RNG, truncates each to an 8-digit
//! decimal fragment and counts repeats. With 10^8 possible fragments and
//! 10,000 draws roughly half a collision is expected, so a handful of
//! repeats is noise. This is a smoke test for an obviously broken
//! generator, not a statistical or cryptographic test.

use std::collections::HashSet;

use rand::Rng;

use super::ProbeContext;
use crate::error::ProbeError;

const FRAGMENT_SPACE: f64 = 100_000_000.0;

/// First eight decimal digits of a sample in `[0, 1)`
pub fn fragment(sample: f64) -> String {
    let digits = (sample.clamp(0.0, 1.0) * FRAGMENT_SPACE) as u64 % FRAGMENT_SPACE as u64;
    format!("{:08}", digits)
}

/// Number of values already seen earlier in the sequence
pub fn count_collisions<I>(values: I) -> usize
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    values.into_iter().filter(|v| !seen.insert(v.clone())).count()
}

/// Draw `samples` fragments from the thread RNG and count repeats
pub fn sample_collisions(samples: usize) -> usize {
    let mut rng = rand::thread_rng();
    count_collisions((0..samples).map(|_| fragment(rng.gen::<f64>())))
}

/// Log line for a collision count
pub fn verdict(collisions: usize, threshold: usize) -> String {
    if collisions > threshold {
        format!(
            "[WARN] {} duplicates found. This could indicate a weak or predictable RNG.",
            collisions
        )
    } else {
        "[SUCCESS] No significant duplicates found. RNG appears to have sufficient entropy for this simple test."
            .to_string()
    }
}

pub async fn run(ctx: &ProbeContext<'_>) -> Result<(), ProbeError> {
    let log = ctx.emitter();
    let samples = ctx.config.probes.rng_samples;

    log.emit(format!(
        "Generating {} random numbers to check for predictability...",
        samples
    ));
    ctx.token.check()?;

    let collisions = sample_collisions(samples);
    log.emit(format!(
        "Found {} duplicates in {} iterations.",
        collisions, samples
    ));
    log.emit(verdict(collisions, ctx.config.probes.rng_collision_threshold));

    Ok(())
}
