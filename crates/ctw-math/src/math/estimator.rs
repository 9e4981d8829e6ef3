//! Memoryless estimators used at every context-tree node.
//!
//! An estimator maps the bit counts a node has absorbed to the probability
//! of the sequence seen so far, assuming the bits in that context come from
//! a Bernoulli source.
//!
//! - KT (Krichevsky-Trofimov): Beta(1/2, 1/2) prior on the source parameter.
//! ```text
//! P_KT(next = b | a zeros, c ones) = (count_b + 1/2) / (a + c + 1)
//! P_KT(a zeros, c ones)            = B(a + 1/2, c + 1/2) / B(1/2, 1/2)
//! ```
//! - Deterministic: half the prior mass on "always 0", half on "always 1".
//!   Once both values have been seen the sequence has probability zero.
//!
//! Counts are passed as `[zeros, ones]` and bits as their index (0 or 1).

use super::stable::{log_beta, LN_HALF};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Estimator variant, selected once per model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Estimator {
    /// Krichevsky-Trofimov (Jeffreys prior) estimator.
    #[default]
    Kt,
    /// All-zero or all-one source.
    Deterministic,
}

impl Estimator {
    /// Log-probability of `bit` following a context with `counts`.
    pub fn log_update(self, bit: usize, counts: [u64; 2]) -> f64 {
        debug_assert!(bit < 2, "bit index out of range: {bit}");
        match self {
            Estimator::Kt => {
                let total = (counts[0] + counts[1]) as f64;
                ((counts[bit] as f64 + 0.5) / (total + 1.0)).ln()
            }
            Estimator::Deterministic => {
                let mut next = counts;
                next[bit] += 1;
                if next[0] > 0 && next[1] > 0 {
                    return f64::NEG_INFINITY;
                }
                (constant_mass(next) / constant_mass(counts)).ln()
            }
        }
    }

    /// Log-probability of any sequence with the given counts.
    ///
    /// Closed form, so the value depends on the counts alone and not on the
    /// order the bits arrived in.
    pub fn log_prob(self, counts: [u64; 2]) -> f64 {
        if counts == [0, 0] {
            return 0.0;
        }
        match self {
            Estimator::Kt => {
                log_beta(counts[0] as f64 + 0.5, counts[1] as f64 + 0.5) - PI.ln()
            }
            Estimator::Deterministic => {
                if counts[0] > 0 && counts[1] > 0 {
                    f64::NEG_INFINITY
                } else {
                    LN_HALF
                }
            }
        }
    }

    /// Log-probability rebuilt by replaying [`Estimator::log_update`] for the
    /// zeros and then the ones.
    pub fn log_prob_replayed(self, counts: [u64; 2]) -> f64 {
        let mut seen = [0u64; 2];
        let mut log_p = 0.0;
        for bit in 0..2 {
            for _ in 0..counts[bit] {
                log_p += self.log_update(bit, seen);
                seen[bit] += 1;
            }
        }
        log_p
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Estimator::Kt => "kt",
            Estimator::Deterministic => "deterministic",
        }
    }
}

/// Prior mass of the constant sources still consistent with `counts`.
fn constant_mass(counts: [u64; 2]) -> f64 {
    let mut mass = 0.0;
    if counts[0] == 0 {
        mass += 0.5;
    }
    if counts[1] == 0 {
        mass += 0.5;
    }
    mass
}

impl std::str::FromStr for Estimator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "kt" | "krichevsky-trofimov" => Ok(Estimator::Kt),
            "deterministic" | "determ" => Ok(Estimator::Deterministic),
            _ => Err(format!("unknown estimator: {}", s)),
        }
    }
}

impl std::fmt::Display for Estimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
