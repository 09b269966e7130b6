//! Demonstration physics.
//!
//! Results are opaque records the interpreter logs and forwards. Nothing
//! in the interpreter's correctness depends on the numbers.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub outcome: u32,
    pub probability: f64,
}

/// Shared key produced by a simulated key-distribution run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyMaterial {
    pub node_a: String,
    pub node_b: String,
    pub key_bits: usize,
    /// Truncated blake3 digest of the sifted key.
    pub fingerprint: String,
    pub error_rate: f64,
}

pub trait PhysicsStub: Send {
    /// Collapse a qudit of `dimension` levels.
    fn measure(&mut self, dimension: u32) -> Measurement;

    /// Fidelity estimate for moving a state between two nodes.
    fn teleport_fidelity(&mut self, from: &str, to: &str) -> f64;

    fn key_distribution(&mut self, node_a: &str, node_b: &str, qubits: usize) -> KeyMaterial;
}

/// Seeded, reproducible physics.
#[derive(Debug, Clone)]
pub struct DemoPhysics {
    rng: ChaCha8Rng,
}

impl DemoPhysics {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl PhysicsStub for DemoPhysics {
    fn measure(&mut self, dimension: u32) -> Measurement {
        let dimension = dimension.max(1);
        Measurement {
            outcome: self.rng.gen_range(0..dimension),
            probability: 1.0 / f64::from(dimension),
        }
    }

    fn teleport_fidelity(&mut self, _from: &str, _to: &str) -> f64 {
        self.rng.gen_range(0.90..0.99)
    }

    fn key_distribution(&mut self, node_a: &str, node_b: &str, qubits: usize) -> KeyMaterial {
        // Roughly half the raw bits survive basis sifting.
        let mut sifted = Vec::with_capacity(qubits / 2);
        for _ in 0..qubits {
            if self.rng.gen_bool(0.5) {
                sifted.push(self.rng.gen::<u8>() & 1);
            }
        }
        KeyMaterial {
            node_a: node_a.to_string(),
            node_b: node_b.to_string(),
            key_bits: sifted.len(),
            fingerprint: blake3::hash(&sifted).to_hex()[..16].to_string(),
            error_rate: self.rng.gen_range(0.0..0.05),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_outcomes() {
        let mut a = DemoPhysics::new(9);
        let mut b = DemoPhysics::new(9);
        for _ in 0..32 {
            assert_eq!(a.measure(4), b.measure(4));
        }
    }

    #[test]
    fn outcome_within_dimension() {
        let mut physics = DemoPhysics::new(1);
        for dimension in 1..10 {
            let m = physics.measure(dimension);
            assert!(m.outcome < dimension);
            assert!((m.probability - 1.0 / f64::from(dimension)).abs() < 1e-12);
        }
    }

    #[test]
    fn key_distribution_sifts() {
        let mut physics = DemoPhysics::new(3);
        let key = physics.key_distribution("a", "b", 256);
        assert!(key.key_bits <= 256);
        assert!(key.error_rate < 0.05);
        assert_eq!(key.fingerprint.len(), 16);
    }
}
