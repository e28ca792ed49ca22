//! Concentration-to-relaxation conversion

use serde::{Deserialize, Serialize};

/// Maps tracer concentration (mM) to relaxation rates (s^-1)
pub trait RelaxationModel: Send + Sync {
    fn r1(&self, r10: f64, concentration: f64) -> f64;
    fn r2(&self, r20: f64, concentration: f64) -> f64;
}

/// Linear relaxivity model, `R = R0 + r * c`.
///
/// Relaxivities are in s^-1 mM^-1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearRelaxivity {
    pub r1: f64,
    pub r2: f64,
}

impl LinearRelaxivity {
    pub fn new(r1: f64, r2: f64) -> Self {
        Self { r1, r2 }
    }
}

impl Default for LinearRelaxivity {
    // Gadoterate at 3 T
    fn default() -> Self {
        Self { r1: 3.4, r2: 4.1 }
    }
}

impl RelaxationModel for LinearRelaxivity {
    fn r1(&self, r10: f64, concentration: f64) -> f64 {
        r10 + self.r1 * concentration
    }

    fn r2(&self, r20: f64, concentration: f64) -> f64 {
        r20 + self.r2 * concentration
    }
}
