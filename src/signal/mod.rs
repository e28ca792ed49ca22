//! Relaxation-to-signal conversion
//!
//! A [`SignalModel`] maps the relaxation rates of a single relaxation component to a signal
//! intensity for one acquisition sequence. Multi-compartment tissue is reduced to one or more
//! such components by a water-exchange model, see [`exchange`].

pub mod exchange;

use serde::{Deserialize, Serialize};

pub use exchange::{
    components_to_signal, Compartment, FastExchange, NoExchange, PerCompartment,
    RelaxationComponent, WaterExchange, WaterExchangeModel,
};

/// Relaxation rates (s^-1) of one compartment or relaxation component
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Relaxation {
    pub r1: f64,
    pub r2: f64,
    pub r2s: f64,
}

impl Relaxation {
    /// Longitudinal relaxation only, with transverse rates set to zero
    pub fn longitudinal(r1: f64) -> Self {
        Self {
            r1,
            r2: 0.0,
            r2s: 0.0,
        }
    }
}

/// Signal equation of an acquisition sequence
pub trait SignalModel: Send + Sync {
    /// Signal of a single relaxation component.
    ///
    /// `k_fa` is the ratio of actual to nominal flip angle.
    fn relaxation_to_signal(&self, s0: f64, relaxation: &Relaxation, k_fa: f64) -> f64;
}

/// Spoiled gradient echo sequence.
///
/// `tr` and `te` are in seconds, `fa` is the nominal flip angle in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Spgr {
    pub tr: f64,
    pub te: f64,
    pub fa: f64,
}

impl Spgr {
    pub fn new(tr: f64, te: f64, fa: f64) -> Self {
        Self { tr, te, fa }
    }

    pub fn fa_rad(&self) -> f64 {
        self.fa.to_radians()
    }
}

impl Default for Spgr {
    fn default() -> Self {
        Self {
            tr: 3.4e-3,
            te: 1.7e-3,
            fa: 15.0,
        }
    }
}

impl SignalModel for Spgr {
    fn relaxation_to_signal(&self, s0: f64, relaxation: &Relaxation, k_fa: f64) -> f64 {
        let fa = k_fa * self.fa_rad();
        let e1 = (-self.tr * relaxation.r1).exp();
        s0 * (((1.0 - e1) * fa.sin()) / (1.0 - e1 * fa.cos())) * (-self.te * relaxation.r2s).exp()
    }
}
