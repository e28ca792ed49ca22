use serde::{Deserialize, Serialize};

use super::{Relaxation, SignalModel};

/// Tissue compartments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Compartment {
    /// Capillary blood
    Blood,
    /// Extravascular-extracellular space
    Extracellular,
    /// Intracellular space
    Intracellular,
}

impl Compartment {
    pub const ALL: [Compartment; 3] = [
        Compartment::Blood,
        Compartment::Extracellular,
        Compartment::Intracellular,
    ];
}

/// One value per compartment
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerCompartment<T> {
    pub b: T,
    pub e: T,
    pub i: T,
}

impl<T> PerCompartment<T> {
    pub fn new(b: T, e: T, i: T) -> Self {
        Self { b, e, i }
    }

    pub fn get(&self, compartment: Compartment) -> &T {
        match compartment {
            Compartment::Blood => &self.b,
            Compartment::Extracellular => &self.e,
            Compartment::Intracellular => &self.i,
        }
    }

    pub fn map<U, F: FnMut(&T) -> U>(&self, mut f: F) -> PerCompartment<U> {
        PerCompartment {
            b: f(&self.b),
            e: f(&self.e),
            i: f(&self.i),
        }
    }
}

/// A relaxation component and its spin-population weight
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelaxationComponent {
    pub relaxation: Relaxation,
    pub weight: f64,
}

/// Decomposition of compartmental relaxation into relaxation components
pub trait WaterExchangeModel: Send + Sync {
    fn components(
        &self,
        populations: &PerCompartment<f64>,
        rates: &PerCompartment<Relaxation>,
    ) -> Vec<RelaxationComponent>;
}

fn weighted_mean(
    populations: &PerCompartment<f64>,
    rates: &PerCompartment<Relaxation>,
    f: impl Fn(&Relaxation) -> f64,
) -> f64 {
    Compartment::ALL
        .iter()
        .map(|&c| populations.get(c) * f(rates.get(c)))
        .sum()
}

/// Fast water exchange limit: a single averaged component with weight 1
#[derive(Debug, Clone, Copy, Default)]
pub struct FastExchange;

impl WaterExchangeModel for FastExchange {
    fn components(
        &self,
        populations: &PerCompartment<f64>,
        rates: &PerCompartment<Relaxation>,
    ) -> Vec<RelaxationComponent> {
        vec![RelaxationComponent {
            relaxation: Relaxation {
                r1: weighted_mean(populations, rates, |r| r.r1),
                r2: weighted_mean(populations, rates, |r| r.r2),
                r2s: weighted_mean(populations, rates, |r| r.r2s),
            },
            weight: 1.0,
        }]
    }
}

/// No water exchange limit: one component per compartment, sharing the mean R2*
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExchange;

impl WaterExchangeModel for NoExchange {
    fn components(
        &self,
        populations: &PerCompartment<f64>,
        rates: &PerCompartment<Relaxation>,
    ) -> Vec<RelaxationComponent> {
        let r2s = weighted_mean(populations, rates, |r| r.r2s);
        Compartment::ALL
            .iter()
            .map(|&c| {
                let rate = rates.get(c);
                RelaxationComponent {
                    relaxation: Relaxation {
                        r1: rate.r1,
                        r2: rate.r2,
                        r2s,
                    },
                    weight: *populations.get(c),
                }
            })
            .collect()
    }
}

/// Water-exchange regime selected at configuration time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaterExchange {
    #[default]
    Fast,
    No,
}

impl WaterExchangeModel for WaterExchange {
    fn components(
        &self,
        populations: &PerCompartment<f64>,
        rates: &PerCompartment<Relaxation>,
    ) -> Vec<RelaxationComponent> {
        match self {
            WaterExchange::Fast => FastExchange.components(populations, rates),
            WaterExchange::No => NoExchange.components(populations, rates),
        }
    }
}

/// Population-weighted sum of per-component signals
pub fn components_to_signal(
    s0: f64,
    components: &[RelaxationComponent],
    k_fa: f64,
    signal_model: &dyn SignalModel,
) -> f64 {
    components
        .iter()
        .map(|c| c.weight * signal_model.relaxation_to_signal(s0, &c.relaxation, k_fa))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Spgr;
    use approx::assert_relative_eq;

    fn populations() -> PerCompartment<f64> {
        PerCompartment::new(0.1, 0.3, 0.6)
    }

    fn rates() -> PerCompartment<Relaxation> {
        PerCompartment::new(
            Relaxation {
                r1: 2.0,
                r2: 0.0,
                r2s: 10.0,
            },
            Relaxation {
                r1: 1.0,
                r2: 0.0,
                r2s: 20.0,
            },
            Relaxation {
                r1: 0.5,
                r2: 0.0,
                r2s: 30.0,
            },
        )
    }

    #[test]
    fn fast_exchange_collapses_to_one_component() {
        let comps = FastExchange.components(&populations(), &rates());
        assert_eq!(comps.len(), 1);
        assert_eq!(comps[0].weight, 1.0);
        assert_relative_eq!(comps[0].relaxation.r1, 0.2 + 0.3 + 0.3, epsilon = 1e-12);
        assert_relative_eq!(comps[0].relaxation.r2s, 1.0 + 6.0 + 18.0, epsilon = 1e-12);
    }

    #[test]
    fn no_exchange_keeps_one_component_per_compartment() {
        let comps = NoExchange.components(&populations(), &rates());
        assert_eq!(comps.len(), 3);
        let weights: Vec<f64> = comps.iter().map(|c| c.weight).collect();
        assert_eq!(weights, vec![0.1, 0.3, 0.6]);
        assert_eq!(comps[1].relaxation.r1, 1.0);
        for c in &comps {
            assert_relative_eq!(c.relaxation.r2s, 25.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn regimes_agree_for_uniform_relaxation() {
        let uniform = PerCompartment::new(
            Relaxation::longitudinal(1.2),
            Relaxation::longitudinal(1.2),
            Relaxation::longitudinal(1.2),
        );
        let spgr = Spgr::default();
        let fast = components_to_signal(
            1.0,
            &WaterExchange::Fast.components(&populations(), &uniform),
            1.0,
            &spgr,
        );
        let none = components_to_signal(
            1.0,
            &WaterExchange::No.components(&populations(), &uniform),
            1.0,
            &spgr,
        );
        assert_relative_eq!(fast, none, epsilon = 1e-12);
    }

    #[test]
    fn water_exchange_deserializes_from_snake_case() {
        let wx: WaterExchange = serde_json::from_str("\"no\"").unwrap();
        assert_eq!(wx, WaterExchange::No);
    }
}
