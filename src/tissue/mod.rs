//! Multi-compartment forward model from PK parameters to enhancement
//!
//! Tissue is split into blood, extravascular-extracellular and intracellular compartments.
//! Volume fractions follow from the PK parameters and hematocrit and double as spin-population
//! fractions. Per-compartment relaxation is reduced to relaxation components by a
//! water-exchange model, and the signal is the population-weighted sum over components.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::DceError;
use crate::pk::{PkModel, PkParams, VE, VP};
use crate::relaxation::RelaxationModel;
use crate::signal::{
    components_to_signal, PerCompartment, Relaxation, SignalModel, WaterExchangeModel,
};

/// Volume fraction of each compartment
pub type VolumeFractions = PerCompartment<f64>;

/// Physiological and acquisition constants of a tissue region
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tissue {
    /// Capillary hematocrit
    pub hematocrit: f64,
    /// Ratio of actual to nominal flip angle
    pub k_fa: f64,
    /// Pre-contrast R1 of the whole tissue (s^-1)
    pub r10_tissue: f64,
    /// Pre-contrast R1 of capillary blood (s^-1), usually taken from the AIF
    pub r10_blood: f64,
}

impl Default for Tissue {
    fn default() -> Self {
        Self {
            hematocrit: 0.42,
            k_fa: 1.0,
            r10_tissue: 1.0 / 1.3,
            r10_blood: 1.0 / 1.584,
        }
    }
}

impl Tissue {
    pub fn with_hematocrit(mut self, hematocrit: f64) -> Self {
        self.hematocrit = hematocrit;
        self
    }

    pub fn with_k_fa(mut self, k_fa: f64) -> Self {
        self.k_fa = k_fa;
        self
    }

    pub fn with_r10(mut self, r10_tissue: f64, r10_blood: f64) -> Self {
        self.r10_tissue = r10_tissue;
        self.r10_blood = r10_blood;
        self
    }
}

/// Compartment volume fractions implied by a set of PK parameters.
///
/// Without `vp` there is no blood compartment. Without `ve` the extravascular space fills the
/// remaining volume and there is no intracellular compartment. Fractions are not range checked,
/// implausible parameters can produce negative values.
pub fn volume_fractions(params: &PkParams, hematocrit: f64) -> VolumeFractions {
    let b = params.get(VP).map_or(0.0, |vp| vp / (1.0 - hematocrit));
    let (e, i) = match params.get(VE) {
        Some(ve) => (ve, 1.0 - b - ve),
        None => (1.0 - b, 0.0),
    };
    PerCompartment::new(b, e, i)
}

/// The chain of collaborator models that maps PK parameters to enhancement
#[derive(Clone, Copy)]
pub struct EnhancementModel<'a> {
    pub tissue: Tissue,
    pub pk_model: &'a dyn PkModel,
    pub relaxation_model: &'a dyn RelaxationModel,
    pub water_exchange: &'a dyn WaterExchangeModel,
    pub signal_model: &'a dyn SignalModel,
}

impl<'a> EnhancementModel<'a> {
    pub fn new(
        tissue: Tissue,
        pk_model: &'a dyn PkModel,
        relaxation_model: &'a dyn RelaxationModel,
        water_exchange: &'a dyn WaterExchangeModel,
        signal_model: &'a dyn SignalModel,
    ) -> Self {
        Self {
            tissue,
            pk_model,
            relaxation_model,
            water_exchange,
            signal_model,
        }
    }

    pub fn enhancement(&self, params: &PkParams) -> Result<Array1<f64>, DceError> {
        pk_params_to_enhancement(params, self)
    }
}

// Tracer concentration within a compartment. An empty compartment holds no tracer.
fn per_volume(amount: f64, volume: f64) -> f64 {
    if volume == 0.0 {
        0.0
    } else {
        amount / volume
    }
}

/// Predict enhancement (%) for a set of PK parameters
pub fn pk_params_to_enhancement(
    params: &PkParams,
    model: &EnhancementModel<'_>,
) -> Result<Array1<f64>, DceError> {
    let tissue = &model.tissue;
    let v = volume_fractions(params, tissue.hematocrit);
    let p = v;

    let r10_extravascular = (tissue.r10_tissue - p.b * tissue.r10_blood) / (1.0 - p.b);
    let r10 = PerCompartment::new(tissue.r10_blood, r10_extravascular, r10_extravascular);
    let pre = model
        .water_exchange
        .components(&p, &r10.map(|&r| Relaxation::longitudinal(r)));
    let s_pre = components_to_signal(1.0, &pre, tissue.k_fa, model.signal_model);

    let x = model.pk_model.params_to_vector(params)?;
    let c = model.pk_model.concentration(&x)?;
    if c.plasma.len() != c.tissue.len() || c.extravascular.len() != c.tissue.len() {
        return Err(DceError::InvalidModel(
            "compartment concentration series differ in length".into(),
        ));
    }

    let enhancement = c
        .plasma
        .iter()
        .zip(c.extravascular.iter())
        .map(|(&c_cp, &c_e)| {
            let conc = PerCompartment::new(per_volume(c_cp, v.b), per_volume(c_e, v.e), 0.0);
            let r1 = PerCompartment::new(
                model.relaxation_model.r1(r10.b, conc.b),
                model.relaxation_model.r1(r10.e, conc.e),
                model.relaxation_model.r1(r10.i, conc.i),
            );
            let post = model
                .water_exchange
                .components(&p, &r1.map(|&r| Relaxation::longitudinal(r)));
            let s_post = components_to_signal(1.0, &post, tissue.k_fa, model.signal_model);
            100.0 * (s_post - s_pre) / s_pre
        })
        .collect();
    Ok(enhancement)
}
