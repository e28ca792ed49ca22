use crate::error::DceError;

use super::{
    check_len, cumulative_trapezoid, Aif, CompartmentConcentrations, Constraints, PkModel, PS, VP,
};

/// Patlak model.
///
/// # Assumptions
/// - parameters are `vp` and `ps` (min^-1), in that order
/// - no backflux from the extravascular space
/// - there is no extravascular volume parameter, so the extravascular space is treated as
///   saturated and the tissue is two-compartment
#[derive(Debug, Clone)]
pub struct Patlak {
    aif: Aif,
}

impl Patlak {
    pub fn new(aif: Aif) -> Self {
        Self { aif }
    }

    pub fn aif(&self) -> &Aif {
        &self.aif
    }
}

impl PkModel for Patlak {
    fn parameter_names(&self) -> &[&'static str] {
        &[VP, PS]
    }

    fn typical_values(&self) -> Vec<f64> {
        vec![0.05, 0.01]
    }

    fn constraints(&self) -> Constraints {
        Constraints::new(vec![(0.0, 1.0), (0.0, f64::INFINITY)])
    }

    fn concentration(&self, x: &[f64]) -> Result<CompartmentConcentrations, DceError> {
        check_len(self, x)?;
        let (vp, ps) = (x[0], x[1]);
        let cp = self.aif.plasma();
        let plasma = cp.mapv(|c| vp * c);
        let extravascular = cumulative_trapezoid(&self.aif.times_min(), cp) * ps;
        Ok(CompartmentConcentrations {
            tissue: &plasma + &extravascular,
            plasma,
            extravascular,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array1};

    #[test]
    fn constant_input_gives_linear_uptake() {
        let t = array![0.0, 60.0, 120.0, 180.0];
        let aif = Aif::new(t, Array1::from_elem(4, 2.0)).unwrap();
        let model = Patlak::new(aif);
        let c = model.concentration(&[0.1, 0.05]).unwrap();
        assert_eq!(c.plasma, array![0.2, 0.2, 0.2, 0.2]);
        for (n, &ce) in c.extravascular.iter().enumerate() {
            assert_relative_eq!(ce, 0.05 * 2.0 * n as f64, epsilon = 1e-12);
        }
        assert_relative_eq!(c.tissue[3], 0.2 + 0.3, epsilon = 1e-12);
    }

    #[test]
    fn rejects_wrong_parameter_count() {
        let model = Patlak::new(Aif::new(array![0.0], array![0.0]).unwrap());
        assert!(model.concentration(&[0.1, 0.2, 0.3]).is_err());
    }
}
