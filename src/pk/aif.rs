//! Arterial input functions

use ndarray::Array1;

use crate::error::DceError;

/// Plasma concentration (mM) of the arterial input, sampled at `times` (s)
#[derive(Debug, Clone, PartialEq)]
pub struct Aif {
    times: Array1<f64>,
    plasma: Array1<f64>,
}

impl Aif {
    pub fn new(times: Array1<f64>, plasma: Array1<f64>) -> Result<Self, DceError> {
        if times.len() != plasma.len() {
            return Err(DceError::LengthMismatch {
                what: "AIF plasma concentration",
                expected: times.len(),
                found: plasma.len(),
            });
        }
        Ok(Self { times, plasma })
    }

    /// Parker population AIF (Magn Reson Med 2006;56:993).
    ///
    /// The published curve describes whole-blood concentration; the plasma curve is obtained by
    /// dividing by `1 - hematocrit`. `delay` shifts the bolus arrival, in seconds.
    pub fn parker(times: &Array1<f64>, hematocrit: f64, delay: f64) -> Self {
        const A1: f64 = 0.809;
        const A2: f64 = 0.330;
        const T1: f64 = 0.17046;
        const T2: f64 = 0.365;
        const SIGMA1: f64 = 0.0563;
        const SIGMA2: f64 = 0.132;
        const ALPHA: f64 = 1.050;
        const BETA: f64 = 0.1685;
        const S: f64 = 38.078;
        const TAU: f64 = 0.483;

        let gaussian = |t: f64, a: f64, mu: f64, sigma: f64| {
            a / (sigma * (2.0 * std::f64::consts::PI).sqrt())
                * (-(t - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
        };

        let plasma = times.mapv(|t| {
            let t_min = (t - delay) / 60.0;
            if t_min < 0.0 {
                return 0.0;
            }
            let blood = gaussian(t_min, A1, T1, SIGMA1)
                + gaussian(t_min, A2, T2, SIGMA2)
                + ALPHA * (-BETA * t_min).exp() / (1.0 + (-S * (t_min - TAU)).exp());
            blood / (1.0 - hematocrit)
        });

        Self {
            times: times.clone(),
            plasma,
        }
    }

    pub fn times(&self) -> &Array1<f64> {
        &self.times
    }

    pub fn plasma(&self) -> &Array1<f64> {
        &self.plasma
    }

    /// Sample times in minutes
    pub fn times_min(&self) -> Array1<f64> {
        self.times.mapv(|t| t / 60.0)
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}
