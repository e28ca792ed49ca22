//! Configuration of a conversion and fitting session
//!
//! Every section falls back to its default when absent, so a configuration file only needs to
//! name the values that differ.
//!
//! ```json
//! {
//!     "tissue": { "hematocrit": 0.45, "r10_tissue": 0.8 },
//!     "signal": { "tr": 0.004, "te": 0.002, "fa": 12.0 },
//!     "water_exchange": "no"
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::convert::RootOptions;
use crate::error::DceError;
use crate::fit::FitOptions;
use crate::pk::PkModel;
use crate::relaxation::LinearRelaxivity;
use crate::signal::{Spgr, WaterExchange};
use crate::tissue::{EnhancementModel, Tissue};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DceConfig {
    pub tissue: Tissue,
    pub signal: Spgr,
    pub relaxivity: LinearRelaxivity,
    pub water_exchange: WaterExchange,
    pub fit: FitOptions,
    pub root: RootOptions,
}

impl DceConfig {
    pub fn from_json(json: &str) -> Result<Self, DceError> {
        let config: DceConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, DceError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<(), DceError> {
        if !(0.0..1.0).contains(&self.tissue.hematocrit) {
            return Err(DceError::Config(format!(
                "hematocrit must be in [0, 1), got {}",
                self.tissue.hematocrit
            )));
        }
        if self.signal.tr <= 0.0 {
            return Err(DceError::Config(format!(
                "repetition time must be positive, got {}",
                self.signal.tr
            )));
        }
        if self.root.tolerance <= 0.0 || self.fit.sd_tolerance < 0.0 {
            return Err(DceError::Config("tolerances must be positive".into()));
        }
        Ok(())
    }

    /// Forward model built from this configuration and the given PK model
    pub fn enhancement_model<'a>(&'a self, pk_model: &'a dyn PkModel) -> EnhancementModel<'a> {
        EnhancementModel::new(
            self.tissue,
            pk_model,
            &self.relaxivity,
            &self.water_exchange,
            &self.signal,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn empty_document_gives_defaults() {
        assert_eq!(DceConfig::from_json("{}").unwrap(), DceConfig::default());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = DceConfig::from_json(
            r#"{
                "tissue": { "hematocrit": 0.45 },
                "signal": { "tr": 0.004, "te": 0.002, "fa": 12.0 },
                "water_exchange": "no",
                "fit": { "parallel": false }
            }"#,
        )
        .unwrap();
        assert_eq!(config.tissue.hematocrit, 0.45);
        assert_eq!(config.tissue.k_fa, 1.0);
        assert_eq!(config.signal.fa, 12.0);
        assert_eq!(config.water_exchange, WaterExchange::No);
        assert!(!config.fit.parallel);
        assert_eq!(config.fit.max_iters, FitOptions::default().max_iters);
    }

    #[test]
    fn invalid_values_are_config_errors() {
        let err = DceConfig::from_json(r#"{ "tissue": { "hematocrit": 1.2 } }"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        let err = DceConfig::from_json("{ not json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn round_trips_through_json() {
        let config = DceConfig {
            water_exchange: WaterExchange::No,
            ..DceConfig::default()
        };
        let json = config.to_json().unwrap();
        assert_eq!(DceConfig::from_json(&json).unwrap(), config);
    }
}
