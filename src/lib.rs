//! Conversion and pharmacokinetic fitting of dynamic contrast-enhanced MRI tissue curves.
//!
//! A tissue curve has three representations: raw signal, enhancement (% change from the
//! pre-contrast baseline) and tracer concentration (mM). [`convert`] translates between them,
//! [`tissue`] predicts enhancement from PK parameters through a multi-compartment model and
//! [`fit`] inverts either relationship by multi-start nonlinear least squares.
//!
//! The PK model, relaxation model, water-exchange model and signal model are pluggable
//! strategies, see [`PkModel`], [`RelaxationModel`], [`WaterExchangeModel`] and
//! [`SignalModel`].
//!
//! ```rust,ignore
//! use dcefit::prelude::*;
//!
//! let t = ndarray::Array1::linspace(0.0, 300.0, 61);
//! let pk = Patlak::new(Aif::parker(&t, 0.42, 30.0));
//! let config = DceConfig::default();
//! let model = config.enhancement_model(&pk);
//!
//! let enhancement = model.enhancement(&PkParams::from([("vp", 0.05), ("ps", 0.01)]))?;
//! let fit = fit_enhancement(&enhancement, &model, None, None, &config.fit)?;
//! println!("{:?}", fit.params);
//! ```

pub mod config;
pub mod convert;
pub mod error;
pub mod fit;
pub mod pk;
pub mod relaxation;
pub mod signal;
pub mod tissue;

pub use config::DceConfig;
pub use convert::{
    concentration_to_enhancement, enhancement_to_concentration, signal_to_enhancement,
    RootOptions,
};
pub use error::{DceError, ErrorKind};
pub use fit::{
    fit_concentration, fit_enhancement, minimize_global, FitOptions, FitResult, LocalMinimum,
};
pub use pk::{
    random_initial_guesses, Aif, CompartmentConcentrations, Constraints, ExtendedTofts,
    LinearInequality, Patlak, PkModel, PkParams,
};
pub use relaxation::{LinearRelaxivity, RelaxationModel};
pub use signal::{
    Compartment, FastExchange, NoExchange, PerCompartment, Relaxation, SignalModel, Spgr,
    WaterExchange, WaterExchangeModel,
};
pub use tissue::{
    pk_params_to_enhancement, volume_fractions, EnhancementModel, Tissue, VolumeFractions,
};

pub mod prelude {
    pub mod models {
        pub use crate::pk::{Aif, ExtendedTofts, Patlak};
        pub use crate::relaxation::LinearRelaxivity;
        pub use crate::signal::{FastExchange, NoExchange, Spgr, WaterExchange};
    }

    pub use crate::config::DceConfig;
    pub use crate::convert::*;
    pub use crate::error::{DceError, ErrorKind};
    pub use crate::fit::{fit_concentration, fit_enhancement, FitOptions, FitResult};
    pub use crate::pk::{Aif, ExtendedTofts, Patlak, PkModel, PkParams};
    pub use crate::relaxation::RelaxationModel;
    pub use crate::signal::{SignalModel, WaterExchangeModel};
    pub use crate::tissue::{EnhancementModel, Tissue};
}
