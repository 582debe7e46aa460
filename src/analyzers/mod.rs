//! Bloom classification and temporal regularization.
//!
//! Turns the decoded per-bin records of a run into HAB-classified records,
//! daily samples, and a gap-filled weekly series ready for forecasting and
//! trend/seasonal decomposition.

pub mod aggregate;
pub mod analyzer;
pub mod decompose;
pub mod hab;
pub mod impute;
pub mod types;
pub mod under_detect;
pub mod utility;
