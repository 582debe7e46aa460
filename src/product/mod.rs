//! Level-3 binned product selection and archive naming.
//!
//! File names follow the OB.DAAC convention, e.g. `L2024003.L3b_DAY_CYAN.nc`
//! for a daily OLCI product.

pub mod decoder;
#[cfg(feature = "native")]
pub mod native;
pub mod ncdump;

pub use decoder::{BINNED_GROUP, BinTable, ProductDecoder, RawBin, RowIndexEntry};
#[cfg(feature = "native")]
pub use native::NetcdfDecoder;
pub use ncdump::NcdumpDecoder;

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

pub const DEFAULT_BASE_URL: &str = "https://oceandata.sci.gsfc.nasa.gov/cgi/getfile/";

/// Instrument family of the product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Instrument {
    Meris,
    Olci,
}

/// Temporal compositing window of the product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TemporalResolution {
    Day,
    SevenDay,
}

impl Instrument {
    fn prefix(self) -> char {
        match self {
            Instrument::Meris => 'M',
            Instrument::Olci => 'L',
        }
    }
}

impl FromStr for Instrument {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        if upper.contains("MERIS") {
            Ok(Instrument::Meris)
        } else if upper.contains("OLCI") {
            Ok(Instrument::Olci)
        } else {
            Err(ConfigurationError::UnknownInstrument(s.to_string()))
        }
    }
}

impl FromStr for TemporalResolution {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        if upper.contains("DAY") {
            Ok(TemporalResolution::Day)
        } else if upper.contains("7D") {
            Ok(TemporalResolution::SevenDay)
        } else {
            Err(ConfigurationError::UnsupportedResolution(s.to_string()))
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instrument::Meris => write!(f, "MERIS"),
            Instrument::Olci => write!(f, "OLCI"),
        }
    }
}

impl fmt::Display for TemporalResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemporalResolution::Day => write!(f, "DAY"),
            TemporalResolution::SevenDay => write!(f, "7D"),
        }
    }
}

impl TryFrom<String> for Instrument {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Instrument> for String {
    fn from(value: Instrument) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for TemporalResolution {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TemporalResolution> for String {
    fn from(value: TemporalResolution) -> Self {
        value.to_string()
    }
}

/// Which product to request for a given day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSelector {
    pub instrument: Instrument,
    pub resolution: TemporalResolution,
    pub suffix: String,
}

impl Default for ProductSelector {
    fn default() -> Self {
        Self {
            instrument: Instrument::Olci,
            resolution: TemporalResolution::Day,
            suffix: "CYAN".to_string(),
        }
    }
}

impl ProductSelector {
    /// Builds a selector from free-form names, as accepted on the command line.
    pub fn from_names(
        instrument: &str,
        resolution: &str,
        suffix: &str,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self {
            instrument: instrument.parse()?,
            resolution: resolution.parse()?,
            suffix: suffix.to_string(),
        })
    }

    /// Archive file name of the product covering `date`.
    pub fn filename(&self, date: NaiveDate) -> Result<String, ConfigurationError> {
        let prefix = self.instrument.prefix();
        match self.resolution {
            TemporalResolution::Day => Ok(format!(
                "{prefix}{}.L3b_DAY_{}.nc",
                date.format("%Y%j"),
                self.suffix
            )),
            TemporalResolution::SevenDay => {
                let (lo, hi) = seven_day_window(date)?;
                let tag = match self.instrument {
                    Instrument::Meris => "L3b_7D",
                    Instrument::Olci => "L3b_7D_S3A",
                };
                Ok(format!(
                    "{prefix}{}{}.{tag}_{}.nc",
                    lo.format("%Y%j"),
                    hi.format("%Y%j"),
                    self.suffix
                ))
            }
        }
    }

    /// Full resource identifier of the product covering `date`.
    pub fn url(&self, base_url: &str, date: NaiveDate) -> Result<String, ConfigurationError> {
        Ok(format!("{}{}", base_url, self.filename(date)?))
    }
}

/// Bounds of the 7-day composite containing `date`.
///
/// Windows end on a day-of-year that is a multiple of 7 and start six days
/// earlier.
pub fn seven_day_window(date: NaiveDate) -> Result<(NaiveDate, NaiveDate), ConfigurationError> {
    let idx = date.ordinal0();
    let hi_idx = 7 * (1 + idx / 7);
    let hi = date
        .checked_add_days(Days::new(u64::from(hi_idx - idx - 1)))
        .ok_or_else(|| ConfigurationError::Invalid(format!("composite window overflow at {date}")))?;
    let lo = hi
        .checked_sub_days(Days::new(6))
        .ok_or_else(|| ConfigurationError::Invalid(format!("composite window underflow at {date}")))?;
    Ok((lo, hi))
}
