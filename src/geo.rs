//! Geometry of the global equal-area (sinusoidal) bin grid used by Level-3
//! binned ocean-color products.
//!
//! The grid is split into `total_rows` latitude rows of equal height. Each row
//! holds `row_max_bins` equal-width bins, and bins are numbered globally so a
//! row is identified by the number of its first bin.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Location of one bin inside the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinAddress {
    pub bin_num: u64,
    pub row_start_num: u64,
    pub row_max_bins: u64,
    pub row_index: usize,
    pub total_rows: usize,
}

/// Centre and bounds of one bin, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellGeometry {
    pub clat: f64,
    pub clon: f64,
    pub north: f64,
    pub south: f64,
    pub west: f64,
    pub east: f64,
}

impl BinAddress {
    /// Checks the row invariants the geometry formulas rely on.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.row_max_bins == 0 {
            return Err(DomainError::EmptyRow {
                row_index: self.row_index,
            });
        }
        if self.row_index >= self.total_rows {
            return Err(DomainError::RowOutOfRange {
                row_index: self.row_index,
                total_rows: self.total_rows,
            });
        }
        if self.bin_num < self.row_start_num || self.bin_num - self.row_start_num >= self.row_max_bins
        {
            return Err(DomainError::BinOutOfRow {
                bin_num: self.bin_num,
                row_start_num: self.row_start_num,
                row_max_bins: self.row_max_bins,
            });
        }
        Ok(())
    }

    /// Decodes the bin into its cell geometry.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError`] when the address violates the row invariants;
    /// a zero-bin row is never divided through.
    pub fn geometry(&self) -> Result<CellGeometry, DomainError> {
        self.validate()?;

        let row_height = 180.0 / self.total_rows as f64;
        let max_bins = self.row_max_bins as f64;
        let offset = (self.bin_num - self.row_start_num) as f64;

        let clat = (self.row_index as f64 + 0.5) * row_height - 90.0;
        let clon = 360.0 * (offset + 0.5) / max_bins - 180.0;

        Ok(CellGeometry {
            clat,
            clon,
            north: clat + row_height / 2.0,
            south: clat - row_height / 2.0,
            west: clon - 180.0 / max_bins,
            east: clon + 180.0 / max_bins,
        })
    }
}

/// Geographic selection applied to decoded bins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    /// A cell is inside only when all four of its bounds are.
    pub fn contains(&self, cell: &CellGeometry) -> bool {
        cell.west >= self.lon_min
            && cell.east <= self.lon_max
            && cell.south >= self.lat_min
            && cell.north <= self.lat_max
    }

    pub fn is_valid(&self) -> bool {
        self.lat_min < self.lat_max && self.lon_min < self.lon_max
    }
}
