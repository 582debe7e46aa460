//! Decoder collaborator boundary: raw product file in, bin table out.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::geo::BinAddress;
use crate::parser::CHANNELS;

/// Group holding the binned data inside a Level-3 product.
pub const BINNED_GROUP: &str = "level-3_binned_data";

/// One latitude row of the bin grid as listed in the product's row index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowIndexEntry {
    pub start_num: u64,
    pub max: u64,
}

/// One populated bin with its concentration channels. Missing channels are NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawBin {
    pub bin_num: u64,
    pub ci_stumpf: f64,
    pub ci_cyano: f64,
    pub ci_noncyano: f64,
    pub mci_stumpf: f64,
}

/// Decoded content of one product's binned group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BinTable {
    /// Every row of the global grid, ordered by `start_num`.
    pub rows: Vec<RowIndexEntry>,
    pub bins: Vec<RawBin>,
}

impl BinTable {
    /// Joins a bin-number column with the channel columns, given in
    /// [`CHANNELS`](crate::parser::CHANNELS) order. `CI_cyano` is required;
    /// any other absent channel is filled with NaN.
    ///
    /// # Errors
    ///
    /// [`DecodeError::Missing`] without `CI_cyano`, and
    /// [`DecodeError::Malformed`] when a channel length differs from the
    /// number of bins.
    pub fn from_columns(
        rows: Vec<RowIndexEntry>,
        bin_nums: Vec<u64>,
        channels: [Option<Vec<f64>>; 4],
    ) -> Result<Self, DecodeError> {
        let mut columns = Vec::with_capacity(CHANNELS.len());
        for (name, values) in CHANNELS.into_iter().zip(channels) {
            let values = match values {
                Some(values) => values,
                None if name == "CI_cyano" => return Err(DecodeError::Missing(name.to_string())),
                None => vec![f64::NAN; bin_nums.len()],
            };
            if values.len() != bin_nums.len() {
                return Err(DecodeError::Malformed(format!(
                    "{name} has {} values for {} bins",
                    values.len(),
                    bin_nums.len()
                )));
            }
            columns.push(values);
        }

        let bins = bin_nums
            .iter()
            .enumerate()
            .map(|(i, &bin_num)| RawBin {
                bin_num,
                ci_stumpf: columns[0][i],
                ci_cyano: columns[1][i],
                ci_noncyano: columns[2][i],
                mci_stumpf: columns[3][i],
            })
            .collect();
        Ok(Self { rows, bins })
    }

    pub fn total_rows(&self) -> usize {
        self.rows.len()
    }

    /// Resolves the row containing `bin_num`: the last row whose first bin is
    /// not after it.
    pub fn locate(&self, bin_num: u64) -> Result<BinAddress, DecodeError> {
        let idx = self.rows.partition_point(|r| r.start_num <= bin_num);
        if idx == 0 {
            return Err(DecodeError::OrphanBin { bin_num });
        }
        let row_index = idx - 1;
        let row = self.rows[row_index];
        Ok(BinAddress {
            bin_num,
            row_start_num: row.start_num,
            row_max_bins: row.max,
            row_index,
            total_rows: self.total_rows(),
        })
    }
}

/// Reads a staged product file and extracts its binned group.
///
/// Decoding is synchronous file work; the loader runs it on the blocking
/// thread pool.
pub trait ProductDecoder: Send + Sync {
    fn decode(&self, path: &Path, group: &str) -> Result<BinTable, DecodeError>;
}

impl<T: ProductDecoder + ?Sized> ProductDecoder for Box<T> {
    fn decode(&self, path: &Path, group: &str) -> Result<BinTable, DecodeError> {
        (**self).decode(path, group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> BinTable {
        BinTable {
            rows: vec![
                RowIndexEntry { start_num: 1, max: 3 },
                RowIndexEntry { start_num: 4, max: 9 },
                RowIndexEntry { start_num: 13, max: 15 },
                RowIndexEntry { start_num: 28, max: 9 },
            ],
            bins: vec![],
        }
    }

    #[test]
    fn test_locate_row_boundaries() {
        let t = table();
        assert_eq!(t.locate(1).unwrap().row_index, 0);
        assert_eq!(t.locate(3).unwrap().row_index, 0);
        assert_eq!(t.locate(4).unwrap().row_index, 1);
        assert_eq!(t.locate(12).unwrap().row_index, 1);

        let a = t.locate(20).unwrap();
        assert_eq!(a.row_index, 2);
        assert_eq!(a.row_start_num, 13);
        assert_eq!(a.row_max_bins, 15);
        assert_eq!(a.total_rows, 4);
    }

    #[test]
    fn test_locate_before_first_row_is_orphan() {
        assert!(matches!(
            table().locate(0),
            Err(DecodeError::OrphanBin { bin_num: 0 })
        ));
    }

    #[test]
    fn test_locate_past_last_row_fails_geometry() {
        let a = table().locate(40).unwrap();
        assert_eq!(a.row_index, 3);
        assert!(a.geometry().is_err());
    }

    #[test]
    fn test_from_columns_fills_absent_channels() {
        let t = BinTable::from_columns(
            vec![RowIndexEntry { start_num: 1, max: 3 }],
            vec![1, 3],
            [None, Some(vec![0.01, 0.02]), None, Some(vec![0.5, 0.6])],
        )
        .unwrap();
        assert_eq!(t.bins.len(), 2);
        assert_eq!(t.bins[1].bin_num, 3);
        assert_eq!(t.bins[1].ci_cyano, 0.02);
        assert_eq!(t.bins[0].mci_stumpf, 0.5);
        assert!(t.bins.iter().all(|b| b.ci_stumpf.is_nan() && b.ci_noncyano.is_nan()));
    }

    #[test]
    fn test_from_columns_requires_ci_cyano_of_matching_length() {
        let missing = BinTable::from_columns(vec![], vec![1], [Some(vec![0.1]), None, None, None]);
        assert!(matches!(missing, Err(DecodeError::Missing(name)) if name == "CI_cyano"));

        let short = BinTable::from_columns(vec![], vec![1, 2], [None, Some(vec![0.1]), None, None]);
        assert!(matches!(short, Err(DecodeError::Malformed(_))));
    }
}
