//! Binned-product decoder over the netCDF-C library.
//!
//! Needs `libnetcdf` and `libhdf5` at build time
//! (`apt install libnetcdf-dev libhdf5-dev`).

use std::path::Path;

use netcdf::{Group, NcTypeDescriptor};
use tracing::debug;

use super::decoder::{BinTable, ProductDecoder, RowIndexEntry};
use crate::error::DecodeError;
use crate::parser::CHANNELS;

/// `BinIndex` record: one latitude row of the grid.
#[allow(dead_code)]
#[repr(C)]
#[derive(netcdf::NcType, Debug, Clone, Copy, PartialEq)]
#[netcdf(rename = "binIndexType")]
pub(crate) struct BinIndexRecord {
    pub start_num: u32,
    pub begin: u32,
    pub extent: u32,
    pub max: i32,
}

/// `BinList` record: one populated bin.
#[allow(dead_code)]
#[repr(C)]
#[derive(netcdf::NcType, Debug, Clone, Copy, PartialEq)]
#[netcdf(rename = "binListType")]
pub(crate) struct BinListRecord {
    pub bin_num: u32,
    pub nobs: i16,
    pub nscenes: i16,
    pub weights: f32,
    pub time_rec: f32,
}

/// Channel record; only `sum` is kept.
#[allow(dead_code)]
#[repr(C)]
#[derive(netcdf::NcType, Debug, Clone, Copy, PartialEq)]
#[netcdf(rename = "binDataType")]
pub(crate) struct BinDataRecord {
    pub sum: f32,
    pub sum_squared: f32,
}

/// Reads `BinIndex`, `BinList` and the concentration channels straight from
/// the product file.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetcdfDecoder;

impl NetcdfDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl ProductDecoder for NetcdfDecoder {
    fn decode(&self, path: &Path, group: &str) -> Result<BinTable, DecodeError> {
        let file = netcdf::open(path)?;
        let binned = file
            .group(group)?
            .ok_or_else(|| DecodeError::Missing(format!("group {group}")))?;

        let index: Vec<BinIndexRecord> = read(&binned, "BinIndex")?
            .ok_or_else(|| DecodeError::Missing("BinIndex".to_string()))?;
        let rows = index
            .iter()
            .map(|r| {
                let max = u64::try_from(r.max).map_err(|_| {
                    DecodeError::Malformed(format!("row {} has max {}", r.start_num, r.max))
                })?;
                Ok(RowIndexEntry {
                    start_num: u64::from(r.start_num),
                    max,
                })
            })
            .collect::<Result<Vec<_>, DecodeError>>()?;

        let list: Vec<BinListRecord> = read(&binned, "BinList")?
            .ok_or_else(|| DecodeError::Missing("BinList".to_string()))?;
        let bin_nums = list.iter().map(|b| u64::from(b.bin_num)).collect();

        let mut channels: [Option<Vec<f64>>; 4] = Default::default();
        for (slot, name) in channels.iter_mut().zip(CHANNELS) {
            *slot = read::<BinDataRecord>(&binned, name)?
                .map(|values| values.iter().map(|v| f64::from(v.sum)).collect());
        }

        let table = BinTable::from_columns(rows, bin_nums, channels)?;
        debug!(
            rows = table.total_rows(),
            bins = table.bins.len(),
            "Binned group decoded"
        );
        Ok(table)
    }
}

/// All values of a compound variable, or `None` when the group lacks it.
fn read<T: NcTypeDescriptor + Copy>(group: &Group, name: &str) -> Result<Option<Vec<T>>, DecodeError> {
    match group.variable(name) {
        Some(var) => Ok(Some(var.get_values::<T, _>(..)?)),
        None => Ok(None),
    }
}
