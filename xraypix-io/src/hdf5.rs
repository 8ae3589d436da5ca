//! HDF5 histogram output.
//!
//! Each histogram becomes a group named after it, holding a `contents`
//! dataset (`bins + 2` values, underflow first) and an `edges` dataset
//! (`bins + 1` in-range bin edges).

use crate::writer::HistogramSink;
use crate::{Error, Result};
use hdf5::types::VarLenUnicode;
use hdf5::{Dataset, File, Group};
use ndarray::ArrayView1;
use std::path::Path;
use std::str::FromStr;
use xraypix_core::Histogram1D;

/// Writer for histograms into an HDF5 file.
pub struct Hdf5HistogramWriter {
    file: Option<File>,
}

impl Hdf5HistogramWriter {
    /// Creates the output file and records the run target.
    ///
    /// # Errors
    /// Returns an error if the HDF5 file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, target: &str) -> Result<Self> {
        let file = File::create(path)?;
        set_attr_str_group(&file, "xraypix_format_version", "0.1")?;
        set_attr_str_group(&file, "target", target)?;
        Ok(Self { file: Some(file) })
    }

    fn file(&self) -> Result<&File> {
        self.file
            .as_ref()
            .ok_or_else(|| Error::InvalidFormat("HDF5 output already closed".to_string()))
    }
}

impl HistogramSink for Hdf5HistogramWriter {
    fn persist(&mut self, histogram: &Histogram1D) -> Result<()> {
        let group = self.file()?.create_group(histogram.name())?;
        set_attr_str_group(&group, "title", histogram.title())?;
        group
            .new_attr::<u64>()
            .create("entries")?
            .write_scalar(&histogram.entries())?;

        let contents = create_dataset(&group, "contents", histogram.contents())?;
        set_dataset_units(&contents, "count")?;

        let edges: Vec<f64> = (1..=histogram.bins() + 1)
            .map(|bin| histogram.bin_low_edge(bin))
            .collect();
        create_dataset(&group, "edges", &edges)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            file.flush()?;
        }
        Ok(())
    }
}

fn create_dataset(group: &Group, name: &str, values: &[f64]) -> Result<Dataset> {
    let dataset = group.new_dataset::<f64>().shape(values.len()).create(name)?;
    dataset.write(ArrayView1::from(values))?;
    Ok(dataset)
}

fn set_dataset_units(dataset: &Dataset, units: &str) -> Result<()> {
    let value = to_var_len_unicode(units)?;
    dataset
        .new_attr::<VarLenUnicode>()
        .create("units")?
        .write_scalar(&value)?;
    Ok(())
}

fn set_attr_str_group(group: &Group, name: &str, value: &str) -> Result<()> {
    let value = to_var_len_unicode(value)?;
    group
        .new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

fn to_var_len_unicode(value: &str) -> Result<VarLenUnicode> {
    VarLenUnicode::from_str(value)
        .map_err(|e| Error::InvalidFormat(format!("invalid utf-8 attribute: {e}")))
}
