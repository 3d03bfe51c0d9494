//! CSV projections of an [`Experiment`].

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::info;

use super::{Experiment, ExperimentError, WideTable};
use crate::trace::columns;

/// Files written by [`Experiment::save_csvs`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvExports {
    /// `<id>_hplc-long.csv`
    pub hplc_long: Option<PathBuf>,
    /// `<id>_hplc-wide.csv`
    pub hplc_wide: Option<PathBuf>,
    /// `<id>_fplc.csv`
    pub fplc: Option<PathBuf>,
}

impl Experiment {
    /// Write the long-form HPLC table with a header row.
    pub fn write_hplc_long<W: Write>(&self, writer: W) -> Result<(), ExperimentError> {
        let rows = self.hplc().ok_or(ExperimentError::NoData("HPLC"))?;
        let mut csv = csv::Writer::from_writer(writer);
        for row in rows {
            csv.serialize(row)?;
        }
        csv.flush()?;
        Ok(())
    }

    /// Write the Time x "Sample Channel" pivot of HPLC signal.
    pub fn write_hplc_wide<W: Write>(&self, writer: W) -> Result<(), ExperimentError> {
        let wide = self.wide_projection()?;
        write_wide(&wide, writer)
    }

    /// Write the long-form FPLC table with a header row.
    pub fn write_fplc<W: Write>(&self, writer: W) -> Result<(), ExperimentError> {
        let rows = self.fplc().ok_or(ExperimentError::NoData("FPLC"))?;
        let mut csv = csv::Writer::from_writer(writer);
        for row in rows {
            csv.serialize(row)?;
        }
        csv.flush()?;
        Ok(())
    }

    /// Write every available CSV projection into `dir`.
    pub fn save_csvs<P: AsRef<Path>>(&self, dir: P) -> Result<CsvExports, ExperimentError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let mut exports = CsvExports::default();

        if self.hplc().is_some() {
            let long = dir.join(format!("{}_hplc-long.csv", self.id()));
            self.write_hplc_long(File::create(&long)?)?;
            let wide = dir.join(format!("{}_hplc-wide.csv", self.id()));
            self.write_hplc_wide(File::create(&wide)?)?;
            info!("Wrote {} and {}", long.display(), wide.display());
            exports.hplc_long = Some(long);
            exports.hplc_wide = Some(wide);
        }
        if self.fplc().is_some() {
            let path = dir.join(format!("{}_fplc.csv", self.id()));
            self.write_fplc(File::create(&path)?)?;
            info!("Wrote {}", path.display());
            exports.fplc = Some(path);
        }
        Ok(exports)
    }
}

fn write_wide<W: Write>(wide: &WideTable, writer: W) -> Result<(), ExperimentError> {
    let mut csv = csv::Writer::from_writer(writer);
    let mut header = Vec::with_capacity(wide.columns.len() + 1);
    header.push(columns::TIME.to_string());
    header.extend(wide.columns.iter().cloned());
    csv.write_record(&header)?;

    for row in &wide.rows {
        let mut record = Vec::with_capacity(row.values.len() + 1);
        record.push(row.time.to_string());
        record.extend(
            row.values
                .iter()
                .map(|v| v.map(|v| v.to_string()).unwrap_or_default()),
        );
        csv.write_record(&record)?;
    }
    csv.flush()?;
    Ok(())
}
