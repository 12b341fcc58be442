// THEORY:
// The series emitter is the end of the statistics engine. Every analyzed frame
// produces one row in each of three aligned series: the rolling mean, the
// rolling variance and the rolling max. Values are stored exactly as the
// windows emitted them, and nothing is rewritten once appended. At the end of a
// run each series is handed to a `SeriesWriter` under a fixed name.

use crate::core_modules::window::WindowSums;
use crate::error::Result;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const MEAN_SERIES: &str = "mean";
pub const VARIANCE_SERIES: &str = "var";
pub const MAX_SERIES: &str = "max";

/// Append-only sequence of emitted window sums for one statistic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    values: Vec<f64>,
}

impl Series {
    pub fn push(&mut self, value: f64) {
        self.values.push(value);
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Destination for finished series, one scalar per row.
pub trait SeriesWriter {
    fn write_series(&mut self, name: &str, values: &[f64]) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct SeriesEmitter {
    mean: Series,
    variance: Series,
    max: Series,
}

impl SeriesEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, sums: WindowSums) {
        self.mean.push(sums.mean);
        self.variance.push(sums.variance);
        self.max.push(sums.max);
    }

    pub fn mean(&self) -> &Series {
        &self.mean
    }

    pub fn variance(&self) -> &Series {
        &self.variance
    }

    pub fn max(&self) -> &Series {
        &self.max
    }

    /// Number of rows emitted so far. All three series always have this length.
    pub fn rows(&self) -> usize {
        self.mean.len()
    }

    pub fn persist<W: SeriesWriter + ?Sized>(&self, writer: &mut W) -> Result<()> {
        writer.write_series(MEAN_SERIES, self.mean.values())?;
        writer.write_series(VARIANCE_SERIES, self.variance.values())?;
        writer.write_series(MAX_SERIES, self.max.values())?;
        Ok(())
    }
}

/// Writes each series to `<dir>/<name>.csv`.
#[derive(Debug, Clone)]
pub struct CsvSeriesWriter {
    dir: PathBuf,
}

impl CsvSeriesWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.csv"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SeriesWriter for CsvSeriesWriter {
    fn write_series(&mut self, name: &str, values: &[f64]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut out = BufWriter::new(File::create(self.path_for(name))?);
        for value in values {
            writeln!(out, "{value}")?;
        }
        out.flush()?;
        Ok(())
    }
}
