//! Report output port.

use crate::domain::analysis::Analysis;
use crate::domain::error::FolioError;
use std::path::{Path, PathBuf};

pub trait ReportPort {
    /// Write the analysis under `output_dir` and return the files written.
    fn write(&self, analysis: &Analysis, output_dir: &Path) -> Result<Vec<PathBuf>, FolioError>;
}
