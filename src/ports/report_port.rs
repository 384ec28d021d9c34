//! Report generation port trait.

use crate::domain::analysis::Analysis;
use crate::domain::error::TwscanError;

/// Port for writing one ticker's analysis.
pub trait ReportPort {
    fn write(&self, analysis: &Analysis, output_path: &str) -> Result<(), TwscanError>;

    /// Writes each analysis; the default names files `<dir>/<ticker>.csv`.
    fn write_all(&self, analyses: &[Analysis], output_dir: &str) -> Result<Vec<String>, TwscanError> {
        let mut paths = Vec::with_capacity(analyses.len());
        for analysis in analyses {
            let path = std::path::Path::new(output_dir)
                .join(format!("{}.csv", analysis.ticker))
                .to_string_lossy()
                .into_owned();
            self.write(analysis, &path)?;
            paths.push(path);
        }
        Ok(paths)
    }
}
