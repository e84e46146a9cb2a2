//! Read/write surrogate JSON files.
//!
//! A surrogate file is the portable form of a fit run:
//!
//! - the fitted classifier and per-outcome hit / miss regressors
//! - the settings they were fitted with
//! - training covariate summaries (for default slice bounds and medians)
//! - held-out diagnostics, when a test split was used

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ClassifierKind, DatasetStats, FitConfig, RegressorKind, SearchConfig};
use crate::error::AppError;
use crate::fit::{Diagnostics, SurrogateSet};

pub const TOOL_NAME: &str = "surr";

/// Fit settings recorded alongside the models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSettings {
    pub source_csv: String,
    pub classifier: ClassifierKind,
    pub regressor: RegressorKind,
    pub test_fraction: f64,
    pub seed: u64,
    pub search: SearchConfig,
    pub zscore_limit: Option<f64>,
    pub fragility_beta: f64,
}

impl FitSettings {
    pub fn from_config(config: &FitConfig) -> Self {
        Self {
            source_csv: config.csv_path.display().to_string(),
            classifier: config.classifier,
            regressor: config.regressor,
            test_fraction: config.test_fraction,
            seed: config.seed,
            search: config.search,
            zscore_limit: config.zscore_limit,
            fragility_beta: config.fragility_beta,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurrogateFile {
    pub tool: String,
    pub created_at: DateTime<Utc>,
    pub settings: FitSettings,
    /// Summary of the training rows.
    pub stats: DatasetStats,
    pub surrogates: SurrogateSet,
    pub diagnostics: Option<Diagnostics>,
}

impl SurrogateFile {
    pub fn new(
        config: &FitConfig,
        stats: DatasetStats,
        surrogates: SurrogateSet,
        diagnostics: Option<Diagnostics>,
    ) -> Self {
        Self {
            tool: TOOL_NAME.to_string(),
            created_at: Utc::now(),
            settings: FitSettings::from_config(config),
            stats,
            surrogates,
            diagnostics,
        }
    }
}

pub fn write_surrogate_json(path: &Path, file: &SurrogateFile) -> Result<(), AppError> {
    let out = File::create(path)
        .map_err(|e| AppError::usage(format!("Failed to create surrogate JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(out, file)
        .map_err(|e| AppError::usage(format!("Failed to write surrogate JSON: {e}")))?;
    tracing::info!(path = %path.display(), "wrote surrogate JSON");
    Ok(())
}

pub fn read_surrogate_json(path: &Path) -> Result<SurrogateFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::usage(format!("Failed to open surrogate JSON '{}': {e}", path.display())))?;
    let parsed: SurrogateFile = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AppError::usage(format!("Invalid surrogate JSON: {e}")))?;
    if parsed.surrogates.outcomes.is_empty() {
        return Err(AppError::usage("Surrogate JSON contains no outcome models."));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::data::synthetic::{SyntheticConfig, generate_database};
    use crate::data::compute_stats;
    use crate::fit::{covariate_matrix, fit_surrogates};
    use crate::predict::predict_outcomes;

    #[test]
    fn round_trip_preserves_predictions() {
        let db = generate_database(&SyntheticConfig {
            count: 50,
            seed: 9,
            ..SyntheticConfig::default()
        })
        .unwrap();
        let search = SearchConfig {
            grid_steps: 3,
            cv_folds: 3,
            seed: 9,
        };
        let set = fit_surrogates(&db, ClassifierKind::Gpc, RegressorKind::Gpr, &search).unwrap();
        let config = FitConfig {
            csv_path: PathBuf::from("db.csv"),
            classifier: ClassifierKind::Gpc,
            regressor: RegressorKind::Gpr,
            test_fraction: 0.0,
            seed: 9,
            search,
            zscore_limit: None,
            fragility_beta: 0.25,
            export_model: None,
            export_predictions: None,
        };
        let file = SurrogateFile::new(&config, compute_stats(&db).unwrap(), set, None);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        write_surrogate_json(&path, &file).unwrap();
        let back = read_surrogate_json(&path).unwrap();

        assert_eq!(back.tool, TOOL_NAME);
        assert_eq!(back.settings, file.settings);
        assert_eq!(back.stats.n_rows, file.stats.n_rows);
        assert_eq!(back.surrogates.n_hit, file.surrogates.n_hit);

        let x = covariate_matrix(&db[..10]);
        let before = predict_outcomes(&file.surrogates, &x).unwrap();
        let after = predict_outcomes(&back.surrogates, &x).unwrap();
        for (a, b) in before.iter().zip(&after) {
            assert!((a.p_hit - b.p_hit).abs() < 1e-9);
            for ((_, ea), (_, eb)) in a.outcomes.iter().zip(&b.outcomes) {
                assert!((ea.expected - eb.expected).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn missing_file_is_usage_error() {
        let err = read_surrogate_json(Path::new("/nonexistent/model.json")).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_USAGE);
    }
}
