//! CSV ingest and normalization.
//!
//! This module turns a simulation-database CSV into clean [`Observation`]s that
//! are safe to fit.
//!
//! - strict schema: every covariate and outcome must be available either as a
//!   direct column or through its derivation columns (exit code 2 otherwise)
//! - row-level validation: bad rows are skipped and reported
//! - outlier screening on the collapse probability

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use csv::StringRecord;

use crate::data::derive;
use crate::data::fragility::Fragility;
use crate::domain::{Covariate, CovariateSummary, DatasetStats, FitConfig, N_COVARIATES, Observation, Outcome};
use crate::error::AppError;
use crate::math::{median, zscores};

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub id: Option<String>,
    pub message: String,
}

/// Ingest output: observations + stats + what was dropped along the way.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub observations: Vec<Observation>,
    pub stats: DatasetStats,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
    /// Rows removed by the collapse-probability outlier screen.
    pub rows_filtered: usize,
}

/// Covariate rows to predict on.
#[derive(Debug, Clone)]
pub struct DesignTable {
    /// Row ids (`row-<line>` when the file has no id column).
    pub ids: Vec<String>,
    pub designs: Vec<[f64; N_COVARIATES]>,
    pub row_errors: Vec<RowError>,
}

/// Load the training database, derive missing columns, and screen outliers.
pub fn load_database(config: &FitConfig) -> Result<Dataset, AppError> {
    let fragility = Fragility::anchored(config.fragility_beta).ok_or_else(|| {
        AppError::usage(format!(
            "Fragility dispersion must be finite and > 0, got {}.",
            config.fragility_beta
        ))
    })?;

    let (headers, mut reader) = open_csv(&config.csv_path)?;
    let columns = Columns::new(&headers);
    columns.ensure_covariates()?;
    columns.ensure_outcomes()?;

    let mut observations = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Records start on line 2, after the header.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    id: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let id = columns.row_id(&record, line);
        match columns.observation(&record, id.clone(), &fragility) {
            Ok(obs) => observations.push(obs),
            Err(message) => row_errors.push(RowError {
                line,
                id: Some(id),
                message,
            }),
        }
    }

    for err in &row_errors {
        tracing::warn!(line = err.line, id = err.id.as_deref().unwrap_or(""), "skipped row: {}", err.message);
    }

    let rows_parsed = observations.len();
    if let Some(limit) = config.zscore_limit {
        observations = screen_outliers(observations, limit);
    }
    let rows_filtered = rows_parsed - observations.len();
    if rows_filtered > 0 {
        tracing::info!(rows_filtered, "dropped collapse-probability outliers");
    }

    let rows_used = observations.len();
    if rows_used == 0 {
        return Err(AppError::data("No valid rows remain after normalization/filtering."));
    }
    let stats = compute_stats(&observations)
        .ok_or_else(|| AppError::data("No valid rows remain after normalization/filtering."))?;

    Ok(Dataset {
        observations,
        stats,
        row_errors,
        rows_read,
        rows_used,
        rows_filtered,
    })
}

/// Load covariate rows (direct or derivable) for prediction.
pub fn load_designs(path: &Path) -> Result<DesignTable, AppError> {
    let (headers, mut reader) = open_csv(path)?;
    let columns = Columns::new(&headers);
    columns.ensure_covariates()?;

    let mut table = DesignTable {
        ids: Vec::new(),
        designs: Vec::new(),
        row_errors: Vec::new(),
    };

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                table.row_errors.push(RowError {
                    line,
                    id: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };
        let id = columns.row_id(&record, line);
        match columns.covariates(&record) {
            Ok(x) => {
                table.ids.push(id);
                table.designs.push(x);
            }
            Err(message) => table.row_errors.push(RowError {
                line,
                id: Some(id),
                message,
            }),
        }
    }

    if table.designs.is_empty() {
        return Err(AppError::data(format!("No valid design rows in '{}'.", path.display())));
    }
    Ok(table)
}

/// Per-covariate min / median / max over `observations`.
pub fn compute_stats(observations: &[Observation]) -> Option<DatasetStats> {
    if observations.is_empty() {
        return None;
    }
    let mut covariates = Vec::with_capacity(N_COVARIATES);
    for c in Covariate::ALL {
        let values: Vec<f64> = observations.iter().map(|o| o.covariate(c)).collect();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !(min.is_finite() && max.is_finite()) {
            return None;
        }
        covariates.push(CovariateSummary {
            covariate: c,
            min,
            median: median(&values)?,
            max,
        });
    }
    Some(DatasetStats {
        n_rows: observations.len(),
        n_impacted: observations.iter().filter(|o| o.impacted).count(),
        covariates,
    })
}

/// Drop rows whose collapse-probability |z-score| reaches `limit`.
///
/// Rows without a collapse probability are kept and do not enter the z-scores.
fn screen_outliers(observations: Vec<Observation>, limit: f64) -> Vec<Observation> {
    let probs: Vec<f64> = observations.iter().filter_map(|o| o.collapse_prob).collect();
    if probs.is_empty() {
        return observations;
    }
    let mut z = zscores(&probs).into_iter();
    observations
        .into_iter()
        .filter(|o| match o.collapse_prob {
            Some(_) => z.next().is_none_or(|score| score.abs() < limit),
            None => true,
        })
        .collect()
}

fn open_csv(path: &Path) -> Result<(StringRecord, csv::Reader<File>), AppError> {
    let file = File::open(path).map_err(|e| AppError::usage(format!("Failed to open CSV '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::usage(format!("Failed to read CSV headers: {e}")))?
        .clone();
    Ok((headers, reader))
}

/// Header lookup plus per-row column resolution.
struct Columns {
    index: HashMap<String, usize>,
}

const GAP_INPUTS: [&str; 4] = ["constructed_moat", "sa_tm", "t_m", "zeta_e"];
const PERIOD_INPUTS: [&str; 2] = ["t_m", "t_fb"];
const COST_INPUTS: [&str; 3] = ["cost_50%", "l_bldg", "num_stories"];
const TIME_INPUTS: [&str; 3] = ["time_l_50%", "l_bldg", "num_stories"];

impl Columns {
    fn new(headers: &StringRecord) -> Self {
        Self {
            index: headers
                .iter()
                .enumerate()
                .map(|(idx, name)| (normalize_header_name(name), idx))
                .collect(),
        }
    }

    fn has(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    fn has_all(&self, names: &[&str]) -> bool {
        names.iter().all(|n| self.has(n))
    }

    fn ensure_covariates(&self) -> Result<(), AppError> {
        for c in Covariate::ALL {
            let direct = c.column().to_ascii_lowercase();
            let derivable = match c {
                Covariate::GapRatio => self.has_all(&GAP_INPUTS),
                Covariate::PeriodRatio => self.has_all(&PERIOD_INPUTS),
                Covariate::StrengthRatio | Covariate::DampingRatio => false,
            };
            if !self.has(&direct) && !derivable {
                return Err(AppError::usage(format!(
                    "Missing required column: `{}`{}",
                    c.column(),
                    match c {
                        Covariate::GapRatio => " (or `constructed_moat`, `sa_tm`, `T_m`, `zeta_e`)",
                        Covariate::PeriodRatio => " (or `T_m`, `T_fb`)",
                        _ => "",
                    }
                )));
            }
        }
        Ok(())
    }

    fn ensure_outcomes(&self) -> Result<(), AppError> {
        if !self.has("impacted") {
            return Err(AppError::usage("Missing required column: `impacted`"));
        }
        for o in Outcome::ALL {
            let derivable = match o {
                Outcome::CostRatio => self.has_all(&COST_INPUTS),
                Outcome::TimeRatio => self.has_all(&TIME_INPUTS),
                Outcome::ReplacementFreq => false,
            };
            if !self.has(o.column()) && !derivable {
                return Err(AppError::usage(format!(
                    "Missing required column: `{}`{}",
                    o.column(),
                    match o {
                        Outcome::CostRatio => " (or `cost_50%`, `L_bldg`, `num_stories`)",
                        Outcome::TimeRatio => " (or `time_l_50%`, `L_bldg`, `num_stories`)",
                        Outcome::ReplacementFreq => "",
                    }
                )));
            }
        }
        Ok(())
    }

    fn row_id(&self, record: &StringRecord, line: usize) -> String {
        self.text(record, "id")
            .or_else(|| self.text(record, "run"))
            .map(str::to_string)
            .unwrap_or_else(|| format!("row-{line}"))
    }

    fn observation(&self, record: &StringRecord, id: String, fragility: &Fragility) -> Result<Observation, String> {
        let covariates = self.covariates(record)?;
        let impacted = parse_flag(self.required(record, "impacted")?)?;

        let cost_ratio = self.number(record, "median_cost_ratio").map(Ok).unwrap_or_else(|| {
            let [cost, l, stories] = self.numbers(record, &COST_INPUTS)?;
            derive::cost_ratio(cost, l, stories).ok_or_else(|| "Cannot derive `median_cost_ratio`.".to_string())
        })?;
        let time_ratio = self.number(record, "median_time_ratio").map(Ok).unwrap_or_else(|| {
            let [time, l, stories] = self.numbers(record, &TIME_INPUTS)?;
            derive::time_ratio(time, l, stories).ok_or_else(|| "Cannot derive `median_time_ratio`.".to_string())
        })?;
        let replacement_freq = self
            .number(record, "replacement_freq")
            .ok_or_else(|| "Missing/invalid `replacement_freq` value.".to_string())?;

        let collapse_prob = self
            .number(record, "collapse_prob")
            .or_else(|| self.number(record, "max_drift").map(|d| fragility.probability(d)));

        Ok(Observation {
            id,
            covariates,
            impacted,
            cost_ratio,
            time_ratio,
            replacement_freq,
            collapse_prob,
        })
    }

    fn covariates(&self, record: &StringRecord) -> Result<[f64; N_COVARIATES], String> {
        let mut x = [0.0; N_COVARIATES];
        for c in Covariate::ALL {
            let direct = c.column().to_ascii_lowercase();
            x[c.index()] = match self.number(record, &direct) {
                Some(v) => v,
                None => match c {
                    Covariate::GapRatio => {
                        let [moat, sa, t_m, zeta] = self.numbers(record, &GAP_INPUTS)?;
                        derive::gap_ratio(moat, sa, t_m, zeta)
                            .ok_or_else(|| "Cannot derive `gap_ratio`.".to_string())?
                    }
                    Covariate::PeriodRatio => {
                        let [t_m, t_fb] = self.numbers(record, &PERIOD_INPUTS)?;
                        derive::period_ratio(t_m, t_fb).ok_or_else(|| "Cannot derive `T_ratio`.".to_string())?
                    }
                    _ => return Err(format!("Missing/invalid `{}` value.", c.column())),
                },
            };
        }
        Ok(x)
    }

    fn text<'a>(&self, record: &'a StringRecord, name: &str) -> Option<&'a str> {
        let idx = self.index.get(name)?;
        record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
    }

    fn required<'a>(&self, record: &'a StringRecord, name: &str) -> Result<&'a str, String> {
        self.text(record, name)
            .ok_or_else(|| format!("Missing required value: `{name}`"))
    }

    fn number(&self, record: &StringRecord, name: &str) -> Option<f64> {
        parse_opt_f64(self.text(record, name))
    }

    fn numbers<const N: usize>(&self, record: &StringRecord, names: &[&str; N]) -> Result<[f64; N], String> {
        let mut out = [0.0; N];
        for (slot, name) in out.iter_mut().zip(names) {
            *slot = self
                .number(record, name)
                .ok_or_else(|| format!("Missing/invalid `{name}` value."))?;
        }
        Ok(out)
    }
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn parse_flag(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => match other.parse::<f64>() {
            Ok(v) if v == 1.0 => Ok(true),
            Ok(v) if v == 0.0 => Ok(false),
            _ => Err(format!("Invalid `impacted` value '{s}' (expected 0/1/true/false).")),
        },
    }
}

fn parse_opt_f64(s: Option<&str>) -> Option<f64> {
    let v = s?.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use super::*;
    use crate::domain::{ClassifierKind, RegressorKind, SearchConfig};

    fn config(path: PathBuf) -> FitConfig {
        FitConfig {
            csv_path: path,
            classifier: ClassifierKind::KernelLogistic,
            regressor: RegressorKind::Gpr,
            test_fraction: 0.2,
            seed: 1,
            search: SearchConfig {
                grid_steps: 3,
                cv_folds: 3,
                seed: 1,
            },
            zscore_limit: Some(10.0),
            fragility_beta: 0.25,
            export_model: None,
            export_predictions: None,
        }
    }

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn direct_columns_with_bom_and_mixed_case() {
        let f = write_csv(
            "\u{feff}ID,Gap_Ratio,RI,T_ratio,zeta_e,impacted,median_cost_ratio,median_time_ratio,replacement_freq\n\
             a,1.0,1.5,3.0,0.15,1,0.4,0.3,0.2\n\
             b,1.2,2.0,2.5,0.20,0,0.05,0.04,0.0\n",
        );
        let ds = load_database(&config(f.path().to_path_buf())).unwrap();
        assert_eq!(ds.rows_used, 2);
        assert_eq!(ds.observations[0].id, "a");
        assert!(ds.observations[0].impacted);
        assert_eq!(ds.observations[1].covariates, [1.2, 2.0, 2.5, 0.20]);
        assert_eq!(ds.stats.n_impacted, 1);
        assert!(ds.observations[0].collapse_prob.is_none());
    }

    #[test]
    fn derives_ratios_from_raw_columns() {
        let f = write_csv(
            "run,constructed_moat,sa_tm,T_m,T_fb,zeta_e,RI,impacted,cost_50%,time_l_50%,L_bldg,num_stories,replacement_freq,max_drift\n\
             7,20.0,0.8,3.0,1.0,0.10,2.0,false,1944000,1182.6,90,3,0.0,0.01\n",
        );
        let ds = load_database(&config(f.path().to_path_buf())).unwrap();
        let o = &ds.observations[0];
        assert_eq!(o.id, "7");
        let expected_gap = derive::gap_ratio(20.0, 0.8, 3.0, 0.10).unwrap();
        assert!((o.covariate(Covariate::GapRatio) - expected_gap).abs() < 1e-12);
        assert!((o.covariate(Covariate::PeriodRatio) - 3.0).abs() < 1e-12);
        assert!((o.cost_ratio - 0.1).abs() < 1e-12);
        assert!((o.time_ratio - 0.1).abs() < 1e-12);
        assert!(o.collapse_prob.unwrap() < 0.01);
    }

    #[test]
    fn bad_rows_are_reported_not_fatal() {
        let f = write_csv(
            "gap_ratio,RI,T_ratio,zeta_e,impacted,median_cost_ratio,median_time_ratio,replacement_freq\n\
             1.0,1.5,3.0,0.15,maybe,0.4,0.3,0.2\n\
             1.1,abc,3.0,0.15,1,0.4,0.3,0.2\n\
             1.2,2.0,2.5,0.20,0,0.05,0.04,0.0\n",
        );
        let ds = load_database(&config(f.path().to_path_buf())).unwrap();
        assert_eq!(ds.rows_read, 3);
        assert_eq!(ds.rows_used, 1);
        assert_eq!(ds.row_errors.len(), 2);
        assert_eq!(ds.row_errors[0].line, 2);
        assert_eq!(ds.row_errors[0].id.as_deref(), Some("row-2"));
        assert_eq!(ds.observations[0].id, "row-4");
    }

    #[test]
    fn missing_schema_is_usage_error() {
        let f = write_csv("gap_ratio,RI,T_ratio,impacted\n1,1,1,1\n");
        let err = load_database(&config(f.path().to_path_buf())).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_USAGE);
        assert!(err.message().contains("zeta_e"));
    }

    #[test]
    fn empty_table_is_data_error() {
        let f = write_csv("gap_ratio,RI,T_ratio,zeta_e,impacted,median_cost_ratio,median_time_ratio,replacement_freq\n");
        let err = load_database(&config(f.path().to_path_buf())).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_DATA);
    }

    #[test]
    fn outlier_screen_drops_extreme_collapse_probabilities() {
        let mut obs: Vec<Observation> = (0..200)
            .map(|i| Observation {
                id: i.to_string(),
                covariates: [1.0; N_COVARIATES],
                impacted: false,
                cost_ratio: 0.0,
                time_ratio: 0.0,
                replacement_freq: 0.0,
                collapse_prob: Some(0.001 * (i % 3) as f64),
            })
            .collect();
        obs[5].collapse_prob = Some(1.0);
        obs[6].collapse_prob = None;
        let kept = screen_outliers(obs, 10.0);
        assert_eq!(kept.len(), 199);
        assert!(kept.iter().all(|o| o.id != "5"));
        assert!(kept.iter().any(|o| o.id == "6"));
    }

    #[test]
    fn designs_only_need_covariates() {
        let f = write_csv("gap_ratio,RI,T_ratio,zeta_e\n1.0,1.5,3.0,0.15\n0.8,1.0,2.5,0.1\n");
        let t = load_designs(f.path()).unwrap();
        assert_eq!(t.designs.len(), 2);
        assert_eq!(t.ids, vec!["row-2".to_string(), "row-3".to_string()]);
    }
}
