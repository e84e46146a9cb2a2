//! Tabular CSV exports.
//!
//! Both files are meant to be easy to consume in spreadsheets or downstream
//! scripts, and the database export reads back through `data::load_database`.

use std::fs::File;
use std::path::Path;

use nalgebra::DMatrix;

use crate::domain::{Covariate, N_COVARIATES, Observation, Outcome};
use crate::error::AppError;
use crate::predict::DesignPrediction;

/// Covariate rows with their predictions.
pub struct PredictionTable<'a> {
    /// One id per row; empty when the rows are an unnamed grid.
    pub ids: &'a [String],
    pub x: &'a DMatrix<f64>,
    pub predictions: &'a [DesignPrediction],
    /// Observed rows, when predicting back onto the dataset.
    pub observed: Option<&'a [Observation]>,
}

pub fn write_predictions_csv(path: &Path, table: &PredictionTable<'_>) -> Result<(), AppError> {
    let n = table.predictions.len();
    if table.x.nrows() != n
        || (!table.ids.is_empty() && table.ids.len() != n)
        || table.observed.is_some_and(|o| o.len() != n)
    {
        return Err(AppError::usage("Prediction export: row counts do not line up."));
    }

    let mut writer = create_writer(path)?;

    let mut header: Vec<&str> = Vec::new();
    if !table.ids.is_empty() {
        header.push("id");
    }
    header.extend(Covariate::ALL.iter().map(|c| c.column()));
    header.push("p_impact");
    header.extend(Outcome::ALL.iter().map(|o| o.expected_column()));
    if table.observed.is_some() {
        header.push("impacted");
        header.extend(Outcome::ALL.iter().map(|o| o.column()));
    }
    write_row(&mut writer, header.iter().map(|s| s.to_string()))?;

    for (i, pred) in table.predictions.iter().enumerate() {
        let mut row: Vec<String> = Vec::with_capacity(header.len());
        if let Some(id) = table.ids.get(i) {
            row.push(id.clone());
        }
        row.extend((0..N_COVARIATES).map(|j| format!("{:.6}", table.x[(i, j)])));
        row.push(format!("{:.6}", pred.p_hit));
        for o in Outcome::ALL {
            row.push(pred.expected(o).map(|v| format!("{v:.6}")).unwrap_or_default());
        }
        if let Some(obs) = table.observed.map(|rows| &rows[i]) {
            row.push(u8::from(obs.impacted).to_string());
            row.extend(Outcome::ALL.iter().map(|&o| format!("{:.6}", obs.outcome(o))));
        }
        write_row(&mut writer, row)?;
    }

    finish(writer, path)
}

/// Write observations in the database schema (direct columns only).
pub fn write_database_csv(path: &Path, observations: &[Observation]) -> Result<(), AppError> {
    let mut writer = create_writer(path)?;

    let mut header: Vec<String> = vec!["id".to_string()];
    header.extend(Covariate::ALL.iter().map(|c| c.column().to_string()));
    header.push("impacted".to_string());
    header.extend(Outcome::ALL.iter().map(|o| o.column().to_string()));
    header.push("collapse_prob".to_string());
    write_row(&mut writer, header)?;

    for o in observations {
        let mut row = vec![o.id.clone()];
        row.extend(o.covariates.iter().map(|v| format!("{v:.6}")));
        row.push(u8::from(o.impacted).to_string());
        row.extend(Outcome::ALL.iter().map(|&k| format!("{:.6}", o.outcome(k))));
        row.push(o.collapse_prob.map(|p| format!("{p:.6e}")).unwrap_or_default());
        write_row(&mut writer, row)?;
    }

    finish(writer, path)
}

fn create_writer(path: &Path) -> Result<csv::Writer<File>, AppError> {
    csv::Writer::from_path(path)
        .map_err(|e| AppError::usage(format!("Failed to create export CSV '{}': {e}", path.display())))
}

fn write_row<I>(writer: &mut csv::Writer<File>, fields: I) -> Result<(), AppError>
where
    I: IntoIterator<Item = String>,
{
    let fields: Vec<String> = fields.into_iter().collect();
    writer
        .write_record(&fields)
        .map_err(|e| AppError::usage(format!("Failed to write export CSV row: {e}")))
}

fn finish(mut writer: csv::Writer<File>, path: &Path) -> Result<(), AppError> {
    writer
        .flush()
        .map_err(|e| AppError::usage(format!("Failed to flush export CSV '{}': {e}", path.display())))?;
    tracing::info!(path = %path.display(), "wrote CSV export");
    Ok(())
}
