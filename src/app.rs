//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - installs logging
//! - runs fitting / prediction / synthetic generation
//! - prints reports and writes optional exports

use clap::Parser;
use nalgebra::DMatrix;

use crate::cli::{Cli, Command, FitArgs, PredictArgs, SynthArgs};
use crate::data::{Fragility, SliceSpec, SyntheticConfig, design_space, generate_database, load_designs, slice_grid};
use crate::domain::{Covariate, FitConfig, N_COVARIATES, SearchConfig};
use crate::error::AppError;
use crate::io::{PredictionTable, SurrogateFile, read_surrogate_json, write_database_csv, write_predictions_csv, write_surrogate_json};
use crate::predict::predict_outcomes;
use crate::report::{ReportStyle, format_predictions, format_run_summary, rank_designs};

pub mod pipeline;

/// Entry point for the `surr` binary.
pub fn run() -> Result<(), AppError> {
    // A missing .env is fine; flags and real env vars still apply.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    crate::logging::init(&cli.log_level)?;

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Predict(args) => handle_predict(args),
        Command::Synth(args) => handle_synth(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args);
    let run = pipeline::run_fit(&config)?;
    let style = ReportStyle {
        precision: args.precision,
        ..ReportStyle::default()
    };

    println!(
        "{}",
        format_run_summary(&run.dataset, &run.surrogates, run.diagnostics.as_ref(), &config, style)
    );

    if let Some(path) = &config.export_predictions {
        let x = crate::fit::covariate_matrix(&run.dataset.observations);
        let ids: Vec<String> = run.dataset.observations.iter().map(|o| o.id.clone()).collect();
        let predictions = run.dataset_predictions()?;
        write_predictions_csv(
            path,
            &PredictionTable {
                ids: &ids,
                x: &x,
                predictions: &predictions,
                observed: Some(&run.dataset.observations),
            },
        )?;
    }
    if let Some(path) = &config.export_model {
        let file = SurrogateFile::new(&config, run.dataset.stats, run.surrogates, run.diagnostics);
        write_surrogate_json(path, &file)?;
    }

    Ok(())
}

fn handle_predict(args: PredictArgs) -> Result<(), AppError> {
    let file = read_surrogate_json(&args.model)?;
    if file.surrogates.covariates != Covariate::ALL {
        return Err(AppError::usage("Surrogate JSON uses an unsupported covariate order."));
    }

    let (ids, x) = prediction_inputs(&args, &file)?;
    tracing::info!(rows = x.nrows(), "predicting expected outcomes");
    let predictions = predict_outcomes(&file.surrogates, &x)?;

    let style = ReportStyle {
        precision: args.precision,
        ..ReportStyle::default()
    };
    let top = rank_designs(&predictions, args.rank_by, args.top);
    println!(
        "Lowest expected {} ({} of {} designs):",
        args.rank_by.display_name(),
        top.len(),
        predictions.len()
    );
    println!("{}", format_predictions(&ids, &x, &predictions, &top, style));

    if let Some(path) = &args.output {
        write_predictions_csv(
            path,
            &PredictionTable {
                ids: &ids,
                x: &x,
                predictions: &predictions,
                observed: None,
            },
        )?;
    }
    Ok(())
}

/// Design rows from `--input`, `--space`, or a `--x/--y` slice.
fn prediction_inputs(args: &PredictArgs, file: &SurrogateFile) -> Result<(Vec<String>, DMatrix<f64>), AppError> {
    if let Some(path) = &args.input {
        let table = load_designs(path)?;
        for err in &table.row_errors {
            tracing::warn!(line = err.line, "skipped design row: {}", err.message);
        }
        let x = DMatrix::from_fn(table.designs.len(), N_COVARIATES, |i, j| table.designs[i][j]);
        return Ok((table.ids, x));
    }
    if args.space {
        return Ok((Vec::new(), design_space(args.res)?));
    }
    if let (Some(x_axis), Some(y_axis)) = (args.x, args.y) {
        let spec = SliceSpec {
            x: x_axis,
            y: y_axis,
            res: args.res,
            x_bounds: bounds_pair(args.x_bounds.as_deref())?,
            y_bounds: bounds_pair(args.y_bounds.as_deref())?,
            fixed: args.fix.clone(),
        };
        return Ok((Vec::new(), slice_grid(&file.stats, &spec)?));
    }
    Err(AppError::usage("Choose what to predict: --input <CSV>, --space, or --x/--y for a 2-D slice."))
}

fn bounds_pair(values: Option<&[f64]>) -> Result<Option<(f64, f64)>, AppError> {
    match values {
        None => Ok(None),
        Some([lo, hi]) => Ok(Some((*lo, *hi))),
        Some(_) => Err(AppError::usage("Bounds take exactly two values: MIN MAX.")),
    }
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let fragility = Fragility::anchored(args.fragility_beta).ok_or_else(|| {
        AppError::usage(format!(
            "Fragility dispersion must be finite and > 0, got {}.",
            args.fragility_beta
        ))
    })?;
    let rows = generate_database(&SyntheticConfig {
        count: args.count,
        seed: args.seed,
        noise: args.noise,
        fragility,
    })?;
    write_database_csv(&args.output, &rows)?;

    let n_impacted = rows.iter().filter(|o| o.impacted).count();
    println!(
        "Wrote {} synthetic designs ({} impacted) to {}",
        rows.len(),
        n_impacted,
        args.output.display()
    );
    Ok(())
}

pub fn fit_config_from_args(args: &FitArgs) -> FitConfig {
    FitConfig {
        csv_path: args.csv.clone(),
        classifier: args.classifier,
        regressor: args.regressor,
        test_fraction: args.test_fraction,
        seed: args.seed,
        search: SearchConfig {
            grid_steps: args.grid_steps,
            cv_folds: args.cv_folds,
            seed: args.seed,
        },
        zscore_limit: (!args.no_outlier_filter).then_some(args.zscore_limit),
        fragility_beta: args.fragility_beta,
        export_model: args.export_model.clone(),
        export_predictions: args.export_predictions.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outlier_flag_disables_screen() {
        let cli = Cli::parse_from(["surr", "fit", "--csv", "db.csv", "--no-outlier-filter", "--grid-steps", "4"]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        let config = fit_config_from_args(&args);
        assert_eq!(config.zscore_limit, None);
        assert_eq!(config.search.grid_steps, 4);
        assert_eq!(config.search.seed, config.seed);
    }

    #[test]
    fn bounds_need_two_values() {
        assert_eq!(bounds_pair(None).unwrap(), None);
        assert_eq!(bounds_pair(Some(&[0.5, 1.5])).unwrap(), Some((0.5, 1.5)));
        assert!(bounds_pair(Some(&[0.5])).is_err());
    }
}
