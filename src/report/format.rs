//! Formatted terminal output.
//!
//! Formatting lives in one place so the fitting code stays clean and output
//! changes are localized. Widths and precision come in through [`ReportStyle`]
//! on every call.

use nalgebra::DMatrix;

use crate::data::Dataset;
use crate::domain::{Covariate, FitConfig, N_COVARIATES, Outcome};
use crate::fit::{Diagnostics, RegressionScore, SurrogateSet};
use crate::predict::DesignPrediction;

/// Presentation settings for one report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportStyle {
    /// Decimal places for covariates and predictions.
    pub precision: usize,
    /// Width of the id column.
    pub id_width: usize,
}

impl Default for ReportStyle {
    fn default() -> Self {
        Self {
            precision: 4,
            id_width: 16,
        }
    }
}

/// Dataset stats, selected hyperparameters and held-out diagnostics.
pub fn format_run_summary(
    dataset: &Dataset,
    set: &SurrogateSet,
    diagnostics: Option<&Diagnostics>,
    config: &FitConfig,
    style: ReportStyle,
) -> String {
    let p = style.precision;
    let mut out = String::new();

    out.push_str("=== surr - isolated building surrogates ===\n");
    out.push_str(&format!("Database: {}\n", config.csv_path.display()));
    out.push_str(&format!(
        "Rows: read={} used={} skipped={} outliers={}\n",
        dataset.rows_read,
        dataset.rows_used,
        dataset.row_errors.len(),
        dataset.rows_filtered
    ));
    out.push_str(&format!(
        "Impacted: {} of {} ({:.1}%)\n",
        dataset.stats.n_impacted,
        dataset.stats.n_rows,
        100.0 * dataset.stats.n_impacted as f64 / dataset.stats.n_rows.max(1) as f64
    ));

    out.push_str("\nCovariates:\n");
    out.push_str(&format!("  {:<16} {:>10} {:>10} {:>10}\n", "", "min", "median", "max"));
    for s in &dataset.stats.covariates {
        out.push_str(&format!(
            "  {:<16} {:>10.p$} {:>10.p$} {:>10.p$}\n",
            s.covariate.display_name(),
            s.min,
            s.median,
            s.max
        ));
    }

    out.push_str(&format!(
        "\nTraining: n={} (hit={}, miss={}) | test n={}\n",
        set.n_hit + set.n_miss,
        set.n_hit,
        set.n_miss,
        diagnostics.map_or(0, |d| d.n_test)
    ));

    out.push_str("\nImpact classifier:\n");
    out.push_str(&format!(
        "- {} ({})\n",
        set.classifier.kind().display_name(),
        set.classifier.describe()
    ));

    out.push_str("\nConditional regressors:\n");
    for m in &set.outcomes {
        out.push_str(&format!("- {}\n", m.outcome.display_name()));
        out.push_str(&format!("    hit : {} ({})\n", m.hit.kind().display_name(), m.hit.describe()));
        out.push_str(&format!("    miss: {} ({})\n", m.miss.kind().display_name(), m.miss.describe()));
    }

    if let Some(d) = diagnostics {
        out.push('\n');
        out.push_str(&format_diagnostics(d));
    }

    out
}

/// Confusion matrix plus R² / RMSE per outcome.
pub fn format_diagnostics(d: &Diagnostics) -> String {
    let cm = &d.confusion;
    let mut out = String::new();

    out.push_str(&format!("Test diagnostics (n={}):\n", d.n_test));
    out.push_str(&format!(
        "  classifier accuracy: {}\n",
        cm.accuracy().map(|a| format!("{:.1}%", 100.0 * a)).unwrap_or_else(|| "n/a".to_string())
    ));
    out.push_str(&format!("  {:<14} {:>10} {:>10}\n", "", "pred miss", "pred hit"));
    out.push_str(&format!("  {:<14} {:>10} {:>10}\n", "actual miss", cm.true_negative, cm.false_positive));
    out.push_str(&format!("  {:<14} {:>10} {:>10}\n", "actual hit", cm.false_negative, cm.true_positive));

    out.push_str(&format!(
        "\n  {:<24} {:>16} {:>16} {:>16}\n",
        "outcome", "hit R2/RMSE", "miss R2/RMSE", "E[y] R2/RMSE"
    ));
    for o in &d.outcomes {
        out.push_str(&format!(
            "  {:<24} {:>16} {:>16} {:>16}\n",
            o.outcome.display_name(),
            fmt_score(o.hit.as_ref()),
            fmt_score(o.miss.as_ref()),
            fmt_score(Some(&o.expected)),
        ));
    }
    out
}

/// Table of covariates, impact probability and expected outcomes.
///
/// `rows` selects which predictions to show, in order; `ids` may be empty.
pub fn format_predictions(
    ids: &[String],
    x: &DMatrix<f64>,
    predictions: &[DesignPrediction],
    rows: &[usize],
    style: ReportStyle,
) -> String {
    let p = style.precision;
    let w = style.id_width;
    let col = p + 6;
    let mut out = String::new();

    let mut header = format!("{:<w$}", "id");
    for c in Covariate::ALL {
        header.push_str(&format!(" {:>col$}", truncate(c.column(), col)));
    }
    header.push_str(&format!(" {:>col$}", "p_hit"));
    for o in Outcome::ALL {
        header.push_str(&format!(" {:>col$}", truncate(short_name(o), col)));
    }
    out.push_str(header.trim_end());
    out.push('\n');
    out.push_str(&"-".repeat(header.trim_end().chars().count()));
    out.push('\n');

    for &i in rows {
        let (Some(pred), true) = (predictions.get(i), i < x.nrows()) else {
            continue;
        };
        let id = ids.get(i).cloned().unwrap_or_else(|| format!("#{}", i + 1));
        let mut line = format!("{:<w$}", truncate(&id, w));
        for j in 0..N_COVARIATES {
            line.push_str(&format!(" {:>col$.p$}", x[(i, j)]));
        }
        line.push_str(&format!(" {:>col$.p$}", pred.p_hit));
        for o in Outcome::ALL {
            match pred.expected(o) {
                Some(v) => line.push_str(&format!(" {v:>col$.p$}")),
                None => line.push_str(&format!(" {:>col$}", "-")),
            }
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }

    out
}

fn short_name(o: Outcome) -> &'static str {
    match o {
        Outcome::CostRatio => "E[cost]",
        Outcome::TimeRatio => "E[time]",
        Outcome::ReplacementFreq => "E[repl]",
    }
}

fn fmt_score(score: Option<&RegressionScore>) -> String {
    let Some(s) = score else {
        return "-".to_string();
    };
    let r2 = s.r2.map(|v| format!("{v:.3}")).unwrap_or_else(|| "n/a".to_string());
    let rmse = s.rmse.map(|v| format!("{v:.4}")).unwrap_or_else(|| "n/a".to_string());
    format!("{r2}/{rmse}")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::ConfusionMatrix;
    use crate::predict::ExpectedValue;

    #[test]
    fn predictions_table_respects_precision_and_rows() {
        let x = DMatrix::from_row_slice(2, 4, &[1.0, 1.5, 3.0, 0.15, 0.8, 1.0, 2.5, 0.1]);
        let ev = ExpectedValue {
            p_hit: 0.3,
            y_hit: 10.0,
            y_miss: 2.0,
            expected: 4.4,
        };
        let preds = vec![
            DesignPrediction {
                p_hit: 0.3,
                outcomes: vec![(Outcome::CostRatio, ev)],
            };
            2
        ];
        let text = format_predictions(
            &["first".to_string(), "second".to_string()],
            &x,
            &preds,
            &[1],
            ReportStyle {
                precision: 2,
                id_width: 8,
            },
        );
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id"));
        assert!(lines[2].starts_with("second"));
        assert!(lines[2].contains("4.40"));
        assert!(lines[2].contains("0.80"));
        assert!(lines[2].ends_with('-'));
    }

    #[test]
    fn diagnostics_show_confusion_cells() {
        let d = Diagnostics {
            n_test: 10,
            confusion: ConfusionMatrix {
                true_negative: 5,
                false_positive: 1,
                false_negative: 2,
                true_positive: 2,
            },
            outcomes: vec![],
        };
        let text = format_diagnostics(&d);
        assert!(text.contains("70.0%"));
        assert!(text.contains("actual hit"));
    }

    #[test]
    fn truncate_marks_cut_text() {
        assert_eq!(truncate("abcdef", 4), "abc.");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
