use crate::infra::build_service;
use clap::Args;
use std::path::PathBuf;
use tea_screen::config::AppConfig;
use tea_screen::error::AppError;
use tea_screen::screening::{result_url, BandTable, ResultView, SubmissionId};

#[derive(Args, Debug)]
pub(crate) struct PredictArgs {
    /// Submission identifier (the form's timestamp column)
    #[arg(long)]
    pub(crate) id: Option<String>,
    /// Score the most recent submission instead of `--id`
    #[arg(long, conflicts_with = "id")]
    pub(crate) latest: bool,
    /// Form export to read instead of the configured one
    #[arg(long)]
    pub(crate) forms: Option<PathBuf>,
    /// Print the result as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_predict(args: PredictArgs) -> Result<(), AppError> {
    let PredictArgs {
        id,
        latest,
        forms,
        json,
    } = args;

    let config = AppConfig::load()?;
    let service = build_service(&config.screening, forms)?;

    let submission_id = match id {
        Some(id) if !latest => SubmissionId(id.trim().to_string()),
        _ => service.latest_submission()?,
    };
    let result = service.predict(&submission_id)?;

    let link = result_url(&config.screening.public_url, &submission_id);
    let view = result.view(&submission_id, link);

    if json {
        let rendered = serde_json::to_string_pretty(&view).map_err(std::io::Error::from)?;
        println!("{rendered}");
    } else {
        render_result(&view);
    }
    Ok(())
}

pub(crate) fn run_bands() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    render_bands(&config.screening.threshold.band_table());
    Ok(())
}

fn render_result(view: &ResultView) {
    println!("Submission: {}", view.submission_id);
    println!("Generated:  {}", view.generated_at);
    println!(
        "Decision:   {} (probability {:.3}, threshold {:.2})",
        view.decision_label, view.probability, view.threshold
    );
    println!("Severity:   {} ({})", view.severity, view.interpretation);
}

fn render_bands(table: &BandTable) {
    println!("Severity bands for threshold {:.2}", table.threshold);
    for band in &table.bands {
        println!(
            "  [{:.4}, {:.4})  {:<14} {}",
            band.lower, band.upper, band.label, band.interpretation
        );
    }
}
