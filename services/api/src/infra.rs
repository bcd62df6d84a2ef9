use metrics_exporter_prometheus::PrometheusHandle;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tea_screen::config::ScreeningConfig;
use tea_screen::error::AppError;
use tea_screen::screening::{
    CsvFormStore, FeatureTransformer, LogisticScorer, PipelineSettings, RouterSettings,
    ScreeningArtifacts, ScreeningService,
};

pub(crate) type CsvScreeningService = ScreeningService<CsvFormStore, LogisticScorer>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Loads the stored artifacts and wires the pipeline over the CSV form export.
pub(crate) fn build_service(
    config: &ScreeningConfig,
    forms_csv: Option<PathBuf>,
) -> Result<CsvScreeningService, AppError> {
    let artifacts = ScreeningArtifacts::load(&config.artifact_dir)?;
    let ScreeningArtifacts {
        params,
        schema,
        model,
    } = artifacts;

    let store = CsvFormStore::new(forms_csv.unwrap_or_else(|| config.forms_csv.clone()));
    let transformer = FeatureTransformer::new(params, schema);

    Ok(ScreeningService::new(
        Arc::new(store),
        Arc::new(model),
        Arc::new(transformer),
        PipelineSettings::from(config),
    ))
}

pub(crate) fn router_settings(config: &ScreeningConfig) -> RouterSettings {
    RouterSettings {
        access_token: config.access_token.clone(),
        public_url: config.public_url.clone(),
    }
}
