use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::info;

use super::features::{FeatureSchema, TransformParams};
use super::scorer::LogisticScorer;

pub const TRANSFORM_PARAMS_FILE: &str = "transform_params.json";
pub const FEATURE_SCHEMA_FILE: &str = "feature_cols.csv";
pub const MODEL_FILE: &str = "model.json";

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("failed to read artifact {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid JSON artifact: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid CSV artifact: {0}")]
    Csv(#[from] csv::Error),
    #[error("feature schema is empty")]
    EmptySchema,
    #[error("feature '{0}' appears twice in the schema")]
    DuplicateFeature(String),
    #[error("invalid transform parameters: {0}")]
    InvalidParams(String),
    #[error("invalid model: {0}")]
    InvalidModel(String),
    #[error("model inputs ({model}) do not match the feature schema ({schema})")]
    SchemaMismatch { schema: usize, model: usize },
}

/// Everything the pipeline loads from disk once at startup.
#[derive(Debug, Clone)]
pub struct ScreeningArtifacts {
    pub params: TransformParams,
    pub schema: FeatureSchema,
    pub model: LogisticScorer,
}

impl ScreeningArtifacts {
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self, ArtifactError> {
        let dir = dir.as_ref();
        let params = TransformParams::from_reader(open(&dir.join(TRANSFORM_PARAMS_FILE))?)?;
        let schema = FeatureSchema::from_reader(open(&dir.join(FEATURE_SCHEMA_FILE))?)?;
        let model = LogisticScorer::from_reader(open(&dir.join(MODEL_FILE))?)?;
        model.ensure_schema(&schema)?;

        info!(
            artifact_dir = %dir.display(),
            features = schema.len(),
            "screening artifacts loaded"
        );

        Ok(Self {
            params,
            schema,
            model,
        })
    }
}

fn open(path: &Path) -> Result<File, ArtifactError> {
    File::open(path).map_err(|source| ArtifactError::Read {
        path: path.to_path_buf(),
        source,
    })
}
