//! Questionnaire screening pipeline: raw submission → feature vector → probability →
//! severity band, memoized per submission.

pub mod artifacts;
pub mod cache;
pub mod classifier;
pub mod features;
pub mod record;
pub mod result;
pub mod router;
pub mod scorer;
pub mod service;
pub mod store;

pub use artifacts::{ArtifactError, ScreeningArtifacts};
pub use cache::ResultCache;
pub use classifier::{
    BandTable, Classification, Decision, OperatingThreshold, Probability, SeverityBand,
    ThresholdClassifier,
};
pub use features::{
    FeatureSchema, FeatureTransformer, FeatureVector, ScalerParams, TransformParams,
};
pub use record::{RawRecord, SubmissionId};
pub use result::{ClassificationResult, ResultView};
pub use router::{result_url, screening_router, RouterSettings};
pub use scorer::{LogisticScorer, Scorer, ScoringError, ScoringWorker};
pub use service::{PipelineSettings, PredictionError, ScreeningService};
pub use store::{CsvFormStore, FormStore, FormStoreError, InMemoryFormStore};
