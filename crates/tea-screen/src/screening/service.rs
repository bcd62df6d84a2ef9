use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::cache::ResultCache;
use super::classifier::{BandTable, OperatingThreshold, Probability, ThresholdClassifier};
use super::features::FeatureTransformer;
use super::record::{RawRecord, SubmissionId};
use super::result::ClassificationResult;
use super::scorer::{Scorer, ScoringError, ScoringWorker};
use super::store::{FormStore, FormStoreError};
use crate::config::ScreeningConfig;

/// Startup-time knobs of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    pub threshold: OperatingThreshold,
    pub cache_capacity: usize,
    pub scorer_timeout: Option<Duration>,
}

impl From<&ScreeningConfig> for PipelineSettings {
    fn from(config: &ScreeningConfig) -> Self {
        Self {
            threshold: config.threshold,
            cache_capacity: config.cache_capacity,
            scorer_timeout: config.scorer_timeout,
        }
    }
}

/// Composes the form store, transformer, scorer, classifier and result cache.
pub struct ScreeningService<S, M: ?Sized> {
    store: Arc<S>,
    scorer: ScoringWorker<M>,
    transformer: Arc<FeatureTransformer>,
    classifier: ThresholdClassifier,
    cache: ResultCache<SubmissionId, ClassificationResult>,
}

impl<S, M> ScreeningService<S, M>
where
    S: FormStore + 'static,
    M: Scorer + ?Sized + 'static,
{
    pub fn new(
        store: Arc<S>,
        scorer: Arc<M>,
        transformer: Arc<FeatureTransformer>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            scorer: ScoringWorker::new(scorer, settings.scorer_timeout),
            transformer,
            classifier: ThresholdClassifier::new(settings.threshold),
            cache: ResultCache::new(settings.cache_capacity),
        }
    }

    /// Result for one submission, computed on first request and replayed afterwards.
    pub fn predict(
        &self,
        submission_id: &SubmissionId,
    ) -> Result<ClassificationResult, PredictionError> {
        let record = self
            .store
            .fetch_by_id(submission_id)?
            .ok_or_else(|| PredictionError::NotFound(submission_id.clone()))?;

        let mut computed = false;
        let result = self
            .cache
            .get_or_compute(submission_id, || {
                computed = true;
                self.run_pipeline(submission_id, &record)
            })
            .map_err(|err| {
                warn!(%submission_id, error = %err, "screening computation failed");
                PredictionError::Computation(err)
            })?;

        if !computed {
            debug!(%submission_id, "served cached screening result");
        }

        Ok(result)
    }

    /// Identifier of the most recent submission.
    pub fn latest_submission(&self) -> Result<SubmissionId, PredictionError> {
        self.store
            .fetch_latest()?
            .map(|(id, _)| id)
            .ok_or(PredictionError::NoSubmissions)
    }

    pub fn bands(&self) -> &BandTable {
        self.classifier.table()
    }

    pub fn threshold(&self) -> OperatingThreshold {
        self.classifier.threshold()
    }

    pub fn cache(&self) -> &ResultCache<SubmissionId, ClassificationResult> {
        &self.cache
    }

    fn run_pipeline(
        &self,
        submission_id: &SubmissionId,
        record: &RawRecord,
    ) -> Result<ClassificationResult, ScoringError> {
        let started = Instant::now();
        let vector = self.transformer.transform(record);
        let raw = self.scorer.score(vector)?;
        let probability = Probability::new(raw).ok_or(ScoringError::OutOfRange(raw))?;

        let classification = self.classifier.classify(probability);
        let result =
            ClassificationResult::new(probability, self.classifier.threshold(), classification);

        info!(
            %submission_id,
            probability = probability.value(),
            decision = result.decision.label(),
            severity = result.severity,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "screening result computed"
        );

        Ok(result)
    }
}

/// Failure kinds surfaced to callers of the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    #[error("no submission found with id '{0}'")]
    NotFound(SubmissionId),
    #[error("no submissions received yet")]
    NoSubmissions,
    #[error(transparent)]
    Computation(#[from] ScoringError),
    #[error(transparent)]
    Store(#[from] FormStoreError),
}
