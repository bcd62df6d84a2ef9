use std::io::Read;
use std::sync::mpsc::{self, RecvTimeoutError, TrySendError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use super::artifacts::ArtifactError;
use super::features::{FeatureSchema, FeatureVector};

/// Pre-trained model reduced to its contract: a vector in, a probability out.
pub trait Scorer: Send + Sync {
    fn score(&self, vector: &FeatureVector) -> Result<f64, ScoringError>;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error("scorer failed: {0}")]
    Failed(String),
    #[error("scorer returned {0}, outside [0, 1]")]
    OutOfRange(f64),
    #[error("scorer expected {expected} features, got {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("scorer did not answer within {0:?}")]
    TimedOut(Duration),
}

const SCORER_BACKLOG: usize = 64;

type Reply = mpsc::Sender<Result<f64, ScoringError>>;
type Job = (FeatureVector, Reply);

/// Runs the scorer on one long-lived helper thread so callers can give up after `timeout`.
/// Without a timeout the call happens inline. A hung scorer pins only that thread: later
/// calls queue behind it and time out, and a full backlog is refused outright. The thread is
/// started on first use and restarted if a scorer panic took it down.
pub struct ScoringWorker<M: ?Sized> {
    scorer: Arc<M>,
    timeout: Option<Duration>,
    jobs: Mutex<Option<mpsc::SyncSender<Job>>>,
}

impl<M> ScoringWorker<M>
where
    M: Scorer + ?Sized + 'static,
{
    pub fn new(scorer: Arc<M>, timeout: Option<Duration>) -> Self {
        Self {
            scorer,
            timeout,
            jobs: Mutex::new(None),
        }
    }

    pub fn score(&self, vector: FeatureVector) -> Result<f64, ScoringError> {
        let Some(timeout) = self.timeout else {
            return self.scorer.score(&vector);
        };

        let (reply, receiver) = mpsc::channel();
        self.submit((vector, reply))?;

        match receiver.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(ScoringError::TimedOut(timeout)),
            Err(RecvTimeoutError::Disconnected) => {
                // The worker died with this job; the next call starts a fresh one.
                *self.jobs.lock().expect("scorer queue mutex poisoned") = None;
                Err(ScoringError::Failed("scorer thread panicked".to_string()))
            }
        }
    }

    fn submit(&self, mut job: Job) -> Result<(), ScoringError> {
        let mut jobs = self.jobs.lock().expect("scorer queue mutex poisoned");
        if let Some(sender) = jobs.as_ref() {
            match sender.try_send(job) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(_)) => {
                    return Err(ScoringError::Failed("scorer backlog is full".to_string()))
                }
                Err(TrySendError::Disconnected(returned)) => job = returned,
            }
        }

        let sender = spawn_worker(Arc::clone(&self.scorer))?;
        sender
            .try_send(job)
            .map_err(|_| ScoringError::Failed("scorer thread unavailable".to_string()))?;
        *jobs = Some(sender);
        Ok(())
    }
}

fn spawn_worker<M>(scorer: Arc<M>) -> Result<mpsc::SyncSender<Job>, ScoringError>
where
    M: Scorer + ?Sized + 'static,
{
    let (sender, jobs) = mpsc::sync_channel::<Job>(SCORER_BACKLOG);
    std::thread::Builder::new()
        .name("scorer".to_string())
        .spawn(move || {
            for (vector, reply) in jobs {
                // The receiver is gone once the caller timed out.
                let _ = reply.send(scorer.score(&vector));
            }
        })
        .map_err(|err| ScoringError::Failed(format!("could not start scorer thread: {err}")))?;

    debug!("scorer worker started");
    Ok(sender)
}

/// Logistic model exported as JSON: `sigmoid(w · x + b)`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogisticScorer {
    features: Vec<String>,
    weights: Vec<f64>,
    bias: f64,
}

impl LogisticScorer {
    pub fn new(features: Vec<String>, weights: Vec<f64>, bias: f64) -> Result<Self, ArtifactError> {
        let scorer = Self {
            features,
            weights,
            bias,
        };
        scorer.validate()?;
        Ok(scorer)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ArtifactError> {
        let scorer: LogisticScorer = serde_json::from_reader(reader)?;
        scorer.validate()?;
        Ok(scorer)
    }

    fn validate(&self) -> Result<(), ArtifactError> {
        if self.features.len() != self.weights.len() {
            return Err(ArtifactError::InvalidModel(format!(
                "{} feature names but {} weights",
                self.features.len(),
                self.weights.len()
            )));
        }
        if !self.bias.is_finite() || self.weights.iter().any(|weight| !weight.is_finite()) {
            return Err(ArtifactError::InvalidModel(
                "weights and bias must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// The model's inputs must be the schema, name for name and in order.
    pub fn ensure_schema(&self, schema: &FeatureSchema) -> Result<(), ArtifactError> {
        if self.features.as_slice() != schema.names() {
            return Err(ArtifactError::SchemaMismatch {
                schema: schema.len(),
                model: self.features.len(),
            });
        }
        Ok(())
    }
}

impl Scorer for LogisticScorer {
    fn score(&self, vector: &FeatureVector) -> Result<f64, ScoringError> {
        if vector.len() != self.weights.len() {
            return Err(ScoringError::DimensionMismatch {
                expected: self.weights.len(),
                found: vector.len(),
            });
        }

        let logit = self
            .weights
            .iter()
            .zip(vector.as_slice())
            .map(|(weight, value)| weight * value)
            .sum::<f64>()
            + self.bias;

        Ok(1.0 / (1.0 + (-logit).exp()))
    }
}
