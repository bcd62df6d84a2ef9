use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::record::{RawRecord, SubmissionId};

/// Spreadsheet column holding the submission timestamp.
pub const TIMESTAMP_HEADER: &str = "Carimbo de data/hora";
pub const ID_HEADER: &str = "ID";

/// Read access to submitted forms.
pub trait FormStore: Send + Sync {
    fn fetch_by_id(&self, id: &SubmissionId) -> Result<Option<RawRecord>, FormStoreError>;
    fn fetch_latest(&self) -> Result<Option<(SubmissionId, RawRecord)>, FormStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum FormStoreError {
    #[error("failed to read form export: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid form export: {0}")]
    Csv(#[from] csv::Error),
    #[error("form export has no 'Carimbo de data/hora' or 'ID' column")]
    MissingIdColumn,
    #[error("form store unavailable: {0}")]
    Unavailable(String),
}

/// Form store backed by a CSV export of the response spreadsheet. The file is re-read on
/// every lookup so new submissions are visible without a restart.
#[derive(Debug, Clone)]
pub struct CsvFormStore {
    path: PathBuf,
}

impl CsvFormStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<(SubmissionId, RawRecord)>, FormStoreError> {
        let file = std::fs::File::open(&self.path)?;
        parse_submissions(file)
    }
}

impl FormStore for CsvFormStore {
    fn fetch_by_id(&self, id: &SubmissionId) -> Result<Option<RawRecord>, FormStoreError> {
        Ok(self
            .load()?
            .into_iter()
            .find(|(candidate, _)| candidate == id)
            .map(|(_, record)| record))
    }

    fn fetch_latest(&self) -> Result<Option<(SubmissionId, RawRecord)>, FormStoreError> {
        Ok(self.load()?.pop())
    }
}

/// Parses a response export into `(id, record)` pairs in sheet order. Rows without an
/// identifier are skipped.
pub fn parse_submissions<R: Read>(
    reader: R,
) -> Result<Vec<(SubmissionId, RawRecord)>, FormStoreError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let raw_headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|header| header.trim_start_matches('\u{feff}').to_string())
        .collect();
    let id_index = raw_headers
        .iter()
        .position(|header| header == TIMESTAMP_HEADER || header == ID_HEADER)
        .ok_or(FormStoreError::MissingIdColumn)?;
    let headers = normalize_headers(&raw_headers);

    let mut submissions = Vec::new();
    for row in csv_reader.records() {
        let row = row?;
        let id = match row.get(id_index).map(str::trim) {
            Some(id) if !id.is_empty() => SubmissionId(id.to_string()),
            _ => continue,
        };

        let mut record = RawRecord::new();
        for (index, header) in headers.iter().enumerate() {
            if index == id_index {
                continue;
            }
            record.insert(header.clone(), row.get(index).map(str::to_string));
        }
        submissions.push((id, record));
    }

    Ok(submissions)
}

/// Renames numbered question headers (`"7. Question text"`) to `Col07` when the export uses
/// numbered questions; other headers are kept as-is.
pub fn normalize_headers(headers: &[String]) -> Vec<String> {
    let numbered = headers
        .iter()
        .any(|header| ["1. ", "2. ", "3. "].iter().any(|p| header.starts_with(p)));
    if !numbered {
        return headers.to_vec();
    }

    headers
        .iter()
        .map(|header| {
            let prefix = header.split('.').next().unwrap_or_default();
            match prefix.parse::<u32>() {
                Ok(number) if prefix.chars().all(|c| c.is_ascii_digit()) => {
                    format!("Col{number:02}")
                }
                _ => header.clone(),
            }
        })
        .collect()
}

/// Store holding submissions in memory, in insertion order.
#[derive(Debug, Default, Clone)]
pub struct InMemoryFormStore {
    submissions: Arc<Mutex<Vec<(SubmissionId, RawRecord)>>>,
}

impl InMemoryFormStore {
    /// Adds a submission, replacing the record of an existing id in place.
    pub fn insert(&self, id: SubmissionId, record: RawRecord) {
        let mut guard = self.submissions.lock().expect("form store mutex poisoned");
        match guard.iter_mut().find(|(candidate, _)| *candidate == id) {
            Some(entry) => entry.1 = record,
            None => guard.push((id, record)),
        }
    }
}

impl FormStore for InMemoryFormStore {
    fn fetch_by_id(&self, id: &SubmissionId) -> Result<Option<RawRecord>, FormStoreError> {
        let guard = self.submissions.lock().expect("form store mutex poisoned");
        Ok(guard
            .iter()
            .find(|(candidate, _)| candidate == id)
            .map(|(_, record)| record.clone()))
    }

    fn fetch_latest(&self) -> Result<Option<(SubmissionId, RawRecord)>, FormStoreError> {
        let guard = self.submissions.lock().expect("form store mutex poisoned");
        Ok(guard.last().cloned())
    }
}
