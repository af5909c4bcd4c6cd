//! Canned oracle for tests and offline runs.

use crate::oracle::{NarrationRequest, Narrator, OracleError, QueryOracle, SqlRequest};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Replays responses in order, cycling when exhausted.
pub struct MockOracle {
    responses: Vec<Result<String, OracleError>>,
    next: AtomicUsize,
}

impl MockOracle {
    pub fn new(responses: Vec<Result<String, OracleError>>) -> Self {
        Self {
            responses,
            next: AtomicUsize::new(0),
        }
    }

    pub fn always(response: &str) -> Self {
        Self::new(vec![Ok(response.to_string())])
    }

    pub fn failing(error: OracleError) -> Self {
        Self::new(vec![Err(error)])
    }

    /// Number of requests served so far.
    pub fn calls(&self) -> usize {
        self.next.load(Ordering::SeqCst)
    }

    fn reply(&self) -> Result<String, OracleError> {
        let idx = self.next.fetch_add(1, Ordering::SeqCst);
        if self.responses.is_empty() {
            return Err(OracleError::Disabled);
        }
        self.responses[idx % self.responses.len()].clone()
    }
}

impl Narrator for MockOracle {
    fn narrate(&self, _request: &NarrationRequest) -> Result<String, OracleError> {
        self.reply()
    }
}

impl QueryOracle for MockOracle {
    fn generate_sql(&self, _request: &SqlRequest) -> Result<String, OracleError> {
        self.reply()
    }
}
