//! Survey session state machine.
//!
//! `NotStarted -> InProgress -> Complete`, where `InProgress` cycles through
//! `Loading -> AwaitingRating -> Submitting -> Loading` for each sample.

use std::collections::HashSet;
use std::time::Duration;

use survey::{ServedSample, DEFAULT_SESSION_LIMIT};
use tracing::{debug, info, warn};

use crate::{ClientError, Result, SurveyApi};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Loading,
    AwaitingRating,
    Submitting,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SurveyState {
    NotStarted,
    InProgress { phase: Phase, position: usize },
    Complete,
}

impl SurveyState {
    fn name(&self) -> &'static str {
        match self {
            SurveyState::NotStarted => "not started",
            SurveyState::InProgress { phase: Phase::Loading, .. } => "loading",
            SurveyState::InProgress { phase: Phase::AwaitingRating, .. } => "awaiting a rating",
            SurveyState::InProgress { phase: Phase::Submitting, .. } => "submitting",
            SurveyState::Complete => "complete",
        }
    }
}

#[derive(Clone, Debug)]
pub struct SessionOptions {
    pub session_limit: usize,
    /// Pause before falling back to the first sample after a failed load.
    pub retry_delay: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            session_limit: DEFAULT_SESSION_LIMIT,
            retry_delay: Duration::from_secs(1),
        }
    }
}

pub struct SurveySession<A: SurveyApi> {
    api: A,
    options: SessionOptions,
    state: SurveyState,
    current: Option<ServedSample>,
    dataset_name: String,
    total: usize,
    rated: HashSet<String>,
    submitted: usize,
}

impl<A: SurveyApi> SurveySession<A> {
    pub fn new(api: A, options: SessionOptions) -> Self {
        Self {
            api,
            options,
            state: SurveyState::NotStarted,
            current: None,
            dataset_name: String::new(),
            total: 0,
            rated: HashSet::new(),
            submitted: 0,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn state(&self) -> &SurveyState {
        &self.state
    }

    pub fn current_sample(&self) -> Option<&ServedSample> {
        self.current.as_ref()
    }

    pub fn dataset_name(&self) -> &str {
        &self.dataset_name
    }

    /// Samples in this session. Starts as the dataset size capped at the
    /// session limit and follows the server's count once a sample loads.
    pub fn total_samples(&self) -> usize {
        self.total
    }

    /// Ratings submitted since the session started.
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    pub fn is_complete(&self) -> bool {
        self.state == SurveyState::Complete
    }

    fn invalid(&self, action: &'static str) -> ClientError {
        ClientError::InvalidState { action, state: self.state.name() }
    }

    pub async fn start(&mut self) -> Result<()> {
        if self.state != SurveyState::NotStarted {
            return Err(self.invalid("start"));
        }

        let info = self.api.dataset_info().await?;
        self.dataset_name = info.name;
        self.total = info.total_samples.min(self.options.session_limit);

        // Earlier ratings only drive skipping, so losing them is not fatal.
        self.rated = match self.api.ratings().await {
            Ok(ratings) => ratings.into_iter().map(|r| r.content_hash).collect(),
            Err(e) => {
                warn!(error = %e, "could not fetch existing ratings");
                HashSet::new()
            }
        };
        info!(dataset = %self.dataset_name, total = self.total, rated = self.rated.len(), "survey started");

        self.load(0).await
    }

    pub async fn rate_good(&mut self) -> Result<()> {
        self.rate(true).await
    }

    pub async fn rate_bad(&mut self) -> Result<()> {
        self.rate(false).await
    }

    /// Move on without recording anything.
    pub async fn skip(&mut self) -> Result<()> {
        let (position, last) = self.awaiting("skip")?;
        self.advance(position, last).await
    }

    /// Retry the position whose load failed.
    pub async fn reload(&mut self) -> Result<()> {
        match self.state {
            SurveyState::InProgress { phase: Phase::Loading, position } => self.load(position).await,
            _ => Err(self.invalid("reload")),
        }
    }

    /// Back to the start screen. The next `start` fetches everything again.
    pub fn reset(&mut self) {
        self.state = SurveyState::NotStarted;
        self.current = None;
        self.dataset_name.clear();
        self.total = 0;
        self.rated.clear();
        self.submitted = 0;
    }

    fn awaiting(&self, action: &'static str) -> Result<(usize, bool)> {
        match (&self.state, &self.current) {
            (SurveyState::InProgress { phase: Phase::AwaitingRating, position }, Some(sample)) => {
                Ok((*position, sample.is_last()))
            }
            _ => Err(self.invalid(action)),
        }
    }

    async fn rate(&mut self, label: bool) -> Result<()> {
        let (position, last) = self.awaiting("rate")?;
        let content_hash = match &self.current {
            Some(sample) => sample.sample.content_hash.clone(),
            None => return Err(self.invalid("rate")),
        };

        self.state = SurveyState::InProgress { phase: Phase::Submitting, position };
        if let Err(e) = self.api.submit_rating(&content_hash, label).await {
            self.state = SurveyState::InProgress { phase: Phase::AwaitingRating, position };
            return Err(e);
        }
        debug!(position, content_hash = %content_hash, label, "rating submitted");
        self.rated.insert(content_hash);
        self.submitted += 1;

        self.advance(position, last).await
    }

    async fn advance(&mut self, position: usize, last: bool) -> Result<()> {
        if last || position + 1 >= self.total {
            self.finish();
            return Ok(());
        }
        self.load(position + 1).await
    }

    fn finish(&mut self) {
        self.state = SurveyState::Complete;
        self.current = None;
        info!(submitted = self.submitted, "survey complete");
    }

    async fn load(&mut self, mut position: usize) -> Result<()> {
        let mut retried = false;
        loop {
            if position >= self.total {
                self.finish();
                return Ok(());
            }
            self.state = SurveyState::InProgress { phase: Phase::Loading, position };
            self.current = None;

            match self.api.sample(position).await {
                Ok(sample) => {
                    if sample.total_available != self.total {
                        debug!(from = self.total, to = sample.total_available, "session size set by server");
                        self.total = sample.total_available;
                    }
                    if !self.rated.contains(&sample.sample.content_hash) {
                        self.current = Some(sample);
                        self.state = SurveyState::InProgress { phase: Phase::AwaitingRating, position };
                        return Ok(());
                    }
                    if sample.is_last() {
                        self.finish();
                        return Ok(());
                    }
                    debug!(position, "sample already rated, skipping");
                    position += 1;
                }
                Err(e) if position != 0 && !retried => {
                    warn!(position, error = %e, "sample load failed, retrying from the first sample");
                    tokio::time::sleep(self.options.retry_delay).await;
                    retried = true;
                    position = 0;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
