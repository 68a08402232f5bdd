//! Client side of the survey: the API it consumes and the per-session state
//! machine that walks a user through their samples.

pub mod api;
pub mod http;
pub mod session;

pub use api::SurveyApi;
pub use http::HttpSurveyApi;
pub use session::{Phase, SessionOptions, SurveySession, SurveyState};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("{action} is not allowed while {state}")]
    InvalidState { action: &'static str, state: &'static str },
}

pub type Result<T> = std::result::Result<T, ClientError>;
