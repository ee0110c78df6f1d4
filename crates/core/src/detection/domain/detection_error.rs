use thiserror::Error;

use super::scoring_model::ModelError;

/// Cascade stage that produced an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Proposal,
    Refine,
    Finalize,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Proposal => write!(f, "proposal"),
            Stage::Refine => write!(f, "refine"),
            Stage::Finalize => write!(f, "finalize"),
        }
    }
}

/// Fatal failure for one frame. "No faces" is never an error.
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("{stage} model returned malformed output: {reason}")]
    MalformedOutput { stage: Stage, reason: String },
    #[error("{stage} model failed: {source}")]
    Model {
        stage: Stage,
        #[source]
        source: ModelError,
    },
    #[error("frame must be {expected}-channel RGB, got {channels} channels")]
    UnsupportedFrame { expected: u8, channels: u8 },
}

impl DetectionError {
    pub(crate) fn malformed(stage: Stage, reason: impl Into<String>) -> Self {
        Self::MalformedOutput {
            stage,
            reason: reason.into(),
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::MalformedOutput { stage, .. } | Self::Model { stage, .. } => Some(*stage),
            Self::UnsupportedFrame { .. } => None,
        }
    }
}
