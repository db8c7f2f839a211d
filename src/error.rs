use thiserror::Error;

/// Error taxonomy for the scene analysis pipeline.
///
/// Every variant is recoverable by a subsequent user trigger; none is fatal
/// to the process. The orchestrator maps each failure to a user-visible
/// status line via [`PipelineError::status_line`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Camera or microphone unavailable, or permission denied.
    /// Fatal to the triggering action; surfaced as a persistent status.
    #[error("device unavailable: {0}")]
    Device(String),

    /// Frame requested before the device started delivering data.
    /// The caller should wait and re-trigger.
    #[error("device not delivering frames yet")]
    NotReady,

    /// The inference round trip failed at the transport level.
    #[error("network failure: {0}")]
    Network(String),

    /// The inference service returned an error payload.
    #[error("service error: {0}")]
    Service(String),

    /// The response shape failed validation. Treated identically to
    /// [`PipelineError::Service`] for retry purposes.
    #[error("response failed schema validation: {0}")]
    Schema(String),

    /// Malformed PCM payload. Playback is skipped; the cycle still succeeds.
    #[error("malformed PCM payload: {0}")]
    AudioDecode(String),

    /// A trigger arrived while a cycle (or listening session) was active.
    /// Dropped, never queued.
    #[error("pipeline busy")]
    Busy,
}

impl PipelineError {
    /// User-visible status line for the HUD. Retry-oriented wording for the
    /// transient failures, persistent wording for device failures.
    pub fn status_line(&self) -> &'static str {
        match self {
            PipelineError::Device(_) => "OPTICAL LINK FAILED. CHECK PERMISSIONS.",
            PipelineError::NotReady => "OPTICAL LINK WARMING UP. RE-TRIGGER SHORTLY.",
            PipelineError::Network(_) | PipelineError::Service(_) | PipelineError::Schema(_) => {
                "NEURAL LINK RESET. RETRY ON NEXT TRIGGER."
            }
            PipelineError::AudioDecode(_) => "AUDIO CHANNEL DEGRADED.",
            PipelineError::Busy => "ANALYSIS IN PROGRESS.",
        }
    }

    /// Whether the next user trigger is expected to succeed without the user
    /// changing anything (device failures need permissions fixed first).
    pub fn retryable(&self) -> bool {
        !matches!(self, PipelineError::Device(_))
    }
}
