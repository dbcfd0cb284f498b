use crate::foundation::core::RequestId;

/// Result alias used across the crate.
pub type ProofResult<T> = Result<T, ProofError>;

/// Which side of a transform a profile was requested for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProfileRole {
    /// The working space of the design (usually sRGB).
    Source,
    /// The print condition being simulated or separated for.
    Output,
}

impl std::fmt::Display for ProfileRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// Errors raised by the proofing subsystem.
///
/// None of these are fatal to the host: the scheduler records them and keeps running, the export
/// pipeline degrades where it can.
#[derive(thiserror::Error, Debug)]
pub enum ProofError {
    /// Profile bytes could not be obtained (fetch failure, empty payload, unknown id).
    #[error("{role} profile '{profile_id}' unavailable: {reason}")]
    ProfileUnavailable {
        /// Role the profile was requested for.
        role: ProfileRole,
        /// Requested profile id.
        profile_id: String,
        /// Human readable cause.
        reason: String,
    },

    /// The engine rejected `init` (corrupt or unsupported profile bytes).
    #[error("engine init failed: {0}")]
    EngineInitFailed(String),

    /// A specific transform request failed after init succeeded.
    #[error("transform {id} failed: {message}")]
    TransformFailed {
        /// Id of the failed request.
        id: RequestId,
        /// Message reported by the engine.
        message: String,
    },

    /// ICC bytes could not be decoded or describe an unsupported profile.
    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    /// Argument or state validation error.
    #[error("validation error: {0}")]
    Validation(String),

    /// The design surface could not produce a snapshot.
    #[error("capture error: {0}")]
    Capture(String),

    /// The engine thread is gone.
    #[error("transform engine disconnected")]
    EngineDisconnected,

    /// No response arrived for a request within the configured bound.
    #[error("request {id} timed out")]
    Timeout {
        /// Id of the request that timed out.
        id: RequestId,
    },

    /// Settings (de)serialization error.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Filesystem error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Anything else.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProofError {
    /// Build a [`ProofError::ProfileUnavailable`].
    pub fn profile_unavailable(
        role: ProfileRole,
        profile_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ProfileUnavailable {
            role,
            profile_id: profile_id.into(),
            reason: reason.into(),
        }
    }

    /// Build a [`ProofError::InvalidProfile`].
    pub fn invalid_profile(msg: impl Into<String>) -> Self {
        Self::InvalidProfile(msg.into())
    }

    /// Build a [`ProofError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`ProofError::Capture`].
    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture(msg.into())
    }

    /// Build a [`ProofError::Serde`].
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// `true` for failures a later settings change or refresh can clear.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::ProfileUnavailable { .. }
            | Self::EngineInitFailed(_)
            | Self::TransformFailed { .. }
            | Self::InvalidProfile(_)
            | Self::Capture(_)
            | Self::Timeout { .. } => true,
            Self::Validation(_)
            | Self::EngineDisconnected
            | Self::Serde(_)
            | Self::Io(_)
            | Self::Other(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_failing_role() {
        let err = ProofError::profile_unavailable(ProfileRole::Output, "newsprint", "404");
        assert_eq!(
            err.to_string(),
            "output profile 'newsprint' unavailable: 404"
        );
        assert!(err.is_recoverable());
    }

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            ProofError::invalid_profile("x")
                .to_string()
                .contains("invalid profile:")
        );
        assert!(
            ProofError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(
            ProofError::serde("x")
                .to_string()
                .contains("serialization error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = ProofError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
        assert!(!err.is_recoverable());
    }
}
