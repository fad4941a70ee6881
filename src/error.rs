//! Error handling for Lull
//!
//! Every error carries a stable code and, where it makes sense, recovery
//! suggestions that the CLI prints next to the message.

use thiserror::Error;

/// Result type alias for Lull operations
pub type Result<T> = std::result::Result<T, LullError>;

/// Main error type for Lull operations
#[derive(Error, Debug)]
pub enum LullError {
    // Output Errors
    #[error("Audio output unavailable: {reason}")]
    AudioUnavailable {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Preset Errors
    #[error("Invalid preset '{preset_id}': {reason}")]
    InvalidPreset { preset_id: String, reason: String },

    #[error("Preset not found: {preset_id}")]
    PresetNotFound { preset_id: String },

    #[error("Duplicate preset id: {preset_id}")]
    DuplicatePreset { preset_id: String },

    // Configuration Errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // Graph Errors
    #[error("Audio graph error: {reason}")]
    GraphError { reason: String },

    #[error("Failed to release {role} node: {reason}")]
    NodeReleaseFailed { role: String, reason: String },

    // Export Errors
    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LullError {
    /// Shorthand for an `AudioUnavailable` error without an underlying source
    pub fn unavailable(reason: impl Into<String>) -> Self {
        LullError::AudioUnavailable {
            reason: reason.into(),
            source: None,
        }
    }

    /// Shorthand for an `InvalidPreset` error
    pub fn invalid_preset(preset_id: impl Into<String>, reason: impl Into<String>) -> Self {
        LullError::InvalidPreset {
            preset_id: preset_id.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a `GraphError`
    pub fn graph(reason: impl Into<String>) -> Self {
        LullError::GraphError {
            reason: reason.into(),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            LullError::AudioUnavailable { .. } => "AUDIO_UNAVAILABLE",
            LullError::InvalidPreset { .. } => "INVALID_PRESET",
            LullError::PresetNotFound { .. } => "PRESET_NOT_FOUND",
            LullError::DuplicatePreset { .. } => "DUPLICATE_PRESET",
            LullError::InvalidConfig { .. } => "INVALID_CONFIG",
            LullError::ConfigParse(_) => "CONFIG_PARSE_ERROR",
            LullError::GraphError { .. } => "GRAPH_ERROR",
            LullError::NodeReleaseFailed { .. } => "NODE_RELEASE_FAILED",
            LullError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            LullError::Io(_) => "IO_ERROR",
            LullError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable by the user re-triggering the action
    pub fn is_recoverable(&self) -> bool {
        match self {
            LullError::AudioUnavailable { .. } => true,
            LullError::PresetNotFound { .. } => true,
            LullError::NodeReleaseFailed { .. } => true,
            LullError::UnsupportedFormat { .. } => true,
            _ => false,
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            LullError::AudioUnavailable { .. } => vec![
                "Check that an output device is connected",
                "Close other applications holding the audio device exclusively",
                "Press play again once the device is available",
            ],
            LullError::InvalidPreset { .. } => vec![
                "Carrier and beat frequencies must be positive numbers",
                "Beat frequencies between 0.5 and 40 Hz are perceptually meaningful",
            ],
            LullError::PresetNotFound { .. } => vec![
                "Run 'lull-cli presets' to list the available presets",
            ],
            LullError::InvalidConfig { .. } | LullError::ConfigParse(_) => vec![
                "Check the configuration file against the documented defaults",
                "Remove the offending key to fall back to its default",
            ],
            LullError::UnsupportedFormat { .. } => vec![
                "Supported bit depths: 16, 24, 32 (float)",
            ],
            _ => vec![],
        }
    }

    /// Get a user-friendly message for this error
    pub fn friendly_message(&self) -> String {
        match self {
            LullError::AudioUnavailable { reason, .. } => {
                format!("I couldn't open the audio output ({}). Nothing is playing; try again when your device is ready.", reason)
            }
            LullError::InvalidPreset { preset_id, reason } => {
                format!("The soundscape '{}' can't be played: {}.", preset_id, reason)
            }
            LullError::PresetNotFound { preset_id } => {
                format!("There's no soundscape called '{}'.", preset_id)
            }
            _ => self.to_string(),
        }
    }
}
