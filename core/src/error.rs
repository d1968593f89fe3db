use thiserror::Error;

/// Longest slice of an unparseable response kept in error messages.
pub const EXCERPT_LIMIT: usize = 200;

/// Failures of the ingredient analysis pipeline.
///
/// Validation rejections (empty input, duplicate manual ingredient) are not
/// errors; those paths return `None`/`false` instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnalysisError {
    /// Required configuration, such as the API key, is missing.
    #[error("configuration error: {0}")]
    Config(String),

    /// The provider answered with a non-success status or without the
    /// expected fields.
    #[error("API error: {0}")]
    Api(String),

    /// The response body could not be decoded under any supported shape.
    #[error("could not parse analysis ({message}): {excerpt}")]
    Parse { message: String, excerpt: String },
}

impl AnalysisError {
    #[must_use]
    pub fn parse(message: impl Into<String>, text: &str) -> Self {
        Self::Parse {
            message: message.into(),
            excerpt: excerpt(text),
        }
    }
}

/// First [`EXCERPT_LIMIT`] characters of `text`, with an ellipsis when cut.
#[must_use]
pub fn excerpt(text: &str) -> String {
    if text.chars().count() <= EXCERPT_LIMIT {
        text.to_string()
    } else {
        let end = text
            .char_indices()
            .nth(EXCERPT_LIMIT)
            .map_or(text.len(), |(i, _)| i);
        format!("{}...", &text[..end])
    }
}
