/// Errors raised by the block core.
///
/// Grammar failures (block ids, factory names) are `Parse` and carry the
/// offending input verbatim. Everything the numeric layers reject (channel
/// counts not divisible by `groups`, zero strides, wrong input rank) arrives
/// wrapped as `Tensor`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A block id or factory name did not match its grammar.
    #[error("ParseError: {input}")]
    Parse { input: String },

    /// A user-supplied factory rule pattern failed to compile.
    #[error("invalid factory pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Failure reported by the tensor runtime while building or running a block.
    #[error(transparent)]
    Tensor(#[from] mbnas_core::Error),
}

impl Error {
    /// Parse failure for `input`.
    pub fn parse(input: impl Into<String>) -> Self {
        Error::Parse {
            input: input.into(),
        }
    }

    /// True for grammar failures, false for errors from building or running
    /// a block.
    pub fn is_parse(&self) -> bool {
        matches!(self, Error::Parse { .. })
    }
}

/// Convenience Result type for the block core.
pub type Result<T> = std::result::Result<T, Error>;
