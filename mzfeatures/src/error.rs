//! The [`FeatureError`] kind shared by all errors of this crate and the [`Outcome`] of bulk operations.

use context_error::{BoxedError, Context, CreateError, ErrorKind};

/// The kind of error, downstream users can match on this to decide how to surface an error.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum FeatureError {
    /// A key does not exist in the identification store, this is a caller error
    #[default]
    MissingEntity,
    /// The sequence provider could not resolve a protein accession
    MissingSequence,
    /// The identification store could not be reached at all
    StoreUnavailable,
    /// The settings could not be read or are inconsistent
    InvalidSettings,
    /// A fasta file used as sequence source could not be parsed
    InvalidFasta,
}

impl ErrorKind for FeatureError {
    type Settings = ();
    fn descriptor(&self) -> &'static str {
        "error"
    }
    fn ignored(&self, _settings: Self::Settings) -> bool {
        false
    }
    fn is_error(&self, _settings: Self::Settings) -> bool {
        true
    }
}

impl FeatureError {
    /// Failures tied to a single entity (an unknown key or a missing sequence) do not abort a
    /// bulk pass, everything else does.
    pub const fn is_recoverable(self) -> bool {
        matches!(self, Self::MissingEntity | Self::MissingSequence)
    }
}

/// The error type returned by all fallible operations in this crate.
pub type FeatureResult<T> = Result<T, BoxedError<'static, FeatureError>>;

/// Build an error for a key that is not present in the identification store.
pub(crate) fn missing_entity(what: &str, key: impl std::fmt::Display) -> BoxedError<'static, FeatureError> {
    BoxedError::new(
        FeatureError::MissingEntity,
        format!("Unknown {what}"),
        format!("The {what} with key '{key}' does not exist in the identification"),
        Context::none(),
    )
}

/// Build an error for a protein accession that could not be resolved to a sequence.
pub(crate) fn missing_sequence(accession: &str) -> BoxedError<'static, FeatureError> {
    BoxedError::new(
        FeatureError::MissingSequence,
        "Missing protein sequence",
        format!("The sequence for accession '{accession}' could not be found"),
        Context::none(),
    )
}

/// The result of a bulk operation that can be cancelled by the caller.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[must_use]
pub enum Outcome<T> {
    /// The operation ran to completion
    Completed(T),
    /// The operation was cancelled, no partial result is available
    Cancelled,
}

impl<T> Outcome<T> {
    /// Get the result if the operation was completed.
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Cancelled => None,
        }
    }

    /// Check if this operation was cancelled.
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Map the completed value.
    pub fn map<O>(self, f: impl FnOnce(T) -> O) -> Outcome<O> {
        match self {
            Self::Completed(value) => Outcome::Completed(f(value)),
            Self::Cancelled => Outcome::Cancelled,
        }
    }
}

/// Something that can be polled to see if a long running operation has to stop.
pub trait CancellationProbe {
    /// Check if the operation is cancelled.
    fn is_cancelled(&self) -> bool;
}

impl CancellationProbe for std::sync::atomic::AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(std::sync::atomic::Ordering::Relaxed)
    }
}

impl<F: Fn() -> bool> CancellationProbe for F {
    fn is_cancelled(&self) -> bool {
        self()
    }
}

/// A probe that never cancels, for callers that do not need cancellation.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverCancel;

impl CancellationProbe for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}
