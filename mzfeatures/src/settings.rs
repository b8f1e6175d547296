//! The settings controlling how features are computed.

use std::{io::Read, num::NonZeroUsize, path::Path};

use context_error::{BoxedError, Context, CreateError};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    DigestionRule, FeatureError, FeatureKind, SpectralCountingMethod, error::FeatureResult,
    known_rules,
};

/// The settings for a [`crate::FeatureGenerator`]. Settings files are JSON, missing fields take
/// their default value.
/// ```rust
/// # use mzfeatures::*;
/// let settings = FeatureSettings::from_json(r#"{"max_peptide_length": 25}"#).unwrap();
/// assert_eq!(settings.max_peptide_length, 25);
/// assert_eq!(settings.min_peptide_length, 4);
/// assert_eq!(settings.digestion.name, "Trypsin");
/// ```
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct FeatureSettings {
    /// The digestion rule used for observable coverage, emPAI, and enzymatic status
    pub digestion: DigestionRule,
    /// The minimal length of a peptide
    pub min_peptide_length: usize,
    /// The maximal length of a peptide
    pub max_peptide_length: usize,
    /// The default spectral counting method
    pub spectral_counting: SpectralCountingMethod,
    /// If only validated matches count towards spectral counting
    pub validated_only: bool,
    /// The maximal number of cached features, unbounded if not set. Only used when the
    /// [`crate::FeatureState`] is created.
    pub cache_capacity: Option<NonZeroUsize>,
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            digestion: known_rules::trypsin(2),
            min_peptide_length: 4,
            max_peptide_length: 30,
            spectral_counting: SpectralCountingMethod::default(),
            validated_only: true,
            cache_capacity: None,
        }
    }
}

impl FeatureSettings {
    /// Parse settings from JSON text.
    /// # Errors
    /// If the text is not valid JSON for these settings, or the settings are inconsistent.
    pub fn from_json(text: &str) -> FeatureResult<Self> {
        let settings: Self = serde_json::from_str(text).map_err(|err| {
            BoxedError::new(
                FeatureError::InvalidSettings,
                "Invalid settings",
                err.to_string(),
                Context::show(text.to_string()),
            )
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read settings from a JSON reader.
    /// # Errors
    /// If the reader does not contain valid JSON for these settings, or the settings are inconsistent.
    pub fn from_reader(reader: impl Read) -> FeatureResult<Self> {
        let settings: Self = serde_json::from_reader(reader).map_err(|err| {
            BoxedError::new(
                FeatureError::InvalidSettings,
                "Invalid settings",
                err.to_string(),
                Context::none(),
            )
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read settings from a JSON file.
    /// # Errors
    /// If the file cannot be opened or does not contain valid settings.
    pub fn from_file(path: impl AsRef<Path>) -> FeatureResult<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|err| {
            BoxedError::new(
                FeatureError::InvalidSettings,
                "Could not open settings file",
                err.to_string(),
                Context::default().source(path.to_string_lossy()).to_owned(),
            )
        })?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Check that these settings are consistent.
    /// # Errors
    /// If the minimal peptide length is larger than the maximal length, or the maximal length is zero.
    pub fn validate(&self) -> FeatureResult<()> {
        if self.max_peptide_length == 0 {
            Err(BoxedError::new(
                FeatureError::InvalidSettings,
                "Invalid peptide length",
                "The maximal peptide length has to be at least one",
                Context::none(),
            ))
        } else if self.min_peptide_length > self.max_peptide_length {
            Err(BoxedError::new(
                FeatureError::InvalidSettings,
                "Invalid peptide length",
                format!(
                    "The minimal peptide length ({}) is larger than the maximal peptide length ({})",
                    self.min_peptide_length, self.max_peptide_length
                ),
                Context::none(),
            ))
        } else {
            Ok(())
        }
    }

    /// The feature kinds that are no longer valid when switching from these settings to `new`.
    pub fn invalidated_kinds(&self, new: &Self) -> Vec<FeatureKind> {
        let mut kinds = Vec::new();
        if self.digestion != new.digestion {
            kinds.extend([
                FeatureKind::ObservableCoverage,
                FeatureKind::CoverablePositions,
                FeatureKind::SpectralCounting,
                FeatureKind::EnzymaticStatus,
            ]);
        }
        if self.max_peptide_length != new.max_peptide_length {
            kinds.extend([
                FeatureKind::ObservableCoverage,
                FeatureKind::CoverablePositions,
                FeatureKind::SpectralCounting,
            ]);
        }
        if self.min_peptide_length != new.min_peptide_length
            || self.spectral_counting != new.spectral_counting
            || self.validated_only != new.validated_only
        {
            kinds.push(FeatureKind::SpectralCounting);
        }
        kinds.into_iter().sorted().dedup().collect()
    }
}
