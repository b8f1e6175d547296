//! The identification hierarchy as seen by the feature engine: protein groups, peptides and spectrum matches.

use std::{borrow::Borrow, fmt::Display, sync::Arc};

use serde::{Deserialize, Serialize};
use thin_vec::ThinVec;

macro_rules! match_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
        pub struct $name(Arc<str>);

        impl $name {
            /// Get the key as text.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.into())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value.into())
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

match_key!(
    /// The key of a protein group
    ProteinKey
);
match_key!(
    /// The key of a peptide, a distinct sequence and modification state
    PeptideKey
);
match_key!(
    /// The key of a spectrum match
    SpectrumKey
);

/// A key for any match in the identification hierarchy.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum EntityKey {
    /// A protein group
    Protein(ProteinKey),
    /// A peptide
    Peptide(PeptideKey),
    /// A spectrum match
    Spectrum(SpectrumKey),
}

impl Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Protein(key) => write!(f, "protein {key}"),
            Self::Peptide(key) => write!(f, "peptide {key}"),
            Self::Spectrum(key) => write!(f, "spectrum {key}"),
        }
    }
}

impl From<ProteinKey> for EntityKey {
    fn from(value: ProteinKey) -> Self {
        Self::Protein(value)
    }
}

impl From<PeptideKey> for EntityKey {
    fn from(value: PeptideKey) -> Self {
        Self::Peptide(value)
    }
}

impl From<SpectrumKey> for EntityKey {
    fn from(value: SpectrumKey) -> Self {
        Self::Spectrum(value)
    }
}

/// A group of proteins that cannot be distinguished based on the peptide evidence.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ProteinMatch {
    /// The key of this group
    pub key: ProteinKey,
    /// The representative accession of this group
    pub main_accession: String,
    /// All accessions in this group, including the main accession
    pub accessions: ThinVec<String>,
    /// The peptides supporting this group
    pub peptides: ThinVec<PeptideKey>,
    /// If this is a decoy match
    pub decoy: bool,
    /// The modification sites as scored by a PTM localisation step
    pub modification_sites: Vec<ModificationSite>,
}

impl ProteinMatch {
    /// Create a new protein group with a single accession, which is also the main accession.
    pub fn new(key: impl Into<ProteinKey>, accession: impl Into<String>) -> Self {
        let accession = accession.into();
        Self {
            key: key.into(),
            main_accession: accession.clone(),
            accessions: thin_vec::thin_vec![accession],
            peptides: ThinVec::new(),
            decoy: false,
            modification_sites: Vec::new(),
        }
    }

    /// Add supporting peptides.
    #[must_use]
    pub fn with_peptides<K: Into<PeptideKey>>(mut self, peptides: impl IntoIterator<Item = K>) -> Self {
        self.peptides.extend(peptides.into_iter().map(Into::into));
        self
    }

    /// Add additional accessions to the group.
    #[must_use]
    pub fn with_accessions<S: Into<String>>(mut self, accessions: impl IntoIterator<Item = S>) -> Self {
        for accession in accessions {
            let accession = accession.into();
            if !self.accessions.contains(&accession) {
                self.accessions.push(accession);
            }
        }
        self
    }

    /// Add modification sites.
    #[must_use]
    pub fn with_sites(mut self, sites: impl IntoIterator<Item = ModificationSite>) -> Self {
        self.modification_sites.extend(sites);
        self
    }

    /// Mark this group as decoy.
    #[must_use]
    pub const fn decoy(mut self) -> Self {
        self.decoy = true;
        self
    }
}

/// A distinct combination of sequence and modifications.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PeptideMatch {
    /// The key of this peptide
    pub key: PeptideKey,
    /// The amino acid sequence
    pub sequence: String,
    /// The modifications, ordered by position
    pub modifications: Vec<Modification>,
    /// The spectrum matches supporting this peptide
    pub spectra: ThinVec<SpectrumKey>,
    /// If this is a decoy match
    pub decoy: bool,
}

impl PeptideMatch {
    /// Create a new unmodified peptide.
    pub fn new(key: impl Into<PeptideKey>, sequence: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            sequence: sequence.into(),
            modifications: Vec::new(),
            spectra: ThinVec::new(),
            decoy: false,
        }
    }

    /// Add supporting spectra.
    #[must_use]
    pub fn with_spectra<K: Into<SpectrumKey>>(mut self, spectra: impl IntoIterator<Item = K>) -> Self {
        self.spectra.extend(spectra.into_iter().map(Into::into));
        self
    }

    /// Add a modification, the list is kept ordered on position.
    #[must_use]
    pub fn with_modification(mut self, modification: Modification) -> Self {
        let index = self
            .modifications
            .partition_point(|m| m.position <= modification.position);
        self.modifications.insert(index, modification);
        self
    }

    /// Mark this peptide as decoy.
    #[must_use]
    pub const fn decoy(mut self) -> Self {
        self.decoy = true;
        self
    }
}

/// A modification on a peptide.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Modification {
    /// The name of the modification
    pub name: String,
    /// The 1-based position on the peptide
    pub position: usize,
}

/// The best accepted identification for a single spectrum.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SpectrumMatch {
    /// The key of this spectrum match
    pub key: SpectrumKey,
    /// The peptide this spectrum is identified as
    pub peptide: PeptideKey,
    /// The identification charge
    pub charge: u8,
    /// The retention time in seconds, if known
    pub retention_time: Option<f64>,
}

impl SpectrumMatch {
    /// Create a new spectrum match.
    pub fn new(key: impl Into<SpectrumKey>, peptide: impl Into<PeptideKey>, charge: u8) -> Self {
        Self {
            key: key.into(),
            peptide: peptide.into(),
            charge,
            retention_time: None,
        }
    }

    /// Set the retention time (in seconds).
    #[must_use]
    pub const fn with_retention_time(mut self, retention_time: f64) -> Self {
        self.retention_time = Some(retention_time);
        self
    }
}

/// The validation level of a match.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub enum ValidationLevel {
    /// Did not pass the acceptance threshold
    #[default]
    NotValidated,
    /// Passed the threshold but with a low confidence
    Doubtful,
    /// Passed the threshold with a high confidence
    Confident,
}

impl ValidationLevel {
    /// Check if this level is validated (doubtful or confident).
    pub const fn is_validated(self) -> bool {
        !matches!(self, Self::NotValidated)
    }
}

/// The statistical validation result attached to every match.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct ValidationParameters {
    /// The probability score, lower ranks first
    pub score: f64,
    /// The confidence 0..=100
    pub confidence: f64,
    /// The validation level
    pub level: ValidationLevel,
    /// If the user hid this match
    pub hidden: bool,
    /// If the user starred this match
    pub starred: bool,
}

impl Default for ValidationParameters {
    fn default() -> Self {
        Self {
            score: 1.0,
            confidence: 0.0,
            level: ValidationLevel::NotValidated,
            hidden: false,
            starred: false,
        }
    }
}

impl ValidationParameters {
    /// Create validation parameters with the given score and level.
    pub fn new(score: f64, level: ValidationLevel) -> Self {
        Self {
            score,
            confidence: (100.0 * (1.0 - score)).clamp(0.0, 100.0),
            level,
            ..Self::default()
        }
    }

    /// A confidently validated match with the given score.
    pub fn confident(score: f64) -> Self {
        Self::new(score, ValidationLevel::Confident)
    }

    /// A doubtfully validated match with the given score.
    pub fn doubtful(score: f64) -> Self {
        Self::new(score, ValidationLevel::Doubtful)
    }

    /// A not validated match with the given score.
    pub fn not_validated(score: f64) -> Self {
        Self::new(score, ValidationLevel::NotValidated)
    }

    /// Set the hidden flag.
    #[must_use]
    pub const fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Check if this match is validated.
    pub const fn is_validated(&self) -> bool {
        self.level.is_validated()
    }
}

/// How certain the localisation of a modification site is.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum SiteConfidence {
    /// The site is confidently localised
    Confident,
    /// The modification could be on this or other sites
    Ambiguous,
}

/// A modification site on a protein sequence.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct ModificationSite {
    /// The name of the modification
    pub name: String,
    /// The 1-based position on the protein sequence
    pub position: usize,
    /// The localisation confidence
    pub confidence: SiteConfidence,
}

impl ModificationSite {
    /// Create a new modification site.
    pub fn new(name: impl Into<String>, position: usize, confidence: SiteConfidence) -> Self {
        Self {
            name: name.into(),
            position,
            confidence,
        }
    }
}
