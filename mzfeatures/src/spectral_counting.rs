//! Label free abundance estimation based on spectral counts.

use serde::{Deserialize, Serialize};

use crate::coverage::ratio;

/// The spectral counting method used to estimate protein abundance.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum SpectralCountingMethod {
    /// Normalized spectral abundance factor, shared peptides are split evenly over their groups
    #[default]
    Nsaf,
    /// Exponentially modified protein abundance index
    Empai,
}

impl std::fmt::Display for SpectralCountingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nsaf => write!(f, "NSAF"),
            Self::Empai => write!(f, "emPAI"),
        }
    }
}

/// The evidence of a single peptide of a protein group.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct PeptideEvidence {
    /// The number of protein groups in the dataset this peptide belongs to
    pub occurrence: usize,
    /// The number of spectra counted for this peptide, only validated spectra in validated only mode
    pub spectra: usize,
    /// If the peptide itself is validated
    pub validated: bool,
}

/// All inputs needed to calculate the abundance of a single protein group.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AbundanceContext {
    /// The evidence for every peptide of the protein group
    pub peptides: Vec<PeptideEvidence>,
    /// The number of residues that could be observed (see [`crate::observable_length`])
    pub observable_length: usize,
    /// The number of peptides the digestion rule could generate from the protein
    pub possible_peptides: usize,
    /// If only validated hits count
    pub validated_only: bool,
}

impl SpectralCountingMethod {
    /// Calculate the abundance index for a single protein group.
    pub fn compute(self, context: &AbundanceContext) -> f64 {
        match self {
            Self::Nsaf => nsaf(&context.peptides, context.observable_length),
            Self::Empai => {
                let detected = context
                    .peptides
                    .iter()
                    .filter(|p| !context.validated_only || p.validated)
                    .count();
                empai(detected, context.possible_peptides)
            }
        }
    }
}

/// The raw spectral count of a protein group, with every peptide weighted by one over the number
/// of groups it occurs in.
pub fn apportioned_spectra(peptides: &[PeptideEvidence]) -> f64 {
    peptides
        .iter()
        .map(|p| p.spectra as f64 / p.occurrence.max(1) as f64)
        .sum()
}

/// The NSAF like index: apportioned spectral count divided by the observable length, non finite
/// values (for proteins without any observable residue) are zero.
/// ```rust
/// # use mzfeatures::*;
/// let shared = PeptideEvidence { occurrence: 2, spectra: 4, validated: true };
/// assert_eq!(nsaf(&[shared], 10), 0.2);
/// assert_eq!(nsaf(&[shared], 0), 0.0);
/// ```
pub fn nsaf(peptides: &[PeptideEvidence], observable_length: usize) -> f64 {
    ratio(apportioned_spectra(peptides), observable_length as f64)
}

/// The emPAI index `10^(detected / possible) - 1`, non finite values are zero.
pub fn empai(detected: usize, possible: usize) -> f64 {
    let value = 10_f64.powf(ratio(detected as f64, possible as f64)) - 1.0;
    if possible == 0 || !value.is_finite() {
        0.0
    } else {
        value
    }
}
