//! Dataset wide metrics.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ProteinKey;

/// Dataset wide aggregates, computed once while ranking the proteins and reused for normalisation
/// in user interfaces and as early exit for repeated ranking requests.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Metrics {
    /// The maximal number of peptides of any protein group
    pub max_peptides: Option<usize>,
    /// The maximal number of spectra of any protein group
    pub max_spectra: Option<usize>,
    /// The maximal spectral counting index of any protein group
    pub max_spectral_counting: Option<f64>,
    /// The maximal molecular weight (kDa) of any protein group
    pub max_molecular_weight: Option<f64>,
    /// The number of validated target protein groups
    pub validated_proteins: Option<usize>,
    /// All target protein groups in display order
    pub ranked_proteins: Option<Arc<[ProteinKey]>>,
    /// The result of the last filtering pass
    pub filtered_proteins: Option<FilteredProteins>,
    /// If the filtering pass has to be rerun
    pub filter_dirty: bool,
}

/// The protein groups that survived the filtering pass, in display order.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct FilteredProteins {
    /// All protein groups that are not hidden
    pub visible: Arc<[ProteinKey]>,
    /// All validated protein groups that are not hidden
    pub validated: Arc<[ProteinKey]>,
}

impl Metrics {
    /// Check if all maxima are known.
    pub const fn maxima_known(&self) -> bool {
        self.max_peptides.is_some()
            && self.max_spectra.is_some()
            && self.max_spectral_counting.is_some()
            && self.max_molecular_weight.is_some()
            && self.validated_proteins.is_some()
    }

    /// Forget everything, used when the dataset changes.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Forget the spectral counting maximum, for example when the counting method changed.
    pub const fn reset_spectral_counting(&mut self) {
        self.max_spectral_counting = None;
    }

    /// Rerun the filtering pass the next time it is requested.
    pub const fn mark_filter_dirty(&mut self) {
        self.filter_dirty = true;
    }

    /// Check if the filtering pass has to be run.
    pub const fn needs_filtering(&self) -> bool {
        self.filter_dirty || self.filtered_proteins.is_none()
    }
}

/// Collects dataset wide maxima during a single pass over all proteins.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct MaximaAccumulator {
    pub(crate) peptides: usize,
    pub(crate) spectra: usize,
    pub(crate) spectral_counting: f64,
    pub(crate) molecular_weight: f64,
    pub(crate) validated_proteins: usize,
}

impl MaximaAccumulator {
    pub(crate) const fn add_counts(&mut self, peptides: usize, spectra: usize, validated: bool) {
        if peptides > self.peptides {
            self.peptides = peptides;
        }
        if spectra > self.spectra {
            self.spectra = spectra;
        }
        if validated {
            self.validated_proteins += 1;
        }
    }

    pub(crate) fn add_values(&mut self, spectral_counting: f64, molecular_weight: f64) {
        self.spectral_counting = self.spectral_counting.max(spectral_counting);
        self.molecular_weight = self.molecular_weight.max(molecular_weight);
    }

    /// Fill in all maxima that are not yet known.
    pub(crate) fn store(self, metrics: &mut Metrics) {
        metrics.max_peptides.get_or_insert(self.peptides);
        metrics.max_spectra.get_or_insert(self.spectra);
        metrics
            .max_spectral_counting
            .get_or_insert(self.spectral_counting);
        metrics
            .max_molecular_weight
            .get_or_insert(self.molecular_weight);
        metrics.validated_proteins.get_or_insert(self.validated_proteins);
    }
}
