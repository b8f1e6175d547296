//! The display orders of protein groups, peptides and spectrum matches.

use std::{cmp::Reverse, sync::Arc};

use context_error::FullErrorContent;
use itertools::Itertools;
use ordered_float::OrderedFloat;
use tracing::{debug, info, warn};

use crate::{
    CancellationProbe, EntityKey, FeatureGenerator, FilteredProteins, IdentificationStore,
    Outcome, PeptideKey, ProteinKey, SequenceProvider, SpectrumKey,
    error::FeatureResult,
    feature,
    metrics::MaximaAccumulator,
    state::{PeptideOrder, SpectrumOrder},
};

/// The sort key of a protein group
type ProteinRank = (OrderedFloat<f64>, Reverse<usize>, Reverse<usize>, ProteinKey);

impl<Store: IdentificationStore, Sequences: SequenceProvider> FeatureGenerator<'_, Store, Sequences> {
    /// All target protein groups in display order: probability score ascending, then number of
    /// peptides descending, then number of spectra descending, and finally key ascending. Hidden
    /// groups are included, see [`Self::filtered_protein_keys`] to remove them.
    ///
    /// The dataset maxima in the [`crate::Metrics`] are filled in the same pass, and the order is
    /// kept until the metrics are invalidated. The probe is polled before every protein group, a
    /// cancelled pass stores nothing in the metrics.
    ///
    /// A group that cannot be read on its own (an unknown peptide for example) is logged and left
    /// out. Missing sequences only lead to a zero spectral counting index and molecular weight
    /// for that group.
    /// # Errors
    /// If the store is unavailable.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn ranked_protein_keys(
        &self,
        cancel: &(impl CancellationProbe + ?Sized),
    ) -> FeatureResult<Outcome<Arc<[ProteinKey]>>> {
        {
            let metrics = self.state.read_metrics();
            if let Some(ranked) = &metrics.ranked_proteins {
                if metrics.maxima_known() {
                    return Ok(Outcome::Completed(ranked.clone()));
                }
            }
        }

        let keys = self.store.protein_keys()?;
        let entities = keys
            .iter()
            .map(|k| EntityKey::Protein(k.clone()))
            .collect_vec();
        self.store.prefetch(&entities)?;

        let mut maxima = MaximaAccumulator::default();
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            if cancel.is_cancelled() {
                info!("protein ranking cancelled");
                return Ok(Outcome::Cancelled);
            }
            match self.protein_rank(&key, &mut maxima) {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => (),
                Err(err) if err.get_kind().is_recoverable() => {
                    warn!(protein = %key, error = %err, "protein group left out of the ranking");
                }
                Err(err) => return Err(err),
            }
        }
        entries.sort_unstable();
        let ranked: Arc<[ProteinKey]> = entries.into_iter().map(|(.., key)| key).collect();

        let mut metrics = self.state.write_metrics();
        maxima.store(&mut metrics);
        metrics.ranked_proteins = Some(ranked.clone());
        metrics.mark_filter_dirty();
        info!(proteins = ranked.len(), "ranked protein groups");
        Ok(Outcome::Completed(ranked))
    }

    /// Gather the sort key of a single protein group and add it to the maxima, gives `None` for
    /// decoys. Maxima are only updated once the counts of the group are known.
    fn protein_rank(
        &self,
        key: &ProteinKey,
        maxima: &mut MaximaAccumulator,
    ) -> FeatureResult<Option<ProteinRank>> {
        let protein = self.store.protein(key)?;
        if protein.decoy {
            return Ok(None);
        }
        let validation = self.store.validation(&EntityKey::Protein(key.clone()))?;
        let peptides = protein.peptides.len();
        let spectra = self.spectrum_count(key)?;
        maxima.add_counts(peptides, spectra, validation.is_validated());

        let values = self
            .spectral_counting(key, None)
            .and_then(|index| Ok((index, self.molecular_weight(key)?)));
        match values {
            Ok((index, weight)) => maxima.add_values(index, weight),
            Err(err) if err.get_kind().is_recoverable() => {
                warn!(protein = %key, error = %err, "no sequence based values for protein group");
            }
            Err(err) => return Err(err),
        }

        Ok(Some((
            OrderedFloat(validation.score),
            Reverse(peptides),
            Reverse(spectra),
            key.clone(),
        )))
    }

    /// The ranked protein groups without the hidden ones, and the validated subset of those. The
    /// filtering pass is only rerun if the filter was marked dirty.
    /// Groups whose validation cannot be found are logged and left out.
    /// # Errors
    /// If ranking fails, or the store is unavailable.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn filtered_protein_keys(
        &self,
        cancel: &(impl CancellationProbe + ?Sized),
    ) -> FeatureResult<Outcome<FilteredProteins>> {
        let Outcome::Completed(ranked) = self.ranked_protein_keys(cancel)? else {
            return Ok(Outcome::Cancelled);
        };
        {
            let metrics = self.state.read_metrics();
            if !metrics.needs_filtering() {
                if let Some(filtered) = &metrics.filtered_proteins {
                    return Ok(Outcome::Completed(filtered.clone()));
                }
            }
        }

        let mut visible = Vec::with_capacity(ranked.len());
        let mut validated = Vec::new();
        for key in ranked.iter() {
            if cancel.is_cancelled() {
                info!("protein filtering cancelled");
                return Ok(Outcome::Cancelled);
            }
            let validation = match self.store.validation(&EntityKey::Protein(key.clone())) {
                Ok(validation) => validation,
                Err(err) if err.get_kind().is_recoverable() => {
                    warn!(protein = %key, error = %err, "protein group left out of the filter");
                    continue;
                }
                Err(err) => return Err(err),
            };
            if validation.hidden {
                continue;
            }
            visible.push(key.clone());
            if validation.is_validated() {
                validated.push(key.clone());
            }
        }
        let filtered = FilteredProteins {
            visible: visible.into(),
            validated: validated.into(),
        };

        let mut metrics = self.state.write_metrics();
        metrics.filtered_proteins = Some(filtered.clone());
        metrics.filter_dirty = false;
        debug!(
            visible = filtered.visible.len(),
            validated = filtered.validated.len(),
            "filtered protein groups"
        );
        Ok(Outcome::Completed(filtered))
    }

    /// The peptides of a protein group in display order: probability score ascending, then number
    /// of spectra descending, and finally key ascending. The order for the last requested
    /// protein group is memoized.
    /// # Errors
    /// If the protein group or any of its peptides is unknown.
    pub fn ranked_peptide_keys(&self, key: &ProteinKey) -> FeatureResult<Arc<[PeptideKey]>> {
        if let Some(order) = self.state.peptide_order().as_ref() {
            if order.protein == *key {
                return Ok(order.peptides.clone());
            }
        }
        let epoch = self.state.cache().epoch();
        let protein = self.store.protein(key)?;
        let mut entries = Vec::with_capacity(protein.peptides.len());
        for peptide in &protein.peptides {
            let score = self
                .store
                .validation(&EntityKey::Peptide(peptide.clone()))?
                .score;
            let spectra = self.store.peptide(peptide)?.spectra.len();
            entries.push((OrderedFloat(score), Reverse(spectra), peptide.clone()));
        }
        entries.sort_unstable();
        let peptides: Arc<[PeptideKey]> = entries.into_iter().map(|(.., key)| key).collect();
        let mut memo = self.state.peptide_order();
        if self.state.cache().epoch() == epoch {
            *memo = Some(PeptideOrder {
                protein: key.clone(),
                peptides: peptides.clone(),
            });
        }
        Ok(peptides)
    }

    /// The spectrum matches of a peptide in display order: charge ascending, then retention time
    /// ascending (or probability score ascending if not all spectra have a retention time), and
    /// finally key ascending. The order for the last requested peptide is memoized, and the
    /// number of validated spectra of the peptide is cached in the same pass.
    /// # Errors
    /// If the peptide or any of its spectra is unknown.
    pub fn ranked_spectrum_keys(&self, key: &PeptideKey) -> FeatureResult<Arc<[SpectrumKey]>> {
        if let Some(order) = self.state.spectrum_order().as_ref() {
            if order.peptide == *key {
                return Ok(order.spectra.clone());
            }
        }
        let epoch = self.state.cache().epoch();
        let peptide = self.store.peptide(key)?;
        let mut spectra = Vec::with_capacity(peptide.spectra.len());
        for spectrum in &peptide.spectra {
            let validation = self
                .store
                .validation(&EntityKey::Spectrum(spectrum.clone()))?;
            spectra.push((self.store.spectrum(spectrum)?, validation));
        }
        let by_time = spectra.iter().all(|(s, _)| s.retention_time.is_some());
        let validated = spectra.iter().filter(|(_, v)| v.is_validated()).count();

        let order: Arc<[SpectrumKey]> = spectra
            .into_iter()
            .map(|(spectrum, validation)| {
                let secondary = if by_time {
                    spectrum.retention_time.unwrap_or_default()
                } else {
                    validation.score
                };
                (
                    spectrum.charge,
                    OrderedFloat(secondary),
                    spectrum.key.clone(),
                )
            })
            .sorted_unstable()
            .map(|(.., key)| key)
            .collect();

        let mut memo = self.state.spectrum_order();
        if self
            .state
            .cache()
            .put_since::<feature::PeptideValidatedSpectrumCount>(key, validated, epoch)
        {
            *memo = Some(SpectrumOrder {
                peptide: key.clone(),
                spectra: order.clone(),
            });
        }
        Ok(order)
    }
}
