//! On demand computation of the features of protein groups and peptides.

use std::sync::Arc;

use context_error::{BoxedError, FullErrorContent};
use tracing::{info, warn};

use crate::{
    AbundanceContext, CancellationProbe, EntityKey, FeatureError, FeatureKind,
    FeatureSettings, FeatureState, IdentificationStore, Invalidation, LevelCoverage, Metrics,
    Outcome, PeptideEvidence, PeptideKey, PeptideMatch, ProteinKey, ProteinMatch, PtmSummary,
    SequenceProvider, SpectralCountingMethod, ValidationLevel,
    coverage::{self, ratio},
    error::FeatureResult,
    feature, occurrences,
};

/// Computes features over an identification, memoizing them in a [`FeatureState`].
///
/// The generator borrows the identification store and the sequence provider, so it is cheap to
/// create. Multiple generators can share the same state, for example one per thread. The
/// settings live in the state, so a settings change through any generator applies to all of them.
/// ```rust
/// # use mzfeatures::*;
/// let mut identification = MemoryIdentification::new();
/// identification.add_protein(
///     ProteinMatch::new("group", "P1").with_peptides(["pep"]),
///     ValidationParameters::confident(0.01),
/// );
/// identification.add_peptide(
///     PeptideMatch::new("pep", "PEPTIDER"),
///     ValidationParameters::confident(0.01),
/// );
/// let sequences = FastaSequences::from_entries([ProteinEntry {
///     accession: "P1".to_string(),
///     description: String::new(),
///     sequence: "MPEPTIDERK".into(),
/// }]);
/// let generator =
///     FeatureGenerator::new(&identification, &sequences, FeatureSettings::default()).unwrap();
/// assert_eq!(generator.sequence_coverage(&"group".into()).unwrap(), 0.8);
/// ```
#[derive(Debug)]
pub struct FeatureGenerator<'a, Store, Sequences> {
    pub(crate) store: &'a Store,
    pub(crate) sequences: &'a Sequences,
    pub(crate) state: Arc<FeatureState>,
}

/// The result of computing the coverage of many protein groups at once.
#[derive(Debug, Default)]
pub struct BulkCoverage {
    /// The coverage of every protein group that could be computed, in request order
    pub coverages: Vec<(ProteinKey, f64)>,
    /// The protein groups that failed, in request order
    pub failures: Vec<(ProteinKey, BoxedError<'static, FeatureError>)>,
}

impl<'a, Store: IdentificationStore, Sequences: SequenceProvider>
    FeatureGenerator<'a, Store, Sequences>
{
    /// Create a generator with a fresh state.
    /// # Errors
    /// If the settings are inconsistent.
    pub fn new(
        store: &'a Store,
        sequences: &'a Sequences,
        settings: FeatureSettings,
    ) -> FeatureResult<Self> {
        let state = Arc::new(FeatureState::for_settings(settings)?);
        Ok(Self::with_state(store, sequences, state))
    }

    /// Create a generator that shares its state, and with that its settings, with other
    /// generators on the same dataset.
    pub const fn with_state(
        store: &'a Store,
        sequences: &'a Sequences,
        state: Arc<FeatureState>,
    ) -> Self {
        Self {
            store,
            sequences,
            state,
        }
    }

    /// The current settings.
    pub fn settings(&self) -> Arc<FeatureSettings> {
        self.state.settings()
    }

    /// The shared state.
    pub const fn state(&self) -> &Arc<FeatureState> {
        &self.state
    }

    /// A snapshot of the dataset metrics.
    pub fn metrics(&self) -> Metrics {
        self.state.metrics()
    }

    /// Change the settings for every generator sharing this state, see
    /// [`FeatureState::update_settings`].
    /// # Errors
    /// If the new settings are inconsistent, in that case nothing is changed.
    pub fn update_settings(&self, settings: FeatureSettings) -> FeatureResult<Vec<FeatureKind>> {
        self.state.update_settings(settings)
    }

    /// Forget everything invalidated by a change to the identification.
    pub fn apply(&self, invalidation: &Invalidation) {
        self.state.apply(invalidation);
    }

    pub(crate) fn protein_sequence(&self, protein: &ProteinMatch) -> FeatureResult<Arc<str>> {
        Ok(self
            .sequences
            .protein_entry(&protein.main_accession)?
            .sequence
            .clone())
    }

    /// All non decoy peptides of a protein with their validation level.
    fn peptide_levels(
        &self,
        protein: &ProteinMatch,
    ) -> FeatureResult<Vec<(Arc<PeptideMatch>, ValidationLevel)>> {
        let keys = protein
            .peptides
            .iter()
            .map(|k| EntityKey::Peptide(k.clone()))
            .collect::<Vec<_>>();
        self.store.prefetch(&keys)?;
        let mut peptides = Vec::with_capacity(protein.peptides.len());
        for key in &protein.peptides {
            let peptide = self.store.peptide(key)?;
            if peptide.decoy {
                continue;
            }
            let level = self.store.validation(&EntityKey::Peptide(key.clone()))?.level;
            peptides.push((peptide, level));
        }
        Ok(peptides)
    }

    /// The realized coverage of a protein group, split on the best validation level per residue.
    /// # Errors
    /// If the protein group or one of its peptides is unknown, or the sequence cannot be found.
    pub fn coverage_by_level(&self, key: &ProteinKey) -> FeatureResult<LevelCoverage> {
        self.state
            .cache()
            .get_or_compute::<feature::SequenceCoverage, _>(key, || {
                let protein = self.store.protein(key)?;
                let sequence = self.protein_sequence(&protein)?;
                let peptides = self.peptide_levels(&protein)?;
                Ok(coverage::level_coverage(
                    &sequence,
                    peptides
                        .iter()
                        .map(|(peptide, level)| (peptide.sequence.as_str(), *level)),
                ))
            })
    }

    /// The fraction of the protein sequence covered by validated peptides.
    /// # Errors
    /// If the protein group or one of its peptides is unknown, or the sequence cannot be found.
    pub fn sequence_coverage(&self, key: &ProteinKey) -> FeatureResult<f64> {
        self.coverage_by_level(key).map(|coverage| coverage.total())
    }

    /// The number of validated peptides covering each residue of the protein, for coverage plots.
    /// # Errors
    /// If the protein group or one of its peptides is unknown, or the sequence cannot be found.
    pub fn residue_coverage(&self, key: &ProteinKey) -> FeatureResult<Vec<usize>> {
        let protein = self.store.protein(key)?;
        let sequence = self.protein_sequence(&protein)?;
        let peptides = self.peptide_levels(&protein)?;
        Ok(coverage::residue_coverage(
            &sequence,
            peptides
                .iter()
                .filter(|(_, level)| level.is_validated())
                .map(|(peptide, _)| peptide.sequence.as_str()),
        ))
    }

    /// The residues of the protein that could be observed given the digestion rule and maximal
    /// peptide length. Gives `None` if the digestion rule does not cleave.
    /// # Errors
    /// If the protein group is unknown, or the sequence cannot be found.
    pub fn coverable_positions(&self, key: &ProteinKey) -> FeatureResult<Option<Arc<[bool]>>> {
        if !self.settings().digestion.cleaves() {
            return Ok(None);
        }
        self.state
            .cache()
            .get_or_compute::<feature::CoverablePositions, _>(key, || {
                let settings = self.settings();
                let protein = self.store.protein(key)?;
                let sequence = self.protein_sequence(&protein)?;
                Ok(coverage::coverable_positions(
                    &sequence,
                    &settings.digestion,
                    settings.max_peptide_length,
                )
                .unwrap_or_default()
                .into())
            })
            .map(Some)
    }

    /// The number of residues that could be observed, the sequence length if the rule does not cleave.
    fn observable_length(&self, key: &ProteinKey, sequence: &str) -> FeatureResult<usize> {
        Ok(self
            .coverable_positions(key)?
            .map_or(sequence.len(), |positions| {
                positions.iter().filter(|p| **p).count()
            }))
    }

    /// The maximal coverage that could be achieved for the protein.
    /// # Errors
    /// If the protein group is unknown, or the sequence cannot be found.
    pub fn observable_coverage(&self, key: &ProteinKey) -> FeatureResult<f64> {
        self.state
            .cache()
            .get_or_compute::<feature::ObservableCoverage, _>(key, || {
                let max_length = self.settings().max_peptide_length;
                let protein = self.store.protein(key)?;
                let sequence = self.protein_sequence(&protein)?;
                let length = sequence.len() as f64;
                Ok(self.coverable_positions(key)?.map_or_else(
                    || ratio(max_length as f64, length).min(1.0),
                    |positions| ratio(positions.iter().filter(|p| **p).count() as f64, length),
                ))
            })
    }

    /// The spectral counting index of a protein group. Only the index for the default method from
    /// the settings is cached, other methods are computed on every request.
    /// # Errors
    /// If the protein group or any of its peptides or spectra is unknown, or the sequence cannot be found.
    pub fn spectral_counting(
        &self,
        key: &ProteinKey,
        method: Option<SpectralCountingMethod>,
    ) -> FeatureResult<f64> {
        let settings = self.settings();
        match method {
            Some(method) if method != settings.spectral_counting => {
                Ok(method.compute(&self.abundance_context(key, &settings)?))
            }
            _ => self
                .state
                .cache()
                .get_or_compute::<feature::SpectralCounting, _>(key, || {
                    let settings = self.settings();
                    Ok(settings
                        .spectral_counting
                        .compute(&self.abundance_context(key, &settings)?))
                }),
        }
    }

    fn abundance_context(
        &self,
        key: &ProteinKey,
        settings: &FeatureSettings,
    ) -> FeatureResult<AbundanceContext> {
        let protein = self.store.protein(key)?;
        let sequence = self.protein_sequence(&protein)?;
        let validated_only = settings.validated_only;
        let mut peptides = Vec::with_capacity(protein.peptides.len());
        for (peptide, level) in self.peptide_levels(&protein)? {
            let spectra = if validated_only {
                self.peptide_validated_spectrum_count(&peptide.key)?
            } else {
                peptide.spectra.len()
            };
            peptides.push(PeptideEvidence {
                occurrence: self.store.protein_groups_of(&peptide.key)?.len(),
                spectra,
                validated: level.is_validated(),
            });
        }
        Ok(AbundanceContext {
            peptides,
            observable_length: self.observable_length(key, &sequence)?,
            possible_peptides: settings
                .digestion
                .digest_with(
                    &sequence,
                    0,
                    settings.min_peptide_length..=settings.max_peptide_length,
                )
                .len(),
            validated_only,
        })
    }

    /// The number of validated peptides of a protein group.
    /// # Errors
    /// If the protein group or any of its peptides is unknown.
    pub fn validated_peptide_count(&self, key: &ProteinKey) -> FeatureResult<usize> {
        self.state
            .cache()
            .get_or_compute::<feature::ValidatedPeptideCount, _>(key, || {
                let protein = self.store.protein(key)?;
                let mut count = 0;
                for peptide in &protein.peptides {
                    if self
                        .store
                        .validation(&EntityKey::Peptide(peptide.clone()))?
                        .is_validated()
                    {
                        count += 1;
                    }
                }
                Ok(count)
            })
    }

    /// The number of peptides that are only found in this protein group.
    /// # Errors
    /// If the protein group or any of its peptides is unknown.
    pub fn unique_peptide_count(&self, key: &ProteinKey) -> FeatureResult<usize> {
        self.state
            .cache()
            .get_or_compute::<feature::UniquePeptideCount, _>(key, || {
                let protein = self.store.protein(key)?;
                let mut count = 0;
                for peptide in &protein.peptides {
                    if self.store.protein_groups_of(peptide)?.len() == 1 {
                        count += 1;
                    }
                }
                Ok(count)
            })
    }

    /// The number of spectrum matches of all peptides of a protein group.
    /// # Errors
    /// If the protein group or any of its peptides is unknown.
    pub fn spectrum_count(&self, key: &ProteinKey) -> FeatureResult<usize> {
        self.state
            .cache()
            .get_or_compute::<feature::SpectrumCount, _>(key, || {
                let protein = self.store.protein(key)?;
                let mut count = 0;
                for peptide in &protein.peptides {
                    count += self.store.peptide(peptide)?.spectra.len();
                }
                Ok(count)
            })
    }

    /// The number of validated spectrum matches of all peptides of a protein group.
    /// # Errors
    /// If the protein group or any of its peptides or spectra is unknown.
    pub fn validated_spectrum_count(&self, key: &ProteinKey) -> FeatureResult<usize> {
        self.state
            .cache()
            .get_or_compute::<feature::ValidatedSpectrumCount, _>(key, || {
                let protein = self.store.protein(key)?;
                let mut count = 0;
                for peptide in &protein.peptides {
                    count += self.peptide_validated_spectrum_count(peptide)?;
                }
                Ok(count)
            })
    }

    /// The number of validated spectrum matches of a peptide.
    /// # Errors
    /// If the peptide or any of its spectra is unknown.
    pub fn peptide_validated_spectrum_count(&self, key: &PeptideKey) -> FeatureResult<usize> {
        self.state
            .cache()
            .get_or_compute::<feature::PeptideValidatedSpectrumCount, _>(key, || {
                let peptide = self.store.peptide(key)?;
                let keys = peptide
                    .spectra
                    .iter()
                    .map(|k| EntityKey::Spectrum(k.clone()))
                    .collect::<Vec<_>>();
                self.store.prefetch(&keys)?;
                let mut count = 0;
                for key in &keys {
                    if self.store.validation(key)?.is_validated() {
                        count += 1;
                    }
                }
                Ok(count)
            })
    }

    /// Check if the peptide could be generated by the digestion rule from at least one of the
    /// proteins it is found in.
    /// # Errors
    /// If the peptide or any of its protein groups is unknown, or a sequence cannot be found.
    pub fn is_enzymatic_peptide(&self, key: &PeptideKey) -> FeatureResult<bool> {
        self.state
            .cache()
            .get_or_compute::<feature::EnzymaticStatus, _>(key, || {
                let settings = self.settings();
                let rule = &settings.digestion;
                let peptide = self.store.peptide(key)?;
                let length = peptide.sequence.len();
                for group in self.store.protein_groups_of(key)? {
                    let protein = self.store.protein(&group)?;
                    let sequence = self.protein_sequence(&protein)?;
                    if occurrences(&sequence, &peptide.sequence)
                        .any(|start| rule.is_enzymatic(&sequence, start..start + length))
                    {
                        return Ok(true);
                    }
                }
                Ok(false)
            })
    }

    /// The molecular weight of the representative protein of a group in kDa.
    /// # Errors
    /// If the protein group is unknown, or the sequence cannot be found.
    pub fn molecular_weight(&self, key: &ProteinKey) -> FeatureResult<f64> {
        let protein = self.store.protein(key)?;
        Ok(crate::molecular_weight(&self.protein_sequence(&protein)?))
    }

    /// Summarise the modification sites of a protein group, see [`crate::ptm_site_summary`].
    /// # Errors
    /// If the protein group is unknown, or the sequence cannot be found.
    pub fn ptm_site_summary(
        &self,
        key: &ProteinKey,
        confident: bool,
        filter: Option<&[&str]>,
    ) -> FeatureResult<PtmSummary> {
        let protein = self.store.protein(key)?;
        let sequence = self.protein_sequence(&protein)?;
        Ok(crate::ptm_site_summary(
            &sequence,
            &protein.modification_sites,
            confident,
            filter,
        ))
    }

    /// Compute the sequence coverage of many protein groups. Groups that fail on their own (an
    /// unknown key or a missing sequence) are collected, any other failure aborts the pass.
    /// # Errors
    /// If the identification store is unavailable.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn sequence_coverages(
        &self,
        keys: &[ProteinKey],
        cancel: &(impl CancellationProbe + ?Sized),
    ) -> FeatureResult<Outcome<BulkCoverage>> {
        let entities = keys
            .iter()
            .map(|k| EntityKey::Protein(k.clone()))
            .collect::<Vec<_>>();
        self.store.prefetch(&entities)?;
        let mut result = BulkCoverage::default();
        for key in keys {
            if cancel.is_cancelled() {
                info!("sequence coverage pass cancelled");
                return Ok(Outcome::Cancelled);
            }
            match self.sequence_coverage(key) {
                Ok(coverage) => result.coverages.push((key.clone(), coverage)),
                Err(err) if err.get_kind().is_recoverable() => {
                    warn!(protein = %key, error = %err, "skipping protein group");
                    result.failures.push((key.clone(), err));
                }
                Err(err) => return Err(err),
            }
        }
        info!(
            proteins = result.coverages.len(),
            failed = result.failures.len(),
            "computed sequence coverage"
        );
        Ok(Outcome::Completed(result))
    }
}
