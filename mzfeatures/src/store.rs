//! The interfaces to the identification store and the protein sequence source, with in memory implementations.

use std::{collections::HashMap, sync::Arc};

use crate::{
    EntityKey, FeatureKind, Invalidation, PeptideKey, PeptideMatch, ProteinKey, ProteinMatch,
    SpectrumKey, SpectrumMatch, ValidationParameters,
    error::{FeatureResult, missing_entity, missing_sequence},
};

/// Access to the identification hierarchy. Implementations may load lazily from a database, the
/// engine only ever reads through this interface.
///
/// Errors for unknown keys have to be of kind [`crate::FeatureError::MissingEntity`], errors
/// reaching the underlying storage of kind [`crate::FeatureError::StoreUnavailable`].
pub trait IdentificationStore {
    /// All protein group keys in the dataset, in storage order.
    /// # Errors
    /// If the store cannot be reached.
    fn protein_keys(&self) -> FeatureResult<Vec<ProteinKey>>;

    /// Get a protein group.
    /// # Errors
    /// If the key is unknown or the store cannot be reached.
    fn protein(&self, key: &ProteinKey) -> FeatureResult<Arc<ProteinMatch>>;

    /// Get a peptide.
    /// # Errors
    /// If the key is unknown or the store cannot be reached.
    fn peptide(&self, key: &PeptideKey) -> FeatureResult<Arc<PeptideMatch>>;

    /// Get a spectrum match.
    /// # Errors
    /// If the key is unknown or the store cannot be reached.
    fn spectrum(&self, key: &SpectrumKey) -> FeatureResult<Arc<SpectrumMatch>>;

    /// Get the validation parameters of any match.
    /// # Errors
    /// If the key is unknown or the store cannot be reached.
    fn validation(&self, key: &EntityKey) -> FeatureResult<ValidationParameters>;

    /// All protein groups that contain the given peptide.
    /// # Errors
    /// If the key is unknown or the store cannot be reached.
    fn protein_groups_of(&self, peptide: &PeptideKey) -> FeatureResult<Vec<ProteinKey>>;

    /// Hint that the given entities will be requested soon, stores that load in batches can use
    /// this to fetch them in one go.
    /// # Errors
    /// If the store cannot be reached.
    fn prefetch(&self, _keys: &[EntityKey]) -> FeatureResult<()> {
        Ok(())
    }
}

/// A protein sequence with its header information.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ProteinEntry {
    /// The accession
    pub accession: String,
    /// The description from the header
    pub description: String,
    /// The amino acid sequence, upper case
    pub sequence: Arc<str>,
}

/// Resolves protein accessions to their sequences.
pub trait SequenceProvider {
    /// Get the sequence and header information of an accession.
    /// # Errors
    /// If the accession is unknown, with kind [`crate::FeatureError::MissingSequence`].
    fn protein_entry(&self, accession: &str) -> FeatureResult<Arc<ProteinEntry>>;
}

impl<T: SequenceProvider + ?Sized> SequenceProvider for &T {
    fn protein_entry(&self, accession: &str) -> FeatureResult<Arc<ProteinEntry>> {
        (**self).protein_entry(accession)
    }
}

impl SequenceProvider for HashMap<String, Arc<ProteinEntry>> {
    fn protein_entry(&self, accession: &str) -> FeatureResult<Arc<ProteinEntry>> {
        self.get(accession)
            .cloned()
            .ok_or_else(|| missing_sequence(accession))
    }
}

/// A fully in memory identification, mostly meant for testing and small datasets.
#[derive(Clone, Debug, Default)]
pub struct MemoryIdentification {
    order: Vec<ProteinKey>,
    proteins: HashMap<ProteinKey, Arc<ProteinMatch>>,
    peptides: HashMap<PeptideKey, Arc<PeptideMatch>>,
    spectra: HashMap<SpectrumKey, Arc<SpectrumMatch>>,
    validation: HashMap<EntityKey, ValidationParameters>,
    groups: HashMap<PeptideKey, Vec<ProteinKey>>,
}

impl MemoryIdentification {
    /// Create an empty identification.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a protein group with its validation parameters. Adding a group with an existing key replaces it.
    pub fn add_protein(&mut self, protein: ProteinMatch, validation: ValidationParameters) {
        let key = protein.key.clone();
        if let Some(previous) = self.proteins.get(&key).cloned() {
            for peptide in &previous.peptides {
                if let Some(groups) = self.groups.get_mut(peptide) {
                    groups.retain(|k| *k != key);
                }
            }
        } else {
            self.order.push(key.clone());
        }
        for peptide in &protein.peptides {
            let groups = self.groups.entry(peptide.clone()).or_default();
            if !groups.contains(&key) {
                groups.push(key.clone());
            }
        }
        self.validation
            .insert(EntityKey::Protein(key.clone()), validation);
        self.proteins.insert(key, Arc::new(protein));
    }

    /// Add a peptide with its validation parameters.
    pub fn add_peptide(&mut self, peptide: PeptideMatch, validation: ValidationParameters) {
        let key = peptide.key.clone();
        self.validation
            .insert(EntityKey::Peptide(key.clone()), validation);
        self.peptides.insert(key, Arc::new(peptide));
    }

    /// Add a spectrum match with its validation parameters.
    pub fn add_spectrum(&mut self, spectrum: SpectrumMatch, validation: ValidationParameters) {
        let key = spectrum.key.clone();
        self.validation
            .insert(EntityKey::Spectrum(key.clone()), validation);
        self.spectra.insert(key, Arc::new(spectrum));
    }

    /// The number of protein groups.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if there are no protein groups.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Change the representative accession of a protein group. All features derived from the
    /// protein sequence are invalidated for this group and its peptides.
    /// # Errors
    /// If the protein group is unknown, or the accession is not part of the group.
    pub fn set_main_accession(
        &mut self,
        key: &ProteinKey,
        accession: &str,
    ) -> FeatureResult<Invalidation> {
        let protein = self
            .proteins
            .get_mut(key)
            .ok_or_else(|| missing_entity("protein", key))?;
        if !protein.accessions.iter().any(|a| a == accession) {
            return Err(missing_entity("accession in protein group", accession));
        }
        if protein.main_accession == accession {
            return Ok(Invalidation::none());
        }
        let protein = Arc::make_mut(protein);
        protein.main_accession = accession.to_string();
        let invalidation = protein.peptides.iter().fold(
            Invalidation::features(FeatureKind::SEQUENCE_DERIVED, key.clone()),
            |acc, peptide| {
                acc.merge(Invalidation::features(
                    &[FeatureKind::EnzymaticStatus],
                    peptide.clone(),
                ))
            },
        );
        Ok(invalidation.with_metrics())
    }

    /// Replace the validation parameters of a match. Every feature of the protein groups this
    /// match contributes to is invalidated, as are the dataset metrics.
    /// # Errors
    /// If the match is unknown.
    pub fn set_validation(
        &mut self,
        key: &EntityKey,
        validation: ValidationParameters,
    ) -> FeatureResult<Invalidation> {
        let slot = self
            .validation
            .get_mut(key)
            .ok_or_else(|| missing_entity("match", key))?;
        if *slot == validation {
            return Ok(Invalidation::none());
        }
        *slot = validation;

        let peptide = match key {
            EntityKey::Protein(protein) => {
                return Ok(Invalidation::entity(protein.clone()).with_metrics());
            }
            EntityKey::Peptide(peptide) => peptide.clone(),
            EntityKey::Spectrum(spectrum) => self
                .spectra
                .get(spectrum)
                .map(|s| s.peptide.clone())
                .ok_or_else(|| missing_entity("spectrum", spectrum))?,
        };
        let proteins = self.groups.get(&peptide).cloned().unwrap_or_default();
        Ok(proteins
            .into_iter()
            .fold(Invalidation::entity(peptide), |acc, protein| {
                acc.merge(Invalidation::entity(protein))
            })
            .with_metrics())
    }
}

impl IdentificationStore for MemoryIdentification {
    fn protein_keys(&self) -> FeatureResult<Vec<ProteinKey>> {
        Ok(self.order.clone())
    }

    fn protein(&self, key: &ProteinKey) -> FeatureResult<Arc<ProteinMatch>> {
        self.proteins
            .get(key)
            .cloned()
            .ok_or_else(|| missing_entity("protein", key))
    }

    fn peptide(&self, key: &PeptideKey) -> FeatureResult<Arc<PeptideMatch>> {
        self.peptides
            .get(key)
            .cloned()
            .ok_or_else(|| missing_entity("peptide", key))
    }

    fn spectrum(&self, key: &SpectrumKey) -> FeatureResult<Arc<SpectrumMatch>> {
        self.spectra
            .get(key)
            .cloned()
            .ok_or_else(|| missing_entity("spectrum", key))
    }

    fn validation(&self, key: &EntityKey) -> FeatureResult<ValidationParameters> {
        self.validation
            .get(key)
            .copied()
            .ok_or_else(|| missing_entity("match", key))
    }

    fn protein_groups_of(&self, peptide: &PeptideKey) -> FeatureResult<Vec<ProteinKey>> {
        if !self.peptides.contains_key(peptide) {
            return Err(missing_entity("peptide", peptide));
        }
        Ok(self.groups.get(peptide).cloned().unwrap_or_default())
    }
}
