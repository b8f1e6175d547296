//! The state shared by all feature generators working on the same dataset.

use std::{
    num::NonZeroUsize,
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use tracing::info;

use crate::{
    EntityKey, FeatureCache, FeatureKind, FeatureSettings, Invalidation, Metrics, PeptideKey,
    ProteinKey, SpectrumKey, error::FeatureResult,
};

/// The memoized display order of the spectra of a peptide.
#[derive(Clone, Debug)]
pub(crate) struct SpectrumOrder {
    pub(crate) peptide: PeptideKey,
    pub(crate) spectra: Arc<[SpectrumKey]>,
}

/// The memoized display order of the peptides of a protein.
#[derive(Clone, Debug)]
pub(crate) struct PeptideOrder {
    pub(crate) protein: ProteinKey,
    pub(crate) peptides: Arc<[PeptideKey]>,
}

/// Everything the feature engine remembers about a dataset: the settings, the feature cache, the
/// dataset wide metrics, and the display orders for the protein and peptide currently being
/// looked at.
///
/// This is shared between all [`crate::FeatureGenerator`]s working on the same dataset, so all
/// of them always compute with the same settings.
#[derive(Debug, Default)]
pub struct FeatureState {
    settings: RwLock<Arc<FeatureSettings>>,
    cache: FeatureCache,
    metrics: RwLock<Metrics>,
    peptide_order: Mutex<Option<PeptideOrder>>,
    spectrum_order: Mutex<Option<SpectrumOrder>>,
}

impl FeatureState {
    /// Create a state with the default settings and an unbounded cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a state with the default settings and a cache holding at most `capacity` features.
    pub fn bounded(capacity: NonZeroUsize) -> Self {
        Self {
            cache: FeatureCache::bounded(capacity),
            ..Self::default()
        }
    }

    /// Create a state with the given settings, the cache capacity is taken from the settings.
    /// # Errors
    /// If the settings are inconsistent.
    pub fn for_settings(settings: FeatureSettings) -> FeatureResult<Self> {
        settings.validate()?;
        let state = settings
            .cache_capacity
            .map_or_else(Self::new, Self::bounded);
        *state.write_settings() = Arc::new(settings);
        Ok(state)
    }

    /// The current settings.
    pub fn settings(&self) -> Arc<FeatureSettings> {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn write_settings(&self) -> RwLockWriteGuard<'_, Arc<FeatureSettings>> {
        self.settings.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the settings. Every feature kind the change affects is invalidated before the
    /// new settings become visible, and the spectral counting maximum is reset
    /// if that index changed. Returns the invalidated kinds. The cache capacity cannot be
    /// changed this way.
    /// # Errors
    /// If the new settings are inconsistent, in that case nothing is changed.
    pub fn update_settings(&self, settings: FeatureSettings) -> FeatureResult<Vec<FeatureKind>> {
        settings.validate()?;
        let mut current = self.write_settings();
        let kinds = current.invalidated_kinds(&settings);
        *current = Arc::new(settings);
        // Bumps the cache epoch, so computations that read the old settings are not stored
        for kind in &kinds {
            self.cache.invalidate_kind(*kind);
        }
        if kinds.contains(&FeatureKind::SpectralCounting) {
            self.write_metrics().reset_spectral_counting();
        }
        drop(current);
        if !kinds.is_empty() {
            info!(?kinds, "settings changed");
        }
        Ok(kinds)
    }

    /// The feature cache.
    pub const fn cache(&self) -> &FeatureCache {
        &self.cache
    }

    /// A snapshot of the current dataset metrics.
    pub fn metrics(&self) -> Metrics {
        self.read_metrics().clone()
    }

    pub(crate) fn read_metrics(&self) -> RwLockReadGuard<'_, Metrics> {
        self.metrics.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write_metrics(&self) -> RwLockWriteGuard<'_, Metrics> {
        self.metrics.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn peptide_order(&self) -> MutexGuard<'_, Option<PeptideOrder>> {
        self.peptide_order
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn spectrum_order(&self) -> MutexGuard<'_, Option<SpectrumOrder>> {
        self.spectrum_order
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Forget everything that is invalidated by a change to the identification.
    pub fn apply(&self, invalidation: &Invalidation) {
        self.cache.apply(invalidation);
        {
            let mut metrics = self.write_metrics();
            if invalidation.metrics {
                metrics.reset();
            }
            if invalidation.filter {
                metrics.mark_filter_dirty();
            }
        }
        let mut peptides = self.peptide_order();
        if invalidation.orders
            || peptides.as_ref().is_some_and(|order| {
                invalidation
                    .entities
                    .contains(&EntityKey::Protein(order.protein.clone()))
            })
        {
            *peptides = None;
        }
        drop(peptides);
        let mut spectra = self.spectrum_order();
        if invalidation.orders
            || spectra.as_ref().is_some_and(|order| {
                invalidation
                    .entities
                    .contains(&EntityKey::Peptide(order.peptide.clone()))
            })
        {
            *spectra = None;
        }
    }

    /// Forget everything, used when a different dataset is loaded.
    pub fn reset(&self) {
        self.cache.clear();
        self.write_metrics().reset();
        *self.peptide_order() = None;
        *self.spectrum_order() = None;
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;
    use crate::feature;

    #[test]
    fn apply_invalidation() {
        let state = FeatureState::new();
        state.cache().put::<feature::SpectrumCount>(&"A".into(), 3);
        state.write_metrics().max_spectra = Some(3);
        *state.peptide_order() = Some(PeptideOrder {
            protein: "A".into(),
            peptides: Arc::from(vec![PeptideKey::from("p")]),
        });

        state.apply(&Invalidation::entity(ProteinKey::from("B")));
        assert_eq!(state.cache().len(), 1);
        assert!(state.peptide_order().is_some());

        state.apply(&Invalidation::entity(ProteinKey::from("A")));
        assert!(state.cache().is_empty());
        assert!(state.peptide_order().is_none());
        assert_eq!(state.metrics().max_spectra, Some(3));

        state.apply(&Invalidation::none().with_metrics());
        assert_eq!(state.metrics().max_spectra, None);
        assert!(state.metrics().needs_filtering());
    }

    #[test]
    fn capacity_from_settings() {
        let settings = FeatureSettings {
            cache_capacity: NonZeroUsize::new(5),
            ..FeatureSettings::default()
        };
        assert_eq!(
            FeatureState::for_settings(settings.clone())
                .unwrap()
                .cache()
                .capacity(),
            NonZeroUsize::new(5)
        );
        assert_eq!(
            FeatureState::for_settings(FeatureSettings::default())
                .unwrap()
                .cache()
                .capacity(),
            None
        );
        assert!(
            FeatureState::for_settings(FeatureSettings {
                max_peptide_length: 0,
                ..settings
            })
            .is_err()
        );
    }

    #[test]
    fn update_settings() {
        let state = FeatureState::new();
        state
            .cache()
            .put::<feature::ObservableCoverage>(&"A".into(), 1.0);
        state.cache().put::<feature::SpectrumCount>(&"A".into(), 2);
        state.write_metrics().max_spectral_counting = Some(0.5);
        let kinds = state
            .update_settings(FeatureSettings {
                max_peptide_length: 3,
                ..FeatureSettings::default()
            })
            .unwrap();
        assert!(kinds.contains(&FeatureKind::ObservableCoverage));
        assert_eq!(state.settings().max_peptide_length, 3);
        assert!(!state.cache().contains::<feature::ObservableCoverage>(&"A".into()));
        assert_eq!(state.cache().get::<feature::SpectrumCount>(&"A".into()), Some(2));
        assert_eq!(state.metrics().max_spectral_counting, None);

        assert!(
            state
                .update_settings(FeatureSettings {
                    min_peptide_length: 40,
                    ..FeatureSettings::default()
                })
                .is_err()
        );
        assert_eq!(state.settings().max_peptide_length, 3);
    }
}
