//! A typed cache for derived features, keyed by the kind of feature and the entity it describes.

use std::{
    collections::HashSet,
    num::NonZeroUsize,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
};

use indexmap::IndexMap;
use tracing::debug;

use crate::{EntityKey, LevelCoverage};

/// All kinds of features that can be stored in the [`FeatureCache`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum FeatureKind {
    /// The realized sequence coverage of a protein
    SequenceCoverage,
    /// The maximal achievable coverage of a protein
    ObservableCoverage,
    /// The residues of a protein that could be observed
    CoverablePositions,
    /// The spectral counting index of a protein, for the configured default method
    SpectralCounting,
    /// The number of peptides of a protein that are unique to its group
    UniquePeptideCount,
    /// The number of validated peptides of a protein
    ValidatedPeptideCount,
    /// The number of spectrum matches of a protein
    SpectrumCount,
    /// The number of validated spectrum matches of a protein or a peptide
    ValidatedSpectrumCount,
    /// If a peptide is enzymatic in its proteins
    EnzymaticStatus,
}

impl FeatureKind {
    /// All feature kinds.
    pub const ALL: &'static [Self] = &[
        Self::SequenceCoverage,
        Self::ObservableCoverage,
        Self::CoverablePositions,
        Self::SpectralCounting,
        Self::UniquePeptideCount,
        Self::ValidatedPeptideCount,
        Self::SpectrumCount,
        Self::ValidatedSpectrumCount,
        Self::EnzymaticStatus,
    ];

    /// The kinds that depend on the protein sequence, the digestion rule, or the peptide length limits.
    pub const SEQUENCE_DERIVED: &'static [Self] = &[
        Self::SequenceCoverage,
        Self::ObservableCoverage,
        Self::CoverablePositions,
        Self::SpectralCounting,
        Self::EnzymaticStatus,
    ];

    /// The kinds that depend on the validation status of matches.
    pub const VALIDATION_DERIVED: &'static [Self] = &[
        Self::SequenceCoverage,
        Self::SpectralCounting,
        Self::ValidatedPeptideCount,
        Self::ValidatedSpectrumCount,
    ];
}

/// A value stored in the [`FeatureCache`].
#[derive(Clone, Debug, PartialEq)]
pub enum FeatureValue {
    /// A coverage split on validation level
    Coverage(LevelCoverage),
    /// A ratio or index
    Ratio(f64),
    /// A flag per residue
    Positions(Arc<[bool]>),
    /// A count
    Count(usize),
    /// A flag
    Flag(bool),
}

/// A feature that can be stored in the [`FeatureCache`], this ties the kind of feature to the
/// entity it describes and the type of its value.
pub trait Feature {
    /// The kind of this feature
    const KIND: FeatureKind;
    /// The key of the entity this feature describes
    type Key: Clone + Into<EntityKey>;
    /// The value of this feature
    type Value: Clone;
    /// Store the value.
    fn wrap(value: Self::Value) -> FeatureValue;
    /// Retrieve the value, gives `None` if the stored value is not of this feature.
    fn unwrap(value: &FeatureValue) -> Option<Self::Value>;
}

macro_rules! features {
    ($($(#[$meta:meta])* $name:ident: $kind:ident for $key:ty => $variant:ident($value:ty);)*) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
            pub struct $name;

            impl Feature for $name {
                const KIND: FeatureKind = FeatureKind::$kind;
                type Key = $key;
                type Value = $value;
                fn wrap(value: Self::Value) -> FeatureValue {
                    FeatureValue::$variant(value)
                }
                fn unwrap(value: &FeatureValue) -> Option<Self::Value> {
                    match value {
                        FeatureValue::$variant(value) => Some(value.clone()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

/// The features that can be cached, use these as type parameter for [`FeatureCache::get`] and friends.
pub mod feature {
    use std::sync::Arc;

    use super::{Feature, FeatureKind, FeatureValue};
    use crate::{LevelCoverage, PeptideKey, ProteinKey};

    features! {
        /// The realized coverage of a protein
        SequenceCoverage: SequenceCoverage for ProteinKey => Coverage(LevelCoverage);
        /// The observable coverage of a protein
        ObservableCoverage: ObservableCoverage for ProteinKey => Ratio(f64);
        /// The coverable residues of a protein
        CoverablePositions: CoverablePositions for ProteinKey => Positions(Arc<[bool]>);
        /// The spectral counting index of a protein (default method only)
        SpectralCounting: SpectralCounting for ProteinKey => Ratio(f64);
        /// The number of peptides unique to a protein group
        UniquePeptideCount: UniquePeptideCount for ProteinKey => Count(usize);
        /// The number of validated peptides of a protein group
        ValidatedPeptideCount: ValidatedPeptideCount for ProteinKey => Count(usize);
        /// The number of spectra of a protein group
        SpectrumCount: SpectrumCount for ProteinKey => Count(usize);
        /// The number of validated spectra of a protein group
        ValidatedSpectrumCount: ValidatedSpectrumCount for ProteinKey => Count(usize);
        /// The number of validated spectra of a peptide
        PeptideValidatedSpectrumCount: ValidatedSpectrumCount for PeptideKey => Count(usize);
        /// If a peptide is enzymatic in at least one of its proteins
        EnzymaticStatus: EnzymaticStatus for PeptideKey => Flag(bool);
    }
}

type Slot = (FeatureKind, EntityKey);

/// What a change to the identification invalidates, handed out by every mutation of the
/// identification store and consumed by [`crate::FeatureState::apply`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[must_use]
pub struct Invalidation {
    pub(crate) slots: Vec<Slot>,
    pub(crate) entities: Vec<EntityKey>,
    pub(crate) metrics: bool,
    pub(crate) filter: bool,
    pub(crate) orders: bool,
}

impl Invalidation {
    /// Nothing is invalidated.
    pub fn none() -> Self {
        Self::default()
    }

    /// The given kinds are invalidated for the given entity.
    pub fn features(kinds: &[FeatureKind], key: impl Into<EntityKey>) -> Self {
        let key = key.into();
        Self {
            slots: kinds.iter().map(|kind| (*kind, key.clone())).collect(),
            ..Self::default()
        }
    }

    /// Every cached feature of the given entity is invalidated.
    pub fn entity(key: impl Into<EntityKey>) -> Self {
        Self {
            entities: vec![key.into()],
            ..Self::default()
        }
    }

    /// Also reset the dataset wide metrics (this implies the filter and display orders).
    pub const fn with_metrics(mut self) -> Self {
        self.metrics = true;
        self.filter = true;
        self.orders = true;
        self
    }

    /// Also rerun the filtering pass the next time it is requested.
    pub const fn with_filter(mut self) -> Self {
        self.filter = true;
        self
    }

    /// Also forget the memoized peptide and spectrum orders.
    pub const fn with_orders(mut self) -> Self {
        self.orders = true;
        self
    }

    /// Combine two invalidations.
    pub fn merge(mut self, other: Self) -> Self {
        self.slots.extend(other.slots);
        self.entities.extend(other.entities);
        self.metrics |= other.metrics;
        self.filter |= other.filter;
        self.orders |= other.orders;
        self
    }

    /// Check if this invalidates nothing.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
            && self.entities.is_empty()
            && !self.metrics
            && !self.filter
            && !self.orders
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: IndexMap<Slot, FeatureValue>,
    in_flight: HashSet<Slot>,
    /// Incremented on every invalidation, a computation that started in an older epoch is not stored
    epoch: u64,
}

/// A memoization store for derived features. Entries never expire by themselves, they have to be
/// invalidated explicitly when the underlying identification changes. Optionally the number of
/// entries can be bounded, in which case the least recently used entry is evicted first.
///
/// All operations take `&self`, the cache can be shared between threads.
#[derive(Debug, Default)]
pub struct FeatureCache {
    state: Mutex<CacheState>,
    ready: Condvar,
    capacity: Option<NonZeroUsize>,
}

impl FeatureCache {
    /// Create an unbounded cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache that holds at most `capacity` entries.
    pub fn bounded(capacity: NonZeroUsize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// The maximal number of entries, if bounded.
    pub const fn capacity(&self) -> Option<NonZeroUsize> {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a feature if it is cached, this never computes anything.
    pub fn get<F: Feature>(&self, key: &F::Key) -> Option<F::Value> {
        let slot = (F::KIND, key.clone().into());
        let mut state = self.lock();
        let index = state.entries.get_index_of(&slot)?;
        let value = F::unwrap(&state.entries[index]);
        if self.capacity.is_some() {
            let last = state.entries.len() - 1;
            state.entries.move_index(index, last);
        }
        value
    }

    /// Store a feature, overwriting any previous value.
    pub fn put<F: Feature>(&self, key: &F::Key, value: F::Value) {
        let mut state = self.lock();
        self.insert(&mut state, (F::KIND, key.clone().into()), F::wrap(value));
    }

    /// The current invalidation epoch, pass it to [`Self::put_since`] to store a value computed
    /// from data read after this point.
    pub(crate) fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    /// Store a feature only if nothing was invalidated since `epoch`, returns if it was stored.
    pub(crate) fn put_since<F: Feature>(&self, key: &F::Key, value: F::Value, epoch: u64) -> bool {
        let mut state = self.lock();
        if state.epoch != epoch {
            return false;
        }
        self.insert(&mut state, (F::KIND, key.clone().into()), F::wrap(value));
        true
    }

    fn insert(&self, state: &mut CacheState, slot: Slot, value: FeatureValue) {
        let (index, _) = state.entries.insert_full(slot, value);
        if let Some(capacity) = self.capacity {
            let last = state.entries.len() - 1;
            state.entries.move_index(index, last);
            while state.entries.len() > capacity.get() {
                state.entries.shift_remove_index(0);
            }
        }
    }

    /// Check if a feature is cached without retrieving it.
    pub fn contains<F: Feature>(&self, key: &F::Key) -> bool {
        self.contains_slot(F::KIND, &key.clone().into())
    }

    /// Check if a feature of the given kind is cached for the given entity.
    pub fn contains_slot(&self, kind: FeatureKind, key: &EntityKey) -> bool {
        self.lock().entries.contains_key(&(kind, key.clone()))
    }

    /// Remove all features of the given kind, returns the number of removed entries.
    pub fn invalidate_kind(&self, kind: FeatureKind) -> usize {
        let mut state = self.lock();
        state.epoch += 1;
        let before = state.entries.len();
        state.entries.retain(|(k, _), _| *k != kind);
        before - state.entries.len()
    }

    /// Remove a single feature, returns if it was present.
    pub fn invalidate(&self, kind: FeatureKind, key: &EntityKey) -> bool {
        let mut state = self.lock();
        state.epoch += 1;
        state.entries.shift_remove(&(kind, key.clone())).is_some()
    }

    /// Remove all features of the given entity, returns the number of removed entries.
    pub fn invalidate_entity(&self, key: &EntityKey) -> usize {
        let mut state = self.lock();
        state.epoch += 1;
        let before = state.entries.len();
        state.entries.retain(|(_, k), _| k != key);
        before - state.entries.len()
    }

    /// Remove all features named in the invalidation.
    pub fn apply(&self, invalidation: &Invalidation) {
        let mut state = self.lock();
        state.epoch += 1;
        for slot in &invalidation.slots {
            state.entries.shift_remove(slot);
        }
        if !invalidation.entities.is_empty() {
            state
                .entries
                .retain(|(_, k), _| !invalidation.entities.contains(k));
        }
    }

    /// Remove everything.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.epoch += 1;
        state.entries.clear();
    }

    /// The number of cached features.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Check if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Get a feature, computing and storing it on a miss. When multiple threads miss on the same
    /// feature at the same time only one computes it, the others wait for its result. Failed
    /// computations are not stored. If the cache is invalidated while computing the value is
    /// returned but not stored.
    ///
    /// The computation must not request the same feature (this would wait forever).
    /// # Errors
    /// If the computation fails.
    pub fn get_or_compute<F: Feature, E>(
        &self,
        key: &F::Key,
        compute: impl FnOnce() -> Result<F::Value, E>,
    ) -> Result<F::Value, E> {
        let slot: Slot = (F::KIND, key.clone().into());
        let mut state = self.lock();
        loop {
            if let Some(index) = state.entries.get_index_of(&slot) {
                if let Some(value) = F::unwrap(&state.entries[index]) {
                    if self.capacity.is_some() {
                        let last = state.entries.len() - 1;
                        state.entries.move_index(index, last);
                    }
                    return Ok(value);
                }
            }
            if !state.in_flight.contains(&slot) {
                break;
            }
            state = self
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.in_flight.insert(slot.clone());
        let epoch = state.epoch;
        drop(state);

        let guard = InFlight {
            cache: self,
            slot: Some(slot),
        };
        debug!(kind = ?F::KIND, "computing feature");
        let value = compute()?;
        let mut state = self.lock();
        if state.epoch == epoch {
            if let Some(slot) = guard.slot.clone() {
                self.insert(&mut state, slot, F::wrap(value.clone()));
            }
        }
        drop(state);
        drop(guard);
        Ok(value)
    }
}

/// Releases a slot claimed for computation, also when the computation fails or panics.
struct InFlight<'a> {
    cache: &'a FeatureCache,
    slot: Option<Slot>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            self.cache.lock().in_flight.remove(&slot);
            self.cache.ready.notify_all();
        }
    }
}
