#![doc = include_str!("../README.md")]

mod cache;
mod coverage;
mod digestion;
mod error;
mod fasta;
mod generator;
mod metrics;
mod model;
mod ptm;
mod ranking;
mod sequence;
mod settings;
mod spectral_counting;
mod state;
mod store;

pub use cache::*;
pub use coverage::*;
pub use digestion::*;
pub use error::*;
pub use fasta::*;
pub use generator::*;
pub use metrics::*;
pub use model::*;
pub use ptm::*;
pub use sequence::*;
pub use settings::*;
pub use spectral_counting::*;
pub use state::*;
pub use store::*;

/// The types and traits needed for most uses of this crate
pub mod prelude {
    pub use crate::{
        CancellationProbe, EntityKey, FastaSequences, FeatureGenerator, FeatureSettings,
        FeatureState, IdentificationStore, MemoryIdentification, Outcome, PeptideKey,
        PeptideMatch, ProteinKey, ProteinMatch, SequenceProvider, SpectrumKey, SpectrumMatch,
        ValidationParameters, known_rules,
    };
}
