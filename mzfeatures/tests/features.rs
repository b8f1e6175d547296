#![allow(clippy::missing_panics_doc, clippy::float_cmp)]
//! Integration tests for the per entity features
mod common;

use common::{peptide, protein, sequences};
use context_error::FullErrorContent;
use mzfeatures::{prelude::*, *};

/// Two groups sharing one peptide, the first also has a unique peptide
fn shared_peptides() -> MemoryIdentification {
    let mut id = MemoryIdentification::new();
    protein(&mut id, "G1", "P1", ValidationParameters::confident(0.01), &["MAAAK", "CCCCR"]);
    protein(&mut id, "G2", "P2", ValidationParameters::confident(0.01), &["CCCCR"]);
    peptide(&mut id, "MAAAK", "MAAAK", 2, ValidationParameters::confident(0.01));
    peptide(&mut id, "CCCCR", "CCCCR", 4, ValidationParameters::confident(0.01));
    id
}

fn shared_sequences() -> FastaSequences {
    sequences(&[("P1", "MAAAKCCCCR"), ("P2", "MDDDKCCCCR")])
}

#[test]
fn coverage_example() {
    let mut id = MemoryIdentification::new();
    protein(&mut id, "G", "P", ValidationParameters::confident(0.01), &["pep"]);
    peptide(&mut id, "pep", "PEPTIDER", 1, ValidationParameters::confident(0.01));
    let fasta = sequences(&[("P", "MPEPTIDERK")]);
    let generator = FeatureGenerator::new(&id, &fasta, FeatureSettings::default()).unwrap();
    let key = ProteinKey::from("G");
    assert_eq!(generator.sequence_coverage(&key).unwrap(), 0.8);
    assert_eq!(
        generator.residue_coverage(&key).unwrap(),
        vec![0, 1, 1, 1, 1, 1, 1, 1, 1, 0]
    );
    assert_eq!(generator.observable_coverage(&key).unwrap(), 1.0);
}

#[test]
fn zero_and_full_coverage() {
    let mut id = MemoryIdentification::new();
    protein(&mut id, "none", "P", ValidationParameters::confident(0.01), &["bad"]);
    protein(&mut id, "full", "P", ValidationParameters::confident(0.01), &["all"]);
    peptide(&mut id, "bad", "PEPTIDER", 1, ValidationParameters::not_validated(0.9));
    peptide(&mut id, "all", "MPEPTIDERK", 1, ValidationParameters::doubtful(0.04));
    let fasta = sequences(&[("P", "MPEPTIDERK")]);
    let generator = FeatureGenerator::new(&id, &fasta, FeatureSettings::default()).unwrap();
    assert_eq!(generator.sequence_coverage(&"none".into()).unwrap(), 0.0);
    assert_eq!(generator.sequence_coverage(&"full".into()).unwrap(), 1.0);
    let levels = generator.coverage_by_level(&"full".into()).unwrap();
    assert_eq!(levels.confident, 0.0);
    assert_eq!(levels.doubtful, 1.0);
}

#[test]
fn decoy_peptides_do_not_cover() {
    let mut id = MemoryIdentification::new();
    protein(&mut id, "G", "P", ValidationParameters::confident(0.01), &["decoy"]);
    id.add_peptide(
        PeptideMatch::new("decoy", "PEPTIDER").decoy(),
        ValidationParameters::confident(0.01),
    );
    let fasta = sequences(&[("P", "MPEPTIDERK")]);
    let generator = FeatureGenerator::new(&id, &fasta, FeatureSettings::default()).unwrap();
    assert_eq!(generator.sequence_coverage(&"G".into()).unwrap(), 0.0);
}

#[test]
fn idempotent() {
    let id = shared_peptides();
    let fasta = shared_sequences();
    let generator = FeatureGenerator::new(&id, &fasta, FeatureSettings::default()).unwrap();
    let key = ProteinKey::from("G1");
    let first = generator.sequence_coverage(&key).unwrap();
    assert!(generator.state().cache().contains::<feature::SequenceCoverage>(&key));
    assert_eq!(generator.sequence_coverage(&key).unwrap(), first);
    let nsaf = generator.spectral_counting(&key, None).unwrap();
    assert_eq!(generator.spectral_counting(&key, None).unwrap(), nsaf);
}

#[test]
fn shared_peptide_apportionment() {
    let id = shared_peptides();
    let fasta = shared_sequences();
    let generator = FeatureGenerator::new(&id, &fasta, FeatureSettings::default()).unwrap();
    // (2 / 1 + 4 / 2) / 10
    assert_eq!(generator.spectral_counting(&"G1".into(), None).unwrap(), 0.4);
    // The shared peptide counts for half in each group: (4 / 2) / 10
    assert_eq!(generator.spectral_counting(&"G2".into(), None).unwrap(), 0.2);
    assert_eq!(generator.unique_peptide_count(&"G1".into()).unwrap(), 1);
    assert_eq!(generator.unique_peptide_count(&"G2".into()).unwrap(), 0);

    let mut unique = MemoryIdentification::new();
    protein(&mut unique, "G2", "P2", ValidationParameters::confident(0.01), &["CCCCR"]);
    peptide(&mut unique, "CCCCR", "CCCCR", 4, ValidationParameters::confident(0.01));
    let generator = FeatureGenerator::new(&unique, &fasta, FeatureSettings::default()).unwrap();
    assert_eq!(generator.spectral_counting(&"G2".into(), None).unwrap(), 0.4);
}

#[test]
fn empai() {
    let id = shared_peptides();
    let fasta = shared_sequences();
    let generator = FeatureGenerator::new(&id, &fasta, FeatureSettings::default()).unwrap();
    let key = ProteinKey::from("G1");
    // Two possible tryptic peptides, both seen
    let index = generator
        .spectral_counting(&key, Some(SpectralCountingMethod::Empai))
        .unwrap();
    assert!((index - 9.0).abs() < 1e-12);
    // Not the default method, so not cached
    assert!(!generator.state().cache().contains::<feature::SpectralCounting>(&key));
}

#[test]
fn degenerate_sequences_give_zero() {
    let mut id = MemoryIdentification::new();
    protein(&mut id, "empty", "E", ValidationParameters::confident(0.01), &["pep"]);
    peptide(&mut id, "pep", "PEPTIDE", 3, ValidationParameters::confident(0.01));
    let fasta = sequences(&[("E", "")]);
    let generator = FeatureGenerator::new(&id, &fasta, FeatureSettings::default()).unwrap();
    let key = ProteinKey::from("empty");
    assert_eq!(generator.sequence_coverage(&key).unwrap(), 0.0);
    assert_eq!(generator.observable_coverage(&key).unwrap(), 0.0);
    assert_eq!(generator.spectral_counting(&key, None).unwrap(), 0.0);
    assert_eq!(
        generator
            .spectral_counting(&key, Some(SpectralCountingMethod::Empai))
            .unwrap(),
        0.0
    );
    assert_eq!(generator.molecular_weight(&key).unwrap(), 0.0);
}

#[test]
fn observable_at_least_realized() {
    let mut id = MemoryIdentification::new();
    protein(
        &mut id,
        "G",
        "P",
        ValidationParameters::confident(0.01),
        &["a", "b", "c"],
    );
    peptide(&mut id, "a", "MAAAK", 1, ValidationParameters::confident(0.01));
    peptide(&mut id, "b", "CCCCR", 1, ValidationParameters::confident(0.01));
    peptide(&mut id, "c", "LLLLLLLR", 1, ValidationParameters::confident(0.01));
    let fasta = sequences(&[("P", "MAAAKCCCCRDDDDDDDDDDDDDDDDDDDDDDDDDDDDDDDDDDKLLLLLLLR")]);
    let settings = FeatureSettings {
        digestion: known_rules::trypsin(0),
        max_peptide_length: 10,
        ..FeatureSettings::default()
    };
    let generator = FeatureGenerator::new(&id, &fasta, settings).unwrap();
    let key = ProteinKey::from("G");
    let realized = generator.sequence_coverage(&key).unwrap();
    let observable = generator.observable_coverage(&key).unwrap();
    assert!(realized > 0.0);
    assert!(observable >= realized);
    assert!(observable < 1.0);
}

#[test]
fn without_cleavage() {
    let mut id = MemoryIdentification::new();
    protein(&mut id, "G", "P", ValidationParameters::confident(0.01), &[]);
    let fasta = sequences(&[("P", "MPEPTIDERK")]);
    let settings = FeatureSettings {
        digestion: known_rules::no_cleavage(),
        max_peptide_length: 5,
        ..FeatureSettings::default()
    };
    let generator = FeatureGenerator::new(&id, &fasta, settings).unwrap();
    assert_eq!(generator.coverable_positions(&"G".into()).unwrap(), None);
    assert_eq!(generator.observable_coverage(&"G".into()).unwrap(), 0.5);
}

#[test]
fn counts() {
    let mut id = shared_peptides();
    let fasta = shared_sequences();
    protein(
        &mut id,
        "G3",
        "P1",
        ValidationParameters::confident(0.01),
        &["MAAAK", "weak"],
    );
    id.add_peptide(
        PeptideMatch::new("weak", "AAAKC").with_spectra(["weak.0", "weak.1"]),
        ValidationParameters::not_validated(0.5),
    );
    id.add_spectrum(
        SpectrumMatch::new("weak.0", "weak", 2),
        ValidationParameters::confident(0.01),
    );
    id.add_spectrum(
        SpectrumMatch::new("weak.1", "weak", 3),
        ValidationParameters::not_validated(0.8),
    );
    let generator = FeatureGenerator::new(&id, &fasta, FeatureSettings::default()).unwrap();
    let key = ProteinKey::from("G3");
    assert_eq!(generator.validated_peptide_count(&key).unwrap(), 1);
    assert_eq!(generator.spectrum_count(&key).unwrap(), 4);
    assert_eq!(generator.validated_spectrum_count(&key).unwrap(), 3);
    assert_eq!(
        generator
            .peptide_validated_spectrum_count(&"weak".into())
            .unwrap(),
        1
    );
}

#[test]
fn enzymatic_status() {
    let mut id = shared_peptides();
    protein(&mut id, "G3", "P1", ValidationParameters::confident(0.01), &["inner"]);
    peptide(&mut id, "inner", "AAAKC", 0, ValidationParameters::confident(0.01));
    let fasta = shared_sequences();
    let generator = FeatureGenerator::new(&id, &fasta, FeatureSettings::default()).unwrap();
    assert!(generator.is_enzymatic_peptide(&"CCCCR".into()).unwrap());
    assert!(generator.is_enzymatic_peptide(&"MAAAK".into()).unwrap());
    assert!(!generator.is_enzymatic_peptide(&"inner".into()).unwrap());
}

#[test]
fn missing_things() {
    let mut id = shared_peptides();
    protein(&mut id, "lost", "P9", ValidationParameters::confident(0.01), &["MAAAK"]);
    let fasta = shared_sequences();
    let generator = FeatureGenerator::new(&id, &fasta, FeatureSettings::default()).unwrap();
    assert!(matches!(
        generator
            .sequence_coverage(&"lost".into())
            .unwrap_err()
            .get_kind(),
        FeatureError::MissingSequence
    ));
    assert!(matches!(
        generator
            .sequence_coverage(&"unknown".into())
            .unwrap_err()
            .get_kind(),
        FeatureError::MissingEntity
    ));

    let bulk = generator
        .sequence_coverages(&["G1".into(), "lost".into(), "G2".into()], &NeverCancel)
        .unwrap()
        .completed()
        .unwrap();
    assert_eq!(bulk.coverages.len(), 2);
    assert_eq!(bulk.failures.len(), 1);
    assert_eq!(bulk.failures[0].0, ProteinKey::from("lost"));
}

#[test]
fn bulk_cancellation() {
    let id = shared_peptides();
    let fasta = shared_sequences();
    let generator = FeatureGenerator::new(&id, &fasta, FeatureSettings::default()).unwrap();
    let cancelled = std::sync::atomic::AtomicBool::new(true);
    assert!(
        generator
            .sequence_coverages(&["G1".into()], &cancelled)
            .unwrap()
            .is_cancelled()
    );
    assert!(!generator.state().cache().contains::<feature::SequenceCoverage>(&"G1".into()));
}

#[test]
fn ptm_summary() {
    let mut id = MemoryIdentification::new();
    id.add_protein(
        ProteinMatch::new("G", "P").with_sites([
            ModificationSite::new("Phospho", 7, SiteConfidence::Confident),
            ModificationSite::new("Phospho", 5, SiteConfidence::Confident),
            ModificationSite::new("Oxidation", 1, SiteConfidence::Ambiguous),
        ]),
        ValidationParameters::confident(0.01),
    );
    let fasta = sequences(&[("P", "MPEPTIDERK")]);
    let generator = FeatureGenerator::new(&id, &fasta, FeatureSettings::default()).unwrap();
    let summary = generator.ptm_site_summary(&"G".into(), true, None).unwrap();
    assert_eq!(summary.sites, "Phospho (T5, D7)");
    assert_eq!(summary.counts, "Phospho (2)");
    let summary = generator
        .ptm_site_summary(&"G".into(), false, Some(&["Oxidation"]))
        .unwrap();
    assert_eq!(summary.sites, "M1");
    assert_eq!(summary.counts, "1");
}

#[test]
fn main_accession_change() {
    let mut id = MemoryIdentification::new();
    id.add_protein(
        ProteinMatch::new("G", "PA")
            .with_accessions(["PB"])
            .with_peptides(["pep"]),
        ValidationParameters::confident(0.01),
    );
    peptide(&mut id, "pep", "PEPTIDER", 1, ValidationParameters::confident(0.01));
    let fasta = sequences(&[("PA", "MPEPTIDERK"), ("PB", "PEPTIDERKKKKKKKK")]);
    let state = std::sync::Arc::new(FeatureState::new());
    let key = ProteinKey::from("G");

    let generator = FeatureGenerator::with_state(&id, &fasta, state.clone());
    assert_eq!(generator.sequence_coverage(&key).unwrap(), 0.8);
    drop(generator);

    let invalidation = id.set_main_accession(&key, "PB").unwrap();
    state.apply(&invalidation);
    let generator = FeatureGenerator::with_state(&id, &fasta, state);
    assert_eq!(generator.sequence_coverage(&key).unwrap(), 0.5);
}

#[test]
fn validation_change() {
    let mut id = shared_peptides();
    let fasta = shared_sequences();
    let state = std::sync::Arc::new(FeatureState::new());
    let key = ProteinKey::from("G1");
    {
        let generator = FeatureGenerator::with_state(&id, &fasta, state.clone());
        assert_eq!(generator.validated_peptide_count(&key).unwrap(), 2);
        assert_eq!(generator.sequence_coverage(&key).unwrap(), 1.0);
    }
    let invalidation = id
        .set_validation(
            &EntityKey::Peptide("MAAAK".into()),
            ValidationParameters::not_validated(0.5),
        )
        .unwrap();
    state.apply(&invalidation);
    let generator = FeatureGenerator::with_state(&id, &fasta, state);
    assert_eq!(generator.validated_peptide_count(&key).unwrap(), 1);
    assert_eq!(generator.sequence_coverage(&key).unwrap(), 0.5);
}

#[test]
fn settings_change() {
    let mut id = MemoryIdentification::new();
    protein(&mut id, "G", "P", ValidationParameters::confident(0.01), &["pep"]);
    peptide(&mut id, "pep", "AAK", 2, ValidationParameters::confident(0.01));
    let fasta = sequences(&[("P", "AAKAAAAAAAKAA")]);
    let settings = FeatureSettings {
        digestion: known_rules::trypsin(0),
        min_peptide_length: 1,
        max_peptide_length: 3,
        ..FeatureSettings::default()
    };
    let generator = FeatureGenerator::new(&id, &fasta, settings.clone()).unwrap();
    let key = ProteinKey::from("G");
    assert_eq!(generator.observable_coverage(&key).unwrap(), 5.0 / 13.0);
    assert!(generator.ranked_protein_keys(&NeverCancel).unwrap().completed().is_some());
    assert!(generator.metrics().max_spectral_counting.is_some());

    let kinds = generator
        .update_settings(FeatureSettings {
            max_peptide_length: 30,
            ..settings.clone()
        })
        .unwrap();
    assert!(kinds.contains(&FeatureKind::ObservableCoverage));
    assert!(kinds.contains(&FeatureKind::SpectralCounting));
    assert!(!kinds.contains(&FeatureKind::SequenceCoverage));
    assert_eq!(generator.metrics().max_spectral_counting, None);
    assert_eq!(generator.observable_coverage(&key).unwrap(), 1.0);

    assert!(
        generator
            .update_settings(FeatureSettings {
                min_peptide_length: 40,
                ..settings
            })
            .is_err()
    );
    assert_eq!(generator.settings().max_peptide_length, 30);
}

#[test]
fn shared_state_shares_settings() {
    let mut id = MemoryIdentification::new();
    protein(&mut id, "G", "P", ValidationParameters::confident(0.01), &["pep"]);
    peptide(&mut id, "pep", "AAK", 2, ValidationParameters::confident(0.01));
    let fasta = sequences(&[("P", "AAKAAAAAAAKAA")]);
    let settings = FeatureSettings {
        digestion: known_rules::trypsin(0),
        min_peptide_length: 1,
        ..FeatureSettings::default()
    };
    let state = std::sync::Arc::new(FeatureState::for_settings(settings.clone()).unwrap());
    let first = FeatureGenerator::with_state(&id, &fasta, state.clone());
    let second = FeatureGenerator::with_state(&id, &fasta, state);
    let key = ProteinKey::from("G");
    assert_eq!(second.observable_coverage(&key).unwrap(), 1.0);

    first
        .update_settings(FeatureSettings {
            max_peptide_length: 3,
            ..settings
        })
        .unwrap();
    assert_eq!(second.settings().max_peptide_length, 3);
    // The other generator computes and caches with the new settings
    assert_eq!(second.observable_coverage(&key).unwrap(), 5.0 / 13.0);
    assert_eq!(first.observable_coverage(&key).unwrap(), 5.0 / 13.0);
}
