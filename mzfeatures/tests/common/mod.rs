//! Helpers to build small identifications for the integration tests
#![allow(dead_code)]

use mzfeatures::prelude::*;
use mzfeatures::ProteinEntry;

/// Add a protein group with the given peptides.
pub(crate) fn protein(
    identification: &mut MemoryIdentification,
    key: &str,
    accession: &str,
    validation: ValidationParameters,
    peptides: &[&str],
) {
    identification.add_protein(
        ProteinMatch::new(key, accession).with_peptides(peptides.iter().copied()),
        validation,
    );
}

/// Add a confidently validated peptide with `spectra` confidently validated charge 2 spectra,
/// named `{key}.{index}`.
pub(crate) fn peptide(
    identification: &mut MemoryIdentification,
    key: &str,
    sequence: &str,
    spectra: usize,
    validation: ValidationParameters,
) {
    let keys = (0..spectra).map(|i| format!("{key}.{i}")).collect::<Vec<_>>();
    for spectrum in &keys {
        identification.add_spectrum(
            SpectrumMatch::new(spectrum.as_str(), key, 2),
            ValidationParameters::confident(0.01),
        );
    }
    identification.add_peptide(
        PeptideMatch::new(key, sequence).with_spectra(keys),
        validation,
    );
}

/// Build a sequence provider from accession and sequence pairs.
pub(crate) fn sequences(entries: &[(&str, &str)]) -> FastaSequences {
    FastaSequences::from_entries(entries.iter().map(|(accession, sequence)| ProteinEntry {
        accession: (*accession).to_string(),
        description: String::new(),
        sequence: (*sequence).into(),
    }))
}
