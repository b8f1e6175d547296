//! Realized and observable sequence coverage of proteins.

use serde::{Deserialize, Serialize};

use crate::{DigestionRule, ValidationLevel, occurrences};

/// The fraction of a protein sequence covered by validated peptides, split on the best validation
/// level covering each residue.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct LevelCoverage {
    /// The fraction of residues covered by at least one confident peptide
    pub confident: f64,
    /// The fraction of residues covered only by doubtful peptides
    pub doubtful: f64,
}

impl LevelCoverage {
    /// The fraction of residues covered by any validated peptide.
    pub fn total(&self) -> f64 {
        self.confident + self.doubtful
    }
}

/// Divide, clamping any non finite result to zero.
pub(crate) fn ratio(count: f64, total: f64) -> f64 {
    let value = count / total;
    if value.is_finite() { value } else { 0.0 }
}

/// Mark every residue (1-based, index 0 is unused) covered by the given peptides with the best
/// validation level seen for that residue. Peptides that are not validated are ignored. Marking
/// is idempotent, multiple peptides over the same residue count once.
pub fn residue_levels<'a>(
    protein: &str,
    peptides: impl IntoIterator<Item = (&'a str, ValidationLevel)>,
) -> Vec<Option<ValidationLevel>> {
    let mut levels = vec![None; protein.len() + 1];
    for (peptide, level) in peptides {
        if !level.is_validated() {
            continue;
        }
        for start in occurrences(protein, peptide) {
            for slot in &mut levels[start + 1..=start + peptide.len()] {
                if slot.is_none_or(|current| current < level) {
                    *slot = Some(level);
                }
            }
        }
    }
    levels
}

/// The coverage per validation level of a protein by the given (peptide sequence, level) pairs.
pub fn level_coverage<'a>(
    protein: &str,
    peptides: impl IntoIterator<Item = (&'a str, ValidationLevel)>,
) -> LevelCoverage {
    let levels = residue_levels(protein, peptides);
    let count = |target: ValidationLevel| levels.iter().filter(|l| **l == Some(target)).count();
    let length = protein.len() as f64;
    LevelCoverage {
        confident: ratio(count(ValidationLevel::Confident) as f64, length),
        doubtful: ratio(count(ValidationLevel::Doubtful) as f64, length),
    }
}

/// The fraction of a protein covered by the given validated peptide sequences.
/// ```rust
/// # use mzfeatures::*;
/// assert_eq!(sequence_coverage("MPEPTIDERK", ["PEPTIDER"]), 0.8);
/// ```
pub fn sequence_coverage<'a>(protein: &str, peptides: impl IntoIterator<Item = &'a str>) -> f64 {
    level_coverage(
        protein,
        peptides
            .into_iter()
            .map(|peptide| (peptide, ValidationLevel::Confident)),
    )
    .total()
}

/// The number of peptides covering each residue (0-based), every occurrence of a peptide counts.
pub fn residue_coverage<'a>(protein: &str, peptides: impl IntoIterator<Item = &'a str>) -> Vec<usize> {
    let mut counts = vec![0; protein.len()];
    for peptide in peptides {
        for start in occurrences(protein, peptide) {
            for count in &mut counts[start..start + peptide.len()] {
                *count += 1;
            }
        }
    }
    counts
}

/// Simulate the digestion of the protein to find all residues (0-based) that could be part of a
/// peptide no longer than `max_length`. Gives `None` if the rule does not cleave, in that case
/// the whole protein is the only fragment and no per residue information is computed.
///
/// The last residue always shares the state of the residue before it.
pub fn coverable_positions(
    protein: &str,
    rule: &DigestionRule,
    max_length: usize,
) -> Option<Vec<bool>> {
    if !rule.cleaves() {
        return None;
    }
    let length = protein.len();
    let mut coverable = vec![false; length];
    let sites = rule.boundaries(protein);
    let reach = rule.missed_cleavages.saturating_add(1);

    for (index, start) in sites.iter().enumerate() {
        for end in sites.iter().skip(index + 1).take(reach) {
            if end - start <= max_length {
                coverable[*start..*end].fill(true);
            }
        }
    }

    if rule.semi_specific {
        for (index, site) in sites.iter().enumerate() {
            // Peptides starting at this site, bounded by the missed cleavages
            let limit = sites
                .get(index.saturating_add(reach))
                .copied()
                .unwrap_or(length);
            coverable[*site..site.saturating_add(max_length).min(limit)].fill(true);
            // Peptides ending at this site
            let limit = index.checked_sub(reach).map_or(0, |i| sites[i]);
            coverable[site.saturating_sub(max_length).max(limit)..*site].fill(true);
        }
    }

    if length >= 2 {
        coverable[length - 1] = coverable[length - 2];
    }
    Some(coverable)
}

/// The maximal coverage that could be achieved for this protein given the digestion rule and the
/// maximal peptide length. If the rule does not cleave this is `max_length / length`, capped at 1.
pub fn observable_coverage(protein: &str, rule: &DigestionRule, max_length: usize) -> f64 {
    let length = protein.len() as f64;
    coverable_positions(protein, rule, max_length).map_or_else(
        || ratio(max_length as f64, length).min(1.0),
        |coverable| ratio(coverable.iter().filter(|c| **c).count() as f64, length),
    )
}

/// The length of the protein that could be observed, used to normalise spectral counts.
pub fn observable_length(protein: &str, rule: &DigestionRule, max_length: usize) -> usize {
    coverable_positions(protein, rule, max_length)
        .map_or(protein.len(), |coverable| coverable.iter().filter(|c| **c).count())
}
