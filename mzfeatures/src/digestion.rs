//! Digestion rules and in silico digestion of protein sequences.

use std::ops::{Range, RangeBounds};

use serde::{Deserialize, Serialize};

/// A digestion rule defined by the residues it cuts next to and the residues that block a cut.
/// A cut site lies between two residues, a site at index `i` separates `sequence[..i]` from
/// `sequence[i..]`.
///
/// A set of standard rules can be found in [`known_rules`].
///
/// # Examples
/// ```rust
/// # use mzfeatures::*;
/// let trypsin = known_rules::trypsin(0);
///
/// // Trypsin cuts after K and R, but not if followed by a proline
/// assert_eq!(trypsin.cleavage_sites("SIADIRGRKPM"), vec![6, 8]);
///
/// // Only fragments between 4 and 40 residues long
/// let fragments = trypsin.digest("SIADIRGGKSLAIEGCRTKM", 4..=40);
/// assert_eq!(fragments, vec![0..6, 9..17]);
/// ```
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct DigestionRule {
    /// The name of the rule
    pub name: String,
    /// The residues this rule cuts after (C terminal side)
    pub cleave_after: Vec<char>,
    /// The residues this rule cuts before (N terminal side)
    pub cleave_before: Vec<char>,
    /// Residues that prevent a cut after a `cleave_after` residue when they directly follow it
    pub restriction_after: Vec<char>,
    /// Residues that prevent a cut before a `cleave_before` residue when they directly precede it
    pub restriction_before: Vec<char>,
    /// If peptides with only a single enzymatic terminus are allowed
    pub semi_specific: bool,
    /// The maximal number of missed cleavages
    pub missed_cleavages: usize,
}

impl DigestionRule {
    /// Define a rule that cuts on the C terminal side of the given residues unless followed by any of the restriction residues.
    pub fn c_terminal_of(
        name: impl Into<String>,
        residues: &[char],
        restriction: &[char],
        missed_cleavages: usize,
    ) -> Self {
        Self {
            name: name.into(),
            cleave_after: residues.to_vec(),
            restriction_after: restriction.to_vec(),
            missed_cleavages,
            ..Self::default()
        }
    }

    /// Define a rule that cuts on the N terminal side of the given residues unless preceded by any of the restriction residues.
    pub fn n_terminal_of(
        name: impl Into<String>,
        residues: &[char],
        restriction: &[char],
        missed_cleavages: usize,
    ) -> Self {
        Self {
            name: name.into(),
            cleave_before: residues.to_vec(),
            restriction_before: restriction.to_vec(),
            missed_cleavages,
            ..Self::default()
        }
    }

    /// Allow semi specific peptides.
    #[must_use]
    pub const fn semi_specific(mut self) -> Self {
        self.semi_specific = true;
        self
    }

    /// Check if this rule can cut at all.
    pub fn cleaves(&self) -> bool {
        !self.cleave_after.is_empty() || !self.cleave_before.is_empty()
    }

    /// Check if this rule cuts between the two given residues.
    pub fn is_cleavage_site(&self, before: char, after: char) -> bool {
        let before = before.to_ascii_uppercase();
        let after = after.to_ascii_uppercase();
        (self.cleave_after.contains(&before) && !self.restriction_after.contains(&after))
            || (self.cleave_before.contains(&after) && !self.restriction_before.contains(&before))
    }

    /// All locations in the given sequence where this rule cuts. The start and end of the
    /// sequence are never reported.
    pub fn cleavage_sites(&self, sequence: &str) -> Vec<usize> {
        if !self.cleaves() {
            return Vec::new();
        }
        sequence
            .as_bytes()
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| self.is_cleavage_site(char::from(pair[0]), char::from(pair[1])))
            .map(|(i, _)| i + 1)
            .collect()
    }

    /// All fragment boundaries: `0`, every cleavage site, and the sequence length.
    pub(crate) fn boundaries(&self, sequence: &str) -> Vec<usize> {
        let mut sites = Vec::with_capacity(sequence.len() / 8 + 2);
        sites.push(0);
        sites.extend(self.cleavage_sites(sequence));
        if !sequence.is_empty() {
            sites.push(sequence.len());
        }
        sites
    }

    /// Digest the sequence using the missed cleavages of this rule. Gives the ranges of all
    /// fully enzymatic fragments whose length is in the given range.
    pub fn digest(
        &self,
        sequence: &str,
        length: impl RangeBounds<usize>,
    ) -> Vec<Range<usize>> {
        self.digest_with(sequence, self.missed_cleavages, length)
    }

    /// Digest the sequence with the given number of missed cleavages.
    pub fn digest_with(
        &self,
        sequence: &str,
        missed_cleavages: usize,
        length: impl RangeBounds<usize>,
    ) -> Vec<Range<usize>> {
        let sites = self.boundaries(sequence);
        let mut result = Vec::new();
        for (index, start) in sites.iter().enumerate() {
            for end in sites.iter().skip(index + 1).take(missed_cleavages.saturating_add(1)) {
                if length.contains(&(end - start)) {
                    result.push(*start..*end);
                }
            }
        }
        result
    }

    /// Check if the peptide located at `range` on the protein sequence could be generated by
    /// this rule. The protein termini always count as enzymatic. For semi specific rules one
    /// enzymatic terminus suffices. Missed cleavages are not checked.
    pub fn is_enzymatic(&self, protein: &str, range: Range<usize>) -> bool {
        if !self.cleaves() {
            return true;
        }
        let bytes = protein.as_bytes();
        if range.start >= range.end || range.end > bytes.len() {
            return false;
        }
        let terminus = |site: usize| {
            site == 0
                || site == bytes.len()
                || self.is_cleavage_site(char::from(bytes[site - 1]), char::from(bytes[site]))
        };
        let n = terminus(range.start);
        let c = terminus(range.end);
        if self.semi_specific { n || c } else { n && c }
    }
}

/// Some well known and widely used digestion rules, all parametrised on the allowed number of missed cleavages.
pub mod known_rules {
    use super::DigestionRule;

    /// Trypsin cuts after Lysine (K) or Arginine (R), unless followed by Proline (P)
    pub fn trypsin(missed_cleavages: usize) -> DigestionRule {
        DigestionRule::c_terminal_of("Trypsin", &['K', 'R'], &['P'], missed_cleavages)
    }

    /// Trypsin without the proline rule
    pub fn trypsin_no_p_rule(missed_cleavages: usize) -> DigestionRule {
        DigestionRule::c_terminal_of("Trypsin (no P rule)", &['K', 'R'], &[], missed_cleavages)
    }

    /// Chymotrypsin cuts after Phenylalanine (F), Tryptophan (W), Tyrosine (Y), unless followed by Proline (P)
    pub fn chymotrypsin(missed_cleavages: usize) -> DigestionRule {
        DigestionRule::c_terminal_of("Chymotrypsin", &['F', 'W', 'Y'], &['P'], missed_cleavages)
    }

    /// Pepsin (pH > 2) cuts after Phenylalanine (F), Tryptophan (W), Tyrosine (Y), Leucine (L)
    pub fn pepsin(missed_cleavages: usize) -> DigestionRule {
        DigestionRule::c_terminal_of("Pepsin", &['F', 'W', 'Y', 'L'], &[], missed_cleavages)
    }

    /// Asp-N cuts before Aspartic acid (D)
    pub fn asp_n(missed_cleavages: usize) -> DigestionRule {
        DigestionRule::n_terminal_of("Asp-N", &['D'], &[], missed_cleavages)
    }

    /// Glu-C cuts after Glutamic acid (E)
    pub fn glu_c(missed_cleavages: usize) -> DigestionRule {
        DigestionRule::c_terminal_of("Glu-C", &['E'], &[], missed_cleavages)
    }

    /// Lys-C cuts after Lysine (K)
    pub fn lys_c(missed_cleavages: usize) -> DigestionRule {
        DigestionRule::c_terminal_of("Lys-C", &['K'], &[], missed_cleavages)
    }

    /// Arg-C cuts after Arginine (R), unless followed by Proline (P)
    pub fn arg_c(missed_cleavages: usize) -> DigestionRule {
        DigestionRule::c_terminal_of("Arg-C", &['R'], &['P'], missed_cleavages)
    }

    /// Unspecific digestion, modelled as a rule without specific cleavage sites
    pub fn unspecific() -> DigestionRule {
        DigestionRule {
            name: "Unspecific".to_string(),
            ..DigestionRule::default()
        }
    }

    /// No digestion at all, the whole protein is the only fragment
    pub fn no_cleavage() -> DigestionRule {
        DigestionRule {
            name: "No cleavage".to_string(),
            ..DigestionRule::default()
        }
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;

    struct DigestionTestCase {
        sequence: &'static str,
        expected_cut_sites: Vec<usize>,
        expected_peptides: Vec<&'static str>,
    }

    fn test_rule(rule: &DigestionRule, test_case: &DigestionTestCase) {
        let cut_sites = rule.cleavage_sites(test_case.sequence);
        assert_eq!(
            cut_sites, test_case.expected_cut_sites,
            "Incorrect cut sites: found '{cut_sites:?}' expected '{:?}'",
            test_case.expected_cut_sites
        );

        let peptides: Vec<&str> = rule
            .digest_with(test_case.sequence, 0, 4..40)
            .into_iter()
            .map(|range| &test_case.sequence[range])
            .collect();
        assert_eq!(peptides, test_case.expected_peptides);
    }

    #[test]
    fn trypsin() {
        let rule = known_rules::trypsin(0);
        for test_case in [
            DigestionTestCase {
                sequence: "AKRPGKR",
                expected_cut_sites: vec![2, 6],
                expected_peptides: vec!["RPGK"],
            },
            DigestionTestCase {
                sequence: "ARAKGCVLRPKDGR",
                expected_cut_sites: vec![2, 4, 11],
                expected_peptides: vec!["GCVLRPK"],
            },
        ] {
            test_rule(&rule, &test_case);
        }
    }

    #[test]
    fn chymotrypsin() {
        let rule = known_rules::chymotrypsin(0);
        for test_case in [
            DigestionTestCase {
                sequence: "AFWYPLGF",
                expected_cut_sites: vec![2, 3],
                expected_peptides: vec!["YPLGF"],
            },
            DigestionTestCase {
                sequence: "AVFUDGWTYPMSR",
                expected_cut_sites: vec![3, 7],
                expected_peptides: vec!["UDGW", "TYPMSR"],
            },
        ] {
            test_rule(&rule, &test_case);
        }
    }

    #[test]
    fn asp_n() {
        let rule = known_rules::asp_n(0);
        for test_case in [
            DigestionTestCase {
                sequence: "FARDKPGLFD",
                expected_cut_sites: vec![3, 9],
                expected_peptides: vec!["DKPGLF"],
            },
            DigestionTestCase {
                sequence: "PFKDLTMSR",
                expected_cut_sites: vec![3],
                expected_peptides: vec!["DLTMSR"],
            },
        ] {
            test_rule(&rule, &test_case);
        }
    }

    #[test]
    fn glu_c() {
        let rule = known_rules::glu_c(0);
        test_rule(
            &rule,
            &DigestionTestCase {
                sequence: "FAREDKPGLF",
                expected_cut_sites: vec![4],
                expected_peptides: vec!["FARE", "DKPGLF"],
            },
        );
    }

    #[test]
    fn missed_cleavages() {
        let rule = known_rules::trypsin(1);
        let sequence = "AARKFGKPLM";
        assert_eq!(rule.digest_with(sequence, 0, 1..40).len(), 3);
        // Original 3 peptides + 2 peptides with 1 missed cleavage
        assert_eq!(rule.digest(sequence, 1..40).len(), 5);
    }

    #[test]
    fn unbounded_missed_cleavages() {
        let rule = known_rules::trypsin(usize::MAX);
        // Every pair of boundaries: 4 boundaries give 6 fragments
        assert_eq!(rule.digest("AARKFGKPLM", ..).len(), 6);
    }

    #[test]
    fn no_cleavage() {
        let rule = known_rules::no_cleavage();
        assert!(!rule.cleaves());
        assert!(rule.cleavage_sites("MPEPTIDERK").is_empty());
        assert_eq!(rule.digest("MPEPTIDERK", ..), vec![0..10]);
        assert!(rule.is_enzymatic("MPEPTIDERK", 3..5));
    }

    #[test]
    fn enzymatic_status() {
        let rule = known_rules::trypsin(2);
        let protein = "MPEPTIDERKAAAK";
        assert!(rule.is_enzymatic(protein, 0..9));
        assert!(rule.is_enzymatic(protein, 10..14));
        assert!(!rule.is_enzymatic(protein, 1..9));
        assert!(rule.clone().semi_specific().is_enzymatic(protein, 1..9));
        assert!(!rule.semi_specific().is_enzymatic(protein, 2..8));
    }
}
