//! Summaries of the localised modification sites of a protein.

use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{ModificationSite, SiteConfidence};

/// A human readable summary of the modification sites of a protein.
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct PtmSummary {
    /// The sites, for example `Phosphorylation (S12, T45); Oxidation (M1)`, or `S12, T45` if a
    /// filter was applied
    pub sites: String,
    /// The number of sites, for example `Phosphorylation (2); Oxidation (1)`, or `3` if a filter
    /// was applied
    pub counts: String,
}

/// Summarise the modification sites on a protein sequence. Only sites with the requested
/// localisation confidence (confident or ambiguous) are used.
///
/// Without a filter the sites are grouped per modification name, sorted on name. With a filter
/// only the sites of the named modifications are given as a single list sorted on position, and
/// the count is the total number of these sites. Sites outside of the sequence are shown with
/// residue `X`.
/// ```rust
/// # use mzfeatures::*;
/// let sites = [
///     ModificationSite::new("Phospho", 4, SiteConfidence::Confident),
///     ModificationSite::new("Phospho", 2, SiteConfidence::Confident),
///     ModificationSite::new("Oxidation", 1, SiteConfidence::Confident),
/// ];
/// let summary = ptm_site_summary("MSATK", &sites, true, None);
/// assert_eq!(summary.sites, "Oxidation (M1); Phospho (S2, T4)");
/// assert_eq!(summary.counts, "Oxidation (1); Phospho (2)");
/// ```
pub fn ptm_site_summary(
    sequence: &str,
    sites: &[ModificationSite],
    confident: bool,
    filter: Option<&[&str]>,
) -> PtmSummary {
    let wanted = if confident {
        SiteConfidence::Confident
    } else {
        SiteConfidence::Ambiguous
    };
    let residue = |position: usize| {
        position
            .checked_sub(1)
            .and_then(|index| sequence.as_bytes().get(index))
            .map_or('X', |b| char::from(*b).to_ascii_uppercase())
    };
    let selected = sites.iter().filter(|site| site.confidence == wanted);

    if let Some(filter) = filter {
        let positions = selected
            .filter(|site| filter.contains(&site.name.as_str()))
            .map(|site| site.position)
            .sorted_unstable()
            .dedup()
            .collect_vec();
        PtmSummary {
            sites: positions
                .iter()
                .map(|p| format!("{}{p}", residue(*p)))
                .join(", "),
            counts: positions.len().to_string(),
        }
    } else {
        let mut grouped: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for site in selected {
            grouped.entry(&site.name).or_default().push(site.position);
        }
        for positions in grouped.values_mut() {
            positions.sort_unstable();
            positions.dedup();
        }
        PtmSummary {
            sites: grouped
                .iter()
                .map(|(name, positions)| {
                    format!(
                        "{name} ({})",
                        positions
                            .iter()
                            .map(|p| format!("{}{p}", residue(*p)))
                            .join(", ")
                    )
                })
                .join("; "),
            counts: grouped
                .iter()
                .map(|(name, positions)| format!("{name} ({})", positions.len()))
                .join("; "),
        }
    }
}
