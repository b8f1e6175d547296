//! Small helpers on plain amino acid sequences.

/// The average mass of water in Dalton, added once per protein for the termini.
const WATER_AVERAGE_MASS: f64 = 18.01528;

/// The average residue mass (in Dalton) of the given amino acid, ambiguous codes use the mean of their options.
pub fn average_residue_mass(residue: char) -> Option<f64> {
    Some(match residue.to_ascii_uppercase() {
        'A' => 71.0779,
        'R' => 156.1857,
        'N' => 114.1026,
        'D' => 115.0874,
        'C' => 103.1429,
        'E' => 129.1140,
        'Q' => 128.1292,
        'G' => 57.0513,
        'H' => 137.1393,
        'I' | 'L' | 'J' => 113.1576,
        'K' => 128.1723,
        'M' => 131.1961,
        'F' => 147.1739,
        'P' => 97.1152,
        'S' => 87.0773,
        'T' => 101.1039,
        'W' => 186.2099,
        'Y' => 163.1733,
        'V' => 99.1311,
        'U' => 150.0379,
        'O' => 237.2982,
        'B' => f64::midpoint(114.1026, 115.0874),
        'Z' => f64::midpoint(128.1292, 129.1140),
        _ => return None,
    })
}

/// The average molecular weight of a protein sequence in kDa. Unknown residues (X and the like) do
/// not contribute any mass. An empty sequence weighs nothing.
pub fn molecular_weight(sequence: &str) -> f64 {
    if sequence.is_empty() {
        return 0.0;
    }
    let mass: f64 = sequence.chars().filter_map(average_residue_mass).sum();
    (mass + WATER_AVERAGE_MASS) / 1000.0
}

/// All start indices (0-based) where `peptide` occurs in `protein`, overlapping occurrences
/// included. The comparison ignores ASCII case.
pub fn occurrences<'a>(protein: &'a str, peptide: &'a str) -> impl Iterator<Item = usize> + 'a {
    let protein = protein.as_bytes();
    let peptide = peptide.as_bytes();
    let possible = if peptide.is_empty() {
        0
    } else {
        (protein.len() + 1).saturating_sub(peptide.len())
    };
    (0..possible).filter(move |start| {
        protein[*start..*start + peptide.len()].eq_ignore_ascii_case(peptide)
    })
}
