//! A reference [`SequenceProvider`] reading protein sequences from fasta files.

use std::{
    collections::HashMap,
    io::{BufRead, BufReader},
    path::Path,
    sync::Arc,
};

use context_error::{BoxedError, Context, CreateError};
use tracing::debug;

use crate::{
    FeatureError, ProteinEntry, SequenceProvider,
    error::{FeatureResult, missing_sequence},
};

/// Protein sequences loaded from a fasta file, indexed on accession.
///
/// Headers are read as `>identifier description`, where an identifier in UniProt style
/// (`sp|P12345|NAME_HUMAN`) is reduced to its accession. Sequences can span multiple lines, a
/// terminal `*` is removed, and all residues are upper cased.
#[derive(Clone, Debug, Default)]
pub struct FastaSequences {
    entries: HashMap<String, Arc<ProteinEntry>>,
}

impl FastaSequences {
    /// Parse a fasta file.
    /// # Errors
    /// If the file could not be opened or is not a valid fasta file.
    pub fn parse_file(path: impl AsRef<Path>) -> FeatureResult<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|err| {
            BoxedError::new(
                FeatureError::InvalidFasta,
                "Failed reading fasta file",
                format!("Error occurred while opening the file: {err}"),
                Context::default().source(path.to_string_lossy()).to_owned(),
            )
        })?;
        Self::parse_reader(BufReader::new(file), Some(path))
    }

    /// Parse fasta text from a reader, the path is only used for error messages.
    /// # Errors
    /// If any line could not be read, a sequence is found before the first header, a header has
    /// no accession, or a sequence contains characters that are not residues.
    pub fn parse_reader(reader: impl BufRead, path: Option<&Path>) -> FeatureResult<Self> {
        let source = || {
            path.map_or_else(Context::none, |p| {
                Context::default().source(p.to_string_lossy()).to_owned()
            })
        };
        let mut entries = HashMap::new();
        let mut current: Option<(String, String)> = None;
        let mut sequence = String::new();

        for (line_index, line) in reader.lines().enumerate() {
            let line = line.map_err(|_| {
                BoxedError::new(
                    FeatureError::InvalidFasta,
                    "Failed reading fasta file",
                    format!("Error occurred while reading line {}", line_index + 1),
                    source(),
                )
            })?;
            if let Some(header) = line.strip_prefix('>') {
                if let Some((accession, description)) = current.take() {
                    insert(&mut entries, accession, description, &mut sequence);
                }
                current = Some(parse_header(line_index, &line, header)?);
            } else if line.trim().is_empty() {
                continue;
            } else if current.is_none() {
                return Err(BoxedError::new(
                    FeatureError::InvalidFasta,
                    "Invalid fasta file",
                    "A sequence was found before the first header",
                    Context::full_line(line_index as u32, &line).to_owned(),
                ));
            } else {
                let trimmed = line.trim_end().trim_end_matches('*');
                for (index, c) in trimmed.char_indices() {
                    if c.is_ascii_whitespace() {
                        continue;
                    }
                    if !c.is_ascii_alphabetic() {
                        return Err(BoxedError::new(
                            FeatureError::InvalidFasta,
                            "Invalid fasta file",
                            "Character is not an amino acid",
                            Context::line(Some(line_index as u32), &line, index, 1).to_owned(),
                        ));
                    }
                    sequence.push(c.to_ascii_uppercase());
                }
            }
        }
        if let Some((accession, description)) = current {
            insert(&mut entries, accession, description, &mut sequence);
        }
        debug!(proteins = entries.len(), "read fasta sequences");
        Ok(Self { entries })
    }

    /// Build a provider from already known entries.
    pub fn from_entries(entries: impl IntoIterator<Item = ProteinEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.accession.clone(), Arc::new(entry)))
                .collect(),
        }
    }

    /// The number of proteins.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no proteins.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn insert(
    entries: &mut HashMap<String, Arc<ProteinEntry>>,
    accession: String,
    description: String,
    sequence: &mut String,
) {
    entries.insert(
        accession.clone(),
        Arc::new(ProteinEntry {
            accession,
            description,
            sequence: std::mem::take(sequence).into(),
        }),
    );
}

fn parse_header(
    line_index: usize,
    line: &str,
    header: &str,
) -> FeatureResult<(String, String)> {
    let (identifier, description) = header
        .trim()
        .split_once(char::is_whitespace)
        .unwrap_or((header.trim(), ""));
    let accession = match identifier.split('|').collect::<Vec<_>>().as_slice() {
        [_, accession, ..] => *accession,
        _ => identifier,
    };
    if accession.is_empty() {
        return Err(BoxedError::new(
            FeatureError::InvalidFasta,
            "Invalid fasta header",
            "The header does not contain an accession",
            Context::full_line(line_index as u32, line).to_owned(),
        ));
    }
    Ok((accession.to_string(), description.trim().to_string()))
}

impl SequenceProvider for FastaSequences {
    fn protein_entry(&self, accession: &str) -> FeatureResult<Arc<ProteinEntry>> {
        self.entries
            .get(accession)
            .cloned()
            .ok_or_else(|| missing_sequence(accession))
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use context_error::FullErrorContent;

    use super::*;

    fn parse(text: &str) -> FeatureResult<FastaSequences> {
        FastaSequences::parse_reader(BufReader::new(text.as_bytes()), None)
    }

    #[test]
    fn multi_line() {
        let fasta = parse(">P1 First protein\nmpep\nTIDERK*\n\n>sp|P2|SECOND_HUMAN Second\nAAAK\n").unwrap();
        assert_eq!(fasta.len(), 2);
        let first = fasta.protein_entry("P1").unwrap();
        assert_eq!(&*first.sequence, "MPEPTIDERK");
        assert_eq!(first.description, "First protein");
        let second = fasta.protein_entry("P2").unwrap();
        assert_eq!(&*second.sequence, "AAAK");
        assert_eq!(second.description, "Second");
    }

    #[test]
    fn errors() {
        assert!(matches!(
            parse("AAAK\n>P1\nAAAK").unwrap_err().get_kind(),
            FeatureError::InvalidFasta
        ));
        assert!(matches!(
            parse(">P1\nAA1K").unwrap_err().get_kind(),
            FeatureError::InvalidFasta
        ));
        assert!(matches!(
            parse(">\nAAAK").unwrap_err().get_kind(),
            FeatureError::InvalidFasta
        ));
        let fasta = parse(">P1\nAAAK").unwrap();
        assert!(matches!(
            fasta.protein_entry("P9").unwrap_err().get_kind(),
            FeatureError::MissingSequence
        ));
    }

    #[test]
    fn empty_sequence() {
        let fasta = parse(">P1\n>P2\nK").unwrap();
        assert_eq!(&*fasta.protein_entry("P1").unwrap().sequence, "");
    }
}
