/*!
 * Line model for `id:::text` input files.
 *
 * Every physical input line becomes a `LineEntry`. Lines carrying the `:::`
 * delimiter are translatable; anything else is passed through untouched.
 */

use std::path::Path;

use crate::errors::JobError;

/// Separator between a line identifier and its text
pub const ID_DELIMITER: &str = ":::";

/// Identifier marking a header line at position 0
pub const HEADER_ID: &str = "0";

/// One parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineEntry {
    /// Identifier before the first `:::`, empty for bare lines
    pub id: String,

    /// Text after the first `:::`, or the whole line for bare lines
    pub original_text: String,

    /// Whether the line contained the delimiter
    pub has_id_format: bool,

    /// The line as loaded
    pub raw: String,
}

impl LineEntry {
    /// Parse a raw line
    pub fn parse(line: &str) -> Self {
        match line.split_once(ID_DELIMITER) {
            Some((id, text)) => Self {
                id: id.trim().to_string(),
                original_text: text.trim().to_string(),
                has_id_format: true,
                raw: line.to_string(),
            },
            None => Self {
                id: String::new(),
                original_text: line.to_string(),
                has_id_format: false,
                raw: line.to_string(),
            },
        }
    }

    /// Initial output slot value: `id:::` for translatable lines, the raw line otherwise
    pub fn placeholder(&self) -> String {
        if self.has_id_format {
            format!("{}{}", self.id, ID_DELIMITER)
        } else {
            self.raw.clone()
        }
    }

    /// The line rebuilt with its original text, used when no translation came back
    pub fn untranslated(&self) -> String {
        if self.has_id_format {
            self.with_text(&self.original_text)
        } else {
            self.raw.clone()
        }
    }

    /// The line rebuilt with `text` in place of the original
    pub fn with_text(&self, text: &str) -> String {
        format!("{}{}{}", self.id, ID_DELIMITER, text)
    }

    /// Whether this is a header line: exactly `0:::` at the start, no padding
    pub fn is_header(&self) -> bool {
        self.raw
            .strip_prefix(HEADER_ID)
            .is_some_and(|rest| rest.starts_with(ID_DELIMITER))
    }
}

/// A line entry together with its position in the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedEntry {
    pub index: usize,
    pub entry: LineEntry,
}

/// A contiguous run of entries owned by a single worker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkChunk {
    pub entries: Vec<IndexedEntry>,
}

impl WorkChunk {
    pub fn new(entries: Vec<IndexedEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Global index of the first entry
    pub fn first_index(&self) -> Option<usize> {
        self.entries.first().map(|e| e.index)
    }

    /// Global index of the last entry
    pub fn last_index(&self) -> Option<usize> {
        self.entries.last().map(|e| e.index)
    }

    /// Split into request-sized batches, preserving order
    pub fn batches(&self, batch_size: usize) -> std::slice::Chunks<'_, IndexedEntry> {
        self.entries.chunks(batch_size.max(1))
    }
}

/// The loaded input file
#[derive(Debug, Clone, Default)]
pub struct InputDocument {
    pub entries: Vec<LineEntry>,
}

impl InputDocument {
    /// Build from raw lines, trimming surrounding whitespace
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = lines
            .into_iter()
            .map(|line| LineEntry::parse(line.as_ref().trim()))
            .collect();
        Self { entries }
    }

    /// Read an input file
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, JobError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| JobError::InputUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_lines(content.lines()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether line 0 is a header
    pub fn has_header(&self) -> bool {
        self.entries.first().is_some_and(LineEntry::is_header)
    }

    /// Initial output buffer contents, the header included
    pub fn initial_output(&self) -> Vec<String> {
        self.entries.iter().map(LineEntry::placeholder).collect()
    }

    /// Every line after the optional header, with its global index
    pub fn data_entries(&self) -> Vec<IndexedEntry> {
        let start = usize::from(self.has_header());
        self.entries
            .iter()
            .enumerate()
            .skip(start)
            .map(|(index, entry)| IndexedEntry {
                index,
                entry: entry.clone(),
            })
            .collect()
    }
}
