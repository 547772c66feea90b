//! Record source for tabular inputs.
//!
//! A [`RecordSource`] owns the fetched bytes of one CSV file and hands out
//! lazy row iterators. The header is validated when the source is opened,
//! so a missing column aborts the run before anything is written.

use bytes::Bytes;
use snafu::prelude::*;
use tracing::info;

use crate::config::SourceConfig;
use crate::error::{
    EmptySourceSnafu, FetchSnafu, HeaderSnafu, MissingColumnsSnafu, RowSnafu, SourceError,
};
use crate::storage;

/// How candidate translations are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Translations come from a column of the input file.
    Tabular,
    /// Translations come from the translator.
    Predictive,
}

/// One input row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRow {
    /// Zero-based position among data rows.
    pub index: usize,
    pub source_text: String,
    /// Candidate translation, absent for the predictive variant or empty cells.
    pub target_text: Option<String>,
}

/// A validated, restartable tabular input.
#[derive(Debug, Clone)]
pub struct RecordSource {
    data: Bytes,
    delimiter: u8,
    source_idx: usize,
    target_idx: Option<usize>,
    trim: bool,
}

impl RecordSource {
    /// Fetch the configured input and validate its header.
    pub async fn open(config: &SourceConfig) -> Result<Self, SourceError> {
        let data = storage::fetch(&config.path, config.storage_options.clone())
            .await
            .context(FetchSnafu {
                location: config.path.clone(),
            })?;

        info!("Loaded {} bytes from {}", data.len(), config.path);

        // Validated as ASCII by the config layer.
        let delimiter = u8::try_from(config.delimiter).unwrap_or(b',');
        Self::from_bytes(
            data,
            &config.source_column,
            config.target_column.as_deref(),
            delimiter,
        )
        .map(|source| source.with_trim(config.trim))
    }

    /// Build a source from an in-memory buffer.
    pub fn from_bytes(
        data: impl Into<Bytes>,
        source_column: &str,
        target_column: Option<&str>,
        delimiter: u8,
    ) -> Result<Self, SourceError> {
        let data = data.into();
        let mut reader = reader_for(&data, delimiter);
        let headers = reader.headers().context(HeaderSnafu)?;

        let position = |name: &str| headers.iter().position(|h| h.trim() == name);
        let source_idx = position(source_column);
        let target_idx = target_column.map(|name| (name, position(name)));

        let mut missing = Vec::new();
        if source_idx.is_none() {
            missing.push(source_column.to_string());
        }
        if let Some((name, None)) = target_idx {
            missing.push(name.to_string());
        }
        ensure!(missing.is_empty(), MissingColumnsSnafu { missing });

        Ok(Self {
            data,
            delimiter,
            source_idx: source_idx.unwrap_or_default(),
            target_idx: target_idx.and_then(|(_, idx)| idx),
            trim: true,
        })
    }

    /// Whether surrounding whitespace is stripped from cells (default: true).
    ///
    /// Whitespace-only cells count as empty either way.
    pub fn with_trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    pub fn variant(&self) -> Variant {
        if self.target_idx.is_some() {
            Variant::Tabular
        } else {
            Variant::Predictive
        }
    }

    /// Iterate over the data rows from the beginning.
    pub fn rows(&self) -> Rows<'_> {
        Rows {
            reader: reader_for(&self.data, self.delimiter),
            record: csv::StringRecord::new(),
            source_idx: self.source_idx,
            target_idx: self.target_idx,
            trim: self.trim,
            index: 0,
        }
    }

    /// Number of data rows, including malformed ones.
    pub fn row_count(&self) -> usize {
        let mut reader = reader_for(&self.data, self.delimiter);
        let mut record = csv::ByteRecord::new();
        let mut count = 0;
        loop {
            match reader.read_byte_record(&mut record) {
                Ok(true) | Err(_) => count += 1,
                Ok(false) => break,
            }
        }
        count
    }
}

fn reader_for(data: &[u8], delimiter: u8) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(data)
}

/// Lazy iterator over the rows of a [`RecordSource`].
pub struct Rows<'a> {
    reader: csv::Reader<&'a [u8]>,
    record: csv::StringRecord,
    source_idx: usize,
    target_idx: Option<usize>,
    trim: bool,
    index: usize,
}

impl Iterator for Rows<'_> {
    type Item = Result<SourceRow, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.index;
        let read = self.reader.read_record(&mut self.record);
        match read {
            Ok(false) => return None,
            Ok(true) => {}
            Err(source) => {
                // A broken quote can leave the reader unable to advance.
                if source.is_io_error() {
                    return None;
                }
                self.index += 1;
                return Some(Err(source).context(RowSnafu { row: index }));
            }
        }
        self.index += 1;

        let trim = self.trim;
        let cell = |idx: usize| {
            self.record
                .get(idx)
                .filter(|v| !v.trim().is_empty())
                .map(|v| (if trim { v.trim() } else { v }).to_string())
        };

        let Some(source_text) = cell(self.source_idx) else {
            return Some(EmptySourceSnafu { row: index }.fail());
        };

        Some(Ok(SourceRow {
            index,
            source_text,
            target_text: self.target_idx.and_then(cell),
        }))
    }
}
