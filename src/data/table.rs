use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{DatasetError, Result};

// ---------------------------------------------------------------------------
// Separators and on-disk layout
// ---------------------------------------------------------------------------

/// File extension used for tables written with `sep`: tab → `tsv`, anything
/// else (including no separator at all) → `csv`.
pub fn table_extension(sep: Option<u8>) -> &'static str {
    match sep {
        Some(b'\t') => "tsv",
        _ => "csv",
    }
}

/// Delimiter for a delimited table at `path`.  An explicit separator wins,
/// otherwise `.tsv` means tab and everything else comma.
pub fn delimiter_for(path: &Path, sep: Option<u8>) -> u8 {
    sep.unwrap_or_else(|| match extension(path).as_str() {
        "tsv" => b'\t',
        _ => b',',
    })
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// How a file is laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Header row followed by delimited records.
    Delimited(u8),
    /// Header-less, whitespace separated fields (one record per line).
    Whitespace,
}

impl Layout {
    /// Pick a layout for kinds that also accept plain-text lists
    /// (enrollments and trials).  Dispatch by extension unless a separator
    /// was given explicitly.
    pub fn detect(path: &Path, sep: Option<u8>) -> Self {
        if let Some(sep) = sep {
            return Layout::Delimited(sep);
        }
        match extension(path).as_str() {
            "tsv" => Layout::Delimited(b'\t'),
            "csv" => Layout::Delimited(b','),
            _ => Layout::Whitespace,
        }
    }
}

// ---------------------------------------------------------------------------
// Table – header plus string cells
// ---------------------------------------------------------------------------

/// A flat table of string cells with named columns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table, rejecting rows whose width differs from the header.
    pub fn new<C, R>(columns: C, rows: R) -> Result<Self>
    where
        C: IntoIterator,
        C::Item: Into<String>,
        R: IntoIterator<Item = Vec<String>>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let rows: Vec<Vec<String>> = rows.into_iter().collect();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != columns.len()) {
            return Err(DatasetError::format(
                "table",
                "<memory>",
                format!("row {i} has {} cells but there are {} columns", row.len(), columns.len()),
            ));
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All cells of column `name`, in row order.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &str> + '_> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| row[idx].as_str()))
    }

    /// Cell at `row` in column `name`.
    pub fn cell(&self, row: usize, name: &str) -> Option<&str> {
        let idx = self.column_index(name)?;
        self.rows.get(row).map(|r| r[idx].as_str())
    }

    /// Append a column; `values` must have one entry per row.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<String>) -> Result<()> {
        let name = name.into();
        if values.len() != self.rows.len() {
            return Err(DatasetError::format(
                "table",
                "<memory>",
                format!("column {name} has {} values for {} rows", values.len(), self.rows.len()),
            ));
        }
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        self.columns.push(name);
        Ok(())
    }

    /// Fail with a format error naming the first missing column.
    pub fn require_columns(&self, kind: &'static str, path: &Path, names: &[&str]) -> Result<()> {
        match names.iter().find(|n| self.column_index(n).is_none()) {
            Some(missing) => Err(DatasetError::format(
                kind,
                path,
                format!("missing '{missing}' column"),
            )),
            None => Ok(()),
        }
    }

    // -- reading --

    /// Read a delimited table with a header row.
    pub fn read_delimited(path: &Path, delimiter: u8, kind: &'static str) -> Result<Self> {
        let file = File::open(path).map_err(|e| DatasetError::from_io(kind, path, e))?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .from_reader(file);

        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| csv_read_error(kind, path, e))?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| csv_read_error(kind, path, e))?;
            rows.push(record.iter().map(|v| v.to_string()).collect());
        }

        Ok(Self { columns, rows })
    }

    /// Read a header-less whitespace separated file whose records have
    /// exactly `columns.len()` fields.
    pub fn read_whitespace(path: &Path, columns: &[&str], kind: &'static str) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| DatasetError::from_io(kind, path, e))?;
        let mut rows = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let fields: Vec<String> = line.split_whitespace().map(str::to_string).collect();
            if fields.is_empty() {
                continue;
            }
            if fields.len() != columns.len() {
                return Err(DatasetError::format(
                    kind,
                    path,
                    format!(
                        "line {}: expected {} fields, found {}",
                        line_no + 1,
                        columns.len(),
                        fields.len()
                    ),
                ));
            }
            rows.push(fields);
        }
        Ok(Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        })
    }

    /// Read with whichever layout applies.  The whitespace layout expects the
    /// fields in the order of `columns`.
    pub fn read(path: &Path, layout: Layout, columns: &[&str], kind: &'static str) -> Result<Self> {
        match layout {
            Layout::Delimited(d) => Self::read_delimited(path, d, kind),
            Layout::Whitespace => Self::read_whitespace(path, columns, kind),
        }
    }

    // -- writing --

    pub fn write_delimited(&self, path: &Path, delimiter: u8) -> Result<()> {
        let io_err = |e: csv::Error| DatasetError::Io {
            path: path.to_path_buf(),
            source: e.into(),
        };
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(path)
            .map_err(io_err)?;
        writer.write_record(&self.columns).map_err(io_err)?;
        for row in &self.rows {
            writer.write_record(row).map_err(io_err)?;
        }
        writer.flush().map_err(|e| DatasetError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Write every row as space separated fields without a header.
    pub fn write_whitespace(&self, path: &Path) -> Result<()> {
        let io_err = |e: std::io::Error| DatasetError::Io {
            path: path.to_path_buf(),
            source: e,
        };
        let mut out = BufWriter::new(File::create(path).map_err(io_err)?);
        for row in &self.rows {
            writeln!(out, "{}", row.join(" ")).map_err(io_err)?;
        }
        out.flush().map_err(io_err)
    }

    pub fn write(&self, path: &Path, layout: Layout) -> Result<()> {
        match layout {
            Layout::Delimited(d) => self.write_delimited(path, d),
            Layout::Whitespace => self.write_whitespace(path),
        }
    }
}

fn csv_read_error(kind: &'static str, path: &Path, err: csv::Error) -> DatasetError {
    if err.is_io_error() {
        match err.into_kind() {
            csv::ErrorKind::Io(e) => DatasetError::from_io(kind, path, e),
            other => DatasetError::format(kind, path, format!("{other:?}")),
        }
    } else {
        DatasetError::format(kind, path, err)
    }
}
