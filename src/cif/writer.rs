use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use indexmap::IndexMap;

use crate::cif::{BLOCK_SEPARATOR, LOOP_MARKER};
use crate::error::AugmentError;

/// A loop ready to be rendered: labels plus rows of already formatted
/// values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopBlock {
    name: String,
    labels: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl LoopBlock {
    pub fn new(name: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            name: name.into(),
            labels,
            rows: Vec::new(),
        }
    }

    /// Builds a block from row-key -> (column -> value) mappings. Columns come
    /// from the first row and every other row must carry the same set in the
    /// same order.
    pub fn from_rows<K>(
        name: impl Into<String>,
        rows: &IndexMap<K, IndexMap<String, String>>,
    ) -> Result<Self, AugmentError> {
        let name = name.into();
        let labels = rows
            .values()
            .next()
            .map(|row| row.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        let mut block = Self::new(name, labels);
        for row in rows.values() {
            let same_columns = row.len() == block.labels.len()
                && row.keys().zip(&block.labels).all(|(key, label)| key == label);
            if !same_columns {
                return Err(AugmentError::ColumnMismatch {
                    block: block.name.clone(),
                    expected: block.labels.len(),
                    found: row.len(),
                });
            }
            block.rows.push(row.values().cloned().collect());
        }
        Ok(block)
    }

    pub fn push_row(&mut self, row: Vec<String>) -> Result<(), AugmentError> {
        if row.len() != self.labels.len() {
            return Err(AugmentError::ColumnMismatch {
                block: self.name.clone(),
                expected: self.labels.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn widths(&self) -> Vec<usize> {
        let mut widths = vec![0usize; self.labels.len()];
        for row in &self.rows {
            for (width, value) in widths.iter_mut().zip(row) {
                *width = (*width).max(value.chars().count());
            }
        }
        widths
    }

    /// Data lines without terminators; all of them have the same length.
    pub fn render_rows(&self) -> Vec<String> {
        let widths = self.widths();
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&widths)
                    .map(|(value, width)| format!("{value:<width$}"))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect()
    }

    /// `loop_`, one label per line, then the aligned rows.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(LOOP_MARKER);
        out.push('\n');
        for label in &self.labels {
            out.push_str(label);
            out.push('\n');
        }
        for line in self.render_rows() {
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}

/// Quotes values that would otherwise split into several tokens.
pub fn quote_value(value: &str) -> String {
    let already_quoted = value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')));
    if value.is_empty() {
        return "?".to_string();
    }
    if already_quoted || !value.chars().any(char::is_whitespace) {
        return value.to_string();
    }
    if value.contains('\'') {
        format!("\"{value}\"")
    } else {
        format!("'{value}'")
    }
}

pub fn render_single(entries: &IndexMap<String, String>) -> String {
    let width = entries
        .keys()
        .map(|key| key.chars().count())
        .max()
        .unwrap_or(0);
    let mut out = String::new();
    out.push_str(LOOP_MARKER);
    out.push('\n');
    for (key, value) in entries {
        out.push_str(&format!("{key:<width$} {}\n", quote_value(value)));
    }
    out.push_str(BLOCK_SEPARATOR);
    out.push('\n');
    out
}

/// Appends a key/value loop closed by `#`, opening with `#` unless the file
/// already ends with one.
pub fn append_single_loop(
    path: &Path,
    entries: &IndexMap<String, String>,
) -> Result<(), AugmentError> {
    let mut text = String::new();
    if !ends_with_line(path, BLOCK_SEPARATOR)? {
        text.push_str(BLOCK_SEPARATOR);
        text.push('\n');
    }
    text.push_str(&render_single(entries));
    append_text(path, &text)
}

/// Appends a multi-row loop. Nothing is written when the rows disagree on
/// their columns.
pub fn append_multi_loop<K>(
    path: &Path,
    name: &str,
    rows: &IndexMap<K, IndexMap<String, String>>,
) -> Result<(), AugmentError> {
    let block = LoopBlock::from_rows(name, rows)?;
    let mut text = String::new();
    if !ends_with_line(path, BLOCK_SEPARATOR)? {
        text.push_str(BLOCK_SEPARATOR);
        text.push('\n');
    }
    text.push_str(&block.render());
    append_text(path, &text)
}

pub fn append_text(path: &Path, text: &str) -> Result<(), AugmentError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| AugmentError::Filesystem(format!("open {}: {err}", path.display())))?;
    file.write_all(text.as_bytes())
        .map_err(|err| AugmentError::Filesystem(format!("write {}: {err}", path.display())))
}

pub fn ends_with_line(path: &Path, marker: &str) -> Result<bool, AugmentError> {
    Ok(last_line(path)?.is_some_and(|line| line.trim_end() == marker))
}

/// Reads backwards from the end of the file until the last line is complete.
pub fn last_line(path: &Path) -> Result<Option<String>, AugmentError> {
    const CHUNK: u64 = 1024;
    let fs_err = |err: std::io::Error| AugmentError::Filesystem(format!("{}: {err}", path.display()));

    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(fs_err(err)),
    };
    let len = file.metadata().map_err(fs_err)?.len();
    if len == 0 {
        return Ok(None);
    }

    let mut tail: Vec<u8> = Vec::new();
    let mut pos = len;
    loop {
        let start = pos.saturating_sub(CHUNK);
        file.seek(SeekFrom::Start(start)).map_err(fs_err)?;
        let mut chunk = vec![0u8; (pos - start) as usize];
        file.read_exact(&mut chunk).map_err(fs_err)?;
        chunk.extend_from_slice(&tail);
        tail = chunk;
        pos = start;

        let body = tail.strip_suffix(b"\n").unwrap_or(&tail);
        if let Some(idx) = body.iter().rposition(|byte| *byte == b'\n') {
            return Ok(Some(String::from_utf8_lossy(&body[idx + 1..]).into_owned()));
        }
        if pos == 0 {
            return Ok(Some(String::from_utf8_lossy(body).into_owned()));
        }
    }
}
