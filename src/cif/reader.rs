use crate::cif::{BLOCK_SEPARATOR, LOOP_MARKER};
use crate::error::AugmentError;

/// Splits a data line into tokens. Quoted tokens keep their quotes so they
/// can be written back unchanged; a quote only closes when followed by
/// whitespace or the end of the line.
pub fn tokenize(line: &str) -> Vec<String> {
    let chars: Vec<char> = line.trim().chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i].is_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        let quote = chars[i];
        if quote == '\'' || quote == '"' {
            i += 1;
            while i < chars.len() {
                let closes = chars[i] == quote
                    && chars.get(i + 1).is_none_or(|next| next.is_whitespace());
                i += 1;
                if closes {
                    break;
                }
            }
        } else {
            while i < chars.len() && !chars[i].is_whitespace() {
                i += 1;
            }
        }
        tokens.push(chars[start..i].iter().collect());
    }

    tokens
}

/// A loop read from existing text, tokens kept verbatim.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopTable {
    category: String,
    labels: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl LoopTable {
    /// Reads the loop whose first label sits at `lines[start]`. Returns the
    /// table and the index of the first line after its last row.
    pub fn read<S: AsRef<str>>(lines: &[S], start: usize) -> Result<(Self, usize), AugmentError> {
        let first = lines
            .get(start)
            .map(|line| line.as_ref().trim())
            .ok_or_else(|| AugmentError::MarkerNotFound(format!("loop label at line {start}")))?;
        let category = first
            .split_once('.')
            .map(|(category, _)| category.to_string())
            .ok_or_else(|| AugmentError::MarkerNotFound(first.to_string()))?;

        let mut labels = Vec::new();
        let mut idx = start;
        while let Some(line) = lines.get(idx) {
            let trimmed = line.as_ref().trim();
            if !trimmed.starts_with(&format!("{category}.")) {
                break;
            }
            labels.push(trimmed.to_string());
            idx += 1;
        }

        let mut rows = Vec::new();
        let mut pending: Vec<String> = Vec::new();
        while let Some(line) = lines.get(idx) {
            let trimmed = line.as_ref().trim();
            if trimmed == BLOCK_SEPARATOR
                || trimmed.starts_with(LOOP_MARKER)
                || trimmed.starts_with("data_")
                || trimmed.starts_with('_')
            {
                break;
            }
            idx += 1;
            if trimmed.is_empty() {
                continue;
            }
            pending.extend(tokenize(trimmed));
            if pending.len() == labels.len() {
                rows.push(std::mem::take(&mut pending));
            } else if pending.len() > labels.len() {
                return Err(AugmentError::ColumnMismatch {
                    block: category,
                    expected: labels.len(),
                    found: pending.len(),
                });
            }
        }
        if !pending.is_empty() {
            return Err(AugmentError::ColumnMismatch {
                block: category,
                expected: labels.len(),
                found: pending.len(),
            });
        }

        Ok((
            Self {
                category,
                labels,
                rows,
            },
            idx,
        ))
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column index by attribute name, ignoring case (`Cartn_x` == `cartn_x`).
    pub fn column(&self, attribute: &str) -> Option<usize> {
        self.labels.iter().position(|label| {
            label
                .split_once('.')
                .is_some_and(|(_, name)| name.eq_ignore_ascii_case(attribute))
        })
    }

    pub fn require_column(&self, attribute: &str) -> Result<usize, AugmentError> {
        self.column(attribute)
            .ok_or_else(|| AugmentError::MissingColumn(format!("{}.{attribute}", self.category)))
    }

    pub fn value(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|values| values.get(column))
            .map(String::as_str)
            .unwrap_or("?")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_quoted_tokens_whole() {
        let tokens = tokenize(r#"other ? "Structure prediction" AlphaFold 1 package 'v2.0 beta'"#);
        assert_eq!(
            tokens,
            vec![
                "other",
                "?",
                "\"Structure prediction\"",
                "AlphaFold",
                "1",
                "package",
                "'v2.0 beta'"
            ]
        );
    }

    #[test]
    fn apostrophe_inside_word_does_not_close() {
        assert_eq!(tokenize("'O'Neil, J.' 3"), vec!["'O'Neil, J.'", "3"]);
    }

    #[test]
    fn reads_loop_until_separator() {
        let lines = [
            "loop_",
            "_audit_author.name",
            "_audit_author.pdbx_ordinal",
            "\"Jumper, John\" 1",
            "\"Evans, Richard\" 2",
            "#",
        ];
        let (table, end) = LoopTable::read(&lines, 1).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(end, 5);
        assert_eq!(table.column("PDBX_ORDINAL"), Some(1));
        assert_eq!(table.value(1, 0), "\"Evans, Richard\"");
    }

    #[test]
    fn short_row_is_a_mismatch() {
        let lines = ["_a.x", "_a.y", "1 2", "3", "#"];
        assert!(matches!(
            LoopTable::read(&lines, 0),
            Err(AugmentError::ColumnMismatch { found: 1, .. })
        ));
    }
}
