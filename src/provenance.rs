use std::path::Path;

use indexmap::IndexMap;

use crate::catalog;
use crate::cif::{
    BLOCK_SEPARATOR, LOOP_MARKER, LoopBlock, LoopTable, PLACEHOLDER, quote_value, require_line,
};
use crate::error::AugmentError;
use crate::fs_util::{read_lines, split_lines, write_lines};

pub const SOFTWARE_ANCHOR: &str = "_software.classification";
pub const AUTHOR_ANCHOR: &str = "_audit_author.pdbx_ordinal";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Curator {
    pub name: &'static str,
    pub orcid: &'static str,
    pub address: &'static str,
}

const CURATOR_ADDRESS: &str = "Department of Molecular Biology and Biophysics University of Connecticut Health Center 263 Farmington Ave, Farmington CT 06030";

pub const CURATORS: [Curator; 3] = [
    Curator {
        name: "Craft, D. Levi",
        orcid: "0000-0003-3077-3402",
        address: CURATOR_ADDRESS,
    },
    Curator {
        name: "Schuyler, Adam D.",
        orcid: "0000-0001-7583-899X",
        address: CURATOR_ADDRESS,
    },
    Curator {
        name: "Gryk, Michael R.",
        orcid: "0000-0002-3483-8384",
        address: CURATOR_ADDRESS,
    },
];

pub fn rewrite_software_block(path: &Path, predictors: &[i64]) -> Result<(), AugmentError> {
    let lines = read_lines(path)?;
    let spliced = splice_software(&lines, predictors)?;
    write_lines(path, &spliced)
}

pub fn rewrite_author_block(path: &Path) -> Result<(), AugmentError> {
    let lines = read_lines(path)?;
    let spliced = splice_authors(&lines)?;
    write_lines(path, &spliced)
}

/// Appends one `_software` row per catalogued predictor. Only the lines of
/// the software loop change.
pub fn splice_software(lines: &[String], predictors: &[i64]) -> Result<Vec<String>, AugmentError> {
    let anchor = require_line(lines, 0, SOFTWARE_ANCHOR)?;
    let stop = require_line(lines, anchor, BLOCK_SEPARATOR)?;
    let start = first_label(lines, anchor, "_software.");
    let (table, _) = LoopTable::read(&lines[..stop], start)?;

    let mut rows = table_rows(&table);
    for info in predictors.iter().filter_map(|id| catalog::predictor(*id)) {
        let mut row = IndexMap::new();
        for label in table.labels() {
            let existing = rows
                .values()
                .filter_map(|row| row.get(label))
                .collect::<Vec<_>>();
            let value = match attribute(label).as_str() {
                "type" => "package".to_string(),
                "pdbx_ordinal" => next_ordinal(&existing),
                "description" => "\"Chemical shift prediction\"".to_string(),
                "name" => info.name.to_string(),
                "version" => info.version.to_string(),
                _ => uniform_value(&existing).unwrap_or_else(|| PLACEHOLDER.to_string()),
            };
            row.insert(label.clone(), value);
        }
        rows.insert(rows.len(), row);
    }

    let block = LoopBlock::from_rows("_software", &rows)?;
    Ok(replace_region(lines, region_start(lines, start), stop, &block))
}

/// Adds ORCID and address columns to `_audit_author` and appends the
/// curators with continuing ordinals.
pub fn splice_authors(lines: &[String]) -> Result<Vec<String>, AugmentError> {
    let anchor = require_line(lines, 0, AUTHOR_ANCHOR)?;
    let stop = require_line(lines, anchor, BLOCK_SEPARATOR)?;
    let start = first_label(lines, anchor, "_audit_author.");
    let (table, _) = LoopTable::read(&lines[..stop], start)?;

    let mut labels = table.labels().to_vec();
    for extra in ["_audit_author.ORCID", "_audit_author.address"] {
        if !labels.iter().any(|label| label.eq_ignore_ascii_case(extra)) {
            labels.push(extra.to_string());
        }
    }

    let mut rows: IndexMap<usize, IndexMap<String, String>> = IndexMap::new();
    for (idx, values) in table.rows().iter().enumerate() {
        let row = labels
            .iter()
            .enumerate()
            .map(|(column, label)| {
                let value = values
                    .get(column)
                    .cloned()
                    .unwrap_or_else(|| PLACEHOLDER.to_string());
                (label.clone(), value)
            })
            .collect();
        rows.insert(idx, row);
    }

    let ordinal_label = labels
        .iter()
        .find(|label| attribute(label) == "pdbx_ordinal")
        .cloned()
        .unwrap_or_else(|| AUTHOR_ANCHOR.to_string());
    for curator in CURATORS {
        let existing = rows
            .values()
            .filter_map(|row| row.get(&ordinal_label))
            .collect::<Vec<_>>();
        let ordinal = next_ordinal(&existing);
        let row = labels
            .iter()
            .map(|label| {
                let value = match attribute(label).as_str() {
                    "name" => quote_value(curator.name),
                    "pdbx_ordinal" => ordinal.clone(),
                    "orcid" => curator.orcid.to_string(),
                    "address" => quote_value(curator.address),
                    _ => PLACEHOLDER.to_string(),
                };
                (label.clone(), value)
            })
            .collect();
        rows.insert(rows.len(), row);
    }

    let block = LoopBlock::from_rows("_audit_author", &rows)?;
    Ok(replace_region(lines, region_start(lines, start), stop, &block))
}

fn table_rows(table: &LoopTable) -> IndexMap<usize, IndexMap<String, String>> {
    table
        .rows()
        .iter()
        .enumerate()
        .map(|(idx, values)| {
            let row = table
                .labels()
                .iter()
                .cloned()
                .zip(values.iter().cloned())
                .collect();
            (idx, row)
        })
        .collect()
}

fn attribute(label: &str) -> String {
    label
        .split_once('.')
        .map(|(_, name)| name.to_ascii_lowercase())
        .unwrap_or_default()
}

fn uniform_value(values: &[&String]) -> Option<String> {
    let first = values.first()?;
    values
        .iter()
        .all(|value| value == first)
        .then(|| (*first).clone())
}

fn next_ordinal(values: &[&String]) -> String {
    values
        .last()
        .and_then(|value| value.parse::<i64>().ok())
        .map(|last| last + 1)
        .unwrap_or(values.len() as i64 + 1)
        .to_string()
}

/// The `loop_` line belongs to the region when it directly precedes the
/// first label.
/// Walks back from `anchor` to the first label of its category.
fn first_label(lines: &[String], anchor: usize, prefix: &str) -> usize {
    let mut first = anchor;
    while first > 0 && lines[first - 1].trim().starts_with(prefix) {
        first -= 1;
    }
    first
}

fn region_start(lines: &[String], first: usize) -> usize {
    if first > 0 && lines[first - 1].trim_end() == LOOP_MARKER {
        first - 1
    } else {
        first
    }
}

fn replace_region(lines: &[String], start: usize, stop: usize, block: &LoopBlock) -> Vec<String> {
    let mut out = Vec::with_capacity(lines.len() + block.rows().len());
    out.extend_from_slice(&lines[..start]);
    let opened = start > 0 && lines[start - 1].trim_end() == BLOCK_SEPARATOR;
    if !opened {
        out.push(format!("{BLOCK_SEPARATOR}\n"));
    }
    out.extend(split_lines(&block.render()));
    out.extend_from_slice(&lines[stop..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        split_lines(text)
    }

    #[test]
    fn ordinal_continues_from_last_value() {
        let a = "1".to_string();
        let b = "2".to_string();
        assert_eq!(next_ordinal(&[&a, &b]), "3");
        assert_eq!(next_ordinal(&[]), "1");
    }

    #[test]
    fn single_row_software_loop_still_gets_catalogue_names() {
        let input = lines(
            "#\nloop_\n_software.classification\n_software.name\n_software.pdbx_ordinal\n_software.type\n_software.version\nother AlphaFold 1 package v2.0\n#\n",
        );
        let out = splice_software(&input, &[2]).unwrap();
        let text = out.concat();
        assert!(text.contains("other AlphaFold 1 package v2.0       \n"));
        assert!(text.contains("other SHIFTX2   2 package \"Ver 1.10A\"\n"));
    }
}
