use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::AugmentError;

/// residue type -> atom type -> values
pub type ReferenceShifts = BTreeMap<String, BTreeMap<String, Vec<f64>>>;

/// residue type -> atom type -> predictor id -> values
pub type PredictedShifts = BTreeMap<String, BTreeMap<String, BTreeMap<i64, Vec<f64>>>>;

/// Summary statistics per residue/atom pair, keyed by the CSV header names.
pub type ReferenceStats = BTreeMap<(String, String), IndexMap<String, String>>;

/// Columns of the statistics file kept for each residue/atom pair.
const STAT_COLUMNS: [usize; 3] = [2, 5, 6];

fn input_error(path: &Path, message: impl ToString) -> AugmentError {
    AugmentError::AnalysisInput {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

fn read_text(path: &Path) -> Result<String, AugmentError> {
    fs::read_to_string(path).map_err(|err| input_error(path, err))
}

fn read_json(path: &Path) -> Result<Value, AugmentError> {
    serde_json::from_str(&read_text(path)?).map_err(|err| input_error(path, err))
}

/// The first line of the statistics file is not part of the table; the
/// second one is the header.
pub fn load_reference_stats(path: &Path) -> Result<ReferenceStats, AugmentError> {
    let content = read_text(path)?;
    let table = content.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(table.as_bytes());
    let header = reader
        .headers()
        .map_err(|err| input_error(path, err))?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();

    let mut stats = ReferenceStats::new();
    for record in reader.records() {
        let record = record.map_err(|err| input_error(path, err))?;
        let (Some(comp), Some(atom)) = (record.get(0), record.get(1)) else {
            continue;
        };
        let values = STAT_COLUMNS
            .iter()
            .filter_map(|column| {
                let name = header.get(*column)?;
                Some((name.clone(), record.get(*column)?.to_string()))
            })
            .collect();
        stats.insert((comp.to_string(), atom.to_string()), values);
    }
    Ok(stats)
}

#[derive(Debug, Deserialize)]
struct ReferenceEntry {
    #[serde(rename = "Comp_ID")]
    comp_id: String,
    #[serde(rename = "Atom_ID")]
    atom_id: String,
    #[serde(rename = "Val")]
    val: Value,
}

fn number(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|text| text.trim().parse().ok()))
}

pub fn load_reference_shifts(path: &Path) -> Result<ReferenceShifts, AugmentError> {
    let entries: Vec<ReferenceEntry> =
        serde_json::from_value(read_json(path)?).map_err(|err| input_error(path, err))?;
    let mut shifts = ReferenceShifts::new();
    for entry in entries {
        let value = number(&entry.val)
            .ok_or_else(|| input_error(path, format!("non-numeric Val {}", entry.val)))?;
        shifts
            .entry(entry.comp_id)
            .or_default()
            .entry(entry.atom_id)
            .or_default()
            .push(value);
    }
    Ok(shifts)
}

#[derive(Debug, Deserialize)]
struct PredictorColumns {
    residue_type: Option<Vec<String>>,
    atom: Option<Vec<String>>,
    chemical_shift: Option<Vec<Option<f64>>>,
}

/// Groups `{entry: {predictor: {residue_type, atom, chemical_shift}}}` by
/// residue type and upper-cased atom type. Predictor tables missing a column
/// are skipped; absent shifts become NaN.
pub fn load_predictions(path: &Path) -> Result<PredictedShifts, AugmentError> {
    let entries: BTreeMap<String, BTreeMap<String, PredictorColumns>> =
        serde_json::from_value(read_json(path)?).map_err(|err| input_error(path, err))?;

    let mut grouped = PredictedShifts::new();
    for (entry, predictors) in entries {
        for (predictor, columns) in predictors {
            let Ok(predictor_id) = predictor.trim().parse::<i64>() else {
                warn!(%entry, %predictor, "skipping non-numeric predictor id");
                continue;
            };
            let (Some(residues), Some(atoms), Some(shifts)) =
                (columns.residue_type, columns.atom, columns.chemical_shift)
            else {
                continue;
            };
            for ((residue, atom), shift) in residues.into_iter().zip(atoms).zip(shifts) {
                grouped
                    .entry(residue)
                    .or_default()
                    .entry(atom.to_uppercase())
                    .or_default()
                    .entry(predictor_id)
                    .or_default()
                    .push(shift.unwrap_or(f64::NAN));
            }
        }
    }
    Ok(grouped)
}

/// Random-coil shifts. A residue either maps atoms to values directly or
/// carries a `PH` threshold with oxidised (`OXD`, below the threshold) and
/// reduced (`RED`) tables.
#[derive(Debug, Clone, Default)]
pub struct RandomCoilTable {
    residues: serde_json::Map<String, Value>,
}

impl RandomCoilTable {
    pub fn load(path: &Path) -> Result<Self, AugmentError> {
        match read_json(path)? {
            Value::Object(residues) => Ok(Self { residues }),
            _ => Err(input_error(path, "expected an object keyed by residue")),
        }
    }

    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(residues) => Self { residues },
            _ => Self::default(),
        }
    }

    pub fn lookup(&self, residue: &str, atom: &str, ph: f64) -> Option<f64> {
        let entry = self.residues.get(residue)?;
        let table = match entry.get("PH").and_then(number) {
            Some(threshold) if ph < threshold => entry.get("OXD")?,
            Some(_) => entry.get("RED")?,
            None => entry,
        };
        table.get(atom).and_then(number)
    }
}
