#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use camino::Utf8PathBuf;
use indexmap::IndexMap;

use cif_shift_augment::catalog::AccessionCatalog;
use cif_shift_augment::config::RunSettings;
use cif_shift_augment::error::AugmentError;
use cif_shift_augment::predictions::{ATOMS_QUERY, ENTRY_QUERY, PREDICTORS_QUERY, SHIFTS_QUERY};
use cif_shift_augment::query::{QueryRunner, Row, SqlValue, Substitutions};

pub const ACCESSION: &str = "UP000005640";
pub const MODEL: &str = "AF-P12345-F1-model_v1";

pub const MODEL_CIF: &str = r#"data_AF-P12345-F1
#
_entry.id AF-P12345-F1
#
loop_
_audit_author.name
_audit_author.pdbx_ordinal
"Jumper, John"   1
"Evans, Richard" 2
#
loop_
_software.classification
_software.date
_software.description
_software.name
_software.pdbx_ordinal
_software.type
_software.version
other ? "Structure prediction"            AlphaFold 1 package v2.0
other ? "Secondary structure calculation" DSSP      2 package 4.0.4
#
loop_
_atom_site.group_PDB
_atom_site.id
_atom_site.type_symbol
_atom_site.label_atom_id
_atom_site.label_alt_id
_atom_site.label_comp_id
_atom_site.label_asym_id
_atom_site.label_entity_id
_atom_site.label_seq_id
_atom_site.pdbx_PDB_ins_code
_atom_site.Cartn_x
_atom_site.Cartn_y
_atom_site.Cartn_z
_atom_site.occupancy
_atom_site.B_iso_or_equiv
_atom_site.pdbx_formal_charge
_atom_site.auth_seq_id
_atom_site.auth_comp_id
_atom_site.auth_asym_id
_atom_site.auth_atom_id
_atom_site.pdbx_PDB_model_num
_atom_site.pdbx_sifts_xref_db_acc
_atom_site.pdbx_sifts_xref_db_name
_atom_site.pdbx_sifts_xref_db_num
_atom_site.pdbx_sifts_xref_db_res
ATOM 1 N N  . MET A 1 1  ? -1.2 2.5  3.25 1.0 80.1 ? 1  MET A N  1 P12345 UNP 1  M
ATOM 2 C CA . ALA A 1 12 ? 10.1 -2.0 3.0  1.0 81.2 ? 12 ALA A CA 1 P12345 UNP 12 A
ATOM 3 C C  . ALA A 1 12 ? 11.0 -3.0 3.5  1.0 82.0 ? 12 ALA A C  1 P12345 UNP 12 A
#
loop_
_ma_qa_metric_local.label_seq_id
_ma_qa_metric_local.metric_value
1  80.1
12 81.2
#
"#;

pub const MAPPING: &str = "\
/models/UP000005640/AF-P12345-F1-model_v1.pdb bmr6457
/mirror/UP000005640/AF-P12345-F1-model_v1.pdb bmr6457,bmr17000
/models/UP000002485/AF-Q99999-F1-model_v1.pdb bmr1
";

pub struct Workspace {
    pub dir: tempfile::TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("models").join(ACCESSION)).unwrap();
        fs::create_dir_all(dir.path().join("out")).unwrap();
        fs::write(dir.path().join("mapping.txt"), MAPPING).unwrap();
        Self { dir }
    }

    pub fn models(&self) -> PathBuf {
        self.dir.path().join("models")
    }

    pub fn write_model(&self, model: &str, content: &str) -> PathBuf {
        let path = self.models().join(ACCESSION).join(format!("{model}.cif"));
        fs::write(&path, content).unwrap();
        path
    }

    pub fn output(&self, model: &str) -> PathBuf {
        self.dir.path().join("out").join(format!("{model}_augmented.cif"))
    }

    pub fn settings(&self) -> RunSettings {
        RunSettings::new(
            Utf8PathBuf::from_path_buf(self.dir.path().join("mapping.txt")).unwrap(),
            Utf8PathBuf::from_path_buf(self.dir.path().join("out")).unwrap(),
        )
    }
}

pub struct Shift {
    pub residue: i64,
    pub atom: &'static str,
    pub value: Option<f64>,
}

pub struct Atom {
    pub residue: i64,
    pub residue_type: &'static str,
    pub element: &'static str,
    pub atom: &'static str,
    pub xyz: [f64; 3],
}

/// In-memory prediction store answering the four named queries.
#[derive(Default)]
pub struct MockStore {
    pub entries: BTreeMap<String, i64>,
    pub predictors: Vec<i64>,
    pub shifts: BTreeMap<i64, Vec<Shift>>,
    pub atoms: Vec<Atom>,
    pub fail_on: Option<&'static str>,
    pub calls: Mutex<Vec<String>>,
}

impl MockStore {
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

fn row(pairs: Vec<(&str, SqlValue)>) -> Row {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn float(value: Option<f64>) -> SqlValue {
    value.map(SqlValue::Float).unwrap_or(SqlValue::Null)
}

impl QueryRunner for MockStore {
    fn run(&self, name: &str, substitutions: &Substitutions) -> Result<Vec<Row>, AugmentError> {
        self.calls.lock().unwrap().push(name.to_string());
        if self.fail_on == Some(name) {
            return Err(AugmentError::Database {
                query: name.to_string(),
                message: "relation does not exist".to_string(),
            });
        }
        let rows = match name {
            ENTRY_QUERY => {
                let model = substitutions.apply("%%%PROTEINID%%%");
                self.entries
                    .get(&model)
                    .map(|id| vec![row(vec![("id", SqlValue::Int(*id))])])
                    .unwrap_or_default()
            }
            PREDICTORS_QUERY => self
                .predictors
                .iter()
                .map(|id| row(vec![("csp_id", SqlValue::Int(*id))]))
                .collect(),
            SHIFTS_QUERY => {
                let predictor = substitutions.apply("%%%CSPID%%%").parse::<i64>().unwrap();
                self.shifts
                    .get(&predictor)
                    .map(|shifts| {
                        shifts
                            .iter()
                            .map(|shift| {
                                row(vec![
                                    ("res_sequence", SqlValue::Int(shift.residue)),
                                    ("residue_type", SqlValue::Text("ALA".to_string())),
                                    ("atom", SqlValue::Text(shift.atom.to_string())),
                                    ("chemical_shift", float(shift.value)),
                                ])
                            })
                            .collect()
                    })
                    .unwrap_or_default()
            }
            ATOMS_QUERY => self
                .atoms
                .iter()
                .map(|atom| {
                    row(vec![
                        ("residue_sequence", SqlValue::Int(atom.residue)),
                        ("residue_type", SqlValue::Text(atom.residue_type.to_string())),
                        ("protein_atom", SqlValue::Text(atom.atom.to_string())),
                        ("element", SqlValue::Text(atom.element.to_string())),
                        ("x_coord", SqlValue::Float(atom.xyz[0])),
                        ("y_coord", SqlValue::Float(atom.xyz[1])),
                        ("z_coord", SqlValue::Float(atom.xyz[2])),
                    ])
                })
                .collect(),
            other => return Err(AugmentError::QueryNotFound(format!("Q_{other}"))),
        };
        Ok(rows)
    }
}

/// Three source atoms, predictions under predictors 1 and 3 (plus an
/// uncatalogued 7) covering the first two.
pub fn store() -> MockStore {
    let mut shifts = BTreeMap::new();
    shifts.insert(
        1,
        vec![
            Shift { residue: 1, atom: "N", value: Some(120.0) },
            Shift { residue: 12, atom: "CA", value: Some(4.521) },
        ],
    );
    shifts.insert(3, vec![Shift { residue: 1, atom: "N", value: Some(119.5) }]);
    shifts.insert(7, vec![Shift { residue: 12, atom: "CA", value: Some(1.0) }]);

    MockStore {
        entries: BTreeMap::from([(MODEL.to_string(), 42)]),
        predictors: vec![3, 1, 7, 1],
        shifts,
        atoms: vec![
            Atom { residue: 1, residue_type: "MET", element: "N", atom: "N", xyz: [-1.25, 2.5, 3.0] },
            Atom { residue: 12, residue_type: "ALA", element: "C", atom: "CA", xyz: [10.1, -2.0, 3.0] },
            Atom { residue: 12, residue_type: "ALA", element: "C", atom: "C", xyz: [11.0, -3.0, 3.5] },
        ],
        ..MockStore::default()
    }
}

#[derive(Default)]
pub struct MockCatalog {
    pub pdb: IndexMap<&'static str, Vec<&'static str>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        let mut pdb = IndexMap::new();
        pdb.insert("6457", vec!["1ABC"]);
        pdb.insert("17000", vec!["2XYZ", "1ABC"]);
        Self { pdb }
    }
}

impl AccessionCatalog for MockCatalog {
    fn pdb_ids(&self, bmrb_id: &str) -> Result<Vec<String>, AugmentError> {
        Ok(self
            .pdb
            .get(bmrb_id)
            .map(|ids| ids.iter().map(|id| id.to_string()).collect())
            .unwrap_or_default())
    }
}

pub fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .split_inclusive('\n')
        .map(str::to_string)
        .collect()
}
