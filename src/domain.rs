use std::fmt;
use std::path::Path;

use regex::Regex;
use serde::Serialize;

use crate::error::AugmentError;

/// Identity of one predicted model, derived from `<accession>/<model>.cif`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StructureId {
    accession: String,
    model: String,
    fragment: u32,
}

impl StructureId {
    pub fn from_path(path: &Path) -> Result<Self, AugmentError> {
        let invalid = || AugmentError::InvalidStructurePath(path.display().to_string());

        let accession = path
            .parent()
            .and_then(|parent| parent.file_name())
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .ok_or_else(invalid)?
            .to_string();
        let model = model_stem(path).ok_or_else(invalid)?;

        let pattern = Regex::new(r"^[^-]+-[^-]+-F(\d+)(-.+)?$")
            .map_err(|err| AugmentError::InvalidStructurePath(err.to_string()))?;
        let fragment = pattern
            .captures(&model)
            .and_then(|caps| caps.get(1))
            .and_then(|value| value.as_str().parse::<u32>().ok())
            .ok_or_else(invalid)?;

        Ok(Self {
            accession,
            model,
            fragment,
        })
    }

    pub fn accession(&self) -> &str {
        &self.accession
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn fragment(&self) -> u32 {
        self.fragment
    }

    /// `AF-Q4G0P3-F15-model_v1` -> `AF-Q4G0P3-F15`
    pub fn entry_id(&self) -> &str {
        match self.model.rfind('-') {
            Some(idx) if self.model.split('-').count() > 3 => &self.model[..idx],
            _ => &self.model,
        }
    }
}

impl fmt::Display for StructureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.accession, self.model)
    }
}

/// File stem with `.cif` or `.cif.gz` removed.
pub fn model_stem(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let stem = name
        .strip_suffix(".gz")
        .unwrap_or(name)
        .strip_suffix(".cif")
        .or_else(|| Path::new(name).file_stem().and_then(|stem| stem.to_str()))?;
    (!stem.is_empty()).then(|| stem.to_string())
}

/// One predicted chemical shift.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRecord {
    pub residue: i64,
    pub residue_type: String,
    pub atom: String,
    pub shift: Option<f64>,
    pub predictor: i64,
}

/// An atom of the protonated model held by the prediction store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AtomCandidate {
    pub residue: i64,
    pub residue_type: String,
    pub element: String,
    pub atom: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parses_alphafold_path() {
        let id =
            StructureId::from_path(Path::new("/data/UP000005640/AF-Q4G0P3-F15-model_v1.cif"))
                .unwrap();
        assert_eq!(id.accession(), "UP000005640");
        assert_eq!(id.model(), "AF-Q4G0P3-F15-model_v1");
        assert_eq!(id.fragment(), 15);
        assert_eq!(id.entry_id(), "AF-Q4G0P3-F15");
    }

    #[test]
    fn accepts_gzip_inputs() {
        let id = StructureId::from_path(Path::new("UP000002485/AF-O94312-F1-model_v1.cif.gz"))
            .unwrap();
        assert_eq!(id.model(), "AF-O94312-F1-model_v1");
    }

    #[test]
    fn rejects_unstructured_stem() {
        let err = StructureId::from_path(Path::new("UP000002485/model.cif")).unwrap_err();
        assert_matches!(err, AugmentError::InvalidStructurePath(_));
    }
}
