use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;

use crate::domain::model_stem;
use crate::error::AugmentError;

pub const PREDICTOR_IDS: [i64; 7] = [1, 2, 3, 4, 5, 6, 8];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictorInfo {
    pub id: i64,
    pub name: &'static str,
    pub version: &'static str,
    pub temperature: &'static str,
    pub ph: &'static str,
}

const PREDICTORS: [PredictorInfo; 7] = [
    PredictorInfo {
        id: 1,
        name: "Sparta+",
        version: "\"2.70F1 Rev 2012.029.12.03\"",
        temperature: ".",
        ph: ".",
    },
    PredictorInfo {
        id: 2,
        name: "SHIFTX2",
        version: "\"Ver 1.10A\"",
        temperature: "298",
        ph: "7",
    },
    PredictorInfo {
        id: 3,
        name: "LarmorCA",
        version: "v1.00",
        temperature: ".",
        ph: ".",
    },
    PredictorInfo {
        id: 4,
        name: "RCS",
        version: "?",
        temperature: ".",
        ph: ".",
    },
    PredictorInfo {
        id: 5,
        name: "SHIFTS",
        version: "\"Version 5.6\"",
        temperature: ".",
        ph: ".",
    },
    PredictorInfo {
        id: 6,
        name: "CheShift",
        version: "v3.6",
        temperature: ".",
        ph: ".",
    },
    PredictorInfo {
        id: 8,
        name: "UCBSHIFT",
        version: "?",
        temperature: ".",
        ph: "7",
    },
];

pub fn predictor(id: i64) -> Option<&'static PredictorInfo> {
    PREDICTORS.iter().find(|info| info.id == id)
}

/// Short names used by the analysis tool's legends.
pub fn predictor_label(id: i64) -> Option<&'static str> {
    match id {
        1 => Some("sparta_plus"),
        2 => Some("shiftx2"),
        3 => Some("larmor_ca"),
        4 => Some("rcs"),
        5 => Some("shifts"),
        6 => Some("cheshift"),
        8 => Some("ucbshift"),
        _ => None,
    }
}

/// BMRB entry ids listed for `model` in the identifier-mapping file.
///
/// Lines look like `<path/to/model.pdb> bmr1234,5678 91011`; the path's stem
/// must equal the model id and every id token keeps only its digits.
pub fn bmrb_ids_for_model(mapping_file: &Path, model: &str) -> Result<Vec<String>, AugmentError> {
    let content = fs::read_to_string(mapping_file).map_err(|err| {
        AugmentError::Filesystem(format!("read {}: {err}", mapping_file.display()))
    })?;
    Ok(parse_mapping(&content, model))
}

pub fn parse_mapping(content: &str, model: &str) -> Vec<String> {
    let mut ids = BTreeSet::new();
    for line in content.lines() {
        let line = line.trim();
        let Some((path, rest)) = line.split_once(char::is_whitespace) else {
            continue;
        };
        if model_stem(Path::new(path)).as_deref() != Some(model) {
            continue;
        }
        for token in rest.split(|ch: char| ch == ',' || ch.is_whitespace()) {
            let digits = token
                .chars()
                .filter(|ch| ch.is_ascii_digit())
                .collect::<String>();
            if !digits.is_empty() {
                ids.insert(digits);
            }
        }
    }
    ids.into_iter().collect()
}

pub trait AccessionCatalog {
    fn pdb_ids(&self, bmrb_id: &str) -> Result<Vec<String>, AugmentError>;
}

/// Catalogue that knows no cross references.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyCatalog;

impl AccessionCatalog for EmptyCatalog {
    fn pdb_ids(&self, _bmrb_id: &str) -> Result<Vec<String>, AugmentError> {
        Ok(Vec::new())
    }
}

#[derive(Clone)]
pub struct BmrbHttpCatalog {
    client: Client,
    base_url: String,
}

impl BmrbHttpCatalog {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.bmrb.io/v2";

    pub fn new() -> Result<Self, AugmentError> {
        Self::with_base_url(Self::DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, AugmentError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("cif-shift-augment/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| AugmentError::CatalogHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| AugmentError::CatalogHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn pdb_url(&self, bmrb_id: &str) -> String {
        format!("{}/search/get_pdb_ids_from_bmrb_id/{bmrb_id}", self.base_url)
    }

    fn send_with_retries(&self, url: &str) -> Result<reqwest::blocking::Response, AugmentError> {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            match self.client.get(url).send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && (err.is_timeout() || err.is_connect()) {
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Err(AugmentError::CatalogHttp(err.to_string()));
                }
            }
        }
    }
}

impl AccessionCatalog for BmrbHttpCatalog {
    fn pdb_ids(&self, bmrb_id: &str) -> Result<Vec<String>, AugmentError> {
        let response = self.send_with_retries(&self.pdb_url(bmrb_id))?;
        if response.status().as_u16() == 404 {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "BMRB request failed".to_string());
            return Err(AugmentError::CatalogStatus { status, message });
        }
        let body: Value = response
            .json()
            .map_err(|err| AugmentError::CatalogHttp(err.to_string()))?;
        Ok(pdb_ids_from_json(&body))
    }
}

/// Accepts both `["1ABC", ...]` and `[{"pdb_id": "1ABC", ...}, ...]`.
pub fn pdb_ids_from_json(body: &Value) -> Vec<String> {
    let mut ids = BTreeSet::new();
    if let Some(items) = body.as_array() {
        for item in items {
            let id = item
                .as_str()
                .or_else(|| item.get("pdb_id").and_then(|value| value.as_str()));
            if let Some(id) = id {
                ids.insert(id.to_uppercase());
            }
        }
    }
    ids.into_iter().collect()
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_deduplicates_accessions() {
        let content = "\
/models/AF-P12345-F1-model_v1.pdb bmr6457,bmr17000
/other/AF-P12345-F1-model_v1.pdb 6457 18001
/models/AF-Q99999-F1-model_v1.pdb bmr1
";
        let ids = parse_mapping(content, "AF-P12345-F1-model_v1");
        assert_eq!(ids, vec!["17000", "18001", "6457"]);
    }

    #[test]
    fn unknown_predictor_has_no_catalogue_entry() {
        assert!(predictor(7).is_none());
        assert_eq!(predictor(8).map(|info| info.name), Some("UCBSHIFT"));
    }

    #[test]
    fn pdb_ids_from_both_json_shapes() {
        let objects = serde_json::json!([{"pdb_id": "1abc", "match_type": "Exact"}, {"pdb_id": "2XYZ"}]);
        assert_eq!(pdb_ids_from_json(&objects), vec!["1ABC", "2XYZ"]);
        let strings = serde_json::json!(["3DEF"]);
        assert_eq!(pdb_ids_from_json(&strings), vec!["3DEF"]);
    }
}
