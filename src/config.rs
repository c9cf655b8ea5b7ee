use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use camino::Utf8PathBuf;
use indexmap::IndexMap;

use crate::catalog::PREDICTOR_IDS;
use crate::error::AugmentError;

pub const DEFAULT_LIST_DELIMITER: char = '&';
pub const NESTED_SECTION: &str = "configs";
pub const DEFAULT_CHAIN: &str = "A";

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ConfigValue>),
}

impl ConfigValue {
    /// Splits `raw` on the delimiter and coerces every token on its own.
    pub fn parse(raw: &str, delimiter: char) -> Self {
        let mut tokens = raw
            .split(delimiter)
            .map(|token| Self::coerce(token.trim()))
            .collect::<Vec<_>>();
        if tokens.len() == 1 {
            tokens.remove(0)
        } else {
            ConfigValue::List(tokens)
        }
    }

    fn coerce(token: &str) -> Self {
        match token {
            "true" | "True" => return ConfigValue::Bool(true),
            "false" | "False" => return ConfigValue::Bool(false),
            _ => {}
        }
        if let Ok(value) = token.parse::<i64>() {
            return ConfigValue::Int(value);
        }
        if let Ok(value) = token.parse::<f64>() {
            return ConfigValue::Float(value);
        }
        ConfigValue::Str(token.to_string())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Int(value) => Some(*value as f64),
            ConfigValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Scalars behave as one-element lists.
    pub fn items(&self) -> Vec<&ConfigValue> {
        match self {
            ConfigValue::List(values) => values.iter().collect(),
            other => vec![other],
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(value) => write!(f, "{}", if *value { "True" } else { "False" }),
            ConfigValue::Int(value) => write!(f, "{value}"),
            ConfigValue::Float(value) => write!(f, "{value}"),
            ConfigValue::Str(value) => write!(f, "{value}"),
            ConfigValue::List(values) => {
                let joined = values
                    .iter()
                    .map(|value| value.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "[{joined}]")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigEntry {
    Node(ConfigNode),
    Value(ConfigValue),
}

/// One level of the configuration tree: sections of a file, parameters of a
/// section, or a nested file loaded through `[configs]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigNode {
    entries: IndexMap<String, ConfigEntry>,
}

impl ConfigNode {
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|key| key.as_str())
    }

    pub fn insert(&mut self, key: impl Into<String>, entry: ConfigEntry) {
        self.entries.insert(key.into(), entry);
    }

    pub fn entry(&self, key: &str) -> Option<&ConfigEntry> {
        self.entries.get(key)
    }

    pub fn lookup(&self, path: &[&str]) -> Option<&ConfigEntry> {
        let (first, rest) = path.split_first()?;
        let entry = self.entries.get(*first)?;
        if rest.is_empty() {
            return Some(entry);
        }
        match entry {
            ConfigEntry::Node(node) => node.lookup(rest),
            ConfigEntry::Value(_) => None,
        }
    }

    pub fn node(&self, path: &[&str]) -> Option<&ConfigNode> {
        match self.lookup(path)? {
            ConfigEntry::Node(node) => Some(node),
            ConfigEntry::Value(_) => None,
        }
    }

    pub fn value(&self, path: &[&str]) -> Option<&ConfigValue> {
        match self.lookup(path)? {
            ConfigEntry::Value(value) => Some(value),
            ConfigEntry::Node(_) => None,
        }
    }

    pub fn section(&self, name: &str) -> Result<&ConfigNode, AugmentError> {
        self.node(&[name])
            .ok_or_else(|| AugmentError::MissingSection(name.to_string()))
    }

    pub fn param(&self, section: &str, parameter: &str) -> Result<&ConfigValue, AugmentError> {
        self.section(section)?
            .value(&[parameter])
            .ok_or_else(|| AugmentError::MissingParameter {
                section: section.to_string(),
                parameter: parameter.to_string(),
            })
    }

    pub fn param_str(&self, section: &str, parameter: &str) -> Result<String, AugmentError> {
        Ok(self.param(section, parameter)?.to_string())
    }

    /// Searches this level first, then nested nodes depth-first.
    pub fn find_section(&self, name: &str) -> Option<&ConfigNode> {
        if let Some(node) = self.node(&[name]) {
            return Some(node);
        }
        self.entries.values().find_map(|entry| match entry {
            ConfigEntry::Node(node) => node.find_section(name),
            ConfigEntry::Value(_) => None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoader {
    list_delimiter: char,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            list_delimiter: DEFAULT_LIST_DELIMITER,
        }
    }
}

impl ConfigLoader {
    pub fn with_delimiter(list_delimiter: char) -> Self {
        Self { list_delimiter }
    }

    pub fn load(&self, path: &Path) -> Result<ConfigNode, AugmentError> {
        if !path.is_file() {
            return Err(AugmentError::ConfigRead(path.to_path_buf()));
        }
        let content =
            fs::read_to_string(path).map_err(|_| AugmentError::ConfigRead(path.to_path_buf()))?;
        self.parse_str(&content, path)
    }

    /// `origin` anchors relative include paths and error messages.
    pub fn parse_str(&self, content: &str, origin: &Path) -> Result<ConfigNode, AugmentError> {
        let sections = parse_sections(content, origin)?;
        let base_dir = origin.parent().map(Path::to_path_buf).unwrap_or_default();

        let mut root = ConfigNode::default();
        for (section, params) in sections {
            if section == NESTED_SECTION {
                for (name, raw) in params {
                    let nested_path = resolve_include(&base_dir, &raw);
                    let nested = self.load(&nested_path)?;
                    root.insert(name, ConfigEntry::Node(nested));
                }
                continue;
            }
            let mut node = ConfigNode::default();
            for (name, raw) in params {
                node.insert(
                    name,
                    ConfigEntry::Value(ConfigValue::parse(&raw, self.list_delimiter)),
                );
            }
            root.insert(section, ConfigEntry::Node(node));
        }
        Ok(root)
    }
}

fn resolve_include(base_dir: &Path, raw: &str) -> PathBuf {
    let path = PathBuf::from(raw.trim());
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

type RawSections = Vec<(String, Vec<(String, String)>)>;

fn parse_sections(content: &str, origin: &Path) -> Result<RawSections, AugmentError> {
    let parse_error = |line: usize, message: &str| AugmentError::ConfigParse {
        path: origin.to_path_buf(),
        line,
        message: message.to_string(),
    };

    let mut sections: RawSections = Vec::new();
    let mut continuing = false;

    for (index, raw_line) in content.lines().enumerate() {
        let line_no = index + 1;
        let line = raw_line.trim_end();
        let trimmed = line.trim_start();

        if trimmed.is_empty() {
            continuing = false;
            continue;
        }
        if trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        let indented = line.len() != trimmed.len();
        if indented && continuing {
            if let Some((_, params)) = sections.last_mut() {
                if let Some((_, value)) = params.last_mut() {
                    value.push('\n');
                    value.push_str(trimmed);
                    continue;
                }
            }
        }

        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            let name = trimmed[1..trimmed.len() - 1].trim().to_string();
            if sections.iter().any(|(existing, _)| *existing == name) {
                return Err(parse_error(line_no, &format!("duplicate section {name}")));
            }
            sections.push((name, Vec::new()));
            continuing = false;
            continue;
        }

        let split_at = trimmed
            .find(['=', ':'])
            .ok_or_else(|| parse_error(line_no, "expected key = value"))?;
        let key = trimmed[..split_at].trim().to_string();
        let value = trimmed[split_at + 1..].trim().to_string();
        if key.is_empty() {
            return Err(parse_error(line_no, "empty key"));
        }
        let (_, params) = sections
            .last_mut()
            .ok_or_else(|| parse_error(line_no, "parameter outside of a section"))?;
        params.push((key, value));
        continuing = true;
    }

    Ok(sections)
}

/// Read-only settings shared by every input of a run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub predictors: Vec<i64>,
    pub chain: String,
    pub mapping_file: Utf8PathBuf,
    pub output_dir: Utf8PathBuf,
}

impl RunSettings {
    pub fn new(mapping_file: Utf8PathBuf, output_dir: Utf8PathBuf) -> Self {
        Self {
            predictors: PREDICTOR_IDS.to_vec(),
            chain: DEFAULT_CHAIN.to_string(),
            mapping_file,
            output_dir,
        }
    }

    /// Applies the optional `[augment]` section: `chain` and a `predictors`
    /// list that can only narrow the built-in predictor set.
    pub fn from_config(
        config: &ConfigNode,
        mapping_file: Utf8PathBuf,
        output_dir: Utf8PathBuf,
    ) -> Result<Self, AugmentError> {
        let mut settings = Self::new(mapping_file, output_dir);
        let Some(section) = config.find_section("augment") else {
            return Ok(settings);
        };

        if let Some(chain) = section.value(&["chain"]) {
            settings.chain = chain.to_string();
        }
        if let Some(value) = section.value(&["predictors"]) {
            let mut predictors = Vec::new();
            for item in value.items() {
                let id = item
                    .as_i64()
                    .ok_or_else(|| AugmentError::ConfigValue(item.to_string()))?;
                if PREDICTOR_IDS.contains(&id) {
                    predictors.push(id);
                }
            }
            predictors.sort_unstable();
            predictors.dedup();
            settings.predictors = predictors;
        }
        Ok(settings)
    }

    pub fn allows(&self, predictor: i64) -> bool {
        self.predictors.contains(&predictor)
    }
}
