use std::fmt;

use indexmap::IndexMap;
use postgres::{Client, NoTls, SimpleQueryMessage};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ConfigNode;
use crate::error::AugmentError;

pub const APPLICATION_NAME: &str = "cif-shift-augment";
pub const QUERY_SECTION_PREFIX: &str = "Q_";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SqlValue {
    /// Values arrive as text; integers and floats are recognised, anything
    /// else stays text with non-ASCII characters replaced by `?`.
    pub fn from_text(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return SqlValue::Null;
        };
        if let Ok(value) = raw.parse::<i64>() {
            return SqlValue::Int(value);
        }
        if let Ok(value) = raw.parse::<f64>() {
            return SqlValue::Float(value);
        }
        match raw {
            "t" | "true" => SqlValue::Bool(true),
            "f" | "false" => SqlValue::Bool(false),
            _ => SqlValue::Text(
                raw.chars()
                    .map(|ch| if ch.is_ascii() { ch } else { '?' })
                    .collect(),
            ),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(value) => Some(*value),
            SqlValue::Float(value) if value.fract() == 0.0 => Some(*value as i64),
            SqlValue::Text(value) => value.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Int(value) => Some(*value as f64),
            SqlValue::Float(value) => Some(*value),
            SqlValue::Text(value) => value.trim().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => Ok(()),
            SqlValue::Bool(value) => write!(f, "{value}"),
            SqlValue::Int(value) => write!(f, "{value}"),
            SqlValue::Float(value) => write!(f, "{value}"),
            SqlValue::Text(value) => write!(f, "{value}"),
        }
    }
}

pub type Row = IndexMap<String, SqlValue>;

/// Placeholder tokens and their replacements, applied in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Substitutions(Vec<(String, String)>);

impl Substitutions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, token: &str, value: impl ToString) -> Self {
        self.0.push((token.to_string(), value.to_string()));
        self
    }

    pub fn apply(&self, template: &str) -> String {
        self.0
            .iter()
            .fold(template.to_string(), |query, (token, value)| {
                query.replace(token, value)
            })
    }
}

pub trait QueryRunner {
    /// Rows of the named query; an empty vector when nothing matches.
    fn run(&self, name: &str, substitutions: &Substitutions) -> Result<Vec<Row>, AugmentError>;
}

impl<T: QueryRunner + ?Sized> QueryRunner for &T {
    fn run(&self, name: &str, substitutions: &Substitutions) -> Result<Vec<Row>, AugmentError> {
        (**self).run(name, substitutions)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryTemplate {
    pub name: String,
    pub database: String,
    pub query: String,
    pub header: Option<Vec<String>>,
}

impl QueryTemplate {
    pub fn from_config(config: &ConfigNode, name: &str) -> Result<Self, AugmentError> {
        let section_name = format!("{QUERY_SECTION_PREFIX}{name}");
        let section = config
            .find_section(&section_name)
            .ok_or_else(|| AugmentError::QueryNotFound(section_name.clone()))?;
        let required = |parameter: &str| {
            section
                .value(&[parameter])
                .map(|value| value.to_string())
                .ok_or_else(|| AugmentError::MissingParameter {
                    section: section_name.clone(),
                    parameter: parameter.to_string(),
                })
        };
        let header = section.value(&["header"]).map(|value| {
            value
                .items()
                .into_iter()
                .map(|item| item.to_string())
                .collect()
        });
        Ok(Self {
            name: name.to_string(),
            database: required("database")?,
            query: required("query")?,
            header,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseSettings {
    pub dbname: String,
    pub host: String,
    pub host_local: String,
    pub username: String,
    pub password: Option<String>,
    pub port: Option<u16>,
}

impl DatabaseSettings {
    pub fn from_config(config: &ConfigNode, section_name: &str) -> Result<Self, AugmentError> {
        let section = config
            .find_section(section_name)
            .ok_or_else(|| AugmentError::MissingSection(section_name.to_string()))?;
        let required = |parameter: &str| {
            section
                .value(&[parameter])
                .map(|value| value.to_string())
                .ok_or_else(|| AugmentError::MissingParameter {
                    section: section_name.to_string(),
                    parameter: parameter.to_string(),
                })
        };
        let port = match section.value(&["port"]) {
            Some(value) => Some(
                value
                    .as_i64()
                    .and_then(|port| u16::try_from(port).ok())
                    .ok_or_else(|| AugmentError::ConfigValue(value.to_string()))?,
            ),
            None => None,
        };
        Ok(Self {
            dbname: required("dbname")?,
            host: required("host")?,
            host_local: required("host_local")?,
            username: required("username")?,
            password: section
                .value(&["password"])
                .map(|value| value.to_string())
                .or_else(|| std::env::var("PGPASSWORD").ok()),
            port,
        })
    }
}

/// Resolves every named query and the database section it points at,
/// without connecting.
pub fn validate_queries(config: &ConfigNode, names: &[&str]) -> Result<(), AugmentError> {
    for name in names {
        let template = QueryTemplate::from_config(config, name)?;
        DatabaseSettings::from_config(config, &template.database)?;
    }
    Ok(())
}

/// Which host answered.
#[derive(Debug)]
pub enum ConnectOutcome<C> {
    Primary(C),
    Secondary(C),
}

impl<C> ConnectOutcome<C> {
    pub fn into_inner(self) -> C {
        match self {
            ConnectOutcome::Primary(conn) | ConnectOutcome::Secondary(conn) => conn,
        }
    }

    pub fn is_primary(&self) -> bool {
        matches!(self, ConnectOutcome::Primary(_))
    }
}

/// Tries `primary`, then `secondary` once. On double failure both messages
/// are returned, primary first.
pub fn connect_with_fallback<C, F>(
    primary: &str,
    secondary: &str,
    mut connect: F,
) -> Result<ConnectOutcome<C>, (String, String)>
where
    F: FnMut(&str) -> Result<C, String>,
{
    let primary_err = match connect(primary) {
        Ok(conn) => return Ok(ConnectOutcome::Primary(conn)),
        Err(err) => err,
    };
    warn!(host = primary, error = %primary_err, "primary database host unreachable");
    match connect(secondary) {
        Ok(conn) => Ok(ConnectOutcome::Secondary(conn)),
        Err(secondary_err) => Err((primary_err, secondary_err)),
    }
}

/// PostgreSQL-backed runner; query templates and connection sections come
/// from the loaded configuration. A connection is opened per query.
#[derive(Debug, Clone)]
pub struct PgQueryRunner {
    config: ConfigNode,
}

impl PgQueryRunner {
    pub fn new(config: ConfigNode) -> Self {
        Self { config }
    }

    pub fn validate(&self, names: &[&str]) -> Result<(), AugmentError> {
        validate_queries(&self.config, names)
    }

    /// Opens and drops one connection to the database behind `name`.
    pub fn check_connection(&self, name: &str) -> Result<(), AugmentError> {
        let template = QueryTemplate::from_config(&self.config, name)?;
        let db = DatabaseSettings::from_config(&self.config, &template.database)?;
        self.connect(&db).map(drop)
    }

    fn connect(&self, db: &DatabaseSettings) -> Result<Client, AugmentError> {
        let attempt = |host: &str| {
            let mut pg = postgres::Config::new();
            pg.host(host)
                .dbname(&db.dbname)
                .user(&db.username)
                .application_name(APPLICATION_NAME);
            if let Some(password) = &db.password {
                pg.password(password);
            }
            if let Some(port) = db.port {
                pg.port(port);
            }
            pg.connect(NoTls).map_err(|err| err.to_string())
        };
        let outcome = connect_with_fallback(&db.host, &db.host_local, attempt).map_err(
            |(primary, secondary)| AugmentError::ConnectionFailed {
                database: db.dbname.clone(),
                primary: db.host.clone(),
                secondary: db.host_local.clone(),
                message: format!("{primary}; {secondary}"),
            },
        )?;
        if !outcome.is_primary() {
            debug!(host = %db.host_local, "connected through secondary host");
        }
        Ok(outcome.into_inner())
    }
}

impl QueryRunner for PgQueryRunner {
    fn run(&self, name: &str, substitutions: &Substitutions) -> Result<Vec<Row>, AugmentError> {
        let template = QueryTemplate::from_config(&self.config, name)?;
        let db = DatabaseSettings::from_config(&self.config, &template.database)?;
        let sql = substitutions.apply(&template.query);
        debug!(query = name, "running query");

        let mut client = self.connect(&db)?;
        let messages = client
            .simple_query(&sql)
            .map_err(|err| AugmentError::Database {
                query: name.to_string(),
                message: err.to_string(),
            })?;

        let mut rows = Vec::new();
        for message in messages {
            let SimpleQueryMessage::Row(row) = message else {
                continue;
            };
            let keys: Vec<String> = match &template.header {
                Some(header) => header.clone(),
                None => row
                    .columns()
                    .iter()
                    .map(|column| column.name().to_string())
                    .collect(),
            };
            let values = (0..row.len()).map(|idx| SqlValue::from_text(row.get(idx)));
            rows.push(keys.into_iter().zip(values).collect());
        }
        Ok(rows)
    }
}
