//! Rule CSV ingest. One file carries both the template header fields and its
//! rules; upsert keys are `template_id` and `rule_id`, so re-importing the
//! same file is a no-op.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use contracts::{EventKind, HazardType, Rule, Sector, SelectionScope, TargetMode, Template};
use tracing::info;

use crate::persistence::{SqliteStore, StoreError};

pub const RULE_CSV_HEADER: [&str; 20] = [
    "template_id",
    "template_name",
    "hazard_type",
    "rule_id",
    "event_kind",
    "time_pct",
    "time_jitter_pct",
    "selection_scope",
    "sector",
    "subtype",
    "target_mode",
    "target_value",
    "allow_reuse_asset",
    "performance_pct",
    "repair_time_min",
    "repair_time_max",
    "geo_anchor",
    "geo_param_1_km",
    "priority",
    "notes",
];

#[derive(Debug)]
pub enum ImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Store(StoreError),
    Header { expected: String, got: String },
    Row { line: usize, message: String },
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {err}"),
            Self::Csv(err) => write!(f, "csv error: {err}"),
            Self::Store(err) => write!(f, "store error: {err}"),
            Self::Header { expected, got } => {
                write!(f, "header mismatch: expected [{expected}], got [{got}]")
            }
            Self::Row { line, message } => write!(f, "row {line}: {message}"),
        }
    }
}

impl std::error::Error for ImportError {}

impl From<std::io::Error> for ImportError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<csv::Error> for ImportError {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}

impl From<StoreError> for ImportError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub templates: usize,
    pub rules: usize,
}

pub fn import_rules_csv(
    store: &mut SqliteStore,
    path: impl AsRef<Path>,
) -> Result<ImportSummary, ImportError> {
    let file = File::open(path.as_ref())?;
    let summary = import_rules_reader(store, file)?;
    info!(
        path = %path.as_ref().display(),
        templates = summary.templates,
        rules = summary.rules,
        "rule csv imported"
    );
    Ok(summary)
}

pub fn import_rules_reader(
    store: &mut SqliteStore,
    reader: impl Read,
) -> Result<ImportSummary, ImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let got: Vec<&str> = headers.iter().collect();
    if got != RULE_CSV_HEADER {
        return Err(ImportError::Header {
            expected: RULE_CSV_HEADER.join(", "),
            got: got.join(", "),
        });
    }

    let mut templates: BTreeMap<String, Template> = BTreeMap::new();
    let mut rules: Vec<Rule> = Vec::new();

    for (index, record) in csv_reader.records().enumerate() {
        let line = index + 2; // header is line 1
        let record = record?;
        let field = |column: usize| record.get(column).unwrap_or("").trim();

        let template_id = required(field(0), line, "template_id")?.to_string();
        let template_name = field(1).to_string();
        let hazard_type = HazardType::parse(field(2)).ok_or_else(|| ImportError::Row {
            line,
            message: format!("unknown hazard_type '{}'", field(2)),
        })?;
        templates
            .entry(template_id.clone())
            .or_insert_with(|| Template {
                template_id: template_id.clone(),
                name: if template_name.is_empty() {
                    template_id.clone()
                } else {
                    template_name.clone()
                },
                hazard_type,
                version: 1,
                is_active: true,
            });

        let rule_id = required(field(3), line, "rule_id")?.to_string();
        let event_kind = match EventKind::parse(field(4)) {
            Some(kind) if !kind.is_recovery() => kind,
            Some(kind) => {
                return Err(ImportError::Row {
                    line,
                    message: format!("rules may not use recovery kind {kind}"),
                })
            }
            None => {
                return Err(ImportError::Row {
                    line,
                    message: format!("unknown event_kind '{}'", field(4)),
                })
            }
        };

        let sector = match field(8) {
            "" => None,
            raw => Some(Sector::parse(raw).ok_or_else(|| ImportError::Row {
                line,
                message: format!("unknown sector '{raw}'"),
            })?),
        };
        let target_mode = TargetMode::parse(field(10)).ok_or_else(|| ImportError::Row {
            line,
            message: format!("unknown target_mode '{}'", field(10)),
        })?;

        rules.push(Rule {
            rule_id,
            template_id,
            event_kind,
            time_pct: parse_f64(field(5), line, "time_pct")?.unwrap_or(0.0),
            time_jitter_pct: parse_f64(field(6), line, "time_jitter_pct")?.unwrap_or(0.0),
            selection_scope: SelectionScope::parse(field(7)),
            sector,
            subtype: optional_text(field(9)),
            target_mode,
            target_value: parse_f64(field(11), line, "target_value")?.unwrap_or(0.0),
            allow_reuse_asset: parse_bool(field(12), line, "allow_reuse_asset")?,
            performance_pct: parse_f64(field(13), line, "performance_pct")?
                .map(|value| value.clamp(0.0, 100.0).round() as u8)
                .unwrap_or(0),
            repair_time_min: parse_u32(field(14), line, "repair_time_min")?,
            repair_time_max: parse_u32(field(15), line, "repair_time_max")?,
            geo_anchor: optional_text(field(16)),
            geo_param_1_km: parse_f64(field(17), line, "geo_param_1_km")?,
            priority: parse_f64(field(18), line, "priority")?
                .map(|value| value as i32)
                .unwrap_or(0),
            enabled: true,
            notes: optional_text(field(19)),
        });
    }

    for template in templates.values() {
        store.upsert_template(template)?;
    }
    for rule in &rules {
        store.upsert_rule(rule)?;
    }

    Ok(ImportSummary {
        templates: templates.len(),
        rules: rules.len(),
    })
}

/// Import every `*.csv` under `dir`, in filename order.
pub fn autoload_templates(
    store: &mut SqliteStore,
    dir: impl AsRef<Path>,
) -> Result<ImportSummary, ImportError> {
    let mut paths: Vec<_> = std::fs::read_dir(dir.as_ref())?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().is_some_and(|extension| extension == "csv"))
        .collect();
    paths.sort();

    let mut total = ImportSummary::default();
    for path in paths {
        let summary = import_rules_csv(store, &path)?;
        total.templates += summary.templates;
        total.rules += summary.rules;
    }
    Ok(total)
}

fn required<'a>(raw: &'a str, line: usize, column: &str) -> Result<&'a str, ImportError> {
    if raw.is_empty() {
        return Err(ImportError::Row {
            line,
            message: format!("missing {column}"),
        });
    }
    Ok(raw)
}

fn optional_text(raw: &str) -> Option<String> {
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

/// Empty numeric cells mean null.
fn parse_f64(raw: &str, line: usize, column: &str) -> Result<Option<f64>, ImportError> {
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>().map(Some).map_err(|_| ImportError::Row {
        line,
        message: format!("invalid {column} '{raw}'"),
    })
}

fn parse_u32(raw: &str, line: usize, column: &str) -> Result<Option<u32>, ImportError> {
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<u32>().map(Some).map_err(|_| ImportError::Row {
        line,
        message: format!("invalid {column} '{raw}'"),
    })
}

/// Booleans accept `0/1`, `true/false`, `yes/no`, `on/off`; empty is false.
fn parse_bool(raw: &str, line: usize, column: &str) -> Result<bool, ImportError> {
    match raw.to_lowercase().as_str() {
        "" | "0" | "false" | "no" | "off" => Ok(false),
        "1" | "true" | "yes" | "on" => Ok(true),
        other => Err(ImportError::Row {
            line,
            message: format!("invalid {column} '{other}'"),
        }),
    }
}
