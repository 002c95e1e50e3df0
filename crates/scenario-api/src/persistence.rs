//! SQLite-backed asset/template/instance/event store.

use std::fmt;
use std::path::Path;

use contracts::events::InstanceStatus;
use contracts::{
    Anchor, Asset, DependencyEdge, EventKind, HazardType, OperationalStatus, Rule, ScenarioEvent,
    ScenarioInstance, Sector, SelectionScope, TargetMode, Template,
};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    Serde(serde_json::Error),
    /// A stored value no longer parses into its contract type.
    Corrupt(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite error: {err}"),
            Self::Serde(err) => write!(f, "serde error: {err}"),
            Self::Corrupt(details) => write!(f, "corrupt row: {details}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}

/// Row counts used by the CLI status report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub assets: usize,
    pub dependencies: usize,
    pub templates: usize,
    pub rules: usize,
    pub instances: usize,
    pub events: usize,
}

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let mut store = Self { conn };
        store.configure()?;
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let mut store = Self { conn };
        store.configure()?;
        store.migrate()?;
        Ok(store)
    }

    fn configure(&mut self) -> Result<(), StoreError> {
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    fn migrate(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS assets (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                sector TEXT NOT NULL,
                subtype TEXT NOT NULL,
                city TEXT NOT NULL,
                lat REAL NOT NULL,
                lng REAL NOT NULL,
                criticality INTEGER NOT NULL DEFAULT 3,
                metadata_json TEXT
            );

            CREATE TABLE IF NOT EXISTS asset_dependencies (
                provider_asset_id TEXT NOT NULL REFERENCES assets(id) ON DELETE CASCADE,
                consumer_asset_id TEXT NOT NULL REFERENCES assets(id) ON DELETE CASCADE,
                dependency_type TEXT NOT NULL,
                priority INTEGER NOT NULL DEFAULT 1,
                is_active INTEGER NOT NULL DEFAULT 1,
                PRIMARY KEY (provider_asset_id, consumer_asset_id, dependency_type, priority)
            );

            CREATE TABLE IF NOT EXISTS asset_operational_state (
                asset_id TEXT PRIMARY KEY REFERENCES assets(id) ON DELETE CASCADE,
                status TEXT NOT NULL DEFAULT 'active'
            );

            CREATE TABLE IF NOT EXISTS scenario_templates (
                template_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                hazard_type TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 1,
                is_active INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS scenario_template_rules (
                rule_id TEXT PRIMARY KEY,
                template_id TEXT NOT NULL
                    REFERENCES scenario_templates(template_id) ON DELETE CASCADE,
                event_kind TEXT NOT NULL,
                time_pct REAL NOT NULL,
                time_jitter_pct REAL NOT NULL DEFAULT 0,
                selection_scope TEXT NOT NULL,
                sector TEXT,
                subtype TEXT,
                target_mode TEXT NOT NULL,
                target_value REAL NOT NULL,
                allow_reuse_asset INTEGER NOT NULL DEFAULT 0,
                performance_pct INTEGER NOT NULL,
                repair_time_min INTEGER,
                repair_time_max INTEGER,
                geo_anchor TEXT,
                geo_param_1_km REAL,
                priority INTEGER NOT NULL DEFAULT 0,
                enabled INTEGER NOT NULL DEFAULT 1,
                notes TEXT
            );

            CREATE TABLE IF NOT EXISTS scenario_instances (
                id TEXT PRIMARY KEY,
                city TEXT NOT NULL,
                scenario TEXT NOT NULL,
                hazard_type TEXT NOT NULL,
                template_id TEXT NOT NULL,
                duration_hours INTEGER NOT NULL,
                tick_minutes INTEGER NOT NULL,
                repair_crews INTEGER NOT NULL,
                seed TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS scenario_instance_anchors (
                instance_id TEXT NOT NULL
                    REFERENCES scenario_instances(id) ON DELETE CASCADE,
                anchor_type TEXT NOT NULL,
                lat REAL NOT NULL,
                lng REAL NOT NULL
            );

            CREATE TABLE IF NOT EXISTS scenario_events (
                instance_id TEXT NOT NULL
                    REFERENCES scenario_instances(id) ON DELETE CASCADE,
                sequence INTEGER NOT NULL,
                tick_index INTEGER NOT NULL,
                event_kind TEXT NOT NULL,
                asset_id TEXT NOT NULL REFERENCES assets(id) ON DELETE CASCADE,
                performance_pct INTEGER NOT NULL,
                repair_time_minutes INTEGER,
                source_rule_id TEXT,
                PRIMARY KEY (instance_id, sequence)
            );

            CREATE INDEX IF NOT EXISTS idx_assets_city ON assets(city);
            CREATE INDEX IF NOT EXISTS idx_assets_city_sector
                ON assets(city, sector, subtype);
            CREATE INDEX IF NOT EXISTS idx_dependencies_provider
                ON asset_dependencies(provider_asset_id);
            CREATE INDEX IF NOT EXISTS idx_dependencies_consumer
                ON asset_dependencies(consumer_asset_id);
            CREATE INDEX IF NOT EXISTS idx_rules_template
                ON scenario_template_rules(template_id);
            CREATE INDEX IF NOT EXISTS idx_events_instance_tick
                ON scenario_events(instance_id, tick_index);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_events_recovery_dedup
                ON scenario_events(instance_id, asset_id, tick_index, performance_pct)
                WHERE event_kind IN ('REPAIR_PARTIAL', 'REPAIR_FULL');
            ",
        )?;
        Ok(())
    }

    // --- assets -----------------------------------------------------------

    pub fn put_asset(&mut self, asset: &Asset) -> Result<(), StoreError> {
        let metadata_json = asset
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        self.conn.execute(
            "INSERT INTO assets (id, name, sector, subtype, city, lat, lng, criticality, metadata_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                sector = excluded.sector,
                subtype = excluded.subtype,
                city = excluded.city,
                lat = excluded.lat,
                lng = excluded.lng,
                criticality = excluded.criticality,
                metadata_json = excluded.metadata_json",
            params![
                asset.id.as_str(),
                asset.name.as_str(),
                asset.sector.as_str(),
                asset.subtype.as_str(),
                asset.city.as_str(),
                asset.lat,
                asset.lng,
                i64::from(asset.criticality),
                metadata_json,
            ],
        )?;
        self.conn.execute(
            "INSERT OR IGNORE INTO asset_operational_state (asset_id, status)
             VALUES (?1, 'active')",
            params![asset.id.as_str()],
        )?;
        Ok(())
    }

    pub fn delete_asset(&mut self, asset_id: &str) -> Result<bool, StoreError> {
        let deleted = self
            .conn
            .execute("DELETE FROM assets WHERE id = ?1", params![asset_id])?;
        Ok(deleted > 0)
    }

    pub fn get_asset(&self, asset_id: &str) -> Result<Option<Asset>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, sector, subtype, city, lat, lng, criticality, metadata_json
                 FROM assets WHERE id = ?1",
                params![asset_id],
                asset_row,
            )
            .optional()?;
        row.map(decode_asset).transpose()
    }

    pub fn assets_in_city(&self, city: &str) -> Result<Vec<Asset>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, sector, subtype, city, lat, lng, criticality, metadata_json
             FROM assets WHERE city = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![city], asset_row)?;
        collect_assets(rows)
    }

    pub fn all_assets(&self) -> Result<Vec<Asset>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, sector, subtype, city, lat, lng, criticality, metadata_json
             FROM assets ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], asset_row)?;
        collect_assets(rows)
    }

    /// Batch resolution for chain responses, ordered by id.
    pub fn assets_by_ids(&self, asset_ids: &[String]) -> Result<Vec<Asset>, StoreError> {
        if asset_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; asset_ids.len()].join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, name, sector, subtype, city, lat, lng, criticality, metadata_json
             FROM assets WHERE id IN ({placeholders}) ORDER BY id ASC",
        ))?;
        let rows = stmt.query_map(params_from_iter(asset_ids.iter()), asset_row)?;
        collect_assets(rows)
    }

    // --- dependencies and operational state -------------------------------

    pub fn put_dependency(&mut self, edge: &DependencyEdge) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO asset_dependencies
                (provider_asset_id, consumer_asset_id, dependency_type, priority, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(provider_asset_id, consumer_asset_id, dependency_type, priority)
             DO UPDATE SET is_active = excluded.is_active",
            params![
                edge.provider_asset_id.as_str(),
                edge.consumer_asset_id.as_str(),
                edge.dependency_type.as_str(),
                i64::from(edge.priority),
                if edge.is_active { 1_i64 } else { 0_i64 },
            ],
        )?;
        Ok(())
    }

    /// One consistent snapshot of the active edge set.
    pub fn active_dependencies(&self) -> Result<Vec<DependencyEdge>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT provider_asset_id, consumer_asset_id, dependency_type, priority, is_active
             FROM asset_dependencies WHERE is_active = 1
             ORDER BY provider_asset_id, consumer_asset_id, dependency_type, priority",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DependencyEdge {
                provider_asset_id: row.get(0)?,
                consumer_asset_id: row.get(1)?,
                dependency_type: row.get(2)?,
                priority: row.get::<_, i64>(3)? as u8,
                is_active: row.get::<_, i64>(4)? != 0,
            })
        })?;
        let mut edges = Vec::new();
        for row in rows {
            edges.push(row?);
        }
        Ok(edges)
    }

    pub fn set_operational_status(
        &mut self,
        asset_id: &str,
        status: OperationalStatus,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO asset_operational_state (asset_id, status) VALUES (?1, ?2)
             ON CONFLICT(asset_id) DO UPDATE SET status = excluded.status",
            params![asset_id, status.as_str()],
        )?;
        Ok(())
    }

    pub fn operational_status(
        &self,
        asset_id: &str,
    ) -> Result<Option<OperationalStatus>, StoreError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM asset_operational_state WHERE asset_id = ?1",
                params![asset_id],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(raw) => OperationalStatus::parse(&raw)
                .map(Some)
                .ok_or_else(|| StoreError::Corrupt(format!("operational status '{raw}'"))),
            None => Ok(None),
        }
    }

    // --- templates and rules ----------------------------------------------

    pub fn upsert_template(&mut self, template: &Template) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO scenario_templates (template_id, name, hazard_type, version, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(template_id) DO UPDATE SET
                name = excluded.name,
                hazard_type = excluded.hazard_type,
                version = excluded.version,
                is_active = excluded.is_active",
            params![
                template.template_id.as_str(),
                template.name.as_str(),
                template.hazard_type.as_str(),
                i64::from(template.version),
                if template.is_active { 1_i64 } else { 0_i64 },
            ],
        )?;
        Ok(())
    }

    pub fn get_template(&self, template_id: &str) -> Result<Option<Template>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT template_id, name, hazard_type, version, is_active
                 FROM scenario_templates WHERE template_id = ?1",
                params![template_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(template_id, name, hazard_raw, version, is_active)| {
            let hazard_type = HazardType::parse(&hazard_raw)
                .ok_or_else(|| StoreError::Corrupt(format!("hazard type '{hazard_raw}'")))?;
            Ok(Template {
                template_id,
                name,
                hazard_type,
                version: version as u32,
                is_active: is_active != 0,
            })
        })
        .transpose()
    }

    pub fn upsert_rule(&mut self, rule: &Rule) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO scenario_template_rules (
                rule_id, template_id, event_kind, time_pct, time_jitter_pct,
                selection_scope, sector, subtype, target_mode, target_value,
                allow_reuse_asset, performance_pct, repair_time_min, repair_time_max,
                geo_anchor, geo_param_1_km, priority, enabled, notes
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                       ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
             ON CONFLICT(rule_id) DO UPDATE SET
                template_id = excluded.template_id,
                event_kind = excluded.event_kind,
                time_pct = excluded.time_pct,
                time_jitter_pct = excluded.time_jitter_pct,
                selection_scope = excluded.selection_scope,
                sector = excluded.sector,
                subtype = excluded.subtype,
                target_mode = excluded.target_mode,
                target_value = excluded.target_value,
                allow_reuse_asset = excluded.allow_reuse_asset,
                performance_pct = excluded.performance_pct,
                repair_time_min = excluded.repair_time_min,
                repair_time_max = excluded.repair_time_max,
                geo_anchor = excluded.geo_anchor,
                geo_param_1_km = excluded.geo_param_1_km,
                priority = excluded.priority,
                enabled = excluded.enabled,
                notes = excluded.notes",
            params![
                rule.rule_id.as_str(),
                rule.template_id.as_str(),
                rule.event_kind.as_str(),
                rule.time_pct,
                rule.time_jitter_pct,
                selection_scope_str(rule.selection_scope),
                rule.sector.map(Sector::as_str),
                rule.subtype.as_deref(),
                target_mode_str(rule.target_mode),
                rule.target_value,
                if rule.allow_reuse_asset { 1_i64 } else { 0_i64 },
                i64::from(rule.performance_pct),
                rule.repair_time_min.map(i64::from),
                rule.repair_time_max.map(i64::from),
                rule.geo_anchor.as_deref(),
                rule.geo_param_1_km,
                i64::from(rule.priority),
                if rule.enabled { 1_i64 } else { 0_i64 },
                rule.notes.as_deref(),
            ],
        )?;
        Ok(())
    }

    /// Rules in materialization order: `(time_pct ASC, priority DESC,
    /// rule_id ASC)`.
    pub fn rules_for_template(&self, template_id: &str) -> Result<Vec<Rule>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT rule_id, template_id, event_kind, time_pct, time_jitter_pct,
                    selection_scope, sector, subtype, target_mode, target_value,
                    allow_reuse_asset, performance_pct, repair_time_min, repair_time_max,
                    geo_anchor, geo_param_1_km, priority, enabled, notes
             FROM scenario_template_rules
             WHERE template_id = ?1
             ORDER BY time_pct ASC, priority DESC, rule_id ASC",
        )?;
        let rows = stmt.query_map(params![template_id], rule_row)?;
        let mut rules = Vec::new();
        for row in rows {
            rules.push(decode_rule(row?)?);
        }
        Ok(rules)
    }

    // --- instances, anchors, events ---------------------------------------

    /// Persist the prepared instance, its anchors, and the primary event set
    /// in one transaction.
    pub fn persist_prepare(
        &mut self,
        instance: &ScenarioInstance,
        anchors: &[Anchor],
        events: &[ScenarioEvent],
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO scenario_instances (
                id, city, scenario, hazard_type, template_id, duration_hours,
                tick_minutes, repair_crews, seed, status, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                instance.id.as_str(),
                instance.city.as_str(),
                instance.scenario.as_str(),
                instance.hazard_type.as_str(),
                instance.template_id.as_str(),
                i64::from(instance.duration_hours),
                i64::from(instance.tick_minutes),
                i64::from(instance.repair_crews),
                instance.seed.to_string(),
                instance.status.as_str(),
                instance.created_at.as_str(),
            ],
        )?;

        for anchor in anchors {
            tx.execute(
                "INSERT INTO scenario_instance_anchors (instance_id, anchor_type, lat, lng)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    instance.id.as_str(),
                    anchor.anchor_type.as_str(),
                    anchor.lat,
                    anchor.lng,
                ],
            )?;
        }

        for event in events {
            insert_event(&tx, event)?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Idempotent append: duplicates on the dedup keys are ignored, never
    /// errors.
    pub fn append_events(&mut self, events: &[ScenarioEvent]) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        let mut appended = 0;
        for event in events {
            appended += insert_event(&tx, event)?;
        }
        tx.commit()?;
        Ok(appended)
    }

    pub fn get_instance(&self, instance_id: &str) -> Result<Option<ScenarioInstance>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, city, scenario, hazard_type, template_id, duration_hours,
                        tick_minutes, repair_crews, seed, status, created_at
                 FROM scenario_instances WHERE id = ?1",
                params![instance_id],
                instance_row,
            )
            .optional()?;
        row.map(decode_instance).transpose()
    }

    pub fn list_instances(&self, limit: usize) -> Result<Vec<ScenarioInstance>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, city, scenario, hazard_type, template_id, duration_hours,
                    tick_minutes, repair_crews, seed, status, created_at
             FROM scenario_instances
             ORDER BY created_at DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], instance_row)?;
        let mut instances = Vec::new();
        for row in rows {
            instances.push(decode_instance(row?)?);
        }
        Ok(instances)
    }

    pub fn anchors_for_instance(&self, instance_id: &str) -> Result<Vec<Anchor>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT anchor_type, lat, lng FROM scenario_instance_anchors
             WHERE instance_id = ?1 ORDER BY rowid ASC",
        )?;
        let rows = stmt.query_map(params![instance_id], |row| {
            Ok(Anchor {
                anchor_type: row.get(0)?,
                lat: row.get(1)?,
                lng: row.get(2)?,
            })
        })?;
        let mut anchors = Vec::new();
        for row in rows {
            anchors.push(row?);
        }
        Ok(anchors)
    }

    /// Events in replay order: `(tick_index ASC, sequence ASC)`.
    pub fn events_for_instance(&self, instance_id: &str) -> Result<Vec<ScenarioEvent>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT instance_id, sequence, tick_index, event_kind, asset_id,
                    performance_pct, repair_time_minutes, source_rule_id
             FROM scenario_events
             WHERE instance_id = ?1
             ORDER BY tick_index ASC, sequence ASC",
        )?;
        let rows = stmt.query_map(params![instance_id], event_row)?;
        let mut events = Vec::new();
        for row in rows {
            events.push(decode_event(row?)?);
        }
        Ok(events)
    }

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let count = |table: &str| -> Result<usize, StoreError> {
            let value: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get(0)
                })?;
            Ok(value as usize)
        };
        Ok(StoreStats {
            assets: count("assets")?,
            dependencies: count("asset_dependencies")?,
            templates: count("scenario_templates")?,
            rules: count("scenario_template_rules")?,
            instances: count("scenario_instances")?,
            events: count("scenario_events")?,
        })
    }
}

fn insert_event(
    tx: &rusqlite::Transaction<'_>,
    event: &ScenarioEvent,
) -> Result<usize, StoreError> {
    let inserted = tx.execute(
        "INSERT OR IGNORE INTO scenario_events (
            instance_id, sequence, tick_index, event_kind, asset_id,
            performance_pct, repair_time_minutes, source_rule_id
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            event.instance_id.as_str(),
            event.sequence as i64,
            i64::from(event.tick_index),
            event.event_kind.as_str(),
            event.asset_id.as_str(),
            i64::from(event.performance_pct),
            event.repair_time_minutes.map(i64::from),
            event.source_rule_id.as_deref(),
        ],
    )?;
    Ok(inserted)
}

type AssetRow = (
    String,
    String,
    String,
    String,
    String,
    f64,
    f64,
    i64,
    Option<String>,
);

fn asset_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AssetRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

fn decode_asset(row: AssetRow) -> Result<Asset, StoreError> {
    let (id, name, sector_raw, subtype, city, lat, lng, criticality, metadata_json) = row;
    let sector = Sector::parse(&sector_raw)
        .ok_or_else(|| StoreError::Corrupt(format!("sector '{sector_raw}' on asset {id}")))?;
    let metadata = metadata_json
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?;
    Ok(Asset {
        id,
        name,
        sector,
        subtype,
        city,
        lat,
        lng,
        criticality: criticality.clamp(1, 5) as u8,
        metadata,
    })
}

fn collect_assets(
    rows: impl Iterator<Item = rusqlite::Result<AssetRow>>,
) -> Result<Vec<Asset>, StoreError> {
    let mut assets = Vec::new();
    for row in rows {
        assets.push(decode_asset(row?)?);
    }
    Ok(assets)
}

type RuleRow = (
    String,
    String,
    String,
    f64,
    f64,
    String,
    Option<String>,
    Option<String>,
    String,
    f64,
    i64,
    i64,
    Option<i64>,
    Option<i64>,
    Option<String>,
    Option<f64>,
    i64,
    i64,
    Option<String>,
);

fn rule_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RuleRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
        row.get(12)?,
        row.get(13)?,
        row.get(14)?,
        row.get(15)?,
        row.get(16)?,
        row.get(17)?,
        row.get(18)?,
    ))
}

fn decode_rule(row: RuleRow) -> Result<Rule, StoreError> {
    let (
        rule_id,
        template_id,
        event_kind_raw,
        time_pct,
        time_jitter_pct,
        selection_scope_raw,
        sector_raw,
        subtype,
        target_mode_raw,
        target_value,
        allow_reuse_asset,
        performance_pct,
        repair_time_min,
        repair_time_max,
        geo_anchor,
        geo_param_1_km,
        priority,
        enabled,
        notes,
    ) = row;

    let event_kind = EventKind::parse(&event_kind_raw)
        .ok_or_else(|| StoreError::Corrupt(format!("event kind '{event_kind_raw}'")))?;
    let target_mode = TargetMode::parse(&target_mode_raw)
        .ok_or_else(|| StoreError::Corrupt(format!("target mode '{target_mode_raw}'")))?;
    let sector = sector_raw
        .as_deref()
        .map(|raw| {
            Sector::parse(raw)
                .ok_or_else(|| StoreError::Corrupt(format!("sector '{raw}' on rule {rule_id}")))
        })
        .transpose()?;

    Ok(Rule {
        rule_id,
        template_id,
        event_kind,
        time_pct,
        time_jitter_pct,
        selection_scope: SelectionScope::parse(&selection_scope_raw),
        sector,
        subtype,
        target_mode,
        target_value,
        allow_reuse_asset: allow_reuse_asset != 0,
        performance_pct: performance_pct.clamp(0, 100) as u8,
        repair_time_min: repair_time_min.map(|value| value as u32),
        repair_time_max: repair_time_max.map(|value| value as u32),
        geo_anchor,
        geo_param_1_km,
        priority: priority as i32,
        enabled: enabled != 0,
        notes,
    })
}

fn selection_scope_str(scope: SelectionScope) -> &'static str {
    match scope {
        SelectionScope::GeoRadius => "GEO_RADIUS",
        SelectionScope::GeoScatter => "GEO_SCATTER",
        SelectionScope::GraphCentrality => "GRAPH_CENTRALITY",
        SelectionScope::Other => "OTHER",
    }
}

fn target_mode_str(mode: TargetMode) -> &'static str {
    match mode {
        TargetMode::Pct => "PCT",
        TargetMode::Count => "COUNT",
    }
}

type InstanceRow = (
    String,
    String,
    String,
    String,
    String,
    i64,
    i64,
    i64,
    String,
    String,
    String,
);

fn instance_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<InstanceRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

fn decode_instance(row: InstanceRow) -> Result<ScenarioInstance, StoreError> {
    let (
        id,
        city,
        scenario,
        hazard_raw,
        template_id,
        duration_hours,
        tick_minutes,
        repair_crews,
        seed_raw,
        status_raw,
        created_at,
    ) = row;

    let hazard_type = HazardType::parse(&hazard_raw)
        .ok_or_else(|| StoreError::Corrupt(format!("hazard type '{hazard_raw}'")))?;
    let status = InstanceStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::Corrupt(format!("instance status '{status_raw}'")))?;
    let seed = seed_raw
        .parse::<u64>()
        .map_err(|_| StoreError::Corrupt(format!("seed '{seed_raw}' on instance {id}")))?;

    Ok(ScenarioInstance {
        id,
        city,
        scenario,
        hazard_type,
        template_id,
        duration_hours: duration_hours as u32,
        tick_minutes: tick_minutes as u32,
        repair_crews: repair_crews as u32,
        seed,
        status,
        created_at,
    })
}

type EventRow = (
    String,
    i64,
    i64,
    String,
    String,
    i64,
    Option<i64>,
    Option<String>,
);

fn event_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn decode_event(row: EventRow) -> Result<ScenarioEvent, StoreError> {
    let (
        instance_id,
        sequence,
        tick_index,
        event_kind_raw,
        asset_id,
        performance_pct,
        repair_time_minutes,
        source_rule_id,
    ) = row;
    let event_kind = EventKind::parse(&event_kind_raw)
        .ok_or_else(|| StoreError::Corrupt(format!("event kind '{event_kind_raw}'")))?;
    Ok(ScenarioEvent {
        instance_id,
        sequence: sequence as u64,
        tick_index: tick_index as u32,
        event_kind,
        asset_id,
        performance_pct: performance_pct.clamp(0, 100) as u8,
        repair_time_minutes: repair_time_minutes.map(|value| value as u32),
        source_rule_id,
    })
}
