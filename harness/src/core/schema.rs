//! Artifact schema versions and migration of persisted records.
//!
//! Every record is upgraded to [`CURRENT_SCHEMA_VERSION`] and validated against
//! the embedded JSON schema before it is deserialized.

use anyhow::{Result, anyhow, bail};
use jsonschema::validator_for;
use serde_json::{Map, Value};

use crate::core::artifact::ArtifactKind;

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

const RESEARCH_V1: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../schemas/artifacts/research.v1.schema.json"
));
const PLAN_V1: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../schemas/artifacts/plan.v1.schema.json"
));
const IMPLEMENTATION_V1: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../schemas/artifacts/implementation.v1.schema.json"
));

fn schema_source(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Research => RESEARCH_V1,
        ArtifactKind::Plan => PLAN_V1,
        ArtifactKind::Implementation => IMPLEMENTATION_V1,
    }
}

/// Version recorded in a raw record; records without one are v0.
pub fn record_version(value: &Value) -> u64 {
    value
        .get("schema_version")
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

/// Upgrade a raw record to the current version and validate it.
pub fn migrate(kind: ArtifactKind, value: Value) -> Result<Value> {
    let version = record_version(&value);
    let Value::Object(mut record) = value else {
        bail!("{kind} record is not a JSON object");
    };
    if version > u64::from(CURRENT_SCHEMA_VERSION) {
        bail!(
            "{kind} record has schema_version {version}, newer than supported {CURRENT_SCHEMA_VERSION}"
        );
    }
    if version == 0 {
        upgrade_v0(kind, &mut record);
    }
    let value = Value::Object(record);
    validate(kind, &value)?;
    Ok(value)
}

/// v0 records predate `schema_version` and used older field names.
fn upgrade_v0(kind: ArtifactKind, record: &mut Map<String, Value>) {
    if kind == ArtifactKind::Research {
        rename(record, "feature_or_task", "task");
        if let Some(Value::Array(discoveries)) = record.get_mut("discoveries") {
            for discovery in discoveries.iter_mut().filter_map(Value::as_object_mut) {
                rename(discovery, "source_files", "source_locations");
            }
        }
    }
    if !record.contains_key("updated_at") {
        if let Some(created) = record.get("created_at").cloned() {
            record.insert("updated_at".to_string(), created);
        }
    }
    record.insert(
        "schema_version".to_string(),
        Value::from(CURRENT_SCHEMA_VERSION),
    );
}

fn rename(record: &mut Map<String, Value>, from: &str, to: &str) {
    if record.contains_key(to) {
        return;
    }
    if let Some(value) = record.remove(from) {
        record.insert(to.to_string(), value);
    }
}

/// Validate a current-version record against its embedded schema.
pub fn validate(kind: ArtifactKind, record: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(schema_source(kind))
        .map_err(|err| anyhow!("parse {kind} schema: {err}"))?;
    let compiled =
        validator_for(&schema).map_err(|err| anyhow!("invalid {kind} schema: {err}"))?;
    if !compiled.is_valid(record) {
        let messages = compiled
            .iter_errors(record)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "{kind} schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}
