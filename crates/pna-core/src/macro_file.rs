//! On-disk macro format.
//!
//! A macro is a JSON object keyed by 1-based position:
//!
//! ```json
//! {
//!   "1": { "deviceClass": "rig", "operationName": "goto", "params": { "x": 1 }, "id": "1" },
//!   "2": { "deviceClass": "gripper", "operationName": "close", "params": {}, "id": "2" }
//! }
//! ```
//!
//! Keying by position lets operators merge partial files and hand-edit
//! steps. Loading also accepts a bare JSON array (ids are then assigned in
//! order), the older `machine`/`action` field names and the older
//! operation names (see [`canonical_operation`]).

use std::collections::HashMap;
use std::path::Path;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{PnaError, Result};
use crate::io::atomic_write;
use crate::recorder::InvocationRecord;
use crate::types::{DeviceClass, ParameterSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MacroEntry {
    #[serde(alias = "machine")]
    device_class: DeviceClass,
    #[serde(alias = "action")]
    operation_name: String,
    #[serde(default)]
    params: ParameterSet,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MacroDocument {
    Keyed(HashMap<String, MacroEntry>),
    Listed(Vec<MacroEntry>),
}

/// Serializes records as a position-keyed object, in position order.
struct Keyed<'a>(&'a [InvocationRecord]);

impl Serialize for Keyed<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (i, rec) in self.0.iter().enumerate() {
            let id = (i + 1).to_string();
            let entry = MacroEntry {
                device_class: rec.device_class,
                operation_name: rec.operation.clone(),
                params: rec.params.clone(),
                id: Some(id.clone()),
            };
            map.serialize_entry(&id, &entry)?;
        }
        map.end()
    }
}

pub fn to_json(records: &[InvocationRecord]) -> Result<String> {
    Ok(serde_json::to_string_pretty(&Keyed(records))?)
}

/// Parse either accepted form into records numbered 1..N in file order.
pub fn parse(json: &str) -> Result<Vec<InvocationRecord>> {
    let doc: MacroDocument = serde_json::from_str(json).map_err(|e| {
        PnaError::InvalidMacro(format!(
            "expected an object keyed by position or a list of invocations ({e})"
        ))
    })?;

    let entries: Vec<MacroEntry> = match doc {
        MacroDocument::Listed(list) => list,
        MacroDocument::Keyed(map) => {
            let mut keyed: Vec<(String, MacroEntry)> = map.into_iter().collect();
            keyed.sort_by(|(a, _), (b, _)| position_order(a, b));
            keyed.into_iter().map(|(_, e)| e).collect()
        }
    };

    Ok(entries
        .into_iter()
        .enumerate()
        .map(|(i, e)| InvocationRecord {
            operation: canonical_operation(e.device_class, &e.operation_name).to_string(),
            device_class: e.device_class,
            params: e.params,
            sequence_id: i as u64 + 1,
        })
        .collect())
}

/// Operation names written by the first generation of the control app,
/// keyed by device, with the catalogue name each one stands for.
const LEGACY_OPERATIONS: &[(DeviceClass, &str, &str)] = &[
    (DeviceClass::Gripper, "stepOpenGripper", "open"),
    (DeviceClass::Gripper, "stepCloseGripper", "close"),
    (DeviceClass::Gripper, "setGripperSpeed", "setSpeed"),
    (DeviceClass::Gripper, "gripperGoTo", "goto"),
    (DeviceClass::Gripper, "speedGripperUp", "speedUp"),
    (DeviceClass::Gripper, "speedGripperDown", "speedDown"),
    (DeviceClass::Screwdriver, "screwCW", "cw"),
    (DeviceClass::Screwdriver, "screwCCW", "ccw"),
    (DeviceClass::Screwdriver, "screwdriverStop", "stop"),
    (DeviceClass::Arm, "moveJoint", "step"),
    (DeviceClass::Arm, "moveJoints", "goto"),
];

/// Map an older recorded operation name onto the catalogue name. Names that
/// are already current, or unknown, come back unchanged.
pub fn canonical_operation(device: DeviceClass, name: &str) -> &str {
    LEGACY_OPERATIONS
        .iter()
        .find(|(d, old, _)| *d == device && *old == name)
        .map_or(name, |&(_, _, new)| new)
}

// Numeric keys first in numeric order, anything else after in string order.
fn position_order(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

pub fn save(path: &Path, records: &[InvocationRecord]) -> Result<()> {
    let json = to_json(records)?;
    atomic_write(path, json.as_bytes())
        .map_err(|e| PnaError::StorageUnavailable(format!("{}: {e}", path.display())))
}

pub fn load(path: &Path) -> Result<Vec<InvocationRecord>> {
    let data = std::fs::read_to_string(path)?;
    parse(&data).map_err(|e| match e {
        PnaError::InvalidMacro(msg) => PnaError::InvalidMacro(format!("{}: {msg}", path.display())),
        other => other,
    })
}

/// Names (file stems) of the macros saved in `dir`, sorted. A missing
/// directory has none.
pub fn list(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    if !dir.is_dir() {
        return Ok(names);
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(crate::paths::MACRO_EXT) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            names.push(stem.to_string());
        }
    }
    names.sort();
    Ok(names)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
