//! Resolution pipeline: reads data files, resolves names, builds the registry.
//!
//! Provides format detection (RON/JSON/TOML), file discovery and
//! deserialization helpers, and [`load_game_data`], which turns a content
//! directory into a frozen [`Registry`] plus [`GameOptions`].

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use civtick_core::fixed::{Fixed64, checked_amount};
use civtick_core::id::{BuildingTypeId, ResourceId, TechId};
use civtick_core::options::GameOptions;
use civtick_core::registry::{
    BuildingDef, CostScaling, Multiplier, Registry, RegistryBuilder, RegistryError, UnlockableDef,
};
use civtick_core::resource::ResourceMap;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::schema::{BuildingData, CostScalingData, ResourceData, UnlockableData};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name reference could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    /// A duplicate name was found.
    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// An amount is NaN, infinite or outside the fixed-point range.
    #[error("invalid amount {value} for '{field}' of '{name}' in {file}")]
    InvalidAmount {
        file: PathBuf,
        name: String,
        field: &'static str,
        value: f64,
    },

    /// The resolved content failed registry validation.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name (without extension).
///
/// Looks for `{base_name}.ron`, `{base_name}.toml`, and `{base_name}.json`.
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// multiple formats exist for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;
    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }
    Ok(found)
}

/// Like [`find_data_file`], but returns an error if no file is found.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, e: impl std::fmt::Display) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: e.to_string(),
    }
}

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Deserialize a list from a file. For TOML files, extracts the array at the
/// given `toml_key` from a top-level table. For RON and JSON, deserializes
/// directly as `Vec<T>`.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => {
            let table: toml::Value = toml::from_str(&content).map_err(|e| parse_error(path, e))?;
            let array = table
                .get(toml_key)
                .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}' in TOML file")))?
                .clone();
            array
                .try_into()
                .map_err(|e: toml::de::Error| parse_error(path, e))
        }
    }
}

// ===========================================================================
// Name resolution helpers
// ===========================================================================

/// Look up a name in a map, returning an `UnresolvedRef` error if not found.
pub fn resolve_name<'a, V>(
    map: &'a HashMap<String, V>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    map.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    })
}

/// Check whether a name already exists in a map, returning a `DuplicateName`
/// error if so.
pub fn check_duplicate<V>(
    map: &HashMap<String, V>,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

// ===========================================================================
// Loading pipeline
// ===========================================================================

/// Everything a simulation needs from disk.
#[derive(Debug)]
pub struct GameData {
    pub registry: Registry,
    pub options: GameOptions,
}

/// Load `resources.*`, `buildings.*`, optional `unlockables.*` and optional
/// `options.*` from `dir`.
pub fn load_game_data(dir: &Path) -> Result<GameData, DataLoadError> {
    let resources_path = require_data_file(dir, "resources")?;
    let buildings_path = require_data_file(dir, "buildings")?;
    let unlockables_path = find_data_file(dir, "unlockables")?;
    let options_path = find_data_file(dir, "options")?;

    let resources: Vec<ResourceData> = deserialize_list(&resources_path, "resources")?;
    info!(file = %resources_path.display(), count = resources.len(), "loaded resources");
    let buildings: Vec<BuildingData> = deserialize_list(&buildings_path, "buildings")?;
    info!(file = %buildings_path.display(), count = buildings.len(), "loaded buildings");
    let unlockables: Vec<UnlockableData> = match &unlockables_path {
        Some(path) => {
            let list: Vec<UnlockableData> = deserialize_list(path, "unlockables")?;
            info!(file = %path.display(), count = list.len(), "loaded unlockables");
            list
        }
        None => Vec::new(),
    };
    let options = match &options_path {
        Some(path) => {
            let options: GameOptions = deserialize_file(path)?;
            info!(file = %path.display(), "loaded options");
            options
        }
        None => GameOptions::default(),
    };

    let mut builder = RegistryBuilder::new();

    let mut resource_ids: HashMap<String, ResourceId> = HashMap::new();
    for r in &resources {
        check_duplicate(&resource_ids, &r.name, &resources_path)?;
        let id = builder.register_resource(&r.name, r.kind);
        resource_ids.insert(r.name.clone(), id);
        if let Some(price) = r.price {
            let price = amount(price, &r.name, "price", &resources_path)?;
            builder.mutate_resource(&r.name, |def| def.price = Some(price))?;
        }
    }

    let mut building_ids: HashMap<String, BuildingTypeId> = HashMap::new();
    for b in &buildings {
        check_duplicate(&building_ids, &b.name, &buildings_path)?;
        let def = resolve_building(b, &resource_ids, &buildings_path)?;
        building_ids.insert(b.name.clone(), builder.register_building(def));
    }

    let unlockables_file = unlockables_path.unwrap_or_else(|| dir.join("unlockables"));
    let mut tech_ids: HashMap<String, TechId> = HashMap::new();
    for u in &unlockables {
        check_duplicate(&tech_ids, &u.name, &unlockables_file)?;
        let def = resolve_unlockable(u, &building_ids, &unlockables_file)?;
        tech_ids.insert(u.name.clone(), builder.register_unlockable(def));
    }

    for r in &resources {
        if let Some(tech) = &r.unlocked_by {
            let id = *resolve_name(&tech_ids, tech, &resources_path, "unlockable")?;
            builder.mutate_resource(&r.name, |def| def.unlocked_by = Some(id))?;
        }
    }

    let registry = builder.build()?;
    Ok(GameData { registry, options })
}

fn amount(value: f64, name: &str, field: &'static str, file: &Path) -> Result<Fixed64, DataLoadError> {
    checked_amount(value).ok_or_else(|| DataLoadError::InvalidAmount {
        file: file.to_path_buf(),
        name: name.to_string(),
        field,
        value,
    })
}

fn resource_table(
    table: &BTreeMap<String, f64>,
    owner: &str,
    field: &'static str,
    ids: &HashMap<String, ResourceId>,
    file: &Path,
) -> Result<ResourceMap, DataLoadError> {
    let mut out = ResourceMap::new();
    for (name, value) in table {
        let id = *resolve_name(ids, name, file, "resource")?;
        out.add(id, amount(*value, owner, field, file)?);
    }
    Ok(out)
}

fn resolve_building(
    data: &BuildingData,
    resource_ids: &HashMap<String, ResourceId>,
    file: &Path,
) -> Result<BuildingDef, DataLoadError> {
    let name = data.name.as_str();
    let mut def = BuildingDef::new(name, data.class);
    def.input = resource_table(&data.input, name, "input", resource_ids, file)?;
    def.output = resource_table(&data.output, name, "output", resource_ids, file)?;
    def.construction_cost =
        resource_table(&data.construction_cost, name, "construction_cost", resource_ids, file)?;
    def.cost_scaling = match data.cost_scaling {
        CostScalingData::Flat => CostScaling::Flat,
        CostScalingData::Linear => CostScaling::Linear,
        CostScalingData::Exponential { factor } => {
            CostScaling::Exponential(amount(factor, name, "cost_scaling", file)?)
        }
    };
    def.tier = data.tier;
    def.power = data.power;
    for deposit in &data.deposit {
        def.deposit.insert(*resolve_name(resource_ids, deposit, file, "resource")?);
    }
    def.range = data.range;
    def.max = data.max;
    def.special = data.special;
    def.natural_wonder = data.natural_wonder;
    def.world_wonder = data.world_wonder;
    def.storage = amount(data.storage, name, "storage", file)?;
    def.workers = amount(data.workers, name, "workers", file)?;
    def.builder_capacity = amount(data.builder_capacity, name, "builder_capacity", file)?;
    def.import_capacity = amount(data.import_capacity, name, "import_capacity", file)?;
    def.trade_value = amount(data.trade_value, name, "trade_value", file)?;
    Ok(def)
}

fn resolve_unlockable(
    data: &UnlockableData,
    building_ids: &HashMap<String, BuildingTypeId>,
    file: &Path,
) -> Result<UnlockableDef, DataLoadError> {
    let name = data.name.as_str();
    let unlock_buildings = data
        .unlock_buildings
        .iter()
        .map(|b| resolve_name(building_ids, b, file, "building").copied())
        .collect::<Result<Vec<_>, _>>()?;
    let mut building_multipliers = Vec::with_capacity(data.building_multipliers.len());
    for m in &data.building_multipliers {
        let id = *resolve_name(building_ids, &m.building, file, "building")?;
        building_multipliers.push((
            id,
            Multiplier {
                output: amount(m.output, name, "output", file)?,
                input: amount(m.input, name, "input", file)?,
                worker: amount(m.worker, name, "worker", file)?,
                storage: amount(m.storage, name, "storage", file)?,
                source: name.to_string(),
            },
        ));
    }
    let global_multipliers = data
        .global_multipliers
        .iter()
        .map(|g| Ok((g.kind, amount(g.value, name, "global_multipliers", file)?)))
        .collect::<Result<Vec<_>, DataLoadError>>()?;
    Ok(UnlockableDef {
        name: name.to_string(),
        unlock_buildings,
        building_multipliers,
        global_multipliers,
    })
}

// ===========================================================================
// Tests
// ===========================================================================
