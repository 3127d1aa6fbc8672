//! Serde data file structs for content definitions.
//!
//! These structs define the on-disk format for resources, buildings and
//! unlockables. Cross-references are by name; the loader resolves them to
//! registry ids. Amounts are plain floats here and become `Fixed64` during
//! resolution.

use std::collections::BTreeMap;

use civtick_core::registry::{BuildingClass, GlobalMultiplierKind, ResourceKind, SpecialEffect};
use serde::{Deserialize, Serialize};

// ===========================================================================
// Resources
// ===========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceData {
    pub name: String,
    pub kind: ResourceKind,
    #[serde(default)]
    pub price: Option<f64>,
    /// Name of the unlockable that makes this resource tradeable.
    #[serde(default)]
    pub unlocked_by: Option<String>,
}

// ===========================================================================
// Buildings
// ===========================================================================

fn default_class() -> BuildingClass {
    BuildingClass::Standard
}

fn default_tier() -> u32 {
    1
}

fn default_builder_capacity() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CostScalingData {
    Flat,
    #[default]
    Linear,
    Exponential { factor: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingData {
    pub name: String,
    #[serde(default = "default_class")]
    pub class: BuildingClass,
    /// Resource name -> amount per level.
    #[serde(default)]
    pub input: BTreeMap<String, f64>,
    #[serde(default)]
    pub output: BTreeMap<String, f64>,
    #[serde(default)]
    pub construction_cost: BTreeMap<String, f64>,
    #[serde(default)]
    pub cost_scaling: CostScalingData,
    #[serde(default = "default_tier")]
    pub tier: u32,
    #[serde(default)]
    pub power: bool,
    /// Deposit resource names the tile must carry.
    #[serde(default)]
    pub deposit: Vec<String>,
    #[serde(default)]
    pub range: Option<u32>,
    #[serde(default)]
    pub max: Option<u32>,
    #[serde(default)]
    pub special: Option<SpecialEffect>,
    #[serde(default)]
    pub natural_wonder: bool,
    #[serde(default)]
    pub world_wonder: bool,
    #[serde(default)]
    pub storage: f64,
    #[serde(default)]
    pub workers: f64,
    #[serde(default = "default_builder_capacity")]
    pub builder_capacity: f64,
    #[serde(default)]
    pub import_capacity: f64,
    #[serde(default)]
    pub trade_value: f64,
}

// ===========================================================================
// Unlockables
// ===========================================================================

/// Additive bonus for one building type. Each field adds to a base of one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingMultiplierData {
    pub building: String,
    #[serde(default)]
    pub output: f64,
    #[serde(default)]
    pub input: f64,
    #[serde(default)]
    pub worker: f64,
    #[serde(default)]
    pub storage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalMultiplierData {
    pub kind: GlobalMultiplierKind,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnlockableData {
    pub name: String,
    #[serde(default)]
    pub unlock_buildings: Vec<String>,
    #[serde(default)]
    pub building_multipliers: Vec<BuildingMultiplierData>,
    #[serde(default)]
    pub global_multipliers: Vec<GlobalMultiplierData>,
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn building_defaults_from_ron() {
        let b: BuildingData = ron::from_str(r#"(name: "Hut")"#).unwrap();
        assert_eq!(b.class, BuildingClass::Standard);
        assert_eq!(b.tier, 1);
        assert_eq!(b.builder_capacity, 1.0);
        assert_eq!(b.cost_scaling, CostScalingData::Linear);
        assert!(b.input.is_empty());
        assert!(b.special.is_none());
    }

    #[test]
    fn cost_scaling_is_tagged_in_every_format() {
        let json: CostScalingData =
            serde_json::from_str(r#"{"type": "exponential", "factor": 1.5}"#).unwrap();
        assert_eq!(json, CostScalingData::Exponential { factor: 1.5 });

        #[derive(Deserialize)]
        struct Wrapper {
            cost_scaling: CostScalingData,
        }
        let toml: Wrapper = toml::from_str(r#"cost_scaling = { type = "flat" }"#).unwrap();
        assert_eq!(toml.cost_scaling, CostScalingData::Flat);
    }

    #[test]
    fn resource_kind_and_price_from_json() {
        let r: ResourceData =
            serde_json::from_str(r#"{"name": "Gold", "kind": "Transportable", "price": 10.0, "unlocked_by": "Logistics"}"#)
                .unwrap();
        assert_eq!(r.kind, ResourceKind::Transportable);
        assert_eq!(r.price, Some(10.0));
        assert_eq!(r.unlocked_by.as_deref(), Some("Logistics"));
    }

    #[test]
    fn unlockable_from_toml() {
        let u: UnlockableData = toml::from_str(
            r#"
name = "Sawmills"
unlock_buildings = ["Mill"]

[[building_multipliers]]
building = "Mill"
output = 1.0

[[global_multipliers]]
kind = "TransportCapacity"
value = 0.5
"#,
        )
        .unwrap();
        assert_eq!(u.unlock_buildings, vec!["Mill".to_string()]);
        assert_eq!(u.building_multipliers[0].output, 1.0);
        assert_eq!(u.building_multipliers[0].storage, 0.0);
        assert_eq!(u.global_multipliers[0].kind, GlobalMultiplierKind::TransportCapacity);
    }
}
