//! Data models for Factorio items, recipes, technologies and production plans

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PlannerError, Result};

/// Broad classification of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemKind {
    Raw,
    Intermediate,
    Consumable,
    Building,
    Tool,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Raw => "raw",
            ItemKind::Intermediate => "intermediate",
            ItemKind::Consumable => "consumable",
            ItemKind::Building => "building",
            ItemKind::Tool => "tool",
        }
    }
}

impl FromStr for ItemKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "raw" => Ok(ItemKind::Raw),
            "intermediate" => Ok(ItemKind::Intermediate),
            "consumable" => Ok(ItemKind::Consumable),
            "building" => Ok(ItemKind::Building),
            "tool" => Ok(ItemKind::Tool),
            other => Err(format!("unknown item kind '{}'", other)),
        }
    }
}

/// Typed item metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ItemProperty {
    StackSize(u32),
    FuelValue { megajoules: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub name: String,
    pub kind: ItemKind,
    pub properties: Vec<ItemProperty>,
}

impl Item {
    pub fn new(name: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            name: name.into(),
            kind,
            properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, property: ItemProperty) -> Self {
        self.properties.push(property);
        self
    }

    pub fn stack_size(&self) -> Option<u32> {
        self.properties.iter().find_map(|p| match p {
            ItemProperty::StackSize(n) => Some(*n),
            _ => None,
        })
    }

    /// Fuel value in MJ, if the item can be burned.
    pub fn fuel_value(&self) -> Option<f64> {
        self.properties.iter().find_map(|p| match p {
            ItemProperty::FuelValue { megajoules } => Some(*megajoules),
            _ => None,
        })
    }
}

/// Crafting category. Decides which machine type runs a recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Crafting,
    AdvancedCrafting,
    CraftingWithFluid,
    Smelting,
    Chemistry,
    OilProcessing,
    Centrifuging,
    RocketBuilding,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Crafting,
        Category::AdvancedCrafting,
        Category::CraftingWithFluid,
        Category::Smelting,
        Category::Chemistry,
        Category::OilProcessing,
        Category::Centrifuging,
        Category::RocketBuilding,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Crafting => "crafting",
            Category::AdvancedCrafting => "advanced-crafting",
            Category::CraftingWithFluid => "crafting-with-fluid",
            Category::Smelting => "smelting",
            Category::Chemistry => "chemistry",
            Category::OilProcessing => "oil-processing",
            Category::Centrifuging => "centrifuging",
            Category::RocketBuilding => "rocket-building",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown crafting category '{}'", s))
    }
}

/// A named transformation of input items into output items.
///
/// Inputs and outputs keep their declaration order. More than one output
/// means the recipe has byproducts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    pub inputs: Vec<(String, f64)>,
    pub outputs: Vec<(String, f64)>,
    /// Seconds per craft
    pub crafting_time: f64,
    pub category: Category,
}

impl Recipe {
    pub fn new(name: impl Into<String>, crafting_time: f64, category: Category) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            crafting_time,
            category,
        }
    }

    pub fn input(mut self, item: impl Into<String>, qty: f64) -> Self {
        self.inputs.push((item.into(), qty));
        self
    }

    pub fn output(mut self, item: impl Into<String>, qty: f64) -> Self {
        self.outputs.push((item.into(), qty));
        self
    }

    pub fn input_qty(&self, item: &str) -> f64 {
        self.inputs
            .iter()
            .filter(|(name, _)| name == item)
            .map(|(_, qty)| qty)
            .sum()
    }

    pub fn output_qty(&self, item: &str) -> f64 {
        self.outputs
            .iter()
            .filter(|(name, _)| name == item)
            .map(|(_, qty)| qty)
            .sum()
    }

    /// Items of `item` gained per craft once the recipe's own consumption of
    /// it is paid back. Differs from `output_qty` only for catalyst loops.
    pub fn net_yield(&self, item: &str) -> f64 {
        self.output_qty(item) - self.input_qty(item)
    }

    pub fn produces(&self, item: &str) -> bool {
        self.outputs.iter().any(|(name, qty)| name == item && *qty > 0.0)
    }

    /// Items consumed per craft after netting out what the recipe gives back.
    pub fn net_inputs(&self) -> Vec<(&str, f64)> {
        net_side(&self.inputs, |item| -self.net_yield(item))
    }

    /// Items gained per craft after netting out what the recipe consumes.
    pub fn net_outputs(&self) -> Vec<(&str, f64)> {
        net_side(&self.outputs, |item| self.net_yield(item))
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PlannerError::invalid_recipe(&self.name, "empty name"));
        }
        if !(self.crafting_time.is_finite() && self.crafting_time > 0.0) {
            return Err(PlannerError::invalid_recipe(
                &self.name,
                format!("crafting time must be positive, got {}", self.crafting_time),
            ));
        }
        for (item, qty) in self.inputs.iter().chain(&self.outputs) {
            if item.is_empty() {
                return Err(PlannerError::invalid_recipe(&self.name, "empty item name"));
            }
            if !(qty.is_finite() && *qty >= 0.0) {
                return Err(PlannerError::invalid_recipe(
                    &self.name,
                    format!("quantity of '{}' must be non-negative, got {}", item, qty),
                ));
            }
        }
        if !self.outputs.iter().any(|(_, qty)| *qty > 0.0) {
            return Err(PlannerError::invalid_recipe(
                &self.name,
                "needs at least one output with positive quantity",
            ));
        }
        Ok(())
    }
}

fn net_side<'r>(side: &'r [(String, f64)], net: impl Fn(&str) -> f64) -> Vec<(&'r str, f64)> {
    let mut result: Vec<(&str, f64)> = Vec::new();
    for (item, _) in side {
        if result.iter().any(|(seen, _)| *seen == item.as_str()) {
            continue;
        }
        let qty = net(item);
        if qty > 0.0 {
            result.push((item.as_str(), qty));
        }
    }
    result
}

/// A research technology and the recipes it unlocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Technology {
    pub name: String,
    pub prerequisites: Vec<String>,
    pub unlocks: Vec<String>,
}

/// Desired output rate for one item, in items per minute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionTarget {
    pub item: String,
    pub rate: f64,
}

impl ProductionTarget {
    pub fn new(item: impl Into<String>, rate: f64) -> Self {
        Self {
            item: item.into(),
            rate,
        }
    }
}

/// Result of a resolution call.
///
/// Rates are items per minute. Every map is ordered so that equal plans
/// compare, print and serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductionPlan {
    pub targets: Vec<ProductionTarget>,
    /// Recipe name -> number of machines running it
    pub required_machines: BTreeMap<String, u64>,
    /// Recipe name -> crafting category of its machines
    pub machine_categories: BTreeMap<String, Category>,
    /// Item -> rate produced by the planned machines or drawn from outside
    pub resource_flow: BTreeMap<String, f64>,
    /// Item -> rate drawn from outside the factory (ores, locked items, cycle breaks)
    pub raw_materials: BTreeMap<String, f64>,
    /// Item -> rate produced beyond what is consumed
    pub surplus: BTreeMap<String, f64>,
    pub has_cycle: bool,
    /// Estimated draw in MW
    pub total_power_usage: f64,
}

impl ProductionPlan {
    pub fn machine_count(&self, recipe: &str) -> u64 {
        self.required_machines.get(recipe).copied().unwrap_or(0)
    }

    pub fn flow(&self, item: &str) -> f64 {
        self.resource_flow.get(item).copied().unwrap_or(0.0)
    }

    /// Saturates at `u64::MAX` rather than overflowing.
    pub fn total_machines(&self) -> u64 {
        self.required_machines
            .values()
            .fold(0u64, |total, &count| total.saturating_add(count))
    }
}
