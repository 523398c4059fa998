//! Machine power draw per crafting category

use std::collections::BTreeMap;

use crate::models::{Category, ProductionPlan};

/// The building that runs recipes of one category.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineSpec {
    pub name: String,
    /// Draw while working, in kW
    pub draw_kw: f64,
}

impl MachineSpec {
    pub fn new(name: impl Into<String>, draw_kw: f64) -> Self {
        Self {
            name: name.into(),
            draw_kw,
        }
    }
}

/// Static lookup from crafting category to machine draw.
#[derive(Debug, Clone)]
pub struct PowerModel {
    machines: BTreeMap<Category, MachineSpec>,
}

impl Default for PowerModel {
    fn default() -> Self {
        let machines = Category::ALL
            .into_iter()
            .map(|category| (category, default_machine(category)))
            .collect();
        Self { machines }
    }
}

fn default_machine(category: Category) -> MachineSpec {
    match category {
        Category::Crafting | Category::AdvancedCrafting | Category::CraftingWithFluid => {
            MachineSpec::new("assembling-machine-2", 150.0)
        }
        Category::Smelting => MachineSpec::new("electric-furnace", 180.0),
        Category::Chemistry => MachineSpec::new("chemical-plant", 210.0),
        Category::OilProcessing => MachineSpec::new("oil-refinery", 420.0),
        Category::Centrifuging => MachineSpec::new("centrifuge", 350.0),
        Category::RocketBuilding => MachineSpec::new("rocket-silo", 4000.0),
    }
}

impl PowerModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the machine used for `category`.
    pub fn with_machine(mut self, category: Category, spec: MachineSpec) -> Self {
        self.machines.insert(category, spec);
        self
    }

    pub fn machine_for(&self, category: Category) -> &MachineSpec {
        // Every category is seeded in `default`, and entries are only replaced.
        &self.machines[&category]
    }

    /// Total draw of the plan's machines in MW.
    ///
    /// Recipes without a recorded category are counted as `crafting`.
    pub fn estimate(&self, plan: &ProductionPlan) -> f64 {
        let kw: f64 = plan
            .required_machines
            .iter()
            .map(|(recipe, &count)| {
                let category = plan
                    .machine_categories
                    .get(recipe)
                    .copied()
                    .unwrap_or(Category::Crafting);
                count as f64 * self.machine_for(category).draw_kw
            })
            .sum();
        kw / 1000.0
    }

    /// Write the estimate into `plan.total_power_usage`.
    pub fn annotate(&self, plan: &mut ProductionPlan) {
        plan.total_power_usage = self.estimate(plan);
    }
}
