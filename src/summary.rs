//! Human-readable plan output

use std::fmt;

use crate::graph::RecipeGraph;
use crate::models::{Category, ProductionPlan, ProductionTarget};
use crate::power::PowerModel;

/// One row of the machine table
#[derive(Debug, Clone, PartialEq)]
pub struct MachineLine {
    pub recipe: String,
    pub count: u64,
    pub machine: String,
    pub category: Category,
}

/// Summary of a production plan
#[derive(Debug)]
pub struct PlanSummary {
    pub targets: Vec<ProductionTarget>,
    pub machines: Vec<MachineLine>,
    pub raw_materials: Vec<(String, f64)>,
    pub surplus: Vec<(String, f64)>,
    pub total_machines: u64,
    pub power_mw: f64,
    pub has_cycle: bool,
}

/// Generate a summary of the plan
pub fn summarize_plan(plan: &ProductionPlan, power: &PowerModel) -> PlanSummary {
    let machines = plan
        .required_machines
        .iter()
        .map(|(recipe, &count)| {
            let category = plan
                .machine_categories
                .get(recipe)
                .copied()
                .unwrap_or(Category::Crafting);
            MachineLine {
                recipe: recipe.clone(),
                count,
                machine: power.machine_for(category).name.clone(),
                category,
            }
        })
        .collect();

    PlanSummary {
        targets: plan.targets.clone(),
        machines,
        raw_materials: plan.raw_materials.iter().map(|(k, v)| (k.clone(), *v)).collect(),
        surplus: plan.surplus.iter().map(|(k, v)| (k.clone(), *v)).collect(),
        total_machines: plan.total_machines(),
        power_mw: plan.total_power_usage,
        has_cycle: plan.has_cycle,
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Production Summary ===")?;
        for target in &self.targets {
            writeln!(f, "Target: {} @ {:.2}/min", target.item, target.rate)?;
        }
        writeln!(f)?;

        writeln!(f, "Machines required ({}):", self.total_machines)?;
        for line in &self.machines {
            writeln!(f, "  {:>4}x {:<22} {}", line.count, line.machine, line.recipe)?;
        }
        writeln!(f)?;

        writeln!(f, "Raw inputs required:")?;
        for (item, rate) in &self.raw_materials {
            writeln!(f, "  {} @ {:.2}/min", item, rate)?;
        }

        if !self.surplus.is_empty() {
            writeln!(f)?;
            writeln!(f, "Surplus:")?;
            for (item, rate) in &self.surplus {
                writeln!(f, "  {} @ {:.2}/min", item, rate)?;
            }
        }
        writeln!(f)?;

        writeln!(f, "Power: {:.2} MW", self.power_mw)?;
        if self.has_cycle {
            writeln!(f, "Note: the recipe graph has a cycle; some inputs were treated as raw")?;
        }

        Ok(())
    }
}

/// Per-recipe breakdown at full machine capacity, one block per recipe.
pub fn format_plan_details(plan: &ProductionPlan, graph: &RecipeGraph) -> String {
    let mut output = String::new();

    for (name, &count) in &plan.required_machines {
        let Ok(recipe) = graph.recipe(name) else {
            continue;
        };
        let crafts_per_min = count as f64 * 60.0 / recipe.crafting_time;
        output.push_str(&format!(
            "{}x {} ({}, {}s per craft)\n",
            count, recipe.name, recipe.category, recipe.crafting_time
        ));
        for (item, qty) in recipe.net_inputs() {
            output.push_str(&format!("  needs {} @ {:.2}/min\n", item, qty * crafts_per_min));
        }
        for (item, qty) in recipe.net_outputs() {
            output.push_str(&format!("  makes {} @ {:.2}/min\n", item, qty * crafts_per_min));
        }
    }

    output
}
