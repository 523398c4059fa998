//! Demand resolution: target rates in, machine counts and item flows out
//!
//! Resolution runs in two passes over an arena of item nodes:
//!
//! 1. **Expansion.** A depth-first walk from every target picks one recipe per
//!    item and records a post-order. Re-entering an item that is still on the
//!    walk path marks that input edge as a cycle break instead of recursing.
//! 2. **Propagation.** Items are visited in reverse post-order, so every
//!    consumer of an item is visited before the item itself and the item's
//!    demand is final when it is expanded. Each item is visited exactly once;
//!    shared intermediates accumulate demand from all consumers first.
//!
//! Machine counts are rounded up once per recipe from the merged craft rate.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::error::{PlannerError, Result};
use crate::graph::RecipeGraph;
use crate::models::{ProductionPlan, ProductionTarget, Recipe};
use crate::power::PowerModel;
use crate::research::RecipeAvailability;

/// Demand at or below this rate (items/min) is treated as satisfied.
const RATE_EPSILON: f64 = 1e-9;
/// Slack when rounding machine counts up, so 5.0000000001 stays 5.
const MACHINE_EPSILON: f64 = 1e-9;
const COST_EPSILON: f64 = 1e-9;

/// Tuning knobs for a [`Resolver`].
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Item -> recipe to use whenever that recipe is available
    pub preferences: BTreeMap<String, String>,
    /// Upper bound on node visits per resolution
    pub max_iterations: usize,
    /// How deep the raw-cost estimate recurses before pricing an item as raw
    pub max_cost_depth: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            preferences: BTreeMap::new(),
            max_iterations: 100_000,
            max_cost_depth: 32,
        }
    }
}

impl ResolverOptions {
    pub fn prefer(mut self, item: impl Into<String>, recipe: impl Into<String>) -> Self {
        self.preferences.insert(item.into(), recipe.into());
        self
    }
}

/// Turns production targets into a [`ProductionPlan`].
///
/// Borrows the catalog and research state, so any number of resolvers can
/// share them across threads while the borrow keeps the catalog frozen.
pub struct Resolver<'a> {
    graph: &'a RecipeGraph,
    research: &'a (dyn RecipeAvailability + Sync),
    power: PowerModel,
    options: ResolverOptions,
}

impl<'a> Resolver<'a> {
    pub fn new(graph: &'a RecipeGraph, research: &'a (dyn RecipeAvailability + Sync)) -> Self {
        Self {
            graph,
            research,
            power: PowerModel::default(),
            options: ResolverOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_power_model(mut self, power: PowerModel) -> Self {
        self.power = power;
        self
    }

    pub fn power_model(&self) -> &PowerModel {
        &self.power
    }

    /// Resolve `targets` into a plan.
    ///
    /// Items with no available producer become raw materials rather than
    /// errors. On any error no plan is produced.
    pub fn resolve(&self, targets: &[ProductionTarget]) -> Result<ProductionPlan> {
        validate_targets(targets)?;

        let mut resolution = Resolution::new(self);
        for target in targets {
            let idx = resolution.intern(&target.item);
            resolution.nodes[idx].demand += target.rate;
            *resolution.consumed.entry(target.item.clone()).or_default() += target.rate;
        }
        for target in targets {
            let idx = resolution.index[&target.item];
            if resolution.nodes[idx].state == NodeState::Unvisited {
                resolution.expand(idx)?;
            }
        }
        resolution.propagate()?;

        let mut plan = resolution.finish(targets)?;
        self.power.annotate(&mut plan);

        info!(
            targets = targets.len(),
            recipes = plan.required_machines.len(),
            machines = plan.total_machines(),
            raw_materials = plan.raw_materials.len(),
            power_mw = plan.total_power_usage,
            "resolved production plan"
        );
        if plan.has_cycle {
            warn!("recipe cycle detected; cyclic inputs are supplied externally");
        }
        Ok(plan)
    }
}

fn validate_targets(targets: &[ProductionTarget]) -> Result<()> {
    if targets.is_empty() {
        return Err(PlannerError::NilPlanInput);
    }
    for target in targets {
        if target.item.trim().is_empty() {
            return Err(PlannerError::invalid_target(&target.item, "empty item name"));
        }
        if !target.rate.is_finite() {
            return Err(PlannerError::invalid_target(
                &target.item,
                format!("rate must be finite, got {}", target.rate),
            ));
        }
        if target.rate < 0.0 {
            return Err(PlannerError::invalid_target(
                &target.item,
                format!("rate must not be negative, got {}", target.rate),
            ));
        }
    }
    Ok(())
}

/// Whole machines needed to run `busy` machine-equivalents, at least one.
fn machine_count(recipe: &str, busy: f64) -> Result<u64> {
    let machines = (busy - MACHINE_EPSILON).ceil().max(1.0);
    // `u64::MAX as f64` rounds up to 2^64, which no u64 can hold.
    if machines >= u64::MAX as f64 {
        return Err(PlannerError::MachineCountOverflow {
            recipe: recipe.to_string(),
            machines,
        });
    }
    Ok(machines as u64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Unvisited,
    /// On the current expansion path
    InProgress,
    Expanded,
    /// Demand has been propagated through this item
    Resolved,
}

#[derive(Debug)]
struct ItemNode<'a> {
    name: String,
    state: NodeState,
    recipe: Option<&'a Recipe>,
    /// Items/min requested by targets and consumers
    demand: f64,
    /// Items/min already covered by byproducts
    credit: f64,
}

/// Per-call working state. Dropped when the call returns.
struct Resolution<'r, 'a> {
    resolver: &'r Resolver<'a>,
    nodes: Vec<ItemNode<'a>>,
    index: HashMap<String, usize>,
    postorder: Vec<usize>,
    /// (consumer, input) edges that close a cycle
    back_edges: HashSet<(usize, usize)>,
    unit_costs: HashMap<String, f64>,
    costing: HashSet<String>,
    crafts: BTreeMap<&'a str, (&'a Recipe, f64)>,
    raw: BTreeMap<String, f64>,
    consumed: BTreeMap<String, f64>,
    iterations: usize,
    has_cycle: bool,
}

impl<'r, 'a> Resolution<'r, 'a> {
    fn new(resolver: &'r Resolver<'a>) -> Self {
        Self {
            resolver,
            nodes: Vec::new(),
            index: HashMap::new(),
            postorder: Vec::new(),
            back_edges: HashSet::new(),
            unit_costs: HashMap::new(),
            costing: HashSet::new(),
            crafts: BTreeMap::new(),
            raw: BTreeMap::new(),
            consumed: BTreeMap::new(),
            iterations: 0,
            has_cycle: false,
        }
    }

    fn intern(&mut self, item: &str) -> usize {
        if let Some(&idx) = self.index.get(item) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(ItemNode {
            name: item.to_string(),
            state: NodeState::Unvisited,
            recipe: None,
            demand: 0.0,
            credit: 0.0,
        });
        self.index.insert(item.to_string(), idx);
        idx
    }

    fn tick(&mut self) -> Result<()> {
        self.iterations += 1;
        let limit = self.resolver.options.max_iterations;
        if self.iterations > limit {
            return Err(PlannerError::IterationLimit { limit });
        }
        Ok(())
    }

    /// Pick recipes depth-first and record the post-order.
    ///
    /// Byproducts of the chosen recipe are expanded as children too, so the
    /// recipe's crafts are known before the byproduct item is resolved.
    fn expand(&mut self, idx: usize) -> Result<()> {
        self.tick()?;
        self.nodes[idx].state = NodeState::InProgress;

        let name = self.nodes[idx].name.clone();
        let recipe = self.choose_recipe(&name);
        self.nodes[idx].recipe = recipe;

        if let Some(recipe) = recipe {
            debug!(item = %name, recipe = %recipe.name, "selected recipe");
            for (input, _) in recipe.net_inputs() {
                let child = self.intern(input);
                match self.nodes[child].state {
                    NodeState::Unvisited => self.expand(child)?,
                    NodeState::InProgress => {
                        debug!(item = %name, input, "cycle edge");
                        self.back_edges.insert((idx, child));
                    }
                    NodeState::Expanded | NodeState::Resolved => {}
                }
            }
            for (output, _) in recipe.net_outputs() {
                if output == name {
                    continue;
                }
                let child = self.intern(output);
                if self.nodes[child].state == NodeState::Unvisited {
                    self.expand(child)?;
                }
            }
        }

        self.nodes[idx].state = NodeState::Expanded;
        self.postorder.push(idx);
        Ok(())
    }

    /// Push demand from every item down to its inputs.
    fn propagate(&mut self) -> Result<()> {
        let order: Vec<usize> = self.postorder.iter().rev().copied().collect();
        for idx in order {
            self.tick()?;
            let node = &mut self.nodes[idx];
            node.state = NodeState::Resolved;
            let net = (node.demand - node.credit).max(0.0);
            if net <= RATE_EPSILON {
                continue;
            }

            let Some(recipe) = node.recipe else {
                *self.raw.entry(node.name.clone()).or_default() += net;
                continue;
            };
            let name = node.name.clone();

            let crafts_per_sec = net / 60.0 / recipe.net_yield(&name);
            self.crafts
                .entry(recipe.name.as_str())
                .or_insert((recipe, 0.0))
                .1 += crafts_per_sec;

            for (input, qty) in recipe.net_inputs() {
                let rate = crafts_per_sec * qty * 60.0;
                *self.consumed.entry(input.to_string()).or_default() += rate;

                let child = self.index[input];
                if self.back_edges.contains(&(idx, child)) {
                    self.has_cycle = true;
                    *self.raw.entry(input.to_string()).or_default() += rate;
                } else {
                    self.nodes[child].demand += rate;
                }
            }

            for (output, qty) in recipe.net_outputs() {
                if output == name {
                    continue;
                }
                let other = self.index[output];
                if self.nodes[other].state != NodeState::Resolved {
                    self.nodes[other].credit += crafts_per_sec * qty * 60.0;
                }
            }
        }
        Ok(())
    }

    fn finish(self, targets: &[ProductionTarget]) -> Result<ProductionPlan> {
        let mut plan = ProductionPlan {
            targets: targets.to_vec(),
            has_cycle: self.has_cycle,
            ..ProductionPlan::default()
        };

        let mut flow: BTreeMap<String, f64> = BTreeMap::new();
        for (name, (recipe, crafts_per_sec)) in &self.crafts {
            let machines = machine_count(name, crafts_per_sec * recipe.crafting_time)?;
            plan.required_machines.insert(name.to_string(), machines);
            plan.machine_categories.insert(name.to_string(), recipe.category);

            let crafts_per_min = machines as f64 * 60.0 / recipe.crafting_time;
            for (output, qty) in recipe.net_outputs() {
                *flow.entry(output.to_string()).or_default() += crafts_per_min * qty;
            }
        }
        for (item, rate) in &self.raw {
            if *rate > RATE_EPSILON {
                plan.raw_materials.insert(item.clone(), *rate);
                *flow.entry(item.clone()).or_default() += rate;
            }
        }

        for (item, rate) in flow {
            if rate <= RATE_EPSILON {
                continue;
            }
            let consumed = self.consumed.get(&item).copied().unwrap_or(0.0);
            let extra = rate - consumed;
            if extra > RATE_EPSILON {
                plan.surplus.insert(item.clone(), extra);
            }
            plan.resource_flow.insert(item, rate);
        }
        Ok(plan)
    }

    /// Recipe-choice policy: caller preference, then the only candidate,
    /// then lowest raw cost per unit, then recipe name.
    fn choose_recipe(&mut self, item: &str) -> Option<&'a Recipe> {
        let mut candidates = self.candidates(item);
        if candidates.is_empty() {
            return None;
        }

        if let Some(preferred) = self.resolver.options.preferences.get(item) {
            if let Some(recipe) = candidates.iter().find(|r| &r.name == preferred) {
                return Some(*recipe);
            }
            warn!(item, recipe = %preferred, "preferred recipe is not available, choosing another");
        }
        if candidates.len() == 1 {
            return Some(candidates[0]);
        }

        candidates.sort_by(|a, b| a.name.cmp(&b.name));
        let mut best: Option<(&'a Recipe, f64)> = None;
        for recipe in candidates {
            let (cost, _) = self.recipe_cost(recipe, item, 0);
            debug!(item, recipe = %recipe.name, cost, "candidate recipe");
            match best {
                Some((_, best_cost)) if cost >= best_cost - COST_EPSILON => {}
                _ => best = Some((recipe, cost)),
            }
        }
        best.map(|(recipe, _)| recipe)
    }

    /// Available recipes with a positive net yield of `item`.
    fn candidates(&self, item: &str) -> Vec<&'a Recipe> {
        let graph: &'a RecipeGraph = self.resolver.graph;
        graph
            .producers_of(item)
            .into_iter()
            .filter(|r| self.resolver.research.is_available(&r.name))
            .filter(|r| r.net_yield(item) > 0.0)
            .collect()
    }

    /// Raw units consumed per unit of `item` made by `recipe`, and whether
    /// the figure depends on the current expansion path.
    fn recipe_cost(&mut self, recipe: &'a Recipe, item: &str, depth: usize) -> (f64, bool) {
        let mut total = 0.0;
        let mut path_dependent = false;
        for (input, qty) in recipe.net_inputs() {
            let (cost, dependent) = self.unit_cost(input, depth + 1);
            total += qty * cost;
            path_dependent |= dependent;
        }
        (total / recipe.net_yield(item), path_dependent)
    }

    /// Cheapest raw cost of one unit of `item`. A raw item costs 1.
    ///
    /// Items on the expansion path or already being priced cost infinity, so
    /// a recipe that feeds on its own ancestors loses to any acyclic one.
    /// Beyond the depth bound an item is priced as raw. Only estimates that
    /// hit neither case are memoized.
    fn unit_cost(&mut self, item: &str, depth: usize) -> (f64, bool) {
        if self.costing.contains(item) || self.is_on_path(item) {
            return (f64::INFINITY, true);
        }
        if let Some(&cost) = self.unit_costs.get(item) {
            return (cost, false);
        }
        if depth >= self.resolver.options.max_cost_depth {
            return (1.0, true);
        }

        let candidates = self.candidates(item);
        if candidates.is_empty() {
            self.unit_costs.insert(item.to_string(), 1.0);
            return (1.0, false);
        }

        self.costing.insert(item.to_string());
        let mut best = f64::INFINITY;
        let mut path_dependent = false;
        for recipe in candidates {
            let (cost, dependent) = self.recipe_cost(recipe, item, depth);
            best = best.min(cost);
            path_dependent |= dependent;
        }
        self.costing.remove(item);

        if !path_dependent {
            self.unit_costs.insert(item.to_string(), best);
        }
        (best, path_dependent)
    }

    fn is_on_path(&self, item: &str) -> bool {
        self.index
            .get(item)
            .is_some_and(|&idx| self.nodes[idx].state == NodeState::InProgress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use crate::research::{ResearchLevel, ResearchProgress};
    use crate::sample;
    use proptest::prelude::*;

    fn graph(recipes: Vec<Recipe>) -> RecipeGraph {
        let mut graph = RecipeGraph::new();
        for recipe in recipes {
            graph.add_recipe(recipe).unwrap();
        }
        graph
    }

    fn everything(_: &str) -> bool {
        true
    }

    fn science_graph() -> RecipeGraph {
        graph(vec![
            Recipe::new("iron-plate", 3.2, Category::Smelting)
                .input("iron-ore", 1.0)
                .output("iron-plate", 1.0),
            Recipe::new("iron-gear-wheel", 0.5, Category::Crafting)
                .input("iron-plate", 2.0)
                .output("iron-gear-wheel", 1.0),
            Recipe::new("automation-science-pack", 5.0, Category::Crafting)
                .input("copper-plate", 1.0)
                .input("iron-gear-wheel", 1.0)
                .output("automation-science-pack", 1.0),
            Recipe::new("copper-plate", 3.2, Category::Smelting)
                .input("copper-ore", 1.0)
                .output("copper-plate", 1.0),
        ])
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-6, "{} != {}", actual, expected);
    }

    #[test]
    fn automation_science_at_sixty_per_minute() {
        let graph = science_graph();
        let research = ResearchProgress::from_recipes([
            "iron-plate",
            "iron-gear-wheel",
            "automation-science-pack",
            "copper-plate",
        ]);
        let plan = Resolver::new(&graph, &research)
            .resolve(&[ProductionTarget::new("automation-science-pack", 60.0)])
            .unwrap();

        assert_eq!(plan.machine_count("automation-science-pack"), 5);
        // 60 gears/min at 0.5s per craft
        assert_eq!(plan.machine_count("iron-gear-wheel"), 1);
        // 120 plates/min at 3.2s per craft = 6.4 machines
        assert_eq!(plan.machine_count("iron-plate"), 7);
        // 60 plates/min at 3.2s per craft = 3.2 machines
        assert_eq!(plan.machine_count("copper-plate"), 4);
        assert_eq!(plan.required_machines.len(), 4);

        assert_close(plan.flow("iron-ore"), 120.0);
        assert_close(plan.flow("copper-ore"), 60.0);
        assert!(!plan.required_machines.contains_key("iron-ore"));
        assert!(!plan.required_machines.contains_key("copper-ore"));
        assert_eq!(
            plan.raw_materials.keys().collect::<Vec<_>>(),
            vec!["copper-ore", "iron-ore"]
        );

        assert_close(plan.flow("automation-science-pack"), 60.0);
        assert_close(plan.flow("iron-plate"), 7.0 * 60.0 / 3.2);
        assert_close(plan.surplus["iron-gear-wheel"], 60.0);
        assert!(!plan.surplus.contains_key("automation-science-pack"));
        assert!(!plan.has_cycle);
        assert_eq!(plan.machine_categories["iron-plate"], Category::Smelting);
        assert_close(plan.total_power_usage, (6.0 * 150.0 + 11.0 * 180.0) / 1000.0);
    }

    #[test]
    fn production_never_falls_short_of_demand() {
        let graph = science_graph();
        let plan = Resolver::new(&graph, &everything)
            .resolve(&[ProductionTarget::new("automation-science-pack", 37.0)])
            .unwrap();
        assert!(plan.flow("automation-science-pack") >= 37.0);
        assert!(plan.flow("iron-gear-wheel") >= 37.0);
        assert!(plan.flow("iron-plate") >= 74.0);
    }

    #[test]
    fn all_zero_targets_give_an_empty_plan() {
        let graph = science_graph();
        let plan = Resolver::new(&graph, &everything)
            .resolve(&[
                ProductionTarget::new("automation-science-pack", 0.0),
                ProductionTarget::new("iron-plate", 0.0),
            ])
            .unwrap();
        assert!(plan.required_machines.is_empty());
        assert!(plan.resource_flow.values().all(|rate| *rate == 0.0));
        assert_eq!(plan.total_power_usage, 0.0);
    }

    #[test]
    fn rejects_empty_and_invalid_targets() {
        let graph = science_graph();
        let resolver = Resolver::new(&graph, &everything);

        assert!(matches!(resolver.resolve(&[]), Err(PlannerError::NilPlanInput)));
        assert!(matches!(
            resolver.resolve(&[
                ProductionTarget::new("iron-plate", 30.0),
                ProductionTarget::new("copper-plate", -1.0),
            ]),
            Err(PlannerError::InvalidTarget { .. })
        ));
        assert!(matches!(
            resolver.resolve(&[ProductionTarget::new("iron-plate", f64::NAN)]),
            Err(PlannerError::InvalidTarget { .. })
        ));
        assert!(matches!(
            resolver.resolve(&[ProductionTarget::new("", 1.0)]),
            Err(PlannerError::InvalidTarget { .. })
        ));
    }

    #[test]
    fn diamond_dependencies_merge_demand() {
        let graph = graph(vec![
            Recipe::new("gear", 1.0, Category::Crafting)
                .input("plate", 2.0)
                .output("gear", 1.0),
            Recipe::new("widget", 1.0, Category::Crafting)
                .input("gear", 1.0)
                .output("widget", 1.0),
            Recipe::new("gadget", 1.0, Category::Crafting)
                .input("gear", 2.0)
                .output("gadget", 1.0),
        ]);
        let resolver = Resolver::new(&graph, &everything);

        let widget = resolver.resolve(&[ProductionTarget::new("widget", 60.0)]).unwrap();
        let gadget = resolver.resolve(&[ProductionTarget::new("gadget", 60.0)]).unwrap();
        let both = resolver
            .resolve(&[
                ProductionTarget::new("widget", 60.0),
                ProductionTarget::new("gadget", 60.0),
            ])
            .unwrap();

        assert_eq!(widget.machine_count("gear"), 1);
        assert_eq!(gadget.machine_count("gear"), 2);
        assert_eq!(both.machine_count("gear"), 3);
        assert_close(both.flow("plate"), widget.flow("plate") + gadget.flow("plate"));
    }

    #[test]
    fn duplicate_targets_are_merged() {
        let graph = science_graph();
        let resolver = Resolver::new(&graph, &everything);
        let twice = resolver
            .resolve(&[
                ProductionTarget::new("iron-plate", 30.0),
                ProductionTarget::new("iron-plate", 30.0),
            ])
            .unwrap();
        let once = resolver.resolve(&[ProductionTarget::new("iron-plate", 60.0)]).unwrap();
        assert_eq!(twice.required_machines, once.required_machines);
        assert_eq!(twice.resource_flow, once.resource_flow);
    }

    #[test]
    fn two_recipe_cycle_terminates_and_is_flagged() {
        let graph = graph(vec![
            Recipe::new("a-from-b", 1.0, Category::Crafting)
                .input("b", 1.0)
                .output("a", 1.0),
            Recipe::new("b-from-a", 1.0, Category::Crafting)
                .input("a", 1.0)
                .output("b", 1.0),
        ]);
        let plan = Resolver::new(&graph, &everything)
            .resolve(&[ProductionTarget::new("a", 60.0)])
            .unwrap();

        assert!(plan.has_cycle);
        assert_eq!(plan.machine_count("a-from-b"), 1);
        assert_eq!(plan.machine_count("b-from-a"), 1);
        assert_close(plan.raw_materials["a"], 60.0);
    }

    #[test]
    fn locked_recipe_degrades_to_raw_demand() {
        let graph = graph(vec![
            Recipe::new("electronic-circuit", 0.5, Category::Crafting)
                .input("iron-plate", 1.0)
                .input("copper-cable", 3.0)
                .output("electronic-circuit", 1.0),
        ]);
        let research = ResearchProgress::from_level(ResearchLevel::None, &Default::default());
        let plan = Resolver::new(&graph, &research)
            .resolve(&[ProductionTarget::new("electronic-circuit", 120.0)])
            .unwrap();

        assert!(plan.required_machines.is_empty());
        assert_close(plan.raw_materials["electronic-circuit"], 120.0);
        assert_close(plan.flow("electronic-circuit"), 120.0);
        assert!(!plan.has_cycle);
    }

    fn gear_alternatives() -> RecipeGraph {
        graph(vec![
            Recipe::new("zeta-gear", 1.0, Category::Crafting)
                .input("plate", 1.0)
                .output("gear", 1.0),
            Recipe::new("alpha-gear", 1.0, Category::Crafting)
                .input("plate", 2.0)
                .output("gear", 1.0),
            Recipe::new("beta-gear", 1.0, Category::Crafting)
                .input("plate", 1.0)
                .output("gear", 1.0),
        ])
    }

    #[test]
    fn cheapest_recipe_wins_then_name_breaks_ties() {
        let graph = gear_alternatives();
        let plan = Resolver::new(&graph, &everything)
            .resolve(&[ProductionTarget::new("gear", 60.0)])
            .unwrap();
        // beta and zeta both cost one plate; alpha costs two.
        assert_eq!(plan.required_machines.keys().collect::<Vec<_>>(), vec!["beta-gear"]);
    }

    #[test]
    fn preference_overrides_cost() {
        let graph = gear_alternatives();
        let options = ResolverOptions::default().prefer("gear", "alpha-gear");
        let plan = Resolver::new(&graph, &everything)
            .with_options(options)
            .resolve(&[ProductionTarget::new("gear", 60.0)])
            .unwrap();
        assert_eq!(plan.machine_count("alpha-gear"), 1);
        assert_close(plan.flow("plate"), 120.0);
    }

    #[test]
    fn locked_alternatives_are_never_chosen() {
        let graph = gear_alternatives();
        let research = ResearchProgress::from_recipes(["alpha-gear", "zeta-gear"]);
        let options = ResolverOptions::default().prefer("gear", "beta-gear");
        let plan = Resolver::new(&graph, &research)
            .with_options(options)
            .resolve(&[ProductionTarget::new("gear", 60.0)])
            .unwrap();
        assert_eq!(plan.required_machines.keys().collect::<Vec<_>>(), vec!["zeta-gear"]);
    }

    #[test]
    fn raw_cost_looks_through_intermediates() {
        // "direct" needs 3 ore. "via-plate" needs 2 plates of 1 ore each.
        let graph = graph(vec![
            Recipe::new("direct", 1.0, Category::Crafting)
                .input("ore", 3.0)
                .output("rod", 1.0),
            Recipe::new("via-plate", 1.0, Category::Crafting)
                .input("plate", 2.0)
                .output("rod", 1.0),
            Recipe::new("plate", 1.0, Category::Smelting)
                .input("ore", 1.0)
                .output("plate", 1.0),
        ]);
        let plan = Resolver::new(&graph, &everything)
            .resolve(&[ProductionTarget::new("rod", 60.0)])
            .unwrap();
        assert_eq!(plan.machine_count("via-plate"), 1);
        assert_eq!(plan.machine_count("direct"), 0);
        assert_close(plan.flow("ore"), 120.0);
    }

    #[test]
    fn byproducts_reduce_upstream_demand() {
        let graph = graph(vec![
            Recipe::new("cracking", 1.0, Category::Chemistry)
                .input("crude", 1.0)
                .output("light", 1.0)
                .output("heavy", 1.0),
            Recipe::new("heavy-synthesis", 1.0, Category::Chemistry)
                .input("coal", 1.0)
                .output("heavy", 1.0),
        ]);
        let options = ResolverOptions::default().prefer("heavy", "heavy-synthesis");
        let plan = Resolver::new(&graph, &everything)
            .with_options(options)
            .resolve(&[
                ProductionTarget::new("heavy", 90.0),
                ProductionTarget::new("light", 60.0),
            ])
            .unwrap();

        assert_eq!(plan.machine_count("cracking"), 1);
        // Cracking already yields 60 heavy, so synthesis only covers 30.
        assert_close(plan.raw_materials["coal"], 30.0);
        assert_close(plan.raw_materials["crude"], 60.0);
        assert_close(plan.flow("heavy"), 120.0);
        assert_close(plan.surplus["heavy"], 30.0);
    }

    #[test]
    fn byproduct_only_demand_needs_no_extra_machines() {
        let graph = graph(vec![
            Recipe::new("separation", 1.0, Category::Chemistry)
                .input("ore", 1.0)
                .output("x", 1.0)
                .output("y", 1.0),
        ]);
        let plan = Resolver::new(&graph, &everything)
            .resolve(&[
                ProductionTarget::new("x", 60.0),
                ProductionTarget::new("y", 60.0),
            ])
            .unwrap();
        assert_eq!(plan.machine_count("separation"), 1);
        assert_close(plan.raw_materials["ore"], 60.0);
    }

    #[test]
    fn catalyst_loop_uses_net_yield() {
        let graph = graph(vec![
            Recipe::new("kovarex-enrichment-process", 60.0, Category::Centrifuging)
                .input("uranium-235", 40.0)
                .input("uranium-238", 5.0)
                .output("uranium-235", 41.0)
                .output("uranium-238", 2.0),
        ]);
        let plan = Resolver::new(&graph, &everything)
            .resolve(&[ProductionTarget::new("uranium-235", 60.0)])
            .unwrap();

        assert!(!plan.has_cycle);
        assert_eq!(plan.machine_count("kovarex-enrichment-process"), 60);
        assert_close(plan.raw_materials["uranium-238"], 180.0);
        assert!(!plan.raw_materials.contains_key("uranium-235"));
    }

    #[test]
    fn recipe_that_consumes_more_than_it_makes_is_skipped() {
        let graph = graph(vec![
            Recipe::new("lossy", 1.0, Category::Crafting)
                .input("x", 2.0)
                .output("x", 1.0),
        ]);
        let plan = Resolver::new(&graph, &everything)
            .resolve(&[ProductionTarget::new("x", 10.0)])
            .unwrap();
        assert!(plan.required_machines.is_empty());
        assert_close(plan.raw_materials["x"], 10.0);
    }

    #[test]
    fn huge_rates_still_cover_demand() {
        let graph = science_graph();
        let plan = Resolver::new(&graph, &everything)
            .resolve(&[
                ProductionTarget::new("iron-plate", 1e12),
                ProductionTarget::new("copper-plate", 1e12),
            ])
            .unwrap();

        assert!(plan.machine_count("iron-plate") > u64::from(u32::MAX));
        assert!(plan.flow("iron-plate") >= 1e12);
        assert!(plan.flow("copper-plate") >= 1e12);
        assert_eq!(
            plan.total_machines(),
            plan.machine_count("iron-plate") + plan.machine_count("copper-plate")
        );
    }

    #[test]
    fn uncountable_machine_total_is_an_error() {
        let graph = science_graph();
        let result = Resolver::new(&graph, &everything)
            .resolve(&[ProductionTarget::new("iron-plate", 1e30)]);
        assert!(matches!(
            result,
            Err(PlannerError::MachineCountOverflow { ref recipe, .. }) if recipe == "iron-plate"
        ));
    }

    /// `a` and `b` can each be made from the other or from ore.
    fn cyclic_alternatives() -> RecipeGraph {
        graph(vec![
            Recipe::new("a1", 1.0, Category::Crafting)
                .input("b", 1.0)
                .output("a", 1.0),
            Recipe::new("a2", 1.0, Category::Crafting)
                .input("ore", 3.0)
                .output("a", 1.0),
            Recipe::new("b1", 1.0, Category::Crafting)
                .input("a", 1.0)
                .output("b", 1.0),
            Recipe::new("b2", 1.0, Category::Crafting)
                .input("ore", 1.0)
                .output("b", 1.0),
        ])
    }

    #[test]
    fn recipes_feeding_on_their_own_product_lose_to_acyclic_ones() {
        let graph = cyclic_alternatives();
        for max_cost_depth in [ResolverOptions::default().max_cost_depth, 1] {
            let options = ResolverOptions {
                max_cost_depth,
                ..ResolverOptions::default()
            };
            let plan = Resolver::new(&graph, &everything)
                .with_options(options)
                .resolve(&[ProductionTarget::new("a", 60.0)])
                .unwrap();

            assert_eq!(
                plan.required_machines.keys().collect::<Vec<_>>(),
                vec!["a1", "b2"],
                "max_cost_depth {}",
                max_cost_depth
            );
            assert!(!plan.has_cycle);
            assert_eq!(plan.raw_materials.keys().collect::<Vec<_>>(), vec!["ore"]);
            assert_close(plan.raw_materials["ore"], 60.0);
        }
    }

    #[test]
    fn shallow_cost_estimates_terminate_and_repeat() {
        let (graph, _) = sample::catalog().unwrap();
        let targets: Vec<_> = SAMPLE_ITEMS
            .iter()
            .map(|item| ProductionTarget::new(*item, 45.0))
            .collect();

        for max_cost_depth in [0, 1, 2] {
            let options = ResolverOptions {
                max_cost_depth,
                ..ResolverOptions::default()
            };
            let resolver = Resolver::new(&graph, &everything).with_options(options);
            let first = resolver.resolve(&targets).unwrap();
            let second = resolver.resolve(&targets).unwrap();
            assert_eq!(first, second);
            for target in &targets {
                assert!(first.flow(&target.item) >= target.rate - 1e-6, "{}", target.item);
            }
        }
    }

    #[test]
    fn iteration_cap_aborts_without_a_plan() {
        let graph = science_graph();
        let options = ResolverOptions {
            max_iterations: 3,
            ..ResolverOptions::default()
        };
        let result = Resolver::new(&graph, &everything)
            .with_options(options)
            .resolve(&[ProductionTarget::new("automation-science-pack", 60.0)]);
        assert!(matches!(result, Err(PlannerError::IterationLimit { limit: 3 })));
    }

    #[test]
    fn long_chains_do_not_overflow() {
        let depth = 500;
        let recipes = (0..depth)
            .map(|i| {
                Recipe::new(format!("step-{}", i), 1.0, Category::Crafting)
                    .input(format!("item-{}", i + 1), 1.0)
                    .output(format!("item-{}", i), 1.0)
            })
            .collect();
        let graph = graph(recipes);
        let plan = Resolver::new(&graph, &everything)
            .resolve(&[ProductionTarget::new("item-0", 60.0)])
            .unwrap();
        assert_eq!(plan.required_machines.len(), depth);
        assert_close(plan.raw_materials[&format!("item-{}", depth)], 60.0);
    }

    #[test]
    fn resolutions_share_the_catalog_across_threads() {
        let (graph, tree) = sample::catalog().unwrap();
        let research = ResearchProgress::from_level(ResearchLevel::EarlyGame, &tree);
        let targets = vec![
            ProductionTarget::new("automation-science-pack", 60.0),
            ProductionTarget::new("electronic-circuit", 90.0),
        ];

        let plans: Vec<ProductionPlan> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| Resolver::new(&graph, &research).resolve(&targets).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for plan in &plans[1..] {
            assert_eq!(plan, &plans[0]);
        }
    }

    const SAMPLE_ITEMS: [&str; 8] = [
        "automation-science-pack",
        "logistic-science-pack",
        "electronic-circuit",
        "iron-gear-wheel",
        "steel-plate",
        "plastic-bar",
        "petroleum-gas",
        "inserter",
    ];

    fn arb_targets() -> impl Strategy<Value = Vec<ProductionTarget>> {
        prop::collection::vec((0..SAMPLE_ITEMS.len(), 0.0f64..600.0), 1..5).prop_map(|picks| {
            picks
                .into_iter()
                .map(|(i, rate)| ProductionTarget::new(SAMPLE_ITEMS[i], rate))
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Doubling every rate never lowers a machine count or a flow.
        #[test]
        fn doubling_targets_is_monotonic(targets in arb_targets()) {
            let (graph, _) = sample::catalog().unwrap();
            let resolver = Resolver::new(&graph, &everything);
            let base = resolver.resolve(&targets).unwrap();
            let doubled: Vec<_> = targets
                .iter()
                .map(|t| ProductionTarget::new(t.item.clone(), t.rate * 2.0))
                .collect();
            let bigger = resolver.resolve(&doubled).unwrap();

            for (recipe, count) in &base.required_machines {
                prop_assert!(bigger.machine_count(recipe) >= *count, "{} shrank", recipe);
            }
            for (item, rate) in &base.resource_flow {
                prop_assert!(bigger.flow(item) >= *rate, "{} flow shrank", item);
            }
        }

        /// Identical inputs give byte-identical plans.
        #[test]
        fn resolution_is_deterministic(targets in arb_targets()) {
            let (graph, tree) = sample::catalog().unwrap();
            let research = ResearchProgress::from_level(ResearchLevel::EarlyGame, &tree);
            let first = Resolver::new(&graph, &research).resolve(&targets).unwrap();
            let second = Resolver::new(&graph, &research).resolve(&targets).unwrap();
            prop_assert_eq!(
                serde_json::to_string(&first).unwrap(),
                serde_json::to_string(&second).unwrap()
            );
        }
    }
}
