//! Factorio Production Planner
//!
//! Command-line front end: manages the recipe catalog database and prints
//! production plans.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing::info;
use tracing_subscriber::EnvFilter;

use factory_planner::research::{ResearchLevel, ResearchProgress};
use factory_planner::resolver::{Resolver, ResolverOptions};
use factory_planner::{db, extract, sample, summary, target};

#[derive(Parser)]
#[command(name = "factory-planner")]
#[command(about = "Production chain planner for Factorio")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, env = "FACTORY_PLANNER_DB", default_value = "factory_data.db")]
    database: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract recipes and technologies from Factorio Lua prototypes
    Extract {
        /// Path to the game's data directory (e.g. data/base/prototypes)
        data_dir: PathBuf,

        /// Clear existing data before extraction
        #[arg(long)]
        clear: bool,
    },

    /// Plan a factory for one or more target rates
    Plan {
        /// Target as item:rate[/unit], unit one of s, min, h (default min)
        #[arg(short, long = "target", required = true)]
        targets: Vec<String>,

        /// Research preset: none, basic-science, early-game, all
        #[arg(short, long, default_value = "all")]
        research: String,

        /// Additional researched technology (prerequisites included)
        #[arg(long = "tech")]
        technologies: Vec<String>,

        /// Force a recipe for an item, as item=recipe
        #[arg(short, long = "prefer")]
        preferences: Vec<String>,

        /// Write the plan as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Show per-recipe rates
        #[arg(short, long)]
        verbose: bool,
    },

    /// List all recipes in the database
    ListRecipes,

    /// List all items in the database
    ListItems,

    /// List all technologies in the database
    ListTechnologies,

    /// Show details for a specific recipe
    Recipe {
        /// Recipe name
        name: String,
    },

    /// Initialize empty database with schema
    Init,

    /// Load the built-in vanilla catalog (without game data files)
    LoadSample,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let conn = Connection::open(&cli.database)
        .with_context(|| format!("opening database {}", cli.database.display()))?;
    db::init_schema(&conn).context("initializing schema")?;

    match cli.command {
        Commands::Extract { data_dir, clear } => {
            if clear {
                info!("clearing existing catalog");
                db::clear_catalog(&conn)?;
            }

            let stats = extract::extract_to_database(&conn, &data_dir)
                .with_context(|| format!("extracting from {}", data_dir.display()))?;
            println!("{}", stats);
        }

        Commands::Plan {
            targets,
            research,
            technologies,
            preferences,
            output,
            verbose,
        } => {
            let targets = targets
                .iter()
                .map(|t| target::parse_target(t))
                .collect::<Result<Vec<_>, _>>()?;

            let mut options = ResolverOptions::default();
            for text in &preferences {
                let (item, recipe) = target::parse_preference(text)?;
                options = options.prefer(item, recipe);
            }

            let graph = db::load_recipe_graph(&conn).context("loading recipes")?;
            if graph.is_empty() {
                println!("No recipes in database. Run 'extract' or 'load-sample' first.");
                return Ok(());
            }
            let tree = db::load_tech_tree(&conn).context("loading technologies")?;

            let level: ResearchLevel = research.parse()?;
            let mut progress = ResearchProgress::from_level(level, &tree);
            for tech in &technologies {
                progress.unlock_technology(&tree, tech)?;
            }

            let resolver = Resolver::new(&graph, &progress).with_options(options);
            let plan = resolver.resolve(&targets)?;

            if verbose {
                println!("Production chain:\n");
                println!("{}", summary::format_plan_details(&plan, &graph));
            }
            println!("{}", summary::summarize_plan(&plan, resolver.power_model()));

            if let Some(path) = output {
                let json = serde_json::to_string_pretty(&plan)?;
                fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
                info!(path = %path.display(), "plan written");
            }
        }

        Commands::ListRecipes => {
            let recipes = db::list_recipes(&conn)?;
            if recipes.is_empty() {
                println!("No recipes in database. Run 'extract' or 'load-sample' first.");
            } else {
                println!("{:<34} {:<20} {:>8}", "Recipe", "Category", "Time (s)");
                println!("{}", "-".repeat(64));
                for r in recipes {
                    println!("{:<34} {:<20} {:>8.2}", r.name, r.category, r.crafting_time);
                }
            }
        }

        Commands::ListItems => {
            let items = db::list_items(&conn)?;
            if items.is_empty() {
                // Extracted catalogs carry no item metadata, only names.
                let graph = db::load_recipe_graph(&conn)?;
                if graph.is_empty() {
                    println!("No items in database. Run 'extract' or 'load-sample' first.");
                }
                for name in graph.items() {
                    println!("{}", name);
                }
            } else {
                println!("{:<30} {:<14} {:>6} {:>10}", "Item", "Kind", "Stack", "Fuel (MJ)");
                println!("{}", "-".repeat(63));
                for item in items {
                    let stack = item.stack_size().map(|n| n.to_string()).unwrap_or_default();
                    let fuel = item.fuel_value().map(|mj| format!("{:.1}", mj)).unwrap_or_default();
                    println!(
                        "{:<30} {:<14} {:>6} {:>10}",
                        item.name,
                        item.kind.as_str(),
                        stack,
                        fuel
                    );
                }
            }
        }

        Commands::ListTechnologies => {
            let tree = db::load_tech_tree(&conn)?;
            if tree.technologies().next().is_none() {
                println!("No technologies in database. Run 'extract' or 'load-sample' first.");
            } else {
                for tech in tree.technologies() {
                    println!("{}", tech.name);
                    if !tech.prerequisites.is_empty() {
                        println!("  requires: {}", tech.prerequisites.join(", "));
                    }
                    if !tech.unlocks.is_empty() {
                        println!("  unlocks:  {}", tech.unlocks.join(", "));
                    }
                }
            }
        }

        Commands::Recipe { name } => {
            let graph = db::load_recipe_graph(&conn)?;
            let tree = db::load_tech_tree(&conn)?;
            match graph.recipe(&name) {
                Ok(r) => {
                    println!("Recipe: {}", r.name);
                    println!("  Category: {}", r.category);
                    println!("  Time: {}s", r.crafting_time);
                    if tree.starter_recipes().contains(&r.name) {
                        println!("  Available from start");
                    } else if let Some(tech) = tree.unlocked_by(&r.name) {
                        println!("  Unlocked by: {}", tech.name);
                    }

                    println!("  Inputs:");
                    for (item, qty) in &r.inputs {
                        println!("    {} x {}", qty, item);
                    }
                    println!("  Outputs:");
                    for (item, qty) in &r.outputs {
                        let others: Vec<_> = graph
                            .producers_of(item)
                            .into_iter()
                            .filter(|p| p.name != r.name)
                            .map(|p| p.name.as_str())
                            .collect();
                        if others.is_empty() {
                            println!("    {} x {}", qty, item);
                        } else {
                            println!("    {} x {} (also from: {})", qty, item, others.join(", "));
                        }
                    }

                    let consumers: Vec<_> = r
                        .outputs
                        .iter()
                        .flat_map(|(item, _)| graph.consumers_of(item))
                        .map(|c| c.name.as_str())
                        .collect();
                    if !consumers.is_empty() {
                        println!("  Used by: {}", consumers.join(", "));
                    }
                }
                Err(_) => println!("Recipe '{}' not found", name),
            }
        }

        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::LoadSample => {
            sample::load_into(&conn)?;
            println!("Sample data loaded successfully!");
        }
    }

    Ok(())
}
