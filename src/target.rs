//! Command-line target and preference syntax

use regex::Regex;

use crate::error::{PlannerError, Result};
use crate::models::ProductionTarget;

/// Parse `item:rate[/unit]` into a per-minute target.
///
/// Units are `s`/`sec`, `min`/`m` and `h`/`hour`; without one the rate is
/// per minute.
pub fn parse_target(text: &str) -> Result<ProductionTarget> {
    let pattern = Regex::new(
        r"^\s*([\w-]+)\s*:\s*(\d+(?:\.\d*)?|\.\d+)\s*(?:/\s*(s|sec|min|m|h|hour))?\s*$",
    )?;
    let caps = pattern.captures(text).ok_or_else(|| {
        PlannerError::invalid_target(text, "expected item:rate with optional /s, /min or /h")
    })?;

    let rate: f64 = caps[2]
        .parse()
        .map_err(|e| PlannerError::invalid_target(text, format!("bad rate: {}", e)))?;
    let per_minute = match caps.get(3).map(|m| m.as_str()) {
        Some("s" | "sec") => rate * 60.0,
        Some("h" | "hour") => rate / 60.0,
        _ => rate,
    };
    Ok(ProductionTarget::new(&caps[1], per_minute))
}

/// Parse `item=recipe` into a recipe preference.
pub fn parse_preference(text: &str) -> Result<(String, String)> {
    match text.split_once('=') {
        Some((item, recipe)) if !item.trim().is_empty() && !recipe.trim().is_empty() => {
            Ok((item.trim().to_string(), recipe.trim().to_string()))
        }
        _ => Err(PlannerError::invalid_target(text, "expected item=recipe")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units_convert_to_per_minute() {
        assert_eq!(
            parse_target("automation-science-pack:60").unwrap(),
            ProductionTarget::new("automation-science-pack", 60.0)
        );
        assert_eq!(parse_target("iron-plate:1/s").unwrap().rate, 60.0);
        assert_eq!(parse_target("iron-plate:0.5/sec").unwrap().rate, 30.0);
        assert_eq!(parse_target("iron-plate:45/min").unwrap().rate, 45.0);
        assert_eq!(parse_target(" plastic-bar : 120 / h ").unwrap().rate, 2.0);
        assert_eq!(parse_target("steel-plate:.5/m").unwrap().rate, 0.5);
    }

    #[test]
    fn malformed_targets_are_rejected() {
        for bad in [
            "",
            "iron-plate",
            "iron-plate:",
            ":60",
            "iron-plate:-1",
            "iron-plate:1/day",
            "a:b",
        ] {
            assert!(
                matches!(parse_target(bad), Err(PlannerError::InvalidTarget { .. })),
                "{:?} should not parse",
                bad
            );
        }
    }

    #[test]
    fn preferences_split_on_equals() {
        assert_eq!(
            parse_preference("petroleum-gas=advanced-oil-processing").unwrap(),
            ("petroleum-gas".to_string(), "advanced-oil-processing".to_string())
        );
        assert!(parse_preference("petroleum-gas").is_err());
        assert!(parse_preference("=advanced-oil-processing").is_err());
    }
}
