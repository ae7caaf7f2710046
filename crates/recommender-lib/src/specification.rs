//! Specification catalogs and matching
//!
//! Snaps a raw multi-dimensional recommendation onto the nearest feasible
//! entry of an ordered catalog of discrete resource tiers. Catalogs are
//! configured either in the compact `<cores>c<GiB>g` comma-separated form
//! (e.g. `0.5c1g,1c2g`) or as a JSON array of named vectors.

use crate::error::{RecommenderError, Result};
use crate::models::{DimensionSet, Specification};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Built-in tier ladder used when no `specification-config` is supplied
const DEFAULT_CATALOG: &str = "0.25c0.25g,0.25c0.5g,0.25c1g,0.5c0.5g,0.5c1g,\
                               1c1g,1c2g,1c4g,1c8g,2c2g,2c4g,2c8g,2c16g,\
                               4c4g,4c8g,4c16g,4c32g,8c8g,8c16g,8c32g,8c64g,\
                               16c32g,16c64g,16c128g,32c64g,32c128g,32c256g,\
                               64c128g,64c256g";

pub fn default_catalog() -> Vec<Specification> {
    parse_compact(DEFAULT_CATALOG).expect("built-in catalog must parse")
}

/// Parse a catalog string; a leading `[` selects the JSON form.
pub fn parse_catalog(raw: &str) -> Result<Vec<Specification>> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).map_err(|e| {
            RecommenderError::configuration("specification-config", format!("invalid JSON catalog: {e}"))
        })
    } else {
        parse_compact(trimmed)
    }
}

fn parse_compact(raw: &str) -> Result<Vec<Specification>> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            parse_compact_entry(token).ok_or_else(|| {
                RecommenderError::configuration(
                    "specification-config",
                    format!("`{token}` is not of the form `<cores>c<GiB>g`"),
                )
            })
        })
        .collect()
}

fn parse_compact_entry(token: &str) -> Option<Specification> {
    let (cpu_part, rest) = token.split_once('c')?;
    let mem_part = rest.strip_suffix('g')?;
    let cpu: f64 = cpu_part.parse().ok()?;
    let memory_gib: f64 = mem_part.parse().ok()?;
    if cpu <= 0.0 || memory_gib <= 0.0 {
        return None;
    }
    Some(Specification {
        name: token.to_string(),
        cpu,
        memory: memory_gib * GIB,
        accelerator_compute: None,
        accelerator_memory: None,
    })
}

/// Select the catalog entry dominating the raw vector with the smallest
/// surplus.
///
/// An entry is eligible when its capacity is >= the raw value in every
/// demanded dimension; entries without accelerator capacity are ineligible
/// when accelerator demand exists. Among eligible entries the one with the
/// smallest total surplus wins, each dimension's surplus normalized by the
/// raw demand so cores and bytes weigh comparably; ties go to the earliest
/// entry in the configured order.
pub fn match_specification<'a>(
    raw: &DimensionSet<Option<f64>>,
    specs: &'a [Specification],
) -> Result<&'a Specification> {
    let mut best: Option<(&Specification, f64)> = None;
    for spec in specs {
        let Some(surplus) = surplus_over(raw, spec) else {
            continue;
        };
        match best {
            Some((_, best_surplus)) if surplus >= best_surplus => {}
            _ => best = Some((spec, surplus)),
        }
    }
    best.map(|(spec, _)| spec)
        .ok_or(RecommenderError::NoFeasibleSpecification)
}

/// Normalized total surplus of `spec` over the demanded dimensions, or
/// `None` when the entry does not dominate the raw vector.
fn surplus_over(raw: &DimensionSet<Option<f64>>, spec: &Specification) -> Option<f64> {
    let mut total = 0.0;
    for (dimension, demand) in raw.iter() {
        let Some(demand) = *demand else {
            continue;
        };
        let capacity = spec.capacity(dimension)?;
        if capacity < demand {
            return None;
        }
        if demand > 0.0 {
            total += (capacity - demand) / demand;
        }
    }
    Some(total)
}
