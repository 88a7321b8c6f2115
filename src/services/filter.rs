//! Narrowing of the assembled site list by client and power range.
//!
//! Both predicates are combined with AND and the input order is preserved.
//! Power comparisons use `effective_power`, so sites without a nominal power count as 0 kWp.

use crate::models::pv::{ALL_CLIENTS, SiteView};
use std::collections::BTreeSet;

/// Upper power bound used when nothing better is known.
pub const FALLBACK_MAX_POWER: f64 = 10_000.0;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ClientSelector {
    #[default]
    All,
    Named(String),
}

impl ClientSelector {
    /// `"All"` selects every client; anything else is an exact client name.
    pub fn parse(value: &str) -> Self {
        if value == ALL_CLIENTS {
            ClientSelector::All
        } else {
            ClientSelector::Named(value.to_string())
        }
    }

    pub fn matches(&self, client_name: &str) -> bool {
        match self {
            ClientSelector::All => true,
            ClientSelector::Named(name) => name == client_name,
        }
    }
}

/// Inclusive kWp range. `min > max` is kept as given and matches nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerRange {
    pub min: f64,
    pub max: f64,
}

impl PowerRange {
    /// `[0, default_max_power(views)]`.
    pub fn covering(views: &[SiteView]) -> Self {
        PowerRange {
            min: 0.0,
            max: default_max_power(views),
        }
    }

    pub fn contains(&self, power: f64) -> bool {
        self.min <= power && power <= self.max
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SiteFilter {
    pub client: ClientSelector,
    pub power: PowerRange,
}

impl SiteFilter {
    pub fn matches(&self, view: &SiteView) -> bool {
        self.client.matches(&view.client_name) && self.power.contains(view.effective_power())
    }
}

pub fn apply_filter<'a>(views: &'a [SiteView], filter: &SiteFilter) -> Vec<&'a SiteView> {
    views.iter().filter(|v| filter.matches(v)).collect()
}

/// Largest nominal power in the unfiltered list; `FALLBACK_MAX_POWER` when the list is empty
/// or no site has a power value.
pub fn default_max_power(views: &[SiteView]) -> f64 {
    views
        .iter()
        .filter_map(|v| v.site.nominal_power)
        .fold(None, |acc: Option<f64>, p| Some(acc.map_or(p, |m| m.max(p))))
        .unwrap_or(FALLBACK_MAX_POWER)
}

/// Choices for the client selector: "All" first, then every resolved name once, sorted.
pub fn client_options(views: &[SiteView]) -> Vec<String> {
    let names: BTreeSet<&str> = views.iter().map(|v| v.client_name.as_str()).collect();
    std::iter::once(ALL_CLIENTS)
        .chain(names)
        .map(str::to_string)
        .collect()
}
