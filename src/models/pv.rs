//! Records of the PV site registry as stored in the remote tables.
//!
//! Notes
//! - Column names match the store (`sites_mapping`, `clients_mapping`), so rows decode directly.
//! - Nullable columns are `Option`; `nominal_power` is kWp.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Client label for sites whose `client_map_id` is null or does not resolve.
pub const UNASSIGNED: &str = "Unassigned";
/// Client selector value meaning "do not filter by client".
pub const ALL_CLIENTS: &str = "All";

/// Columns requested for the sites working set.
pub const SITE_COLUMNS: &[&str] = &[
    "id",
    "name",
    "code",
    "nominal_power",
    "address",
    "commission_date",
    "client_map_id",
    "ignore_site",
];
pub const CLIENT_COLUMNS: &[&str] = &["id", "name"];

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(pub i64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub i64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: SiteId,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub nominal_power: Option<f64>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub commission_date: Option<NaiveDate>,
    #[serde(default)]
    pub client_map_id: Option<ClientId>,
    #[serde(default)]
    pub ignore_site: bool,
}

impl Site {
    /// Nominal power used for filtering and form defaults: absent counts as 0 kWp.
    pub fn effective_power(&self) -> f64 {
        self.nominal_power.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
}

/// Client id → name lookup that keeps the order the store returned (by name).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientNames {
    ordered: Vec<Client>,
    by_id: HashMap<ClientId, usize>,
}

impl ClientNames {
    pub fn name(&self, id: ClientId) -> Option<&str> {
        self.by_id.get(&id).map(|&i| self.ordered[i].name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Client> {
        self.ordered.iter()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

impl FromIterator<Client> for ClientNames {
    fn from_iter<I: IntoIterator<Item = Client>>(iter: I) -> Self {
        let mut names = ClientNames::default();
        for client in iter {
            // a repeated id keeps its first name
            if names.by_id.contains_key(&client.id) {
                continue;
            }
            names.by_id.insert(client.id, names.ordered.len());
            names.ordered.push(client);
        }
        names
    }
}

/// A site joined with its resolved client name.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteView {
    pub site: Site,
    pub client_name: String,
}

impl SiteView {
    pub fn effective_power(&self) -> f64 {
        self.site.effective_power()
    }
}

/// Partial update of a site row. `None` leaves a column untouched; for nullable
/// columns `Some(None)` writes `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SitePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nominal_power: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commission_date: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_map_id: Option<Option<ClientId>>,
}

#[cfg(test)]
impl SitePatch {
    pub fn is_empty(&self) -> bool {
        *self == SitePatch::default()
    }

    /// Apply the patch to a local row, mirroring what the store does on update.
    pub fn apply_to(&self, site: &mut Site) {
        if let Some(name) = &self.name {
            site.name = name.clone();
        }
        if let Some(code) = &self.code {
            site.code = code.clone();
        }
        if let Some(power) = self.nominal_power {
            site.nominal_power = power;
        }
        if let Some(address) = &self.address {
            site.address = address.clone();
        }
        if let Some(date) = self.commission_date {
            site.commission_date = date;
        }
        if let Some(client) = self.client_map_id {
            site.client_map_id = client;
        }
    }
}

/// Insert payload; the store assigns `id` and defaults `ignore_site`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSite {
    pub name: String,
    pub code: Option<String>,
    pub nominal_power: Option<f64>,
    pub address: Option<String>,
    pub commission_date: Option<NaiveDate>,
    pub client_map_id: Option<ClientId>,
}

#[cfg(test)]
impl NewSite {
    pub fn named(name: impl Into<String>) -> Self {
        NewSite {
            name: name.into(),
            code: None,
            nominal_power: None,
            address: None,
            commission_date: None,
            client_map_id: None,
        }
    }
}
