//! One dashboard interaction: load (cached) data, join, filter, render; or submit a form.

use crate::cache::{Clock, DashboardError, SiteStore};
use crate::client::SiteGateway;
use crate::models::pv::{ClientId, SiteId, SiteView};
use crate::services::assembly::assemble;
use crate::services::export::{render_table, write_csv};
use crate::services::filter::{ClientSelector, PowerRange, SiteFilter, apply_filter, client_options};
use crate::services::forms::{AddSiteForm, EditSiteForm, client_choices, site_label};
use chrono::NaiveDate;
use log::{info, warn};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

pub const NO_SITES_MESSAGE: &str = "No sites found in the database.";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListRequest {
    /// Exact client name, or `None` for all clients.
    pub client: Option<String>,
    pub min_power: Option<f64>,
    pub max_power: Option<f64>,
    pub csv: Option<PathBuf>,
}

/// Field overrides applied on top of the pre-filled edit form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditRequest {
    pub id: Option<SiteId>,
    pub name: Option<String>,
    pub code: Option<String>,
    pub power: Option<f64>,
    pub address: Option<String>,
    /// `Some(None)` clears the date.
    pub commission_date: Option<Option<NaiveDate>>,
}

pub struct Dashboard<G, C> {
    store: SiteStore<G, C>,
}

impl<G: SiteGateway, C: Clock> Dashboard<G, C> {
    pub fn new(store: SiteStore<G, C>) -> Self {
        Dashboard { store }
    }

    #[cfg(test)]
    pub fn store(&self) -> &SiteStore<G, C> {
        &self.store
    }

    /// Working set joined with client names; `None` when the store holds no site.
    fn load_views(&self) -> Result<Option<Vec<SiteView>>, DashboardError> {
        let sites = self.store.get_sites()?;
        let clients = self.store.get_clients()?;
        if sites.is_empty() {
            return Ok(None);
        }
        Ok(Some(assemble(&sites, &clients)))
    }

    pub fn list<W: Write>(&self, out: &mut W, req: &ListRequest) -> Result<(), DashboardError> {
        let Some(views) = self.load_views()? else {
            writeln!(out, "{}", NO_SITES_MESSAGE)?;
            return Ok(());
        };

        let client = req
            .client
            .as_deref()
            .map(ClientSelector::parse)
            .unwrap_or_default();
        if let ClientSelector::Named(name) = &client
            && !client_options(&views).contains(name)
        {
            warn!("No site is assigned to client '{}'", name);
        }
        let bounds = PowerRange::covering(&views);
        let filter = SiteFilter {
            client,
            power: PowerRange {
                min: req.min_power.unwrap_or(bounds.min),
                max: req.max_power.unwrap_or(bounds.max),
            },
        };
        let shown = apply_filter(&views, &filter);

        match &req.csv {
            Some(path) => {
                let file = File::create(path)?;
                write_csv(&mut BufWriter::new(file), &shown)?;
                info!("Exported {} site(s) to {}", shown.len(), path.display());
                writeln!(out, "Exported {} site(s) to {}", shown.len(), path.display())?;
            }
            None => render_table(out, &shown)?,
        }
        Ok(())
    }

    pub fn clients<W: Write>(&self, out: &mut W) -> Result<(), DashboardError> {
        let clients = self.store.get_clients()?;
        for (id, name) in client_choices(&clients) {
            match id {
                Some(id) => writeln!(out, "{:>6}  {}", id.0, name)?,
                None => writeln!(out, "{:>6}  {}", "none", name)?,
            }
        }
        Ok(())
    }

    pub fn edit<W: Write>(&self, out: &mut W, req: &EditRequest) -> Result<(), DashboardError> {
        let id = req
            .id
            .ok_or_else(|| DashboardError::Validation("A site id is required".to_string()))?;
        let Some(views) = self.load_views()? else {
            writeln!(out, "{}", NO_SITES_MESSAGE)?;
            return Ok(());
        };
        let view = views
            .iter()
            .find(|v| v.site.id == id)
            .ok_or(DashboardError::SiteNotFound(id))?;

        let mut form = EditSiteForm::prefill(view);
        if let Some(name) = &req.name {
            form.name = name.clone();
        }
        if let Some(code) = &req.code {
            form.code = code.clone();
        }
        if let Some(power) = req.power {
            form.power = power;
        }
        if let Some(address) = &req.address {
            form.address = address.clone();
        }
        if let Some(date) = req.commission_date {
            form.commission_date = date;
        }

        info!("Saving {}", site_label(view));
        let name = form.name.trim().to_string();
        self.store.update_site(id, &form.into_patch())?;
        writeln!(out, "Site '{}' updated", name)?;
        Ok(())
    }

    pub fn add<W: Write>(&self, out: &mut W, form: AddSiteForm) -> Result<(), DashboardError> {
        let site = form.into_new_site()?;
        if let Some(id) = site.client_map_id {
            self.ensure_client(id)?;
        }
        self.store.insert_site(&site)?;
        writeln!(out, "Site '{}' added", site.name)?;
        Ok(())
    }

    fn ensure_client(&self, id: ClientId) -> Result<(), DashboardError> {
        match self.store.get_clients()?.name(id) {
            Some(_) => Ok(()),
            None => Err(DashboardError::Validation(format!("Unknown client id {}", id.0))),
        }
    }
}
