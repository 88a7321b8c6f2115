//! Read-through caching of the two reference queries, with invalidation on write.
//!
//! Each read function owns exactly one slot (there is one query shape per function).
//! An entry is served while its age is below the slot's TTL and never afterwards;
//! writes to the sites table evict the sites slot so the next read goes to the store.

use crate::client::{GatewayError, SiteGateway};
use crate::models::pv::{ClientNames, NewSite, Site, SiteId, SitePatch};
use log::{debug, info, warn};
use std::cell::RefCell;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::rc::Rc;
use std::time::{Duration, Instant};

pub const DEFAULT_SITES_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_CLIENTS_TTL: Duration = Duration::from_secs(300);

/// Errors surfaced to the user by a dashboard interaction.
#[derive(Debug)]
pub enum DashboardError {
    /// The store rejected the request or could not be reached
    Gateway(GatewayError),
    /// Input rejected before any network call
    Validation(String),
    /// The requested site is not part of the current working set
    SiteNotFound(SiteId),
    /// Writing output or an export file failed
    Io(std::io::Error),
}

impl Display for DashboardError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DashboardError::Gateway(e) => write!(f, "store error: {}", e),
            DashboardError::Validation(msg) => write!(f, "{}", msg),
            DashboardError::SiteNotFound(id) => write!(f, "site {} not found", id.0),
            DashboardError::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl Error for DashboardError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DashboardError::Gateway(e) => Some(e),
            DashboardError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GatewayError> for DashboardError {
    fn from(value: GatewayError) -> Self {
        DashboardError::Gateway(value)
    }
}

impl From<std::io::Error> for DashboardError {
    fn from(value: std::io::Error) -> Self {
        DashboardError::Io(value)
    }
}

/// Time source for cache expiry.
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug)]
struct Entry<T> {
    value: Rc<T>,
    stored_at: Instant,
}

/// Single-slot memo with a time-to-live.
#[derive(Debug)]
pub struct TtlSlot<T> {
    name: &'static str,
    ttl: Duration,
    entry: RefCell<Option<Entry<T>>>,
}

impl<T> TtlSlot<T> {
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        TtlSlot {
            name,
            ttl,
            entry: RefCell::new(None),
        }
    }

    /// Cached value if younger than the TTL, otherwise the result of `fetch`, which is stored.
    /// A failed fetch leaves the slot empty and is returned as-is.
    pub fn get_or_fetch<E>(&self, now: Instant, fetch: impl FnOnce() -> Result<T, E>) -> Result<Rc<T>, E> {
        if let Some(entry) = self.entry.borrow().as_ref() {
            let age = now.saturating_duration_since(entry.stored_at);
            if age < self.ttl {
                debug!("Cache hit: {} (age {}ms)", self.name, age.as_millis());
                return Ok(Rc::clone(&entry.value));
            }
        }

        debug!("Cache miss: {}", self.name);
        self.entry.borrow_mut().take();
        let value = Rc::new(fetch()?);
        *self.entry.borrow_mut() = Some(Entry {
            value: Rc::clone(&value),
            stored_at: now,
        });
        Ok(value)
    }

    pub fn invalidate(&self) {
        if self.entry.borrow_mut().take().is_some() {
            debug!("Cache invalidated: {}", self.name);
        }
    }

    #[cfg(test)]
    pub fn is_populated(&self) -> bool {
        self.entry.borrow().is_some()
    }
}

/// Gateway access for the dashboard: cached reads and invalidating writes.
pub struct SiteStore<G, C = SystemClock> {
    gateway: G,
    clock: C,
    sites: TtlSlot<Vec<Site>>,
    clients: TtlSlot<ClientNames>,
}

impl<G: SiteGateway> SiteStore<G> {
    pub fn new(gateway: G, sites_ttl: Duration, clients_ttl: Duration) -> Self {
        SiteStore::with_clock(gateway, SystemClock, sites_ttl, clients_ttl)
    }
}

impl<G: SiteGateway, C: Clock> SiteStore<G, C> {
    pub fn with_clock(gateway: G, clock: C, sites_ttl: Duration, clients_ttl: Duration) -> Self {
        SiteStore {
            gateway,
            clock,
            sites: TtlSlot::new("sites", sites_ttl),
            clients: TtlSlot::new("clients", clients_ttl),
        }
    }

    #[cfg(test)]
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Working set of sites, ordered by name. Rows flagged `ignore_site` never enter it.
    pub fn get_sites(&self) -> Result<Rc<Vec<Site>>, GatewayError> {
        self.sites.get_or_fetch(self.clock.now(), || {
            let mut sites = self.gateway.select_sites()?;
            let before = sites.len();
            sites.retain(|s| !s.ignore_site);
            if sites.len() != before {
                warn!("Dropped {} ignored site(s) returned by the store", before - sites.len());
            }
            debug!("Loaded {} site(s)", sites.len());
            Ok(sites)
        })
    }

    pub fn get_clients(&self) -> Result<Rc<ClientNames>, GatewayError> {
        self.clients.get_or_fetch(self.clock.now(), || {
            let clients: ClientNames = self.gateway.select_clients()?.into_iter().collect();
            debug!("Loaded {} client(s)", clients.len());
            Ok(clients)
        })
    }

    pub fn invalidate_sites(&self) {
        self.sites.invalidate();
    }

    pub fn update_site(&self, id: SiteId, patch: &SitePatch) -> Result<Vec<Site>, DashboardError> {
        let rows = self.gateway.update_site(id, patch)?;
        self.invalidate_sites();
        if rows.is_empty() {
            warn!("Update of site {} matched no rows", id.0);
        } else {
            info!("Updated site {}", id.0);
        }
        Ok(rows)
    }

    pub fn insert_site(&self, site: &NewSite) -> Result<Vec<Site>, DashboardError> {
        if site.name.trim().is_empty() {
            return Err(DashboardError::Validation("Name is required".to_string()));
        }
        let rows = self.gateway.insert_site(site)?;
        self.invalidate_sites();
        info!("Inserted site '{}'", site.name);
        Ok(rows)
    }
}
