//! In-memory gateway and controllable clock for unit tests.

use crate::cache::Clock;
use crate::client::{GatewayError, SiteGateway};
use crate::models::pv::{Client, ClientId, NewSite, Site, SiteId, SitePatch};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Clock that only moves when told to; clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            now: Rc::new(Cell::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

/// Store double: applies writes to its rows and counts calls.
#[derive(Debug)]
pub struct FakeGateway {
    sites: RefCell<Vec<Site>>,
    clients: Vec<Client>,
    next_id: Cell<i64>,
    site_selects: Cell<usize>,
    client_selects: Cell<usize>,
    updates: Cell<usize>,
    inserts: Cell<usize>,
    fail_next: RefCell<Option<String>>,
    leak_ignored: bool,
}

impl FakeGateway {
    pub fn new(sites: Vec<Site>, clients: Vec<Client>) -> Self {
        let next_id = sites.iter().map(|s| s.id.0).max().unwrap_or(0) + 1;
        FakeGateway {
            sites: RefCell::new(sites),
            clients,
            next_id: Cell::new(next_id),
            site_selects: Cell::new(0),
            client_selects: Cell::new(0),
            updates: Cell::new(0),
            inserts: Cell::new(0),
            fail_next: RefCell::new(None),
            leak_ignored: false,
        }
    }

    /// Return `ignore_site` rows from `select_sites` instead of filtering them like the store.
    pub fn leaking_ignored(mut self) -> Self {
        self.leak_ignored = true;
        self
    }

    /// Make the next call fail with a transport error.
    pub fn fail_next(&self, message: &str) {
        *self.fail_next.borrow_mut() = Some(message.to_string());
    }

    pub fn site_selects(&self) -> usize {
        self.site_selects.get()
    }

    pub fn client_selects(&self) -> usize {
        self.client_selects.get()
    }

    pub fn updates(&self) -> usize {
        self.updates.get()
    }

    pub fn inserts(&self) -> usize {
        self.inserts.get()
    }

    fn check_failure(&self) -> Result<(), GatewayError> {
        match self.fail_next.borrow_mut().take() {
            Some(msg) => Err(GatewayError::Transport(msg)),
            None => Ok(()),
        }
    }
}

impl SiteGateway for FakeGateway {
    fn select_sites(&self) -> Result<Vec<Site>, GatewayError> {
        self.site_selects.set(self.site_selects.get() + 1);
        self.check_failure()?;
        let mut rows: Vec<Site> = self
            .sites
            .borrow()
            .iter()
            .filter(|s| self.leak_ignored || !s.ignore_site)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    fn select_clients(&self) -> Result<Vec<Client>, GatewayError> {
        self.client_selects.set(self.client_selects.get() + 1);
        self.check_failure()?;
        let mut rows = self.clients.clone();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    fn update_site(&self, id: SiteId, patch: &SitePatch) -> Result<Vec<Site>, GatewayError> {
        self.updates.set(self.updates.get() + 1);
        self.check_failure()?;
        let mut sites = self.sites.borrow_mut();
        let mut updated = Vec::new();
        for site in sites.iter_mut().filter(|s| s.id == id) {
            patch.apply_to(site);
            updated.push(site.clone());
        }
        Ok(updated)
    }

    fn insert_site(&self, site: &NewSite) -> Result<Vec<Site>, GatewayError> {
        self.inserts.set(self.inserts.get() + 1);
        self.check_failure()?;
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let row = Site {
            id: SiteId(id),
            name: site.name.clone(),
            code: site.code.clone(),
            nominal_power: site.nominal_power,
            address: site.address.clone(),
            commission_date: site.commission_date,
            client_map_id: site.client_map_id,
            ignore_site: false,
        };
        self.sites.borrow_mut().push(row.clone());
        Ok(vec![row])
    }
}

pub fn site(id: i64, name: &str, power: Option<f64>, client: Option<i64>) -> Site {
    Site {
        id: SiteId(id),
        name: name.to_string(),
        code: Some(name.to_uppercase().chars().take(3).collect()),
        nominal_power: power,
        address: None,
        commission_date: None,
        client_map_id: client.map(ClientId),
        ignore_site: false,
    }
}

/// Alpha (50 kWp, client 1) and Beta (200 kWp, unassigned).
pub fn scenario_sites() -> Vec<Site> {
    vec![site(1, "Alpha", Some(50.0), Some(1)), site(2, "Beta", Some(200.0), None)]
}

pub fn scenario_clients() -> Vec<Client> {
    vec![Client {
        id: ClientId(1),
        name: "Acme".to_string(),
    }]
}
