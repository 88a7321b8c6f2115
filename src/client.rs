//! Blocking client for the PostgREST interface of the hosted site registry.
//!
//! - Uses `ureq` (no async); each call blocks the current interaction.
//! - Only the four operations the dashboard needs: two selects, one update, one insert.
//! - No retries: any failure is returned to the caller as a `GatewayError`.

use http::header::{ACCEPT, AUTHORIZATION};
use log::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Display;
use std::time::Duration;

use crate::models::pv::{CLIENT_COLUMNS, Client, NewSite, SITE_COLUMNS, Site, SiteId, SitePatch};

pub const DEFAULT_SITES_TABLE: &str = "sites_mapping";
pub const DEFAULT_CLIENTS_TABLE: &str = "clients_mapping";
const REST_PATH: &str = "rest/v1";

#[derive(Debug)]
pub enum GatewayError {
    Transport(String),
    Http { status: u16, message: String },
    Decode { path: String, message: String },
}

impl core::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            GatewayError::Transport(s) => write!(f, "transport error: {}", s),
            GatewayError::Http { status, message } => write!(f, "http {}: {}", status, message),
            GatewayError::Decode { path, message } => write!(f, "invalid response at `{}`: {}", path, message),
        }
    }
}

impl std::error::Error for GatewayError {}

/// Operations the dashboard issues against the remote store.
pub trait SiteGateway {
    /// Sites not flagged `ignore_site`, ordered by name.
    fn select_sites(&self) -> Result<Vec<Site>, GatewayError>;
    /// All clients, ordered by name.
    fn select_clients(&self) -> Result<Vec<Client>, GatewayError>;
    /// Returns the updated row(s); an unknown id yields an empty list.
    fn update_site(&self, id: SiteId, patch: &SitePatch) -> Result<Vec<Site>, GatewayError>;
    fn insert_site(&self, site: &NewSite) -> Result<Vec<Site>, GatewayError>;
}

/// Shape of a PostgREST request: target table, projected columns, `eq` filters and ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    table: String,
    columns: Vec<String>,
    filters: Vec<(String, String)>,
    order: Option<String>,
}

impl Query {
    pub fn table(name: impl Into<String>) -> Self {
        Query {
            table: name.into(),
            columns: Vec::new(),
            filters: Vec::new(),
            order: None,
        }
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn eq(mut self, column: &str, value: impl Display) -> Self {
        self.filters.push((column.to_string(), format!("eq.{}", value)));
        self
    }

    pub fn order_asc(mut self, column: &str) -> Self {
        self.order = Some(format!("{}.asc", column));
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Query-string pairs in PostgREST syntax.
    pub fn pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.filters.len() + 2);
        if !self.columns.is_empty() {
            pairs.push(("select".to_string(), self.columns.join(",")));
        }
        pairs.extend(self.filters.iter().cloned());
        if let Some(order) = &self.order {
            pairs.push(("order".to_string(), order.clone()));
        }
        pairs
    }
}

pub struct SupabaseClient {
    agent: ureq::Agent,
    rest_url: String,
    api_key: String,
    sites_table: String,
    clients_table: String,
}

impl SupabaseClient {
    pub fn new(base_url: &str, api_key: impl Into<String>, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        SupabaseClient {
            agent,
            rest_url: format!("{}/{}", base_url.trim_end_matches('/'), REST_PATH),
            api_key: api_key.into(),
            sites_table: DEFAULT_SITES_TABLE.to_string(),
            clients_table: DEFAULT_CLIENTS_TABLE.to_string(),
        }
    }

    pub fn with_tables(mut self, sites: impl Into<String>, clients: impl Into<String>) -> Self {
        self.sites_table = sites.into();
        self.clients_table = clients.into();
        self
    }

    fn url(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    fn prepare<B>(&self, mut req: ureq::RequestBuilder<B>, query: &Query) -> ureq::RequestBuilder<B> {
        req = req
            .header(ACCEPT, "application/json")
            .header("apikey", self.api_key.as_str())
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key));
        for (k, v) in query.pairs() {
            req = req.query(k, v);
        }
        req
    }

    fn select<T: DeserializeOwned>(&self, query: &Query) -> Result<T, GatewayError> {
        debug!("GET {} {:?}", query.table_name(), query.pairs());
        let req = self.prepare(self.agent.get(self.url(query.table_name())), query);
        read_response(req.call())
    }

    fn patch<B: Serialize, T: DeserializeOwned>(&self, query: &Query, body: &B) -> Result<T, GatewayError> {
        debug!("PATCH {} {:?}", query.table_name(), query.pairs());
        let req = self
            .prepare(self.agent.patch(self.url(query.table_name())), query)
            .header("Prefer", "return=representation");
        read_response(req.send_json(body))
    }

    fn post<B: Serialize, T: DeserializeOwned>(&self, query: &Query, body: &B) -> Result<T, GatewayError> {
        debug!("POST {}", query.table_name());
        let req = self
            .prepare(self.agent.post(self.url(query.table_name())), query)
            .header("Prefer", "return=representation");
        read_response(req.send_json(body))
    }

    pub fn sites_query(&self) -> Query {
        Query::table(&self.sites_table)
            .columns(SITE_COLUMNS)
            .eq("ignore_site", false)
            .order_asc("name")
    }

    pub fn clients_query(&self) -> Query {
        Query::table(&self.clients_table)
            .columns(CLIENT_COLUMNS)
            .order_asc("name")
    }
}

impl SiteGateway for SupabaseClient {
    fn select_sites(&self) -> Result<Vec<Site>, GatewayError> {
        self.select(&self.sites_query())
    }

    fn select_clients(&self) -> Result<Vec<Client>, GatewayError> {
        self.select(&self.clients_query())
    }

    fn update_site(&self, id: SiteId, patch: &SitePatch) -> Result<Vec<Site>, GatewayError> {
        let query = Query::table(&self.sites_table).eq("id", id.0);
        self.patch(&query, patch)
    }

    fn insert_site(&self, site: &NewSite) -> Result<Vec<Site>, GatewayError> {
        self.post(&Query::table(&self.sites_table), site)
    }
}

fn read_response<T: DeserializeOwned>(
    result: Result<http::Response<ureq::Body>, ureq::Error>,
) -> Result<T, GatewayError> {
    let mut resp = result.map_err(|e| GatewayError::Transport(e.to_string()))?;
    let status = resp.status();
    let body = resp
        .body_mut()
        .read_to_string()
        .map_err(|e| GatewayError::Transport(e.to_string()))?;
    if !status.is_success() {
        return Err(GatewayError::Http {
            status: status.as_u16(),
            message: store_error_message(&body),
        });
    }
    decode(&body)
}

/// Decode a JSON body, reporting the path of the offending field on failure.
pub fn decode<T: DeserializeOwned>(body: &str) -> Result<T, GatewayError> {
    let de = &mut serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(de).map_err(|e| GatewayError::Decode {
        path: e.path().to_string(),
        message: e.inner().to_string(),
    })
}

/// Human-readable message from a PostgREST error body, or the raw body when it is not one.
fn store_error_message(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct StoreError {
        message: String,
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        details: Option<String>,
        #[serde(default)]
        hint: Option<String>,
    }

    if body.trim().is_empty() {
        return String::from("<no body>");
    }
    match serde_json::from_str::<StoreError>(body) {
        Ok(err) => {
            let mut msg = err.message;
            if let Some(code) = err.code {
                msg.push_str(&format!(" (code {})", code));
            }
            if let Some(details) = err.details {
                msg.push_str(&format!(": {}", details));
            }
            if let Some(hint) = err.hint {
                msg.push_str(&format!("; hint: {}", hint));
            }
            msg
        }
        Err(_) => body.trim().to_string(),
    }
}
