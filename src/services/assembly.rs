use crate::models::pv::{ClientNames, Site, SiteView, UNASSIGNED};

/// Join client names onto sites. Output keeps the input order and length; a null or
/// unresolvable `client_map_id` yields the "Unassigned" label.
pub fn assemble(sites: &[Site], clients: &ClientNames) -> Vec<SiteView> {
    sites
        .iter()
        .map(|site| SiteView {
            client_name: resolve_client_name(site, clients).to_string(),
            site: site.clone(),
        })
        .collect()
}

fn resolve_client_name<'a>(site: &Site, clients: &'a ClientNames) -> &'a str {
    site.client_map_id
        .and_then(|id| clients.name(id))
        .unwrap_or(UNASSIGNED)
}
