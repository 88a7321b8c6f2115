//! Edit and add forms: raw field values and their conversion into store payloads.

use crate::cache::DashboardError;
use crate::models::pv::{ClientId, ClientNames, NewSite, SiteId, SitePatch, SiteView};
use chrono::NaiveDate;

/// Label of the "no client" entry in the add form's client selector.
pub const NO_CLIENT_LABEL: &str = "-- none --";

/// Edit form contents, pre-filled from the selected site.
#[derive(Debug, Clone, PartialEq)]
pub struct EditSiteForm {
    pub id: SiteId,
    pub name: String,
    pub code: String,
    pub power: f64,
    pub address: String,
    pub commission_date: Option<NaiveDate>,
}

impl EditSiteForm {
    pub fn prefill(view: &SiteView) -> Self {
        let site = &view.site;
        EditSiteForm {
            id: site.id,
            name: site.name.clone(),
            code: site.code.clone().unwrap_or_default(),
            power: site.effective_power(),
            address: site.address.clone().unwrap_or_default(),
            commission_date: site.commission_date,
        }
    }

    /// All five editable columns are written; empty text becomes `null`.
    pub fn into_patch(self) -> SitePatch {
        SitePatch {
            name: Some(self.name.trim().to_string()),
            code: Some(non_empty(self.code)),
            nominal_power: Some(Some(self.power)),
            address: Some(non_empty(self.address)),
            commission_date: Some(self.commission_date),
            client_map_id: None,
        }
    }
}

/// Add form contents as entered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddSiteForm {
    pub name: String,
    pub code: String,
    pub power: f64,
    pub address: String,
    pub commission_date: Option<NaiveDate>,
    pub client: Option<ClientId>,
}

impl AddSiteForm {
    /// Name is mandatory; empty text and a zero power are stored as `null`.
    pub fn into_new_site(self) -> Result<NewSite, DashboardError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(DashboardError::Validation("Name is required".to_string()));
        }
        Ok(NewSite {
            name,
            code: non_empty(self.code),
            nominal_power: (self.power != 0.0).then_some(self.power),
            address: non_empty(self.address),
            commission_date: self.commission_date,
            client_map_id: self.client,
        })
    }
}

/// Picker label for a site: `"<name> (<code>)"`, or just the name without a code.
pub fn site_label(view: &SiteView) -> String {
    match view.site.code.as_deref() {
        Some(code) if !code.is_empty() => format!("{} ({})", view.site.name, code),
        _ => view.site.name.clone(),
    }
}

/// Client selector entries for the add form, "none" first then the store order.
pub fn client_choices(clients: &ClientNames) -> Vec<(Option<ClientId>, String)> {
    std::iter::once((None, NO_CLIENT_LABEL.to_string()))
        .chain(clients.iter().map(|c| (Some(c.id), c.name.clone())))
        .collect()
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pv::Client;
    use crate::services::assembly::assemble;
    use crate::testing::{scenario_clients, site};

    fn view_of(site: crate::models::pv::Site) -> SiteView {
        let clients: ClientNames = scenario_clients().into_iter().collect();
        assemble(&[site], &clients).remove(0)
    }

    #[test]
    fn edit_form_is_prefilled_from_the_site() {
        let mut s = site(4, "Delta", None, Some(1));
        s.address = Some("2 avenue des Panneaux".into());
        s.commission_date = NaiveDate::from_ymd_opt(2019, 9, 1);
        let form = EditSiteForm::prefill(&view_of(s));

        assert_eq!(form.id, SiteId(4));
        assert_eq!(form.code, "DEL");
        assert_eq!(form.power, 0.0);
        assert_eq!(form.address, "2 avenue des Panneaux");
        assert_eq!(form.commission_date, NaiveDate::from_ymd_opt(2019, 9, 1));
    }

    #[test]
    fn edit_patch_writes_every_editable_column() {
        let mut form = EditSiteForm::prefill(&view_of(site(1, "Alpha", Some(50.0), Some(1))));
        form.power = 75.0;
        form.code = String::new();

        let patch = form.into_patch();
        assert_eq!(patch.name.as_deref(), Some("Alpha"));
        assert_eq!(patch.code, Some(None));
        assert_eq!(patch.nominal_power, Some(Some(75.0)));
        assert_eq!(patch.address, Some(None));
        assert_eq!(patch.commission_date, Some(None));
        assert_eq!(patch.client_map_id, None);
    }

    #[test]
    fn add_form_requires_a_name() {
        let err = AddSiteForm::default().into_new_site().unwrap_err();
        assert_eq!(err.to_string(), "Name is required");

        let blank = AddSiteForm {
            name: "  ".into(),
            ..Default::default()
        };
        assert!(blank.into_new_site().is_err());
    }

    #[test]
    fn add_form_maps_blank_inputs_to_null() {
        let form = AddSiteForm {
            name: "Gamma".into(),
            ..Default::default()
        };
        assert_eq!(form.into_new_site().unwrap(), NewSite::named("Gamma"));

        let full = AddSiteForm {
            name: " Epsilon ".into(),
            code: "EPS".into(),
            power: 12.5,
            address: "Zone Sud".into(),
            commission_date: NaiveDate::from_ymd_opt(2024, 2, 29),
            client: Some(ClientId(1)),
        }
        .into_new_site()
        .unwrap();
        assert_eq!(full.name, "Epsilon");
        assert_eq!(full.nominal_power, Some(12.5));
        assert_eq!(full.client_map_id, Some(ClientId(1)));
    }

    #[test]
    fn labels_and_client_choices() {
        assert_eq!(site_label(&view_of(site(1, "Alpha", None, None))), "Alpha (ALP)");
        let mut no_code = site(2, "Beta", None, None);
        no_code.code = None;
        assert_eq!(site_label(&view_of(no_code)), "Beta");

        let clients: ClientNames = vec![
            Client { id: ClientId(2), name: "Acme".into() },
            Client { id: ClientId(1), name: "Borealis".into() },
        ]
        .into_iter()
        .collect();
        let choices = client_choices(&clients);
        assert_eq!(choices[0], (None, NO_CLIENT_LABEL.to_string()));
        assert_eq!(choices[1], (Some(ClientId(2)), "Acme".to_string()));
        assert_eq!(choices.len(), 3);
    }
}
