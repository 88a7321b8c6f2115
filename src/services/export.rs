//! Rendering of the displayed columns, as a terminal table or as CSV.

use crate::models::pv::SiteView;
use std::io::{self, Write};

pub const DEFAULT_CSV_FILE: &str = "sites_pv.csv";
pub const COLUMNS: [&str; 6] = ["Name", "Code", "Power kWc", "Address", "Client", "Commission date"];

/// Displayed cells of one row, in `COLUMNS` order; absent values are empty.
pub fn row_cells(view: &SiteView) -> [String; 6] {
    let site = &view.site;
    [
        site.name.clone(),
        site.code.clone().unwrap_or_default(),
        site.nominal_power.map(format_power).unwrap_or_default(),
        site.address.clone().unwrap_or_default(),
        view.client_name.clone(),
        site.commission_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
    ]
}

fn format_power(kw: f64) -> String {
    if kw.fract() == 0.0 {
        format!("{:.0}", kw)
    } else {
        format!("{}", kw)
    }
}

/// CSV export of the displayed columns, one record per site.
pub fn write_csv<W: Write>(out: &mut W, views: &[&SiteView]) -> io::Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(COLUMNS)?;
    for view in views {
        writer.write_record(row_cells(view))?;
    }
    writer.flush()
}

/// Plain-text table preceded by a result count.
pub fn render_table<W: Write>(out: &mut W, views: &[&SiteView]) -> io::Result<()> {
    writeln!(out, "Sites ({} results)", views.len())?;

    let rows: Vec<[String; 6]> = views.iter().map(|v| row_cells(v)).collect();
    let mut widths = COLUMNS.map(|c| c.chars().count());
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(widths)
            .map(|(c, w)| format!("{:<w$}", c.replace('\n', " "), w = w))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    writeln!(out, "{}", line(&COLUMNS.map(str::to_string)[..]))?;
    writeln!(out, "{}", widths.map(|w| "-".repeat(w)).join("-+-"))?;
    for row in &rows {
        writeln!(out, "{}", line(&row[..]))?;
    }
    Ok(())
}
