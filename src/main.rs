pub mod models {
    pub mod pv;
}

pub mod cache;
pub mod cli;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod services {
    pub mod assembly;
    pub mod export;
    pub mod filter;
    pub mod forms;
}
#[cfg(test)]
pub mod testing;

use crate::cache::{Clock, DashboardError, SiteStore};
use crate::cli::{Command, Invocation, USAGE, parse_args, parse_command, split_line};
use crate::client::{SiteGateway, SupabaseClient};
use crate::config::Config;
use crate::dashboard::Dashboard;
use log::{error, info};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Debug)]
struct LoadedEnvFile {
    path: PathBuf,
    explicit: bool,
    applied: usize,
}

fn load_env(explicit: Option<PathBuf>) -> Result<Option<LoadedEnvFile>, String> {
    let (path, explicit) = match explicit {
        Some(path) => {
            if !path.is_file() {
                return Err(format!("env file not found: {}", path.display()));
            }
            (path, true)
        }
        None => {
            let cwd = std::env::current_dir().map_err(|e| format!("unable to read current directory: {}", e))?;
            let path = cwd.join(".env");
            if !path.is_file() {
                return Ok(None);
            }
            (path, false)
        }
    };
    let applied = config::load_env_file(&path)?;
    Ok(Some(LoadedEnvFile { path, explicit, applied }))
}

/// Run a single interaction. Returns `false` when the shell should stop.
fn execute<G: SiteGateway, C: Clock, W: Write>(
    dashboard: &Dashboard<G, C>,
    command: Command,
    out: &mut W,
) -> Result<bool, DashboardError> {
    match command {
        Command::List(req) => dashboard.list(out, &req)?,
        Command::Clients => dashboard.clients(out)?,
        Command::Edit(req) => dashboard.edit(out, &req)?,
        Command::Add(form) => dashboard.add(out, form)?,
        Command::Help => writeln!(out, "{}", USAGE)?,
        Command::Shell => writeln!(out, "already in shell")?,
        Command::Quit => return Ok(false),
    }
    Ok(true)
}

/// Read commands from `input` until EOF or `quit`, sharing one cache across interactions.
/// A failed interaction is reported and the shell carries on.
fn run_shell<G: SiteGateway, C: Clock, R: BufRead, W: Write>(
    dashboard: &Dashboard<G, C>,
    input: R,
    out: &mut W,
) -> Result<(), String> {
    let io_err = |e: io::Error| format!("shell i/o failed: {}", e);
    write!(out, "pv-sites> ").and_then(|_| out.flush()).map_err(io_err)?;
    for line in input.lines() {
        let line = line.map_err(io_err)?;
        let outcome = split_line(&line).and_then(|words| {
            if words.is_empty() {
                Ok(None)
            } else {
                parse_command(&words).map(Some)
            }
        });
        match outcome {
            Ok(Some(command)) => match execute(dashboard, command, out) {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                Err(e) => error!("{}", e),
            },
            Ok(None) => {}
            Err(e) => error!("{}", e),
        }
        write!(out, "pv-sites> ").and_then(|_| out.flush()).map_err(io_err)?;
    }
    writeln!(out).map_err(io_err)
}

pub fn run(command: Command) -> Result<(), String> {
    // 1) Load config
    let cfg = Config::from_env()?;
    info!(
        "Config loaded (url={}, sites_table={}, clients_table={}, sites_ttl={}s, clients_ttl={}s, timeout={}s)",
        cfg.supabase_url,
        cfg.sites_table,
        cfg.clients_table,
        cfg.sites_ttl.as_secs(),
        cfg.clients_ttl.as_secs(),
        cfg.request_timeout.as_secs()
    );

    // 2) Init store client and cache
    let client = SupabaseClient::new(&cfg.supabase_url, cfg.supabase_key.clone(), cfg.request_timeout)
        .with_tables(&cfg.sites_table, &cfg.clients_table);
    let dashboard = Dashboard::new(SiteStore::new(client, cfg.sites_ttl, cfg.clients_ttl));

    // 3) Interact
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match command {
        Command::Shell => {
            info!("Starting interactive shell");
            run_shell(&dashboard, io::stdin().lock(), &mut out)
        }
        other => execute(&dashboard, other, &mut out).map(|_| ()).map_err(|e| e.to_string()),
    }
}

fn main() {
    let Invocation { env_file, command } = match parse_args(std::env::args().skip(1)) {
        Ok(inv) => inv,
        Err(err) => {
            eprintln!("fatal: {}\n\n{}", err, USAGE);
            std::process::exit(2);
        }
    };
    if command == Command::Help {
        println!("{}", USAGE);
        return;
    }

    let loaded_env = match load_env(env_file) {
        Ok(info) => info,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // Init logging after environment so RUST_LOG from .env is respected.
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    if let Some(info) = loaded_env.as_ref() {
        let origin = if info.explicit { "CLI-specified" } else { "default" };
        info!(
            "Environment loaded from {} .env file: {} ({} variable(s) applied)",
            origin,
            info.path.display(),
            info.applied
        );
    }

    info!("pv-sites {} starting", env!("CARGO_PKG_VERSION"));
    if let Err(e) = run(command) {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{DEFAULT_CLIENTS_TTL, DEFAULT_SITES_TTL};
    use crate::testing::{FakeGateway, ManualClock, scenario_clients, scenario_sites};

    fn dashboard() -> Dashboard<FakeGateway, ManualClock> {
        let gateway = FakeGateway::new(scenario_sites(), scenario_clients());
        Dashboard::new(SiteStore::with_clock(
            gateway,
            ManualClock::new(),
            DEFAULT_SITES_TTL,
            DEFAULT_CLIENTS_TTL,
        ))
    }

    #[test]
    fn shell_shares_cache_across_interactions() {
        let dash = dashboard();
        let input = "list\nlist --client Acme\nclients\nlist --max 100\n";
        let mut out = Vec::new();
        run_shell(&dash, input.as_bytes(), &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("Sites (").count(), 3);
        assert_eq!(dash.store().gateway().site_selects(), 1);
        assert_eq!(dash.store().gateway().client_selects(), 1);
    }

    #[test]
    fn shell_write_invalidates_and_errors_do_not_stop_it() {
        let dash = dashboard();
        let input = "list\nadd --code X\nbogus\nedit 1 --power 75\nlist --min 70 --max 80\nquit\nlist\n";
        let mut out = Vec::new();
        run_shell(&dash, input.as_bytes(), &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Site 'Alpha' updated"));
        assert!(text.contains("Sites (1 results)"));
        assert_eq!(text.matches("Sites (").count(), 2);
        assert_eq!(dash.store().gateway().inserts(), 0);
        assert_eq!(dash.store().gateway().site_selects(), 2);
    }

    #[test]
    fn execute_help_and_quit() {
        let dash = dashboard();
        let mut out = Vec::new();
        assert!(execute(&dash, Command::Help, &mut out).unwrap());
        assert!(String::from_utf8(out).unwrap().starts_with("usage: pv-sites"));
        assert!(!execute(&dash, Command::Quit, &mut Vec::new()).unwrap());
    }
}
