//! Command-line and shell-line parsing.

use crate::dashboard::{EditRequest, ListRequest};
use crate::models::pv::{ClientId, SiteId};
use crate::services::export::DEFAULT_CSV_FILE;
use crate::services::forms::AddSiteForm;
use chrono::NaiveDate;
use std::path::PathBuf;

pub const USAGE: &str = "\
usage: pv-sites [--env-file PATH] [COMMAND]

commands:
  list [--client NAME] [--min KW] [--max KW] [--csv[=PATH]]
  clients
  edit ID [--name S] [--code S] [--power KW] [--address S] [--commission-date YYYY-MM-DD|none]
  add --name S [--code S] [--power KW] [--address S] [--commission-date YYYY-MM-DD] [--client ID|none]
  shell       read commands from stdin, one per line
  help

Without a command, `list` is run.";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    List(ListRequest),
    Clients,
    Edit(EditRequest),
    Add(AddSiteForm),
    Shell,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub env_file: Option<PathBuf>,
    pub command: Command,
}

/// Parse process arguments (without the program name).
pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Invocation, String> {
    let mut env_file = None;
    let mut rest = Vec::new();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        if let Some(value) = flag_value(&arg, "--env-file", &mut args)? {
            if env_file.is_some() {
                return Err("`--env-file` provided more than once".to_string());
            }
            env_file = Some(PathBuf::from(value));
        } else {
            rest.push(arg);
        }
    }

    let command = if rest.is_empty() {
        Command::List(ListRequest::default())
    } else {
        parse_command(&rest)?
    };
    Ok(Invocation { env_file, command })
}

/// Parse one command and its options.
pub fn parse_command(tokens: &[String]) -> Result<Command, String> {
    let (name, rest) = tokens.split_first().ok_or("empty command")?;
    let mut args = rest.iter().cloned();

    match name.as_str() {
        "list" => {
            let mut req = ListRequest::default();
            while let Some(arg) = args.next() {
                if let Some(v) = flag_value(&arg, "--client", &mut args)? {
                    req.client = Some(v);
                } else if let Some(v) = flag_value(&arg, "--min", &mut args)? {
                    req.min_power = Some(parse_power(&v)?);
                } else if let Some(v) = flag_value(&arg, "--max", &mut args)? {
                    req.max_power = Some(parse_power(&v)?);
                } else if arg == "--csv" {
                    req.csv = Some(PathBuf::from(DEFAULT_CSV_FILE));
                } else if let Some(path) = arg.strip_prefix("--csv=") {
                    req.csv = Some(PathBuf::from(non_empty_arg("--csv", path)?));
                } else {
                    return Err(unexpected(&arg));
                }
            }
            Ok(Command::List(req))
        }
        "clients" => no_more_args(args).map(|_| Command::Clients),
        "edit" => {
            let mut req = EditRequest::default();
            while let Some(arg) = args.next() {
                if let Some(v) = flag_value(&arg, "--name", &mut args)? {
                    req.name = Some(v);
                } else if let Some(v) = flag_value(&arg, "--code", &mut args)? {
                    req.code = Some(v);
                } else if let Some(v) = flag_value(&arg, "--power", &mut args)? {
                    req.power = Some(parse_power(&v)?);
                } else if let Some(v) = flag_value(&arg, "--address", &mut args)? {
                    req.address = Some(v);
                } else if let Some(v) = flag_value(&arg, "--commission-date", &mut args)? {
                    req.commission_date = Some(parse_optional_date(&v)?);
                } else if !arg.starts_with("--") && req.id.is_none() {
                    let id = arg.parse::<i64>().map_err(|_| format!("invalid site id: {}", arg))?;
                    req.id = Some(SiteId(id));
                } else {
                    return Err(unexpected(&arg));
                }
            }
            if req.id.is_none() {
                return Err("`edit` requires a site id".to_string());
            }
            Ok(Command::Edit(req))
        }
        "add" => {
            let mut form = AddSiteForm::default();
            while let Some(arg) = args.next() {
                if let Some(v) = flag_value(&arg, "--name", &mut args)? {
                    form.name = v;
                } else if let Some(v) = flag_value(&arg, "--code", &mut args)? {
                    form.code = v;
                } else if let Some(v) = flag_value(&arg, "--power", &mut args)? {
                    form.power = parse_power(&v)?;
                } else if let Some(v) = flag_value(&arg, "--address", &mut args)? {
                    form.address = v;
                } else if let Some(v) = flag_value(&arg, "--commission-date", &mut args)? {
                    form.commission_date = parse_optional_date(&v)?;
                } else if let Some(v) = flag_value(&arg, "--client", &mut args)? {
                    form.client = match v.as_str() {
                        "none" => None,
                        id => Some(ClientId(id.parse().map_err(|_| format!("invalid client id: {}", id))?)),
                    };
                } else {
                    return Err(unexpected(&arg));
                }
            }
            Ok(Command::Add(form))
        }
        "shell" => no_more_args(args).map(|_| Command::Shell),
        "help" | "--help" | "-h" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(format!("unknown command: {}", other)),
    }
}

/// Split a shell line into words. Single and double quotes group words; no escapes.
pub fn split_line(line: &str) -> Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for ch in line.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                in_word = true;
            }
            None if ch.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(ch);
                in_word = true;
            }
        }
    }
    if quote.is_some() {
        return Err("unterminated quote".to_string());
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

/// `--flag value` or `--flag=value`; `None` when `arg` is a different flag.
fn flag_value(arg: &str, flag: &str, rest: &mut impl Iterator<Item = String>) -> Result<Option<String>, String> {
    if arg == flag {
        let value = rest.next().ok_or_else(|| format!("`{}` requires a value", flag))?;
        return Ok(Some(value));
    }
    match arg.strip_prefix(flag).and_then(|s| s.strip_prefix('=')) {
        Some(value) => non_empty_arg(flag, value).map(|v| Some(v.to_string())),
        None => Ok(None),
    }
}

fn non_empty_arg<'a>(flag: &str, value: &'a str) -> Result<&'a str, String> {
    if value.is_empty() {
        Err(format!("`{}` requires a value", flag))
    } else {
        Ok(value)
    }
}

fn parse_power(value: &str) -> Result<f64, String> {
    match value.trim().parse::<f64>() {
        Ok(kw) if kw.is_finite() && kw >= 0.0 => Ok(kw),
        _ => Err(format!("invalid power (kWc): {}", value)),
    }
}

fn parse_optional_date(value: &str) -> Result<Option<NaiveDate>, String> {
    match value.trim() {
        "" | "none" => Ok(None),
        s => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| format!("commission date must be in YYYY-MM-DD format: {}", s)),
    }
}

fn no_more_args(mut args: impl Iterator<Item = String>) -> Result<(), String> {
    match args.next() {
        Some(arg) => Err(unexpected(&arg)),
        None => Ok(()),
    }
}

fn unexpected(arg: &str) -> String {
    format!("unrecognised argument: {}", arg)
}
