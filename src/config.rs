//! Runtime configuration from the environment, optionally seeded from a `.env` file.

use crate::cache::{DEFAULT_CLIENTS_TTL, DEFAULT_SITES_TTL};
use crate::client::{DEFAULT_CLIENTS_TABLE, DEFAULT_SITES_TABLE};
use std::path::Path;
use std::time::Duration;
use std::{fs, io};

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const KEY_FILE: &str = "supabase_key.txt";

#[derive(Debug, Clone)]
pub struct Config {
    /// Project URL of the hosted store (without the `/rest/v1` suffix).
    pub supabase_url: String,
    pub supabase_key: String,
    pub sites_table: String,
    pub clients_table: String,
    pub sites_ttl: Duration,
    pub clients_ttl: Duration,
    /// Upper bound for a single request to the store, connect to last byte.
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok(), Path::new(KEY_FILE))
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>, key_file: &Path) -> Result<Self, String> {
        let non_blank = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        let supabase_url = non_blank("SUPABASE_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .ok_or_else(|| "Missing SUPABASE_URL".to_string())?;

        // Prefer env var; fallback to the key file in working directory
        let supabase_key = match non_blank("SUPABASE_KEY") {
            Some(v) => v.trim().to_string(),
            None => match fs::read_to_string(key_file) {
                Ok(s) if !s.trim().is_empty() => s.trim().to_string(),
                _ => {
                    return Err(format!(
                        "Missing API key: set SUPABASE_KEY or provide {} in working directory",
                        key_file.display()
                    ));
                }
            },
        };

        let secs = |key: &str, default: u64| {
            var(key)
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(default))
        };

        Ok(Config {
            supabase_url,
            supabase_key,
            sites_table: non_blank("SITES_TABLE").unwrap_or_else(|| DEFAULT_SITES_TABLE.to_string()),
            clients_table: non_blank("CLIENTS_TABLE").unwrap_or_else(|| DEFAULT_CLIENTS_TABLE.to_string()),
            sites_ttl: secs("SITES_CACHE_TTL_SECS", DEFAULT_SITES_TTL.as_secs()),
            clients_ttl: secs("CLIENTS_CACHE_TTL_SECS", DEFAULT_CLIENTS_TTL.as_secs()),
            request_timeout: secs("REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
        })
    }
}

/// Export every assignment of a `.env` file that is not already set in the process environment.
pub fn load_env_file(path: &Path) -> Result<usize, String> {
    let text = fs::read_to_string(path).map_err(|e: io::Error| format!("failed to read {}: {}", path.display(), e))?;
    let mut applied = 0;
    for (index, line) in text.lines().enumerate() {
        let Some((key, value)) =
            parse_env_line(line).map_err(|e| format!("{}:{}: {}", path.display(), index + 1, e))?
        else {
            continue;
        };
        if std::env::var_os(&key).is_none() {
            // Updating process-level environment variables is unsafe on some targets.
            unsafe {
                std::env::set_var(&key, value);
            }
            applied += 1;
        }
    }
    Ok(applied)
}

/// Parse one `.env` line. Blank lines and comments yield `None`.
fn parse_env_line(line: &str) -> Result<Option<(String, String)>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);
    let (key, raw) = line.split_once('=').ok_or("missing '=' in assignment")?;
    let key = key.trim();
    if key.is_empty() {
        return Err("variable name cannot be empty".to_string());
    }
    if key.contains(char::is_whitespace) {
        return Err(format!("variable name contains whitespace: {}", key));
    }

    let raw = raw.trim();
    let value = match raw.chars().next() {
        Some(quote @ ('"' | '\'')) => unquote(&raw[1..], quote)?,
        _ => raw.split('#').next().unwrap_or_default().trim_end().to_string(),
    };
    Ok(Some((key.to_string(), value)))
}

/// Read a quoted value up to its closing quote. Escapes apply to double quotes only.
fn unquote(body: &str, quote: char) -> Result<String, String> {
    let mut value = String::new();
    let mut chars = body.char_indices();
    while let Some((i, ch)) = chars.next() {
        if ch == quote {
            let rest = body[i + ch.len_utf8()..].trim();
            return if rest.is_empty() || rest.starts_with('#') {
                Ok(value)
            } else {
                Err(format!("unexpected characters after closing {}", quote))
            };
        }
        if ch == '\\' && quote == '"' {
            let (_, escaped) = chars.next().ok_or("unterminated escape sequence")?;
            value.push(match escaped {
                'n' => '\n',
                'r' => '\r',
                't' => '\t',
                other => other,
            });
        } else {
            value.push(ch);
        }
    }
    Err(format!("unterminated {}-quoted value", if quote == '"' { "double" } else { "single" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_credentials_are_set() {
        let cfg = Config::from_lookup(
            lookup(&[("SUPABASE_URL", "https://abc.supabase.co/"), ("SUPABASE_KEY", "anon")]),
            Path::new("does-not-exist.txt"),
        )
        .unwrap();
        assert_eq!(cfg.supabase_url, "https://abc.supabase.co");
        assert_eq!(cfg.supabase_key, "anon");
        assert_eq!(cfg.sites_table, "sites_mapping");
        assert_eq!(cfg.clients_table, "clients_mapping");
        assert_eq!(cfg.sites_ttl, Duration::from_secs(60));
        assert_eq!(cfg.clients_ttl, Duration::from_secs(300));
        assert_eq!(cfg.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn overrides_and_unparseable_numbers() {
        let cfg = Config::from_lookup(
            lookup(&[
                ("SUPABASE_URL", "http://localhost:54321"),
                ("SUPABASE_KEY", "k"),
                ("SITES_TABLE", "sites"),
                ("SITES_CACHE_TTL_SECS", "5"),
                ("CLIENTS_CACHE_TTL_SECS", "soon"),
            ]),
            Path::new("does-not-exist.txt"),
        )
        .unwrap();
        assert_eq!(cfg.sites_table, "sites");
        assert_eq!(cfg.sites_ttl, Duration::from_secs(5));
        assert_eq!(cfg.clients_ttl, Duration::from_secs(300));
    }

    #[test]
    fn missing_url_or_key_is_an_error() {
        let err = Config::from_lookup(lookup(&[("SUPABASE_KEY", "k")]), Path::new("nope")).unwrap_err();
        assert!(err.contains("SUPABASE_URL"));

        let err = Config::from_lookup(lookup(&[("SUPABASE_URL", "http://x"), ("SUPABASE_KEY", " ")]), Path::new("nope"))
            .unwrap_err();
        assert!(err.contains("SUPABASE_KEY"));
    }

    #[test]
    fn key_file_is_the_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(KEY_FILE);
        fs::write(&path, "  from-file\n").unwrap();
        let cfg = Config::from_lookup(lookup(&[("SUPABASE_URL", "http://x")]), &path).unwrap();
        assert_eq!(cfg.supabase_key, "from-file");
    }

    #[test]
    fn env_lines() {
        assert_eq!(parse_env_line("   ").unwrap(), None);
        assert_eq!(parse_env_line("# comment").unwrap(), None);
        assert_eq!(
            parse_env_line("export SUPABASE_URL = http://x # local").unwrap(),
            Some(("SUPABASE_URL".into(), "http://x".into()))
        );
        assert_eq!(
            parse_env_line(r#"KEY="a\"b\nc" # trailing"#).unwrap(),
            Some(("KEY".into(), "a\"b\nc".into()))
        );
        assert_eq!(
            parse_env_line(r"RAW='no \n escapes # here'").unwrap(),
            Some(("RAW".into(), r"no \n escapes # here".into()))
        );
        assert_eq!(parse_env_line("EMPTY=").unwrap(), Some(("EMPTY".into(), String::new())));
    }

    #[test]
    fn malformed_env_lines() {
        assert!(parse_env_line("NO_EQUALS").is_err());
        assert!(parse_env_line("=value").is_err());
        assert!(parse_env_line("BAD KEY=1").is_err());
        assert!(parse_env_line("OPEN=\"never closed").is_err());
        assert!(parse_env_line("OPEN='x' junk").is_err());
    }
}
