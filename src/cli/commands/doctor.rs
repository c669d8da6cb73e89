//! Doctor command - verify API keys, document store and configuration.

use crate::cli::Output;
use crate::config::{Settings, StoreProvider};
use console::style;
use std::path::Path;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings, config_path: &Path) -> anyhow::Result<()> {
    Output::header("Svar Doctor");
    println!();
    println!("Checking API keys, document store and configuration...\n");

    let mut checks = Vec::new();

    println!("{}", style("API Keys").bold());
    let key_checks = check_api_keys(settings);
    for check in &key_checks {
        check.print();
    }
    checks.extend(key_checks);

    println!();

    println!("{}", style("Document Store").bold());
    let store_check = check_store(settings);
    store_check.print();
    checks.push(store_check);

    println!();

    println!("{}", style("Configuration").bold());
    let config_check = check_config_file(config_path);
    config_check.print();
    checks.push(config_check);

    println!();

    // Summary
    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using Svar.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Svar is ready to use.");
    }

    Ok(())
}

/// Check every API key variable the configured providers read.
fn check_api_keys(settings: &Settings) -> Vec<CheckResult> {
    let mut vars: Vec<(&str, &str)> =
        vec![("generation", settings.generation.api_key_env.as_str())];

    if settings.retrieval.enabled {
        vars.push(("embedding", settings.embedding.api_key_env.as_str()));
        if settings.vector_store.provider == StoreProvider::Supabase {
            vars.push(("vector store", settings.vector_store.supabase_key_env.as_str()));
        }
    }

    // Gemini embedding and generation usually share one key
    vars.dedup_by(|a, b| a.1 == b.1);

    vars.into_iter()
        .map(|(purpose, var)| check_env_key(var, std::env::var(var).ok().as_deref(), purpose))
        .collect()
}

fn check_env_key(var: &str, value: Option<&str>, purpose: &str) -> CheckResult {
    match value {
        Some(key) if key.trim().is_empty() => CheckResult::error(
            var,
            "empty",
            &format!("Set with: export {}='...'", var),
        ),
        Some(key) => CheckResult::ok(var, &format!("configured for {} ({})", purpose, mask_key(key))),
        None => CheckResult::error(
            var,
            "not set",
            &format!("Set with: export {}='...'", var),
        ),
    }
}

/// Show only the first and last four characters of a key.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

fn check_store(settings: &Settings) -> CheckResult {
    if !settings.retrieval.enabled {
        return CheckResult::warning(
            "Retrieval",
            "disabled",
            "Replies will not use any document context",
        );
    }

    match settings.vector_store.provider {
        StoreProvider::Supabase => match &settings.vector_store.supabase_url {
            Some(url) => CheckResult::ok(
                "Supabase",
                &format!("{} (rpc: {})", url, settings.vector_store.match_function),
            ),
            None => CheckResult::error(
                "Supabase",
                "project URL not set",
                "Set supabase_url under [vector_store] in the config file",
            ),
        },
        StoreProvider::Sqlite => {
            let db_path = settings.sqlite_path();
            if db_path.exists() {
                let size = std::fs::metadata(&db_path)
                    .map(|m| format_size(m.len()))
                    .unwrap_or_else(|_| "unknown size".to_string());
                CheckResult::ok("SQLite", &format!("{} ({})", db_path.display(), size))
            } else {
                CheckResult::error(
                    "SQLite",
                    &format!("{} not found", db_path.display()),
                    "Point sqlite_path under [vector_store] at a populated documents database",
                )
            }
        }
    }
}

/// Check if config file exists.
fn check_config_file(config_path: &Path) -> CheckResult {
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: svar config edit",
        )
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_env_key() {
        assert_eq!(check_env_key("K", None, "generation").status, CheckStatus::Error);
        assert_eq!(check_env_key("K", Some("  "), "generation").status, CheckStatus::Error);

        let result = check_env_key("K", Some("AIzaSyExampleExampleExample1234"), "generation");
        assert_eq!(result.status, CheckStatus::Ok);
        assert!(result.message.contains("AIza...1234"));
        assert!(!result.message.contains("Example"));
    }

    #[test]
    fn test_mask_short_key() {
        assert_eq!(mask_key("abc"), "****");
    }

    #[test]
    fn test_shared_gemini_key_checked_once() {
        let settings = Settings::default();
        let checks = check_api_keys(&settings);
        let names: Vec<&str> = checks.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["GEMINI_API_KEY", "SUPABASE_SERVICE_ROLE_KEY"]);
    }

    #[test]
    fn test_store_checks() {
        let mut settings = Settings::default();
        assert_eq!(check_store(&settings).status, CheckStatus::Error);

        settings.vector_store.supabase_url = Some("https://abc.supabase.co".to_string());
        assert_eq!(check_store(&settings).status, CheckStatus::Ok);

        settings.retrieval.enabled = false;
        assert_eq!(check_store(&settings).status, CheckStatus::Warning);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.0 GB");
    }
}
