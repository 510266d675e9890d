use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use watchtree::core::callback::{Callback, LoggingCallback};
use watchtree::core::config::{CallbackRegistry, CallbackSpec, ConfigDocument};
use watchtree::core::{EnabledManager, Manager};
use watchtree::{demo, settings};

#[derive(Parser, Debug)]
#[command(name = "watchtree")]
#[command(about = "Check watchtree configuration documents and run a demo workload")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a configuration document and print its rules
    Check {
        /// Path to a TOML, YAML or JSON document
        file: PathBuf,
    },

    /// Run a synthetic workload and print every sample as JSON
    Demo {
        /// Configuration document to apply before the run
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of units of work
        #[arg(short, long, default_value = "1000")]
        iterations: u64,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Check { file } => check(&file),
        Command::Demo {
            config,
            iterations,
            pretty,
        } => run_demo(config.as_deref(), iterations, pretty),
    }
}

/// Load and validate a document, then describe it
fn check(path: &Path) -> Result<()> {
    let document = settings::load_document(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    document
        .validate(&CallbackRegistry::new())
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;

    print!("{}", describe(&document));
    Ok(())
}

fn describe(document: &ConfigDocument) -> String {
    let mut out = format!("{} monitor rule(s)\n", document.monitors.len());
    for rule in &document.monitors {
        let state = rule
            .state
            .map(|s| s.as_str())
            .unwrap_or("-");
        out.push_str(&format!("  {} => {}\n", rule.pattern, state));
    }
    out.push_str(&format!("{} callback(s)\n", document.callbacks.len()));
    for spec in &document.callbacks {
        describe_callback(spec, 1, &mut out);
    }
    out
}

fn describe_callback(spec: &CallbackSpec, level: usize, out: &mut String) {
    let indent = "  ".repeat(level);
    out.push_str(&format!("{}{}", indent, spec.kind));
    if !spec.properties.is_empty() {
        let properties: Vec<String> = spec
            .properties
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        out.push_str(&format!(" [{}]", properties.join(", ")));
    }
    out.push('\n');
    for rule in &spec.rules {
        out.push_str(&format!(
            "{}  {:?} pattern={} condition={} events={:?}\n",
            indent,
            rule.rule_type,
            rule.pattern.as_deref().unwrap_or("*"),
            rule.condition.as_deref().unwrap_or("-"),
            rule.events
        ));
    }
    for child in &spec.callbacks {
        describe_callback(child, level + 1, out);
    }
}

/// Run the demo workload on a fresh manager
fn run_demo(config: Option<&Path>, iterations: u64, pretty: bool) -> Result<()> {
    let manager = Arc::new(EnabledManager::new());
    let logging: Arc<dyn Callback> = Arc::new(LoggingCallback::new(tracing::Level::DEBUG));
    manager.callback().add_callback(logging);

    if let Some(path) = config {
        if !settings::configure(manager.as_ref(), path) {
            anyhow::bail!("Configuration {} was not applied", path.display());
        }
    }

    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(demo::run(manager, iterations))?;

    let json = if pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const VALID_TOML: &str = r#"
[[monitors]]
pattern = "*"
state = "disabled"

[[monitors]]
pattern = "db.*"
state = "enabled"

[[callbacks]]
kind = "filter"

[[callbacks.rules]]
type = "must"
condition = "split > 50ms"
events = ["stop"]

[[callbacks.callbacks]]
kind = "logging"
properties = { level = "warn" }
"#;

    #[test]
    fn parses_demo_arguments() {
        let args = Args::try_parse_from(["watchtree", "demo", "--iterations", "12", "--pretty"])
            .unwrap();
        match args.command {
            Command::Demo {
                config,
                iterations,
                pretty,
            } => {
                assert!(config.is_none());
                assert_eq!(iterations, 12);
                assert!(pretty);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(Args::try_parse_from(["watchtree", "check"]).is_err());
    }

    #[test]
    fn describes_a_valid_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watchtree.toml");
        fs::write(&path, VALID_TOML).unwrap();

        check(&path).unwrap();
        let text = describe(&settings::load_document(&path).unwrap());
        assert!(text.starts_with("2 monitor rule(s)\n"));
        assert!(text.contains("db.* => enabled"));
        assert!(text.contains("1 callback(s)\n  filter\n"));
        assert!(text.contains("    logging [level=warn]"));
    }

    #[test]
    fn check_rejects_a_bad_condition() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(
            &path,
            r#"{ "callbacks": [{ "kind": "filter", "rules": [{ "type": "must", "condition": "split >" }] }] }"#,
        )
        .unwrap();

        let err = check(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid configuration"));
    }

    #[test]
    fn demo_refuses_a_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        assert!(run_demo(Some(&path), 1, false).is_err());
    }
}
