mod config;
mod context;
mod controller;
mod db;
mod display;
mod error;
mod flags;
mod schema;
mod store;
mod suggestion;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::config::Config;
use crate::controller::Session;
use crate::display::ConsoleSurface;
use crate::error::{ContextError, Result};
use crate::schema::Screen;
use crate::store::SqliteStore;
use crate::suggestion::HttpSuggestionClient;

#[tokio::main]
async fn main() {
    // Load .env file (if present) before anything reads env vars
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    if args.iter().any(|a| a == "--default-config") {
        print!("{}", Config::default_config_contents());
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let (options, command) = split_args(&args[1..]);

    let config_path = option_value(&options, "--config").map(PathBuf::from);
    let mut config = match Config::load(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("failed to load config: {e}");
            std::process::exit(2);
        }
    };
    if let Some(patient) = option_value(&options, "--patient") {
        config.patient_id = patient.to_string();
    }

    if let Err(e) = run(&config, &command).await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(config: &Config, command: &[String]) -> Result<()> {
    let Some((name, rest)) = command.split_first() else {
        print_usage();
        return Ok(());
    };

    if name == "screens" {
        list_screens();
        return Ok(());
    }

    let session = open_session(config)?;

    match (name.as_str(), rest) {
        ("record", [screen, field, value]) => {
            let screen: Screen = screen.parse()?;
            let blob = session.record(screen, field, parse_value(value)).await?;
            println!("{}", serde_json::to_string_pretty(&blob)?);
        }
        ("suggest", [screen, field, value @ ..]) if value.len() <= 1 => {
            let screen: Screen = screen.parse()?;
            let value = value.first().map(String::as_str).unwrap_or_default();
            session.activate(screen, field, value).await?;
        }
        ("summary", [screen, pairs @ ..]) => {
            let screen: Screen = screen.parse()?;
            let values = parse_pairs(pairs)?;
            session.summarize(screen, &values).await?;
        }
        ("context", [screen]) => {
            let screen: Screen = screen.parse()?;
            let ctx = session.context(screen).await?;
            println!("{}", serde_json::to_string_pretty(&ctx.to_value())?);
        }
        ("blobs", []) => {
            for name in session.stored_blobs().await? {
                println!("{name}");
            }
        }
        ("flags", []) => {
            for flag in session.flag_highlights().await? {
                println!("{flag}");
            }
        }
        _ => {
            print_usage();
            return Err(ContextError::Config(format!("unrecognized command: {}", command.join(" "))));
        }
    }
    Ok(())
}

fn open_session(config: &Config) -> Result<Session> {
    let db_path = config.store_path();
    let conn = db::open(&db_path)?;
    let store = Arc::new(SqliteStore::new(Arc::new(Mutex::new(conn))));
    let transport = Arc::new(HttpSuggestionClient::new(&config.server)?);

    info!(
        store = %db_path.display(),
        server = %config.server.base_url,
        patient = config.patient().unwrap_or("-"),
        "session ready"
    );

    let mut session = Session::new(store, transport, Arc::new(ConsoleSurface))
        .discard_superseded(config.display.discard_superseded);
    if let Some(patient) = config.patient() {
        session = session.with_patient(patient);
    }
    Ok(session)
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

/// Separate `--flag value` options from the positional command.
fn split_args(args: &[String]) -> (Vec<(String, String)>, Vec<String>) {
    let mut options = Vec::new();
    let mut command = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" || arg == "--patient" {
            if let Some(v) = iter.next() {
                options.push((arg.clone(), v.clone()));
            }
        } else {
            command.push(arg.clone());
        }
    }
    (options, command)
}

fn option_value<'a>(options: &'a [(String, String)], name: &str) -> Option<&'a str> {
    options
        .iter()
        .rev()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

/// JSON arrays and objects are stored as such (checkbox groups,
/// `{choice, details}` entries); anything else is a plain string.
fn parse_value(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(v @ (Value::Array(_) | Value::Object(_))) => v,
        _ => Value::String(raw.to_string()),
    }
}

fn parse_pairs(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| ContextError::Config(format!("expected field=value, got {pair:?}")))
        })
        .collect()
}

fn list_screens() {
    for screen in Screen::ALL {
        let schema = screen.schema();
        let fields: Vec<_> = schema.fields.iter().map(|f| f.name).collect();
        let summary = if schema.summary.is_some() { " [summary]" } else { "" };
        println!("{:<22} {}{}", screen.slug(), fields.join(", "), summary);
    }
}

fn print_usage() {
    println!(
        "physio-context - clinical context accumulation and AI suggestions for physiotherapy assessments

USAGE:
    physio-context [OPTIONS] <COMMAND>

OPTIONS:
    --config <PATH>     Path to config file (default: ~/.config/physio-context/config.toml)
    --patient <ID>      Patient id for patient-scoped endpoints
    --default-config    Print default config to stdout and exit
    -h, --help          Print this help message

COMMANDS:
    screens                            List screens and their suggestion fields
    record <screen> <field> <value>    Store a value without requesting a suggestion
    suggest <screen> <field> [value]   Store the value and request a field suggestion
    summary <screen> [field=value...]  Request the screen summary
    context <screen>                   Print the context the screen's requests carry
    blobs                              List recorded screen blobs
    flags                              Print clinical flag blocks to highlight

ENVIRONMENT:
    PHYSIO_BASE_URL       Suggestion service base URL (overrides config)
    PHYSIO_COOKIE         Session cookie; its csrf_token entry is sent as X-CSRFToken
    PHYSIO_PATIENT_ID     Patient id (overrides config)
    RUST_LOG              Log filter (default: info)"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn options_split_from_command() {
        let (options, command) = split_args(&strings(&[
            "--patient", "PT-1", "suggest", "subjective", "--config", "/tmp/c.toml", "body_function",
        ]));
        assert_eq!(option_value(&options, "--patient"), Some("PT-1"));
        assert_eq!(option_value(&options, "--config"), Some("/tmp/c.toml"));
        assert_eq!(command, strings(&["suggest", "subjective", "body_function"]));
    }

    #[test]
    fn values_keep_json_structures() {
        assert_eq!(parse_value(r#"["a","b"]"#), serde_json::json!(["a", "b"]));
        assert_eq!(parse_value("42"), Value::String("42".into()));
        assert_eq!(parse_value("night pain"), Value::String("night pain".into()));
    }

    #[test]
    fn pairs_need_equals() {
        let values = parse_pairs(&strings(&["plan_details=SLR positive", "x=a=b"])).unwrap();
        assert_eq!(values["plan_details"], "SLR positive");
        assert_eq!(values["x"], "a=b");
        assert!(parse_pairs(&strings(&["oops"])).is_err());
    }
}
