use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

use yieldr::ab::GroupWeights;
use yieldr::config::Config;
use yieldr::datalayer::{map_and_flatten, DataValue, Mapping};
use yieldr::delivery::HttpTransport;
use yieldr::referrer::ReferrerClassifier;
use yieldr::storage::{MemoryStore, StoredValue};
use yieldr::tracker::{PageContext, Tracker};

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "yieldr")]
#[command(about = "Yieldr tracking tag simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a page view and print the pixel it fires
    Track {
        /// Page URL
        #[arg(long)]
        url: String,
        /// Referrer URL
        #[arg(long, default_value = "")]
        referrer: String,
        /// JSON file holding cookies and session storage between runs
        #[arg(long)]
        state: Option<PathBuf>,
        /// Start from an empty session storage (a new tab)
        #[arg(long)]
        new_session: bool,
        /// Extra parameter as key=value, repeatable
        #[arg(long = "set", value_parser = parse_key_val)]
        set: Vec<(String, String)>,
        /// JSON data layer to map
        #[arg(long)]
        data_layer: Option<PathBuf>,
        /// JSON mapping of output key to dotted path
        #[arg(long, requires = "data_layer")]
        mapping: Option<PathBuf>,
        /// Copy every top-level data-layer property
        #[arg(long, requires = "data_layer")]
        all: bool,
        /// A/B distribution as a JSON object, e.g. '{"a":3,"b":1}'
        #[arg(long)]
        ab_groups: Option<String>,
        /// Collector host, overriding YIELDR_DOMAIN
        #[arg(long)]
        domain: Option<String>,
        /// Actually send the pixel and print returned piggybacks
        #[arg(long)]
        send: bool,
    },
    /// Classify a referrer URL
    Classify {
        url: String,
        /// Host of the page the referrer led to
        #[arg(long)]
        page_host: Option<String>,
    },
    /// Map and flatten a JSON data layer
    Map {
        #[arg(long)]
        source: PathBuf,
        #[arg(long)]
        mapping: Option<PathBuf>,
        #[arg(long)]
        all: bool,
    },
}

/// Browser storage persisted between CLI runs
#[derive(Debug, Default, Serialize, Deserialize)]
struct State {
    #[serde(default)]
    cookies: BTreeMap<String, StoredValue>,
    #[serde(default)]
    session: BTreeMap<String, StoredValue>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;

    match cli.command {
        Commands::Track {
            url,
            referrer,
            state,
            new_session,
            set,
            data_layer,
            mapping,
            all,
            ab_groups,
            domain,
            send,
        } => {
            if let Some(domain) = domain {
                config.domain = domain;
            }

            let stored = match &state {
                Some(path) => load_state(path)?,
                None => State::default(),
            };
            let cookies = Arc::new(MemoryStore::restore(stored.cookies));
            let session = Arc::new(MemoryStore::restore(stored.session));
            if new_session {
                session.clear();
            }

            let mut tracker = Tracker::new(config, cookies.clone(), session.clone());
            for (key, value) in set {
                tracker.set(key, value);
            }
            if let Some(path) = data_layer {
                let source: serde_json::Value = read_json(&path)?;
                let mapping = match mapping {
                    Some(path) => read_json::<Mapping>(&path)?,
                    None => Mapping::new(),
                };
                tracker.map(&DataValue::from(source), &mapping, all);
            }
            if let Some(groups) = ab_groups {
                let groups: GroupWeights =
                    serde_json::from_str(&groups).context("--ab-groups must be a JSON object")?;
                tracker.ab(Some(&groups));
            }

            let page_url = Url::parse(&url).with_context(|| format!("invalid page URL '{url}'"))?;
            let page = PageContext::new(page_url, referrer, chrono::Utc::now().timestamp());
            let request = tracker.track(&page);
            println!("{}", request.url);

            if send {
                let transport = HttpTransport::new(SEND_TIMEOUT)?;
                let placed = tracker.deliver(&request, &transport).await;
                info!(piggybacks = placed.len(), "pixel delivered");
                for markup in placed.iter().filter_map(|piggyback| piggyback.render()) {
                    println!("{markup}");
                }
            }

            println!("{}", serde_json::to_string_pretty(&tracker.report())?);

            if let Some(path) = state {
                save_state(
                    &path,
                    &State {
                        cookies: cookies.snapshot(),
                        session: session.snapshot(),
                    },
                )?;
            }
        }
        Commands::Classify { url, page_host } => {
            let classifier = ReferrerClassifier::new();
            let classification = match page_host {
                Some(host) => classifier.classify_for_page(&url, &host),
                None => classifier.classify(&url),
            };
            println!("{}", serde_json::to_string_pretty(&classification)?);
        }
        Commands::Map {
            source,
            mapping,
            all,
        } => {
            let source: serde_json::Value = read_json(&source)?;
            let mapping = match mapping {
                Some(path) => read_json::<Mapping>(&path)?,
                None => Mapping::new(),
            };
            let flat = map_and_flatten(&DataValue::from(source), &mapping, all);
            println!("{}", serde_json::to_string_pretty(&flat)?);
        }
    }

    Ok(())
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    Ok((key.to_string(), value.to_string()))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn load_state(path: &Path) -> Result<State> {
    if !path.exists() {
        info!(path = %path.display(), "state file missing, starting fresh");
        return Ok(State::default());
    }
    read_json(path)
}

fn save_state(path: &Path, state: &State) -> Result<()> {
    let raw = serde_json::to_string_pretty(state)?;
    std::fs::write(path, raw).with_context(|| format!("failed to write {}", path.display()))
}
