//! `mu-inspect`: answer relationship and profile queries from a persisted
//! merged users cache without contacting a homeserver.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use mu_core::{
    CachedProfile, ClientError, JsonFileStore, MatrixClient, MergeConfig, MergedUsers,
    ProfileInfo, Room, Session,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Collaborator for reading a cache without a homeserver
struct OfflineClient;

#[async_trait]
impl MatrixClient for OfflineClient {
    fn session(&self) -> Option<Session> {
        None
    }

    fn room(&self, _room_id: &str) -> Option<Arc<Room>> {
        None
    }

    async fn resolve_alias(&self, _alias: &str) -> Result<String, ClientError> {
        Err(ClientError::NoSession)
    }

    async fn peek_state(&self, _: &str, _: &str, _: &str) -> Result<Option<Value>, ClientError> {
        Err(ClientError::NoSession)
    }

    async fn join_room(&self, _room_id: &str) -> Result<(), ClientError> {
        Err(ClientError::NoSession)
    }

    async fn room_state(&self, _: &str, _: &str, _: &str) -> Result<Option<Value>, ClientError> {
        Err(ClientError::NoSession)
    }

    async fn profile_info(&self, _user_id: &str) -> Result<ProfileInfo, ClientError> {
        Err(ClientError::NoSession)
    }
}

fn cli() -> Command {
    Command::new("mu-inspect")
        .version(mu_core::VERSION)
        .about("Inspect a persisted merged users cache")
        .arg_required_else_help(true)
        .arg(
            Arg::new("dir")
                .long("dir")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Directory holding the cache document"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration; MU_* environment variables are used otherwise"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Output as JSON"),
        )
        .subcommand(Command::new("records").about("List localpart records"))
        .subcommand(Command::new("stats").about("Show cache statistics"))
        .subcommand(
            Command::new("parent")
                .about("Show the cached parent of an account")
                .arg(Arg::new("user").required(true).help("Account identifier")),
        )
        .subcommand(
            Command::new("children")
                .about("Show the cached children of a parent account")
                .arg(Arg::new("user").required(true).help("Account identifier")),
        )
        .subcommand(
            Command::new("profile")
                .about("Show the cached profile of an account")
                .arg(Arg::new("user").required(true).help("Account identifier"))
                .arg(
                    Arg::new("room")
                        .long("room")
                        .help("Room for a room-specific profile"),
                ),
        )
}

fn load_config(matches: &ArgMatches) -> Result<MergeConfig> {
    let Some(path) = matches.get_one::<PathBuf>("config") else {
        return Ok(MergeConfig::from_env());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    MergeConfig::from_toml_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

fn user_arg(args: &ArgMatches) -> Result<&str> {
    args.get_one::<String>("user")
        .map(String::as_str)
        .context("missing account identifier")
}

fn print(value: &Value, as_json: bool, text: impl FnOnce() -> String) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}

fn run(users: &MergedUsers, matches: &ArgMatches) -> Result<()> {
    let as_json = matches.get_flag("json");

    match matches.subcommand() {
        Some(("records", _)) => {
            let snapshot = users.snapshot();
            let mut localparts: Vec<_> = snapshot.localparts.iter().collect();
            localparts.sort_by(|a, b| a.0.cmp(b.0));
            print(&serde_json::to_value(&snapshot.localparts)?, as_json, || {
                localparts
                    .iter()
                    .map(|(lp, r)| {
                        format!("{lp}: {} <- [{}]", r.parent_user_id, r.children_user_ids.join(", "))
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        Some(("stats", _)) => {
            let stats = users.stats();
            print(&serde_json::to_value(&stats)?, as_json, || {
                format!(
                    "Localparts: {}\nProfiles: {}",
                    stats.localparts, stats.profiles
                )
            })
        }
        Some(("parent", args)) => {
            let user = user_arg(args)?;
            let parent = users.get_parent(user);
            print(&json!({ "user": user, "parent": parent }), as_json, || parent.clone())
        }
        Some(("children", args)) => {
            let user = user_arg(args)?;
            let children = users.children_cached(user);
            print(&json!({ "user": user, "children": children }), as_json, || {
                children.join("\n")
            })
        }
        Some(("profile", args)) => {
            let user = user_arg(args)?;
            let room = args.get_one::<String>("room").map(String::as_str);
            let profile = users.cached_profile(user, room);
            let value = match &profile {
                CachedProfile::NotCached => Value::Null,
                CachedProfile::CachedEmpty => json!({}),
                CachedProfile::Cached(p) => serde_json::to_value(p)?,
            };
            print(&value, as_json, || match profile {
                CachedProfile::NotCached => "(not cached)".to_string(),
                CachedProfile::CachedEmpty => "(no room-specific profile)".to_string(),
                CachedProfile::Cached(p) => format!(
                    "{} {}",
                    p.displayname.as_deref().unwrap_or("-"),
                    p.avatar_url.as_deref().unwrap_or("-")
                ),
            })
        }
        _ => Ok(()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    let config = load_config(&matches)?;
    let dir = matches
        .get_one::<PathBuf>("dir")
        .context("missing cache directory")?;
    let store = JsonFileStore::open(dir.clone())
        .with_context(|| format!("opening cache directory {}", dir.display()))?;
    debug!(dir = %dir.display(), key = %config.storage_key, "opening cache");

    let users = MergedUsers::new(Arc::new(OfflineClient), Arc::new(store), config);
    users.init();
    run(&users, &matches)
}
