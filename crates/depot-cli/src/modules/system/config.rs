use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use depot_session::{ClientConfig, FileStorage, SessionManager, SessionStorage};
use tracing::debug;

use super::types::{CliConfig, CliContext, StorageKind, Target};
use crate::cli_args::{ConfigArgs, ConfigCommand};
use crate::modules::auth::{delete_session_record, KeyringStorage};
use crate::{DEFAULT_ADDR, DEFAULT_CONTEXT};

pub(crate) fn handle_config_command(
    args: ConfigArgs,
    config: &mut CliConfig,
) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::SetContext(args) => {
            if let Some(addr) = args.addr.as_deref() {
                ClientConfig::parse(addr)?;
            }
            let entry = config
                .contexts
                .entry(args.name.clone())
                .or_insert_with(|| CliContext {
                    addr: DEFAULT_ADDR.to_string(),
                    identity_proxy_marker: None,
                    reconcile_interval_secs: None,
                    storage: StorageKind::default(),
                });
            if let Some(addr) = args.addr {
                entry.addr = addr;
            }
            if let Some(marker) = args.identity_proxy_marker {
                entry.identity_proxy_marker = Some(marker).filter(|value| !value.trim().is_empty());
            }
            if let Some(secs) = args.reconcile_interval_secs {
                entry.reconcile_interval_secs = Some(secs).filter(|secs| *secs > 0);
            }
            if let Some(storage) = args.storage {
                entry.storage = storage;
            }
            config.current_context = Some(args.name);
        }
        ConfigCommand::UseContext(args) => {
            if !config.contexts.contains_key(&args.name) {
                anyhow::bail!("context not found: {}", args.name);
            }
            config.current_context = Some(args.name);
        }
        ConfigCommand::CurrentContext => {
            if let Some(current) = config.current_context.clone() {
                println!("{current}");
            }
        }
        ConfigCommand::GetContexts => {
            let mut names: Vec<_> = config.contexts.keys().cloned().collect();
            names.sort();
            for name in names {
                let marker = if config.current_context.as_ref() == Some(&name) {
                    "*"
                } else {
                    " "
                };
                println!("{marker} {name}");
            }
        }
        ConfigCommand::DeleteContext(args) => {
            let Some(context) = config.contexts.remove(&args.name) else {
                anyhow::bail!("context not found: {}", args.name);
            };
            if config.current_context.as_deref() == Some(&args.name) {
                config.current_context = None;
            }
            forget_session(&args.name, context.storage)?;
        }
    }
    Ok(())
}

fn depot_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("HOME is not set"))?;
    Ok(Path::new(&home).join(".depot"))
}

fn config_path() -> anyhow::Result<PathBuf> {
    Ok(depot_dir()?.join("config.json"))
}

/// Session record for `context_name`; the default context keeps the plain
/// `session.json` name.
pub(crate) fn session_path(context_name: &str) -> anyhow::Result<PathBuf> {
    let file = if context_name == DEFAULT_CONTEXT {
        "session.json".to_string()
    } else {
        format!("session-{context_name}.json")
    };
    Ok(depot_dir()?.join(file))
}

pub(crate) fn load_config() -> anyhow::Result<CliConfig> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(CliConfig::default());
    }
    let contents = fs::read_to_string(path)?;
    let config = serde_json::from_str(&contents)?;
    Ok(config)
}

pub(crate) fn save_config(config: &CliConfig) -> anyhow::Result<()> {
    let path = config_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(config)?;
    fs::write(path, contents)?;
    Ok(())
}

pub(crate) fn resolve_target(
    addr_arg: Option<String>,
    context_arg: Option<String>,
    config: &CliConfig,
) -> anyhow::Result<Target> {
    let explicit = context_arg.is_some();
    let context_name = context_arg
        .or_else(|| config.current_context.clone())
        .unwrap_or_else(|| DEFAULT_CONTEXT.to_string());
    let context = config.contexts.get(&context_name);
    if explicit && context.is_none() && addr_arg.is_none() {
        anyhow::bail!("context not found: {}", context_name);
    }
    let addr = addr_arg
        .or_else(|| context.map(|ctx| ctx.addr.clone()))
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());
    Ok(Target {
        context_name,
        addr,
        identity_proxy_marker: context.and_then(|ctx| ctx.identity_proxy_marker.clone()),
        reconcile_interval: context
            .and_then(|ctx| ctx.reconcile_interval_secs)
            .map(Duration::from_secs),
        storage: context.map(|ctx| ctx.storage).unwrap_or_default(),
    })
}

pub(crate) fn build_manager(target: &Target) -> anyhow::Result<SessionManager> {
    let mut client_config = ClientConfig::parse(&target.addr)?;
    if let Some(marker) = target.identity_proxy_marker.clone() {
        client_config = client_config.with_identity_proxy_marker(marker);
    }
    if let Some(every) = target.reconcile_interval {
        client_config = client_config.with_reconcile_interval(every);
    }
    let storage: Arc<dyn SessionStorage> = match target.storage {
        StorageKind::File => Arc::new(FileStorage::new(session_path(&target.context_name)?)),
        StorageKind::Keyring => Arc::new(KeyringStorage::new(&target.context_name)),
    };
    debug!(
        context = %target.context_name,
        addr = %target.addr,
        storage = ?target.storage,
        "session manager configured"
    );
    Ok(SessionManager::new(client_config, storage)?)
}

fn forget_session(context_name: &str, storage: StorageKind) -> anyhow::Result<()> {
    match storage {
        StorageKind::File => {
            let path = session_path(context_name)?;
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        StorageKind::Keyring => delete_session_record(context_name)?,
    }
    Ok(())
}
