use std::collections::HashMap;
use std::time::Duration;

use depot_session::SessionManager;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Default)]
pub struct CliConfig {
    #[serde(default)]
    pub current_context: Option<String>,
    #[serde(default)]
    pub contexts: HashMap<String, CliContext>,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct CliContext {
    pub addr: String,
    #[serde(default)]
    pub identity_proxy_marker: Option<String>,
    #[serde(default)]
    pub reconcile_interval_secs: Option<u64>,
    #[serde(default)]
    pub storage: StorageKind,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    #[default]
    File,
    Keyring,
}

/// Context settings after flags, environment and config file are merged.
pub struct Target {
    pub context_name: String,
    pub addr: String,
    pub identity_proxy_marker: Option<String>,
    pub reconcile_interval: Option<Duration>,
    pub storage: StorageKind,
}

pub struct CommandContext<'a> {
    pub manager: &'a SessionManager,
    pub target: &'a Target,
}
