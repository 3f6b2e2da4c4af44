pub(crate) mod args;
pub(crate) mod config;
pub(crate) mod types;

pub(crate) use config::{
    build_manager, handle_config_command, load_config, resolve_target, save_config,
};
pub(crate) use types::CommandContext;
#[cfg(test)]
pub(crate) use types::{CliConfig, StorageKind, Target};
