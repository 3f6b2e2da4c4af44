use std::sync::Arc;
use std::time::Duration;

use crate::cli_args::*;
use crate::modules::auth::{
    clear_keyring_mock, handle_login, handle_logout, lock_keyring_tests_async,
    lock_keyring_tests_sync, seed_keyring_mock, KeyringStorage,
};
use crate::modules::system::{
    handle_config_command, resolve_target, CliConfig, CommandContext, StorageKind, Target,
};
use crate::{DEFAULT_ADDR, DEFAULT_CONTEXT};
use depot_session::{ClientConfig, Session, SessionManager, SessionPhase, SessionStorage};
use mockito::{Matcher, Server};
use serde_json::json;

fn set_context(name: &str, addr: &str, storage: Option<StorageKind>) -> ConfigArgs {
    ConfigArgs {
        command: ConfigCommand::SetContext(SetContextArgs {
            name: name.to_string(),
            addr: Some(addr.to_string()),
            identity_proxy_marker: None,
            reconcile_interval_secs: None,
            storage,
        }),
    }
}

fn stored_alice() -> String {
    json!({
        "user": {"id": 1, "username": "alice", "role": "USER", "permissions": []},
        "accessToken": "A1",
        "refreshToken": "R1",
        "isAuthenticated": true
    })
    .to_string()
}

fn keyring_target(context_name: &str, addr: &str) -> Target {
    Target {
        context_name: context_name.to_string(),
        addr: addr.to_string(),
        identity_proxy_marker: None,
        reconcile_interval: None,
        storage: StorageKind::Keyring,
    }
}

fn keyring_manager(target: &Target) -> SessionManager {
    let config = ClientConfig::parse(&target.addr).expect("config");
    SessionManager::new(config, Arc::new(KeyringStorage::new(&target.context_name)))
        .expect("manager")
}

#[test]
fn config_commands_manage_contexts() {
    let _guard = lock_keyring_tests_sync();
    clear_keyring_mock();
    let mut config = CliConfig::default();

    handle_config_command(
        ConfigArgs {
            command: ConfigCommand::SetContext(SetContextArgs {
                name: "lab".to_string(),
                addr: Some("https://warehouse-frontend.lab.example".to_string()),
                identity_proxy_marker: Some("warehouse-frontend".to_string()),
                reconcile_interval_secs: Some(60),
                storage: Some(StorageKind::Keyring),
            }),
        },
        &mut config,
    )
    .expect("set-context");

    let context = config.contexts.get("lab").expect("context");
    assert_eq!(config.current_context.as_deref(), Some("lab"));
    assert_eq!(context.addr, "https://warehouse-frontend.lab.example");
    assert_eq!(
        context.identity_proxy_marker.as_deref(),
        Some("warehouse-frontend")
    );
    assert_eq!(context.reconcile_interval_secs, Some(60));
    assert_eq!(context.storage, StorageKind::Keyring);

    handle_config_command(set_context("prod", "https://depot.example", None), &mut config)
        .expect("set-context prod");
    assert_eq!(config.current_context.as_deref(), Some("prod"));
    assert_eq!(
        config.contexts.get("prod").expect("prod").storage,
        StorageKind::File
    );

    let missing = handle_config_command(
        ConfigArgs {
            command: ConfigCommand::UseContext(UseContextArgs {
                name: "staging".to_string(),
            }),
        },
        &mut config,
    );
    assert!(missing.is_err());

    handle_config_command(
        ConfigArgs {
            command: ConfigCommand::UseContext(UseContextArgs {
                name: "lab".to_string(),
            }),
        },
        &mut config,
    )
    .expect("use-context");
    assert_eq!(config.current_context.as_deref(), Some("lab"));

    seed_keyring_mock("lab", &stored_alice());
    handle_config_command(
        ConfigArgs {
            command: ConfigCommand::DeleteContext(UseContextArgs {
                name: "lab".to_string(),
            }),
        },
        &mut config,
    )
    .expect("delete-context");
    assert!(!config.contexts.contains_key("lab"));
    assert_eq!(config.current_context, None);
    assert_eq!(
        KeyringStorage::new("lab").load().expect("load"),
        None
    );
}

#[test]
fn set_context_rejects_invalid_addr() {
    let mut config = CliConfig::default();
    let result = handle_config_command(set_context("bad", "not a url", None), &mut config);
    assert!(result.is_err());
    assert!(config.contexts.is_empty());
}

#[test]
fn resolve_target_merges_flags_and_context() {
    let mut config = CliConfig::default();
    handle_config_command(
        ConfigArgs {
            command: ConfigCommand::SetContext(SetContextArgs {
                name: "lab".to_string(),
                addr: Some("https://warehouse-frontend.lab.example".to_string()),
                identity_proxy_marker: Some("warehouse-frontend".to_string()),
                reconcile_interval_secs: Some(30),
                storage: None,
            }),
        },
        &mut config,
    )
    .expect("set-context");

    let target = resolve_target(None, None, &config).expect("target");
    assert_eq!(target.context_name, "lab");
    assert_eq!(target.addr, "https://warehouse-frontend.lab.example");
    assert_eq!(target.reconcile_interval, Some(Duration::from_secs(30)));

    let overridden =
        resolve_target(Some("http://127.0.0.1:9000".to_string()), None, &config).expect("target");
    assert_eq!(overridden.addr, "http://127.0.0.1:9000");
    assert_eq!(
        overridden.identity_proxy_marker.as_deref(),
        Some("warehouse-frontend")
    );

    assert!(resolve_target(None, Some("missing".to_string()), &config).is_err());

    let fallback = resolve_target(None, None, &CliConfig::default()).expect("target");
    assert_eq!(fallback.context_name, DEFAULT_CONTEXT);
    assert_eq!(fallback.addr, DEFAULT_ADDR);
    assert_eq!(fallback.storage, StorageKind::File);
}

#[test]
fn keyring_session_survives_restart_and_logout_clears_it() {
    let _guard = lock_keyring_tests_sync();
    clear_keyring_mock();
    seed_keyring_mock("ops", &stored_alice());

    let target = keyring_target("ops", DEFAULT_ADDR);
    let manager = keyring_manager(&target);
    assert_eq!(manager.phase(), SessionPhase::Authenticated);
    assert_eq!(manager.session().username(), Some("alice"));

    let ctx = CommandContext {
        manager: &manager,
        target: &target,
    };
    handle_logout(&ctx).expect("logout");
    assert_eq!(
        KeyringStorage::new("ops").load().expect("load"),
        Some(Session::default())
    );

    let restarted = keyring_manager(&target);
    assert_eq!(restarted.phase(), SessionPhase::Unauthenticated);
    assert!(restarted.session().is_empty());
}

#[test]
fn corrupt_keyring_record_starts_signed_out() {
    let _guard = lock_keyring_tests_sync();
    clear_keyring_mock();
    seed_keyring_mock("ops", "{ not json");

    let manager = keyring_manager(&keyring_target("ops", DEFAULT_ADDR));
    assert_eq!(manager.phase(), SessionPhase::Unauthenticated);
    assert!(manager.session().is_empty());
    assert_eq!(
        KeyringStorage::new("ops").load().expect("load"),
        Some(Session::default())
    );
}

#[tokio::test]
async fn login_command_stores_session_in_keyring() {
    let _guard = lock_keyring_tests_async().await;
    clear_keyring_mock();
    let mut server = Server::new_async().await;
    let login = server
        .mock("POST", "/api/auth/login")
        .match_body(Matcher::Json(json!({"username": "alice", "password": "pw"})))
        .with_status(200)
        .with_body(
            json!({
                "accessToken": "A1",
                "refreshToken": "R1",
                "user": {"id": 1, "username": "alice", "role": "USER", "permissions": []}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let target = keyring_target("ops", &server.url());
    let manager = keyring_manager(&target);
    let ctx = CommandContext {
        manager: &manager,
        target: &target,
    };
    handle_login(
        LoginArgs {
            username: Some(" alice ".to_string()),
            password: Some("pw".to_string()),
        },
        &ctx,
    )
    .await
    .expect("login");

    login.assert_async().await;
    let stored = KeyringStorage::new("ops")
        .load()
        .expect("load")
        .expect("session");
    assert_eq!(stored.access_token.as_deref(), Some("A1"));
    assert_eq!(stored.refresh_token.as_deref(), Some("R1"));
    assert!(stored.is_authenticated);
}
