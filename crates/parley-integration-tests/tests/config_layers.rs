//! Integration tests for layered configuration feeding the escalation path.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::ChatInjector;
use parley_approval::{EscalationCoordinator, PermissionEngine, ResolutionCause};
use parley_config::merge::ConfigLayer;
use parley_config::{Config, LoadOptions, ShowFormat};
use parley_core::{EvalContext, Resource, Subject};
use parley_runtime::route_reply;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_layers_resolve_with_sources() {
    let home = TempDir::new().unwrap();
    write(
        &home,
        "config.toml",
        r#"
[escalation]
timeout_secs = 60

[[rules]]
action = "deny"
resource_kind = "command"
resource_name = "rm"
"#,
    );
    let extra = TempDir::new().unwrap();
    let file = write(
        &extra,
        "ci.toml",
        r#"
[escalation]
prompt_prefix = "ci_"
"#,
    );

    let options = LoadOptions::default()
        .with_home(home.path())
        .with_file(&file)
        .with_env("PARLEY_ESCALATION_TIMEOUT_SECS", "5")
        .with_env("PARLEY_LOG_LEVEL", "debug");
    let resolved = Config::load(&options).unwrap();

    // The user file set the timeout, so the env fallback does not apply.
    assert_eq!(resolved.config.escalation.timeout_secs, 60);
    assert_eq!(resolved.config.escalation.prompt_prefix, "ci_");
    assert_eq!(resolved.config.logging.level, "debug");
    assert_eq!(resolved.config.rules.len(), 1);
    assert_eq!(resolved.loaded_files.len(), 2);

    let sources = &resolved.field_sources;
    assert_eq!(sources.get("escalation.timeout_secs"), Some(&ConfigLayer::User));
    assert_eq!(sources.get("escalation.prompt_prefix"), Some(&ConfigLayer::File));
    assert_eq!(sources.get("logging.level"), Some(&ConfigLayer::Environment));
    assert_eq!(sources.get("logging.format"), Some(&ConfigLayer::Defaults));

    let json: serde_json::Value =
        serde_json::from_str(&resolved.show(ShowFormat::Json).unwrap()).unwrap();
    assert_eq!(json["rules"][0]["action"], "deny");
    assert_eq!(json["escalation"]["prompt_prefix"], "ci_");

    let toml = resolved.show(ShowFormat::Toml).unwrap();
    assert!(toml.contains("prompt_prefix = \"ci_\"  # [file]"));
}

#[test]
fn test_invalid_prefix_rejected_at_load() {
    let home = TempDir::new().unwrap();
    write(&home, "config.toml", "[escalation]\nprompt_prefix = \"no spaces\"\n");

    let err = Config::load(&LoadOptions::default().with_home(home.path())).unwrap_err();
    assert!(err.to_string().contains("escalation.prompt_prefix"));
}

#[tokio::test]
async fn test_configured_prefix_routes_replies() {
    let home = TempDir::new().unwrap();
    write(
        &home,
        "config.toml",
        "[escalation]\ntimeout_secs = 30\nprompt_prefix = \"ask_\"\n",
    );
    let cfg = Config::load(&LoadOptions::default().with_home(home.path()))
        .unwrap()
        .config;
    assert_eq!(cfg.escalation_timeout(), Duration::from_secs(30));

    let chat = Arc::new(ChatInjector::default());
    let engine = Arc::new(PermissionEngine::in_memory());
    let coordinator = EscalationCoordinator::new(engine, chat.clone())
        .with_default_timeout(cfg.escalation_timeout())
        .with_prompt_prefix(cfg.escalation.prompt_prefix.clone());

    let pending = coordinator
        .request_approval(
            Subject::agent("claude"),
            Resource::command("ls"),
            EvalContext::new().with_session("s-1"),
            None,
        )
        .await
        .unwrap();
    let prompt_id = chat.last_prompt();
    assert!(prompt_id.starts_with("ask_"));

    // A reply naming the default prefix is not an answer here.
    assert!(route_reply(&coordinator, "perm_123 allow_once").is_err());
    route_reply(&coordinator, &format!("{prompt_id} allow_once")).unwrap();

    let resolution = pending.await;
    assert_eq!(resolution.cause, ResolutionCause::Answered);
    assert!(resolution.is_allowed());
}
