//! Registry: primary routing, status cache, persistence

use ai_agent_providers::config::store::{ConfigStore, FileConfigStore, MemoryConfigStore, CONFIG_KEY};
use ai_agent_providers::config::{BackendKind, ProvidersConfig};
use ai_agent_providers::types::{ChatOptions, ChatRequest, Message};
use ai_agent_providers::{Error, ProviderRegistry};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::integration::mock_server::{chat_completion, closed_port_url, config_for, MockBackend};

fn two_local_backends(ollama_url: &str, lmstudio_url: &str, primary: Option<&str>) -> ProvidersConfig {
    let mut providers = BTreeMap::new();
    providers.insert("ollama".to_string(), config_for(BackendKind::Ollama, ollama_url));
    providers.insert("lmstudio".to_string(), config_for(BackendKind::LmStudio, lmstudio_url));
    ProvidersConfig {
        primary: primary.map(String::from),
        providers,
        ..Default::default()
    }
}

#[tokio::test]
async fn status_is_cached_until_forced() {
    let mut ollama = MockBackend::new().await;
    let probe = ollama.mock_probe("/api/tags", 200, 2).await;
    let registry = ProviderRegistry::new(None);
    registry
        .update_config(two_local_backends(&ollama.url(), &closed_port_url(), Some("ollama")))
        .await
        .unwrap();

    let first = registry.get_status(false).await;
    assert!(first["ollama"].available);
    assert!(first["ollama"].configured);
    assert!(first["ollama"].is_primary);
    assert!(!first["lmstudio"].available);
    assert!(first["lmstudio"].configured);

    // Served from the snapshot.
    let cached = registry.get_status(false).await;
    assert_eq!(cached, first);

    registry.get_status(true).await;
    probe.assert_async().await;
}

#[tokio::test]
async fn config_update_invalidates_status() {
    let mut ollama = MockBackend::new().await;
    let probe = ollama.mock_probe("/api/tags", 200, 2).await;
    let registry = ProviderRegistry::new(None);
    let config = two_local_backends(&ollama.url(), &closed_port_url(), None);
    registry.update_config(config).await.unwrap();

    assert!(!registry.get_status(false).await["ollama"].is_primary);
    registry.set_primary("ollama").await.unwrap();
    assert!(registry.get_status(false).await["ollama"].is_primary);
    probe.assert_async().await;
}

#[tokio::test]
async fn chat_goes_to_primary_only() {
    let mut lmstudio = MockBackend::new().await;
    let mut ollama = MockBackend::new().await;
    let lm_mock = lmstudio
        .mock_json(
            "/chat/completions",
            200,
            chat_completion(json!({"role": "assistant", "content": "from lmstudio"})),
            1,
        )
        .await;
    let ollama_mock = ollama
        .mock_json("/api/chat", 200, json!({"message": {"role": "assistant", "content": "x"}}), 0)
        .await;

    let registry = ProviderRegistry::new(Some(Arc::new(MemoryConfigStore::new())));
    registry
        .update_config(two_local_backends(&ollama.url(), &lmstudio.url(), Some("lmstudio")))
        .await
        .unwrap();

    let request = ChatRequest::new(vec![Message::user("hi")], vec![], ChatOptions::default());
    let result = registry.chat(&request).await.unwrap();
    assert_eq!(result.text, "from lmstudio");
    lm_mock.assert_async().await;
    ollama_mock.assert_async().await;
}

#[tokio::test]
async fn failing_primary_is_not_replaced() {
    let mut ollama = MockBackend::new().await;
    let ollama_mock = ollama
        .mock_json("/api/chat", 200, json!({"message": {"role": "assistant", "content": "x"}}), 0)
        .await;

    let registry = ProviderRegistry::new(None);
    registry
        .update_config(two_local_backends(&ollama.url(), &closed_port_url(), Some("lmstudio")))
        .await
        .unwrap();

    let request = ChatRequest::new(vec![Message::user("hi")], vec![], ChatOptions::default());
    let err = registry.chat(&request).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
    ollama_mock.assert_async().await;
}

#[tokio::test]
async fn missing_key_surfaces_remediation() {
    let registry = ProviderRegistry::new(None);
    let mut config = ProvidersConfig::default();
    config.primary = Some("openrouter".into());
    config.providers.insert(
        "openrouter".into(),
        config_for(BackendKind::OpenRouter, &closed_port_url()),
    );
    registry.update_config(config).await.unwrap();

    let request = ChatRequest::new(vec![Message::user("hi")], vec![], ChatOptions::default());
    match registry.chat(&request).await {
        Err(err @ Error::ProviderNotConfigured { .. }) => {
            assert_eq!(err.code(), "PROVIDER_NOT_CONFIGURED");
            assert!(err.remediation().is_some());
        }
        // An OPENROUTER_API_KEY in the environment configures the provider.
        Err(Error::Transport(_)) if std::env::var("OPENROUTER_API_KEY").is_ok() => {}
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn file_store_round_trip() {
    let path = std::env::temp_dir().join(format!("agent-providers-{}.yaml", uuid::Uuid::new_v4()));
    let store: Arc<dyn ConfigStore> = Arc::new(FileConfigStore::new(&path));

    let registry = ProviderRegistry::new(Some(store.clone()));
    registry.load().await;
    registry.set_primary("ollama").await.unwrap();

    let saved = store.load(CONFIG_KEY).await.unwrap().unwrap();
    assert_eq!(saved["primary"], "ollama");

    let reopened = ProviderRegistry::new(Some(store));
    let config = reopened.load().await;
    assert_eq!(config.primary.as_deref(), Some("ollama"));
    assert_eq!(reopened.primary().await.unwrap().config().kind, BackendKind::Ollama);

    let _ = std::fs::remove_file(&path);
}
