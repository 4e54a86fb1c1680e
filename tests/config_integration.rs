use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use storefront_chat::config::AppConfig;

// Helper to clear environment variables that might interfere with tests
fn clear_env_vars() {
    // SAFETY: tests touching the environment are serialized.
    unsafe {
        env::remove_var("STOREFRONT_SERVER__PORT");
        env::remove_var("STOREFRONT_RAG__TOP_K");
        env::remove_var("STOREFRONT_LLM__BASE_URL");
        env::remove_var("GOOGLE_API_KEY");
        env::remove_var("GEMINI_MODEL");
        env::remove_var("CONFIG_FILE");
        env::remove_var("PORT");
    }
}

fn load(args: &[&str]) -> Result<AppConfig, config::ConfigError> {
    let mut argv = vec!["storefront-chat"];
    argv.extend_from_slice(args);
    AppConfig::load_from_args(argv)
}

#[test]
#[serial]
fn test_default_config() {
    clear_env_vars();

    let config = load(&[]).expect("defaults should load");
    assert_eq!(config.server.port, 5000);
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.llm.model, "gemini-1.5-flash");
    assert_eq!(config.llm.fallback_model, "gemini-1.5-flash-8b");
    assert_eq!(config.llm.api_key, None);
    assert!((config.llm.temperature - 0.3).abs() < f32::EPSILON);
    assert_eq!(config.llm.max_output_tokens, 256);
    assert_eq!(config.rag.top_k, 3);
    assert_eq!(config.rag.persist_dir, PathBuf::from("chroma_db"));
    assert_eq!(config.rag.collection, "products");
    assert_eq!(config.widget.endpoint, "/chat");
    assert_eq!(config.widget.request_timeout_secs, None);
}

#[test]
#[serial]
fn test_env_override() {
    clear_env_vars();
    // SAFETY: serialized.
    unsafe {
        env::set_var("STOREFRONT_SERVER__PORT", "9090");
        env::set_var("STOREFRONT_RAG__TOP_K", "5");
    }

    let config = load(&[]).expect("Failed to load config");
    assert_eq!(config.server.port, 9090);
    assert_eq!(config.rag.top_k, 5);

    clear_env_vars();
}

#[test]
#[serial]
fn test_google_variables() {
    clear_env_vars();
    // SAFETY: serialized.
    unsafe {
        env::set_var("GOOGLE_API_KEY", "test-key");
        env::set_var("GEMINI_MODEL", "gemini-1.5-pro");
    }

    let config = load(&[]).expect("Failed to load config");
    assert_eq!(config.llm.api_key.as_deref(), Some("test-key"));
    assert_eq!(config.llm.model, "gemini-1.5-pro");
    assert!(!format!("{:?}", config.llm).contains("test-key"));

    clear_env_vars();
}

#[test]
#[serial]
fn test_file_load() {
    clear_env_vars();

    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("storefront.yaml");
    fs::write(
        &file_path,
        r#"
server:
  port: 7070
rag:
  collection: catalogue
widget:
  request_timeout_secs: 15
"#,
    )
    .expect("Failed to write temp config");

    // SAFETY: serialized.
    unsafe {
        env::set_var("CONFIG_FILE", &file_path);
    }

    let config = load(&[]).expect("Failed to load config from file");
    assert_eq!(config.server.port, 7070);
    assert_eq!(config.rag.collection, "catalogue");
    assert_eq!(
        config.widget.request_timeout(),
        Some(std::time::Duration::from_secs(15))
    );

    clear_env_vars();
}

#[test]
#[serial]
fn test_missing_explicit_file_fails() {
    clear_env_vars();
    assert!(load(&["--config", "/nonexistent/storefront.yaml"]).is_err());
}

#[test]
#[serial]
fn test_cli_overrides_env() {
    clear_env_vars();
    // SAFETY: serialized.
    unsafe {
        env::set_var("STOREFRONT_SERVER__PORT", "9090");
    }

    let config = load(&["serve", "--port", "8081", "--host", "0.0.0.0"]).unwrap();
    assert_eq!(config.server.port, 8081);
    assert_eq!(config.server.host, "0.0.0.0");

    let config = load(&["build-index", "--csv", "data/items.csv"]).unwrap();
    assert_eq!(config.rag.csv_path, PathBuf::from("data/items.csv"));
    assert_eq!(config.server.port, 9090);

    let config = load(&["chat", "--url", "http://shop.local:5000"]).unwrap();
    assert_eq!(config.widget.server_url, "http://shop.local:5000");

    clear_env_vars();
}

#[test]
#[serial]
fn test_invalid_values_rejected() {
    clear_env_vars();
    // SAFETY: serialized.
    unsafe {
        env::set_var("STOREFRONT_RAG__TOP_K", "0");
    }
    assert!(load(&[]).is_err());

    clear_env_vars();
}
