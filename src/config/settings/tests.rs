use super::*;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.provider.base_url, DEFAULT_BASE_URL);
    assert_eq!(config.provider.chat_model, "gemini-2.0-flash");
    assert_eq!(config.provider.embedding_model, "text-embedding-004");
    assert_eq!(config.provider.embedding_dimension, 768);
    assert_eq!(config.provider.retry_attempts, 1);
    assert_eq!(config.retrieval.chat_context_limit, 2);
    assert_eq!(config.retrieval.search_limit, 5);
    assert_eq!(config.database.distance_metric, DistanceMetric::L2);
}

#[test]
fn config_validation() {
    let config = Config::default();
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.provider.base_url = "ftp://example.com".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.provider.chat_model = "  ".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.provider.embedding_dimension = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.retrieval.search_limit = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.retrieval.chat_context_limit = 51;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config;
    invalid_config.database.file_name = "../escape.db".to_string();
    assert!(invalid_config.validate().is_err());
}

#[test]
fn provider_url_gains_trailing_slash() {
    let mut config = Config::default();
    config.provider.base_url = "http://localhost:8080/v1beta".to_string();
    let url = config
        .provider_url()
        .expect("should generate provider url successfully");
    assert_eq!(url.as_str(), "http://localhost:8080/v1beta/");
    assert_eq!(
        url.join("models/x:embedContent")
            .expect("join succeeds")
            .as_str(),
        "http://localhost:8080/v1beta/models/x:embedContent"
    );
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn setter_validation() {
    let mut config = ProviderConfig::default();

    assert!(config.set_base_url("https://proxy.example.com/".to_string()).is_ok());
    assert!(config.set_chat_model("gemini-1.5-pro".to_string()).is_ok());
    assert!(config.set_embedding_model("gemini-embedding-001".to_string()).is_ok());
    assert!(config.set_embedding_dimension(1536).is_ok());
    assert!(config.set_timeout_seconds(5).is_ok());
    assert!(config.set_retry_attempts(3).is_ok());

    assert!(config.set_base_url("not a url".to_string()).is_err());
    assert!(config.set_chat_model(String::new()).is_err());
    assert!(config.set_embedding_model("   ".to_string()).is_err());
    assert!(config.set_embedding_dimension(4097).is_err());
    assert!(config.set_timeout_seconds(0).is_err());
    assert!(config.set_retry_attempts(11).is_err());

    assert_eq!(config.base_url, "https://proxy.example.com/");
    assert_eq!(config.embedding_dimension, 1536);
}

#[test]
fn save_and_load_round_trip() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config::load(temp_dir.path()).expect("defaults load without a file");
    assert_eq!(config.base_dir, temp_dir.path());

    config.provider.embedding_dimension = 256;
    config.database.distance_metric = DistanceMetric::Cosine;
    config.save().expect("should save config");

    let loaded = Config::load(temp_dir.path()).expect("should load saved config");
    assert_eq!(loaded, config);
    assert_eq!(loaded.database_path(), temp_dir.path().join("vectors.db"));
}

#[test]
fn load_rejects_invalid_values() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(
        temp_dir.path().join("config.toml"),
        "[retrieval]\nsearch_limit = 0\n",
    )
    .expect("should write config");

    assert!(Config::load(temp_dir.path()).is_err());
}
