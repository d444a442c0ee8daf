use super::*;
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn partial_config_with_defaults() {
        let partial_toml = r#"
            [provider]
            chat_model = "gemini-1.5-flash"
        "#;

        let config: Config = toml::from_str(partial_toml).expect("should parse partial toml");
        assert_eq!(config.provider.chat_model, "gemini-1.5-flash");
        assert_eq!(config.provider.embedding_dimension, 768);
        assert_eq!(config.retrieval, RetrievalConfig::default());
        assert_eq!(config.database, DatabaseConfig::default());
    }

    #[test]
    fn invalid_toml_handling() {
        let invalid_toml = r#"
            [provider
            embedding_dimension = "wide"
        "#;

        let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
        assert!(result.is_err());
    }

    #[test]
    fn distance_metric_parsing() {
        let config: Config = toml::from_str("[database]\ndistance_metric = \"cosine\"\n")
            .expect("should parse metric");
        assert_eq!(config.database.distance_metric, DistanceMetric::Cosine);

        let result: Result<Config, toml::de::Error> =
            toml::from_str("[database]\ndistance_metric = \"manhattan\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn api_key_is_never_serialized() {
        let toml_str =
            toml::to_string_pretty(&Config::default()).expect("should serialize config");
        assert!(!toml_str.contains("api_key"));
        assert!(!toml_str.contains("base_dir"));
    }

    #[test]
    #[serial]
    fn config_dir_honours_environment_override() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let config_dir = temp_dir.path().join("custom-home");

        // SAFETY: serialized with the other environment-mutating tests
        unsafe { std::env::set_var(settings::CONFIG_DIR_ENV, &config_dir) };
        let resolved = get_config_dir();
        unsafe { std::env::remove_var(settings::CONFIG_DIR_ENV) };

        assert_eq!(resolved.expect("config dir resolves"), config_dir);
    }

    #[test]
    fn saved_file_is_readable_toml() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let config = Config {
            base_dir: temp_dir.path().join("nested"),
            ..Config::default()
        };
        config.save().expect("should save config");

        let content =
            fs::read_to_string(config.config_file_path()).expect("should read config file");
        assert!(content.contains("[provider]"));
        assert!(content.contains("[retrieval]"));
        assert!(content.contains("[database]"));
    }

    #[test]
    fn error_display_messages() {
        let errors = vec![
            ConfigError::InvalidUrl("invalid-url".to_string()),
            ConfigError::InvalidModel(String::new()),
            ConfigError::InvalidEmbeddingDimension(0),
            ConfigError::InvalidTimeout(0),
            ConfigError::InvalidRetrievalLimit(99),
        ];

        for error in errors {
            let message = format!("{error}");
            assert!(!message.is_empty());
            assert!(message.len() > 10);
        }
    }
}
