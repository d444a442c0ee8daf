use super::{non_empty, test_provider_connection};
use crate::config::ProviderConfig;

#[test]
fn model_names_must_not_be_blank() {
    assert!(non_empty(&"gemini-2.0-flash".to_string()).is_ok());
    assert!(non_empty(&String::new()).is_err());
    assert!(non_empty(&"   ".to_string()).is_err());
}

#[test]
fn unreachable_provider_reports_failure() {
    let provider = ProviderConfig {
        base_url: "http://127.0.0.1:1/v1beta/".to_string(),
        ..ProviderConfig::default()
    };
    assert!(!test_provider_connection(&provider));
}
