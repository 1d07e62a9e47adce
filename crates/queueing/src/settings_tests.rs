//! Tests for layered queueing settings.

use super::*;
use serial_test::serial;
use std::io::Write;

const DEV_CONNECTION: &str = "UseDevelopmentStorage=true";

/// Remove every QUEUEING__ variable so tests start from a clean environment
fn clear_environment() {
    for (key, _) in std::env::vars() {
        if key.starts_with("QUEUEING__") {
            std::env::remove_var(key);
        }
    }
}

fn write_settings_file(extension: &str, contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(extension)
        .tempfile()
        .expect("temp file");
    file.write_all(contents.as_bytes()).expect("write settings");
    file
}

fn valid_settings() -> QueueingSettings {
    QueueingSettings {
        connection_string: Some(DEV_CONNECTION.to_string()),
        queue_name: "orders".to_string(),
        ..QueueingSettings::default()
    }
}

// ============================================================================
// Loading Tests
// ============================================================================

mod loading_tests {
    use super::*;

    /// Defaults apply when nothing is configured
    #[test]
    #[serial]
    fn test_load_without_sources_uses_defaults() {
        clear_environment();

        let settings = QueueingSettings::load(None).unwrap();

        assert_eq!(settings, QueueingSettings::default());
        assert_eq!(settings.provider, ProviderType::AzureStorage);
        assert_eq!(settings.visibility_timeout_seconds, 30);
        assert_eq!(settings.time_to_live_seconds, 7 * 24 * 60 * 60);
    }

    /// YAML file values are read
    #[test]
    #[serial]
    fn test_load_from_yaml_file() {
        clear_environment();
        let file = write_settings_file(
            ".yaml",
            r#"
provider: azure_storage
connection_string: "UseDevelopmentStorage=true"
queue_name: orders
visibility_timeout_seconds: 120
time_to_live_seconds: 0
service_version: "2019-12-12"
message_encoding: text
"#,
        );

        let settings = QueueingSettings::load(Some(file.path())).unwrap();

        assert_eq!(settings.queue_name, "orders");
        assert_eq!(settings.visibility_timeout_seconds, 120);
        assert_eq!(settings.time_to_live_seconds, 0);
        assert_eq!(settings.service_version, Some(AzureServiceVersion::V2019_12_12));
        assert_eq!(settings.message_encoding, MessageEncoding::Text);
        assert!(settings.validate().is_ok());
    }

    /// TOML files are accepted too
    #[test]
    #[serial]
    fn test_load_from_toml_file() {
        clear_environment();
        let file = write_settings_file(
            ".toml",
            "provider = \"in_memory\"\nqueue_name = \"jobs\"\n",
        );

        let settings = QueueingSettings::load(Some(file.path())).unwrap();

        assert_eq!(settings.provider, ProviderType::InMemory);
        assert_eq!(settings.queue_name, "jobs");
    }

    /// Environment variables override file values
    #[test]
    #[serial]
    fn test_environment_overrides_file() {
        clear_environment();
        let file = write_settings_file(".yaml", "queue_name: orders\nvisibility_timeout_seconds: 10\n");
        std::env::set_var("QUEUEING__QUEUE_NAME", "invoices");
        std::env::set_var("QUEUEING__VISIBILITY_TIMEOUT_SECONDS", "90");

        let settings = QueueingSettings::load(Some(file.path()));
        clear_environment();
        let settings = settings.unwrap();

        assert_eq!(settings.queue_name, "invoices");
        assert_eq!(settings.visibility_timeout_seconds, 90);
    }

    /// A missing explicit file is an error
    #[test]
    #[serial]
    fn test_missing_file_is_error() {
        clear_environment();

        let result = QueueingSettings::load(Some(Path::new("/nonexistent/queueing.yaml")));

        assert!(matches!(result, Err(ConfigurationError::Parsing { .. })));
    }

    /// A value of the wrong type is an error
    #[test]
    #[serial]
    fn test_malformed_value_is_error() {
        clear_environment();
        let file = write_settings_file(".yaml", "visibility_timeout_seconds: soon\n");

        let result = QueueingSettings::load(Some(file.path()));

        assert!(matches!(result, Err(ConfigurationError::Parsing { .. })));
    }
}

// ============================================================================
// Validation Tests
// ============================================================================

mod validation_tests {
    use super::*;

    #[test]
    fn test_valid_settings() {
        assert!(valid_settings().validate().is_ok());
    }

    #[test]
    fn test_missing_queue_name() {
        let settings = QueueingSettings {
            queue_name: String::new(),
            ..valid_settings()
        };

        assert!(matches!(
            settings.validate(),
            Err(ConfigurationError::Missing { ref key }) if key == "queue_name"
        ));
    }

    #[test]
    fn test_invalid_queue_name() {
        let settings = QueueingSettings {
            queue_name: "Orders_Queue".to_string(),
            ..valid_settings()
        };

        assert!(matches!(
            settings.validate(),
            Err(ConfigurationError::Invalid { .. })
        ));
    }

    #[test]
    fn test_azure_requires_connection_string() {
        let settings = QueueingSettings {
            connection_string: None,
            ..valid_settings()
        };

        assert!(matches!(
            settings.validate(),
            Err(ConfigurationError::Missing { ref key }) if key == "connection_string"
        ));
    }

    #[test]
    fn test_in_memory_does_not_require_connection_string() {
        let settings = QueueingSettings {
            provider: ProviderType::InMemory,
            connection_string: None,
            ..valid_settings()
        };

        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_negative_durations_rejected() {
        let settings = QueueingSettings {
            time_to_live_seconds: -1,
            ..valid_settings()
        };

        assert!(matches!(
            settings.validate(),
            Err(ConfigurationError::Invalid { .. })
        ));
    }

    #[test]
    fn test_out_of_range_durations_rejected() {
        let settings = QueueingSettings {
            time_to_live_seconds: i64::MAX,
            ..valid_settings()
        };

        assert!(matches!(
            settings.validate(),
            Err(ConfigurationError::Invalid { ref message }) if message.contains("time_to_live_seconds")
        ));
        assert!(matches!(
            settings.lease_policy(),
            Err(QueueError::InvalidArgument { .. })
        ));
        assert!(create_provider(&settings).is_err());
    }
}

// ============================================================================
// Provider Construction Tests
// ============================================================================

mod provider_tests {
    use super::*;

    #[test]
    fn test_to_provider_config_for_azure() {
        let settings = QueueingSettings {
            service_version: Some(AzureServiceVersion::V2023_11_03),
            request_timeout_seconds: 5,
            ..valid_settings()
        };

        match settings.to_provider_config().unwrap() {
            ProviderConfig::AzureStorage(config) => {
                assert_eq!(config.queue_name, "orders");
                assert_eq!(config.service_version, Some(AzureServiceVersion::V2023_11_03));
                assert_eq!(config.request_timeout, std::time::Duration::from_secs(5));
                assert_eq!(config.policy, LeasePolicy::default());
            }
            other => panic!("Expected Azure config, got: {:?}", other),
        }
    }

    #[test]
    fn test_create_in_memory_provider() {
        let settings = QueueingSettings {
            provider: ProviderType::InMemory,
            visibility_timeout_seconds: 5,
            time_to_live_seconds: 60,
            ..valid_settings()
        };

        let provider = create_provider(&settings).unwrap();

        assert_eq!(provider.provider_type(), ProviderType::InMemory);
        assert_eq!(provider.policy().visibility_timeout, Duration::seconds(5));
        assert_eq!(provider.policy().time_to_live, Duration::seconds(60));
    }

    #[test]
    fn test_create_provider_reports_missing_setting() {
        let settings = QueueingSettings {
            connection_string: None,
            ..valid_settings()
        };

        let result = create_provider(&settings);

        assert!(matches!(
            result,
            Err(QueueError::InvalidArgument { ref field, .. }) if field == "connection_string"
        ));
    }
}

// ============================================================================
// Redaction Tests
// ============================================================================

mod redaction_tests {
    use super::*;

    #[test]
    fn test_redact_account_key() {
        let redacted =
            redact_connection_string("AccountName=acct;AccountKey=c2VjcmV0;EndpointSuffix=core.windows.net");

        assert_eq!(
            redacted,
            "AccountName=acct;AccountKey=<redacted>;EndpointSuffix=core.windows.net"
        );
    }

    #[test]
    fn test_redact_shared_access_signature() {
        let redacted = redact_connection_string(
            "QueueEndpoint=https://acct.queue.core.windows.net;SharedAccessSignature=sv=2021&sig=abc",
        );

        assert!(!redacted.contains("sig=abc"));
        assert!(redacted.starts_with("QueueEndpoint=https://acct.queue.core.windows.net;"));
    }

    #[test]
    fn test_debug_output_is_redacted() {
        let settings = QueueingSettings {
            connection_string: Some("AccountName=acct;AccountKey=c2VjcmV0".to_string()),
            ..valid_settings()
        };

        let rendered = format!("{:?}", settings);

        assert!(!rendered.contains("c2VjcmV0"));
        assert!(rendered.contains("AccountName=acct"));
    }
}
