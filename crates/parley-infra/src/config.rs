//! Service configuration loader.
//!
//! Reads `parley.toml` from the data directory and deserializes it into
//! [`ServiceConfig`]. Falls back to defaults when the file is missing or
//! malformed rather than failing startup.

use std::path::Path;

use parley_types::config::ServiceConfig;

/// Load configuration from `{data_dir}/parley.toml`.
///
/// - If the file does not exist, returns [`ServiceConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns
///   the default.
/// - Otherwise returns the parsed config (partial files keep defaults for
///   the omitted fields).
pub async fn load_config(data_dir: &Path) -> ServiceConfig {
    let config_path = data_dir.join("parley.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No parley.toml found at {}, using defaults", config_path.display());
            return ServiceConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return ServiceConfig::default();
        }
    };

    match toml::from_str::<ServiceConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            ServiceConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).await;
        assert_eq!(config.turn_timeout_secs, 120);
        assert_eq!(config.max_tool_rounds, 8);
    }

    #[tokio::test]
    async fn load_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("parley.toml"),
            r#"
turn_timeout_secs = 45
channel_cache_capacity = 32

[whatsapp]
verify_token = "hunter2"
"#,
        )
        .await
        .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.turn_timeout_secs, 45);
        assert_eq!(config.channel_cache_capacity, 32);
        assert_eq!(config.whatsapp.verify_token.as_deref(), Some("hunter2"));
        // Omitted fields keep their defaults.
        assert_eq!(config.max_tool_rounds, 8);
    }

    #[tokio::test]
    async fn load_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("parley.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.turn_timeout_secs, 120);
    }
}
