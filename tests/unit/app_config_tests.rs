/*!
 * Tests for application configuration functionality
 */

use anyhow::Result;
use linebatch::app_config::{Config, LogLevel, TranslationConfig};
use crate::common;

/// Test default configuration values
#[test]
fn test_default_config_with_no_parameters_should_have_correct_defaults() {
    let config = Config::default();

    assert_eq!(config.translation.base_url, "https://api.mistral.ai/v1");
    assert_eq!(config.translation.model, "mistral-large-latest");
    assert_eq!(config.translation.temperature, 0.2);
    assert_eq!(config.translation.max_tokens, 4096);
    assert_eq!(config.translation.top_p, 1.0);
    assert_eq!(config.translation.top_k, -1);
    assert!(config.translation.stream);
    assert_eq!(config.translation.threads, 1);
    assert_eq!(config.translation.batch_size, 50);
    assert_eq!(config.translation.delay, 1.3);
    assert!(config.translation.system_prompt.contains("ID:::Text"));

    assert_eq!(config.files.input_file, "temp.txt");
    assert_eq!(config.files.output_file, "tran.txt");
    assert_eq!(config.files.checkpoint_file, "temp_translating.txt");
    assert_eq!(config.log_level, LogLevel::Info);

    assert!(config.validate().is_ok());
}

/// Test configuration validation
#[test]
fn test_config_validation_with_various_configs_should_validate_correctly() {
    let valid = TranslationConfig::default();

    let cases: Vec<(&str, TranslationConfig)> = vec![
        ("empty url", TranslationConfig { base_url: "  ".into(), ..valid.clone() }),
        ("bad url", TranslationConfig { base_url: "not a url".into(), ..valid.clone() }),
        ("empty model", TranslationConfig { model: String::new(), ..valid.clone() }),
        ("zero batch", TranslationConfig { batch_size: 0, ..valid.clone() }),
        ("zero tokens", TranslationConfig { max_tokens: 0, ..valid.clone() }),
        ("negative delay", TranslationConfig { delay: -0.5, ..valid.clone() }),
        ("nan delay", TranslationConfig { delay: f64::NAN, ..valid.clone() }),
        ("overflowing delay", TranslationConfig { delay: 1e20, ..valid.clone() }),
        ("hot temperature", TranslationConfig { temperature: 2.5, ..valid.clone() }),
        ("top_p above one", TranslationConfig { top_p: 1.5, ..valid.clone() }),
    ];

    for (name, config) in cases {
        assert!(config.validate().is_err(), "{} should be rejected", name);
    }

    // Thread counts are coerced rather than rejected
    let config = TranslationConfig { threads: 0, ..valid.clone() };
    assert!(config.validate().is_ok());
    assert_eq!(config.effective_threads(), 1);
}

/// Output and checkpoint files must be distinct
#[test]
fn test_config_validation_with_same_output_and_checkpoint_should_fail() {
    let mut config = Config::default();
    config.files.checkpoint_file = config.files.output_file.clone();
    assert!(config.validate().is_err());
}

/// A missing config file is created with defaults
#[test]
fn test_load_or_create_with_missing_file_should_write_defaults() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("conf.json");

    let config = Config::load_or_create(&path)?;

    assert!(path.exists());
    assert_eq!(config.translation.batch_size, 50);
    let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(written["files"]["output_file"], "tran.txt");
    assert_eq!(written["log_level"], "info");

    Ok(())
}

/// Missing fields fall back to their defaults
#[test]
fn test_load_or_create_with_partial_file_should_fill_defaults() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(
        temp_dir.path(),
        "conf.json",
        r#"{"translation": {"model": "small", "threads": 4, "stream": false}, "log_level": "debug"}"#,
    )?;

    let config = Config::load_or_create(&path)?;

    assert_eq!(config.translation.model, "small");
    assert_eq!(config.translation.threads, 4);
    assert!(!config.translation.stream);
    assert_eq!(config.translation.batch_size, 50);
    assert_eq!(config.files.input_file, "temp.txt");
    assert_eq!(config.log_level, LogLevel::Debug);

    Ok(())
}

/// Saved settings load back unchanged
#[test]
fn test_save_then_load_should_preserve_overrides() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("conf.json");

    let mut config = Config::default();
    config.translation.delay = 0.4;
    config.translation.top_k = 30;
    config.files.input_file = "strings.txt".to_string();
    config.save(&path)?;

    let loaded = Config::load_or_create(&path)?;
    assert_eq!(loaded.translation.delay, 0.4);
    assert_eq!(loaded.translation.top_k, 30);
    assert_eq!(loaded.files.input_file, "strings.txt");

    Ok(())
}

/// A malformed file is an error, not a silent reset
#[test]
fn test_load_or_create_with_invalid_json_should_fail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "conf.json", "{ not json")?;

    assert!(Config::load_or_create(&path).is_err());
    Ok(())
}
