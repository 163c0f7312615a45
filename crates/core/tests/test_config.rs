//! Tests for configuration parsing

use ruleplug::config::{PluginConfig, CONFIG_FILENAME};
use ruleplug::RuleplugConfig;
use std::path::PathBuf;

#[test]
fn test_serialize_config() {
    let config = RuleplugConfig::default();
    let toml_str = toml::to_string(&config).unwrap();
    assert!(toml_str.contains("fail_on"));
}

#[test]
fn test_parse_plugins_and_rules() {
    let toml_str = r#"
[general]
fix = true
only = ["terraform_comment_syntax"]

[[plugin]]
name = "aws"
path = "/opt/ruleplug/plugins/ruleplug-ruleset-aws"

[[plugin]]
name = "google"
path = "bin/ruleplug-ruleset-google"
enabled = false

[rule.terraform_comment_syntax]
enabled = false

[rule.resource_allowed_values]
resource = "aws_instance"
values = ["t2.micro"]
"#;

    let config: RuleplugConfig = toml::from_str(toml_str).unwrap();
    assert!(config.general.fix);
    assert_eq!(config.general.format, "terminal");
    assert_eq!(config.plugins.len(), 2);
    assert_eq!(
        config.plugins[0],
        PluginConfig {
            name: "aws".to_string(),
            path: PathBuf::from("/opt/ruleplug/plugins/ruleplug-ruleset-aws"),
            enabled: true,
        }
    );
    assert!(!config.plugins[1].enabled);

    let global = config.global_config();
    assert!(global.fix);
    assert_eq!(global.only, vec!["terraform_comment_syntax"]);
    assert!(!global.rules["terraform_comment_syntax"].enabled);
    assert!(!global.rules.contains_key("resource_allowed_values"));
}

#[test]
fn test_find_and_load_walks_up() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("modules").join("network");
    std::fs::create_dir_all(&nested).unwrap();

    let mut config = RuleplugConfig::default();
    config.general.fail_on = "warning".to_string();
    config.save(&dir.path().join(CONFIG_FILENAME)).unwrap();

    let loaded = RuleplugConfig::find_and_load(&nested).unwrap();
    assert_eq!(loaded.general.fail_on, "warning");
}

#[test]
fn test_invalid_rule_attribute_name() {
    let config: RuleplugConfig = toml::from_str(
        r#"
[rule.some_rule]
"not an identifier" = 1
"#,
    )
    .unwrap();
    assert!(config.rule_config_source("some_rule").unwrap().is_err());
}
