use mineproxy::config::BridgeConfig;
use mineproxy::session::SessionSettings;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn file_values_override_defaults() {
    let file = write_config(
        r#"
allowed_senders = ["Steve", "Alex"]
drain_timeout = "750ms"

[listen]
host = "0.0.0.0"
port = 19131

[flow]
window_capacity = 25

[pyramid]
block = "sea_lantern"
max_size = 32

[census]
radius = 8
output_path = "out/census.json"
"#,
    );

    let config = BridgeConfig::load(Some(file.path())).expect("config loads");
    assert_eq!(config.listen.address(), "0.0.0.0:19131");
    assert_eq!(config.flow.window_capacity, 25);
    assert_eq!(config.flow.progress_interval, 1000);
    assert_eq!(config.pyramid.block, "sea_lantern");
    assert_eq!(config.pyramid.max_size, 32);
    assert_eq!(config.census.radius, 8);
    assert_eq!(config.census.output_path, PathBuf::from("out/census.json"));
    assert_eq!(config.allowed_senders, vec!["Steve", "Alex"]);
    assert_eq!(
        config.drain_timeout().expect("duration"),
        Duration::from_millis(750)
    );

    let settings = SessionSettings::from_config(&config);
    assert_eq!(settings.window_capacity, 25);
    assert_eq!(settings.max_pyramid_size, 32);
    assert_eq!(settings.pyramid_block, "sea_lantern");
}

#[test]
fn empty_block_name_is_rejected() {
    let file = write_config(
        r#"
[pyramid]
block = "  "
"#,
    );
    let err = BridgeConfig::load(Some(file.path())).expect_err("empty block");
    assert!(err.to_string().contains("pyramid.block"), "{err}");
}

#[test]
fn unparsable_drain_timeout_is_rejected() {
    let file = write_config(r#"drain_timeout = "whenever""#);
    let err = BridgeConfig::load(Some(file.path())).expect_err("bad duration");
    assert!(err.to_string().contains("drain_timeout"), "{err}");
}

#[test]
fn explicit_path_must_exist() {
    let missing = std::env::temp_dir().join("mineproxy-missing-config.toml");
    assert!(BridgeConfig::load(Some(&missing)).is_err());
}
