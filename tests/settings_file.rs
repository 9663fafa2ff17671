use lnwallet_connect::WalletSettings;
use std::time::Duration;

#[test]
fn settings_load_from_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lnwallet.toml");
    std::fs::write(
        &path,
        r#"
client_id = "from-file"
credential_db_path = "/var/lib/lnwallet/credentials.db"
extension_discovery_timeout_ms = 750
scopes = ["account:read", "payments:send"]

[logging]
filter = "lnwallet_connect=debug"
"#,
    )
    .unwrap();

    let settings = WalletSettings::load(&path).unwrap();
    assert_eq!(settings.scopes, vec!["account:read", "payments:send"]);
    assert_eq!(settings.extension_discovery_timeout(), Duration::from_millis(750));
    assert!(settings.credential_db_path.is_some());
    assert_eq!(settings.logging.filter, "lnwallet_connect=debug");
}

#[test]
fn settings_load_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = WalletSettings::load(&dir.path().join("absent.toml")).unwrap_err();
    assert_eq!(err.code(), "CONFIG_ERROR");
}

#[test]
fn settings_with_bad_url_fail_validation() {
    let settings = WalletSettings::from_toml_str(
        r#"
client_id = "abc"
token_url = "not a url"
"#,
    )
    .unwrap();
    assert!(settings.validate().is_err());
}
