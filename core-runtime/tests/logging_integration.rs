//! Integration tests for logging system

use core_runtime::logging::{
    init_logging, redact_if_sensitive, redact_sas, LogFormat, LogLevel, LoggingConfig,
};
use core_runtime::Error;

#[test]
fn test_logging_initializes_once() {
    // The global subscriber can only be installed once per process
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_env(false);

    init_logging(config.clone()).expect("first initialization succeeds");
    tracing::info!(container = "recordings", "logging ready");

    let second = init_logging(config);
    assert!(matches!(second, Err(Error::Config(_))));
}

#[test]
fn test_credentials_are_redacted() {
    assert_eq!(redact_if_sensitive("SAS_KEY", "sv=2022&sig=abc"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("sas_token", "sig=abc"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("authorization", "Bearer x"), "[REDACTED]");
}

#[test]
fn test_signed_urls_lose_their_query() {
    let listing = "https://acct.blob.core.windows.net/recordings?restype=container&comp=list&sig=secret";

    let redacted = redact_if_sensitive("url", listing);

    assert!(!redacted.contains("secret"));
    assert_eq!(
        redacted,
        "https://acct.blob.core.windows.net/recordings?[REDACTED]"
    );
    assert_eq!(redact_sas(&redacted), redacted);
}

#[test]
fn test_plain_values_pass_through() {
    assert_eq!(redact_if_sensitive("path", "blob/recordings/a/1.json"), "blob/recordings/a/1.json");
    assert_eq!(
        redact_if_sensitive("bolo_link", "https://acct.blob.core.windows.net/recordings/a/1.wav"),
        "https://acct.blob.core.windows.net/recordings/a/1.wav"
    );
}
