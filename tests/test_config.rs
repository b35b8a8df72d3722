use std::collections::HashMap;
use std::time::Duration;

use webhook_proxy::config::{Config, ConfigDuration};
use webhook_proxy::http::request::Method;

const MINIMAL: &str = r#"
endpoints:
  - path: /github
    destinations:
      - url: http://localhost:3000/hook
"#;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| vars.get(key).cloned()
}

fn load_err(yaml: &str) -> String {
    format!("{:#}", Config::from_yaml(yaml).unwrap_err())
}

#[test]
fn test_config_defaults() {
    let cfg = Config::from_yaml(MINIMAL).unwrap();

    assert_eq!(cfg.server.port, 8080);
    assert_eq!(cfg.server.host, "0.0.0.0");
    assert_eq!(cfg.listen_addr(), "0.0.0.0:8080");
    assert_eq!(cfg.logging.level, "info");
    assert_eq!(cfg.logging.format, "json");
    assert_eq!(cfg.logging.output, "stdout");

    let endpoints = cfg.build_endpoints().unwrap();
    let dest = &endpoints[0].destinations[0];
    assert_eq!(dest.method, Method::POST);
    assert_eq!(dest.timeout, Duration::from_secs(5));
    assert_eq!(dest.retries, 0);
    assert_eq!(dest.retry_delay, Duration::ZERO);
    assert!(dest.headers.is_empty());
}

#[test]
fn test_config_full_destination() {
    let cfg = Config::from_yaml(
        r#"
server:
  host: 127.0.0.1
  port: 9000
logging:
  level: debug
  format: text
endpoints:
  - path: /stripe
    destinations:
      - url: https://billing.internal/hooks
        method: put
        headers:
          Authorization: Bearer abc
        timeout: 1500ms
        retries: 3
        retry_delay: 2s
      - url: http://audit.internal/log
        timeout: 10
"#,
    )
    .unwrap();

    assert_eq!(cfg.listen_addr(), "127.0.0.1:9000");
    assert_eq!(cfg.logging.level, "debug");

    let endpoints = cfg.build_endpoints().unwrap();
    assert_eq!(endpoints.len(), 1);
    assert_eq!(endpoints[0].path, "/stripe");
    assert_eq!(endpoints[0].destinations.len(), 2);

    let billing = &endpoints[0].destinations[0];
    assert_eq!(billing.url.as_str(), "https://billing.internal/hooks");
    assert_eq!(billing.method, Method::PUT);
    assert_eq!(billing.headers.get("Authorization").unwrap(), "Bearer abc");
    assert_eq!(billing.timeout, Duration::from_millis(1500));
    assert_eq!(billing.retries, 3);
    assert_eq!(billing.retry_delay, Duration::from_secs(2));
    assert_eq!(billing.max_attempts(), 4);

    let audit = &endpoints[0].destinations[1];
    assert_eq!(audit.timeout, Duration::from_secs(10));
}

#[test]
fn test_config_retry_delay_defaults_only_when_retrying() {
    let cfg = Config::from_yaml(
        r#"
endpoints:
  - path: /a
    destinations:
      - url: http://localhost/a
        retries: 2
      - url: http://localhost/b
        retries: -1
"#,
    )
    .unwrap();

    let endpoints = cfg.build_endpoints().unwrap();
    let dests = &endpoints[0].destinations;
    assert_eq!(dests[0].retry_delay, Duration::from_secs(1));
    assert_eq!(dests[1].retries, 0);
    assert_eq!(dests[1].retry_delay, Duration::ZERO);
}

#[test]
fn test_config_env_overrides() {
    let env = env_from(&[
        ("WEBHOOK_PROXY_SERVER_PORT", "7000"),
        ("WEBHOOK_PROXY_SERVER_HOST", "127.0.0.1"),
        ("WEBHOOK_PROXY_LOG_LEVEL", "warn"),
        ("WEBHOOK_PROXY_LOG_FORMAT", "text"),
        ("WEBHOOK_PROXY_LOG_OUTPUT", "file"),
        ("WEBHOOK_PROXY_LOG_FILE_PATH", "/tmp/proxy.log"),
    ]);
    let cfg = Config::from_yaml_with_env(MINIMAL, env).unwrap();

    assert_eq!(cfg.listen_addr(), "127.0.0.1:7000");
    assert_eq!(cfg.logging.level, "warn");
    assert_eq!(cfg.logging.format, "text");
    assert_eq!(cfg.logging.output, "file");
    assert_eq!(cfg.logging.file_path, "/tmp/proxy.log");
}

#[test]
fn test_config_unparseable_port_override_ignored() {
    let env = env_from(&[("WEBHOOK_PROXY_SERVER_PORT", "eighty")]);
    let cfg = Config::from_yaml_with_env(MINIMAL, env).unwrap();

    assert_eq!(cfg.server.port, 8080);
}

#[test]
fn test_config_ipv6_listen_addr() {
    let env = env_from(&[("WEBHOOK_PROXY_SERVER_HOST", "::1")]);
    let cfg = Config::from_yaml_with_env(MINIMAL, env).unwrap();

    assert_eq!(cfg.listen_addr(), "[::1]:8080");
}

#[test]
fn test_config_rejects_invalid_port() {
    let yaml = format!("server:\n  port: 70000\n{MINIMAL}");

    assert!(load_err(&yaml).contains("invalid server port"));
}

#[test]
fn test_config_rejects_invalid_logging() {
    assert!(load_err(&format!("logging:\n  level: trace\n{MINIMAL}")).contains("invalid logging level"));
    assert!(load_err(&format!("logging:\n  format: xml\n{MINIMAL}")).contains("invalid logging format"));
    assert!(load_err(&format!("logging:\n  output: syslog\n{MINIMAL}")).contains("invalid logging output"));
    assert!(load_err(&format!("logging:\n  output: file\n{MINIMAL}")).contains("file_path is required"));
}

#[test]
fn test_config_rejects_missing_endpoints() {
    assert!(load_err("server:\n  port: 8080\n").contains("at least one endpoint is required"));
}

#[test]
fn test_config_rejects_bad_paths() {
    let no_slash = "endpoints:\n  - path: github\n    destinations:\n      - url: http://localhost/\n";
    assert!(load_err(no_slash).contains("endpoint[0]: path must start with /"));

    let empty = "endpoints:\n  - destinations:\n      - url: http://localhost/\n";
    assert!(load_err(empty).contains("endpoint[0]: path is required"));

    let duplicate = "endpoints:\n  - path: /a\n    destinations:\n      - url: http://localhost/\n  - path: /a\n    destinations:\n      - url: http://localhost/\n";
    assert!(load_err(duplicate).contains("endpoint[1]: duplicate path /a"));
}

#[test]
fn test_config_rejects_endpoint_without_destinations() {
    let yaml = "endpoints:\n  - path: /a\n    destinations: []\n";

    assert!(load_err(yaml).contains("at least one destination is required"));
}

#[test]
fn test_config_rejects_bad_destinations() {
    let cases = [
        ("url: ''", "url is required"),
        ("url: not a url", "invalid url"),
        ("url: /relative/path", "invalid url"),
        ("url: ftp://files.example.com/x", "invalid url"),
        ("url: http://localhost/\n        method: TRACE", "invalid method: TRACE"),
        ("url: http://localhost/\n        timeout: -1s", "timeout cannot be negative"),
        ("url: http://localhost/\n        retry_delay: -5s", "retry_delay cannot be negative"),
        ("url: http://localhost/\n        headers:\n          'Bad Header': x", "invalid header name"),
    ];

    for (dest, expected) in cases {
        let yaml = format!("endpoints:\n  - path: /a\n    destinations:\n      - {dest}\n");
        let err = load_err(&yaml);
        assert!(err.contains("endpoint[0].destination[0]"), "{err}");
        assert!(err.contains(expected), "expected {expected:?} in {err:?}");
    }
}

#[test]
fn test_config_duration_parsing() {
    let parse = |s: &str| s.parse::<ConfigDuration>().unwrap();

    assert_eq!(parse("0").to_std(), Duration::ZERO);
    assert_eq!(parse("250ms").to_std(), Duration::from_millis(250));
    assert_eq!(parse("1m30s").to_std(), Duration::from_secs(90));
    assert_eq!(parse("1.5h").to_std(), Duration::from_secs(5400));
    assert_eq!(parse("10us").to_std(), Duration::from_micros(10));
    assert!(parse("-2s").is_negative());
    assert_eq!(parse("-2s").to_std(), Duration::ZERO);

    assert!("5".parse::<ConfigDuration>().is_err());
    assert!("5 days".parse::<ConfigDuration>().is_err());
    assert!("".parse::<ConfigDuration>().is_err());
}

#[test]
fn test_config_load_missing_file() {
    let err = Config::load("/nonexistent/webhook-proxy.yaml").unwrap_err();

    assert!(err.to_string().contains("config file does not exist"));
}

#[test]
fn test_config_load_from_file() {
    let path = std::env::temp_dir().join(format!("webhook-proxy-test-{}.yaml", std::process::id()));
    std::fs::write(&path, MINIMAL).unwrap();

    let cfg = Config::load(&path);
    std::fs::remove_file(&path).unwrap();

    assert_eq!(cfg.unwrap().endpoints[0].path, "/github");
}

#[test]
fn test_config_rejects_malformed_yaml() {
    assert!(load_err("endpoints: [").contains("failed to parse config file"));
}

#[test]
fn test_config_telemetry_defaults_and_yaml() {
    let cfg = Config::from_yaml(MINIMAL).unwrap();
    assert!(!cfg.telemetry.enabled);
    assert_eq!(cfg.telemetry.exporter_type, "stdout");
    assert!(cfg.telemetry.endpoint.is_empty());

    let yaml = format!(
        "telemetry:\n  enabled: true\n  exporter_type: otlp\n  endpoint: http://collector:4317\n{MINIMAL}"
    );
    let cfg = Config::from_yaml(&yaml).unwrap();
    assert!(cfg.telemetry.enabled);
    assert_eq!(cfg.telemetry.exporter_type, "otlp");
    assert_eq!(cfg.telemetry.endpoint, "http://collector:4317");
}

#[test]
fn test_config_telemetry_env_overrides() {
    let env = env_from(&[
        ("WEBHOOK_PROXY_TELEMETRY_ENABLED", "true"),
        ("WEBHOOK_PROXY_TELEMETRY_EXPORTER_TYPE", "otlp"),
        ("WEBHOOK_PROXY_TELEMETRY_ENDPOINT", "http://localhost:4317"),
    ]);
    let cfg = Config::from_yaml_with_env(MINIMAL, env).unwrap();

    assert!(cfg.telemetry.enabled);
    assert_eq!(cfg.telemetry.exporter_type, "otlp");
    assert_eq!(cfg.telemetry.endpoint, "http://localhost:4317");
}

#[test]
fn test_config_telemetry_enabled_values() {
    let cases = [
        ("true", true),
        ("1", true),
        ("yes", true),
        ("false", false),
        ("0", false),
        ("no", false),
        ("anything_else", false),
    ];

    for (value, expected) in cases {
        let env = env_from(&[("WEBHOOK_PROXY_TELEMETRY_ENABLED", value)]);
        let cfg = Config::from_yaml_with_env(MINIMAL, env).unwrap();
        assert_eq!(cfg.telemetry.enabled, expected, "value {value:?}");
    }

    let yaml = format!("telemetry:\n  enabled: true\n{MINIMAL}");
    let env = env_from(&[("WEBHOOK_PROXY_TELEMETRY_ENABLED", "no")]);
    assert!(!Config::from_yaml_with_env(&yaml, env).unwrap().telemetry.enabled);
}

#[test]
fn test_config_destination_keeps_configured_url() {
    let yaml = "endpoints:\n  - path: /a\n    destinations:\n      - url: http://localhost:3000\n";

    let endpoints = Config::from_yaml(yaml).unwrap().build_endpoints().unwrap();
    let dest = &endpoints[0].destinations[0];

    assert_eq!(dest.url.as_str(), "http://localhost:3000/");
    assert_eq!(dest.display_name(), "http://localhost:3000");
}
