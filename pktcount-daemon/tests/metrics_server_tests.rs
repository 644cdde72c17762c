//! Prometheus exporter installation tests.
//!
//! The recorder is process-global, so only one test installs it successfully.

use pktcount_core::config::MetricsConfig;
use pktcount_daemon::metrics_server::{install_metrics_recorder, listen_addr};
use serial_test::serial;

fn metrics_on(listen: &str, port: u16, endpoint: &str) -> MetricsConfig {
    MetricsConfig {
        enabled: true,
        listen_addr: listen.to_owned(),
        port,
        endpoint: endpoint.to_owned(),
    }
}

#[test]
#[serial]
fn recorder_installs_on_loopback() {
    let config = metrics_on("127.0.0.1", 19464, "/metrics");
    let result = install_metrics_recorder(&config);
    assert!(result.is_ok(), "install failed: {:?}", result.err());
}

#[test]
#[serial]
fn bad_settings_fail_before_binding() {
    let cases = [
        metrics_on("999.999.999.999", 9464, "/metrics"),
        metrics_on("localhost", 9464, "/metrics"),
        metrics_on("127.0.0.1", 19465, "/stats"),
    ];
    for config in &cases {
        assert!(
            install_metrics_recorder(config).is_err(),
            "{}:{}{} should be rejected",
            config.listen_addr,
            config.port,
            config.endpoint
        );
    }
}

#[test]
fn ipv6_loopback_with_brackets_is_accepted() {
    let addr = listen_addr(&metrics_on("[::1]", 9464, "/metrics")).unwrap();
    assert!(addr.is_ipv6());
    assert_eq!(addr.port(), 9464);
}
