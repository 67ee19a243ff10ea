//! Harness for tests against a real Ceph cluster
//!
//! Enabled with `CEPH_TEST_CLUSTER=1`. The dashboard is reached through
//! `CEPH_DASHBOARD_ENDPOINT`, `CEPH_DASHBOARD_USERNAME` and
//! `CEPH_DASHBOARD_PASSWORD`; out-of-band checks shell out to the `ceph` CLI,
//! which must be able to reach the same cluster.

use backoff::ExponentialBackoff;
use ceph_provider::{CephProvider, OpContext, ProviderConfig};
use std::collections::BTreeMap;
use std::io::Write;
use std::time::Duration;
use tokio::process::Command;

pub fn enabled() -> bool {
    std::env::var("CEPH_TEST_CLUSTER").is_ok_and(|v| v == "1")
}

/// Provider options from the environment, round-tripped through a YAML file
/// so the file loader is exercised too
pub fn config_from_env() -> ProviderConfig {
    let endpoint = std::env::var("CEPH_DASHBOARD_ENDPOINT").expect("CEPH_DASHBOARD_ENDPOINT");
    let username = std::env::var("CEPH_DASHBOARD_USERNAME").unwrap_or_else(|_| "admin".into());
    let password = std::env::var("CEPH_DASHBOARD_PASSWORD").expect("CEPH_DASHBOARD_PASSWORD");

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "endpoint: {}\nusername: {}\npassword: {}\ninsecure_skip_verify: true\nrequest_timeout_secs: 30",
        endpoint, username, password
    )
    .unwrap();
    ProviderConfig::from_yaml_file(file.path()).unwrap()
}

/// Configure a provider, retrying while the dashboard comes up
pub async fn provider() -> CephProvider {
    let policy = ExponentialBackoff {
        initial_interval: Duration::from_millis(500),
        max_interval: Duration::from_secs(5),
        max_elapsed_time: Some(Duration::from_secs(120)),
        ..ExponentialBackoff::default()
    };

    backoff::future::retry(policy, || async {
        let provider = CephProvider::new();
        let ctx = OpContext::with_timeout(Duration::from_secs(30));
        match provider.configure(&ctx, config_from_env()).await {
            Ok(()) => Ok(provider),
            Err(e) => {
                eprintln!("dashboard not ready: {}", e);
                Err(backoff::Error::transient(e))
            }
        }
    })
    .await
    .expect("dashboard reachable")
}

/// Run `ceph <args>` and return stdout
pub async fn ceph(args: &[&str]) -> String {
    let output = Command::new("ceph")
        .args(args)
        .output()
        .await
        .expect("ceph CLI available");
    assert!(
        output.status.success(),
        "ceph {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Parse `key: value` lines as printed by `ceph osd pool get`
pub fn parse_key_values(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

pub async fn pool_setting(pool: &str, setting: &str) -> String {
    let out = ceph(&["osd", "pool", "get", pool, setting]).await;
    parse_key_values(&out)
        .remove(setting)
        .unwrap_or_else(|| panic!("{} missing from {:?}", setting, out))
}

/// Unique-ish name so reruns against the same cluster do not collide
pub fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, std::process::id())
}
