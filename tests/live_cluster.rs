//! End-to-end checks against a real cluster; see `tests/common/cluster.rs`

mod common;

use ceph_provider::OpContext;
use common::cluster;
use serde_json::json;
use std::time::Duration;

fn ctx() -> OpContext {
    OpContext::with_timeout(Duration::from_secs(300))
}

#[test]
fn test_parse_pool_get_output() {
    let parsed = cluster::parse_key_values("size: 3\ncompression_required_ratio: 0.875\n");
    assert_eq!(parsed["size"], "3");
    assert_eq!(parsed["compression_required_ratio"], "0.875");
}

#[tokio::test]
#[ignore = "needs CEPH_TEST_CLUSTER=1 and a reachable cluster"]
async fn test_principal_visible_to_ceph_cli() {
    if !cluster::enabled() {
        return;
    }
    let provider = cluster::provider().await;
    let auth = provider.resource("ceph_auth").unwrap();
    let entity = format!("client.{}", cluster::unique("e2e"));

    let state = auth
        .create(&ctx(), json!({"entity": entity, "caps": {"mon": "allow r"}}))
        .await
        .unwrap();

    let exported = cluster::ceph(&["auth", "get", &entity]).await;
    assert!(exported.contains(state["key"].as_str().unwrap()));
    assert!(exported.contains("caps mon = \"allow r\""));

    auth.delete(&ctx(), state).await.unwrap();
}

#[tokio::test]
#[ignore = "needs CEPH_TEST_CLUSTER=1 and a reachable cluster"]
async fn test_pool_settings_visible_to_ceph_cli() {
    if !cluster::enabled() {
        return;
    }
    let provider = cluster::provider().await;
    let pools = provider.resource("ceph_pool").unwrap();
    let name = cluster::unique("e2e-pool");

    let state = pools
        .create(
            &ctx(),
            json!({
                "name": name,
                "size": 2,
                "min_size": 1,
                "application_metadata": ["rbd"],
                "compression": {"mode": "passive", "algorithm": "snappy", "required_ratio": 0.875}
            }),
        )
        .await
        .unwrap();

    assert_eq!(cluster::pool_setting(&name, "size").await, "2");
    assert_eq!(cluster::pool_setting(&name, "compression_mode").await, "passive");
    assert_eq!(state["compression"]["required_ratio"], 0.875);

    pools.delete(&ctx(), state).await.unwrap();
}
