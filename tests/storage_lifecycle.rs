//! Pools, CRUSH rules, erasure-code profiles and configuration against
//! the fake dashboard

mod common;

use assert_matches::assert_matches;
use ceph_provider::Error;
use common::{ctx, FakeDashboard};
use serde_json::{json, Value};

// =============================================================================
// Pools
// =============================================================================

#[tokio::test]
async fn test_pool_create_with_compression() {
    let fake = FakeDashboard::start().await;
    let provider = fake.provider().await;
    let pools = provider.resource("ceph_pool").unwrap();

    let state = pools
        .create(
            &ctx(),
            json!({
                "name": "rbd",
                "size": 3,
                "min_size": 2,
                "application_metadata": ["rgw", "rbd"],
                "compression": {"mode": "aggressive", "algorithm": "zstd", "required_ratio": 0.875}
            }),
        )
        .await
        .unwrap();

    assert_eq!(state["pool_type"], "replicated");
    assert_eq!(state["size"], 3);
    assert_eq!(state["crush_rule"], "replicated_rule");
    assert_eq!(state["application_metadata"], json!(["rgw", "rbd"]));
    assert_eq!(state["compression"]["mode"], "aggressive");
    assert_eq!(state["compression"]["required_ratio"], 0.875);
    assert_eq!(state["erasure_code_profile"], Value::Null);
    assert_eq!(
        fake.state().pools["rbd"]["options"]["compression_required_ratio"],
        "0.875000"
    );
    assert_eq!(fake.finished_tasks(), vec!["pool/create".to_string()]);
}

#[tokio::test]
async fn test_pool_without_compression_reads_null() {
    let fake = FakeDashboard::start().await;
    let provider = fake.provider().await;

    let state = provider
        .resource("ceph_pool")
        .unwrap()
        .create(&ctx(), json!({"name": "plain"}))
        .await
        .unwrap();
    assert_eq!(state["compression"], Value::Null);
    assert_eq!(state["pg_num"], 32);
    assert_eq!(state["autoscale_mode"], "on");
}

#[tokio::test]
async fn test_pool_update_and_out_of_band_drift() {
    let fake = FakeDashboard::start().await;
    let provider = fake.provider().await;
    let pools = provider.resource("ceph_pool").unwrap();

    let prior = pools
        .create(&ctx(), json!({"name": "data", "size": 3, "quota_max_objects": 1000}))
        .await
        .unwrap();

    fake.set_pool_field("data", "size", json!(2));
    let refreshed = pools.read(&ctx(), prior).await.unwrap().unwrap();
    assert_eq!(refreshed["size"], 2);

    let mut planned = refreshed.clone();
    planned["size"] = json!(3);
    planned["quota_max_objects"] = json!(5000);
    let state = pools.update(&ctx(), refreshed, planned).await.unwrap();
    assert_eq!(state["size"], 3);
    assert_eq!(state["quota_max_objects"], 5000);
    assert!(fake.finished_tasks().contains(&"pool/edit".to_string()));
}

#[tokio::test]
async fn test_pool_refresh_leaves_autoscaled_pg_num() {
    let fake = FakeDashboard::start().await;
    let provider = fake.provider().await;
    let pools = provider.resource("ceph_pool").unwrap();

    let state = pools
        .create(&ctx(), json!({"name": "scaled", "pg_num": 16, "autoscale_mode": "on"}))
        .await
        .unwrap();
    assert_eq!(state["pg_num"], 16);

    fake.set_pool_field("scaled", "pg_num", json!(64));
    let refreshed = pools.read(&ctx(), state.clone()).await.unwrap().unwrap();
    assert_eq!(refreshed, state);

    fake.set_pool_field("scaled", "pg_autoscale_mode", json!("off"));
    let refreshed = pools.read(&ctx(), state).await.unwrap().unwrap();
    assert_eq!(refreshed["pg_num"], 64);
    assert_eq!(refreshed["autoscale_mode"], "off");
}

#[tokio::test]
async fn test_pool_quota_removed_with_null() {
    let fake = FakeDashboard::start().await;
    let provider = fake.provider().await;
    let pools = provider.resource("ceph_pool").unwrap();

    let prior = pools
        .create(&ctx(), json!({"name": "capped", "quota_max_bytes": 1073741824}))
        .await
        .unwrap();
    assert_eq!(prior["quota_max_bytes"], 1073741824u64);

    let mut planned = prior.clone();
    planned["quota_max_bytes"] = Value::Null;
    let state = pools.update(&ctx(), prior, planned).await.unwrap();
    assert_eq!(state["quota_max_bytes"], Value::Null);
    assert_eq!(fake.state().pools["capped"]["quota_max_bytes"], 0);

    let refreshed = pools.read(&ctx(), state.clone()).await.unwrap().unwrap();
    assert_eq!(refreshed, state);
}

#[tokio::test]
async fn test_pool_type_change_requires_replace() {
    let fake = FakeDashboard::start().await;
    let provider = fake.provider().await;
    let pools = provider.resource("ceph_pool").unwrap();

    let prior = pools.create(&ctx(), json!({"name": "p"})).await.unwrap();
    let mut planned = prior.clone();
    planned["pool_type"] = json!("erasure");
    planned["erasure_code_profile"] = json!("ec42");

    let err = pools.update(&ctx(), prior, planned).await.unwrap_err();
    assert_matches!(err, Error::RequiresReplace { ref attributes, .. } if attributes.contains(&"pool_type".to_string()));
}

#[tokio::test]
async fn test_pool_validation_before_any_request() {
    let fake = FakeDashboard::start().await;
    let provider = fake.provider().await;
    let pools = provider.resource("ceph_pool").unwrap();
    let before = fake.requests();

    for plan in [
        json!({"name": "p", "pool_type": "erasure"}),
        json!({"name": "p", "size": 2, "min_size": 3}),
        json!({"name": "p", "primary_affinity": 1.5}),
        json!({"name": "p", "autoscale_mode": "sometimes"}),
        json!({"name": "p", "compression": {"required_ratio": 0.0}}),
    ] {
        assert!(pools.create(&ctx(), plan.clone()).await.is_err(), "{}", plan);
    }
    assert_eq!(fake.requests(), before);
}

#[tokio::test]
async fn test_pool_delete_waits_for_task() {
    let fake = FakeDashboard::start().await;
    let provider = fake.provider().await;
    let pools = provider.resource("ceph_pool").unwrap();

    let state = pools.create(&ctx(), json!({"name": "doomed"})).await.unwrap();
    pools.delete(&ctx(), state).await.unwrap();

    assert!(!fake.state().pools.contains_key("doomed"));
    assert!(fake.finished_tasks().contains(&"pool/delete".to_string()));
}

// =============================================================================
// CRUSH rules and erasure-code profiles
// =============================================================================

#[tokio::test]
async fn test_crush_rule_with_device_class() {
    let fake = FakeDashboard::start().await;
    let provider = fake.provider().await;
    let rules = provider.resource("ceph_crush_rule").unwrap();

    let state = rules
        .create(&ctx(), json!({"name": "fast", "device_class": "ssd"}))
        .await
        .unwrap();

    assert_eq!(state["root"], "default");
    assert_eq!(state["failure_domain"], "host");
    assert_eq!(state["device_class"], "ssd");
    assert_eq!(state["type"], 1);
    assert_eq!(state["steps"][0]["item_name"], "default~ssd");

    let imported = rules.import(&ctx(), "fast").await.unwrap();
    assert_eq!(imported["rule_id"], state["rule_id"]);

    let mut planned = state.clone();
    planned["failure_domain"] = json!("rack");
    assert_matches!(
        rules.update(&ctx(), state, planned).await,
        Err(Error::RequiresReplace { .. })
    );
}

#[tokio::test]
async fn test_builtin_rule_data_source() {
    let fake = FakeDashboard::start().await;
    let provider = fake.provider().await;

    let data = provider
        .data_source("ceph_crush_rule")
        .unwrap()
        .read(&ctx(), json!({"name": "replicated_rule"}))
        .await
        .unwrap();
    assert_eq!(data["rule_id"], 0);
    assert_eq!(data["root"], "default");
    assert_eq!(data["device_class"], Value::Null);
}

#[tokio::test]
async fn test_erasure_code_profile_numbers_from_strings() {
    let fake = FakeDashboard::start().await;
    let provider = fake.provider().await;
    let profiles = provider.resource("ceph_erasure_code_profile").unwrap();

    let state = profiles
        .create(
            &ctx(),
            json!({"name": "ec42", "k": 4, "m": 2, "crush_failure_domain": "host"}),
        )
        .await
        .unwrap();

    assert_eq!(state["k"], 4);
    assert_eq!(state["m"], 2);
    assert_eq!(state["plugin"], "jerasure");
    assert_eq!(fake.state().ec_profiles["ec42"]["crush-failure-domain"], "host");
    assert_eq!(fake.state().ec_profiles["ec42"]["k"], "4");

    assert_matches!(
        profiles.create(&ctx(), json!({"name": "bad", "k": 0, "m": 1})).await,
        Err(Error::InvalidAttribute { .. })
    );
}

#[tokio::test]
async fn test_erasure_pool_on_profile() {
    let fake = FakeDashboard::start().await;
    let provider = fake.provider().await;

    provider
        .resource("ceph_erasure_code_profile")
        .unwrap()
        .create(&ctx(), json!({"name": "ec21", "k": 2, "m": 1}))
        .await
        .unwrap();
    let pool = provider
        .resource("ceph_pool")
        .unwrap()
        .create(
            &ctx(),
            json!({"name": "ecpool", "pool_type": "erasure", "erasure_code_profile": "ec21"}),
        )
        .await
        .unwrap();

    assert_eq!(pool["pool_type"], "erasure");
    assert_eq!(pool["erasure_code_profile"], "ec21");
}

// =============================================================================
// Configuration
// =============================================================================

#[tokio::test]
async fn test_mgr_module_config_large_integer() {
    let fake = FakeDashboard::start().await;
    let provider = fake.provider().await;
    let configs = provider.resource("ceph_mgr_module_config").unwrap();

    let state = configs
        .create(
            &ctx(),
            json!({"module_name": "dashboard", "configs": {"jwt_token_ttl": "31556952"}}),
        )
        .await
        .unwrap();
    assert_eq!(state["configs"], json!({"jwt_token_ttl": "31556952"}));

    let data = provider
        .data_source("ceph_mgr_module_config")
        .unwrap()
        .read(&ctx(), json!({"module_name": "dashboard"}))
        .await
        .unwrap();
    assert_eq!(data["configs"]["jwt_token_ttl"], "31556952");
    assert_eq!(data["configs"]["server_port"], "8443");
}

#[tokio::test]
async fn test_mgr_module_config_keeps_declared_spelling() {
    let fake = FakeDashboard::start().await;
    let provider = fake.provider().await;
    let configs = provider.resource("ceph_mgr_module_config").unwrap();

    let state = configs
        .create(
            &ctx(),
            json!({"module_name": "pg_autoscaler", "configs": {"threshold": "3"}}),
        )
        .await
        .unwrap();

    assert_eq!(state["configs"]["threshold"], "3");
    let stored = fake.state().cluster_conf["mgr/pg_autoscaler/threshold"]["mgr"].clone();
    assert_eq!(stored, "3.0");
}

#[tokio::test]
async fn test_mgr_module_config_refresh_without_diff() {
    let fake = FakeDashboard::start().await;
    let provider = fake.provider().await;
    let configs = provider.resource("ceph_mgr_module_config").unwrap();

    let state = configs
        .create(
            &ctx(),
            json!({"module_name": "pg_autoscaler", "configs": {"threshold": "3"}}),
        )
        .await
        .unwrap();

    let refreshed = configs.read(&ctx(), state.clone()).await.unwrap().unwrap();
    assert_eq!(refreshed, state);

    fake.state()
        .cluster_conf
        .get_mut("mgr/pg_autoscaler/threshold")
        .unwrap()
        .insert("mgr".into(), json!("2.5"));
    let refreshed = configs.read(&ctx(), state).await.unwrap().unwrap();
    assert_eq!(refreshed["configs"]["threshold"], "2.5");
}

#[tokio::test]
async fn test_mgr_module_config_drops_removed_options() {
    let fake = FakeDashboard::start().await;
    let provider = fake.provider().await;
    let configs = provider.resource("ceph_mgr_module_config").unwrap();

    let prior = configs
        .create(
            &ctx(),
            json!({"module_name": "dashboard", "configs": {"jwt_token_ttl": "3600", "ssl": "false"}}),
        )
        .await
        .unwrap();

    let state = configs
        .update(
            &ctx(),
            prior,
            json!({"module_name": "dashboard", "configs": {"ssl": "false"}}),
        )
        .await
        .unwrap();

    assert_eq!(state["configs"], json!({"ssl": "false"}));
    assert!(!fake
        .state()
        .cluster_conf
        .contains_key("mgr/dashboard/jwt_token_ttl"));

    configs.delete(&ctx(), state).await.unwrap();
    assert!(fake.state().cluster_conf.is_empty());
}

#[tokio::test]
async fn test_mgr_module_config_rejected_value_is_api_error() {
    let fake = FakeDashboard::start().await;
    let provider = fake.provider().await;

    let err = provider
        .resource("ceph_mgr_module_config")
        .unwrap()
        .create(
            &ctx(),
            json!({"module_name": "dashboard", "configs": {"jwt_token_ttl": "forever"}}),
        )
        .await
        .unwrap_err();
    assert_matches!(err, Error::Api { status: 400, .. });
}

#[tokio::test]
async fn test_config_value_lifecycle() {
    let fake = FakeDashboard::start().await;
    let provider = fake.provider().await;
    let values = provider.resource("ceph_config_value").unwrap();

    let state = values
        .create(
            &ctx(),
            json!({"section": "osd", "name": "osd_max_backfills", "value": "2"}),
        )
        .await
        .unwrap();
    assert_eq!(state["value"], "2");

    let imported = values.import(&ctx(), "osd/osd_max_backfills").await.unwrap();
    assert_eq!(imported, state);

    let data = provider
        .data_source("ceph_config_value")
        .unwrap()
        .read(&ctx(), json!({"section": "osd", "name": "osd_max_backfills"}))
        .await
        .unwrap();
    assert_eq!(data["value"], "2");

    values.delete(&ctx(), state).await.unwrap();
    assert!(fake.state().cluster_conf.is_empty());
}

#[tokio::test]
async fn test_config_value_refresh_keeps_declared_number() {
    let fake = FakeDashboard::start().await;
    let provider = fake.provider().await;
    let values = provider.resource("ceph_config_value").unwrap();

    let state = values
        .create(
            &ctx(),
            json!({"section": "osd", "name": "osd_memory_target_autotune_ratio", "value": "0.5"}),
        )
        .await
        .unwrap();

    fake.state()
        .cluster_conf
        .get_mut("osd_memory_target_autotune_ratio")
        .unwrap()
        .insert("osd".into(), json!("0.500000"));
    let refreshed = values.read(&ctx(), state.clone()).await.unwrap().unwrap();
    assert_eq!(refreshed, state);
    assert_eq!(refreshed["value"], "0.5");
}

#[tokio::test]
async fn test_config_value_rejects_module_namespace() {
    let fake = FakeDashboard::start().await;
    let provider = fake.provider().await;
    let before = fake.requests();

    let err = provider
        .resource("ceph_config_value")
        .unwrap()
        .create(
            &ctx(),
            json!({"section": "mgr", "name": "mgr/dashboard/ssl", "value": "false"}),
        )
        .await
        .unwrap_err();
    assert_matches!(err, Error::InvalidAttribute { ref attribute, .. } if attribute == "name");
    assert_eq!(fake.requests(), before);
}
