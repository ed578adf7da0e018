//! PolicyStore interface tests.
//!
//! These tests verify the contract of the PolicyStore trait.
//! Each storage implementation should run these tests.

use std::collections::HashSet;

use pms_store::model::{Effect, Permission, Policy, Service, SERVICE_TYPE_APPLICATION};
use pms_store::storage::{PolicyStore, ServiceStore, StorageError};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde_json::{json, Value};

/// Random alphanumeric string of `len` characters.
pub fn random_word(rng: &mut impl Rng, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Random extra fields, none of which collide with a modelled field.
pub fn random_extra(rng: &mut impl Rng) -> serde_json::Map<String, Value> {
    let mut extra = serde_json::Map::new();
    extra.insert("priority".to_string(), json!(rng.random::<u32>()));
    if rng.random_bool(0.5) {
        let tags: Vec<String> = (0..rng.random_range(1..4))
            .map(|_| random_word(rng, 6))
            .collect();
        extra.insert("tags".to_string(), json!(tags));
    }
    if rng.random_bool(0.5) {
        extra.insert(
            "owner".to_string(),
            json!({ "team": random_word(rng, 8), "active": rng.random_bool(0.5) }),
        );
    }
    extra
}

fn random_policy(rng: &mut impl Rng) -> Policy {
    let permissions = (0..rng.random_range(0..4))
        .map(|_| Permission {
            resource: format!("/{}", random_word(rng, 10)),
            actions: (0..rng.random_range(1..5))
                .map(|_| random_word(rng, 5))
                .collect(),
            ..Default::default()
        })
        .collect();
    let principals = (0..rng.random_range(0..3))
        .map(|_| {
            (0..rng.random_range(1..3))
                .map(|_| format!("user:{}", random_word(rng, 8)))
                .collect()
        })
        .collect();

    Policy {
        name: random_word(rng, 12),
        effect: if rng.random_bool(0.5) {
            Effect::Grant
        } else {
            Effect::Deny
        },
        permissions,
        principals,
        extra: random_extra(rng),
        ..Default::default()
    }
}

fn sorted_by_id(mut policies: Vec<Policy>) -> Vec<Policy> {
    policies.sort_by(|a, b| a.id.cmp(&b.id));
    policies
}

/// Create a policy granting `actions` on `resource`.
pub fn make_policy(name: &str, resource: &str, actions: &[&str]) -> Policy {
    Policy {
        name: name.to_string(),
        effect: Effect::Grant,
        permissions: vec![Permission {
            resource: resource.to_string(),
            actions: actions.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }],
        principals: vec![vec!["user:alice".to_string()]],
        ..Default::default()
    }
}

async fn create_parent<S: ServiceStore>(store: &S, name: &str) {
    store
        .create_service(Service::new(name, SERVICE_TYPE_APPLICATION))
        .await
        .expect("create service should succeed");
}

// =============================================================================
// create / get
// =============================================================================

pub async fn test_create_and_get_policy<S: ServiceStore + PolicyStore>(store: &S) {
    create_parent(store, "pol_create_get").await;

    let input = make_policy("read-docs", "/docs", &["get", "list"]);
    let created = store
        .create_policy("pol_create_get", input.clone())
        .await
        .expect("create should succeed");

    assert!(!created.id.is_empty(), "id should be generated");
    assert_eq!(created.name, input.name);
    assert_eq!(created.permissions, input.permissions);

    let fetched = store
        .get_policy("pol_create_get", &created.id)
        .await
        .expect("get should succeed");
    assert_eq!(fetched, created);
}

pub async fn test_create_overwrites_caller_id<S: ServiceStore + PolicyStore>(store: &S) {
    create_parent(store, "pol_caller_id").await;

    let mut input = make_policy("p", "/a", &["get"]);
    input.id = "chosen-by-caller".to_string();

    let first = store
        .create_policy("pol_caller_id", input.clone())
        .await
        .expect("create should succeed");
    let second = store
        .create_policy("pol_caller_id", input)
        .await
        .expect("create should succeed");

    assert_ne!(first.id, "chosen-by-caller");
    assert_ne!(first.id, second.id, "ids must be unique within a service");
}

pub async fn test_create_ignores_id_in_extra<S: ServiceStore + PolicyStore>(store: &S) {
    create_parent(store, "pol_extra_id").await;

    let mut input = make_policy("p", "/a", &["get"]);
    input
        .extra
        .insert("id".to_string(), json!("chosen-in-extra"));
    input.extra.insert("priority".to_string(), json!(7));

    let created = store
        .create_policy("pol_extra_id", input)
        .await
        .expect("create should succeed");

    assert_ne!(created.id, "chosen-in-extra");
    assert!(!created.extra.contains_key("id"));
    assert_eq!(created.extra.get("priority"), Some(&json!(7)));

    let fetched = store
        .get_policy("pol_extra_id", &created.id)
        .await
        .expect("get by the returned id should succeed");
    assert_eq!(fetched, created);

    let err = store
        .get_policy("pol_extra_id", "chosen-in-extra")
        .await
        .expect_err("the id from extra must not address the policy");
    assert!(err.is_not_found());
}

pub async fn test_create_policy_missing_service<S: PolicyStore>(store: &S) {
    let err = store
        .create_policy("pol_no_such_service", make_policy("p", "/a", &["get"]))
        .await
        .expect_err("create should fail");
    assert!(err.is_not_found(), "unexpected error: {err}");
}

pub async fn test_get_missing_policy<S: ServiceStore + PolicyStore>(store: &S) {
    create_parent(store, "pol_get_missing").await;

    let err = store
        .get_policy("pol_get_missing", "no-such-id")
        .await
        .expect_err("get should fail");
    assert!(
        matches!(err, StorageError::NotFound { entity: "policy", .. }),
        "unexpected error: {err}"
    );

    let err = store
        .get_policy("pol_no_such_service", "no-such-id")
        .await
        .expect_err("get should fail");
    assert!(err.is_not_found());
}

// =============================================================================
// delete
// =============================================================================

pub async fn test_delete_policy_keeps_order<S: ServiceStore + PolicyStore>(store: &S) {
    create_parent(store, "pol_delete").await;

    let p1 = store
        .create_policy("pol_delete", make_policy("p1", "/1", &["get"]))
        .await
        .expect("create p1");
    let p2 = store
        .create_policy("pol_delete", make_policy("p2", "/2", &["get"]))
        .await
        .expect("create p2");
    let p3 = store
        .create_policy("pol_delete", make_policy("p3", "/3", &["get"]))
        .await
        .expect("create p3");

    store
        .delete_policy("pol_delete", &p2.id)
        .await
        .expect("delete should succeed");

    let remaining = store
        .list_all_policies("pol_delete", "")
        .await
        .expect("list should succeed");
    assert_eq!(remaining, vec![p1, p3]);

    let err = store
        .get_policy("pol_delete", &p2.id)
        .await
        .expect_err("deleted policy should be gone");
    assert!(err.is_not_found());

    let err = store
        .delete_policy("pol_delete", &p2.id)
        .await
        .expect_err("second delete should fail");
    assert!(err.is_not_found());

    assert_eq!(store.get_policy_count("pol_delete").await.expect("count"), 2);
}

pub async fn test_delete_policy_missing_service<S: PolicyStore>(store: &S) {
    let err = store
        .delete_policy("pol_no_such_service", "any")
        .await
        .expect_err("delete should fail");
    assert!(err.is_not_found());
}

pub async fn test_delete_all_policies<S: ServiceStore + PolicyStore>(store: &S) {
    create_parent(store, "pol_delete_all").await;

    for i in 0..3 {
        store
            .create_policy("pol_delete_all", make_policy(&format!("p{i}"), "/x", &["get"]))
            .await
            .expect("create should succeed");
    }

    store
        .delete_policies("pol_delete_all")
        .await
        .expect("delete all should succeed");

    let remaining = store
        .list_all_policies("pol_delete_all", "")
        .await
        .expect("list should succeed");
    assert!(remaining.is_empty());
    assert_eq!(
        store.get_policy_count("pol_delete_all").await.expect("count"),
        0
    );
}

// =============================================================================
// list / count
// =============================================================================

pub async fn test_list_and_count<S: ServiceStore + PolicyStore>(store: &S) {
    create_parent(store, "pol_count").await;

    assert_eq!(store.get_policy_count("pol_count").await.expect("count"), 0);
    let total_before = store.get_policy_count("").await.expect("total count");

    let mut ids = Vec::new();
    for name in ["p1", "p2", "p3"] {
        let created = store
            .create_policy("pol_count", make_policy(name, "/r", &["get"]))
            .await
            .expect("create should succeed");
        ids.push(created.id);
    }

    assert_eq!(store.get_policy_count("pol_count").await.expect("count"), 3);
    assert_eq!(
        store.get_policy_count("").await.expect("total count"),
        total_before + 3
    );

    let listed: Vec<String> = store
        .list_all_policies("pol_count", "")
        .await
        .expect("list should succeed")
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(listed, ids, "list should keep insertion order");

    let err = store
        .get_policy_count("pol_no_such_service")
        .await
        .expect_err("count on a missing service should fail");
    assert!(err.is_not_found());
}

pub async fn test_many_policies_round_trip<S: ServiceStore + PolicyStore>(store: &S) {
    create_parent(store, "pol_many").await;

    let inputs: Vec<Policy> = {
        let mut rng = rand::rng();
        (0..100).map(|_| random_policy(&mut rng)).collect()
    };

    let mut created = Vec::with_capacity(inputs.len());
    for input in &inputs {
        let policy = store
            .create_policy("pol_many", input.clone())
            .await
            .expect("create should succeed");

        let mut expected = input.clone();
        expected.id = policy.id.clone();
        assert_eq!(policy, expected, "create should only assign the id");
        created.push(policy);
    }

    let ids: HashSet<&str> = created.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids.len(), 100, "ids should be unique");

    for policy in &created {
        let fetched = store
            .get_policy("pol_many", &policy.id)
            .await
            .expect("get should succeed");
        assert_eq!(&fetched, policy);
    }

    let listed = store
        .list_all_policies("pol_many", "")
        .await
        .expect("list should succeed");
    assert_eq!(sorted_by_id(listed), sorted_by_id(created));

    assert_eq!(store.get_policy_count("pol_many").await.expect("count"), 100);
}

pub async fn test_policy_and_role_policy_counts<S: ServiceStore + PolicyStore>(store: &S) {
    create_parent(store, "pol_counts_a").await;
    create_parent(store, "pol_counts_b").await;

    for name in ["p1", "p2"] {
        store
            .create_policy("pol_counts_a", make_policy(name, "/a", &["get"]))
            .await
            .expect("create should succeed");
    }

    let counts = store
        .get_policy_and_role_policy_counts()
        .await
        .expect("counts should succeed");

    let a = counts.get("pol_counts_a").expect("service a present");
    assert_eq!(a.policy_count, 2);
    assert_eq!(a.role_policy_count, 0);

    let b = counts.get("pol_counts_b").expect("service b present");
    assert_eq!(b.policy_count, 0);
    assert_eq!(b.role_policy_count, 0);
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all PolicyStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_policy_store_tests {
    ($store:expr) => {
        use $crate::storage::policy_store_tests::*;

        test_create_and_get_policy($store).await;
        println!("  test_create_and_get_policy: PASSED");

        test_create_overwrites_caller_id($store).await;
        println!("  test_create_overwrites_caller_id: PASSED");

        test_create_ignores_id_in_extra($store).await;
        println!("  test_create_ignores_id_in_extra: PASSED");

        test_create_policy_missing_service($store).await;
        println!("  test_create_policy_missing_service: PASSED");

        test_get_missing_policy($store).await;
        println!("  test_get_missing_policy: PASSED");

        test_delete_policy_keeps_order($store).await;
        println!("  test_delete_policy_keeps_order: PASSED");

        test_delete_policy_missing_service($store).await;
        println!("  test_delete_policy_missing_service: PASSED");

        test_delete_all_policies($store).await;
        println!("  test_delete_all_policies: PASSED");

        test_list_and_count($store).await;
        println!("  test_list_and_count: PASSED");

        test_many_policies_round_trip($store).await;
        println!("  test_many_policies_round_trip: PASSED");

        test_policy_and_role_policy_counts($store).await;
        println!("  test_policy_and_role_policy_counts: PASSED");
    };
}
