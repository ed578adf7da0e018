//! ServiceStore interface tests.
//!
//! Each test uses its own service names so the functions can share one store.
//! `test_write_policy_store_replaces_everything` wipes the store and must run
//! last.

use std::collections::BTreeMap;

use pms_store::model::{
    Function, Policy, Service, StoreSnapshot, SERVICE_TYPE_APPLICATION, SERVICE_TYPE_K8S_CLUSTER,
};
use pms_store::storage::{FunctionStore, PolicyStore, ServiceStore, StorageError};

/// Create an empty application service.
pub fn make_service(name: &str) -> Service {
    Service::new(name, SERVICE_TYPE_APPLICATION)
}

// =============================================================================
// create / get
// =============================================================================

pub async fn test_create_and_get_service<S: ServiceStore>(store: &S) {
    let mut service = Service::new("svc_create_get", SERVICE_TYPE_K8S_CLUSTER);
    service.metadata = BTreeMap::from([("owner".to_string(), "platform".to_string())]);

    store
        .create_service(service.clone())
        .await
        .expect("create should succeed");

    let fetched = store
        .get_service("svc_create_get")
        .await
        .expect("get should succeed");
    assert_eq!(fetched, service);
    assert!(fetched.policies.is_empty(), "policies default to empty");
    assert!(fetched.role_policies.is_empty(), "role policies default to empty");
}

pub async fn test_create_duplicate_service<S: ServiceStore>(store: &S) {
    store
        .create_service(make_service("svc_duplicate"))
        .await
        .expect("first create should succeed");

    let err = store
        .create_service(make_service("svc_duplicate"))
        .await
        .expect_err("second create should fail");
    assert!(
        matches!(err, StorageError::AlreadyExists { ref name } if name == "svc_duplicate"),
        "unexpected error: {err}"
    );
}

pub async fn test_get_missing_service<S: ServiceStore>(store: &S) {
    let err = store
        .get_service("svc_never_created")
        .await
        .expect_err("get should fail");
    assert!(err.is_not_found(), "unexpected error: {err}");
}

pub async fn test_service_with_policies_round_trips<S: ServiceStore>(store: &S) {
    let mut service = make_service("svc_with_policies");
    service.policies.push(Policy {
        id: "seeded".to_string(),
        name: "seeded policy".to_string(),
        ..Default::default()
    });

    store
        .create_service(service.clone())
        .await
        .expect("create should succeed");

    let fetched = store
        .get_service("svc_with_policies")
        .await
        .expect("get should succeed");
    assert_eq!(fetched.policies, service.policies);
}

// =============================================================================
// delete
// =============================================================================

pub async fn test_delete_service<S: ServiceStore>(store: &S) {
    store
        .create_service(make_service("svc_delete"))
        .await
        .expect("create should succeed");

    store
        .delete_service("svc_delete")
        .await
        .expect("delete should succeed");

    let err = store
        .get_service("svc_delete")
        .await
        .expect_err("deleted service should be gone");
    assert!(err.is_not_found());

    let err = store
        .delete_service("svc_delete")
        .await
        .expect_err("second delete should fail");
    assert!(err.is_not_found());
}

// =============================================================================
// list / count / names
// =============================================================================

pub async fn test_list_count_and_names<S: ServiceStore>(store: &S) {
    let before = store.get_service_count().await.expect("count should succeed");

    for name in ["svc_list_b", "svc_list_a"] {
        store
            .create_service(make_service(name))
            .await
            .expect("create should succeed");
    }

    let after = store.get_service_count().await.expect("count should succeed");
    assert_eq!(after, before + 2);

    let names = store.get_service_names().await.expect("names should succeed");
    assert!(names.contains(&"svc_list_a".to_string()));
    assert!(names.contains(&"svc_list_b".to_string()));

    let services = store.list_all_services().await.expect("list should succeed");
    assert_eq!(services.len() as i64, after);

    let listed: Vec<&str> = services.iter().map(|s| s.name.as_str()).collect();
    let mut sorted = listed.clone();
    sorted.sort();
    assert_eq!(listed, sorted, "services should be listed by name");
}

// =============================================================================
// bulk import / export
// =============================================================================

pub async fn test_write_policy_store_rejects_functions<S: ServiceStore>(store: &S) {
    let before = store.get_service_count().await.expect("count should succeed");

    let snapshot = StoreSnapshot {
        services: vec![make_service("svc_never_written")],
        functions: vec![Function {
            name: "fn1".to_string(),
            ..Default::default()
        }],
    };

    let err = store
        .write_policy_store(snapshot)
        .await
        .expect_err("functions are not stored");
    assert!(matches!(err, StorageError::Unimplemented(_)));

    let after = store.get_service_count().await.expect("count should succeed");
    assert_eq!(after, before, "rejected snapshot must not touch data");
}

pub async fn test_function_store_unimplemented<S: FunctionStore>(store: &S) {
    let err = store
        .create_function(Function {
            name: "fn1".to_string(),
            ..Default::default()
        })
        .await
        .expect_err("function storage is not provided");
    assert!(matches!(err, StorageError::Unimplemented(_)));

    assert!(matches!(
        store.get_function("fn1").await,
        Err(StorageError::Unimplemented(_))
    ));
    assert!(matches!(
        store.list_all_functions("").await,
        Err(StorageError::Unimplemented(_))
    ));
    assert!(matches!(
        store.get_function_count().await,
        Err(StorageError::Unimplemented(_))
    ));
    assert!(matches!(
        store.delete_function("fn1").await,
        Err(StorageError::Unimplemented(_))
    ));
    assert!(matches!(
        store.delete_functions().await,
        Err(StorageError::Unimplemented(_))
    ));
}

pub async fn test_write_policy_store_replaces_everything<S: ServiceStore + PolicyStore>(
    store: &S,
) {
    let mut svc = make_service("svc_snapshot_a");
    svc.policies.push(Policy {
        id: "snap-1".to_string(),
        name: "snapshot policy".to_string(),
        ..Default::default()
    });

    let snapshot = StoreSnapshot {
        services: vec![svc, make_service("svc_snapshot_b")],
        functions: Vec::new(),
    };

    store
        .write_policy_store(snapshot.clone())
        .await
        .expect("write should succeed");

    let read = store.read_policy_store().await.expect("read should succeed");
    assert_eq!(read, snapshot);

    assert_eq!(store.get_policy_count("").await.expect("count"), 1);

    store
        .delete_services()
        .await
        .expect("delete all should succeed");
    assert_eq!(store.get_service_count().await.expect("count"), 0);

    store
        .delete_services()
        .await
        .expect("deleting an empty store should succeed");

    let counts = store
        .get_policy_and_role_policy_counts()
        .await
        .expect("counts should succeed");
    assert!(counts.is_empty());
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all ServiceStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_service_store_tests {
    ($store:expr) => {
        use $crate::storage::service_store_tests::*;

        test_create_and_get_service($store).await;
        println!("  test_create_and_get_service: PASSED");

        test_create_duplicate_service($store).await;
        println!("  test_create_duplicate_service: PASSED");

        test_get_missing_service($store).await;
        println!("  test_get_missing_service: PASSED");

        test_service_with_policies_round_trips($store).await;
        println!("  test_service_with_policies_round_trips: PASSED");

        test_delete_service($store).await;
        println!("  test_delete_service: PASSED");

        test_list_count_and_names($store).await;
        println!("  test_list_count_and_names: PASSED");

        test_write_policy_store_rejects_functions($store).await;
        println!("  test_write_policy_store_rejects_functions: PASSED");

        test_function_store_unimplemented($store).await;
        println!("  test_function_store_unimplemented: PASSED");

        // Wipes the store.
        test_write_policy_store_replaces_everything($store).await;
        println!("  test_write_policy_store_replaces_everything: PASSED");
    };
}
