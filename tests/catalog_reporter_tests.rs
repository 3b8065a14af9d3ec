//! Catalog reporter against the real TDS connector

mod common;

use common::init_rustls;
use workload_identity_samples::catalog::{CatalogReporter, MssqlConnector};
use workload_identity_samples::credential::AmbientIdentity;
use workload_identity_samples::error::CatalogError;

async fn report(connection_string: &str) -> (workload_identity_samples::catalog::CatalogOutcome, String) {
    init_rustls();
    let reporter = CatalogReporter::new(MssqlConnector::new(connection_string, AmbientIdentity::Mock));
    let mut out = Vec::new();
    let outcome = reporter.run(&mut out).await.expect("write to buffer");
    (outcome, String::from_utf8(out).expect("utf8"))
}

#[tokio::test]
async fn test_unreachable_server_is_a_connection_failure() {
    // Nothing listens on port 1
    let (outcome, text) =
        report("Server=tcp:127.0.0.1,1; Authentication=Active Directory Default; Encrypt=True; Database=reddog").await;

    assert_eq!(outcome.exit_code(), 2);
    assert!(text.starts_with("\nQuery data example:\n=========================================\n"));
    assert!(text.contains("connection failed:"));
    assert!(text.ends_with("\nDone. Press enter.\n"));
}

#[tokio::test]
async fn test_unsupported_authentication_is_a_connection_failure() {
    let (outcome, text) = report("Server=tcp:127.0.0.1,1; Authentication=Sql Password").await;

    assert_eq!(outcome.exit_code(), 2);
    assert!(text.contains(&CatalogError::Connection("unsupported Authentication 'Sql Password'".to_string()).to_string()));
    assert!(text.ends_with("\nDone. Press enter.\n"));
}
