//! HarvestClient against a stub HTTP server

use chrono::NaiveDate;
use serde_json::json;
use wiremock::matchers::{basic_auth, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use harvest_sync::model::{Project, User};
use harvest_sync::sync::RunPhase;
use harvest_sync::{
    DateWindow, EntityKind, HarvestClient, HarvestSource, MockSource, Modules, Record, SourceError, Store,
    SyncCoordinator,
};

async fn client(server: &MockServer) -> HarvestClient {
    HarvestClient::new(&server.uri(), "ops@acme.com", "hunter2").unwrap()
}

#[tokio::test]
async fn test_fetch_projects_with_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/projects"))
        .and(basic_auth("ops@acme.com", "hunter2"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "project": { "id": 1, "client_id": 10, "name": "Internal", "active": true } },
            { "project": { "id": 2, "client_id": 10, "name": "Website", "active": false } }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let records = client(&server).await.fetch_all(EntityKind::Project).await.unwrap();
    let names: Vec<_> = records
        .into_iter()
        .map(|record| match record {
            Record::Project(project) => project.name,
            other => panic!("unexpected {:?}", other),
        })
        .collect();
    assert_eq!(names, vec!["Internal", "Website"]);
}

#[tokio::test]
async fn test_windowed_entries_use_compact_dates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/projects/7/entries"))
        .and(query_param("from", "20240501"))
        .and(query_param("to", "20240531"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "day_entry": {
                "id": 90, "project_id": 7, "task_id": 3, "user_id": 4,
                "spent_at": "2024-05-02", "hours": 1.25, "notes": null
            } }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let window = DateWindow::new(
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(),
    )
    .unwrap();
    let records = client(&server)
        .await
        .fetch_windowed(EntityKind::DayEntry, 7, window)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind(), EntityKind::DayEntry);
    assert_eq!(records[0].id(), 90);
}

#[tokio::test]
async fn test_child_listing_paths() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/projects/7/task_assignments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "task_assignment": { "id": 5, "project_id": 7, "task_id": 3, "billable": true } }
        ])))
        .mount(&server)
        .await;

    let client = client(&server).await;
    let records = client.fetch_for_parent(EntityKind::TaskAssignment, 7).await.unwrap();
    assert_eq!(records[0].kind(), EntityKind::TaskAssignment);

    let err = client.fetch_for_parent(EntityKind::Project, 7).await.unwrap_err();
    assert!(matches!(err, SourceError::Unsupported(_)));
}

#[tokio::test]
async fn test_modules_from_who_am_i() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/account/who_am_i"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "company": {
                "base_uri": "https://acme.harvestapp.com",
                "modules": { "expenses": true, "invoices": false, "estimates": true }
            },
            "user": { "id": 1, "email": "ops@acme.com" }
        })))
        .mount(&server)
        .await;

    let modules = client(&server).await.modules().await.unwrap();
    assert_eq!(
        modules,
        Modules {
            expenses: true,
            invoices: false
        }
    );
}

#[tokio::test]
async fn test_null_module_flags_count_as_disabled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/account/who_am_i"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "company": { "modules": { "expenses": null, "invoices": true } }
        })))
        .mount(&server)
        .await;

    let modules = client(&server).await.modules().await.unwrap();
    assert_eq!(
        modules,
        Modules {
            expenses: false,
            invoices: true
        }
    );
}

#[tokio::test]
async fn test_null_module_table_disables_everything() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/account/who_am_i"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "company": { "modules": null } })))
        .mount(&server)
        .await;

    let modules = client(&server).await.modules().await.unwrap();
    assert_eq!(modules, Modules::default());
}

#[tokio::test]
async fn test_http_errors_and_bad_payloads() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/people"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tasks": [] })))
        .mount(&server)
        .await;

    let client = client(&server).await;
    let err = client.fetch_all(EntityKind::User).await.unwrap_err();
    assert!(matches!(err, SourceError::Status { status: 401, .. }));
    let err = client.fetch_all(EntityKind::Task).await.unwrap_err();
    assert!(matches!(err, SourceError::Decode(_)));
}

#[tokio::test]
async fn test_full_run_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/account/who_am_i"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "company": { "modules": { "expenses": false, "invoices": false } }
        })))
        .mount(&server)
        .await;
    for listing in ["/people", "/tasks", "/clients"] {
        Mock::given(method("GET"))
            .and(path(listing))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/projects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "project": { "id": 1, "client_id": 10, "name": "Internal" } }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/projects/1/task_assignments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/projects/1/entries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let mut sync = SyncCoordinator::new(Store::open_in_memory().unwrap(), client(&server).await);
    let window = DateWindow::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
    )
    .unwrap();
    let result = sync.run_sync(window).await.unwrap();
    assert!(result.committed, "{:?}", result.failure);
    assert_eq!(sync.store().get::<Project>(1).unwrap().unwrap().entity.name, "Internal");
}

#[tokio::test]
async fn test_record_missing_required_field_aborts_run_as_integrity_violation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/account/who_am_i"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "company": { "modules": { "expenses": false, "invoices": false } }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/people"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "user": { "id": 1, "email": "ana@acme.com" } },
            { "user": { "id": 2, "first_name": "Bo" } }
        ])))
        .mount(&server)
        .await;

    let mut sync = SyncCoordinator::new(Store::open_in_memory().unwrap(), client(&server).await);
    let window = DateWindow::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
    )
    .unwrap();
    let result = sync.run_sync(window).await.unwrap();

    assert!(!result.committed);
    let failure = result.failure.unwrap();
    assert_eq!(failure.phase, RunPhase::FetchParents);
    assert_eq!(failure.kind, Some(EntityKind::User));
    assert!(failure.message.starts_with("Integrity violation in user"), "{}", failure.message);
    assert!(failure.message.contains("missing required field `email`"), "{}", failure.message);
    assert_eq!(sync.store().count::<User>().unwrap(), 0);
}

#[test]
fn test_mock_and_http_share_the_trait() {
    fn assert_source<S: HarvestSource>() {}
    assert_source::<HarvestClient>();
    assert_source::<MockSource>();
}
