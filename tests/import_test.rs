mod common;

use assert_matches::assert_matches;
use common::TestApp;
use std::io::Write;
use yardline::{
    config::AppConfig,
    entities::{ItemStatus, YardLocation},
    errors::ServiceError,
    services::import::{read_import_csv, read_import_file, ImportRow},
};

fn row(category: &str, serial: &str, location: &str, status: &str, unit: &str) -> ImportRow {
    ImportRow {
        category_name: category.to_string(),
        serial_number: serial.to_string(),
        location: location.to_string(),
        status: status.to_string(),
        unit: unit.to_string(),
    }
}

fn sample_batch() -> Vec<ImportRow> {
    vec![
        row("Drill Pipe", "dp-001", "Maadi Yard", "Available", "joint"),
        row("Drill Pipe", "DP-002", "maadi_yard", "On Job", ""),
        row("Drill Collar", " dc-01 ", "Abu Rudies", "", "pcs"),
    ]
}

#[tokio::test]
async fn fresh_import_creates_items_and_categories() {
    let app = TestApp::new().await;

    let summary = app
        .state
        .services
        .import
        .reconcile(sample_batch())
        .await
        .expect("import");

    assert_eq!(summary.created, 3);
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.skipped, 0);
    assert!(summary.errors.is_empty());
    assert_eq!(summary.processed(), 3);

    let inventory = &app.state.services.inventory;
    let dc = inventory.find_by_serial("DC-01").await.unwrap().expect("DC-01");
    assert_eq!(dc.location, YardLocation::AbuRudiesYard);
    assert_eq!(dc.status, ItemStatus::Available);
    let dp2 = inventory.find_by_serial("dp-002").await.unwrap().expect("DP-002");
    assert_eq!(dp2.status, ItemStatus::OnJob);

    let counts = inventory.recalculate_category_quantities().await.unwrap();
    let drill_pipe = counts.iter().find(|c| c.name == "Drill Pipe").unwrap();
    assert_eq!(drill_pipe.count, 2);
    assert_eq!(drill_pipe.unit.as_deref(), Some("joint"));
}

#[tokio::test]
async fn second_run_changes_nothing() {
    let app = TestApp::new().await;
    let import = &app.state.services.import;
    import.reconcile(sample_batch()).await.unwrap();

    let again = import.reconcile(sample_batch()).await.unwrap();

    assert_eq!(again.created, 0);
    assert_eq!(again.updated, 0);
    assert_eq!(again.unchanged, 3);
    assert!(again.errors.is_empty());
    assert_eq!(again.warnings.len(), 3);
    assert_eq!(
        again.warnings[0].message,
        "Row 2: Item 'DP-001' already exists (no changes)."
    );
}

#[tokio::test]
async fn changed_fields_count_as_updates() {
    let app = TestApp::new().await;
    let import = &app.state.services.import;
    import.reconcile(sample_batch()).await.unwrap();

    let summary = import
        .reconcile(vec![
            row("Drill Pipe", "DP-001", "abu-rudies-yard", "available", ""),
            row("Drill Pipe", "DP-002", "maadi-yard", "re cut", ""),
            row("Drill Collar", "DC-01", "abu-rudies-yard", "available", ""),
        ])
        .await
        .unwrap();

    assert_eq!(summary.updated, 2);
    assert_eq!(summary.unchanged, 1);
    let inventory = &app.state.services.inventory;
    let dp1 = inventory.find_by_serial("DP-001").await.unwrap().unwrap();
    assert_eq!(dp1.location, YardLocation::AbuRudiesYard);
    let dp2 = inventory.find_by_serial("DP-002").await.unwrap().unwrap();
    assert_eq!(dp2.status, ItemStatus::ReCut);
}

#[tokio::test]
async fn bad_rows_are_skipped_without_failing_the_batch() {
    let app = TestApp::new().await;

    let rows = vec![
        row("Drill Pipe", "DP-001", "maadi-yard", "available", ""),
        row("", "", "", "", ""),
        row("Drill Pipe", "dp-001", "maadi-yard", "available", ""),
        row("Drill Pipe", "DP-003", "Cairo", "available", ""),
        row("Drill Pipe", "DP-004", "maadi-yard", "lost", ""),
        row("", "DP-005", "maadi-yard", "available", ""),
        row("Drill Pipe", "DP-006", "", "available", ""),
    ];
    let summary = app.state.services.import.reconcile(rows).await.unwrap();

    assert_eq!(summary.created, 1);
    assert_eq!(summary.skipped, 5);
    assert_eq!(summary.processed(), 6);
    assert!(summary.errors.len() >= summary.skipped);

    let messages: Vec<&str> = summary.errors.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "Row 4: Duplicate SerialNumber 'DP-001' (first seen on row 2).",
            "Row 5: Invalid Location 'Cairo'.",
            "Row 6: Invalid Status 'lost'.",
            "Row 7: Missing CategoryName.",
            "Row 8: Missing Location.",
        ]
    );
}

#[tokio::test]
async fn existing_category_units_are_kept() {
    let app = TestApp::new().await;
    app.category("Drill Pipe", Some("joint")).await;

    app.state
        .services
        .import
        .reconcile(vec![row("Drill Pipe", "DP-001", "maadi-yard", "", "ft")])
        .await
        .unwrap();

    let counts = app
        .state
        .services
        .inventory
        .recalculate_category_quantities()
        .await
        .unwrap();
    assert_eq!(counts.len(), 1);
    assert_eq!(counts[0].unit.as_deref(), Some("joint"));
    assert_eq!(counts[0].count, 1);
}

#[tokio::test]
async fn oversized_batches_are_refused() {
    let mut cfg = AppConfig::new("sqlite::memory:".to_string(), "test".to_string());
    cfg.import.max_rows = 2;
    let app = TestApp::with_config(cfg).await;

    let err = app
        .state
        .services
        .import
        .reconcile(sample_batch())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ImportError(_));
    assert!(app
        .state
        .services
        .inventory
        .find_by_serial("DP-001")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn csv_files_feed_the_reconciler() {
    let app = TestApp::new().await;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "SerialNumber,CategoryName,Location,Unit").unwrap();
    writeln!(file, "TB-100,Tubing,Maadi Yard,joint").unwrap();
    writeln!(file, ",,,").unwrap();
    writeln!(file, "TB-101,Tubing,Abu Rudies Yard,").unwrap();
    file.flush().unwrap();

    let rows = read_import_file(file.path()).unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows[1].is_blank());

    let summary = app.state.services.import.reconcile(rows).await.unwrap();
    assert_eq!(summary.created, 2);
    assert_eq!(summary.processed(), 2);
}

#[test]
fn missing_columns_are_reported_together() {
    let data = "CategoryName,Status\nDrill Pipe,available\n";
    let err = read_import_csv(data.as_bytes()).unwrap_err();
    assert_matches!(err, ServiceError::ImportError(msg) => {
        assert_eq!(msg, "Missing required column(s): SerialNumber, Location");
    });
}

#[test]
fn unreadable_files_are_import_errors() {
    let dir = tempfile::tempdir().unwrap();
    let err = read_import_file(&dir.path().join("missing.csv")).unwrap_err();
    assert_matches!(err, ServiceError::ImportError(_));
}
