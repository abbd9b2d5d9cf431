mod common;

use assert_matches::assert_matches;
use common::{TestApp, Yard};
use yardline::{
    entities::{ItemStatus, YardLocation},
    errors::ServiceError,
    services::inventory::{ItemFilter, NewItem},
};

#[tokio::test]
async fn bulk_status_change_applies_to_every_item() {
    let yard = Yard::new().await;
    let items = yard.items(&["DP-001", "DP-002"]).await;
    let inventory = &yard.app.state.services.inventory;

    let updated = inventory
        .set_status(
            &[items[0].id, items[1].id, items[0].id],
            ItemStatus::ReCut,
            Some("thread damage".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(updated.len(), 2);
    assert!(updated.iter().all(|i| i.status == ItemStatus::ReCut));
    assert_eq!(updated[0].status_note.as_deref(), Some("thread damage"));
}

#[tokio::test]
async fn bulk_status_change_is_all_or_nothing() {
    let yard = Yard::new().await;
    let items = yard.items(&["DP-001"]).await;
    let inventory = &yard.app.state.services.inventory;

    let err = inventory
        .set_status(&[items[0].id, 9_999], ItemStatus::Junk, None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
    assert_eq!(yard.app.status_of(items[0].id).await, ItemStatus::Available);

    let err = inventory
        .set_status(&[], ItemStatus::Junk, None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));
}

#[tokio::test]
async fn serials_are_unique_and_case_insensitive() {
    let yard = Yard::new().await;
    yard.items(&["dp-001"]).await;
    let inventory = &yard.app.state.services.inventory;

    let found = inventory.find_by_serial(" DP-001").await.unwrap();
    assert_eq!(found.map(|i| i.serial_number).as_deref(), Some("DP-001"));

    let err = inventory
        .add_item(NewItem {
            serial_number: "DP-001 ".to_string(),
            category_id: yard.drill_pipe.id,
            location: YardLocation::MaadiYard,
            status: ItemStatus::Available,
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));
}

#[tokio::test]
async fn status_and_location_queries() {
    let app = TestApp::new().await;
    let pipe = app.category("Drill Pipe", Some("joint")).await;
    app.item("DP-002", pipe.id).await;
    app.item("DP-001", pipe.id).await;
    app.item_with("DP-003", pipe.id, YardLocation::AbuRudiesYard, ItemStatus::Available)
        .await;
    app.item_with("DP-004", pipe.id, YardLocation::MaadiYard, ItemStatus::Lih)
        .await;
    let inventory = &app.state.services.inventory;

    let maadi = inventory
        .find_by_status_and_location(ItemStatus::Available, YardLocation::MaadiYard)
        .await
        .unwrap();
    assert_eq!(
        maadi.iter().map(|i| i.serial_number.as_str()).collect::<Vec<_>>(),
        vec!["DP-001", "DP-002"]
    );

    let cell = inventory
        .items_in_category_at(pipe.id, YardLocation::MaadiYard)
        .await
        .unwrap();
    assert_eq!(cell.len(), 3);
}

#[tokio::test]
async fn dashboard_counts_statuses_and_open_jobs() {
    let yard = Yard::new().await;
    let pipe = yard.drill_pipe.id;
    yard.items(&["DP-001"]).await;
    yard.app
        .item_with("DP-002", pipe, YardLocation::MaadiYard, ItemStatus::ReCut)
        .await;
    yard.app
        .item_with("DP-003", pipe, YardLocation::MaadiYard, ItemStatus::LihDbr)
        .await;

    let dashboard = yard.app.state.services.inventory.dashboard().await.unwrap();

    assert_eq!(dashboard.total_items, 3);
    assert_eq!(dashboard.attention, 2);
    let available = dashboard
        .by_status
        .iter()
        .find(|s| s.status == ItemStatus::Available)
        .unwrap();
    assert_eq!(available.count, 1);
    assert_eq!(dashboard.open_jobs.len(), 1);
    assert_eq!(dashboard.open_jobs[0].job_number, "1101-001");
}

#[tokio::test]
async fn location_summary_groups_by_yard_and_category() {
    let app = TestApp::new().await;
    let pipe = app.category("Drill Pipe", Some("joint")).await;
    let collar = app.category("Drill Collar", Some("pcs")).await;
    app.item("DP-001", pipe.id).await;
    app.item("DP-002", pipe.id).await;
    app.item("DC-001", collar.id).await;
    app.item_with("DP-003", pipe.id, YardLocation::AbuRudiesYard, ItemStatus::Sold)
        .await;
    let inventory = &app.state.services.inventory;

    let summary = inventory.location_summary(None).await.unwrap();
    assert_eq!(summary.len(), 2);
    let maadi = &summary[0];
    assert_eq!(maadi.label, "Maadi Yard");
    assert_eq!(maadi.total, 3);
    assert_eq!(maadi.categories.len(), 2);
    assert_eq!(summary[1].total, 1);

    let searched = inventory.location_summary(Some("collar")).await.unwrap();
    assert_eq!(searched[0].categories.len(), 1);
    assert_eq!(searched[0].categories[0].name, "Drill Collar");
    assert_eq!(searched[1].total, 0);
}

#[tokio::test]
async fn filtered_lists_combine_filter_and_search() {
    let app = TestApp::new().await;
    let pipe = app.category("Drill Pipe", None).await;
    app.item("DP-001", pipe.id).await;
    app.item_with("DP-002", pipe.id, YardLocation::MaadiYard, ItemStatus::ReCut)
        .await;
    app.item_with("XO-9", pipe.id, YardLocation::MaadiYard, ItemStatus::ReCut)
        .await;
    let inventory = &app.state.services.inventory;

    assert_eq!(
        inventory.filtered_items(ItemFilter::All, None).await.unwrap().len(),
        3
    );
    assert_eq!(
        inventory
            .filtered_items(ItemFilter::Attention, None)
            .await
            .unwrap()
            .len(),
        2
    );
    let searched = inventory
        .filtered_items(ItemFilter::Status(ItemStatus::ReCut), Some("dp"))
        .await
        .unwrap();
    assert_eq!(searched.len(), 1);
    assert_eq!(searched[0].serial_number, "DP-002");
}

#[tokio::test]
async fn categories_in_use_cannot_be_deleted() {
    let app = TestApp::new().await;
    let pipe = app.category("Drill Pipe", None).await;
    let spare = app.category("Spare", None).await;
    app.item("DP-001", pipe.id).await;
    let inventory = &app.state.services.inventory;

    assert_matches!(
        inventory.delete_category(pipe.id).await,
        Err(ServiceError::Conflict(_))
    );
    inventory.delete_category(spare.id).await.unwrap();
    assert_matches!(
        inventory.delete_category(spare.id).await,
        Err(ServiceError::NotFound(_))
    );

    let again = app.category("Drill Pipe", Some("joint")).await;
    assert_eq!(again.id, pipe.id);
}
