mod common;

use assert_matches::assert_matches;
use common::Yard;
use std::collections::BTreeSet;
use yardline::{
    entities::{ItemStatus, JobStatus, JobType},
    errors::ServiceError,
    services::{
        reconciliation::JobCloseOutcome,
        tickets::{DeliveryLine, ReceivingLine},
    },
};

#[tokio::test]
async fn close_is_refused_while_a_returnable_item_is_out() {
    let yard = Yard::new().await;
    // The fixture job is 1101-001; this one is 1101-002.
    let job = yard.app.job(yard.customer.id, JobType::Fishing).await;
    assert_eq!(job.job_number, "1101-002");
    let items = yard.items(&["X-100"]).await;
    let services = &yard.app.state.services;
    services
        .tickets
        .create_delivery_ticket(job.id, vec![DeliveryLine::returnable(items[0].id)], None)
        .await
        .unwrap();

    let outcome = services.reconciliation.close_job(job.id).await.unwrap();

    assert_eq!(
        outcome,
        JobCloseOutcome::Refused {
            job_number: "1101-002".to_string(),
            unreturned: vec!["X-100".to_string()],
        }
    );
    assert!(outcome.message().contains("X-100"));
    assert_eq!(yard.app.job_row(job.id).await.status, JobStatus::Open);
    assert!(!services.reconciliation.can_close(job.id).await.unwrap());
}

#[tokio::test]
async fn close_succeeds_once_everything_is_back() {
    let yard = Yard::new().await;
    let items = yard.items(&["DP-001", "DP-002"]).await;
    let services = &yard.app.state.services;
    services
        .tickets
        .create_delivery_ticket(
            yard.job.id,
            vec![
                DeliveryLine::returnable(items[0].id),
                DeliveryLine::sold(items[1].id),
            ],
            None,
        )
        .await
        .unwrap();
    services
        .tickets
        .create_receiving_ticket(yard.job.id, vec![ReceivingLine::available(items[0].id)], None)
        .await
        .unwrap();

    let outcome = services.reconciliation.close_job(yard.job.id).await.unwrap();

    assert!(outcome.is_closed());
    assert_eq!(
        outcome.message(),
        "Job '1101-001' has been successfully closed."
    );
    assert_eq!(yard.app.job_row(yard.job.id).await.status, JobStatus::Closed);
}

#[tokio::test]
async fn sold_items_never_block_closing() {
    let yard = Yard::new().await;
    let items = yard.items(&["DP-001"]).await;
    let services = &yard.app.state.services;
    services
        .tickets
        .create_delivery_ticket(yard.job.id, vec![DeliveryLine::sold(items[0].id)], None)
        .await
        .unwrap();

    assert!(services.reconciliation.still_out(yard.job.id).await.unwrap().is_empty());
    assert!(services.reconciliation.close_job(yard.job.id).await.unwrap().is_closed());
}

#[tokio::test]
async fn reopen_is_unconditional_and_idempotent() {
    let yard = Yard::new().await;
    let services = &yard.app.state.services;
    assert!(services.reconciliation.close_job(yard.job.id).await.unwrap().is_closed());

    let reopened = services.reconciliation.reopen_job(yard.job.id).await.unwrap();
    assert_eq!(reopened.status, JobStatus::Open);
    let again = services.reconciliation.reopen_job(yard.job.id).await.unwrap();
    assert_eq!(again.status, JobStatus::Open);

    let err = services.reconciliation.reopen_job(777).await.unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn redelivery_to_another_job_moves_the_item() {
    let yard = Yard::new().await;
    let job_b = yard.app.job(yard.customer.id, JobType::Rental).await;
    let items = yard.items(&["DP-001"]).await;
    let item = items[0].id;
    let services = &yard.app.state.services;

    services
        .tickets
        .create_delivery_ticket(yard.job.id, vec![DeliveryLine::returnable(item)], None)
        .await
        .unwrap();
    services
        .tickets
        .create_receiving_ticket(yard.job.id, vec![ReceivingLine::available(item)], None)
        .await
        .unwrap();
    services
        .tickets
        .create_delivery_ticket(job_b.id, vec![DeliveryLine::returnable(item)], None)
        .await
        .unwrap();

    assert_eq!(yard.app.status_of(item).await, ItemStatus::OnJob);
    assert!(services.reconciliation.still_out(yard.job.id).await.unwrap().is_empty());
    let out_b = services.reconciliation.still_out(job_b.id).await.unwrap();
    assert_eq!(out_b.len(), 1);
    assert_eq!(out_b[0].serial_number, "DP-001");
    assert!(services.reconciliation.close_job(yard.job.id).await.unwrap().is_closed());
}

#[tokio::test]
async fn items_received_elsewhere_are_not_out() {
    let yard = Yard::new().await;
    let items = yard.items(&["DP-001", "DP-002"]).await;
    let services = &yard.app.state.services;
    services
        .tickets
        .create_delivery_ticket(
            yard.job.id,
            vec![
                DeliveryLine::returnable(items[0].id),
                DeliveryLine::returnable(items[1].id),
            ],
            None,
        )
        .await
        .unwrap();
    services
        .tickets
        .create_receiving_ticket(
            yard.job.id,
            vec![ReceivingLine::new(items[1].id, ItemStatus::PendingInspection)],
            None,
        )
        .await
        .unwrap();

    let receivable = services
        .reconciliation
        .receivable_items(yard.job.id)
        .await
        .unwrap();
    assert_eq!(
        receivable.iter().map(|i| i.id).collect::<Vec<_>>(),
        vec![items[0].id]
    );
}

#[tokio::test]
async fn replay_matches_direct_derivation() {
    let yard = Yard::new().await;
    let job_b = yard.app.job(yard.customer.id, JobType::Jars).await;
    let items = yard.items(&["A-1", "A-2", "A-3", "A-4", "A-5"]).await;
    let ids: Vec<i64> = items.iter().map(|i| i.id).collect();
    let tickets = &yard.app.state.services.tickets;
    let reconciliation = &yard.app.state.services.reconciliation;

    tickets
        .create_delivery_ticket(
            yard.job.id,
            vec![
                DeliveryLine::returnable(ids[0]),
                DeliveryLine::returnable(ids[1]),
                DeliveryLine::sold(ids[2]),
            ],
            None,
        )
        .await
        .unwrap();
    tickets
        .create_delivery_ticket(
            job_b.id,
            vec![DeliveryLine::returnable(ids[3]), DeliveryLine::returnable(ids[4])],
            None,
        )
        .await
        .unwrap();
    tickets
        .create_receiving_ticket(
            yard.job.id,
            vec![ReceivingLine::available(ids[0])],
            None,
        )
        .await
        .unwrap();
    tickets
        .create_receiving_ticket(
            job_b.id,
            vec![ReceivingLine::new(ids[3], ItemStatus::ReCut)],
            None,
        )
        .await
        .unwrap();
    tickets
        .create_delivery_ticket(job_b.id, vec![DeliveryLine::returnable(ids[0])], None)
        .await
        .unwrap();

    for job_id in [yard.job.id, job_b.id] {
        let direct: BTreeSet<i64> = reconciliation
            .still_out(job_id)
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        let replayed = reconciliation.replay_still_out(job_id).await.unwrap();
        assert_eq!(direct, replayed, "job {}", job_id);
    }

    let replayed_a = reconciliation.replay_still_out(yard.job.id).await.unwrap();
    assert_eq!(replayed_a, BTreeSet::from([ids[1]]));
    let replayed_b = reconciliation.replay_still_out(job_b.id).await.unwrap();
    assert_eq!(replayed_b, BTreeSet::from([ids[0], ids[4]]));
}

#[tokio::test]
async fn job_detail_lists_history_newest_first() {
    let yard = Yard::new().await;
    let items = yard.items(&["DP-001", "DP-002"]).await;
    let services = &yard.app.state.services;
    services
        .tickets
        .create_delivery_ticket(
            yard.job.id,
            vec![
                DeliveryLine::returnable(items[0].id),
                DeliveryLine::sold(items[1].id),
            ],
            Some("driver".to_string()),
        )
        .await
        .unwrap();
    services
        .tickets
        .create_receiving_ticket(yard.job.id, vec![ReceivingLine::available(items[0].id)], None)
        .await
        .unwrap();

    let detail = services.jobs.job_detail(yard.job.id).await.unwrap();

    assert_eq!(detail.customer.name, "Acme");
    assert_eq!(detail.history.len(), 2);
    assert_eq!(detail.history[0].ticket_number, "RT-001");
    assert_eq!(detail.history[1].ticket_number, "DT-001");
    assert_eq!(detail.history[1].created_by.as_deref(), Some("driver"));
    let sold_line = detail.history[1]
        .lines
        .iter()
        .find(|l| l.item_id == items[1].id)
        .unwrap();
    assert_eq!(sold_line.is_returnable, Some(false));
    assert!(detail.still_out.is_empty());
}

#[tokio::test]
async fn items_added_to_an_old_delivery_are_still_out() {
    let yard = Yard::new().await;
    let items = yard.items(&["A-1", "B-1"]).await;
    let (a, b) = (items[0].id, items[1].id);
    let services = &yard.app.state.services;
    let tickets = &services.tickets;

    let first = tickets
        .create_delivery_ticket(yard.job.id, vec![DeliveryLine::returnable(a)], None)
        .await
        .unwrap();
    tickets
        .create_delivery_ticket(yard.job.id, vec![DeliveryLine::returnable(b)], None)
        .await
        .unwrap();
    tickets
        .create_receiving_ticket(yard.job.id, vec![ReceivingLine::available(b)], None)
        .await
        .unwrap();
    tickets
        .create_receiving_ticket(yard.job.id, vec![ReceivingLine::available(a)], None)
        .await
        .unwrap();

    // B goes back out on the first ticket, after its receipt was recorded.
    tickets
        .edit_delivery_ticket(
            first.id,
            vec![DeliveryLine::returnable(a), DeliveryLine::returnable(b)],
        )
        .await
        .expect("edit");

    assert_eq!(yard.app.status_of(b).await, ItemStatus::OnJob);
    let out: Vec<i64> = services
        .reconciliation
        .still_out(yard.job.id)
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.id)
        .collect();
    assert_eq!(out, vec![b]);
    assert_eq!(
        services.reconciliation.replay_still_out(yard.job.id).await.unwrap(),
        BTreeSet::from([b])
    );

    let outcome = services.reconciliation.close_job(yard.job.id).await.unwrap();
    assert_matches!(outcome, JobCloseOutcome::Refused { unreturned, .. } => {
        assert_eq!(unreturned, vec!["B-1".to_string()]);
    });
    assert_eq!(yard.app.job_row(yard.job.id).await.status, JobStatus::Open);
}
