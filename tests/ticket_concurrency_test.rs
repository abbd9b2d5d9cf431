mod common;

use chrono::NaiveDate;
use common::Yard;
use sea_orm::EntityTrait;
use std::collections::BTreeSet;
use yardline::{
    entities::{delivery_ticket, delivery_ticket_item, ItemStatus, JobType},
    errors::ServiceError,
    services::{jobs::NewJob, tickets::DeliveryLine},
};

// Twenty deliveries of the same item race; the item row lock lets exactly one
// through and the rest see it is no longer available.
#[tokio::test]
async fn concurrent_deliveries_of_one_item_succeed_once() {
    let yard = Yard::new().await;
    let item = yard.items(&["DP-001"]).await[0].id;

    let mut tasks = vec![];
    for n in 0..20 {
        let tickets = yard.app.state.services.tickets.clone();
        let job_id = yard.job.id;
        tasks.push(tokio::spawn(async move {
            tickets
                .create_delivery_ticket(
                    job_id,
                    vec![DeliveryLine::returnable(item)],
                    Some(format!("clerk {}", n)),
                )
                .await
        }));
    }

    let mut numbers = vec![];
    let mut refused = 0;
    for task in tasks {
        match task.await.expect("task panicked") {
            Ok(ticket) => numbers.push(ticket.ticket_number),
            Err(ServiceError::InvalidOperation(_)) => refused += 1,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    assert_eq!(numbers, vec!["DT-001".to_string()]);
    assert_eq!(refused, 19);
    assert_eq!(yard.app.status_of(item).await, ItemStatus::OnJob);
    assert_eq!(
        delivery_ticket_item::Entity::find()
            .all(yard.app.db())
            .await
            .unwrap()
            .len(),
        1
    );
    assert_eq!(
        delivery_ticket::Entity::find()
            .all(yard.app.db())
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn concurrent_tickets_on_one_job_get_distinct_numbers() {
    let yard = Yard::new().await;
    let serials: Vec<String> = (1..=8).map(|n| format!("DP-{:03}", n)).collect();
    let serial_refs: Vec<&str> = serials.iter().map(String::as_str).collect();
    let items = yard.items(&serial_refs).await;

    let mut tasks = vec![];
    for item in &items {
        let tickets = yard.app.state.services.tickets.clone();
        let job_id = yard.job.id;
        let item_id = item.id;
        tasks.push(tokio::spawn(async move {
            tickets
                .create_delivery_ticket(job_id, vec![DeliveryLine::returnable(item_id)], None)
                .await
        }));
    }

    let mut numbers = BTreeSet::new();
    let mut dates = BTreeSet::new();
    for task in tasks {
        let ticket = task.await.expect("task panicked").expect("delivery");
        numbers.insert(ticket.ticket_number);
        dates.insert(ticket.ticket_date);
    }

    let expected: BTreeSet<String> = (1..=8).map(|n| format!("DT-{:03}", n)).collect();
    assert_eq!(numbers, expected);
    assert_eq!(dates.len(), 8);
}

#[tokio::test]
async fn concurrent_jobs_of_one_type_get_distinct_numbers() {
    let yard = Yard::new().await;

    let mut tasks = vec![];
    for _ in 0..6 {
        let jobs = yard.app.state.services.jobs.clone();
        let customer_id = yard.customer.id;
        tasks.push(tokio::spawn(async move {
            jobs.create_job(NewJob {
                job_type: JobType::Rental,
                customer_id,
                rig: "EDC-54".to_string(),
                location: "Western Desert".to_string(),
                well: "Badr-3".to_string(),
                trans: None,
                date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                description: None,
            })
            .await
        }));
    }

    let mut numbers = BTreeSet::new();
    for task in tasks {
        numbers.insert(task.await.expect("task panicked").expect("job").job_number);
    }

    let expected: BTreeSet<String> = (1..=6).map(|n| format!("1102-{:03}", n)).collect();
    assert_eq!(numbers, expected);
}
