mod common;

use assert_matches::assert_matches;
use chrono::{NaiveDate, Utc};
use common::TestApp;
use sea_orm::{ActiveModelTrait, Set};
use yardline::{
    entities::{job, JobStatus, JobType},
    errors::ServiceError,
    services::jobs::NewJob,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn job_numbers_count_per_type() {
    let app = TestApp::new().await;
    let customer = app.customer("Acme").await;

    let first = app.job(customer.id, JobType::Fishing).await;
    let rental = app.job(customer.id, JobType::Rental).await;
    let second = app.job(customer.id, JobType::Fishing).await;
    let shop = app.job(customer.id, JobType::MachineShop).await;

    assert_eq!(first.job_number, "1101-001");
    assert_eq!(second.job_number, "1101-002");
    assert_eq!(rental.job_number, "1102-001");
    assert_eq!(shop.job_number, "1104-001");
    assert_eq!(first.status, JobStatus::Open);
}

#[tokio::test]
async fn numbering_continues_from_existing_records() {
    let app = TestApp::new().await;
    let customer = app.customer("Acme").await;
    job::ActiveModel {
        job_type: Set(JobType::Jars),
        job_number: Set("1103-041".to_string()),
        customer_id: Set(customer.id),
        rig: Set("ST-2".to_string()),
        location: Set("Gulf of Suez".to_string()),
        well: Set("GS-9".to_string()),
        trans: Set(None),
        date: Set(date(2024, 11, 2)),
        description: Set(None),
        status: Set(JobStatus::Closed),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(app.db())
    .await
    .unwrap();

    let next = app.job(customer.id, JobType::Jars).await;
    assert_eq!(next.job_number, "1103-042");
}

#[tokio::test]
async fn jobs_require_rig_location_and_well() {
    let app = TestApp::new().await;
    let customer = app.customer("Acme").await;

    let err = app
        .state
        .services
        .jobs
        .create_job(NewJob {
            job_type: JobType::Fishing,
            customer_id: customer.id,
            rig: "   ".to_string(),
            location: "Western Desert".to_string(),
            well: "Badr-3".to_string(),
            trans: None,
            date: date(2025, 3, 1),
            description: None,
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let err = app
        .state
        .services
        .jobs
        .create_job(NewJob {
            job_type: JobType::Fishing,
            customer_id: 404,
            rig: "EDC-54".to_string(),
            location: "Western Desert".to_string(),
            well: "Badr-3".to_string(),
            trans: None,
            date: date(2025, 3, 1),
            description: None,
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn job_list_filters_by_number_and_customer() {
    let app = TestApp::new().await;
    let acme = app.customer("Acme").await;
    let nile = app.customer("Nile Petroleum").await;
    app.job(acme.id, JobType::Fishing).await;
    app.job(nile.id, JobType::Rental).await;
    let jobs = &app.state.services.jobs;

    assert_eq!(jobs.list_jobs(None).await.unwrap().len(), 2);
    let nile_jobs = jobs.list_jobs(Some("nile")).await.unwrap();
    assert_eq!(nile_jobs.len(), 1);
    assert_eq!(nile_jobs[0].job.job_number, "1102-001");
    assert_eq!(jobs.list_jobs(Some("1101")).await.unwrap().len(), 1);

    let found = jobs.find_job_by_number(" 1102-001 ").await.unwrap();
    assert_eq!(found.customer_id, nile.id);
    assert_matches!(
        jobs.find_job_by_number("1102-999").await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn customers_with_jobs_cannot_be_deleted() {
    let app = TestApp::new().await;
    let acme = app.customer("Acme").await;
    let idle = app.customer("Idle Co").await;
    app.job(acme.id, JobType::Fishing).await;
    let jobs = &app.state.services.jobs;

    assert_matches!(jobs.delete_customer(acme.id).await, Err(ServiceError::Conflict(_)));
    jobs.delete_customer(idle.id).await.unwrap();
    assert_matches!(jobs.create_customer("Acme").await, Err(ServiceError::Conflict(_)));
}

#[tokio::test]
async fn contract_flags_uncovered_categories() {
    let app = TestApp::new().await;
    let acme = app.customer("Acme").await;
    let drill_pipe = app.category("Drill Pipe", Some("joint")).await;
    let tubing = app.category("Tubing", Some("joint")).await;
    let a = app.item("A", drill_pipe.id).await;
    let b = app.item("B", tubing.id).await;
    let services = &app.state.services;

    services
        .jobs
        .set_contract(acme.id, date(2025, 1, 1), None, &[drill_pipe.id])
        .await
        .unwrap();

    let flagged = services
        .contracts
        .out_of_contract(acme.id, &[a.id, b.id])
        .await
        .unwrap();
    assert_eq!(flagged, vec!["B".to_string()]);

    let job = app.job(acme.id, JobType::Rental).await;
    let flagged = services
        .contracts
        .out_of_contract_for_job(job.id, &[a.id, b.id])
        .await
        .unwrap();
    assert_eq!(flagged, vec!["B".to_string()]);
}

#[tokio::test]
async fn customers_without_a_contract_have_everything_flagged() {
    let app = TestApp::new().await;
    let walk_in = app.customer("Walk-in").await;
    let drill_pipe = app.category("Drill Pipe", None).await;
    let a = app.item("A", drill_pipe.id).await;
    let contracts = &app.state.services.contracts;

    assert_eq!(
        contracts.out_of_contract(walk_in.id, &[a.id]).await.unwrap(),
        vec!["A".to_string()]
    );
    assert_matches!(
        contracts.out_of_contract(walk_in.id, &[]).await,
        Err(ServiceError::InvalidInput(_))
    );
}

#[tokio::test]
async fn replacing_a_contract_replaces_its_categories() {
    let app = TestApp::new().await;
    let acme = app.customer("Acme").await;
    let drill_pipe = app.category("Drill Pipe", None).await;
    let tubing = app.category("Tubing", None).await;
    let a = app.item("A", drill_pipe.id).await;
    let b = app.item("B", tubing.id).await;
    let services = &app.state.services;

    let first = services
        .jobs
        .set_contract(acme.id, date(2025, 1, 1), None, &[drill_pipe.id])
        .await
        .unwrap();
    let second = services
        .jobs
        .set_contract(acme.id, date(2025, 1, 1), Some(date(2025, 12, 31)), &[tubing.id])
        .await
        .unwrap();
    assert_eq!(first.id, second.id);

    let flagged = services
        .contracts
        .out_of_contract(acme.id, &[a.id, b.id])
        .await
        .unwrap();
    assert_eq!(flagged, vec!["A".to_string()]);

    assert_matches!(
        services
            .jobs
            .set_contract(acme.id, date(2025, 6, 1), Some(date(2025, 1, 1)), &[])
            .await,
        Err(ServiceError::ValidationError(_))
    );
}
