// crates/batchboard/tests/queries.rs
mod common;

use common::{simple_context, ts, MemoryStore};

use batchboard::jobs::model::{JobExecutionsParams, JobInstancesParams, UnknownStatus};
use batchboard::jobs::{BatchStatus, QueryEngine};

/// Five `importJob` instances (1..=5) and one `exportJob` instance (6).
fn seeded() -> MemoryStore {
    let store = MemoryStore::new();
    for id in 1..=5 {
        store.add_instance(id, "importJob");
    }
    store.add_instance(6, "exportJob");

    store.add_execution(10, 1, "COMPLETED", Some(ts(2024, 3, 1, 2, 0, 0)), Some(ts(2024, 3, 1, 2, 0, 10)));
    store.add_execution(11, 1, "FAILED", Some(ts(2024, 3, 2, 2, 0, 0)), None);
    store.add_execution(12, 2, "COMPLETED", Some(ts(2024, 3, 3, 2, 0, 0)), Some(ts(2024, 3, 3, 2, 1, 0)));
    store.add_execution(13, 6, "STARTED", Some(ts(2024, 3, 4, 2, 0, 0)), None);
    store.add_execution(14, 6, "STARTING", None, None);
    store
}

fn instances(job_name: Option<&str>, page: Option<i64>, size: Option<i64>) -> JobInstancesParams {
    JobInstancesParams {
        job_name: job_name.map(str::to_string),
        page,
        size,
        sort: None,
    }
}

#[tokio::test]
async fn instance_pages_follow_the_page_arithmetic() {
    let store = seeded();
    let engine = QueryEngine::new(store);

    let first = engine
        .find_job_instances(&instances(Some("importJob"), Some(0), Some(2)))
        .await
        .unwrap();
    assert_eq!(first.total_elements, 5);
    assert_eq!(first.total_pages, 3);
    let ids: Vec<_> = first.content.iter().map(|i| i.job_instance_id).collect();
    assert_eq!(ids, [5, 4]);

    let last = engine
        .find_job_instances(&instances(Some("importJob"), Some(2), Some(2)))
        .await
        .unwrap();
    assert_eq!(last.content.len(), 1);
    assert_eq!(last.content[0].job_instance_id, 1);
    assert_eq!(last.page, 2);
    assert_eq!(last.size, 2);
}

#[tokio::test]
async fn blank_job_name_lists_everything() {
    let engine = QueryEngine::new(seeded());

    let page = engine
        .find_job_instances(&instances(Some("  "), None, None))
        .await
        .unwrap();
    assert_eq!(page.total_elements, 6);
    assert_eq!(page.size, 20);
    assert_eq!(page.total_pages, 1);
}

#[tokio::test]
async fn instance_carries_its_latest_execution() {
    let engine = QueryEngine::new(seeded());

    let page = engine
        .find_job_instances(&instances(None, None, None))
        .await
        .unwrap();
    let first = page
        .content
        .iter()
        .find(|i| i.job_instance_id == 1)
        .unwrap();
    let latest = first.latest_execution.as_ref().unwrap();
    assert_eq!(latest.job_execution_id, 11);
    assert_eq!(latest.status, BatchStatus::Failed);

    let never_ran = page
        .content
        .iter()
        .find(|i| i.job_instance_id == 3)
        .unwrap();
    assert!(never_ran.latest_execution.is_none());
}

#[tokio::test]
async fn execution_filters_narrow_the_result() {
    let engine = QueryEngine::new(seeded());

    let all = engine
        .find_job_executions(&JobExecutionsParams::default())
        .await
        .unwrap();
    let ids: Vec<_> = all.content.iter().map(|e| e.job_execution_id).collect();
    // not yet started first, then newest start
    assert_eq!(ids, [14, 13, 12, 11, 10]);

    let completed = engine
        .find_job_executions(&JobExecutionsParams {
            status: Some(BatchStatus::Completed),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(completed.total_elements, 2);
    assert!(completed
        .content
        .iter()
        .all(|e| e.status == BatchStatus::Completed));

    let windowed = engine
        .find_job_executions(&JobExecutionsParams {
            job_name: Some("importJob".into()),
            start_date_from: Some(ts(2024, 3, 2, 0, 0, 0)),
            start_date_to: Some(ts(2024, 3, 3, 2, 0, 0)),
            ..Default::default()
        })
        .await
        .unwrap();
    let ids: Vec<_> = windowed.content.iter().map(|e| e.job_execution_id).collect();
    assert_eq!(ids, [12, 11]);
}

#[tokio::test]
async fn instance_detail_lists_executions() {
    let engine = QueryEngine::new(seeded());

    let detail = engine.get_job_instance_detail(1).await.unwrap().unwrap();
    assert_eq!(detail.instance.job_name, "importJob");
    let ids: Vec<_> = detail.executions.iter().map(|e| e.job_execution_id).collect();
    assert_eq!(ids, [11, 10]);

    assert!(engine.get_job_instance_detail(999).await.unwrap().is_none());
}

#[tokio::test]
async fn execution_detail_has_parameters_and_steps() {
    let store = seeded();
    store.add_parameter(10, "run.date", "java.time.LocalDate", "2024-03-01");
    store.add_step(101, 10, "load", "COMPLETED");
    store.add_step(100, 10, "extract", "COMPLETED");
    let engine = QueryEngine::new(store);

    let detail = engine.get_job_execution_detail(10).await.unwrap().unwrap();
    assert_eq!(detail.execution.status, BatchStatus::Completed);
    assert_eq!(detail.parameters.len(), 1);
    assert_eq!(detail.parameters[0].name, "run.date");
    let steps: Vec<_> = detail.steps.iter().map(|s| s.step_name.as_str()).collect();
    assert_eq!(steps, ["extract", "load"]);

    assert!(engine.get_job_execution_detail(999).await.unwrap().is_none());
}

#[tokio::test]
async fn step_detail_decodes_its_context() {
    let store = seeded();
    store.add_step(100, 10, "extract", "COMPLETED");
    store.set_context(100, &simple_context());
    let engine = QueryEngine::new(store);

    let detail = engine.get_step_execution_detail(100).await.unwrap().unwrap();
    assert_eq!(detail.summary.read_count, 10);
    let names: Vec<_> = detail
        .execution_context
        .iter()
        .map(|i| (i.name.as_str(), i.value.as_str()))
        .collect();
    assert_eq!(names, [("x", "42"), ("y", "hello")]);
}

#[tokio::test]
async fn broken_context_still_returns_the_step() {
    let store = seeded();
    store.add_step(100, 10, "extract", "COMPLETED");
    store.add_step(101, 10, "load", "COMPLETED");
    // valid base64, truncated stream
    store.set_context(100, &simple_context()[..40]);
    let engine = QueryEngine::new(store);

    let detail = engine.get_step_execution_detail(100).await.unwrap().unwrap();
    assert_eq!(detail.summary.step_name, "extract");
    assert!(detail.execution_context.is_empty());

    // no context row at all
    let detail = engine.get_step_execution_detail(101).await.unwrap().unwrap();
    assert!(detail.execution_context.is_empty());

    assert!(engine.get_step_execution_detail(999).await.unwrap().is_none());
}

#[tokio::test]
async fn unknown_stored_status_fails_the_request() {
    let store = seeded();
    store.add_instance(7, "legacyJob");
    store.add_execution(70, 7, "RUNNING", Some(ts(2024, 3, 5, 0, 0, 0)), None);
    let engine = QueryEngine::new(store);

    let err = engine.get_job_execution_detail(70).await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<UnknownStatus>(),
        Some(&UnknownStatus("RUNNING".into()))
    );
}

#[tokio::test]
async fn store_failures_propagate() {
    let store = seeded();
    store.set_failing(true);
    let engine = QueryEngine::new(store);

    let err = engine
        .find_job_instances(&instances(None, None, None))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("connection refused"));
}
