//! Read-only access to the batch engine's metadata tables.
//!
//! Records carry statuses as the raw stored strings; turning them into
//! [`BatchStatus`](crate::jobs::model::BatchStatus) values (and rejecting
//! unknown ones) is the query layer's job.

use chrono::{NaiveDate, NaiveDateTime};
use std::future::Future;

use crate::jobs::model::{ExecutionContext, JobExecutionStats, JobParameter, JobStatus};
use crate::jobs::page::PageRequest;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct JobInstanceRecord {
    pub job_instance_id: i64,
    pub job_name: String,
    pub job_key: String,
    pub version: i64,
    /// Latest execution (greatest execution id); all `None` when the
    /// instance has never run.
    pub latest_execution_id: Option<i64>,
    pub latest_start_time: Option<NaiveDateTime>,
    pub latest_end_time: Option<NaiveDateTime>,
    pub latest_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct JobExecutionRecord {
    pub job_execution_id: i64,
    pub job_instance_id: i64,
    pub job_name: String,
    pub create_time: NaiveDateTime,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub status: String,
    pub exit_code: Option<String>,
    pub exit_message: Option<String>,
    pub last_updated: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct StepExecutionRecord {
    pub step_execution_id: i64,
    pub job_execution_id: i64,
    pub step_name: String,
    pub version: i64,
    pub create_time: NaiveDateTime,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub status: String,
    pub commit_count: i64,
    pub read_count: i64,
    pub filter_count: i64,
    pub write_count: i64,
    pub read_skip_count: i64,
    pub write_skip_count: i64,
    pub process_skip_count: i64,
    pub rollback_count: i64,
    pub exit_code: Option<String>,
    pub exit_message: Option<String>,
    pub last_updated: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StatusCountRecord {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct DailyStatusCountRecord {
    pub day: NaiveDate,
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct JobSummaryRecord {
    pub total_executions: i64,
    pub last_execution_time: Option<NaiveDateTime>,
    /// Mean of `end - start` in seconds over finished executions; `None`
    /// when no execution has finished.
    pub average_duration_seconds: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobInstanceFilter {
    pub job_name: Option<String>,
}

/// Each `None` matches every row. Date bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobExecutionFilter {
    pub job_name: Option<String>,
    pub status: Option<JobStatus>,
    pub start_date_from: Option<NaiveDateTime>,
    pub start_date_to: Option<NaiveDateTime>,
}

/// The only component that reads the batch tables. Implementations never write.
pub trait ExecutionStore: Clone + Send + Sync + 'static {
    /// Matching instances ordered by instance id descending, windowed by `page`.
    fn find_job_instances(
        &self,
        filter: &JobInstanceFilter,
        page: PageRequest,
    ) -> impl Future<Output = anyhow::Result<Vec<JobInstanceRecord>>> + Send;

    fn count_job_instances(
        &self,
        filter: &JobInstanceFilter,
    ) -> impl Future<Output = anyhow::Result<i64>> + Send;

    fn find_job_instance(
        &self,
        job_instance_id: i64,
    ) -> impl Future<Output = anyhow::Result<Option<JobInstanceRecord>>> + Send;

    /// Matching executions ordered by start time descending (not yet started
    /// first), then execution id descending, windowed by `page`.
    fn find_job_executions(
        &self,
        filter: &JobExecutionFilter,
        page: PageRequest,
    ) -> impl Future<Output = anyhow::Result<Vec<JobExecutionRecord>>> + Send;

    fn count_job_executions(
        &self,
        filter: &JobExecutionFilter,
    ) -> impl Future<Output = anyhow::Result<i64>> + Send;

    /// All executions of one instance, start time descending.
    fn find_executions_for_instance(
        &self,
        job_instance_id: i64,
    ) -> impl Future<Output = anyhow::Result<Vec<JobExecutionRecord>>> + Send;

    fn find_job_execution(
        &self,
        job_execution_id: i64,
    ) -> impl Future<Output = anyhow::Result<Option<JobExecutionRecord>>> + Send;

    /// Parameters in storage order.
    fn find_job_parameters(
        &self,
        job_execution_id: i64,
    ) -> impl Future<Output = anyhow::Result<Vec<JobParameter>>> + Send;

    /// Steps of one execution, step execution id ascending.
    fn find_steps_for_execution(
        &self,
        job_execution_id: i64,
    ) -> impl Future<Output = anyhow::Result<Vec<StepExecutionRecord>>> + Send;

    fn find_step_execution(
        &self,
        step_execution_id: i64,
    ) -> impl Future<Output = anyhow::Result<Option<StepExecutionRecord>>> + Send;

    fn find_step_execution_context(
        &self,
        step_execution_id: i64,
    ) -> impl Future<Output = anyhow::Result<Option<ExecutionContext>>> + Send;

    /// Distinct job names across all instances.
    fn count_job_names(&self) -> impl Future<Output = anyhow::Result<i64>> + Send;

    /// Executions grouped by status, over all history, optionally for one job name.
    fn count_executions_by_status(
        &self,
        job_name: Option<&str>,
    ) -> impl Future<Output = anyhow::Result<Vec<StatusCountRecord>>> + Send;

    /// Executions with `start_time >= since`, grouped by start day and status.
    fn count_daily_executions(
        &self,
        since: NaiveDateTime,
    ) -> impl Future<Output = anyhow::Result<Vec<DailyStatusCountRecord>>> + Send;

    /// `None` when the job name has no executions at all.
    fn summarize_job(
        &self,
        job_name: &str,
    ) -> impl Future<Output = anyhow::Result<Option<JobSummaryRecord>>> + Send;

    /// Executions with `start_time >= since`, counted per job name.
    fn count_executions_per_job(
        &self,
        since: NaiveDateTime,
    ) -> impl Future<Output = anyhow::Result<Vec<JobExecutionStats>>> + Send;
}
