use anyhow::Context;
use tracing::{debug, warn};

use crate::context::ExecutionContextDecoder;
use crate::jobs::model::{
    BatchStatus, JobExecution, JobExecutionDetail, JobExecutionSummary, JobExecutionsParams,
    JobInstance, JobInstanceDetail, JobInstancesParams, StepExecutionDetail, StepExecutionSummary,
};
use crate::jobs::page::{PageRequest, PageResponse};
use crate::jobs::store::{
    ExecutionStore, JobExecutionFilter, JobExecutionRecord, JobInstanceFilter, JobInstanceRecord,
    StepExecutionRecord,
};

/// Listing and detail views over instances, executions and steps.
#[derive(Clone)]
pub struct QueryEngine<S> {
    store: S,
    decoder: ExecutionContextDecoder,
}

impl<S: ExecutionStore> QueryEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            decoder: ExecutionContextDecoder::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn find_job_instances(
        &self,
        params: &JobInstancesParams,
    ) -> anyhow::Result<PageResponse<JobInstance>> {
        let filter = JobInstanceFilter {
            job_name: non_blank(params.job_name.as_deref()),
        };
        let page = PageRequest::new(params.page, params.size);

        let rows = self.store.find_job_instances(&filter, page).await?;
        let total = self.store.count_job_instances(&filter).await?;
        let content = rows
            .into_iter()
            .map(job_instance)
            .collect::<anyhow::Result<Vec<_>>>()?;

        debug!(?filter, page = page.page(), size = page.size(), total, "listed job instances");
        Ok(PageResponse::new(content, page, total))
    }

    pub async fn get_job_instance_detail(
        &self,
        job_instance_id: i64,
    ) -> anyhow::Result<Option<JobInstanceDetail>> {
        let Some(row) = self.store.find_job_instance(job_instance_id).await? else {
            return Ok(None);
        };
        let instance = job_instance(row)?;

        let executions = self
            .store
            .find_executions_for_instance(job_instance_id)
            .await?
            .into_iter()
            .map(|row| job_execution(row).map(|(execution, _)| execution))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Some(JobInstanceDetail {
            instance,
            executions,
        }))
    }

    pub async fn find_job_executions(
        &self,
        params: &JobExecutionsParams,
    ) -> anyhow::Result<PageResponse<JobExecution>> {
        let filter = JobExecutionFilter {
            job_name: non_blank(params.job_name.as_deref()),
            status: params.status,
            start_date_from: params.start_date_from,
            start_date_to: params.start_date_to,
        };
        let page = PageRequest::new(params.page, params.size);

        let rows = self.store.find_job_executions(&filter, page).await?;
        let total = self.store.count_job_executions(&filter).await?;
        let content = rows
            .into_iter()
            .map(|row| job_execution(row).map(|(execution, _)| execution))
            .collect::<anyhow::Result<Vec<_>>>()?;

        debug!(?filter, page = page.page(), size = page.size(), total, "listed job executions");
        Ok(PageResponse::new(content, page, total))
    }

    pub async fn get_job_execution_detail(
        &self,
        job_execution_id: i64,
    ) -> anyhow::Result<Option<JobExecutionDetail>> {
        let Some(row) = self.store.find_job_execution(job_execution_id).await? else {
            return Ok(None);
        };
        let (execution, last_updated) = job_execution(row)?;

        let parameters = self.store.find_job_parameters(job_execution_id).await?;
        let steps = self
            .store
            .find_steps_for_execution(job_execution_id)
            .await?
            .into_iter()
            .map(|row| step_execution(row).map(|detail| detail.summary))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Some(JobExecutionDetail {
            execution,
            last_updated,
            parameters,
            steps,
        }))
    }

    /// The decoded context is best effort: an unreadable blob is logged and
    /// shows up as an empty list, the rest of the detail is still returned.
    pub async fn get_step_execution_detail(
        &self,
        step_execution_id: i64,
    ) -> anyhow::Result<Option<StepExecutionDetail>> {
        let Some(row) = self.store.find_step_execution(step_execution_id).await? else {
            return Ok(None);
        };
        let mut detail = step_execution(row)?;

        let context = self
            .store
            .find_step_execution_context(step_execution_id)
            .await?;
        detail.execution_context = match context {
            None => Vec::new(),
            Some(context) => match self.decoder.decode(&context) {
                Ok(items) => items,
                Err(err) => {
                    warn!(step_execution_id, error = %err, "failed to decode execution context");
                    Vec::new()
                }
            },
        };

        Ok(Some(detail))
    }
}

fn non_blank(raw: Option<&str>) -> Option<String> {
    raw.filter(|s| !s.trim().is_empty()).map(str::to_string)
}

fn status(raw: &str, what: &str, id: i64) -> anyhow::Result<BatchStatus> {
    raw.parse::<BatchStatus>()
        .with_context(|| format!("{what} {id}"))
}

fn job_instance(row: JobInstanceRecord) -> anyhow::Result<JobInstance> {
    let latest_execution = match row.latest_execution_id {
        Some(job_execution_id) => Some(JobExecutionSummary {
            job_execution_id,
            start_time: row.latest_start_time,
            end_time: row.latest_end_time,
            status: status(
                row.latest_status.as_deref().unwrap_or(BatchStatus::Unknown.as_str()),
                "job execution",
                job_execution_id,
            )?,
        }),
        None => None,
    };

    Ok(JobInstance {
        job_instance_id: row.job_instance_id,
        job_name: row.job_name,
        job_key: row.job_key,
        version: row.version,
        latest_execution,
    })
}

/// The execution plus its `last_updated`, which only the detail view shows.
fn job_execution(
    row: JobExecutionRecord,
) -> anyhow::Result<(JobExecution, Option<chrono::NaiveDateTime>)> {
    let status = status(&row.status, "job execution", row.job_execution_id)?;
    Ok((
        JobExecution {
            job_execution_id: row.job_execution_id,
            job_instance_id: row.job_instance_id,
            job_name: row.job_name,
            create_time: row.create_time,
            start_time: row.start_time,
            end_time: row.end_time,
            status,
            exit_code: row.exit_code,
            exit_message: row.exit_message,
        },
        row.last_updated,
    ))
}

/// Detail with an empty context; callers fill it in when they need it.
fn step_execution(row: StepExecutionRecord) -> anyhow::Result<StepExecutionDetail> {
    let status = status(&row.status, "step execution", row.step_execution_id)?;
    Ok(StepExecutionDetail {
        summary: StepExecutionSummary {
            step_execution_id: row.step_execution_id,
            step_name: row.step_name,
            status,
            read_count: row.read_count,
            write_count: row.write_count,
            filter_count: row.filter_count,
            start_time: row.start_time,
            end_time: row.end_time,
        },
        job_execution_id: row.job_execution_id,
        version: row.version,
        create_time: row.create_time,
        commit_count: row.commit_count,
        read_skip_count: row.read_skip_count,
        write_skip_count: row.write_skip_count,
        process_skip_count: row.process_skip_count,
        rollback_count: row.rollback_count,
        exit_code: row.exit_code,
        exit_message: row.exit_message,
        last_updated: row.last_updated,
        execution_context: Vec::new(),
    })
}
