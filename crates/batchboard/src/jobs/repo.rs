// crates/batchboard/src/jobs/repo.rs

use anyhow::Context;
use chrono::NaiveDateTime;
use sqlx::PgPool;

use crate::jobs::model::{ExecutionContext, JobExecutionStats, JobParameter};
use crate::jobs::page::PageRequest;
use crate::jobs::store::{
    DailyStatusCountRecord, ExecutionStore, JobExecutionFilter, JobExecutionRecord,
    JobInstanceFilter, JobInstanceRecord, JobSummaryRecord, StatusCountRecord,
    StepExecutionRecord,
};

/// Postgres-backed [`ExecutionStore`] over the standard `batch_*` tables.
#[derive(Clone)]
pub struct BatchRepo {
    pool: PgPool,
}

impl BatchRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl ExecutionStore for BatchRepo {
    // ----------------------------
    // Job instances
    // ----------------------------

    async fn find_job_instances(
        &self,
        filter: &JobInstanceFilter,
        page: PageRequest,
    ) -> anyhow::Result<Vec<JobInstanceRecord>> {
        let rows = sqlx::query_as::<_, JobInstanceRecord>(
            r#"
            SELECT
                ji.job_instance_id,
                ji.job_name,
                ji.job_key,
                COALESCE(ji.version, 0) AS version,
                je.job_execution_id AS latest_execution_id,
                je.start_time AS latest_start_time,
                je.end_time AS latest_end_time,
                je.status AS latest_status
            FROM batch_job_instance ji
            LEFT JOIN LATERAL (
                SELECT e.job_execution_id, e.start_time, e.end_time,
                       COALESCE(e.status, 'UNKNOWN') AS status
                FROM batch_job_execution e
                WHERE e.job_instance_id = ji.job_instance_id
                ORDER BY e.job_execution_id DESC
                LIMIT 1
            ) je ON true
            WHERE ($1::varchar IS NULL OR ji.job_name = $1)
            ORDER BY ji.job_instance_id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(filter.job_name.as_deref())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .context("listing job instances")?;

        Ok(rows)
    }

    async fn count_job_instances(&self, filter: &JobInstanceFilter) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM batch_job_instance ji
            WHERE ($1::varchar IS NULL OR ji.job_name = $1)
            "#,
        )
        .bind(filter.job_name.as_deref())
        .fetch_one(&self.pool)
        .await
        .context("counting job instances")?;

        Ok(count)
    }

    async fn find_job_instance(
        &self,
        job_instance_id: i64,
    ) -> anyhow::Result<Option<JobInstanceRecord>> {
        let row = sqlx::query_as::<_, JobInstanceRecord>(
            r#"
            SELECT
                ji.job_instance_id,
                ji.job_name,
                ji.job_key,
                COALESCE(ji.version, 0) AS version,
                je.job_execution_id AS latest_execution_id,
                je.start_time AS latest_start_time,
                je.end_time AS latest_end_time,
                je.status AS latest_status
            FROM batch_job_instance ji
            LEFT JOIN LATERAL (
                SELECT e.job_execution_id, e.start_time, e.end_time,
                       COALESCE(e.status, 'UNKNOWN') AS status
                FROM batch_job_execution e
                WHERE e.job_instance_id = ji.job_instance_id
                ORDER BY e.job_execution_id DESC
                LIMIT 1
            ) je ON true
            WHERE ji.job_instance_id = $1
            "#,
        )
        .bind(job_instance_id)
        .fetch_optional(&self.pool)
        .await
        .context("loading job instance")?;

        Ok(row)
    }

    // ----------------------------
    // Job executions
    // ----------------------------

    async fn find_job_executions(
        &self,
        filter: &JobExecutionFilter,
        page: PageRequest,
    ) -> anyhow::Result<Vec<JobExecutionRecord>> {
        let rows = sqlx::query_as::<_, JobExecutionRecord>(
            r#"
            SELECT
                je.job_execution_id,
                je.job_instance_id,
                ji.job_name,
                je.create_time,
                je.start_time,
                je.end_time,
                COALESCE(je.status, 'UNKNOWN') AS status,
                je.exit_code,
                je.exit_message,
                je.last_updated
            FROM batch_job_execution je
            JOIN batch_job_instance ji ON je.job_instance_id = ji.job_instance_id
            WHERE ($1::varchar IS NULL OR ji.job_name = $1)
              AND ($2::varchar IS NULL OR je.status = $2)
              AND ($3::timestamp IS NULL OR je.start_time >= $3)
              AND ($4::timestamp IS NULL OR je.start_time <= $4)
            ORDER BY je.start_time DESC NULLS FIRST, je.job_execution_id DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(filter.job_name.as_deref())
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.start_date_from)
        .bind(filter.start_date_to)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .context("listing job executions")?;

        Ok(rows)
    }

    async fn count_job_executions(&self, filter: &JobExecutionFilter) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM batch_job_execution je
            JOIN batch_job_instance ji ON je.job_instance_id = ji.job_instance_id
            WHERE ($1::varchar IS NULL OR ji.job_name = $1)
              AND ($2::varchar IS NULL OR je.status = $2)
              AND ($3::timestamp IS NULL OR je.start_time >= $3)
              AND ($4::timestamp IS NULL OR je.start_time <= $4)
            "#,
        )
        .bind(filter.job_name.as_deref())
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.start_date_from)
        .bind(filter.start_date_to)
        .fetch_one(&self.pool)
        .await
        .context("counting job executions")?;

        Ok(count)
    }

    async fn find_executions_for_instance(
        &self,
        job_instance_id: i64,
    ) -> anyhow::Result<Vec<JobExecutionRecord>> {
        let rows = sqlx::query_as::<_, JobExecutionRecord>(
            r#"
            SELECT
                je.job_execution_id,
                je.job_instance_id,
                ji.job_name,
                je.create_time,
                je.start_time,
                je.end_time,
                COALESCE(je.status, 'UNKNOWN') AS status,
                je.exit_code,
                je.exit_message,
                je.last_updated
            FROM batch_job_execution je
            JOIN batch_job_instance ji ON je.job_instance_id = ji.job_instance_id
            WHERE je.job_instance_id = $1
            ORDER BY je.start_time DESC NULLS FIRST, je.job_execution_id DESC
            "#,
        )
        .bind(job_instance_id)
        .fetch_all(&self.pool)
        .await
        .context("listing executions of job instance")?;

        Ok(rows)
    }

    async fn find_job_execution(
        &self,
        job_execution_id: i64,
    ) -> anyhow::Result<Option<JobExecutionRecord>> {
        let row = sqlx::query_as::<_, JobExecutionRecord>(
            r#"
            SELECT
                je.job_execution_id,
                je.job_instance_id,
                ji.job_name,
                je.create_time,
                je.start_time,
                je.end_time,
                COALESCE(je.status, 'UNKNOWN') AS status,
                je.exit_code,
                je.exit_message,
                je.last_updated
            FROM batch_job_execution je
            JOIN batch_job_instance ji ON je.job_instance_id = ji.job_instance_id
            WHERE je.job_execution_id = $1
            "#,
        )
        .bind(job_execution_id)
        .fetch_optional(&self.pool)
        .await
        .context("loading job execution")?;

        Ok(row)
    }

    async fn find_job_parameters(&self, job_execution_id: i64) -> anyhow::Result<Vec<JobParameter>> {
        let rows = sqlx::query_as::<_, JobParameter>(
            r#"
            SELECT
                jp.parameter_name AS name,
                jp.parameter_type AS type_name,
                jp.parameter_value AS value,
                (jp.identifying = 'Y') AS identifying
            FROM batch_job_execution_params jp
            WHERE jp.job_execution_id = $1
            "#,
        )
        .bind(job_execution_id)
        .fetch_all(&self.pool)
        .await
        .context("loading job parameters")?;

        Ok(rows)
    }

    // ----------------------------
    // Step executions
    // ----------------------------

    async fn find_steps_for_execution(
        &self,
        job_execution_id: i64,
    ) -> anyhow::Result<Vec<StepExecutionRecord>> {
        let rows = sqlx::query_as::<_, StepExecutionRecord>(
            r#"
            SELECT
                se.step_execution_id,
                se.job_execution_id,
                se.step_name,
                se.version,
                se.create_time,
                se.start_time,
                se.end_time,
                COALESCE(se.status, 'UNKNOWN') AS status,
                COALESCE(se.commit_count, 0) AS commit_count,
                COALESCE(se.read_count, 0) AS read_count,
                COALESCE(se.filter_count, 0) AS filter_count,
                COALESCE(se.write_count, 0) AS write_count,
                COALESCE(se.read_skip_count, 0) AS read_skip_count,
                COALESCE(se.write_skip_count, 0) AS write_skip_count,
                COALESCE(se.process_skip_count, 0) AS process_skip_count,
                COALESCE(se.rollback_count, 0) AS rollback_count,
                se.exit_code,
                se.exit_message,
                se.last_updated
            FROM batch_step_execution se
            WHERE se.job_execution_id = $1
            ORDER BY se.step_execution_id ASC
            "#,
        )
        .bind(job_execution_id)
        .fetch_all(&self.pool)
        .await
        .context("listing step executions")?;

        Ok(rows)
    }

    async fn find_step_execution(
        &self,
        step_execution_id: i64,
    ) -> anyhow::Result<Option<StepExecutionRecord>> {
        let row = sqlx::query_as::<_, StepExecutionRecord>(
            r#"
            SELECT
                se.step_execution_id,
                se.job_execution_id,
                se.step_name,
                se.version,
                se.create_time,
                se.start_time,
                se.end_time,
                COALESCE(se.status, 'UNKNOWN') AS status,
                COALESCE(se.commit_count, 0) AS commit_count,
                COALESCE(se.read_count, 0) AS read_count,
                COALESCE(se.filter_count, 0) AS filter_count,
                COALESCE(se.write_count, 0) AS write_count,
                COALESCE(se.read_skip_count, 0) AS read_skip_count,
                COALESCE(se.write_skip_count, 0) AS write_skip_count,
                COALESCE(se.process_skip_count, 0) AS process_skip_count,
                COALESCE(se.rollback_count, 0) AS rollback_count,
                se.exit_code,
                se.exit_message,
                se.last_updated
            FROM batch_step_execution se
            WHERE se.step_execution_id = $1
            "#,
        )
        .bind(step_execution_id)
        .fetch_optional(&self.pool)
        .await
        .context("loading step execution")?;

        Ok(row)
    }

    async fn find_step_execution_context(
        &self,
        step_execution_id: i64,
    ) -> anyhow::Result<Option<ExecutionContext>> {
        let row = sqlx::query_as::<_, ExecutionContext>(
            r#"
            SELECT ec.short_context, ec.serialized_context
            FROM batch_step_execution_context ec
            WHERE ec.step_execution_id = $1
            "#,
        )
        .bind(step_execution_id)
        .fetch_optional(&self.pool)
        .await
        .context("loading step execution context")?;

        Ok(row)
    }

    // ----------------------------
    // Statistics
    // ----------------------------

    async fn count_job_names(&self) -> anyhow::Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(DISTINCT ji.job_name) FROM batch_job_instance ji")
                .fetch_one(&self.pool)
                .await
                .context("counting job names")?;

        Ok(count)
    }

    async fn count_executions_by_status(
        &self,
        job_name: Option<&str>,
    ) -> anyhow::Result<Vec<StatusCountRecord>> {
        let rows = sqlx::query_as::<_, StatusCountRecord>(
            r#"
            SELECT
                COALESCE(je.status, 'UNKNOWN') AS status,
                COUNT(*) AS count
            FROM batch_job_execution je
            JOIN batch_job_instance ji ON je.job_instance_id = ji.job_instance_id
            WHERE ($1::varchar IS NULL OR ji.job_name = $1)
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .bind(job_name)
        .fetch_all(&self.pool)
        .await
        .context("counting executions by status")?;

        Ok(rows)
    }

    async fn count_daily_executions(
        &self,
        since: NaiveDateTime,
    ) -> anyhow::Result<Vec<DailyStatusCountRecord>> {
        let rows = sqlx::query_as::<_, DailyStatusCountRecord>(
            r#"
            SELECT
                DATE(je.start_time) AS day,
                COALESCE(je.status, 'UNKNOWN') AS status,
                COUNT(*) AS count
            FROM batch_job_execution je
            WHERE je.start_time IS NOT NULL
              AND je.start_time >= $1
            GROUP BY 1, 2
            ORDER BY 1 DESC, 2
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .context("counting daily executions")?;

        Ok(rows)
    }

    async fn summarize_job(&self, job_name: &str) -> anyhow::Result<Option<JobSummaryRecord>> {
        // HAVING turns "no executions" into no row, so the caller can tell
        // an unknown job name apart from a job whose aggregates are null.
        let row = sqlx::query_as::<_, JobSummaryRecord>(
            r#"
            SELECT
                COUNT(*) AS total_executions,
                MAX(je.start_time) AS last_execution_time,
                (AVG(EXTRACT(EPOCH FROM (je.end_time - je.start_time)))
                    FILTER (WHERE je.start_time IS NOT NULL AND je.end_time IS NOT NULL)
                )::float8 AS average_duration_seconds
            FROM batch_job_execution je
            JOIN batch_job_instance ji ON je.job_instance_id = ji.job_instance_id
            WHERE ji.job_name = $1
            HAVING COUNT(*) > 0
            "#,
        )
        .bind(job_name)
        .fetch_optional(&self.pool)
        .await
        .context("summarizing job")?;

        Ok(row)
    }

    async fn count_executions_per_job(
        &self,
        since: NaiveDateTime,
    ) -> anyhow::Result<Vec<JobExecutionStats>> {
        let rows = sqlx::query_as::<_, JobExecutionStats>(
            r#"
            SELECT
                ji.job_name,
                COUNT(je.job_execution_id) AS executions
            FROM batch_job_instance ji
            JOIN batch_job_execution je ON ji.job_instance_id = je.job_instance_id
            WHERE je.start_time >= $1
            GROUP BY ji.job_name
            ORDER BY executions DESC, ji.job_name
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .context("counting executions per job")?;

        Ok(rows)
    }
}
