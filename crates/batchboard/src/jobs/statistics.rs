use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::clock::Clock;
use crate::jobs::model::{
    BatchStatus, DailyJobStats, JobExecutionStats, JobStatistics, JobSpecificStatistics,
    JobStatus,
};
use crate::jobs::store::{DailyStatusCountRecord, ExecutionStore, StatusCountRecord};

pub const MAX_DAYS: i64 = 3650;

pub fn clamp_days(days: i64) -> i64 {
    days.clamp(0, MAX_DAYS)
}

/// Aggregates over execution history.
#[derive(Clone)]
pub struct StatisticsEngine<S> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: ExecutionStore> StatisticsEngine<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Midnight `days` days before today.
    fn window_start(&self, days: i64) -> NaiveDateTime {
        let today = self.clock.today();
        today
            .checked_sub_days(Days::new(days.max(0) as u64))
            .unwrap_or(NaiveDate::MIN)
            .and_time(NaiveTime::default())
    }

    pub async fn get_job_statistics(&self, days: i64) -> anyhow::Result<JobStatistics> {
        let days = clamp_days(days);

        let total_jobs = self.store.count_job_names().await?;
        let jobs_by_status = status_map(self.store.count_executions_by_status(None).await?)?;

        let recent_job_statuses = if days == 0 {
            Vec::new()
        } else {
            let since = self.window_start(days);
            let rows = self.store.count_daily_executions(since).await?;
            daily_series(rows, days)?
        };

        debug!(days, total_jobs, days_with_activity = recent_job_statuses.len(), "job statistics");
        Ok(JobStatistics {
            total_jobs,
            jobs_by_status,
            recent_job_statuses,
        })
    }

    /// `None` when the job name has never been executed.
    pub async fn get_job_statistics_by_job_name(
        &self,
        job_name: &str,
    ) -> anyhow::Result<Option<JobSpecificStatistics>> {
        let Some(summary) = self.store.summarize_job(job_name).await? else {
            return Ok(None);
        };
        if summary.total_executions <= 0 {
            return Ok(None);
        }

        let executions_by_status =
            status_map(self.store.count_executions_by_status(Some(job_name)).await?)?;
        let completed = executions_by_status
            .get(&BatchStatus::Completed)
            .copied()
            .unwrap_or(0);

        Ok(Some(JobSpecificStatistics {
            job_name: job_name.to_string(),
            total_executions: summary.total_executions,
            executions_by_status,
            average_duration: finite_or_zero(summary.average_duration_seconds),
            last_execution_time: summary.last_execution_time,
            success_rate: success_rate(completed, summary.total_executions),
        }))
    }

    /// Most active jobs over the window, busiest first.
    pub async fn get_job_execution_stats(
        &self,
        days: i64,
    ) -> anyhow::Result<Vec<JobExecutionStats>> {
        let days = clamp_days(days);
        if days == 0 {
            return Ok(Vec::new());
        }

        let mut stats = self
            .store
            .count_executions_per_job(self.window_start(days))
            .await?;
        stats.sort_by(|a, b| {
            b.executions
                .cmp(&a.executions)
                .then_with(|| a.job_name.cmp(&b.job_name))
        });
        Ok(stats)
    }
}

/// Percentage of completed executions, `0.0` for an empty history.
pub fn success_rate(completed: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    finite_or_zero(Some(completed as f64 * 100.0 / total as f64)).clamp(0.0, 100.0)
}

pub fn finite_or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Counts per status. Several rows for one status are summed.
pub fn status_map(rows: Vec<StatusCountRecord>) -> anyhow::Result<BTreeMap<JobStatus, i64>> {
    let mut out = BTreeMap::new();
    for row in rows {
        let status: BatchStatus = row.status.parse()?;
        *out.entry(status).or_insert(0) += row.count;
    }
    Ok(out)
}

/// Pivots per-day status counts into COMPLETED / FAILED / ABANDONED columns.
/// Days with none of the three are left out; newest first, at most `days`.
pub fn daily_series(
    rows: Vec<DailyStatusCountRecord>,
    days: i64,
) -> anyhow::Result<Vec<DailyJobStats>> {
    let mut by_day: BTreeMap<NaiveDate, DailyJobStats> = BTreeMap::new();
    for row in rows {
        let status: BatchStatus = row.status.parse()?;
        let entry = by_day.entry(row.day).or_insert_with(|| DailyJobStats {
            date: row.day.format("%Y-%m-%d").to_string(),
            completed: 0,
            failed: 0,
            abandoned: 0,
        });
        match status {
            BatchStatus::Completed => entry.completed += row.count,
            BatchStatus::Failed => entry.failed += row.count,
            BatchStatus::Abandoned => entry.abandoned += row.count,
            _ => {}
        }
    }

    Ok(by_day
        .into_values()
        .rev()
        .filter(|d| d.completed != 0 || d.failed != 0 || d.abandoned != 0)
        .take(days.max(0) as usize)
        .collect())
}
