use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub use crate::context::{ExecutionContext, ExecutionContextItem};

/// Lifecycle state shared by job and step executions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Completed,
    Starting,
    Started,
    Stopping,
    Stopped,
    Failed,
    Abandoned,
    Unknown,
}

pub type JobStatus = BatchStatus;
pub type StepStatus = BatchStatus;

impl BatchStatus {
    pub const ALL: [BatchStatus; 8] = [
        BatchStatus::Completed,
        BatchStatus::Starting,
        BatchStatus::Started,
        BatchStatus::Stopping,
        BatchStatus::Stopped,
        BatchStatus::Failed,
        BatchStatus::Abandoned,
        BatchStatus::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Completed => "COMPLETED",
            BatchStatus::Starting => "STARTING",
            BatchStatus::Started => "STARTED",
            BatchStatus::Stopping => "STOPPING",
            BatchStatus::Stopped => "STOPPED",
            BatchStatus::Failed => "FAILED",
            BatchStatus::Abandoned => "ABANDONED",
            BatchStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown batch status {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for BatchStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BatchStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

// ----------------------------
// Job instances
// ----------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobExecutionSummary {
    pub job_execution_id: i64,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub status: JobStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInstance {
    pub job_instance_id: i64,
    pub job_name: String,
    pub job_key: String,
    pub version: i64,
    pub latest_execution: Option<JobExecutionSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInstanceDetail {
    #[serde(flatten)]
    pub instance: JobInstance,
    pub executions: Vec<JobExecution>,
}

// ----------------------------
// Job executions
// ----------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobExecution {
    pub job_execution_id: i64,
    pub job_instance_id: i64,
    pub job_name: String,
    pub create_time: NaiveDateTime,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub status: JobStatus,
    pub exit_code: Option<String>,
    pub exit_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct JobParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub value: Option<String>,
    pub identifying: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobExecutionDetail {
    #[serde(flatten)]
    pub execution: JobExecution,
    pub last_updated: Option<NaiveDateTime>,
    pub parameters: Vec<JobParameter>,
    pub steps: Vec<StepExecutionSummary>,
}

// ----------------------------
// Step executions
// ----------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepExecutionSummary {
    pub step_execution_id: i64,
    pub step_name: String,
    pub status: StepStatus,
    pub read_count: i64,
    pub write_count: i64,
    pub filter_count: i64,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepExecutionDetail {
    #[serde(flatten)]
    pub summary: StepExecutionSummary,
    pub job_execution_id: i64,
    pub version: i64,
    pub create_time: NaiveDateTime,
    pub commit_count: i64,
    pub read_skip_count: i64,
    pub write_skip_count: i64,
    pub process_skip_count: i64,
    pub rollback_count: i64,
    pub exit_code: Option<String>,
    pub exit_message: Option<String>,
    pub last_updated: Option<NaiveDateTime>,
    pub execution_context: Vec<ExecutionContextItem>,
}

// ----------------------------
// Statistics
// ----------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyJobStats {
    pub date: String,
    pub completed: i64,
    pub failed: i64,
    pub abandoned: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatistics {
    pub total_jobs: i64,
    pub jobs_by_status: BTreeMap<JobStatus, i64>,
    pub recent_job_statuses: Vec<DailyJobStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpecificStatistics {
    pub job_name: String,
    pub total_executions: i64,
    pub executions_by_status: BTreeMap<JobStatus, i64>,
    /// seconds
    pub average_duration: f64,
    pub last_execution_time: Option<NaiveDateTime>,
    /// percentage, 0..=100
    pub success_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct JobExecutionStats {
    pub job_name: String,
    pub executions: i64,
}

// ----------------------------
// Request params
// ----------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInstancesParams {
    pub job_name: Option<String>,
    pub page: Option<i64>,
    pub size: Option<i64>,
    /// Accepted for compatibility with the dashboard; ordering is fixed.
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobExecutionsParams {
    pub job_name: Option<String>,
    pub status: Option<JobStatus>,
    #[serde(default, deserialize_with = "opt_local_date_time")]
    pub start_date_from: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "opt_local_date_time")]
    pub start_date_to: Option<NaiveDateTime>,
    pub page: Option<i64>,
    pub size: Option<i64>,
    /// Accepted for compatibility with the dashboard; ordering is fixed.
    pub sort: Option<String>,
}

/// Parses the local timestamps the dashboard sends: `datetime-local` inputs
/// (`2024-01-15T10:30`), full ISO timestamps with seconds/fractions, or a
/// bare date meaning midnight.
pub fn parse_local_date_time(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn opt_local_date_time<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_local_date_time(s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date-time {s:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_every_known_name_and_rejects_others() {
        for st in BatchStatus::ALL {
            assert_eq!(st.as_str().parse::<BatchStatus>().unwrap(), st);
        }
        let err = "completed".parse::<BatchStatus>().unwrap_err();
        assert_eq!(err, UnknownStatus("completed".into()));
        assert!("RUNNING".parse::<BatchStatus>().is_err());
    }

    #[test]
    fn status_serializes_as_upper_case_map_key() {
        let mut m = BTreeMap::new();
        m.insert(BatchStatus::Failed, 1_i64);
        m.insert(BatchStatus::Completed, 2);
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, r#"{"COMPLETED":2,"FAILED":1}"#);
    }

    #[test]
    fn local_date_time_accepts_dashboard_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        assert_eq!(parse_local_date_time("2024-01-15T10:30"), Some(expected));
        assert_eq!(parse_local_date_time("2024-01-15T10:30:00"), Some(expected));
        assert_eq!(parse_local_date_time("2024-01-15 10:30:00.000"), Some(expected));
        assert_eq!(
            parse_local_date_time("2024-01-15"),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_local_date_time("yesterday"), None);
    }

    #[test]
    fn detail_flattens_into_one_json_object() {
        let created = parse_local_date_time("2024-01-15T10:00").unwrap();
        let detail = JobExecutionDetail {
            execution: JobExecution {
                job_execution_id: 7,
                job_instance_id: 3,
                job_name: "nightlyImport".into(),
                create_time: created,
                start_time: Some(created),
                end_time: None,
                status: BatchStatus::Started,
                exit_code: Some("UNKNOWN".into()),
                exit_message: None,
            },
            last_updated: None,
            parameters: vec![JobParameter {
                name: "run.id".into(),
                type_name: "java.lang.Long".into(),
                value: Some("1".into()),
                identifying: true,
            }],
            steps: vec![],
        };

        let v = serde_json::to_value(&detail).unwrap();
        assert_eq!(v["jobExecutionId"], 7);
        assert_eq!(v["status"], "STARTED");
        assert_eq!(v["startTime"], "2024-01-15T10:00:00");
        assert!(v["endTime"].is_null());
        assert_eq!(v["parameters"][0]["type"], "java.lang.Long");
        assert_eq!(v["parameters"][0]["identifying"], true);
    }
}
