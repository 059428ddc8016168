pub mod model;
pub mod page;
pub mod queries;
pub mod repo;
pub mod statistics;
pub mod store;

pub use model::{BatchStatus, JobStatus, StepStatus, UnknownStatus};
pub use page::{PageRequest, PageResponse};
pub use queries::QueryEngine;
pub use repo::BatchRepo;
pub use statistics::StatisticsEngine;
pub use store::{ExecutionStore, JobExecutionFilter, JobInstanceFilter};
