#![allow(dead_code)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use batchboard::clock::FixedClock;
use batchboard::jobs::model::{ExecutionContext, JobExecutionStats, JobParameter};
use batchboard::jobs::page::PageRequest;
use batchboard::jobs::store::{
    DailyStatusCountRecord, ExecutionStore, JobExecutionFilter, JobExecutionRecord,
    JobInstanceFilter, JobInstanceRecord, JobSummaryRecord, StatusCountRecord,
    StepExecutionRecord,
};

pub fn ts(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, s)
        .unwrap()
}

/// 2024-03-20 12:00, the "now" of every test.
pub fn fixed_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock(ts(2024, 3, 20, 12, 0, 0)))
}

// ----------------------------
// Postgres
// ----------------------------

/// Fresh batch tables on `TEST_DATABASE_URL`, or `None` when it is unset so
/// the caller can skip.
pub async fn setup_db() -> Option<PgPool> {
    let _ = dotenvy::dotenv();

    let url = std::env::var("TEST_DATABASE_URL").ok()?;

    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .expect("failed to connect to TEST_DATABASE_URL");

    sqlx::migrate!("./tests/fixtures/migrations")
        .run(&pool)
        .await
        .expect("migrations failed");

    sqlx::query(
        r#"
        TRUNCATE TABLE
            batch_step_execution_context,
            batch_job_execution_context,
            batch_step_execution,
            batch_job_execution_params,
            batch_job_execution,
            batch_job_instance
        CASCADE
        "#,
    )
    .execute(&pool)
    .await
    .expect("truncate failed");

    Some(pool)
}

pub async fn insert_instance(pool: &PgPool, job_instance_id: i64, job_name: &str) {
    sqlx::query(
        "INSERT INTO batch_job_instance (job_instance_id, version, job_name, job_key) VALUES ($1, 0, $2, $3)",
    )
    .bind(job_instance_id)
    .bind(job_name)
    .bind(format!("key-{job_instance_id}"))
    .execute(pool)
    .await
    .expect("failed to insert job instance");
}

pub async fn insert_execution(
    pool: &PgPool,
    job_execution_id: i64,
    job_instance_id: i64,
    status: Option<&str>,
    start_time: Option<NaiveDateTime>,
    end_time: Option<NaiveDateTime>,
) {
    sqlx::query(
        r#"
        INSERT INTO batch_job_execution
            (job_execution_id, version, job_instance_id, create_time, start_time, end_time,
             status, exit_code, exit_message, last_updated)
        VALUES ($1, 1, $2, COALESCE($3, TIMESTAMP '2024-01-01 00:00:00'), $3, $4, $5, $5, '', $4)
        "#,
    )
    .bind(job_execution_id)
    .bind(job_instance_id)
    .bind(start_time)
    .bind(end_time)
    .bind(status)
    .execute(pool)
    .await
    .expect("failed to insert job execution");
}

// ----------------------------
// In-memory store
// ----------------------------

#[derive(Default)]
struct Tables {
    instances: Vec<(i64, String, String, i64)>,
    executions: Vec<JobExecutionRecord>,
    params: Vec<(i64, JobParameter)>,
    steps: Vec<StepExecutionRecord>,
    contexts: HashMap<i64, ExecutionContext>,
}

/// [`ExecutionStore`] over plain vectors, following the same ordering and
/// filtering rules as the Postgres queries.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    failing: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every subsequent call fails like a lost connection would.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn add_instance(&self, job_instance_id: i64, job_name: &str) {
        self.tables.lock().unwrap().instances.push((
            job_instance_id,
            job_name.to_string(),
            format!("key-{job_instance_id}"),
            0,
        ));
    }

    /// Adds an execution of an existing instance.
    pub fn add_execution(
        &self,
        job_execution_id: i64,
        job_instance_id: i64,
        status: &str,
        start_time: Option<NaiveDateTime>,
        end_time: Option<NaiveDateTime>,
    ) {
        let mut t = self.tables.lock().unwrap();
        let job_name = t
            .instances
            .iter()
            .find(|i| i.0 == job_instance_id)
            .map(|i| i.1.clone())
            .expect("instance must exist");
        t.executions.push(JobExecutionRecord {
            job_execution_id,
            job_instance_id,
            job_name,
            create_time: start_time.unwrap_or_else(|| ts(2024, 1, 1, 0, 0, 0)),
            start_time,
            end_time,
            status: status.to_string(),
            exit_code: Some(status.to_string()),
            exit_message: None,
            last_updated: end_time.or(start_time),
        });
    }

    pub fn add_parameter(&self, job_execution_id: i64, name: &str, type_name: &str, value: &str) {
        self.tables.lock().unwrap().params.push((
            job_execution_id,
            JobParameter {
                name: name.to_string(),
                type_name: type_name.to_string(),
                value: Some(value.to_string()),
                identifying: true,
            },
        ));
    }

    pub fn add_step(&self, step_execution_id: i64, job_execution_id: i64, step_name: &str, status: &str) {
        self.tables.lock().unwrap().steps.push(StepExecutionRecord {
            step_execution_id,
            job_execution_id,
            step_name: step_name.to_string(),
            version: 3,
            create_time: ts(2024, 3, 1, 2, 0, 0),
            start_time: Some(ts(2024, 3, 1, 2, 0, 0)),
            end_time: Some(ts(2024, 3, 1, 2, 0, 10)),
            status: status.to_string(),
            commit_count: 1,
            read_count: 10,
            filter_count: 0,
            write_count: 10,
            read_skip_count: 0,
            write_skip_count: 0,
            process_skip_count: 0,
            rollback_count: 0,
            exit_code: Some(status.to_string()),
            exit_message: None,
            last_updated: Some(ts(2024, 3, 1, 2, 0, 10)),
        });
    }

    pub fn set_context(&self, step_execution_id: i64, serialized: &str) {
        self.tables.lock().unwrap().contexts.insert(
            step_execution_id,
            ExecutionContext {
                short_context: serialized.to_string(),
                serialized_context: None,
            },
        );
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("connection refused");
        }
        Ok(())
    }

    fn instance_record(t: &Tables, inst: &(i64, String, String, i64)) -> JobInstanceRecord {
        let latest = t
            .executions
            .iter()
            .filter(|e| e.job_instance_id == inst.0)
            .max_by_key(|e| e.job_execution_id);
        JobInstanceRecord {
            job_instance_id: inst.0,
            job_name: inst.1.clone(),
            job_key: inst.2.clone(),
            version: inst.3,
            latest_execution_id: latest.map(|e| e.job_execution_id),
            latest_start_time: latest.and_then(|e| e.start_time),
            latest_end_time: latest.and_then(|e| e.end_time),
            latest_status: latest.map(|e| e.status.clone()),
        }
    }

    fn matching_executions(t: &Tables, filter: &JobExecutionFilter) -> Vec<JobExecutionRecord> {
        let mut rows: Vec<_> = t
            .executions
            .iter()
            .filter(|e| filter.job_name.as_deref().map_or(true, |n| e.job_name == n))
            .filter(|e| filter.status.map_or(true, |s| e.status == s.as_str()))
            .filter(|e| {
                filter
                    .start_date_from
                    .map_or(true, |from| e.start_time.is_some_and(|st| st >= from))
            })
            .filter(|e| {
                filter
                    .start_date_to
                    .map_or(true, |to| e.start_time.is_some_and(|st| st <= to))
            })
            .cloned()
            .collect();
        sort_executions(&mut rows);
        rows
    }
}

/// Start time descending with unstarted executions first, then id descending.
fn sort_executions(rows: &mut [JobExecutionRecord]) {
    rows.sort_by(|a, b| {
        let by_start = match (a.start_time, b.start_time) {
            (None, None) => std::cmp::Ordering::Equal,
            (None, Some(_)) => std::cmp::Ordering::Less,
            (Some(_), None) => std::cmp::Ordering::Greater,
            (Some(x), Some(y)) => y.cmp(&x),
        };
        by_start.then_with(|| b.job_execution_id.cmp(&a.job_execution_id))
    });
}

fn window<T>(rows: Vec<T>, page: PageRequest) -> Vec<T> {
    rows.into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect()
}

impl ExecutionStore for MemoryStore {
    async fn find_job_instances(
        &self,
        filter: &JobInstanceFilter,
        page: PageRequest,
    ) -> anyhow::Result<Vec<JobInstanceRecord>> {
        self.check()?;
        let t = self.tables.lock().unwrap();
        let mut rows: Vec<_> = t
            .instances
            .iter()
            .filter(|i| filter.job_name.as_deref().map_or(true, |n| i.1 == n))
            .map(|i| Self::instance_record(&t, i))
            .collect();
        rows.sort_by(|a, b| b.job_instance_id.cmp(&a.job_instance_id));
        Ok(window(rows, page))
    }

    async fn count_job_instances(&self, filter: &JobInstanceFilter) -> anyhow::Result<i64> {
        self.check()?;
        let t = self.tables.lock().unwrap();
        Ok(t.instances
            .iter()
            .filter(|i| filter.job_name.as_deref().map_or(true, |n| i.1 == n))
            .count() as i64)
    }

    async fn find_job_instance(
        &self,
        job_instance_id: i64,
    ) -> anyhow::Result<Option<JobInstanceRecord>> {
        self.check()?;
        let t = self.tables.lock().unwrap();
        Ok(t.instances
            .iter()
            .find(|i| i.0 == job_instance_id)
            .map(|i| Self::instance_record(&t, i)))
    }

    async fn find_job_executions(
        &self,
        filter: &JobExecutionFilter,
        page: PageRequest,
    ) -> anyhow::Result<Vec<JobExecutionRecord>> {
        self.check()?;
        let t = self.tables.lock().unwrap();
        Ok(window(Self::matching_executions(&t, filter), page))
    }

    async fn count_job_executions(&self, filter: &JobExecutionFilter) -> anyhow::Result<i64> {
        self.check()?;
        let t = self.tables.lock().unwrap();
        Ok(Self::matching_executions(&t, filter).len() as i64)
    }

    async fn find_executions_for_instance(
        &self,
        job_instance_id: i64,
    ) -> anyhow::Result<Vec<JobExecutionRecord>> {
        self.check()?;
        let t = self.tables.lock().unwrap();
        let mut rows: Vec<_> = t
            .executions
            .iter()
            .filter(|e| e.job_instance_id == job_instance_id)
            .cloned()
            .collect();
        sort_executions(&mut rows);
        Ok(rows)
    }

    async fn find_job_execution(
        &self,
        job_execution_id: i64,
    ) -> anyhow::Result<Option<JobExecutionRecord>> {
        self.check()?;
        let t = self.tables.lock().unwrap();
        Ok(t.executions
            .iter()
            .find(|e| e.job_execution_id == job_execution_id)
            .cloned())
    }

    async fn find_job_parameters(&self, job_execution_id: i64) -> anyhow::Result<Vec<JobParameter>> {
        self.check()?;
        let t = self.tables.lock().unwrap();
        Ok(t.params
            .iter()
            .filter(|(id, _)| *id == job_execution_id)
            .map(|(_, p)| p.clone())
            .collect())
    }

    async fn find_steps_for_execution(
        &self,
        job_execution_id: i64,
    ) -> anyhow::Result<Vec<StepExecutionRecord>> {
        self.check()?;
        let t = self.tables.lock().unwrap();
        let mut rows: Vec<_> = t
            .steps
            .iter()
            .filter(|s| s.job_execution_id == job_execution_id)
            .cloned()
            .collect();
        rows.sort_by_key(|s| s.step_execution_id);
        Ok(rows)
    }

    async fn find_step_execution(
        &self,
        step_execution_id: i64,
    ) -> anyhow::Result<Option<StepExecutionRecord>> {
        self.check()?;
        let t = self.tables.lock().unwrap();
        Ok(t.steps
            .iter()
            .find(|s| s.step_execution_id == step_execution_id)
            .cloned())
    }

    async fn find_step_execution_context(
        &self,
        step_execution_id: i64,
    ) -> anyhow::Result<Option<ExecutionContext>> {
        self.check()?;
        let t = self.tables.lock().unwrap();
        Ok(t.contexts.get(&step_execution_id).cloned())
    }

    async fn count_job_names(&self) -> anyhow::Result<i64> {
        self.check()?;
        let t = self.tables.lock().unwrap();
        let mut names: Vec<_> = t.instances.iter().map(|i| i.1.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        Ok(names.len() as i64)
    }

    async fn count_executions_by_status(
        &self,
        job_name: Option<&str>,
    ) -> anyhow::Result<Vec<StatusCountRecord>> {
        self.check()?;
        let t = self.tables.lock().unwrap();
        let mut counts: BTreeMap<String, i64> = BTreeMap::new();
        for e in t
            .executions
            .iter()
            .filter(|e| job_name.map_or(true, |n| e.job_name == n))
        {
            *counts.entry(e.status.clone()).or_insert(0) += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(status, count)| StatusCountRecord { status, count })
            .collect())
    }

    async fn count_daily_executions(
        &self,
        since: NaiveDateTime,
    ) -> anyhow::Result<Vec<DailyStatusCountRecord>> {
        self.check()?;
        let t = self.tables.lock().unwrap();
        let mut counts: BTreeMap<(NaiveDate, String), i64> = BTreeMap::new();
        for e in &t.executions {
            if let Some(start) = e.start_time.filter(|st| *st >= since) {
                *counts.entry((start.date(), e.status.clone())).or_insert(0) += 1;
            }
        }
        Ok(counts
            .into_iter()
            .rev()
            .map(|((day, status), count)| DailyStatusCountRecord { day, status, count })
            .collect())
    }

    async fn summarize_job(&self, job_name: &str) -> anyhow::Result<Option<JobSummaryRecord>> {
        self.check()?;
        let t = self.tables.lock().unwrap();
        let runs: Vec<_> = t.executions.iter().filter(|e| e.job_name == job_name).collect();
        if runs.is_empty() {
            return Ok(None);
        }
        let durations: Vec<f64> = runs
            .iter()
            .filter_map(|e| match (e.start_time, e.end_time) {
                (Some(s), Some(end)) => Some((end - s).num_milliseconds() as f64 / 1000.0),
                _ => None,
            })
            .collect();
        let average_duration_seconds = if durations.is_empty() {
            None
        } else {
            Some(durations.iter().sum::<f64>() / durations.len() as f64)
        };
        Ok(Some(JobSummaryRecord {
            total_executions: runs.len() as i64,
            last_execution_time: runs.iter().filter_map(|e| e.start_time).max(),
            average_duration_seconds,
        }))
    }

    async fn count_executions_per_job(
        &self,
        since: NaiveDateTime,
    ) -> anyhow::Result<Vec<JobExecutionStats>> {
        self.check()?;
        let t = self.tables.lock().unwrap();
        let mut counts: BTreeMap<String, i64> = BTreeMap::new();
        for e in &t.executions {
            if e.start_time.is_some_and(|st| st >= since) {
                *counts.entry(e.job_name.clone()).or_insert(0) += 1;
            }
        }
        Ok(counts
            .into_iter()
            .map(|(job_name, executions)| JobExecutionStats {
                job_name,
                executions,
            })
            .collect())
    }
}

// ----------------------------
// Serialization stream writer
// ----------------------------

const TC_NULL: u8 = 0x70;
const TC_REFERENCE: u8 = 0x71;
const TC_CLASSDESC: u8 = 0x72;
const TC_OBJECT: u8 = 0x73;
const TC_STRING: u8 = 0x74;
const TC_ARRAY: u8 = 0x75;
const TC_BLOCKDATA: u8 = 0x77;
const TC_ENDBLOCKDATA: u8 = 0x78;
const TC_ENUM: u8 = 0x7E;

const SC_WRITE_METHOD: u8 = 0x01;
const SC_SERIALIZABLE: u8 = 0x02;
const SC_EXTERNALIZABLE: u8 = 0x04;
const SC_BLOCK_DATA: u8 = 0x08;
const SC_ENUM: u8 = 0x10;

/// Class descriptor to emit; written once, referenced afterwards.
pub struct ClassSpec {
    pub name: &'static str,
    pub flags: u8,
    /// (type code, field name, field class signature for object fields)
    pub fields: Vec<(u8, &'static str, Option<&'static str>)>,
    pub super_class: Option<Box<ClassSpec>>,
}

/// Writes serialization streams the way `ObjectOutputStream` lays them out,
/// tracking handles so back-references can be emitted.
pub struct StreamWriter {
    buf: Vec<u8>,
    next_handle: i32,
    classes: HashMap<&'static str, i32>,
}

impl Default for StreamWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamWriter {
    pub fn new() -> Self {
        Self {
            buf: vec![0xAC, 0xED, 0x00, 0x05],
            next_handle: 0x7E_0000,
            classes: HashMap::new(),
        }
    }

    fn handle(&mut self) -> i32 {
        let h = self.next_handle;
        self.next_handle += 1;
        h
    }

    fn utf(&mut self, s: &str) {
        self.buf.extend((s.len() as u16).to_be_bytes());
        self.buf.extend(s.as_bytes());
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn null(&mut self) -> &mut Self {
        self.buf.push(TC_NULL);
        self
    }

    pub fn reference(&mut self, handle: i32) -> &mut Self {
        self.buf.push(TC_REFERENCE);
        self.buf.extend(handle.to_be_bytes());
        self
    }

    /// Writes a new string and returns its handle.
    pub fn string(&mut self, s: &str) -> i32 {
        self.buf.push(TC_STRING);
        self.utf(s);
        self.handle()
    }

    fn class_desc(&mut self, spec: &ClassSpec) {
        if let Some(&h) = self.classes.get(spec.name) {
            self.reference(h);
            return;
        }
        self.buf.push(TC_CLASSDESC);
        self.utf(spec.name);
        self.buf.extend(1_i64.to_be_bytes());
        let h = self.handle();
        self.classes.insert(spec.name, h);

        self.buf.push(spec.flags);
        self.buf.extend((spec.fields.len() as u16).to_be_bytes());
        for (code, name, class_name) in &spec.fields {
            self.buf.push(*code);
            self.utf(name);
            if let Some(class_name) = class_name {
                self.string(class_name);
            }
        }
        self.buf.push(TC_ENDBLOCKDATA);
        match &spec.super_class {
            Some(sup) => self.class_desc(sup),
            None => {
                self.null();
            }
        }
    }

    /// `TC_OBJECT` plus descriptor; returns the object's handle. The caller
    /// writes the class data.
    pub fn object(&mut self, spec: &ClassSpec) -> i32 {
        self.buf.push(TC_OBJECT);
        self.class_desc(spec);
        self.handle()
    }

    fn block(&mut self, bytes: &[u8]) {
        self.buf.push(TC_BLOCKDATA);
        self.buf.push(bytes.len() as u8);
        self.buf.extend_from_slice(bytes);
    }

    pub fn end_block(&mut self) -> &mut Self {
        self.buf.push(TC_ENDBLOCKDATA);
        self
    }

    fn number() -> Box<ClassSpec> {
        Box::new(ClassSpec {
            name: "java.lang.Number",
            flags: SC_SERIALIZABLE,
            fields: vec![],
            super_class: None,
        })
    }

    pub fn integer(&mut self, value: i32) -> i32 {
        let h = self.object(&ClassSpec {
            name: "java.lang.Integer",
            flags: SC_SERIALIZABLE,
            fields: vec![(b'I', "value", None)],
            super_class: Some(Self::number()),
        });
        self.buf.extend(value.to_be_bytes());
        h
    }

    pub fn long(&mut self, value: i64) -> i32 {
        let h = self.object(&ClassSpec {
            name: "java.lang.Long",
            flags: SC_SERIALIZABLE,
            fields: vec![(b'J', "value", None)],
            super_class: Some(Self::number()),
        });
        self.buf.extend(value.to_be_bytes());
        h
    }

    /// Starts a `java.util.HashMap` with `size` entries. Write the keys and
    /// values next, then [`end_block`](Self::end_block).
    pub fn hash_map(&mut self, size: i32) -> i32 {
        let h = self.object(&ClassSpec {
            name: "java.util.HashMap",
            flags: SC_SERIALIZABLE | SC_WRITE_METHOD,
            fields: vec![(b'F', "loadFactor", None), (b'I', "threshold", None)],
            super_class: None,
        });
        self.buf.extend(0.75_f32.to_be_bytes());
        self.buf.extend(12_i32.to_be_bytes());
        let mut block = 16_i32.to_be_bytes().to_vec();
        block.extend(size.to_be_bytes());
        self.block(&block);
        h
    }

    /// Starts a `java.util.ArrayList`; elements follow, then `end_block`.
    pub fn array_list(&mut self, size: i32) -> i32 {
        let h = self.object(&ClassSpec {
            name: "java.util.ArrayList",
            flags: SC_SERIALIZABLE | SC_WRITE_METHOD,
            fields: vec![(b'I', "size", None)],
            super_class: None,
        });
        self.buf.extend(size.to_be_bytes());
        self.block(&size.to_be_bytes());
        h
    }

    /// `byte[]`; returns its handle.
    pub fn byte_array(&mut self, bytes: &[u8]) -> i32 {
        self.buf.push(TC_ARRAY);
        self.class_desc(&ClassSpec {
            name: "[B",
            flags: SC_SERIALIZABLE,
            fields: vec![],
            super_class: None,
        });
        let h = self.handle();
        self.buf.extend((bytes.len() as i32).to_be_bytes());
        self.buf.extend_from_slice(bytes);
        h
    }

    /// `java.math.BigInteger` with its legacy cache fields set the way
    /// `writeObject` leaves them.
    pub fn big_integer(&mut self, signum: i32, magnitude: &[u8]) -> i32 {
        let h = self.object(&ClassSpec {
            name: "java.math.BigInteger",
            flags: SC_SERIALIZABLE | SC_WRITE_METHOD,
            fields: vec![
                (b'I', "bitCount", None),
                (b'I', "bitLength", None),
                (b'I', "firstNonzeroByteNum", None),
                (b'I', "lowestSetBit", None),
                (b'I', "signum", None),
                (b'[', "magnitude", Some("[B")),
            ],
            super_class: Some(Self::number()),
        });
        for v in [-1, -1, -2, -2, signum] {
            self.buf.extend(v.to_be_bytes());
        }
        self.byte_array(magnitude);
        self.end_block();
        h
    }

    pub fn big_decimal(&mut self, signum: i32, magnitude: &[u8], scale: i32) -> i32 {
        let h = self.object(&ClassSpec {
            name: "java.math.BigDecimal",
            flags: SC_SERIALIZABLE | SC_WRITE_METHOD,
            fields: vec![
                (b'I', "scale", None),
                (b'L', "intVal", Some("Ljava/math/BigInteger;")),
            ],
            super_class: Some(Self::number()),
        });
        self.buf.extend(scale.to_be_bytes());
        self.big_integer(signum, magnitude);
        self.end_block();
        h
    }

    /// `java.time.LocalDate` through its `java.time.Ser` proxy.
    pub fn local_date(&mut self, year: i32, month: u8, day: u8) -> i32 {
        let h = self.object(&ClassSpec {
            name: "java.time.Ser",
            flags: SC_EXTERNALIZABLE | SC_BLOCK_DATA,
            fields: vec![],
            super_class: None,
        });
        let mut block = vec![3];
        block.extend(year.to_be_bytes());
        block.extend([month, day]);
        self.block(&block);
        self.end_block();
        h
    }

    /// An externalizable object no decoder knows the layout of.
    pub fn opaque(&mut self, class_name: &'static str) -> i32 {
        let h = self.object(&ClassSpec {
            name: class_name,
            flags: SC_EXTERNALIZABLE | SC_BLOCK_DATA,
            fields: vec![],
            super_class: None,
        });
        self.block(&[1, 2, 3]);
        self.end_block();
        h
    }

    pub fn enum_constant(&mut self, class_name: &'static str, constant: &str) -> i32 {
        self.buf.push(TC_ENUM);
        self.class_desc(&ClassSpec {
            name: class_name,
            flags: SC_SERIALIZABLE | SC_ENUM,
            fields: vec![],
            super_class: Some(Box::new(ClassSpec {
                name: "java.lang.Enum",
                flags: SC_SERIALIZABLE | SC_ENUM,
                fields: vec![],
                super_class: None,
            })),
        });
        let h = self.handle();
        self.string(constant);
        h
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.buf.clone()
    }

    pub fn base64(&self) -> String {
        STANDARD.encode(&self.buf)
    }
}

/// `{"x": 42, "y": "hello"}` as a serialized `HashMap`.
pub fn simple_context() -> String {
    let mut w = StreamWriter::new();
    w.hash_map(2);
    w.string("x");
    w.integer(42);
    w.string("y");
    w.string("hello");
    w.end_block();
    w.base64()
}
