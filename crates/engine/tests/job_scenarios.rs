//! End-to-end job runs over in-memory collaborators.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail};
use forgebatch_engine::job::JobStatus;
use forgebatch_engine::{
    Batch, BatchListener, Header, IterableRecordReader, Job, JobBuilder, JobListener,
    JobParameters, JobReport, PipelineListener, ProcessingTimeListener, Record, RecordError,
    RecordReader, RecordReaderListener, RecordWriter, RecordWriterListener, RetryPolicy,
    RetryableRecordProcessor, VecRecordWriter, Violation,
};

type Log = Arc<Mutex<Vec<String>>>;

fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn reject(value: u32) -> impl FnMut(&Record<u32>) -> Vec<Violation> + Send {
    move |record| {
        if *record.payload() == value {
            vec![Violation::on_field("value", format!("{value} is not allowed"))]
        } else {
            Vec::new()
        }
    }
}

/// Records every hook of every listener family under a name.
struct Recorder {
    name: &'static str,
    log: Log,
}

impl Recorder {
    fn new(name: &'static str, log: &Log) -> Self {
        Self {
            name,
            log: Arc::clone(log),
        }
    }

    fn push(&self, event: impl std::fmt::Display) {
        self.log.lock().unwrap().push(format!("{}:{}", self.name, event));
    }
}

impl JobListener for Recorder {
    fn before_job_start(&mut self, _parameters: &JobParameters) {
        self.push("before_job_start");
    }

    fn after_job_end(&mut self, report: &mut JobReport) {
        self.push(format!("after_job_end({})", report.status()));
    }
}

impl BatchListener<u32> for Recorder {
    fn before_batch_reading(&mut self) {
        self.push("before_batch_reading");
    }

    fn after_batch_processing(&mut self, batch: &Batch<u32>) {
        self.push(format!("after_batch_processing{:?}", batch.numbers()));
    }

    fn after_batch_writing(&mut self, batch: &Batch<u32>) {
        self.push(format!("after_batch_writing{:?}", batch.numbers()));
    }

    fn on_batch_writing_exception(&mut self, batch: &Batch<u32>, _error: &anyhow::Error) {
        self.push(format!("on_batch_writing_exception{:?}", batch.numbers()));
    }
}

impl RecordReaderListener<u32> for Recorder {
    fn before_record_reading(&mut self) {
        self.push("before_record_reading");
    }

    fn after_record_reading(&mut self, record: Option<&Record<u32>>) {
        match record {
            Some(record) => {
                self.push(format!("after_record_reading({})", record.header().number()))
            }
            None => self.push("after_record_reading(end)"),
        }
    }
}

impl PipelineListener<u32, u32> for Recorder {
    fn before_record_processing(&mut self, record: &Record<u32>) {
        self.push(format!("before_record_processing({})", record.header().number()));
    }

    fn after_record_processing(&mut self, input: &Header, output: Option<&Record<u32>>) {
        let outcome = if output.is_some() { "accepted" } else { "filtered" };
        self.push(format!("after_record_processing({},{outcome})", input.number()));
    }

    fn on_record_processing_exception(&mut self, input: &Header, _error: &RecordError) {
        self.push(format!("on_record_processing_exception({})", input.number()));
    }
}

impl RecordWriterListener<u32> for Recorder {
    fn before_record_writing(&mut self, batch: &Batch<u32>) {
        self.push(format!("before_record_writing{:?}", batch.numbers()));
    }

    fn after_record_writing(&mut self, batch: &Batch<u32>) {
        self.push(format!("after_record_writing{:?}", batch.numbers()));
    }

    fn on_record_writing_exception(&mut self, batch: &Batch<u32>, _error: &anyhow::Error) {
        self.push(format!("on_record_writing_exception{:?}", batch.numbers()));
    }
}

/// Reader whose lifecycle calls are logged, failing where told to.
struct ScriptedReader {
    records: std::vec::IntoIter<u32>,
    next: u64,
    fail_open: bool,
    fail_at: Option<u64>,
    fail_close: bool,
    log: Log,
}

impl ScriptedReader {
    fn new(records: Vec<u32>, log: &Log) -> Self {
        Self {
            records: records.into_iter(),
            next: 1,
            fail_open: false,
            fail_at: None,
            fail_close: false,
            log: Arc::clone(log),
        }
    }
}

impl RecordReader<u32> for ScriptedReader {
    fn open(&mut self) -> anyhow::Result<()> {
        self.log.lock().unwrap().push("reader:open".to_string());
        if self.fail_open {
            bail!("file not found");
        }
        Ok(())
    }

    fn read_record(&mut self) -> anyhow::Result<Option<Record<u32>>> {
        if self.fail_at == Some(self.next) {
            bail!("corrupted line {}", self.next);
        }
        let record = self
            .records
            .next()
            .map(|payload| Record::new(Header::new(self.next, "scripted"), payload));
        self.next += 1;
        Ok(record)
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.log.lock().unwrap().push("reader:close".to_string());
        if self.fail_close {
            bail!("handle already released");
        }
        Ok(())
    }
}

/// Writer whose lifecycle calls are logged, failing where told to.
struct ScriptedWriter {
    fail_open: bool,
    fail_close: bool,
    /// Batches of more than one record containing this payload fail.
    poison_in_batch: Option<u32>,
    /// Any batch containing this payload fails, even alone.
    always_fail_on: Option<u32>,
    shared: Arc<Mutex<Vec<Record<u32>>>>,
    log: Log,
}

impl ScriptedWriter {
    fn new(log: &Log) -> Self {
        Self {
            fail_open: false,
            fail_close: false,
            poison_in_batch: None,
            always_fail_on: None,
            shared: Arc::new(Mutex::new(Vec::new())),
            log: Arc::clone(log),
        }
    }
}

impl RecordWriter<u32> for ScriptedWriter {
    fn open(&mut self) -> anyhow::Result<()> {
        self.log.lock().unwrap().push("writer:open".to_string());
        if self.fail_open {
            bail!("connection refused");
        }
        Ok(())
    }

    fn write_records(&mut self, batch: &Batch<u32>) -> anyhow::Result<()> {
        let contains =
            |value: Option<u32>| value.is_some_and(|v| batch.payloads().any(|p| *p == v));
        if contains(self.always_fail_on) || (batch.len() > 1 && contains(self.poison_in_batch)) {
            bail!("constraint violation");
        }
        self.shared.lock().unwrap().extend(batch.iter().cloned());
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.log.lock().unwrap().push("writer:close".to_string());
        if self.fail_close {
            bail!("flush on close failed");
        }
        Ok(())
    }
}

#[test]
fn record_failing_validation_is_dropped_from_its_batch() {
    let writer = VecRecordWriter::new();
    let mut job = JobBuilder::new()
        .named("five-records")
        .reader(IterableRecordReader::new(1..=5u32))
        .validator(reject(3))
        .writer(writer.clone())
        .batch_size(2)
        .build()
        .unwrap();

    let report = job.call();

    assert_eq!(report.status(), JobStatus::Completed);
    assert_eq!(report.metrics().read_count(), 4);
    assert_eq!(report.metrics().error_count(), 1);
    assert_eq!(report.metrics().filter_count(), 0);
    assert_eq!(report.metrics().write_count(), 4);
    let batches: Vec<Vec<u64>> = writer.batches().iter().map(Batch::numbers).collect();
    assert_eq!(batches, vec![vec![1, 2], vec![4, 5]]);
    assert_eq!(
        report.last_error(),
        Some("record validation failed: value: 3 is not allowed")
    );
}

#[test]
fn error_threshold_breach_stops_reading_and_flushes_accepted_records() {
    let writer = VecRecordWriter::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_by_processor = Arc::clone(&seen);

    let mut job = JobBuilder::new()
        .reader(IterableRecordReader::new(1..=10u32))
        .processor(move |record: Record<u32>| -> anyhow::Result<Option<Record<u32>>> {
            seen_by_processor.lock().unwrap().push(*record.payload());
            if record.payload() % 2 == 0 {
                Err(anyhow!("even numbers are not supported"))
            } else {
                Ok(Some(record))
            }
        })
        .writer(writer.clone())
        .batch_size(3)
        .error_threshold(1)
        .build()
        .unwrap();

    let report = job.call();

    assert_eq!(report.status(), JobStatus::Failed);
    assert_eq!(report.metrics().error_count(), 2);
    assert_eq!(report.metrics().pulled_count(), 4);
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4]);
    assert_eq!(writer.payloads(), vec![1, 3]);
    assert_eq!(report.metrics().write_count(), 2);
    assert!(report.last_error().unwrap().starts_with("error threshold exceeded (2 > 1)"));
    assert!(report.metrics().end_time().is_some());
}

#[test]
fn listeners_are_notified_in_nesting_order() {
    let log = new_log();
    let mut job = JobBuilder::new()
        .reader(IterableRecordReader::new(vec![7u32]))
        .batch_size(1)
        .job_listener(Recorder::new("a", &log))
        .job_listener(Recorder::new("b", &log))
        .batch_listener(Recorder::new("a", &log))
        .batch_listener(Recorder::new("b", &log))
        .reader_listener(Recorder::new("a", &log))
        .pipeline_listener(Recorder::new("a", &log))
        .pipeline_listener(Recorder::new("b", &log))
        .writer_listener(Recorder::new("a", &log))
        .build()
        .unwrap();

    let report = job.call();

    assert_eq!(report.status(), JobStatus::Completed);
    assert_eq!(
        entries(&log),
        vec![
            "a:before_job_start",
            "b:before_job_start",
            // first batch: one record
            "a:before_batch_reading",
            "b:before_batch_reading",
            "a:before_record_reading",
            "a:after_record_reading(1)",
            "a:before_record_processing(1)",
            "b:before_record_processing(1)",
            "b:after_record_processing(1,accepted)",
            "a:after_record_processing(1,accepted)",
            "b:after_batch_processing[1]",
            "a:after_batch_processing[1]",
            "a:before_record_writing[1]",
            "a:after_record_writing[1]",
            "b:after_batch_writing[1]",
            "a:after_batch_writing[1]",
            // second batch: end of source
            "a:before_batch_reading",
            "b:before_batch_reading",
            "a:before_record_reading",
            "a:after_record_reading(end)",
            "b:after_batch_processing[]",
            "a:after_batch_processing[]",
            "b:after_job_end(COMPLETED)",
            "a:after_job_end(COMPLETED)",
        ]
    );
}

#[test]
fn filtered_and_errored_records_fire_the_right_pipeline_hooks() {
    let log = new_log();
    let mut job = JobBuilder::new()
        .reader(IterableRecordReader::new(1..=3u32))
        .filter(|record: &Record<u32>| *record.payload() != 1)
        .validator(reject(2))
        .pipeline_listener(Recorder::new("p", &log))
        .build()
        .unwrap();

    let report = job.call();

    assert_eq!(report.metrics().filter_count(), 1);
    assert_eq!(report.metrics().error_count(), 1);
    assert_eq!(report.metrics().read_count(), 1);
    assert_eq!(
        entries(&log),
        vec![
            "p:before_record_processing(1)",
            "p:after_record_processing(1,filtered)",
            "p:before_record_processing(2)",
            "p:on_record_processing_exception(2)",
            "p:before_record_processing(3)",
            "p:after_record_processing(3,accepted)",
        ]
    );
}

#[test]
fn reader_open_failure_fails_fast() {
    let log = new_log();
    let mut reader = ScriptedReader::new(vec![1, 2, 3], &log);
    reader.fail_open = true;

    let mut job = JobBuilder::new()
        .reader(reader)
        .writer(ScriptedWriter::new(&log))
        .job_listener(Recorder::new("job", &log))
        .build()
        .unwrap();

    let report = job.call();

    assert_eq!(report.status(), JobStatus::Failed);
    assert_eq!(report.metrics().pulled_count(), 0);
    assert_eq!(
        report.last_error(),
        Some("unable to open record reader: file not found")
    );
    assert_eq!(
        entries(&log),
        vec!["job:before_job_start", "reader:open", "job:after_job_end(FAILED)"]
    );
}

#[test]
fn writer_open_failure_still_closes_the_reader() {
    let log = new_log();
    let mut writer = ScriptedWriter::new(&log);
    writer.fail_open = true;

    let mut job = JobBuilder::new()
        .reader(ScriptedReader::new(vec![1, 2, 3], &log))
        .writer(writer)
        .build()
        .unwrap();

    let report = job.call();

    assert_eq!(report.status(), JobStatus::Failed);
    assert_eq!(report.metrics().pulled_count(), 0);
    assert_eq!(
        entries(&log),
        vec!["reader:open", "writer:open", "reader:close"]
    );
}

#[test]
fn batch_write_failure_is_fatal() {
    let log = new_log();
    let mut writer = ScriptedWriter::new(&log);
    writer.poison_in_batch = Some(3);
    let written = Arc::clone(&writer.shared);

    let mut job = JobBuilder::new()
        .reader(ScriptedReader::new((1..=6).collect(), &log))
        .writer(writer)
        .batch_size(2)
        .batch_listener(Recorder::new("batch", &log))
        .build()
        .unwrap();

    let report = job.call();

    assert_eq!(report.status(), JobStatus::Failed);
    assert_eq!(report.metrics().write_count(), 2);
    assert_eq!(report.metrics().pulled_count(), 4);
    assert_eq!(written.lock().unwrap().len(), 2);
    assert_eq!(
        report.last_error(),
        Some("unable to write records: constraint violation")
    );
    let log = entries(&log);
    assert!(log.contains(&"batch:on_batch_writing_exception[3, 4]".to_string()));
    assert_eq!(&log[log.len() - 2..], ["writer:close", "reader:close"]);
}

#[test]
fn batch_scanning_writes_records_one_by_one_after_a_failure() {
    let log = new_log();
    let mut writer = ScriptedWriter::new(&log);
    writer.poison_in_batch = Some(3);
    writer.always_fail_on = Some(4);
    let written = Arc::clone(&writer.shared);

    let mut job = JobBuilder::new()
        .reader(ScriptedReader::new((1..=6).collect(), &log))
        .writer(writer)
        .batch_size(3)
        .enable_batch_scanning(true)
        .build()
        .unwrap();

    let report = job.call();

    // [1,2,3] fails and is scanned: all three succeed alone.
    // [4,5,6] fails and is scanned: 4 fails even alone.
    assert_eq!(report.status(), JobStatus::Completed);
    assert_eq!(report.metrics().write_count(), 5);
    assert_eq!(report.metrics().error_count(), 1);
    assert_eq!(report.metrics().pulled_count(), 6);

    let written = written.lock().unwrap();
    let payloads: Vec<u32> = written.iter().map(|r| *r.payload()).collect();
    assert_eq!(payloads, vec![1, 2, 3, 5, 6]);
    assert!(written.iter().all(|r| r.header().is_scanned()));
}

#[test]
fn scanned_write_errors_on_the_last_batch_breach_the_threshold() {
    let log = new_log();
    let mut writer = ScriptedWriter::new(&log);
    writer.always_fail_on = Some(3);
    let written = Arc::clone(&writer.shared);

    let mut job = JobBuilder::new()
        .reader(ScriptedReader::new(vec![1, 2, 3], &log))
        .writer(writer)
        .batch_size(3)
        .error_threshold(0)
        .enable_batch_scanning(true)
        .build()
        .unwrap();

    let report = job.call();

    assert_eq!(report.status(), JobStatus::Failed);
    assert_eq!(report.metrics().error_count(), 1);
    assert_eq!(report.metrics().write_count(), 2);
    assert_eq!(written.lock().unwrap().len(), 2);
    assert!(report.last_error().unwrap().starts_with("error threshold exceeded (1 > 0)"));
}

#[test]
fn scanned_write_errors_within_threshold_complete() {
    let log = new_log();
    let mut writer = ScriptedWriter::new(&log);
    writer.always_fail_on = Some(3);

    let mut job = JobBuilder::new()
        .reader(ScriptedReader::new(vec![1, 2, 3], &log))
        .writer(writer)
        .batch_size(3)
        .error_threshold(1)
        .enable_batch_scanning(true)
        .build()
        .unwrap();

    let report = job.call();

    assert_eq!(report.status(), JobStatus::Completed);
    assert_eq!(report.metrics().error_count(), 1);
}

#[test]
fn writer_close_failure_keeps_status_and_still_closes_reader() {
    let log = new_log();
    let mut writer = ScriptedWriter::new(&log);
    writer.fail_close = true;

    let mut job = JobBuilder::new()
        .reader(ScriptedReader::new(vec![1, 2], &log))
        .writer(writer)
        .build()
        .unwrap();

    let report = job.call();

    assert_eq!(report.status(), JobStatus::Completed);
    assert_eq!(report.metrics().write_count(), 2);
    assert_eq!(report.last_error(), Some("flush on close failed"));
    assert_eq!(
        entries(&log),
        vec!["reader:open", "writer:open", "writer:close", "reader:close"]
    );
}

#[test]
fn reader_close_failure_does_not_mask_a_failed_run() {
    let log = new_log();
    let mut reader = ScriptedReader::new(vec![1, 2], &log);
    reader.fail_close = true;
    let mut writer = ScriptedWriter::new(&log);
    writer.always_fail_on = Some(1);

    let mut job = JobBuilder::new()
        .reader(reader)
        .writer(writer)
        .build()
        .unwrap();

    let report = job.call();

    assert_eq!(report.status(), JobStatus::Failed);
    // The primary failure is recorded after cleanup.
    assert_eq!(
        report.last_error(),
        Some("unable to write records: constraint violation")
    );
    assert_eq!(&entries(&log)[2..], ["writer:close", "reader:close"]);
}

#[test]
fn reader_close_failure_is_only_recorded() {
    let log = new_log();
    let mut reader = ScriptedReader::new(vec![1], &log);
    reader.fail_close = true;

    let mut job = JobBuilder::new().reader(reader).build().unwrap();

    let report = job.call();

    assert_eq!(report.status(), JobStatus::Completed);
    assert_eq!(report.last_error(), Some("handle already released"));
}

#[test]
fn read_failure_flushes_accepted_records_and_fails() {
    let log = new_log();
    let mut reader = ScriptedReader::new((1..=10).collect(), &log);
    reader.fail_at = Some(4);
    let writer = VecRecordWriter::new();

    let mut job = JobBuilder::new()
        .reader(reader)
        .writer(writer.clone())
        .batch_size(5)
        .build()
        .unwrap();

    let report = job.call();

    assert_eq!(report.status(), JobStatus::Failed);
    assert_eq!(writer.payloads(), vec![1, 2, 3]);
    assert_eq!(
        report.last_error(),
        Some("unable to read next record: corrupted line 4")
    );
}

#[test]
fn pipeline_can_change_payload_type() {
    let writer = VecRecordWriter::new();
    let pipeline = forgebatch_engine::Pipeline::<&'static str>::new()
        .filter(|r: &Record<&'static str>| !r.payload().is_empty())
        .map(|r: Record<&'static str>| -> anyhow::Result<Record<u32>> {
            let (header, payload) = r.into_parts();
            Ok(Record::new(header, payload.trim().parse()?))
        });

    let mut job = JobBuilder::with_pipeline(pipeline)
        .reader(IterableRecordReader::new(vec!["1", "", "x", " 42 "]))
        .writer(writer.clone())
        .build()
        .unwrap();

    let report = job.call();

    assert_eq!(writer.payloads(), vec![1, 42]);
    assert_eq!(report.metrics().filter_count(), 1);
    assert_eq!(report.metrics().error_count(), 1);
    assert!(report.last_error().unwrap().starts_with("unable to map record: "));
}

#[test]
fn retryable_processor_absorbs_transient_failures() {
    let attempts = Arc::new(Mutex::new(0u32));
    let counter = Arc::clone(&attempts);
    let flaky = move |record: Record<u32>| -> anyhow::Result<Option<Record<u32>>> {
        let mut n = counter.lock().unwrap();
        *n += 1;
        if *n % 2 == 1 {
            Err(anyhow!("timeout"))
        } else {
            Ok(Some(record))
        }
    };
    let policy = RetryPolicy::new(2, Duration::ZERO).unwrap();

    let mut job = JobBuilder::new()
        .reader(IterableRecordReader::new(1..=3u32))
        .processor(RetryableRecordProcessor::new(flaky, policy))
        .build()
        .unwrap();

    let report = job.call();

    assert_eq!(report.status(), JobStatus::Completed);
    assert_eq!(report.metrics().read_count(), 3);
    assert_eq!(report.metrics().error_count(), 0);
    assert_eq!(*attempts.lock().unwrap(), 6);
}

#[test]
fn monitor_publishes_progress_when_enabled() {
    let mut job = JobBuilder::new()
        .named("monitored")
        .reader(IterableRecordReader::new(1..=4u32))
        .batch_size(2)
        .enable_monitoring(true)
        .build()
        .unwrap();
    let monitor = job.monitor();
    let updates = monitor.subscribe();

    let report = job.call();

    let snapshots: Vec<_> = updates.try_iter().collect();
    let last = snapshots.last().unwrap();
    assert_eq!(last.status, JobStatus::Completed);
    assert_eq!(last.progress, "4/4 (100.0%)");
    assert_eq!(last.success_count, "4 (100.0%)");
    assert!(snapshots.iter().any(|s| s.progress == "2/4 (50.0%)"));
    assert_eq!(monitor.report(), report);
}

#[test]
fn monitor_reflects_final_report_when_disabled() {
    let mut job = JobBuilder::new()
        .reader(IterableRecordReader::new(1..=4u32))
        .build()
        .unwrap();
    let monitor = job.monitor();
    let updates = monitor.subscribe();

    job.call();

    // Only the initial and final reports are published.
    let snapshots: Vec<_> = updates.try_iter().collect();
    assert_eq!(snapshots.len(), 2);
    assert_eq!(monitor.snapshot().status, JobStatus::Completed);
    assert_eq!(monitor.snapshot().input_count, 4);
}

#[test]
fn processing_time_listener_adds_custom_metric() {
    let timer = ProcessingTimeListener::new();
    let mut job = JobBuilder::new()
        .reader(IterableRecordReader::new(1..=3u32))
        .processor(|r: Record<u32>| -> anyhow::Result<Option<Record<u32>>> {
            std::thread::sleep(Duration::from_millis(1));
            Ok(Some(r))
        })
        .pipeline_listener(timer.clone())
        .job_listener(timer)
        .build()
        .unwrap();

    let report = job.call();

    let average = report
        .metrics()
        .custom_metric(ProcessingTimeListener::METRIC)
        .unwrap();
    assert!(average >= 1.0);
    assert!(report.to_string().contains("Average record processing time (ms) = "));
}

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, Copy)]
    enum Fate {
        Accept,
        Filter,
        Fail,
    }

    fn fate() -> impl Strategy<Value = Fate> {
        prop_oneof![Just(Fate::Accept), Just(Fate::Filter), Just(Fate::Fail)]
    }

    proptest! {
        /// Property: every pulled record is counted exactly once, and the writer sees
        /// exactly the accepted records.
        #[test]
        fn every_pulled_record_is_counted_once(
            fates in proptest::collection::vec(fate(), 0..60),
            batch_size in 1usize..8,
        ) {
            let writer = VecRecordWriter::new();
            let mut job = JobBuilder::new()
                .reader(IterableRecordReader::new(fates.clone()))
                .processor(|r: Record<Fate>| -> anyhow::Result<Option<Record<Fate>>> {
                    match r.payload() {
                        Fate::Accept => Ok(Some(r)),
                        Fate::Filter => Ok(None),
                        Fate::Fail => Err(anyhow!("failed")),
                    }
                })
                .writer(writer.clone())
                .batch_size(batch_size)
                .build()
                .unwrap();

            let report = job.call();
            let m = report.metrics();

            prop_assert_eq!(m.read_count() + m.filter_count() + m.error_count(), fates.len() as u64);
            prop_assert_eq!(m.pulled_count(), fates.len() as u64);
            prop_assert_eq!(m.write_count(), writer.records().len() as u64);
            prop_assert_eq!(m.write_count(), m.read_count());
            prop_assert!(writer.batches().iter().all(|b| !b.is_empty() && b.len() <= batch_size));
        }

        /// Property: n records in batches of k give ceil(n/k) batches, in source order.
        #[test]
        fn batching_preserves_order_and_sizes(n in 0u32..200, k in 1usize..20) {
            let writer = VecRecordWriter::new();
            let mut job = JobBuilder::new()
                .reader(IterableRecordReader::new(1..=n))
                .writer(writer.clone())
                .batch_size(k)
                .build()
                .unwrap();

            job.call();

            let batches = writer.batches();
            let n = n as usize;
            prop_assert_eq!(batches.len(), n.div_ceil(k));
            if let Some(last) = batches.last() {
                let expected_last = if n % k == 0 { k } else { n % k };
                prop_assert_eq!(last.len(), expected_last);
            }
            let flattened: Vec<u32> = writer.payloads();
            prop_assert_eq!(flattened, (1..=n as u32).collect::<Vec<_>>());
        }

        /// Property: with threshold t, the job fails right after error t + 1 and
        /// nothing is pulled after it.
        #[test]
        fn threshold_stops_at_first_excess_error(
            fates in proptest::collection::vec(fate(), 1..60),
            threshold in 0u64..5,
        ) {
            let mut job = JobBuilder::new()
                .reader(IterableRecordReader::new(fates.clone()))
                .processor(|r: Record<Fate>| -> anyhow::Result<Option<Record<Fate>>> {
                    match r.payload() {
                        Fate::Fail => Err(anyhow!("failed")),
                        _ => Ok(Some(r)),
                    }
                })
                .error_threshold(threshold)
                .batch_size(4)
                .build()
                .unwrap();

            let report = job.call();

            let failures: Vec<usize> = fates
                .iter()
                .enumerate()
                .filter(|(_, f)| matches!(f, Fate::Fail))
                .map(|(i, _)| i)
                .collect();
            match failures.get(threshold as usize) {
                Some(&breach_index) => {
                    prop_assert_eq!(report.status(), JobStatus::Failed);
                    prop_assert_eq!(report.metrics().pulled_count(), breach_index as u64 + 1);
                    prop_assert_eq!(report.metrics().error_count(), threshold + 1);
                }
                None => {
                    prop_assert_eq!(report.status(), JobStatus::Completed);
                    prop_assert_eq!(report.metrics().pulled_count(), fates.len() as u64);
                }
            }
        }
    }
}
