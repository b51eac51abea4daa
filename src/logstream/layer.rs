//! Tracing layer routing job-scoped events to their sinks

use super::{LogLevel, LogRecord, LogSink};
use crate::job::JobId;
use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// Span field carrying the job id, e.g. `info_span!("backtest", job_id = %id)`
pub const JOB_FIELD: &str = "job_id";

thread_local! {
    static DISPATCHING: Cell<bool> = const { Cell::new(false) };
}

/// Sinks currently attached, per job
#[derive(Default)]
pub struct SinkRegistry {
    sinks: RwLock<HashMap<JobId, Vec<Arc<dyn LogSink>>>>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach sinks to a job until the returned guard is dropped
    #[must_use = "sinks are detached when the guard is dropped"]
    pub fn attach(self: &Arc<Self>, job: JobId, sinks: Vec<Arc<dyn LogSink>>) -> SinkGuard {
        match self.sinks.write() {
            Ok(mut map) => map.entry(job).or_default().extend(sinks),
            Err(poisoned) => poisoned.into_inner().entry(job).or_default().extend(sinks),
        }
        SinkGuard {
            registry: Arc::clone(self),
            job,
        }
    }

    pub fn is_attached(&self, job: &JobId) -> bool {
        self.sinks
            .read()
            .map(|map| map.contains_key(job))
            .unwrap_or(false)
    }

    /// Deliver a record to every sink of `job`
    pub fn dispatch(&self, job: &JobId, record: &LogRecord) {
        let sinks = match self.sinks.read() {
            Ok(map) => map.get(job).cloned(),
            Err(_) => None,
        };
        for sink in sinks.unwrap_or_default() {
            sink.write(record);
        }
    }

    fn detach(&self, job: &JobId) {
        match self.sinks.write() {
            Ok(mut map) => map.remove(job),
            Err(poisoned) => poisoned.into_inner().remove(job),
        };
    }
}

/// Detaches a job's sinks on drop, whichever way the run ended
pub struct SinkGuard {
    registry: Arc<SinkRegistry>,
    job: JobId,
}

impl SinkGuard {
    pub fn job(&self) -> JobId {
        self.job
    }
}

impl Drop for SinkGuard {
    fn drop(&mut self) {
        self.registry.detach(&self.job);
    }
}

/// Layer forwarding every event inside a `job_id` span to that job's sinks
///
/// Install it unfiltered so runs capture all levels regardless of the
/// console filter.
pub struct JobLogLayer {
    registry: Arc<SinkRegistry>,
}

impl JobLogLayer {
    pub fn new(registry: Arc<SinkRegistry>) -> Self {
        Self { registry }
    }
}

impl<S> Layer<S> for JobLogLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = JobIdVisitor::default();
        attrs.record(&mut visitor);
        if let (Some(job), Some(span)) = (visitor.job, ctx.span(id)) {
            span.extensions_mut().insert(job);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let job = ctx.event_scope(event).and_then(|mut scope| {
            scope.find_map(|span| {
                let extensions = span.extensions();
                let job = extensions.get::<JobId>().copied();
                job
            })
        });
        let Some(job) = job else {
            return;
        };

        // Sinks may log themselves; don't feed those back in
        let Some(_reentry) = ReentryGuard::enter() else {
            return;
        };

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let metadata = event.metadata();
        let record = LogRecord::new(
            LogLevel::from(*metadata.level()),
            visitor.finish(),
            metadata.target(),
        );
        self.registry.dispatch(&job, &record);
    }
}

struct ReentryGuard;

impl ReentryGuard {
    fn enter() -> Option<Self> {
        if DISPATCHING.with(|flag| flag.replace(true)) {
            None
        } else {
            Some(Self)
        }
    }
}

impl Drop for ReentryGuard {
    fn drop(&mut self) {
        DISPATCHING.with(|flag| flag.set(false));
    }
}

#[derive(Default)]
struct JobIdVisitor {
    job: Option<JobId>,
}

impl Visit for JobIdVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == JOB_FIELD {
            self.job = JobId::parse(value).ok();
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == JOB_FIELD {
            self.job = JobId::parse(&format!("{:?}", value)).ok();
        }
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.join(" ")
        } else {
            format!("{} {}", self.message, self.fields.join(" "))
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}
