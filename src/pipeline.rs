use crate::{
    backend::{Backend, Diagnosis, FailureKind, SaasClient, SdkClient},
    config::RunConfig,
    discovery::{self, ImageTask},
    jpeg_quality::{self, JpegQualityResult},
    metadata,
    progress::Progress,
    report::{
        BackendSlot, EvaluationOutcome, ImageReportRow, ReportLayout, ResultAggregator, RunReport,
        aggregate_row,
    },
    shutdown::CancelFlag,
    util::{now_rfc3339, sha256_hex},
};
use anyhow::Result;
use crossbeam::channel::unbounded;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct Backends {
    pub saas: Option<Box<dyn Backend>>,
    pub sdk: Vec<Box<dyn Backend>>,
}

impl Backends {
    pub fn from_run_config(run: &RunConfig) -> Result<Self> {
        let saas = match &run.saas {
            Some(target) => {
                if target.api_key.is_empty() {
                    warn!("SaaS is enabled without an API key; calls will fail authentication");
                }
                Some(Box::new(SaasClient::new(target, &run.timeouts)?) as Box<dyn Backend>)
            }
            None => None,
        };
        let sdk = run
            .sdk_targets
            .iter()
            .map(|t| Ok(Box::new(SdkClient::new(t, &run.timeouts)?) as Box<dyn Backend>))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { saas, sdk })
    }

    pub fn layout(&self, jpeg_quality: bool) -> ReportLayout {
        ReportLayout {
            jpeg_quality,
            saas_column: self.saas.as_ref().map(|b| b.column()),
            sdk_columns: self.sdk.iter().map(|b| b.column()).collect(),
        }
    }

    fn entries(&self) -> Vec<(BackendSlot, &dyn Backend)> {
        self.saas
            .iter()
            .map(|b| (BackendSlot::Saas, b.as_ref()))
            .chain(
                self.sdk
                    .iter()
                    .enumerate()
                    .map(|(i, b)| (BackendSlot::Sdk(i), b.as_ref())),
            )
            .collect()
    }
}

#[derive(Clone, Copy)]
enum UnitKind<'a> {
    Backend(BackendSlot, &'a dyn Backend),
    Quality,
}

/// One schedulable piece of work: an (image, backend) or (image, quality) pair.
#[derive(Clone, Copy)]
struct Unit<'a> {
    index: usize,
    kind: UnitKind<'a>,
}

enum UnitResult {
    Outcome(EvaluationOutcome),
    Quality(JpegQualityResult),
}

struct Completed {
    index: usize,
    result: UnitResult,
}

/// Per-image collection area. The row is built when `pending` reaches zero.
#[derive(Default)]
struct ImageSlot {
    pending: usize,
    outcomes: Vec<EvaluationOutcome>,
    quality: Option<JpegQualityResult>,
}

pub struct PipelineOutput {
    pub rows: Vec<ImageReportRow>,
    pub interrupted: bool,
}

pub struct Pipeline<'a> {
    run: &'a RunConfig,
    backends: &'a Backends,
}

impl<'a> Pipeline<'a> {
    pub fn new(run: &'a RunConfig, backends: &'a Backends) -> Self {
        Self { run, backends }
    }

    pub fn layout(&self) -> ReportLayout {
        self.backends.layout(self.run.analyze_jpeg_quality)
    }

    /// Evaluates `tasks` on a pool of `run.workers` threads. Individual call
    /// failures are recorded in the rows; an interrupt stops new units from
    /// starting and returns only the rows that were fully collected.
    pub fn run(&self, tasks: &[ImageTask], cancel: &CancelFlag, progress: &Progress) -> PipelineOutput {
        let layout = self.layout();
        let units = self.plan_units(tasks.len());
        let mut slots: Vec<ImageSlot> = (0..tasks.len()).map(|_| ImageSlot::default()).collect();
        for u in &units {
            slots[u.index].pending += 1;
        }

        let mut aggregator = ResultAggregator::new();
        for (index, slot) in slots.iter_mut().enumerate() {
            if slot.pending == 0 {
                aggregator.push(self.collect(&tasks[index], &layout, slot));
                progress.collected(&tasks[index].path);
            }
        }

        let workers = self.run.workers.max(1).min(units.len().max(1));
        debug!("dispatching {} units to {} workers", units.len(), workers);

        let (unit_tx, unit_rx) = unbounded::<Unit>();
        let (done_tx, done_rx) = unbounded::<Completed>();
        for unit in units {
            // receiver is alive in this scope
            let _ = unit_tx.send(unit);
        }
        drop(unit_tx);

        std::thread::scope(|s| {
            for _ in 0..workers {
                let unit_rx = unit_rx.clone();
                let done_tx = done_tx.clone();
                s.spawn(move || {
                    for unit in unit_rx.iter() {
                        if cancel.is_cancelled() {
                            break;
                        }
                        let result = execute(&tasks[unit.index], unit.kind);
                        if done_tx
                            .send(Completed {
                                index: unit.index,
                                result,
                            })
                            .is_err()
                        {
                            break;
                        }
                    }
                });
            }
            drop(done_tx);

            for done in done_rx.iter() {
                let slot = &mut slots[done.index];
                match done.result {
                    UnitResult::Outcome(o) => slot.outcomes.push(o),
                    UnitResult::Quality(q) => slot.quality = Some(q),
                }
                slot.pending -= 1;
                if slot.pending == 0 {
                    let task = &tasks[done.index];
                    aggregator.push(self.collect(task, &layout, slot));
                    progress.collected(&task.path);
                    debug!(
                        "[{}/{}] collected {}",
                        aggregator.len(),
                        tasks.len(),
                        task.path.display()
                    );
                }
            }
        });

        let interrupted = cancel.is_cancelled() && aggregator.len() < tasks.len();
        progress.finish(interrupted);
        if interrupted {
            warn!(
                "run interrupted: {} of {} images fully evaluated",
                aggregator.len(),
                tasks.len()
            );
        }
        PipelineOutput {
            rows: aggregator.into_rows(),
            interrupted,
        }
    }

    // (image, backend) order so a small pool finishes images in turn
    fn plan_units(&self, images: usize) -> Vec<Unit<'a>> {
        let entries = self.backends.entries();
        let mut units = Vec::with_capacity(images * (entries.len() + 1));
        for index in 0..images {
            units.extend(entries.iter().map(|&(slot, backend)| Unit {
                index,
                kind: UnitKind::Backend(slot, backend),
            }));
            if self.run.analyze_jpeg_quality {
                units.push(Unit {
                    index,
                    kind: UnitKind::Quality,
                });
            }
        }
        units
    }

    fn collect(
        &self,
        task: &ImageTask,
        layout: &ReportLayout,
        slot: &mut ImageSlot,
    ) -> ImageReportRow {
        aggregate_row(
            task,
            layout,
            std::mem::take(&mut slot.outcomes),
            slot.quality.take(),
            metadata::read_metadata(&task.path),
        )
    }
}

fn execute(task: &ImageTask, kind: UnitKind<'_>) -> UnitResult {
    let bytes = std::fs::read(&task.path);
    match kind {
        UnitKind::Quality => {
            let result = match bytes {
                Ok(b) => jpeg_quality::analyze(&b),
                Err(e) => JpegQualityResult::Error {
                    message: format!("cannot read image: {e}"),
                },
            };
            debug!("quality {} -> {}", task.id, result.cell());
            UnitResult::Quality(result)
        }
        UnitKind::Backend(slot, backend) => {
            let started = Instant::now();
            let diagnosis = match bytes {
                Ok(b) => backend.evaluate(&b),
                Err(e) => Diagnosis::failure(
                    FailureKind::ImageUnreadable,
                    format!("cannot read image: {e}"),
                ),
            };
            debug!(
                "backend {} image {} took {:?}",
                backend.id(),
                task.id,
                started.elapsed()
            );
            if let Diagnosis::Failure { kind, message } = &diagnosis {
                warn!(
                    "{} failed for {} ({kind}): {message}",
                    backend.id(),
                    task.path.display()
                );
            }
            UnitResult::Outcome(EvaluationOutcome {
                image_id: task.id.clone(),
                backend_id: backend.id(),
                slot,
                diagnosis,
            })
        }
    }
}

/// The core entry point: discover, evaluate, aggregate. Both the flag-driven
/// and the interactive front ends call this with an identical `RunConfig`.
pub fn evaluate(run: &RunConfig, backends: &Backends, cancel: &CancelFlag) -> Result<RunReport> {
    let tasks = discovery::discover(&run.source, &run.extensions)?;

    let mut id_input = run.normalized_for_hash();
    for t in &tasks {
        id_input.push('\n');
        id_input.push_str(&t.path.display().to_string());
    }
    let run_id = sha256_hex(id_input.as_bytes())[..16].to_string();

    info!(
        "run_id={run_id} images={} backends={} workers={} jpeg_quality={}",
        tasks.len(),
        backends.entries().len(),
        run.workers,
        run.analyze_jpeg_quality
    );

    let started = now_rfc3339();
    let clock = Instant::now();
    let pipeline = Pipeline::new(run, backends);
    let layout = pipeline.layout();
    let progress = Progress::new(tasks.len(), run.show_progress);
    let output = pipeline.run(&tasks, cancel, &progress);
    info!(
        "run_id={run_id} finished {} rows in {:.2}s",
        output.rows.len(),
        clock.elapsed().as_secs_f64()
    );

    Ok(RunReport {
        run_id,
        started,
        finished: now_rfc3339(),
        layout,
        total_images: tasks.len(),
        interrupted: output.interrupted,
        rows: output.rows,
    })
}
