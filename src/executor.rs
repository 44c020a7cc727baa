//! Execution of analyses over datasets.
//!
//! Two executors implement [Executor]:
//!
//! * [SequentialExecutor] loads and ingests images one at a time on the calling thread.
//! * [ThreadPoolExecutor] loads images and computes their contributions on a fixed-size
//!   [rayon] pool. Contributions are sent over a channel to the calling thread, which is the
//!   only thread that ever merges into the accumulator.
//!
//! [executor_for] picks one based on the configured worker count.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;

use rayon::iter::{ParallelBridge, ParallelIterator};
use tracing::{debug, info, warn};

use crate::analysis::Analysis;
use crate::error::RasterAnalysisError;
use crate::metrics::IMAGES_PROCESSED;
use crate::raster::RasterLoader;

/// What to do when an image cannot be loaded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// End the run with the first failure.
    #[default]
    Abort,
    /// Log the failure, skip the image and carry on.
    Skip,
}

/// Summary of a completed run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Number of images merged into the analysis
    pub processed: usize,
    /// Images that failed to load and were skipped
    pub skipped: Vec<PathBuf>,
}

/// Trait for analysis executors.
pub trait Executor {
    /// Run `analysis` over every path in `dataset`.
    ///
    /// Blocks until the whole dataset has been consumed. On success the analysis holds the
    /// contribution of every processed image.
    ///
    /// # Arguments
    ///
    /// * `analysis`: Accumulator to update
    /// * `dataset`: Paths of the images to analyse
    /// * `loader`: Loads each image
    fn execute<A, I, L>(
        &self,
        analysis: &mut A,
        dataset: I,
        loader: &L,
    ) -> Result<ExecutionReport, RasterAnalysisError>
    where
        A: Analysis,
        I: IntoIterator<Item = PathBuf>,
        I::IntoIter: Send,
        L: RasterLoader;
}

/// Load an image and reduce it to its contribution. The image is dropped before returning.
fn contribute<A: Analysis, L: RasterLoader>(
    loader: &L,
    path: &Path,
) -> Result<A::Contribution, RasterAnalysisError> {
    debug!("Processing image at {}", path.display());
    let image = loader.load(path)?;
    Ok(A::contribute(&image))
}

/// Apply the failure policy to the outcome of one image, merging successful contributions.
fn record<A: Analysis>(
    policy: FailurePolicy,
    analysis: &mut A,
    report: &mut ExecutionReport,
    path: PathBuf,
    outcome: Result<A::Contribution, RasterAnalysisError>,
) -> Result<(), RasterAnalysisError> {
    match outcome {
        Ok(contribution) => {
            analysis.merge(contribution);
            report.processed += 1;
            IMAGES_PROCESSED.with_label_values(&["processed"]).inc();
            Ok(())
        }
        Err(err) if policy == FailurePolicy::Skip => {
            warn!("skipping image {}: {}", path.display(), err);
            report.skipped.push(path);
            IMAGES_PROCESSED.with_label_values(&["skipped"]).inc();
            Ok(())
        }
        Err(err) => {
            IMAGES_PROCESSED.with_label_values(&["failed"]).inc();
            Err(err)
        }
    }
}

/// Processes images one at a time in the calling thread, in dataset order.
#[derive(Clone, Debug, Default)]
pub struct SequentialExecutor {
    policy: FailurePolicy,
}

impl SequentialExecutor {
    /// Return a new SequentialExecutor.
    pub fn new(policy: FailurePolicy) -> Self {
        Self { policy }
    }
}

impl Executor for SequentialExecutor {
    fn execute<A, I, L>(
        &self,
        analysis: &mut A,
        dataset: I,
        loader: &L,
    ) -> Result<ExecutionReport, RasterAnalysisError>
    where
        A: Analysis,
        I: IntoIterator<Item = PathBuf>,
        I::IntoIter: Send,
        L: RasterLoader,
    {
        let mut report = ExecutionReport::default();
        for path in dataset {
            let outcome = contribute::<A, L>(loader, &path);
            record(self.policy, analysis, &mut report, path, outcome)?;
        }
        Ok(report)
    }
}

/// Processes images on a fixed-size pool of worker threads.
///
/// Images are handed to workers in no particular order.
#[derive(Debug)]
pub struct ThreadPoolExecutor {
    pool: rayon::ThreadPool,
    policy: FailurePolicy,
}

impl ThreadPoolExecutor {
    /// Return a new ThreadPoolExecutor with `workers` threads.
    pub fn new(workers: usize, policy: FailurePolicy) -> Result<Self, RasterAnalysisError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("raster-analysis-{}", index))
            .build()?;
        Ok(Self { pool, policy })
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl Executor for ThreadPoolExecutor {
    fn execute<A, I, L>(
        &self,
        analysis: &mut A,
        dataset: I,
        loader: &L,
    ) -> Result<ExecutionReport, RasterAnalysisError>
    where
        A: Analysis,
        I: IntoIterator<Item = PathBuf>,
        I::IntoIter: Send,
        L: RasterLoader,
    {
        let dataset = dataset.into_iter();
        let (sender, receiver) = mpsc::channel();
        // Raised once a failure ends the run, so that workers stop loading images.
        let stop = AtomicBool::new(false);
        let mut report = ExecutionReport::default();

        std::thread::scope(|scope| {
            let stop = &stop;
            scope.spawn(move || {
                self.pool.install(|| {
                    dataset.par_bridge().for_each_with(sender, |sender, path| {
                        if stop.load(Ordering::Relaxed) {
                            return;
                        }
                        let outcome = contribute::<A, L>(loader, &path);
                        // The receiver outlives every sender.
                        let _ = sender.send((path, outcome));
                    })
                })
            });

            let mut result = Ok(());
            // Ends once every worker has finished and dropped its sender.
            for (path, outcome) in receiver {
                if result.is_err() {
                    continue;
                }
                result = record(self.policy, analysis, &mut report, path, outcome);
                if result.is_err() {
                    stop.store(true, Ordering::Relaxed);
                }
            }
            result
        })?;

        Ok(report)
    }
}

/// An executor selected from configuration.
#[derive(Debug)]
pub enum AnalysisExecutor {
    Sequential(SequentialExecutor),
    ThreadPool(ThreadPoolExecutor),
}

impl Executor for AnalysisExecutor {
    fn execute<A, I, L>(
        &self,
        analysis: &mut A,
        dataset: I,
        loader: &L,
    ) -> Result<ExecutionReport, RasterAnalysisError>
    where
        A: Analysis,
        I: IntoIterator<Item = PathBuf>,
        I::IntoIter: Send,
        L: RasterLoader,
    {
        match self {
            Self::Sequential(executor) => executor.execute(analysis, dataset, loader),
            Self::ThreadPool(executor) => executor.execute(analysis, dataset, loader),
        }
    }
}

/// Return the executor for a configured worker count.
///
/// More than one worker selects a [ThreadPoolExecutor], otherwise a [SequentialExecutor].
pub fn executor_for(
    workers: usize,
    policy: FailurePolicy,
) -> Result<AnalysisExecutor, RasterAnalysisError> {
    let executor = if workers > 1 {
        AnalysisExecutor::ThreadPool(ThreadPoolExecutor::new(workers, policy)?)
    } else {
        AnalysisExecutor::Sequential(SequentialExecutor::new(policy))
    };
    info!(workers, ?policy, "Using {} executor", executor.name());
    Ok(executor)
}

impl AnalysisExecutor {
    fn name(&self) -> &'static str {
        match self {
            Self::Sequential(_) => "sequential",
            Self::ThreadPool(_) => "thread pool",
        }
    }
}
