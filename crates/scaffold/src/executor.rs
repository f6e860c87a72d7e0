//! Execution engine - runs steps in priority groups
//!
//! Steps are sorted by priority (stable) and split into groups of equal
//! priority. Groups run one after another. Inside a group, conditions are
//! evaluated on the calling thread, then every ready step runs on its own
//! worker. A failure lets the rest of its group finish but stops all later
//! groups.

use crate::context::{NoProgress, ProgressCallback, RunContext};
use crate::error::{Error, Result};
use crate::step::BoxedStep;
use crate::types::{ExecuteSummary, SkipReason, StepOptions, StepResult};
use rayon::prelude::*;
use std::time::{Duration, Instant};

/// Runs a list of steps against a [`RunContext`]
pub struct StepExecutor {
    steps: Vec<BoxedStep>,
    opts: StepOptions,
    results: Vec<StepResult>,
}

impl StepExecutor {
    pub fn new(steps: Vec<BoxedStep>, opts: StepOptions) -> Self {
        Self {
            steps,
            opts,
            results: Vec::new(),
        }
    }

    /// Execute without progress reporting
    pub fn execute(&mut self, ctx: &RunContext) -> Result<()> {
        self.execute_with(ctx, &mut NoProgress)
    }

    /// Execute all groups, reporting through `progress`
    ///
    /// Returns the first failure of the first failing group. Results
    /// collected up to that point stay available through
    /// [`StepExecutor::results`].
    pub fn execute_with<P: ProgressCallback>(
        &mut self,
        ctx: &RunContext,
        progress: &mut P,
    ) -> Result<()> {
        self.results.clear();
        let sorted = sort_by_priority(&self.steps);

        for group in group_by_priority(&sorted) {
            let priority = group[0].priority();
            progress.on_group_start(priority, group.len());
            let outcome = self.execute_group(group, ctx, progress);
            progress.on_group_complete(priority);
            outcome?;
        }

        Ok(())
    }

    fn execute_group<P: ProgressCallback>(
        &mut self,
        group: &[BoxedStep],
        ctx: &RunContext,
        progress: &mut P,
    ) -> Result<()> {
        let mut slots: Vec<Option<StepResult>> = vec![None; group.len()];
        let mut ready = Vec::with_capacity(group.len());
        let mut first_error: Option<Error> = None;

        for (index, step) in group.iter().enumerate() {
            match step.condition(ctx) {
                Ok(false) => {
                    log::debug!("Skipping {}: condition not met", step.name());
                    progress.on_step_skipped(step.name(), SkipReason::ConditionFalse);
                    slots[index] = Some(StepResult::skipped(step.clone(), SkipReason::ConditionFalse));
                }
                Ok(true) if self.opts.dry_run => {
                    if let Err(e) = step.preview(ctx, &self.opts) {
                        log::warn!("Preview of {} failed: {e:#}", step.name());
                    }
                    progress.on_step_skipped(step.name(), SkipReason::DryRun);
                    slots[index] = Some(StepResult::skipped(step.clone(), SkipReason::DryRun));
                }
                Ok(true) => ready.push(index),
                Err(e) => {
                    let result = StepResult {
                        step: step.clone(),
                        skipped: None,
                        error: Some(e.to_string()),
                        duration: Duration::ZERO,
                    };
                    progress.on_step_complete(&result);
                    slots[index] = Some(result);
                    if first_error.is_none() {
                        first_error = Some(Error::StepFailed {
                            step: step.name().to_string(),
                            source: e.into(),
                        });
                    }
                }
            }
        }

        for (index, duration, outcome) in dispatch(group, &ready, ctx, &self.opts)? {
            let step = &group[index];
            let error = match outcome {
                Ok(()) => None,
                Err(e) => {
                    let message = format!("{e:#}");
                    if first_error.is_none() {
                        first_error = Some(Error::StepFailed {
                            step: step.name().to_string(),
                            source: e,
                        });
                    } else {
                        log::warn!("{} also failed: {message}", step.name());
                    }
                    Some(message)
                }
            };

            let result = StepResult {
                step: step.clone(),
                skipped: None,
                error,
                duration,
            };
            progress.on_step_complete(&result);
            slots[index] = Some(result);
        }

        self.results.extend(slots.into_iter().flatten());
        first_error.map_or(Ok(()), Err)
    }

    /// Per-step outcomes so far, in step order
    pub fn results(&self) -> &[StepResult] {
        &self.results
    }

    pub fn summary(&self) -> ExecuteSummary {
        ExecuteSummary::from_results(&self.results)
    }
}

type Outcome = (usize, Duration, anyhow::Result<()>);

/// Run the `ready` members of `group`, one worker per step
///
/// Outcomes come back in `ready` order no matter how the workers interleave.
fn dispatch(
    group: &[BoxedStep],
    ready: &[usize],
    ctx: &RunContext,
    opts: &StepOptions,
) -> Result<Vec<Outcome>> {
    let run = |&index: &usize| -> Outcome {
        let step = &group[index];
        log::debug!("Running {}", step.name());
        let start = Instant::now();
        let outcome = step.run(ctx, opts);
        (index, start.elapsed(), outcome)
    };

    if ready.len() <= 1 {
        return Ok(ready.iter().map(run).collect());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(ready.len())
        .build()
        .map_err(|e| Error::Pool(e.to_string()))?;

    Ok(pool.install(|| ready.par_iter().map(run).collect()))
}

/// Stable sort by ascending priority
pub fn sort_by_priority(steps: &[BoxedStep]) -> Vec<BoxedStep> {
    let mut sorted = steps.to_vec();
    sorted.sort_by_key(|step| step.priority());
    sorted
}

/// Split a sorted list into contiguous runs of equal priority
pub fn group_by_priority(sorted: &[BoxedStep]) -> impl Iterator<Item = &[BoxedStep]> {
    sorted.chunk_by(|a, b| a.priority() == b.priority())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestStep;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn names(results: &[StepResult]) -> Vec<&str> {
        results.iter().map(StepResult::name).collect()
    }

    #[test]
    fn test_sort_is_stable() {
        let steps: Vec<BoxedStep> = vec![
            TestStep::new("c", 10).boxed(),
            TestStep::new("a", 0).boxed(),
            TestStep::new("d", 10).boxed(),
            TestStep::new("b", 0).boxed(),
            TestStep::new("e", 5).boxed(),
        ];
        let sorted = sort_by_priority(&steps);
        let order: Vec<&str> = sorted.iter().map(|s| s.name()).collect();
        assert_eq!(order, vec!["a", "b", "e", "c", "d"]);
    }

    #[test]
    fn test_groups_partition_sorted_list() {
        let steps: Vec<BoxedStep> = [3, 1, 2, 1, 3, 3]
            .iter()
            .enumerate()
            .map(|(i, p)| TestStep::new(&format!("s{i}"), *p).boxed())
            .collect();
        let sorted = sort_by_priority(&steps);
        let groups: Vec<&[BoxedStep]> = group_by_priority(&sorted).collect();

        assert_eq!(groups.len(), 3);
        assert_eq!(groups.iter().map(|g| g.len()).sum::<usize>(), steps.len());
        for group in &groups {
            assert!(group.iter().all(|s| s.priority() == group[0].priority()));
        }
        let priorities: Vec<i32> = groups.iter().map(|g| g[0].priority()).collect();
        assert_eq!(priorities, vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_step_list() {
        let ctx = RunContext::new("/tmp", "main");
        let mut executor = StepExecutor::new(Vec::new(), StepOptions::default());
        executor.execute(&ctx).unwrap();
        assert!(executor.results().is_empty());
    }

    #[test]
    fn test_condition_false_is_skipped() {
        let ctx = RunContext::new("/tmp", "main");
        let skipped = TestStep::new("skipped", 0).with_condition(false);
        let ran = TestStep::new("ran", 0);
        let (skipped_calls, ran_calls) = (skipped.calls(), ran.calls());

        let mut executor =
            StepExecutor::new(vec![skipped.boxed(), ran.boxed()], StepOptions::default());
        executor.execute(&ctx).unwrap();

        let results = executor.results();
        assert_eq!(results[0].skipped, Some(SkipReason::ConditionFalse));
        assert!(!results[1].is_skipped());
        assert_eq!(skipped_calls.load(Ordering::SeqCst), 0);
        assert_eq!(ran_calls.load(Ordering::SeqCst), 1);
        assert_eq!(executor.summary().ran, 1);
        assert_eq!(executor.summary().skipped, 1);
    }

    #[test]
    fn test_dry_run_runs_nothing() {
        let ctx = RunContext::new("/tmp", "main");
        let a = TestStep::new("a", 0);
        let b = TestStep::new("b", 5).with_condition(false);
        let (a_calls, a_previews) = (a.calls(), a.previews());

        let mut executor = StepExecutor::new(vec![a.boxed(), b.boxed()], StepOptions::dry_run());
        executor.execute(&ctx).unwrap();

        let results = executor.results();
        assert_eq!(results[0].skipped, Some(SkipReason::DryRun));
        assert_eq!(results[1].skipped, Some(SkipReason::ConditionFalse));
        assert_eq!(a_calls.load(Ordering::SeqCst), 0);
        assert_eq!(a_previews.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_same_priority_runs_concurrently() {
        let ctx = RunContext::new("/tmp", "main");
        let steps: Vec<BoxedStep> = (0..3)
            .map(|i| TestStep::new(&format!("sleep{i}"), 10).sleeping(100).boxed())
            .collect();

        let start = Instant::now();
        StepExecutor::new(steps, StepOptions::default())
            .execute(&ctx)
            .unwrap();
        let elapsed = start.elapsed();

        assert!(elapsed < Duration::from_millis(250), "took {elapsed:?}");
    }

    #[test]
    fn test_groups_run_sequentially() {
        let ctx = RunContext::new("/tmp", "main");
        let steps: Vec<BoxedStep> = (0..3)
            .map(|i| TestStep::new(&format!("sleep{i}"), i).sleeping(100).boxed())
            .collect();

        let start = Instant::now();
        StepExecutor::new(steps, StepOptions::default())
            .execute(&ctx)
            .unwrap();

        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[test]
    fn test_failure_finishes_group_and_halts() {
        let ctx = RunContext::new("/tmp", "main");
        let slow = TestStep::new("slow", 0).sleeping(100);
        let failing = TestStep::new("failing", 0).failing("boom");
        let later = TestStep::new("later", 1);
        let (slow_done, later_calls) = (slow.completed(), later.calls());

        let mut executor = StepExecutor::new(
            vec![slow.boxed(), failing.boxed(), later.boxed()],
            StepOptions::default(),
        );
        let err = executor.execute(&ctx).unwrap_err();

        assert_eq!(err.failed_step(), Some("failing"));
        assert_eq!(err.to_string(), "failing failed: boom");
        assert_eq!(slow_done.load(Ordering::SeqCst), 1);
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);

        let results = executor.results();
        assert_eq!(names(results), vec!["slow", "failing"]);
        assert!(results[0].is_success());
        assert_eq!(results[1].error.as_deref(), Some("boom"));
        assert_eq!(executor.summary().failed, 1);
    }

    #[test]
    fn test_first_failure_in_step_order_wins() {
        let ctx = RunContext::new("/tmp", "main");
        let steps = vec![
            TestStep::new("first", 0).sleeping(80).failing("first error").boxed(),
            TestStep::new("second", 0).failing("second error").boxed(),
        ];

        let mut executor = StepExecutor::new(steps, StepOptions::default());
        let err = executor.execute(&ctx).unwrap_err();

        assert_eq!(err.failed_step(), Some("first"));
        // Both failures are kept for diagnostics
        assert_eq!(executor.summary().failed, 2);
    }

    #[test]
    fn test_results_in_step_order() {
        let ctx = RunContext::new("/tmp", "main");
        let steps = vec![
            TestStep::new("slowest", 0).sleeping(60).boxed(),
            TestStep::new("slow", 0).sleeping(30).boxed(),
            TestStep::new("fast", 0).boxed(),
        ];

        let mut executor = StepExecutor::new(steps, StepOptions::default());
        executor.execute(&ctx).unwrap();
        assert_eq!(names(executor.results()), vec!["slowest", "slow", "fast"]);
    }

    #[test]
    fn test_progress_callbacks() {
        #[derive(Default)]
        struct Recorder {
            groups: Vec<(i32, usize)>,
            completed: Vec<String>,
            skipped: usize,
            finished: usize,
        }

        impl ProgressCallback for Recorder {
            fn on_group_start(&mut self, priority: i32, count: usize) {
                self.groups.push((priority, count));
            }
            fn on_step_skipped(&mut self, _name: &str, _reason: SkipReason) {
                self.skipped += 1;
            }
            fn on_step_complete(&mut self, result: &StepResult) {
                self.completed.push(result.name().to_string());
            }
            fn on_group_complete(&mut self, _priority: i32) {
                self.finished += 1;
            }
        }

        let ctx = RunContext::new("/tmp", "main");
        let steps = vec![
            TestStep::new("a", 0).boxed(),
            TestStep::new("b", 0).with_condition(false).boxed(),
            TestStep::new("c", 7).boxed(),
        ];
        let mut recorder = Recorder::default();
        StepExecutor::new(steps, StepOptions::default())
            .execute_with(&ctx, &mut recorder)
            .unwrap();

        assert_eq!(recorder.groups, vec![(0, 2), (7, 1)]);
        assert_eq!(recorder.completed, vec!["a", "c"]);
        assert_eq!(recorder.skipped, 1);
        assert_eq!(recorder.finished, 2);
    }

    #[test]
    fn test_steps_share_context_variables() {
        #[derive(Debug)]
        struct Writer;
        impl crate::step::Step for Writer {
            fn name(&self) -> &str {
                "writer"
            }
            fn priority(&self) -> i32 {
                0
            }
            fn condition(&self, _ctx: &RunContext) -> Result<bool> {
                Ok(true)
            }
            fn run(&self, ctx: &RunContext, _opts: &StepOptions) -> anyhow::Result<()> {
                ctx.set_var("Greeting", "hello");
                Ok(())
            }
        }

        #[derive(Debug)]
        struct Reader(Arc<AtomicUsize>);
        impl crate::step::Step for Reader {
            fn name(&self) -> &str {
                "reader"
            }
            fn priority(&self) -> i32 {
                1
            }
            fn condition(&self, ctx: &RunContext) -> Result<bool> {
                Ok(ctx.get_var("Greeting") == "hello")
            }
            fn run(&self, _ctx: &RunContext, _opts: &StepOptions) -> anyhow::Result<()> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let ctx = RunContext::new("/tmp", "main");
        let hits = Arc::new(AtomicUsize::new(0));
        let steps: Vec<BoxedStep> = vec![Arc::new(Reader(Arc::clone(&hits))), Arc::new(Writer)];
        StepExecutor::new(steps, StepOptions::default())
            .execute(&ctx)
            .unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unreadable_condition_file_skips_without_failing() {
        use crate::condition::Condition;
        use crate::steps::EnvWriteStep;
        use serde_json::json;

        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("blob.bin"), [0xff, 0xfe, 0x00, b'A']).unwrap();
        let ctx = RunContext::new(dir.path(), "main");

        let gated_on = |file: &str| {
            Condition::decode(&json!({"file_contains": {"file": file, "pattern": "needle"}}))
                .unwrap()
        };
        let later = TestStep::new("later", 5);
        let later_calls = later.calls();
        let steps: Vec<BoxedStep> = vec![
            Arc::new(EnvWriteStep::new("BINARY", "1", 0).with_condition(gated_on("blob.bin"))),
            Arc::new(EnvWriteStep::new("DIRECTORY", "1", 0).with_condition(gated_on("."))),
            later.boxed(),
        ];

        let mut executor = StepExecutor::new(steps, StepOptions::default());
        executor.execute(&ctx).unwrap();

        assert_eq!(later_calls.load(Ordering::SeqCst), 1);
        assert_eq!(executor.summary().skipped, 2);
        assert!(!dir.path().join(".env").exists());
    }
}
