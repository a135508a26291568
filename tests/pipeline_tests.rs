//! Black-box scenarios run against the public API: `run`/`run_with_tracer` over hand-built
//! pipelines, exercising every pipe kind's cancellation, error, and counter behavior.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use conduit::breaker::Breaker;
use conduit::context::RunContext;
use conduit::error::PipelineError;
use conduit::pipe::if_pipe::IfPipe;
use conduit::pipe::iterator::Iterator as IteratorPipe;
use conduit::pipe::simple::SimplePipe;
use conduit::pipe::{Decider, Flow, Joiner, Pipe, Resolver, Splitter};
use conduit::pipeline::{self, Pipeline};
use conduit::runtime_options::RuntimeOptions;
use conduit::value::Value;
use futures::FutureExt;

fn identity() -> Resolver {
    Arc::new(|_ctx, input| async move { Ok(input) }.boxed())
}

fn blank_pipeline(flow: Flow) -> Pipeline {
    Pipeline {
        name: "test".to_owned(),
        description: String::new(),
        source: identity(),
        flow,
        sink: identity(),
        blueprint_skin: Default::default(),
        trace_skin: Default::default(),
        source_note: None,
        sink_note: None,
    }
}

// A two-stage linear flow produces the composed result and the tracer records one node per
// stage.
#[tokio::test]
async fn linear_flow_composes_stages_and_traces_every_node() {
    let increment: Resolver = Arc::new(|_ctx, input| {
        async move { Ok(Value::Int(input.as_int()? + 1)) }.boxed()
    });
    let double: Resolver = Arc::new(|_ctx, input| {
        async move { Ok(Value::Int(input.as_int()? * 2)) }.boxed()
    });

    let pipeline = blank_pipeline(vec![
        Arc::new(SimplePipe::named("Increment", increment)) as Arc<dyn Pipe>,
        Arc::new(SimplePipe::named("Double", double)) as Arc<dyn Pipe>,
    ]);

    let options = Arc::new(RuntimeOptions::new());
    let (result, link) = pipeline::run_with_tracer(options, &pipeline, Value::Int(3))
        .await
        .unwrap();

    assert_eq!(result.as_int().unwrap(), 8);
    // Both nodes' labels survive into the rendered (and then compressed/encoded) trace.
    assert!(!link.is_empty());
}

// IfPipe counters settle at the observed true/false split.
#[tokio::test]
async fn if_pipe_counters_reflect_observed_split() {
    let decider: Decider = Arc::new(|_ctx, input| async move { Ok(input.as_int()? % 10 == 0) }.boxed());
    let if_pipe = IfPipe::named("Gate", decider, vec![], vec![]);
    let counters_view = Arc::new(if_pipe);

    let (breaker, _rx) = Breaker::new();
    let options = Arc::new(RuntimeOptions::new());

    for i in 0..10 {
        let ctx = RunContext::root(breaker.clone(), None, options.clone());
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        let (mut out, _err) = counters_view.connect(ctx, rx).await;
        tx.send(Value::Int(i)).await.unwrap();
        drop(tx);
        out.recv().await;
    }

    let breakdown = counters_view.counters().percentages();
    let true_pct = breakdown.iter().find(|(name, _, _)| name == "true").unwrap().2;
    let false_pct = breakdown.iter().find(|(name, _, _)| name == "false").unwrap().2;
    assert!((true_pct - 10.0).abs() < 1e-9);
    assert!((false_pct - 90.0).abs() < 1e-9);
}

// A panicking stage yields a PipelineError::Panic with the documented message prefix, and the
// run still completes (no abort).
#[tokio::test]
async fn panicking_stage_is_contained_and_reported() {
    let boom: Resolver = Arc::new(|_ctx, _input| async move { panic!("boom") }.boxed());
    let pipeline = blank_pipeline(vec![Arc::new(SimplePipe::named("Boom", boom)) as Arc<dyn Pipe>]);

    let options = Arc::new(RuntimeOptions::new());
    let err = pipeline::run(options, &pipeline, Value::Unit, false)
        .await
        .unwrap_err();

    assert!(err.is_panic());
    assert!(err.to_string().contains("panic recovered: boom"));
}

// An early exit short-circuits the run well before a slow sibling stage finishes.
#[tokio::test]
async fn early_exit_short_circuits_before_slow_stage_finishes() {
    let slow_then_cancel: Resolver = Arc::new(|ctx, input| {
        async move {
            ctx.breaker.early_exit(Value::Str("done".into()));
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(input)
        }
        .boxed()
    });

    let pipeline = blank_pipeline(vec![
        Arc::new(SimplePipe::named("SlowThenCancel", slow_then_cancel)) as Arc<dyn Pipe>,
    ]);

    let options = Arc::new(RuntimeOptions::new());
    let started = Instant::now();
    let result = pipeline::run(options, &pipeline, Value::Unit, false).await.unwrap();

    assert_eq!(result.as_str().unwrap(), "done");
    assert!(started.elapsed() < Duration::from_millis(500));
}

// Iterator honors MaxP: with 5 sub-tokens and MaxP=2, no more than 2 run concurrently, and chunk
// j fully completes before chunk j+1 starts.
#[tokio::test]
async fn iterator_bounds_parallelism_by_max_p() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let splitter: Splitter = Arc::new(|_ctx, _input| {
        async move { Ok((1..=5).map(Value::Int).collect()) }.boxed()
    });
    let joiner: Joiner = Arc::new(|_ctx, _original, results| {
        async move { Ok(Value::Int(results.len() as i64)) }.boxed()
    });

    let tracked_in_flight = in_flight.clone();
    let tracked_peak = peak.clone();
    let sub_flow: Resolver = Arc::new(move |_ctx, input| {
        let in_flight = tracked_in_flight.clone();
        let peak = tracked_peak.clone();
        async move {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(input)
        }
        .boxed()
    });

    let iterator = IteratorPipe::named(
        "Bounded",
        splitter,
        vec![Arc::new(SimplePipe::named("Sleep", sub_flow)) as Arc<dyn Pipe>],
        joiner,
    )
    .with_max_p(2);

    let pipeline = blank_pipeline(vec![Arc::new(iterator) as Arc<dyn Pipe>]);
    let options = Arc::new(RuntimeOptions::new());

    let started = Instant::now();
    let result = pipeline::run(options, &pipeline, Value::Unit, false).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(result.as_int().unwrap(), 5);
    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert!(elapsed >= Duration::from_millis(300));
    assert!(elapsed < Duration::from_millis(600));
}

// A stage returning a structured error cancels the rest of the run and the run reports exactly
// that error.
#[tokio::test]
async fn stage_error_is_reported_and_cancels_the_run() {
    let failing: Resolver = Arc::new(|_ctx, _input| {
        async move {
            Err(PipelineError::Stage(Box::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                "lookup failed",
            ))))
        }
        .boxed()
    });
    let pipeline = blank_pipeline(vec![Arc::new(SimplePipe::named("Failing", failing)) as Arc<dyn Pipe>]);

    let options = Arc::new(RuntimeOptions::new());
    let err = pipeline::run(options, &pipeline, Value::Unit, false)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("lookup failed"));
}
