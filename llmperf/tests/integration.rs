//! Integration tests for llmperf
//!
//! These tests drive the engine with in-memory senders and feed its output
//! through the analyzer, the detectors and the report renderers.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use llmperf::{
    BottleneckDetector, BottleneckThresholds, Collector, ConcurrentComparison, Engine,
    EngineConfig, GradientDetector, LatencyDetector, LlmPerfConfig, Metrics, OutputFormat, Params,
    ProviderError, Recommender, ReportMeta, RequestCase, RequestExecutor, RequestSender, Response,
    RunMode, StatisticalDetector, Sweep, SweepReport, Usage, WarmupGate, analyze,
};
use serde_json::{Value, json};

/// Echoes the case `tag` into the response id; cases tagged in
/// `fail_tags` fail with a network error
#[derive(Default)]
struct TaggedSender {
    calls: AtomicUsize,
    fail_tags: Vec<String>,
}

impl RequestSender for TaggedSender {
    fn name(&self) -> &str {
        "tagged"
    }

    fn send_request(
        &self,
        _priority: &Params,
        case: &RequestCase,
        _headers: &HashMap<String, String>,
    ) -> Result<Response, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let tag = case
            .get("tag")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if self.fail_tags.contains(&tag) {
            return Err(ProviderError::transport("dial tcp: connection refused"));
        }
        Ok(Response {
            id: tag,
            usage: Usage {
                prompt_tokens: 4,
                completion_tokens: 6,
                total_tokens: 10,
            },
            latency: Duration::from_millis(1 + (call % 7) as u64),
            first_token_latency: Duration::from_millis(1),
            ..Response::default()
        })
    }
}

fn tagged_dataset(len: usize) -> Vec<RequestCase> {
    (0..len)
        .filter_map(|i| json!({ "tag": format!("case-{i}") }).as_object().cloned())
        .collect()
}

fn engine(sender: Arc<TaggedSender>, config: EngineConfig) -> Engine {
    Engine::new(
        RequestExecutor::new(sender, Params::new(), HashMap::new()),
        config,
    )
}

fn point(concurrency: usize, qps: f64, latency_ms: u64) -> (usize, Metrics) {
    (
        concurrency,
        Metrics {
            total_requests: 100,
            successful_requests: 100,
            success_rate: 100.0,
            qps,
            tokens_per_second: qps * 10.0,
            average_latency: Duration::from_millis(latency_ms),
            ..Metrics::default()
        },
    )
}

fn comparison(points: &[(usize, Metrics)]) -> ConcurrentComparison {
    let mut comparison = ConcurrentComparison::new();
    for (concurrency, metrics) in points {
        comparison.add(*concurrency, metrics.clone());
    }
    comparison
}

/// Batch results line up with the dataset at every concurrency level
#[test]
fn test_batch_preserves_dataset_order() {
    let dataset = tagged_dataset(50);
    for concurrency in [1, 5, 50] {
        let sender = Arc::new(TaggedSender::default());
        let engine = engine(
            sender.clone(),
            EngineConfig {
                concurrency,
                ..EngineConfig::default()
            },
        );

        let results = engine.run_batch(&dataset).unwrap();

        assert_eq!(results.len(), 50);
        assert_eq!(sender.calls.load(Ordering::SeqCst), 50);
        for (i, result) in results.iter().enumerate() {
            let id = result.response.as_ref().map(|r| r.id.as_str());
            assert_eq!(id, Some(format!("case-{i}").as_str()), "concurrency {concurrency}");
        }
    }
}

/// Quota-bounded stress runs produce exactly workers x quota results
#[test]
fn test_stress_quota_yields_exact_count() {
    let sender = Arc::new(TaggedSender::default());
    let engine = engine(
        sender.clone(),
        EngineConfig {
            concurrency: 4,
            duration: Duration::ZERO,
            requests_per_worker: 5,
            request_interval: Duration::ZERO,
            ..EngineConfig::default()
        },
    );

    let results = engine
        .run_stress(&tagged_dataset(3), &mut WarmupGate::new())
        .unwrap();

    assert_eq!(results.len(), 20);
    assert_eq!(sender.calls.load(Ordering::SeqCst), 20);
}

/// Failures are counted and categorized, never dropped
#[test]
fn test_batch_failures_reach_metrics() {
    let sender = Arc::new(TaggedSender {
        fail_tags: vec!["case-1".to_string(), "case-3".to_string()],
        ..TaggedSender::default()
    });
    let engine = engine(
        sender,
        EngineConfig {
            concurrency: 2,
            ..EngineConfig::default()
        },
    );

    let collector = Collector::from(engine.run_batch(&tagged_dataset(6)).unwrap());
    let metrics = analyze(&collector);

    assert_eq!(metrics.total_requests, 6);
    assert_eq!(metrics.successful_requests, 4);
    assert_eq!(metrics.failed_requests, 2);
    assert_eq!(
        metrics.successful_requests + metrics.failed_requests,
        metrics.total_requests
    );
    assert_eq!(metrics.error_counts.get("connection refused"), Some(&2));
    assert_eq!(metrics.total_tokens, 40);
}

/// Analysis does not depend on the order results were collected in
#[test]
fn test_analysis_is_order_independent() {
    let engine = engine(Arc::new(TaggedSender::default()), EngineConfig::default());
    let results = engine.run_batch(&tagged_dataset(30)).unwrap();

    let forward = analyze(&Collector::from(results.clone()));
    let mut reversed = results;
    reversed.reverse();
    // interleave halves for a second permutation
    let (front, back) = reversed.split_at(15);
    let shuffled: Vec<_> = front
        .iter()
        .zip(back)
        .flat_map(|(a, b)| [b.clone(), a.clone()])
        .collect();

    assert_eq!(forward, analyze(&Collector::from(reversed.clone())));
    assert_eq!(forward, analyze(&Collector::from(shuffled)));
}

/// Nothing succeeded: every latency, token and rate field is zero
#[test]
fn test_all_failures_zero_metrics() {
    let sender = Arc::new(TaggedSender {
        fail_tags: (0..4).map(|i| format!("case-{i}")).collect(),
        ..TaggedSender::default()
    });
    let engine = engine(sender, EngineConfig::default());

    let metrics = analyze(&Collector::from(engine.run_batch(&tagged_dataset(4)).unwrap()));

    assert_eq!(metrics.successful_requests, 0);
    assert_eq!(metrics.qps, 0.0);
    assert_eq!(metrics.average_latency, Duration::ZERO);
    assert_eq!(metrics.latency_p99, Duration::ZERO);
    assert_eq!(metrics.total_tokens, 0);
    assert!(metrics.first_token.is_none());
}

#[test]
fn test_gradient_detector_reference_series() {
    let qps = [10.0, 20.0, 25.0, 27.0, 27.5];
    let points: Vec<_> = qps
        .iter()
        .enumerate()
        .map(|(i, &q)| point(i + 1, q, 100))
        .collect();
    let cmp = comparison(&points);

    let result = GradientDetector::new(10.0).detect(&cmp.test_results);

    assert!(result.is_bottleneck);
    assert_eq!(result.concurrency, 2);
}

#[test]
fn test_latency_detector_reference_series() {
    let latencies = [100, 150, 250, 400, 800];
    let points: Vec<_> = latencies
        .iter()
        .enumerate()
        .map(|(i, &ms)| point(i + 1, 10.0 * (i + 1) as f64, ms))
        .collect();
    let cmp = comparison(&points);

    let result = LatencyDetector::end_to_end(1.0).detect(&cmp.test_results);

    assert!(result.is_bottleneck);
    assert_eq!(result.concurrency, 2);
    assert_eq!(result.average_latency_ms, 150);
}

/// Detectors sort their own copy of the input
#[test]
fn test_detectors_ignore_input_order() {
    let points = vec![point(4, 27.0, 400), point(1, 10.0, 100), point(3, 25.0, 250), point(2, 20.0, 150)];
    let cmp = comparison(&points);
    let before = cmp.clone();

    let result = GradientDetector::new(10.0).detect(&cmp.test_results);

    assert_eq!(result.concurrency, 2);
    assert_eq!(cmp, before);
}

#[test]
fn test_detectors_handle_trivial_input() {
    let single = comparison(&[point(1, 10.0, 100)]);
    let empty = ConcurrentComparison::new();

    for cmp in [&single, &empty] {
        assert!(!GradientDetector::default().detect(&cmp.test_results).is_bottleneck);
        assert!(!StatisticalDetector::default().detect(&cmp.test_results).is_bottleneck);
        assert!(!LatencyDetector::end_to_end(1.0).detect(&cmp.test_results).is_bottleneck);
        assert!(!LatencyDetector::first_token(1.0).detect(&cmp.test_results).is_bottleneck);
        assert!(!cmp.recommended_concurrency().is_bottleneck);
    }
    assert_eq!(single.recommended_concurrency().concurrency, 1);
}

#[test]
fn test_recommender_is_deterministic() {
    let cmp = comparison(&[
        point(1, 10.0, 100),
        point(2, 19.0, 110),
        point(4, 30.0, 160),
        point(8, 31.0, 400),
    ]);
    let recommender = Recommender::new(BottleneckThresholds::default());

    let first = recommender.recommend(&cmp);
    let second = recommender.recommend(&cmp);

    assert_eq!(first, second);
    assert!(!first.reason.is_empty());
}

/// A stress sweep warms up before its first level only
#[test]
fn test_sweep_warms_up_once() {
    let sender = Arc::new(TaggedSender::default());
    let engine = engine(
        sender.clone(),
        EngineConfig {
            requests_per_worker: 3,
            duration: Duration::ZERO,
            request_interval: Duration::ZERO,
            warmup: Duration::from_millis(20),
            warmup_interval: Duration::from_millis(2),
            ..EngineConfig::default()
        },
    );
    let dataset = tagged_dataset(5);
    let mut sweep = Sweep::new(engine, RunMode::Stress);

    let mut calls_per_level = Vec::new();
    let mut last = 0;
    sweep
        .run(&[1, 2, 4], &dataset, |_, collector, _| {
            let now = sender.calls.load(Ordering::SeqCst);
            calls_per_level.push((now - last, collector.total_count()));
            last = now;
            Ok::<_, llmperf::EngineError>(())
        })
        .unwrap();

    // First level includes warmup traffic, later levels are exactly measured
    assert!(calls_per_level[0].0 > calls_per_level[0].1);
    assert_eq!(calls_per_level[1], (6, 6));
    assert_eq!(calls_per_level[2], (12, 12));
    assert!(sweep.warmup_consumed());
}

/// Full pipeline: sweep, report, and every renderer
#[test]
fn test_sweep_report_renders_all_formats() {
    let engine = engine(Arc::new(TaggedSender::default()), EngineConfig::default());
    let mut sweep = Sweep::new(engine, RunMode::Batch);
    let dataset = tagged_dataset(8);
    for level in [1, 2, 4] {
        sweep.run_level(level, &dataset).unwrap();
    }

    let report = SweepReport::build(
        ReportMeta::new("tagged", "test-model", RunMode::Batch),
        sweep.comparison(),
        &BottleneckThresholds::default(),
    );
    assert_eq!(report.test_results.len(), 3);
    assert!(report.has_first_token_data());

    let json: Value = serde_json::from_str(&OutputFormat::Json.render(&report).unwrap()).unwrap();
    assert_eq!(json["test_results"].as_array().map(Vec::len), Some(3));
    assert!(json["recommendation"]["concurrency"].is_u64());

    let csv = OutputFormat::Csv.render(&report).unwrap();
    assert_eq!(csv.lines().count(), 4);

    let human = OutputFormat::Human.render(&report).unwrap();
    assert!(human.contains("Recommended concurrency"));
}

#[test]
fn test_default_config_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("llmperf.toml");
    std::fs::write(&path, LlmPerfConfig::default_toml()).unwrap();

    let config = LlmPerfConfig::from_toml_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let engine_config = config.engine_config().unwrap();

    assert_eq!(engine_config.concurrency, 1);
    assert_eq!(engine_config.duration, Duration::from_secs(60));
    assert_eq!(engine_config.warmup, Duration::ZERO);
    assert_eq!(engine_config.result_buffer, 1000);
    assert_eq!(config.bottleneck.thresholds(), BottleneckThresholds::default());
}

#[test]
fn test_dataset_with_system_prompt_feeds_engine() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for i in 0..3 {
        writeln!(
            file,
            "{}",
            json!({"tag": format!("case-{i}"), "messages": [{"role": "user", "content": "hi"}]})
        )
        .unwrap();
    }

    let dataset = llmperf::load_dataset(file.path(), "jsonl", Some("You are terse.")).unwrap();
    assert_eq!(dataset.len(), 3);
    for case in &dataset {
        assert_eq!(case["messages"][0]["role"], "system");
        assert_eq!(case["messages"][0]["content"], "You are terse.");
        assert_eq!(case["messages"][1]["role"], "user");
    }

    let engine = engine(Arc::new(TaggedSender::default()), EngineConfig::default());
    let results = engine.run_batch(&dataset).unwrap();
    assert!(results.iter().all(|r| r.success));
}
