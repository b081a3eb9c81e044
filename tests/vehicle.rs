//! Drive loop behaviour with scripted parts.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use donkey_car::error::{PartError, VehicleError};
use donkey_car::vehicle::{Part, StopReason, Vehicle, Wiring};
use donkey_car::Value;

/// Emits 1, 2, 3, ... and counts shutdowns.
struct Counter {
    name: &'static str,
    count: i64,
    shutdowns: Arc<AtomicU32>,
}

impl Counter {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            count: 0,
            shutdowns: Arc::new(AtomicU32::new(0)),
        }
    }
}

#[async_trait]
impl Part for Counter {
    fn name(&self) -> &str {
        self.name
    }

    async fn run(&mut self, _inputs: &[Value]) -> Result<Vec<Value>, PartError> {
        self.count += 1;
        Ok(vec![Value::Int(self.count)])
    }

    async fn shutdown(&mut self) -> Result<(), PartError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Returns a fixed list of values every tick.
struct Constant(Vec<Value>);

#[async_trait]
impl Part for Constant {
    fn name(&self) -> &str {
        "constant"
    }

    async fn run(&mut self, _inputs: &[Value]) -> Result<Vec<Value>, PartError> {
        Ok(self.0.clone())
    }
}

/// Fails on the given run.
struct FailsOn(u32, u32);

#[async_trait]
impl Part for FailsOn {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn run(&mut self, _inputs: &[Value]) -> Result<Vec<Value>, PartError> {
        self.1 += 1;
        if self.1 == self.0 {
            return Err(PartError::Background("sensor unplugged".into()));
        }
        Ok(vec![])
    }
}

/// Records whether `start` was called.
struct Background(Arc<AtomicBool>);

#[async_trait]
impl Part for Background {
    fn name(&self) -> &str {
        "background"
    }

    async fn start(&mut self) -> Result<(), PartError> {
        self.0.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn run(&mut self, _inputs: &[Value]) -> Result<Vec<Value>, PartError> {
        Ok(vec![Value::Bool(self.0.load(Ordering::SeqCst))])
    }
}

/// Doubles its input.
struct Double;

#[async_trait]
impl Part for Double {
    fn name(&self) -> &str {
        "double"
    }

    async fn run(&mut self, inputs: &[Value]) -> Result<Vec<Value>, PartError> {
        let n = match inputs.first() {
            Some(Value::Int(n)) => *n,
            _ => return Err(PartError::InputType("count")),
        };
        Ok(vec![Value::Int(n * 2)])
    }
}

#[tokio::test]
async fn test_stops_after_max_loop_count() {
    let mut v = Vehicle::new();
    let counter = Counter::new("counter");
    let shutdowns = counter.shutdowns.clone();
    v.add(counter, Wiring::new().outputs(&["count"]));
    v.add(Double, Wiring::new().inputs(&["count"]).outputs(&["doubled"]));

    let summary = v.start(200, Some(5)).await.unwrap();

    assert_eq!(summary.ticks, 5);
    assert_eq!(summary.reason, StopReason::LoopCountReached);
    assert_eq!(summary.stats.tick_count, 5);
    assert_eq!(v.memory().get_one("count"), Value::Int(5));
    assert_eq!(v.memory().get_one("doubled"), Value::Int(10));
    assert_eq!(v.part_stats("counter").unwrap().execution_count, 5);
    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_parts_run_in_declaration_order() {
    let mut v = Vehicle::new();
    v.add(Counter::new("first"), Wiring::new().outputs(&["count"]));
    v.add(Double, Wiring::new().inputs(&["count"]).outputs(&["doubled"]));

    v.update_parts().await.unwrap();
    assert_eq!(v.memory().get_one("doubled"), Value::Int(2));
    assert_eq!(v.part_names(), vec!["first", "double"]);
}

#[tokio::test]
async fn test_run_condition_gates_part() {
    let mut v = Vehicle::new();
    v.add(Constant(vec![Value::Bool(false)]), Wiring::new().outputs(&["run_pilot"]));
    v.add(
        Counter::new("gated"),
        Wiring::new().outputs(&["count"]).run_condition("run_pilot"),
    );
    v.add(
        Counter::new("unset_condition"),
        Wiring::new().outputs(&["other"]).run_condition("never_written"),
    );

    v.start(200, Some(3)).await.unwrap();

    assert!(v.memory().get_one("count").is_null());
    assert!(v.memory().get_one("other").is_null());
    let stats = v.part_stats("gated").unwrap();
    assert_eq!(stats.execution_count, 0);
    assert_eq!(stats.skipped_count, 3);
}

#[tokio::test]
async fn test_run_condition_true_runs_part() {
    let mut v = Vehicle::new();
    v.add(Constant(vec![Value::Bool(true)]), Wiring::new().outputs(&["run_pilot"]));
    v.add(
        Counter::new("gated"),
        Wiring::new().outputs(&["count"]).run_condition("run_pilot"),
    );

    v.start(200, Some(3)).await.unwrap();
    assert_eq!(v.memory().get_one("count"), Value::Int(3));
}

#[tokio::test]
async fn test_part_error_stops_loop_and_shuts_down() {
    let mut v = Vehicle::new();
    let counter = Counter::new("counter");
    let shutdowns = counter.shutdowns.clone();
    v.add(counter, Wiring::new().outputs(&["count"]));
    v.add(FailsOn(3, 0), Wiring::new());

    let err = v.start(200, Some(10)).await.unwrap_err();
    match err {
        VehicleError::Part { part, .. } => assert_eq!(part, "flaky"),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(v.memory().get_one("count"), Value::Int(3));
    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_output_count_mismatch_is_an_error() {
    let mut v = Vehicle::new();
    v.add(
        Constant(vec![Value::Float(0.1)]),
        Wiring::new().outputs(&["angle", "throttle"]),
    );

    let err = v.start(200, Some(1)).await.unwrap_err();
    assert!(matches!(
        err,
        VehicleError::OutputMismatch { expected: 2, actual: 1, .. }
    ));
}

#[tokio::test]
async fn test_threaded_parts_started_before_first_tick() {
    let mut v = Vehicle::new();
    let started = Arc::new(AtomicBool::new(false));
    v.add(Background(started.clone()), Wiring::new().outputs(&["ready"]).threaded());

    v.start(200, Some(1)).await.unwrap();
    assert!(started.load(Ordering::SeqCst));
    assert_eq!(v.memory().get_one("ready"), Value::Bool(true));
}

#[tokio::test]
async fn test_unthreaded_parts_are_not_started() {
    let mut v = Vehicle::new();
    let started = Arc::new(AtomicBool::new(false));
    v.add(Background(started.clone()), Wiring::new().outputs(&["ready"]));

    v.start(200, Some(1)).await.unwrap();
    assert!(!started.load(Ordering::SeqCst));
}

/// Takes longer than a 100 Hz tick.
struct Slow;

#[async_trait]
impl Part for Slow {
    fn name(&self) -> &str {
        "slow"
    }

    async fn run(&mut self, _inputs: &[Value]) -> Result<Vec<Value>, PartError> {
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        Ok(vec![])
    }
}

#[tokio::test]
async fn test_slow_ticks_count_as_late_and_jittery() {
    let mut v = Vehicle::new();
    v.add(Slow, Wiring::new());

    let summary = v.start(100, Some(3)).await.unwrap();
    assert_eq!(summary.stats.late_ticks, 3);
    assert_eq!(summary.stats.jitter_violations, 2);
    assert!(v.part_stats("slow").unwrap().overruns >= 1);
}

#[tokio::test]
async fn test_invalid_start_arguments() {
    let mut v = Vehicle::new();
    assert!(matches!(v.start(20, Some(1)).await, Err(VehicleError::NoParts)));

    v.add(Counter::new("counter"), Wiring::new());
    assert!(matches!(v.start(0, Some(1)).await, Err(VehicleError::InvalidRate(0))));
    assert!(matches!(v.start(5000, Some(1)).await, Err(VehicleError::InvalidRate(5000))));
}
