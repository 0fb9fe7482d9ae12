//! Machine Simulation Integration Test
//!
//! Tests the full timing loop with:
//! - Config loaded from JSON (file and string)
//! - Timers at integral and fractional clock ratios
//! - Emulated CPU register traffic driven by a seed

use std::sync::Arc;
use vtime_clock::ClockSource;
use vtime_core::{ClockEntry, ClockHandler};
use vtime_runner::{ConfigError, MachineConfig, Simulation, TimerConfig};

fn traffic_config(seed: u64) -> MachineConfig {
    MachineConfig {
        name: "traffic".to_string(),
        clock_frequency_hz: 12_000_000,
        step_ticks: 997,
        steps: 400,
        seed,
        retarget_probability: 0.5,
        timers: vec![
            TimerConfig::new("fast", 12_000_000, 300, 1_000),
            TimerConfig::new("slow", 4_000_000, 50, 400),
            TimerConfig::new("odd", 7_000_000, 111, 999),
        ],
    }
}

/// Same config and seed => same run
#[tokio::test]
async fn test_seeded_runs_are_reproducible() {
    let _ = env_logger::try_init();

    let first = Simulation::new(traffic_config(42)).unwrap().run().await;
    let second = Simulation::new(traffic_config(42)).unwrap().run().await;

    assert!(first.success);
    assert_eq!(first, second);
    assert!(first.register_writes > 0, "CPU should have moved some compares");
    assert_eq!(first.elapsed_ticks, 400 * 997);
}

/// Every raised interrupt is eventually serviced by the CPU
#[tokio::test]
async fn test_interrupts_are_serviced() {
    let _ = env_logger::try_init();

    let results = Simulation::new(traffic_config(7)).unwrap().run().await;
    let raised: u64 = results.interrupts.values().sum();

    // one step is shorter than any timer's cycle, so at most one raise per
    // timer is pending when the CPU looks
    assert!(raised > 0);
    assert_eq!(results.serviced_interrupts, raised);
}

/// Timers never leave their bounds after a run with heavy traffic
#[tokio::test]
async fn test_registers_stay_in_bounds() {
    let _ = env_logger::try_init();

    let sim = Simulation::new(traffic_config(3)).unwrap();
    let machine = sim.machine().clone();
    let results = sim.run().await;
    assert!(results.success);

    for timer in machine.timers() {
        assert!(timer.compare() <= timer.limit());
        assert!(timer.value().unwrap() <= timer.limit());
    }
}

/// Config round-trips through a JSON file
#[tokio::test]
async fn test_config_from_file() {
    let _ = env_logger::try_init();

    let path = std::env::temp_dir().join(format!("vtime-machine-{}.json", std::process::id()));
    let config = traffic_config(11);
    std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

    let loaded = MachineConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(loaded, config);

    let results = Simulation::new(loaded).unwrap().run().await;
    assert!(results.success);
    assert_eq!(results.interrupts.len(), 3);
}

#[test]
fn test_invalid_config_file() {
    let path = std::env::temp_dir().join(format!("vtime-invalid-{}.json", std::process::id()));
    std::fs::write(
        &path,
        r#"{ "timers": [{ "name": "t", "frequency_hz": 1000, "compare": 9, "limit": 8 }] }"#,
    )
    .unwrap();

    let err = MachineConfig::from_file(&path).unwrap_err();
    std::fs::remove_file(&path).unwrap();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

/// A panicking device fails the run but the machine stays usable
#[tokio::test]
async fn test_panicking_handler_fails_run() {
    let _ = env_logger::try_init();

    let config = MachineConfig {
        step_ticks: 10,
        steps: 50,
        retarget_probability: 0.0,
        timers: vec![TimerConfig::new("tick", 1_000_000, 5, 20)],
        ..Default::default()
    };
    let sim = Simulation::new(config).unwrap();
    let machine = sim.machine().clone();

    let source = machine.obtain_clock_source();
    let faulty = ClockHandler::new(|| panic!("device fault"));
    let faulty_id = faulty.id();
    source
        .add_clock_entry(ClockEntry::one_shot(95, faulty))
        .unwrap();

    let results = sim.run().await;
    assert!(!results.success);
    assert!(results.error.is_some());
    // nine steps finished before the tenth one hit the fault
    assert_eq!(results.steps, 9);
    assert_eq!(results.elapsed_ticks, 100);

    // clock and timer keep working once the faulty device is gone
    source.remove_clock_entry(faulty_id).unwrap();
    let tick = Arc::clone(machine.timer("tick").unwrap());
    let before = tick.hook().raised_count();
    machine.clock().advance(20);
    assert_eq!(tick.hook().raised_count(), before + 1);
}
