//! Simulation - drives a machine's timing loop
//!
//! Two tasks run in lockstep:
//! - Clock driver: one `advance(step_ticks)` per step
//! - Emulated CPU: between steps, services pending timer interrupts and
//!   plays register traffic (counter reads, compare rewrites)
//!
//! The CPU acknowledges every step before the driver moves on, so a given
//! config and seed always produce the same results.

use crate::config::MachineConfig;
use crate::machine::{Machine, MachineError};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use vtime_clock::ClockSource;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use vtime_core::Ticks;

/// Simulation results
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimulationResults {
    /// Machine name
    pub machine: String,
    /// `advance` calls completed
    pub steps: u64,
    /// Source ticks elapsed on the clock
    pub elapsed_ticks: Ticks,
    /// Interrupts raised, by timer
    pub interrupts: BTreeMap<String, u64>,
    /// Interrupts acknowledged by the CPU
    pub serviced_interrupts: u64,
    /// Compare rewrites issued by the CPU
    pub register_writes: u64,
    /// Whether the timing loop ran to completion
    pub success: bool,
    /// Error message if any
    pub error: Option<String>,
}

/// Step notification from the driver; the CPU answers on `done`
struct Step {
    index: u64,
    done: oneshot::Sender<()>,
}

#[derive(Debug, Default)]
struct CpuStats {
    serviced: u64,
    writes: u64,
}

pub struct Simulation {
    config: MachineConfig,
    machine: Arc<Machine>,
}

impl Simulation {
    pub fn new(config: MachineConfig) -> Result<Self, MachineError> {
        let machine = Arc::new(Machine::new(&config)?);
        Ok(Self { config, machine })
    }

    pub fn machine(&self) -> &Arc<Machine> {
        &self.machine
    }

    /// Advance the clock once per step, waiting for the CPU in between
    async fn run_clock(
        machine: Arc<Machine>,
        step_ticks: Ticks,
        steps: u64,
        completed: Arc<AtomicU64>,
        step_tx: mpsc::Sender<Step>,
    ) {
        info!("Clock driver started ({} ticks per step)", step_ticks);

        for index in 0..steps {
            machine.clock().advance(step_ticks);
            completed.fetch_add(1, Ordering::SeqCst);

            let (done, ack) = oneshot::channel();
            if step_tx.send(Step { index, done }).await.is_err() {
                warn!("CPU task gone, stopping at step {}", index);
                break;
            }
            if ack.await.is_err() {
                warn!("CPU dropped step {}", index);
                break;
            }
        }

        info!(
            "Clock driver stopped after {} step(s)",
            completed.load(Ordering::SeqCst)
        );
    }

    /// Service interrupts and touch timer registers after every step
    async fn run_cpu(
        machine: Arc<Machine>,
        seed: u64,
        retarget_probability: f64,
        mut step_rx: mpsc::Receiver<Step>,
    ) -> CpuStats {
        info!("CPU started (seed {})", seed);

        let mut rng = StdRng::seed_from_u64(seed);
        let mut stats = CpuStats::default();

        while let Some(step) = step_rx.recv().await {
            for timer in machine.timers() {
                if timer.hook().acknowledge() {
                    stats.serviced += 1;

                    if rng.gen_bool(retarget_probability) {
                        let compare = rng.gen_range(0..=timer.limit());
                        match timer.set_compare(compare) {
                            Ok(()) => {
                                stats.writes += 1;
                                debug!(
                                    "[CPU] step {}: {} compare -> {}",
                                    step.index,
                                    timer.hook().name(),
                                    compare
                                );
                            }
                            Err(e) => warn!("[CPU] compare write rejected: {}", e),
                        }
                    }
                }

                if let Err(e) = timer.value() {
                    warn!("[CPU] counter read failed: {}", e);
                }
            }
            let _ = step.done.send(());
        }

        info!("CPU stopped");
        stats
    }

    /// Run the full simulation
    pub async fn run(self) -> SimulationResults {
        info!(
            "Starting simulation of {}: {} step(s) of {} tick(s)",
            self.machine.name(),
            self.config.steps,
            self.config.step_ticks
        );

        let (step_tx, step_rx) = mpsc::channel(1);
        // outlives the driver task, even when a handler panics inside it
        let completed = Arc::new(AtomicU64::new(0));

        let cpu_handle = tokio::spawn(Self::run_cpu(
            self.machine.clone(),
            self.config.seed,
            self.config.retarget_probability,
            step_rx,
        ));
        let clock_handle = tokio::spawn(Self::run_clock(
            self.machine.clone(),
            self.config.step_ticks,
            self.config.steps,
            completed.clone(),
            step_tx,
        ));

        let mut results = SimulationResults {
            machine: self.machine.name().to_string(),
            ..Default::default()
        };

        // a panicking handler takes the driver down with it
        match clock_handle.await {
            Ok(()) => {
                results.success = completed.load(Ordering::SeqCst) == self.config.steps;
            }
            Err(e) => {
                warn!("Clock driver failed: {}", e);
                results.error = Some(e.to_string());
            }
        }
        results.steps = completed.load(Ordering::SeqCst);
        match cpu_handle.await {
            Ok(stats) => {
                results.serviced_interrupts = stats.serviced;
                results.register_writes = stats.writes;
            }
            Err(e) => {
                warn!("CPU task failed: {}", e);
                results.success = false;
                results.error.get_or_insert_with(|| e.to_string());
            }
        }

        results.elapsed_ticks = self.machine.clock().elapsed_ticks();
        results.interrupts = self
            .machine
            .timers()
            .iter()
            .map(|timer| (timer.hook().name().to_string(), timer.hook().raised_count()))
            .collect();

        info!(
            "Simulation finished: {} step(s), {} tick(s), {} interrupt(s) serviced",
            results.steps, results.elapsed_ticks, results.serviced_interrupts
        );

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimerConfig;

    fn config() -> MachineConfig {
        MachineConfig {
            step_ticks: 100,
            steps: 100,
            retarget_probability: 0.0,
            timers: vec![TimerConfig::new("tick", 1_000_000, 500, 1_000)],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_simulation_creation() {
        let sim = Simulation::new(config()).unwrap();

        assert_eq!(sim.machine().timers().len(), 1);
        assert_eq!(sim.machine().clock().elapsed_ticks(), 0);
    }

    #[tokio::test]
    async fn test_simulation_short_run() {
        let results = Simulation::new(config()).unwrap().run().await;

        assert!(results.success);
        assert!(results.error.is_none());
        assert_eq!(results.steps, 100);
        assert_eq!(results.elapsed_ticks, 10_000);
        // compare 500 of a 1000 cycle: matches at 500, 1500, ..., 9500
        assert_eq!(results.interrupts["tick"], 10);
        assert_eq!(results.serviced_interrupts, 10);
        assert_eq!(results.register_writes, 0);
    }

    #[tokio::test]
    async fn test_zero_steps() {
        let sim = Simulation::new(MachineConfig {
            steps: 0,
            ..config()
        })
        .unwrap();
        let results = sim.run().await;

        assert!(results.success);
        assert_eq!(results.elapsed_ticks, 0);
        assert_eq!(results.interrupts["tick"], 0);
    }
}
