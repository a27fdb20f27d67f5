/*!
 * Scheduler Demo - Main Entry Point
 *
 * Drives a process manager for a couple of seconds of simulated frames:
 * - Chained processes on the main queue
 * - A threaded process handing a child back to the main thread
 * - A process on the animation thread
 */

use reverie_scheduler::{
    init_tracing, DedicatedThreadType, Process, ProcessBehavior, ProcessControl, ProcessFn,
    ProcessManager, ProcessResult, SchedulerConfig,
};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const FRAME_TIME: Duration = Duration::from_millis(16);
const MAX_FRAMES: u32 = 180;

/// Succeeds once its timer runs out
struct Countdown {
    label: &'static str,
    remaining: f64,
}

impl ProcessBehavior for Countdown {
    fn on_update(&mut self, ctl: &ProcessControl, delta_seconds: f64) -> ProcessResult<()> {
        self.remaining -= delta_seconds;
        if self.remaining <= 0.0 {
            ctl.succeed();
        }
        Ok(())
    }

    fn on_success(&mut self, ctl: &ProcessControl) {
        info!(process = %ctl.id(), label = self.label, "countdown finished");
    }
}

fn load_config() -> miette::Result<SchedulerConfig> {
    match std::env::var("SCHEDULER_CONFIG") {
        Ok(path) => {
            info!(path = %path, "Loading scheduler configuration");
            Ok(SchedulerConfig::from_file(path)?)
        }
        Err(_) => Ok(SchedulerConfig::default()),
    }
}

fn main() -> miette::Result<()> {
    init_tracing();

    info!("Scheduler demo starting...");
    let config = load_config()?;
    let mut manager = ProcessManager::builder()
        .with_config(config)
        .with_sorting_layer("gameplay")
        .with_sorting_layer("ui")
        .build()?;
    let ui = manager
        .main_queue()
        .sorting_layers()
        .id_of("ui")
        .unwrap_or_default();

    // Main queue: intro, then outro once intro succeeds
    let intro = Process::queued("intro", Countdown { label: "intro", remaining: 0.5 })
        .on_sorting_layer(ui)
        .then(Process::queued("outro", Countdown { label: "outro", remaining: 0.5 }));
    manager.attach_process(intro, true)?;

    // Worker pool: a background job whose follow-up runs on the main thread
    let mut checksum: u64 = 0;
    let mut rounds = 0;
    let job = Process::threaded(
        "checksum",
        ProcessFn::new(move |ctl, _| {
            checksum = (0..10_000u64).fold(checksum, |acc, x| acc.wrapping_mul(31).wrapping_add(x));
            rounds += 1;
            if rounds == 50 {
                info!(checksum, "background checksum done");
                ctl.succeed();
            }
            Ok(())
        }),
    )
    .then(Process::queued("report", Countdown { label: "report", remaining: 0.0 }));
    manager.attach_process(job, false)?;

    // Animation thread
    if manager.dedicated_thread(DedicatedThreadType::Animation).is_some() {
        manager.attach_to_thread(
            DedicatedThreadType::Animation,
            Process::queued("blend", Countdown { label: "blend", remaining: 1.0 }),
            false,
        )?;
    }

    let mut last_frame = Instant::now();
    for frame in 0..MAX_FRAMES {
        thread::sleep(FRAME_TIME);
        let now = Instant::now();
        let delta_seconds = now.duration_since(last_frame).as_secs_f64();
        last_frame = now;

        manager.tick(delta_seconds)?;
        for id in manager.reclaim_finished_processes() {
            debug!(process = %id, "worker process reclaimed");
        }

        let stats = manager.stats();
        if stats.total_processes() == 0 {
            info!(frame, "All processes finished");
            break;
        }
    }

    let stats = manager.stats();
    info!(
        stats = %serde_json::to_string(&stats).unwrap_or_default(),
        "Final scheduler stats"
    );
    manager.shutdown()?;
    info!("Scheduler demo finished");
    Ok(())
}
