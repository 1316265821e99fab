mod source;

use agent::{AgentConfig, AgentError, AgentState, Action, Status};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use sim::{SimDevice, SimParams};
use sink::{dispatch, ActionSink, EventJournal, LogSink, WriterSink};
use source::{JsonlSource, ReadingSource};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone, Debug, ValueEnum)]
enum Scenario {
    /// No fault injected.
    Steady,
    /// Fault injected at `--fault-at` and never cleared.
    Overheat,
    /// Fault injected at `--fault-at`, cleared at `--fault-clear-at`.
    HeatThenCool,
}

#[derive(Parser, Debug)]
#[command(
    name = "thermal-guard",
    version,
    about = "Adaptive overheat detection over a live or simulated sensor stream"
)]
struct Args {
    #[arg(value_enum, long, default_value = "overheat")]
    scenario: Scenario,

    /// Maximum number of ticks to run
    #[arg(long, default_value_t = 120)]
    ticks: u64,

    /// Tick at which the simulated fault is injected
    #[arg(long, default_value_t = 40)]
    fault_at: u64,

    /// Tick at which the simulated fault is cleared (heat-then-cool)
    #[arg(long, default_value_t = 80)]
    fault_clear_at: u64,

    /// RNG seed for deterministic runs
    #[arg(long, default_value_t = 12345)]
    seed: u64,

    /// Sleep between ticks in milliseconds
    #[arg(long, default_value_t = 0)]
    tick_ms: u64,

    /// Replay readings from a JSONL file instead of simulating
    #[arg(long)]
    input: Option<PathBuf>,

    /// Write actions to this file, one command per line, instead of logging them
    #[arg(long)]
    commands: Option<PathBuf>,

    /// Readings averaged into the baseline
    #[arg(long, default_value_t = 20)]
    calibration_target: usize,

    /// Hard safety limit (°C)
    #[arg(long, default_value_t = 80.0)]
    hard_limit: f64,

    /// Soft threshold = baseline * multiplier
    #[arg(long, default_value_t = 1.2)]
    threshold_multiplier: f64,

    /// Monitoring samples kept for trend detection
    #[arg(long, default_value_t = 20)]
    history_capacity: usize,

    /// Strictly increasing samples that make a trend
    #[arg(long, default_value_t = 5)]
    trend_window: usize,

    /// Trend only counts above baseline + margin (°C)
    #[arg(long, default_value_t = 5.0)]
    trend_margin: f64,
}

#[derive(serde::Serialize)]
struct TraceRow<'a> {
    tick: u64,
    temperature: f64,
    voltage: f64,
    current: f64,
    status: Status,
    actions: &'a [Action],
    reason: &'a str,
}

#[derive(Debug, Default)]
struct Summary {
    ticks: u64,
    skipped: u64,
    warnings: u64,
    faults: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let cfg = AgentConfig {
        calibration_target: args.calibration_target,
        history_capacity: args.history_capacity,
        trend_window: args.trend_window,
        threshold_multiplier: args.threshold_multiplier,
        trend_margin: args.trend_margin,
        hard_limit_temp: args.hard_limit,
    };
    let mut agent = AgentState::new(cfg).context("refusing to start")?;

    let mut out: Box<dyn ActionSink> = match &args.commands {
        Some(path) => {
            let f = File::create(path)
                .with_context(|| format!("creating command file {}", path.display()))?;
            Box::new(WriterSink::new(f))
        }
        None => Box::new(LogSink),
    };

    let mut journal = EventJournal::new(100);
    let mut summary = Summary::default();

    match &args.input {
        Some(path) => {
            let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            tracing::info!(input = %path.display(), "replaying readings");
            let mut src = JsonlSource::new(BufReader::new(f));
            run(&args, &mut src, &mut agent, out.as_mut(), &mut journal, &mut summary, |_, _| {})?;
        }
        None => {
            tracing::info!(scenario = ?args.scenario, seed = args.seed, "simulation mode");
            let mut dev = SimDevice::new(SimParams::default(), args.seed);
            let scenario = args.scenario.clone();
            let (fault_at, clear_at) = (args.fault_at, args.fault_clear_at);
            run(
                &args,
                &mut dev,
                &mut agent,
                out.as_mut(),
                &mut journal,
                &mut summary,
                |dev, tick| apply_scenario(&scenario, dev, tick, fault_at, clear_at),
            )?;
        }
    }

    tracing::info!(
        ticks = summary.ticks,
        skipped = summary.skipped,
        warnings = summary.warnings,
        faults = summary.faults,
        events = journal.event_count(),
        "session finished"
    );
    for e in journal.recent_events(5) {
        tracing::info!(id = e.id, tick = e.tick, status = %e.status, "recent event: {}", e.message);
    }

    Ok(())
}

/// Driver loop: one reading, one decision, per tick.
fn run<S: ReadingSource>(
    args: &Args,
    src: &mut S,
    agent: &mut AgentState,
    out: &mut dyn ActionSink,
    journal: &mut EventJournal,
    summary: &mut Summary,
    mut before_tick: impl FnMut(&mut S, u64),
) -> Result<()> {
    let pause = Duration::from_millis(args.tick_ms);

    for tick in 0..args.ticks {
        before_tick(src, tick);

        let Some(reading) = src.next_reading()? else {
            break;
        };
        summary.ticks += 1;
        journal.record_reading(tick, &reading);

        let decision = match agent.analyze(&reading) {
            Ok(d) => d,
            Err(e @ AgentError::InvalidReading(_)) => {
                tracing::warn!(tick, error = %e, "skipping tick");
                summary.skipped += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        dispatch(out, &decision).context("sending actions")?;
        journal.record_decision(tick, &decision);

        match decision.status {
            Status::Warning => summary.warnings += 1,
            Status::Fault => summary.faults += 1,
            Status::Learning | Status::Normal => {}
        }

        let row = TraceRow {
            tick,
            temperature: reading.temperature,
            voltage: reading.voltage,
            current: reading.current,
            status: decision.status,
            actions: &decision.actions,
            reason: &decision.reason,
        };
        println!("{}", serde_json::to_string(&row)?);

        if !pause.is_zero() {
            std::thread::sleep(pause);
        }
    }

    Ok(())
}

fn apply_scenario(s: &Scenario, dev: &mut SimDevice, tick: u64, fault_at: u64, clear_at: u64) {
    let want = match s {
        Scenario::Steady => false,
        Scenario::Overheat => tick >= fault_at,
        Scenario::HeatThenCool => tick >= fault_at && tick < clear_at,
    };
    if want != dev.fault_active() {
        let active = dev.inject_fault();
        tracing::info!(tick, active, "simulated fault toggled");
    }
}
