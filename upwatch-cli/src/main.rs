use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use upwatch_engine::{FleetSnapshot, Monitor, Output, Status};

mod duration;
mod export;
mod platform;
mod settings;

use duration::format_duration;
use platform::{Appearance, ConsoleIcon, ConsoleNotifier};
use settings::{RunPlan, Settings};

#[derive(Parser, Debug)]
#[command(name = "upwatch")]
#[command(about = "Simulated uptime monitoring for a fleet of servers, services and VMs")]
struct Args {
    /// Path to a TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of simulated servers (1-8)
    #[arg(long)]
    servers: Option<usize>,

    /// Number of simulated services (0-12)
    #[arg(long)]
    services: Option<usize>,

    /// Number of simulated virtual machines (0-6)
    #[arg(long)]
    vms: Option<usize>,

    /// Disable simulated telemetry
    #[arg(long)]
    no_simulation: bool,

    /// Take a random server and everything it hosts offline
    #[arg(long)]
    downtime: bool,

    /// Keep one entity per category in Warning, rotating periodically
    #[arg(long)]
    warnings: bool,

    /// Cycle through random failure and recovery scenarios
    #[arg(long)]
    deep_test: bool,

    /// Probe this machine's network latency
    #[arg(short, long)]
    device: bool,

    /// URL the device probe requests
    #[arg(long)]
    probe_url: Option<String>,

    /// Telemetry tick interval (e.g., "2s", "500ms")
    #[arg(short, long)]
    tick: Option<String>,

    /// Stop after this long (e.g., "30s", "5m"); runs until Ctrl-C otherwise
    #[arg(short, long)]
    run_for: Option<String>,

    /// Write every tick's snapshot to this JSON file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Export the final state to a JSON file on exit
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Print a debug report on exit
    #[arg(long)]
    report: bool,

    /// Seed for reproducible simulations
    #[arg(long)]
    seed: Option<u64>,

    /// Always use the default app icon
    #[arg(long)]
    no_dynamic_icon: bool,
}

impl Args {
    /// Overlay command-line flags onto loaded settings.
    fn apply(&self, settings: &mut Settings) {
        if let Some(servers) = self.servers {
            settings.servers = servers;
        }
        if let Some(services) = self.services {
            settings.services = services;
        }
        if let Some(vms) = self.vms {
            settings.vms = vms;
        }
        if self.no_simulation {
            settings.simulation = false;
        }
        settings.simulate_downtime |= self.downtime;
        settings.simulate_warnings |= self.warnings;
        settings.deep_test |= self.deep_test;
        settings.device_monitoring |= self.device;
        if self.no_dynamic_icon {
            settings.dynamic_icon = false;
        }
        if let Some(url) = &self.probe_url {
            settings.probe_url = url.clone();
        }
        if let Some(tick) = &self.tick {
            settings.tick_interval = tick.clone();
        }
        if let Some(run_for) = &self.run_for {
            settings.run_for = Some(run_for.clone());
        }
        if let Some(output) = &self.output {
            settings.output = Some(output.clone());
        }
        if let Some(export) = &self.export {
            settings.export = Some(export.clone());
        }
        if self.seed.is_some() {
            settings.seed = self.seed;
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("upwatch=info,upwatch_engine=info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let mut settings = Settings::load(args.config.as_deref())?;
    args.apply(&mut settings);
    let plan = settings.resolve()?;

    let appearance = if plan.monitor.dynamic_icon {
        Appearance::detect()
    } else {
        Appearance::Light
    };

    // Build a tokio runtime for the monitor's timers and probe
    let rt = tokio::runtime::Runtime::new()?;
    let monitor = rt.block_on(run(&plan, appearance))?;

    if let Some(path) = &plan.export {
        export::export_to_file(&monitor, path)?;
    }
    if args.report {
        print!("{}", monitor.debug_report());
    }
    Ok(())
}

/// Build the monitor, apply the requested scenarios and follow updates
/// until the run time elapses or Ctrl-C.
async fn run(plan: &RunPlan, appearance: Appearance) -> Result<Monitor> {
    let mut builder = Monitor::builder()
        .config(plan.monitor.clone())
        .notifier(Arc::new(ConsoleNotifier))
        .icon_selector(Arc::new(ConsoleIcon::new(appearance)));
    if let Some(path) = &plan.output {
        builder = builder.output(Output::file(path));
    }
    if let Some(seed) = plan.seed {
        builder = builder.seed(seed);
    }
    let monitor = builder.build();

    tracing::info!(
        servers = plan.monitor.counts.servers,
        services = plan.monitor.counts.services,
        vms = plan.monitor.counts.virtual_machines,
        tick = %format_duration(plan.monitor.tick_interval),
        "starting monitor"
    );

    let mut updates = monitor.subscribe();
    monitor.start();
    if plan.device_monitoring {
        monitor.start_device_monitoring();
    }
    if plan.simulate_downtime {
        monitor.set_simulate_downtime(true);
    }
    if plan.simulate_warnings {
        monitor.set_simulate_warnings(true);
    }
    if plan.deep_test {
        monitor.start_deep_test();
    }

    let deadline = plan.run_for;
    let stop = async move {
        match deadline {
            Some(after) => tokio::time::sleep(after).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(stop);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut last = None;
    println!("{}", summary_line(&updates.borrow_and_update()));
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                if last != Some(snapshot.overall) {
                    println!("{}", summary_line(&snapshot));
                    last = Some(snapshot.overall);
                } else {
                    tracing::debug!("{}", summary_line(&snapshot));
                }
            }
            _ = &mut stop => {
                tracing::info!("run time elapsed");
                break;
            }
            _ = &mut ctrl_c => {
                tracing::info!("interrupted");
                break;
            }
        }
    }

    monitor.shutdown();
    monitor.emit_now().await;
    Ok(monitor)
}

/// One-line fleet summary, e.g. `[OK] Online 23.4 ms | OK 6 WARN 0 DOWN 0`.
fn summary_line(snapshot: &FleetSnapshot) -> String {
    let counts: Vec<String> = Status::ALL
        .iter()
        .map(|s| format!("{} {}", s.symbol(), snapshot.count_by_status(*s)))
        .collect();
    let mut line = format!(
        "[{}] {} {:.1} ms | {}",
        snapshot.overall.symbol(),
        snapshot.overall,
        snapshot.weighted_latency,
        counts.join(" ")
    );
    if let Some(progress) = snapshot.deep_test_progress {
        line.push_str(&format!(" | deep test {:.0}%", progress * 100.0));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_override_settings() {
        let args = Args::parse_from([
            "upwatch",
            "--servers",
            "4",
            "--warnings",
            "--tick",
            "1s",
            "--no-dynamic-icon",
        ]);
        let mut settings = Settings::default();
        args.apply(&mut settings);

        assert_eq!(settings.servers, 4);
        assert!(settings.simulate_warnings);
        assert!(!settings.simulate_downtime);
        assert_eq!(settings.tick_interval, "1s");
        assert!(!settings.dynamic_icon);
    }

    #[test]
    fn absent_flags_keep_settings() {
        let args = Args::parse_from(["upwatch"]);
        let mut settings = Settings {
            simulate_downtime: true,
            vms: 5,
            ..Settings::default()
        };
        args.apply(&mut settings);

        assert!(settings.simulate_downtime);
        assert_eq!(settings.vms, 5);
        assert!(settings.simulation);
    }

    #[test]
    fn summary_line_reports_counts() {
        let line = summary_line(&FleetSnapshot::default());
        assert_eq!(line, "[OK] Online 0.0 ms | OK 0 WARN 0 DOWN 0");
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_after_run_for() {
        let mut settings = Settings {
            run_for: Some("5s".to_string()),
            seed: Some(1),
            ..Settings::default()
        };
        settings.simulate_downtime = true;
        let plan = settings.resolve().unwrap();

        let monitor = run(&plan, Appearance::Dark).await.unwrap();

        assert!(!monitor.is_running());
        assert_eq!(monitor.overall_status(), Status::Offline);
    }
}
