use futures::executor::block_on;
use std::io::Read;
use std::time::Duration;
use topoview_core::{Dashboard, DashboardConfig, ReplayTransport, Session, TickReport};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Core(topoview_core::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Core(err) => write!(f, "{err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<topoview_core::Error> for CliError {
    fn from(value: topoview_core::Error) -> Self {
        Self::Core(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Clone, Copy, Default)]
enum Command {
    #[default]
    Replay,
    Requests,
}

#[derive(Debug, Default)]
struct Args {
    command: Command,
    pretty: bool,
    config: Option<String>,
    settle: usize,
    input: Option<String>,
}

fn usage() -> &'static str {
    "topoview-cli\n\
\n\
USAGE:\n\
  topoview-cli [replay] [--pretty] [--config <json>] [--settle <n>] [<path>|-]\n\
  topoview-cli requests [--pretty] [--config <json>] [--settle <n>] [<path>|-]\n\
\n\
NOTES:\n\
  - If <path> is omitted or '-', the recorded session is read from stdin.\n\
  - A session is {\"polls\": [...], \"responses\": {\"<path>\": <json>}}.\n\
  - replay prints the final topology snapshot; requests prints every controller request made.\n\
  - --config takes a JSON object of dashboard settings merged over the defaults.\n\
  - --settle sets how many extra ticks run after the last poll (default 2).\n\
  - Set RUST_LOG (e.g. RUST_LOG=topoview_core=debug) for diagnostics on stderr.\n\
"
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args {
        settle: 2,
        ..Default::default()
    };

    let mut it = argv.iter().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "replay" => args.command = Command::Replay,
            "requests" => args.command = Command::Requests,
            "--pretty" => args.pretty = true,
            "--config" => {
                let Some(config) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.config = Some(config.clone());
            }
            "--settle" => {
                let Some(n) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.settle = n.parse::<usize>().map_err(|_| CliError::Usage(usage()))?;
            }
            other if other.starts_with("--") => return Err(CliError::Usage(usage())),
            other => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some(other.to_string());
            }
        }
    }

    Ok(args)
}

fn read_input(input: Option<&str>) -> Result<String, CliError> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        Some(path) => Ok(std::fs::read_to_string(path)?),
    }
}

fn log_tick(now: Duration, report: &TickReport) {
    if let Some(err) = &report.poll_error {
        tracing::warn!(now_ms = now.as_millis() as u64, %err, "replayed poll failed");
    }
    tracing::debug!(
        now_ms = now.as_millis() as u64,
        polled = report.polled,
        applied = ?report.applied,
        side_applied = report.side_applied,
        side_stale = report.side_stale,
        side_failed = report.side_failed,
        "tick"
    );
}

/// Replays every recorded poll one interval apart, then lets queued side requests settle with
/// polling stopped.
fn replay(config: DashboardConfig, session: Session, settle: usize) -> Dashboard<ReplayTransport> {
    let interval = config.poll_interval();
    let retry = config.port_retry().max(interval);
    let mut dashboard = Dashboard::new(config, ReplayTransport::new(session));

    let mut now = Duration::ZERO;
    dashboard.start(now);
    loop {
        let report = block_on(dashboard.tick(now));
        log_tick(now, &report);
        if dashboard.transport().remaining_polls() == 0 {
            break;
        }
        now += interval;
    }

    dashboard.handle().cancel();
    for _ in 0..settle {
        if dashboard.outbox().is_empty() {
            break;
        }
        now += retry;
        let report = block_on(dashboard.tick(now));
        log_tick(now, &report);
    }

    tracing::info!(
        polls_ok = dashboard.sync().polls_ok(),
        polls_failed = dashboard.sync().polls_failed(),
        nodes = dashboard.graph().node_count(),
        links = dashboard.graph().link_count(),
        "replay finished"
    );
    dashboard
}

fn run(args: Args) -> Result<(), CliError> {
    let config = match args.config.as_deref() {
        Some(text) => DashboardConfig::from_json_str(text)?,
        None => DashboardConfig::default(),
    };
    let text = read_input(args.input.as_deref())?;
    let session: Session = serde_json::from_str(&text)?;

    let dashboard = replay(config, session, args.settle);
    let out = match args.command {
        Command::Replay => serde_json::to_value(dashboard.snapshot())?,
        Command::Requests => serde_json::to_value(dashboard.transport().sent())?,
    };

    let text = if args.pretty {
        serde_json::to_string_pretty(&out)?
    } else {
        serde_json::to_string(&out)?
    };
    println!("{text}");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    init_tracing();
    if let Err(err) = run(args) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
