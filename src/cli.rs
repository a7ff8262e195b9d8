use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use url::Url;

use crate::model::{CookieRecord, OrientationMode, SessionCommand, SessionConfig, SessionEvent};
use crate::orientation::{OrientationCenter, OrientationSink};
use crate::report::{build_session_report, SessionOutcome};
use crate::routes::RouteStore;
use crate::session::{SessionCoordinator, SessionParams};
use crate::sim::SimSurface;
use crate::storage::{FileStore, KeyValueStore, MemoryStore};

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "navshell",
    version,
    about = "Drive an embedded-surface navigation session from a script"
)]
pub struct Cli {
    /// Override the entry route (persisted for later launches)
    #[arg(long)]
    pub entry_url: Option<String>,

    /// Override the privacy route (persisted for later launches)
    #[arg(long)]
    pub privacy_url: Option<String>,

    /// Delay before a visited route is committed as the resume trail
    #[arg(long, default_value = "10s")]
    pub trail_delay: humantime::Duration,

    /// Interval between cookie mirror captures
    #[arg(long, default_value = "10s")]
    pub mirror_interval: humantime::Duration,

    /// Directory for the persistent session store
    #[arg(long)]
    pub storage_dir: Option<PathBuf>,

    /// Keep all session state in memory, never touching disk
    #[arg(long)]
    pub memory: bool,

    /// Navigation script to run (reads stdin when omitted)
    #[arg(long)]
    pub script: Option<PathBuf>,

    /// Print session events as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Clear any stored resume trail and start from the entry route
    #[arg(long)]
    pub fresh: bool,
}

/// One statement of a navigation script.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ScriptStep {
    /// User-driven navigation in the main surface.
    Goto(String),
    /// Navigation with no target frame.
    Open(String),
    /// Secondary context spawning with a first navigation.
    Popup(String),
    /// Failed navigation; the URL is the committed location, if any.
    Fail(Option<String>),
    Refresh,
    /// Plant a cookie in the surface's jar.
    Cookie(CookieRecord),
    Wait(Duration),
}

pub(crate) fn parse_script(text: &str) -> Result<Vec<ScriptStep>> {
    let mut steps = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let step = parse_step(line).with_context(|| format!("script line {}", idx + 1))?;
        steps.push(step);
    }
    Ok(steps)
}

fn parse_step(line: &str) -> Result<ScriptStep> {
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((v, r)) => (v, r.trim()),
        None => (line, ""),
    };
    match verb {
        "goto" => {
            require_arg(rest, "goto <url>")?;
            Ok(ScriptStep::Goto(rest.to_string()))
        }
        "open" => {
            require_arg(rest, "open <url>")?;
            Ok(ScriptStep::Open(rest.to_string()))
        }
        "popup" => {
            require_arg(rest, "popup <url>")?;
            Ok(ScriptStep::Popup(rest.to_string()))
        }
        "fail" => Ok(ScriptStep::Fail(if rest.is_empty() {
            None
        } else {
            Some(rest.to_string())
        })),
        "refresh" => {
            if !rest.is_empty() {
                bail!("refresh takes no argument");
            }
            Ok(ScriptStep::Refresh)
        }
        "cookie" => parse_cookie(rest).map(ScriptStep::Cookie),
        "wait" => {
            let d = humantime::parse_duration(rest)
                .with_context(|| format!("bad duration {rest:?}"))?;
            Ok(ScriptStep::Wait(d))
        }
        other => bail!("unknown statement {other:?}"),
    }
}

fn require_arg(rest: &str, usage: &str) -> Result<()> {
    if rest.is_empty() {
        bail!("missing argument, usage: {usage}");
    }
    Ok(())
}

/// `cookie <name>=<value> domain=<domain> [path=<path>] [secure] [httponly]`
fn parse_cookie(rest: &str) -> Result<CookieRecord> {
    let mut tokens = rest.split_whitespace();
    let head = tokens.next().context("cookie needs <name>=<value>")?;
    let (name, value) = head
        .split_once('=')
        .with_context(|| format!("expected <name>=<value>, got {head:?}"))?;
    let mut domain: Option<String> = None;
    let mut path = String::from("/");
    let mut secure = false;
    let mut http_only = false;
    for token in tokens {
        if let Some(d) = token.strip_prefix("domain=") {
            domain = Some(d.to_string());
        } else if let Some(p) = token.strip_prefix("path=") {
            path = p.to_string();
        } else if token == "secure" {
            secure = true;
        } else if token == "httponly" {
            http_only = true;
        } else {
            bail!("unknown cookie attribute {token:?}");
        }
    }
    Ok(CookieRecord {
        name: name.to_string(),
        value: value.to_string(),
        domain: domain.context("cookie needs domain=<domain>")?,
        path,
        secure,
        http_only,
        expires: None,
        same_site: None,
    })
}

/// Build a `SessionConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> SessionConfig {
    SessionConfig {
        trail_delay: Duration::from(args.trail_delay),
        mirror_interval: Duration::from(args.mirror_interval),
        resume: !args.fresh,
    }
}

/// Orientation sink that reports mode changes through the output writer.
struct WriterSink {
    out: mpsc::UnboundedSender<OutputLine>,
    json: bool,
    last: Mutex<Option<OrientationMode>>,
}

impl OrientationSink for WriterSink {
    fn apply(&self, mode: OrientationMode) {
        let mut last = self.last.lock().unwrap();
        if *last == Some(mode) {
            return;
        }
        *last = Some(mode);
        let line = if self.json {
            match serde_json::to_value(mode) {
                Ok(v) => {
                    OutputLine::Stdout(serde_json::json!({ "OrientationChanged": v }).to_string())
                }
                Err(_) => return,
            }
        } else {
            OutputLine::Stderr(format!("Orientation: {mode:?}"))
        };
        let _ = self.out.send(line);
    }
}

pub async fn run(args: Cli) -> Result<()> {
    if args.memory && args.storage_dir.is_some() {
        bail!("--memory and --storage-dir are mutually exclusive");
    }

    let script_text = match args.script.as_deref() {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading script {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf)
                .context("reading script from stdin")?;
            buf
        }
    };
    let steps = parse_script(&script_text)?;

    let store: Arc<dyn KeyValueStore> = if args.memory {
        Arc::new(MemoryStore::new())
    } else {
        let dir = args
            .storage_dir
            .clone()
            .unwrap_or_else(FileStore::default_dir);
        Arc::new(FileStore::open(&dir).context("opening session store")?)
    };
    let routes = Arc::new(RouteStore::open(store));
    if let Some(link) = args.entry_url.as_deref() {
        if !routes.update_entry(link) {
            bail!("--entry-url is not a valid URL: {link}");
        }
    }
    if let Some(link) = args.privacy_url.as_deref() {
        if !routes.update_privacy(link) {
            bail!("--privacy-url is not a valid URL: {link}");
        }
    }
    if args.fresh {
        routes.clear_trail()?;
    }

    run_session(args, steps, routes).await
}

async fn run_session(args: Cli, steps: Vec<ScriptStep>, routes: Arc<RouteStore>) -> Result<()> {
    let (out_tx, out_handle) = spawn_output_writer();
    let orientation = OrientationCenter::new(Arc::new(WriterSink {
        out: out_tx.clone(),
        json: args.json,
        last: Mutex::new(None),
    }));

    let (surface_tx, surface_rx) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<SessionCommand>();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let surface = SimSurface::new(surface_tx);

    let coordinator = SessionCoordinator::new(SessionParams {
        config: build_config(&args),
        routes: routes.clone(),
        orientation: orientation.clone(),
        surface: surface.clone(),
        surface_id: surface.id(),
        event_tx,
    });
    let session = tokio::spawn(coordinator.run(surface_rx, cmd_rx));

    // Script driver. Popups are parked in `opened` so their weak handles
    // stay upgradable for the rest of the run, like windows a user has not
    // closed yet.
    let driver_surface = surface.clone();
    let driver = tokio::spawn(async move {
        let mut opened = Vec::new();
        for step in steps {
            match step {
                ScriptStep::Goto(raw) => {
                    let _ = driver_surface.navigate(&raw).await;
                }
                ScriptStep::Open(raw) => {
                    let _ = driver_surface.navigate_untargeted(&raw).await;
                }
                ScriptStep::Popup(raw) => {
                    opened.push(driver_surface.open_popup(&raw).await);
                }
                ScriptStep::Fail(raw) => {
                    let committed = raw.as_deref().and_then(|r| Url::parse(r).ok());
                    driver_surface.fail(committed, "scripted failure");
                }
                ScriptStep::Refresh => {
                    let _ = cmd_tx.send(SessionCommand::Refresh);
                }
                ScriptStep::Cookie(cookie) => {
                    driver_surface.jar().insert(cookie);
                }
                ScriptStep::Wait(d) => {
                    tokio::time::sleep(d).await;
                }
            }
        }
        let _ = cmd_tx.send(SessionCommand::Shutdown);
    });

    // Consume session events until the coordinator is gone.
    let mut outcome = SessionOutcome::new(&routes);
    while let Some(ev) = event_rx.recv().await {
        outcome.absorb(&ev);
        if args.json {
            if let Ok(line) = serde_json::to_string(&ev) {
                let _ = out_tx.send(OutputLine::Stdout(line));
            }
            continue;
        }
        let line = match &ev {
            SessionEvent::Ready => "Surface ready".to_string(),
            SessionEvent::NavStarted => "== Loading ==".to_string(),
            SessionEvent::NavLoaded { url } => match url {
                Some(u) => format!("Loaded: {u}"),
                None => "Loaded (no URL reported)".to_string(),
            },
            SessionEvent::NavFailed { url, error } => match url {
                Some(u) => format!("Failed at {u}: {error}"),
                None => format!("Failed: {error}"),
            },
            SessionEvent::IntentDecided { url, decision } => match url {
                Some(u) => format!("Intent {u} -> {decision:?}"),
                None => format!("Intent (unparseable) -> {decision:?}"),
            },
            SessionEvent::TrailStored { url } => format!("Trail stored: {url}"),
            SessionEvent::SnapshotStored { host, count } => {
                format!("Mirrored {count} cookie(s) for {host:?}")
            }
        };
        let _ = out_tx.send(OutputLine::Stderr(line));
    }

    session.await??;
    driver.await?;

    outcome.finalize(&routes, orientation.current_mode());
    if args.json {
        let _ = out_tx.send(OutputLine::Stdout(serde_json::to_string_pretty(&outcome)?));
    } else {
        for line in build_session_report(&outcome) {
            let _ = out_tx.send(OutputLine::Stdout(line));
        }
    }

    // The sink inside the orientation center holds its own sender clone;
    // both have to go before the writer can drain and exit.
    drop(orientation);
    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}
