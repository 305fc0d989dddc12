//! `menubridge` smoke-test binary.
//!
//! Connects to the session bus and drives a [`BridgeSupervisor`] either from
//! window ids on the command line or from lifecycle lines on stdin.

mod lines;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use menubridge::{BridgeConfig, BridgeSupervisor, EntryEvent, EntryState, MenuObjectPath, WindowEvent, WindowHandle};
use menubridge_dbus::ZbusTransport;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::lines::Line;

#[derive(Parser, Debug)]
#[command(name = "menubridge")]
#[command(about = "Register window menus with the global menu registrar")]
struct Cli {
	/// Configuration file (defaults to `$XDG_CONFIG_HOME/menubridge/config.toml`)
	#[arg(short, long, value_name = "PATH", global = true)]
	config: Option<PathBuf>,

	/// Per-call timeout in milliseconds, overriding the configuration file
	#[arg(long, value_name = "MS", global = true)]
	call_timeout_ms: Option<u64>,

	/// Verbose logging
	#[arg(short, long, global = true)]
	verbose: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Register windows, then hold until Ctrl-C or `--hold` elapses
	Register {
		/// Window id, decimal or 0x-prefixed hex
		#[arg(short, long = "window", value_name = "ID", required = true, value_parser = lines::parse_window_id)]
		windows: Vec<WindowHandle>,

		/// Menu object path; `{id}` is replaced with the window id
		#[arg(short, long, value_name = "PATH")]
		menu: String,

		/// Seconds to stay registered
		#[arg(long, value_name = "SECS")]
		hold: Option<u64>,
	},
	/// Follow `create ID [PATH]` / `destroy ID` lines on stdin until EOF
	Follow {
		/// Menu path for `create` lines without one; `{id}` is replaced with the window id
		#[arg(short, long, value_name = "TEMPLATE")]
		menu_template: Option<String>,
	},
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	setup_tracing(cli.verbose);

	let config = load_config(&cli)?;
	let transport = ZbusTransport::session().await.context("connecting to the session bus")?;
	info!(unique_name = ?transport.unique_name(), "cli.connected");

	let supervisor = BridgeSupervisor::start(Arc::new(transport), config)?;
	let printer = tokio::spawn(print_events(supervisor.subscribe()));

	let outcome = match cli.command {
		Command::Register { windows, menu, hold } => register(&supervisor, &windows, &menu, hold.map(Duration::from_secs)).await,
		Command::Follow { menu_template } => follow(&supervisor, menu_template).await,
	};

	let report = supervisor.shutdown().await;
	drop(supervisor);
	let _ = printer.await;
	println!(
		"shutdown: {} unregistered, {} abandoned",
		report.unregistered(),
		report.abandoned()
	);

	outcome?;
	match report.error() {
		Some(err) => Err(err.into()),
		None => Ok(()),
	}
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		if verbose {
			EnvFilter::new("menubridge=debug,menubridge_dbus=debug,info")
		} else {
			EnvFilter::new("info")
		}
	});
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();
}

fn load_config(cli: &Cli) -> anyhow::Result<BridgeConfig> {
	let path = cli.config.clone().or_else(|| {
		dirs::config_dir()
			.map(|dir| dir.join("menubridge").join("config.toml"))
			.filter(|path| path.exists())
	});

	let mut config = match path {
		Some(path) => {
			info!(path = %path.display(), "cli.config.load");
			BridgeConfig::load(&path)?
		}
		None => BridgeConfig::default(),
	};
	if let Some(ms) = cli.call_timeout_ms {
		config = config.with_call_timeout(Duration::from_millis(ms));
	}
	Ok(config)
}

async fn register(supervisor: &BridgeSupervisor, windows: &[WindowHandle], menu: &str, hold: Option<Duration>) -> anyhow::Result<()> {
	for &window in windows {
		let menu_path = MenuObjectPath::from_template(menu, window)?;
		supervisor.register_window(window, menu_path).await?;
	}

	match hold {
		Some(hold) => {
			tokio::select! {
				_ = tokio::time::sleep(hold) => debug!(secs = hold.as_secs(), "cli.hold.elapsed"),
				res = tokio::signal::ctrl_c() => res?,
			}
		}
		None => tokio::signal::ctrl_c().await?,
	}
	Ok(())
}

/// Paths named on `create` lines, waiting for the supervisor to ask for them.
type ExplicitPaths = Arc<Mutex<HashMap<WindowHandle, MenuObjectPath>>>;

async fn follow(supervisor: &BridgeSupervisor, template: Option<String>) -> anyhow::Result<()> {
	let (tx, rx) = mpsc::channel(64);
	let explicit = ExplicitPaths::default();
	let reader = tokio::spawn(read_lines(tx, explicit.clone()));

	let menu_for = move |window: WindowHandle| {
		let named = explicit.lock().ok().and_then(|mut paths| paths.remove(&window));
		named.or_else(|| {
			let template = template.as_deref()?;
			MenuObjectPath::from_template(template, window)
				.map_err(|err| warn!(window = %window, error = %err, "cli.follow.bad_template"))
				.ok()
		})
	};

	tokio::select! {
		res = supervisor.follow(rx, menu_for) => res?,
		res = tokio::signal::ctrl_c() => res?,
	}
	reader.abort();
	Ok(())
}

async fn read_lines(tx: mpsc::Sender<WindowEvent>, explicit: ExplicitPaths) -> anyhow::Result<()> {
	let mut input = BufReader::new(tokio::io::stdin()).lines();
	while let Some(line) = input.next_line().await? {
		let event = match lines::parse_line(&line) {
			Ok(Some(Line::Create { window, menu_path })) => {
				if let Some(menu_path) = menu_path {
					if let Ok(mut paths) = explicit.lock() {
						paths.insert(window, menu_path);
					}
				}
				WindowEvent::Created(window)
			}
			Ok(Some(Line::Destroy { window })) => WindowEvent::Destroyed(window),
			Ok(None) => continue,
			Err(err) => {
				warn!(line = %line, error = %err, "cli.follow.bad_line");
				continue;
			}
		};
		if tx.send(event).await.is_err() {
			break;
		}
	}
	debug!("cli.follow.eof");
	Ok(())
}

async fn print_events(mut events: broadcast::Receiver<EntryEvent>) {
	loop {
		match events.recv().await {
			Ok(EntryEvent::Changed(entry)) => match (&entry.state, &entry.last_error) {
				(EntryState::Failed, Some(err)) => {
					println!("{} {} {} retries={} ({err})", entry.handle, entry.state, entry.menu_path, entry.retry_count)
				}
				_ => println!("{} {} {}", entry.handle, entry.state, entry.menu_path),
			},
			Ok(EntryEvent::Removed(window)) => println!("{window} removed"),
			Err(broadcast::error::RecvError::Lagged(skipped)) => warn!(skipped, "cli.events.lagged"),
			Err(broadcast::error::RecvError::Closed) => break,
		}
	}
}
