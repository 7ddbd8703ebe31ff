//! pcwake
//!
//! Daemon and command-line front end for the Wake-on-LAN gatekeeper.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use daemon::config::Config;
use daemon::ipc::{
    get_daemon_pid, get_pid_file_path, get_socket_path, is_daemon_running, pidfile, IpcClient,
    IpcResponse,
};
use daemon::orchestrator::{DaemonOrchestrator, OrchestratorEvent};
use daemon::service::DeviceInfo;
use protocol::{ChannelId, UserId};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// pcwake - power on your PC from chat, see whether it is up.
#[derive(Parser, Debug)]
#[command(name = "pcwake")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the daemon in the foreground
    Start,

    /// Stop the running daemon
    Stop {
        /// Force immediate termination (SIGKILL)
        #[arg(long, short)]
        force: bool,

        /// Timeout in seconds for graceful shutdown
        #[arg(long, default_value = "30")]
        timeout: u64,
    },

    /// Show daemon and host status
    Status,

    /// Set the MAC address, IP address and password of the PC
    Init {
        /// Chat user issuing the command
        #[arg(long = "as", value_name = "USER_ID")]
        caller: UserId,

        /// Hardware address, e.g. AA:BB:CC:DD:EE:FF
        #[arg(long)]
        mac: String,

        /// IP address used for the reachability check
        #[arg(long)]
        ip: String,

        /// 6-character password required by turn-on
        #[arg(long)]
        password: String,
    },

    /// Authorize another user
    AddUser {
        #[arg(long = "as", value_name = "USER_ID")]
        caller: UserId,

        /// User to authorize
        user: UserId,
    },

    /// Revoke a user
    RemoveUser {
        #[arg(long = "as", value_name = "USER_ID")]
        caller: UserId,

        /// User to revoke
        user: UserId,
    },

    /// Post a fresh status display with the "Turn On PC" button
    CreateButton {
        #[arg(long = "as", value_name = "USER_ID")]
        caller: UserId,

        /// Channel to post in
        channel: ChannelId,
    },

    /// Submit the password and send the wake packet
    TurnOn {
        #[arg(long = "as", value_name = "USER_ID")]
        caller: UserId,

        #[arg(long)]
        password: String,
    },

    /// Show the stored device information
    Info {
        #[arg(long = "as", value_name = "USER_ID")]
        caller: UserId,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default()?
    };
    config.apply_env_overrides();
    config.validate()?;

    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config.daemon.log_level.to_lowercase()
    };
    let log_dir = match cli.command {
        Commands::Start => config.daemon.log_dir.clone(),
        _ => None,
    };
    let _log_guard = init_tracing(&level, log_dir)?;

    if let Some(config_path) = &cli.config {
        tracing::debug!("Using config file: {:?}", config_path);
    }

    match cli.command {
        Commands::Start => {
            if is_daemon_running() {
                let pid = get_daemon_pid().unwrap_or(0);
                eprintln!("Error: Daemon already running (PID: {})", pid);
                eprintln!();
                eprintln!("To stop the existing daemon, run:");
                eprintln!("  pcwake stop");
                std::process::exit(1);
            }

            let mut orchestrator = DaemonOrchestrator::new(config)?;
            run_headless(&mut orchestrator).await?;
        }
        Commands::Stop { force, timeout } => {
            tracing::debug!("Stopping daemon (force: {})", force);

            let result = if force {
                force_stop_daemon()
            } else {
                graceful_stop_daemon(timeout).await
            };
            match result {
                Ok(()) => println!("Daemon stopped"),
                Err(e) => {
                    eprintln!("Failed to stop daemon: {}", e);
                    if !force {
                        eprintln!("Try: pcwake stop --force");
                    }
                    std::process::exit(1);
                }
            }
        }
        Commands::Status => {
            let mut client = connect(Duration::from_secs(5)).await?;
            match client.status().await? {
                IpcResponse::Status {
                    running,
                    uptime_secs,
                    initialized,
                    host_status,
                } => {
                    println!(
                        "Daemon Status: {}",
                        if running { "running" } else { "stopping" }
                    );
                    println!("  Uptime:      {}", format_duration(uptime_secs));
                    println!("  Initialized: {}", if initialized { "yes" } else { "no" });
                    println!(
                        "  PC:          {}",
                        host_status.map_or("unknown".to_string(), |s| s.to_string())
                    );
                }
                other => report(other)?,
            }
        }
        Commands::Init {
            caller,
            mac,
            ip,
            password,
        } => {
            let mut client = connect(Duration::from_secs(5)).await?;
            report(client.initialize(caller, mac, ip, password).await?)?;
        }
        Commands::AddUser { caller, user } => {
            let mut client = connect(Duration::from_secs(5)).await?;
            report(client.add_user(caller, user).await?)?;
        }
        Commands::RemoveUser { caller, user } => {
            let mut client = connect(Duration::from_secs(5)).await?;
            report(client.remove_user(caller, user).await?)?;
        }
        Commands::CreateButton { caller, channel } => {
            let mut client = connect(network_timeout(config.display.timeout())).await?;
            match client.create_button(caller, channel).await? {
                IpcResponse::ButtonCreated { binding } => println!(
                    "Button has been created (channel {}, message {}).",
                    binding.channel_id, binding.message_id
                ),
                other => report(other)?,
            }
        }
        Commands::TurnOn { caller, password } => {
            let mut client = connect(network_timeout(config.wake.timeout())).await?;
            report(client.turn_on(caller, password).await?)?;
        }
        Commands::Info { caller, json } => {
            let mut client = connect(Duration::from_secs(5)).await?;
            match client.info(caller).await? {
                IpcResponse::Info { info } if json => {
                    println!("{}", serde_json::to_string_pretty(&info)?);
                }
                IpcResponse::Info { info } => print_info(&info),
                other => report(other)?,
            }
        }
    }

    Ok(())
}

/// Installs the tracing subscriber.
///
/// With a log directory, events are also written to a daily-rotated file
/// through a non-blocking writer; the returned guard flushes it on drop.
fn init_tracing(level: &str, log_dir: Option<PathBuf>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(&dir, "pcwake.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            Ok(None)
        }
    }
}

/// Client timeout for commands that wait on the network inside the daemon.
fn network_timeout(daemon_side: Duration) -> Duration {
    daemon_side * 2 + Duration::from_secs(5)
}

async fn connect(timeout: Duration) -> anyhow::Result<IpcClient> {
    let socket_path = get_socket_path();
    IpcClient::connect_with_timeout(&socket_path, timeout)
        .await
        .map_err(|_| anyhow::anyhow!("Daemon is not running (cannot connect to socket). Start it with `pcwake start`."))
}

/// Prints a `Done` message or turns an error response into a failure.
fn report(response: IpcResponse) -> anyhow::Result<()> {
    match response {
        IpcResponse::Done { message } => {
            println!("{}", message);
            Ok(())
        }
        IpcResponse::Error { kind, message } => {
            tracing::debug!("Daemon returned {} error", kind);
            anyhow::bail!("{}", message)
        }
        other => anyhow::bail!("Unexpected response from daemon: {:?}", other),
    }
}

fn print_info(info: &DeviceInfo) {
    fn or_not_set(value: Option<String>) -> String {
        value.unwrap_or_else(|| "Not set".to_string())
    }

    println!("Information");
    println!("  MAC Address: {}", or_not_set(info.mac_address.map(|m| m.to_string())));
    println!("  IP Address:  {}", or_not_set(info.ip_address.map(|ip| ip.to_string())));
    println!("  Password:    {}", or_not_set(info.password.clone()));
    if info.authorized_users.is_empty() {
        println!("  Users:       Not set");
    } else {
        println!("  Users:");
        for user in &info.authorized_users {
            println!("    {}", user);
        }
    }
    match info.binding {
        Some(binding) => println!(
            "  Display:     channel {}, message {}",
            binding.channel_id, binding.message_id
        ),
        None => println!("  Display:     Not set"),
    }
    println!(
        "  PC:          {}",
        info.status.map_or("unknown".to_string(), |s| s.to_string())
    );
}

/// Gracefully stop the daemon via IPC and wait for it to exit.
async fn graceful_stop_daemon(timeout_secs: u64) -> anyhow::Result<()> {
    let socket_path = get_socket_path();

    let mut client = IpcClient::connect_with_timeout(&socket_path, Duration::from_secs(5))
        .await
        .map_err(|_| anyhow::anyhow!("Daemon is not running (cannot connect to socket)"))?;

    println!("Sending shutdown request...");

    client.set_timeout(Duration::from_secs(timeout_secs));
    match client
        .stop()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to send stop request: {}", e))?
    {
        IpcResponse::Stopping => println!("Shutdown acknowledged, waiting for daemon to exit..."),
        other => report(other)?,
    }

    let start = std::time::Instant::now();
    let timeout = Duration::from_secs(timeout_secs);

    while start.elapsed() < timeout {
        if !socket_path.exists() {
            return Ok(());
        }

        if IpcClient::connect_with_timeout(&socket_path, Duration::from_millis(100))
            .await
            .is_err()
        {
            return Ok(());
        }

        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    Err(anyhow::anyhow!(
        "Timeout waiting for daemon to exit ({}s)",
        timeout_secs
    ))
}

/// Force stop the daemon using SIGKILL.
fn force_stop_daemon() -> anyhow::Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let pid_path = get_pid_file_path();
    let pid = get_daemon_pid()
        .ok_or_else(|| anyhow::anyhow!("Daemon PID file not found - is the daemon running?"))?;
    let pid = i32::try_from(pid).context("Invalid PID in file")?;

    kill(Pid::from_raw(pid), Signal::SIGKILL)
        .map_err(|e| anyhow::anyhow!("Failed to kill daemon (PID {}): {}", pid, e))?;

    println!("Sent SIGKILL to daemon (PID {})", pid);

    let _ = std::fs::remove_file(&pid_path);
    let _ = std::fs::remove_file(get_socket_path());

    Ok(())
}

/// Format a duration in seconds to human-readable format.
fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Run the daemon until a signal or an IPC `Stop` arrives.
async fn run_headless(orchestrator: &mut DaemonOrchestrator) -> anyhow::Result<()> {
    let pid_path = get_pid_file_path();
    pidfile::write_pid_file(&pid_path)
        .with_context(|| format!("Failed to write PID file: {}", pid_path.display()))?;

    let result = run_until_shutdown(orchestrator).await;

    pidfile::remove_pid_file(&pid_path);
    result
}

async fn run_until_shutdown(orchestrator: &mut DaemonOrchestrator) -> anyhow::Result<()> {
    let mut events = orchestrator.subscribe();
    orchestrator.start().await?;

    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                OrchestratorEvent::StateChanged(state) => {
                    tracing::info!("Orchestrator state: {:?}", state);
                }
                OrchestratorEvent::HostStatusChanged(status) => {
                    tracing::debug!("Host status event: {:?}", status);
                }
                OrchestratorEvent::Error { message } => {
                    tracing::error!("Orchestrator error: {}", message);
                }
            }
        }
    });

    let shutdown = orchestrator.shutdown_token();
    tokio::select! {
        result = wait_for_shutdown_signal() => {
            result?;
            tracing::info!("Received shutdown signal");
        }
        _ = shutdown.cancelled() => {
            tracing::info!("Shutdown requested by client");
        }
    }

    orchestrator.stop().await
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?;

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
        _ = sigint.recv() => tracing::info!("Received SIGINT"),
    }
    Ok(())
}
