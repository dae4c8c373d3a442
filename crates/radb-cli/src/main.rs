//! radb CLI
//!
//! Remote shell client for Android devices reachable through a cloudflared
//! tunnel:
//! - Interactive shell and one-shot commands
//! - File push and pull
//! - Log streaming

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use radb::commands::{self, Action};
use radb::output::{format_welcome, print_error, print_info, print_success};
use radb_core::config::{self, RadbConfig};
use radb_core::tunnel::get_install_instructions;
use radb_core::{
    CloudflaredTunnel, ConnectError, DirectTunnel, Endpoint, Interrupts, RadbError, Session,
    TunnelProvider,
};
use radb_protocol::Dialect;

#[derive(Parser)]
#[command(name = "radb")]
#[command(author, version, about = "Remote ADB shell over a cloudflared tunnel")]
#[command(after_help = "Actions:
  (none) | shell            Interactive shell
  <command...>              Run a single command
  push <local> <remote>     Push a file to the device
  pull <remote> <local>     Pull a file from the device
  logcat                    Stream the device log")]
struct Cli {
    /// Device id (or a full tunnel hostname)
    device: String,

    /// Action and its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,

    /// Path to configuration file
    #[arg(short, long, env = "RADB_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,

    /// Request dialect spoken by the device agent (a or b)
    #[arg(long)]
    dialect: Option<Dialect>,

    /// Connect to HOST:PORT directly instead of launching cloudflared
    #[arg(long, value_name = "HOST:PORT")]
    connect: Option<String>,

    /// Check that the device answers, then exit
    #[arg(long, conflicts_with = "args")]
    ping: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // Help and version are not failures
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_logging(cli.quiet, cli.verbose);

    match run(cli).await {
        Ok(code) => exit_code(code),
        Err(e) => {
            print_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn init_logging(quiet: bool, verbose: u8) {
    let log_level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Map a remote exit status onto a process exit code
fn exit_code(code: i32) -> ExitCode {
    match u8::try_from(code) {
        Ok(code) => ExitCode::from(code),
        Err(_) => ExitCode::FAILURE,
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let action = Action::from_args(&cli.args)?;

    let mut config = config::load_client_config(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(dialect) = cli.dialect {
        config.session.dialect = dialect;
    }

    // Fail before opening a tunnel that would go unused
    if let Action::Push { local, .. } = &action {
        if !local.is_file() {
            return Err(RadbError::LocalFileNotFound(local.clone()).into());
        }
    }

    let endpoint = Endpoint::new(cli.device.as_str(), &config.tunnel.domain);
    let mut session = match connect(&endpoint, cli.connect.as_deref(), &config).await {
        Ok(session) => session,
        Err(RadbError::Connect(ConnectError::HelperMissing { binary })) => {
            print_error(&format!("Connection failed: '{}' was not found", binary));
            eprintln!("{}", get_install_instructions());
            return Ok(1);
        }
        Err(e) => return Err(e.into()),
    };

    let result = dispatch(&mut session, &action, cli.ping, &config).await;
    session.close().await;
    result
}

async fn connect(
    endpoint: &Endpoint,
    direct: Option<&str>,
    config: &RadbConfig,
) -> Result<Session, RadbError> {
    let provider: Box<dyn TunnelProvider> = match direct {
        Some(address) => Box::new(DirectTunnel::new(address)),
        None => Box::new(CloudflaredTunnel::from_config(&config.tunnel)),
    };

    print_info(&format!("Connecting to {}...", endpoint.hostname()));
    let session = Session::connect(endpoint, provider.as_ref(), config).await?;

    match session.welcome() {
        Some(welcome) => print_info(&format_welcome(welcome)),
        None => print_info("Connected!"),
    }
    Ok(session)
}

async fn dispatch(
    session: &mut Session,
    action: &Action,
    ping: bool,
    config: &RadbConfig,
) -> Result<i32> {
    if ping {
        session.ping().await.context("Device did not answer ping")?;
        print_success("Device is alive");
        return Ok(0);
    }

    let mut interrupts = if action.is_interactive() {
        Interrupts::from_ctrl_c()
    } else {
        Interrupts::none()
    };

    match action {
        Action::Shell => commands::shell_command(session, &mut interrupts).await?,
        Action::Exec(command) => return commands::exec_command(session, command).await,
        Action::Push { local, remote } => commands::push_command(session, local, remote).await?,
        Action::Pull { remote, local } => commands::pull_command(session, remote, local).await?,
        Action::Logcat => {
            commands::logcat_command(session, &config.session.log_command, &mut interrupts)
                .await?
        }
    }
    Ok(0)
}
