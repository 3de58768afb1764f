/*!
 * Deal Maker - Main CLI Entry Point
 */

use clap::Parser;
use deal_maker::config::{DealerConfig, LogLevel, Network, Settings};
use deal_maker::error::{DealerError, Result, EXIT_SUCCESS};
use deal_maker::{binary, logging, shutdown, Devnet, Workdir};
use deal_maker_engine::DealLoop;
use deal_maker_node_interface::{NodeControl, ProviderId};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Make storage deals with a fixed set of providers, forever
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Provider (miner) addresses to make deals with
    #[arg(value_name = "PROVIDER")]
    providers: Vec<String>,

    /// Network name to run against (nightly, staging, user)
    #[arg(long, default_value = "user")]
    network: Network,

    /// Working directory used to store node repos (must be empty)
    #[arg(long)]
    workdir: Option<PathBuf>,

    /// Binary used when executing `go-filecoin` commands
    #[arg(long)]
    binpath: Option<PathBuf>,

    /// TOML file with loop policy overrides
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write JSON logs to this file instead of stdout
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Log level
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Shorthand for --log-level debug
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            report(&e);
            e.exit_code()
        }
    };
    ExitCode::from(code as u8)
}

fn report(err: &DealerError) {
    error!(error = %err, "Deal maker failed");
    match err.hint() {
        Some(hint) => println!("{} {}", hint, err),
        None => println!("{}", err),
    }
}

fn build_config(cli: Cli) -> Result<DealerConfig> {
    let settings = match cli.config {
        Some(ref path) => Settings::load(path)?,
        None => Settings::default(),
    };

    Ok(DealerConfig {
        network: cli.network,
        workdir: cli.workdir,
        binary: binary::resolve(cli.binpath)?,
        providers: cli.providers.into_iter().map(ProviderId::from).collect(),
        settings,
        log_level: cli.log_level,
        log_file: cli.log_file,
        verbose: cli.verbose,
    })
}

async fn run(cli: Cli) -> Result<()> {
    let config = build_config(cli)?;
    logging::init_logging(&config)?;
    install_panic_hook();

    info!(
        "Deal Maker v{} | network: {} | binary: {} | providers: {}",
        deal_maker::VERSION,
        config.network,
        config.binary.display(),
        config.providers.len()
    );

    let workdir = Workdir::prepare(config.workdir.as_deref())?;
    let mut env = Devnet::new(config.network, workdir, config.binary.clone())?;

    let cancel = CancellationToken::new();
    let listener = shutdown::listen(cancel.clone());

    let outcome = AssertUnwindSafe(session(&config, &mut env, &cancel))
        .catch_unwind()
        .await;

    cancel.cancel();
    let _ = listener.await;
    env.teardown().await;

    match outcome {
        Ok(result) => result,
        Err(_) => Err(DealerError::Environment(
            "session aborted by panic".to_string(),
        )),
    }
}

/// Bootstrap a funded node and run the deal loop until cancelled
async fn session(
    config: &DealerConfig,
    env: &mut Devnet,
    cancel: &CancellationToken,
) -> Result<()> {
    let node = env.new_process();
    let genesis = env.genesis_car();

    let startup = async {
        node.init(config.network, &genesis)
            .await
            .map_err(DealerError::Bootstrap)?;
        node.start_daemon(config.daemon_start_timeout())
            .await
            .map_err(DealerError::Bootstrap)?;
        env.get_funds(&node).await?;

        let control: Arc<dyn NodeControl> = node.clone();
        let deal_loop = DealLoop::bootstrap(
            control,
            config.allowlist(),
            config.settings.policy.clone(),
        )
        .await?;
        Ok::<_, DealerError>(deal_loop)
    };

    let deal_loop = tokio::select! {
        _ = cancel.cancelled() => {
            info!("Shutdown during startup");
            return Ok(());
        }
        result = startup => result?,
    };

    let report = deal_loop.run(cancel.child_token()).await;
    info!("Deal loop stopped | {}", report.summary());
    Ok(())
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        println!("recovered from panic {}", info);
        println!(
            "stacktrace from panic: \n{}",
            std::backtrace::Backtrace::force_capture()
        );
    }));
}
