use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use print_agent::{
    config::{load_config_with_precedence, AgentConfig},
    logging::init_tracing,
    server,
    service::DeploymentPlan,
    spooler,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "print-agent", version, about = "Local HTTP print agent for receipt printers")]
struct Cli {
    #[arg(short, long, env = "PRINT_AGENT_CONFIG", global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    port: Option<u16>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as a Windows service when started by the SCM, otherwise in the foreground
    Run,
    /// Run in the foreground with logs on stdout
    Debug,
    Service {
        #[command(subcommand)]
        cmd: ServiceCmd,
    },
}

#[derive(Subcommand, Debug)]
enum ServiceCmd {
    /// Create the service with auto start and restart-on-failure actions
    Install {
        #[arg(long)]
        no_start: bool,
    },
    Uninstall,
    Start,
    Stop,
    Status,
    /// Stop, delete, install, configure and start in one go
    Deploy,
    /// Print the equivalent sc.exe commands of `deploy`
    Plan,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut cfg = load_config_with_precedence(cli.config.as_ref())?;
    if let Some(p) = cli.port {
        cfg.http.port = p;
    }
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let _guard = init_tracing(&cfg, false)?;
            #[cfg(target_os = "windows")]
            {
                match print_agent::service::host::run_dispatcher(cfg.clone()) {
                    Ok(()) => return Ok(()),
                    Err(e) => warn!(error = ?e, "not started by the service manager, running in foreground"),
                }
            }
            run_foreground(&cfg)
        }
        Commands::Debug => {
            let _guard = init_tracing(&cfg, true)?;
            println!("print-agent {} (debug, not a service)", env!("CARGO_PKG_VERSION"));
            println!("  API:      http://localhost:{}", cfg.http.port);
            println!("  Data dir: {}", cfg.storage.data_dir.display());
            println!("  Press Ctrl+C to stop");
            run_foreground(&cfg)
        }
        Commands::Service { cmd } => {
            let _guard = init_tracing(&cfg, true)?;
            let config_path = absolute_config_path(cli.config.as_deref())?;
            run_service_cmd(cmd, &cfg, config_path.as_deref())
        }
    }
}

fn run_foreground(cfg: &AgentConfig) -> Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    rt.block_on(async {
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = ?e, "cannot listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
            info!("Ctrl+C received, shutting down");
        };
        server::serve(cfg, spooler::default_backend(), shutdown).await
    })
}

/// The SCM starts the service from System32, so a relative config path
/// would not resolve there.
fn absolute_config_path(p: Option<&Path>) -> Result<Option<PathBuf>> {
    match p {
        Some(p) if p.exists() => Ok(Some(
            p.canonicalize()
                .with_context(|| format!("resolving {}", p.display()))?,
        )),
        Some(p) => {
            warn!(path = %p.display(), "config file not found, service will use defaults");
            Ok(None)
        }
        None => Ok(None),
    }
}

fn run_service_cmd(cmd: ServiceCmd, cfg: &AgentConfig, config_path: Option<&Path>) -> Result<()> {
    if let ServiceCmd::Plan = cmd {
        let exe = std::env::current_exe().context("current_exe")?;
        for line in DeploymentPlan::new(cfg, &exe, config_path).render_sc() {
            println!("{line}");
        }
        return Ok(());
    }
    #[cfg(target_os = "windows")]
    {
        use print_agent::service::{control, deploy, install, uninstall};
        let name = cfg.service.name.as_str();
        match cmd {
            ServiceCmd::Install { no_start } => {
                install::install_service(cfg, config_path, !no_start)?;
                println!("Service {name} installed.");
            }
            ServiceCmd::Uninstall => {
                uninstall::uninstall_service(name)?;
                println!("Service {name} uninstalled.");
            }
            ServiceCmd::Start => {
                control::start_service(name)?;
                println!("Service {name} started.");
            }
            ServiceCmd::Stop => {
                control::stop_service(name)?;
                println!("Service {name} stopped.");
            }
            ServiceCmd::Status => {
                println!("{name}: {:?}", control::service_state(name)?);
            }
            ServiceCmd::Deploy => {
                deploy::deploy_service(cfg, config_path)?;
                println!("Service {name} deployed and started.");
            }
            ServiceCmd::Plan => {}
        }
        Ok(())
    }
    #[cfg(not(target_os = "windows"))]
    {
        let _ = (cmd, cfg, config_path);
        eprintln!("Service management is Windows-only; use `service plan` to see the sc.exe commands.");
        Ok(())
    }
}
