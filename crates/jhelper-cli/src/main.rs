//! jhelper - installer and launcher for jiracli
//!
//! Usage:
//!   jhelper doctor                 # Check interpreter, git and the tool
//!   jhelper install [--force]      # Clone, create environment, write launcher
//!   jhelper update [--method ...]  # Pull in place or reinstall from scratch
//!   jhelper run <script> [args]    # Run a helper script interactively
//!   jhelper config show|set        # Read or replace the tool configuration
//!   jhelper settings init          # Write jhelper.toml with the current values

mod render;

use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use console::style;
use dialoguer::{Confirm, theme::ColorfulTheme};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jhelper_core::config::{Settings, SettingsStore};
use jhelper_core::context::AppContext;
use jhelper_core::orchestration::{OperationResult, UpdateMethod};
use jhelper_core::process::OutputStream;

use crate::render::{LiveProgress, print_operation_result};

#[derive(Parser)]
#[command(name = "jhelper")]
#[command(about = "Installer and launcher for jiracli", long_about = None)]
struct Cli {
    /// Settings file (defaults to jhelper.toml in the platform config directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Output format
    #[arg(short = 'o', long, global = true, default_value = "table")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check for the interpreter, git and an installed tool
    Doctor,

    /// Install the tool
    Install {
        /// Remove an existing installation first
        #[arg(long, short)]
        force: bool,
        /// Reinstall without asking when the tool already exists
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Update an existing installation
    Update {
        /// Update strategy
        #[arg(long, short, default_value = "pull")]
        method: MethodArg,
    },

    /// Run a helper script, relaying stdin lines to it
    Run {
        /// Script path, relative to the scripts directory
        script: String,
        /// Arguments passed to the script
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Read or replace the tool configuration file
    Config(ConfigArgs),

    /// Manage jhelper's own settings file
    Settings(SettingsArgs),
}

#[derive(Args)]
struct SettingsArgs {
    #[command(subcommand)]
    command: SettingsSubcommand,
}

#[derive(Subcommand)]
enum SettingsSubcommand {
    /// Write the effective settings to the settings file
    Init {
        /// Overwrite an existing settings file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Subcommand)]
enum ConfigSubcommand {
    /// Print the configuration file
    Show,
    /// Replace the configuration file with the contents of FILE (`-` for stdin)
    Set { file: PathBuf },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable output with live progress
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum MethodArg {
    /// git pull and refresh dependencies
    Pull,
    /// Remove and reinstall from scratch
    Fresh,
}

impl From<MethodArg> for UpdateMethod {
    fn from(method: MethodArg) -> Self {
        match method {
            MethodArg::Pull => UpdateMethod::Pull,
            MethodArg::Fresh => UpdateMethod::Fresh,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jhelper=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{} {err:#}", style("error:").red().bold());
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the command succeeded.
async fn run(cli: Cli) -> Result<bool> {
    let store = match cli.settings {
        Some(path) => SettingsStore::from_path(path),
        None => SettingsStore::from_default_location()?,
    };
    tracing::debug!(settings = %store.path().display(), "loading settings");
    let settings = store.load()?;
    let ctx = AppContext::with_settings(settings)?;
    let format = cli.format;

    match cli.command {
        Commands::Doctor => run_doctor(&ctx, format).await,
        Commands::Install { force, yes } => run_install(&ctx, force, yes, format).await,
        Commands::Update { method } => run_update(&ctx, method.into(), format).await,
        Commands::Run { script, args } => run_script(&ctx, &script, &args, format).await,
        Commands::Config(args) => match args.command {
            ConfigSubcommand::Show => run_config_show(&ctx, format),
            ConfigSubcommand::Set { file } => run_config_set(&ctx, &file, format),
        },
        Commands::Settings(args) => match args.command {
            SettingsSubcommand::Init { force } => {
                run_settings_init(&store, ctx.settings(), force, format)
            }
        },
    }
}

async fn run_doctor(ctx: &AppContext, format: OutputFormat) -> Result<bool> {
    let interpreter = ctx.check_interpreter().await;
    let git = ctx.check_version_control().await;
    let tool = ctx.check_tool().await;
    let installation = ctx.installation_state();

    match format {
        OutputFormat::Table => {
            let mark = |ok: bool| {
                if ok {
                    style("✓").green()
                } else {
                    style("✗").red()
                }
            };
            let version = |v: &Option<String>| v.clone().unwrap_or_else(|| "not found".into());

            println!(
                "{} Python ({}): {}",
                mark(interpreter.available),
                interpreter.command,
                version(&interpreter.version)
            );
            println!(
                "{} Git ({}): {}",
                mark(git.available),
                git.command,
                version(&git.version)
            );
            match (&tool.path, &tool.error) {
                (Some(path), _) => println!(
                    "{} {} ({path}): {}",
                    mark(true),
                    ctx.settings().tool.name,
                    version(&tool.version)
                ),
                (None, error) => println!(
                    "{} {}: {}",
                    mark(false),
                    ctx.settings().tool.name,
                    error.as_deref().unwrap_or("not found")
                ),
            }
            let installed = if installation.exists {
                "installed"
            } else {
                "not installed"
            };
            println!("  Install directory: {} ({installed})", installation.tool_dir.display());
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "interpreter": interpreter,
                "versionControl": git,
                "tool": tool,
                "installation": installation,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(interpreter.available && git.available)
}

async fn run_install(ctx: &AppContext, force: bool, yes: bool, format: OutputFormat) -> Result<bool> {
    let orchestrator = ctx.install_orchestrator();
    let show = matches!(format, OutputFormat::Table);

    let progress = LiveProgress::new(show);
    let mut result = orchestrator.install(force, progress.channel()).await;
    progress.finish()?;

    if result.already_exists && (yes || show) {
        if !yes {
            print_operation_result(&mut io::stdout(), &result)?;
            if !confirm_reinstall(&ctx.settings().tool.name)? {
                return Ok(false);
            }
        }
        let progress = LiveProgress::new(show);
        result = orchestrator.install(true, progress.channel()).await;
        progress.finish()?;
    }

    report(&result, format)?;
    Ok(result.success)
}

fn confirm_reinstall(name: &str) -> Result<bool> {
    if !io::stdin().is_terminal() {
        return Ok(false);
    }
    let confirmed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Remove the existing {name} installation and reinstall?"))
        .default(false)
        .interact()?;
    Ok(confirmed)
}

async fn run_update(ctx: &AppContext, method: UpdateMethod, format: OutputFormat) -> Result<bool> {
    let orchestrator = ctx.update_orchestrator();
    let progress = LiveProgress::new(matches!(format, OutputFormat::Table));
    let result = orchestrator.update(method, progress.channel()).await;
    progress.finish()?;
    report(&result, format)?;
    Ok(result.success)
}

fn report(result: &OperationResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => print_operation_result(&mut io::stdout(), result)?,
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(result)?),
    }
    Ok(())
}

async fn run_script(
    ctx: &AppContext,
    script: &str,
    args: &[String],
    format: OutputFormat,
) -> Result<bool> {
    let bridge = ctx.session_bridge();
    let relay_output = matches!(format, OutputFormat::Table);
    let handle = bridge
        .start(script, args, move |output| {
            if !relay_output {
                return;
            }
            let _ = match output.stream {
                OutputStream::Stdout => {
                    let mut out = io::stdout().lock();
                    out.write_all(output.data.as_bytes()).and_then(|()| out.flush())
                }
                OutputStream::Stderr => {
                    let mut err = io::stderr().lock();
                    err.write_all(output.data.as_bytes()).and_then(|()| err.flush())
                }
            };
        })
        .await?;

    // stdin reads block, so they live on a plain thread that dies with the process.
    let (lines_tx, mut lines_rx) = mpsc::unbounded_channel::<String>();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if lines_tx.send(line).is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            line = lines_rx.recv() => match line {
                Some(line) => {
                    if handle.send_input(&line).await.is_err() {
                        break;
                    }
                }
                None => {
                    handle.close_input().await;
                    break;
                }
            },
            _ = tokio::time::sleep(Duration::from_millis(100)) => {
                if handle.is_finished() {
                    break;
                }
            }
        }
    }

    let result = handle.wait().await;
    match format {
        OutputFormat::Table => {
            if !result.success {
                let code = result
                    .exit_code
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| "none".into());
                eprintln!("{} {script} failed (exit code {code})", style("✗").red());
                if result.exit_code.is_none() && !result.stderr.is_empty() {
                    eprintln!("  {}", result.stderr.trim_end());
                }
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
    }
    Ok(result.success)
}

fn run_settings_init(
    store: &SettingsStore,
    settings: &Settings,
    force: bool,
    format: OutputFormat,
) -> Result<bool> {
    let exists = store.path().exists();
    if exists && !force {
        match format {
            OutputFormat::Table => eprintln!(
                "{} {} already exists (use --force to overwrite)",
                style("•").yellow(),
                store.path().display()
            ),
            OutputFormat::Json => println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "success": false,
                    "path": store.path(),
                    "error": "Settings file already exists",
                }))?
            ),
        }
        return Ok(false);
    }

    store.save(settings)?;
    match format {
        OutputFormat::Table => {
            println!("{} Wrote {}", style("✓").green(), store.path().display())
        }
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "success": true,
                "path": store.path(),
            }))?
        ),
    }
    Ok(true)
}

fn run_config_show(ctx: &AppContext, format: OutputFormat) -> Result<bool> {
    let store = ctx.tool_config_store();
    let snapshot = store.read();

    match format {
        OutputFormat::Table => match (&snapshot.content, &snapshot.error) {
            (Some(content), _) => print!("{content}"),
            (None, Some(error)) => eprintln!(
                "{} Could not read {}: {error}",
                style("✗").red(),
                store.path().display()
            ),
            (None, None) => println!("• No configuration file at {}", store.path().display()),
        },
        OutputFormat::Json => {
            let output = serde_json::json!({
                "path": store.path(),
                "exists": snapshot.exists,
                "content": snapshot.content,
                "error": snapshot.error,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(snapshot.error.is_none())
}

fn run_config_set(ctx: &AppContext, file: &Path, format: OutputFormat) -> Result<bool> {
    let content = if file.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read configuration from stdin")?;
        buf
    } else {
        std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?
    };

    let store = ctx.tool_config_store();
    let outcome = store.write(&content);

    match format {
        OutputFormat::Table => match &outcome.error {
            None => println!("{} Wrote {}", style("✓").green(), store.path().display()),
            Some(error) => eprintln!(
                "{} Could not write {}: {error}",
                style("✗").red(),
                store.path().display()
            ),
        },
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
    }

    Ok(outcome.success)
}
