use anyhow::{Context, Result};
use ci_runner::{
    cli::{
        commands::{ListCommand, RunCommand, TargetsCommand, ValidateCommand},
        output::*,
        Cli, Command, EXIT_CONFIG_ERROR,
    },
    core::{
        config::{ConfigSource, PipelineConfig},
        WorkContext,
    },
    execution::ExecutionEngine,
    toolchain::{SubprocessToolchain, Toolchain, ToolchainConfig},
};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() {
    let cli = Cli::from_args();

    if let Err(e) = init_logging(&cli) {
        eprintln!("{} {:#}", CROSS, e);
        std::process::exit(EXIT_CONFIG_ERROR);
    }

    // Execute command
    let result = match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd, &cli).await,
        Command::Validate(cmd) => validate_pipeline(cmd),
        Command::List(cmd) => list_steps(cmd),
        Command::Targets(cmd) => list_targets(cmd).await,
    };

    let code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", CROSS, style(format!("{:#}", e)).red());
            EXIT_CONFIG_ERROR
        }
    };
    std::process::exit(code);
}

fn init_logging(cli: &Cli) -> Result<()> {
    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")
}

/// Absolute working tree for a `-C` argument
fn working_dir(dir: Option<&Path>) -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let dir = match dir {
        Some(dir) => cwd.join(dir),
        None => cwd,
    };
    if !dir.is_dir() {
        anyhow::bail!("{} is not a directory", dir.display());
    }
    Ok(dir)
}

fn load_config(file: Option<&Path>, dir: &Path) -> Result<(PipelineConfig, ConfigSource)> {
    let (config, source) =
        PipelineConfig::load(file, dir).context("Failed to load pipeline config")?;
    debug!("Loaded pipeline {} from {}", config.name, source);
    Ok((config, source))
}

async fn run_pipeline(cmd: &RunCommand, cli: &Cli) -> Result<i32> {
    let dir = working_dir(cmd.dir.as_deref())?;
    let (config, source) = load_config(cmd.file.as_deref(), &dir)?;
    let pipeline = config.to_pipeline()?;

    // Reports go to stdout; keep it clean when printing JSON
    let to_stderr = cmd.json;
    let show_events = !cli.quiet;

    if show_events {
        let line = format!(
            "{} Loaded pipeline {} from {}",
            INFO,
            style(&pipeline.name).bold(),
            style(&source).dim()
        );
        if to_stderr {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }

    let mut ctx = WorkContext::new(&dir);
    for (key, value) in &cmd.env {
        ctx.set_env(key, value);
    }
    for (key, value) in &cmd.var {
        ctx.set_variable(key, value);
    }

    let toolchain =
        SubprocessToolchain::new(ToolchainConfig::new().with_stdout_to_stderr(to_stderr));
    let mut engine = ExecutionEngine::new(toolchain);

    // Set up event handler for console output
    if show_events {
        engine.add_event_handler(move |event| {
            let line = format_execution_event(event);
            if to_stderr {
                eprintln!("{}", line);
            } else {
                println!("{}", line);
            }
        });
    }

    let result = engine.run(&pipeline, &ctx).await;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("\n{}", format_run_summary(&result));
    }

    Ok(result.exit_code())
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<i32> {
    let dir = working_dir(cmd.dir.as_deref())?;
    let (config, source) = load_config(cmd.file.as_deref(), &dir)?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(0);
    }

    println!("{} Pipeline configuration is valid!", CHECK);
    println!("  Name: {}", style(&config.name).bold());
    println!("  Source: {}", style(&source).dim());
    println!("  Steps: {}", style(config.steps.len()).cyan());
    println!("  Variables: {}", style(config.variables.len()).cyan());
    Ok(0)
}

fn list_steps(cmd: &ListCommand) -> Result<i32> {
    let dir = working_dir(cmd.dir.as_deref())?;
    let (config, _) = load_config(cmd.file.as_deref(), &dir)?;
    let pipeline = config.to_pipeline()?;

    println!(
        "{} {} ({} steps)",
        INFO,
        style(&pipeline.name).bold(),
        pipeline.len()
    );
    for planned in pipeline.plan(&WorkContext::new(&dir)) {
        println!("{}", format_planned_step(&planned));
    }
    Ok(0)
}

async fn list_targets(cmd: &TargetsCommand) -> Result<i32> {
    let dir = working_dir(cmd.dir.as_deref())?;
    let toolchain = SubprocessToolchain::default();

    let targets = toolchain.enumerate_targets(&WorkContext::new(&dir)).await;
    if targets.is_empty() {
        eprintln!("{} No example targets found", INFO);
    }
    for target in targets {
        println!("{}", target);
    }
    Ok(0)
}
