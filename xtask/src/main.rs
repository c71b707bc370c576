use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use std::process::{Command, Stdio};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "x")]
#[command(about = "Development automation for emu-pacer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Format check, clippy and tests, with and without the audio backend
    Ci,
    /// Format code
    Fmt {
        #[arg(long)]
        check: bool,
    },
    /// Run clippy on every target
    Clippy {
        /// Build without the cpal audio backend
        #[arg(long)]
        no_audio: bool,
    },
    /// Run tests
    Test {
        /// Which suite to run
        #[arg(value_enum, default_value_t = Suite::All)]
        suite: Suite,
        /// Build without the cpal audio backend
        #[arg(long)]
        no_audio: bool,
    },
    /// Run criterion benchmarks
    Bench {
        /// Which benchmark target to run
        #[arg(value_enum, default_value_t = BenchTarget::All)]
        target: BenchTarget,
        /// Only run benchmarks whose name contains this filter
        filter: Option<String>,
    },
    /// Run the test pattern front-end
    Demo {
        /// Path to the configuration file
        config: Option<String>,
        #[arg(long)]
        release: bool,
        /// Build without the cpal audio backend
        #[arg(long)]
        no_audio: bool,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Suite {
    /// Unit, integration and doc tests
    All,
    /// Unit tests inside the library
    Unit,
    /// Jittered-host pacing simulations
    Pacing,
    /// Audio pipeline and WAV capture through a session
    Audio,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BenchTarget {
    All,
    /// Pacing arithmetic and heartbeats
    Scheduler,
    /// Audio pull path
    Audio,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci => run_ci(),
        Commands::Fmt { check } => run_fmt(check),
        Commands::Clippy { no_audio } => run_clippy(no_audio),
        Commands::Test { suite, no_audio } => run_test(suite, no_audio),
        Commands::Bench { target, filter } => run_bench(target, filter.as_deref()),
        Commands::Demo {
            config,
            release,
            no_audio,
        } => run_demo(config.as_deref(), release, no_audio),
    }
}

/// `cargo <subcommand>` with the audio feature selected
fn cargo(subcommand: &str, no_audio: bool) -> Command {
    let mut cmd = Command::new("cargo");
    cmd.arg(subcommand);
    if no_audio {
        cmd.arg("--no-default-features");
    }
    cmd
}

/// CI machines usually lack an ALSA development package
fn headless() -> bool {
    std::env::var("CI").is_ok()
}

fn run_ci() -> Result<()> {
    println!("{}", "=== emu-pacer CI ===".bold().blue());
    let start = Instant::now();

    step("Format check", || run_fmt(true))?;
    step("Clippy (no audio)", || run_clippy(true))?;
    step("Tests (no audio)", || run_test(Suite::All, true))?;
    if headless() {
        println!("{} Skipping audio backend build on CI", "→".blue());
    } else {
        step("Clippy (audio)", || run_clippy(false))?;
        step("Tests (audio)", || run_test(Suite::All, false))?;
    }

    println!(
        "\n{} {}",
        "✓ CI passed in".green().bold(),
        format!("{:.2}s", start.elapsed().as_secs_f64()).bold()
    );
    Ok(())
}

fn run_fmt(check: bool) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.args(["fmt", "--all"]);
    if check {
        cmd.args(["--", "--check"]);
    }
    execute(&mut cmd)
}

fn run_clippy(no_audio: bool) -> Result<()> {
    let mut cmd = cargo("clippy", no_audio || headless());
    cmd.args(["--workspace", "--all-targets", "--", "-D", "warnings"]);
    execute(&mut cmd)
}

fn run_test(suite: Suite, no_audio: bool) -> Result<()> {
    let mut cmd = cargo("test", no_audio || headless());
    match suite {
        Suite::All => {}
        Suite::Unit => {
            cmd.arg("--lib");
        }
        Suite::Pacing => {
            cmd.args(["--test", "scheduler_tests"]);
        }
        Suite::Audio => {
            cmd.args(["--test", "audio_tests"]);
        }
    }
    execute(&mut cmd)
}

fn run_bench(target: BenchTarget, filter: Option<&str>) -> Result<()> {
    let mut cmd = cargo("bench", headless());
    match target {
        BenchTarget::All => {}
        BenchTarget::Scheduler => {
            cmd.args(["--bench", "scheduler_bench"]);
        }
        BenchTarget::Audio => {
            cmd.args(["--bench", "audio_bench"]);
        }
    }
    if let Some(filter) = filter {
        cmd.arg("--").arg(filter);
    }
    execute(&mut cmd)
}

fn run_demo(config: Option<&str>, release: bool, no_audio: bool) -> Result<()> {
    if let Some(path) = config {
        if std::path::Path::new(path).exists() {
            println!("{} Config file: {}", "✓".green(), path.cyan());
        } else {
            println!(
                "{} {} does not exist yet; defaults will be written there",
                "⚠".yellow().bold(),
                path.yellow()
            );
        }
    }

    let mut cmd = cargo("run", no_audio);
    cmd.args(["--bin", "emu-pacer"]);
    if release {
        cmd.arg("--release");
    }
    if let Some(path) = config {
        cmd.arg("--").arg(path);
    }
    execute(&mut cmd)
}

fn step<F>(name: &str, task: F) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    println!("{} {}", "→".blue(), name.bold());
    let start = Instant::now();
    let result = task();
    match &result {
        Ok(()) => println!(
            "{} {} ({:.2}s)\n",
            "✓".green().bold(),
            name,
            start.elapsed().as_secs_f64()
        ),
        Err(_) => println!("{} {}\n", "✗".red().bold(), name),
    }
    result
}

fn execute(cmd: &mut Command) -> Result<()> {
    let status = cmd
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()?;
    if !status.success() {
        anyhow::bail!("command failed with {}", status);
    }
    Ok(())
}
