use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{fs, path::PathBuf, process};
use tracing::Level;

use provcheck::locate::RunningProcess;
use provcheck::tools::{detect_tools, SystemRunner};
use provcheck::{Session, VerifyRequest};

#[derive(Parser)]
#[command(
    name = "provcheck",
    about = "Verify a release binary against its supply-chain evidence",
    version
)]
struct Cli {
    /// Log diagnostics to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run all fourteen checks against a binary
    Verify {
        /// Binary to verify (defaults to this executable when it is a packaged release)
        #[arg(long)]
        file: Option<PathBuf>,

        /// Source repository as OWNER/REPO (overrides GITHUB_REPOSITORY)
        #[arg(long)]
        repo: Option<String>,

        /// Config JSON (a provcheck.json next to the binary may only adjust timeouts and expected artifacts)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the report as JSON instead of text
        #[arg(long)]
        json: bool,

        /// Also write the JSON report to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Report which external verification tools are installed
    Tools,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let code = match cli.cmd {
        Cmd::Verify {
            file,
            repo,
            config,
            json,
            report,
        } => verify(
            VerifyRequest {
                binary: file.as_deref(),
                repository: repo.as_deref(),
                config: config.as_deref(),
            },
            json,
            report,
        )?,
        Cmd::Tools => tools(),
    };
    process::exit(code);
}

fn verify(request: VerifyRequest<'_>, json: bool, report_path: Option<PathBuf>) -> Result<i32> {
    let runner = SystemRunner;
    let session = Session::resolve(request, &runner, &RunningProcess::detect())?;
    let report = session.run();

    if let Some(path) = &report_path {
        fs::write(path, report.to_json()?)
            .with_context(|| format!("write report {}", path.display()))?;
    }

    if json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.render_text());
        if let Some(path) = &report_path {
            println!("→ Report: {}", path.display());
        }
    }
    Ok(report.exit_code())
}

fn tools() -> i32 {
    let available = detect_tools(&SystemRunner);
    if available.all_available() {
        println!("✓ cosign, gh and osv-scanner are installed");
        return 0;
    }
    for line in available.missing_tools_report() {
        eprintln!("✗ {line}");
    }
    1
}
