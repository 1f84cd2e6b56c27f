mod remote;
mod reports;
mod runner;
mod scenarios;
mod util;

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::time::Instant;
use tokio::task::LocalSet;

use runner::{ScenarioResult, ScenarioRunner};
use scenarios::Scenario;
use util::{parse_seeds, split_csv};

#[derive(Debug, Parser)]
#[command(name = "zora-tester", version)]
#[command(about = "Scripted QA scenarios for Zora progress, milestones and cloud sync")]
struct Args {
    /// Scenarios to run (comma-separated, or "all")
    #[arg(long, default_value = "all")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations per scenario and seed
    #[arg(long, default_value_t = 3)]
    iterations: usize,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    let scenarios = expand_scenarios(&args.scenarios)?;
    let seeds = parse_seeds(&split_csv(&args.seeds))?;
    if args.report == "console" {
        announce_banner();
    }

    let start_time = Instant::now();
    let results = LocalSet::new()
        .run_until(run_scenarios(&args, &scenarios, &seeds))
        .await;
    write_reports(&args, &results, start_time)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }
    Ok(())
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available scenarios:")?;
    for scenario in Scenario::ALL {
        writeln!(
            output_target.writer(),
            "  {:18} - {}",
            scenario.key(),
            scenario.description()
        )?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🏰 Zora Progress Tester".bright_cyan().bold());
    println!("{}", "=======================".cyan());
}

fn expand_scenarios(scenarios_arg: &str) -> Result<Vec<Scenario>> {
    let mut scenarios = Vec::new();
    for key in split_csv(scenarios_arg) {
        let picked: Vec<Scenario> = if key == "all" {
            Scenario::ALL.to_vec()
        } else {
            match Scenario::from_key(&key) {
                Some(scenario) => vec![scenario],
                None => bail!("Unknown scenario: {key}"),
            }
        };
        for scenario in picked {
            if !scenarios.contains(&scenario) {
                scenarios.push(scenario);
            }
        }
    }
    if scenarios.is_empty() {
        bail!("No scenarios selected");
    }
    Ok(scenarios)
}

async fn run_scenarios(args: &Args, scenarios: &[Scenario], seeds: &[u64]) -> Vec<ScenarioResult> {
    let runner = ScenarioRunner::new(args.verbose);
    let mut results = Vec::new();
    for &scenario in scenarios {
        log::info!("Running scenario {}", scenario.key());
        results.extend(runner.run_scenario(scenario, seeds, args.iterations).await);
    }
    results
}

fn write_reports(args: &Args, results: &[ScenarioResult], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => reports::generate_json_report(&mut output_target, results)?,
        "markdown" => reports::generate_markdown_report(&mut output_target, results)?,
        _ => {
            reports::generate_console_report(&mut output_target, results, start_time.elapsed())?;
            writeln!(&mut output_target)?;
            writeln!(&mut output_target, "🏁 Total time: {:?}", start_time.elapsed())?;
        }
    }
    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
