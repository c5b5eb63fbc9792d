//! prefbench CLI - Compare preference-tuned models and convert preference datasets.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use prefbench::client::{EndpointRegistry, HealthStatus};
use prefbench::compare::{
    ComparisonRunner, Console, EndpointGenerator, MenuChoice, ReportWriter, comparison_title,
    read_menu_choice,
};
use prefbench::dataset::{DatasetRegistry, HumanLikeDpoDataset, convert, load_examples, write_pairs};
use prefbench::models::Config;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "prefbench")]
#[command(version)]
#[command(about = "Compare DPO/GRPO tuned models side by side and convert preference datasets")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file (default: prefbench.toml if present, else built-in models)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Choose between predefined tests and interactive mode (default)
    Menu,

    /// Run the predefined comparison scenarios
    Compare {
        /// Do not wait for Enter between scenarios
        #[arg(long)]
        no_pause: bool,

        /// Append every generation to this JSONL file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Compare models on prompts typed at the terminal
    Interactive {
        /// Append every generation to this JSONL file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Preference dataset tools
    Dataset {
        #[command(subcommand)]
        command: DatasetCommands,
    },

    /// Validate configuration file
    Validate,

    /// Check that every configured endpoint responds
    Health,

    /// Show example configuration
    Example,
}

#[derive(Subcommand)]
enum DatasetCommands {
    /// List registered dataset adapters
    List,

    /// Convert raw preference records to conversation-form JSONL
    Convert {
        /// Registered dataset name
        #[arg(short, long, default_value = HumanLikeDpoDataset::NAME)]
        dataset: String,

        /// Path to input JSONL (or JSON array) file
        #[arg(short, long)]
        input: PathBuf,

        /// Path to output JSONL file
        #[arg(short, long)]
        output: PathBuf,

        /// Convert at most this many records
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn log_level(verbose: bool) -> Level {
    if verbose { Level::DEBUG } else { Level::WARN }
}

/// Logs go to stderr; stdout carries the comparison itself.
fn setup_logging(verbose: bool) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(verbose))
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")
}

fn print_example_config() {
    let example = r#"# prefbench configuration file

# OpenAI-compatible servers hosting the checkpoints (vLLM, TGI, Ollama, llama.cpp)
[endpoints.local]
base_url = "http://localhost:8000/v1"
# api_key_env = "LOCAL_API_KEY"
timeout_secs = 180
max_retries = 1

[models.dpo]
id = "output/learn_dpo/checkpoint-50"
label = "DPO Model (after preference training)"
marker = "🟢"
setup_hint = "oumi train -c configs/examples/learn_dpo_laptop.yaml"

[models.grpo]
id = "output/learn_grpo/checkpoint-30"
label = "GRPO Model (after reward-based training)"
marker = "🟡"
setup_hint = "oumi train -c configs/examples/learn_grpo_laptop.yaml"

[models.base_qwen]
id = "Qwen/Qwen2-0.5B-Instruct"
label = "Base Model (Qwen 0.5B - before GRPO)"
marker = "🟣"

[comparison]
contenders = ["dpo", "grpo"]
pause = true
interactive_max_tokens = 128
# report_path = "output/comparison.jsonl"

[[scenarios]]
name = "Letter Counting (GRPO's Strength)"
prompt = "How many times does the letter 't' appear in the word 'constitution'? Format your answer as \\boxed{number}."
max_tokens = 100
expected = "GRPO model should correctly answer \\boxed{3}"
expected_answer = "3"
baselines = [{ model = "base_qwen", before = "grpo" }]
"#;
    println!("{example}");
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = Config::load(path).with_context(|| match path {
        Some(path) => format!("Failed to load config from {path:?}"),
        None => "Failed to load default config".to_string(),
    })?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn build_generator(config: &Config) -> Result<EndpointGenerator> {
    let registry =
        EndpointRegistry::from_config(config).context("Failed to set up endpoint clients")?;
    Ok(EndpointGenerator::new(registry))
}

fn build_runner<'a>(
    config: &'a Config,
    generator: &'a EndpointGenerator,
    report: Option<PathBuf>,
) -> Result<ComparisonRunner<'a>> {
    let mut runner = ComparisonRunner::new(config, generator);
    if let Some(path) = report.or_else(|| config.comparison.report_path.clone()) {
        let writer = ReportWriter::open(&path)
            .with_context(|| format!("Failed to open report file {path:?}"))?;
        runner = runner.with_report(writer);
    }
    Ok(runner)
}

fn print_report_location<W: Write>(
    runner: &ComparisonRunner<'_>,
    console: &mut Console<W>,
) -> Result<()> {
    if let Some(report) = runner.report() {
        console.line(format_args!(
            "Report:      {:?} ({} records)",
            report.path(),
            report.written()
        ))?;
    }
    Ok(())
}

async fn run_compare<R: BufRead, W: Write>(
    runner: &mut ComparisonRunner<'_>,
    input: &mut R,
    console: &mut Console<W>,
) -> Result<()> {
    runner.run_scenarios(input, console).await?;
    print_report_location(runner, console)
}

async fn run_interactive<R: BufRead, W: Write>(
    runner: &mut ComparisonRunner<'_>,
    input: &mut R,
    console: &mut Console<W>,
) -> Result<()> {
    runner.run_interactive(input, console).await?;
    print_report_location(runner, console)
}

/// Show the start menu and run the chosen mode. `false` on an invalid choice.
///
/// The config is only required once a comparison is chosen, so a broken
/// config file never blocks leaving the menu.
async fn run_menu<R: BufRead, W: Write>(
    config_path: Option<&Path>,
    input: &mut R,
    console: &mut Console<W>,
) -> Result<bool> {
    let loaded = load_config(config_path);
    let title = match &loaded {
        Ok(config) => comparison_title(config),
        Err(_) => comparison_title(&Config::default()),
    };

    let choice = match read_menu_choice(&title, input, console)? {
        Some(MenuChoice::Exit) => {
            console.line("Goodbye! 👋")?;
            return Ok(true);
        }
        Some(choice) => choice,
        None => {
            console.line("Invalid choice. Exiting.")?;
            return Ok(false);
        }
    };

    let config = loaded?;
    let generator = build_generator(&config)?;
    let mut runner = build_runner(&config, &generator, None)?;
    if choice == MenuChoice::Compare {
        run_compare(&mut runner, input, console).await?;
    } else {
        run_interactive(&mut runner, input, console).await?;
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    let config_path = cli.config.as_deref();
    let mut input = io::stdin().lock();
    let mut console = Console::new(io::stdout());

    match cli.command.unwrap_or(Commands::Menu) {
        Commands::Example => {
            print_example_config();
        }

        Commands::Validate => {
            let config = load_config(config_path)?;

            info!("Configuration is valid");
            println!("Configuration is valid");
            println!("  Endpoints:   {}", config.endpoints.len());
            println!("  Models:      {}", config.models.len());
            println!("  Contenders:  {}", config.comparison.contenders.join(", "));
            println!("  Scenarios:   {}", config.scenarios.len());
        }

        Commands::Health => {
            let config = load_config(config_path)?;
            let registry = EndpointRegistry::from_config(&config)
                .context("Failed to set up endpoint clients")?;

            let results = registry.health_check_all().await;
            let mut all_healthy = true;

            for result in &results {
                all_healthy &= result.status == HealthStatus::Healthy;
                let latency = result
                    .latency_ms
                    .map(|ms| format!("{ms}ms"))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<16} {:<12} {:>8}  {}",
                    result.endpoint,
                    result.status.to_string(),
                    latency,
                    result.error.as_deref().unwrap_or("")
                );
            }

            if !all_healthy {
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::Dataset { command } => match command {
            DatasetCommands::List => {
                for name in DatasetRegistry::with_builtins().names() {
                    println!("{name}");
                }
            }

            DatasetCommands::Convert {
                dataset,
                input: input_path,
                output,
                limit,
            } => {
                let registry = DatasetRegistry::with_builtins();
                let adapter = registry.get(&dataset)?;

                let mut examples = load_examples(&input_path)
                    .with_context(|| format!("Failed to load records from {input_path:?}"))?;
                if let Some(limit) = limit {
                    examples.truncate(limit);
                }

                let pb = ProgressBar::new(examples.len() as u64);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg}")?
                        .progress_chars("##-"),
                );

                let pairs = convert(adapter.as_ref(), &examples, || pb.inc(1))?;
                pb.finish_with_message("converted");

                let written = write_pairs(&output, &pairs)?;

                println!("\n=== Dataset Conversion Complete ===");
                println!("Dataset:     {}", adapter.name());
                println!("Records:     {}", examples.len());
                println!("Written:     {written}");
                println!("Output:      {output:?}");
            }
        },

        Commands::Compare { no_pause, report } => {
            let config = load_config(config_path)?;
            let generator = build_generator(&config)?;
            let mut runner = build_runner(&config, &generator, report)?;
            if no_pause {
                runner = runner.with_pause(false);
            }
            run_compare(&mut runner, &mut input, &mut console).await?;
        }

        Commands::Interactive { report } => {
            let config = load_config(config_path)?;
            let generator = build_generator(&config)?;
            let mut runner = build_runner(&config, &generator, report)?;
            run_interactive(&mut runner, &mut input, &mut console).await?;
        }

        Commands::Menu => {
            if !run_menu(config_path, &mut input, &mut console).await? {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
