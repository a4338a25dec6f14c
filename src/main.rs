//! `vidgen` command line entry point

use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use vidgen::reference::{ReferenceValidator, default_probe};
use vidgen::{
    Config, DownloadError, Error, GenerationError, JobId, MetadataStore, Pipeline, SubmitError,
};

#[derive(Debug, Parser)]
#[command(name = "vidgen", version, about = "Generate a video from a prompt and download it")]
struct Cli {
    /// Job checkpoint directory
    #[arg(long, global = true, env = "VIDGEN_METADATA_DIR")]
    metadata_dir: Option<PathBuf>,

    /// Artifact output directory
    #[arg(long, global = true, env = "VIDGEN_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Submit a prompt, wait for the render and download it
    Generate {
        /// Markdown prompt file; headings and blank lines are ignored
        #[arg(long, default_value = "prompt.md")]
        prompt_file: PathBuf,

        /// Reference image, a file under the input directory
        #[arg(long)]
        reference: Option<String>,

        /// Directory reference images must live under
        #[arg(long, env = "VIDGEN_INPUT_DIR")]
        input_dir: Option<PathBuf>,

        /// Skip the paid-submission confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Print the stored checkpoint of a job
    Show {
        /// Job identifier issued by the service
        id: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            report_failure(&e, &Config::default().paths.output_dir);
            return ExitCode::FAILURE;
        }
    };
    let output_dir = config.paths.output_dir.clone();

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_failure(&e, &output_dir);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> vidgen::Result<Config> {
    let mut config = Config::from_env()?;
    if let Some(dir) = &cli.metadata_dir {
        config.paths.metadata_dir = dir.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.paths.output_dir = dir.clone();
    }
    Ok(config)
}

async fn run(command: Command, mut config: Config) -> vidgen::Result<()> {
    match command {
        Command::Generate {
            prompt_file,
            reference,
            input_dir,
            yes,
        } => {
            if let Some(dir) = input_dir {
                config.paths.input_dir = dir;
            }
            generate(config, &prompt_file, reference.as_deref(), yes).await
        }
        Command::Show { id } => show(&config, &JobId::new(id)).await,
    }
}

async fn generate(
    config: Config,
    prompt_file: &Path,
    reference: Option<&str>,
    yes: bool,
) -> vidgen::Result<()> {
    let prompt = vidgen::prompt::read_prompt(prompt_file).await?;
    let pipeline = Pipeline::new(config.clone())?;

    let reference = match reference {
        Some(raw) => {
            let probe = default_probe();
            let validator = ReferenceValidator::new(
                &config.paths.input_dir,
                config.generation.frame_size,
                probe.as_deref(),
            );
            Some(validator.load(raw).await?)
        }
        None => None,
    };

    println!("Generation parameters:");
    println!("  model:     {}", config.generation.model);
    println!("  duration:  {}s", config.generation.duration_seconds);
    println!("  size:      {}", config.generation.frame_size);
    if let Some(image) = &reference {
        println!("  reference: {}", image.path.display());
    }
    println!("  prompt:    {}", preview(&prompt, 100));

    if !yes && !confirm("This submission may be billed. Continue?")? {
        println!("Cancelled, nothing was submitted.");
        return Ok(());
    }

    let job = pipeline.run(&prompt, reference.as_ref()).await?;
    if let Some(artifact) = &job.artifact {
        println!("Video saved: {}", artifact.file_path.display());
        println!("  size:   {} bytes", artifact.size_bytes);
        println!("  sha256: {}", artifact.sha256);
    }
    Ok(())
}

async fn show(config: &Config, id: &JobId) -> vidgen::Result<()> {
    let store = MetadataStore::new(config.paths.metadata_dir.clone());
    let job = store.require(id).await?;
    println!("{}", serde_json::to_string_pretty(&job)?);
    Ok(())
}

fn confirm(question: &str) -> vidgen::Result<bool> {
    print!("{question} [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

fn manual_download_command(url: &str, id: &JobId, output_dir: &Path) -> String {
    let target = output_dir.join(format!("{id}.mp4"));
    format!(
        "curl -H \"Authorization: Bearer $SORA_API_KEY\" '{url}' > '{}'",
        target.display()
    )
}

fn report_failure(error: &Error, output_dir: &Path) {
    eprintln!("Error: {error}");
    match error {
        Error::Submit(SubmitError::ModerationRejected { .. }) => {
            eprintln!("The prompt was rejected by moderation before generation.");
            eprintln!("You were NOT charged for this request.");
            eprintln!("Suggestions:");
            eprintln!("  - rephrase the prompt to avoid sensitive content");
            eprintln!("  - avoid violent, sexual or otherwise inappropriate descriptions");
            eprintln!("  - use more neutral, descriptive language");
        }
        Error::Generation(GenerationError::Failed {
            id,
            billable_moderation: true,
            ..
        }) => {
            eprintln!("The video was rejected by moderation after generation started.");
            eprintln!("This job was billed; contact support for a refund with job id {id}.");
        }
        Error::Generation(GenerationError::Timeout { id, .. }) => {
            eprintln!("The job may still finish. Check it later with job id {id}.");
        }
        Error::Generation(GenerationError::StatusCheck { id, .. }) => {
            eprintln!("The job may still finish server-side. Its checkpoint keeps job id {id}.");
        }
        Error::Download(DownloadError::Exhausted { id, url, .. }) => {
            eprintln!("The video was generated but could not be downloaded (job id {id}).");
            eprintln!("Download it manually with:");
            eprintln!("  {}", manual_download_command(url, id, output_dir));
        }
        Error::JobNotFound { .. } => {
            eprintln!("Checkpoints are written by `vidgen generate`; check --metadata-dir.");
        }
        _ => {}
    }
}
