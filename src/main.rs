//! gitscribe - CLI entry point.

use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use dialoguer::{Confirm, Input, Select};
use git2::Repository;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use gitscribe::config::{CONFIG_KEYS, ConfigFile, Settings};
use gitscribe::diff::{DiffSource, GitDiffSource};
use gitscribe::generate::Generator;
use gitscribe::llm::provider::API_KEY_SECRET;
use gitscribe::llm::{Provider, build_service, check_claude_installed};
use gitscribe::secrets::SecretStore;
use gitscribe::{CandidateMessage, CompletionError, GenerationError, commit_staged};

/// Environment variable holding the tracing filter.
const LOG_ENV_VAR: &str = "GITSCRIBE_LOG";

/// Draft a commit message for the staged changes with an LLM.
#[derive(Parser, Debug)]
#[command(name = "gitscribe")]
#[command(about = "Draft a commit message for the staged changes with an LLM")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    generate: GenerateArgs,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read or write the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print one value, or every value when no key is given
    Get { key: Option<String> },
    /// Validate and store a value
    Set { key: String, value: String },
    /// Print the config file location
    Path,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Stage modifications of tracked files before generating
    #[arg(short, long)]
    all: bool,

    /// Glob of files to leave out of the prompt (repeatable)
    #[arg(short = 'x', long = "exclude")]
    exclude: Vec<String>,

    /// Number of messages to generate
    #[arg(short, long)]
    generate: Option<u32>,

    /// Message style: plain, conventional, or gitmoji
    #[arg(short = 't', long = "type")]
    style: Option<String>,

    /// Language of the message
    #[arg(long)]
    locale: Option<String>,

    /// Maximum message length in characters
    #[arg(long)]
    max_length: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// HTTP(S) proxy for provider requests
    #[arg(long)]
    proxy: Option<String>,

    /// Token budget per chunk for very large diffs
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Large diff handling: auto, summary, or chunked
    #[arg(long)]
    large_diff: Option<String>,

    /// Completion provider: openai or claude
    #[arg(long)]
    provider: Option<String>,

    /// Model name passed to the provider
    #[arg(long)]
    model: Option<String>,

    /// Print the message without committing
    #[arg(long)]
    dry_run: bool,

    /// Accept the first message without prompting
    #[arg(short, long)]
    yes: bool,
}

impl GenerateArgs {
    /// Flag overrides as config keys, applied last.
    fn overrides(&self) -> Vec<(&'static str, &'static str, String)> {
        let mut out = Vec::new();
        let mut push = |key, flag, value: Option<String>| {
            if let Some(value) = value {
                out.push((key, flag, value));
            }
        };
        push("generate", "--generate", self.generate.map(|v| v.to_string()));
        push("type", "--type", self.style.clone());
        push("locale", "--locale", self.locale.clone());
        push("max_length", "--max-length", self.max_length.map(|v| v.to_string()));
        push("timeout", "--timeout", self.timeout.map(|v| v.to_string()));
        push("proxy", "--proxy", self.proxy.clone());
        push("chunk_size", "--chunk-size", self.chunk_size.map(|v| v.to_string()));
        push("large_diff", "--large-diff", self.large_diff.clone());
        push("provider", "--provider", self.provider.clone());
        push("model", "--model", self.model.clone());
        out
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Some(Command::Config { action }) => run_config(action),
        None => run_generate(&cli.generate).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if let Some(hint) = hint_for(&e) {
                eprintln!("Hint: {}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("gitscribe=debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Remediation text for the first error in the chain that carries one.
fn hint_for(err: &anyhow::Error) -> Option<&'static str> {
    err.chain().find_map(|cause| {
        cause
            .downcast_ref::<GenerationError>()
            .map(GenerationError::hint)
            .or_else(|| cause.downcast_ref::<CompletionError>().map(CompletionError::remediation))
    })
}

async fn run_generate(args: &GenerateArgs) -> Result<()> {
    let config_file = match ConfigFile::default_location() {
        Ok(file) => Some(file),
        Err(e) => {
            warn!("{}; using defaults", e);
            None
        }
    };

    let mut settings = Settings::load(config_file.as_ref()).context("Failed to load settings")?;
    for (key, flag, value) in args.overrides() {
        settings
            .set(key, &value)
            .with_context(|| format!("Invalid {} value", flag))?;
    }

    let repo = Repository::discover(".")
        .context("Not a git repository. Run gitscribe from within a git repository.")?;
    let source = GitDiffSource::new(&repo);

    if args.all {
        source.stage_tracked().context("Failed to stage tracked files")?;
    }

    let Some(staged) = source
        .staged_changes(&args.exclude)
        .context("Failed to read staged changes")?
    else {
        println!("No staged changes found. Stage files with `git add` or pass --all.");
        return Ok(());
    };

    println!("Detected {} staged file(s)", staged.files.len());

    let stats = match source.change_statistics(&args.exclude) {
        Ok(stats) => stats,
        Err(e) => {
            warn!("Could not collect change statistics: {}", e);
            None
        }
    };

    if settings.provider == Provider::Claude {
        check_claude_installed()
            .await
            .context("Claude Code CLI is required for the claude provider")?;
    }

    let secrets = SecretStore::default_chain(config_file);
    let service = build_service(&settings, &secrets)
        .context("Failed to configure the completion provider")?;
    let generator = Generator::new(service);

    println!("Generating commit message with {}...", settings.provider);
    let candidates = generator
        .generate_for_staged(&settings.request(), &staged, stats.as_ref())
        .await?;

    let Some(message) = choose_message(&candidates, args.yes)? else {
        println!("Commit cancelled.");
        return Ok(());
    };

    if args.dry_run {
        println!("{}", message);
        return Ok(());
    }

    let oid = commit_staged(&repo, &message).context("Failed to create commit")?;
    let short = oid.to_string();
    println!("✓ Committed {}: {}", &short[..7.min(short.len())], message);
    Ok(())
}

/// Let the user accept, edit, or reject the generated messages.
fn choose_message(candidates: &[CandidateMessage], yes: bool) -> Result<Option<String>> {
    let Some(first) = candidates.first() else {
        bail!(GenerationError::NoMessagesGenerated { last_error: None });
    };

    if yes {
        return Ok(Some(first.text.clone()));
    }

    let chosen = if let [only] = candidates {
        println!("\n  {}\n", only.text);
        let accept = Confirm::new()
            .with_prompt("Use this commit message?")
            .default(true)
            .interact()?;
        if accept {
            return Ok(Some(only.text.clone()));
        }
        let edit = Confirm::new()
            .with_prompt("Edit it instead?")
            .default(false)
            .interact()?;
        if !edit {
            return Ok(None);
        }
        only.text.clone()
    } else {
        let mut items: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
        items.push("Cancel".to_string());
        let selection = Select::new()
            .with_prompt("Pick a commit message (you can edit it next)")
            .items(&items)
            .default(0)
            .interact()?;
        match candidates.get(selection) {
            Some(candidate) => candidate.text.clone(),
            None => return Ok(None),
        }
    };

    let edited: String = Input::new()
        .with_prompt("Commit message")
        .with_initial_text(chosen)
        .interact_text()?;
    let edited = edited.trim();
    Ok((!edited.is_empty()).then(|| edited.to_string()))
}

fn run_config(action: ConfigAction) -> Result<()> {
    let file = ConfigFile::default_location().context("Failed to locate the config file")?;

    match action {
        ConfigAction::Get { key: Some(key) } => {
            if !CONFIG_KEYS.contains(&key.as_str()) {
                bail!("Unknown config key '{}'. Known keys: {}", key, CONFIG_KEYS.join(", "));
            }
            if let Some(value) = file.get(&key)? {
                println!("{}", value);
            }
        }
        ConfigAction::Get { key: None } => {
            for (key, value) in file.entries()? {
                if key == API_KEY_SECRET {
                    println!("{} = {}", key, mask(&value));
                } else {
                    println!("{} = {}", key, value);
                }
            }
        }
        ConfigAction::Set { key, value } => {
            file.set(&key, &value)
                .with_context(|| format!("Failed to set '{}'", key))?;
            println!("✓ Saved {} to {}", key, file.path().display());
        }
        ConfigAction::Path => println!("{}", file.path().display()),
    }
    Ok(())
}

/// Show only the tail of a secret.
fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), tail)
}
