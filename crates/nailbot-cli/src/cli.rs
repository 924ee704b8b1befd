//! CLI definition and command dispatch for nailbot.
//!
//! ## Configuration Precedence
//!
//! Configuration is resolved with the following precedence (highest to lowest):
//! 1. CLI flags (e.g., `--config`, `--device`, `--k-local`)
//! 2. Environment variables (`NAILBOT_CONFIG`, `NAILBOT_DEVICE`, `NAILBOT_INDEX_DIR`, ...)
//! 3. Config file (`~/.nailbot/config.yaml` or path from `--config`/`NAILBOT_CONFIG`)
//! 4. Built-in defaults

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use crate::ui::format::format_millis;
use crate::ui::{table, ColorMode, MessageType, Progress, ProgressMode, Style};

use nailbot_core::query_expansion::DEFAULT_MAX_VARIANTS;
use nailbot_core::{
    format_context, retrieve_smart_with_report, ExpansionConfig, ExplanationRequest, Explainer,
    FormattedContext, NailLabel, PassageHit, Prediction, QueryExpander, RagConfig, RagError,
    RetrievalContext, RetrievalDefaults, RetrievalOptions, GENERAL_ALIASES,
};

// ============================================================================
// CLI Definition
// ============================================================================

/// Version string including git commit hash
const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");

/// nailbot – retrieval and context assembly for nail-image explanations
#[derive(Parser, Debug)]
#[command(name = "nailbot")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (debug logging, retrieval metrics)
    #[arg(short, long, global = true, env = "NAILBOT_VERBOSE")]
    pub verbose: bool,

    /// Only log errors and hide the spinner
    #[arg(short, long, global = true, env = "NAILBOT_QUIET")]
    pub quiet: bool,

    /// Path to configuration file (default: ~/.nailbot/config.yaml)
    #[arg(long, global = true, env = "NAILBOT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Device preference for embedding inference (auto/gpu/cpu)
    #[arg(long, global = true, env = "NAILBOT_DEVICE")]
    pub device: Option<String>,

    /// Color output mode: always, never, or auto (default: auto)
    #[arg(long, global = true, env = "NAILBOT_COLOR", default_value = "auto")]
    pub color: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Retrieve passages for a prompt and print the assembled context
    #[command(after_help = r#"EXAMPLES:
    # Ask with the classifier's label
    nailbot ask "apa penyebabnya?" --label pitting

    # More Scholar passages, larger context budget
    nailbot ask "kuku kebiruan" --k-scholar 5 --max-chars 6000

    # Output as JSON for scripting
    nailbot ask "kuku berlubang" --label pitting --json
"#)]
    Ask {
        /// The user's question
        prompt: String,

        /// Predicted label used for alias expansion (e.g. pitting)
        #[arg(short, long)]
        label: Option<String>,

        /// Local hits per query variant (default from config: 2)
        #[arg(long)]
        k_local: Option<usize>,

        /// Scholar hits per query variant (default from config: 3)
        #[arg(long)]
        k_scholar: Option<usize>,

        /// Hits kept after merging (default from config: 8)
        #[arg(long)]
        max_total: Option<usize>,

        /// Character budget for the context (default from config: 3600)
        #[arg(long)]
        max_chars: Option<usize>,

        /// Skip query variants that fail instead of aborting
        #[arg(long)]
        skip_failed: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Show the query variants generated for a prompt
    #[command(after_help = r#"EXAMPLES:
    nailbot expand "apa penyebabnya?" --label pitting
    nailbot expand "" --json
"#)]
    Expand {
        /// The user's question (may be empty)
        #[arg(default_value = "")]
        prompt: String,

        /// Predicted label used for alias expansion
        #[arg(short, long)]
        label: Option<String>,

        /// Maximum number of variants
        #[arg(long, default_value_t = DEFAULT_MAX_VARIANTS)]
        max_variants: usize,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Format a JSON list of hits into a context, without retrieval
    #[command(after_help = r#"EXAMPLES:
    nailbot format --hits hits.json
    nailbot format --hits hits.json --max-chars 500 --json
"#)]
    Format {
        /// JSON file holding an array of hits
        #[arg(long)]
        hits: PathBuf,

        /// Character budget for the context
        #[arg(long)]
        max_chars: Option<usize>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// List known labels and their expansion aliases
    Labels {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Explain a prediction using retrieved context
    #[command(after_help = r#"EXAMPLES:
    # Retrieve context and explain
    nailbot explain --label pitting --confidence 0.91 --prompt "apa penyebabnya?"

    # Offline: explain over previously retrieved hits
    nailbot explain --label pitting --confidence 0.91 --hits hits.json --probs probs.json
"#)]
    Explain {
        /// Predicted label
        #[arg(short, long)]
        label: String,

        /// Confidence of the predicted label, in [0, 1]
        #[arg(short, long)]
        confidence: f32,

        /// JSON object mapping each label to its probability
        #[arg(long)]
        probs: Option<PathBuf>,

        /// The user's question
        #[arg(short, long)]
        prompt: Option<String>,

        /// Explain without any retrieved context
        #[arg(long, conflicts_with = "hits")]
        no_retrieval: bool,

        /// Use hits from a JSON file instead of retrieving
        #[arg(long)]
        hits: Option<PathBuf>,

        /// Character budget for the context
        #[arg(long)]
        max_chars: Option<usize>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

/// Global flags shared by command handlers.
struct Globals {
    config: Option<PathBuf>,
    device: Option<String>,
    verbose: bool,
    quiet: bool,
}

impl Globals {
    /// Load the config file, environment overrides, then `--device`.
    fn load_config(&self) -> Result<RagConfig> {
        let mut config = RagConfig::load(self.config.as_deref()).context("Failed to load configuration")?;
        if let Some(device) = &self.device {
            config.embedding.device = device
                .parse()
                .map_err(anyhow::Error::msg)
                .context("Invalid --device")?;
        }
        Ok(config)
    }
}

// ============================================================================
// Run function
// ============================================================================

/// Run the CLI application.
///
/// Each invocation builds a fresh retrieval context, so model and collection
/// handles never outlive a single command.
pub fn run() -> ExitCode {
    let Cli {
        verbose,
        quiet,
        config,
        device,
        color,
        command,
    } = Cli::parse();

    init_tracing(verbose, quiet);

    let style = Style::new(ColorMode::parse(&color).unwrap_or_default());
    let globals = Globals {
        config,
        device,
        verbose,
        quiet,
    };

    let result = match command {
        Command::Ask {
            prompt,
            label,
            k_local,
            k_scholar,
            max_total,
            max_chars,
            skip_failed,
            json,
            pretty,
        } => handle_ask(
            &style,
            &globals,
            prompt,
            label,
            RetrievalOverrides {
                k_local,
                k_scholar,
                max_total,
                max_chars,
                skip_failed,
            },
            json,
            pretty,
        ),
        Command::Expand {
            prompt,
            label,
            max_variants,
            json,
        } => handle_expand(&style, prompt, label, max_variants, json),
        Command::Format {
            hits,
            max_chars,
            json,
        } => handle_format(&style, &hits, max_chars, json),
        Command::Labels { json } => handle_labels(&style, json),
        Command::Explain {
            label,
            confidence,
            probs,
            prompt,
            no_retrieval,
            hits,
            max_chars,
            json,
        } => handle_explain(
            &globals,
            ExplainArgs {
                label,
                confidence,
                probs,
                prompt,
                no_retrieval,
                hits,
                max_chars,
            },
            json,
        ),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let cause = e.chain().nth(1).map(|c| c.to_string());
            eprintln!(
                "{}",
                style.error_with_context(&e.to_string(), cause.as_deref(), hint_for(&e).as_deref())
            );
            ExitCode::FAILURE
        }
    }
}

/// Initialize the tracing subscriber on stderr.
///
/// `RUST_LOG` wins over `--verbose`/`--quiet`.
fn init_tracing(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("nailbot_core={level},nailbot_cli={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Actionable next step for well-known failures.
fn hint_for(err: &anyhow::Error) -> Option<String> {
    match err.downcast_ref::<RagError>()? {
        RagError::CollectionUnavailable { .. } => Some(
            "Build the collections first, or point NAILBOT_INDEX_DIR at an existing index"
                .to_string(),
        ),
        RagError::EmbedderUnavailable(_) => {
            Some("Check the embedding model in your config or set NAILBOT_MODELS_DIR".to_string())
        }
        RagError::InvalidConfig { path, .. } => Some(format!("Check your config at {}", path.display())),
        RagError::InvalidRequest(_) => Some("Use a positive --k-local or --k-scholar and --max-total".to_string()),
        _ => None,
    }
}

// ============================================================================
// Command handlers
// ============================================================================

/// CLI overrides for the configured retrieval defaults.
struct RetrievalOverrides {
    k_local: Option<usize>,
    k_scholar: Option<usize>,
    max_total: Option<usize>,
    max_chars: Option<usize>,
    skip_failed: bool,
}

impl RetrievalOverrides {
    fn options(&self, defaults: &RetrievalDefaults) -> RetrievalOptions {
        RetrievalOptions::from_defaults(defaults)
            .with_k(
                self.k_local.unwrap_or(defaults.k_local_each),
                self.k_scholar.unwrap_or(defaults.k_sch_each),
            )
            .with_max_total(self.max_total.unwrap_or(defaults.max_total))
            .with_skip_failed_variants(self.skip_failed)
    }
}

fn handle_ask(
    style: &Style,
    globals: &Globals,
    prompt: String,
    label: Option<String>,
    overrides: RetrievalOverrides,
    json: bool,
    pretty: bool,
) -> Result<()> {
    let config = globals.load_config()?;
    let options = overrides.options(&config.retrieval);
    let max_chars = overrides.max_chars.unwrap_or(config.retrieval.max_chars);
    let ctx = RetrievalContext::from_config(config);

    let progress = Progress::spinner(
        "Retrieving passages...",
        ProgressMode::detect(globals.quiet, json || pretty),
    );
    let report = retrieve_smart_with_report(&ctx, &prompt, label.as_deref(), &options);
    progress.finish_clear();
    let report = report.context("Retrieval failed")?;
    let formatted = format_context(&report.hits, max_chars);

    if json || pretty {
        let output = json!({
            "prompt": prompt,
            "label": label,
            "variants": report.variants,
            "hits": report.hits,
            "context": formatted.context,
            "references": formatted.references,
            "failedVariants": report.failed_variants,
            "elapsedMs": report.elapsed_ms,
        });
        let output = if pretty {
            serde_json::to_string_pretty(&output)?
        } else {
            serde_json::to_string(&output)?
        };
        println!("{}", output);
        return Ok(());
    }

    println!("{}", style.section("QUERY"));
    println!();
    println!("  {}", style.key_value("Prompt", &prompt));
    println!("  {}", style.key_value("Label", label.as_deref().unwrap_or("-")));
    println!();

    if !report.failed_variants.is_empty() {
        eprintln!(
            "{}",
            style.message(
                MessageType::Warn,
                &format!(
                    "{} of {} query variants failed and were skipped",
                    report.failed_variants.len(),
                    report.variants.len()
                )
            )
        );
    }

    if report.hits.is_empty() {
        println!("{}", style.message(MessageType::Info, "No relevant passages found."));
    } else {
        println!("{}", style.section("HITS"));
        println!();
        println!("{}", table::render_hits_table(&report.hits));
    }
    println!();

    print_context(style, &formatted);

    if globals.verbose {
        println!();
        println!(
            "{}",
            table::render_metrics_table(&[
                ("Variants", report.variants.len().to_string()),
                ("Candidates", report.candidates.to_string()),
                ("Kept", report.hits.len().to_string()),
                ("Skipped", report.skipped_records.to_string()),
                ("Elapsed", format_millis(report.elapsed_ms)),
            ])
        );
    }
    Ok(())
}

fn handle_expand(
    style: &Style,
    prompt: String,
    label: Option<String>,
    max_variants: usize,
    json: bool,
) -> Result<()> {
    if let Some(label) = label.as_deref() {
        if NailLabel::parse(label).is_none() {
            eprintln!(
                "{}",
                style.message(
                    MessageType::Warn,
                    &format!("Unknown label '{}'; no alias variants generated", label)
                )
            );
            eprintln!("{}", style.message(MessageType::Hint, "Run `nailbot labels` to list known labels"));
        }
    }

    let expander = QueryExpander::new(ExpansionConfig::default().with_max_variants(max_variants));
    let variants = expander.expand(&prompt, label.as_deref());

    if json {
        println!("{}", serde_json::to_string(&variants)?);
    } else {
        for (i, variant) in variants.iter().enumerate() {
            println!("{:>3}. {}", i + 1, variant);
        }
    }
    Ok(())
}

fn handle_format(style: &Style, hits_path: &Path, max_chars: Option<usize>, json: bool) -> Result<()> {
    let hits = read_hits(hits_path)?;
    let max_chars = max_chars.unwrap_or(RetrievalDefaults::default().max_chars);
    let formatted = format_context(&hits, max_chars);

    if json {
        println!("{}", serde_json::to_string_pretty(&formatted)?);
    } else {
        print_context(style, &formatted);
    }
    Ok(())
}

fn handle_labels(style: &Style, json: bool) -> Result<()> {
    if json {
        let labels: Vec<_> = NailLabel::ALL
            .iter()
            .map(|label| json!({ "label": label.as_str(), "aliases": label.aliases() }))
            .collect();
        let output = json!({ "labels": labels, "generalTerms": GENERAL_ALIASES });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", table::render_labels_table(&NailLabel::ALL));
    println!();
    println!("{}", style.key_value("General terms", &GENERAL_ALIASES.join(", ")));
    Ok(())
}

struct ExplainArgs {
    label: String,
    confidence: f32,
    probs: Option<PathBuf>,
    prompt: Option<String>,
    no_retrieval: bool,
    hits: Option<PathBuf>,
    max_chars: Option<usize>,
}

fn handle_explain(globals: &Globals, args: ExplainArgs, json: bool) -> Result<()> {
    if !(0.0..=1.0).contains(&args.confidence) {
        bail!("--confidence must be within [0, 1], got {}", args.confidence);
    }

    let mut prediction = Prediction::new(args.label, args.confidence);
    if let Some(path) = &args.probs {
        prediction = prediction.with_probs(read_probs(path)?);
    }
    let mut request = ExplanationRequest::new(prediction);
    if let Some(prompt) = args.prompt {
        request = request.with_prompt(prompt);
    }

    let context = if let Some(path) = &args.hits {
        let max_chars = args.max_chars.unwrap_or(RetrievalDefaults::default().max_chars);
        format_context(&read_hits(path)?, max_chars)
    } else if args.no_retrieval {
        FormattedContext::empty()
    } else {
        let config = globals.load_config()?;
        let explainer = Explainer::from_defaults(&config.retrieval)
            .with_max_chars(args.max_chars.unwrap_or(config.retrieval.max_chars));
        let ctx = RetrievalContext::from_config(config);

        let progress = Progress::spinner("Retrieving context...", ProgressMode::detect(globals.quiet, json));
        let context = explainer.gather_context(Some(&ctx), &request);
        progress.finish_clear();
        context
    };

    // No generator is wired into the CLI; the template answer is printed
    let text = Explainer::default().explain_with_context(None, &request, &context);

    if json {
        let output = json!({
            "label": request.prediction.label,
            "intent": request.intent(),
            "onDomain": request.on_domain(),
            "references": context.references,
            "explanation": text,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", text);
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn print_context(style: &Style, formatted: &FormattedContext) {
    println!("{}", style.section("CONTEXT"));
    println!();
    println!("{}", formatted.context);

    if !formatted.references.is_empty() {
        println!();
        println!("{}", style.section("REFERENCES"));
        println!();
        for reference in &formatted.references {
            println!("  - {}", reference);
        }
    }
    if formatted.budget_exhausted {
        println!();
        println!(
            "{}",
            style.message(MessageType::Info, "Context budget reached; remaining hits were dropped.")
        );
    }
}

fn read_hits(path: &Path) -> Result<Vec<PassageHit>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read hits from {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid hits JSON in {}", path.display()))
}

fn read_probs(path: &Path) -> Result<BTreeMap<String, f32>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read probabilities from {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid probabilities JSON in {}", path.display()))
}
