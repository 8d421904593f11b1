use std::io::IsTerminal;
use std::path::{Component, Path, PathBuf};

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use chronoscope_core::{ChronoscopeConfig, HistoryReader, OutputFormat};
use chronoscope_coupling::{
    ColoredGraph, DivergentChangeAnalysis, FeatureEnvyAnalysis, HistoryAnalyzer, TemporalContext,
};

#[derive(Parser)]
#[command(
    name = "chronoscope",
    version,
    about = "Temporal coupling analysis over version-control history",
    long_about = "Chronoscope mines a project's revision history for entities that change together\n\
                   and reports the design smells this reveals.\n\n\
                   The history is read as JSON Lines, one revision with its structural edits per line.\n\n\
                   Examples:\n  \
                     chronoscope coupling --history history.jsonl        Most coupled entity pairs\n  \
                     chronoscope divergent-change --history h.jsonl      Files with several responsibilities\n  \
                     cat h.jsonl | chronoscope feature-envy              Functions envying other files\n  \
                     chronoscope init                                    Write a default .chronoscope.toml"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .chronoscope.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable summaries (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

/// Where the history comes from and how it is folded.
#[derive(Args)]
struct HistoryArgs {
    /// JSON Lines history file (default: stdin)
    #[arg(long)]
    history: Option<PathBuf>,

    /// Maximum number of changed files in a revision (default: 100)
    #[arg(long)]
    max_change_set: Option<usize>,

    /// Minimum number of revisions of an entity or coupling relation (default: 5)
    #[arg(long)]
    min_revisions: Option<u32>,

    /// Minimum temporal coupling between two entities (default: 0.1)
    #[arg(long)]
    min_coupling: Option<f64>,
}

#[derive(Args)]
struct GraphArgs {
    /// Directory receiving the per-file coupling graphs
    #[arg(long, default_value = ".chronoscope")]
    graph_dir: PathBuf,

    /// Do not write coupling graphs
    #[arg(long)]
    no_graphs: bool,
}

#[derive(Subcommand)]
enum Command {
    /// List the most temporally coupled entity pairs
    #[command(long_about = "List the most temporally coupled entity pairs.\n\n\
        Coupling of two entities is the number of revisions touching both, divided by\n\
        the number of revisions touching either.\n\n\
        Examples:\n  chronoscope coupling --history history.jsonl\n  chronoscope coupling --min-coupling 0.5 --limit 50")]
    Coupling {
        #[command(flatten)]
        history: HistoryArgs,

        /// Maximum pairs to show (default: 20)
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Detect files with several independently changing responsibilities
    #[command(long_about = "Detect Divergent Change.\n\n\
        Builds the temporal coupling graph of every source file, finds its blobs (densely\n\
        coupled groups) and its anti-blob (weakly coupled leftovers), and reports files\n\
        by number of responsibilities. Graphs are written to\n\
        <graph-dir>/divergent-change/<file>/graph.json.\n\n\
        Examples:\n  chronoscope divergent-change --history history.jsonl\n  chronoscope divergent-change --min-blob-density 2.0 --min-metric-value 2")]
    DivergentChange {
        #[command(flatten)]
        history: HistoryArgs,

        #[command(flatten)]
        graphs: GraphArgs,

        /// Minimum average degree (sum of coupling) of the entities in a blob (default: 2.5)
        #[arg(long)]
        min_blob_density: Option<f64>,

        /// Maximum degree (sum of coupling) of an entity in an anti-blob (default: 0.5)
        #[arg(long)]
        max_anti_coupling: Option<f64>,

        /// Minimum size of an anti-blob (default: 10)
        #[arg(long)]
        min_anti_blob_size: Option<usize>,

        /// Ignore files with fewer responsibilities than this (default: 0)
        #[arg(long)]
        min_metric_value: Option<usize>,
    },
    /// Detect functions more coupled to another file than to their own
    #[command(long_about = "Detect Feature Envy.\n\n\
        Sums the coupling of every entity to every source file and reports the entities\n\
        more coupled to a foreign file than to their own. Graphs of each file and the\n\
        files it envies are written to <graph-dir>/feature-envy/<file>/graph.json.\n\n\
        Examples:\n  chronoscope feature-envy --history history.jsonl\n  chronoscope feature-envy --min-envy-ratio 0.8 --max-envied-files 3")]
    FeatureEnvy {
        #[command(flatten)]
        history: HistoryArgs,

        #[command(flatten)]
        graphs: GraphArgs,

        /// Minimum ratio of coupling to another file over coupling to the own file (default: 1.0)
        #[arg(long)]
        min_envy_ratio: Option<f64>,

        /// Maximum envied files reported per function (default: 1)
        #[arg(long)]
        max_envied_files: Option<usize>,

        /// Ignore files with fewer Feature Envy instances than this (default: 1)
        #[arg(long)]
        min_metric_value: Option<usize>,
    },
    /// Create a default .chronoscope.toml configuration file
    #[command(long_about = "Create a default .chronoscope.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .chronoscope.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        println!("\x1b[1mchronoscope\x1b[0m v{version}, temporal coupling analysis\n");

        println!("Quick start:");
        println!("  \x1b[36mchronoscope init\x1b[0m                               Create a .chronoscope.toml config file");
        println!("  \x1b[36mchronoscope coupling --history h.jsonl\x1b[0m         List coupled entities\n");

        println!("All commands:");
        println!("  \x1b[32mcoupling\x1b[0m          Most temporally coupled entity pairs");
        println!("  \x1b[32mdivergent-change\x1b[0m  Files with several responsibilities");
        println!("  \x1b[32mfeature-envy\x1b[0m      Functions coupled to foreign files");
        println!("  \x1b[32minit\x1b[0m              Create default configuration\n");
    } else {
        println!("chronoscope v{version}, temporal coupling analysis\n");

        println!("Quick start:");
        println!("  chronoscope init                               Create a .chronoscope.toml config file");
        println!("  chronoscope coupling --history h.jsonl         List coupled entities\n");

        println!("All commands:");
        println!("  coupling          Most temporally coupled entity pairs");
        println!("  divergent-change  Files with several responsibilities");
        println!("  feature-envy      Functions coupled to foreign files");
        println!("  init              Create default configuration\n");
    }

    println!("Run 'chronoscope <command> --help' for details.");
}

fn bold(text: &str, use_color: bool) -> String {
    if use_color {
        format!("\x1b[1m{text}\x1b[0m")
    } else {
        text.to_string()
    }
}

impl HistoryArgs {
    fn apply(&self, config: &mut ChronoscopeConfig) {
        if let Some(v) = self.max_change_set {
            config.coupling.max_change_set = v;
        }
        if let Some(v) = self.min_revisions {
            config.coupling.min_revisions = v;
        }
        if let Some(v) = self.min_coupling {
            config.coupling.min_coupling = v;
        }
    }
}

/// Fold the history named by `args` (or stdin) into a temporal context.
fn analyze_history(args: &HistoryArgs, config: &ChronoscopeConfig) -> Result<TemporalContext> {
    let registry = config.analyzer_registry().into_diagnostic()?;
    let analyzer = HistoryAnalyzer::from_config(&config.coupling)
        .into_diagnostic()?
        .with_registry(registry);

    let spinner = if std::io::stderr().is_terminal() {
        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_style(
            indicatif::ProgressStyle::with_template(
                "{spinner:.cyan} {msg} {pos} revisions ({elapsed})",
            )
            .into_diagnostic()?,
        );
        pb.set_message("Analyzing history...");
        pb.enable_steady_tick(std::time::Duration::from_millis(120));
        Some(pb)
    } else {
        None
    };
    let tick = |_: &_| {
        if let Some(pb) = &spinner {
            pb.inc(1);
        }
    };

    let result = match &args.history {
        Some(path) => {
            let history = chronoscope_core::load_history(path)
                .into_diagnostic()
                .wrap_err(format!("reading {}", path.display()))?;
            analyzer.analyze_history(history.inspect(tick))
        }
        None => {
            if std::io::stdin().is_terminal() {
                miette::bail!(miette::miette!(
                    help = "Pass --history <file>, or pipe a JSON Lines history into chronoscope",
                    "No history given"
                ));
            }
            let history = HistoryReader::new(std::io::stdin().lock());
            analyzer.analyze_history(history.inspect(tick))
        }
    };

    match result {
        Ok(context) => {
            if let Some(pb) = &spinner {
                pb.finish_with_message("Analyzed");
            }
            Ok(context)
        }
        Err(e) => {
            if let Some(pb) = &spinner {
                pb.finish_with_message("Failed");
            }
            Err(e).into_diagnostic().wrap_err("analyzing history")
        }
    }
}

/// Directory of the dump for the graph labeled `label`, keeping only the
/// normal components of the label.
fn graph_path(dir: &Path, analysis: &str, label: &str) -> PathBuf {
    let mut path = dir.join(analysis);
    for component in Path::new(label).components() {
        if let Component::Normal(part) = component {
            path.push(part);
        }
    }
    path
}

fn write_graphs(args: &GraphArgs, analysis: &str, graphs: &[ColoredGraph]) -> Result<()> {
    if args.no_graphs {
        return Ok(());
    }
    for graph in graphs {
        let dir = graph_path(&args.graph_dir, analysis, &graph.graph.label);
        std::fs::create_dir_all(&dir)
            .into_diagnostic()
            .wrap_err(format!("creating {}", dir.display()))?;
        let json = serde_json::to_string_pretty(graph).into_diagnostic()?;
        std::fs::write(dir.join("graph.json"), json).into_diagnostic()?;
    }
    tracing::debug!(
        analysis,
        graphs = graphs.len(),
        dir = %args.graph_dir.display(),
        "coupling graphs written"
    );
    Ok(())
}

fn print_coupling(
    context: &TemporalContext,
    limit: usize,
    format: OutputFormat,
    use_color: bool,
) -> Result<()> {
    let pairs = context.coupled_pairs(Some(limit));
    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "entities": context.len(),
                "pairs": pairs,
            });
            println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            println!("# Temporal Coupling\n");
            println!("**Entities tracked:** {}\n", context.len());
            if pairs.is_empty() {
                println!("No significant coupling detected.");
            } else {
                println!("| Entity A | Entity B | Coupling | Joint changes | Changes A | Changes B |");
                println!("|----------|----------|----------|---------------|-----------|-----------|");
                for p in &pairs {
                    println!(
                        "| `{}` | `{}` | {:.2} | {} | {} | {} |",
                        p.entity_a, p.entity_b, p.coupling, p.joint_changes, p.changes_a, p.changes_b,
                    );
                }
            }
        }
        OutputFormat::Text => {
            println!(
                "{} ({} entities tracked)\n",
                bold("Temporal coupling", use_color),
                context.len()
            );
            if pairs.is_empty() {
                println!("  No significant coupling detected.");
            }
            for p in &pairs {
                println!(
                    "  {:.2}  {} <-> {}  ({} joint changes, {}/{} changes)",
                    p.coupling, p.entity_a, p.entity_b, p.joint_changes, p.changes_a, p.changes_b,
                );
            }
        }
    }
    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# Chronoscope Configuration

[coupling]
# max_change_set = 100   # revisions touching more files are ignored for joint changes
# min_revisions = 5      # minimum revisions of an entity or coupling relation
# min_coupling = 0.1     # minimum temporal coupling between two entities

[divergent_change]
# min_blob_density = 2.5
# max_anti_coupling = 0.5
# min_anti_blob_size = 10
# min_metric_value = 0

[feature_envy]
# min_envy_ratio = 1.0
# max_envied_files = 1
# min_metric_value = 1

# Track more than functions for some languages
# [languages.java]
# extensions = ["java"]
# track = ["function", "variable"]
"#;

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_ansi(cli.color != ColorChoice::Never && std::io::stderr().is_terminal())
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => ChronoscopeConfig::from_file(path).into_diagnostic()?,
        None => {
            let default_path = Path::new(".chronoscope.toml");
            if default_path.exists() {
                ChronoscopeConfig::from_file(default_path).into_diagnostic()?
            } else {
                ChronoscopeConfig::default()
            }
        }
    };

    if cli.verbose {
        eprintln!("format: {}", cli.format);
        if !config.languages.is_empty() {
            let names: Vec<&str> = config.languages.keys().map(String::as_str).collect();
            eprintln!("Language analyzers: {}", names.join(", "));
        }
    }

    match cli.command {
        None => {
            print_welcome(use_color);
        }
        Some(Command::Coupling { ref history, limit }) => {
            history.apply(&mut config);
            config.validate().into_diagnostic()?;
            let context = analyze_history(history, &config)?;
            print_coupling(&context, limit, cli.format, use_color)?;
        }
        Some(Command::DivergentChange {
            ref history,
            ref graphs,
            min_blob_density,
            max_anti_coupling,
            min_anti_blob_size,
            min_metric_value,
        }) => {
            history.apply(&mut config);
            let dc = &mut config.divergent_change;
            if let Some(v) = min_blob_density {
                dc.min_blob_density = v;
            }
            if let Some(v) = max_anti_coupling {
                dc.max_anti_coupling = v;
            }
            if let Some(v) = min_anti_blob_size {
                dc.min_anti_blob_size = v;
            }
            if let Some(v) = min_metric_value {
                dc.min_metric_value = v;
            }
            config.validate().into_diagnostic()?;

            let analysis =
                DivergentChangeAnalysis::new(config.divergent_change.clone()).into_diagnostic()?;
            let context = analyze_history(history, &config)?;
            let report = analysis.analyze(&context).into_diagnostic()?;
            let files = report.files_above(config.divergent_change.min_metric_value);

            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&files).into_diagnostic()?);
                }
                OutputFormat::Markdown => {
                    println!("# Divergent Change\n");
                    if files.is_empty() {
                        println!("No Divergent Change detected.");
                    } else {
                        println!("| File | Responsibilities | Blobs | Anti-blob size |");
                        println!("|------|------------------|-------|----------------|");
                        for f in &files {
                            println!(
                                "| `{}` | {} | {} | {} |",
                                f.file,
                                f.responsibilities,
                                f.blobs.len(),
                                f.anti_blob.as_ref().map_or(0, |a| a.size()),
                            );
                        }
                    }
                }
                OutputFormat::Text => {
                    println!("{}\n", bold("Divergent Change", use_color));
                    if files.is_empty() {
                        println!("  No Divergent Change detected.");
                    }
                    for f in &files {
                        println!(
                            "  {}: {} responsibilities",
                            bold(&f.file, use_color),
                            f.responsibilities
                        );
                        for (i, blob) in f.blobs.iter().enumerate() {
                            println!(
                                "    blob {} (density {:.2}): {}",
                                i + 1,
                                blob.density,
                                blob.nodes.iter().cloned().collect::<Vec<_>>().join(", ")
                            );
                        }
                        if let Some(anti) = &f.anti_blob {
                            println!(
                                "    anti-blob (density {:.2}): {} entities",
                                anti.density,
                                anti.size()
                            );
                        }
                    }
                }
            }

            write_graphs(graphs, "divergent-change", &report.colored_graphs)?;
        }
        Some(Command::FeatureEnvy {
            ref history,
            ref graphs,
            min_envy_ratio,
            max_envied_files,
            min_metric_value,
        }) => {
            history.apply(&mut config);
            let fe = &mut config.feature_envy;
            if let Some(v) = min_envy_ratio {
                fe.min_envy_ratio = v;
            }
            if let Some(v) = max_envied_files {
                fe.max_envied_files = v;
            }
            if let Some(v) = min_metric_value {
                fe.min_metric_value = v;
            }
            config.validate().into_diagnostic()?;

            let analysis =
                FeatureEnvyAnalysis::new(config.feature_envy.clone()).into_diagnostic()?;
            let context = analyze_history(history, &config)?;
            let report = analysis.analyze(&context).into_diagnostic()?;
            let files = report.files_above(config.feature_envy.min_metric_value);

            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&files).into_diagnostic()?);
                }
                OutputFormat::Markdown => {
                    println!("# Feature Envy\n");
                    if files.is_empty() {
                        println!("No Feature Envy detected.");
                    } else {
                        println!("| Function | Envied file | Envied coupling | Own coupling |");
                        println!("|----------|-------------|-----------------|--------------|");
                        for e in files.iter().flat_map(|f| &f.instances) {
                            println!(
                                "| `{}` | `{}` | {:.2} | {:.2} |",
                                e.function, e.envied_file, e.envied_coupling, e.self_coupling,
                            );
                        }
                    }
                }
                OutputFormat::Text => {
                    println!("{}\n", bold("Feature Envy", use_color));
                    if files.is_empty() {
                        println!("  No Feature Envy detected.");
                    }
                    for f in &files {
                        println!(
                            "  {}: {} instances",
                            bold(&f.file, use_color),
                            f.feature_envy_count
                        );
                        for e in &f.instances {
                            println!(
                                "    {} -> {} ({:.2} vs {:.2} own)",
                                e.function, e.envied_file, e.envied_coupling, e.self_coupling,
                            );
                        }
                    }
                }
            }

            write_graphs(graphs, "feature-envy", &report.colored_graphs)?;
        }
        Some(Command::Init) => {
            let path = Path::new(".chronoscope.toml");
            if path.exists() {
                miette::bail!(".chronoscope.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .chronoscope.toml with default configuration");
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "chronoscope", &mut std::io::stdout());
        }
    }

    Ok(())
}
