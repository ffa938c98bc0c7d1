use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use creatoraudit_core::display::{render_markdown, render_report_text, thousands};
use creatoraudit_core::{
    analyze_batch, recommended_price, validate_indexed, Analysis, AnalysisOptions, AuditReport,
    AuditRequest, Auditor, MatchPolicy, RawVideo, Scenario, SearchProvider, TopicTaxonomy,
    ValidationError,
};
use creatoraudit_local::{LlmRiskAssessor, YouTubeClient, YtDlpTranscripts};
use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const SCHEMA_VERSION: u64 = 1;

#[derive(Parser, Debug)]
#[command(name = "creatoraudit")]
#[command(about = "Audit a YouTube creator: metrics, topics, pricing, brand safety", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve a channel, fetch its recent uploads and print the audit report.
    Audit(AuditCmd),
    /// Run the offline analysis over a JSON array of video records.
    Analyze(AnalyzeCmd),
    /// List pricing scenarios, optionally pricing an average view count.
    Scenarios(ScenariosCmd),
    /// Diagnose configuration (json; no secrets).
    Doctor(DoctorCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct AnalysisArgs {
    /// Rows in the top-videos table.
    #[arg(long, default_value_t = 10)]
    top: usize,
    /// Pricing scenario: conservative|median|best-case
    #[arg(long, env = "CREATORAUDIT_SCENARIO", default_value = "median")]
    scenario: Scenario,
    /// Topic matching: first-match|all-matches
    #[arg(long, env = "CREATORAUDIT_POLICY", default_value = "first-match")]
    policy: MatchPolicy,
    /// Taxonomy JSON file: `[{"category": "...", "keywords": ["..."]}]`.
    #[arg(long, env = "CREATORAUDIT_TAXONOMY")]
    taxonomy: Option<PathBuf>,
}

impl AnalysisArgs {
    fn options(&self) -> AnalysisOptions {
        AnalysisOptions {
            top: self.top,
            scenario: self.scenario,
            policy: self.policy,
        }
    }

    fn load_taxonomy(&self) -> Result<TopicTaxonomy> {
        let Some(p) = &self.taxonomy else {
            return Ok(TopicTaxonomy::default());
        };
        let txt = std::fs::read_to_string(p)
            .with_context(|| format!("read taxonomy {}", p.display()))?;
        let t = TopicTaxonomy::from_json(&txt)
            .with_context(|| format!("taxonomy {}", p.display()))?;
        tracing::debug!(categories = t.len(), path = %p.display(), "loaded taxonomy");
        Ok(t)
    }
}

#[derive(clap::Args, Debug)]
struct AuditCmd {
    /// Channel URL, `@handle`, channel id (`UC…`), video URL, or channel name.
    #[arg(long)]
    channel: String,
    /// Recent uploads to analyze.
    #[arg(long, env = "CREATORAUDIT_MAX_RESULTS", default_value_t = 30)]
    max_results: usize,
    #[command(flatten)]
    analysis: AnalysisArgs,
    /// Run the web search + LLM brand-safety assessment.
    #[arg(long)]
    brand_safety: bool,
    /// Search backend for brand safety (default: first configured).
    #[arg(long, value_parser = ["serpapi", "brave"])]
    search_provider: Option<String>,
    /// Model for the brand-safety assessment (default: CREATORAUDIT_OPENAI_MODEL or gpt-4).
    #[arg(long)]
    llm_model: Option<String>,
    /// Add the top video's transcript (via yt-dlp) to the brand-safety context.
    #[arg(long)]
    transcript: bool,
    /// Fixed report timestamp (seconds since epoch).
    #[arg(long, hide = true)]
    now_epoch_s: Option<u64>,
    /// Output format: json|text|markdown
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct AnalyzeCmd {
    /// JSON array of video records (`-` reads stdin).
    #[arg(long)]
    videos: PathBuf,
    #[command(flatten)]
    analysis: AnalysisArgs,
    /// Output format: json|text|markdown
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct ScenariosCmd {
    /// Price every scenario for this average view count.
    #[arg(long)]
    average_views: Option<u64>,
    /// Price `--average-views` at this conversion rate instead (must be a known scenario rate).
    #[arg(long, requires = "average_views")]
    rate: Option<f64>,
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct DoctorCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

fn is_text(output: &str) -> bool {
    output.eq_ignore_ascii_case("text")
}

fn is_markdown(output: &str) -> bool {
    output.eq_ignore_ascii_case("markdown") || output.eq_ignore_ascii_case("md")
}

/// Opt-in `KEY=VALUE` file. Never overrides variables already set in the process.
fn load_env_file(path: &Path) -> std::io::Result<usize> {
    let txt = std::fs::read_to_string(path)?;
    let mut n = 0;
    for (k, v) in parse_env_file(&txt) {
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v);
            n += 1;
        }
    }
    Ok(n)
}

fn parse_env_file(txt: &str) -> Vec<(&str, &str)> {
    txt.lines()
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.starts_with('#'))
        .filter_map(|s| s.strip_prefix("export ").unwrap_or(s).split_once('='))
        .map(|(k, v)| {
            let v = v.trim();
            let v = v
                .strip_prefix('"')
                .and_then(|x| x.strip_suffix('"'))
                .or_else(|| v.strip_prefix('\'').and_then(|x| x.strip_suffix('\'')))
                .unwrap_or(v);
            (k.trim(), v)
        })
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(
            "warn,creatoraudit=info,creatoraudit_core=info,creatoraudit_local=info",
        )
    });
    // stdout is reserved for command output.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut s = String::new();
        std::io::stdin()
            .read_to_string(&mut s)
            .context("read videos from stdin")?;
        return Ok(s);
    }
    std::fs::read_to_string(path).with_context(|| format!("read videos {}", path.display()))
}

/// Per-element parse so one malformed element does not sink the batch.
fn analyze_json(text: &str, taxonomy: &TopicTaxonomy, opts: &AnalysisOptions) -> Result<Analysis> {
    let values: Vec<serde_json::Value> =
        serde_json::from_str(text).context("videos input must be a JSON array")?;
    let mut parsed = Vec::with_capacity(values.len());
    let mut malformed = Vec::new();
    for (i, v) in values.into_iter().enumerate() {
        match RawVideo::from_value(i, v) {
            Ok(r) => parsed.push((i, r)),
            Err(e) => malformed.push(e),
        }
    }
    let batch = validate_indexed(parsed.iter().map(|(i, r)| (*i, r))).with_rejected(malformed);
    Ok(analyze_batch(batch, taxonomy, opts))
}

fn print_rejected(rejected: &[ValidationError]) {
    if rejected.is_empty() {
        return;
    }
    println!("Rejected records:");
    for e in rejected {
        println!("  - {e}");
    }
}

fn analyze_cmd(args: AnalyzeCmd) -> Result<()> {
    let taxonomy = args.analysis.load_taxonomy()?;
    let opts = args.analysis.options();
    let text = read_input(&args.videos)?;
    let analysis = analyze_json(&text, &taxonomy, &opts)?;
    if !analysis.rejected.is_empty() {
        tracing::warn!(skipped = analysis.rejected.len(), "some video records were rejected");
    }

    if is_markdown(&args.output) {
        print!("{}", render_markdown(&analysis.summary));
    } else if is_text(&args.output) {
        let p = &analysis.pricing;
        println!("Topics: {}", analysis.classification);
        println!(
            "Sponsorship ({}): ${} per video",
            p.label,
            thousands(p.price)
        );
        println!();
        print!("{}", render_markdown(&analysis.summary));
        print_rejected(&analysis.rejected);
    } else {
        let payload = serde_json::json!({
            "schema_version": SCHEMA_VERSION,
            "kind": "analyze",
            "ok": true,
            "options": opts,
            "taxonomy_categories": taxonomy.len(),
            "summary": analysis.summary,
            "classification": analysis.classification,
            "pricing": analysis.pricing,
            "rejected": analysis.rejected,
        });
        println!("{payload}");
    }
    Ok(())
}

async fn audit_cmd(args: AuditCmd) -> Result<()> {
    let taxonomy = args.analysis.load_taxonomy()?;
    let client = creatoraudit_local::http_client()?;
    let youtube = YouTubeClient::from_env(client.clone())?;

    let mut search: Option<Box<dyn SearchProvider>> = None;
    let mut assessor: Option<LlmRiskAssessor> = None;
    if args.brand_safety {
        match creatoraudit_local::search::provider_from_env(
            client.clone(),
            args.search_provider.as_deref(),
        ) {
            Ok(p) => search = Some(p),
            Err(e) => tracing::warn!(error = %e, "brand safety: no search provider"),
        }
        match LlmRiskAssessor::from_env(client.clone(), args.llm_model.clone()) {
            Ok(a) => assessor = Some(a),
            Err(e) => tracing::warn!(error = %e, "brand safety: no assessor"),
        }
    }
    let transcripts = if args.brand_safety && args.transcript {
        YtDlpTranscripts::from_env()
            .map_err(|e| tracing::warn!(error = %e, "transcripts unavailable"))
            .ok()
    } else {
        None
    };

    let mut auditor = Auditor::new(&youtube, &youtube, &taxonomy);
    if let Some(s) = search.as_deref() {
        auditor = auditor.with_search(s);
    }
    if let Some(a) = assessor.as_ref() {
        auditor = auditor.with_assessor(a);
    }
    if let Some(t) = transcripts.as_ref() {
        auditor = auditor.with_transcripts(t);
    }

    let req = AuditRequest {
        channel: args.channel.clone(),
        max_results: args.max_results,
        options: args.analysis.options(),
        brand_safety: args.brand_safety,
        transcript_context: args.transcript,
        now_epoch_s: args.now_epoch_s,
    };
    let report = auditor
        .run(&req)
        .await
        .with_context(|| format!("audit {}", args.channel))?;
    print_report(&args.output, &req, &report);
    Ok(())
}

fn print_report(output: &str, req: &AuditRequest, report: &AuditReport) {
    if is_markdown(output) {
        print!("{}", render_markdown(&report.summary));
    } else if is_text(output) {
        print!("{}", render_report_text(report));
        print_rejected(&report.rejected);
    } else {
        let payload = serde_json::json!({
            "schema_version": SCHEMA_VERSION,
            "kind": "audit",
            "ok": true,
            "request": req,
            "report": report,
        });
        println!("{payload}");
    }
}

fn scenarios_cmd(args: ScenariosCmd) -> Result<()> {
    let explicit = match (args.average_views, args.rate) {
        (Some(avg), Some(rate)) => Some(recommended_price(avg, rate)?),
        _ => None,
    };
    let rows: Vec<serde_json::Value> = Scenario::ALL
        .iter()
        .map(|s| {
            let mut row = serde_json::json!({
                "scenario": s,
                "label": s.label(),
                "rate": s.rate(),
            });
            if let Some(avg) = args.average_views {
                row["price"] = serde_json::json!(s.price(avg));
            }
            row
        })
        .collect();

    if is_text(&args.output) {
        for (s, row) in Scenario::ALL.iter().zip(&rows) {
            match row.get("price").and_then(|p| p.as_u64()) {
                Some(p) => println!("{:<12} {:<22} ${}", s.name(), s.label(), thousands(p)),
                None => println!("{:<12} {}", s.name(), s.label()),
            }
        }
        if let Some(p) = explicit {
            println!("price at rate {}: ${}", args.rate.unwrap_or_default(), thousands(p));
        }
    } else {
        let mut payload = serde_json::json!({
            "schema_version": SCHEMA_VERSION,
            "kind": "scenarios",
            "ok": true,
            "default": Scenario::default(),
            "average_views": args.average_views,
            "scenarios": rows,
        });
        if let (Some(p), Some(rate)) = (explicit, args.rate) {
            payload["requested"] = serde_json::json!({ "rate": rate, "price": p });
        }
        println!("{payload}");
    }
    Ok(())
}

fn doctor_cmd(args: DoctorCmd) {
    let t0 = std::time::Instant::now();
    let c = creatoraudit_local::configured_from_env();
    let env_file = std::env::var("CREATORAUDIT_ENV_FILE")
        .ok()
        .filter(|s| !s.trim().is_empty());

    let check = |name: &str, ok: bool, required: bool, hint: &str| {
        serde_json::json!({
            "name": name,
            "ok": ok,
            "required": required,
            "hint": if ok { "" } else { hint },
        })
    };
    let checks = vec![
        check(
            "youtube_api_key",
            c.youtube,
            true,
            "Set CREATORAUDIT_YOUTUBE_API_KEY (or YOUTUBE_API_KEY).",
        ),
        check(
            "search_provider",
            c.serpapi || c.brave,
            false,
            "Brand safety needs SERPAPI_API_KEY or BRAVE_SEARCH_API_KEY.",
        ),
        check(
            "llm",
            c.openai,
            false,
            "Brand safety needs OPENAI_API_KEY or CREATORAUDIT_OPENAI_BASE_URL.",
        ),
        check(
            "yt_dlp",
            c.yt_dlp,
            false,
            "Install yt-dlp (or set CREATORAUDIT_YTDLP_BIN) for --transcript.",
        ),
    ];
    let ok = checks
        .iter()
        .all(|c| c["ok"].as_bool() == Some(true) || c["required"].as_bool() == Some(false));

    if is_text(&args.output) {
        println!("creatoraudit {}", env!("CARGO_PKG_VERSION"));
        println!("checks:");
        for c in &checks {
            let name = c["name"].as_str().unwrap_or("");
            let state = if c["ok"].as_bool() == Some(true) {
                "ok"
            } else if c["required"].as_bool() == Some(true) {
                "missing"
            } else {
                "not configured"
            };
            println!("- {name}: {state}");
        }
        return;
    }
    let payload = serde_json::json!({
        "schema_version": SCHEMA_VERSION,
        "kind": "doctor",
        "ok": ok,
        "name": "creatoraudit",
        "version": env!("CARGO_PKG_VERSION"),
        "elapsed_ms": t0.elapsed().as_millis(),
        "configured": {
            "providers": {
                "youtube": c.youtube,
                "serpapi": c.serpapi,
                "brave": c.brave,
            },
            "llm": { "openai_compat": c.openai },
            "transcripts": { "yt_dlp": c.yt_dlp },
            "env_file": env_file.is_some(),
        },
        "checks": checks,
    });
    println!("{payload}");
}

fn version_cmd(args: VersionCmd) {
    if is_text(&args.output) {
        println!("creatoraudit {}", env!("CARGO_PKG_VERSION"));
        return;
    }
    let v = serde_json::json!({
        "schema_version": SCHEMA_VERSION,
        "kind": "version",
        "ok": true,
        "name": "creatoraudit",
        "version": env!("CARGO_PKG_VERSION"),
    });
    println!("{v}");
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Audit(args) => audit_cmd(args).await?,
        Commands::Analyze(args) => analyze_cmd(args)?,
        Commands::Scenarios(args) => scenarios_cmd(args)?,
        Commands::Doctor(args) => doctor_cmd(args),
        Commands::Version(args) => version_cmd(args),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // The env file may carry RUST_LOG, so it is read before the subscriber exists.
    let env_file = std::env::var("CREATORAUDIT_ENV_FILE")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(|p| {
            let loaded = load_env_file(Path::new(&p));
            (p, loaded)
        });
    init_tracing();
    match env_file {
        Some((_, Ok(n))) => tracing::debug!(vars = n, "loaded env file"),
        Some((p, Err(e))) => tracing::warn!(path = %p, error = %e, "could not read env file"),
        None => {}
    }

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
