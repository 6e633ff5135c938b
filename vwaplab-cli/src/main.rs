//! vwaplab CLI: analyze, scan and validate commands.
//!
//! Commands:
//! - `analyze`: multi-period VWAP report for one symbol (Alpha Vantage or CSV)
//! - `scan`: batch analysis with one summary line per symbol
//! - `validate`: historical prior-quarter rejection and sigma-support studies

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use vwaplab_core::analysis::{analyze_with_entry, VwapAnalysis};
use vwaplab_core::batch::{
    analyze_batch, fetch_and_analyze, fetch_daily_batch, LiveOptions, StderrProgress,
};
use vwaplab_core::data::{
    load_csv, AlphaVantageProvider, CircuitBreaker, CsvProvider, DataProvider, Interval, Universe,
};
use vwaplab_core::scoring::level_summary;
use vwaplab_core::validation::{validate, RejectionSummary, SigmaSummary};
use vwaplab_core::{AnalysisConfig, PeriodKind, PriceBar};

#[derive(Parser)]
#[command(
    name = "vwaplab",
    about = "vwaplab: multi-period VWAP levels, magnets, patterns and scoring"
)]
struct Cli {
    /// Alpha Vantage API key.
    #[arg(long, global = true, env = "ALPHA_VANTAGE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Analysis config TOML. Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one symbol.
    Analyze {
        /// Ticker symbol (e.g., CPB).
        symbol: String,

        /// Read daily bars from this CSV file instead of the API.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Current price override. Defaults to the live quote, or the latest
        /// close for CSV input.
        #[arg(long)]
        price: Option<f64>,

        /// Proposed entry price to classify.
        #[arg(long)]
        entry: Option<f64>,

        /// Number of ranked levels to show.
        #[arg(long)]
        top: Option<usize>,

        /// Intraday bar spacing for the session VWAP.
        #[arg(long, default_value = "5min")]
        session_interval: Interval,

        /// Skip the live quote and intraday fetches; use daily bars only.
        #[arg(long, default_value_t = false)]
        no_live: bool,

        /// Emit the full analysis as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Analyze many symbols, one summary line each.
    Scan {
        /// Symbols to scan. Defaults to the universe file when given.
        symbols: Vec<String>,

        /// Sector universe TOML supplying symbols.
        #[arg(long)]
        universe: Option<PathBuf>,

        /// Directory of `{SYMBOL}.csv` files to read instead of the API.
        #[arg(long)]
        csv_dir: Option<PathBuf>,

        /// Pause between API fetches (free tier allows 5 calls per minute).
        #[arg(long, default_value_t = 12)]
        pause_secs: u64,

        /// Also fetch a live quote and 5min intraday bars per symbol. Costs
        /// two extra API calls each; raise --pause-secs to match.
        #[arg(long, default_value_t = false)]
        live: bool,
    },
    /// Run the historical pattern validation studies.
    Validate {
        /// Symbols to test. Defaults to the universe file, or a built-in
        /// 20-symbol cross-sector set.
        symbols: Vec<String>,

        /// A single CSV file, or a directory of `{SYMBOL}.csv` files.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Sector universe TOML supplying symbols and sector groupings.
        #[arg(long)]
        universe: Option<PathBuf>,

        /// Pause between API fetches.
        #[arg(long, default_value_t = 12)]
        pause_secs: u64,

        /// Emit the report as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("vwaplab=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze {
            symbol,
            csv,
            price,
            entry,
            top,
            session_interval,
            no_live,
            json,
        } => run_analyze(
            &symbol,
            csv.as_deref(),
            price,
            entry,
            top,
            live_options(!no_live, session_interval),
            json,
            cli.api_key,
            config,
        ),
        Commands::Scan {
            symbols,
            universe,
            csv_dir,
            pause_secs,
            live,
        } => run_scan(
            symbols,
            universe.as_deref(),
            csv_dir.as_deref(),
            pause_secs,
            live_options(live, Interval::Min5),
            cli.api_key,
            &config,
        ),
        Commands::Validate {
            symbols,
            csv,
            universe,
            pause_secs,
            json,
        } => run_validate(
            symbols,
            csv.as_deref(),
            universe.as_deref(),
            pause_secs,
            json,
            cli.api_key,
            &config,
        ),
    }
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    match path {
        Some(p) => AnalysisConfig::from_file(p)
            .with_context(|| format!("loading config {}", p.display())),
        None => Ok(AnalysisConfig::default()),
    }
}

fn live_options(enabled: bool, session_interval: Interval) -> LiveOptions {
    if enabled {
        LiveOptions {
            quote: true,
            session_interval: Some(session_interval),
        }
    } else {
        LiveOptions::OFF
    }
}

/// The CSV provider when a directory is given, otherwise Alpha Vantage.
fn make_provider(api_key: Option<String>, csv_dir: Option<&Path>) -> Result<Box<dyn DataProvider>> {
    if let Some(dir) = csv_dir {
        if !dir.is_dir() {
            bail!("CSV directory not found: {}", dir.display());
        }
        return Ok(Box::new(CsvProvider::new(dir)));
    }
    let Some(key) = api_key else {
        bail!("no data source: pass --api-key, set ALPHA_VANTAGE_API_KEY, or use a CSV option");
    };
    let breaker = Arc::new(CircuitBreaker::default_provider());
    Ok(Box::new(AlphaVantageProvider::new(key, breaker)?))
}

/// Explicit symbols win, then the universe file, then `fallback`.
fn resolve_symbols(
    symbols: Vec<String>,
    universe: Option<&Universe>,
    fallback: Option<Universe>,
) -> Result<Vec<String>> {
    if !symbols.is_empty() {
        return Ok(symbols.into_iter().map(|s| s.to_uppercase()).collect());
    }
    if let Some(u) = universe.cloned().or(fallback) {
        return Ok(u.all_tickers().into_iter().map(String::from).collect());
    }
    bail!("no symbols given");
}

fn load_universe(path: Option<&Path>) -> Result<Option<Universe>> {
    path.map(|p| Universe::from_file(p).with_context(|| format!("loading universe {}", p.display())))
        .transpose()
}

#[allow(clippy::too_many_arguments)]
fn run_analyze(
    symbol: &str,
    csv: Option<&Path>,
    price: Option<f64>,
    entry: Option<f64>,
    top: Option<usize>,
    live: LiveOptions,
    json: bool,
    api_key: Option<String>,
    mut config: AnalysisConfig,
) -> Result<()> {
    if let Some(n) = top {
        if n == 0 {
            bail!("--top must be at least 1");
        }
        config.scoring.top_n = n;
    }

    let symbol = symbol.to_uppercase();
    let analysis = match csv {
        Some(path) => {
            let bars = load_csv(path)?;
            if bars.is_empty() {
                bail!("no usable bars for {symbol}");
            }
            info!(symbol = %symbol, bars = bars.len(), "analyzing");
            analyze_with_entry(&bars, price, entry, &config)
        }
        None => {
            let provider = make_provider(api_key, None)?;
            let analysis = fetch_and_analyze(provider.as_ref(), &symbol, price, entry, live, &config)?;
            if analysis.bar_count == 0 {
                bail!("no usable bars for {symbol}");
            }
            info!(symbol = %symbol, bars = analysis.bar_count, price = analysis.current_price, "analyzed");
            analysis
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        print_analysis(&symbol, &analysis);
    }
    Ok(())
}

fn run_scan(
    symbols: Vec<String>,
    universe: Option<&Path>,
    csv_dir: Option<&Path>,
    pause_secs: u64,
    live: LiveOptions,
    api_key: Option<String>,
    config: &AnalysisConfig,
) -> Result<()> {
    let universe = load_universe(universe)?;
    let symbols = resolve_symbols(symbols, universe.as_ref(), None)?;
    let provider = make_provider(api_key, csv_dir)?;
    let sym_refs: Vec<&str> = symbols.iter().map(|s| s.as_str()).collect();

    let summary = analyze_batch(
        provider.as_ref(),
        &sym_refs,
        config,
        live,
        Duration::from_secs(pause_secs),
        &StderrProgress,
    );

    println!(
        "{:<8} {:>10} {:>10} {:>10} {:>10}  {}",
        "SYMBOL", "PRICE", "YEARLY", "QUARTERLY", "3-MONTH", "TOP LEVEL"
    );
    for (symbol, result) in &summary.results {
        match result {
            Ok(a) => println!(
                "{:<8} {:>10.2} {:>10} {:>10} {:>10}  {}",
                symbol,
                a.current_price,
                fmt_level(a.vwap(PeriodKind::Yearly)),
                fmt_level(a.vwap(PeriodKind::Quarterly)),
                fmt_level(a.vwap(PeriodKind::ThreeMonth)),
                a.top_levels
                    .first()
                    .map(|l| format!("{} ${:.2} ({:.1})", l.candidate.label, l.candidate.level, l.composite))
                    .unwrap_or_else(|| "-".into()),
            ),
            Err(e) => println!("{symbol:<8} ERROR: {e}"),
        }
    }

    if !summary.all_succeeded() {
        for (sym, err) in summary.errors() {
            eprintln!("Error for {sym}: {err}");
        }
        std::process::exit(1);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_validate(
    symbols: Vec<String>,
    csv: Option<&Path>,
    universe: Option<&Path>,
    pause_secs: u64,
    json: bool,
    api_key: Option<String>,
    config: &AnalysisConfig,
) -> Result<()> {
    let universe = load_universe(universe)?;
    let groups = universe.clone().unwrap_or_else(Universe::validation_default);

    let series: Vec<(String, Vec<PriceBar>)> = match csv {
        Some(file) if file.is_file() => {
            let name = symbols.first().cloned().unwrap_or_else(|| {
                file.file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("CSV")
                    .to_uppercase()
            });
            vec![(name, load_csv(file)?)]
        }
        _ => {
            let symbols =
                resolve_symbols(symbols, universe.as_ref(), Some(Universe::validation_default()))?;
            let provider = make_provider(api_key, csv)?;
            let sym_refs: Vec<&str> = symbols.iter().map(|s| s.as_str()).collect();
            let fetched = fetch_daily_batch(
                provider.as_ref(),
                &sym_refs,
                Duration::from_secs(pause_secs),
                &StderrProgress,
            );
            for (sym, err) in fetched.errors() {
                eprintln!("Skipping {sym}: {err}");
            }
            fetched
                .results
                .into_iter()
                .filter_map(|(sym, r)| r.ok().map(|bars| (sym, bars)))
                .collect()
        }
    };
    if series.is_empty() {
        bail!("no symbol returned data; nothing to validate");
    }

    info!(symbols = series.len(), "running validation studies");
    let report = validate(&series, &config.validation);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match &report.rejection {
        Some(r) => print_rejection(r, &groups),
        None => println!("Prior-quarter rejection: no touches found."),
    }
    println!();
    match &report.sigma {
        Some(s) => print_sigma(s, &groups),
        None => println!("Sigma support: no touches found."),
    }
    Ok(())
}

// ── Report printing ──────────────────────────────────────────────────

fn fmt_level(level: Option<f64>) -> String {
    level.map_or_else(|| "-".into(), |v| format!("{v:.2}"))
}

fn print_analysis(symbol: &str, a: &VwapAnalysis) {
    let rule = "=".repeat(60);
    println!("{rule}");
    println!("{symbol}  current ${:.2}  ({} bars)", a.current_price, a.bar_count);
    println!("{rule}");

    if let Some(vwaps) = &a.vwaps {
        println!("\nVWAP Levels:");
        for pv in vwaps.current.iter().chain(&vwaps.prior_yearly).chain(&vwaps.prior_quarterly) {
            match (&pv.vwap, &pv.distance) {
                (Some(v), Some(d)) => println!(
                    "  {:<28} ${:>9.2}  σ {:>7.2}  {:>+7.2}%  {:>+6.2}σ (near {:+.3}σ{})",
                    pv.period.label,
                    v.vwap,
                    v.std_dev,
                    d.percent_distance,
                    d.sigma_distance,
                    d.nearest_key_level,
                    if d.near_key_level { ", AT KEY" } else { "" },
                ),
                _ => println!("  {:<28} no data", pv.period.label),
            }
        }
    }

    if a.magnets.iter().any(|tf| !tf.magnets.is_empty()) {
        println!("\nMagnet Levels:");
        for tf in &a.magnets {
            for m in &tf.magnets {
                println!(
                    "  {:<28} {:>+7.0}%  ${:>9.2}  {} (${:.2} away)",
                    tf.level.label,
                    m.deviation_pct(),
                    m.price,
                    m.side,
                    m.distance_from_price
                );
            }
        }
    }

    let p = &a.patterns;
    println!("\nPatterns: {} found", p.total());
    for u in &p.unbroken_priors {
        println!(
            "  Unbroken {} {} ${:.2} ({} days)",
            u.label, u.role, u.level, u.days_unbroken
        );
    }
    for f in &p.failed_breaks {
        println!(
            "  Failed {:?} at {} ${:.2} ({} days ago)",
            f.kind, f.label, f.level, f.days_ago
        );
    }
    for c in &p.confluences {
        println!(
            "  Confluence ${:.2} ({} levels{})",
            c.level,
            c.count(),
            if c.nearby { ", nearby" } else { "" }
        );
    }
    for r in &p.reclaims {
        println!("  {:?} {} ${:.2} ({} days ago)", r.kind, r.label, r.level, r.days_ago);
    }
    for m in &p.magnet_interactions {
        println!(
            "  Magnet {} {} ${:.2} acted as {} ({} touches)",
            m.label,
            m.magnet_pct(),
            m.magnet_level,
            m.acted_as,
            m.touches
        );
    }

    println!("\n{}", level_summary(&a.top_levels));

    if let Some(s) = &a.strongest_level {
        println!("Strongest level: {} ${:.2} (${:.2} away)", s.timeframe, s.level, s.distance);
    }

    if let Some(sr) = &a.support_resistance {
        println!(
            "\nRecent range: ${:.2} - ${:.2} ({:.2}%)",
            sr.recent_low, sr.recent_high, sr.range_pct
        );
        for l in &sr.levels {
            println!("  {} VWAP ${:.2} acting as {}", l.timeframe, l.level, l.role);
        }
    }

    if let Some(e) = &a.entry {
        println!("\nEntry quality: {} ({})", e.quality.to_string().to_uppercase(), e.reason);
        if let Some(pct) = e.distance_pct {
            println!("  distance to nearest VWAP: {pct:.2}%");
        }
        for c in &e.confirmations {
            println!("  + {c}");
        }
    }
}

fn print_counts<K: std::fmt::Display>(title: &str, counts: impl IntoIterator<Item = (K, usize)>) {
    println!("  {title}:");
    for (k, n) in counts {
        println!("    {k}: {n}");
    }
}

fn print_rejection(r: &RejectionSummary, groups: &Universe) {
    println!("Prior-Quarter VWAP Rejection");
    println!("  touches:           {}", r.total);
    println!("  held:              {} ({:.1}%)", r.held, r.held_rate);
    println!("  broke:             {} ({:.1}%)", r.broke, r.broke_rate);
    println!("  avg reversal:      {:.2}%", r.avg_reversal_pct);
    println!("  avg bars to low:   {:.1}", r.avg_bars_to_low);
    println!("  avg continuation:  {:.2}%", r.avg_continuation_pct);
    print_counts("by year", r.by_year.iter().map(|(y, n)| (*y, *n)));
    print_counts("by sector", groups.count_by_sector(&r.by_symbol));
    println!("  verdict: {}", r.verdict);
}

fn print_sigma(s: &SigmaSummary, groups: &Universe) {
    println!("Sigma Support ({:+}σ below yearly VWAP)", s.sigma_level);
    println!("  touches:           {}", s.total);
    println!("  bounces:           {} ({:.1}%)", s.bounces, s.bounce_rate);
    println!("  failures:          {} ({:.1}%)", s.failures, s.failure_rate);
    println!("  reached VWAP:      {} ({:.1}%)", s.reached_vwap, s.vwap_reach_rate);
    println!("  avg bounce:        {:.2}%", s.avg_bounce_pct);
    println!("  avg bars to high:  {:.1}", s.avg_bars_to_high);
    println!("  avg breakdown:     {:.2}%", s.avg_breakdown_pct);
    print_counts("by year", s.by_year.iter().map(|(y, n)| (*y, *n)));
    print_counts("by sector", groups.count_by_sector(&s.by_symbol));
    println!("  verdict: {}", s.verdict);
}
