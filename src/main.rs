use std::sync::OnceLock;

use anyhow::Context;
use clap::{ArgAction, ColorChoice, CommandFactory, Parser, ValueEnum};
use clap_complete::Shell;
use is_terminal::IsTerminal;
use serde::{Deserialize, Serialize};

mod analyze;
mod fixture;
mod graph;
mod normalize;
mod report;

use analyze::{AnalysisConfig, analyze};
use normalize::{NormalizedEvent, SignInBatch, normalize};

static ENABLE_COLOR: OnceLock<bool> = OnceLock::new();

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
enum OutputFmt { Text, Json }

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
pub enum TimeZone { Local, Utc }

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
enum LogLevel { Error, Warn, Info, Debug, Trace }

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
enum LogFormat { Text, Json }

#[derive(Parser, Debug)]
#[command(
    name = "SigninDoctor",
    about = "Sign-in log triage reporter",
    long_about = "Sign-in log triage reporter that pulls an Entra ID sign-in batch (or a local fixture), tallies failed logins per user, flags off-hours authentications, and cross-references the two into a high-priority list.",
    after_long_help = "Examples:\n  SigninDoctor --simulate\n  SigninDoctor --simulate --time-zone utc --output json\n  SigninDoctor --input batch.json --high-threshold 5 --report-path triage.txt\n  SigninDoctor --tenant-id <ID> --client-id <ID> --client-secret <SECRET>\n  SigninDoctor --input batch.json --off-hours-start 8 --off-hours-end 18",
    color = ColorChoice::Auto
)]
struct Args {
    #[arg(long, default_value_t = false, help = "Analyze the built-in simulated dataset instead of fetching")]
    simulate: bool,
    #[arg(long, short = 'i', conflicts_with = "simulate", help = "Read the sign-in batch from a JSON file (live feed shape)")]
    input: Option<String>,
    #[arg(long, help = "Entra tenant id (or SIGNINDOCTOR_TENANT_ID)")]
    tenant_id: Option<String>,
    #[arg(long, help = "App registration client id (or SIGNINDOCTOR_CLIENT_ID)")]
    client_id: Option<String>,
    #[arg(long, help = "App registration client secret (or SIGNINDOCTOR_CLIENT_SECRET)")]
    client_secret: Option<String>,
    #[arg(long, short = 't', default_value_t = 3, help = "Failure count at or above which a user is flagged HIGH")]
    high_threshold: u32,
    #[arg(long, default_value_t = 6, value_parser = clap::value_parser!(u32).range(0..=23), help = "First business hour; earlier hours are off-hours")]
    off_hours_start: u32,
    #[arg(long, default_value_t = 22, value_parser = clap::value_parser!(u32).range(0..=23), help = "Last business hour; later hours are off-hours")]
    off_hours_end: u32,
    #[arg(long, value_enum, default_value = "local", help = "Zone used for the hour-of-day classification")]
    time_zone: TimeZone,
    #[arg(long, default_value_t = false, help = "Abort when a timestamp is present but unparseable instead of skipping it")]
    strict_timestamps: bool,
    #[arg(long, short = 'o', value_enum, default_value = "text")]
    output: OutputFmt,
    #[arg(long, short = 'j', help = "Write the JSON summary to this path")]
    json_path: Option<String>,
    #[arg(long, short = 'r', help = "Write the text report to this path")]
    report_path: Option<String>,
    #[arg(long, short = 'C', default_value_t = false)]
    no_color: bool,
    #[arg(long, default_value_t = false)]
    no_emoji: bool,
    #[arg(long, default_value_t = false)]
    force_color: bool,
    #[arg(long)]
    log_level: Option<LogLevel>,
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
    #[arg(long)]
    log_path: Option<String>,
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
    #[arg(short = 'q', long, default_value_t = false)]
    quiet: bool,
    #[arg(long, value_enum)]
    completions: Option<Shell>,
    #[arg(long)]
    completions_out: Option<String>,
    #[arg(long)]
    config: Option<String>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            simulate: false,
            input: None,
            tenant_id: None,
            client_id: None,
            client_secret: None,
            high_threshold: 3,
            off_hours_start: 6,
            off_hours_end: 22,
            time_zone: TimeZone::Local,
            strict_timestamps: false,
            output: OutputFmt::Text,
            json_path: None,
            report_path: None,
            no_color: false,
            no_emoji: false,
            force_color: false,
            log_level: None,
            log_format: None,
            log_path: None,
            verbose: 0,
            quiet: false,
            completions: None,
            completions_out: None,
            config: None,
        }
    }
}

#[derive(Deserialize)]
struct AppConfig {
    tenant_id: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    input: Option<String>,
    simulate: Option<bool>,
    high_threshold: Option<u32>,
    off_hours_start: Option<u32>,
    off_hours_end: Option<u32>,
    time_zone: Option<TimeZone>,
    strict_timestamps: Option<bool>,
    output: Option<OutputFmt>,
    json_path: Option<String>,
    report_path: Option<String>,
    no_emoji: Option<bool>,
    force_color: Option<bool>,
    log_format: Option<LogFormat>,
    log_path: Option<String>,
}

fn main() {
    let mut args = Args::parse();
    if let Some(sh) = args.completions {
        let mut cmd = Args::command();
        if let Some(path) = args.completions_out.as_ref() {
            if let Ok(mut f) = std::fs::File::create(path) { clap_complete::generate(sh, &mut cmd, "SigninDoctor", &mut f); } else { clap_complete::generate(sh, &mut cmd, "SigninDoctor", &mut std::io::stdout()); }
        } else {
            clap_complete::generate(sh, &mut cmd, "SigninDoctor", &mut std::io::stdout());
        }
        return;
    }
    if let Some(p) = args.config.as_ref()
        && let Ok(s) = std::fs::read_to_string(p)
        && let Ok(cfg) = toml::from_str::<AppConfig>(&s) { apply_config(&mut args, cfg); }
    else {
        let def = "SigninDoctor.toml";
        if let Ok(s) = std::fs::read_to_string(def)
            && let Ok(cfg) = toml::from_str::<AppConfig>(&s) { apply_config(&mut args, cfg); }
    }
    {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if args.quiet {
            builder.filter_level(log::LevelFilter::Error);
        } else if let Some(lvl) = args.log_level {
            let f = match lvl { LogLevel::Error => log::LevelFilter::Error, LogLevel::Warn => log::LevelFilter::Warn, LogLevel::Info => log::LevelFilter::Info, LogLevel::Debug => log::LevelFilter::Debug, LogLevel::Trace => log::LevelFilter::Trace };
            builder.filter_level(f);
        } else if args.verbose > 0 {
            let f = if args.verbose >= 3 { log::LevelFilter::Trace } else if args.verbose == 2 { log::LevelFilter::Debug } else { log::LevelFilter::Info };
            builder.filter_level(f);
        }
        if let Some(fmt) = args.log_format {
            match fmt {
                LogFormat::Json => {
                    builder.format(|buf, record| {
                        use std::io::Write;
                        let ts = chrono::Local::now().to_rfc3339();
                        let obj = serde_json::json!({
                            "ts": ts,
                            "level": record.level().to_string(),
                            "target": record.target(),
                            "msg": record.args().to_string(),
                        });
                        writeln!(buf, "{}", obj)
                    });
                }
                LogFormat::Text => {
                    builder.format(|buf, record| {
                        use std::io::Write;
                        let ts = chrono::Local::now().format("%H:%M:%S");
                        writeln!(buf, "[{:<5} {}] {}", record.level(), ts, record.args())
                    });
                }
            }
        }
        if let Some(path) = args.log_path.as_ref() {
            match std::fs::File::create(path) {
                Ok(f) => { builder.target(env_logger::Target::Pipe(Box::new(f))); }
                Err(e) => { eprintln!("Failed to open log file {}: {}", path, e); }
            }
        }
        builder.init();
    }
    let term = std::env::var("TERM").unwrap_or_default();
    let no_color_env = std::env::var_os("NO_COLOR").is_some();
    let color_default = std::io::stdout().is_terminal() && !no_color_env && term != "dumb";
    let enable_color = if args.force_color { true } else { color_default && !args.no_color };
    let _ = ENABLE_COLOR.set(enable_color);

    let cfg = AnalysisConfig {
        high_threshold: args.high_threshold,
        off_hours_start: args.off_hours_start,
        off_hours_end: args.off_hours_end,
    };
    if cfg.off_hours_start > cfg.off_hours_end {
        log::warn!("off-hours window start {} is after end {}; every hour will classify as off-hours", cfg.off_hours_start, cfg.off_hours_end);
    }
    let batch = match load_batch(&args) {
        Ok(b) => b,
        Err(e) => { log::error!("{:#}", e); std::process::exit(1); }
    };
    let events: Vec<NormalizedEvent> = batch.value.iter().map(|r| normalize(r, args.time_zone)).collect();
    let unparsed = events.iter().filter(|e| e.timestamp_unparsed()).count();
    if unparsed > 0 {
        if args.strict_timestamps {
            log::error!("{} event(s) carry unparseable timestamps; aborting (--strict-timestamps)", unparsed);
            std::process::exit(1);
        }
        log::warn!("{} event(s) carry unparseable timestamps; excluded from off-hours classification", unparsed);
    }
    let analysis = analyze(&events, &cfg);
    let summary = report::build_summary(&analysis, &cfg);
    log::info!("analyzed {} event(s): {} failing identities, {} off-hours logins, {} high priority", summary.total_events, summary.failed_logins.len(), summary.off_hours.len(), summary.high_priority.len());
    match args.output {
        OutputFmt::Text => {
            if !args.quiet { print!("{}", report::render_text(&summary, !args.no_emoji)); }
        }
        OutputFmt::Json => {
            if !args.quiet { println!("{}", serde_json::to_string_pretty(&summary).unwrap()); }
        }
    }
    if let Some(p) = args.report_path.as_ref() {
        match std::fs::write(p, report::render_text(&summary, !args.no_emoji)) {
            Ok(_) => { if !args.quiet { println!("{}", paint(&format!("Report written: {}", p), "1;36")); } }
            Err(e) => log::error!("Report write failed for {}: {}", p, e),
        }
    }
    if let Some(p) = args.json_path.as_ref() {
        match std::fs::write(p, serde_json::to_vec_pretty(&summary).unwrap()) {
            Ok(_) => { if !args.quiet { println!("{}", paint(&format!("JSON written: {}", p), "1;36")); } }
            Err(e) => log::error!("JSON write failed for {}: {}", p, e),
        }
    }
}

fn apply_config(args: &mut Args, cfg: AppConfig) {
    if args.tenant_id.is_none() && let Some(v) = cfg.tenant_id { args.tenant_id = Some(v); }
    if args.client_id.is_none() && let Some(v) = cfg.client_id { args.client_id = Some(v); }
    if args.client_secret.is_none() && let Some(v) = cfg.client_secret { args.client_secret = Some(v); }
    if args.input.is_none() && let Some(v) = cfg.input { args.input = Some(v); }
    if !args.simulate && let Some(v) = cfg.simulate { args.simulate = v; }
    if args.high_threshold == 3 && let Some(v) = cfg.high_threshold { args.high_threshold = v; }
    if args.off_hours_start == 6 && let Some(v) = cfg.off_hours_start { args.off_hours_start = v; }
    if args.off_hours_end == 22 && let Some(v) = cfg.off_hours_end { args.off_hours_end = v; }
    if let Some(v) = cfg.time_zone { args.time_zone = v; }
    if let Some(v) = cfg.strict_timestamps { args.strict_timestamps = v; }
    if let Some(v) = cfg.output { args.output = v; }
    if args.json_path.is_none() && let Some(v) = cfg.json_path { args.json_path = Some(v); }
    if args.report_path.is_none() && let Some(v) = cfg.report_path { args.report_path = Some(v); }
    if let Some(v) = cfg.no_emoji { args.no_emoji = v; }
    if let Some(v) = cfg.force_color { args.force_color = v; }
    if let Some(v) = cfg.log_format { args.log_format = Some(v); }
    if args.log_path.is_none() && let Some(v) = cfg.log_path { args.log_path = Some(v); }
}

/// Pick the batch source: fixture, local file, or the live Graph feed. Any
/// failure here means the analysis never runs and the process exits nonzero.
fn load_batch(args: &Args) -> anyhow::Result<SignInBatch> {
    if args.simulate {
        if !args.quiet { println!("{}", paint("Running analysis on simulated sign-in logs...", "1;36")); }
        return Ok(fixture::simulated_batch());
    }
    if let Some(p) = args.input.as_ref() {
        let data = std::fs::read_to_string(p).with_context(|| format!("failed to read {}", p))?;
        return serde_json::from_str(&data).with_context(|| format!("{} is not a sign-in batch", p));
    }
    let tenant = cred(args.tenant_id.as_deref(), "SIGNINDOCTOR_TENANT_ID")
        .context("tenant id missing: pass --tenant-id, set SIGNINDOCTOR_TENANT_ID, or add tenant_id to SigninDoctor.toml")?;
    let client = cred(args.client_id.as_deref(), "SIGNINDOCTOR_CLIENT_ID")
        .context("client id missing: pass --client-id, set SIGNINDOCTOR_CLIENT_ID, or add client_id to SigninDoctor.toml")?;
    let secret = cred(args.client_secret.as_deref(), "SIGNINDOCTOR_CLIENT_SECRET")
        .context("client secret missing: pass --client-secret, set SIGNINDOCTOR_CLIENT_SECRET, or add client_secret to SigninDoctor.toml")?;
    if !args.quiet { println!("{}", paint("Authenticating...", "1;36")); }
    let token = graph::get_access_token(&tenant, &client, &secret)
        .context("failed to get token; check your credentials")?;
    if !args.quiet { println!("{}", paint("Pulling sign-in logs...", "1;36")); }
    graph::fetch_signin_logs(&token)
}

fn cred(flag: Option<&str>, env: &str) -> Option<String> {
    flag.map(|s| s.to_string())
        .or_else(|| std::env::var(env).ok())
        .filter(|s| !s.is_empty())
}

fn paint(s: &str, code: &str) -> String {
    if *ENABLE_COLOR.get().unwrap_or(&true) { format!("\x1b[{}m{}\x1b[0m", code, s) } else { s.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_config() -> AppConfig {
        AppConfig {
            tenant_id: None,
            client_id: None,
            client_secret: None,
            input: None,
            simulate: None,
            high_threshold: None,
            off_hours_start: None,
            off_hours_end: None,
            time_zone: None,
            strict_timestamps: None,
            output: None,
            json_path: None,
            report_path: None,
            no_emoji: None,
            force_color: None,
            log_format: None,
            log_path: None,
        }
    }

    #[test]
    fn config_fills_unset_values() {
        let mut a = Args::default();
        let cfg = AppConfig {
            tenant_id: Some("t".to_string()),
            high_threshold: Some(5),
            off_hours_start: Some(8),
            ..empty_config()
        };
        apply_config(&mut a, cfg);
        assert_eq!(a.tenant_id.as_deref(), Some("t"));
        assert_eq!(a.high_threshold, 5);
        assert_eq!(a.off_hours_start, 8);
        assert_eq!(a.off_hours_end, 22);
    }

    #[test]
    fn cli_values_win_over_config() {
        let mut a = Args { tenant_id: Some("cli".to_string()), high_threshold: 7, ..Default::default() };
        let cfg = AppConfig {
            tenant_id: Some("file".to_string()),
            high_threshold: Some(5),
            ..empty_config()
        };
        apply_config(&mut a, cfg);
        assert_eq!(a.tenant_id.as_deref(), Some("cli"));
        assert_eq!(a.high_threshold, 7);
    }

    #[test]
    fn config_parses_from_toml() {
        let cfg: AppConfig = toml::from_str("high_threshold = 2\noff_hours_end = 20\nsimulate = true\ntime_zone = \"Utc\"\n").unwrap();
        let mut a = Args::default();
        apply_config(&mut a, cfg);
        assert_eq!(a.high_threshold, 2);
        assert_eq!(a.off_hours_end, 20);
        assert!(a.simulate);
        assert!(matches!(a.time_zone, TimeZone::Utc));
    }

    #[test]
    fn cred_prefers_flag_and_rejects_empty() {
        assert_eq!(cred(Some("x"), "SIGNINDOCTOR_TEST_UNSET").as_deref(), Some("x"));
        assert_eq!(cred(Some(""), "SIGNINDOCTOR_TEST_UNSET"), None);
        assert_eq!(cred(None, "SIGNINDOCTOR_TEST_UNSET"), None);
    }
}
