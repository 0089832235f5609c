use crate::infra::{pattern_matcher, registry_client};
use clap::Args;
use portal_guard::config::AppConfig;
use portal_guard::error::AppError;
use portal_guard::safety::registry::import::parse_entries_from_path;
use portal_guard::safety::registry::{import_entries, ImportSummary};
use portal_guard::telemetry;
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug)]
pub(crate) struct UserAgentArgs {
    /// Raw User-Agent header value to test
    pub(crate) user_agent: String,
}

#[derive(Args, Debug)]
pub(crate) struct DomainArgs {
    /// URL or bare hostname to test
    pub(crate) url: String,
}

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// CSV export with `type,value,reason,expires_at` columns
    pub(crate) csv: PathBuf,
    /// Registry bearer credential of the operator; defaults to REGISTRY_API_TOKEN
    #[arg(long)]
    pub(crate) token: Option<String>,
}

pub(crate) fn run_check_user_agent(args: UserAgentArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let blocked = pattern_matcher(&config).is_user_agent_blacklisted(&args.user_agent);
    println!("{}", verdict_line("user agent", &args.user_agent, blocked));
    Ok(())
}

pub(crate) fn run_check_domain(args: DomainArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let blocked = pattern_matcher(&config).is_domain_blacklisted(&args.url);
    println!("{}", verdict_line("domain", &args.url, blocked));
    Ok(())
}

pub(crate) async fn run_import(args: ImportArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let entries = parse_entries_from_path(&args.csv)?;
    info!(rows = entries.len(), path = %args.csv.display(), "importing blacklist entries");

    let bearer = args.token.or_else(|| config.registry.api_token.clone());
    let client = registry_client(&config)?;
    let summary = import_entries(&client, entries, bearer.as_deref()).await;
    for line in summary_lines(&summary) {
        println!("{line}");
    }
    Ok(())
}

fn verdict_line(subject: &str, value: &str, blocked: bool) -> String {
    let verdict = if blocked { "BLOCKED" } else { "allowed" };
    format!("{verdict:<8} {subject}: {value}")
}

fn summary_lines(summary: &ImportSummary) -> Vec<String> {
    let mut lines = vec![format!(
        "Imported {} entries, {} failed",
        summary.created,
        summary.failed.len()
    )];
    lines.extend(summary.failed.iter().map(|(entry, err)| {
        format!("  - {} '{}': {}", entry.kind, entry.value, err)
    }));
    lines
}
