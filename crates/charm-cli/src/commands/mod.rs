pub mod completions;
pub mod expand;
pub mod get;
pub mod inspect;
pub mod latest;
pub mod man_pages;
pub mod pack;

use charm_format::{Charm, CharmError, CharmKind, UNSET_REVISION};
use charm_remote::CatalogConfig;
use charm_repo::{RepoError, Resolver};
use charm_schema::Url;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CHARM_ERROR: u8 = 2;
pub const EXIT_RESOLUTION_ERROR: u8 = 3;

/// Environment variable naming the local repository root.
pub const REPO_ENV: &str = "CHARM_REPO";

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    if let Ok(style) = ProgressStyle::with_template("{msg}") {
        pb.set_style(style);
    }
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    if let Ok(style) = ProgressStyle::with_template("{msg}") {
        pb.set_style(style);
    }
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn colorize_kind(kind: CharmKind) -> String {
    use console::Style;
    let label = kind.to_string();
    match kind {
        CharmKind::Dir => Style::new().cyan().apply_to(label).to_string(),
        CharmKind::Bundle => Style::new().green().apply_to(label).to_string(),
    }
}

#[allow(clippy::needless_pass_by_value)]
pub fn charm_err(e: CharmError) -> String {
    format!("charm error: {e}")
}

/// `RepoError::Charm` already reads "charm error: ..."; everything else is a
/// resolution failure.
pub fn repo_err(e: RepoError) -> String {
    match e {
        RepoError::Charm(_) => e.to_string(),
        other => format!("resolution error: {other}"),
    }
}

pub fn parse_url(src: &str, series: Option<&str>) -> Result<Url, String> {
    Url::infer(src, series).map_err(|e| format!("resolution error: {e}"))
}

/// Local repository root: `--repo`, then `$CHARM_REPO`, then empty.
pub fn local_root(flag: Option<&str>) -> PathBuf {
    let raw = match flag {
        Some(r) => r.to_owned(),
        None => std::env::var(REPO_ENV).unwrap_or_default(),
    };
    if raw.is_empty() {
        PathBuf::new()
    } else {
        expand_tilde(&raw)
    }
}

pub fn make_resolver(catalog_url: Option<&str>) -> Result<Resolver, String> {
    let config = if let Some(url) = catalog_url {
        CatalogConfig::new(url)
    } else {
        CatalogConfig::load_default().map_err(|e| format!("catalog config: {e}"))?
    };
    Ok(Resolver::new(config))
}

pub fn revision_label(revision: i32) -> String {
    if revision == UNSET_REVISION {
        "(unset)".to_owned()
    } else {
        revision.to_string()
    }
}

/// Print a charm either as JSON or as an aligned summary.
pub fn print_charm(charm: &Charm, source: &str, json: bool) -> Result<(), String> {
    let meta = charm.meta();
    if json {
        let payload = serde_json::json!({
            "source": source,
            "kind": charm.kind(),
            "revision": charm.revision(),
            "meta": meta,
            "config": charm.config(),
            "hooks": meta.hooks(),
        });
        println!("{}", json_pretty(&payload)?);
        return Ok(());
    }

    let names = |m: &std::collections::BTreeMap<String, charm_schema::Relation>| {
        m.iter()
            .map(|(name, rel)| format!("{name}:{}", rel.interface))
            .collect::<Vec<_>>()
            .join(", ")
    };
    println!("name:        {}", meta.name);
    println!("source:      {source}");
    println!("kind:        {}", colorize_kind(charm.kind()));
    println!("revision:    {}", revision_label(charm.revision()));
    println!("summary:     {}", meta.summary);
    if meta.subordinate {
        println!("subordinate: yes");
    }
    println!("provides:    {}", names(&meta.provides));
    println!("requires:    {}", names(&meta.requires));
    println!("peers:       {}", names(&meta.peers));
    println!("options:     {}", charm.config().options.len());
    println!("hooks:       {}", meta.hooks().len());
    Ok(())
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}
