use super::{json_pretty, make_resolver, parse_url, repo_err, revision_label, EXIT_SUCCESS};
use std::path::Path;

pub fn run(
    src: &str,
    series: Option<&str>,
    repo_root: &Path,
    catalog_url: Option<&str>,
    json: bool,
) -> Result<u8, String> {
    let url = parse_url(src, series)?;
    let resolver = make_resolver(catalog_url)?;
    let repo = resolver.infer(&url, repo_root).map_err(repo_err)?;
    let revision = repo.latest(&url).map_err(repo_err)?;

    if json {
        let payload = serde_json::json!({
            "url": url.unrevisioned(),
            "repository": repo.kind(),
            "revision": revision,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("{} {}", url.unrevisioned(), revision_label(revision));
    }
    Ok(EXIT_SUCCESS)
}
