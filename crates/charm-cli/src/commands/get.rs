use super::{
    make_resolver, parse_url, print_charm, repo_err, spin_fail, spin_ok, spinner, EXIT_SUCCESS,
};
use charm_repo::RepositoryKind;
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

    let charm = if repo.kind() == RepositoryKind::Catalog && !json {
        let pb = spinner(&format!("fetching {url}…"));
        let charm = repo.get(&url).map_err(|e| {
            spin_fail(&pb, "fetch failed");
            repo_err(e)
        })?;
        spin_ok(&pb, &format!("fetched {url}"));
        charm
    } else {
        repo.get(&url).map_err(repo_err)?
    };

    print_charm(&charm, &url.to_string(), json)?;
    Ok(EXIT_SUCCESS)
}
