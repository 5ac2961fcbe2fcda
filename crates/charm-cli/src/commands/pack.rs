use super::{charm_err, json_pretty, revision_label, EXIT_SUCCESS};
use charm_format::CharmDir;
use std::path::Path;

pub fn run(dir: &Path, out: &Path, json: bool) -> Result<u8, String> {
    let charm = CharmDir::read(dir).map_err(charm_err)?;
    charm.bundle_to(out).map_err(charm_err)?;

    if json {
        let payload = serde_json::json!({
            "name": charm.meta().name,
            "revision": charm.revision(),
            "bundle": out.display().to_string(),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "packed {} (revision {}) into {}",
            charm.meta().name,
            revision_label(charm.revision()),
            out.display()
        );
    }
    Ok(EXIT_SUCCESS)
}
