use super::{charm_err, json_pretty, EXIT_SUCCESS};
use charm_format::CharmBundle;
use std::path::Path;

pub fn run(bundle: &Path, dir: &Path, json: bool) -> Result<u8, String> {
    let charm = CharmBundle::read(bundle).map_err(charm_err)?;
    charm.expand_to(dir).map_err(charm_err)?;

    if json {
        let payload = serde_json::json!({
            "name": charm.meta().name,
            "revision": charm.revision(),
            "dir": dir.display().to_string(),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("expanded {} into {}", charm.meta().name, dir.display());
    }
    Ok(EXIT_SUCCESS)
}
