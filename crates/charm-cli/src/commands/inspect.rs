use super::{charm_err, print_charm, EXIT_SUCCESS};
use std::path::Path;

pub fn run(path: &Path, json: bool) -> Result<u8, String> {
    let charm = charm_format::read(path).map_err(charm_err)?;
    print_charm(&charm, &path.display().to_string(), json)?;
    Ok(EXIT_SUCCESS)
}
