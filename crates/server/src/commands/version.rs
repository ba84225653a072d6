//! Handler for the `version` command.

use crate::version;
use anyhow::Result;

/// Handle the `version` command.
pub(crate) fn handle_version_command(output: Option<String>) -> Result<()> {
    let info = version::get();
    match output.as_deref() {
        Some("json") => println!("{}", serde_json::to_string_pretty(&info)?),
        Some(other) => anyhow::bail!("unsupported output format {other:?}, expected \"json\""),
        None => println!("{info}"),
    }
    Ok(())
}
