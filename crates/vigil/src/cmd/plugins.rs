//! Plugins command - List compiled-in connector types

use anyhow::Result;
use vigil_connectors::ConnectorRegistry;

/// Run the plugins command
pub fn run() -> Result<()> {
    let registry = ConnectorRegistry::with_builtin();
    if registry.is_empty() {
        println!("No connector types compiled in");
        return Ok(());
    }

    for key in registry.available() {
        if let Some(plugin) = registry.plugin(key) {
            println!("{:<10} {:<10} {}", plugin.type_key, plugin.display_name, plugin.description);
        }
    }
    Ok(())
}
