use crate::config::Config;
use crate::plugins::PluginRegistry;

/// `scrapqt plugins`: list the product sources enabled by `config`.
pub fn list_plugins(config: &Config) {
    let registry = PluginRegistry::from_config(config);

    if registry.is_empty() {
        println!("No plugins enabled. Check the [plugins] section of your config.");
        return;
    }

    println!("{:<22} DESCRIPTION", "PLATFORM");
    for plugin in registry.plugins() {
        println!("{:<22} {}", plugin.platform_name(), plugin.description());
    }
}
