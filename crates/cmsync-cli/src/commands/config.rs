use anyhow::Context;
use cmsync_core::config::ConfigDiscovery;

use super::common::CommandOptions;

pub struct Config;

impl Config {
    /// Print the config files in effect and the merged result
    pub fn execute(options: &CommandOptions<'_>) -> anyhow::Result<()> {
        if options.no_config {
            println!("Config files: ignored (--no-config)");
        } else {
            let files = ConfigDiscovery::discover(options.dir, options.config_path);
            let found: Vec<_> = files.iter().collect();
            if found.is_empty() {
                println!("Config files: none found");
            } else {
                println!("Config files (highest precedence first):");
                for path in found {
                    println!("  {}", path.display());
                }
            }
            if let Some(global) = ConfigDiscovery::global_config_path() {
                if options.verbose {
                    println!("Global config location: {}", global.display());
                }
            }
        }

        let config = options.load_config()?;
        let merged = toml::to_string_pretty(&config).context("Failed to render configuration")?;

        println!();
        println!("Working directory: {}", options.dir.display());
        println!("Concurrency: {}", config.concurrency());
        println!("Request timeout: {}s", config.request_timeout().as_secs());
        let retry = config.retry_policy();
        println!(
            "Retry: {} attempts, {}ms initial delay",
            retry.max_attempts,
            retry.initial_delay.as_millis()
        );
        if !merged.trim().is_empty() {
            println!();
            print!("{merged}");
        }
        Ok(())
    }
}
