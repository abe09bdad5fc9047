//! # Config Command
//!
//! Show the effective configuration.

use uipilot_server::ServerConfig;

pub fn run(config: &ServerConfig, paths: bool) -> anyhow::Result<()> {
    if paths {
        let show = |p: Option<std::path::PathBuf>| {
            p.map_or_else(|| "(unavailable)".to_string(), |p| p.display().to_string())
        };
        println!("# global:  {}", show(ServerConfig::global_config_path()));
        println!("# project: {}", show(ServerConfig::project_config_path()));
        if let Some(loaded) = &config.loaded_from {
            println!("# loaded:  {}", loaded.display());
        }
        println!();
    }

    print!("{}", config.to_toml()?);
    Ok(())
}
