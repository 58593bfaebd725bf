//! `campuspilot config` — show the effective configuration.

use campuspilot_config::AppConfig;

pub async fn show(config: &AppConfig) -> anyhow::Result<()> {
    let path = AppConfig::config_path();
    if path.exists() {
        println!("# {}", path.display());
    } else {
        println!("# {} (not found, showing defaults)", path.display());
    }
    print!("{}", config.to_toml());
    Ok(())
}
