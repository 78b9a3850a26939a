//! `scribe providers`: supported vendors and configured profiles.

use scribe_config::{AppConfig, ProviderSettings};
use scribe_core::ProviderKind;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🤖 Supported LLM Providers");
    println!("==========================");
    println!();
    for kind in ProviderKind::ALL {
        let base_url = scribe_providers::default_base_url(kind).unwrap_or("(per resource)");
        let defaults = ProviderSettings::new(kind);
        println!("  {:<15} {:<45} {}", kind.as_str(), base_url, defaults.env_key_var());
    }
    println!();

    let config = AppConfig::load()?;
    println!("  Configured:");
    println!("    default  {} / {}", config.provider.kind, config.provider.model_name());
    let mut names: Vec<&String> = config.profiles.keys().collect();
    names.sort();
    for name in names {
        let settings = &config.profiles[name];
        println!("    {name:<8} {} / {}", settings.kind, settings.model_name());
    }

    // Only profiles with credentials build; show which ones are usable.
    match scribe_providers::build_from_config(&config) {
        Ok(router) => println!("  Ready:     {}", router.list().join(", ")),
        Err(e) => println!("  Ready:     none ({e})"),
    }
    println!();
    println!("  Environment variables:");
    println!("    SCRIBE_PROVIDER, SCRIBE_MODEL, SCRIBE_API_KEY, SCRIBE_PROFILE");
    println!("    SCRIBE_BACKEND_URL, SCRIBE_BACKEND_USER, SCRIBE_BACKEND_PASSWORD");

    Ok(())
}
