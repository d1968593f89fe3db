use anyhow::Result;
use serde_json::json;

use crate::config::Config;

pub(crate) fn cmd_config(config: &Config, json: bool) -> Result<()> {
    let api_key = config.redacted_api_key();
    let config_path = config
        .config_path
        .as_ref()
        .map(|p| p.display().to_string());

    if json {
        let value = json!({
            "api_key": api_key,
            "endpoint": config.endpoint,
            "model": config.chat.model,
            "max_tokens": config.chat.max_tokens,
            "temperature": config.chat.temperature,
            "timeout_secs": config.timeout.as_secs(),
            "config_file": config_path,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("API key:     {}", api_key.as_deref().unwrap_or("(not set)"));
    println!("Endpoint:    {}", config.endpoint);
    println!("Model:       {}", config.chat.model);
    println!("Max tokens:  {}", config.chat.max_tokens);
    println!("Temperature: {}", config.chat.temperature);
    println!("Timeout:     {}s", config.timeout.as_secs());
    println!(
        "Config file: {}",
        config_path.as_deref().unwrap_or("(unavailable)")
    );
    Ok(())
}
