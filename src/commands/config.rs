use crate::FlashbackContext;
use crate::config::KEYS;
use crate::output;
use anyhow::Result;
use colored::Colorize;

/// Get, set, unset or list configuration values
///
/// # Errors
///
/// Returns an error if:
/// - The key is unknown or the value is invalid
/// - The configuration file cannot be saved
pub fn execute(
    ctx: &mut FlashbackContext,
    key: Option<&str>,
    value: Option<&str>,
    unset: bool,
    list: bool,
) -> Result<()> {
    let Some(key) = key.filter(|_| !list) else {
        show_all_config(ctx);
        return Ok(());
    };

    if unset {
        ctx.config.unset(key)?;
        ctx.config.save(&ctx.config_path)?;
        output::success(&format!("Unset {key}"));
    } else if let Some(value) = value {
        ctx.config.set(key, value)?;
        ctx.config.save(&ctx.config_path)?;
        output::success(&format!("Set {key} = {value}"));
    } else if let Some(value) = ctx.config.get(key) {
        println!("{value}");
    } else if KEYS.contains(&key) {
        output::warning(&format!("Configuration key '{key}' is not set"));
    } else {
        anyhow::bail!("Unknown configuration key: {key}");
    }

    Ok(())
}

fn show_all_config(ctx: &FlashbackContext) {
    println!("{} {}", "#".dimmed(), ctx.config_path.display().to_string().dimmed());

    let mut section = "";
    for key in KEYS {
        let Some((name, field)) = key.split_once('.') else {
            continue;
        };
        if name != section {
            if !section.is_empty() {
                println!();
            }
            println!("{}", format!("[{name}]").bold());
            section = name;
        }
        match ctx.config.get(key) {
            Some(value) => println!("  {field} = {value}"),
            None => println!("  {field} = {}", "(unset)".dimmed()),
        }
    }
}
