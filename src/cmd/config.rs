//! Configuration view and validation commands: `photosweep config`.

use anyhow::Result;

use photosweep::sweep_config::{SweepConfig, SweepToml};

use super::super::ConfigCommands;

fn print_toml(toml: &SweepToml) {
    println!("[workflow]");
    println!(
        "  classification_on_swipe = {}",
        toml.workflow.classification_on_swipe
    );
    println!("  daily_task_target = {}", toml.workflow.daily_task_target);
    println!("  filter = {:?}", toml.workflow.filter);
    println!();

    println!("[ledger]");
    println!("  capacity = {}", toml.ledger.capacity);
    println!();

    println!("[classify]");
    println!("  transfer = \"{}\"", toml.classify.transfer);
    println!("  album_root = \"{}\"", toml.classify.album_root);
    println!();

    println!("[logging]");
    println!("  level = \"{}\"", toml.logging.level);
    println!("  json = {}", toml.logging.json);
    if let Some(dir) = &toml.logging.dir {
        println!("  dir = \"{}\"", dir.display());
    }
    println!();
}

pub fn cmd_config(config: &SweepConfig, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = config.config_file();

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Photosweep Configuration");
            println!("========================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No sweep.toml found at {}", config_path.display());
                println!("Using defaults (or the per-user file, if present).");
            }
            println!();
            print_toml(&config.toml);

            println!("Effective values (with env/CLI overrides):");
            println!("  transfer = \"{}\"", config.transfer());
            println!("  ledger_capacity = {}", config.ledger_capacity());
            println!("  log_level = \"{}\"", config.log_level());
            println!();

            if !config_path.exists() {
                println!("Run 'photosweep config init' to create a sweep.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No sweep.toml found. Using defaults (valid).");
                return Ok(());
            }

            let toml = SweepToml::load(&config_path)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("sweep.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            SweepToml::default().save(&config_path)?;

            println!("Created sweep.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [workflow] classification_on_swipe, daily_task_target, filter");
            println!("  - [ledger] capacity");
            println!("  - [classify] transfer, album_root");
            println!("  - [logging] level, json, dir");
            println!();
        }
    }

    Ok(())
}
