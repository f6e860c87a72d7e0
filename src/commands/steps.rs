//! `steps` command - list what a config can refer to

use anyhow::Result;
use colored::Colorize;

use crate::commands::run;
use crate::presets::PRESETS;
use crate::ui;

pub fn list() -> Result<()> {
    let registry = run::registry();

    ui::header("Step Types");
    let mut names: Vec<(&str, i32)> = registry.names().collect();
    names.sort_by_key(|&(name, priority)| (priority, name));
    for (name, priority) in names {
        println!("  {:>4}  {}", priority.to_string().dimmed(), name.bold());
    }

    ui::header("Presets");
    for preset in PRESETS {
        println!("  {:<10} {}", preset.name.bold(), preset.description.dimmed());
    }

    Ok(())
}
