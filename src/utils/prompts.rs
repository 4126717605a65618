use anyhow::{Result, bail};
use inquire::{Confirm, MultiSelect, Select};
use tracing::error;

pub fn user_confirmation(skip_confirmation: bool, action_description: &str) -> Result<bool> {
    if !skip_confirmation {
        let confirm = Confirm::new(action_description)
            .with_default(false)
            .prompt();

        match confirm {
            Ok(true) => {
                println!("Confirmed! Proceeding...");
                Ok(true)
            }
            Ok(false) => {
                println!("Operation cancelled by user");
                Ok(false)
            }
            Err(e) => {
                error!("{}", e.to_string());
                bail!("Failure processing user response")
            }
        }
    } else {
        println!("Automatic confirmation with -y flag. Proceeding...");
        Ok(true)
    }
}

/// Single selection out of rendered option lines; returns the chosen index.
pub fn select_index(prompt: &str, options: Vec<String>) -> Result<usize> {
    if options.is_empty() {
        bail!("Nothing to select from for: {}", prompt);
    }
    match Select::new(prompt, options).raw_prompt() {
        Ok(selection) => Ok(selection.index),
        Err(e) => {
            error!("{}", e.to_string());
            bail!("Failed processing user selection")
        }
    }
}

/// Multi-selection over plain names; at least one pick is required.
pub fn select_many(prompt: &str, options: Vec<String>) -> Result<Vec<String>> {
    if options.is_empty() {
        bail!("Nothing to select from for: {}", prompt);
    }
    match MultiSelect::new(prompt, options).prompt() {
        Ok(picked) if !picked.is_empty() => Ok(picked),
        Ok(_) => bail!("At least one selection is required"),
        Err(e) => {
            error!("{}", e.to_string());
            bail!("Failed processing user selection")
        }
    }
}
