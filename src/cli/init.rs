use std::io::IsTerminal;
use std::path::Path;

use crate::config::SAMPLE_RULES;
use crate::error::Result;
use crate::settings::{load_settings, save_settings, settings_file_exists, shellexpand_path};

pub fn run(data_dir: Option<String>, rules_path: &Path) -> Result<()> {
    let mut settings = load_settings();

    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    } else if !settings_file_exists() && std::io::stdin().is_terminal() {
        // First run: prompt for data dir
        println!("Data directory [{}]: ", settings.data_dir);
        let mut input = String::new();
        std::io::stdin().read_line(&mut input).ok();
        let chosen = input.trim();
        if !chosen.is_empty() {
            settings.data_dir = shellexpand_path(chosen);
        }
    }

    save_settings(&settings)?;

    std::fs::create_dir_all(settings.data_dir())?;
    std::fs::create_dir_all(settings.logs_dir())?;
    std::fs::create_dir_all(settings.exports_dir())?;

    if rules_path.exists() {
        println!("Keeping existing rules at {}", rules_path.display());
    } else {
        write_sample_rules(rules_path)?;
        println!("Wrote sample rules to {}", rules_path.display());
    }

    println!("Initialized tidyspend at {}", settings.data_dir().display());
    if settings.email.is_empty() || settings.api_token.is_none() {
        println!("Set TIDYSPEND_EMAIL and TIDYSPEND_API_TOKEN (or pass --email/--token) to reach the API.");
    }
    Ok(())
}

pub fn write_sample_rules(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, SAMPLE_RULES)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config;

    #[test]
    fn test_sample_rules_written_and_loadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("rules.toml");
        write_sample_rules(&path).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.rules.len(), 3);
    }
}
