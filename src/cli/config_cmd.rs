use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::core::config::ReportConfig;

fn target_path(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(ReportConfig::config_path)
}

pub fn init(path: Option<&Path>) -> Result<()> {
    let path = target_path(path);
    if path.exists() {
        eprintln!("Config file already exists at {}", path.display());
        eprintln!("Remove it first if you want to regenerate.");
        return Ok(());
    }

    match ReportConfig::default().save(&path) {
        Ok(()) => {
            println!("Generated config at {}", path.display());
            println!("  Set slack.token, slack.channel and bigquery.table, or export");
            println!("  SLACK_API_TOKEN, SLACK_CHANNEL_ID and BQ_TABLE.");
        }
        Err(e) => {
            eprintln!("Failed to generate config: {}", e);
            std::process::exit(1);
        }
    }
    Ok(())
}

pub fn check(path: Option<&Path>) -> Result<()> {
    let shown = target_path(path);
    let config = match ReportConfig::resolve(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let issues = config.validate(true);
    if issues.is_empty() {
        println!("Config is valid: {}", shown.display());
        println!("  Channel:           {}", config.slack.channel.as_deref().unwrap_or(""));
        println!("  Table:             {}", config.bigquery.table.as_deref().unwrap_or(""));
        println!("  Credentials:       {}", config.bigquery.credentials_file.display());
        println!("  Project breakdown: {}", on_off(config.report.project_breakdown));
        println!("  Thread details:    {}", on_off(config.report.thread_details));
    } else {
        eprintln!("Config issues found in {}:", shown.display());
        for issue in &issues {
            eprintln!("  - {}", issue);
        }
        std::process::exit(1);
    }
    Ok(())
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}
