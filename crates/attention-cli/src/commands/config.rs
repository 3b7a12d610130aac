use std::path::PathBuf;

use attention_core::Config;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write the default config
    Init {
        /// Target file (defaults to the user config location)
        #[arg(long)]
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective config as TOML
    Show {
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Check a config file without running anything
    Validate {
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Get a config value
    Get {
        /// Dot-separated key (e.g. "patterns.min_support")
        key: String,
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

fn load(path: Option<PathBuf>) -> Result<Config, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };
    Ok(config)
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Init { path, force } => {
            let path = path.unwrap_or_else(Config::default_path);
            if path.exists() && !force {
                return Err(format!("{} already exists (use --force to overwrite)", path.display()).into());
            }
            Config::default().save_to(&path)?;
            println!("wrote {}", path.display());
        }
        ConfigAction::Show { path } => {
            let config = load(path)?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Validate { path } => {
            load(path)?.validate()?;
            println!("ok");
        }
        ConfigAction::Get { key, path } => {
            let config = load(path)?;
            match config.get(&key) {
                Some(value) => println!("{value}"),
                None => return Err(format!("unknown key: {key}").into()),
            }
        }
    }
    Ok(())
}
