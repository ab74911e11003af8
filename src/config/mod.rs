mod settings;

pub use settings::{Company, Config, InvoiceSettings, PdfSettings};

use crate::error::{LedgerError, Result};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.toml";
pub const LEDGER_FILE: &str = "ledger.toml";

/// Get the config directory path: `$UNITBOOK_DIR`, the platform config dir,
/// or `~/.unitbook/`.
pub fn config_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("UNITBOOK_DIR") {
        return Ok(PathBuf::from(dir));
    }

    if let Some(proj_dirs) = ProjectDirs::from("", "", "unitbook") {
        return Ok(proj_dirs.config_dir().to_path_buf());
    }

    let home = dirs_home().ok_or_else(|| {
        LedgerError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not determine home directory",
        ))
    })?;

    Ok(home.join(".unitbook"))
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// Expand ~ in paths
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_home() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Resolve the PDF output directory; relative paths hang off the config dir.
pub fn resolve_output_dir(output_dir: &str, cfg_dir: &Path) -> PathBuf {
    let expanded = expand_path(output_dir);
    if expanded.is_absolute() {
        expanded
    } else {
        cfg_dir.join(expanded)
    }
}

pub fn store_path(cfg_dir: &Path) -> PathBuf {
    cfg_dir.join(LEDGER_FILE)
}

/// Load and validate config.toml
pub fn load_config(cfg_dir: &Path) -> Result<Config> {
    if !cfg_dir.exists() {
        return Err(LedgerError::ConfigNotFound(cfg_dir.to_path_buf()));
    }
    let path = cfg_dir.join(CONFIG_FILE);
    if !path.exists() {
        return Err(LedgerError::ConfigNotFound(path));
    }
    let content = fs::read_to_string(&path)?;
    let config: Config =
        toml::from_str(&content).map_err(|e| LedgerError::ConfigParse { path, source: e })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory with a template config and an empty ledger.
pub fn init_config_dir(cfg_dir: &Path) -> Result<()> {
    if cfg_dir.exists() {
        return Err(LedgerError::AlreadyInitialized(cfg_dir.to_path_buf()));
    }

    fs::create_dir_all(cfg_dir)?;
    fs::create_dir_all(cfg_dir.join("output"))?;
    fs::write(cfg_dir.join(CONFIG_FILE), CONFIG_TEMPLATE)?;
    crate::store::save_store(&store_path(cfg_dir), &crate::store::Store::default())?;
    Ok(())
}

/// Template content for config.toml
pub const CONFIG_TEMPLATE: &str = r#"[company]
name = "Your Company Name"
address = "Rruga e Dëshmorëve 12"
city = "Prishtinë"
country = "Kosovo"
email = "office@yourcompany.com"
# phone = "+383 44 000 000"   # optional
# tax_id = "811234567"        # optional

[invoice]
number_format = "YYYYMM-####"  # YYYY, MM, DD from the issue date; #### is the sequence
currency_code = "EUR"
currency_symbol = "€"
date_format = "dd/MM/yyyy"
due_days = 30

[pdf]
output_dir = "output"  # relative to this directory, or an absolute / ~ path
"#;
