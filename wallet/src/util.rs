use crate::core::Config;
use anyhow::Result;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Installs a `tracing` subscriber writing to `wallet.log` in the current
/// directory, since the terminal itself is owned by the `cursive` UI.
pub fn setup_tracing() -> Result<()> {
    let file_appender = tracing_appender::rolling::never(".", "wallet.log");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(file_appender)
        .with_ansi(false)
        .init();
    Ok(())
}

/// Logs panics instead of letting them print over a raw terminal left in
/// cursive's alternate screen mode.
pub fn setup_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        tracing::error!(%info, "wallet panicked");
    }));
}

pub fn generate_dummy_config(output: &Path) -> Result<()> {
    let config = Config::dummy();
    std::fs::write(output, toml::to_string_pretty(&config)?)?;
    Ok(())
}

/// Renders the wallet's current balance as large ASCII-art digits, for the
/// balance panel.
pub fn big_mode_btc(core: &crate::core::Core) -> String {
    let balance = core.get_balance().to_string();
    text_to_ascii_art::to_art(balance.clone(), "standard", 1, 1, 1).unwrap_or(balance)
}
