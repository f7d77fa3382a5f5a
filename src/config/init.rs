// ABOUTME: Config scaffolding for new chains.
// ABOUTME: Creates jumpchain.yml template files.

use std::path::Path;

use crate::error::{Error, Result};

use super::{CONFIG_FILENAME, ChainConfig, HopConfig};

pub fn init_config(dir: &Path, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let yaml = generate_template_yaml(&ChainConfig::template());
    std::fs::write(&config_path, yaml)?;

    Ok(())
}

fn field<'a>(hop: &'a HopConfig, pick: fn(&super::HopFields) -> Option<&String>) -> &'a str {
    match hop {
        HopConfig::Detailed(fields) => pick(fields).map(String::as_str).unwrap_or(""),
        HopConfig::Shorthand(s) => s,
        HopConfig::Invalid(_) => "",
    }
}

fn generate_template_yaml(config: &ChainConfig) -> String {
    let proxy = config.hops.first();
    format!(
        r#"# Proxies are traversed in order; the destination is reached through the last one.
hops:
  - host: {}
    user: {}
    agent: true
  # Shorthand without a credential uses the "none" method:
  # - "user@10.0.0.2:22"

destination:
  host: {}
  user: {}
  key: ~/.ssh/id_ed25519
  # password: {{ env: DEST_PASSWORD }}

timeouts:
  connect: {}
  auth: {}
  channel_open: {}

# trust-on-first-use (default), strict, or accept-all
host_key:
  policy: trust-on-first-use
"#,
        proxy.map(|hop| field(hop, |f| f.host.as_ref())).unwrap_or(""),
        proxy.map(|hop| field(hop, |f| f.user.as_ref())).unwrap_or(""),
        field(&config.destination, |f| f.host.as_ref()),
        field(&config.destination, |f| f.user.as_ref()),
        humantime_serde::re::humantime::format_duration(config.timeouts.connect),
        humantime_serde::re::humantime::format_duration(config.timeouts.auth),
        humantime_serde::re::humantime::format_duration(config.timeouts.channel_open),
    )
}
