use anyhow::{Context, Result};
use fanout_lib::consts::APP_NAME;
use fanout_lib::execute::ExecuteConfig;
use fanout_lib::platform::PlatformResolver;
use serde::Serialize;

use crate::output::{OutputFormat, print_json, print_stat};

#[derive(Debug, Serialize)]
struct Info {
  version: &'static str,
  platform: String,
  parallelism: usize,
  wait_timeout: Option<String>,
}

pub fn cmd_info(output: OutputFormat) -> Result<()> {
  let config = ExecuteConfig::from_env().context("Invalid configuration")?;
  let info = Info {
    version: env!("CARGO_PKG_VERSION"),
    platform: PlatformResolver::host().native().to_string(),
    parallelism: config.parallelism,
    wait_timeout: config.wait.timeout.map(|t| humantime::format_duration(t).to_string()),
  };

  if output.is_json() {
    return print_json(&info);
  }

  println!("{} {}", APP_NAME, info.version);
  print_stat("Platform", &info.platform);
  print_stat("Parallelism", &info.parallelism.to_string());
  print_stat("Wait timeout", info.wait_timeout.as_deref().unwrap_or("none"));
  Ok(())
}
