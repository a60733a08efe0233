pub mod dispatch;
pub mod init;
pub mod job;
pub mod macro_cmd;
pub mod ops;
pub mod queue;
pub mod serve;

use anyhow::Context;
use pna_core::config::Config;
use pna_core::driver::SimulatedDriver;
use pna_core::types::{ParamValue, ParameterSet};
use pna_server::AppState;
use std::path::Path;
use std::sync::Arc;

/// Wire the cell for one command invocation.
pub fn open_cell(root: &Path, simulate: bool) -> anyhow::Result<AppState> {
    if !simulate {
        return AppState::load(root.to_path_buf());
    }
    let config = Config::load(root)?;
    AppState::new(root.to_path_buf(), config, Arc::new(SimulatedDriver::new()))
}

pub fn block_on<F: std::future::Future>(fut: F) -> anyhow::Result<F::Output> {
    let rt = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    Ok(rt.block_on(fut))
}

/// Parse `key=value` arguments. Values are read as int, then float, then text.
pub fn parse_params(args: &[String]) -> anyhow::Result<ParameterSet> {
    let mut params = ParameterSet::new();
    for arg in args {
        let (key, value) = arg
            .split_once('=')
            .with_context(|| format!("parameter '{arg}' is not key=value"))?;
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("parameter '{arg}' has an empty key");
        }
        params.insert(key, ParamValue::parse_loose(value.trim()));
    }
    Ok(params)
}
