use crate::cmd::{block_on, open_cell, parse_params};
use crate::output::print_json;
use pna_core::types::DeviceClass;
use std::path::Path;

pub fn run(
    root: &Path,
    simulate: bool,
    device: &str,
    operation: &str,
    params: &[String],
    json: bool,
) -> anyhow::Result<()> {
    let device: DeviceClass = device.parse()?;
    let params = parse_params(params)?;
    let cell = open_cell(root, simulate)?;

    let response = block_on(cell.dispatcher.dispatch(device, operation, &params))??;

    if json {
        return print_json(&response);
    }
    println!("{device}.{operation}: {}", response.status);
    if let Some(data) = &response.data {
        println!("{}", serde_json::to_string_pretty(data)?);
    }
    Ok(())
}
