use crate::output::{print_json, print_table};
use pna_core::registry::OperationRegistry;
use pna_core::types::DeviceClass;

/// The catalogue is static, so this works in an uninitialized directory too.
pub fn run(device: Option<&str>, json: bool) -> anyhow::Result<()> {
    let filter: Option<DeviceClass> = device.map(str::parse).transpose()?;
    let registry = OperationRegistry::standard()?;
    let ops: Vec<_> = registry
        .operations()
        .into_iter()
        .filter(|op| filter.is_none_or(|d| op.device == d))
        .collect();

    if json {
        return print_json(&ops);
    }

    let rows = ops
        .iter()
        .map(|op| {
            vec![
                op.device.to_string(),
                op.operation.clone(),
                if op.composite { "composite" } else { "" }.to_string(),
                op.defaults.summary(),
            ]
        })
        .collect();
    print_table(&["DEVICE", "OPERATION", "KIND", "DEFAULTS"], rows);
    Ok(())
}
