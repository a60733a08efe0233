use crate::cmd::{block_on, open_cell};
use std::path::Path;

pub fn run(root: &Path, simulate: bool, port: u16) -> anyhow::Result<()> {
    let state = open_cell(root, simulate)?;
    block_on(pna_server::serve(state, port))?
}
