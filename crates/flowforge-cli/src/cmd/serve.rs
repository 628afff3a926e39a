use anyhow::Context;
use std::path::Path;

pub fn run(root: &Path, port: u16) -> anyhow::Result<()> {
    let rt = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    rt.block_on(flowforge_server::serve(root.to_path_buf(), port))
}
