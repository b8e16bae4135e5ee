use anyhow::Result;

pub fn run() -> Result<()> {
    tracing::error!("OS detection is not implemented yet");
    println!("OS detection is not implemented");
    Ok(())
}
