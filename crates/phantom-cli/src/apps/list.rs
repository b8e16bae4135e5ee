use anyhow::Result;
use phantom_devices::ProfileRegistry;

pub fn run(verbose: bool) -> Result<()> {
    let registry = ProfileRegistry::builtins();
    if verbose {
        println!("{:<20}  {}", "Device", "Description");
        println!("{:-<20}  {:-<52}", "", "");
    }
    for (name, entry) in registry.iter() {
        if verbose {
            println!("{name:<20}  {}", entry.description);
        } else {
            println!("{name}");
        }
    }
    Ok(())
}
