// Bladeforge CLI entry point

use anyhow::Result;
use bladeforge_cli::CommandRouter;

fn main() -> Result<()> {
    let output = CommandRouter::route()?;
    if !output.is_empty() {
        print!("{output}");
        if !output.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}
