use anyhow::Result;
use fcnetis::{cli, init_tracing, process_matches};

fn main() -> Result<()> {
    init_tracing();

    let matches = cli().get_matches();

    process_matches(&matches)?;

    Ok(())
}
