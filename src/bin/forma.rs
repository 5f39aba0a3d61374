use std::process;

use clap::Parser;
use console::style;
use forma::{Forma, Result, PKG_NAME};

fn main() {
    if let Err(error) = run() {
        tracing::debug!(?error);
        eprintln!("{} {error:#}", style("error:").red().bold());
        process::exit(1)
    } else {
        process::exit(0)
    }
}

fn run() -> Result<()> {
    let app = Forma::parse();
    timber::init(app.log_level);
    tracing::trace!(command_structure = ?app);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name(PKG_NAME)
        .build()?;
    let output = runtime.block_on(app.run())?;
    output.print(app.format)?;
    Ok(())
}
