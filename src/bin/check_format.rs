use anyhow::Result;

fn main() -> Result<()> {
    let code = plotgrade::cli::run(plotgrade::cli::CliMode::Check)?;
    std::process::exit(code)
}
