use anyhow::Result;

fn main() -> Result<()> {
    let code = plotgrade::cli::run(plotgrade::cli::CliMode::Grade)?;
    std::process::exit(code)
}
