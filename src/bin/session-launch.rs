use anyhow::Result;

fn main() -> Result<()> {
    let code = session_launch::cli::run()?;
    std::process::exit(code)
}
