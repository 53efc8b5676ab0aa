use bgscrap::{chrono::Local, info_time, process::process_site, Config, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let start_time = Local::now();
    let config = Config::from_env()?;
    process_site(&config).await?;
    info_time!(start_time, "Full program time:");

    Ok(())
}
