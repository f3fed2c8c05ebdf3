use shared_counter::{config::DriverConfig, driver::ConcurrentDriver};

fn main() -> anyhow::Result<()> {
    shared_counter::tracing_init::init()?;

    let config = DriverConfig::load()?;
    let mut driver = ConcurrentDriver::new(config)?;

    let report = driver.run()?;
    println!("{}", report.value);

    Ok(())
}
