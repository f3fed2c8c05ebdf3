use shared_counter::{
    config::DriverConfig,
    counter::{Counter, NaiveCounter, SharedCounter, SynchronizedCounter},
    driver::ConcurrentDriver,
};
use tracing::{info, warn};

// the same workload against every counter: only the naive one should come up
// short, and only when workers really do run in parallel
fn main() -> anyhow::Result<()> {
    shared_counter::tracing_init::init()?;

    let config = DriverConfig::load()?;
    info!(
        workers = config.workers,
        increments = config.increments,
        "incrementing each counter concurrently"
    );

    compare("naive (load then store)", config, NaiveCounter::new())?;
    compare("synchronized (mutex)", config, SynchronizedCounter::new())?;
    compare("atomic (fetch_add)", config, SharedCounter::new())?;

    Ok(())
}

fn compare<C: Counter>(name: &str, config: DriverConfig, counter: C) -> anyhow::Result<()> {
    let report = ConcurrentDriver::new(config)?.run_on(counter)?;

    let lost = report.lost_updates();
    if lost > 0 {
        warn!(
            counter = name,
            value = report.value,
            expected = report.expected(),
            lost,
            "updates were lost"
        );
    } else {
        info!(
            counter = name,
            value = report.value,
            expected = report.expected(),
            elapsed = ?report.elapsed,
            "no updates lost"
        );
    }

    Ok(())
}
