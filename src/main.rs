use std::fs;
use clap::Parser;
use toml::Table;
use cgra_mmu::sim::config::{to_level_filter, Config, SimConfig};
use cgra_mmu::ui::{make_sim, CgraArgs};

pub fn main() -> Result<(), u32> {
    let argv = CgraArgs::parse();
    let config = fs::read_to_string(&argv.config_path).unwrap_or_else(|err| {
        eprintln!("failed to read config file: {}", err);
        std::process::exit(1);
    });

    // logging needs the level before the simulator is built
    let log_level = argv.log.unwrap_or_else(|| {
        let table: Option<Table> = toml::from_str(&config).ok();
        SimConfig::from_section(table.as_ref().and_then(|t| t.get("sim"))).log_level
    });
    env_logger::Builder::new()
        .filter_level(to_level_filter(log_level))
        .parse_default_env()
        .init();

    let mut sim = make_sim(&config, Some(&argv)).map_err(|err| {
        eprintln!("error: {:#}", err);
        1u32
    })?;

    let result = sim.simulate();
    if let Some(path) = &argv.dump {
        if let Err(err) = sim.memory().dump(path) {
            eprintln!("error: {:#}", err);
        }
    }
    match result {
        Ok(report) => {
            println!(
                "finished in {} cycles, {} instructions, {} transfers",
                report.cycles, report.control.instructions, report.engine.transfers
            );
            Ok(())
        }
        Err(err) => {
            eprintln!("error: {:#}", err);
            Err(1)
        }
    }
}
