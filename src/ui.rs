use clap::Parser;
use crate::ctrl::{CtrlConfig, Program};
use crate::mmu::MmuConfig;
use crate::sim::array::ArrayConfig;
use crate::sim::config::{Config, SimConfig};
use crate::sim::top::Sim;
use anyhow::Context;
use std::path::PathBuf;
use toml::Table;

#[derive(Parser)]
#[command(version, about)]
pub struct CgraArgs {
    #[arg(help = "Path to config.toml")]
    pub config_path: PathBuf,
    #[arg(long, help = "Override controller program path")]
    pub program: Option<PathBuf>,
    #[arg(long, help = "Override shared memory image path")]
    pub memory_image: Option<PathBuf>,
    #[arg(long, help = "Override tick budget")]
    pub timeout: Option<u64>,
    #[arg(long, help = "Enable log at level (0:none, 1:info, 2:debug)")]
    pub log: Option<u64>,
    #[arg(long, help = "Write a JSON run report to this path")]
    pub report: Option<PathBuf>,
    #[arg(long, help = "Dump shared memory to this path after the run")]
    pub dump: Option<PathBuf>,
}

/// Make a Sim object from the TOML configuration.
/// If `cli_args` is given, override TOML options with CLI arguments.
pub fn make_sim(toml_string: &str, cli_args: Option<&CgraArgs>) -> anyhow::Result<Sim> {
    let config_table: Table = toml::from_str(toml_string).context("cannot parse config toml")?;
    let mut sim_config = SimConfig::from_section(config_table.get("sim"));
    let mmu_config = MmuConfig::from_section(config_table.get("mmu"));
    let ctrl_config = CtrlConfig::from_section(config_table.get("ctrl"));
    let array_config = ArrayConfig::from_section(config_table.get("array"));

    // override toml configs with CLI args
    if let Some(args) = cli_args {
        sim_config.program = args.program.clone().unwrap_or(sim_config.program);
        sim_config.memory_image = args.memory_image.clone().or(sim_config.memory_image);
        sim_config.timeout = args.timeout.unwrap_or(sim_config.timeout);
        sim_config.log_level = args.log.unwrap_or(sim_config.log_level);
        sim_config.report = args.report.clone().or(sim_config.report);
    }

    let program = Program::load(&sim_config.program)?;
    Sim::new(sim_config, mmu_config, ctrl_config, array_config, program)
}
