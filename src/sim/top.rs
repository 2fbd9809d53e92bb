use std::sync::Arc;

use anyhow::{bail, Context};
use log::{info, warn};

use crate::base::behavior::*;
use crate::base::port::{attach, link, tie_off, tie_off_input, Netlist, WireRef};
use crate::cache::{CacheType, LineCache};
use crate::ctrl::{CtrlConfig, ControlUnit, InstState, Program};
use crate::mmu::{MemoryAccessEngine, MmuConfig, SharedMemory};
use crate::sim::array::{ArrayConfig, ArrayInputs, ComputeArray, EchoArray};
use crate::sim::config::SimConfig;
use crate::sim::report::{CacheReport, SimReport};

/// Ticks allowed after the finish pulse for the controller to rewind.
const DRAIN_TICKS: u64 = 16;

/// Externally driven control pins of the controller.
struct Pins {
    run: WireRef<bool>,
    pause: WireRef<bool>,
    reset: WireRef<bool>,
}

/// The whole accelerator front end: control unit, transfer engine, the four line caches and a
/// compute array, all on one clock.
pub struct Sim<A: ComputeArray = EchoArray> {
    config: SimConfig,
    ctrl: ControlUnit,
    mmu: MemoryAccessEngine,
    caches: Vec<LineCache>,
    array: A,
    netlist: Netlist,
    pins: Pins,
    finish: WireRef<bool>,
    /// Output-select wires, forced to each cache's boot line.
    select_out: Vec<WireRef<u8>>,
    cycle: u64,
}

impl Sim<EchoArray> {
    pub fn new(
        sim_config: SimConfig,
        mmu_config: MmuConfig,
        ctrl_config: CtrlConfig,
        array_config: ArrayConfig,
        program: Program,
    ) -> anyhow::Result<Self> {
        let array = EchoArray::new(Arc::new(array_config));
        Self::with_array(sim_config, mmu_config, ctrl_config, array, program)
    }
}

impl<A: ComputeArray> Sim<A> {
    pub fn with_array(
        sim_config: SimConfig,
        mmu_config: MmuConfig,
        ctrl_config: CtrlConfig,
        mut array: A,
        program: Program,
    ) -> anyhow::Result<Self> {
        let mut mmu = MemoryAccessEngine::new(Arc::new(mmu_config))?;
        let mut ctrl = ControlUnit::new(Arc::new(ctrl_config), program)?;
        let mut caches: Vec<LineCache> = mmu
            .features()
            .iter()
            .map(|geometry| LineCache::new(Arc::new(*geometry)))
            .collect();

        if let Some(image) = &sim_config.memory_image {
            let n = mmu.memory_mut().load_image(image)?;
            info!("loaded {} bytes from {:?} into shared memory", n, image);
        }

        let mut netlist = Netlist::default();
        let mut select_out = Vec::with_capacity(caches.len());

        // controller -> engine request
        netlist.track(link(&mut mmu.start, &mut ctrl.mmu_start));
        netlist.track(link(&mut mmu.cache_type, &mut ctrl.cache_type));
        netlist.track(link(&mut mmu.address, &mut ctrl.address));
        netlist.track(link(&mut mmu.req_place, &mut ctrl.place));
        netlist.track(link(&mut ctrl.mmu_ready, &mut mmu.ready));

        // engine <-> caches; place and outbound data fan out to every cache
        let place = netlist.track(tie_off(&mut mmu.place));
        let outbound = netlist.track(tie_off(&mut mmu.data_out));
        for cache in caches.iter_mut() {
            let idx = cache.kind().index();
            attach(&mut cache.place, &place);
            attach(&mut cache.data_in, &outbound);
            netlist.track(link(&mut cache.write_en, &mut mmu.write_en[idx]));
            netlist.track(link(&mut mmu.ack[idx], &mut cache.ack));
            netlist.track(link(&mut cache.select_in, &mut ctrl.select_in[idx]));
            let wire = netlist.track(link(&mut cache.select_out, &mut ctrl.select_out[idx]));
            wire.force(cache.output_line() as u8);
            select_out.push(wire);
            if cache.kind() == CacheType::DataOutput {
                netlist.track(link(&mut mmu.data_in, &mut cache.data_out));
            } else {
                netlist.track(tie_off(&mut cache.data_out));
            }
        }

        // controller <-> array
        netlist.track(link(array.start(), &mut ctrl.array_start));
        netlist.track(link(&mut ctrl.array_ready, array.ready()));
        let finish = netlist.track(tie_off(&mut ctrl.finish));

        let pins = Pins {
            run: netlist.track(tie_off_input(&mut ctrl.run)),
            pause: netlist.track(tie_off_input(&mut ctrl.pause)),
            reset: netlist.track(tie_off_input(&mut ctrl.reset)),
        };

        info!("sim: {} wires linked", netlist.len());
        Ok(Sim {
            config: sim_config,
            ctrl,
            mmu,
            caches,
            array,
            netlist,
            pins,
            finish,
            select_out,
            cycle: 0,
        })
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn ctrl(&self) -> &ControlUnit {
        &self.ctrl
    }

    pub fn mmu(&self) -> &MemoryAccessEngine {
        &self.mmu
    }

    pub fn cache(&self, kind: CacheType) -> &LineCache {
        &self.caches[kind.index()]
    }

    pub fn array(&self) -> &A {
        &self.array
    }

    pub fn memory(&self) -> &SharedMemory {
        self.mmu.memory()
    }

    pub fn memory_mut(&mut self) -> &mut SharedMemory {
        self.mmu.memory_mut()
    }

    /// Pin levels take effect in the next tick.
    pub fn set_run(&mut self, level: bool) {
        self.pins.run.force(level);
    }

    pub fn set_pause(&mut self, level: bool) {
        self.pins.pause.force(level);
    }

    pub fn set_reset(&mut self, level: bool) {
        self.pins.reset.force(level);
    }

    pub fn finish_pulse(&self) -> bool {
        self.finish.get()
    }

    fn store_results(&mut self, mut values: Vec<u64>) {
        let out = &mut self.caches[CacheType::DataOutput.index()];
        values.truncate(out.conf().places());
        if let Err(err) = out.store_results(&values) {
            warn!("sim: array results dropped: {}", err);
        }
    }

    fn check_fault(&self) -> anyhow::Result<()> {
        match self.ctrl.fault() {
            Some(fault) => bail!("controller halted at cycle {}: {}", self.cycle, fault),
            None => Ok(()),
        }
    }

    /// Runs the loaded program until the finish pulse, then drops `run` and lets the controller
    /// rewind. Fails on a controller fault or when `timeout` ticks pass without a finish pulse.
    pub fn simulate(&mut self) -> anyhow::Result<SimReport> {
        info!("sim: running {} instructions", self.ctrl.program().len());
        self.set_run(true);
        let deadline = self.cycle + self.config.timeout;
        while !self.finish_pulse() {
            if self.cycle >= deadline {
                bail!(
                    "no finish pulse after {} ticks (ctrl {:?}/{:?} at pp {}, mmu {:?})",
                    self.config.timeout,
                    self.ctrl.activity(),
                    self.ctrl.inst_state(),
                    self.ctrl.pp(),
                    self.mmu.fsm()
                );
            }
            self.tick_one();
            self.check_fault()?;
        }
        info!("sim: finish pulse at cycle {}", self.cycle);

        self.set_run(false);
        for _ in 0..DRAIN_TICKS {
            self.tick_one();
            self.check_fault()?;
            if self.ctrl.inst_state() == InstState::Noop {
                break;
            }
        }
        let report = self.report();
        if let Some(path) = &self.config.report {
            report.write(path).context("run report")?;
        }
        Ok(report)
    }

    pub fn report(&self) -> SimReport {
        SimReport {
            cycles: self.cycle,
            finished: self.ctrl.inst_state() == InstState::Noop && self.ctrl.pp() == 0,
            control: self.ctrl.stats(),
            engine: self.mmu.stats(),
            caches: self
                .caches
                .iter()
                .map(|cache| CacheReport {
                    kind: cache.kind(),
                    output_line: cache.output_line(),
                    stats: cache.stats(),
                })
                .collect(),
            last_transfer: self.mmu.last_transfer(),
        }
    }
}

impl<A: ComputeArray> ModuleBehaviors for Sim<A> {
    fn tick_one(&mut self) {
        let inputs = ArrayInputs {
            conf_pe: self.caches[CacheType::ConfPe.index()].current_line(),
            conf_cc: self.caches[CacheType::ConfCc.index()].current_line(),
            values: self.caches[CacheType::DataInput.index()].current_line(),
        };
        if let Some(results) = self.array.step(inputs) {
            self.store_results(results);
        }

        self.ctrl.tick_one();
        self.mmu.tick_one();
        self.caches.iter_mut().for_each(LineCache::tick_one);

        self.netlist.commit();
        self.cycle += 1;
    }

    fn reset(&mut self) {
        ModuleBehaviors::reset(&mut self.ctrl);
        ModuleBehaviors::reset(&mut self.mmu);
        self.caches.iter_mut().for_each(|cache| ModuleBehaviors::reset(cache));
        ComputeArray::reset(&mut self.array);
        self.netlist.commit();
        for (wire, cache) in self.select_out.iter().zip(self.caches.iter()) {
            wire.force(cache.output_line() as u8);
        }
        self.cycle = 0;
    }
}
