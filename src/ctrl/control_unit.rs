use std::sync::Arc;
use anyhow::ensure;
use log::{debug, error, info, warn};
use serde::Serialize;

use crate::base::behavior::*;
use crate::base::module::{module, IsModule, ModuleBase};
use crate::base::port::{InputPort, OutputPort, Port};
use crate::cache::features::CacheType;
use crate::ctrl::config::CtrlConfig;
use crate::ctrl::decode::{DecodeUnit, DecodedInst, Opcode, PLACE_BLOCK};
use crate::ctrl::program::Program;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOn {
    Mmu,
    Array,
}

/// Supervisory state; the instruction state only advances in `Run`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Pause,
    Run,
    #[default]
    Stop,
    Wait(WaitOn),
    Error,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum InstState {
    #[default]
    Noop,
    AdaptPp,
    Fetch,
    Decode,
    WaitReady,
    LoadD,
    LoadDA,
    StoreD,
    StoreDA,
    LoadPC,
    LoadCC,
    Start,
    Finish,
    WaitMmu,
    ContMmu,
    SelectLine(CacheType),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Pins {
    run: bool,
    pause: bool,
    reset: bool,
    mmu_ready: bool,
    array_ready: bool,
}

#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct ControlStats {
    pub instructions: u64,
    pub mmu_requests: u64,
    pub wait_cycles: u64,
    pub pause_cycles: u64,
    pub unknown_opcodes: u64,
    pub ignored_edges: u64,
}

#[derive(Debug, Default)]
pub struct ControlState {
    activity: Activity,
    inst: InstState,
    pp: usize,
    decoded: DecodedInst,
    prev: Pins,
    /// Compute-array ready seen since the last START/WAIT_READY.
    array_irq: bool,
    mmu_start_high: bool,
    array_start_high: bool,
    fault: Option<String>,
    stats: ControlStats,
}

/// Fetch/decode/dispatch controller.
///
/// Owns the program memory and sequences every other component: it latches request fields for the
/// memory access engine and pulses its start line, drives the per-cache line selectors, and pulses
/// the compute array. The engine handshake is two registered single-slot lines (`mmu_start`,
/// `mmu_ready`) sampled once per tick.
pub struct ControlUnit {
    base: ModuleBase<ControlState, CtrlConfig>,
    program: Program,

    pub run: Port<InputPort, bool>,
    pub pause: Port<InputPort, bool>,
    pub reset: Port<InputPort, bool>,
    pub mmu_ready: Port<InputPort, bool>,
    pub array_ready: Port<InputPort, bool>,

    pub mmu_start: Port<OutputPort, bool>,
    pub cache_type: Port<OutputPort, u8>,
    pub address: Port<OutputPort, u16>,
    pub place: Port<OutputPort, u8>,
    pub select_in: [Port<OutputPort, u8>; CacheType::COUNT],
    pub select_out: [Port<OutputPort, u8>; CacheType::COUNT],
    pub array_start: Port<OutputPort, bool>,
    pub finish: Port<OutputPort, bool>,
}

module!(ControlUnit, ControlState, CtrlConfig,);

impl ControlUnit {
    pub fn new(config: Arc<CtrlConfig>, program: Program) -> anyhow::Result<Self> {
        ensure!(
            program.len() <= config.program_capacity,
            "program has {} instructions but program memory holds {}",
            program.len(),
            config.program_capacity
        );
        info!("control unit loaded {} instructions", program.len());
        let mut me = ControlUnit {
            base: ModuleBase::default(),
            program,
            run: Port::new(),
            pause: Port::new(),
            reset: Port::new(),
            mmu_ready: Port::new(),
            array_ready: Port::new(),
            mmu_start: Port::new(),
            cache_type: Port::new(),
            address: Port::new(),
            place: Port::new(),
            select_in: Default::default(),
            select_out: Default::default(),
            array_start: Port::new(),
            finish: Port::new(),
        };
        me.init_conf(config);
        Ok(me)
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn pp(&self) -> usize {
        self.base.state.pp
    }

    pub fn activity(&self) -> Activity {
        self.base.state.activity
    }

    pub fn inst_state(&self) -> InstState {
        self.base.state.inst
    }

    pub fn decoded(&self) -> DecodedInst {
        self.base.state.decoded
    }

    pub fn array_irq(&self) -> bool {
        self.base.state.array_irq
    }

    /// Diagnostic of the fatal condition that put the unit into `Activity::Error`.
    pub fn fault(&self) -> Option<&str> {
        self.base.state.fault.as_deref()
    }

    pub fn stats(&self) -> ControlStats {
        self.base.state.stats
    }

    fn sample(&self) -> Pins {
        Pins {
            run: self.run.get(),
            pause: self.pause.get(),
            reset: self.reset.get(),
            mmu_ready: self.mmu_ready.get(),
            array_ready: self.array_ready.get(),
        }
    }

    fn raise_fault(&mut self, msg: String) {
        error!("ctrl: {}", msg);
        self.base.state.fault = Some(msg);
        self.base.state.activity = Activity::Error;
    }

    fn drop_pulses(&mut self) {
        if self.base.state.mmu_start_high {
            self.mmu_start.put(false);
            self.base.state.mmu_start_high = false;
        }
        if self.base.state.array_start_high {
            self.array_start.put(false);
            self.base.state.array_start_high = false;
        }
    }

    fn on_mmu_edge(&mut self, rising: bool) {
        match self.base.state.activity {
            Activity::Wait(WaitOn::Mmu) => {
                if !rising {
                    debug!("ctrl: mmu ready released, resuming at pp {}", self.base.state.pp);
                    self.base.state.activity = Activity::Run;
                    self.base.state.inst = InstState::ContMmu;
                }
            }
            Activity::Wait(WaitOn::Array) => {
                warn!("ctrl: mmu ready edge while waiting on the array, ignored");
                self.base.state.stats.ignored_edges += 1;
            }
            other => self.raise_fault(format!(
                "mmu ready {} edge while {:?} at pp {}: controller and engine out of sync",
                if rising { "rising" } else { "falling" },
                other,
                self.base.state.pp
            )),
        }
    }

    fn on_array_ready(&mut self) {
        debug!("ctrl: array ready pulse");
        if self.base.state.activity == Activity::Wait(WaitOn::Array) {
            self.base.state.activity = Activity::Run;
            self.base.state.inst = InstState::AdaptPp;
            self.base.state.array_irq = false;
        } else {
            self.base.state.array_irq = true;
        }
    }

    fn rewind(&mut self) {
        self.base.state.inst = InstState::Noop;
        self.base.state.pp = 0;
    }

    /// Latches one engine request and raises its start pulse.
    fn issue(&mut self, kind: CacheType, place: u8) {
        let inst = self.base.state.decoded;
        debug!(
            "ctrl: mmu request {} line {} place {} addr {:#06x}",
            kind.name(),
            inst.line,
            place,
            inst.address
        );
        self.cache_type.put(kind as u8);
        self.address.put(inst.address);
        self.place.put(place);
        self.select_in[kind.index()].put(inst.line);
        self.mmu_start.put(true);
        self.base.state.mmu_start_high = true;
        self.base.state.stats.mmu_requests += 1;
        self.base.state.inst = InstState::WaitMmu;
        self.base.state.activity = Activity::Wait(WaitOn::Mmu);
    }

    fn dispatch(&mut self, inst: DecodedInst) -> InstState {
        let Some(op) = inst.op() else {
            warn!("ctrl: unknown opcode {:#04x} at pp {}, skipped", inst.opcode, self.base.state.pp);
            self.base.state.stats.unknown_opcodes += 1;
            return InstState::AdaptPp;
        };
        info!("ctrl: pp {:3} {}", self.base.state.pp, inst);
        match op {
            Opcode::Noop => InstState::AdaptPp,
            Opcode::LoadD => InstState::LoadD,
            Opcode::LoadDA => InstState::LoadDA,
            Opcode::StoreD => InstState::StoreD,
            Opcode::StoreDA => InstState::StoreDA,
            Opcode::LoadPC => InstState::LoadPC,
            Opcode::LoadCC => InstState::LoadCC,
            Opcode::Start => InstState::Start,
            Opcode::WaitReady => InstState::WaitReady,
            Opcode::Finish => InstState::Finish,
            Opcode::SelectDinLine => InstState::SelectLine(CacheType::DataInput),
            Opcode::SelectDoutLine => InstState::SelectLine(CacheType::DataOutput),
            Opcode::SelectPcLine => InstState::SelectLine(CacheType::ConfPe),
            Opcode::SelectCcLine => InstState::SelectLine(CacheType::ConfCc),
        }
    }

    fn step(&mut self, run: bool) {
        let decoded = self.base.state.decoded;
        let next = match self.base.state.inst {
            InstState::Noop => InstState::Noop,
            InstState::Fetch => match self.program.get(self.base.state.pp) {
                Some(word) => {
                    self.base.state.decoded = DecodeUnit::decode(word);
                    InstState::Decode
                }
                None => {
                    warn!("ctrl: pp {} ran past the end of the program, finishing", self.base.state.pp);
                    InstState::Finish
                }
            },
            InstState::Decode => self.dispatch(decoded),
            InstState::LoadD => return self.issue(CacheType::DataInput, decoded.place),
            InstState::LoadDA => return self.issue(CacheType::DataInput, PLACE_BLOCK),
            InstState::StoreD => return self.issue(CacheType::DataOutput, decoded.place),
            InstState::StoreDA => return self.issue(CacheType::DataOutput, PLACE_BLOCK),
            InstState::LoadPC => return self.issue(CacheType::ConfPe, PLACE_BLOCK),
            InstState::LoadCC => return self.issue(CacheType::ConfCc, PLACE_BLOCK),
            InstState::WaitMmu => {
                // only reachable if the wait was left without a ready edge
                self.base.state.activity = Activity::Wait(WaitOn::Mmu);
                InstState::WaitMmu
            }
            InstState::ContMmu => InstState::AdaptPp,
            InstState::SelectLine(kind) => {
                debug!("ctrl: select {} output line {}", kind.name(), decoded.line);
                self.select_out[kind.index()].put(decoded.line);
                InstState::AdaptPp
            }
            InstState::Start => {
                self.array_start.put(true);
                self.base.state.array_start_high = true;
                self.base.state.array_irq = false;
                InstState::AdaptPp
            }
            InstState::WaitReady => {
                if self.base.state.array_irq {
                    self.base.state.array_irq = false;
                    InstState::AdaptPp
                } else {
                    self.base.state.activity = Activity::Wait(WaitOn::Array);
                    InstState::WaitReady
                }
            }
            InstState::Finish => {
                if run {
                    self.finish.put(true);
                    InstState::Finish
                } else {
                    info!("ctrl: program finished after {} instructions", self.base.state.stats.instructions);
                    self.finish.put(false);
                    self.base.state.pp = 0;
                    InstState::Noop
                }
            }
            InstState::AdaptPp => {
                self.base.state.pp += 1;
                self.base.state.stats.instructions += 1;
                InstState::Fetch
            }
        };
        self.base.state.inst = next;
    }
}

impl ModuleBehaviors for ControlUnit {
    fn tick_one(&mut self) {
        self.base.cycle += 1;
        self.drop_pulses();

        let pins = self.sample();
        let prev = std::mem::replace(&mut self.base.state.prev, pins);
        if self.base.state.activity == Activity::Error {
            return;
        }

        if pins.mmu_ready != prev.mmu_ready {
            self.on_mmu_edge(pins.mmu_ready);
            if self.base.state.activity == Activity::Error {
                return;
            }
        }
        if pins.array_ready && !prev.array_ready {
            self.on_array_ready();
        }
        if prev.reset && !pins.reset {
            info!("ctrl: reset released, stopping");
            self.base.state.activity = Activity::Stop;
            self.base.state.array_irq = false;
            self.rewind();
        }
        if pins.run && !prev.run {
            info!("ctrl: run from pp {}", self.base.state.pp);
            self.base.state.activity = Activity::Run;
            self.base.state.inst = InstState::Fetch;
        }
        match self.base.state.activity {
            Activity::Run if pins.pause => self.base.state.activity = Activity::Pause,
            Activity::Pause if prev.pause && !pins.pause => self.base.state.activity = Activity::Run,
            _ => {}
        }

        match self.base.state.activity {
            Activity::Run => self.step(pins.run),
            Activity::Wait(_) => self.base.state.stats.wait_cycles += 1,
            Activity::Pause => self.base.state.stats.pause_cycles += 1,
            Activity::Stop | Activity::Error => {}
        }
    }

    fn reset(&mut self) {
        self.base.state = ControlState::default();
        self.mmu_start.put(false);
        self.array_start.put(false);
        self.finish.put(false);
    }
}
