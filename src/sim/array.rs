use std::sync::Arc;
use log::debug;
use num::BigUint;
use serde::Deserialize;

use crate::base::behavior::*;
use crate::base::module::{module, IsModule, ModuleBase};
use crate::base::port::{InputPort, OutputPort, Port};
use crate::cache::LineView;
use crate::sim::config::Config;

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct ArrayConfig {
    /// Ticks between the start pulse and the ready pulse.
    pub latency: u64,
}

impl Config for ArrayConfig {}

impl Default for ArrayConfig {
    fn default() -> Self {
        Self { latency: 8 }
    }
}

/// The output-selected lines the array consumes on a start pulse.
#[derive(Debug, Clone, Copy)]
pub struct ArrayInputs<'a> {
    pub conf_pe: LineView<'a>,
    pub conf_cc: LineView<'a>,
    pub values: LineView<'a>,
}

/// Start/ready collaborator driven by the control unit.
///
/// `step` is called once per tick with the current cache outputs; a returned result set is
/// written into the output-selected line of the data-output cache.
pub trait ComputeArray {
    fn start(&mut self) -> &mut Port<InputPort, bool>;

    fn ready(&mut self) -> &mut Port<OutputPort, bool>;

    fn step(&mut self, inputs: ArrayInputs<'_>) -> Option<Vec<u64>>;

    fn reset(&mut self);
}

#[derive(Debug, Default)]
pub struct EchoArrayState {
    prev_start: bool,
    countdown: Option<u64>,
    captured: Vec<u64>,
    ready_high: bool,
    runs: u64,
    last_config: Option<(BigUint, BigUint)>,
}

/// Reference array without a datapath: after `latency` ticks it pulses ready and hands back the
/// values it was started with.
pub struct EchoArray {
    base: ModuleBase<EchoArrayState, ArrayConfig>,
    pub start: Port<InputPort, bool>,
    pub ready: Port<OutputPort, bool>,
}

module!(EchoArray, EchoArrayState, ArrayConfig,);

impl EchoArray {
    pub fn new(config: Arc<ArrayConfig>) -> Self {
        let mut me = EchoArray {
            base: ModuleBase::default(),
            start: Port::new(),
            ready: Port::new(),
        };
        me.init_conf(config);
        me
    }

    pub fn runs(&self) -> u64 {
        self.base.state.runs
    }

    /// PE and CC configuration seen at the most recent start pulse.
    pub fn last_config(&self) -> Option<&(BigUint, BigUint)> {
        self.base.state.last_config.as_ref()
    }

    fn capture(&mut self, inputs: ArrayInputs<'_>) {
        let latency = self.conf().latency;
        let state = &mut self.base.state;
        state.captured = match inputs.values {
            LineView::Data(values) => values.to_vec(),
            LineView::Config(_) => Vec::new(),
        };
        state.last_config = match (inputs.conf_pe, inputs.conf_cc) {
            (LineView::Config(pe), LineView::Config(cc)) => Some((pe.clone(), cc.clone())),
            _ => None,
        };
        state.countdown = Some(latency);
        debug!("array: started with {:x?}", state.captured);
    }
}

impl ModuleBehaviors for EchoArray {
    fn tick_one(&mut self) {
        self.base.cycle += 1;
        if self.base.state.ready_high {
            self.ready.put(false);
            self.base.state.ready_high = false;
        }
    }

    fn reset(&mut self) {
        self.base.state = EchoArrayState::default();
        self.ready.put(false);
    }
}

impl ComputeArray for EchoArray {
    fn start(&mut self) -> &mut Port<InputPort, bool> {
        &mut self.start
    }

    fn ready(&mut self) -> &mut Port<OutputPort, bool> {
        &mut self.ready
    }

    fn step(&mut self, inputs: ArrayInputs<'_>) -> Option<Vec<u64>> {
        self.tick_one();

        let start = self.start.get();
        let rising = start && !self.base.state.prev_start;
        self.base.state.prev_start = start;
        if rising && self.base.state.countdown.is_none() {
            self.capture(inputs);
        }

        match self.base.state.countdown {
            Some(0) => {
                self.base.state.countdown = None;
                self.base.state.runs += 1;
                self.base.state.ready_high = true;
                self.ready.put(true);
                debug!("array: done, run {}", self.base.state.runs);
                Some(std::mem::take(&mut self.base.state.captured))
            }
            Some(n) => {
                self.base.state.countdown = Some(n - 1);
                None
            }
            None => None,
        }
    }

    fn reset(&mut self) {
        ModuleBehaviors::reset(self);
    }
}
