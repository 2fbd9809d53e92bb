use std::sync::Arc;
use log::{debug, warn};
use serde::Serialize;

use crate::base::behavior::*;
use crate::base::module::{module, IsModule, ModuleBase};
use crate::base::port::{InputPort, OutputPort, Port};
use crate::cache::features::{CacheGeometry, CacheType};
use crate::cache::storage::{ConfigLines, DataLines, LineStorage, LineView, TransferReg};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheReject {
    LineOutOfRange,
    PlaceOutOfRange,
    LineIsOutputSelected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectReject {
    OutOfRange,
    IsWriteTarget,
}

#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct CacheStats {
    pub accepted_writes: u64,
    pub rejected_writes: u64,
    pub selects: u64,
    pub rejected_selects: u64,
}

#[derive(Debug, Default)]
pub struct LineCacheState {
    output_line: usize,
    ack: bool,
    /// Last refused output-select request, so a held request is reported once.
    refused_select: Option<(usize, SelectReject)>,
    stats: CacheStats,
}

/// Double-buffered cache shared by all four cache instances.
///
/// The engine side streams into the line chosen by `select_in` through a write-enable/ack
/// handshake, while the array side only ever sees the output-selected line. A write aimed at the
/// output-selected line is refused, as is switching the output to the line being written, so the
/// array never observes a half-written line.
///
/// The data-output cache runs the same handshake in the opposite direction: an accepted request
/// loads element `place` of line `select_in` into `data_out` instead of merging `data_in`.
pub struct LineCache {
    base: ModuleBase<LineCacheState, CacheGeometry>,
    storage: Box<dyn LineStorage>,

    pub write_en: Port<InputPort, bool>,
    pub place: Port<InputPort, usize>,
    pub data_in: Port<InputPort, TransferReg>,
    pub select_in: Port<InputPort, u8>,
    pub select_out: Port<InputPort, u8>,
    pub ack: Port<OutputPort, bool>,
    pub data_out: Port<OutputPort, TransferReg>,
}

module!(LineCache, LineCacheState, CacheGeometry,);

impl LineCache {
    pub fn new(geometry: Arc<CacheGeometry>) -> Self {
        let storage: Box<dyn LineStorage> = if geometry.kind.is_config() {
            Box::new(ConfigLines::new(&geometry))
        } else {
            Box::new(DataLines::new(&geometry))
        };
        let mut me = LineCache {
            base: ModuleBase::with_state(LineCacheState {
                output_line: geometry.boot_output_line(),
                ..LineCacheState::default()
            }),
            storage,
            write_en: Port::new(),
            place: Port::new(),
            data_in: Port::new(),
            select_in: Port::new(),
            select_out: Port::new(),
            ack: Port::new(),
            data_out: Port::new(),
        };
        me.init_conf(geometry);
        me
    }

    pub fn kind(&self) -> CacheType {
        self.conf().kind
    }

    pub fn output_line(&self) -> usize {
        self.base.state.output_line
    }

    /// The output-selected line, i.e. what the compute array currently consumes.
    pub fn current_line(&self) -> LineView<'_> {
        self.storage.view(self.base.state.output_line)
    }

    pub fn line(&self, line: usize) -> Option<LineView<'_>> {
        (line < self.storage.num_lines()).then(|| self.storage.view(line))
    }

    pub fn stats(&self) -> CacheStats {
        self.base.state.stats
    }

    /// Array-side write of a result set into the output-selected line.
    pub fn store_results(&mut self, values: &[u64]) -> anyhow::Result<()> {
        let line = self.base.state.output_line;
        self.storage.fill(line, values)
    }

    fn check_access(&self, line: usize, place: usize) -> Result<(), CacheReject> {
        let geometry = self.conf();
        if line >= geometry.num_lines {
            return Err(CacheReject::LineOutOfRange);
        }
        if geometry.kind.is_data() && place >= geometry.places() {
            return Err(CacheReject::PlaceOutOfRange);
        }
        if line == self.base.state.output_line {
            return Err(CacheReject::LineIsOutputSelected);
        }
        Ok(())
    }

    fn check_select(&self, line: usize, write_target: Option<usize>) -> Result<(), SelectReject> {
        if line >= self.conf().num_lines {
            return Err(SelectReject::OutOfRange);
        }
        if write_target == Some(line) {
            return Err(SelectReject::IsWriteTarget);
        }
        Ok(())
    }

    fn ingest(&mut self, line: usize, place: usize) {
        let name = self.kind().name();
        match self.check_access(line, place) {
            Ok(()) if self.kind() == CacheType::DataOutput => {
                let element = self.storage.element(line, place).unwrap_or_default();
                debug!("{}: drain line {} place {} -> {:02x?}", name, line, place, element.as_slice());
                self.data_out.put(element);
                self.base.state.stats.accepted_writes += 1;
            }
            Ok(()) => {
                let datum = self.data_in.get();
                if datum.is_empty() {
                    warn!("{}: no data for line {} place {}, acknowledging without effect", name, line, place);
                    self.base.state.stats.rejected_writes += 1;
                    return;
                }
                debug!("{}: merge {:02x?} into line {} place {}", name, datum.as_slice(), line, place);
                self.storage.merge(line, place, &datum);
                self.base.state.stats.accepted_writes += 1;
            }
            Err(reason) => {
                warn!(
                    "{}: write to line {} place {} refused ({:?}), acknowledging without effect",
                    name, line, place, reason
                );
                if self.kind() == CacheType::DataOutput {
                    self.data_out.put(TransferReg::new());
                }
                self.base.state.stats.rejected_writes += 1;
            }
        }
    }

    fn update_selection(&mut self, write_target: Option<usize>) {
        let requested = self.select_out.get() as usize;
        if requested == self.base.state.output_line {
            self.base.state.refused_select = None;
            return;
        }
        match self.check_select(requested, write_target) {
            Ok(()) => {
                debug!("{}: output line {} -> {}", self.kind().name(), self.base.state.output_line, requested);
                self.base.state.output_line = requested;
                self.base.state.refused_select = None;
                self.base.state.stats.selects += 1;
            }
            Err(reason) => {
                if self.base.state.refused_select != Some((requested, reason)) {
                    warn!(
                        "{}: cannot select output line {} ({:?}), keeping line {}",
                        self.kind().name(), requested, reason, self.base.state.output_line
                    );
                    self.base.state.stats.rejected_selects += 1;
                }
                self.base.state.refused_select = Some((requested, reason));
            }
        }
    }
}

impl ModuleBehaviors for LineCache {
    fn tick_one(&mut self) {
        self.base.cycle += 1;

        let write = self.write_en.get();
        let line = self.select_in.get() as usize;
        if write && !self.base.state.ack {
            let place = self.place.get();
            self.ingest(line, place);
            self.base.state.ack = true;
        } else if !write && self.base.state.ack {
            self.base.state.ack = false;
        }
        self.ack.put(self.base.state.ack);

        self.update_selection(write.then_some(line));
    }

    fn reset(&mut self) {
        self.storage.clear();
        self.base.state.output_line = self.conf().boot_output_line();
        self.base.state.ack = false;
        self.base.state.refused_select = None;
        self.ack.put(false);
    }
}
