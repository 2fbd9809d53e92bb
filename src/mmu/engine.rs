use std::sync::Arc;
use log::{debug, info, warn};
use serde::Serialize;

use crate::base::behavior::*;
use crate::base::mem::HasMemory;
use crate::base::module::{module, IsModule, ModuleBase};
use crate::base::port::{InputPort, OutputPort, Port};
use crate::cache::features::{CacheGeometry, CacheType, FeatureTable};
use crate::cache::storage::TransferReg;
use crate::ctrl::decode::PLACE_BLOCK;
use crate::mmu::config::MmuConfig;
use crate::mmu::shared_mem::SharedMemory;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    #[default]
    Await,
    Decode,
    Validate,
    Process,
    WriteData,
    WriteEn,
    WaitAck,
    ReadData,
    Block,
    Finish,
}

/// Request fields latched from the control unit on a start pulse.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransferRequest {
    pub cache_type: u8,
    pub address: u16,
    pub place: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferContext {
    pub kind: CacheType,
    pub address: usize,
    pub place: usize,
    pub block: bool,
    pub remaining: usize,
    pub step: usize,
    /// Transfer count computed at DECODE.
    pub count: usize,
}

/// Summary of the last request that reached FINISH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferRecord {
    pub kind: CacheType,
    pub start_address: usize,
    pub final_address: usize,
    pub transfer_count: usize,
    pub transfers: usize,
}

#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct EngineStats {
    pub requests: u64,
    pub transfers: u64,
    pub bytes_to_cache: u64,
    pub bytes_to_memory: u64,
    pub bounds_violations: u64,
    pub rejected_requests: u64,
    pub aborted_requests: u64,
}

#[derive(Debug, Default)]
pub struct MmuState {
    pub fsm: EngineState,
    request: TransferRequest,
    ctx: Option<TransferContext>,
    ready: bool,
    transfers_done: usize,
    last_transfer: Option<TransferRecord>,
    stats: EngineStats,
}

/// Address-translation and streaming-transfer engine.
///
/// Owns the shared memory and moves one granularity-sized unit per handshake between it and the
/// cache selected by the latched cache type. A request is either a single element or, with the
/// block place sentinel, a whole line streamed in consecutive units.
pub struct MemoryAccessEngine {
    base: ModuleBase<MmuState, MmuConfig>,
    features: FeatureTable,
    memory: SharedMemory,

    pub start: Port<InputPort, bool>,
    pub cache_type: Port<InputPort, u8>,
    pub address: Port<InputPort, u16>,
    pub req_place: Port<InputPort, u8>,
    pub ack: [Port<InputPort, bool>; CacheType::COUNT],
    pub data_in: Port<InputPort, TransferReg>,

    pub ready: Port<OutputPort, bool>,
    pub write_en: [Port<OutputPort, bool>; CacheType::COUNT],
    pub place: Port<OutputPort, usize>,
    pub data_out: Port<OutputPort, TransferReg>,
}

module!(MemoryAccessEngine, MmuState, MmuConfig,);

impl MemoryAccessEngine {
    /// Fails when the cache feature table is malformed or the memory does not fit the address space.
    pub fn new(config: Arc<MmuConfig>) -> anyhow::Result<Self> {
        let features = config.feature_table()?;
        let memory = SharedMemory::new(config.memory_size)?;
        let mut me = MemoryAccessEngine {
            base: ModuleBase::default(),
            features,
            memory,
            start: Port::new(),
            cache_type: Port::new(),
            address: Port::new(),
            req_place: Port::new(),
            ack: Default::default(),
            data_in: Port::new(),
            ready: Port::new(),
            write_en: Default::default(),
            place: Port::new(),
            data_out: Port::new(),
        };
        info!(
            "memory access engine instantiated with {} bytes of shared memory",
            config.memory_size
        );
        me.init_conf(config);
        Ok(me)
    }

    pub fn features(&self) -> &FeatureTable {
        &self.features
    }

    pub fn memory(&self) -> &SharedMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut SharedMemory {
        &mut self.memory
    }

    pub fn fsm(&self) -> EngineState {
        self.base.state.fsm
    }

    pub fn context(&self) -> Option<&TransferContext> {
        self.base.state.ctx.as_ref()
    }

    pub fn last_transfer(&self) -> Option<TransferRecord> {
        self.base.state.last_transfer
    }

    pub fn stats(&self) -> EngineStats {
        self.base.state.stats
    }

    fn geometry(&self, kind: CacheType) -> CacheGeometry {
        *self.features.get(kind).expect("context holds a decoded cache type")
    }

    fn ctx(&self) -> TransferContext {
        self.base.state.ctx.expect("transfer context is set between DECODE and FINISH")
    }

    fn ctx_mut(&mut self) -> &mut TransferContext {
        self.base.state.ctx.as_mut().expect("transfer context is set between DECODE and FINISH")
    }

    /// Finishes a request without touching any cache; the caller still sees a ready pulse.
    fn refuse(&mut self) {
        self.base.state.ctx = None;
        self.base.state.ready = true;
        self.base.state.fsm = EngineState::Await;
    }

    fn decode(&mut self) {
        let request = self.base.state.request;
        let Some(kind) = CacheType::from_raw(request.cache_type) else {
            warn!("mmu: unrecognized cache type {}, aborting request", request.cache_type);
            self.base.state.stats.aborted_requests += 1;
            self.refuse();
            return;
        };
        let geometry = self.geometry(kind);
        let ctx = if request.place == PLACE_BLOCK {
            let count = geometry.block_transfer_count();
            TransferContext {
                kind,
                address: request.address as usize,
                place: 0,
                block: count > 0,
                remaining: count,
                step: geometry.step_bytes(),
                count,
            }
        } else {
            TransferContext {
                kind,
                address: request.address as usize,
                place: request.place as usize,
                block: false,
                remaining: 0,
                step: geometry.step_bytes(),
                count: 1,
            }
        };
        debug!("mmu: decoded {:?}", ctx);
        self.base.state.ctx = Some(ctx);
        self.base.state.transfers_done = 0;
        self.base.state.fsm = EngineState::Validate;
    }

    fn validate(&mut self) {
        let ctx = self.ctx();
        let places = self.geometry(ctx.kind).places();
        if ctx.kind.is_data() && ctx.place >= places {
            warn!(
                "mmu: place {} out of range for {} ({} places per line), request dropped",
                ctx.place,
                ctx.kind.name(),
                places
            );
            self.base.state.stats.rejected_requests += 1;
            self.refuse();
        } else {
            self.base.state.fsm = EngineState::Process;
        }
    }

    /// Memory -> outbound register.
    fn write_data(&mut self) {
        let ctx = self.ctx();
        let outbound = match self.memory.read(ctx.address, ctx.step) {
            Ok(bytes) => {
                self.base.state.stats.bytes_to_cache += ctx.step as u64;
                TransferReg::from_slice(bytes)
            }
            Err(err) => {
                warn!("mmu: {} read skipped: {}", ctx.kind.name(), err);
                self.base.state.stats.bounds_violations += 1;
                TransferReg::new()
            }
        };
        self.data_out.put(outbound);
        self.base.state.fsm = EngineState::WriteEn;
    }

    /// Inbound register -> memory.
    fn read_data(&mut self) {
        let ctx = self.ctx();
        let inbound = self.data_in.get();
        let n = ctx.step.min(inbound.len());
        match self.memory.write(ctx.address, &inbound[..n]) {
            Ok(()) => self.base.state.stats.bytes_to_memory += n as u64,
            Err(err) => {
                warn!("mmu: {} write-back skipped: {}", ctx.kind.name(), err);
                self.base.state.stats.bounds_violations += 1;
            }
        }
        self.write_en[ctx.kind.index()].put(false);
        self.transfer_done();
    }

    fn transfer_done(&mut self) {
        self.base.state.stats.transfers += 1;
        self.base.state.transfers_done += 1;
        if self.ctx().block {
            self.base.state.fsm = EngineState::Block;
        } else {
            let ctx = self.ctx();
            let request = self.base.state.request;
            self.base.state.last_transfer = Some(TransferRecord {
                kind: ctx.kind,
                start_address: request.address as usize,
                final_address: ctx.address,
                transfer_count: ctx.count,
                transfers: self.base.state.transfers_done,
            });
            self.base.state.ready = true;
            self.base.state.fsm = EngineState::Finish;
        }
    }

    fn block(&mut self) {
        let ctx = self.ctx_mut();
        ctx.address += ctx.step;
        ctx.place += 1;
        ctx.remaining -= 1;
        if ctx.remaining == 0 {
            ctx.block = false;
        }
        self.base.state.fsm = EngineState::Process;
    }
}

impl ModuleBehaviors for MemoryAccessEngine {
    fn tick_one(&mut self) {
        self.base.cycle += 1;
        let start = self.start.get();

        match self.base.state.fsm {
            EngineState::Await => {
                if self.base.state.ready && !start {
                    self.base.state.ready = false;
                } else if start && !self.base.state.ready {
                    self.base.state.request = TransferRequest {
                        cache_type: self.cache_type.get(),
                        address: self.address.get(),
                        place: self.req_place.get(),
                    };
                    self.base.state.stats.requests += 1;
                    debug!("mmu: request {:?}", self.base.state.request);
                    self.base.state.fsm = EngineState::Decode;
                }
            }
            EngineState::Decode => self.decode(),
            EngineState::Validate => self.validate(),
            EngineState::Process => {
                let ctx = self.ctx();
                self.place.put(ctx.place);
                self.base.state.fsm = if ctx.kind == CacheType::DataOutput {
                    EngineState::WriteEn
                } else {
                    EngineState::WriteData
                };
            }
            EngineState::WriteData => self.write_data(),
            EngineState::WriteEn => {
                let kind = self.ctx().kind;
                self.write_en[kind.index()].put(true);
                self.base.state.fsm = EngineState::WaitAck;
            }
            EngineState::WaitAck => {
                let kind = self.ctx().kind;
                if self.ack[kind.index()].get() {
                    if kind == CacheType::DataOutput {
                        self.base.state.fsm = EngineState::ReadData;
                    } else {
                        self.write_en[kind.index()].put(false);
                        self.transfer_done();
                    }
                }
            }
            EngineState::ReadData => self.read_data(),
            EngineState::Block => self.block(),
            EngineState::Finish => {
                if !start {
                    self.base.state.ready = false;
                    self.base.state.ctx = None;
                    self.base.state.fsm = EngineState::Await;
                }
            }
        }

        self.ready.put(self.base.state.ready);
    }

    fn reset(&mut self) {
        self.base.state = MmuState::default();
        self.ready.put(false);
        self.write_en.iter_mut().for_each(|we| we.put(false));
    }
}
