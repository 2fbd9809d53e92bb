use std::sync::Arc;
use crate::base::behavior::*;
use crate::base::port::{tie_off, tie_off_input, Netlist, WireRef};
use crate::cache::CacheType;
use crate::ctrl::config::CtrlConfig;
use crate::ctrl::control_unit::{Activity, ControlUnit, InstState, WaitOn};
use crate::ctrl::decode::{DecodeUnit, Opcode, PLACE_BLOCK};
use crate::ctrl::program::Program;

struct CtrlBench {
    ctrl: ControlUnit,
    netlist: Netlist,
    run: WireRef<bool>,
    pause: WireRef<bool>,
    reset: WireRef<bool>,
    mmu_ready: WireRef<bool>,
    array_ready: WireRef<bool>,
    mmu_start: WireRef<bool>,
    cache_type: WireRef<u8>,
    address: WireRef<u16>,
    place: WireRef<u8>,
    select_in: Vec<WireRef<u8>>,
    select_out: Vec<WireRef<u8>>,
    array_start: WireRef<bool>,
    finish: WireRef<bool>,
}

impl CtrlBench {
    fn tick(&mut self) {
        self.ctrl.tick_one();
        self.netlist.commit();
    }

    fn tick_until(&mut self, what: &str, cond: impl Fn(&CtrlBench) -> bool) {
        for _ in 0..100 {
            if cond(self) {
                return;
            }
            self.tick();
        }
        panic!("timed out waiting for {}", what);
    }

    /// Plays the engine side of one request: a one-tick ready pulse.
    fn mmu_ready_pulse(&mut self) {
        self.mmu_ready.force(true);
        self.tick();
        self.mmu_ready.force(false);
        self.tick();
    }

    fn array_ready_pulse(&mut self) {
        self.array_ready.force(true);
        self.tick();
        self.array_ready.force(false);
        self.tick();
    }
}

fn word(op: Opcode, line: u8, place: u8, address: u16) -> u32 {
    DecodeUnit::encode(op as u8, line, place, address)
}

fn make_ctrl(words: Vec<u32>) -> CtrlBench {
    let mut ctrl = ControlUnit::new(Arc::new(CtrlConfig::default()), Program::new(words)).expect("ctrl");
    let mut netlist = Netlist::default();
    let run = netlist.track(tie_off_input(&mut ctrl.run));
    let pause = netlist.track(tie_off_input(&mut ctrl.pause));
    let reset = netlist.track(tie_off_input(&mut ctrl.reset));
    let mmu_ready = netlist.track(tie_off_input(&mut ctrl.mmu_ready));
    let array_ready = netlist.track(tie_off_input(&mut ctrl.array_ready));
    let mmu_start = netlist.track(tie_off(&mut ctrl.mmu_start));
    let cache_type = netlist.track(tie_off(&mut ctrl.cache_type));
    let address = netlist.track(tie_off(&mut ctrl.address));
    let place = netlist.track(tie_off(&mut ctrl.place));
    let select_in = ctrl.select_in.iter_mut().map(|port| netlist.track(tie_off(port))).collect();
    let select_out = ctrl.select_out.iter_mut().map(|port| netlist.track(tie_off(port))).collect();
    let array_start = netlist.track(tie_off(&mut ctrl.array_start));
    let finish = netlist.track(tie_off(&mut ctrl.finish));
    CtrlBench {
        ctrl,
        netlist,
        run,
        pause,
        reset,
        mmu_ready,
        array_ready,
        mmu_start,
        cache_type,
        address,
        place,
        select_in,
        select_out,
        array_start,
        finish,
    }
}

#[test]
fn boots_stopped() {
    let mut bench = make_ctrl(vec![word(Opcode::Noop, 0, 0, 0)]);
    bench.tick();
    assert_eq!(bench.ctrl.activity(), Activity::Stop);
    assert_eq!(bench.ctrl.inst_state(), InstState::Noop);
    assert_eq!(bench.ctrl.pp(), 0);
}

#[test]
fn load_issues_one_start_pulse() {
    let mut bench = make_ctrl(vec![
        word(Opcode::LoadD, 0, 3, 16),
        word(Opcode::Finish, 0, 0, 0),
    ]);
    bench.run.force(true);
    bench.tick_until("mmu start", |b| b.mmu_start.get());
    assert_eq!(bench.cache_type.get(), CacheType::DataInput as u8);
    assert_eq!(bench.address.get(), 16);
    assert_eq!(bench.place.get(), 3);
    assert_eq!(bench.select_in[CacheType::DataInput.index()].get(), 0);
    assert_eq!(bench.ctrl.inst_state(), InstState::WaitMmu);
    assert_eq!(bench.ctrl.activity(), Activity::Wait(WaitOn::Mmu));

    bench.tick();
    assert!(!bench.mmu_start.get(), "start is a one-tick pulse");
    for _ in 0..5 {
        bench.tick();
    }
    assert_eq!(bench.ctrl.pp(), 0, "waits for the engine");

    bench.mmu_ready_pulse();
    assert_eq!(bench.ctrl.activity(), Activity::Run);
    bench.tick_until("next fetch", |b| b.ctrl.pp() == 1);
    assert_eq!(bench.ctrl.stats().mmu_requests, 1);
}

#[test]
fn whole_line_forms_use_block_place() {
    let cases = [
        (Opcode::LoadDA, CacheType::DataInput),
        (Opcode::StoreDA, CacheType::DataOutput),
        (Opcode::LoadPC, CacheType::ConfPe),
        (Opcode::LoadCC, CacheType::ConfCc),
    ];
    for (op, kind) in cases {
        let mut bench = make_ctrl(vec![word(op, 1, 5, 0x80)]);
        bench.run.force(true);
        bench.tick_until("mmu start", |b| b.mmu_start.get());
        assert_eq!(bench.cache_type.get(), kind as u8, "{:?}", op);
        assert_eq!(bench.place.get(), PLACE_BLOCK, "{:?}", op);
        assert_eq!(bench.select_in[kind.index()].get(), 1, "{:?}", op);
    }
}

#[test]
fn store_single_targets_data_out() {
    let mut bench = make_ctrl(vec![word(Opcode::StoreD, 0, 2, 0x40)]);
    bench.run.force(true);
    bench.tick_until("mmu start", |b| b.mmu_start.get());
    assert_eq!(bench.cache_type.get(), CacheType::DataOutput as u8);
    assert_eq!(bench.place.get(), 2);
}

#[test]
fn select_bypasses_engine() {
    let mut bench = make_ctrl(vec![
        word(Opcode::SelectDinLine, 0, 0, 0),
        word(Opcode::SelectDoutLine, 1, 0, 0),
        word(Opcode::SelectPcLine, 0, 0, 0),
        word(Opcode::SelectCcLine, 1, 0, 0),
        word(Opcode::Finish, 0, 0, 0),
    ]);
    bench.select_out[CacheType::DataInput.index()].force(1);
    bench.select_out[CacheType::ConfPe.index()].force(1);
    bench.run.force(true);
    bench.tick_until("finish", |b| b.finish.get());
    let lines: Vec<u8> = bench.select_out.iter().map(WireRef::get).collect();
    assert_eq!(lines, vec![0, 1, 0, 1]);
    assert_eq!(bench.ctrl.stats().mmu_requests, 0);
    assert!(!bench.mmu_start.get());
}

#[test]
fn start_pulses_array_for_one_tick() {
    let mut bench = make_ctrl(vec![word(Opcode::Start, 0, 0, 0), word(Opcode::Noop, 0, 0, 0)]);
    bench.run.force(true);
    bench.tick_until("array start", |b| b.array_start.get());
    bench.tick();
    assert!(!bench.array_start.get());
}

#[test]
fn wait_ready_blocks_until_array_edge() {
    let mut bench = make_ctrl(vec![
        word(Opcode::Start, 0, 0, 0),
        word(Opcode::WaitReady, 0, 0, 0),
        word(Opcode::Finish, 0, 0, 0),
    ]);
    bench.run.force(true);
    bench.tick_until("array wait", |b| b.ctrl.activity() == Activity::Wait(WaitOn::Array));
    for _ in 0..10 {
        bench.tick();
    }
    assert_eq!(bench.ctrl.pp(), 1);
    assert!(bench.ctrl.stats().wait_cycles >= 10);

    bench.array_ready_pulse();
    bench.tick_until("finish", |b| b.finish.get());
    assert!(!bench.ctrl.array_irq());
}

#[test]
fn array_ready_during_transfer_is_latched() {
    let mut bench = make_ctrl(vec![
        word(Opcode::Start, 0, 0, 0),
        word(Opcode::LoadD, 0, 3, 16),
        word(Opcode::WaitReady, 0, 0, 0),
        word(Opcode::Finish, 0, 0, 0),
    ]);
    bench.run.force(true);
    bench.tick_until("mmu wait", |b| b.ctrl.activity() == Activity::Wait(WaitOn::Mmu));

    bench.array_ready_pulse();
    assert!(bench.ctrl.array_irq());
    assert_eq!(bench.ctrl.activity(), Activity::Wait(WaitOn::Mmu));

    bench.mmu_ready_pulse();
    for _ in 0..100 {
        assert_ne!(bench.ctrl.activity(), Activity::Wait(WaitOn::Array));
        if bench.finish.get() {
            break;
        }
        bench.tick();
    }
    assert!(bench.finish.get());
    assert!(!bench.ctrl.array_irq());
    assert_eq!(bench.ctrl.stats().instructions, 3);
}

#[test]
fn start_clears_stale_array_ready() {
    let mut bench = make_ctrl(vec![
        word(Opcode::Start, 0, 0, 0),
        word(Opcode::WaitReady, 0, 0, 0),
    ]);
    bench.array_ready_pulse();
    assert!(bench.ctrl.array_irq());
    bench.run.force(true);
    bench.tick_until("array wait", |b| b.ctrl.activity() == Activity::Wait(WaitOn::Array));
}

#[test]
fn spurious_mmu_ready_is_fatal() {
    let mut bench = make_ctrl(vec![word(Opcode::Noop, 0, 0, 0); 8]);
    bench.run.force(true);
    bench.tick();
    bench.mmu_ready.force(true);
    bench.tick();
    assert_eq!(bench.ctrl.activity(), Activity::Error);
    assert!(bench.ctrl.fault().expect("fault").contains("out of sync"));

    let pp = bench.ctrl.pp();
    for _ in 0..10 {
        bench.tick();
    }
    assert_eq!(bench.ctrl.activity(), Activity::Error);
    assert_eq!(bench.ctrl.pp(), pp);
}

#[test]
fn mmu_edge_while_waiting_on_array_is_ignored() {
    let mut bench = make_ctrl(vec![word(Opcode::WaitReady, 0, 0, 0)]);
    bench.run.force(true);
    bench.tick_until("array wait", |b| b.ctrl.activity() == Activity::Wait(WaitOn::Array));
    bench.mmu_ready_pulse();
    assert_eq!(bench.ctrl.activity(), Activity::Wait(WaitOn::Array));
    assert_eq!(bench.ctrl.stats().ignored_edges, 2);
}

#[test]
fn unknown_opcode_is_skipped() {
    let mut bench = make_ctrl(vec![0x3e, word(Opcode::Finish, 0, 0, 0)]);
    bench.run.force(true);
    bench.tick_until("finish", |b| b.finish.get());
    assert_eq!(bench.ctrl.stats().unknown_opcodes, 1);
    assert_eq!(bench.ctrl.pp(), 1);
}

#[test]
fn finish_rewinds_after_run_drops() {
    let mut bench = make_ctrl(vec![word(Opcode::Noop, 0, 0, 0), word(Opcode::Finish, 0, 0, 0)]);
    bench.run.force(true);
    bench.tick_until("finish", |b| b.finish.get());
    for _ in 0..5 {
        bench.tick();
        assert!(bench.finish.get(), "finish holds while run is high");
    }
    assert_eq!(bench.ctrl.pp(), 1);

    bench.run.force(false);
    bench.tick();
    assert_eq!(bench.ctrl.pp(), 0);
    assert_eq!(bench.ctrl.inst_state(), InstState::Noop);
    bench.tick();
    assert!(!bench.finish.get());
}

#[test]
fn running_off_the_end_finishes() {
    let mut bench = make_ctrl(vec![word(Opcode::Noop, 0, 0, 0)]);
    bench.run.force(true);
    bench.tick_until("finish", |b| b.finish.get());
    assert_eq!(bench.ctrl.pp(), 1);
}

#[test]
fn reset_falling_edge_stops_and_rewinds() {
    let mut bench = make_ctrl(vec![word(Opcode::Noop, 0, 0, 0); 16]);
    bench.run.force(true);
    bench.tick_until("progress", |b| b.ctrl.pp() >= 3);

    bench.reset.force(true);
    bench.tick();
    assert_eq!(bench.ctrl.activity(), Activity::Run, "reset acts on the falling edge");
    bench.reset.force(false);
    bench.tick();
    assert_eq!(bench.ctrl.activity(), Activity::Stop);
    assert_eq!(bench.ctrl.inst_state(), InstState::Noop);
    assert_eq!(bench.ctrl.pp(), 0);

    // run is still high, so only a fresh rising edge restarts
    for _ in 0..5 {
        bench.tick();
    }
    assert_eq!(bench.ctrl.pp(), 0);
    bench.run.force(false);
    bench.tick();
    bench.run.force(true);
    bench.tick();
    assert_eq!(bench.ctrl.activity(), Activity::Run);
}

#[test]
fn pause_freezes_program_pointer() {
    let mut bench = make_ctrl(vec![word(Opcode::Noop, 0, 0, 0); 64]);
    bench.run.force(true);
    bench.tick_until("progress", |b| b.ctrl.pp() >= 2);

    bench.pause.force(true);
    bench.tick();
    assert_eq!(bench.ctrl.activity(), Activity::Pause);
    let pp = bench.ctrl.pp();
    for _ in 0..10 {
        bench.tick();
    }
    assert_eq!(bench.ctrl.pp(), pp);
    assert_eq!(bench.ctrl.stats().pause_cycles, 11);

    bench.pause.force(false);
    bench.tick();
    assert_eq!(bench.ctrl.activity(), Activity::Run);
    bench.tick_until("progress", |b| b.ctrl.pp() > pp);
}
