use crate::core::clock::LineClock;
use crate::core::cons::Console;
use crate::core::cpu::{Exception, Halt, Kb11, RunState, Trap};
use crate::core::interrupt::{INT_CLOCK, InterruptQueue, Intr};
use crate::core::kt11::Kt11;
use crate::core::memory::{PhysAddr, Ram};
use crate::core::rk11::{Rk05, Rk11};
use std::io;
use std::sync::mpsc::SyncSender;
use tracing::{debug, error, info, warn};

pub const EMU_NAME: &str = "r-pdp11";
pub const EMU_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const EMU_BUILD_DATE_TIME: &str = build_time::build_time_utc!();

/// Power-up PC: the word after the "KD" tag of the boot ROM.
pub const BOOT_START: u16 = 0o2002;

/// RK05 bootstrap, loaded at 02000 (PDP-11 boot-tradition).
pub const BOOT_RK05: [(PhysAddr, u16); 29] = [
    (0o2000, 0o042113),                   /* "KD" */
    (0o2002, 0o012706), (0o2004, 0o2000), /* MOV #boot_start, SP */
    (0o2006, 0o012700), (0o2010, 0o000000), /* MOV #unit, R0 */
    (0o2012, 0o010003),                   /* MOV R0, R3 */
    (0o2014, 0o000303),                   /* SWAB R3 */
    (0o2016, 0o006303),                   /* ASL R3 */
    (0o2020, 0o006303),                   /* ASL R3 */
    (0o2022, 0o006303),                   /* ASL R3 */
    (0o2024, 0o006303),                   /* ASL R3 */
    (0o2026, 0o006303),                   /* ASL R3 */
    (0o2030, 0o012701), (0o2032, 0o177412), /* MOV #RKDA, R1       ; csr */
    (0o2034, 0o010311),                   /* MOV R3, (R1)         ; load da */
    (0o2036, 0o005041),                   /* CLR -(R1)            ; clear ba */
    (0o2040, 0o012741), (0o2042, 0o177000), /* MOV #-256.*2, -(R1) ; load wc */
    (0o2044, 0o012741), (0o2046, 0o000005), /* MOV #READ+GO, -(R1) ; read & go */
    (0o2050, 0o005002),                   /* CLR R2 */
    (0o2052, 0o005003),                   /* CLR R3 */
    (0o2054, 0o012704), (0o2056, 0o2020), /* MOV #START+20, R4 */
    (0o2060, 0o005005),                   /* CLR R5 */
    (0o2062, 0o105711),                   /* TSTB (R1) */
    (0o2064, 0o100376),                   /* BPL .-2 */
    (0o2066, 0o105011),                   /* CLRB (R1) */
    (0o2070, 0o005007),                   /* CLR PC */
];

/// A PDP-11/40 with 128KW of memory. Every subsystem lives in this one
/// aggregate; the cross-cutting paths (Unibus dispatch, instruction
/// execution, RK11 transfers) are methods on it, so nothing needs a
/// back-pointer.
pub struct Pdp1140 {
    pub(crate) cpu: Kb11,
    pub(crate) mmu: Kt11,
    pub(crate) ram: Ram,
    pub(crate) clock: LineClock,
    pub(crate) cons: Console,
    pub(crate) rk: Rk11,
    pub(crate) irqs: InterruptQueue,
}

impl Pdp1140 {
    pub fn new() -> Self {
        let mut pdp = Pdp1140 {
            cpu: Kb11::new(),
            mmu: Kt11::new(),
            ram: Ram::new(),
            clock: LineClock::new(),
            cons: Console::new(),
            rk: Rk11::new(),
            irqs: InterruptQueue::new(),
        };
        pdp.reset();
        pdp
    }

    /// Back to the power-up state: cleared registers and memory, fresh MMU
    /// pages and devices, kernel mode, PC at the boot ROM entry.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.cpu.r[7] = BOOT_START;
        self.mmu.reset();
        self.ram.clear();
        self.clock.reset();
        self.cons.clear();
        self.rk.reset();
        self.irqs.clear();
        debug!("machine reset, PC {:06o}", BOOT_START);
    }

    /// Bulk-load words through the Unibus write path.
    pub fn load_memory(&mut self, code: &[(PhysAddr, u16)]) -> Result<(), Exception> {
        for &(a, v) in code {
            self.phys_write16(a, v)?;
        }
        Ok(())
    }

    /// Load the RK05 boot ROM and point the PC at it.
    pub fn boot(&mut self) -> Result<(), Exception> {
        self.load_memory(&BOOT_RK05)?;
        self.set_pc(BOOT_START);
        info!("boot ROM loaded, PC {:06o}", BOOT_START);
        Ok(())
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.cpu.r[7] = pc;
    }

    /// Attach an RK05 image to a drive slot. The image must be exactly
    /// 2,077,696 bytes.
    pub fn attach(&mut self, drive: usize, bytes: Vec<u8>) -> io::Result<()> {
        self.rk.attach(drive, Rk05::new(bytes)?)
    }

    pub fn attach_unit(&mut self, drive: usize, unit: Rk05) -> io::Result<()> {
        self.rk.attach(drive, unit)
    }

    /// Producer end of the keyboard queue, for the host input thread.
    pub fn input_channel(&self) -> SyncSender<u8> {
        self.cons.input_channel()
    }

    /// One driver tick: CPU instruction, line clock, devices, then at most
    /// one interrupt dispatch. Traps unwind here and vector; only machine
    /// stops surface as errors.
    pub fn step(&mut self) -> Result<(), Halt> {
        if let Err(e) = self.tick() {
            match e {
                Exception::Trap(t) => self.trap(t)?,
                Exception::Halt(h) => return Err(h),
            }
        }
        Ok(())
    }

    fn tick(&mut self) -> Result<(), Exception> {
        match self.cpu.state {
            // WAIT performs no work but keeps draining the keyboard
            RunState::Waiting => self.cons.poll(&mut self.irqs),
            RunState::Running => self.execute()?,
        }
        if self.clock.tick() {
            self.irqs.enqueue(INT_CLOCK, 6);
        }
        self.rk_step()?;
        self.cons.step(&mut self.irqs);
        if let Some(intr) = self.irqs.take_ready(self.cpu.ps.priority()) {
            self.service(intr)?;
        }
        Ok(())
    }

    fn service(&mut self, intr: Intr) -> Result<(), Exception> {
        debug!("interrupt {:03o} priority {}", intr.vec, intr.pri);
        self.vector_frame(intr.vec)?;
        self.cpu.state = RunState::Running;
        Ok(())
    }

    /// Push the outgoing context on the kernel stack and load the vector
    /// pair. The mode switch happens before the pushes so the kernel stack
    /// receives them.
    fn vector_frame(&mut self, vec: u16) -> Result<(), Exception> {
        let prev = self.cpu.ps.0;
        self.cpu.switch_mode(false);
        self.push(prev)?;
        self.push(self.cpu.r[7])?;
        self.cpu.r[7] = self.phys_read16(vec as PhysAddr)?;
        self.cpu.ps.0 = self.phys_read16(vec as PhysAddr + 2)?;
        if self.cpu.prevuser {
            self.cpu.ps.0 |= (1 << 13) | (1 << 12);
        }
        Ok(())
    }

    fn trap(&mut self, t: Trap) -> Result<(), Halt> {
        let vec = t.vector();
        warn!("trap {:03o}: {}", vec, t);
        let prev = self.cpu.ps.0;
        match self.vector_frame(vec) {
            Ok(()) => {
                self.cpu.state = RunState::Running;
                Ok(())
            }
            Err(Exception::Trap(inner)) => {
                // a fault inside the trap frame is not survivable: record
                // the context in low memory and stop at vector 4
                error!("red stack trap ({inner})");
                self.ram.set_word(0, self.cpu.r[7]);
                self.ram.set_word(2, prev);
                Err(Halt::RedStack {
                    pc: self.cpu.r[7],
                    psw: prev,
                })
            }
            Err(Exception::Halt(h)) => Err(h),
        }
    }

    /// Step forever, recovering traps; returns the machine stop.
    pub fn run(&mut self) -> Halt {
        loop {
            if let Err(halt) = self.step() {
                return halt;
            }
        }
    }
}
