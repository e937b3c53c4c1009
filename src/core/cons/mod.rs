use crate::core::cpu::Trap;
use crate::core::interrupt::{INT_TTYIN, INT_TTYOUT, InterruptQueue};
use crate::core::memory::PhysAddr;
use std::io::{self, Write};
use std::sync::mpsc::{Receiver, SyncSender, TryRecvError, sync_channel};
use tracing::warn;

const INPUT_QUEUE_DEPTH: usize = 64;

/*
Console registers (KL11):
  0777560 TKS keyboard status: bit 6 interrupt enable (R/W), bit 7 ready
  0777562 TKB keyboard buffer: reading clears the ready bit
  0777564 TPS printer status:  bit 6 interrupt enable (R/W), bit 7 ready
  0777566 TPB printer buffer:  writing clears ready and schedules output
 */
pub struct Console {
    tks: u16,
    tkb: u16,
    tps: u16,
    tpb: u16,
    count: u8,
    input: Receiver<u8>,
    keyboard: SyncSender<u8>,
    out: Box<dyn Write + Send>,
}

impl Console {
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    pub fn with_output(out: Box<dyn Write + Send>) -> Self {
        let (keyboard, input) = sync_channel(INPUT_QUEUE_DEPTH);
        Console {
            tks: 0,
            tkb: 0,
            tps: 1 << 7,
            tpb: 0,
            count: 0,
            input,
            keyboard,
            out,
        }
    }

    /// Producer end of the bounded keyboard queue.
    pub fn input_channel(&self) -> SyncSender<u8> {
        self.keyboard.clone()
    }

    pub fn clear(&mut self) {
        self.tks = 0;
        self.tps = 1 << 7;
        self.tkb = 0;
        self.tpb = 0;
    }

    /// Take at most one pending host byte. Also used directly by the driver
    /// while the CPU sits in WAIT.
    pub fn poll(&mut self, irqs: &mut InterruptQueue) {
        match self.input.try_recv() {
            Ok(c) => self.add_char(c, irqs),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
        }
    }

    fn add_char(&mut self, c: u8, irqs: &mut InterruptQueue) {
        // remap the host convention to the control codes v6 expects
        self.tkb = match c {
            42 => 4,
            19 => 0o34,
            46 => 127,
            _ => c as u16,
        };
        self.tks |= 0x80;
        if self.tks & (1 << 6) != 0 {
            irqs.enqueue(INT_TTYIN, 4);
        }
    }

    fn get_char(&mut self) -> u16 {
        if self.tks & 0x80 == 0x80 {
            self.tks &= 0xFF7E;
            return self.tkb;
        }
        0
    }

    pub fn step(&mut self, irqs: &mut InterruptQueue) {
        if self.tks & (1 << 6) == 0 {
            self.poll(irqs);
        }
        self.count = self.count.wrapping_add(1);
        if self.count % 32 != 0 {
            return;
        }
        if self.tps & 0x80 == 0 {
            self.write_terminal((self.tpb & 0x7F) as u8);
            self.tps |= 0x80;
            if self.tps & (1 << 6) != 0 {
                irqs.enqueue(INT_TTYOUT, 4);
            }
        }
    }

    fn write_terminal(&mut self, c: u8) {
        if c == 13 {
            return; // the newline alone will do
        }
        if let Err(e) = self.out.write_all(&[c]).and_then(|_| self.out.flush()) {
            warn!("console output failed: {e}");
        }
    }

    pub fn read16(&mut self, a: PhysAddr) -> Result<u16, Trap> {
        match a {
            0o777560 => Ok(self.tks),
            0o777562 => Ok(self.get_char()),
            0o777564 => Ok(self.tps),
            0o777566 => Ok(0),
            _ => Err(Trap::BusError(a)),
        }
    }

    pub fn write16(&mut self, a: PhysAddr, v: u16) -> Result<(), Trap> {
        match a {
            0o777560 => {
                if v & (1 << 6) != 0 {
                    self.tks |= 1 << 6;
                } else {
                    self.tks &= !(1 << 6);
                }
                Ok(())
            }
            0o777564 => {
                if v & (1 << 6) != 0 {
                    self.tps |= 1 << 6;
                } else {
                    self.tps &= !(1 << 6);
                }
                Ok(())
            }
            0o777566 => {
                self.tpb = v & 0xFF;
                self.tps &= 0xFF7F;
                Ok(())
            }
            _ => Err(Trap::BusError(a)),
        }
    }
}
