use crate::core::cpu::{Exception, Trap};
use crate::core::emu::Pdp1140;
use crate::core::interrupt::{INT_RK, InterruptQueue};
use crate::core::memory::PhysAddr;
use std::io;
use tracing::{debug, info, warn};

/// 203 cylinders x 2 surfaces x 12 sectors of 256 words, little-endian;
/// the distributed v6 packs are truncated to exactly this length.
pub const IMAGE_LEN: usize = 2_077_696;

// RKER bits
pub const RKOVR: u16 = 1 << 14;
pub const RKWLO: u16 = 1 << 13;
pub const RKNXD: u16 = 1 << 7;
pub const RKNXC: u16 = 1 << 6;
pub const RKNXS: u16 = 1 << 5;

const MAX_CYLINDER: u16 = 0o312;
const MAX_SECTOR: u16 = 0o13;

/// One removable disk cartridge.
pub struct Rk05 {
    data: Vec<u8>,
    locked: bool,
    pub md5: String,
}

impl Rk05 {
    pub fn new(data: Vec<u8>) -> io::Result<Self> {
        if data.len() != IMAGE_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "RK05 image is not the correct size: found {}, expected {}",
                    data.len(),
                    IMAGE_LEN
                ),
            ));
        }
        let md5 = format!("{:X}", md5::compute(&data));
        Ok(Rk05 { data, locked: false, md5 })
    }

    pub fn load_from_file(path: &str) -> io::Result<Self> {
        Self::new(std::fs::read(path)?)
    }

    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }
}

/*
RK11 registers:
  0777400 RKDS drive status     bit 6 ready, bit 7 control ready, bit 11 online
  0777402 RKER error            OVR/WLO/NXD/NXC/NXS
  0777404 RKCS control/status   bit 0 GO, bits 3:1 function (0 reset, 1 write,
                                2 read, 7 write-lock), bits 5:4 BA17:16,
                                bit 6 interrupt enable, bit 7 control ready,
                                bits 15:14 error summary
  0777406 RKWC word count       two's complement, counts up toward zero
  0777410 RKBA bus address      low 16 bits; 17:16 live in RKCS
  0777412 RKDA disk address     sector 3:0, surface 4, cylinder 12:5, drive 15:13
  0777414 RKMR maintenance      stub, reads zero
  0777416 RKDB data buffer      stub, reads zero
 */
pub struct Rk11 {
    rkba: u32,
    pub(crate) rkds: u16,
    pub(crate) rker: u16,
    pub(crate) rkcs: u16,
    pub(crate) rkwc: u16,
    drive: usize,
    cylinder: u16,
    surface: u16,
    sector: u16,
    running: bool,
    units: [Option<Rk05>; 8],
}

impl Rk11 {
    pub fn new() -> Self {
        let mut rk = Rk11 {
            rkba: 0,
            rkds: 0,
            rker: 0,
            rkcs: 0,
            rkwc: 0,
            drive: 0,
            cylinder: 0,
            surface: 0,
            sector: 0,
            running: false,
            units: Default::default(),
        };
        rk.reset();
        rk
    }

    pub fn reset(&mut self) {
        self.rkds = (1 << 11) | (1 << 7) | (1 << 6);
        self.rker = 0;
        self.rkcs = 1 << 7;
        self.rkwc = 0;
        self.rkba = 0;
        self.running = false;
    }

    pub fn attach(&mut self, drive: usize, unit: Rk05) -> io::Result<()> {
        if drive >= self.units.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("no such drive {drive}"),
            ));
        }
        info!("RK05 image attached to drive {} (md5 {})", drive, unit.md5);
        self.units[drive] = Some(unit);
        Ok(())
    }

    fn ready(&mut self) {
        self.rkds |= 1 << 6;
        self.rkcs |= 1 << 7;
    }

    fn not_ready(&mut self) {
        self.rkds &= !(1 << 6);
        self.rkcs &= !(1 << 7);
    }

    /// Abort the current function with an RKER code. Controller errors
    /// never fault the CPU; the running program reads them back.
    fn fail(&mut self, code: u16, irqs: &mut InterruptQueue) {
        warn!("RK11 error: {}", error_name(code));
        self.running = false;
        self.ready();
        self.rker |= code;
        self.rkcs |= (1 << 15) | (1 << 14);
        if self.rkcs & (1 << 6) != 0 {
            irqs.enqueue(INT_RK, 5);
        }
    }

    fn function(&self) -> u16 {
        (self.rkcs & 0o17) >> 1
    }

    fn go(&mut self) {
        match self.function() {
            0 => self.reset(),
            1 | 2 | 7 => {
                self.running = true;
                self.not_ready();
            }
            f => {
                warn!("RK11: unimplemented function {:o}, ignored", f);
                self.ready();
            }
        }
    }

    pub fn read16(&self, a: PhysAddr) -> Result<u16, Trap> {
        match a {
            0o777400 => Ok(self.rkds),
            0o777402 => Ok(self.rker),
            0o777404 => Ok(self.rkcs | ((self.rkba & 0x30000) >> 12) as u16),
            0o777406 => Ok(self.rkwc),
            0o777410 => Ok((self.rkba & 0xFFFF) as u16),
            0o777412 => Ok(self.sector
                | (self.surface << 4)
                | (self.cylinder << 5)
                | ((self.drive as u16) << 13)),
            0o777414 | 0o777416 => Ok(0),
            _ => Err(Trap::BusError(a)),
        }
    }

    pub fn write16(&mut self, a: PhysAddr, v: u16) -> Result<(), Trap> {
        match a {
            0o777400 | 0o777402 => Ok(()), // read-only
            0o777404 => {
                self.rkba = (self.rkba & 0xFFFF) | (((v & 0o60) as u32) << 12);
                const BITS: u16 = 0o17517; // writable bits
                let v = v & BITS;
                self.rkcs &= !BITS;
                self.rkcs |= v & !1; // GO is not a stored bit
                if v & 1 == 1 {
                    self.go();
                }
                Ok(())
            }
            0o777406 => {
                self.rkwc = v;
                Ok(())
            }
            0o777410 => {
                self.rkba = (self.rkba & 0x30000) | v as u32;
                Ok(())
            }
            0o777412 => {
                self.drive = (v >> 13) as usize;
                self.cylinder = (v >> 5) & 0o377;
                self.surface = (v >> 4) & 1;
                self.sector = v & 15;
                Ok(())
            }
            0o777414 | 0o777416 => Ok(()),
            _ => Err(Trap::BusError(a)),
        }
    }
}

fn error_name(code: u16) -> &'static str {
    match code {
        RKOVR => "operation overflowed the disk",
        RKWLO => "write to a write-locked drive",
        RKNXD => "invalid disk accessed",
        RKNXC => "invalid cylinder accessed",
        RKNXS => "invalid sector accessed",
        _ => "unknown error",
    }
}

impl Pdp1140 {
    /// Move one sector between the selected unit and memory. Reads land in
    /// physical memory through the Unibus word path, so memory-mapped
    /// destinations are honored.
    pub(crate) fn rk_step(&mut self) -> Result<(), Exception> {
        if !self.rk.running {
            return Ok(());
        }
        let write = match self.rk.function() {
            1 => true,
            2 => false,
            7 => {
                if self.rk.units[self.rk.drive].is_none() {
                    self.rk.fail(RKNXD, &mut self.irqs);
                    return Ok(());
                }
                if let Some(unit) = self.rk.units[self.rk.drive].as_mut() {
                    unit.locked = true;
                    debug!("RK11: drive {} write-locked", self.rk.drive);
                }
                self.rk.running = false;
                self.rk.ready();
                return Ok(());
            }
            f => {
                warn!("RK11: unimplemented function {:o}, ignored", f);
                self.rk.running = false;
                self.rk.ready();
                return Ok(());
            }
        };
        let (attached, locked) = match self.rk.units[self.rk.drive].as_ref() {
            Some(unit) => (true, unit.locked),
            None => (false, false),
        };
        if !attached {
            self.rk.fail(RKNXD, &mut self.irqs);
            return Ok(());
        }
        if write && locked {
            self.rk.fail(RKWLO, &mut self.irqs);
            return Ok(());
        }
        if self.rk.cylinder > MAX_CYLINDER {
            self.rk.fail(RKNXC, &mut self.irqs);
            return Ok(());
        }
        if self.rk.sector > MAX_SECTOR {
            self.rk.fail(RKNXS, &mut self.irqs);
            return Ok(());
        }
        let mut pos = (self.rk.cylinder as usize * 24
            + self.rk.surface as usize * 12
            + self.rk.sector as usize)
            * 512;
        for _ in 0..256 {
            if self.rk.rkwc == 0 {
                break;
            }
            if pos + 1 >= IMAGE_LEN {
                // the image is shorter than the geometric maximum
                self.rk.fail(RKOVR, &mut self.irqs);
                return Ok(());
            }
            let ba = self.rk.rkba & 0x3FFFF;
            if write {
                let val = self.phys_read16(ba)?;
                if let Some(unit) = self.rk.units[self.rk.drive].as_mut() {
                    unit.data[pos] = val as u8;
                    unit.data[pos + 1] = (val >> 8) as u8;
                }
            } else {
                let val = match self.rk.units[self.rk.drive].as_ref() {
                    Some(unit) => unit.data[pos] as u16 | (unit.data[pos + 1] as u16) << 8,
                    None => 0,
                };
                self.phys_write16(ba, val)?;
            }
            self.rk.rkba = (self.rk.rkba + 2) & 0x3FFFF;
            pos += 2;
            self.rk.rkwc = self.rk.rkwc.wrapping_add(1);
        }
        self.rk.sector += 1;
        if self.rk.sector > MAX_SECTOR {
            self.rk.sector = 0;
            self.rk.surface += 1;
            if self.rk.surface > 1 {
                self.rk.surface = 0;
                self.rk.cylinder += 1;
                if self.rk.cylinder > MAX_CYLINDER && self.rk.rkwc != 0 {
                    self.rk.fail(RKOVR, &mut self.irqs);
                    return Ok(());
                }
            }
        }
        if self.rk.rkwc == 0 {
            self.rk.running = false;
            self.rk.ready();
            debug!(
                "RK11 transfer complete, RKBA {:06o} CHS {}/{}/{}",
                self.rk.rkba, self.rk.cylinder, self.rk.surface, self.rk.sector
            );
            if self.rk.rkcs & (1 << 6) != 0 {
                self.irqs.enqueue(INT_RK, 5);
            }
        }
        Ok(())
    }
}
