use crate::core::cpu::{Exception, Halt, Trap};
use crate::core::emu::Pdp1140;
use crate::core::memory::{IOPAGE_BASE, PhysAddr};

/// 0777570: the console switch register, wired to the v6 boot setting.
const SWITCH_REGISTER: u16 = 0o173030;

/*
Unibus dispatch. Everything below the I/O page is core memory; the I/O
page decodes to the line clock, the switch register, the MMU status and
register banks, the console, the RK11 and the PSW. Byte access reads the
containing word and masks; byte writes read-modify-write.
 */
impl Pdp1140 {
    pub fn phys_read16(&mut self, a: PhysAddr) -> Result<u16, Exception> {
        if a & 1 == 1 {
            return Err(Trap::BusError(a).into());
        }
        if a < IOPAGE_BASE {
            return Ok(self.ram.word(a));
        }
        match a {
            0o777546 => Ok(self.clock.lks),
            0o777570 => Ok(SWITCH_REGISTER),
            0o777572 => Ok(self.mmu.sr0),
            0o777576 => Ok(self.mmu.sr2),
            0o777776 => Ok(self.cpu.ps.0),
            0o777560..=0o777566 => Ok(self.cons.read16(a)?),
            0o777400..=0o777416 => Ok(self.rk.read16(a)?),
            0o772200..=0o772376 | 0o777600..=0o777676 => Ok(self.mmu.read16(a)?),
            _ => Err(Trap::BusError(a).into()),
        }
    }

    pub fn phys_read8(&mut self, a: PhysAddr) -> Result<u16, Exception> {
        let val = self.phys_read16(a & !1)?;
        Ok(if a & 1 != 0 { val >> 8 } else { val & 0xFF })
    }

    pub fn phys_write16(&mut self, a: PhysAddr, v: u16) -> Result<(), Exception> {
        if a & 1 == 1 {
            return Err(Trap::BusError(a).into());
        }
        if a < IOPAGE_BASE {
            self.ram.set_word(a, v);
            return Ok(());
        }
        match a {
            0o777776 => self.write_psw(v),
            0o777546 => {
                self.clock.lks = v;
                Ok(())
            }
            0o777572 => {
                self.mmu.sr0 = v;
                Ok(())
            }
            0o777560..=0o777566 => Ok(self.cons.write16(a, v)?),
            0o777400..=0o777416 => Ok(self.rk.write16(a, v)?),
            0o772200..=0o772376 | 0o777600..=0o777676 => Ok(self.mmu.write16(a, v)?),
            _ => Err(Trap::BusError(a).into()),
        }
    }

    pub fn phys_write8(&mut self, a: PhysAddr, v: u16) -> Result<(), Exception> {
        if a < IOPAGE_BASE {
            self.ram.set_byte(a, v as u8);
            return Ok(());
        }
        let cur = self.phys_read16(a & !1)?;
        let word = if a & 1 == 1 {
            (cur & 0x00FF) | ((v & 0xFF) << 8)
        } else {
            (cur & 0xFF00) | (v & 0xFF)
        };
        self.phys_write16(a & !1, word)
    }

    /*
    Writing the PSW decodes bits 15:14 into the current mode and 13:12
    into the previous mode; only 00 (kernel) and 11 (user) exist on the
    11/40. Mode transitions bank R6 through the shadow stack pointers.
     */
    fn write_psw(&mut self, v: u16) -> Result<(), Exception> {
        match v >> 14 {
            0 => self.cpu.switch_mode(false),
            3 => self.cpu.switch_mode(true),
            _ => return Err(Halt::BadStatusMode(v).into()),
        }
        match (v >> 12) & 3 {
            0 => self.cpu.prevuser = false,
            3 => self.cpu.prevuser = true,
            _ => return Err(Halt::BadStatusMode(v).into()),
        }
        self.cpu.ps.0 = v;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_word_access_is_a_bus_error() {
        let mut pdp = Pdp1140::new();
        assert_eq!(
            pdp.phys_read16(0o1001),
            Err(Exception::Trap(Trap::BusError(0o1001)))
        );
        assert_eq!(
            pdp.phys_write16(0o777771, 0),
            Err(Exception::Trap(Trap::BusError(0o777771)))
        );
    }

    #[test]
    fn unmapped_io_addresses_trap() {
        let mut pdp = Pdp1140::new();
        assert!(pdp.phys_read16(0o776000).is_err());
        assert!(pdp.phys_write16(0o777570, 1).is_err()); // switch register is read-only
    }

    #[test]
    fn switch_register_is_constant() {
        let mut pdp = Pdp1140::new();
        assert_eq!(pdp.phys_read16(0o777570).unwrap(), 0o173030);
    }

    #[test]
    fn byte_access_masks_the_containing_word() {
        let mut pdp = Pdp1140::new();
        pdp.phys_write16(0o1000, 0o123456).unwrap();
        assert_eq!(pdp.phys_read8(0o1000).unwrap(), 0o123456 & 0xFF);
        assert_eq!(pdp.phys_read8(0o1001).unwrap(), 0o123456 >> 8);
    }

    #[test]
    fn byte_write_to_a_device_register_is_rmw() {
        let mut pdp = Pdp1140::new();
        pdp.phys_write16(0o777412, 0o31003).unwrap();
        pdp.phys_write8(0o777412, 0o5).unwrap();
        let rkda = pdp.phys_read16(0o777412).unwrap();
        assert_eq!(rkda & 0xFF, 0o5);
        assert_eq!(rkda & 0xFF00, 0o31003 & 0xFF00);
    }

    #[test]
    fn psw_write_switches_modes_and_banks_sp() {
        let mut pdp = Pdp1140::new();
        pdp.cpu.r[6] = 0o1000;
        pdp.phys_write16(0o777776, 0o140000).unwrap();
        assert!(pdp.cpu.curuser);
        pdp.cpu.r[6] = 0o2000;
        pdp.phys_write16(0o777776, 0).unwrap();
        assert!(!pdp.cpu.curuser);
        assert_eq!(pdp.cpu.r[6], 0o1000);
        assert_eq!(pdp.cpu.ksp, 0o1000);
        assert_eq!(pdp.cpu.usp, 0o2000);
    }

    #[test]
    fn reserved_psw_mode_is_fatal() {
        let mut pdp = Pdp1140::new();
        assert_eq!(
            pdp.phys_write16(0o777776, 0o100000),
            Err(Exception::Halt(Halt::BadStatusMode(0o100000)))
        );
    }
}
