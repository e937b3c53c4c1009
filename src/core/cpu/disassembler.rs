use crate::core::emu::Pdp1140;
use crate::core::memory::PhysAddr;

#[derive(Copy, Clone)]
enum Args {
    None,
    Dd,
    SsDd,
    RDd,
    Offset,
    SobOffset,
    Reg,
    Mark,
}

struct Entry {
    mask: u16,
    opcode: u16,
    name: &'static str,
    args: Args,
    byte: bool,
}

const fn e(mask: u16, opcode: u16, name: &'static str, args: Args, byte: bool) -> Entry {
    Entry { mask, opcode, name, args, byte }
}

/// First match wins, so exact opcodes come before the wide masks.
const TABLE: &[Entry] = &[
    e(0o177777, 0o000000, "HALT", Args::None, false),
    e(0o177777, 0o000001, "WAIT", Args::None, false),
    e(0o177777, 0o000002, "RTI", Args::None, false),
    e(0o177777, 0o000003, "BPT", Args::None, false),
    e(0o177777, 0o000004, "IOT", Args::None, false),
    e(0o177777, 0o000005, "RESET", Args::None, false),
    e(0o177777, 0o000006, "RTT", Args::None, false),
    e(0o177777, 0o170011, "SETD", Args::None, false),
    e(0o177700, 0o000100, "JMP", Args::Dd, false),
    e(0o177770, 0o000200, "RTS", Args::Reg, false),
    e(0o177740, 0o000240, "CCC", Args::None, false),
    e(0o177740, 0o000260, "SCC", Args::None, false),
    e(0o177700, 0o000300, "SWAB", Args::Dd, false),
    e(0o177400, 0o000400, "BR", Args::Offset, false),
    e(0o177400, 0o001000, "BNE", Args::Offset, false),
    e(0o177400, 0o001400, "BEQ", Args::Offset, false),
    e(0o177400, 0o002000, "BGE", Args::Offset, false),
    e(0o177400, 0o002400, "BLT", Args::Offset, false),
    e(0o177400, 0o003000, "BGT", Args::Offset, false),
    e(0o177400, 0o003400, "BLE", Args::Offset, false),
    e(0o177400, 0o100000, "BPL", Args::Offset, false),
    e(0o177400, 0o100400, "BMI", Args::Offset, false),
    e(0o177400, 0o101000, "BHI", Args::Offset, false),
    e(0o177400, 0o101400, "BLOS", Args::Offset, false),
    e(0o177400, 0o102000, "BVC", Args::Offset, false),
    e(0o177400, 0o102400, "BVS", Args::Offset, false),
    e(0o177400, 0o103000, "BCC", Args::Offset, false),
    e(0o177400, 0o103400, "BCS", Args::Offset, false),
    e(0o177400, 0o104000, "EMT", Args::None, false),
    e(0o177400, 0o104400, "TRAP", Args::None, false),
    e(0o177000, 0o004000, "JSR", Args::RDd, false),
    e(0o177000, 0o070000, "MUL", Args::RDd, false),
    e(0o177000, 0o071000, "DIV", Args::RDd, false),
    e(0o177000, 0o072000, "ASH", Args::RDd, false),
    e(0o177000, 0o073000, "ASHC", Args::RDd, false),
    e(0o177000, 0o074000, "XOR", Args::RDd, false),
    e(0o177000, 0o077000, "SOB", Args::SobOffset, false),
    e(0o177700, 0o006400, "MARK", Args::Mark, false),
    e(0o177700, 0o006500, "MFPI", Args::Dd, false),
    e(0o177700, 0o006600, "MTPI", Args::Dd, false),
    e(0o177700, 0o006700, "SXT", Args::Dd, false),
    e(0o077700, 0o005000, "CLR", Args::Dd, true),
    e(0o077700, 0o005100, "COM", Args::Dd, true),
    e(0o077700, 0o005200, "INC", Args::Dd, true),
    e(0o077700, 0o005300, "DEC", Args::Dd, true),
    e(0o077700, 0o005400, "NEG", Args::Dd, true),
    e(0o077700, 0o005500, "ADC", Args::Dd, true),
    e(0o077700, 0o005600, "SBC", Args::Dd, true),
    e(0o077700, 0o005700, "TST", Args::Dd, true),
    e(0o077700, 0o006000, "ROR", Args::Dd, true),
    e(0o077700, 0o006100, "ROL", Args::Dd, true),
    e(0o077700, 0o006200, "ASR", Args::Dd, true),
    e(0o077700, 0o006300, "ASL", Args::Dd, true),
    e(0o070000, 0o010000, "MOV", Args::SsDd, true),
    e(0o070000, 0o020000, "CMP", Args::SsDd, true),
    e(0o070000, 0o030000, "BIT", Args::SsDd, true),
    e(0o070000, 0o040000, "BIC", Args::SsDd, true),
    e(0o070000, 0o050000, "BIS", Args::SsDd, true),
    e(0o170000, 0o060000, "ADD", Args::SsDd, false),
    e(0o170000, 0o160000, "SUB", Args::SsDd, false),
];

fn reg_name(r: u16) -> &'static str {
    ["R0", "R1", "R2", "R3", "R4", "R5", "SP", "PC"][(r & 7) as usize]
}

impl Pdp1140 {
    /// Render the instruction at physical address `a`. Debug aid only;
    /// never faults, unreadable words print as zero.
    pub fn disasm(&mut self, a: PhysAddr) -> String {
        let ins = self.phys_read16(a).unwrap_or(0);
        let Some(entry) = TABLE
            .iter()
            .find(|entry| ins & entry.mask == entry.opcode || (entry.byte && ins & entry.mask == entry.opcode | 0o100000))
        else {
            return format!("{ins:06o} ?"); // undecodable
        };
        let mut name = entry.name.to_string();
        if entry.byte && ins & 0o100000 != 0 {
            name.push('B');
        }
        let mut next = a + 2;
        match entry.args {
            Args::None => name,
            Args::Dd => {
                let dd = self.operand(ins & 0o77, &mut next);
                format!("{name} {dd}")
            }
            Args::SsDd => {
                let ss = self.operand((ins >> 6) & 0o77, &mut next);
                let dd = self.operand(ins & 0o77, &mut next);
                format!("{name} {ss}, {dd}")
            }
            Args::RDd => {
                let r = reg_name(ins >> 6);
                let dd = self.operand(ins & 0o77, &mut next);
                format!("{name} {r}, {dd}")
            }
            Args::Offset => {
                let off = ((ins & 0xFF) as u8 as i8 as i32) * 2 + 2;
                if off >= 0 {
                    format!("{name} .+{:o}", off)
                } else {
                    format!("{name} .-{:o}", -off)
                }
            }
            Args::SobOffset => {
                let r = reg_name(ins >> 6);
                format!("{name} {r}, .-{:o}", (ins & 0o77) * 2)
            }
            Args::Reg => format!("{name} {}", reg_name(ins)),
            Args::Mark => format!("{name} {:o}", ins & 0o77),
        }
    }

    fn operand(&mut self, spec: u16, next: &mut PhysAddr) -> String {
        let r = reg_name(spec);
        let mode = (spec >> 3) & 7;
        let mut word = || {
            let w = self.phys_read16(*next).unwrap_or(0);
            *next += 2;
            w
        };
        match mode {
            0 => r.to_string(),
            1 => format!("({r})"),
            2 if spec & 7 == 7 => format!("#{:o}", word()),
            2 => format!("({r})+"),
            3 if spec & 7 == 7 => format!("@#{:o}", word()),
            3 => format!("@({r})+"),
            4 => format!("-({r})"),
            5 => format!("@-({r})"),
            6 => format!("{:o}({r})", word()),
            _ => format!("@{:o}({r})", word()),
        }
    }
}
