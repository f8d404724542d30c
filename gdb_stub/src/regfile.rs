//! Translation from captured CPU state into the register file GDB expects.

use crate::target::Target;

/// Placeholder for a register that was never captured.
pub const SENTINEL: u32 = 0xDEAD_BEEF;

/// Stack pointers outside this window are reported as not captured rather
/// than handed to the debugger to dereference.
pub const STACK_MIN: u32 = 0x3ffa_e010;
pub const STACK_MAX: u32 = 0x3fff_ffff;

const PC_ADDR_MASK: u32 = 0x3fff_ffff;
const IRAM_HIGH_BITS: u32 = 0x4000_0000;

// Return addresses can carry a window-size tag in bit 27.
const RETADDR_WINDOW_TAG: u32 = 1 << 27;

// PS fix shared with the companion core-dump decoder: user-mode set
// implies the exception-mode bit must read as clear.
const PS_UM: u32 = 1 << 5;
const PS_EXCM: u32 = 1 << 4;

pub fn is_valid_stack(sp: u32) -> bool {
    (STACK_MIN..=STACK_MAX).contains(&sp)
}

/// Fold a possibly bit-31-tagged code address back into the instruction
/// RAM address space.
fn canonical_code_addr(addr: u32) -> u32 {
    (addr & PC_ADDR_MASK) | IRAM_HIGH_BITS
}

fn fixup_ps(ps: u32) -> u32 {
    if ps & PS_UM != 0 {
        ps & !PS_EXCM
    } else {
        ps
    }
}

/// Volatile CPU state captured at the moment of a fault, in the exact
/// order the exception vectors spill it to the stack.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExceptionFrame {
    /// Frame-type discriminant; nonzero for an exception frame.
    pub exit: u32,
    pub pc: u32,
    pub ps: u32,
    pub ar: [u32; 16],
    pub sar: u32,
    pub exccause: u32,
    pub excvaddr: u32,
    pub lbeg: u32,
    pub lend: u32,
    pub lcount: u32,
}

impl ExceptionFrame {
    /// Words the frame occupies at the top of a faulted task's stack.
    pub const WORDS: usize = 25;
}

/// A suspended task's saved context as the scheduler leaves it on the
/// task stack. Saves far fewer registers than a full exception frame.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskContext {
    /// Frame-type discriminant; zero for a solicited task switch.
    pub exit: u32,
    pub pc: u32,
    pub ps: u32,
    pub threadptr: u32,
    pub ar: [u32; 4],
}

impl TaskContext {
    pub const WORDS: usize = 8;
}

/// Tagged view of whatever is saved at the top of a task's stack.
pub enum SavedFrame {
    Exception(ExceptionFrame),
    Task(TaskContext),
}

impl SavedFrame {
    /// Decode the saved frame at `stack_top`.
    ///
    /// The discriminant comes out of halted, possibly corrupt memory, so
    /// the whole candidate frame is bounds-checked against the stack
    /// window before any field is trusted.
    pub fn decode<T: Target + ?Sized>(target: &T, stack_top: u32) -> Option<SavedFrame> {
        if stack_top % 4 != 0 || !is_valid_stack(stack_top) {
            return None;
        }
        let frame_bytes = ExceptionFrame::WORDS as u32 * 4;
        let end = stack_top.checked_add(frame_bytes)?;
        if end > STACK_MAX + 1 {
            return None;
        }
        let word = |index: usize| target.load_word(stack_top + index as u32 * 4);
        if word(0) != 0 {
            let mut ar = [0u32; 16];
            for (index, slot) in ar.iter_mut().enumerate() {
                *slot = word(3 + index);
            }
            Some(SavedFrame::Exception(ExceptionFrame {
                exit: word(0),
                pc: word(1),
                ps: word(2),
                ar,
                sar: word(19),
                exccause: word(20),
                excvaddr: word(21),
                lbeg: word(22),
                lend: word(23),
                lcount: word(24),
            }))
        } else {
            Some(SavedFrame::Task(TaskContext {
                exit: 0,
                pc: word(1),
                ps: word(2),
                threadptr: word(3),
                ar: [word(4), word(5), word(6), word(7)],
            }))
        }
    }

    pub fn to_regfile(&self) -> RegisterFile {
        match self {
            SavedFrame::Exception(frame) => RegisterFile::from_exception(frame),
            SavedFrame::Task(ctx) => RegisterFile::from_task(ctx),
        }
    }
}

/// Words in the `g`/`G` wire image of the register file.
pub const WIRE_WORDS: usize = 105;

/// The xtensa register file in the order GDB's architecture description
/// expects it (gdb/regformats/reg-xtensa.dat). Field order is the wire
/// contract for the `g`/`G` packets.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterFile {
    pub pc: u32,
    pub ar: [u32; 64],
    pub lbeg: u32,
    pub lend: u32,
    pub lcount: u32,
    pub sar: u32,
    pub windowbase: u32,
    pub windowstart: u32,
    pub configid0: u32,
    pub configid1: u32,
    pub ps: u32,
    pub threadptr: u32,
    pub br: u32,
    pub scompare1: u32,
    pub acclo: u32,
    pub acchi: u32,
    pub m0: u32,
    pub m1: u32,
    pub m2: u32,
    pub m3: u32,
    pub expstate: u32,
    pub f64r_lo: u32,
    pub f64r_hi: u32,
    pub f64s: u32,
    pub f: [u32; 16],
    pub fcr: u32,
    pub fsr: u32,
}

impl RegisterFile {
    /// Every word at the sentinel; the translators overwrite the words
    /// that have an architectural source, so the result is always fully
    /// populated.
    const fn all_sentinel() -> Self {
        Self {
            pc: SENTINEL,
            ar: [SENTINEL; 64],
            lbeg: SENTINEL,
            lend: SENTINEL,
            lcount: SENTINEL,
            sar: SENTINEL,
            windowbase: SENTINEL,
            windowstart: SENTINEL,
            configid0: SENTINEL,
            configid1: SENTINEL,
            ps: SENTINEL,
            threadptr: SENTINEL,
            br: SENTINEL,
            scompare1: SENTINEL,
            acclo: SENTINEL,
            acchi: SENTINEL,
            m0: SENTINEL,
            m1: SENTINEL,
            m2: SENTINEL,
            m3: SENTINEL,
            expstate: SENTINEL,
            f64r_lo: SENTINEL,
            f64r_hi: SENTINEL,
            f64s: SENTINEL,
            f: [SENTINEL; 16],
            fcr: SENTINEL,
            fsr: SENTINEL,
        }
    }

    /// Translate the frame that caused the halt. Only one register window
    /// is live at fault time; `ar[16..64]` stay at the sentinel.
    pub fn from_exception(frame: &ExceptionFrame) -> Self {
        let mut rf = Self::all_sentinel();
        rf.pc = canonical_code_addr(frame.pc);
        rf.ar[..16].copy_from_slice(&frame.ar);
        rf.lbeg = frame.lbeg;
        rf.lend = frame.lend;
        rf.lcount = frame.lcount;
        rf.sar = frame.sar;
        rf.ps = fixup_ps(frame.ps);
        rf.expstate = frame.exccause;
        rf.apply_common_fixups();
        rf
    }

    /// Translate a suspended task's saved context. The scheduler saves
    /// only four address registers and no loop state.
    pub fn from_task(ctx: &TaskContext) -> Self {
        let mut rf = Self::all_sentinel();
        rf.pc = canonical_code_addr(ctx.pc);
        rf.ar[..4].copy_from_slice(&ctx.ar);
        rf.lbeg = 0;
        rf.lend = 0;
        rf.lcount = 0;
        rf.sar = 0;
        rf.ps = fixup_ps(ctx.ps);
        rf.expstate = 0;
        rf.apply_common_fixups();
        rf
    }

    fn apply_common_fixups(&mut self) {
        // A tagged return address folds back into instruction RAM.
        if self.ar[0] & RETADDR_WINDOW_TAG != 0 {
            self.ar[0] = canonical_code_addr(self.ar[0]);
        }
        // A stack pointer outside the valid window would have GDB chasing
        // garbage; report it as not captured instead.
        if !is_valid_stack(self.ar[1]) {
            self.ar[1] = SENTINEL;
        }
        // Every window has been spilled to the stack before the stub runs.
        self.windowbase = 0;
        self.windowstart = 1;
    }

    /// Flat wire image, word for word in packet order.
    pub fn wire_words(&self) -> [u32; WIRE_WORDS] {
        let mut w = [0u32; WIRE_WORDS];
        w[0] = self.pc;
        w[1..65].copy_from_slice(&self.ar);
        w[65] = self.lbeg;
        w[66] = self.lend;
        w[67] = self.lcount;
        w[68] = self.sar;
        w[69] = self.windowbase;
        w[70] = self.windowstart;
        w[71] = self.configid0;
        w[72] = self.configid1;
        w[73] = self.ps;
        w[74] = self.threadptr;
        w[75] = self.br;
        w[76] = self.scompare1;
        w[77] = self.acclo;
        w[78] = self.acchi;
        w[79] = self.m0;
        w[80] = self.m1;
        w[81] = self.m2;
        w[82] = self.m3;
        w[83] = self.expstate;
        w[84] = self.f64r_lo;
        w[85] = self.f64r_hi;
        w[86] = self.f64s;
        w[87..103].copy_from_slice(&self.f);
        w[103] = self.fcr;
        w[104] = self.fsr;
        w
    }

    /// Overwrite the file from a wire image, word for word.
    pub fn set_wire_words(&mut self, w: &[u32; WIRE_WORDS]) {
        self.pc = w[0];
        self.ar.copy_from_slice(&w[1..65]);
        self.lbeg = w[65];
        self.lend = w[66];
        self.lcount = w[67];
        self.sar = w[68];
        self.windowbase = w[69];
        self.windowstart = w[70];
        self.configid0 = w[71];
        self.configid1 = w[72];
        self.ps = w[73];
        self.threadptr = w[74];
        self.br = w[75];
        self.scompare1 = w[76];
        self.acclo = w[77];
        self.acchi = w[78];
        self.m0 = w[79];
        self.m1 = w[80];
        self.m2 = w[81];
        self.m3 = w[82];
        self.expstate = w[83];
        self.f64r_lo = w[84];
        self.f64r_hi = w[85];
        self.f64s = w[86];
        self.f.copy_from_slice(&w[87..103]);
        self.fcr = w[103];
        self.fsr = w[104];
    }
}
