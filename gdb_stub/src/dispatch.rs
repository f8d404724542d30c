//! Interpretation of decoded payloads as RSP commands.

use transport::Transport;

use crate::codec::send_reply;
use crate::codec::HexCursor;
use crate::codec::ReplyPacket;
use crate::codec::RspError;
use crate::regfile::ExceptionFrame;
use crate::regfile::RegisterFile;
use crate::regfile::SavedFrame;
use crate::target::read_byte;
use crate::target::Target;
use crate::tasks::TaskDirectory;

/// What the session loop should do after a command was handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Directive {
    /// Stay in the session loop.
    Handled,
    /// A continue request; the session is over.
    Resume,
}

// Exception cause to signal number. Kept exactly as the companion
// core-dump tooling expects it, including the entries that look dubious.
const CAUSE_SIGNALS: [u8; 16] = [4, 31, 11, 11, 2, 6, 8, 0, 6, 7, 0, 0, 7, 7, 7, 7];
const DEFAULT_SIGNAL: u8 = 11;

/// Per-session debugger state: the register file GDB currently sees, the
/// remembered fault frame, the task snapshot, and the thread-list cursor.
pub struct Session {
    regs: RegisterFile,
    frame: ExceptionFrame,
    tasks: TaskDirectory,
    thread_cursor: usize,
}

impl Session {
    /// Remember the faulting frame. The scheduler's own bookkeeping never
    /// reflects it, so the copy is the only record of why we halted.
    pub fn new(frame: &ExceptionFrame) -> Self {
        Self {
            regs: RegisterFile::from_exception(frame),
            frame: *frame,
            tasks: TaskDirectory::new(),
            thread_cursor: 0,
        }
    }

    /// The register file the debugger currently sees.
    pub fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    /// Report why execution stopped, as `T<signal>`.
    pub fn send_stop_reason<L: Transport>(&self, link: &mut L) -> Result<(), RspError<L::Error>> {
        let cause = (self.regs.expstate & 0x7f) as usize;
        let signal = CAUSE_SIGNALS.get(cause).copied().unwrap_or(DEFAULT_SIGNAL);
        let mut pkt = ReplyPacket::begin(link)?;
        pkt.put_byte(b'T')?;
        pkt.put_hex(u32::from(signal), 8)?;
        pkt.finish()
    }

    /// Interpret one decoded payload and emit the response packet.
    ///
    /// Unrecognized or malformed commands answer an empty packet, which
    /// tells the debugger "unsupported" rather than signaling an error.
    pub fn handle<L, T>(
        &mut self,
        link: &mut L,
        target: &mut T,
        payload: &[u8],
    ) -> Result<Directive, RspError<L::Error>>
    where
        L: Transport,
        T: Target,
    {
        match payload.first().copied() {
            Some(b'g') => self.read_all_registers(link)?,
            Some(b'G') => self.write_all_registers(link, payload)?,
            Some(b'm') => self.read_memory(link, target, payload)?,
            Some(b'?') => self.send_stop_reason(link)?,
            Some(b'H') => self.select_task(link, target, payload)?,
            Some(b'T') => self.task_alive(link, target, payload)?,
            Some(b'q') => self.query(link, target, payload)?,
            Some(b'c') => return Ok(Directive::Resume),
            _ => send_reply(link, "")?,
        }
        Ok(Directive::Handled)
    }

    /// `g`: every register file word as 8 hex digits, byte-order swapped.
    fn read_all_registers<L: Transport>(&self, link: &mut L) -> Result<(), RspError<L::Error>> {
        let mut pkt = ReplyPacket::begin(link)?;
        for word in self.regs.wire_words() {
            pkt.put_hex(word.swap_bytes(), 32)?;
        }
        pkt.finish()
    }

    /// `G`: overwrite the register file from the payload, with the same
    /// byte-order swap applied on decode.
    fn write_all_registers<L: Transport>(
        &mut self,
        link: &mut L,
        payload: &[u8],
    ) -> Result<(), RspError<L::Error>> {
        let mut cursor = HexCursor::new(&payload[1..]);
        let mut words = self.regs.wire_words();
        for slot in words.iter_mut() {
            match cursor.u32_bounded(32) {
                Ok(value) => *slot = value.swap_bytes(),
                Err(_) => break,
            }
        }
        self.regs.set_wire_words(&words);
        send_reply(link, "OK")
    }

    /// `m addr,len`: each byte as 2 hex digits. Out-of-window reads answer
    /// the sentinel byte; keeping the session alive beats accuracy here.
    fn read_memory<L: Transport, T: Target>(
        &self,
        link: &mut L,
        target: &T,
        payload: &[u8],
    ) -> Result<(), RspError<L::Error>> {
        let mut cursor = HexCursor::new(&payload[1..]);
        let addr = cursor.u32_prefix();
        if !cursor.eat(b',') {
            return send_reply(link, "");
        }
        let len = cursor.u32_prefix();
        let mut pkt = ReplyPacket::begin(link)?;
        for offset in 0..len {
            let byte = read_byte(target, addr.wrapping_add(offset));
            pkt.put_hex(u32::from(byte), 8)?;
        }
        pkt.finish()
    }

    /// `Hg`/`Hc`: make a task's registers current for later `g`/`m`.
    fn select_task<L: Transport, T: Target>(
        &mut self,
        link: &mut L,
        target: &mut T,
        payload: &[u8],
    ) -> Result<(), RspError<L::Error>> {
        if !matches!(payload.get(1).copied(), Some(b'g' | b'c')) {
            return send_reply(link, "");
        }
        let mut cursor = HexCursor::new(payload.get(2..).unwrap_or(&[]));
        let index = cursor.u32_prefix() as usize;

        // The faulting task's scheduler bookkeeping is stale; its real
        // state is the remembered exception frame.
        if self.tasks.current_index(target) == Some(index) {
            self.regs = RegisterFile::from_exception(&self.frame);
            return send_reply(link, "OK");
        }

        let frame = self
            .tasks
            .entry(target, index)
            .map(|entry| entry.handle)
            .and_then(|handle| target.stack_top_of(handle))
            .and_then(|stack_top| SavedFrame::decode(target, stack_top));
        match frame {
            Some(frame) => {
                self.regs = frame.to_regfile();
                send_reply(link, "OK")
            }
            None => send_reply(link, "E00"),
        }
    }

    /// `T`: task liveness check by directory index.
    fn task_alive<L: Transport, T: Target>(
        &mut self,
        link: &mut L,
        target: &mut T,
        payload: &[u8],
    ) -> Result<(), RspError<L::Error>> {
        let mut cursor = HexCursor::new(&payload[1..]);
        let index = cursor.u32_prefix() as usize;
        let reply = if index < self.tasks.count(target) {
            "OK"
        } else {
            "E00"
        };
        send_reply(link, reply)
    }

    fn query<L: Transport, T: Target>(
        &mut self,
        link: &mut L,
        target: &mut T,
        payload: &[u8],
    ) -> Result<(), RspError<L::Error>> {
        if let Some(rest) = payload.strip_prefix(b"qThreadExtraInfo,") {
            return self.thread_extra_info(link, target, rest);
        }
        if payload.starts_with(b"qfThreadInfo") || payload.starts_with(b"qsThreadInfo") {
            return self.thread_info(link, target, payload[1] == b'f');
        }
        if payload.starts_with(b"qC") {
            return self.current_thread(link, target);
        }
        send_reply(link, "")
    }

    /// Per-task descriptive string: name plus a `" CPU<n>"` suffix, all
    /// rendered as hex text.
    fn thread_extra_info<L: Transport, T: Target>(
        &mut self,
        link: &mut L,
        target: &mut T,
        rest: &[u8],
    ) -> Result<(), RspError<L::Error>> {
        let mut cursor = HexCursor::new(rest);
        let index = cursor.u32_prefix() as usize;
        let Some(entry) = self.tasks.entry(target, index) else {
            return send_reply(link, "");
        };
        let (name, core_id) = (entry.name, entry.core_id);
        let mut pkt = ReplyPacket::begin(link)?;
        for &byte in name.as_bytes() {
            pkt.put_hex(u32::from(byte), 8)?;
        }
        pkt.put_str("20435055")?; // " CPU"
        pkt.put_str(match core_id {
            0 => "30",
            1 => "31",
            _ => "78",
        })?;
        pkt.finish()
    }

    /// Paged task enumeration: one `m<index>` per request, `l` when done.
    fn thread_info<L: Transport, T: Target>(
        &mut self,
        link: &mut L,
        target: &mut T,
        first: bool,
    ) -> Result<(), RspError<L::Error>> {
        if first {
            self.thread_cursor = 0;
        }
        if self.thread_cursor < self.tasks.count(target) {
            let index = self.thread_cursor as u32;
            self.thread_cursor += 1;
            let mut pkt = ReplyPacket::begin(link)?;
            pkt.put_byte(b'm')?;
            pkt.put_hex(index, 32)?;
            pkt.finish()
        } else {
            send_reply(link, "l")
        }
    }

    fn current_thread<L: Transport, T: Target>(
        &mut self,
        link: &mut L,
        target: &mut T,
    ) -> Result<(), RspError<L::Error>> {
        match self.tasks.current_index(target) {
            Some(index) => {
                let mut pkt = ReplyPacket::begin(link)?;
                pkt.put_str("QC")?;
                pkt.put_hex(index as u32, 32)?;
                pkt.finish()
            }
            None => send_reply(link, "bad"),
        }
    }
}
