#![no_std]

//! Read-only GDB Remote Serial Protocol stub for inspecting a halted
//! multi-tasking xtensa target after a fatal fault.
//!
//! The stub owns the protocol engine: packet framing with escaping and
//! checksums, command dispatch, and translation between the captured
//! exception state and the register file GDB expects. The physical link
//! lives behind [`Transport`] and the frozen system behind [`Target`];
//! both are supplied by the embedding fault handler.
//!
//! The stub is deliberately read-only. It answers `g`, `m`, `?`, the
//! thread queries, and task selection; everything else gets an empty
//! packet, and nothing a debugger sends can make it fault a second time.

/// Emit a diagnostic line to the debugger console.
///
/// Compiles to a no-op unless the `debug_console` feature is enabled.
#[macro_export]
macro_rules! stub_debug {
    ($link:expr, $($arg:tt)*) => {
        $crate::codec::debug_console_fmt($link, core::format_args!($($arg)*))
    };
}

pub mod codec;
pub mod dispatch;
pub mod regfile;
pub mod target;
pub mod tasks;

pub use codec::Received;
pub use codec::RspError;
pub use codec::CMD_BUF;
pub use dispatch::Directive;
pub use dispatch::Session;
pub use regfile::ExceptionFrame;
pub use regfile::RegisterFile;
pub use regfile::SavedFrame;
pub use regfile::TaskContext;
pub use target::Target;
pub use target::TaskHandle;
pub use target::TaskInfo;
pub use target::TaskName;
pub use transport::Transport;

/// The debug session: one link, one remembered fault, one loop.
pub struct GdbStub<L: Transport> {
    link: L,
    session: Session,
    cmd: [u8; CMD_BUF],
}

impl<L: Transport> GdbStub<L> {
    /// Copy the faulting frame into the session.
    ///
    /// The source memory may be in an inconsistent state, so nothing
    /// beyond a plain by-value copy happens here; no allocation, no
    /// scheduler calls.
    pub fn new(link: L, frame: &ExceptionFrame) -> Self {
        Self {
            link,
            session: Session::new(frame),
            cmd: [0; CMD_BUF],
        }
    }

    /// Run the read-dispatch-write cycle until the debugger continues.
    ///
    /// Brings the link up, sends the unsolicited stop-reason packet, then
    /// serves commands. Checksum failures (the NAK already went out) and
    /// oversized packets are retried; out-of-band bytes between packets
    /// (stray ACKs, interrupt characters) are ignored. Returns only on a
    /// continue request; what an unresumable system does next is the
    /// caller's business.
    pub fn run<T: Target>(&mut self, target: &mut T) -> Result<(), RspError<L::Error>> {
        self.link.bring_up()?;
        self.session.send_stop_reason(&mut self.link)?;
        loop {
            match codec::recv_packet(&mut self.link, &mut self.cmd) {
                Ok(Received::Packet(len)) => {
                    let directive = self.session.handle(&mut self.link, target, &self.cmd[..len])?;
                    if directive == Directive::Resume {
                        stub_debug!(&mut self.link, "resuming; session over");
                        return Ok(());
                    }
                }
                Ok(Received::OutOfBand(byte)) => {
                    stub_debug!(&mut self.link, "ignoring out-of-band byte {:#04x}", byte);
                }
                Err(RspError::ChecksumMismatch) | Err(RspError::Overflow) => {
                    stub_debug!(&mut self.link, "dropped a bad frame, waiting for resend");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Give the link back, e.g. to a harness inspecting the transcript.
    pub fn into_link(self) -> L {
        self.link
    }
}
