#![no_std]

/// Blocking byte-oriented debug link.
///
/// The stub runs from fault context, so every operation polls: receiving
/// blocks until the link has a byte, sending blocks until it has room.
/// There is no timeout; the system has nothing better to do.
pub trait Transport {
    /// Error type returned by link operations.
    type Error;

    /// Read a single byte, blocking until one is available.
    fn recv_byte(&mut self) -> Result<u8, Self::Error>;

    /// Write a single byte, blocking until there is room for it.
    fn send_byte(&mut self, byte: u8) -> Result<(), Self::Error>;

    /// Flush any buffered data. Default is a no-op.
    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// One-time link bring-up (pin mux, FIFO drain) before the first send
    /// of a session. Default is a no-op for links that are always live.
    fn bring_up(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Write an entire buffer to the link.
    fn send_all(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        for &b in buf {
            self.send_byte(b)?;
        }
        Ok(())
    }
}
