use transport::Transport;

/// Largest accepted command payload. Has to at least fit the `G` (write all
/// registers) packet, which puts the floor around 320 bytes.
pub const CMD_BUF: usize = 512;

const ESCAPE: u8 = b'}';
const ESCAPE_XOR: u8 = 0x20;

const HEX: &[u8; 16] = b"0123456789abcdef";

/// Errors on the RSP wire path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RspError<E> {
    /// Underlying link error.
    Link(E),
    /// Incoming payload exceeded the command buffer.
    Overflow,
    /// Sender's checksum disagreed with ours; a NAK has been sent.
    ChecksumMismatch,
}

impl<E> From<E> for RspError<E> {
    fn from(err: E) -> Self {
        RspError::Link(err)
    }
}

/// Outcome of waiting for one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    /// A verified payload of the given length is in the buffer.
    Packet(usize),
    /// The first byte read was not a packet start; handed through verbatim
    /// so the caller can react to out-of-band bytes.
    OutOfBand(u8),
}

/// Block until one framed packet has been read into `buf`.
///
/// Unescapes the payload while keeping the running checksum over the bytes
/// as transmitted. A second `$` mid-packet discards the partial packet and
/// restarts. On a checksum mismatch a NAK goes out and the caller retries;
/// on a match the ACK goes out and the payload is returned.
pub fn recv_packet<L: Transport>(
    link: &mut L,
    buf: &mut [u8; CMD_BUF],
) -> Result<Received, RspError<L::Error>> {
    let first = link.recv_byte()?;
    if first != b'$' {
        return Ok(Received::OutOfBand(first));
    }

    let mut checksum: u8 = 0;
    let mut len = 0usize;
    loop {
        let byte = link.recv_byte()?;
        if byte == b'#' {
            break;
        }
        checksum = checksum.wrapping_add(byte);
        if byte == b'$' {
            // Sender restarted the packet; drop what we have so far.
            checksum = 0;
            len = 0;
            continue;
        }
        let byte = if byte == ESCAPE {
            let escaped = link.recv_byte()?;
            checksum = checksum.wrapping_add(escaped);
            escaped ^ ESCAPE_XOR
        } else {
            byte
        };
        if len >= buf.len() {
            return Err(RspError::Overflow);
        }
        buf[len] = byte;
        len += 1;
    }

    let sent = [link.recv_byte()?, link.recv_byte()?];
    let verified = match HexCursor::new(&sent).u32_bounded(8) {
        Ok(sum) => sum as u8 == checksum,
        Err(_) => false,
    };
    if !verified {
        link.send_byte(b'-')?;
        return Err(RspError::ChecksumMismatch);
    }
    link.send_byte(b'+')?;
    Ok(Received::Packet(len))
}

/// Scoped writer for one outgoing packet.
///
/// `begin` sends the start marker and zeroes the checksum, the `put_*`
/// calls stream escaped payload bytes, and `finish` seals the packet with
/// the `#` trailer and two checksum digits.
pub struct ReplyPacket<'a, L: Transport> {
    link: &'a mut L,
    checksum: u8,
}

impl<'a, L: Transport> ReplyPacket<'a, L> {
    pub fn begin(link: &'a mut L) -> Result<Self, RspError<L::Error>> {
        link.send_byte(b'$')?;
        Ok(Self { link, checksum: 0 })
    }

    /// Send one payload byte, escaping the four reserved characters. The
    /// checksum covers the bytes as they go out on the wire.
    pub fn put_byte(&mut self, byte: u8) -> Result<(), RspError<L::Error>> {
        if matches!(byte, b'#' | b'$' | b'}' | b'*') {
            let escaped = byte ^ ESCAPE_XOR;
            self.link.send_byte(ESCAPE)?;
            self.link.send_byte(escaped)?;
            self.checksum = self.checksum.wrapping_add(ESCAPE).wrapping_add(escaped);
        } else {
            self.link.send_byte(byte)?;
            self.checksum = self.checksum.wrapping_add(byte);
        }
        Ok(())
    }

    pub fn put_str(&mut self, s: &str) -> Result<(), RspError<L::Error>> {
        for &byte in s.as_bytes() {
            self.put_byte(byte)?;
        }
        Ok(())
    }

    /// Emit `bits / 4` hex digits of `val`, most significant first.
    pub fn put_hex(&mut self, val: u32, bits: u32) -> Result<(), RspError<L::Error>> {
        let mut shift = bits;
        while shift > 0 {
            shift -= 4;
            self.put_byte(HEX[((val >> shift) & 0xf) as usize])?;
        }
        Ok(())
    }

    pub fn finish(self) -> Result<(), RspError<L::Error>> {
        let sum = self.checksum;
        self.link.send_byte(b'#')?;
        self.link.send_byte(HEX[(sum >> 4) as usize])?;
        self.link.send_byte(HEX[(sum & 0xf) as usize])?;
        self.link.flush()?;
        Ok(())
    }
}

/// Send one of the fixed replies (`OK`, `E00`, `l`, empty, ...).
pub fn send_reply<L: Transport>(link: &mut L, payload: &str) -> Result<(), RspError<L::Error>> {
    let mut pkt = ReplyPacket::begin(link)?;
    pkt.put_str(payload)?;
    pkt.finish()
}

/// Errors from scanning hex fields out of a decoded payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HexError {
    /// Ran into the packet terminator before the field was complete.
    EndOfPacket,
    /// A byte that is neither a hex digit nor a terminator.
    Malformed,
}

/// Forward scanner over a decoded payload.
pub struct HexCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> HexCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    /// Consume the next byte if it equals `byte`.
    pub fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Bounded scan: consume exactly `bits / 4` hex digits. An early `#`
    /// reads as end-of-packet, any other non-hex byte as malformed.
    pub fn u32_bounded(&mut self, bits: u32) -> Result<u32, HexError> {
        let mut val = 0u32;
        for _ in 0..bits / 4 {
            let Some(byte) = self.peek() else {
                return Err(HexError::EndOfPacket);
            };
            self.pos += 1;
            match hex_digit(byte) {
                Some(digit) => val = (val << 4) | u32::from(digit),
                None if byte == b'#' => return Err(HexError::EndOfPacket),
                None => return Err(HexError::Malformed),
            }
        }
        Ok(val)
    }

    /// Unbounded scan: eat hex digits until the first non-hex byte, which
    /// stays in the cursor. An empty prefix reads as zero.
    pub fn u32_prefix(&mut self) -> u32 {
        let mut val = 0u32;
        while let Some(byte) = self.peek() {
            let Some(digit) = hex_digit(byte) else {
                break;
            };
            val = (val << 4) | u32::from(digit);
            self.pos += 1;
        }
        val
    }
}

fn hex_digit(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(10 + byte - b'a'),
        b'A'..=b'F' => Some(10 + byte - b'A'),
        _ => None,
    }
}

/// Format diagnostics into a GDB `O` (console output) packet, best effort.
#[cfg(feature = "debug_console")]
pub fn debug_console_fmt<L: Transport>(link: &mut L, args: core::fmt::Arguments<'_>) {
    use core::fmt::Write;

    struct BufWriter {
        buf: [u8; 64],
        pos: usize,
    }

    impl Write for BufWriter {
        fn write_str(&mut self, s: &str) -> core::fmt::Result {
            let bytes = s.as_bytes();
            let room = self.buf.len().saturating_sub(self.pos);
            let take = bytes.len().min(room);
            self.buf[self.pos..self.pos + take].copy_from_slice(&bytes[..take]);
            self.pos += take;
            Ok(())
        }
    }

    let mut writer = BufWriter {
        buf: [0; 64],
        pos: 0,
    };
    let _ = writer.write_fmt(args);

    // A dead link cannot carry diagnostics; swallow the error.
    let Ok(mut pkt) = ReplyPacket::begin(link) else {
        return;
    };
    if pkt.put_byte(b'O').is_err() {
        return;
    }
    for &byte in &writer.buf[..writer.pos] {
        if pkt.put_hex(u32::from(byte), 8).is_err() {
            return;
        }
    }
    let _ = pkt.finish();
}

#[cfg(not(feature = "debug_console"))]
pub fn debug_console_fmt<L: Transport>(link: &mut L, args: core::fmt::Arguments<'_>) {
    let _ = (link, args);
}
