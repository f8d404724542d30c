use gdb_stub::codec::recv_packet;
use gdb_stub::codec::send_reply;
use gdb_stub::codec::HexCursor;
use gdb_stub::codec::HexError;
use gdb_stub::codec::Received;
use gdb_stub::codec::ReplyPacket;
use gdb_stub::codec::RspError;
use gdb_stub::codec::CMD_BUF;
use gdb_stub::Transport;

struct MockLink {
    rx: Vec<u8>,
    rx_pos: usize,
    tx: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OutOfData;

impl MockLink {
    fn new(rx: &[u8]) -> Self {
        Self {
            rx: rx.to_vec(),
            rx_pos: 0,
            tx: Vec::new(),
        }
    }
}

impl Transport for MockLink {
    type Error = OutOfData;

    fn recv_byte(&mut self) -> Result<u8, OutOfData> {
        let byte = self.rx.get(self.rx_pos).copied().ok_or(OutOfData)?;
        self.rx_pos += 1;
        Ok(byte)
    }

    fn send_byte(&mut self, byte: u8) -> Result<(), OutOfData> {
        self.tx.push(byte);
        Ok(())
    }
}

fn encode(payload: &[u8]) -> Vec<u8> {
    let mut link = MockLink::new(&[]);
    let mut pkt = ReplyPacket::begin(&mut link).expect("begin");
    for &byte in payload {
        pkt.put_byte(byte).expect("put");
    }
    pkt.finish().expect("finish");
    link.tx
}

#[test]
fn reply_roundtrips_through_recv() {
    let payload = b"ab#$}*cd";
    let wire = encode(payload);

    let mut link = MockLink::new(&wire);
    let mut buf = [0u8; CMD_BUF];
    let received = recv_packet(&mut link, &mut buf).expect("recv");
    assert_eq!(received, Received::Packet(payload.len()));
    assert_eq!(&buf[..payload.len()], payload);
    // A verified packet earns an ACK.
    assert_eq!(link.tx, b"+");
}

#[test]
fn empty_reply_is_bare_frame_with_zero_checksum() {
    let mut link = MockLink::new(&[]);
    send_reply(&mut link, "").expect("send");
    assert_eq!(link.tx, b"$#00");
}

#[test]
fn checksum_covers_escaped_bytes() {
    // '}' goes out as '}' + ('}' ^ 0x20) and both bytes count.
    let wire = encode(&[b'}']);
    assert_eq!(wire, b"$}]#da");
}

#[test]
fn corrupted_byte_gets_nak() {
    let mut wire = encode(b"qSupported");
    wire[3] ^= 0x01;

    let mut link = MockLink::new(&wire);
    let mut buf = [0u8; CMD_BUF];
    let result = recv_packet(&mut link, &mut buf);
    assert_eq!(result, Err(RspError::ChecksumMismatch));
    assert_eq!(link.tx, b"-");
}

#[test]
fn out_of_band_byte_passes_through() {
    let mut link = MockLink::new(b"+");
    let mut buf = [0u8; CMD_BUF];
    let received = recv_packet(&mut link, &mut buf).expect("recv");
    assert_eq!(received, Received::OutOfBand(b'+'));
    assert!(link.tx.is_empty());
}

#[test]
fn restart_marker_discards_partial_packet() {
    let mut link = MockLink::new(b"$ab$cd#c7");
    let mut buf = [0u8; CMD_BUF];
    let received = recv_packet(&mut link, &mut buf).expect("recv");
    assert_eq!(received, Received::Packet(2));
    assert_eq!(&buf[..2], b"cd");
    assert_eq!(link.tx, b"+");
}

#[test]
fn oversized_payload_overflows() {
    let mut wire = vec![b'$'];
    wire.extend(std::iter::repeat(b'a').take(CMD_BUF + 1));

    let mut link = MockLink::new(&wire);
    let mut buf = [0u8; CMD_BUF];
    let result = recv_packet(&mut link, &mut buf);
    assert_eq!(result, Err(RspError::Overflow));
}

#[test]
fn hex_bounded_consumes_exact_width() {
    let mut cursor = HexCursor::new(b"deadbeef");
    assert_eq!(cursor.u32_bounded(16), Ok(0xdead));
    assert_eq!(cursor.u32_bounded(16), Ok(0xbeef));
}

#[test]
fn hex_bounded_reports_early_terminator() {
    let mut cursor = HexCursor::new(b"1#");
    assert_eq!(cursor.u32_bounded(16), Err(HexError::EndOfPacket));
}

#[test]
fn hex_bounded_rejects_garbage() {
    let mut cursor = HexCursor::new(b"1z34");
    assert_eq!(cursor.u32_bounded(16), Err(HexError::Malformed));
}

#[test]
fn hex_prefix_stops_before_delimiter() {
    let mut cursor = HexCursor::new(b"3ffb0000,4");
    assert_eq!(cursor.u32_prefix(), 0x3ffb_0000);
    // The delimiter was not consumed.
    assert!(cursor.eat(b','));
    assert_eq!(cursor.u32_prefix(), 4);
}

#[test]
fn hex_prefix_of_nothing_reads_zero() {
    let mut cursor = HexCursor::new(b",1");
    assert_eq!(cursor.u32_prefix(), 0);
    assert!(cursor.eat(b','));
}

#[test]
fn mixed_payloads_roundtrip() {
    let payloads: &[&[u8]] = &[
        b"",
        b"OK",
        b"}",
        b"*#$",
        b"m00000001",
        b"plain text with spaces",
        &[0x00, 0x7d, 0x23, 0x24, 0x2a, 0xff],
    ];
    for payload in payloads {
        let wire = encode(payload);
        let mut link = MockLink::new(&wire);
        let mut buf = [0u8; CMD_BUF];
        let received = recv_packet(&mut link, &mut buf).expect("recv");
        assert_eq!(received, Received::Packet(payload.len()));
        assert_eq!(&buf[..payload.len()], *payload);
    }
}

#[test]
fn hex_emission_is_fixed_width_most_significant_first() {
    let mut link = MockLink::new(&[]);
    let mut pkt = ReplyPacket::begin(&mut link).expect("begin");
    pkt.put_hex(0x0000_00ab, 32).expect("hex");
    pkt.put_hex(0x5, 8).expect("hex");
    pkt.finish().expect("finish");
    assert!(link.tx.starts_with(b"$000000ab05#"));
}
