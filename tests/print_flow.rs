//! End-to-end print flow against the in-memory transport.

use ql_raster::{
    packbits, raster, Bitmap, CutPolicy, Error, MediaProfile, MemoryTransport, Printer, RasterJob,
};

fn telegram(width_mm: u8, kind: u8, status_type: u8) -> Vec<u8> {
    let mut raw = vec![0u8; 32];
    raw[0] = 0x80;
    raw[1] = 0x20;
    raw[2] = 0x42;
    raw[4] = 0x41; // QL-820NWB
    raw[10] = width_mm;
    raw[11] = kind;
    raw[18] = status_type;
    raw
}

/// Walk the captured stream and return the body of every raster frame.
fn raster_bodies(stream: &[u8]) -> Vec<Vec<u8>> {
    let mut bodies = Vec::new();
    let mut i = 0;
    while i < stream.len() {
        match stream[i] {
            0x67 | 0x77 => {
                let len = stream[i + 2] as usize;
                bodies.push(stream[i + 3..i + 3 + len].to_vec());
                i += 3 + len;
            }
            // ESC-prefixed fixed length opcodes we need to step over.
            0x1B => match stream[i + 1] {
                0x40 => i += 2,
                0x69 => match stream[i + 2] {
                    0x7A => i += 13,
                    0x64 => i += 5,
                    0x61 | 0x21 | 0x4D | 0x41 | 0x4B => i += 4,
                    0x53 => i += 3,
                    other => panic!("unexpected ESC i opcode {:#04X}", other),
                },
                other => panic!("unexpected ESC opcode {:#04X}", other),
            },
            0x4D => i += 2,
            0x00 | 0x0C | 0x1A => i += 1,
            other => panic!("unexpected opcode {:#04X} at offset {}", other, i),
        }
    }
    bodies
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn compressed_job_produces_the_full_frame_sequence() {
    init_logging();
    let profile = MediaProfile::resolve("QL-820NWB", "62").unwrap();

    // Full printable width, alternating black and white columns.
    let width = 696u32;
    let height = 150u32;
    let mut pixels = Vec::with_capacity((width * height) as usize);
    for _y in 0..height {
        for x in 0..width {
            pixels.push(if x % 2 == 0 { 0 } else { 255 });
        }
    }
    let bitmap = Bitmap::new(width, height, pixels).unwrap();
    let page = raster::encode(&bitmap, &profile, raster::DEFAULT_THRESHOLD).unwrap();

    let mut transport = MemoryTransport::new();
    transport.push_response(telegram(62, 0x0A, 0x00)); // pre-flight, media ok
    transport.push_response(telegram(62, 0x0A, 0x01)); // printing completed

    let mut printer = Printer::new(transport, profile);
    let job = RasterJob::new(&profile, vec![page.clone()])
        .compress(true)
        .cut(CutPolicy::AtEnd);
    let report = printer.print(&job).unwrap();

    assert_eq!(report.pages, 1);
    assert!(!report.status.faults.any());
    assert!(report.bytes_sent > 0);

    let written = printer.into_transport().take_written();
    assert_eq!(report.bytes_sent, written.len());

    // Status request preamble: 200 zero bytes, ESC @, ESC i S.
    assert!(written[..200].iter().all(|&b| b == 0));
    assert_eq!(&written[200..205], &[0x1B, 0x40, 0x1B, 0x69, 0x53]);

    // Job preamble repeats the invalidate + initialize pair, then the
    // mode switch and the compression flag must precede every raster line.
    assert!(written[205..405].iter().all(|&b| b == 0));
    assert_eq!(&written[405..407], &[0x1B, 0x40]);
    let mode_at = written
        .windows(4)
        .position(|w| w == [0x1B, 0x69, 0x61, 0x01])
        .unwrap();
    let compression_at = written.windows(2).position(|w| w == [0x4D, 0x02]).unwrap();
    let first_raster = written[405..].iter().position(|&b| b == 0x67).unwrap() + 405;
    assert!(mode_at < compression_at && compression_at < first_raster);

    // Exactly one media record before the lines, then the eject trailer.
    assert_eq!(*written.last().unwrap(), 0x1A);
    assert_eq!(
        written
            .windows(3)
            .filter(|w| *w == [0x1B, 0x69, 0x7A])
            .count(),
        1
    );

    // Every raster body decompresses back to the original 90 byte line.
    let bodies = raster_bodies(&written[405..]);
    assert_eq!(bodies.len(), 150);
    for (body, raw_row) in bodies.iter().zip(page.rows()) {
        let raw = packbits::decompress(body, 90).unwrap();
        assert_eq!(&raw, raw_row);
        assert!(body.len() < 90);
    }
}

#[test]
fn oversized_image_is_rejected_at_encode_time() {
    let profile = MediaProfile::resolve("QL-820NWB", "62").unwrap();
    let bitmap = Bitmap::new(720, 150, vec![0u8; 720 * 150]).unwrap();

    let err = raster::encode(&bitmap, &profile, raster::DEFAULT_THRESHOLD).unwrap_err();
    assert!(matches!(
        Error::from(err),
        Error::Config(ql_raster::ConfigError::ImageTooWide {
            width: 720,
            printable: 696
        })
    ));
}

#[test]
fn check_status_round_trips_a_telegram() {
    let profile = MediaProfile::resolve("QL-820NWB", "62").unwrap();
    let mut transport = MemoryTransport::new();
    transport.push_response(telegram(62, 0x0A, 0x00));

    let mut printer = Printer::new(transport, profile);
    let status = printer.check_status().unwrap();
    assert_eq!(status.model_code, 0x41);
    assert_eq!(status.media_code(), profile.code());
}

#[test]
fn short_telegram_is_a_decode_error_not_a_fault() {
    let profile = MediaProfile::resolve("QL-820NWB", "62").unwrap();
    let mut transport = MemoryTransport::new();
    transport.push_response(vec![0x80, 0x20, 0x42, 0x30]); // truncated read

    let mut printer = Printer::new(transport, profile);
    assert!(matches!(
        printer.check_status().unwrap_err(),
        Error::Decode(ql_raster::DecodeError::ShortRead(4))
    ));
}
