//! End-to-end session tests against the flash emulator

use embedded_io::ErrorKind;
use reflasher_core::partition::{AppSubtype, Partition, PartitionKind, PartitionTable};
use reflasher_core::{
    Error, ReadFailure, ReflashSession, Region, SessionConfig, SessionState,
};
use reflasher_dummy::{DummyConfig, DummyFlash, Fault, FlashOp, Script, ScriptedTransport, Step};

const FACTORY: u32 = 0x10000;
const OTA_0: u32 = 0x110000;
const OTA_1: u32 = 0x210000;
const SLOT_SIZE: u32 = 0x100000;
/// An address inside the factory image
const RUNNING: u32 = 0x10400;

fn table() -> PartitionTable {
    let mut table = PartitionTable::new();
    table
        .push(
            Partition::new(PartitionKind::App(AppSubtype::Factory), FACTORY, SLOT_SIZE)
                .with_label("factory"),
        )
        .unwrap();
    table
        .push(Partition::ota(0, OTA_0, SLOT_SIZE).with_label("ota_0"))
        .unwrap();
    table
        .push(Partition::ota(1, OTA_1, SLOT_SIZE).with_label("ota_1"))
        .unwrap();
    table
}

fn flash() -> DummyFlash {
    DummyFlash::new(DummyConfig {
        size: 0x400000,
        sector_size: 0x1000,
    })
}

fn image(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31) ^ seed).collect()
}

fn config(url: &str, address: u32, size: u32) -> SessionConfig<String> {
    SessionConfig::new(Region::new(address, size), url.to_string())
}

#[test]
fn download_writes_full_chunks_then_remainder() {
    let table = table();
    let mut flash = flash();
    let body = image(1500, 1);
    let mut transport = ScriptedTransport::new().serve("a", Script::body(&body, 4096));

    let mut session = ReflashSession::init(
        &mut flash,
        &mut transport,
        &table,
        RUNNING,
        config("a", 0x0, 0x8000),
    )
    .unwrap();
    assert_eq!(session.target().address, OTA_0);

    let before = session.download_cursor();
    assert_eq!(session.download().unwrap(), 1500);
    assert_eq!(session.download_cursor(), before + 1500);
    session.finish();

    assert_eq!(flash.writes(), vec![(OTA_0, 1024), (OTA_0 + 1024, 476)]);
    assert_eq!(&flash.data()[OTA_0 as usize..OTA_0 as usize + 1500], &body[..]);
    assert_eq!(transport.closes(), 1);
}

#[test]
fn init_erases_whole_partition_before_anything_else() {
    let table = table();
    let mut flash = flash();
    flash.data_mut()[OTA_0 as usize..(OTA_0 + SLOT_SIZE) as usize].fill(0x00);
    let mut transport = ScriptedTransport::new();

    let session = ReflashSession::init(
        &mut flash,
        &mut transport,
        &table,
        RUNNING,
        config("a", 0x0, 0x8000),
    )
    .unwrap();
    session.finish();

    assert_eq!(
        flash.ops(),
        &[FlashOp::Erase {
            addr: OTA_0,
            len: SLOT_SIZE
        }]
    );
    assert!(flash.data()[OTA_0 as usize..(OTA_0 + SLOT_SIZE) as usize]
        .iter()
        .all(|&b| b == 0xFF));
}

#[test]
fn round_trip_copies_exactly_the_staged_bytes() {
    let table = table();
    let mut flash = flash();
    let body = image(5000, 7);
    let mut transport = ScriptedTransport::new().serve("a", Script::body(&body, 700));

    let mut session = ReflashSession::init(
        &mut flash,
        &mut transport,
        &table,
        RUNNING,
        config("a", 0x0, 0x2000),
    )
    .unwrap();
    session.download().unwrap();
    session.copy_to_region().unwrap();
    assert_eq!(session.state(), SessionState::Copied);
    session.finish();

    assert_eq!(&flash.data()[..5000], &body[..]);
    assert!(flash.data()[5000..0x2000].iter().all(|&b| b == 0xFF));
    assert_eq!(flash.overwrites(), 0);
}

#[test]
fn copy_erases_destination_before_first_write() {
    let table = table();
    let mut flash = flash();
    flash.data_mut()[..0x2000].fill(0x00);
    let body = image(3000, 3);
    let mut transport = ScriptedTransport::new().serve("a", Script::body(&body, 1024));

    let mut session = ReflashSession::init(
        &mut flash,
        &mut transport,
        &table,
        RUNNING,
        config("a", 0x0, 0x2000),
    )
    .unwrap();
    session.download().unwrap();
    session.copy_to_region().unwrap();
    session.finish();

    let ops = flash.ops();
    let erase = ops
        .iter()
        .position(|op| *op == FlashOp::Erase { addr: 0, len: 0x2000 })
        .expect("destination erased");
    let first_write = ops
        .iter()
        .position(|op| matches!(op, FlashOp::Write { addr, .. } if *addr < 0x2000))
        .expect("destination written");
    assert!(erase < first_write);
    assert_eq!(&flash.data()[..3000], &body[..]);
}

#[test]
fn overflowing_stream_fails_without_writing_the_offending_chunk() {
    let mut table = PartitionTable::new();
    table
        .push(Partition::new(PartitionKind::App(AppSubtype::Factory), FACTORY, SLOT_SIZE))
        .unwrap();
    table.push(Partition::ota(0, OTA_0, 0x1000)).unwrap();
    let mut flash = flash();
    let body = image(0x1000 + 100, 9);
    let mut transport = ScriptedTransport::new().serve("a", Script::body(&body, 1024));

    let mut session = ReflashSession::init(
        &mut flash,
        &mut transport,
        &table,
        RUNNING,
        config("a", 0x0, 0x8000),
    )
    .unwrap();
    assert_eq!(
        session.download(),
        Err(Error::SizeOverflow {
            required: 0x1000 + 100,
            capacity: 0x1000
        })
    );
    assert_eq!(session.state(), SessionState::Ready);
    session.finish();

    let writes = flash.writes();
    assert_eq!(writes.len(), 4);
    assert!(writes
        .iter()
        .all(|&(addr, len)| addr + len <= OTA_0 + 0x1000));
    assert_eq!(transport.closes(), 1);
}

#[test]
fn reconfigure_keeps_partition_and_appends() {
    let table = table();
    let mut flash = flash();
    let first = image(2000, 1);
    let second = image(1200, 2);
    let mut transport = ScriptedTransport::new()
        .serve("first", Script::body(&first, 512))
        .serve("second", Script::body(&second, 512));

    let mut session = ReflashSession::init(
        &mut flash,
        &mut transport,
        &table,
        RUNNING,
        config("first", 0x0, 0x1000),
    )
    .unwrap();
    session.download().unwrap();
    session.copy_to_region().unwrap();

    let mut session = session.reconfigure(config("second", 0x1000, 0x1000)).unwrap();
    assert_eq!(session.target().address, OTA_0);
    assert_eq!(session.download_cursor(), 2000);
    session.download().unwrap();
    assert_eq!(session.copy_cursor(), 2000);
    assert_eq!(session.download_cursor(), 3200);
    session.copy_to_region().unwrap();
    let summary = session.finish();
    assert_eq!(summary.downloads, 2);
    assert_eq!(summary.copies, 2);

    let staged = OTA_0 as usize;
    assert_eq!(&flash.data()[staged..staged + 2000], &first[..]);
    assert_eq!(&flash.data()[staged + 2000..staged + 3200], &second[..]);
    assert_eq!(&flash.data()[..2000], &first[..]);
    assert_eq!(&flash.data()[0x1000..0x1000 + 1200], &second[..]);
    // Only the initial partition erase touched the storage partition
    assert_eq!(
        flash
            .erases()
            .iter()
            .filter(|(addr, _)| *addr == OTA_0)
            .count(),
        1
    );
}

#[test]
fn reconfigure_swaps_partition_when_destination_overlaps() {
    let table = table();
    let mut flash = flash();
    let first = image(800, 1);
    let second = image(900, 2);
    let mut transport = ScriptedTransport::new()
        .serve("first", Script::body(&first, 1024))
        .serve("second", Script::body(&second, 1024));

    let mut session = ReflashSession::init(
        &mut flash,
        &mut transport,
        &table,
        RUNNING,
        config("first", 0x0, 0x1000),
    )
    .unwrap();
    session.download().unwrap();
    session.copy_to_region().unwrap();

    // The new destination is the current storage partition
    let mut session = session
        .reconfigure(config("second", OTA_0, 0x1000))
        .unwrap();
    assert_eq!(session.target().address, OTA_1);
    assert_eq!(session.download_cursor(), 0);
    assert_eq!(session.copy_cursor(), 0);
    session.download().unwrap();
    session.copy_to_region().unwrap();
    session.finish();

    assert!(flash.erases().contains(&(OTA_1, SLOT_SIZE)));
    assert_eq!(&flash.data()[OTA_0 as usize..OTA_0 as usize + 900], &second[..]);
    assert_eq!(flash.overwrites(), 0);
}

#[test]
fn reconfigure_with_explicit_target() {
    let table = table();
    let mut flash = flash();
    let mut transport = ScriptedTransport::new();
    let ota_1 = table.find_by_label("ota_1").unwrap().clone();

    let session = ReflashSession::init(
        &mut flash,
        &mut transport,
        &table,
        RUNNING,
        config("a", 0x0, 0x1000),
    )
    .unwrap();
    let session = session
        .reconfigure(config("b", 0x1000, 0x1000).with_target(ota_1.clone()))
        .unwrap();
    assert_eq!(session.target(), &ota_1);

    let result = session.reconfigure(config("c", OTA_1, 0x1000).with_target(ota_1));
    assert_eq!(result.err(), Some(Error::NoSuitablePartition));
}

#[test]
fn reconfigure_with_uncopied_download_is_rejected() {
    let table = table();
    let mut flash = flash();
    let mut transport =
        ScriptedTransport::new().serve("a", Script::body(&image(10, 0), 1024));

    let mut session = ReflashSession::init(
        &mut flash,
        &mut transport,
        &table,
        RUNNING,
        config("a", 0x0, 0x1000),
    )
    .unwrap();
    session.download().unwrap();
    let result = session.reconfigure(config("b", 0x1000, 0x1000));
    assert_eq!(
        result.err(),
        Some(Error::InvalidState(SessionState::Downloaded))
    );
}

#[test]
fn empty_body_never_reaches_the_destination() {
    let table = table();
    let mut flash = flash();
    flash.data_mut()[..0x1000].fill(0x42);
    let mut transport = ScriptedTransport::new().serve("a", Script::empty());

    let mut session = ReflashSession::init(
        &mut flash,
        &mut transport,
        &table,
        RUNNING,
        config("a", 0x0, 0x1000),
    )
    .unwrap();
    assert_eq!(session.download(), Ok(0));
    assert_eq!(
        session.copy_to_region(),
        Err(Error::InvalidState(SessionState::Downloaded))
    );
    session.finish();

    assert!(flash.data()[..0x1000].iter().all(|&b| b == 0x42));
    assert_eq!(flash.erases(), vec![(OTA_0, SLOT_SIZE)]);
    assert!(flash.writes().is_empty());
}

#[test]
fn explicit_target_works_when_running_from_ram() {
    let table = table();
    let mut flash = flash();
    let body = image(3000, 4);
    let mut transport = ScriptedTransport::new().serve("a", Script::body(&body, 512));
    let ota_1 = table.find_by_label("ota_1").unwrap().clone();

    let mut session = ReflashSession::init(
        &mut flash,
        &mut transport,
        &table,
        0x3F00_0000,
        config("a", 0x0, 0x1000).with_target(ota_1),
    )
    .unwrap();
    assert_eq!(session.target().address, OTA_1);
    session.download().unwrap();
    session.copy_to_region().unwrap();
    session.finish();

    assert_eq!(&flash.data()[..3000], &body[..]);
}

#[test]
fn every_slot_overlapping_is_no_suitable_partition() {
    let table = table();
    let mut flash = flash();
    let mut transport = ScriptedTransport::new();

    let result = ReflashSession::init(
        &mut flash,
        &mut transport,
        &table,
        RUNNING,
        config("a", OTA_0, 2 * SLOT_SIZE),
    );
    assert_eq!(result.err(), Some(Error::NoSuitablePartition));
    assert!(flash.ops().is_empty());
}

#[test]
fn transport_failures_map_to_errors_and_close() {
    let table = table();
    let mut flash = flash();
    let mut transport = ScriptedTransport::new()
        .serve("missing", Script::empty().with_status(404))
        .serve(
            "reset",
            Script::body(&image(100, 0), 1024).then(Step::Fail(ErrorKind::ConnectionReset)),
        )
        .serve(
            "broken",
            Script::body(&[], 1).first(Step::Fail(ErrorKind::InvalidData)),
        )
        .serve(
            "cut",
            Script::body(&image(300, 0), 1024)
                .first(Step::Idle)
                .then(Step::Disconnect),
        )
        .serve("ok", Script::body(&image(50, 0), 1024));

    let mut session = ReflashSession::init(
        &mut flash,
        &mut transport,
        &table,
        RUNNING,
        config("nowhere", 0x0, 0x1000),
    )
    .unwrap();
    assert_eq!(session.download(), Err(Error::TransportOpenFailure));

    let mut session = session.reconfigure(config("missing", 0x0, 0x1000)).unwrap();
    assert_eq!(
        session.download(),
        Err(Error::TransportProtocolFailure { status: 404 })
    );

    let mut session = session.reconfigure(config("reset", 0x0, 0x1000)).unwrap();
    assert_eq!(
        session.download(),
        Err(Error::TransportReadFailure(ReadFailure::ConnectionClosed {
            received: 100
        }))
    );
    // Spoiled bytes are skipped
    assert_eq!(session.download_cursor(), 100);

    let mut session = session.reconfigure(config("broken", 0x0, 0x1000)).unwrap();
    assert_eq!(
        session.download(),
        Err(Error::TransportReadFailure(ReadFailure::Stream { received: 0 }))
    );

    let mut session = session.reconfigure(config("cut", 0x0, 0x1000)).unwrap();
    assert_eq!(
        session.download(),
        Err(Error::TransportReadFailure(ReadFailure::Incomplete {
            received: 300
        }))
    );
    assert_eq!(session.download_cursor(), 400);

    let mut session = session.reconfigure(config("ok", 0x0, 0x1000)).unwrap();
    assert_eq!(session.download(), Ok(50));
    assert_eq!(session.copy_cursor(), 400);
    session.copy_to_region().unwrap();
    session.finish();

    assert_eq!(flash.overwrites(), 0);
    assert_eq!(transport.closes(), 6);
}

#[test]
fn truncated_body_is_incomplete() {
    let table = table();
    let mut flash = flash();
    let mut transport =
        ScriptedTransport::new().serve("a", Script::body(&image(64, 0), 1024).truncated());

    let mut session = ReflashSession::init(
        &mut flash,
        &mut transport,
        &table,
        RUNNING,
        config("a", 0x0, 0x1000),
    )
    .unwrap();
    assert_eq!(
        session.download(),
        Err(Error::TransportReadFailure(ReadFailure::Incomplete {
            received: 64
        }))
    );
}

#[test]
fn flash_failures_carry_addresses() {
    let table = table();
    let mut flash = flash();
    flash.inject(Fault::Read(OTA_0 + 1024));
    let mut transport = ScriptedTransport::new().serve("a", Script::body(&image(2000, 0), 1024));

    let mut session = ReflashSession::init(
        &mut flash,
        &mut transport,
        &table,
        RUNNING,
        config("a", 0x0, 0x1000),
    )
    .unwrap();
    session.download().unwrap();
    assert_eq!(
        session.copy_to_region(),
        Err(Error::FlashReadFailure { addr: OTA_0 + 1024 })
    );
    // A failed copy may be retried
    assert_eq!(session.state(), SessionState::Downloaded);
    session.copy_to_region().unwrap();
    session.finish();

    flash.inject(Fault::Erase(OTA_1));
    let mut transport = ScriptedTransport::new();
    let result = ReflashSession::init(
        &mut flash,
        &mut transport,
        &table,
        OTA_0 + 0x100,
        config("a", 0x0, 0x1000),
    );
    assert_eq!(
        result.err(),
        Some(Error::FlashEraseFailure {
            addr: OTA_1,
            len: SLOT_SIZE
        })
    );
}

#[test]
#[should_panic(expected = "partition table is invalid or corrupt")]
fn running_outside_any_app_partition_panics() {
    let table = table();
    let mut flash = flash();
    let mut transport = ScriptedTransport::new();

    let _ = ReflashSession::init(
        &mut flash,
        &mut transport,
        &table,
        0x8000,
        config("a", 0x0, 0x1000),
    );
}

#[derive(Default)]
struct Recorder {
    events: Vec<String>,
}

impl reflasher_core::progress::ReflashProgress for Recorder {
    fn downloading(&mut self, total_hint: Option<u32>) {
        self.events.push(format!("downloading {:?}", total_hint));
    }
    fn download_progress(&mut self, bytes_written: u32) {
        self.events.push(format!("downloaded {}", bytes_written));
    }
    fn erasing(&mut self, len: u32) {
        self.events.push(format!("erasing {}", len));
    }
    fn copying(&mut self, total: u32) {
        self.events.push(format!("copying {}", total));
    }
    fn copy_progress(&mut self, bytes_copied: u32) {
        self.events.push(format!("copied {}", bytes_copied));
    }
    fn complete(&mut self, bytes: u32) {
        self.events.push(format!("complete {}", bytes));
    }
}

#[test]
fn progress_callbacks_follow_the_transfer() {
    let table = table();
    let mut flash = flash();
    let mut transport = ScriptedTransport::new().serve("a", Script::body(&image(1500, 0), 4096));
    let mut progress = Recorder::default();

    let mut session = ReflashSession::init(
        &mut flash,
        &mut transport,
        &table,
        RUNNING,
        config("a", 0x0, 0x1000),
    )
    .unwrap();
    session.download_with_progress(&mut progress).unwrap();
    session.copy_to_region_with_progress(&mut progress).unwrap();
    session.finish();

    assert_eq!(
        progress.events,
        [
            "downloading Some(1500)",
            "downloaded 1024",
            "downloaded 1500",
            "complete 1500",
            "erasing 4096",
            "copying 1500",
            "copied 1024",
            "copied 1500",
            "complete 1500",
        ]
    );
}
