//! End-to-end walks through a session against the in-memory backend.

use fpdev::gateway::mock::{MockBackend, MockBoard, PipeCall, PipeDirection};
use fpdev::{Device, DeviceInfo, Error, IntoStatus, SdkError, enumerate};

fn loopback_session() -> (MockBackend, Device<MockBackend>) {
    let backend = MockBackend::new().with_board(MockBoard::new("S1").with_device_id("loop"));
    let mut device = Device::new(backend.clone());
    device.open("S1", None).unwrap();
    (backend, device)
}

#[test]
fn wire_in_on_empty_session() {
    let mut device = Device::new(MockBackend::new());
    assert_eq!(device.set_wire_in(0x00, 0xDEAD_BEEF, false).into_status(), -105);
}

#[test]
fn ragged_write_is_padded_to_one_call() {
    let (backend, mut device) = loopback_session();
    let data = vec![0x5au8; 1500];

    assert_eq!(device.write_pipe(0x80, &data, 1024).into_status(), 2048);
    assert_eq!(
        backend.pipe_calls(),
        vec![PipeCall {
            direction: PipeDirection::In,
            address: 0x80,
            block_size: 1024,
            len: 2048,
        }]
    );

    let sent: Vec<u8> = backend.board("S1").unwrap().loopback.into_iter().collect();
    assert_eq!(&sent[..1500], &data[..]);
    assert!(sent[1500..].iter().all(|&b| b == 0));
}

#[test]
fn ragged_read_reports_requested_length() {
    let (backend, mut device) = loopback_session();
    let block: Vec<u8> = (0..1024).map(|i| (i % 251) as u8).collect();
    device.write_pipe(0x80, &block, 1024).unwrap();

    let mut dst = vec![0u8; 700];
    assert_eq!(device.read_pipe(0x81, &mut dst, 1024).into_status(), 700);
    assert_eq!(dst, block[..700]);

    let last = *backend.pipe_calls().last().unwrap();
    assert_eq!(last.direction, PipeDirection::Out);
    assert_eq!(last.len, 1024);
}

#[test]
fn failed_ragged_read_leaves_destination_alone() {
    let (backend, mut device) = loopback_session();
    device.write_pipe(0x80, &[0x11u8; 1024], 1024).unwrap();

    let mut dst = vec![0xeeu8; 700];
    backend.fail_next(SdkError::FileError);
    let result = device.read_pipe(0x81, &mut dst, 1024);
    assert_eq!(result, Err(Error::Sdk(SdkError::FileError)));
    assert_eq!(result.into_status(), -7);
    assert!(dst.iter().all(|&b| b == 0xee));
    assert!(device.is_open());
}

#[test]
fn zero_block_size_is_rejected_before_the_gateway() {
    let (backend, mut device) = loopback_session();
    let mut dst = [0u8; 4];
    assert_eq!(
        device.write_pipe(0x80, &[1, 2, 3], 0),
        Err(Error::Sdk(SdkError::InvalidBlockSize))
    );
    assert_eq!(device.read_pipe(0xa0, &mut dst, 0).into_status(), -10);
    assert!(backend.pipe_calls().is_empty());
}

#[test]
fn listing_skips_boards_that_refuse_to_open() {
    let backend = MockBackend::new()
        .with_board(MockBoard::new("A").with_device_id("alpha"))
        .with_board(MockBoard::new("B").unopenable());

    let devices = enumerate::list_devices(&backend);
    assert_eq!(
        devices,
        vec![DeviceInfo {
            serial: "A".to_string(),
            device_id: "alpha".to_string(),
        }]
    );
    assert_eq!(enumerate::list_serials(&backend), vec!["A", "B"]);

    assert_eq!(backend.live_handles(), 0);
    assert_eq!(backend.board("A").unwrap().open_handles, 0);
}

#[test]
fn listing_does_not_disturb_an_open_session() {
    let backend = MockBackend::new()
        .with_board(MockBoard::new("A"))
        .with_board(MockBoard::new("B"));
    let mut device = Device::new(backend.clone());
    device.open("A", None).unwrap();

    assert_eq!(enumerate::list_devices(&backend).len(), 2);
    assert!(device.is_open());
    assert_eq!(backend.live_handles(), 1);
    assert_eq!(backend.board("A").unwrap().open_handles, 1);
}

#[test]
fn status_channel_matches_error_codes() {
    let (backend, mut device) = loopback_session();
    device.set_wire_in(0x07, 0x8000_0000, true).unwrap();
    assert_eq!(device.get_wire_out(0x27, true).into_status(), 0x8000_0000);

    backend.fail_next(SdkError::UnsupportedFeature);
    let status = device.read_register(0).into_status();
    assert!(status < 0);
    assert_eq!(status, i64::from(SdkError::UnsupportedFeature.code()));
}
