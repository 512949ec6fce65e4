//! Drives a `MockDriver` through a render callback and checks that the
//! interleaved output it captures matches what a `DiskWriter` would flush to
//! disk for the same frames (§4.8 duplex driver contract, §4.4 DiskWriter).

use ae_audio::{AudioBuffer, AudioDriver, DiskWriter, MockDriver};

#[test]
fn mock_driver_pump_feeds_disk_writer_consistently() {
    let mut driver = MockDriver::new();
    driver
        .start_render(Box::new(|input, output| {
            for (o, i) in output.iter_mut().zip(input.iter()) {
                *o = i * 0.5;
            }
        }))
        .unwrap();

    let input = vec![1.0, -1.0, 0.5, -0.5, 0.25, -0.25, 1.0, -1.0];
    let output = driver.pump(&input, 4, 2);
    assert_eq!(driver.captured_output, output);

    let dir = tempfile::tempdir().unwrap();
    let mut writer = DiskWriter::new(dir.path(), 2, 4);
    let mut buffer = AudioBuffer::new(2, 4);
    for frame in 0..4 {
        buffer.channel_mut(0)[frame] = output[frame * 2];
        buffer.channel_mut(1)[frame] = output[frame * 2 + 1];
    }
    let appended = writer.append(&buffer);
    assert_eq!(appended, 4);
    assert!(writer.is_full());

    let path = writer.flush(48_000).unwrap();
    assert!(path.exists());
}

#[test]
fn mock_driver_read_input_is_exhausted_before_silence() {
    let mut driver = MockDriver::new();
    driver.feed_input(&[0.1, 0.2, 0.3, 0.4]);

    let mut buf = vec![9.0; 4];
    let read = driver.read_input(&mut buf, 4).unwrap();
    assert_eq!(read, 4);
    assert_eq!(buf, vec![0.1, 0.2, 0.3, 0.4]);

    let mut buf = vec![9.0; 4];
    let read = driver.read_input(&mut buf, 4).unwrap();
    assert_eq!(read, 0, "feed is exhausted, no frames left to read");
}
