#![no_main]

use libfuzzer_sys::fuzz_target;
use multiboot_protocol::core::image::Image;
use multiboot_protocol::protocol::exchanger::{PollPolicy, WordExchanger};
use multiboot_protocol::transport::emulated::{DeviceSettings, EmulatedDevice};
use multiboot_protocol::utils::clock::ManualClock;
use multiboot_protocol::Multiboot;
use std::time::Duration;

fuzz_target!(|data: &[u8]| {
    // First two bytes pick the peer's keys, the rest is the image.
    if data.len() < 2 {
        return;
    }
    let settings = DeviceSettings {
        key_byte: data[0],
        finalizer_byte: data[1],
        ..DeviceSettings::default()
    };

    let Ok(image) = Image::from_bytes(data[2..].to_vec()) else {
        return;
    };

    let policy = PollPolicy {
        interval: Duration::from_millis(10),
        timeout: Some(Duration::from_secs(1)),
        max_attempts: None,
    };
    let exchanger =
        WordExchanger::with_clock(EmulatedDevice::new(settings), ManualClock::new()).with_policy(policy);
    let mut session = Multiboot::with_exchanger(exchanger);

    let report = session.run(&image).expect("emulated peer never rejects a valid image");
    assert!(report.checksum_matches());
    assert_eq!(session.into_transport().verdict(), Some(true));
});
