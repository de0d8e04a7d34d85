//! The periodic read-and-report cycle, kept behind trait seams so the loop
//! logic runs against fakes on the host.

use heapless::Vec;

use crate::config::DeviceTable;
use crate::error::SensorError;
use crate::homeseer::format_value;
use crate::onewire::SensorAddress;

pub const MAX_SENSORS: usize = 8;

/// Something that can trigger a conversion and hand back temperatures.
pub trait TemperatureSource {
    async fn start_conversion(&mut self) -> Result<(), SensorError>;
    async fn read_temperature(&mut self, address: &SensorAddress) -> Result<f32, SensorError>;
}

/// Something that delivers one formatted value to one device reference.
pub trait UpdateSink {
    async fn send_update(&mut self, device_ref: u32, value: &str) -> Result<(), SensorError>;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub struct CycleOutcome {
    pub sent: usize,
    pub failed: usize,
}

impl CycleOutcome {
    pub fn all_sent(&self) -> bool {
        self.failed == 0
    }
}

/// Runs one reporting cycle: `samples` conversions averaged per sensor, then
/// one update per device entry, in table order.
///
/// A sensor read error aborts the whole cycle; the caller retries on its
/// next iteration. A failed update is counted and the remaining sensors
/// still report.
pub async fn report_cycle<S, U>(
    devices: &DeviceTable<'_>,
    source: &mut S,
    sink: &mut U,
    samples: u32,
) -> Result<CycleOutcome, SensorError>
where
    S: TemperatureSource,
    U: UpdateSink,
{
    let samples = samples.max(1);
    let mut sums: Vec<f32, MAX_SENSORS> = Vec::new();
    sums.resize(devices.len(), 0.0)
        .map_err(|_| SensorError::BufferOverflow)?;

    for _ in 0..samples {
        source.start_conversion().await?;
        for (slot, entry) in sums.iter_mut().zip(devices.iter()) {
            *slot += source.read_temperature(&entry.address).await?;
        }
    }

    let mut outcome = CycleOutcome::default();
    for (slot, entry) in sums.iter().zip(devices.iter()) {
        let value = format_value(slot / samples as f32)?;
        match sink.send_update(entry.device_ref, &value).await {
            Ok(()) => outcome.sent += 1,
            Err(_) => outcome.failed += 1,
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceEntry;
    use embassy_futures::block_on;

    const A: SensorAddress = SensorAddress([0x28, 0xA5, 0x4D, 0xCA, 0x18, 0x25, 0x30, 0x61]);
    const B: SensorAddress = SensorAddress([0x28, 0xBB, 0x1D, 0x6D, 0x13, 0x2C, 0xDE, 0x16]);
    const C: SensorAddress = SensorAddress([0x28, 0xD6, 0x23, 0x7B, 0x2E, 0xD9, 0x1E, 0xEA]);

    const ENTRIES: [DeviceEntry; 3] = [
        DeviceEntry {
            label: "Nr 0",
            address: A,
            device_ref: 9001,
        },
        DeviceEntry {
            label: "Nr 1",
            address: B,
            device_ref: 9002,
        },
        DeviceEntry {
            label: "Nr 2",
            address: C,
            device_ref: 9003,
        },
    ];

    struct FakeSource {
        readings: std::vec::Vec<(SensorAddress, f32)>,
        conversions: u32,
        fail_reads: bool,
    }

    impl FakeSource {
        fn with(readings: &[(SensorAddress, f32)]) -> Self {
            Self {
                readings: readings.to_vec(),
                conversions: 0,
                fail_reads: false,
            }
        }
    }

    impl TemperatureSource for FakeSource {
        async fn start_conversion(&mut self) -> Result<(), SensorError> {
            self.conversions += 1;
            Ok(())
        }

        async fn read_temperature(&mut self, address: &SensorAddress) -> Result<f32, SensorError> {
            if self.fail_reads {
                return Err(SensorError::CrcMismatch);
            }
            self.readings
                .iter()
                .find(|(a, _)| a == address)
                .map(|(_, t)| *t)
                .ok_or(SensorError::NoDevices)
        }
    }

    struct RecordingSink {
        updates: std::vec::Vec<(u32, std::string::String)>,
        fail_ref: Option<u32>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                updates: std::vec::Vec::new(),
                fail_ref: None,
            }
        }
    }

    impl UpdateSink for RecordingSink {
        async fn send_update(&mut self, device_ref: u32, value: &str) -> Result<(), SensorError> {
            if self.fail_ref == Some(device_ref) {
                return Err(SensorError::Network);
            }
            self.updates.push((device_ref, value.into()));
            Ok(())
        }
    }

    #[test]
    fn reports_every_sensor_once_in_table_order() {
        let table = DeviceTable::new(&ENTRIES);
        let mut source = FakeSource::with(&[(A, 21.5), (B, 22.0), (C, 19.75)]);
        let mut sink = RecordingSink::new();

        let outcome = block_on(report_cycle(&table, &mut source, &mut sink, 1)).unwrap();

        assert_eq!(outcome, CycleOutcome { sent: 3, failed: 0 });
        assert_eq!(
            sink.updates,
            [
                (9001, "21.50".into()),
                (9002, "22.00".into()),
                (9003, "19.75".into()),
            ]
        );
    }

    #[test]
    fn averages_across_sample_cycles() {
        let entries = [ENTRIES[0]];
        let table = DeviceTable::new(&entries);
        let mut sink = RecordingSink::new();

        struct Ramp {
            next: f32,
        }
        impl TemperatureSource for Ramp {
            async fn start_conversion(&mut self) -> Result<(), SensorError> {
                Ok(())
            }
            async fn read_temperature(
                &mut self,
                _address: &SensorAddress,
            ) -> Result<f32, SensorError> {
                let t = self.next;
                self.next += 1.0;
                Ok(t)
            }
        }

        // Samples 20, 21, 22, 23 average to 21.5.
        let mut source = Ramp { next: 20.0 };
        let outcome = block_on(report_cycle(&table, &mut source, &mut sink, 4)).unwrap();

        assert_eq!(outcome.sent, 1);
        assert_eq!(sink.updates, [(9001, "21.50".into())]);
    }

    #[test]
    fn one_conversion_per_sample_cycle() {
        let table = DeviceTable::new(&ENTRIES);
        let mut source = FakeSource::with(&[(A, 1.0), (B, 2.0), (C, 3.0)]);
        let mut sink = RecordingSink::new();

        block_on(report_cycle(&table, &mut source, &mut sink, 5)).unwrap();
        assert_eq!(source.conversions, 5);
        assert_eq!(sink.updates.len(), 3);
    }

    #[test]
    fn read_error_aborts_the_cycle() {
        let table = DeviceTable::new(&ENTRIES);
        let mut source = FakeSource::with(&[(A, 1.0), (B, 2.0), (C, 3.0)]);
        source.fail_reads = true;
        let mut sink = RecordingSink::new();

        let result = block_on(report_cycle(&table, &mut source, &mut sink, 1));
        assert_eq!(result, Err(SensorError::CrcMismatch));
        assert!(sink.updates.is_empty());
    }

    #[test]
    fn failed_update_does_not_stop_the_others() {
        let table = DeviceTable::new(&ENTRIES);
        let mut source = FakeSource::with(&[(A, 21.5), (B, 22.0), (C, 19.75)]);
        let mut sink = RecordingSink::new();
        sink.fail_ref = Some(9002);

        let outcome = block_on(report_cycle(&table, &mut source, &mut sink, 1)).unwrap();

        assert_eq!(outcome, CycleOutcome { sent: 2, failed: 1 });
        assert!(!outcome.all_sent());
        assert_eq!(
            sink.updates,
            [(9001, "21.50".into()), (9003, "19.75".into())]
        );
    }
}
