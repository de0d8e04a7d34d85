#![no_std]
#![no_main]

use core::net::Ipv4Addr;

use defmt::{error, info};
use ds_sensor::config::{DeviceEntry, DeviceTable, NetConfig, ServerConfig};
use ds_sensor::homeseer::http_client::HttpClient;
use ds_sensor::led::StatusLed;
use ds_sensor::onewire::ds18x20::Ds18x20;
use ds_sensor::onewire::{OneWireBus, SensorAddress};
use ds_sensor::report::report_cycle;
use ds_sensor::wifi;
use embassy_executor::Spawner;
use embassy_net::tcp::TcpSocket;
use embassy_time::{Duration, Timer};
use esp_alloc as _;
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_hal::gpio::{DriveMode, Flex, Level, Output, OutputConfig, Pull};
use esp_hal::timer::systimer::SystemTimer;

const SSID: &str = env!("SSID");
const WIFI_KEY: &str = env!("WIFI_KEY");
const HOMESEER_ADDRESS: &str = env!("HOMESEER_ADDRESS");
const HOMESEER_PORT: &str = env!("HOMESEER_PORT");

/// Conversions averaged into one reported value.
const SAMPLE_CYCLES: u32 = 5;
/// Pause between reporting cycles.
const REPORT_INTERVAL: Duration = Duration::from_secs(3);

// Sensor addresses are printed at startup; watch the log on first boot, label
// each sensor by warming it while watching the readings, then fill in this
// table together with the HomeSeer device references to write to.
static DEVICES: [DeviceEntry; 3] = [
    DeviceEntry {
        label: "Nr 0",
        address: SensorAddress([0x28, 0xA5, 0x4D, 0xCA, 0x18, 0x25, 0x30, 0x61]),
        device_ref: 9001,
    },
    DeviceEntry {
        label: "Nr 1",
        address: SensorAddress([0x28, 0xBB, 0x1D, 0x6D, 0x13, 0x2C, 0xDE, 0x16]),
        device_ref: 9002,
    },
    DeviceEntry {
        label: "Nr 2",
        address: SensorAddress([0x28, 0xD6, 0x23, 0x7B, 0x2E, 0xD9, 0x1E, 0xEA]),
        device_ref: 9003,
    },
];

#[panic_handler]
fn panic(_: &core::panic::PanicInfo) -> ! {
    loop {}
}

extern crate alloc;

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    rtt_target::rtt_init_defmt!();

    let peripherals = esp_hal::init(esp_hal::Config::default().with_cpu_clock(CpuClock::max()));

    esp_alloc::heap_allocator!(size: 72 * 1024);

    let timer0 = SystemTimer::new(peripherals.SYSTIMER);
    esp_hal_embassy::init(timer0.alarm0);

    info!("Embassy initialized!");

    let mut red = StatusLed::new(Output::new(
        peripherals.GPIO16,
        Level::Low,
        OutputConfig::default(),
    ));
    let mut green = StatusLed::new(Output::new(
        peripherals.GPIO17,
        Level::Low,
        OutputConfig::default(),
    ));
    green.blink(10, 100).await;

    let net = NetConfig {
        ssid: SSID,
        password: WIFI_KEY,
    };
    let server = ServerConfig {
        address: HOMESEER_ADDRESS.parse::<Ipv4Addr>().unwrap(),
        port: HOMESEER_PORT.parse().unwrap(),
    };

    let (controller, stack, runner) =
        wifi::setup_wifi(peripherals.WIFI, peripherals.RNG, peripherals.TIMG0).unwrap();
    spawner.spawn(wifi::connection(controller, net)).ok();
    spawner.spawn(wifi::net_task(runner)).ok();

    // One-wire data line, open drain with the internal pull-up. An external
    // 4.7k pull-up is still recommended with more than one sensor.
    let mut ow_pin = Flex::new(peripherals.GPIO4);
    ow_pin.apply_output_config(
        &OutputConfig::default()
            .with_drive_mode(DriveMode::OpenDrain)
            .with_pull(Pull::Up),
    );
    ow_pin.set_high();
    ow_pin.set_input_enable(true);
    ow_pin.set_output_enable(true);

    info!("Scanning one-wire bus...");
    let mut sensors = Ds18x20::new(OneWireBus::new(ow_pin, Delay::new()));
    let devices = DeviceTable::new(&DEVICES);
    let fatal = match sensors.scan() {
        Ok(found) => {
            for address in &found {
                info!("Found sensor: {}", address);
            }
            devices.validate(&found).err()
        }
        Err(e) => Some(e),
    };
    if let Some(e) = fatal {
        // Configuration and bus faults need an operator; flag them instead
        // of reporting bogus values.
        error!("Sensor setup failed: {}", e);
        loop {
            red.blink(1, 2000).await;
        }
    }
    green.blink(2, 500).await;

    loop {
        info!("checking link state");
        if stack.is_link_up() {
            break;
        }
        red.blink(1, 500).await;
        Timer::after(Duration::from_millis(500)).await;
    }

    loop {
        if let Some(config) = stack.config_v4() {
            info!("Got IP: {}", config.address);
            info!("Gateway: {}", config.gateway);
            break;
        }
        Timer::after(Duration::from_millis(1000)).await;
    }
    red.off();

    let mut rx_buffer = [0; 4096];
    let mut tx_buffer = [0; 4096];
    let mut socket = TcpSocket::new(stack, &mut rx_buffer, &mut tx_buffer);
    socket.set_timeout(Some(embassy_time::Duration::from_secs(10)));
    let mut client = HttpClient::new(
        socket,
        (server.address, server.port),
        server.host_header().unwrap(),
    );

    loop {
        match report_cycle(&devices, &mut sensors, &mut client, SAMPLE_CYCLES).await {
            Ok(outcome) if outcome.all_sent() => {
                info!("Reported {} sensors", outcome.sent);
                green.blink(2, 200).await;
            }
            Ok(outcome) => {
                error!("{} of {} updates failed", outcome.failed, devices.len());
                red.blink(5, 200).await;
            }
            Err(e) => {
                error!("Error in reading: {}", e);
                red.blink(5, 200).await;
            }
        }
        Timer::after(REPORT_INTERVAL).await;
    }
}
