#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_net::StackResources;
use embassy_time::{Delay, Duration, Instant, Timer};
use esp_hal::analog::adc::{Adc, AdcConfig, Attenuation};
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::rng::Rng;
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use log::{error, info};
use static_cell::StaticCell;
use tankmon_core::channel::LevelChannel;
use tankmon_core::config::{CalibrationConfig, LoopTiming, NodeConfig};
use tankmon_core::connectivity::ConnectivityManager;
use tankmon_core::display::LevelDisplay;
use tankmon_core::sampling::SampleLoop;
use tankmon_core::telemetry::TelemetryState;
use tankmon_firmware::lcd::{I2cLcd, LCD_ADDRESS};
use tankmon_firmware::sensor::AdcLevelSensor;
use tankmon_firmware::web::http_worker;
use tankmon_firmware::wifi::{
    WifiLink, access_point_net_config, net_task, station_net_config, station_report_task,
};
use tankmon_firmware::wifi_secrets;

type Lcd = I2cLcd<I2c<'static, esp_hal::Async>, Delay>;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

static LEVEL_CHANNEL: LevelChannel = LevelChannel::new();
static TELEMETRY: StaticCell<TelemetryState> = StaticCell::new();
static RADIO: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
static AP_RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();
static STA_RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized!");

    let node = NodeConfig {
        station: wifi_secrets::station(),
        access_point: wifi_secrets::access_point(),
        calibration: CalibrationConfig::default(),
    };
    node.validate().expect("Invalid network configuration");
    let timing = LoopTiming::default();

    // Display first so the splash is up during the radio bring-up.
    let i2c = I2c::new(
        peripherals.I2C0,
        I2cConfig::default().with_frequency(Rate::from_khz(100)),
    )
    .expect("Failed to configure I2C")
    .with_sda(peripherals.GPIO12)
    .with_scl(peripherals.GPIO11)
    .into_async();

    let mut lcd = I2cLcd::new(i2c, Delay, LCD_ADDRESS);
    if let Err(e) = lcd.init().await {
        error!("LCD init failed: {:?}", e);
    }
    let mut display = LevelDisplay::new(lcd);
    if let Err(e) = display.show_splash().await {
        error!("Splash failed: {:?}", e);
    }

    let indicator = Output::new(peripherals.GPIO2, Level::Low, OutputConfig::default());

    let mut adc_config = AdcConfig::new();
    let level_pin = adc_config.enable_pin(peripherals.GPIO4, Attenuation::_11dB);
    let adc = Adc::new(peripherals.ADC1, adc_config);
    let sensor = AdcLevelSensor::new(adc, level_pin);

    let radio = RADIO.init(esp_radio::init().expect("Failed to initialize Wi-Fi/BLE controller"));
    let (controller, interfaces) = esp_radio::wifi::new(radio, peripherals.WIFI, Default::default())
        .expect("Failed to initialize Wi-Fi controller");

    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;

    let (ap_stack, ap_runner) = embassy_net::new(
        interfaces.ap,
        access_point_net_config(&node.access_point),
        AP_RESOURCES.init(StackResources::new()),
        seed,
    );
    let (sta_stack, sta_runner) = embassy_net::new(
        interfaces.sta,
        station_net_config(),
        STA_RESOURCES.init(StackResources::new()),
        seed ^ 0x5A5A_5A5A,
    );
    spawner.spawn(net_task(ap_runner)).expect("ap net_task spawn");
    spawner.spawn(net_task(sta_runner)).expect("sta net_task spawn");
    spawner
        .spawn(station_report_task(sta_stack))
        .expect("station_report_task spawn");

    let mut connectivity = ConnectivityManager::new(
        WifiLink::new(controller, sta_stack),
        indicator,
        timing.reconnect_interval_ms,
    );
    if let Err(e) = connectivity.initialize(
        &node.access_point,
        &node.station,
        Instant::now().as_millis(),
    ) {
        panic!("Node bring-up failed: {}", e);
    }
    connectivity
        .wait_for_link(timing.startup_attempts, timing.startup_retry_delay_ms, &mut Delay)
        .await;

    let telemetry: &'static TelemetryState = TELEMETRY.init(TelemetryState::new(node.calibration));
    spawner
        .spawn(http_worker(ap_stack, telemetry, "ap"))
        .expect("ap http_worker spawn");
    spawner
        .spawn(http_worker(sta_stack, telemetry, "sta"))
        .expect("sta http_worker spawn");

    Timer::after(Duration::from_secs(1)).await;
    if let Err(e) = display.show_header().await {
        error!("Header failed: {:?}", e);
    }
    spawner
        .spawn(display_task(display, &LEVEL_CHANNEL))
        .expect("display_task spawn");

    info!("Sampling started");
    let mut sampler = SampleLoop::new(sensor, telemetry, &LEVEL_CHANNEL, connectivity, timing);
    sampler.run().await
}

#[embassy_executor::task]
async fn display_task(mut display: LevelDisplay<Lcd>, channel: &'static LevelChannel) {
    display.run(channel).await
}
