//! Desktop simulator for the tankmon tank level telemetry node.
//!
//! Runs the tankmon-core sample loop against synthetic hardware: a tank that
//! slowly fills and drains past both calibration points, a console LCD, a
//! status LED that logs its state, and an upstream network that drops out on
//! a fixed schedule. The telemetry endpoint is served on a real TCP socket.
//!
//! # Environment
//!
//! | Variable           | Meaning                                   |
//! |--------------------|-------------------------------------------|
//! | `TANKMON_CONFIG`   | Path to a JSON node configuration         |
//! | `TANKMON_HTTP_ADDR`| Listen address (default `127.0.0.1:8080`) |
//! | `RUST_LOG`         | `env_logger` filter, e.g. `info`          |

use std::convert::Infallible;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::{Duration, Instant};

use embassy_futures::block_on;
use embedded_hal::digital::{ErrorType, OutputPin};
use log::{debug, error, info, warn};

use tankmon_core::calibration::{ADC_MAX, RawSample};
use tankmon_core::channel::LevelChannel;
use tankmon_core::config::{AccessPointConfig, LoopTiming, NodeConfig, StationConfig};
use tankmon_core::connectivity::{ConnectivityManager, StationLink};
use tankmon_core::display::{DISPLAY_COLUMNS, DISPLAY_ROWS, DisplaySink, LevelDisplay};
use tankmon_core::error::{NodeError, SensorError};
use tankmon_core::http::{MAX_REQUEST_SIZE, head_complete};
use tankmon_core::sampling::{LevelSensor, SampleLoop};
use tankmon_core::telemetry::{TELEMETRY_PATH, TelemetryService, TelemetryState};

const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8080";

/// Seconds for one full fill and drain of the simulated tank.
const TANK_CYCLE_SECS: f64 = 60.0;

/// Upstream outage schedule: down for `OUTAGE_SECS` at the end of every period.
const OUTAGE_PERIOD_SECS: u64 = 30;
const OUTAGE_SECS: u64 = 8;

/// Time an association takes before the link reports up.
const ASSOCIATION_DELAY: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Simulated hardware
// ---------------------------------------------------------------------------

/// Float sensor over a tank that fills and drains sinusoidally.
///
/// The swing deliberately exceeds the default calibration range on both ends
/// so the clamp is exercised.
struct SimulatedTank {
    start: Instant,
}

impl LevelSensor for SimulatedTank {
    fn read_raw(&mut self) -> Result<RawSample, SensorError> {
        let t = self.start.elapsed().as_secs_f64();
        let phase = t / TANK_CYCLE_SECS * core::f64::consts::TAU;
        let raw = 2875.0 - 1200.0 * phase.cos();
        Ok((raw.max(0.0) as RawSample).min(ADC_MAX))
    }
}

/// 16x2 character grid that logs whenever its contents change.
struct ConsoleLcd {
    rows: [[u8; DISPLAY_COLUMNS as usize]; DISPLAY_ROWS as usize],
    cursor: (usize, usize),
    shown: String,
}

impl ConsoleLcd {
    fn new() -> Self {
        Self {
            rows: [[b' '; DISPLAY_COLUMNS as usize]; DISPLAY_ROWS as usize],
            cursor: (0, 0),
            shown: String::new(),
        }
    }

    fn render(&self) -> String {
        self.rows
            .iter()
            .map(|row| String::from_utf8_lossy(row).into_owned())
            .collect::<Vec<_>>()
            .join(" | ")
    }

    fn refresh(&mut self) {
        let frame = self.render();
        if frame != self.shown {
            info!("LCD [{}]", frame);
            self.shown = frame;
        }
    }
}

impl DisplaySink for ConsoleLcd {
    type Error = Infallible;

    async fn clear(&mut self) -> Result<(), Infallible> {
        self.rows = [[b' '; DISPLAY_COLUMNS as usize]; DISPLAY_ROWS as usize];
        self.cursor = (0, 0);
        Ok(())
    }

    async fn set_cursor(&mut self, col: u8, row: u8) -> Result<(), Infallible> {
        self.cursor = (col as usize, row as usize);
        Ok(())
    }

    async fn print(&mut self, text: &str) -> Result<(), Infallible> {
        let (mut col, row) = self.cursor;
        for byte in text.bytes() {
            if col < DISPLAY_COLUMNS as usize && row < DISPLAY_ROWS as usize {
                self.rows[row][col] = byte;
            }
            col += 1;
        }
        self.cursor = (col, row);
        self.refresh();
        Ok(())
    }
}

/// Upstream network with a scheduled outage.
struct SimulatedLink {
    start: Instant,
    associated_at: Option<Instant>,
}

impl SimulatedLink {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            associated_at: None,
        }
    }

    fn in_outage(&self) -> bool {
        let t = self.start.elapsed().as_secs() % OUTAGE_PERIOD_SECS;
        t >= OUTAGE_PERIOD_SECS - OUTAGE_SECS
    }
}

impl StationLink for SimulatedLink {
    type Error = &'static str;

    fn start(
        &mut self,
        access_point: &AccessPointConfig<'_>,
        station: &StationConfig<'_>,
    ) -> Result<(), Self::Error> {
        info!(
            "Radio up: hosting {}, station target {}",
            access_point.ssid, station.ssid
        );
        Ok(())
    }

    fn connect(&mut self) -> Result<(), Self::Error> {
        if self.in_outage() {
            self.associated_at = None;
            return Err("upstream network not in range");
        }
        self.associated_at = Some(Instant::now() + ASSOCIATION_DELAY);
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        if self.in_outage() {
            self.associated_at = None;
            return false;
        }
        self.associated_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Status LED that logs its transitions.
struct ConsoleLed;

impl ErrorType for ConsoleLed {
    type Error = Infallible;
}

impl OutputPin for ConsoleLed {
    fn set_low(&mut self) -> Result<(), Infallible> {
        info!("LED off");
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        info!("LED on");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

fn serve_http(listener: TcpListener, state: &'static TelemetryState) {
    let service = TelemetryService::new(state);
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                if let Err(e) = handle_connection(stream, &service) {
                    warn!("HTTP connection error: {}", e);
                }
            }
            Err(e) => warn!("HTTP accept error: {}", e),
        }
    }
}

fn handle_connection(mut stream: TcpStream, service: &TelemetryService<'_>) -> std::io::Result<()> {
    stream.set_read_timeout(Some(Duration::from_secs(10)))?;

    let mut buf = [0u8; MAX_REQUEST_SIZE];
    let mut total = 0;
    while total < buf.len() {
        let n = stream.read(&mut buf[total..])?;
        if n == 0 {
            if total == 0 {
                return Ok(());
            }
            break;
        }
        total += n;
        if head_complete(&buf[..total]) {
            break;
        }
    }

    let response = service.handle(&buf[..total]);
    debug!("HTTP {}", response.status.line());
    stream.write_all(response.head().as_bytes())?;
    stream.write_all(response.body.as_bytes())?;
    stream.flush()
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

fn default_config() -> NodeConfig<'static> {
    NodeConfig {
        station: StationConfig {
            ssid: "simulated-upstream",
            password: "",
        },
        access_point: AccessPointConfig::default(),
        calibration: Default::default(),
    }
}

fn load_config(source: &str) -> Result<NodeConfig<'_>, serde_json::Error> {
    serde_json::from_str(source)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    env_logger::init();
    info!("Starting tankmon simulator");

    let config_source = std::env::var("TANKMON_CONFIG")
        .ok()
        .map(|path| match std::fs::read_to_string(&path) {
            Ok(source) => source,
            Err(e) => {
                error!("Cannot read {}: {}", path, e);
                std::process::exit(1);
            }
        });
    let config = match config_source.as_deref().map(load_config) {
        Some(Ok(config)) => config,
        Some(Err(e)) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
        None => default_config(),
    };
    if let Err(e) = config.validate() {
        error!("{}", NodeError::from(e));
        std::process::exit(1);
    }

    let timing = LoopTiming::default();
    let state: &'static TelemetryState =
        Box::leak(Box::new(TelemetryState::new(config.calibration)));

    let addr = std::env::var("TANKMON_HTTP_ADDR").unwrap_or_else(|_| DEFAULT_HTTP_ADDR.into());
    let listener = match TcpListener::bind(&addr) {
        Ok(listener) => listener,
        Err(e) => {
            error!("Cannot listen on {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    info!("Serving http://{}{}", addr, TELEMETRY_PATH);
    std::thread::spawn(move || serve_http(listener, state));

    let mut display = LevelDisplay::new(ConsoleLcd::new());
    block_on(async {
        let _ = display.show_splash().await;
    });

    let start = Instant::now();
    let now_ms = || start.elapsed().as_millis() as u64;

    let mut connectivity =
        ConnectivityManager::new(SimulatedLink::new(), ConsoleLed, timing.reconnect_interval_ms);
    if let Err(e) = connectivity.initialize(&config.access_point, &config.station, now_ms()) {
        error!("Bring-up failed: {}", e);
        std::process::exit(1);
    }
    block_on(connectivity.wait_for_link(
        timing.startup_attempts,
        timing.startup_retry_delay_ms,
        &mut embassy_time::Delay,
    ));

    block_on(async {
        let _ = display.show_header().await;
    });

    let channel: LevelChannel = LevelChannel::new();
    let sensor = SimulatedTank {
        start: Instant::now(),
    };
    let mut sampler = SampleLoop::new(sensor, state, &channel, connectivity, timing);
    let period = Duration::from_millis(timing.period_ms);

    // -----------------------------------------------------------------------
    // Main loop
    // -----------------------------------------------------------------------
    loop {
        let pass_start = Instant::now();

        block_on(sampler.step(now_ms()));

        // Display consumer, drained on the same thread.
        while let Some(percentage) = channel.try_receive() {
            let _ = block_on(display.show_level(percentage));
        }

        let elapsed = pass_start.elapsed();
        if elapsed < period {
            std::thread::sleep(period - elapsed);
        }
    }
}
