//! Wi-Fi access point plus station link
//!
//! The radio runs in AP+STA mode. Each interface gets its own embassy-net
//! stack: the access point side is statically addressed, the station side
//! leases its address over DHCP.

use alloc::string::String;

use embassy_net::{Config as NetConfig, Ipv4Address, Ipv4Cidr, Runner, Stack, StaticConfigV4};
use esp_radio::wifi::{
    AccessPointConfig as RadioApConfig, AuthMethod, ClientConfig, ModeConfig, WifiController,
    WifiDevice, WifiError,
};
use log::info;
use tankmon_core::config::{AccessPointConfig, StationConfig};
use tankmon_core::connectivity::StationLink;

/// [`StationLink`] over the esp-radio controller and the station network stack.
pub struct WifiLink {
    controller: WifiController<'static>,
    station: Stack<'static>,
}

impl WifiLink {
    pub fn new(controller: WifiController<'static>, station: Stack<'static>) -> Self {
        Self {
            controller,
            station,
        }
    }
}

impl StationLink for WifiLink {
    type Error = WifiError;

    fn start(
        &mut self,
        access_point: &AccessPointConfig<'_>,
        station: &StationConfig<'_>,
    ) -> Result<(), WifiError> {
        let client = ClientConfig::default()
            .with_ssid(String::from(station.ssid))
            .with_password(String::from(station.password))
            .with_auth_method(auth_method(station.password));
        let ap = RadioApConfig::default()
            .with_ssid(String::from(access_point.ssid))
            .with_password(String::from(access_point.password))
            .with_auth_method(auth_method(access_point.password));

        self.controller.set_config(&ModeConfig::ApSta(client, ap))?;
        self.controller.start()
    }

    fn connect(&mut self) -> Result<(), WifiError> {
        self.controller.connect()
    }

    /// Associated and holding a DHCP lease.
    fn is_connected(&mut self) -> bool {
        self.controller.is_connected().unwrap_or(false) && self.station.is_config_up()
    }
}

fn auth_method(password: &str) -> AuthMethod {
    if password.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::Wpa2Personal
    }
}

/// Static addressing for the access point stack. The node is its own gateway.
pub fn access_point_net_config(access_point: &AccessPointConfig<'_>) -> NetConfig {
    let [a, b, c, d] = access_point.address;
    NetConfig::ipv4_static(StaticConfigV4 {
        address: Ipv4Cidr::new(Ipv4Address::new(a, b, c, d), access_point.prefix_len),
        gateway: None,
        dns_servers: Default::default(),
    })
}

pub fn station_net_config() -> NetConfig {
    NetConfig::dhcpv4(Default::default())
}

/// One runner per interface.
#[embassy_executor::task(pool_size = 2)]
pub async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await;
}

/// Logs the station network parameters every time a lease is obtained.
#[embassy_executor::task]
pub async fn station_report_task(stack: Stack<'static>) {
    loop {
        stack.wait_config_up().await;
        if let Some(config) = stack.config_v4() {
            info!(
                "Station address {} gateway {:?} dns {:?}",
                config.address, config.gateway, config.dns_servers
            );
        }
        stack.wait_config_down().await;
        info!("Station lease lost");
    }
}
