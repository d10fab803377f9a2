//! Networking and TCP command server task.
//!
//! Manages WiFi connection, listens for TCP clients and matches every received
//! line against the trigger-word table. "stop" empties [`MOTIONS`] and raises
//! [`STOP`], gait actions are forwarded to the motion task and clip requests
//! are logged.
use alloc::string::String;
use anyhow::anyhow;
use core::str::FromStr;
use embassy_net::{tcp::TcpSocket, IpListenEndpoint, Stack};
use embassy_time::Timer;
use embedded_io_async::Write;
use esp_wifi::wifi::{ClientConfiguration, WifiController, WifiDevice};
use log::{error, info, warn};

use super::{MOTIONS, STOP};
use crate::config::{PORT, RX_BUF_SIZE, TX_BUF_SIZE};
use crate::intake::dispatch_line;
use crate::robot::commands::TriggerTable;

#[embassy_executor::task]
pub async fn runner_task(mut runner: embassy_net::Runner<'static, WifiDevice<'static>>) {
    runner.run().await;
}

#[embassy_executor::task]
pub async fn net_task(stack: Stack<'static>, triggers: &'static TriggerTable) {
    let mut rx_buf = [0u8; RX_BUF_SIZE];
    let mut tx_buf = [0u8; TX_BUF_SIZE];

    while !stack.is_link_up() {
        Timer::after_millis(500).await;
    }
    stack.wait_config_up().await;

    if let Some(config) = stack.config_v4() {
        info!(
            "[NET_TASK] TCP server listening at address {}:{}",
            config.address, PORT
        );
    }

    loop {
        let mut socket = TcpSocket::new(stack, &mut rx_buf, &mut tx_buf);

        match socket
            .accept(IpListenEndpoint {
                port: PORT,
                addr: None,
            })
            .await
        {
            Ok(_) => {
                info!("[NET_TASK] client connected");
                handle_connection(&mut socket, triggers).await;
                socket.close();
            }
            Err(e) => {
                error!("[NET_TASK] accept failed: {:?}", e);
                Timer::after_millis(500).await; // Backoff delay
                continue;
            }
        }
    }
}

pub async fn handle_connection(socket: &mut TcpSocket<'_>, triggers: &TriggerTable) {
    let mut rx_buf = [0u8; RX_BUF_SIZE];
    loop {
        match socket.read(&mut rx_buf).await {
            Ok(0) => break,
            Ok(n) => {
                let Ok(received) = core::str::from_utf8(&rx_buf[..n]) else {
                    warn!("[NET_TASK] dropped {n} bytes of invalid UTF-8");
                    continue;
                };
                for line in received.lines().filter(|l| !l.trim().is_empty()) {
                    let reply = dispatch_line(line, triggers, &MOTIONS, &STOP);
                    if let Err(e) = socket.write_all(reply.as_str().as_bytes()).await {
                        error!("[NET_TASK] write error: {:?}", e);
                        return;
                    }
                }
            }
            Err(e) => {
                error!("[NET_TASK] read error: {:?}", e);
                break;
            }
        }
    }
}

pub async fn configurate_and_start_wifi(
    wifi_controller: &mut WifiController<'_>,
) -> anyhow::Result<()> {
    let ssid = env!("WIFI_SSID");
    let password = env!("WIFI_PASS");
    let config = esp_wifi::wifi::Configuration::Client(ClientConfiguration {
        ssid: String::from_str(ssid).map_err(|_| anyhow!("invalid ssid"))?,
        password: String::from_str(password).map_err(|_| anyhow!("invalid password"))?,
        ..Default::default()
    });

    info!("[NET_TASK] connecting to wifi: {ssid}");
    wifi_controller
        .set_configuration(&config)
        .map_err(|e| anyhow!("setting wifi configuration: {e:?}"))?;
    wifi_controller
        .set_power_saving(esp_wifi::config::PowerSaveMode::None)
        .map_err(|e| anyhow!("setting wifi power mode: {e:?}"))?;
    wifi_controller
        .start()
        .map_err(|e| anyhow!("starting wifi: {e:?}"))?;
    wifi_controller
        .connect_async()
        .await
        .map_err(|e| anyhow!("connecting to wifi: {e:?}"))?;

    if let Ok(rssi) = wifi_controller.rssi() {
        info!("[NET_TASK] wifi connected! signal: {}", rssi)
    }
    Ok(())
}
