#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]

extern crate alloc;

use anyhow::anyhow;
use core::future::pending;
use embassy_executor::Spawner;
use embassy_net::{Config as NetConfig, StackResources};
use embassy_time::Delay;
use esp_backtrace as _;
use esp_hal::clock::CpuClock;
use esp_hal::peripherals::Peripherals;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::uart::{Config as UartConfig, Uart};
use esp_wifi::wifi::WifiController;
use fugit::MillisDurationU32;
use log::{error, info};
use minion_robot::boot::bring_up;
use minion_robot::config::{RobotConfig, BUS_BAUDRATE};
use minion_robot::drivers::lx16a::Lx16aBus;
use minion_robot::robot::commands::TriggerTable;
use minion_robot::robot::registry::JointRegistry;
use minion_robot::tasks::motion_task::motion_task;
use minion_robot::tasks::net_task::{configurate_and_start_wifi, net_task, runner_task};
use minion_robot::tasks::{EmbassyClock, MOTIONS};

esp_bootloader_esp_idf::esp_app_desc!();

// SERVO BUS: half-duplex LX-16A line through the debug board.
// TX: GPIO17, RX: GPIO16

macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        STATIC_CELL.init_with(|| $val)
    }};
}

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    esp_println::logger::init_logger_from_env();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let p = esp_hal::init(config);

    esp_alloc::heap_allocator!(size: 32 * 1024);
    esp_alloc::heap_allocator!(#[unsafe(link_section = ".dram2_uninit")] size: 96 * 1024);

    let timer0 = TimerGroup::new(p.TIMG1);
    esp_hal_embassy::init(timer0.timer0);
    info!("[MAIN] embassy initialized");

    if let Err(e) = start(spawner, p).await {
        error!("[MAIN] startup failed, robot stays idle: {e}");
    }

    loop {
        pending::<()>().await;
    }
}

/// Load the configuration, bring the servos up and spawn the runtime tasks.
async fn start(spawner: Spawner, p: Peripherals) -> anyhow::Result<()> {
    let config = RobotConfig::builtin()?;
    let config: &'static RobotConfig = mk_static!(RobotConfig, config);
    let registry = config.registry()?;
    let registry: &'static JointRegistry = mk_static!(JointRegistry, registry);
    let triggers: &'static TriggerTable = mk_static!(TriggerTable, config.trigger_table());
    info!(
        "[MAIN] configuration v{} loaded, {} trigger words",
        config.version,
        triggers.len()
    );

    let uart = Uart::new(p.UART1, UartConfig::default().with_baudrate(BUS_BAUDRATE))
        .map_err(|e| anyhow!("servo uart: {e:?}"))?
        .with_tx(p.GPIO17)
        .with_rx(p.GPIO16);
    let read_timeout = MillisDurationU32::millis(config.bus.read_timeout_ms);
    let mut bus = Lx16aBus::new(uart, EmbassyClock, read_timeout);

    let report = bring_up(&mut bus, &mut Delay, config, registry).await?;
    if report.unreadable() > 0 {
        info!("[MAIN] {} joints did not report a position", report.unreadable());
    }

    // take important peripherals
    let mut rng = esp_hal::rng::Rng::new(p.RNG);
    let timer1 = TimerGroup::new(p.TIMG0);
    let wifi_init = esp_wifi::init(timer1.timer0, rng, p.RADIO_CLK)
        .map_err(|e| anyhow!("wifi init: {e:?}"))?;
    let wifi_init = mk_static!(esp_wifi::EspWifiController<'static>, wifi_init);
    let (wifi_controller, interfaces) = esp_wifi::wifi::new(wifi_init, p.WIFI)
        .map_err(|e| anyhow!("wifi controller: {e:?}"))?;
    let wifi_controller = mk_static!(WifiController<'static>, wifi_controller);

    configurate_and_start_wifi(wifi_controller).await?;

    //Get the embassy net stack up and working.
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;
    let net_config = NetConfig::dhcpv4(Default::default());
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        net_config,
        mk_static!(StackResources<3>, StackResources::new()),
        seed,
    );

    info!("[MAIN] starting minion robot...");
    spawner
        .spawn(motion_task(bus, registry, &config.gait, MOTIONS.receiver()))
        .map_err(|e| anyhow!("spawning motion task: {e:?}"))?;
    spawner
        .spawn(runner_task(runner))
        .map_err(|e| anyhow!("spawning runner task: {e:?}"))?;
    spawner
        .spawn(net_task(stack, triggers))
        .map_err(|e| anyhow!("spawning net task: {e:?}"))?;

    Ok(())
}
