#![no_std]
#![no_main]

use defmt::{error, info, warn};
use defmt_rtt as _;
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::interrupt;
use embassy_rp::interrupt::{InterruptExt, Priority};
use embassy_time::{Delay, Timer};
use portable_atomic::AtomicBool;
use rn52_firmware::{
    serial_config, ByteStream, CommandChannel, CortexMDelay, EdgeGate, EmbassyClock, ExtFeatures,
    ListenerRegistry, Ports, Rn52, SioInput, SoftSerial, INVERSE_LOGIC, RN52_BAUD, RX_PIN,
};

#[cfg(feature = "dev-panic")]
use panic_probe as _;
#[cfg(feature = "prod-panic")]
use panic_reset as _;

/// Event register poll period.
const POLL_INTERVAL_MS: u64 = 250;

/// Executor for the receive path, preempting everything in thread mode.
static EXECUTOR_RX: InterruptExecutor = InterruptExecutor::new();

/// The software port, shared by the RX task and the device task.
static PORTS: static_cell::StaticCell<Ports> = static_cell::StaticCell::new();

/// RX edge gate, driven by the registry through [`EdgeGate`].
static RX_GATE: AtomicBool = AtomicBool::new(false);

#[interrupt]
unsafe fn SWI_IRQ_1() {
    EXECUTOR_RX.on_interrupt()
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("RN52 link starting...");

    let p = embassy_rp::init(embassy_rp::config::Config::default());

    // --- Soft UART Setup ---
    let pull = if INVERSE_LOGIC { Pull::Down } else { Pull::Up };
    let rx = Input::new(p.PIN_9, pull); // RX
    let tx = Output::new(p.PIN_8, Level::High); // TX

    let serial = SoftSerial::new(
        SioInput::new(RX_PIN),
        tx,
        EdgeGate::new(&RX_GATE),
        CortexMDelay,
        serial_config(),
    );
    let ports: &'static Ports = PORTS.init(ListenerRegistry::new([serial]));

    // --- Receive path on a high-priority executor ---
    interrupt::SWI_IRQ_1.set_priority(Priority::P1);
    let rx_spawner = EXECUTOR_RX.start(interrupt::SWI_IRQ_1);
    rx_spawner.spawn(rx_task(rx, ports).unwrap());

    spawner.spawn(device_task(ports).unwrap());

    info!("RN52 link initialized at {} baud", RN52_BAUD);
}

/// RX task - waits for start bits and hands each one to the active port.
#[embassy_executor::task]
async fn rx_task(mut rx: Input<'static>, ports: &'static Ports) {
    let gate = EdgeGate::new(&RX_GATE);
    loop {
        if INVERSE_LOGIC {
            rx.wait_for_rising_edge().await;
        } else {
            rx.wait_for_falling_edge().await;
        }
        if gate.is_open() {
            ports.on_edge();
        }
    }
}

/// Device task - configures the module and reports track changes.
#[embassy_executor::task]
async fn device_task(ports: &'static Ports) {
    let Some(port) = ports.port(0) else {
        error!("no software port");
        return;
    };
    if let Err(e) = port.begin(RN52_BAUD) {
        error!("Serial setup error: {:?}", e);
        return;
    }

    let mut rn52 = Rn52::new(CommandChannel::new(port, EmbassyClock, Delay));

    match rn52.name() {
        Ok(name) => info!("Connected to module {}", name.as_str()),
        Err(e) => error!("Name query error: {:?}", e),
    }

    match rn52.set_feature(ExtFeatures::TRACK_CHANGE_EVENT, true) {
        Ok(features) => info!("Extended features now {=u16:04X}", features.raw()),
        Err(e) => error!("Feature update error: {:?}", e),
    }

    loop {
        match rn52.track_changed() {
            Ok(true) => {
                let title = rn52.track_title();
                let artist = rn52.artist();
                match (title, artist) {
                    (Ok(title), Ok(artist)) => {
                        info!("Now playing: {} - {}", artist.as_str(), title.as_str())
                    }
                    (Err(e), _) | (_, Err(e)) => warn!("Metadata error: {:?}", e),
                }
            }
            Ok(false) => {}
            Err(e) => warn!("Event register error: {:?}", e),
        }

        if rn52.channel().stream().overflow() {
            warn!("RX buffer overflowed");
        }

        Timer::after_millis(POLL_INTERVAL_MS).await;
    }
}
