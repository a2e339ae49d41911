//! Photo frame firmware - ESP32-S3 Spectra 6 e-paper picture frame
//!
//! Environment variables:
//! - WIFI_SSID: WiFi network name (required)
//! - WIFI_PASS: WiFi password (required)
//! - REMOTE_GALLERY_URL: default remote image URL, overridden by CONFIG.JSN (optional)

#![no_std]
#![no_main]

extern crate alloc;

use alloc::vec;
use core::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use core::time::Duration as CoreDuration;

use embassy_executor::Spawner;
use embassy_net::{
    Runner, Stack, StackResources,
    dns::DnsSocket,
    tcp::client::{TcpClient, TcpClientState},
};
use embassy_time::{Delay, Duration, Timer};
use embedded_hal::delay::DelayNs;
use embedded_hal_bus::spi::ExclusiveDevice;
use esp_alloc as _;
use esp_backtrace as _;
use esp_hal::{
    clock::CpuClock,
    gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull},
    i2c::master::{Config as I2cConfig, I2c},
    ram,
    rng::Rng,
    rtc_cntl::{
        Rtc,
        sleep::{Ext0WakeupSource, TimerWakeupSource, WakeupLevel},
    },
    spi::{
        Mode,
        master::{Config as SpiConfig, Spi},
    },
    system::SleepSource,
    time::Rate,
    timer::timg::TimerGroup,
};
use esp_radio::{
    Controller,
    wifi::{ClientConfig, Config as WifiConfig, ModeConfig, WifiController, WifiDevice},
};
use log::{error, info, warn};
use photoframe_core::{
    DispatchOutcome, FrameConfig, GalleryMode, RotationDispatcher, WakeContext, WakeReason,
    keep_stale_remote, needs_sync, plan_sleep,
};
use photoframe_firmware::display::{DECODE_BUF_SIZE, PNG_BUF_SIZE, PanelDisplay};
use photoframe_firmware::epd::Epd7in3e;
use photoframe_firmware::framebuffer::Framebuffer;
use photoframe_firmware::pmu::Axp2101;
use photoframe_firmware::remote::{
    self, FetchOutcome, TLS_READ_BUF_SIZE, TLS_WRITE_BUF_SIZE, TlsBuffers,
};
use photoframe_firmware::sleep_state::{self, Resumed};
use photoframe_firmware::storage::{SdGallery, SdStorage};
use photoframe_firmware::time_sync::{self, RtcClock};
use photoframe_firmware::HardwareRng;

esp_bootloader_esp_idf::esp_app_desc!();

// When you are okay with using a nightly compiler it's better to use https://docs.rs/static_cell/2.1.0/static_cell/macro.make_static.html
macro_rules! mk_static {
    ($t:ty,$val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        #[deny(unused_attributes)]
        let x = STATIC_CELL.uninit().write(($val));
        x
    }};
}

const SSID: &str = env!("WIFI_SSID");
const PASSWORD: &str = env!("WIFI_PASS");
const DEFAULT_REMOTE_URL: Option<&str> = option_env!("REMOTE_GALLERY_URL");

/// How long the KEY button is watched after a refresh before sleeping
const BUTTON_WINDOW_SECS: u32 = 10;

const WIFI_CONNECT_ATTEMPTS: u32 = 3;

type HttpTcpClient = TcpClient<'static, 1, 4096, 4096>;

static DISPATCHER: RotationDispatcher = RotationDispatcher::new(true);

/// Flag to control red LED blinking from blink task
static BLINK_ACTIVE: AtomicBool = AtomicBool::new(false);
/// Blink interval in milliseconds (100 = fast, 500 = normal)
static BLINK_INTERVAL_MS: AtomicU16 = AtomicU16::new(500);

/// Red LED blink task - blinks when BLINK_ACTIVE is true, solid on otherwise
#[embassy_executor::task]
async fn blink_task(led: &'static mut Output<'static>) {
    loop {
        if BLINK_ACTIVE.load(Ordering::Relaxed) {
            led.toggle();
        } else {
            led.set_low(); // ON (active low)
        }
        let interval = BLINK_INTERVAL_MS.load(Ordering::Relaxed) as u64;
        Timer::after(Duration::from_millis(interval)).await;
    }
}

fn start_blink() {
    BLINK_INTERVAL_MS.store(500, Ordering::Relaxed);
    BLINK_ACTIVE.store(true, Ordering::Relaxed);
}

fn start_fast_blink() {
    BLINK_INTERVAL_MS.store(100, Ordering::Relaxed);
    BLINK_ACTIVE.store(true, Ordering::Relaxed);
}

fn stop_blink() {
    BLINK_ACTIVE.store(false, Ordering::Relaxed);
}

/// Everything needed to talk to the network once WiFi is up
struct Network {
    controller: WifiController<'static>,
    stack: Stack<'static>,
    tcp: &'static HttpTcpClient,
    dns: &'static DnsSocket<'static>,
}

#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    // Init logger first so we can see any early crashes
    esp_println::logger::init_logger_from_env();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    let wake_cause = esp_hal::rtc_cntl::wakeup_cause();
    let wake_reason = match wake_cause {
        SleepSource::Ext0 => WakeReason::Button,
        SleepSource::Timer => WakeReason::Timer,
        _ => WakeReason::PowerOn,
    };

    let key_input = Input::new(
        peripherals.GPIO4,
        InputConfig::default().with_pull(Pull::Up),
    );
    let mut led_green = Output::new(peripherals.GPIO42, Level::High, OutputConfig::default());
    let led_red = Output::new(peripherals.GPIO45, Level::Low, OutputConfig::default()); // ON by default

    let led_red_static: &'static mut Output<'static> = mk_static!(Output<'static>, led_red);
    spawner.spawn(blink_task(led_red_static)).ok();
    let mut delay = Delay;

    info!("Boot! Wake cause: {:?} -> {:?}", wake_cause, wake_reason);

    // Internal RAM heap for small allocations, PSRAM for the image buffers
    esp_alloc::heap_allocator!(#[ram(reclaimed)] size: 64 * 1024);
    esp_alloc::heap_allocator!(size: 36 * 1024);
    esp_alloc::psram_allocator!(&peripherals.PSRAM, esp_hal::psram);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(
        timg0.timer0,
        #[cfg(target_arch = "riscv32")]
        esp_hal::interrupt::software::SoftwareInterruptControl::new(peripherals.SW_INTERRUPT)
            .software_interrupt0,
    );

    let resumed = sleep_state::load();
    let previous_mode = resumed.map(|r| r.gallery_mode);
    let mut state = match resumed {
        Some(resumed) => {
            info!(
                "Resuming: last sync {:?}, last mode {}",
                resumed.last_sync_unix,
                resumed.gallery_mode.as_str()
            );
            resumed
        }
        None => {
            info!("Cold boot (no valid sleep state)");
            Resumed::default()
        }
    };

    // ==================== SD Card ====================
    // SD card SPI pins: CS=GPIO38, CLK=GPIO39, MISO=GPIO40, MOSI=GPIO41
    let sd_spi = Spi::new(
        peripherals.SPI2,
        SpiConfig::default()
            .with_frequency(Rate::from_mhz(20))
            .with_mode(Mode::_0),
    )
    .expect("SD SPI init failed")
    .with_sck(peripherals.GPIO39)
    .with_mosi(peripherals.GPIO41)
    .with_miso(peripherals.GPIO40);

    let sd_cs = Output::new(peripherals.GPIO38, Level::High, OutputConfig::default());
    let sd_spi_device =
        ExclusiveDevice::new_no_delay(sd_spi, sd_cs).expect("SD chip select is infallible");

    let mut storage = match SdStorage::new(sd_spi_device, delay.clone()) {
        Ok(storage) => Some(storage),
        Err(e) => {
            error!("SD card init failed: {}", e);
            None
        }
    };

    let config = match storage.as_mut().map(|s| s.load_config()) {
        Some(Ok(Some(config))) => config,
        Some(Ok(None)) => {
            info!("No config file, using defaults");
            FrameConfig::default()
        }
        Some(Err(e)) => {
            warn!("Ignoring config file: {}", e);
            FrameConfig::default()
        }
        None => FrameConfig::default(),
    };
    DISPATCHER.set_auto_rotate(config.auto_rotate);
    info!(
        "Config: every {}s, auto-rotate {}, mode {}, sleep window {} ({}-{})",
        config.rotate_interval,
        config.auto_rotate,
        config.gallery_mode.as_str(),
        config.sleep_schedule.enabled,
        config.sleep_schedule.start,
        config.sleep_schedule.end
    );
    if let Some(previous) = previous_mode
        && previous != config.gallery_mode
    {
        info!(
            "Gallery mode changed: {} -> {}",
            previous.as_str(),
            config.gallery_mode.as_str()
        );
    }

    // ==================== Power Management (AXP2101) ====================
    // I2C: SDA=GPIO47, SCL=GPIO48
    let i2c = I2c::new(
        peripherals.I2C0,
        I2cConfig::default().with_frequency(Rate::from_khz(400)),
    )
    .expect("I2C init failed")
    .with_sda(peripherals.GPIO47)
    .with_scl(peripherals.GPIO48);

    let mut pmu = Axp2101::new(i2c);
    if let Err(e) = pmu.enable_display_rails() {
        warn!("PMIC config skipped (may be pre-configured): {}", e);
    }
    match pmu.battery_percent() {
        Ok(percent) => info!("Battery: {}%", percent),
        Err(e) => warn!("Failed to read battery: {}", e),
    }

    // Small delay for power rails to stabilize
    delay.delay_ms(100);

    // ==================== E-Paper Display ====================
    // DC=GPIO8, CS=GPIO9, SCK=GPIO10, MOSI=GPIO11, RST=GPIO12, BUSY=GPIO13
    let spi = Spi::new(
        peripherals.SPI3,
        SpiConfig::default()
            .with_frequency(Rate::from_mhz(10))
            .with_mode(Mode::_0),
    )
    .expect("SPI init failed")
    .with_sck(peripherals.GPIO10)
    .with_mosi(peripherals.GPIO11);

    let cs = Output::new(peripherals.GPIO9, Level::High, OutputConfig::default());
    let spi_device = ExclusiveDevice::new_no_delay(spi, cs).expect("EPD chip select is infallible");

    let busy = Input::new(
        peripherals.GPIO13,
        InputConfig::default().with_pull(Pull::Up),
    );
    let dc = Output::new(peripherals.GPIO8, Level::Low, OutputConfig::default());
    let rst = Output::new(peripherals.GPIO12, Level::High, OutputConfig::default());

    let mut epd = Epd7in3e::new(spi_device, busy, dc, rst, &mut delay).expect("EPD init failed");
    info!("EPD initialized");

    let mut rtc = Rtc::new(peripherals.LPWR);
    let rng = Rng::new();

    // ==================== Network (only when needed) ====================
    let wants_render = wake_reason != WakeReason::Timer || config.auto_rotate;
    let remote_url = config.remote_url.as_deref().or(DEFAULT_REMOTE_URL);
    let wants_remote = wants_render && config.gallery_mode == GalleryMode::Remote;
    let wants_sync = needs_sync(state.last_sync_unix, time_sync::unix_now(&rtc));

    if wants_remote && remote_url.is_none() {
        warn!("Remote mode without a gallery URL, nothing will be downloaded");
    }

    let mut network = None;
    let mut fresh_remote = false;
    if wants_sync || (wants_remote && remote_url.is_some()) {
        start_fast_blink();
        network = bring_up_network(&spawner, peripherals.WIFI, &rng).await;
        stop_blink();
    }

    if let Some(net) = network.as_ref() {
        if wants_sync {
            match time_sync::sync_rtc(net.stack, &rtc).await {
                Ok(unix) => state.last_sync_unix = Some(unix),
                Err(e) => warn!("Time sync failed: {}", e),
            }
        }

        if let (true, Some(url), Some(storage)) = (wants_remote, remote_url, storage.as_mut()) {
            start_blink();
            let mut png_buf = vec![0u8; PNG_BUF_SIZE];
            let mut tls_read = vec![0u8; TLS_READ_BUF_SIZE];
            let mut tls_write = vec![0u8; TLS_WRITE_BUF_SIZE];
            let tls = TlsBuffers {
                read: &mut tls_read,
                write: &mut tls_write,
                seed: (u64::from(rng.random()) << 32) | u64::from(rng.random()),
            };

            match remote::download(net.tcp, net.dns, tls, url, &mut png_buf).await {
                Ok(FetchOutcome::Downloaded(len)) => {
                    match storage.write_remote_image(&png_buf[..len]) {
                        Ok(()) => fresh_remote = true,
                        Err(e) => error!("Failed to store remote image: {}", e),
                    }
                }
                Ok(FetchOutcome::NotFound) => {
                    if let Err(e) = storage.delete_remote_image() {
                        error!("Failed to remove stale remote image: {}", e);
                    }
                }
                Err(e) => warn!("Remote download failed: {}", e),
            }
            stop_blink();
        }
    }

    if wants_remote
        && !fresh_remote
        && !keep_stale_remote(previous_mode, config.gallery_mode)
        && let Some(storage) = storage.as_mut()
    {
        info!("Just switched to remote mode without a fresh image, dropping the old one");
        if let Err(e) = storage.delete_remote_image() {
            error!("Failed to remove stale remote image: {}", e);
        }
    }

    // ==================== Rotation ====================
    if let Some(storage) = storage.as_mut() {
        let mut framebuffer = Framebuffer::new();
        let mut png_buf = vec![0u8; PNG_BUF_SIZE];
        let mut decode_buf = vec![0u8; DECODE_BUF_SIZE];
        let mut picker = HardwareRng(rng);
        let mut reason = wake_reason;
        let mut panel_asleep = false;

        loop {
            if panel_asleep && let Err(e) = epd.wake_up(&mut delay) {
                error!("Failed to wake display: {:?}", e);
            }

            start_blink();
            let outcome = {
                let mut gallery = SdGallery::new(storage, &config);
                let mut panel =
                    PanelDisplay::new(&mut epd, &mut framebuffer, &mut decode_buf, &mut delay);
                let mut ctx = WakeContext {
                    library: &mut gallery,
                    display: &mut panel,
                    rng: &mut picker,
                    buffer: &mut png_buf,
                };
                DISPATCHER.handle_wakeup(reason, config.gallery_mode, &mut ctx)
            };
            stop_blink();

            match outcome {
                Ok(DispatchOutcome::Rendered { source, fell_back }) => {
                    info!("Showing {} (fallback: {})", source, fell_back)
                }
                Ok(DispatchOutcome::Skipped(why)) => info!("Nothing rendered: {:?}", why),
                Err(e) => error!("Rotation failed: {}", e),
            }

            if let Err(e) = epd.sleep(&mut delay) {
                error!("Failed to sleep display: {:?}", e);
            }
            panel_asleep = true;

            if !wait_for_key(&key_input, &mut led_green).await {
                break;
            }
            reason = WakeReason::Button;
        }
    } else {
        error!("No SD card, skipping rotation");
    }

    // ==================== Deep Sleep ====================
    state.gallery_mode = config.gallery_mode;
    sleep_state::save(&state);

    let plan = plan_sleep(&config, &RtcClock::new(&rtc, config.utc_offset_minutes));

    if let Some(mut net) = network.take() {
        info!("Disconnecting WiFi for deep sleep...");
        wifi_disconnect(&mut net.controller).await;
    }

    // Reclaim GPIO4 for deep sleep wake source
    let key_pin = unsafe { esp_hal::peripherals::GPIO4::steal() };

    enter_deep_sleep(&mut rtc, key_pin, &mut delay, plan.timer_seconds());
}

/// Watch the KEY button for a while after a refresh. Returns true on a press.
async fn wait_for_key(key_input: &Input<'_>, led_green: &mut Output<'_>) -> bool {
    info!("Press KEY within {}s for another image...", BUTTON_WINDOW_SECS);
    for _ in 0..BUTTON_WINDOW_SECS * 10 {
        if key_input.is_low() {
            // Flash LED2 once to confirm
            led_green.set_low();
            Timer::after(Duration::from_millis(100)).await;
            led_green.set_high();

            while key_input.is_low() {
                Timer::after(Duration::from_millis(50)).await;
            }
            return true;
        }
        Timer::after(Duration::from_millis(100)).await; // Async yield lets blink task run
    }
    false
}

/// Enter deep sleep with an optional timer and the KEY button (GPIO4) as wake sources
fn enter_deep_sleep<P: esp_hal::gpio::RtcPinWithResistors>(
    rtc: &mut Rtc,
    key_pin: P,
    delay: &mut Delay,
    seconds: Option<u64>,
) -> ! {
    // Enable internal pull-up on GPIO4 so it doesn't float and trigger spurious wakes
    key_pin.rtcio_pullup(true);
    key_pin.rtcio_pulldown(false);

    // GPIO4 KEY button is active low (button pulls to ground when pressed)
    let ext0 = Ext0WakeupSource::new(key_pin, WakeupLevel::Low);

    match seconds {
        Some(seconds) => {
            // A zero-length plan still needs one timer tick
            let seconds = seconds.max(1);
            info!("Entering deep sleep for {}s (KEY wakes early)", seconds);
            let timer = TimerWakeupSource::new(CoreDuration::from_secs(seconds));
            // Let serial output flush
            delay.delay_ms(100);
            rtc.sleep_deep(&[&timer, &ext0])
        }
        None => {
            info!("Entering deep sleep until KEY is pressed");
            delay.delay_ms(100);
            rtc.sleep_deep(&[&ext0])
        }
    }
}

/// Initialize the radio, join the network and wait for DHCP
async fn bring_up_network(
    spawner: &Spawner,
    wifi: esp_hal::peripherals::WIFI<'static>,
    rng: &Rng,
) -> Option<Network> {
    info!("Initializing WiFi...");
    let ctrl = match esp_radio::init() {
        Ok(ctrl) => mk_static!(Controller<'static>, ctrl),
        Err(e) => {
            error!("Radio init failed: {:?}", e);
            return None;
        }
    };

    let (mut controller, ifaces) = match esp_radio::wifi::new(ctrl, wifi, WifiConfig::default()) {
        Ok(parts) => parts,
        Err(e) => {
            error!("WiFi init failed: {:?}", e);
            return None;
        }
    };

    let net_config = embassy_net::Config::dhcpv4(Default::default());
    let (stack, runner) = embassy_net::new(
        ifaces.sta,
        net_config,
        mk_static!(StackResources<4>, StackResources::<4>::new()),
        (u64::from(rng.random()) << 32) | u64::from(rng.random()),
    );
    spawner.spawn(net_task(runner)).ok();

    if !wifi_connect(&mut controller).await {
        wifi_disconnect(&mut controller).await;
        return None;
    }
    wait_for_ip(stack).await;

    let tcp_state = mk_static!(TcpClientState<1, 4096, 4096>, TcpClientState::new());
    let tcp = mk_static!(HttpTcpClient, TcpClient::new(stack, tcp_state));
    let dns = mk_static!(DnsSocket<'static>, DnsSocket::new(stack));

    info!("WiFi ready!");
    Some(Network {
        controller,
        stack,
        tcp,
        dns,
    })
}

/// Connect to the configured access point, giving up after a few attempts
async fn wifi_connect(controller: &mut WifiController<'static>) -> bool {
    if !matches!(controller.is_started(), Ok(true)) {
        let client_config = ModeConfig::Client(
            ClientConfig::default()
                .with_ssid(SSID.into())
                .with_password(PASSWORD.into()),
        );
        if let Err(e) = controller.set_config(&client_config) {
            error!("WiFi config rejected: {:?}", e);
            return false;
        }
        if let Err(e) = controller.start_async().await {
            error!("WiFi start failed: {:?}", e);
            return false;
        }
    }

    info!("Connecting to {}...", SSID);
    for attempt in 1..=WIFI_CONNECT_ATTEMPTS {
        match controller.connect_async().await {
            Ok(_) => {
                info!("WiFi connected!");
                return true;
            }
            Err(e) => {
                warn!("Failed to connect (attempt {}): {:?}", attempt, e);
                Timer::after(Duration::from_secs(5)).await;
            }
        }
    }
    false
}

/// Disconnect and stop WiFi to save power
async fn wifi_disconnect(controller: &mut WifiController<'static>) {
    if let Err(e) = controller.disconnect_async().await {
        warn!("Disconnect error (may already be disconnected): {:?}", e);
    }
    if let Err(e) = controller.stop_async().await {
        warn!("Stop error: {:?}", e);
    }
    info!("WiFi stopped");
}

/// Wait for network stack to get an IP address
async fn wait_for_ip(stack: Stack<'static>) {
    while !stack.is_link_up() {
        Timer::after(Duration::from_millis(500)).await;
    }
    info!("Link up, waiting for IP...");

    loop {
        if let Some(config) = stack.config_v4() {
            info!("Got IP: {}", config.address);
            break;
        }
        Timer::after(Duration::from_millis(500)).await;
    }
}

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}
