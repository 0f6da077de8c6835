// DriveMonitor - Entry Point
//
// Firmware boot sequence (ESP-IDF):
//   1. Logger and peripherals.
//   2. Wi-Fi station, retried until associated.
//   3. MPU6050 on I2C (or the synthetic IMU with `mock-sensor`).
//   4. MQTT client wired to the command sink.
//   5. Spawn producer, processor and dispatcher tasks.
//
// On any other target the same pipeline runs against the synthetic IMU, with
// published payloads logged and commands read from stdin.

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    firmware::run()
}

#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    host::run()
}

// ---------------------------------------------------------------------------
// Firmware
// ---------------------------------------------------------------------------
#[cfg(target_os = "espidf")]
mod firmware {
    use std::thread;
    use std::time::Duration;

    use anyhow::anyhow;
    use esp_idf_hal::modem::Modem;
    use esp_idf_hal::prelude::*;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};

    use drivemonitor::config::*;
    use drivemonitor::transport::mqtt::MqttTransport;
    use drivemonitor::{Pipeline, PipelineConfig};

    const WIFI_SSID: &str = match option_env!("WIFI_SSID") {
        Some(ssid) => ssid,
        None => "ul_iot",
    };
    const WIFI_PASSWORD: &str = match option_env!("WIFI_PASSWORD") {
        Some(password) => password,
        None => "",
    };
    const WIFI_CONNECT_RETRIES: u32 = 5;

    pub fn run() -> anyhow::Result<()> {
        // Link esp-idf-sys runtime patches and initialise logging.
        esp_idf_svc::sys::link_patches();
        esp_idf_svc::log::EspLogger::initialize_default();
        log::info!("{} firmware starting…", DEVICE_NAME);

        // ---- Peripherals --------------------------------------------------
        let peripherals = Peripherals::take()?;
        let sysloop = EspSystemEventLoop::take()?;
        let nvs = EspDefaultNvsPartition::take()?;

        // ---- Network ------------------------------------------------------
        // Kept alive for the lifetime of the firmware.
        let _wifi = connect_wifi(peripherals.modem, sysloop, nvs)?;

        // ---- Sensor -------------------------------------------------------
        #[cfg(feature = "mock-sensor")]
        let sensor = {
            log::warn!("Using MOCK sensor data");
            drivemonitor::MockImu::new()
        };

        #[cfg(not(feature = "mock-sensor"))]
        let sensor = {
            use drivemonitor::drivers::imu::Mpu6050;
            use esp_idf_hal::i2c::{I2cConfig, I2cDriver};

            let i2c_config = I2cConfig::new().baudrate(I2C_BAUDRATE_HZ.Hz());
            let i2c = I2cDriver::new(
                peripherals.i2c0,
                peripherals.pins.gpio26, // SDA
                peripherals.pins.gpio25, // SCL
                &i2c_config,
            )?;
            log::info!("I2C initialised on SDA={}, SCL={}", PIN_I2C_SDA, PIN_I2C_SCL);

            // Allow the sensor to power up.
            thread::sleep(Duration::from_millis(100));
            let mut imu = Mpu6050::new(i2c);
            if !imu.is_connected() {
                log::error!("MPU6050 not answering on 0x{:02X}", I2C_ADDR_MPU6050);
            }
            imu.init()?;
            imu
        };

        // ---- Pipeline -----------------------------------------------------
        let config = PipelineConfig { device_id: device_id(), ..Default::default() };
        let pipeline = Pipeline::new(config)?;
        let transport = MqttTransport::connect(
            MQTT_BROKER_URI,
            &pipeline.config().device_id,
            pipeline.command_sink(),
        )?;

        let _tasks = pipeline.spawn(sensor, transport)?;
        log::info!("Boot complete, entering normal operation");

        // Main thread has nothing left to do; park it forever.
        // (All work happens in the spawned FreeRTOS tasks.)
        loop {
            thread::sleep(Duration::from_secs(60));
        }
    }

    fn connect_wifi(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
    ) -> anyhow::Result<BlockingWifi<EspWifi<'static>>> {
        let esp_wifi = EspWifi::new(modem, sysloop.clone(), Some(nvs))?;
        let mut wifi = BlockingWifi::wrap(esp_wifi, sysloop)?;

        let auth_method = if WIFI_PASSWORD.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid: WIFI_SSID.try_into().map_err(|_| anyhow!("SSID too long"))?,
            password: WIFI_PASSWORD.try_into().map_err(|_| anyhow!("Wi-Fi password too long"))?,
            auth_method,
            ..Default::default()
        }))?;

        wifi.start()?;
        log::info!("Wi-Fi started, connecting to {}", WIFI_SSID);

        let mut attempt = 1;
        while let Err(e) = wifi.connect() {
            if attempt >= WIFI_CONNECT_RETRIES {
                return Err(e.into());
            }
            log::warn!("Wi-Fi connect attempt {} failed: {}", attempt, e);
            attempt += 1;
            thread::sleep(Duration::from_secs(2));
        }

        wifi.wait_netif_up()?;
        log::info!("Wi-Fi connected: {:?}", wifi.wifi().sta_netif().get_ip_info()?.ip);
        Ok(wifi)
    }

    /// Device name suffixed with the low half of the station MAC.
    fn device_id() -> String {
        let mut mac = [0u8; 6];
        // SAFETY: `mac` is the 6-byte buffer the call writes into.
        let read = esp_idf_svc::sys::esp!(unsafe {
            esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr())
        });
        match read {
            Ok(()) => format!("{}-{:02X}{:02X}{:02X}", DEVICE_NAME, mac[3], mac[4], mac[5]),
            Err(e) => {
                log::warn!("MAC read failed ({}), using bare device name", e);
                DEVICE_NAME.to_string()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Host simulation
// ---------------------------------------------------------------------------
#[cfg(not(target_os = "espidf"))]
mod host {
    use std::io::BufRead;
    use std::thread;

    use drivemonitor::config::DEVICE_NAME;
    use drivemonitor::transport::CommandSink;
    use drivemonitor::{LogTransport, MockImu, Pipeline, PipelineConfig};

    pub fn run() -> anyhow::Result<()> {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        log::info!("{} host simulation starting", DEVICE_NAME);

        let pipeline = Pipeline::new(PipelineConfig::default())?;

        let sink = pipeline.command_sink();
        thread::Builder::new()
            .name("console".into())
            .spawn(move || command_console(sink))?;

        let tasks = pipeline.spawn(MockImu::new(), LogTransport::new())?;
        log::info!("Type JSON commands, e.g. {{\"cmd\":\"get_status\"}}");

        // The tasks never stop on their own.
        tasks.join()
    }

    /// Stand-in for the commands topic: one JSON command per stdin line.
    fn command_console(sink: CommandSink) {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let line = line.trim();
            if !line.is_empty() {
                // Rejections are already logged by the sink.
                let _ = sink.deliver(line.as_bytes());
            }
        }
        log::info!("Console closed");
    }
}
