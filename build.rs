//! Bakes the device configuration into the firmware
//!
//! Values come from the build environment, with a `.env` file at the crate
//! root filling in anything not already set. They are read back with
//! `option_env!` in `src/config.rs`.

const KEYS: [&str; 8] = [
    "WIFI_SSID",
    "WIFI_PASSWORD",
    "BROKER_URI",
    "SUBSCRIBE_TOPIC",
    "PUBLISH_TOPIC",
    "SLEEP_SECONDS",
    "WAIT_TIMEOUT_SECS",
    "MQTT_CLIENT_ID",
];

fn main() {
    println!("cargo:rerun-if-changed=.env");

    match dotenvy::dotenv() {
        Ok(path) => println!("cargo:warning=loaded configuration from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => panic!("failed to read .env: {e}"),
    }

    for key in KEYS {
        println!("cargo:rerun-if-env-changed={key}");
        if let Ok(value) = std::env::var(key) {
            println!("cargo:rustc-env={key}={value}");
        }
    }
}
