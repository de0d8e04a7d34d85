// Forwards network and server settings from a local .env file into
// compile-time env vars consumed by env!() in the firmware binary.

const KEYS: &[&str] = &["SSID", "WIFI_KEY", "HOMESEER_ADDRESS", "HOMESEER_PORT"];

fn main() {
    println!("cargo:rerun-if-changed=.env");
    let _ = dotenvy::dotenv();
    for key in KEYS {
        println!("cargo:rerun-if-env-changed={key}");
        if let Ok(value) = std::env::var(key) {
            println!("cargo:rustc-env={key}={value}");
        }
    }
}
