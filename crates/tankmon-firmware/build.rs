//! Exports Wi-Fi credentials from `.env` as compile-time environment variables.

const KEYS: [&str; 4] = [
    "TANKMON_WIFI_SSID",
    "TANKMON_WIFI_PASSWORD",
    "TANKMON_AP_SSID",
    "TANKMON_AP_PASSWORD",
];

fn main() {
    println!("cargo:rerun-if-changed=.env");
    for key in KEYS {
        println!("cargo:rerun-if-env-changed={key}");
    }

    // A missing .env is fine when the variables come from the shell.
    if let Err(e) = dotenvy::dotenv()
        && !e.not_found()
    {
        panic!("failed to read .env: {e}");
    }

    for key in KEYS {
        if let Ok(value) = std::env::var(key) {
            println!("cargo:rustc-env={key}={value}");
        }
    }
}
