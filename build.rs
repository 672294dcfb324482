use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Deserialize, Default)]
struct Credentials {
    #[serde(default)]
    wifi: Wifi,
}

#[derive(Deserialize, Default)]
struct Wifi {
    #[serde(default)]
    ssid: String,
    #[serde(default)]
    password: String,
}

fn main() -> Result<()> {
    if env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::build::CfgArgs::output_propagated("ESP_IDF")?;
        embuild::espidf::sysenv::output();
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    write_credentials(&out_dir)?;
    write_calibration(&out_dir)?;

    println!("cargo:rerun-if-changed=sdkconfig.defaults");
    println!("cargo:rerun-if-changed=credentials.toml");
    println!("cargo:rerun-if-changed=calibration.toml");
    println!("cargo:rerun-if-env-changed=WIFI_SSID");
    println!("cargo:rerun-if-env-changed=WIFI_PASS");
    Ok(())
}

// credentials.toml -> $OUT_DIR/credentials.rs, Env-Variablen haben Vorrang
fn write_credentials(out_dir: &Path) -> Result<()> {
    let mut creds = match fs::read_to_string("credentials.toml") {
        Ok(raw) => toml::from_str::<Credentials>(&raw).context("parsing credentials.toml")?,
        Err(_) => Credentials::default(),
    };
    if let Ok(ssid) = env::var("WIFI_SSID") {
        creds.wifi.ssid = ssid;
    }
    if let Ok(pass) = env::var("WIFI_PASS") {
        creds.wifi.password = pass;
    }
    if creds.wifi.ssid.is_empty() {
        println!("cargo:warning=no WiFi SSID configured (credentials.toml or WIFI_SSID)");
    }

    let code = format!(
        "pub const WIFI_SSID: &str = {:?};\npub const WIFI_PASS: &str = {:?};\n",
        creds.wifi.ssid, creds.wifi.password
    );
    fs::write(out_dir.join("credentials.rs"), code)?;
    Ok(())
}

// Kalibrierung wird erst beim Start geparst; fehlt die Datei, scheitert der Start mit klarer Meldung
fn write_calibration(out_dir: &Path) -> Result<()> {
    let raw = fs::read_to_string("calibration.toml").unwrap_or_default();
    fs::write(out_dir.join("calibration.toml"), raw)?;
    Ok(())
}
