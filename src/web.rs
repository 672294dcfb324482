use crate::config::Reading;

/// Full status page for the given snapshot. Pure; the same inputs always
/// give the same document.
pub fn render_status(reading: &Reading, threshold_w: f32, refresh_secs: u64) -> String {
    let (state, class) = if reading.load_connected {
        ("CONNECTED", "on")
    } else {
        ("DISCONNECTED", "off")
    };
    format!(
        r#"<!doctype html>
<html lang="en">
<meta charset="utf-8" />
<meta name="viewport" content="width=device-width,initial-scale=1" />
<meta http-equiv="refresh" content="{refresh_secs}" />
<title>ESP32 – Load Guardian</title>
<style>
  body {{ font: 16px/1.4 system-ui, sans-serif; margin: 0; padding: 16px; background:#0b1020; color:#eaeef5; }}
  h1 {{ font-weight: 600; margin: 0 0 12px; }}
  .grid {{ display:grid; gap:12px; grid-template-columns: repeat(auto-fit, minmax(220px,1fr)); }}
  .card {{ background:#111831; border-radius:14px; padding:14px; box-shadow: 0 1px 0 #0008 inset, 0 1px 20px #0006; }}
  .kpi {{ font-size:28px; font-weight:700; margin-top:6px; }}
  .on {{ color:#4ade80; }}
  .off {{ color:#f87171; }}
</style>
<h1>Load Guardian</h1>

<div class="grid">
  <div class="card">
    <div>Voltage</div>
    <div id="voltage" class="kpi">{voltage:.2} V</div>
  </div>

  <div class="card">
    <div>Current</div>
    <div id="current" class="kpi">{current:.3} A</div>
  </div>

  <div class="card">
    <div>Power</div>
    <div id="power" class="kpi">{power:.2} W</div>
  </div>

  <div class="card">
    <div>Load</div>
    <div id="load" class="kpi {class}">{state}</div>
    <div style="margin-top:10px;opacity:.8">Threshold: <span id="threshold">{threshold_w:.2} W</span></div>
  </div>
</div>
</html>
"#,
        voltage = reading.voltage,
        current = reading.current,
        power = reading.power,
    )
}

#[cfg(target_os = "espidf")]
pub use esp::start_web;

#[cfg(target_os = "espidf")]
mod esp {
    use std::sync::{Arc, Mutex};

    use anyhow::{anyhow, Result};
    use embedded_svc::http::Method;
    use embedded_svc::io::Write;
    use esp_idf_svc::http::server::{Configuration, EspHttpServer};

    use super::render_status;
    use crate::config::Reading;

    /// `GET /` only. The handler renders the snapshot published by the
    /// control loop and never touches the hardware.
    pub fn start_web(
        state: Arc<Mutex<Reading>>,
        threshold_w: f32,
        refresh_secs: u64,
    ) -> Result<EspHttpServer<'static>> {
        let cfg = Configuration {
            stack_size: 12 * 1024,
            ..Default::default()
        };
        let mut server = EspHttpServer::new(&cfg)?;

        server.fn_handler("/", Method::Get, move |req| -> anyhow::Result<()> {
            let snapshot = state
                .lock()
                .map_err(|_| anyhow!("reading snapshot lock poisoned"))?
                .clone();
            let body = render_status(&snapshot, threshold_w, refresh_secs);
            let headers = [("Content-Type", "text/html; charset=utf-8")];
            let mut resp = req.into_response(200, Some("OK"), &headers)?;
            resp.write_all(body.as_bytes())?;
            Ok(())
        })?;

        Ok(server)
    }
}
