// AquaLog — Soft-AP & HTTP API
//
// The monitor runs its own access point; clients join it and talk to a
// small JSON/CSV API. Handlers run on the HTTP server's own threads and
// share the settings, the reading log, and the sampler with the controller
// task, so everything they touch is behind an Arc, an atomic, or a mutex.

use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use embedded_svc::http::Method;
use embedded_svc::io::{Read, Write};
use embedded_svc::wifi::{AccessPointConfiguration, AuthMethod, Configuration};
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::http::server::{
    Configuration as HttpConfiguration, EspHttpConnection, EspHttpServer, Request,
};
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};
use serde::Deserialize;

use crate::classifier::{classify, Validity};
use crate::config::*;
use crate::events::SensorError;
use crate::drivers::rtc::{DateTime, Ds3231};
use crate::drivers::ultrasonic::Ultrasonic;
use crate::settings::Settings;
use crate::storage::DataLog;

const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Water Level Monitor</title>
  <style>
    body{font-family:Arial,sans-serif;max-width:560px;margin:2rem auto;padding:0 1rem;color:#111}
    .card{border:1px solid #ddd;border-radius:10px;padding:1rem;margin-bottom:1rem}
    .big{font-size:2.2rem}.muted{color:#555}
    button{padding:.55rem .9rem}
  </style>
</head>
<body>
  <h1>Water Level Monitor</h1>
  <div class="card">
    <div class="big"><span id="level">--</span> cm</div>
    <p class="muted">Measured at <span id="time">--</span></p>
    <button id="refresh">Refresh</button>
  </div>
  <div class="card">
    <a href="/api/data">Download log (CSV)</a>
  </div>
  <script>
    async function refresh(){
      const el=document.getElementById('level'),tl=document.getElementById('time');
      try{
        const r=await fetch('/api/current');
        const b=await r.json();
        if(r.ok){el.textContent=b.level.toFixed(2);tl.textContent=b.time;}
        else{el.textContent='--';tl.textContent=b.error;}
      }catch(_){el.textContent='--';}
    }
    document.getElementById('refresh').addEventListener('click',refresh);
    refresh();
  </script>
</body>
</html>"#;

// ---------------------------------------------------------------------------
// WiFi soft AP
// ---------------------------------------------------------------------------

pub fn start_access_point(
    modem: Modem,
    sys_loop: EspSystemEventLoop,
    nvs: EspDefaultNvsPartition,
) -> anyhow::Result<BlockingWifi<EspWifi<'static>>> {
    let mut wifi = BlockingWifi::wrap(
        EspWifi::new(modem, sys_loop.clone(), Some(nvs))?,
        sys_loop,
    )?;

    wifi.set_configuration(&Configuration::AccessPoint(AccessPointConfiguration {
        ssid: AP_SSID.try_into().map_err(|_| anyhow!("AP SSID too long"))?,
        password: AP_PASSWORD
            .try_into()
            .map_err(|_| anyhow!("AP password too long"))?,
        channel: AP_CHANNEL,
        auth_method: AuthMethod::WPA2Personal,
        ..Default::default()
    }))?;

    wifi.start()?;
    wifi.wait_netif_up()?;
    log::info!("Access point '{}' up", AP_SSID);

    Ok(wifi)
}

// ---------------------------------------------------------------------------
// HTTP API
// ---------------------------------------------------------------------------

/// Everything the request handlers share with the controller task.
#[derive(Clone)]
pub struct ApiContext {
    pub sampler: Arc<Mutex<Ultrasonic<'static>>>,
    pub rtc: Ds3231,
    pub settings: Arc<Settings>,
    pub data_log: Arc<DataLog>,
}

#[derive(Deserialize)]
struct SettingsUpdate {
    interval_ms: Option<u32>,
    calibration: Option<f32>,
}

#[derive(Deserialize)]
struct TimeUpdate {
    date: String,
    time: String,
}

pub fn start_http_server(ctx: ApiContext) -> anyhow::Result<EspHttpServer<'static>> {
    let conf = HttpConfiguration {
        stack_size: HTTP_STACK_SIZE,
        ..Default::default()
    };

    let mut server = EspHttpServer::new(&conf)?;

    server.fn_handler::<anyhow::Error, _>("/", Method::Get, move |req| {
        req.into_response(200, Some("OK"), &[("Content-Type", "text/html; charset=utf-8")])?
            .write_all(INDEX_HTML.as_bytes())?;
        Ok(())
    })?;

    {
        let sampler = ctx.sampler.clone();
        let settings = ctx.settings.clone();
        let rtc = ctx.rtc;
        server.fn_handler::<anyhow::Error, _>("/api/current", Method::Get, move |req| {
            let sample = sampler.lock().unwrap().measure(settings.calibration_cm());
            match classify(sample) {
                Validity::Valid(level) => {
                    let time = match rtc.now() {
                        Ok(t) => t.to_string(),
                        Err(e) => {
                            log::error!("RTC read failed: {}", e);
                            String::new()
                        }
                    };
                    write_json(req, 200, &serde_json::json!({ "level": level, "time": time }))
                }
                Validity::Invalid => {
                    let message = reading_error_message(sample);
                    write_json(req, 503, &serde_json::json!({ "error": message }))
                }
            }
        })?;
    }

    {
        let data_log = ctx.data_log.clone();
        server.fn_handler::<anyhow::Error, _>("/api/data", Method::Get, move |req| {
            match data_log.read_all() {
                Ok(lines) => {
                    let mut resp =
                        req.into_response(200, Some("OK"), &[("Content-Type", "text/csv")])?;
                    for line in lines {
                        resp.write_all(line.as_bytes())?;
                        resp.write_all(b"\n")?;
                    }
                    Ok(())
                }
                Err(e) => {
                    log::error!("Reading log unavailable: {}", e);
                    write_json(req, 500, &serde_json::json!({ "error": "log unavailable" }))
                }
            }
        })?;
    }

    {
        let settings = ctx.settings.clone();
        server.fn_handler::<anyhow::Error, _>("/api/settings", Method::Post, move |mut req| {
            let body = read_body(&mut req)?;
            let update: SettingsUpdate = match serde_json::from_slice(&body) {
                Ok(u) => u,
                Err(_) => {
                    return write_json(req, 400, &serde_json::json!({ "error": "invalid settings payload" }))
                }
            };

            if update.interval_ms == Some(0) {
                return write_json(req, 400, &serde_json::json!({ "error": "interval must be positive" }));
            }
            if matches!(update.calibration, Some(c) if !c.is_finite()) {
                return write_json(req, 400, &serde_json::json!({ "error": "calibration must be finite" }));
            }

            if let Some(ms) = update.interval_ms {
                settings.set_interval_ms(ms);
                log::info!("Sample interval set to {} ms", ms);
            }
            if let Some(offset) = update.calibration {
                settings.set_calibration_cm(offset);
                log::info!("Calibration offset set to {} cm", offset);
            }

            write_json(
                req,
                200,
                &serde_json::json!({
                    "interval_ms": settings.interval_ms(),
                    "calibration": settings.calibration_cm(),
                }),
            )
        })?;
    }

    {
        let rtc = ctx.rtc;
        server.fn_handler::<anyhow::Error, _>("/api/time", Method::Post, move |mut req| {
            let body = read_body(&mut req)?;
            let update: TimeUpdate = match serde_json::from_slice(&body) {
                Ok(u) => u,
                Err(_) => {
                    return write_json(req, 400, &serde_json::json!({ "error": "invalid time payload" }))
                }
            };

            let dt = match DateTime::parse(&update.date, &update.time) {
                Some(dt) => dt,
                None => {
                    return write_json(req, 400, &serde_json::json!({ "error": "invalid date/time" }))
                }
            };

            match rtc.set(&dt) {
                Ok(()) => {
                    log::info!("RTC set to {}", dt);
                    write_json(req, 200, &serde_json::json!({ "time": dt.to_string() }))
                }
                Err(e) => {
                    log::error!("RTC write failed: {}", e);
                    write_json(req, 500, &serde_json::json!({ "error": "rtc write failed" }))
                }
            }
        })?;
    }

    {
        let data_log = ctx.data_log.clone();
        server.fn_handler::<anyhow::Error, _>("/api/delete", Method::Post, move |req| {
            match data_log.clear() {
                Ok(()) => {
                    log::info!("Reading log cleared");
                    write_json(req, 200, &serde_json::json!({ "cleared": true }))
                }
                Err(e) => {
                    log::error!("Log clear failed: {}", e);
                    write_json(req, 500, &serde_json::json!({ "error": "clear failed" }))
                }
            }
        })?;
    }

    Ok(server)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_body(req: &mut Request<&mut EspHttpConnection>) -> anyhow::Result<Vec<u8>> {
    let mut body = Vec::new();
    let mut buf = [0u8; 256];
    loop {
        let n = req.read(&mut buf)?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&buf[..n]);
        if body.len() > MAX_HTTP_BODY {
            anyhow::bail!("request body too large");
        }
    }
    Ok(body)
}

fn write_json(
    req: Request<&mut EspHttpConnection>,
    status: u16,
    payload: &serde_json::Value,
) -> anyhow::Result<()> {
    let body = serde_json::to_vec(payload)?;
    req.into_response(status, None, &[("Content-Type", "application/json")])?
        .write_all(&body)?;
    Ok(())
}

/// Error text for a sample that failed classification: a timeout is named
/// as such, while a finite but implausible distance gets its own message.
fn reading_error_message(sample: Result<f32, SensorError>) -> &'static str {
    match sample {
        Err(SensorError::Timeout) => "sensor timeout",
        Ok(_) => "implausible reading",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_and_out_of_range_report_different_causes() {
        assert_eq!(
            reading_error_message(Err(SensorError::Timeout)),
            "sensor timeout"
        );
        // Finite but beyond the plausible range — not a timeout.
        assert_eq!(reading_error_message(Ok(9999.0)), "implausible reading");
    }
}
