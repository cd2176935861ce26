use anyhow::{Context, Result, bail};
use serde_json::json;

use drone_probe::{ClientConfig, DroneClient};

use crate::cli::SendOpts;

pub fn run(opts: SendOpts) -> Result<()> {
    let mut client = DroneClient::new(ClientConfig {
        port: opts.dev.port,
        timeout: opts.dev.timeout(),
    });
    client
        .connect(opts.dev.ip)
        .with_context(|| format!("connecting to {}:{}", opts.dev.ip, opts.dev.port))?;

    let out = match opts.action.command() {
        Some(cmd) => match client.send(cmd) {
            Ok(resp) => json!({
                "success": resp.success,
                "response": resp.payload,
                "error": resp.error,
            }),
            Err(e) => json!({"success": false, "error": e.to_string(), "code": e.code()}),
        },
        None => {
            let report = client.get_status();
            json!({
                "connected": true,
                "status": report.status,
                "fresh": report.is_fresh(),
                "error": report.error.as_ref().map(|e| e.to_string()),
                "code": report.error.as_ref().map(|e| e.code()),
            })
        }
    };
    client.disconnect();

    println!("{}", serde_json::to_string_pretty(&out)?);
    if out["success"] == json!(false) || out["fresh"] == json!(false) {
        bail!("device command failed");
    }
    Ok(())
}
