use std::io::{self, Write};

use anyhow::Result;
use serde::Serialize;

use anistream::ResolveError;

/// Success body: `{"success": true, "data": ...}`.
#[derive(Serialize)]
struct SuccessEnvelope<'a, T: Serialize> {
    success: bool,
    data: &'a T,
}

/// Print the envelope for `result` on stdout.
///
/// Returns whether the command succeeded; failures also log their status.
pub fn print_envelope<T: Serialize>(
    result: std::result::Result<T, ResolveError>,
    pretty: bool,
) -> Result<bool> {
    match result {
        Ok(data) => {
            write_json(
                &SuccessEnvelope {
                    success: true,
                    data: &data,
                },
                pretty,
            )?;
            Ok(true)
        }
        Err(e) => {
            tracing::debug!(status = e.status_code(), error = %e, "Request failed");
            write_json(&e.envelope(), pretty)?;
            Ok(false)
        }
    }
}

fn write_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let body = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{body}")?;
    Ok(())
}
