//! Line-oriented tool-call transport over stdin/stdout.
//!
//! One JSON request object per line: `{"tool": "mw_kb_search", "params":
//! {...}, "id": 7}`. The optional `id` is echoed back wrapping the result.
//! Malformed lines and unknown tools are answered in-band; the loop only
//! ends at EOF.

use std::io::Write;

use color_eyre::eyre::Result;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use mwkb_core::{KbService, ops};

/// One request line.
#[derive(Debug, Deserialize)]
struct ToolRequest {
    /// Tool name, e.g. `mw_kb_search`.
    tool: String,
    /// Tool parameter object.
    #[serde(default)]
    params: Value,
    /// Opaque correlation id, echoed back when present.
    #[serde(default)]
    id: Option<Value>,
}

/// Read requests from stdin until EOF, answering one JSON line each.
pub(crate) async fn run(service: &KbService) -> Result<()> {
    info!(tools = ?ops::TOOL_NAMES, "serving knowledge-base tools on stdio");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<ToolRequest>(line) {
            Ok(request) => {
                debug!(tool = %request.tool, "dispatching tool call");
                let result = ops::dispatch(service, &request.tool, request.params).await;
                match request.id {
                    Some(id) => json!({ "id": id, "result": result }),
                    None => result,
                }
            }
            Err(e) => json!({
                "status": "error",
                "message": format!("malformed request: {e}"),
            }),
        };

        let mut stdout = std::io::stdout().lock();
        serde_json::to_writer(&mut stdout, &response)?;
        stdout.write_all(b"\n")?;
        stdout.flush()?;
    }

    info!("stdin closed, shutting down");
    Ok(())
}
