// Scout Engine — MCP stdio transport.
// Spawns a child process and communicates via JSON-RPC over stdin/stdout
// using Content-Length framed messages (same framing as LSP). Grounded on
// the teacher's `engine/mcp/transport.rs` StdioTransport.

use super::types::{JsonRpcRequest, JsonRpcResponse};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Mutex};

pub struct StdioTransport {
    writer_tx: mpsc::Sender<Vec<u8>>,
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>,
    child: Arc<Mutex<Option<Child>>>,
    _reader_handle: tokio::task::JoinHandle<()>,
    _writer_handle: tokio::task::JoinHandle<()>,
}

impl StdioTransport {
    pub async fn spawn(command: &str, args: &[String], env: &HashMap<String, String>) -> Result<Self, String> {
        info!("[mcp] spawning: {command} {}", args.join(" "));

        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());
        for (k, v) in env {
            cmd.env(k, v);
        }

        let mut child = cmd.spawn().map_err(|e| format!("failed to spawn MCP server `{command}`: {e}"))?;
        let stdin = child.stdin.take().ok_or("failed to open stdin")?;
        let stdout = child.stdout.take().ok_or("failed to open stdout")?;
        let stderr = child.stderr.take().ok_or("failed to open stderr")?;

        let pending: Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>> = Arc::new(Mutex::new(HashMap::new()));

        let (writer_tx, mut writer_rx) = mpsc::channel::<Vec<u8>>(64);
        let _writer_handle = {
            let mut stdin = stdin;
            tokio::spawn(async move {
                while let Some(msg) = writer_rx.recv().await {
                    let frame = format!("Content-Length: {}\r\n\r\n", msg.len());
                    if stdin.write_all(frame.as_bytes()).await.is_err() {
                        break;
                    }
                    if stdin.write_all(&msg).await.is_err() {
                        break;
                    }
                    if stdin.flush().await.is_err() {
                        break;
                    }
                }
                debug!("[mcp] writer task exiting");
            })
        };

        let _reader_handle = {
            let pending = Arc::clone(&pending);
            let mut reader = BufReader::new(stdout);
            tokio::spawn(async move {
                loop {
                    match read_message(&mut reader).await {
                        Ok(Some(data)) => match serde_json::from_slice::<JsonRpcResponse>(&data) {
                            Ok(resp) => {
                                if let Some(id) = resp.id {
                                    let mut map = pending.lock().await;
                                    if let Some(tx) = map.remove(&id) {
                                        let _ = tx.send(resp);
                                    }
                                }
                            }
                            Err(e) => warn!("[mcp] failed to parse response: {e}"),
                        },
                        Ok(None) => {
                            info!("[mcp] stdout closed (server exited)");
                            break;
                        }
                        Err(e) => {
                            error!("[mcp] read error: {e}");
                            break;
                        }
                    }
                }
            })
        };

        tokio::spawn(async move {
            let mut reader = BufReader::new(stderr);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => break,
                    Ok(_) => {
                        let trimmed = line.trim();
                        if !trimmed.is_empty() {
                            debug!("[mcp:stderr] {trimmed}");
                        }
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(StdioTransport { writer_tx, pending, child: Arc::new(Mutex::new(Some(child))), _reader_handle, _writer_handle })
    }

    pub async fn send_request(&self, request: JsonRpcRequest, timeout_secs: u64) -> Result<JsonRpcResponse, String> {
        let id = request.id;
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let body = serde_json::to_vec(&request).map_err(|e| e.to_string())?;
        self.writer_tx.send(body).await.map_err(|_| "transport writer closed".to_string())?;

        tokio::time::timeout(std::time::Duration::from_secs(timeout_secs), rx)
            .await
            .map_err(|_| format!("MCP request timed out after {timeout_secs}s (id={id})"))?
            .map_err(|_| "response channel dropped".to_string())
    }

    pub async fn send_notification(&self, method: &str, params: Option<serde_json::Value>) -> Result<(), String> {
        let notif = serde_json::json!({ "jsonrpc": "2.0", "method": method, "params": params.unwrap_or(serde_json::json!({})) });
        let body = serde_json::to_vec(&notif).map_err(|e| e.to_string())?;
        self.writer_tx.send(body).await.map_err(|_| "transport writer closed".to_string())
    }

    pub async fn shutdown(&self) {
        let mut guard = self.child.lock().await;
        if let Some(ref mut child) = *guard {
            let _ = child.kill().await;
        }
        *guard = None;
    }
}

async fn read_message<R: tokio::io::AsyncRead + Unpin>(reader: &mut BufReader<R>) -> Result<Option<Vec<u8>>, String> {
    let mut content_length: Option<usize> = None;
    let mut header_line = String::new();

    loop {
        header_line.clear();
        let n = reader.read_line(&mut header_line).await.map_err(|e| format!("header read error: {e}"))?;
        if n == 0 {
            return Ok(None);
        }
        let trimmed = header_line.trim();
        if trimmed.is_empty() {
            break;
        }
        if let Some(val) = trimmed.strip_prefix("Content-Length:") {
            content_length = val.trim().parse::<usize>().ok();
        }
    }

    let len = content_length.ok_or("missing Content-Length header")?;
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await.map_err(|e| format!("body read error: {e}"))?;
    Ok(Some(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_message_parses_content_length_frame() {
        let data = b"Content-Length: 13\r\n\r\n{\"test\":true}";
        let mut reader = BufReader::new(&data[..]);
        let result = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(result, b"{\"test\":true}");
    }

    #[tokio::test]
    async fn read_message_eof_yields_none() {
        let data = b"";
        let mut reader = BufReader::new(&data[..]);
        assert!(read_message(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn read_message_ignores_unknown_headers() {
        let data = b"Content-Length: 2\r\nContent-Type: application/json\r\n\r\n{}";
        let mut reader = BufReader::new(&data[..]);
        assert_eq!(read_message(&mut reader).await.unwrap().unwrap(), b"{}");
    }
}
