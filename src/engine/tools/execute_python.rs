// Scout Engine — execute_python (C4.4.2).
// Grounded on `chat/tools/execute_python.py`: lazily creates a sandbox,
// reuses it across calls within the same turn, saves each rich-output
// result under analysis/{images,data,reports}/ with a continuation
// sequence number, and tears the sandbox down at end of turn.

use crate::atoms::types::{FunctionDefinition, GeneratedFile, SandboxResult, ToolDefinition};
use crate::engine::providers::e2b::{CellResult, E2bSandbox};
use crate::engine::workspace::Workspace;
use serde_json::json;

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        tool_type: "function".into(),
        function: FunctionDefinition {
            name: "execute_python".into(),
            description: "Execute Python code in a secure sandbox for data analysis and visualization. Images save to analysis/images/plot_NNN.{ext}, data to analysis/data/output_NNN.{ext}, reports to analysis/reports/report_NNN.{ext}. Variables persist across calls within the same conversation. Available: numpy, pandas, matplotlib, seaborn, plotly, scipy, sklearn.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "code": { "type": "string", "description": "The python code to execute in a single cell" }
                },
                "required": ["code"]
            }),
        },
    }
}

pub async fn execute(workspace: &Workspace, sandbox: &E2bSandbox, code: &str) -> SandboxResult {
    let start = std::time::Instant::now();
    match sandbox.run_code(code).await {
        Ok(execution) => {
            let mut text_outputs = Vec::new();
            let mut files_generated = Vec::new();

            if let Some(text) = &execution.text {
                text_outputs.push(text.clone());
            }

            for result in &execution.results {
                save_result(workspace, result, &mut text_outputs, &mut files_generated);
            }

            let output = if text_outputs.is_empty() {
                "Code executed successfully (no output)".to_string()
            } else {
                text_outputs.join("\n\n")
            };

            SandboxResult {
                success: execution.error.is_none(),
                output,
                files_generated,
                execution_time: start.elapsed().as_secs_f64(),
                error: execution.error.clone(),
            }
        }
        Err(e) => SandboxResult {
            success: false,
            output: String::new(),
            files_generated: Vec::new(),
            execution_time: start.elapsed().as_secs_f64(),
            error: Some(format!("Sandbox execution failed: {e}")),
        },
    }
}

fn save_result(workspace: &Workspace, result: &CellResult, text_outputs: &mut Vec<String>, files: &mut Vec<GeneratedFile>) {
    if let Some(png) = &result.png {
        if let Some(f) = save_image(workspace, png, "png") {
            text_outputs.push(format!("Generated: {}", f.path));
            files.push(f);
        }
    }
    if let Some(jpeg) = &result.jpeg {
        if let Some(f) = save_image(workspace, jpeg, "jpeg") {
            text_outputs.push(format!("Generated: {}", f.path));
            files.push(f);
        }
    }
    if let Some(svg) = &result.svg {
        if let Some(f) = save_data(workspace, svg, "svg") {
            text_outputs.push(format!("Generated: {}", f.path));
            files.push(f);
        }
    }
    if let Some(pdf) = &result.pdf {
        if let Some(f) = save_pdf_report(workspace, pdf) {
            text_outputs.push(format!("Generated: {}", f.path));
            files.push(f);
        }
    }
    if let Some(html) = &result.html {
        if let Some(f) = save_text_report(workspace, html, "html") {
            text_outputs.push(format!("Generated: {}", f.path));
            files.push(f);
        }
    }
    if let Some(markdown) = &result.markdown {
        if let Some(f) = save_text_report(workspace, markdown, "md") {
            text_outputs.push(format!("Generated: {}", f.path));
            files.push(f);
        }
    }
    if let Some(value) = &result.json {
        let json_str = serde_json::to_string_pretty(value).unwrap_or_default();
        if let Some(f) = save_data(workspace, &json_str, "json") {
            text_outputs.push(format!("Generated: {}", f.path));
            files.push(f);
        }
    }
    if let Some(text) = &result.text {
        if !text_outputs.contains(text) {
            text_outputs.push(text.clone());
        }
    }
}

fn save_image(workspace: &Workspace, base64_data: &str, extension: &str) -> Option<GeneratedFile> {
    let seq = workspace.next_sequence("analysis/images", "plot");
    let filename = format!("plot_{seq:03}.{extension}");
    let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, base64_data).ok()?;
    let path = workspace.root().join("analysis/images").join(&filename);
    std::fs::write(&path, &bytes).ok()?;
    Some(GeneratedFile {
        path: format!("analysis/images/{filename}"),
        file_type: format!("image/{extension}"),
        size_kb: (bytes.len() as f64 / 1024.0 * 100.0).round() / 100.0,
    })
}

fn save_data(workspace: &Workspace, content: &str, extension: &str) -> Option<GeneratedFile> {
    let seq = workspace.next_sequence("analysis/data", "output");
    let filename = format!("output_{seq:03}.{extension}");
    let path = workspace.root().join("analysis/data").join(&filename);
    std::fs::write(&path, content).ok()?;
    Some(GeneratedFile {
        path: format!("analysis/data/{filename}"),
        file_type: format!("data/{extension}"),
        size_kb: (content.len() as f64 / 1024.0 * 100.0).round() / 100.0,
    })
}

fn save_text_report(workspace: &Workspace, content: &str, extension: &str) -> Option<GeneratedFile> {
    let seq = workspace.next_sequence("analysis/reports", "report");
    let filename = format!("report_{seq:03}.{extension}");
    let path = workspace.root().join("analysis/reports").join(&filename);
    std::fs::write(&path, content).ok()?;
    Some(GeneratedFile {
        path: format!("analysis/reports/{filename}"),
        file_type: format!("report/{extension}"),
        size_kb: (content.len() as f64 / 1024.0 * 100.0).round() / 100.0,
    })
}

fn save_pdf_report(workspace: &Workspace, base64_data: &str) -> Option<GeneratedFile> {
    let seq = workspace.next_sequence("analysis/reports", "report");
    let filename = format!("report_{seq:03}.pdf");
    let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, base64_data).ok()?;
    let path = workspace.root().join("analysis/reports").join(&filename);
    std::fs::write(&path, &bytes).ok()?;
    Some(GeneratedFile {
        path: format!("analysis/reports/{filename}"),
        file_type: "report/pdf".into(),
        size_kb: (bytes.len() as f64 / 1024.0 * 100.0).round() / 100.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_ws(tag: &str) -> Workspace {
        let root = std::env::temp_dir().join(format!("scout-engine-execpy-{tag}-{}", uuid::Uuid::new_v4()));
        Workspace::ensure(root).unwrap()
    }

    #[test]
    fn save_data_uses_continuation_sequence() {
        let ws = tmp_ws("seq");
        std::fs::write(ws.root().join("analysis/data/output_001.json"), b"{}").unwrap();
        let f = save_data(&ws, "{\"a\":1}", "json").unwrap();
        assert_eq!(f.path, "analysis/data/output_002.json");
        let _ = ws.clean();
    }

    #[test]
    fn save_image_decodes_base64() {
        let ws = tmp_ws("img");
        let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, b"not really a png");
        let f = save_image(&ws, &encoded, "png").unwrap();
        assert_eq!(f.path, "analysis/images/plot_001.png");
        let _ = ws.clean();
    }
}
