// Scout Engine — file_read / file_write / file_list / file_edit (C4.4.3).
// Grounded on `chat/tools/{file_read,file_write,file_list,file_edit}.py`.
// Path containment is handled by `Workspace::resolve`; these wrappers only
// shape arguments and results into the tool-call envelope.

use crate::atoms::types::{FunctionDefinition, ToolDefinition};
use crate::engine::workspace::Workspace;
use serde_json::{json, Value};

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            tool_type: "function".into(),
            function: FunctionDefinition {
                name: "file_read".into(),
                description: "Read content from files in your workspace (progress.md, notes.md, draft.md, cache/*.md, analysis/*). Use file_list first to see what exists.".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "filename": { "type": "string", "description": "File name or path (e.g. 'notes.md', 'cache/article.txt')" }
                    },
                    "required": ["filename"]
                }),
            },
        },
        ToolDefinition {
            tool_type: "function".into(),
            function: FunctionDefinition {
                name: "file_write".into(),
                description: "Write or append content to a file in your workspace. Use append=false to overwrite progress.md/draft.md, append=true to accumulate notes.md.".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "filename": { "type": "string", "description": "File name or path (e.g. 'notes.md', 'cache/article.txt')" },
                        "content": { "type": "string", "description": "Content to write" },
                        "append": { "type": "boolean", "description": "If true, append to existing file; if false, overwrite (default: false)" }
                    },
                    "required": ["filename", "content"]
                }),
            },
        },
        ToolDefinition {
            tool_type: "function".into(),
            function: FunctionDefinition {
                name: "file_list".into(),
                description: "List files and directories in the workspace, recursively, with sizes.".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "path": { "type": "string", "description": "Subdirectory to list (default: workspace root)" }
                    }
                }),
            },
        },
        ToolDefinition {
            tool_type: "function".into(),
            function: FunctionDefinition {
                name: "file_edit".into(),
                description: "Edit a file by replacing exact old text with new text. Fails if the old text is not found, or if it is ambiguous (appears more than once). Use this for draft.md, notes.md, and other workspace files.".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "file_path": { "type": "string", "description": "File name or path to edit" },
                        "old_text": { "type": "string", "description": "Exact text to find (must match exactly once)" },
                        "new_text": { "type": "string", "description": "Text to replace it with" }
                    },
                    "required": ["file_path", "old_text", "new_text"]
                }),
            },
        },
    ]
}

pub fn execute(name: &str, args: &Value, workspace: &Workspace) -> Option<Value> {
    match name {
        "file_read" => Some(file_read(args, workspace)),
        "file_write" => Some(file_write(args, workspace)),
        "file_list" => Some(file_list(args, workspace)),
        "file_edit" => Some(file_edit(args, workspace)),
        _ => None,
    }
}

fn file_read(args: &Value, workspace: &Workspace) -> Value {
    let Some(filename) = args["filename"].as_str() else {
        return json!({ "success": false, "error": "missing 'filename' argument" });
    };
    match workspace.read(filename) {
        Ok(content) => json!({
            "success": true,
            "filename": filename,
            "size": content.len(),
            "content": content,
        }),
        Err(e) => json!({ "success": false, "error": e.to_string(), "hint": "Use file_list to see available files" }),
    }
}

fn file_write(args: &Value, workspace: &Workspace) -> Value {
    let (Some(filename), Some(content)) = (args["filename"].as_str(), args["content"].as_str()) else {
        return json!({ "success": false, "error": "missing 'filename' or 'content' argument" });
    };
    let append = args["append"].as_bool().unwrap_or(false);
    match workspace.write(filename, content, append) {
        Ok(()) => json!({
            "success": true,
            "operation": if append { "append" } else { "write" },
            "filename": filename,
            "size": content.len(),
            "message": format!("{} {} chars to '{}'", if append { "Appended" } else { "Wrote" }, content.len(), filename),
        }),
        Err(e) => json!({ "success": false, "error": e.to_string() }),
    }
}

fn file_list(args: &Value, workspace: &Workspace) -> Value {
    let path = args["path"].as_str().unwrap_or(".");
    match workspace.list(path) {
        Ok(entries) => json!({ "success": true, "path": path, "entries": entries }),
        Err(e) => json!({ "success": false, "error": e.to_string() }),
    }
}

fn file_edit(args: &Value, workspace: &Workspace) -> Value {
    let (Some(file_path), Some(old_text), Some(new_text)) =
        (args["file_path"].as_str(), args["old_text"].as_str(), args["new_text"].as_str())
    else {
        return json!({ "success": false, "error": "missing 'file_path', 'old_text', or 'new_text' argument" });
    };
    match workspace.edit(file_path, old_text, new_text) {
        Ok(()) => json!({
            "success": true,
            "file_path": file_path,
            "message": format!("Replaced text in '{file_path}'"),
        }),
        Err(e) => json!({ "success": false, "error": e.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_ws(tag: &str) -> Workspace {
        let root = std::env::temp_dir().join(format!("scout-engine-files-{tag}-{}", uuid::Uuid::new_v4()));
        Workspace::ensure(root).unwrap()
    }

    #[test]
    fn file_read_reports_missing_file() {
        let ws = tmp_ws("read-missing");
        let result = file_read(&json!({ "filename": "nope.md" }), &ws);
        assert_eq!(result["success"], false);
        let _ = ws.clean();
    }

    #[test]
    fn file_write_then_read_round_trips() {
        let ws = tmp_ws("write-read");
        let w = file_write(&json!({ "filename": "notes.md", "content": "hello", "append": false }), &ws);
        assert_eq!(w["success"], true);
        let r = file_read(&json!({ "filename": "notes.md" }), &ws);
        assert_eq!(r["content"], "hello");
        let _ = ws.clean();
    }

    #[test]
    fn file_edit_rejects_ambiguous_match() {
        let ws = tmp_ws("edit-ambiguous");
        file_write(&json!({ "filename": "notes.md", "content": "a a", "append": false }), &ws);
        let result = file_edit(&json!({ "file_path": "notes.md", "old_text": "a", "new_text": "b" }), &ws);
        assert_eq!(result["success"], false);
        let _ = ws.clean();
    }

    #[test]
    fn file_list_reports_workspace_entries() {
        let ws = tmp_ws("list");
        let result = file_list(&json!({}), &ws);
        assert_eq!(result["success"], true);
        assert!(result["entries"].as_array().unwrap().iter().any(|e| e["path"] == "progress.md"));
        let _ = ws.clean();
    }
}
