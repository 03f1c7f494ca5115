// Scout Engine — web_search (C4.4.1).
// Grounded on `chat/tools/web_search.py`: calls the search vendor, caches
// each result's full body under `cache/`, and returns a result envelope
// the React Loop turns into Source records and a rendered text block.

use crate::atoms::error::EngineResult;
use crate::atoms::types::{FunctionDefinition, ToolDefinition};
use crate::engine::providers::exa::ExaProvider;
use crate::engine::workspace::{sanitize_filename, unique_cache_path, Workspace};
use serde_json::{json, Value};

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        tool_type: "function".into(),
        function: FunctionDefinition {
            name: "web_search".into(),
            description: "Web search that automatically caches full article content. Returns titles, URLs, highlights, and saves complete content to cache/. Use this first to gather sources; use file_read to access cached articles, or research_assistant for deep analysis.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "The search query. Be specific and use natural language." },
                    "num_results": { "type": "integer", "description": "Number of results to return (default: 5, max: 10)", "minimum": 1, "maximum": 10 },
                    "search_type": { "type": "string", "enum": ["auto", "neural", "keyword", "fast"], "description": "Type of search: neural (semantic), keyword (exact match), fast (streamlined), auto (default, combines both)." },
                    "category": {
                        "type": "string",
                        "enum": ["company", "research paper", "news", "pdf", "github", "tweet", "personal site", "linkedin profile", "financial report"],
                        "description": "Focus the search on a specific data category for higher-quality results."
                    }
                },
                "required": ["query"]
            }),
        },
    }
}

/// One normalized result, before the React Loop assigns it a per-turn
/// citation index.
pub struct WebSearchItem {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub age: Option<String>,
    pub cache_path: Option<String>,
}

pub struct WebSearchOutcome {
    pub query: String,
    pub search_type: String,
    pub items: Vec<WebSearchItem>,
    pub error: Option<String>,
}

pub async fn execute(workspace: &Workspace, exa: &ExaProvider, args: &Value) -> WebSearchOutcome {
    let query = args["query"].as_str().unwrap_or_default().to_string();
    let num_results = args["num_results"].as_u64().unwrap_or(5).clamp(1, 10) as u32;
    let search_type = args["search_type"].as_str().unwrap_or("auto").to_string();

    match exa.search(&query, num_results, true, true).await {
        Ok(response) => {
            let mut items = Vec::with_capacity(response.results.len());
            for result in response.results {
                let snippet = if !result.highlights.is_empty() {
                    result.highlights.join(" ")
                } else {
                    String::new()
                };
                let cache_path = result
                    .content
                    .as_deref()
                    .filter(|c| !c.is_empty())
                    .and_then(|content| cache_result(workspace, &result.title, &result.url, result.age.as_deref(), content).ok());

                items.push(WebSearchItem {
                    url: result.url,
                    title: result.title,
                    snippet,
                    age: result.age,
                    cache_path,
                });
            }
            WebSearchOutcome { query, search_type, items, error: None }
        }
        Err(e) => WebSearchOutcome {
            query,
            search_type: "error".into(),
            items: Vec::new(),
            error: Some(format!("Web search failed: {e}")),
        },
    }
}

fn cache_result(workspace: &Workspace, title: &str, url: &str, age: Option<&str>, content: &str) -> EngineResult<String> {
    let stem = sanitize_filename(title);
    let (path, rel) = unique_cache_path(workspace, &stem);
    let body = format!("# {title}\n\n**URL**: {url}\n**Published**: {}\n\n---\n\n{content}", age.unwrap_or(""));
    std::fs::write(path, body)?;
    Ok(rel)
}

/// Render the tool-call-facing text block (spec §4.3). Chat Mode numbers
/// results with `[n]` labels to invite citations; Agent Mode uses bullets
/// only, since Agent Mode cites in the final HTML generation phase.
pub fn render_block(outcome: &WebSearchOutcome, start_index: usize, with_labels: bool) -> String {
    if let Some(err) = &outcome.error {
        return err.clone();
    }
    if outcome.items.is_empty() {
        return format!("No results found for '{}'.", outcome.query);
    }
    let mut out = format!("Search results for '{}' ({}):\n\n", outcome.query, outcome.search_type);
    for (offset, item) in outcome.items.iter().enumerate() {
        let label = if with_labels { format!("[{}] ", start_index + offset) } else { "- ".to_string() };
        out.push_str(&format!("{label}{} — {}\n", item.title, item.url));
        if !item.snippet.is_empty() {
            out.push_str(&format!("  {}\n", item.snippet));
        }
        if let Some(cache) = &item.cache_path {
            out.push_str(&format!("  cached: {cache}\n"));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_block_reports_error() {
        let outcome = WebSearchOutcome { query: "q".into(), search_type: "error".into(), items: Vec::new(), error: Some("boom".into()) };
        assert_eq!(render_block(&outcome, 1, true), "boom");
    }

    #[test]
    fn render_block_labels_results_in_chat_mode() {
        let outcome = WebSearchOutcome {
            query: "q".into(),
            search_type: "auto".into(),
            items: vec![WebSearchItem { url: "https://a".into(), title: "A".into(), snippet: "s".into(), age: None, cache_path: None }],
            error: None,
        };
        let block = render_block(&outcome, 1, true);
        assert!(block.contains("[1] A"));
    }

    #[test]
    fn render_block_uses_bullets_in_agent_mode() {
        let outcome = WebSearchOutcome {
            query: "q".into(),
            search_type: "auto".into(),
            items: vec![WebSearchItem { url: "https://a".into(), title: "A".into(), snippet: String::new(), age: None, cache_path: None }],
            error: None,
        };
        let block = render_block(&outcome, 1, false);
        assert!(block.contains("- A"));
        assert!(!block.contains("[1]"));
    }
}
