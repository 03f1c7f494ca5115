// Scout Engine — stop_answer / start_research (C4.4.6 / C4.4.7).
// Grounded on `chat/tools/stop_answer.py` and `chat/tools/start_research.py`.
// Both are control signals: the React Loop checks the proposal name before
// dispatching to the generic tool registry, so these never go through
// `tools::execute` — they only need a schema entry and their injection text.

use crate::atoms::types::{Artifact, FunctionDefinition, ToolDefinition};
use regex::RegexBuilder;
use serde_json::json;

pub const STOP_ANSWER_INJECTION: &str = "Based on all the information gathered above, please provide a comprehensive answer to the user's query. Include relevant citations and references to the sources you've accessed. Structure your response clearly and be thorough.";

pub const START_RESEARCH_GUIDANCE: &str = r#"Research Mode Activated - Full Tools Available

Your mission: become an expert on this topic through deep, exploratory research.

## Research Philosophy: Be Curious, Be Thorough, Be Bold

### 1. Search Expansively
- Don't just search the obvious keywords - think laterally, search related concepts, opposing views, historical context.
- Follow the thread - if you find an interesting mention, search deeper into that specific aspect.
- Keep searching until you feel confident - simple topics might need a few searches, complex ones need many more.

### 2. Read Full Articles, Not Just Snippets
- Snippets lack context. Use file_read(filename="cache/article_name.md") to read the full cached article.
- Use research_assistant to get a second opinion or a reading summary, then read the article yourself for details.

### 3. Write As You Learn
- Start notes.md early and update progress.md as your direction evolves.
- Draft iteratively into draft.md rather than all at once at the end.

### 4. Go Deep
- Quality over speed. Multiple research_assistant conversations are fine.

## Your Workflow
1. Broad search to identify key sources.
2. Deep read (file_read + research_assistant) to understand each source.
3. Document insights, questions, and connections in notes.md.
4. Expand search to fill gaps.
5. Repeat until you feel like an expert.
6. Synthesize everything into draft.md.
7. Call stop_answer when ready to generate the final HTML report."#;

/// Brief final-answer prompt used in Agent/HIL stage (no research materials
/// to inject).
pub const HIL_FINAL_ANSWER_PROMPT: &str = "Based on our conversation, please provide your response to the user's request.";

/// Full HTML-blog-generation prompt used in Agent/Research stage, populated
/// with the current contents of draft.md and notes.md.
pub fn research_final_answer_prompt(draft_content: &str, notes_content: &str) -> String {
    format!(
        r#"Research completed! Your research materials are provided below.

## Your Research Materials

### draft.md (your organized research with citations):
---
{draft_content}
---

### notes.md (additional insights and observations):
---
{notes_content}
---

## Now Generate the HTML Report

Use the materials above as your primary source, not memory alone.

### Deliverable 1: Brief Overview (2-3 paragraphs)
Summarize the key findings and tell the reader there is a full interactive report below.

### Deliverable 2: Deep Technical Report (HTML)

Write a comprehensive technical report in HTML: title and executive summary, introduction,
background, core analysis with clear headings, practical implications, conclusion, and a
references section with clickable citation links. All CSS and JavaScript must be inline;
no external dependencies. Use a clean, readable typographic style (system sans-serif,
~800px max content width, generous padding).

## Final Output Format

First output the brief overview text. Then output the complete HTML in a fenced code block:

```html
<!DOCTYPE html>
<html lang="en">
...your complete HTML here...
</html>
```"#
    )
}

pub fn stop_answer_definition() -> ToolDefinition {
    ToolDefinition {
        tool_type: "function".into(),
        function: FunctionDefinition {
            name: "stop_answer".into(),
            description: "Call this tool when you have gathered enough information and are ready to provide a comprehensive final answer to the user. This ends the tool-calling loop and generates the final response.".into(),
            parameters: json!({ "type": "object", "properties": {}, "required": [] }),
        },
    }
}

/// Returned as the final assistant message when a turn exhausts its
/// iteration budget without reaching `stop_answer`.
pub const MAX_ITERATIONS_FALLBACK: &str = "I need more iterations to complete this request.";

/// Pulls an `<!DOCTYPE html>...</html>` document out of a Research-stage
/// final answer, if present, splitting it from the overview text that
/// precedes it. Tries a fenced ```html block first, falling back to a bare
/// HTML span so a model that forgets the fence still produces an artifact.
pub fn extract_artifact(raw_message: &str) -> (String, Option<Artifact>) {
    let fenced = RegexBuilder::new(r"```html\s*(<!DOCTYPE html>.*?</html>)\s*```")
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .expect("static pattern");
    let bare = RegexBuilder::new(r"<!DOCTYPE html>.*?</html>")
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .expect("static pattern");

    let found = fenced
        .captures(raw_message)
        .map(|caps| (caps.get(0).unwrap().start(), caps.get(1).unwrap().as_str().to_string()))
        .or_else(|| bare.find(raw_message).map(|m| (m.start(), m.as_str().to_string())));

    let Some((match_start, html)) = found else {
        return (raw_message.to_string(), None);
    };

    let overview = raw_message[..match_start].replace("```html", "").replace("```", "");
    let overview = overview.trim().to_string();
    let overview = if overview.is_empty() { "Research completed. See interactive report below.".to_string() } else { overview };

    let title_re = RegexBuilder::new(r"<h1[^>]*>(.*?)</h1>").case_insensitive(true).build().expect("static pattern");
    let tag_re = regex::Regex::new(r"<[^>]+>").expect("static pattern");
    let title = title_re
        .captures(&html)
        .map(|caps| tag_re.replace_all(&caps[1], "").trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Research Report".to_string());

    let artifact = Artifact {
        artifact_type: "html_blog".into(),
        title,
        file_path: "artifact.html".into(),
        file_size_kb: (html.len() / 1024) as u64,
        html_content: html,
    };

    (overview, Some(artifact))
}

pub fn start_research_definition() -> ToolDefinition {
    ToolDefinition {
        tool_type: "function".into(),
        function: FunctionDefinition {
            name: "start_research".into(),
            description: "Call this immediately once the user responds to your clarifying questions. This is the required transition from chat-style confirmation into full research mode with the complete toolset. Do not wait for specific keywords — call it as soon as the user responds.".into(),
            parameters: json!({ "type": "object", "properties": {}, "required": [] }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn research_prompt_embeds_draft_and_notes() {
        let prompt = research_final_answer_prompt("draft body", "notes body");
        assert!(prompt.contains("draft body"));
        assert!(prompt.contains("notes body"));
    }

    #[test]
    fn extract_artifact_splits_fenced_html_and_overview() {
        let raw = "Here is a summary of the findings.\n\n```html\n<!DOCTYPE html><html><body><h1>My Report</h1></body></html>\n```";
        let (overview, artifact) = extract_artifact(raw);
        assert_eq!(overview, "Here is a summary of the findings.");
        let artifact = artifact.expect("artifact should be extracted");
        assert_eq!(artifact.title, "My Report");
        assert_eq!(artifact.artifact_type, "html_blog");
        assert!(artifact.html_content.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn extract_artifact_falls_back_to_bare_html_span() {
        let raw = "<!DOCTYPE html><html><body>no heading here</body></html>";
        let (overview, artifact) = extract_artifact(raw);
        assert_eq!(overview, "Research completed. See interactive report below.");
        assert_eq!(artifact.unwrap().title, "Research Report");
    }

    #[test]
    fn extract_artifact_returns_none_when_no_html_present() {
        let raw = "Just a plain chat answer, no report.";
        let (overview, artifact) = extract_artifact(raw);
        assert_eq!(overview, raw);
        assert!(artifact.is_none());
    }
}
