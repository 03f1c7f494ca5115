// Scout Engine — Workspace (C2).
// Per-session sandboxed filesystem tree with fixed template files, wiped
// at the end of every turn. Grounded on the teacher's `engine/workspace.rs`
// path-containment pattern, adapted from a persistent per-agent workspace
// to an ephemeral per-session one per spec §4.2 / §6.

use crate::atoms::error::{EngineError, EngineResult};
use std::path::{Path, PathBuf};

const PROGRESS_TEMPLATE: &str = "# Research Progress\n\n- (nothing recorded yet)\n";
const NOTES_TEMPLATE: &str = "# Notes\n\n";
const DRAFT_TEMPLATE: &str = "# Draft\n\n";

pub struct Workspace {
    root: PathBuf,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct FileEntry {
    pub path: String,
    pub size_bytes: u64,
    pub is_dir: bool,
}

impl Workspace {
    /// Lazily create the workspace root and seed template files if absent.
    pub fn ensure(root: PathBuf) -> EngineResult<Self> {
        std::fs::create_dir_all(&root)?;
        std::fs::create_dir_all(root.join("cache"))?;
        std::fs::create_dir_all(root.join("analysis/images"))?;
        std::fs::create_dir_all(root.join("analysis/data"))?;
        std::fs::create_dir_all(root.join("analysis/reports"))?;
        std::fs::create_dir_all(root.join("conversations"))?;

        seed_if_absent(&root.join("progress.md"), PROGRESS_TEMPLATE)?;
        seed_if_absent(&root.join("notes.md"), NOTES_TEMPLATE)?;
        seed_if_absent(&root.join("draft.md"), DRAFT_TEMPLATE)?;

        Ok(Workspace { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Remove the workspace root recursively (spec §4.2 cleanup rule). The
    /// caller is responsible for copying the artifact into the persisted
    /// ChatResponse first.
    pub fn clean(&self) -> EngineResult<()> {
        if self.root.exists() {
            std::fs::remove_dir_all(&self.root)?;
        }
        Ok(())
    }

    /// Resolve `raw` against the workspace root and verify the result is a
    /// descendant of the root after symlink/`..` resolution (spec §3
    /// invariant (d)). Works for paths that do not yet exist by
    /// canonicalizing the nearest existing ancestor.
    pub fn resolve(&self, raw: &str) -> EngineResult<PathBuf> {
        let candidate = if Path::new(raw).is_absolute() {
            PathBuf::from(raw)
        } else {
            self.root.join(raw)
        };

        let root_canon = self.root.canonicalize().unwrap_or_else(|_| self.root.clone());

        let resolved = if candidate.exists() {
            candidate.canonicalize()?
        } else {
            let parent = candidate.parent().ok_or_else(|| {
                EngineError::Workspace(format!("invalid path: {raw}"))
            })?;
            std::fs::create_dir_all(parent)?;
            let parent_canon = parent.canonicalize()?;
            parent_canon.join(candidate.file_name().ok_or_else(|| {
                EngineError::Workspace(format!("invalid path: {raw}"))
            })?)
        };

        if !resolved.starts_with(&root_canon) {
            return Err(EngineError::Workspace(format!(
                "security error: path outside workspace: {raw}"
            )));
        }
        Ok(resolved)
    }

    pub fn read(&self, raw: &str) -> EngineResult<String> {
        let path = self.resolve(raw)?;
        if !path.exists() {
            return Err(EngineError::Workspace(format!("file not found: {raw}")));
        }
        Ok(std::fs::read_to_string(path)?)
    }

    pub fn write(&self, raw: &str, content: &str, append: bool) -> EngineResult<()> {
        let path = self.resolve(raw)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if append {
            use std::io::Write;
            let mut f = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
            f.write_all(content.as_bytes())?;
        } else {
            std::fs::write(path, content)?;
        }
        Ok(())
    }

    /// Recursive listing with sizes, paths relative to the workspace root.
    pub fn list(&self, raw: &str) -> EngineResult<Vec<FileEntry>> {
        let path = self.resolve(raw)?;
        let root_canon = self.root.canonicalize().unwrap_or_else(|_| self.root.clone());
        let mut out = Vec::new();
        walk(&path, &root_canon, &mut out)?;
        Ok(out)
    }

    /// Single-occurrence find-and-replace. Fails on zero or >=2 matches.
    pub fn edit(&self, raw: &str, old_text: &str, new_text: &str) -> EngineResult<()> {
        let path = self.resolve(raw)?;
        if !path.exists() {
            return Err(EngineError::Workspace(format!("file not found: {raw}")));
        }
        let original = std::fs::read_to_string(&path)?;
        let occurrences = original.matches(old_text).count();
        if occurrences == 0 {
            return Err(EngineError::Workspace(format!(
                "text not found in {raw}: old_text must match exactly"
            )));
        }
        if occurrences > 1 {
            return Err(EngineError::Workspace(format!(
                "ambiguous replacement: text appears {occurrences} times in {raw}"
            )));
        }
        let updated = original.replacen(old_text, new_text, 1);
        std::fs::write(path, updated)?;
        Ok(())
    }

    /// Write the final HTML artifact once, at extraction time.
    pub fn write_artifact(&self, html: &str) -> EngineResult<PathBuf> {
        let path = self.root.join("artifact.html");
        std::fs::write(&path, html)?;
        Ok(path)
    }

    /// Continuation sequence for `execute_python` output files: scans the
    /// directory for `{prefix}_NNN.*` and returns max(NNN) + 1.
    pub fn next_sequence(&self, subdir: &str, prefix: &str) -> u32 {
        let dir = self.root.join(subdir);
        let mut max_num = 0u32;
        if let Ok(entries) = std::fs::read_dir(&dir) {
            for entry in entries.flatten() {
                if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
                    if let Some(rest) = stem.strip_prefix(&format!("{prefix}_")) {
                        if let Ok(n) = rest.parse::<u32>() {
                            max_num = max_num.max(n);
                        }
                    }
                }
            }
        }
        max_num + 1
    }
}

fn seed_if_absent(path: &Path, template: &str) -> EngineResult<()> {
    if !path.exists() {
        std::fs::write(path, template)?;
    }
    Ok(())
}

fn walk(dir: &Path, root: &Path, out: &mut Vec<FileEntry>) -> EngineResult<()> {
    if dir.is_file() {
        let meta = std::fs::metadata(dir)?;
        out.push(FileEntry {
            path: rel(dir, root),
            size_bytes: meta.len(),
            is_dir: false,
        });
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            out.push(FileEntry { path: rel(&path, root), size_bytes: 0, is_dir: true });
            walk(&path, root, out)?;
        } else {
            let meta = entry.metadata()?;
            out.push(FileEntry { path: rel(&path, root), size_bytes: meta.len(), is_dir: false });
        }
    }
    Ok(())
}

fn rel(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).to_string_lossy().replace('\\', "/")
}

/// Sanitize a search-result title into a safe `cache/` filename stem (spec
/// §4.2): strip all characters outside word/whitespace/hyphen, collapse
/// whitespace to underscore, collapse runs of underscores, truncate to 100
/// chars, default to `untitled`.
pub fn sanitize_filename(title: &str) -> String {
    if title.is_empty() {
        return "untitled".to_string();
    }
    let stripped: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '_')
        .collect();
    let underscored: String = stripped.split_whitespace().collect::<Vec<_>>().join("_");
    let mut collapsed = String::with_capacity(underscored.len());
    let mut prev_underscore = false;
    for c in underscored.chars() {
        if c == '_' {
            if !prev_underscore {
                collapsed.push(c);
            }
            prev_underscore = true;
        } else {
            collapsed.push(c);
            prev_underscore = false;
        }
    }
    let truncated: String = collapsed.chars().take(100).collect();
    let trimmed = truncated.trim_matches('_').to_string();
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed
    }
}

/// Pick a non-colliding `cache/<stem>.md` path, appending a numeric suffix
/// on collision.
pub fn unique_cache_path(workspace: &Workspace, stem: &str) -> (PathBuf, String) {
    let cache_dir = workspace.root().join("cache");
    let mut candidate = cache_dir.join(format!("{stem}.md"));
    let mut rel_str = format!("cache/{stem}.md");
    let mut counter = 1u32;
    while candidate.exists() {
        let name = format!("{stem}_{counter}.md");
        candidate = cache_dir.join(&name);
        rel_str = format!("cache/{name}");
        counter += 1;
    }
    (candidate, rel_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_root(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("scout-engine-ws-{tag}-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn ensure_seeds_templates() {
        let root = tmp_root("seed");
        let ws = Workspace::ensure(root.clone()).unwrap();
        assert!(ws.root().join("progress.md").exists());
        assert!(ws.root().join("notes.md").exists());
        assert!(ws.root().join("draft.md").exists());
        ws.clean().unwrap();
    }

    #[test]
    fn resolve_rejects_parent_traversal() {
        let root = tmp_root("traversal");
        let ws = Workspace::ensure(root.clone()).unwrap();
        let result = ws.resolve("../../etc/passwd");
        assert!(result.is_err());
        ws.clean().unwrap();
    }

    #[test]
    fn edit_fails_on_zero_and_ambiguous_matches() {
        let root = tmp_root("edit");
        let ws = Workspace::ensure(root.clone()).unwrap();
        ws.write("notes.md", "alpha beta alpha", false).unwrap();
        assert!(ws.edit("notes.md", "gamma", "x").is_err());
        assert!(ws.edit("notes.md", "alpha", "x").is_err());
        ws.clean().unwrap();
    }

    #[test]
    fn edit_succeeds_on_unique_match() {
        let root = tmp_root("edit-ok");
        let ws = Workspace::ensure(root.clone()).unwrap();
        ws.write("notes.md", "alpha beta", false).unwrap();
        ws.edit("notes.md", "beta", "gamma").unwrap();
        assert_eq!(ws.read("notes.md").unwrap(), "alpha gamma");
        ws.clean().unwrap();
    }

    #[test]
    fn sanitize_filename_matches_rules() {
        assert_eq!(sanitize_filename(""), "untitled");
        assert_eq!(sanitize_filename("Hello, World!!"), "Hello_World");
        assert_eq!(sanitize_filename("a   b___c"), "a_b_c");
        let long = "x".repeat(200);
        assert_eq!(sanitize_filename(&long).len(), 100);
    }

    #[test]
    fn next_sequence_continues_after_gaps() {
        let root = tmp_root("seq");
        let ws = Workspace::ensure(root.clone()).unwrap();
        std::fs::write(ws.root().join("analysis/images/plot_001.png"), b"x").unwrap();
        std::fs::write(ws.root().join("analysis/images/plot_005.png"), b"x").unwrap();
        assert_eq!(ws.next_sequence("analysis/images", "plot"), 6);
        ws.clean().unwrap();
    }
}
