//! Error stack scrubbing.
//!
//! Client-visible stacks must not leak server paths. Frames in the user's
//! own program keep a workspace-relative path, dependency frames keep a
//! `node_modules/`-relative path, wrapper internals collapse to a single
//! opaque frame, and every other frame is dropped.

use std::path::Path;

use runlet_sandbox::workspace::WRAPPER_FILE;

/// Rewrite a guest stack trace for client consumption.
pub fn scrub_stack(stack: &str, workspace: &Path) -> String {
    let workspace_prefix = format!("{}/", workspace.display());
    let mut scrubbed: Vec<String> = Vec::new();
    let mut wrapper_collapsed = false;

    for line in stack.lines() {
        if !line.trim_start().starts_with("at ") {
            // message lines (including multi-line messages) pass through
            scrubbed.push(line.to_string());
            continue;
        }
        if line.contains(WRAPPER_FILE) {
            if !wrapper_collapsed {
                scrubbed.push("    at [code]".to_string());
                wrapper_collapsed = true;
            }
            continue;
        }
        if let Some(stripped) = strip_through_marker(line, "/node_modules/") {
            scrubbed.push(stripped);
            continue;
        }
        if line.contains(&workspace_prefix) {
            scrubbed.push(line.replace(&workspace_prefix, ""));
            continue;
        }
        // frames elsewhere on the server are dropped entirely
    }

    scrubbed.join("\n")
}

/// Drop the absolute prefix before `marker` from the path inside a frame,
/// leaving the marker itself relative.
fn strip_through_marker(line: &str, marker: &str) -> Option<String> {
    let pos = line.find(marker)?;
    let path_start = line[..pos]
        .rfind(|c: char| c == '(' || c.is_whitespace())
        .map(|i| i + 1)
        .unwrap_or(0);
    Some(format!("{}{}", &line[..path_start], &line[pos + 1..]))
}
