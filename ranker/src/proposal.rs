use crate::Result;
use serde_json::Value;
use std::path::Path;

/// An item entered into a tournament together with the caller's id for it.
#[derive(Clone, Debug)]
pub struct Entry<T> {
    pub id: String,
    pub item: T,
}

impl<T> Entry<T> {
    pub fn new(id: impl Into<String>, item: T) -> Self {
        Self {
            id: id.into(),
            item,
        }
    }
}

/// A project proposal: the `full_experiment_plan` object of a proposal file.
pub type Proposal = Entry<Value>;

const PLAN_FIELD: &str = "full_experiment_plan";

/// Loads every `*.json` file in `dir` that carries an experiment plan object.
///
/// The file name is used as the entry id. Files are read in name order so that
/// a seeded run sees the same input order every time.
pub fn load_proposals(dir: &Path) -> Result<Vec<Proposal>> {
    let mut paths = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.retain(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"));
    paths.sort();

    let mut proposals = Vec::new();
    for path in paths {
        let mut paper: Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        let plan = match paper.get_mut(PLAN_FIELD) {
            Some(plan) if plan.is_object() => plan.take(),
            _ => {
                tracing::debug!(path = %path.display(), "skipping file without an experiment plan");
                continue;
            }
        };

        let id = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        proposals.push(Entry::new(id, plan));
    }

    Ok(proposals)
}

/// Renders a plan as indented `key: value` text for use in prompts.
pub fn format_plan(plan: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, plan, 0);
    out
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(_) | Value::Array(_) => None,
        other => Some(other.to_string()),
    }
}

fn write_value(out: &mut String, value: &Value, depth: usize) {
    let indent = "  ".repeat(depth);
    match value {
        Value::Object(map) => {
            for (key, value) in map {
                match scalar(value) {
                    Some(s) => out.push_str(&format!("{indent}{key}: {s}\n")),
                    None => {
                        out.push_str(&format!("{indent}{key}:\n"));
                        write_value(out, value, depth + 1);
                    }
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                match scalar(item) {
                    Some(s) => out.push_str(&format!("{indent}- {s}\n")),
                    None => {
                        out.push_str(&format!("{indent}-\n"));
                        write_value(out, item, depth + 1);
                    }
                }
            }
        }
        other => {
            if let Some(s) = scalar(other) {
                out.push_str(&format!("{indent}{s}\n"));
            }
        }
    }
}
