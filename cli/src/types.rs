use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One script as reported by `GET /api/cli`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CliScript {
    pub name: String,
    pub path: String,
    pub extension: String,
    #[serde(default)]
    pub description: String,
}

/// Body of `GET /api/cli`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CliIndex {
    pub success: bool,
    pub total: usize,
    pub categories: usize,
    /// Categories in listing order, `Uncategorized` last.
    pub data: IndexMap<String, Vec<CliScript>>,
}

impl CliIndex {
    /// Human-readable listing, one category header followed by its scripts.
    /// Only the first description line is shown.
    pub fn render(&self) -> String {
        let width = self
            .data
            .values()
            .flatten()
            .map(|s| s.path.len())
            .max()
            .unwrap_or(0);

        let mut lines = Vec::new();
        for (category, scripts) in &self.data {
            lines.push(format!("[{}]", category));
            for s in scripts {
                let summary = s.description.lines().next().unwrap_or("");
                let line = format!("  {:<width$}  {}", s.path, summary, width = width);
                lines.push(line.trim_end().to_string());
            }
        }
        lines.push(format!(
            "{} scripts in {} categories",
            self.total, self.categories
        ));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "success": true,
        "total": 3,
        "categories": 2,
        "data": {
            "ops": [
                {"name": "deploy.sh", "path": "ops/deploy.sh", "extension": ".sh", "description": "Deploys service X\nto prod"},
                {"name": "backup.py", "path": "ops/backup.py", "extension": ".py"}
            ],
            "Uncategorized": [
                {"name": "hello.sh", "path": "hello.sh", "extension": ".sh", "description": ""}
            ]
        }
    }"#;

    #[test]
    fn parses_server_index() {
        let idx: CliIndex = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(idx.total, 3);
        assert_eq!(idx.data["ops"][0].path, "ops/deploy.sh");
        assert_eq!(idx.data["ops"][1].description, "");
    }

    #[test]
    fn render_shows_first_description_line() {
        let idx: CliIndex = serde_json::from_str(SAMPLE).unwrap();
        let out = idx.render();
        assert!(out.contains("[ops]"));
        assert!(out.contains("ops/deploy.sh  Deploys service X"));
        assert!(!out.contains("to prod"));
        assert!(out.contains("\n  hello.sh\n"));
        assert!(out.ends_with("3 scripts in 2 categories"));
    }

    #[test]
    fn render_follows_server_order() {
        let idx: CliIndex = serde_json::from_str(SAMPLE).unwrap();
        let out = idx.render();
        let ops = out.find("[ops]").unwrap();
        let root = out.find("[Uncategorized]").unwrap();
        assert!(ops < root);
    }
}
