//! Sheet files: a named collection of formulas in TOML or JSON.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::formula::Formula;

/// Error type for sheet loading.
#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("parse error: {0}")]
    Parse(String),
}

/// A sheet: the full set of formulas submitted to the kernel in one pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sheet {
    /// Formulas by name.
    #[serde(default)]
    pub formulas: HashMap<String, Formula>,
}

impl Sheet {
    /// Consume the sheet, yielding the name-to-formula map the kernel takes.
    pub fn into_formulas(self) -> HashMap<String, Formula> {
        self.formulas
    }
}

/// Parse a sheet from a TOML string.
pub fn parse_toml(content: &str) -> Result<Sheet, SheetError> {
    toml::from_str(content).map_err(|e| SheetError::Parse(e.to_string()))
}

/// Parse a sheet from a JSON string.
pub fn parse_json(content: &str) -> Result<Sheet, SheetError> {
    serde_json::from_str(content).map_err(|e| SheetError::Parse(e.to_string()))
}

/// Load a sheet from a file path (auto-detect TOML vs JSON by extension).
pub fn load_sheet(path: &Path) -> Result<Sheet, SheetError> {
    let content = std::fs::read_to_string(path)?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => parse_toml(&content),
        Some("json") => parse_json(&content),
        _ => {
            // Try JSON first, then TOML
            parse_json(&content).or_else(|_| parse_toml(&content))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_toml_sheet() {
        let toml_str = r#"
[formulas.A]
code = "return 10"

[formulas.B]
dependencies = ["A"]
code = "return A * 2"
"#;
        let sheet = parse_toml(toml_str).unwrap();
        assert_eq!(sheet.formulas.len(), 2);
        assert!(sheet.formulas["A"].dependencies.is_empty());
        assert_eq!(sheet.formulas["B"].dependencies, vec!["A"]);
        assert_eq!(sheet.formulas["B"].code, "return A * 2");
    }

    #[test]
    fn parse_json_sheet() {
        let json = r#"{
            "formulas": {
                "X": {"code": "return 2+2"},
                "Y": {"dependencies": ["X"], "code": "return X"}
            }
        }"#;
        let sheet = parse_json(json).unwrap();
        assert_eq!(sheet.formulas.len(), 2);
        assert_eq!(sheet.formulas["Y"].dependencies, vec!["X"]);
    }

    #[test]
    fn parse_toml_rejects_garbage() {
        assert!(matches!(parse_toml("[formulas"), Err(SheetError::Parse(_))));
    }

    #[test]
    fn load_detects_extension() {
        let dir = std::env::temp_dir();
        let path = dir.join("ripple_sheet_test.toml");
        std::fs::write(&path, "[formulas.A]\ncode = \"return 1\"\n").unwrap();
        let sheet = load_sheet(&path).unwrap();
        assert_eq!(sheet.formulas.len(), 1);
        std::fs::remove_file(&path).ok();
    }
}
