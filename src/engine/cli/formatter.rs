//! CLI Output Formatting Module
//! Colorized terminal output for the text format

use colored::Colorize;
use serde_json::Value;

use crate::engine::store::Document;

pub struct CliFormatter;

impl CliFormatter {
    /// Print a success message
    pub fn success(message: &str) {
        println!("{} {}", "✓".green().bold(), message);
    }

    /// Print an error message
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red().bold(), message);
    }

    /// Print an info message
    pub fn info(message: &str) {
        println!("{} {}", "ℹ".blue().bold(), message);
    }

    /// Print a section header
    pub fn header(title: &str) {
        println!("\n{}", title.bright_cyan().bold());
        println!("{}", "─".repeat(title.chars().count()).bright_black());
    }

    /// Print a key-value pair
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", key.bright_white().bold(), value);
    }

    /// Print a list item
    pub fn item(text: &str) {
        println!("  {} {}", "•".bright_black(), text);
    }

    /// Print one document, one field per line
    pub fn document(doc: &Document) {
        if doc.is_empty() {
            println!("  {}", "{}".bright_black());
            return;
        }
        for (key, value) in doc {
            Self::kv(key, &render_value(value));
        }
    }

    /// Print a list of documents separated by blank lines
    pub fn documents(title: &str, docs: &[Document]) {
        Self::header(&format!("{} ({})", title, docs.len()));
        for (i, doc) in docs.iter().enumerate() {
            if i > 0 {
                println!();
            }
            Self::document(doc);
        }
    }
}

/// Strings print bare; everything else as compact JSON
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_value() {
        assert_eq!(render_value(&json!("Nov 14, 2022")), "Nov 14, 2022");
        assert_eq!(render_value(&json!(3)), "3");
        assert_eq!(render_value(&json!({"a": [1]})), r#"{"a":[1]}"#);
    }
}
