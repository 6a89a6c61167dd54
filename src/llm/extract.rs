use tracing::debug;

/// Strips surrounding whitespace and a Markdown code fence from provider
/// output. Text without a fence is returned trimmed.
pub fn extract_sql(content: &str) -> String {
    let trimmed = content.trim();

    // Try to extract SQL from between ```sql and ``` markers
    if let Some(start) = trimmed.find("```") {
        let after_open = &trimmed[start + 3..];
        // Skip an info string such as "sql" on the opening fence line
        let body = match after_open.find('\n') {
            Some(newline) if is_info_string(&after_open[..newline]) => &after_open[newline + 1..],
            _ => after_open,
        };

        let sql = match body.find("```") {
            Some(end) => &body[..end],
            None => body,
        };

        debug!("Extracted SQL from code fence");
        return sql.trim().to_string();
    }

    trimmed.to_string()
}

fn is_info_string(line: &str) -> bool {
    let line = line.trim();
    line.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_sql_is_trimmed() {
        assert_eq!(extract_sql("  SELECT * FROM Users;\n"), "SELECT * FROM Users;");
    }

    #[test]
    fn sql_fence_is_removed() {
        let content = "```sql\nSELECT *\nFROM Users;\n```";
        assert_eq!(extract_sql(content), "SELECT *\nFROM Users;");
    }

    #[test]
    fn bare_fence_is_removed() {
        assert_eq!(extract_sql("```\nSELECT 1;\n```"), "SELECT 1;");
    }

    #[test]
    fn prose_around_fence_is_dropped() {
        let content = "Here you go:\n```sql\nSELECT 1;\n```\nHope this helps.";
        assert_eq!(extract_sql(content), "SELECT 1;");
    }

    #[test]
    fn unterminated_fence_keeps_body() {
        assert_eq!(extract_sql("```sql\nSELECT 1;"), "SELECT 1;");
    }

    #[test]
    fn single_line_fence() {
        assert_eq!(extract_sql("```SELECT 1;```"), "SELECT 1;");
    }
}
