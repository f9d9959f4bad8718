const SQL_FENCE_OPEN: &str = "```sql";
const FENCE_CLOSE: &str = "```";

/// Removes a surrounding ```sql ... ``` fence from model output.
///
/// Only the exact opening and closing markers are removed, followed by a
/// trim. Text without both markers is returned untouched.
pub fn strip_sql_fence(content: &str) -> String {
    match content
        .strip_prefix(SQL_FENCE_OPEN)
        .and_then(|rest| rest.strip_suffix(FENCE_CLOSE))
    {
        Some(inner) => inner.trim().to_string(),
        None => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_fenced_query() {
        let raw = "```sql\nSELECT DISTINCT main_category\nFROM order_data\n```";
        assert_eq!(
            strip_sql_fence(raw),
            "SELECT DISTINCT main_category\nFROM order_data"
        );
    }

    #[test]
    fn test_strip_is_idempotent() {
        let raw = "```sql\n  SELECT SUM(Number_of_Orders) FROM order_data  \n```";
        let once = strip_sql_fence(raw);
        assert_eq!(strip_sql_fence(&once), once);
        assert!(!once.contains("```"));
    }

    #[test]
    fn test_plain_query_is_untouched() {
        let raw = "  SELECT 1  ";
        assert_eq!(strip_sql_fence(raw), raw);
    }

    #[test]
    fn test_requires_both_markers() {
        assert_eq!(strip_sql_fence("```sql\nSELECT 1"), "```sql\nSELECT 1");
        assert_eq!(strip_sql_fence("SELECT 1\n```"), "SELECT 1\n```");
    }

    #[test]
    fn test_untagged_fence_is_untouched() {
        let raw = "```\nSELECT 1\n```";
        assert_eq!(strip_sql_fence(raw), raw);
    }

    #[test]
    fn test_leading_whitespace_defeats_fence_match() {
        let raw = "\n```sql\nSELECT 1\n```";
        assert_eq!(strip_sql_fence(raw), raw);
    }
}
