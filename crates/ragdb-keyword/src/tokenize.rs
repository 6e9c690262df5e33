/// Lowercase word-boundary tokenization: runs of alphanumerics or `_`.
/// Mirrors the query-side tokenization exactly; index and query must agree.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
}
