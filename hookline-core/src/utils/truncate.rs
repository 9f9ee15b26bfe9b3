/// Shorten `s` to at most `limit` characters.
///
/// Strings longer than `limit` keep their first `limit - 3` characters and
/// get `"..."` appended. Counting is by `char`, not byte.
pub fn truncate(s: &str, limit: usize) -> String {
    if s.chars().count() <= limit {
        return s.to_string();
    }
    let keep = limit.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}
