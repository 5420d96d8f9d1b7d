/// 截斷時附加的省略符號
pub const ELLIPSIS: char = '…';

/// 保留前 `max_chars` 個字元，超過時附加省略符號。
///
/// 以字元（而非位元組）計算，避免切斷多位元組 UTF-8 字元。
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((byte_index, _)) => {
            let mut out = trimmed[..byte_index].trim_end().to_string();
            out.push(ELLIPSIS);
            out
        }
        None => trimmed.to_string(),
    }
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
