//! 文本过滤器模块
//!
//! 译文清洗、对齐用的文本归一化，以及装饰行判断

use std::sync::OnceLock;

use regex::Regex;

use crate::translation::config::constants;

/// 正则表达式缓存
struct RegexCache {
    /// 完整的批次标记
    full_marker: OnceLock<Option<Regex>>,
    /// 被翻译服务截断或改写的标记残片
    partial_marker: OnceLock<Option<Regex>>,
    whitespace: OnceLock<Option<Regex>>,
}

static REGEX_CACHE: RegexCache = RegexCache {
    full_marker: OnceLock::new(),
    partial_marker: OnceLock::new(),
    whitespace: OnceLock::new(),
};

fn cached_regex<'a>(cell: &'a OnceLock<Option<Regex>>, pattern: &str) -> Option<&'a Regex> {
    cell.get_or_init(|| match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::error!("正则表达式编译失败 {}: {}", pattern, e);
            None
        }
    })
    .as_ref()
}

fn full_marker_regex() -> Option<&'static Regex> {
    cached_regex(
        &REGEX_CACHE.full_marker,
        r"(?i)\[\[\s*SLT[\s_]*BATCH[\s_]*[a-z0-9]*[\s_]*\d+\s*\]\]",
    )
}

fn partial_marker_regex() -> Option<&'static Regex> {
    cached_regex(
        &REGEX_CACHE.partial_marker,
        r"(?i)\[{0,2}\s*SLT[\s_]*BATCH[\s_]*[a-z0-9]*(?:[\s_]*\d+)?\s*\]{0,2}|\[\[|\]\]",
    )
}

fn whitespace_regex() -> Option<&'static Regex> {
    cached_regex(&REGEX_CACHE.whitespace, r"\s+")
}

/// 合并连续空白（含换行）并去除首尾空白
pub fn collapse_whitespace(text: &str) -> String {
    match whitespace_regex() {
        Some(re) => re.replace_all(text.trim(), " ").into_owned(),
        None => text.split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

/// 清洗译文：去掉标记残留与分隔符，合并空白
///
/// 写入缓存前与从缓存读出时都会调用，保证协议残片不会出现在界面上。
pub fn normalize_translation(text: &str) -> String {
    let mut cleaned = text.replace(constants::PLAIN_DELIMITER, " ");

    if let Some(re) = full_marker_regex() {
        cleaned = re.replace_all(&cleaned, " ").into_owned();
    }
    if let Some(re) = partial_marker_regex() {
        cleaned = re.replace_all(&cleaned, " ").into_owned();
    }

    collapse_whitespace(&cleaned)
}

/// 行对齐使用的匹配键：小写、去标点、合并空白
pub fn normalize_for_match(text: &str) -> String {
    let stripped: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().collect::<String>()
            } else if c.is_whitespace() {
                " ".to_string()
            } else {
                // 撇号在歌词里经常被替换成不同字形，直接丢弃
                String::new()
            }
        })
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

const SECTION_TAGS: &[&str] = &[
    "instrumental",
    "chorus",
    "pre chorus",
    "prechorus",
    "verse",
    "bridge",
    "intro",
    "outro",
    "hook",
    "interlude",
    "refrain",
    "repeat",
    "music",
];

/// 判断一行是否为装饰行（空行、纯符号、段落标签）
///
/// 装饰行不参与语言检测，也不发送给翻译服务。
pub fn is_decorative_line(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return true;
    }

    if !trimmed.chars().any(|c| c.is_alphanumeric()) {
        return true;
    }

    if let Some(inner) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        return !inner.contains(['[', ']']);
    }

    if let Some(inner) = trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        let key = normalize_for_match(inner);
        let key = key.trim_end_matches(|c: char| c.is_ascii_digit() || c == 'x' || c == ' ');
        return SECTION_TAGS.iter().any(|tag| key.starts_with(tag));
    }

    false
}

/// 统计文本中的非空白字符数
pub fn non_whitespace_len(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_markers_and_whitespace() {
        assert_eq!(
            normalize_translation("[[SLT_BATCH_ab12cd34_3]]  Hello\n  world "),
            "Hello world"
        );
        assert_eq!(normalize_translation("[[ slt_batch_AB12CD34_0 ]]Hi"), "Hi");
        assert_eq!(normalize_translation("one ||| two"), "one two");
    }

    #[test]
    fn test_normalize_strips_partial_remnants() {
        assert_eq!(normalize_translation("SLT_BATCH_ab12cd34_7 goodbye"), "goodbye");
        assert_eq!(normalize_translation("[[SLT_BATCH_ab12 night"), "night");
        assert_eq!(normalize_translation("day ]]"), "day");
    }

    #[test]
    fn test_normalize_keeps_plain_text() {
        assert_eq!(normalize_translation("Я люблю тебя"), "Я люблю тебя");
        assert_eq!(normalize_translation("[verse] stays"), "[verse] stays");
        assert_eq!(normalize_translation(""), "");
    }

    #[test]
    fn test_normalize_for_match() {
        assert_eq!(normalize_for_match("Don't  STOP me now!"), "dont stop me now");
        assert_eq!(normalize_for_match("  君の名は。 "), "君の名は");
        assert_eq!(normalize_for_match("Hello, world"), normalize_for_match("hello world"));
    }

    #[test]
    fn test_decorative_lines() {
        assert!(is_decorative_line(""));
        assert!(is_decorative_line("   "));
        assert!(is_decorative_line("♪"));
        assert!(is_decorative_line("♪ ♪ ♪"));
        assert!(is_decorative_line("…"));
        assert!(is_decorative_line("[Chorus]"));
        assert!(is_decorative_line("(Instrumental)"));
        assert!(is_decorative_line("(Chorus x2)"));

        assert!(!is_decorative_line("(I love you)"));
        assert!(!is_decorative_line("Never gonna give you up"));
        assert!(!is_decorative_line("[Chorus] and more [text]"));
    }
}
