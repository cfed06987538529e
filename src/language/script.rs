//! 文字脚本启发式
//!
//! 统计非空白字符落在各 Unicode 区段的比例，占比超过 20% 的脚本直接决定语言。

use crate::translation::config::constants;

/// 可识别的文字脚本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Script {
    Han,
    Kana,
    Hangul,
    Arabic,
    Hebrew,
    Cyrillic,
    Thai,
    Devanagari,
    Greek,
    Latin,
}

impl Script {
    /// 单个字符所属的脚本
    pub fn of(c: char) -> Option<Self> {
        let cp = c as u32;
        let script = match cp {
            0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0xF900..=0xFAFF | 0x20000..=0x2A6DF => Script::Han,
            0x3040..=0x30FF | 0x31F0..=0x31FF | 0xFF66..=0xFF9F => Script::Kana,
            0xAC00..=0xD7AF | 0x1100..=0x11FF | 0x3130..=0x318F => Script::Hangul,
            0x0600..=0x06FF | 0x0750..=0x077F | 0xFB50..=0xFDFF | 0xFE70..=0xFEFF => Script::Arabic,
            0x0590..=0x05FF => Script::Hebrew,
            0x0400..=0x052F => Script::Cyrillic,
            0x0E00..=0x0E7F => Script::Thai,
            0x0900..=0x097F => Script::Devanagari,
            0x0370..=0x03FF | 0x1F00..=0x1FFF => Script::Greek,
            _ if c.is_ascii_alphabetic() => Script::Latin,
            0x00C0..=0x024F => Script::Latin,
            _ => return None,
        };
        Some(script)
    }

    /// 脚本对应的语言代码（拉丁字母需要停用词进一步判断）
    pub fn language(self) -> Option<&'static str> {
        match self {
            Script::Han => Some("zh"),
            Script::Kana => Some("ja"),
            Script::Hangul => Some("ko"),
            Script::Arabic => Some("ar"),
            Script::Hebrew => Some("he"),
            Script::Cyrillic => Some("ru"),
            Script::Thai => Some("th"),
            Script::Devanagari => Some("hi"),
            Script::Greek => Some("el"),
            Script::Latin => None,
        }
    }
}

/// 各脚本的字符计数
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScriptCounts {
    pub total: usize,
    pub han: usize,
    pub kana: usize,
    pub hangul: usize,
    pub arabic: usize,
    pub hebrew: usize,
    pub cyrillic: usize,
    pub thai: usize,
    pub devanagari: usize,
    pub greek: usize,
    pub latin: usize,
}

impl ScriptCounts {
    pub fn count(text: &str) -> Self {
        let mut counts = Self::default();
        for c in text.chars().filter(|c| !c.is_whitespace()) {
            counts.total += 1;
            match Script::of(c) {
                Some(Script::Han) => counts.han += 1,
                Some(Script::Kana) => counts.kana += 1,
                Some(Script::Hangul) => counts.hangul += 1,
                Some(Script::Arabic) => counts.arabic += 1,
                Some(Script::Hebrew) => counts.hebrew += 1,
                Some(Script::Cyrillic) => counts.cyrillic += 1,
                Some(Script::Thai) => counts.thai += 1,
                Some(Script::Devanagari) => counts.devanagari += 1,
                Some(Script::Greek) => counts.greek += 1,
                Some(Script::Latin) => counts.latin += 1,
                None => {}
            }
        }
        counts
    }

    pub fn share(&self, count: usize) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            count as f64 / self.total as f64
        }
    }

    /// 字母类字符中拉丁字母的占比
    pub fn latin_share_of_letters(&self) -> f64 {
        let letters = self.han
            + self.kana
            + self.hangul
            + self.arabic
            + self.hebrew
            + self.cyrillic
            + self.thai
            + self.devanagari
            + self.greek
            + self.latin;
        if letters == 0 {
            0.0
        } else {
            self.latin as f64 / letters as f64
        }
    }
}

/// 脚本启发式的判定
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptGuess {
    pub lang: &'static str,
    pub ratio: f64,
    pub confidence: f64,
}

/// 按脚本占比判定语言，没有脚本超过阈值时返回 `None`
pub fn detect_script(text: &str) -> Option<ScriptGuess> {
    let counts = ScriptCounts::count(text);
    if counts.total == 0 {
        return None;
    }

    // 日文混用汉字与假名，只要出现假名就把 CJK 整体算作日文
    let cjk = counts.han + counts.kana;
    let cjk_lang = if counts.kana > 0 { "ja" } else { "zh" };

    let candidates = [
        (cjk_lang, cjk),
        ("ko", counts.hangul),
        ("ar", counts.arabic),
        ("he", counts.hebrew),
        ("ru", counts.cyrillic),
        ("th", counts.thai),
        ("hi", counts.devanagari),
        ("el", counts.greek),
    ];

    let (lang, count) = candidates
        .iter()
        .copied()
        .max_by_key(|&(_, count)| count)?;

    let ratio = counts.share(count);
    if ratio <= constants::SCRIPT_SHARE_THRESHOLD {
        return None;
    }

    Some(ScriptGuess {
        lang,
        ratio,
        confidence: (0.4 + ratio * 0.6).min(constants::SCRIPT_CONFIDENCE_CAP),
    })
}
