//! 停用词启发式（仅拉丁字母语言）

use std::collections::HashSet;
use std::sync::OnceLock;

use crate::translation::config::constants;

const STOPWORDS: &[(&str, &[&str])] = &[
    (
        "en",
        &[
            "the", "and", "you", "i", "to", "a", "is", "it", "my", "me", "in", "of", "that",
            "on", "your", "we", "be", "for", "with", "this", "love", "all", "so", "are", "don't",
            "know", "just", "but", "what", "can",
        ],
    ),
    (
        "es",
        &[
            "el", "la", "que", "y", "de", "en", "los", "las", "un", "una", "por", "con", "no",
            "mi", "tu", "te", "me", "se", "es", "lo", "yo", "pero", "más", "como", "para",
            "amor", "quiero", "estoy", "del", "sin",
        ],
    ),
    (
        "fr",
        &[
            "le", "la", "les", "et", "je", "tu", "il", "elle", "de", "des", "un", "une", "est",
            "que", "qui", "pas", "ne", "mon", "ma", "moi", "toi", "dans", "pour", "sur", "avec",
            "nous", "vous", "suis", "c'est", "j'ai",
        ],
    ),
    (
        "de",
        &[
            "der", "die", "das", "und", "ich", "du", "nicht", "ist", "ein", "eine", "mit",
            "mich", "dich", "mein", "dein", "wir", "sie", "es", "auf", "für", "zu", "den",
            "dem", "auch", "noch", "nur", "wie", "bin", "bist", "wenn",
        ],
    ),
    (
        "it",
        &[
            "il", "di", "che", "e", "la", "non", "un", "una", "per", "mi", "ti", "sono", "io",
            "tu", "con", "del", "della", "ma", "come", "più", "se", "questo", "gli", "anche",
            "amore", "sei", "cosa", "nel", "alla", "ho",
        ],
    ),
    (
        "pt",
        &[
            "o", "a", "os", "as", "que", "e", "de", "do", "da", "em", "um", "uma", "não", "eu",
            "você", "meu", "minha", "com", "para", "por", "mais", "se", "te", "quero", "sou",
            "mas", "estou", "coração", "seu", "vai",
        ],
    ),
    (
        "nl",
        &[
            "de", "het", "een", "en", "ik", "je", "jij", "niet", "is", "dat", "van", "met",
            "mijn", "zijn", "wat", "op", "voor", "maar", "ook", "nog", "wij", "we", "naar",
            "als", "om", "dit", "heb", "ben", "er", "geen",
        ],
    ),
    (
        "sv",
        &[
            "och", "jag", "du", "det", "att", "en", "ett", "är", "inte", "som", "på", "med",
            "min", "mig", "dig", "för", "av", "den", "har", "vi", "om", "så", "till", "men",
            "kan", "ska", "var", "mitt", "när", "bara",
        ],
    ),
];

fn stopword_sets() -> &'static Vec<(&'static str, HashSet<&'static str>)> {
    static SETS: OnceLock<Vec<(&'static str, HashSet<&'static str>)>> = OnceLock::new();
    SETS.get_or_init(|| {
        STOPWORDS
            .iter()
            .map(|(lang, words)| (*lang, words.iter().copied().collect()))
            .collect()
    })
}

/// 小写词元，保留词内撇号
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphabetic() || c == '\'' || c == '’'))
        .map(|token| token.trim_matches(|c| c == '\'' || c == '’').replace('’', "'"))
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
        .collect()
}

/// 停用词启发式的判定
#[derive(Debug, Clone, PartialEq)]
pub struct StopwordGuess {
    pub lang: &'static str,
    pub hits: usize,
    pub ratio: f64,
    pub confidence: f64,
}

/// 统计各语言的停用词命中数，领先者需满足命中数、命中率与领先幅度要求
pub fn detect_stopwords(text: &str) -> Option<StopwordGuess> {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return None;
    }

    let mut scores: Vec<(&'static str, usize)> = stopword_sets()
        .iter()
        .map(|(lang, set)| {
            let hits = tokens.iter().filter(|t| set.contains(t.as_str())).count();
            (*lang, hits)
        })
        .collect();
    scores.sort_by(|a, b| b.1.cmp(&a.1));

    let (lang, hits) = scores[0];
    let runner_up = scores.get(1).map_or(0, |s| s.1);
    let ratio = hits as f64 / tokens.len() as f64;

    if hits < constants::STOPWORD_MIN_HITS || ratio < constants::STOPWORD_MIN_RATIO {
        return None;
    }
    if (hits as f64) < runner_up as f64 * constants::STOPWORD_LEAD_FACTOR {
        return None;
    }

    Some(StopwordGuess {
        lang,
        hits,
        ratio,
        confidence: (0.4 + ratio).min(constants::STOPWORD_CONFIDENCE_CAP),
    })
}
