use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("無効なパスパターンです: {pattern}")]
pub struct PatternError {
    pub pattern: String,
    #[source]
    source: regex::Error,
}

/// Ant 形式のパスパターン照合。
///
/// - `?` は `/` 以外の 1 文字
/// - `*` は `/` を含まない 0 文字以上
/// - `**` はセグメントをまたいだ 0 文字以上（`/api/**` は `/api` 自体にも一致する）
#[derive(Debug, Clone)]
pub struct PathMatcher {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl PathMatcher {
    /// `include` が空の場合は全パスを対象とする。`exclude` は `include` より優先する。
    pub fn new<S: AsRef<str>>(include: &[S], exclude: &[S]) -> Result<Self, PatternError> {
        Ok(Self {
            include: compile_all(include)?,
            exclude: compile_all(exclude)?,
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        let included =
            self.include.is_empty() || self.include.iter().any(|re| re.is_match(path));
        included && !self.exclude.iter().any(|re| re.is_match(path))
    }
}

fn compile_all<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Regex>, PatternError> {
    patterns
        .iter()
        .map(|pattern| compile(pattern.as_ref()))
        .collect()
}

fn compile(pattern: &str) -> Result<Regex, PatternError> {
    Regex::new(&to_regex(pattern)).map_err(|source| PatternError {
        pattern: pattern.to_string(),
        source,
    })
}

fn to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    let mut rest = pattern;
    while let Some(c) = rest.chars().next() {
        if let Some(tail) = rest.strip_prefix("/**") {
            out.push_str("(?:/.*)?");
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("**") {
            out.push_str(".*");
            rest = tail;
        } else {
            match c {
                '*' => out.push_str("[^/]*"),
                '?' => out.push_str("[^/]"),
                _ => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
            }
            rest = &rest[c.len_utf8()..];
        }
    }
    out.push('$');
    out
}
