//! Embedded-language detector: scores string literals for SQL/shell/HTML/
//! XML/JSON/YAML/regex content so the ranker can weight sink arguments that
//! carry a second language inside them.
//!
//! Grounded in the priority-ordered battery: SQL and shell run first (they
//! matter most for security), then XML before HTML (XML has narrower,
//! stronger signals), then JSON/YAML (which validate by actually parsing),
//! then regex as a catch-all. Whichever detector scores highest wins.

use std::sync::OnceLock;

use regex::Regex;

const SQL_KEYWORDS: &[&str] = &[
    "select", "insert", "update", "delete", "merge", "create", "alter", "drop", "truncate",
    "from", "where", "join", "inner", "outer", "left", "right", "group", "having", "order",
    "limit", "offset", "union", "distinct", "as", "on", "and", "or", "not", "table", "database",
    "index", "view", "procedure",
];

const SHELL_KEYWORDS: &[&str] = &[
    "cd", "ls", "pwd", "mkdir", "rmdir", "rm", "cp", "mv", "cat", "grep", "awk", "sed", "find",
    "xargs", "curl", "wget", "ssh", "scp", "nc", "netcat", "echo", "printf", "export", "source",
    "chmod", "chown", "ps", "kill", "top", "df", "du", "tar", "gzip", "apt", "yum", "dnf", "brew",
    "pip", "npm",
];

const NATURAL_LANGUAGE_LEADS: &[&str] = &[
    "please", "can", "could", "would", "should", "may", "might", "the", "a", "an", "this", "that",
];

macro_rules! cached_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect("static regex is valid"))
        }
    };
}

cached_regex!(re_sql_select_from, r"(?is)\bSELECT\b.+\bFROM\b");
cached_regex!(re_sql_insert_values, r"(?is)\bINSERT\s+INTO\b.+\bVALUES\b");
cached_regex!(re_sql_update_set, r"(?is)\bUPDATE\b.+\bSET\b");
cached_regex!(re_sql_create_table, r"(?i)\bCREATE\s+TABLE\b");
cached_regex!(
    re_sql_keyword_pair,
    r"(?is)\b(INSERT|UPDATE|DELETE|CREATE|ALTER|DROP)\b.*\b(FROM|WHERE|JOIN|SET|VALUES|TABLE)\b"
);

cached_regex!(re_shell_pipe, r"\S+\s*\|\s*\S+");
cached_regex!(re_shell_redirect, r"(>>|>|<|2>&1)");
cached_regex!(re_shell_subst, r"\$\(.*\)|`.*`");
cached_regex!(re_shell_var, r"\$\{?\w+\}?");

cached_regex!(re_html_paired_tag, r"(?is)<\s*([a-zA-Z][a-zA-Z0-9]*)\b[^>]*>.*?</\s*\1\s*>");
cached_regex!(re_html_self_closing, r"<\s*[a-zA-Z][a-zA-Z0-9]*\b[^>]*/\s*>");
cached_regex!(re_html_doctype, r"(?i)<!DOCTYPE\s+html>");
cached_regex!(
    re_html_common_tags,
    r"(?i)<\s*(html|head|body|div|span|p|a|img|script|style)\b"
);

cached_regex!(re_xml_prolog, r"(?i)<\?xml\s+version=");
cached_regex!(re_xml_namespace, r"xmlns[:=]");

cached_regex!(re_json_shape, r"(?s)^\s*[\{\[].*[\}\]]\s*$");

cached_regex!(re_yaml_kv, r"(?m)^\s*[\w-]+\s*:\s*.+");
cached_regex!(re_yaml_list_item, r"(?m)^\s*-\s+\w+");

cached_regex!(re_regex_features, r"(\[\^?[^\]]+\]|\\[dDwWsS]|\{[\d,]+\}|\(.*\)|\.\*|\.\+)");
cached_regex!(re_regex_anchors, r"(\^|\$|\\b|\\B)");

fn shell_keyword_flags_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"(?i)\b({})\s+-[a-zA-Z]+", SHELL_KEYWORDS.join("|"))).unwrap()
    })
}

fn shell_chained_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let head: Vec<&str> = SHELL_KEYWORDS.iter().take(10).copied().collect();
        Regex::new(&format!(r"(?i)\b({})\b.*(&&|\|\||;)", head.join("|"))).unwrap()
    })
}

fn word_boundary_re(word: &str) -> Regex {
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(word))).expect("escaped word is valid")
}

/// Highest-confidence embedded-language guess for a string literal, or
/// `None` if nothing scored above 0.5.
pub fn detect_embedded_language(value: &str) -> Option<(&'static str, f64)> {
    if value.trim().len() < 5 {
        return None;
    }
    if starts_with_natural_language_lead(value) {
        return None;
    }

    let mut detections: Vec<(&'static str, f64)> = Vec::new();

    let sql = detect_sql(value);
    if sql > 0.5 {
        detections.push(("sql", sql));
    }
    let shell = detect_shell(value);
    if shell > 0.5 {
        detections.push(("shell", shell));
    }
    let xml = detect_xml(value);
    if xml > 0.5 {
        detections.push(("xml", xml));
    }
    let html = detect_html(value);
    if html > 0.5 {
        detections.push(("html", html));
    }
    let json = detect_json(value);
    if json > 0.5 {
        detections.push(("json", json));
    }
    let yaml = detect_yaml(value);
    if yaml > 0.5 {
        detections.push(("yaml", yaml));
    }
    let re = detect_regex(value);
    if re > 0.5 {
        detections.push(("regex", re));
    }

    detections
        .into_iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
}

fn starts_with_natural_language_lead(value: &str) -> bool {
    value
        .split_whitespace()
        .next()
        .is_some_and(|first| NATURAL_LANGUAGE_LEADS.contains(&first.to_lowercase().as_str()))
}

fn detect_sql(value: &str) -> f64 {
    let mut score: f64 = 0.0;
    for (re, weight) in [
        (re_sql_select_from(), 0.95),
        (re_sql_insert_values(), 0.95),
        (re_sql_update_set(), 0.95),
        (re_sql_create_table(), 0.95),
        (re_sql_keyword_pair(), 0.85),
    ] {
        if re.is_match(value) {
            score = score.max(weight);
        }
    }

    let keywords_found = SQL_KEYWORDS
        .iter()
        .filter(|kw| word_boundary_re(kw).is_match(value))
        .count();
    if keywords_found >= 3 {
        score = score.max(0.80);
    } else if keywords_found >= 2 {
        score = score.max(0.65);
    }
    score
}

fn detect_shell(value: &str) -> f64 {
    let mut score: f64 = 0.0;
    for (re, weight) in [
        (re_shell_pipe(), 0.85),
        (shell_keyword_flags_re(), 0.90),
        (re_shell_redirect(), 0.80),
        (re_shell_subst(), 0.90),
        (re_shell_var(), 0.70),
        (shell_chained_re(), 0.85),
    ] {
        if re.is_match(value) {
            score = score.max(weight);
        }
    }

    let keywords_found = SHELL_KEYWORDS
        .iter()
        .filter(|kw| word_boundary_re(kw).is_match(value))
        .count();
    if keywords_found >= 2 {
        score = score.max(0.75);
    }
    score
}

fn detect_html(value: &str) -> f64 {
    let mut score: f64 = 0.0;
    for (re, weight) in [
        (re_html_paired_tag(), 0.95),
        (re_html_self_closing(), 0.90),
        (re_html_doctype(), 0.95),
        (re_html_common_tags(), 0.85),
    ] {
        if re.is_match(value) {
            score = score.max(weight);
        }
    }
    score
}

fn detect_xml(value: &str) -> f64 {
    let mut score: f64 = 0.0;
    for (re, weight) in [(re_xml_prolog(), 0.95), (re_xml_namespace(), 0.90)] {
        if re.is_match(value) {
            score = score.max(weight);
        }
    }
    score
}

fn detect_json(value: &str) -> f64 {
    match serde_json::from_str::<serde_json::Value>(value) {
        Ok(parsed) => {
            let stripped = value.trim();
            if (stripped.starts_with('{') || stripped.starts_with('['))
                && (parsed.is_object() || parsed.is_array())
            {
                0.95
            } else {
                0.70
            }
        }
        Err(_) => {
            if re_json_shape().is_match(value) {
                0.50
            } else {
                0.0
            }
        }
    }
}

fn detect_yaml(value: &str) -> f64 {
    match serde_yaml::from_str::<serde_yaml::Value>(value) {
        Ok(parsed) => {
            let is_container = parsed.is_mapping() || parsed.is_sequence();
            if !is_container {
                return 0.0;
            }
            let stripped = value.trim();
            if stripped.starts_with('{') && value.contains("invalid") {
                return 0.0;
            }
            if value.contains(':') && !stripped.starts_with('{') {
                0.90
            } else {
                0.75
            }
        }
        Err(_) => {
            if re_yaml_kv().is_match(value) || re_yaml_list_item().is_match(value) {
                0.55
            } else {
                0.0
            }
        }
    }
}

fn detect_regex(value: &str) -> f64 {
    let mut score: f64 = 0.0;
    for (re, weight) in [(re_regex_features(), 0.75), (re_regex_anchors(), 0.65)] {
        if re.is_match(value) {
            score = score.max(weight);
        }
    }

    let feature_patterns: [&Regex; 6] = [
        re_regex_features(),
        re_regex_anchors(),
        cached_bracket_re(),
        cached_shortcut_re(),
        cached_quantifier_re(),
        cached_dotstar_re(),
    ];
    let features_found = feature_patterns.iter().filter(|re| re.is_match(value)).count();
    if features_found >= 3 {
        score = score.max(0.85);
    } else if features_found >= 2 {
        score = score.max(0.70);
    }
    score
}

cached_regex!(cached_bracket_re, r"\[\^?[^\]]+\]");
cached_regex!(cached_shortcut_re, r"\\[dDwWsS]");
cached_regex!(cached_quantifier_re, r"\{[\d,]+\}");
cached_regex!(cached_dotstar_re, r"\.\*|\.\+");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_sql_select() {
        let (lang, confidence) = detect_embedded_language("SELECT * FROM users WHERE id = 1")
            .expect("should detect sql");
        assert_eq!(lang, "sql");
        assert!(confidence >= 0.9);
    }

    #[test]
    fn detects_shell_pipe_chain() {
        let (lang, _) =
            detect_embedded_language("cat /etc/passwd | grep root").expect("should detect shell");
        assert_eq!(lang, "shell");
    }

    #[test]
    fn rejects_natural_language() {
        assert!(detect_embedded_language("please select a name for the user").is_none());
    }

    #[test]
    fn rejects_short_strings() {
        assert!(detect_embedded_language("hi").is_none());
    }

    #[test]
    fn detects_valid_json_object() {
        let (lang, confidence) =
            detect_embedded_language(r#"{"user": "admin", "id": 1}"#).expect("should detect json");
        assert_eq!(lang, "json");
        assert_eq!(confidence, 0.95);
    }

    #[test]
    fn detects_yaml_mapping() {
        let (lang, _) =
            detect_embedded_language("name: admin\nrole: superuser\n").expect("should detect yaml");
        assert_eq!(lang, "yaml");
    }
}
