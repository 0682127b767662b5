use std::fmt::Write;
use std::sync::OnceLock;

use dashmap::DashMap;
use metrics::Key;

use crate::registry::normalize;

static NAMES: OnceLock<DashMap<Key, String>> = OnceLock::new();

/// Registry name for a facade key, cached per key.
pub(crate) fn to_name(key: &Key) -> String {
    let names = NAMES.get_or_init(DashMap::new);

    if let Some(name) = names.get(key) {
        return name.value().clone();
    }

    let name = normalize(&render(key)).into_owned();
    names.entry(key.clone()).or_insert(name).value().clone()
}

/// `name{k="v",...}` in label order. Quotes and backslashes in values are
/// escaped.
fn render(key: &Key) -> String {
    let mut labels = key.labels().peekable();
    if labels.peek().is_none() {
        return key.name().to_string();
    }

    let mut rendered = String::with_capacity(key.name().len() + 16);
    rendered.push_str(key.name());
    rendered.push('{');

    for (i, label) in labels.enumerate() {
        if i > 0 {
            rendered.push(',');
        }
        let _ = write!(rendered, "{}=\"", label.key());
        for c in label.value().chars() {
            if matches!(c, '"' | '\\') {
                rendered.push('\\');
            }
            rendered.push(c);
        }
        rendered.push('"');
    }

    rendered.push('}');
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics::Label;

    #[test]
    fn test_plain_key() {
        assert_eq!(to_name(&Key::from_name("http.requests")), "http.requests");
    }

    #[test]
    fn test_labelled_key() {
        let key = Key::from_parts(
            "http.requests",
            vec![Label::new("method", "get"), Label::new("code", "200")],
        );
        assert_eq!(to_name(&key), r#"http.requests{method="get",code="200"}"#);
        assert_eq!(to_name(&key), r#"http.requests{method="get",code="200"}"#);
    }

    #[test]
    fn test_names_are_normalized() {
        let key = Key::from_parts("Pool.Size", vec![Label::new("Region", "EU")]);
        assert_eq!(to_name(&key), r#"pool.size{region="eu"}"#);
    }

    #[test]
    fn test_label_values_are_escaped() {
        let key = Key::from_parts("q", vec![Label::new("sql", r#"a "b" \c"#)]);
        assert_eq!(render(&key), r#"q{sql="a \"b\" \\c"}"#);
    }
}
