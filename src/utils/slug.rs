//! Filename slugs for storage keys. Uploaded names arrive in whatever the
//! user's locale produced (mostly Cyrillic here); object keys must stay
//! plain ASCII.

/// Fixed transliteration table, lowercase Cyrillic to ASCII. Uppercase
/// input is lowercased before lookup.
const TRANSLIT: &[(char, &str)] = &[
    ('а', "a"),
    ('б', "b"),
    ('в', "v"),
    ('г', "g"),
    ('д', "d"),
    ('е', "e"),
    ('ё', "e"),
    ('ж', "zh"),
    ('з', "z"),
    ('и', "i"),
    ('й', "y"),
    ('к', "k"),
    ('л', "l"),
    ('м', "m"),
    ('н', "n"),
    ('о', "o"),
    ('п', "p"),
    ('р', "r"),
    ('с', "s"),
    ('т', "t"),
    ('у', "u"),
    ('ф', "f"),
    ('х', "h"),
    ('ц', "ts"),
    ('ч', "ch"),
    ('ш', "sh"),
    ('щ', "sch"),
    ('ъ', ""),
    ('ы', "y"),
    ('ь', ""),
    ('э', "e"),
    ('ю', "yu"),
    ('я', "ya"),
];

fn transliterate(ch: char) -> Option<&'static str> {
    TRANSLIT
        .iter()
        .find(|(from, _)| *from == ch)
        .map(|(_, to)| *to)
}

/// Turns an arbitrary filename into a storage-key-safe slug: Cyrillic is
/// transliterated, anything outside `[a-z0-9._-]` becomes `_`, and runs of
/// `_` collapse to one. The extension travels with the name, so
/// `"отчёт итог.pdf"` becomes `"otchet_itog.pdf"`.
pub fn slugify_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.to_lowercase().chars() {
        if let Some(replacement) = transliterate(ch) {
            out.push_str(replacement);
        } else if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-') {
            out.push(ch);
        } else {
            out.push('_');
        }
    }

    let mut collapsed = String::with_capacity(out.len());
    let mut last_was_underscore = false;
    for ch in out.chars() {
        if ch == '_' {
            if !last_was_underscore {
                collapsed.push(ch);
            }
            last_was_underscore = true;
        } else {
            collapsed.push(ch);
            last_was_underscore = false;
        }
    }

    let trimmed = collapsed.trim_matches('_');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::slugify_filename;

    #[test]
    fn transliterates_cyrillic_names() {
        assert_eq!(slugify_filename("отчёт.pdf"), "otchet.pdf");
        assert_eq!(slugify_filename("Замечание №12.docx"), "zamechanie_12.docx");
    }

    #[test]
    fn replaces_disallowed_characters_and_collapses_runs() {
        assert_eq!(slugify_filename("my   report (final).pdf"), "my_report_final_.pdf");
        assert_eq!(slugify_filename("a///b"), "a_b");
    }

    #[test]
    fn keeps_safe_ascii_untouched() {
        assert_eq!(slugify_filename("photo-2024.jpeg"), "photo-2024.jpeg");
    }

    #[test]
    fn lowercases_input() {
        assert_eq!(slugify_filename("REPORT.PDF"), "report.pdf");
    }

    #[test]
    fn never_returns_an_empty_slug() {
        assert_eq!(slugify_filename("???"), "file");
        assert_eq!(slugify_filename(""), "file");
    }
}
