//! URL-safe identifiers and link classification.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::LinkKind;

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));
static YOUTUBE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(https?://)?(www\.)?(youtube\.com|youtu\.be)/").expect("valid regex")
});

/// Lowercase, strip Latin diacritics, collapse every other run of
/// non-alphanumerics into `separator` and trim it from both ends.
pub fn slugify(title: &str, separator: char) -> String {
    let mut folded = String::with_capacity(title.len());
    for c in title.to_lowercase().chars() {
        fold_diacritic(c, &mut folded);
    }
    let sep = separator.to_string();
    NON_ALNUM
        .replace_all(&folded, sep.as_str())
        .trim_matches(separator)
        .to_string()
}

/// Slug for a lesson imported without one.
pub fn lesson_slug(lesson_id: i64) -> String {
    format!("lesson_{lesson_id}")
}

pub fn link_kind_for(url: &str) -> LinkKind {
    if YOUTUBE_URL.is_match(url) {
        LinkKind::Youtube
    } else {
        LinkKind::Link
    }
}

/// Latin-1 and Latin Extended-A letters fold to their base letters; ligatures
/// and `ß` expand. Other scripts pass through and become separators.
fn fold_diacritic(c: char, out: &mut String) {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => 'c',
        'ď' | 'đ' => 'd',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => 'e',
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => 'g',
        'ĥ' | 'ħ' => 'h',
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => 'i',
        'ĵ' => 'j',
        'ķ' => 'k',
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' => 'l',
        'ñ' | 'ń' | 'ņ' | 'ň' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => 'o',
        'ŕ' | 'ŗ' | 'ř' => 'r',
        'ś' | 'ŝ' | 'ş' | 'š' => 's',
        'ţ' | 'ť' | 'ŧ' => 't',
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => 'u',
        'ŵ' => 'w',
        'ý' | 'ÿ' | 'ŷ' => 'y',
        'ź' | 'ż' | 'ž' => 'z',
        'æ' => return out.push_str("ae"),
        'œ' => return out.push_str("oe"),
        'ß' => return out.push_str("ss"),
        other => other,
    };
    out.push(folded);
}
