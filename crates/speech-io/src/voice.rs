use crate::Voice;

fn normalize(tag: &str) -> String {
    tag.trim().replace('_', "-").to_lowercase()
}

fn primary(tag: &str) -> String {
    normalize(tag)
        .split('-')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Pick the voice to speak `locale` with: an exact language-tag match first, then a
/// voice of the same primary language, then the first voice offered.
pub fn select_voice(voices: &[Voice], locale: &str) -> Option<Voice> {
    let wanted = normalize(locale);
    if let Some(v) = voices.iter().find(|v| normalize(&v.lang) == wanted) {
        return Some(v.clone());
    }
    let wanted_primary = primary(locale);
    if let Some(v) = voices
        .iter()
        .find(|v| !wanted_primary.is_empty() && primary(&v.lang) == wanted_primary)
    {
        return Some(v.clone());
    }
    voices.first().cloned()
}
