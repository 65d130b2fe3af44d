//! Locale resolution for metric aliases, alert text, module names, and
//! health-band labels.
//!
//! The engine config's `language` key and every alias-lookup helper in
//! `models` speak the full `zh-CN` / `en-US` tags directly, so normalization
//! here only needs to fold loose input (`zh`, `zh_CN`, `ZH-cn`, ...) onto one
//! of those two canonical forms.

use std::cell::RefCell;

pub const SUPPORTED_LOCALES: &[&str] = &["zh-CN", "en-US"];
pub const DEFAULT_LOCALE: &str = "zh-CN";

thread_local! {
    static CURRENT_LOCALE: RefCell<String> = RefCell::new(DEFAULT_LOCALE.to_string());
}

pub fn set_locale(locale: &str) {
    let locale = normalize_locale(locale);
    CURRENT_LOCALE.with(|l| {
        *l.borrow_mut() = locale;
    });
}

pub fn get_locale() -> String {
    CURRENT_LOCALE.with(|l| l.borrow().clone())
}

/// Normalize a loosely-formatted locale tag to `zh-CN` or `en-US`, falling
/// back to the default for anything unrecognized.
pub fn normalize_locale(locale: &str) -> String {
    let locale = locale.trim().to_lowercase();
    let primary = locale
        .split(|c| c == '-' || c == '_' || c == ',')
        .next()
        .unwrap_or(DEFAULT_LOCALE);

    if primary.starts_with("en") {
        "en-US".to_string()
    } else {
        "zh-CN".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_loose_tags() {
        assert_eq!(normalize_locale("zh"), "zh-CN");
        assert_eq!(normalize_locale("zh_CN"), "zh-CN");
        assert_eq!(normalize_locale("en"), "en-US");
        assert_eq!(normalize_locale("EN-us"), "en-US");
        assert_eq!(normalize_locale("fr"), "zh-CN");
        assert_eq!(normalize_locale(""), "zh-CN");
    }

    #[test]
    fn set_get_round_trips_through_normalization() {
        set_locale("en");
        assert_eq!(get_locale(), "en-US");
        set_locale("zh-CN");
        assert_eq!(get_locale(), "zh-CN");
    }
}
