//! Class name resolution from intrinsic type identity
//!
//! The name recorded for a call is derived from the compiler's type name, never
//! from `Display` or `Debug`, so a type cannot disguise itself in a trace by
//! overriding how it prints.

use std::borrow::Cow;

/// Short intrinsic name of `T`: module path and generic arguments stripped.
///
/// `alloc::string::String` becomes `String`, `std::collections::HashMap<K, V>`
/// becomes `HashMap`, `&[u8]` is kept as written. The result never contains
/// whitespace: `(u8, u8)` becomes `(u8,u8)` and `fn(u8) -> u8` becomes `fn(u8)->u8`.
pub fn class_name_of<T: ?Sized>() -> Cow<'static, str> {
    short_type_name(std::any::type_name::<T>())
}

/// Same as [`class_name_of`], inferring `T` from a value
pub fn class_name_of_val<T: ?Sized>(_value: &T) -> Cow<'static, str> {
    class_name_of::<T>()
}

fn short_type_name(full: &'static str) -> Cow<'static, str> {
    // References, slices, tuples and the like have no single path to shorten.
    let name = if full.starts_with(['&', '[', '(', '*']) || full.starts_with("fn(") {
        full
    } else {
        let base = match full.find('<') {
            Some(idx) => &full[..idx],
            None => full,
        };
        match base.rfind("::") {
            Some(idx) => &base[idx + 2..],
            None => base,
        }
    };
    if name.contains(char::is_whitespace) {
        Cow::Owned(squeeze_whitespace(name))
    } else {
        Cow::Borrowed(name)
    }
}

/// Drop whitespace next to punctuation and join words with `_`.
fn squeeze_whitespace(name: &str) -> String {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let mut out = String::with_capacity(name.len());
    let mut pending_gap = false;
    for c in name.chars() {
        if c.is_whitespace() {
            pending_gap = true;
            continue;
        }
        if pending_gap && is_word(c) && out.ends_with(is_word) {
            out.push('_');
        }
        pending_gap = false;
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fmt;

    struct Special;

    impl fmt::Display for Special {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("String")
        }
    }

    impl fmt::Debug for Special {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("NotSpecial")
        }
    }

    #[test]
    fn test_std_types() {
        assert_eq!(class_name_of::<String>(), "String");
        assert_eq!(class_name_of::<HashMap<String, Vec<u8>>>(), "HashMap");
        assert_eq!(class_name_of::<u64>(), "u64");
        assert_eq!(class_name_of::<str>(), "str");
    }

    #[test]
    fn test_ignores_display_and_debug_overrides() {
        let value = Special;
        assert_eq!(value.to_string(), "String");
        assert_eq!(class_name_of_val(&value), "Special");
    }

    #[test]
    fn test_compound_types_kept_whole() {
        assert_eq!(class_name_of::<&str>(), "&str");
        assert_eq!(class_name_of::<[u8]>(), "[u8]");
    }

    #[test]
    fn test_names_never_contain_whitespace() {
        assert_eq!(class_name_of::<(u8, u8)>(), "(u8,u8)");
        assert_eq!(class_name_of::<fn(u8) -> u8>(), "fn(u8)->u8");
        assert_eq!(class_name_of::<&mut [u8]>(), "&mut[u8]");
        assert_eq!(squeeze_whitespace("dyn Debug + Send"), "dyn_Debug+Send");
    }
}
