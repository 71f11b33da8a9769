//! Wire-name resolution for document fields.
//!
//! The codec and the predicate compiler must agree on every wire name, so
//! both are handed the same [`NameResolver`].

use std::borrow::Cow;

/// Case fold applied to field names that carry no explicit override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamingPolicy {
    /// `StateOrProvince` becomes `state_or_province`, `ETag` becomes `e_tag`.
    #[default]
    SnakeCase,
    /// Plain lower-casing: `StateOrProvince` becomes `stateorprovince`.
    Lowercase,
}

/// Maps declared field names to wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NameResolver {
    policy: NamingPolicy,
}

impl NameResolver {
    /// Creates a resolver for the given policy.
    pub fn new(policy: NamingPolicy) -> Self {
        Self { policy }
    }

    /// Returns the naming policy.
    pub fn policy(&self) -> NamingPolicy {
        self.policy
    }

    /// Resolves the wire name of a field.
    ///
    /// An explicit override is used verbatim; otherwise the declared name is
    /// folded according to the policy.
    pub fn resolve<'a>(&self, declared: &'a str, rename: Option<&'a str>) -> Cow<'a, str> {
        match rename {
            Some(wire) => Cow::Borrowed(wire),
            None => self.fold(declared),
        }
    }

    /// Applies the policy's case fold to a name.
    pub fn fold<'a>(&self, name: &'a str) -> Cow<'a, str> {
        match self.policy {
            NamingPolicy::SnakeCase => snake_case(name),
            NamingPolicy::Lowercase => {
                if name.chars().any(char::is_uppercase) {
                    Cow::Owned(name.to_lowercase())
                } else {
                    Cow::Borrowed(name)
                }
            }
        }
    }
}

/// Folds a name into snake case.
///
/// Word boundaries are a lower-case letter or digit followed by an upper-case
/// letter, and the last capital of an acronym followed by a lower-case letter
/// (`HTTPServer` becomes `http_server`). Already folded names are returned
/// unchanged.
pub fn snake_case(name: &str) -> Cow<'_, str> {
    if !name.chars().any(|c| c.is_uppercase() || c == ' ') {
        return Cow::Borrowed(name);
    }

    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c == ' ' {
            if !out.ends_with('_') {
                out.push('_');
            }
            continue;
        }
        if c.is_uppercase() {
            if i > 0 && !out.ends_with('_') {
                let prev = chars[i - 1];
                let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
                if prev.is_lowercase()
                    || prev.is_ascii_digit()
                    || (prev.is_uppercase() && next_is_lower)
                {
                    out.push('_');
                }
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }

    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn snake_case_words() {
        assert_eq!(snake_case("StateOrProvince"), "state_or_province");
        assert_eq!(snake_case("Name"), "name");
        assert_eq!(snake_case("UniqueId"), "unique_id");
        assert_eq!(snake_case("ETag"), "e_tag");
        assert_eq!(snake_case("HTTPServer"), "http_server");
        assert_eq!(snake_case("address2Line"), "address2_line");
        assert_eq!(snake_case("already_snake"), "already_snake");
    }

    #[test]
    fn override_wins() {
        let resolver = NameResolver::default();
        assert_eq!(resolver.resolve("unique_id", Some("_id")), "_id");
        assert_eq!(resolver.resolve("StateOrProvince", None), "state_or_province");
    }

    #[test]
    fn lowercase_policy() {
        let resolver = NameResolver::new(NamingPolicy::Lowercase);
        assert_eq!(resolver.resolve("StateOrProvince", None), "stateorprovince");
        assert_eq!(resolver.resolve("name", None), "name");
    }

    proptest! {
        #[test]
        fn snake_case_is_idempotent(name in "[A-Za-z][A-Za-z0-9]{0,24}") {
            let once = snake_case(&name).into_owned();
            let twice = snake_case(&once).into_owned();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn resolution_is_deterministic(name in "[A-Za-z_][A-Za-z0-9_]{0,24}") {
            let resolver = NameResolver::default();
            prop_assert_eq!(resolver.resolve(&name, None), resolver.resolve(&name, None));
        }
    }
}
