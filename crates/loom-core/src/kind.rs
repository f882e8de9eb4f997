//! Widget kinds and type alias normalization
//!
//! Declarative trees name widgets with free-form tags ("panel", "Paper",
//! "textfield"). Before any lookup the tag is normalized to a canonical tag
//! and parsed into a [`WidgetKind`]. Tags that are neither canonical nor a
//! known alias pass through unchanged and become [`WidgetKind::Other`].
//!
//! Normalization is total and idempotent: `normalize(normalize(t)) ==
//! normalize(t)` for every input, including unknown tags and any configured
//! alias table. A configured alias may re-map a canonical tag; the rewrite
//! is then applied wherever that tag shows up in a chain.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::warn;

/// Canonical widget kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WidgetKind {
    Button,
    Text,
    Heading,
    Input,
    Checkbox,
    Toggle,
    Slider,
    Select,
    Image,
    List,
    Card,
    Container,
    Form,
    Link,
    Chart,
    Grid,
    Map,
    /// Any tag without a canonical variant; carries the tag for diagnostics
    Other(String),
}

const CANONICAL: &[(&str, WidgetKind)] = &[
    ("button", WidgetKind::Button),
    ("text", WidgetKind::Text),
    ("heading", WidgetKind::Heading),
    ("input", WidgetKind::Input),
    ("checkbox", WidgetKind::Checkbox),
    ("toggle", WidgetKind::Toggle),
    ("slider", WidgetKind::Slider),
    ("select", WidgetKind::Select),
    ("image", WidgetKind::Image),
    ("list", WidgetKind::List),
    ("card", WidgetKind::Card),
    ("container", WidgetKind::Container),
    ("form", WidgetKind::Form),
    ("link", WidgetKind::Link),
    ("chart", WidgetKind::Chart),
    ("grid", WidgetKind::Grid),
    ("map", WidgetKind::Map),
];

const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("panel", "card"),
    ("paper", "card"),
    ("tile", "card"),
    ("box", "container"),
    ("div", "container"),
    ("section", "container"),
    ("view", "container"),
    ("stack", "container"),
    ("row", "container"),
    ("column", "container"),
    ("flex", "container"),
    ("label", "text"),
    ("paragraph", "text"),
    ("typography", "text"),
    ("span", "text"),
    ("p", "text"),
    ("title", "heading"),
    ("header", "heading"),
    ("h1", "heading"),
    ("h2", "heading"),
    ("h3", "heading"),
    ("textfield", "input"),
    ("text-field", "input"),
    ("textbox", "input"),
    ("textarea", "input"),
    ("field", "input"),
    ("btn", "button"),
    ("check", "checkbox"),
    ("switch", "toggle"),
    ("range", "slider"),
    ("dropdown", "select"),
    ("combobox", "select"),
    ("img", "image"),
    ("picture", "image"),
    ("avatar", "image"),
    ("ul", "list"),
    ("ol", "list"),
    ("listview", "list"),
    ("table", "grid"),
    ("datagrid", "grid"),
    ("data-grid", "grid"),
    ("graph", "chart"),
    ("plot", "chart"),
    ("a", "link"),
    ("anchor", "link"),
    ("hyperlink", "link"),
];

fn canonical_kind(key: &str) -> Option<WidgetKind> {
    CANONICAL
        .iter()
        .find(|(tag, _)| *tag == key)
        .map(|(_, kind)| kind.clone())
}

fn builtin_alias(key: &str) -> Option<&'static str> {
    BUILTIN_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, target)| *target)
}

fn lookup_key(tag: &str) -> String {
    tag.trim().to_ascii_lowercase()
}

/// Normalize a tag with the built-in alias table only
pub fn normalize_tag(tag: &str) -> String {
    AliasTable::builtin().normalize(tag)
}

impl WidgetKind {
    /// Parse a tag with the built-in alias table
    pub fn from_tag(tag: &str) -> Self {
        AliasTable::builtin().kind(tag)
    }

    /// Canonical tag, or the carried tag for [`WidgetKind::Other`]
    pub fn as_tag(&self) -> &str {
        match self {
            WidgetKind::Other(raw) => raw,
            known => CANONICAL
                .iter()
                .find(|(_, kind)| kind == known)
                .map(|(tag, _)| *tag)
                .unwrap_or("other"),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, WidgetKind::Other(_))
    }

    /// Every canonical kind, in declaration order
    pub fn canonical_kinds() -> impl Iterator<Item = WidgetKind> {
        CANONICAL.iter().map(|(_, kind)| kind.clone())
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

impl From<String> for WidgetKind {
    fn from(tag: String) -> Self {
        WidgetKind::from_tag(&tag)
    }
}

impl From<&str> for WidgetKind {
    fn from(tag: &str) -> Self {
        WidgetKind::from_tag(tag)
    }
}

impl From<WidgetKind> for String {
    fn from(kind: WidgetKind) -> Self {
        kind.as_tag().to_string()
    }
}

/// Alias table: configured aliases first, then the built-in table
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    extra: BTreeMap<String, String>,
}

impl AliasTable {
    /// Table with only the built-in aliases
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Table with extra aliases; keys are matched case-insensitively
    ///
    /// `InterpreterConfig::check_alias_cycles` rejects loops among the
    /// configured aliases, but a chain can still loop through the built-in
    /// table. Such a chain settles on the first tag it reaches twice.
    pub fn with_aliases(aliases: &BTreeMap<String, String>) -> Self {
        let table = Self {
            extra: aliases
                .iter()
                .map(|(alias, target)| (lookup_key(alias), target.trim().to_string()))
                .collect(),
        };
        for alias in table.extra.keys() {
            let (settled, looped) = table.resolve(alias);
            if looped {
                warn!(alias = %alias, settled = %settled, "Alias chain loops through the built-in aliases");
            }
        }
        table
    }

    pub fn from_config(config: &loom_config::InterpreterConfig) -> Self {
        Self::with_aliases(&config.aliases)
    }

    /// Normalize a tag to its canonical form
    pub fn normalize(&self, tag: &str) -> String {
        self.resolve(tag).0
    }

    /// One rewrite: configured aliases win, canonical tags are final, then
    /// the built-in table applies. `x -> x` mappings are ignored.
    fn step(&self, key: &str) -> Option<String> {
        if let Some(target) = self.extra.get(key) {
            if lookup_key(target) != key {
                return Some(target.clone());
            }
        }
        if canonical_kind(key).is_some() {
            return None;
        }
        builtin_alias(key).map(str::to_string)
    }

    /// Rewrite until nothing applies; also reports whether the chain looped
    fn resolve(&self, tag: &str) -> (String, bool) {
        let mut current = tag.to_string();
        let mut seen = BTreeSet::new();

        loop {
            let key = lookup_key(&current);
            let looped = !seen.insert(key.clone());
            let next = if looped { None } else { self.step(&key) };
            match next {
                Some(next) => current = next,
                None if canonical_kind(&key).is_some() => return (key, looped),
                None => return (current, looped),
            }
        }
    }

    /// Normalize and parse a tag
    pub fn kind(&self, tag: &str) -> WidgetKind {
        let normalized = self.normalize(tag);
        canonical_kind(&normalized).unwrap_or(WidgetKind::Other(normalized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case("panel", "card" ; "panel is a card")]
    #[test_case("Paper", "card" ; "aliases ignore case")]
    #[test_case("  switch ", "toggle" ; "aliases ignore whitespace")]
    #[test_case("button", "button" ; "canonical tags are kept")]
    #[test_case("Frobnicator", "Frobnicator" ; "unknown tags pass through")]
    #[test_case("", "" ; "empty tag passes through")]
    fn test_normalize(input: &str, expected: &str) {
        assert_eq!(normalize_tag(input), expected);
    }

    #[test]
    fn test_kind_roundtrip() {
        assert_eq!(WidgetKind::from_tag("paper"), WidgetKind::Card);
        assert_eq!(WidgetKind::Card.as_tag(), "card");
        assert_eq!(
            WidgetKind::from_tag("frobnicator"),
            WidgetKind::Other("frobnicator".into())
        );
    }

    #[test]
    fn test_kind_serde_as_string() {
        let kind: WidgetKind = serde_json::from_str("\"dropdown\"").unwrap();
        assert_eq!(kind, WidgetKind::Select);
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"select\"");
    }

    #[test]
    fn test_extra_aliases_chain_into_builtin() {
        let mut aliases = BTreeMap::new();
        aliases.insert("Widget".to_string(), "tile".to_string());
        aliases.insert("gadget".to_string(), "widget".to_string());
        let table = AliasTable::with_aliases(&aliases);
        assert_eq!(table.normalize("gadget"), "card");
        assert_eq!(table.kind("WIDGET"), WidgetKind::Card);
    }

    #[test]
    fn test_extra_alias_to_unknown_target() {
        let mut aliases = BTreeMap::new();
        aliases.insert("fancy".to_string(), "FancyThing".to_string());
        let table = AliasTable::with_aliases(&aliases);
        assert_eq!(table.normalize("fancy"), "FancyThing");
        assert_eq!(table.normalize("FancyThing"), "FancyThing");
    }

    #[test]
    fn test_cycle_terminates() {
        let mut aliases = BTreeMap::new();
        aliases.insert("a".to_string(), "b".to_string());
        aliases.insert("b".to_string(), "a".to_string());
        let table = AliasTable::with_aliases(&aliases);
        let _ = table.normalize("a");
    }

    fn table(pairs: &[(&str, &str)]) -> AliasTable {
        let aliases: BTreeMap<String, String> = pairs
            .iter()
            .map(|(alias, target)| (alias.to_string(), target.to_string()))
            .collect();
        AliasTable::with_aliases(&aliases)
    }

    #[test_case("panel", "container" ; "builtin alias follows the remapped kind")]
    #[test_case("card", "container" ; "remapped canonical tag")]
    #[test_case("Box", "container" ; "builtin target of the remap")]
    #[test_case("container", "container" ; "final kind is stable")]
    fn test_configured_alias_remaps_canonical_tag(input: &str, expected: &str) {
        let table = table(&[("card", "box")]);
        let once = table.normalize(input);
        assert_eq!(once, expected);
        assert_eq!(table.normalize(&once), once);
    }

    #[test]
    fn test_loop_through_builtin_aliases_settles() {
        // card -> div -> container -> panel -> card
        let table = table(&[("card", "div"), ("container", "panel")]);
        for tag in ["card", "div", "container", "panel", "box", "paper"] {
            let once = table.normalize(tag);
            assert_eq!(table.normalize(&once), once, "tag {tag}");
        }
    }

    const TABLE_TAGS: &[&str] = &[
        "card", "Card", "panel", "box", "container", "div", "button", "btn", "text", "label",
        "widget", "Gadget", "x", "",
    ];

    proptest! {
        #[test]
        fn prop_configured_tables_normalize_idempotently(
            aliases in prop::collection::btree_map(
                prop::sample::select(TABLE_TAGS),
                prop::sample::select(TABLE_TAGS),
                0..8,
            ),
            tag in prop::sample::select(TABLE_TAGS),
        ) {
            let aliases: BTreeMap<String, String> = aliases
                .into_iter()
                .map(|(alias, target)| (alias.to_string(), target.to_string()))
                .collect();
            let table = AliasTable::with_aliases(&aliases);
            let once = table.normalize(tag);
            prop_assert_eq!(table.normalize(&once), once.clone());
            prop_assert_eq!(table.kind(&once), table.kind(tag));
        }

        #[test]
        fn prop_normalize_is_idempotent(tag in "[A-Za-z \\-]{0,12}") {
            let once = normalize_tag(&tag);
            prop_assert_eq!(normalize_tag(&once), once);
        }

        #[test]
        fn prop_known_tags_idempotent(index in 0usize..BUILTIN_ALIASES.len()) {
            let (alias, _) = BUILTIN_ALIASES[index];
            let once = normalize_tag(alias);
            prop_assert_eq!(normalize_tag(&once), once.clone());
            prop_assert!(WidgetKind::from_tag(&once).is_known());
        }
    }
}
