//! Annotation codec.
//!
//! Bidirectional mapping between typed records and the flat
//! `string -> string` maps Kubernetes stores as annotations and labels.
//! Records describe their own field layout by implementing [`Annotated`];
//! there is no runtime introspection. Unknown keys on decode are ignored
//! so records stay forward and backward compatible across releases.
//!
//! Key layout: `{domain}/{field}` for top-level fields and
//! `{domain}/{outer}/{inner}` for fields of nested records. An empty
//! domain yields keys without a prefix. Scalar fields at their zero value
//! and empty maps are omitted; list fields always emit their key, with an
//! empty value for an empty list.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// A record that can be flattened into annotation form and rebuilt from
/// it.
///
/// `decode_field` receives the key path below the domain plus the raw
/// value, and must silently accept paths it does not recognize.
pub trait Annotated: Default {
    /// Emit every non-empty field into `enc`.
    fn encode_fields(&self, enc: &mut Encoder);

    /// Assign one field addressed by `path` from its string form.
    fn decode_field(&mut self, path: &[&str], raw: &str) -> Result<()>;
}

/// Encode `record` under `domain`.
pub fn encode<T: Annotated>(domain: &str, record: &T) -> BTreeMap<String, String> {
    let mut enc = Encoder::new(domain);
    record.encode_fields(&mut enc);
    enc.into_map()
}

/// Decode every entry of `map` under `domain` into `record`.
///
/// Entries outside the domain are left untouched; an empty map is a valid
/// empty operation.
pub fn decode<T: Annotated>(
    domain: &str,
    map: &BTreeMap<String, String>,
    record: &mut T,
) -> Result<()> {
    let prefix = key_prefix(domain);
    for (key, raw) in map {
        let Some(rest) = key.strip_prefix(&prefix) else {
            continue;
        };
        let path: Vec<&str> = rest.split('/').collect();
        record.decode_field(&path, raw)?;
    }
    Ok(())
}

fn key_prefix(domain: &str) -> String {
    if domain.is_empty() {
        String::new()
    } else {
        format!("{domain}/")
    }
}

/// Accumulates flattened fields during [`encode`].
pub struct Encoder {
    prefix: String,
    out: BTreeMap<String, String>,
}

impl Encoder {
    fn new(domain: &str) -> Self {
        Self {
            prefix: key_prefix(domain),
            out: BTreeMap::new(),
        }
    }

    fn into_map(self) -> BTreeMap<String, String> {
        self.out
    }

    fn put(&mut self, name: &str, value: String) {
        self.out.insert(format!("{}{name}", self.prefix), value);
    }

    /// String field; omitted when empty.
    pub fn str_field(&mut self, name: &str, value: &str) {
        if !value.is_empty() {
            self.put(name, value.to_string());
        }
    }

    /// Unsigned integer field; omitted when zero.
    pub fn u32_field(&mut self, name: &str, value: u32) {
        if value != 0 {
            self.put(name, value.to_string());
        }
    }

    /// Signed integer field; omitted when zero.
    pub fn i64_field(&mut self, name: &str, value: i64) {
        if value != 0 {
            self.put(name, value.to_string());
        }
    }

    /// Float field; omitted when zero.
    pub fn f64_field(&mut self, name: &str, value: f64) {
        if value != 0.0 {
            self.put(name, format_f64(value));
        }
    }

    /// Boolean field; omitted when false.
    pub fn bool_field(&mut self, name: &str, value: bool) {
        if value {
            self.put(name, "true".to_string());
        }
    }

    /// Map field rendered as `k=v` pairs joined by commas; omitted when
    /// empty.
    pub fn map_field(&mut self, name: &str, value: &BTreeMap<String, String>) {
        if !value.is_empty() {
            let joined = value
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(",");
            self.put(name, joined);
        }
    }

    /// String list joined by commas; always emitted.
    pub fn str_list(&mut self, name: &str, value: &[String]) {
        self.put(name, value.join(","));
    }

    /// Boolean list joined by commas; always emitted.
    pub fn bool_list(&mut self, name: &str, value: &[bool]) {
        let joined = value
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.put(name, joined);
    }

    /// Integer list joined by commas; always emitted.
    pub fn i64_list(&mut self, name: &str, value: &[i64]) {
        let joined = value
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.put(name, joined);
    }

    /// Float list joined by commas; always emitted.
    pub fn f64_list(&mut self, name: &str, value: &[f64]) {
        let joined = value
            .iter()
            .map(|v| format_f64(*v))
            .collect::<Vec<_>>()
            .join(",");
        self.put(name, joined);
    }

    /// Nested record under an extra path segment.
    pub fn nested(&mut self, name: &str, f: impl FnOnce(&mut Encoder)) {
        let saved = self.prefix.len();
        self.prefix.push_str(name);
        self.prefix.push('/');
        f(self);
        self.prefix.truncate(saved);
    }

    /// Embedded record merged into the current namespace without an extra
    /// path segment.
    pub fn flatten(&mut self, f: impl FnOnce(&mut Encoder)) {
        f(self);
    }
}

fn format_f64(value: f64) -> String {
    format!("{value}")
}

/// Parse a boolean value.
pub fn parse_bool(raw: &str) -> Result<bool> {
    match raw {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(Error::invalid(format!("expected bool but got {raw:?}"))),
    }
}

/// Parse an unsigned integer value.
pub fn parse_u32(raw: &str) -> Result<u32> {
    raw.parse()
        .map_err(|_| Error::invalid(format!("expected u32 but got {raw:?}")))
}

/// Parse a signed integer value.
pub fn parse_i64(raw: &str) -> Result<i64> {
    raw.parse()
        .map_err(|_| Error::invalid(format!("expected i64 but got {raw:?}")))
}

/// Parse a float value.
pub fn parse_f64(raw: &str) -> Result<f64> {
    raw.parse()
        .map_err(|_| Error::invalid(format!("expected f64 but got {raw:?}")))
}

/// Parse a comma-joined string list. An empty value is an empty list.
pub fn parse_str_list(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        Vec::new()
    } else {
        raw.split(',').map(str::to_string).collect()
    }
}

/// Parse a comma-joined boolean list.
pub fn parse_bool_list(raw: &str) -> Result<Vec<bool>> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    raw.split(',').map(parse_bool).collect()
}

/// Parse a comma-joined integer list.
pub fn parse_i64_list(raw: &str) -> Result<Vec<i64>> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    raw.split(',').map(parse_i64).collect()
}

/// Parse a comma-joined float list.
pub fn parse_f64_list(raw: &str) -> Result<Vec<f64>> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    raw.split(',').map(parse_f64).collect()
}

/// Parse a comma-joined `k=v` map.
pub fn parse_map(raw: &str) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    if raw.is_empty() {
        return Ok(out);
    }
    for pair in raw.split(',') {
        let Some((k, v)) = pair.split_once('=') else {
            return Err(Error::invalid(format!(
                "expected k=v pair but got {pair:?}"
            )));
        };
        out.insert(k.to_string(), v.to_string());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Bools {
        bool: bool,
    }

    impl Annotated for Bools {
        fn encode_fields(&self, enc: &mut Encoder) {
            enc.bool_field("bool", self.bool);
        }

        fn decode_field(&mut self, path: &[&str], raw: &str) -> Result<()> {
            if path == ["bool"] {
                self.bool = parse_bool(raw)?;
            }
            Ok(())
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Strings {
        string: String,
    }

    impl Annotated for Strings {
        fn encode_fields(&self, enc: &mut Encoder) {
            enc.str_field("string", &self.string);
        }

        fn decode_field(&mut self, path: &[&str], raw: &str) -> Result<()> {
            if path == ["string"] {
                self.string = raw.to_string();
            }
            Ok(())
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Slices {
        bools: Vec<bool>,
        floats: Vec<f64>,
        ints: Vec<i64>,
        strings: Vec<String>,
    }

    impl Annotated for Slices {
        fn encode_fields(&self, enc: &mut Encoder) {
            enc.bool_list("bools", &self.bools);
            enc.f64_list("floats", &self.floats);
            enc.i64_list("ints", &self.ints);
            enc.str_list("strings", &self.strings);
        }

        fn decode_field(&mut self, path: &[&str], raw: &str) -> Result<()> {
            match path {
                ["bools"] => self.bools = parse_bool_list(raw)?,
                ["floats"] => self.floats = parse_f64_list(raw)?,
                ["ints"] => self.ints = parse_i64_list(raw)?,
                ["strings"] => self.strings = parse_str_list(raw),
                _ => {}
            }
            Ok(())
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct SubNested {
        slices: Slices,
    }

    impl Annotated for SubNested {
        fn encode_fields(&self, enc: &mut Encoder) {
            enc.nested("slices", |e| self.slices.encode_fields(e));
        }

        fn decode_field(&mut self, path: &[&str], raw: &str) -> Result<()> {
            if let ["slices", rest @ ..] = path {
                self.slices.decode_field(rest, raw)?;
            }
            Ok(())
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Outer {
        bools: Bools,
        strings: Strings,
        sub_nested: SubNested,
        map: BTreeMap<String, String>,
    }

    impl Annotated for Outer {
        fn encode_fields(&self, enc: &mut Encoder) {
            enc.nested("bools", |e| self.bools.encode_fields(e));
            enc.nested("strings", |e| self.strings.encode_fields(e));
            enc.nested("sub_nested", |e| self.sub_nested.encode_fields(e));
            enc.map_field("map", &self.map);
        }

        fn decode_field(&mut self, path: &[&str], raw: &str) -> Result<()> {
            match path {
                ["bools", rest @ ..] => self.bools.decode_field(rest, raw),
                ["strings", rest @ ..] => self.strings.decode_field(rest, raw),
                ["sub_nested", rest @ ..] => self.sub_nested.decode_field(rest, raw),
                ["map"] => {
                    self.map = parse_map(raw)?;
                    Ok(())
                }
                _ => Ok(()),
            }
        }
    }

    const DOMAIN: &str = "canary.kage.cloud";

    fn sample() -> Outer {
        Outer {
            bools: Bools { bool: true },
            strings: Strings {
                string: "str".to_string(),
            },
            sub_nested: SubNested {
                slices: Slices {
                    floats: vec![1.0],
                    ..Slices::default()
                },
            },
            map: BTreeMap::from([("str".to_string(), "str".to_string())]),
        }
    }

    #[test]
    fn test_encode_nested_record() {
        let encoded = encode(DOMAIN, &sample());

        let expected = BTreeMap::from([
            ("canary.kage.cloud/bools/bool".to_string(), "true".to_string()),
            ("canary.kage.cloud/strings/string".to_string(), "str".to_string()),
            (
                "canary.kage.cloud/sub_nested/slices/bools".to_string(),
                String::new(),
            ),
            (
                "canary.kage.cloud/sub_nested/slices/floats".to_string(),
                "1".to_string(),
            ),
            (
                "canary.kage.cloud/sub_nested/slices/ints".to_string(),
                String::new(),
            ),
            (
                "canary.kage.cloud/sub_nested/slices/strings".to_string(),
                String::new(),
            ),
            ("canary.kage.cloud/map".to_string(), "str=str".to_string()),
        ]);
        assert_eq!(encoded, expected);
    }

    #[test]
    fn test_roundtrip() {
        let original = sample();
        let encoded = encode(DOMAIN, &original);

        let mut decoded = Outer::default();
        decode(DOMAIN, &encoded, &mut decoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_decode_bad_bool() {
        let map = BTreeMap::from([(
            "canary.kage.cloud/bool".to_string(),
            "1".to_string(),
        )]);

        let mut record = Bools::default();
        let err = decode(DOMAIN, &map, &mut record).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Invalid);
        assert!(err.to_string().contains("expected bool but got \"1\""));
    }

    #[test]
    fn test_decode_ignores_foreign_domain() {
        let map = BTreeMap::from([
            ("other.domain/bool".to_string(), "true".to_string()),
            ("canary.kage.cloud.example/bool".to_string(), "true".to_string()),
        ]);

        let mut record = Bools::default();
        decode(DOMAIN, &map, &mut record).unwrap();
        assert_eq!(record, Bools::default());
    }

    #[test]
    fn test_decode_ignores_unknown_paths() {
        let map = BTreeMap::from([
            ("canary.kage.cloud/no_such_field".to_string(), "x".to_string()),
            ("canary.kage.cloud/bool".to_string(), "true".to_string()),
        ]);

        let mut record = Bools::default();
        decode(DOMAIN, &map, &mut record).unwrap();
        assert!(record.bool);
    }

    #[test]
    fn test_empty_domain_has_no_prefix() {
        let record = Bools { bool: true };
        let encoded = encode("", &record);
        assert_eq!(encoded.get("bool").map(String::as_str), Some("true"));

        let mut decoded = Bools::default();
        decode("", &encoded, &mut decoded).unwrap();
        assert!(decoded.bool);
    }

    #[test]
    fn test_empty_map_is_a_valid_noop() {
        let mut record = Outer::default();
        decode(DOMAIN, &BTreeMap::new(), &mut record).unwrap();
        assert_eq!(record, Outer::default());
    }

    #[test]
    fn test_map_parse_errors() {
        let err = parse_map("no-equals-sign").unwrap_err();
        assert!(err.to_string().contains("expected k=v pair"));

        let parsed = parse_map("a=1,b=2").unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["a"], "1");
        assert_eq!(parsed["b"], "2");
    }
}
