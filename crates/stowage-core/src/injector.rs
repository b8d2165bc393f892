//! Injection template engine.
//!
//! The [`Injector`] works on a template as opaque text and only understands
//! `{{…}}` placeholders, matched non-greedily on a single line:
//!
//! ```text
//! {{GENERATE:AN:64:DB_PASSWORD}}
//! {{PROMPT:DB_PASSWORD}}
//! {{INTERNAL:SUBKEY_PRIVATE(:HEX|:BASE64|:BASE58)}}
//! ```
//!
//! A template goes through three calls, driven by the caller:
//!
//! 1. [`Injector::extract`] (or [`Injector::prepare`]) lists the placeholders
//!    so the operator can be asked for the `PROMPT` values.
//! 2. [`Injector::inject`] substitutes everything it can resolve. Unresolved
//!    prompts and internal paths are left in place so injection can be staged.
//! 3. [`Injector::validate`] reports whether any placeholder is left.
//!
//! # Security model
//!
//! - Generated tokens come from the OS CSPRNG (see [`crate::generator`]).
//! - Identical `GENERATE` placeholders get one value per `inject` call; the
//!   cache lives on the stack of that call and is dropped with it.
//! - Resolved values are never logged, only placeholder text and keys.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{InjectError, ResolveError};
use crate::generator;
use crate::internal;
use crate::point::{InjectionPoint, InternalTransform, path_segments};

#[allow(clippy::expect_used)]
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(.+?)\}\}").expect("invalid placeholder regex"));

/// Result of scanning a template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scan {
    /// Distinct, successfully parsed injection points.
    pub points: BTreeSet<InjectionPoint>,
    /// Placeholder spans (markers included) whose interior failed to parse,
    /// in document order.
    pub malformed: Vec<String>,
}

/// What the operator needs to see before a template can be injected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preparation {
    /// Every distinct injection point in the template.
    pub injection: Vec<InjectionPoint>,
    /// Previously supplied prompt values that the template still uses.
    pub prompted: BTreeMap<String, String>,
}

impl Preparation {
    /// Prompt keys that still need a value from the operator.
    pub fn missing_prompts(&self) -> Vec<&str> {
        self.injection
            .iter()
            .filter_map(InjectionPoint::prompt_key)
            .filter(|key| !self.prompted.contains_key(*key))
            .collect()
    }
}

/// Outcome of [`Injector::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    /// `true` when no placeholder remains.
    pub resolved: bool,
    /// The first remaining placeholder, markers included; empty when resolved.
    pub remaining: String,
}

/// Placeholder extraction, injection and validation.
///
/// The injector is immutable and can be shared across threads. Overrides are
/// internal values supplied by the caller that take precedence over the
/// internal document, such as the `SERVICE` name of the service being created.
#[derive(Debug, Clone, Default)]
pub struct Injector {
    overrides: HashMap<String, String>,
}

impl Injector {
    /// Create an injector with no overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `{{INTERNAL:<path>}}` to `value` regardless of the document.
    ///
    /// `HOST_DOMAIN` and `HOST.DOMAIN` name the same override.
    #[must_use]
    pub fn with_override(mut self, path: &str, value: impl Into<String>) -> Self {
        self.overrides.insert(override_key(path), value.into());
        self
    }

    /// Shorthand for the `SERVICE` override.
    #[must_use]
    pub fn with_service(self, service: impl Into<String>) -> Self {
        self.with_override("SERVICE", service)
    }

    /// Scan `document` and parse every placeholder.
    pub fn scan(&self, document: &str) -> Scan {
        let mut scan = Scan::default();
        for caps in PLACEHOLDER.captures_iter(document) {
            let (Some(span), Some(inner)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            match InjectionPoint::parse(inner.as_str()) {
                Ok(point) => {
                    scan.points.insert(point);
                }
                Err(_) => scan.malformed.push(span.as_str().to_owned()),
            }
        }
        scan
    }

    /// Distinct injection points in `document`.
    ///
    /// Malformed placeholders are logged and skipped.
    pub fn extract(&self, document: &str) -> BTreeSet<InjectionPoint> {
        let Scan { points, malformed } = self.scan(document);
        for span in &malformed {
            warn!(placeholder = %span, "failed to extract injection point");
        }
        points
    }

    /// Extract the injection points and carry over the `known` prompt values
    /// the template still references.
    pub fn prepare(&self, document: &str, known: &HashMap<String, String>) -> Preparation {
        let injection: Vec<InjectionPoint> = self.extract(document).into_iter().collect();
        let prompted = injection
            .iter()
            .filter_map(InjectionPoint::prompt_key)
            .filter_map(|key| known.get(key).map(|v| (key.to_owned(), v.clone())))
            .collect();
        Preparation {
            injection,
            prompted,
        }
    }

    /// Replace every resolvable placeholder in `document`.
    ///
    /// `internal` is the internal configuration document and `prompts` the
    /// operator-supplied values. Placeholders that cannot be resolved or
    /// parsed are copied through unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`InjectError::Generator`] if a `GENERATE` placeholder asks for
    /// an impossible token (odd hex length) or the OS RNG fails. Lengths
    /// outside `1..=MAX_TOKEN_LENGTH` never get here; they fail to parse and
    /// are copied through like any other malformed placeholder.
    pub fn inject(
        &self,
        document: &str,
        internal: &Value,
        prompts: &HashMap<String, String>,
    ) -> Result<String, InjectError> {
        let mut generated: HashMap<InjectionPoint, String> = HashMap::new();
        let mut output = String::with_capacity(document.len());
        let mut last = 0;
        let mut unresolved = 0usize;

        for caps in PLACEHOLDER.captures_iter(document) {
            let (Some(span), Some(inner)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            output.push_str(&document[last..span.start()]);
            last = span.end();

            let Ok(point) = InjectionPoint::parse(inner.as_str()) else {
                output.push_str(span.as_str());
                unresolved = unresolved.saturating_add(1);
                continue;
            };

            let resolved = match point {
                InjectionPoint::Generate {
                    category, length, ..
                } => match generated.entry(point) {
                    Entry::Occupied(entry) => Ok(entry.get().clone()),
                    Entry::Vacant(entry) => {
                        let value = generator::generate(category, length).map_err(|source| {
                            InjectError::Generator {
                                placeholder: span.as_str().to_owned(),
                                source,
                            }
                        })?;
                        Ok(entry.insert(value).clone())
                    }
                },
                InjectionPoint::Prompt { ref key } => {
                    prompts
                        .get(key)
                        .cloned()
                        .ok_or_else(|| ResolveError::MissingPrompt { key: key.clone() })
                }
                InjectionPoint::Internal {
                    ref path,
                    transform,
                } => self.resolve_internal(internal, path, transform),
            };

            match resolved {
                Ok(value) => output.push_str(&value),
                Err(e) => {
                    debug!(placeholder = %span.as_str(), error = %e, "placeholder left unresolved");
                    output.push_str(span.as_str());
                    unresolved = unresolved.saturating_add(1);
                }
            }
        }
        output.push_str(&document[last..]);

        debug!(generated = generated.len(), unresolved, "injection pass complete");
        Ok(output)
    }

    /// Check that no placeholder is left in `document`, parseable or not.
    pub fn validate(&self, document: &str) -> Validation {
        match PLACEHOLDER.find(document) {
            Some(m) => Validation {
                resolved: false,
                remaining: m.as_str().to_owned(),
            },
            None => Validation {
                resolved: true,
                remaining: String::new(),
            },
        }
    }

    fn resolve_internal(
        &self,
        document: &Value,
        path: &str,
        transform: InternalTransform,
    ) -> Result<String, ResolveError> {
        match self.overrides.get(&override_key(path)) {
            Some(value) => internal::transform(path, value, transform),
            None => internal::resolve(document, path, transform),
        }
    }
}

fn override_key(path: &str) -> String {
    path_segments(path).collect::<Vec<_>>().join("_")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use serde_json::json;
    use tracing::Level;

    use super::*;
    use crate::error::GeneratorError;
    use crate::point::GenerateCategory;

    fn prompts(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    fn prompt(key: &str) -> InjectionPoint {
        InjectionPoint::Prompt {
            key: key.to_owned(),
        }
    }

    /// Log sink shared between a test and its subscriber.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn lines(&self) -> Vec<String> {
            let bytes = self.0.lock().unwrap();
            String::from_utf8_lossy(&bytes)
                .lines()
                .map(str::to_owned)
                .collect()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn with_captured_warnings<T>(f: impl FnOnce() -> T) -> (T, Vec<String>) {
        let logs = CapturedLogs::default();
        let sink = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(Level::WARN)
            .with_writer(move || sink.clone())
            .finish();
        let out = tracing::subscriber::with_default(subscriber, f);
        (out, logs.lines())
    }

    // ── scan / extract ───────────────────────────────────────────────

    #[test]
    fn extract_dedups_identical_points() {
        let points = Injector::new().extract("{{PROMPT:X}} {{PROMPT:X}}");
        assert_eq!(points.len(), 1);
        assert!(points.contains(&prompt("X")));
    }

    #[test]
    fn extract_keeps_distinct_generate_labels() {
        let points =
            Injector::new().extract("{{GENERATE:AN:8:PASS}} {{GENERATE:AN:8:PASS}} {{GENERATE:AN:8:OTHER}}");
        assert_eq!(points.len(), 2);
    }

    #[test]
    fn extract_skips_malformed() {
        let injector = Injector::new();
        let doc = "{{NOPE}} {{PROMPT:X}}";

        let points = injector.extract(doc);
        assert_eq!(points.into_iter().collect::<Vec<_>>(), vec![prompt("X")]);

        let scan = injector.scan(doc);
        assert_eq!(scan.malformed, vec!["{{NOPE}}".to_owned()]);
    }

    #[test]
    fn extract_warns_once_per_malformed_placeholder() {
        let injector = Injector::new();
        let (points, lines) = with_captured_warnings(|| injector.extract("{{NOPE}} {{PROMPT:X}}"));

        assert_eq!(points.len(), 1);
        assert_eq!(lines.len(), 1, "{lines:?}");
        assert!(lines[0].contains("WARN"));
        assert!(lines[0].contains("failed to extract injection point"));
        assert!(lines[0].contains("{{NOPE}}"));
    }

    #[test]
    fn scan_does_not_warn() {
        let (scan, lines) = with_captured_warnings(|| Injector::new().scan("{{NOPE}}"));
        assert_eq!(scan.malformed.len(), 1);
        assert!(lines.is_empty(), "{lines:?}");
    }

    #[test]
    fn scan_is_non_greedy_and_single_line() {
        let scan = Injector::new().scan("{{PROMPT:A}}}} {{PROMPT:\nB}} {{PROMPT:C}}");
        let keys: Vec<_> = scan
            .points
            .iter()
            .filter_map(InjectionPoint::prompt_key)
            .collect();
        assert_eq!(keys, ["A", "C"]);
        assert!(scan.malformed.is_empty());
    }

    #[test]
    fn scan_first_close_marker_ends_span() {
        let scan = Injector::new().scan("{{}}}");
        assert!(scan.points.is_empty());
        assert_eq!(scan.malformed, ["{{}}}"]);
    }

    #[test]
    fn extract_all_kinds_from_compose_file() {
        let doc = r"
services:
  db:
    image: postgres:16
    environment:
      POSTGRES_USER: {{PROMPT:DB_USER}}
      POSTGRES_PASSWORD: {{GENERATE:AN:32:DB_PASSWORD}}
  app:
    environment:
      DATABASE_URL: postgres://{{PROMPT:DB_USER}}:{{GENERATE:AN:32:DB_PASSWORD}}@db/app
      SUBKEY: {{INTERNAL:SUBKEY_PRIVATE:BASE64}}
";
        let points = Injector::new().extract(doc);
        assert_eq!(points.len(), 3);
        assert!(points.contains(&InjectionPoint::Generate {
            category: GenerateCategory::AlphaNumeric,
            length: 32,
            key: "DB_PASSWORD".to_owned(),
        }));
        assert!(points.contains(&InjectionPoint::Internal {
            path: "SUBKEY_PRIVATE".to_owned(),
            transform: InternalTransform::Base64,
        }));
    }

    // ── prepare ──────────────────────────────────────────────────────

    #[test]
    fn prepare_carries_known_prompts() {
        let known = prompts(&[("DB_USER", "admin"), ("STALE", "x")]);
        let prep = Injector::new().prepare("{{PROMPT:DB_USER}} {{PROMPT:DB_NAME}}", &known);

        assert_eq!(prep.injection.len(), 2);
        assert_eq!(prep.prompted.len(), 1);
        assert_eq!(prep.prompted["DB_USER"], "admin");
        assert_eq!(prep.missing_prompts(), ["DB_NAME"]);
    }

    // ── inject ───────────────────────────────────────────────────────

    #[test]
    fn inject_reuses_generated_value() {
        let out = Injector::new()
            .inject("{{GENERATE:AN:8:PASS}}|{{GENERATE:AN:8:PASS}}", &json!({}), &HashMap::new())
            .unwrap();
        let (a, b) = out.split_once('|').unwrap();
        assert_eq!(a.len(), 8);
        assert_eq!(a, b);
    }

    #[test]
    fn inject_distinct_labels_differ() {
        let out = Injector::new()
            .inject("{{GENERATE:AN:32:PASS}}|{{GENERATE:AN:32:OTHER}}", &json!({}), &HashMap::new())
            .unwrap();
        let (a, b) = out.split_once('|').unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn inject_cache_is_per_call() {
        let injector = Injector::new();
        let doc = "{{GENERATE:HEX:32:KEY}}";
        let first = injector.inject(doc, &json!({}), &HashMap::new()).unwrap();
        let second = injector.inject(doc, &json!({}), &HashMap::new()).unwrap();
        assert_eq!(first.len(), 32);
        assert_ne!(first, second);
    }

    #[test]
    fn inject_partial_prompts_is_detectable() {
        let injector = Injector::new();
        let out = injector
            .inject("{{PROMPT:X}}-{{PROMPT:Y}}", &json!({}), &prompts(&[("X", "a")]))
            .unwrap();
        assert_eq!(out, "a-{{PROMPT:Y}}");

        let validation = injector.validate(&out);
        assert!(!validation.resolved);
        assert_eq!(validation.remaining, "{{PROMPT:Y}}");
    }

    #[test]
    fn inject_internal_transforms() {
        let internal = json!({ "SUBKEY": { "PRIVATE": "deadbeef" } });
        let out = Injector::new()
            .inject(
                "{{INTERNAL:SUBKEY_PRIVATE:BASE64}} {{INTERNAL:SUBKEY_PRIVATE}} {{INTERNAL:SUBKEY_PRIVATE:BASE58}}",
                &internal,
                &HashMap::new(),
            )
            .unwrap();
        assert_eq!(out, "3q2+7w== deadbeef 6h8cQN");
    }

    #[test]
    fn inject_leaves_unresolvable_internal() {
        let internal = json!({ "SUBKEY": { "PRIVATE": "not hex" } });
        let doc = "a={{INTERNAL:SUBKEY_PRIVATE:BASE64}} b={{INTERNAL:SUBKEY_PUBLIC}} c={{INTERNAL:SUBKEY_PRIVATE}}";
        let out = Injector::new().inject(doc, &internal, &HashMap::new()).unwrap();
        assert_eq!(
            out,
            "a={{INTERNAL:SUBKEY_PRIVATE:BASE64}} b={{INTERNAL:SUBKEY_PUBLIC}} c=not hex"
        );
    }

    #[test]
    fn inject_leaves_malformed_untouched() {
        let out = Injector::new()
            .inject("{{NOPE}} {{PROMPT:X}}", &json!({}), &prompts(&[("X", "1")]))
            .unwrap();
        assert_eq!(out, "{{NOPE}} 1");
    }

    #[test]
    fn inject_service_override() {
        let injector = Injector::new().with_service("wiki");
        let out = injector
            .inject("container_name: {{INTERNAL:SERVICE}}", &json!({ "SERVICE": "other" }), &HashMap::new())
            .unwrap();
        assert_eq!(out, "container_name: wiki");
    }

    #[test]
    fn inject_override_matches_either_separator() {
        let injector = Injector::new()
            .with_override("HOST_DOMAIN", "ex.org")
            .with_override("SUBKEY.PUBLIC", "deadbeef");
        let out = injector
            .inject(
                "{{INTERNAL:HOST.DOMAIN}} {{INTERNAL:HOST_DOMAIN}} {{INTERNAL:SUBKEY_PUBLIC:BASE64}}",
                &json!({ "HOST": { "DOMAIN": "document.org" } }),
                &HashMap::new(),
            )
            .unwrap();
        assert_eq!(out, "ex.org ex.org 3q2+7w==");
    }

    #[test]
    fn inject_rejects_impossible_generate() {
        let err = Injector::new()
            .inject("{{GENERATE:HEX:7:K}}", &json!({}), &HashMap::new())
            .unwrap_err();
        let InjectError::Generator {
            placeholder,
            source,
        } = err;
        assert_eq!(placeholder, "{{GENERATE:HEX:7:K}}");
        assert!(matches!(source, GeneratorError::OddHexLength { length: 7 }));
    }

    #[test]
    fn inject_leaves_out_of_range_lengths_untouched() {
        let doc = "{{GENERATE:AN:0:K}} {{GENERATE:BASE64:9223372036854775807:K}} \
                   {{GENERATE:AN:18446744073709551615:K}} {{PROMPT:X}}";
        let injector = Injector::new();
        let out = injector.inject(doc, &json!({}), &prompts(&[("X", "1")])).unwrap();
        assert_eq!(
            out,
            "{{GENERATE:AN:0:K}} {{GENERATE:BASE64:9223372036854775807:K}} \
                   {{GENERATE:AN:18446744073709551615:K}} 1"
        );
        assert!(injector.extract(doc).iter().all(|p| p.prompt_key().is_some()));
        assert_eq!(injector.validate(&out).remaining, "{{GENERATE:AN:0:K}}");
    }

    #[test]
    fn inject_preserves_surrounding_text() {
        let doc = "héllo {{PROMPT:X}} wörld\n{{PROMPT:X}}";
        let out = Injector::new()
            .inject(doc, &json!({}), &prompts(&[("X", "✓")]))
            .unwrap();
        assert_eq!(out, "héllo ✓ wörld\n✓");
    }

    // ── validate ─────────────────────────────────────────────────────

    #[test]
    fn validate_round_trip() {
        let injector = Injector::new();
        let internal = json!({ "SUBKEY": { "PUBLIC": "02ab" } });
        let doc = "{{GENERATE:BASE64:24:S}} {{PROMPT:U}} {{INTERNAL:SUBKEY_PUBLIC:HEX}}";

        let full = injector
            .inject(doc, &internal, &prompts(&[("U", "root")]))
            .unwrap();
        assert_eq!(
            injector.validate(&full),
            Validation {
                resolved: true,
                remaining: String::new(),
            }
        );

        let partial = injector.inject(doc, &json!({}), &prompts(&[("U", "root")])).unwrap();
        let validation = injector.validate(&partial);
        assert!(!validation.resolved);
        assert_eq!(validation.remaining, "{{INTERNAL:SUBKEY_PUBLIC:HEX}}");
    }

    #[test]
    fn validate_reports_malformed_spans() {
        let validation = Injector::new().validate("ok {{NOPE}} {{PROMPT:X}}");
        assert!(!validation.resolved);
        assert_eq!(validation.remaining, "{{NOPE}}");
    }
}
