//! Reading templates, prompt values, and the internal document from disk.

use std::collections::HashMap;
use std::io::Read as _;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::Value;

/// Read a template file, or stdin when `path` is `-`.
pub fn read_template(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read template from stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Load the internal configuration document. Without a file the document is
/// an empty object, so every `INTERNAL` placeholder stays unresolved.
pub fn read_internal(path: Option<&Path>) -> Result<Value> {
    let Some(path) = path else {
        return Ok(Value::Object(serde_json::Map::new()));
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let doc: Value = serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    if !doc.is_object() {
        bail!("{} must contain a JSON object", path.display());
    }
    Ok(doc)
}

/// Load prompt values from a `.json` object of strings or a `KEY=VALUE`
/// env-style file.
pub fn read_prompts(path: &Path) -> Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")) {
        return serde_json::from_str(&content)
            .with_context(|| format!("{} must be a JSON object of strings", path.display()));
    }
    Ok(parse_env_file(&content).into_iter().collect())
}

/// Parse repeated `--prompt KEY=VALUE` flags. The value may contain `=`.
pub fn parse_prompt_pairs(pairs: &[String]) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("invalid KEY=VALUE pair: '{pair}'"))?;
        if key.is_empty() {
            bail!("empty prompt key in '{pair}'");
        }
        map.insert(key.to_owned(), value.to_owned());
    }
    Ok(map)
}

fn parse_env_file(content: &str) -> Vec<(String, String)> {
    let mut entries = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);

        let Some((key, raw_value)) = trimmed.split_once('=') else {
            continue;
        };

        let key = key.trim().to_owned();
        if key.is_empty() {
            continue;
        }

        let value = raw_value.trim();
        let value = if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            value[1..value.len() - 1].to_owned()
        } else {
            value.to_owned()
        };

        entries.push((key, value));
    }

    entries
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn env_file_parsing() {
        let entries = parse_env_file(
            "# comment\n\nexport DB_USER=admin\nDB_NAME = \"app db\"\nTOKEN='a=b'\nnot a pair\n=novalue\nQ=\"\n",
        );
        assert_eq!(
            entries,
            vec![
                ("DB_USER".to_owned(), "admin".to_owned()),
                ("DB_NAME".to_owned(), "app db".to_owned()),
                ("TOKEN".to_owned(), "a=b".to_owned()),
                ("Q".to_owned(), "\"".to_owned()),
            ]
        );
    }

    #[test]
    fn prompt_pairs() {
        let map = parse_prompt_pairs(&["X=1".to_owned(), "URL=a=b".to_owned()]).unwrap();
        assert_eq!(map["X"], "1");
        assert_eq!(map["URL"], "a=b");
        assert!(parse_prompt_pairs(&["novalue".to_owned()]).is_err());
        assert!(parse_prompt_pairs(&["=x".to_owned()]).is_err());
    }

    #[test]
    fn prompts_from_json_and_env_files() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("prompts.json");
        fs::write(&json, r#"{"X": "1", "Y": "2"}"#).unwrap();
        assert_eq!(read_prompts(&json).unwrap().len(), 2);

        let env = dir.path().join("prompts.env");
        fs::write(&env, "X=1\n").unwrap();
        assert_eq!(read_prompts(&env).unwrap()["X"], "1");

        let bad = dir.path().join("bad.json");
        fs::write(&bad, r#"{"X": 1}"#).unwrap();
        assert!(read_prompts(&bad).is_err());
    }

    #[test]
    fn internal_document_must_be_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("internal.json");

        fs::write(&path, r#"{"SUBKEY": {"PRIVATE": "deadbeef"}}"#).unwrap();
        assert!(read_internal(Some(&path)).unwrap().is_object());

        fs::write(&path, "[1, 2]").unwrap();
        assert!(read_internal(Some(&path)).is_err());

        assert_eq!(read_internal(None).unwrap(), serde_json::json!({}));
    }
}
