//! Reading raw preference records and writing converted pairs.

use crate::dataset::PreferenceDataset;
use crate::models::{PreferenceExample, PreferencePair, PrefbenchError, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Load raw records from a JSON Lines file or a single JSON array.
///
/// Blank lines in JSON Lines input are skipped. Parse errors name the
/// 1-based line number.
pub fn load_examples(path: &Path) -> Result<Vec<PreferenceExample>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| PrefbenchError::io(format!("reading dataset {}", path.display()), e))?;

    let examples = if content.trim_start().starts_with('[') {
        serde_json::from_str::<Vec<PreferenceExample>>(&content).map_err(|e| {
            PrefbenchError::ParseError(format!("Line {}: {}", e.line(), e))
        })?
    } else {
        parse_json_lines(&content)?
    };

    info!(count = examples.len(), path = %path.display(), "Loaded preference records");
    Ok(examples)
}

fn parse_json_lines(content: &str) -> Result<Vec<PreferenceExample>> {
    let mut examples = Vec::new();

    for (line_num, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let example: PreferenceExample = serde_json::from_str(line)
            .map_err(|e| PrefbenchError::ParseError(format!("Line {}: {}", line_num + 1, e)))?;
        examples.push(example);
    }

    Ok(examples)
}

/// Transform every record, stopping at the first failure.
///
/// `on_record` is called once per converted record.
pub fn convert(
    dataset: &dyn PreferenceDataset,
    examples: &[PreferenceExample],
    mut on_record: impl FnMut(),
) -> Result<Vec<PreferencePair>> {
    let mut pairs = Vec::with_capacity(examples.len());

    for (idx, example) in examples.iter().enumerate() {
        let pair = dataset.transform_preference(example).map_err(|e| {
            PrefbenchError::Dataset(format!("{} record {}: {}", dataset.name(), idx + 1, e))
        })?;
        pairs.push(pair);
        on_record();
    }

    debug!(dataset = dataset.name(), count = pairs.len(), "Converted records");
    Ok(pairs)
}

/// Write pairs as JSON Lines. Returns the number of lines written.
pub fn write_pairs(path: &Path, pairs: &[PreferencePair]) -> Result<usize> {
    let file = File::create(path).map_err(|e| PrefbenchError::io("creating output file", e))?;
    let mut writer = BufWriter::new(file);

    for pair in pairs {
        let json = serde_json::to_string(pair)
            .map_err(|e| PrefbenchError::Internal(format!("Failed to serialize pair: {e}")))?;
        writeln!(writer, "{json}").map_err(|e| PrefbenchError::io("writing output", e))?;
    }

    writer
        .flush()
        .map_err(|e| PrefbenchError::io("flushing output", e))?;

    Ok(pairs.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::HumanLikeDpoDataset;
    use crate::models::Message;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{content}").unwrap();
        file
    }

    #[test]
    fn test_load_json_lines_skips_blank_lines() {
        let file = write_temp(
            "{\"prompt\": \"Hi\", \"chosen\": \"Hey there!\", \"rejected\": \"Greetings.\"}\n\
             \n\
             {\"prompt\": \"Bye\", \"chosen\": \"See ya!\", \"rejected\": \"Goodbye.\"}\n",
        );

        let examples = load_examples(file.path()).unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[1], PreferenceExample::text("Bye", "See ya!", "Goodbye."));
    }

    #[test]
    fn test_load_json_array() {
        let file = write_temp(
            r#"
            [
                {"prompt": "Hi", "chosen": "Hey!", "rejected": "Hello."},
                {"prompt": "Sup", "chosen": "Not much!", "rejected": "Nothing."}
            ]"#,
        );

        let examples = load_examples(file.path()).unwrap();
        assert_eq!(examples.len(), 2);
    }

    #[test]
    fn test_parse_error_names_line() {
        let file = write_temp(
            "{\"prompt\": \"Hi\", \"chosen\": \"Hey!\", \"rejected\": \"Hello.\"}\n\
             {\"prompt\": \"Missing fields\"}\n",
        );

        let err = load_examples(file.path()).unwrap_err();
        assert!(matches!(&err, PrefbenchError::ParseError(msg) if msg.starts_with("Line 2:")));
    }

    #[test]
    fn test_missing_file() {
        let err = load_examples(Path::new("/nonexistent/prefs.jsonl")).unwrap_err();
        assert!(matches!(err, PrefbenchError::Io { .. }));
    }

    #[test]
    fn test_convert_and_write() {
        let examples = vec![
            PreferenceExample::text("Hi", "Hey!", "Hello."),
            PreferenceExample::text("Sup", "Not much!", "Nothing."),
        ];

        let mut seen = 0;
        let pairs = convert(&HumanLikeDpoDataset, &examples, || seen += 1).unwrap();
        assert_eq!(seen, 2);
        assert_eq!(pairs[1].chosen, vec![Message::assistant("Not much!")]);

        let dir = TempDir::new().unwrap();
        let out = dir.path().join("pairs.jsonl");
        assert_eq!(write_pairs(&out, &pairs).unwrap(), 2);

        let written = std::fs::read_to_string(&out).unwrap();
        let first: PreferencePair = serde_json::from_str(written.lines().next().unwrap()).unwrap();
        assert_eq!(first, pairs[0]);
    }

    #[test]
    fn test_convert_reports_record_index() {
        let examples = vec![
            PreferenceExample::text("Hi", "Hey!", "Hello."),
            serde_json::from_str(
                r#"{"prompt": "Hi", "chosen": "Hey!", "rejected": [{"role": "user", "content": "Hi"}]}"#,
            )
            .unwrap(),
        ];

        let err = convert(&HumanLikeDpoDataset, &examples, || {}).unwrap_err();
        assert!(err.to_string().contains("record 2"));
    }
}
