use std::path::Path;

use crate::definition::model::Test;
use crate::definition::validation::validate_test;
use crate::error::GargoteError;

/// Read a YAML test definition from disk.
///
/// Zero swarm settings are replaced by 1 and the result is checked with
/// [`validate_test`]; every problem is reported in one error.
pub async fn load_test(path: impl AsRef<Path>) -> Result<Test, GargoteError> {
    let content = tokio::fs::read_to_string(path.as_ref()).await?;
    parse_test(&content)
}

/// Decode a YAML test definition held in memory.
pub fn parse_test(content: &str) -> Result<Test, GargoteError> {
    let mut test: Test = serde_yaml::from_str(content)?;
    test.swarm = test.swarm.with_defaults();

    let problems = validate_test(&test);
    if !problems.is_empty() {
        let joined = problems
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(GargoteError::Definition(joined));
    }

    Ok(test)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
