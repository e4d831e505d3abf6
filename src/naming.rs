use std::path::{Path, PathBuf};

/// Path the compressed artifact of `source` is written to.
///
/// A source which already carries `suffix` maps to itself. Callers must treat that case as a
/// rejection, opening both ends at the same path truncates the source.
pub fn output_path(source: &Path, suffix: &str) -> PathBuf {
    let source_bytes = source.as_os_str().as_encoded_bytes();
    if source_bytes.len() > suffix.len() && source_bytes.ends_with(suffix.as_bytes()) {
        source.to_path_buf()
    } else {
        let mut output = source.as_os_str().to_owned();
        output.push(suffix);
        PathBuf::from(output)
    }
}
