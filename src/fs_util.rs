use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use crate::error::AugmentError;

pub const INPUT_EXTENSIONS: [&str; 2] = [".cif", ".cif.gz"];

pub fn is_input_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| INPUT_EXTENSIONS.iter().any(|ext| name.ends_with(ext)))
}

/// Every model file below `root`, sorted so batches are reproducible.
pub fn collect_inputs(root: &Path) -> Result<Vec<PathBuf>, AugmentError> {
    let mut found = Vec::new();
    walk(root, &mut found)?;
    found.sort();
    Ok(found)
}

fn walk(dir: &Path, found: &mut Vec<PathBuf>) -> Result<(), AugmentError> {
    let entries = fs::read_dir(dir)
        .map_err(|err| AugmentError::Filesystem(format!("read dir {}: {err}", dir.display())))?;
    for entry in entries {
        let path = entry
            .map_err(|err| AugmentError::Filesystem(err.to_string()))?
            .path();
        if path.is_dir() {
            walk(&path, found)?;
        } else if is_input_file(&path) {
            found.push(path);
        }
    }
    Ok(())
}

/// Reads a text file, inflating `.gz` transparently. Lines keep their
/// terminators so slices can be written back byte for byte.
pub fn read_lines(path: &Path) -> Result<Vec<String>, AugmentError> {
    let file = fs::File::open(path)
        .map_err(|err| AugmentError::Filesystem(format!("open {}: {err}", path.display())))?;
    let mut text = String::new();
    let gz = path.extension().is_some_and(|ext| ext == "gz");
    let result = if gz {
        GzDecoder::new(file).read_to_string(&mut text)
    } else {
        io::BufReader::new(file).read_to_string(&mut text)
    };
    result.map_err(|err| AugmentError::Filesystem(format!("read {}: {err}", path.display())))?;
    Ok(split_lines(&text))
}

pub fn split_lines(text: &str) -> Vec<String> {
    text.split_inclusive('\n').map(str::to_string).collect()
}

pub fn write_lines<S: AsRef<str>>(path: &Path, lines: &[S]) -> Result<(), AugmentError> {
    let text = lines.iter().map(AsRef::as_ref).collect::<String>();
    fs::write(path, text)
        .map_err(|err| AugmentError::Filesystem(format!("write {}: {err}", path.display())))
}

/// Removes a partially written output; a missing file is not an error.
pub fn discard(path: &Path) -> Result<(), AugmentError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(AugmentError::Filesystem(format!(
            "remove {}: {err}",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;

    use super::*;

    #[test]
    fn collects_nested_inputs_by_extension() {
        let temp = tempfile::tempdir().unwrap();
        let nested = temp.path().join("UP000005640");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("AF-A-F1-model_v1.cif"), "data_").unwrap();
        fs::write(nested.join("AF-B-F1-model_v1.cif.gz"), "").unwrap();
        fs::write(nested.join("notes.txt"), "").unwrap();

        let inputs = collect_inputs(temp.path()).unwrap();
        assert_eq!(inputs.len(), 2);
        assert!(inputs.iter().all(|path| is_input_file(path)));
    }

    #[test]
    fn reads_gzip_and_keeps_terminators() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("model.cif.gz");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"data_X\r\n#\nlast").unwrap();
        fs::write(&path, encoder.finish().unwrap()).unwrap();

        let lines = read_lines(&path).unwrap();
        assert_eq!(lines, vec!["data_X\r\n", "#\n", "last"]);
    }
}
