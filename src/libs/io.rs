use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// ```
/// use std::io::BufRead;
/// let reader = cxmsa::reader("Cargo.toml");
/// assert!(reader.lines().count() > 0);
/// ```
pub fn reader(input: &str) -> Box<dyn BufRead> {
    let reader: Box<dyn BufRead> = if input == "stdin" {
        Box::new(BufReader::new(std::io::stdin()))
    } else {
        let path = std::path::Path::new(input);
        let file = match std::fs::File::open(path) {
            Err(why) => panic!("could not open {}: {}", path.display(), why),
            Ok(file) => file,
        };

        if path.extension() == Some(std::ffi::OsStr::new("gz")) {
            Box::new(BufReader::new(flate2::read::MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        }
    };

    reader
}

pub fn writer(output: &str) -> Box<dyn Write> {
    let writer: Box<dyn Write> = if output == "stdout" {
        Box::new(BufWriter::new(std::io::stdout()))
    } else {
        Box::new(BufWriter::new(std::fs::File::create(output).unwrap()))
    };

    writer
}

/// Like [`writer`] for a file path, but a file that cannot be created is an error.
pub fn file_writer<P: AsRef<Path>>(path: P) -> std::io::Result<Box<dyn Write>> {
    let file = std::fs::File::create(path)?;
    Ok(Box::new(BufWriter::new(file)))
}

/// Reads a whole text file, decompressing `.gz` transparently.
///
/// Unlike [`reader`], a missing file is reported as an error instead of a panic.
pub fn read_text<P: AsRef<Path>>(path: P) -> std::io::Result<String> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;

    let mut text = String::new();
    if path.extension() == Some(std::ffi::OsStr::new("gz")) {
        flate2::read::MultiGzDecoder::new(file).read_to_string(&mut text)?;
    } else {
        BufReader::new(file).read_to_string(&mut text)?;
    }

    Ok(text)
}
