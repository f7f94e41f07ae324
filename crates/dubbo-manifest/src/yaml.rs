//! Helpers for multi-document YAML streams.

/// Separates the documents of a multi-document stream.
pub const YAML_SEPARATOR: &str = "\n---\n";

const DOCUMENT_MARKER: &str = "---";

/// Splits a multi-document stream at every line starting with `---`.
/// Documents which only contain whitespace are dropped.
pub fn split_documents(input: &str) -> Vec<String> {
    let mut documents = Vec::new();
    let mut current = String::new();

    for line in input.lines() {
        if line.starts_with(DOCUMENT_MARKER) {
            documents.push(std::mem::take(&mut current));
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }
    documents.push(current);

    documents.retain(|document| !document.trim().is_empty());
    documents
}

/// Joins documents into one stream. Blank lines around every document are
/// dropped and each is followed by a separator, so the stream always ends with
/// `---`. Indentation of the first line is kept.
pub fn join_documents<I, S>(documents: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut joined = String::new();
    for document in documents {
        let document = trim_blank_lines(document.as_ref());
        if document.is_empty() {
            continue;
        }

        joined.push_str(document);
        if document.ends_with(DOCUMENT_MARKER) {
            joined.push('\n');
        } else {
            joined.push_str(YAML_SEPARATOR);
        }
    }
    joined
}

/// Removes trailing whitespace and leading lines which only contain
/// whitespace.
fn trim_blank_lines(document: &str) -> &str {
    let document = document.trim_end();
    let mut offset = 0;
    for line in document.split_inclusive('\n') {
        if !line.trim().is_empty() {
            break;
        }
        offset += line.len();
    }
    &document[offset..]
}
