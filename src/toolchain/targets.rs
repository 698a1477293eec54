//! Parsing of cargo's example listing

const AVAILABLE_HEADER: &str = "Available examples:";

/// Extract example names from the output of `cargo run --example`
///
/// Cargo answers a bare `--example` with an error followed by an
/// "Available examples:" block, one indented name per line. Output without
/// that block, including cargo's "No examples available." answer, yields
/// nothing.
pub fn parse_example_names(output: &str) -> Vec<String> {
    let mut lines = output.lines();

    if !lines.any(|line| line.trim() == AVAILABLE_HEADER) {
        return Vec::new();
    }

    lines
        .take_while(|line| line.starts_with(char::is_whitespace) && !line.trim().is_empty())
        .map(|line| line.trim().to_string())
        .collect()
}
