//! Approximate rendered width of text in a 16px proportional sans-serif
//! font, used to predict truncation in search result snippets.

/// Width used for any character not in the table
const DEFAULT_WIDTH: f64 = 8.9;

fn char_width(c: char) -> f64 {
    match c {
        'a' | 'e' | 'k' | 'v' | 'x' | 'y' => 8.9,
        'b' | 'd' | 'g' | 'h' | 'n' | 'o' | 'p' | 'q' | 'u' => 9.8,
        'c' | 's' | 'z' => 8.0,
        'f' | 't' => 5.3,
        'i' | 'j' | 'l' => 3.6,
        'm' => 14.2,
        'r' => 6.2,
        'w' => 12.5,

        'A' | 'B' | 'E' | 'K' | 'P' | 'S' | 'V' | 'X' | 'Y' => 11.6,
        'C' | 'D' | 'H' | 'N' | 'R' | 'U' => 12.5,
        'F' | 'T' | 'Z' => 10.7,
        'G' | 'O' | 'Q' => 13.3,
        'I' => 4.4,
        'J' => 8.9,
        'L' => 9.8,
        'M' => 15.1,
        'W' => 16.9,

        '0'..='9' => 9.8,

        ' ' | '.' | ',' | '!' | '|' | ':' | ';' => 4.4,
        '-' | '/' | '\\' | '(' | ')' | '[' | ']' | '{' | '}' | '`' => 5.3,
        '_' | '?' | '<' | '>' => 8.9,
        '"' => 6.2,
        '\'' => 3.6,
        '@' => 16.9,
        '#' | '$' | '+' | '=' | '~' => 9.8,
        '%' => 14.2,
        '^' | '*' => 7.1,
        '&' => 11.6,

        _ => DEFAULT_WIDTH,
    }
}

/// Sums per-character widths and rounds to the nearest integer
///
/// # Examples
///
/// ```
/// use spiderfrog::analysis::pixel_width;
///
/// assert_eq!(pixel_width(""), 0);
/// assert_eq!(pixel_width("Home"), 45);
/// ```
pub fn pixel_width(text: &str) -> u32 {
    text.chars().map(char_width).sum::<f64>().round() as u32
}
