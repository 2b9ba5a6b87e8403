//! Natural ("human") ordering of archive entry names.
//!
//! Frame entries are named with embedded counters (`images/frame2.png`,
//! `images/frame10.png`). Lexical ordering would put `frame10` before
//! `frame2`; natural ordering splits every name into alternating digit and
//! non-digit runs and compares digit runs by numeric value.

use std::cmp::Ordering;

/// One run of a name split for natural comparison.
#[derive(Debug, PartialEq, Eq)]
enum Chunk<'a> {
    Text(&'a str),
    Number(&'a str),
}

fn chunks(name: &str) -> Vec<Chunk<'_>> {
    let mut result = Vec::new();
    let mut start = 0;
    let mut in_digits = None;

    for (offset, character) in name.char_indices() {
        let is_digit = character.is_ascii_digit();
        match in_digits {
            Some(previous) if previous != is_digit => {
                result.push(make_chunk(&name[start..offset], previous));
                start = offset;
            }
            _ => {}
        }
        in_digits = Some(is_digit);
    }

    if let Some(is_digit) = in_digits {
        result.push(make_chunk(&name[start..], is_digit));
    }
    result
}

fn make_chunk(text: &str, is_digit: bool) -> Chunk<'_> {
    if is_digit {
        Chunk::Number(text)
    } else {
        Chunk::Text(text)
    }
}

/// Compare two digit runs by value without overflowing on long runs.
fn compare_numbers(a: &str, b: &str) -> Ordering {
    let a_trimmed = a.trim_start_matches('0');
    let b_trimmed = b.trim_start_matches('0');
    a_trimmed
        .len()
        .cmp(&b_trimmed.len())
        .then_with(|| a_trimmed.cmp(b_trimmed))
        // Equal values: fewer leading zeros first, so the order stays total.
        .then_with(|| a.len().cmp(&b.len()))
}

/// Compare two names in natural order.
///
/// Digit runs compare numerically, text runs lexically; a number sorts
/// before text at the same position.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let left = chunks(a);
    let right = chunks(b);

    for (x, y) in left.iter().zip(right.iter()) {
        let ordering = match (x, y) {
            (Chunk::Number(x), Chunk::Number(y)) => compare_numbers(x, y),
            (Chunk::Text(x), Chunk::Text(y)) => x.cmp(y),
            (Chunk::Number(_), Chunk::Text(_)) => Ordering::Less,
            (Chunk::Text(_), Chunk::Number(_)) => Ordering::Greater,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    left.len().cmp(&right.len())
}

/// Sort names in place using [`natural_cmp`].
pub fn natural_sort<S: AsRef<str>>(names: &mut [S]) {
    names.sort_by(|a, b| natural_cmp(a.as_ref(), b.as_ref()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_runs_compare_by_value() {
        assert_eq!(
            natural_cmp("images/frame2.png", "images/frame10.png"),
            Ordering::Less
        );
        assert_eq!(
            natural_cmp("images/frame1.png", "images/frame2.png"),
            Ordering::Less
        );
        assert_eq!(
            natural_cmp("images/frame10.png", "images/frame9.png"),
            Ordering::Greater
        );
    }

    #[test]
    fn sort_orders_capture_frames() {
        let mut names = vec![
            "images/frame10.png",
            "images/frame2.png",
            "images/frame1.png",
            "images/frame100.png",
            "images/frame20.png",
        ];
        natural_sort(&mut names);
        assert_eq!(
            names,
            vec![
                "images/frame1.png",
                "images/frame2.png",
                "images/frame10.png",
                "images/frame20.png",
                "images/frame100.png",
            ]
        );
    }

    #[test]
    fn leading_zeros_and_long_runs() {
        assert_eq!(natural_cmp("f007", "f7"), Ordering::Greater);
        assert_eq!(natural_cmp("f007", "f8"), Ordering::Less);
        assert_eq!(
            natural_cmp("f99999999999999999999999", "f100000000000000000000000"),
            Ordering::Less
        );
    }

    #[test]
    fn prefix_sorts_first() {
        assert_eq!(natural_cmp("images/", "images/frame1.png"), Ordering::Less);
        assert_eq!(natural_cmp("", "a"), Ordering::Less);
        assert_eq!(natural_cmp("a1", "a1"), Ordering::Equal);
    }

    #[test]
    fn chunking_alternates() {
        assert_eq!(
            chunks("ab12cd3"),
            vec![
                Chunk::Text("ab"),
                Chunk::Number("12"),
                Chunk::Text("cd"),
                Chunk::Number("3"),
            ]
        );
    }
}
