//! Plain-text search over a buffer
//!
//! Matches are non-overlapping character ranges. Lookups in either direction
//! wrap around the buffer ends.

use std::ops::Range;

use super::buffer::TextBuffer;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub pattern: String,
    pub case_sensitive: bool,
    pub whole_word: bool,
}

impl SearchQuery {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            ..Self::default()
        }
    }
}

/// All matches of `query`, in buffer order
pub fn find_all(buffer: &TextBuffer, query: &SearchQuery) -> Vec<Range<usize>> {
    let needle: Vec<char> = query.pattern.chars().map(|c| fold(c, query)).collect();
    if needle.is_empty() {
        return Vec::new();
    }

    let hay: Vec<char> = buffer.rope().chars().map(|c| fold(c, query)).collect();
    let is_word = |i: usize| hay.get(i).is_some_and(|c| c.is_alphanumeric() || *c == '_');

    let mut matches = Vec::new();
    let mut i = 0;
    while i + needle.len() <= hay.len() {
        let end = i + needle.len();
        let hit = hay[i..end] == needle[..]
            && (!query.whole_word || (!(i > 0 && is_word(i - 1)) && !is_word(end)));
        if hit {
            matches.push(i..end);
            i = end;
        } else {
            i += 1;
        }
    }
    matches
}

/// First match starting at or after `from`, wrapping to the start
pub fn find_next(buffer: &TextBuffer, query: &SearchQuery, from: usize) -> Option<Range<usize>> {
    let matches = find_all(buffer, query);
    matches
        .iter()
        .find(|m| m.start >= from)
        .or_else(|| matches.first())
        .cloned()
}

/// Last match starting before `from`, wrapping to the end
pub fn find_prev(buffer: &TextBuffer, query: &SearchQuery, from: usize) -> Option<Range<usize>> {
    let matches = find_all(buffer, query);
    matches
        .iter()
        .rev()
        .find(|m| m.start < from)
        .or_else(|| matches.last())
        .cloned()
}

fn fold(c: char, query: &SearchQuery) -> char {
    if query.case_sensitive {
        c
    } else {
        c.to_lowercase().next().unwrap_or(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_all_case_insensitive_by_default() {
        let buf = TextBuffer::from_text("Foo foo FOO food");
        let query = SearchQuery::new("foo");
        assert_eq!(find_all(&buf, &query), vec![0..3, 4..7, 8..11, 12..15]);

        let query = SearchQuery {
            case_sensitive: true,
            ..SearchQuery::new("foo")
        };
        assert_eq!(find_all(&buf, &query), vec![4..7, 12..15]);
    }

    #[test]
    fn test_whole_word() {
        let buf = TextBuffer::from_text("foo food _foo foo");
        let query = SearchQuery {
            whole_word: true,
            ..SearchQuery::new("foo")
        };
        assert_eq!(find_all(&buf, &query), vec![0..3, 14..17]);
    }

    #[test]
    fn test_next_and_prev_wrap() {
        let buf = TextBuffer::from_text("ab ab ab");
        let query = SearchQuery::new("ab");
        assert_eq!(find_next(&buf, &query, 1), Some(3..5));
        assert_eq!(find_next(&buf, &query, 7), Some(0..2));
        assert_eq!(find_prev(&buf, &query, 3), Some(0..2));
        assert_eq!(find_prev(&buf, &query, 0), Some(6..8));
        assert_eq!(find_next(&buf, &SearchQuery::new(""), 0), None);
    }
}
