//! Splitting of oversized outgoing text into several messages.

/// Longest text body sent in a single `SEND_MESSAGE`, in characters.
pub const MAX_CHUNK_CHARS: usize = 1000;

/// Split `text` into chunks of at most `max` characters.
///
/// The input is trimmed first. Text that fits is returned as a single chunk.
/// Longer text is split on whitespace, packing as many words per chunk as
/// fit; a word longer than `max` on its own is cut into fixed-size slices.
/// Whitespace-only input yields no chunks.
pub fn chunk_text(text: &str, max: usize) -> Vec<String> {
    let max = max.max(1);
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if text.chars().count() <= max {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max {
            flush(&mut chunks, &mut buffer, &mut buffer_len);
            chunks.extend(slice_chars(word, max));
            continue;
        }

        let needed = if buffer_len == 0 {
            word_len
        } else {
            buffer_len + 1 + word_len
        };
        if needed > max {
            flush(&mut chunks, &mut buffer, &mut buffer_len);
            buffer.push_str(word);
            buffer_len = word_len;
        } else {
            if buffer_len > 0 {
                buffer.push(' ');
            }
            buffer.push_str(word);
            buffer_len = needed;
        }
    }
    flush(&mut chunks, &mut buffer, &mut buffer_len);

    chunks
}

fn flush(chunks: &mut Vec<String>, buffer: &mut String, buffer_len: &mut usize) {
    let chunk = std::mem::take(buffer);
    *buffer_len = 0;
    if !chunk.trim().is_empty() {
        chunks.push(chunk);
    }
}

/// Cut a token into consecutive slices of `max` characters.
fn slice_chars(token: &str, max: usize) -> Vec<String> {
    let chars: Vec<char> = token.chars().collect();
    chars
        .chunks(max)
        .map(|part| part.iter().collect::<String>())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n)
            .map(|i| format!("word{}", i % 97))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn short_text_is_one_trimmed_chunk() {
        assert_eq!(chunk_text("  hello there \n", MAX_CHUNK_CHARS), vec!["hello there"]);

        let exact = "a".repeat(MAX_CHUNK_CHARS);
        assert_eq!(chunk_text(&exact, MAX_CHUNK_CHARS), vec![exact.clone()]);
    }

    #[test]
    fn blank_text_has_no_chunks() {
        assert!(chunk_text("", MAX_CHUNK_CHARS).is_empty());
        assert!(chunk_text(" \t\n ", MAX_CHUNK_CHARS).is_empty());
    }

    #[test]
    fn long_text_splits_on_words() {
        let text = words(600);
        let chunks = chunk_text(&text, MAX_CHUNK_CHARS);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= MAX_CHUNK_CHARS);
            assert_eq!(chunk.trim(), chunk);
        }
        assert_eq!(chunks.join(" "), text);
    }

    #[test]
    fn irregular_whitespace_keeps_word_sequence() {
        let text = format!("{}\n\n{}\t{}", words(150), words(150), words(150));
        let chunks = chunk_text(&text, MAX_CHUNK_CHARS);

        let original: Vec<&str> = text.split_whitespace().collect();
        let joined = chunks.join(" ");
        let rejoined: Vec<&str> = joined.split(' ').collect();
        assert_eq!(rejoined, original);
    }

    #[test]
    fn unbroken_token_is_sliced() {
        let token = "x".repeat(2500);
        let chunks = chunk_text(&token, MAX_CHUNK_CHARS);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 1000);
        assert_eq!(chunks[2].len(), 500);
        assert_eq!(chunks.concat(), token);
    }

    #[test]
    fn slice_count_is_ceiling() {
        for len in [1001, 1999, 2000, 2001, 4321] {
            let token = "y".repeat(len);
            let chunks = chunk_text(&token, MAX_CHUNK_CHARS);
            assert_eq!(chunks.len(), (len + 999) / 1000, "len {}", len);
            assert_eq!(chunks.concat(), token);
        }
    }

    #[test]
    fn counts_characters_not_bytes() {
        let token = "é".repeat(1500);
        let chunks = chunk_text(&token, MAX_CHUNK_CHARS);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 1000);
        assert_eq!(chunks.concat(), token);
    }

    #[test]
    fn oversized_word_inside_text_is_sliced_in_place() {
        let text = format!("before {} after", "z".repeat(1200));
        let chunks = chunk_text(&text, MAX_CHUNK_CHARS);

        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0], "before");
        assert_eq!(chunks[1].len(), 1000);
        assert_eq!(chunks[2].len(), 200);
        assert_eq!(chunks[3], "after");
    }

    #[test]
    fn small_limit() {
        assert_eq!(chunk_text("aa bb cc dd", 5), vec!["aa bb", "cc dd"]);
    }
}
