use std::time::Duration;
use tokio::time::Instant;

/// Bounded condition poll used in place of fixed settle delays.
///
/// Callers check their condition, then call [`Poller::tick`]; it sleeps one
/// interval and returns `false` once the deadline has passed.
pub struct Poller {
    interval: Duration,
    deadline: Instant,
}

impl Poller {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            deadline: Instant::now() + timeout,
        }
    }

    pub async fn tick(&mut self) -> bool {
        let now = Instant::now();
        if now >= self.deadline {
            return false;
        }
        let remaining = self.deadline - now;
        tokio::time::sleep(self.interval.min(remaining)).await;
        true
    }
}

/// Truncate to at most `max` characters without splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Collapse runs of whitespace left over from nested markup.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lower-case and strip Vietnamese diacritics so `Còn Ra Thể Thống` ~ `con ra the thong`.
///
/// Handles both precomposed letters and decomposed input (base letter
/// followed by combining marks).
pub fn fold_vietnamese(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .chars()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| match c {
            'à' | 'á' | 'ả' | 'ã' | 'ạ' | 'ă' | 'ằ' | 'ắ' | 'ẳ' | 'ẵ' | 'ặ' | 'â' | 'ầ' | 'ấ'
            | 'ẩ' | 'ẫ' | 'ậ' => 'a',
            'è' | 'é' | 'ẻ' | 'ẽ' | 'ẹ' | 'ê' | 'ề' | 'ế' | 'ể' | 'ễ' | 'ệ' => 'e',
            'ì' | 'í' | 'ỉ' | 'ĩ' | 'ị' => 'i',
            'ò' | 'ó' | 'ỏ' | 'õ' | 'ọ' | 'ô' | 'ồ' | 'ố' | 'ổ' | 'ỗ' | 'ộ' | 'ơ' | 'ờ' | 'ớ'
            | 'ở' | 'ỡ' | 'ợ' => 'o',
            'ù' | 'ú' | 'ủ' | 'ũ' | 'ụ' | 'ư' | 'ừ' | 'ứ' | 'ử' | 'ữ' | 'ự' => 'u',
            'ỳ' | 'ý' | 'ỷ' | 'ỹ' | 'ỵ' => 'y',
            'đ' => 'd',
            c => c,
        })
        .collect()
}

/// Combining Diacritical Marks block; covers every Vietnamese tone and vowel mark.
fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("Thể Thống", 3), "Thể");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a \n\t b  "), "a b");
    }

    #[test]
    fn test_fold_vietnamese() {
        assert_eq!(fold_vietnamese("Còn Ra Thể Thống Gì Nữa"), "con ra the thong gi nua");
        assert_eq!(fold_vietnamese(" Thuyết Minh "), "thuyet minh");
        assert_eq!(fold_vietnamese("Đường"), "duong");
    }

    #[test]
    fn test_fold_vietnamese_decomposed() {
        // "Còn Ra Thể" with every mark as a separate combining character
        let decomposed = "Co\u{300}n Ra The\u{302}\u{309}";
        assert_eq!(fold_vietnamese(decomposed), "con ra the");
        assert_eq!(fold_vietnamese("Nu\u{31b}\u{303}a"), "nua");
    }

    #[tokio::test(start_paused = true)]
    async fn poller_stops_at_deadline() {
        let mut poller = Poller::new(Duration::from_millis(100), Duration::from_millis(250));
        let mut ticks = 0;
        while poller.tick().await {
            ticks += 1;
        }
        assert_eq!(ticks, 3);
    }
}
