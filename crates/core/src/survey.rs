//! Self-assessment survey shown before and after a training session.
//!
//! Ten statements rated 0–100, averaged into a single confidence score. The
//! same items are asked both times so the pair of scores shows movement.

pub const ITEM_COUNT: usize = 10;

pub const ITEMS: [&str; ITEM_COUNT] = [
    "怒っているお客様を前にしても落ち着いて話を聞ける",
    "お客様の話を遮らず、最後まで聞き切ることができる",
    "お客様の感情に寄り添う相づちや言葉を自然に返せる",
    "事実関係を確認してから謝罪の言葉を選べる",
    "自分の権限でできる解決策をその場で提示できる",
    "権限を超える要求に対して代替案を示せる",
    "クレームの内容を上司へ正確に報告できる",
    "理不尽な要求にも感情的にならず対応できる",
    "対応の結果をお客様に確認し、納得を得られる",
    "一連の対応を振り返り、改善点を言葉にできる",
];

/// Averages the answers into a 0–100 score, rounding half up.
/// Returns `None` unless exactly [`ITEM_COUNT`] answers are given.
pub fn score(answers: &[u8]) -> Option<u8> {
    if answers.len() != ITEM_COUNT {
        return None;
    }
    let total: u32 = answers.iter().map(|a| (*a).min(100) as u32).sum();
    let mean = total as f64 / ITEM_COUNT as f64;
    Some(mean.round() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_answers_score_themselves() {
        assert_eq!(score(&[80; 10]), Some(80));
        assert_eq!(score(&[0; 10]), Some(0));
        assert_eq!(score(&[100; 10]), Some(100));
    }

    #[test]
    fn test_wrong_length_is_rejected() {
        assert_eq!(score(&[]), None);
        assert_eq!(score(&[50; 9]), None);
        assert_eq!(score(&[50; 11]), None);
    }

    #[test]
    fn test_mean_rounds_half_up() {
        // Sum 605 -> mean 60.5 -> 61.
        let answers = [60, 60, 60, 60, 60, 61, 61, 61, 61, 61];
        assert_eq!(score(&answers), Some(61));
    }

    #[test]
    fn test_overflowing_answers_clamped_to_hundred() {
        assert_eq!(score(&[255; 10]), Some(100));
    }
}
