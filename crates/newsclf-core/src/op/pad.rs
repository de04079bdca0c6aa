use serde::{Deserialize, Serialize};

/// 填充 / 截断发生在序列的哪一端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PadSide {
    Pre,
    #[default]
    Post,
}

/// 将变长的 token 序列规整为固定长度 `max_len`。
///
/// 与 Keras `pad_sequences` 一致：
/// * `truncating = Post` 保留开头，`Pre` 保留末尾；
/// * `padding = Post` 在末尾补 `value`，`Pre` 在开头补；
/// * 空序列得到全 `value`。
pub fn pad_sequence(
    seq: &[u32],
    max_len: usize,
    padding: PadSide,
    truncating: PadSide,
    value: u32,
) -> Vec<u32> {
    let kept = if seq.len() > max_len {
        match truncating {
            PadSide::Post => &seq[..max_len],
            PadSide::Pre => &seq[seq.len() - max_len..],
        }
    } else {
        seq
    };

    let fill = max_len - kept.len();
    let mut out = Vec::with_capacity(max_len);
    match padding {
        PadSide::Post => {
            out.extend_from_slice(kept);
            out.resize(max_len, value);
        }
        PadSide::Pre => {
            out.resize(fill, value);
            out.extend_from_slice(kept);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_padding_appends_zeros() {
        assert_eq!(pad_sequence(&[5, 6], 5, PadSide::Post, PadSide::Post, 0), vec![5, 6, 0, 0, 0]);
    }

    #[test]
    fn pre_padding_prepends_zeros() {
        assert_eq!(pad_sequence(&[5, 6], 4, PadSide::Pre, PadSide::Post, 0), vec![0, 0, 5, 6]);
    }

    #[test]
    fn post_truncation_keeps_head() {
        assert_eq!(pad_sequence(&[1, 2, 3, 4, 5], 3, PadSide::Post, PadSide::Post, 0), vec![1, 2, 3]);
    }

    #[test]
    fn pre_truncation_keeps_tail() {
        assert_eq!(pad_sequence(&[1, 2, 3, 4, 5], 3, PadSide::Post, PadSide::Pre, 0), vec![3, 4, 5]);
    }

    #[test]
    fn empty_sequence_is_all_padding() {
        assert_eq!(pad_sequence(&[], 4, PadSide::Post, PadSide::Post, 0), vec![0; 4]);
    }

    #[test]
    fn exact_length_is_unchanged() {
        assert_eq!(pad_sequence(&[7, 8, 9], 3, PadSide::Pre, PadSide::Pre, 0), vec![7, 8, 9]);
    }

    #[test]
    fn pad_side_deserializes_lowercase() {
        let side: PadSide = serde_json::from_str("\"pre\"").unwrap();
        assert_eq!(side, PadSide::Pre);
        assert_eq!(PadSide::default(), PadSide::Post);
    }
}
