pub fn mask_pii(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }
    let len = trimmed.chars().count();
    format!("<redacted len={}>", len)
}

/// 電話番号は末尾4桁だけ残す（短すぎる番号は全部伏せる）
pub fn mask_phone(value: &str) -> String {
    let trimmed = value.trim();
    let digits: Vec<char> = trimmed.chars().collect();
    if digits.len() <= 4 {
        return mask_pii(trimmed);
    }
    let tail: String = digits[digits.len() - 4..].iter().collect();
    format!("***{}", tail)
}
