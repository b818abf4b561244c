use uuid::Uuid;

/// Builds a URL slug from a display name: whitespace becomes `-`, diacritics
/// and anything outside `[a-z0-9_-]` are dropped, edge dashes trimmed.
/// A name that leaves nothing behind gets a generated placeholder.
pub fn create_slug(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut last_dash = true; // suppress a leading dash

    for ch in input.chars() {
        if ch.is_whitespace() {
            if !last_dash {
                slug.push('-');
                last_dash = true;
            }
            continue;
        }
        let folded = fold_char(ch);
        if folded.is_ascii_alphanumeric() || folded == '_' {
            slug.push(folded.to_ascii_lowercase());
            last_dash = false;
        } else if folded == '-' && !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }

    if slug.is_empty() {
        return format!("item-{}", Uuid::new_v4().simple());
    }
    slug
}

/// Strips the combining marks of the Latin-1/Vietnamese letters the catalog
/// actually sees. Unmapped characters pass through untouched.
fn fold_char(ch: char) -> char {
    match ch {
        'à'..='å' | 'ă' | 'ạ' | 'ả' | 'ấ' | 'ầ' | 'ẩ' | 'ẫ' | 'ậ' | 'ắ' | 'ằ' | 'ẳ' | 'ẵ'
        | 'ặ' | 'À'..='Å' | 'Ă' => 'a',
        'è'..='ë' | 'ẹ' | 'ẻ' | 'ẽ' | 'ế' | 'ề' | 'ể' | 'ễ' | 'ệ' | 'È'..='Ë' => 'e',
        'ì'..='ï' | 'ỉ' | 'ị' | 'ĩ' | 'Ì'..='Ï' => 'i',
        'ò'..='ö' | 'ơ' | 'ọ' | 'ỏ' | 'ố' | 'ồ' | 'ổ' | 'ỗ' | 'ộ' | 'ớ' | 'ờ' | 'ở' | 'ỡ'
        | 'ợ' | 'Ò'..='Ö' | 'Ơ' => 'o',
        'ù'..='ü' | 'ư' | 'ụ' | 'ủ' | 'ũ' | 'ứ' | 'ừ' | 'ử' | 'ữ' | 'ự' | 'Ù'..='Ü' | 'Ư' => {
            'u'
        }
        'ý' | 'ỳ' | 'ỵ' | 'ỷ' | 'ỹ' | 'Ý' => 'y',
        'đ' | 'Đ' => 'd',
        'ç' | 'Ç' => 'c',
        'ñ' | 'Ñ' => 'n',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_names_become_kebab_case() {
        assert_eq!(create_slug("Wireless Headphones"), "wireless-headphones");
        assert_eq!(create_slug("USB-C Cable 2m"), "usb-c-cable-2m");
    }

    #[test]
    fn diacritics_are_folded() {
        assert_eq!(create_slug("Điện thoại"), "dien-thoai");
        assert_eq!(create_slug("Café Crème"), "cafe-creme");
    }

    #[test]
    fn punctuation_is_dropped() {
        assert_eq!(create_slug("50% off! (today)"), "50-off-today");
    }

    #[test]
    fn edge_dashes_trimmed() {
        assert_eq!(create_slug("  spaced  out  "), "spaced-out");
        assert_eq!(create_slug("-already-dashed-"), "already-dashed");
    }

    #[test]
    fn empty_input_gets_placeholder() {
        let slug = create_slug("!!!");
        assert!(slug.starts_with("item-"));
        assert!(slug.len() > "item-".len());
    }
}
