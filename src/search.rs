//! search.rs
//!
//! Поиск гостей: подстрока или, если в запросе есть согласные хангыля (ㄱ-ㅎ),
//! подстрока по начальным согласным (초성) имени.

use serde::Deserialize;

use crate::models::{Guest, GuestType};

const CHOSUNG: [char; 19] = [
    'ㄱ', 'ㄲ', 'ㄴ', 'ㄷ', 'ㄸ', 'ㄹ', 'ㅁ', 'ㅂ', 'ㅃ', 'ㅅ', 'ㅆ', 'ㅇ', 'ㅈ', 'ㅉ', 'ㅊ', 'ㅋ', 'ㅌ', 'ㅍ', 'ㅎ',
];

const SYLLABLE_BASE: u32 = 0xAC00;
const SYLLABLE_COUNT: u32 = 11172;
// 21 гласная * 28 конечных согласных
const SYLLABLES_PER_INITIAL: u32 = 588;

fn chosung(c: char) -> char {
    let code = u32::from(c).wrapping_sub(SYLLABLE_BASE);
    if code < SYLLABLE_COUNT {
        CHOSUNG[(code / SYLLABLES_PER_INITIAL) as usize]
    } else {
        c
    }
}

fn is_jamo_consonant(c: char) -> bool {
    ('ㄱ'..='ㅎ').contains(&c)
}

/// Совпадение текста с запросом; для запросов с согласными хангыля ищет и по 초성.
pub fn hangul_match(text: &str, query: &str) -> bool {
    if text.contains(query) {
        return true;
    }
    if query.chars().any(is_jamo_consonant) {
        let initials: String = text.chars().map(chosung).collect();
        return initials.contains(query);
    }
    false
}

/// Вкладка списка гостей.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuestFilter {
    #[default]
    All,
    Vip,
    Unassigned,
}

impl GuestFilter {
    fn accepts(self, guest: &Guest) -> bool {
        match self {
            GuestFilter::All => true,
            GuestFilter::Vip => guest.guest_type == GuestType::Vip,
            GuestFilter::Unassigned => !guest.is_seated(),
        }
    }
}

/// Имя сравнивается через [`hangul_match`], организация и должность - по подстроке.
pub fn matches(guest: &Guest, query: &str) -> bool {
    let query = query.trim();
    query.is_empty()
        || hangul_match(&guest.name, query)
        || guest.organization.contains(query)
        || guest.position.contains(query)
}

pub fn filter_guests<'a, I>(guests: I, query: Option<&str>, filter: GuestFilter) -> Vec<Guest>
where
    I: IntoIterator<Item = &'a Guest>,
{
    guests
        .into_iter()
        .filter(|g| query.map_or(true, |q| matches(g, q)))
        .filter(|g| filter.accepts(g))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_substring() {
        assert!(hangul_match("홍길동", "길동"));
        assert!(hangul_match("Kim Cheolsu", "Cheol"));
        assert!(!hangul_match("Kim Cheolsu", "Park"));
    }

    #[test]
    fn initial_consonant_search() {
        assert!(hangul_match("홍길동", "ㅎㄱㄷ"));
        assert!(hangul_match("홍길동", "ㄱㄷ"));
        assert!(!hangul_match("홍길동", "ㄱㅎ"));
        assert!(!hangul_match("김철수", "ㄲ"));
    }

    #[test]
    fn filter_by_organization_and_tab() {
        let mut vip = Guest::new("ev", "홍길동").with_seat("A-1");
        vip.organization = "외교부".into();
        vip.guest_type = GuestType::Vip;
        let regular = Guest::new("ev", "김철수");
        let guests = vec![vip, regular];

        assert_eq!(filter_guests(&guests, Some("외교"), GuestFilter::All).len(), 1);
        assert_eq!(filter_guests(&guests, None, GuestFilter::Vip)[0].name, "홍길동");
        assert_eq!(filter_guests(&guests, Some(" "), GuestFilter::Unassigned)[0].name, "김철수");
    }
}
