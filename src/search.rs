use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

use crate::model::Book;

#[derive(Clone, Debug, PartialEq)]
pub struct SearchHit<'a> {
    pub book: &'a Book,
    pub score: i64,
}

/// Ranks books against a free-text term by fuzzy title match, best
/// first. An empty term returns the head of the list unranked;
/// non-matching books drop out entirely.
pub fn search_titles<'a>(books: &'a [Book], term: &str, limit: usize) -> Vec<SearchHit<'a>> {
    let term = term.trim();
    if term.is_empty() {
        return books
            .iter()
            .take(limit)
            .map(|book| SearchHit { book, score: 0 })
            .collect();
    }

    let matcher = SkimMatcherV2::default().ignore_case();
    let mut hits: Vec<SearchHit<'a>> = books
        .iter()
        .filter_map(|book| {
            matcher
                .fuzzy_match(&book.info.title, term)
                .map(|score| SearchHit { book, score })
        })
        .collect();
    hits.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.book.info.title.cmp(&b.book.info.title))
    });
    hits.truncate(limit);
    hits
}
