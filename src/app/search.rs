use std::cmp::Reverse;

use crate::domain::post::{PostSort, PostView};

pub const DEFAULT_SNIPPET_WINDOW: usize = 30;
pub const PREVIEW_CHARS: usize = 120;

const ELLIPSIS: &str = "...";

/// A post that passed the query filter.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub post: PostView,
    /// True when the query was found in the post body.
    pub content_match: bool,
}

/// Filters, sorts and attaches a snippet to every returned post.
pub fn search(posts: Vec<PostView>, query: &str, sort_key: PostSort, window: usize) -> Vec<PostView> {
    let query = query.trim();
    let mut hits = filter(posts, query);
    sort(&mut hits, sort_key);

    hits.into_iter()
        .map(|hit| {
            let mut post = hit.post;
            let snippet = if hit.content_match {
                snippet(&post.post.content, query, window)
            } else {
                None
            };
            post.snippet = Some(snippet.unwrap_or_else(|| preview(&post.post.content)));
            post
        })
        .collect()
}

/// Case-insensitive substring match against title, content, tags,
/// categories and author name. An empty query keeps everything.
pub fn filter(posts: Vec<PostView>, query: &str) -> Vec<SearchHit> {
    let query = query.trim();
    if query.is_empty() {
        return posts
            .into_iter()
            .map(|post| SearchHit {
                post,
                content_match: false,
            })
            .collect();
    }

    let needle = fold(query);
    posts
        .into_iter()
        .filter_map(|post| {
            let content_match = find_folded(&post.post.content, &needle).is_some();
            let matched = content_match
                || contains(&post.post.title, &needle)
                || post.post.tags.iter().any(|tag| contains(tag, &needle))
                || post
                    .post
                    .categories
                    .iter()
                    .any(|category| contains(category, &needle))
                || contains(&post.author.username, &needle);

            matched.then_some(SearchHit {
                post,
                content_match,
            })
        })
        .collect()
}

/// Stable sort; ties keep their incoming order.
pub fn sort(hits: &mut [SearchHit], key: PostSort) {
    match key {
        PostSort::Newest => hits.sort_by_key(|hit| Reverse(hit.post.post.created_at)),
        PostSort::Oldest => hits.sort_by_key(|hit| hit.post.post.created_at),
        PostSort::MostLikes => hits.sort_by_key(|hit| Reverse(hit.post.likes_count)),
        PostSort::MostViews => hits.sort_by_key(|hit| Reverse(hit.post.views_count)),
    }
}

/// Context around the first match of `query` in `content`, `window`
/// characters each side, or `None` when the query does not occur.
pub fn snippet(content: &str, query: &str, window: usize) -> Option<String> {
    let needle = fold(query.trim());
    if needle.is_empty() {
        return None;
    }
    let (match_start, match_end) = find_folded(content, &needle)?;

    let total = content.chars().count();
    let start = match_start.saturating_sub(window);
    let end = match_end.saturating_add(window).min(total);

    let mut out = String::new();
    if start > 0 {
        out.push_str(ELLIPSIS);
    }
    out.extend(content.chars().skip(start).take(end - start));
    if end < total {
        out.push_str(ELLIPSIS);
    }
    Some(out)
}

/// First `PREVIEW_CHARS` characters, with an ellipsis when cut.
pub fn preview(content: &str) -> String {
    let mut chars = content.chars();
    let mut out: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        out.push_str(ELLIPSIS);
    }
    out
}

fn contains(haystack: &str, needle: &[char]) -> bool {
    find_folded(haystack, needle).is_some()
}

fn fold(value: &str) -> Vec<char> {
    value.chars().flat_map(char::to_lowercase).collect()
}

// Lowercasing can expand a char into several, so each folded char keeps the
// index of the source char it came from. Returns the half-open char range of
// the first match in `haystack`.
fn find_folded(haystack: &str, needle: &[char]) -> Option<(usize, usize)> {
    if needle.is_empty() {
        return Some((0, 0));
    }

    let folded: Vec<(usize, char)> = haystack
        .chars()
        .enumerate()
        .flat_map(|(index, ch)| ch.to_lowercase().map(move |lower| (index, lower)))
        .collect();

    if folded.len() < needle.len() {
        return None;
    }

    (0..=folded.len() - needle.len()).find_map(|offset| {
        let candidate = &folded[offset..offset + needle.len()];
        let found = candidate
            .iter()
            .zip(needle)
            .all(|((_, folded_char), needle_char)| folded_char == needle_char);
        if !found {
            return None;
        }
        let start = candidate[0].0;
        let end = candidate[needle.len() - 1].0 + 1;
        Some((start, end))
    })
}
