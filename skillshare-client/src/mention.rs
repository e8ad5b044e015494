//! Splitting comment text into plain text and `@user` mentions

use pest::Parser;

#[derive(pest_derive::Parser)]
#[grammar = "mention.pest"]
struct MentionParser;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Segment {
    Text(String),
    /// User name, without the leading `@`
    Mention(String),
}

pub fn segments(text: &str) -> Vec<Segment> {
    let mut pairs = match MentionParser::parse(Rule::segments, text) {
        Ok(p) => p,
        Err(err) => {
            // the grammar accepts any input, so this is a bug
            tracing::error!(?err, ?text, "failed splitting comment text");
            return vec![Segment::Text(String::from(text))];
        }
    };
    let Some(segments) = pairs.next() else {
        return Vec::new();
    };
    segments
        .into_inner()
        .filter_map(|p| match p.as_rule() {
            Rule::text => Some(Segment::Text(String::from(p.as_str()))),
            Rule::mention => Some(Segment::Mention(String::from(
                p.into_inner().next().map(|n| n.as_str()).unwrap_or(""),
            ))),
            _ => None,
        })
        .collect()
}

/// Names mentioned in `text`, de-duplicated, in order of first appearance
pub fn mentions(text: &str) -> Vec<String> {
    let mut res: Vec<String> = Vec::new();
    for s in segments(text) {
        if let Segment::Mention(name) = s {
            if !res.contains(&name) {
                res.push(name);
            }
        }
    }
    res
}
